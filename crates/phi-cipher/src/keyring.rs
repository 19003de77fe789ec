use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::errors::{CipherError, CipherResult};

/// A single versioned data encryption key.
#[derive(Clone)]
pub struct DataKey {
    pub key_id: String,
    pub version: String,
    material: [u8; 32],
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material never appears in debug output.
        f.debug_struct("DataKey")
            .field("key_id", &self.key_id)
            .field("version", &self.version)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl DataKey {
    pub fn new(key_id: impl Into<String>, version: impl Into<String>, material: [u8; 32]) -> Self {
        Self {
            key_id: key_id.into(),
            version: version.into(),
            material,
        }
    }

    /// Parses hex- or base64-encoded 256-bit key material.
    pub fn from_encoded(
        key_id: impl Into<String>,
        version: impl Into<String>,
        encoded: &str,
    ) -> CipherResult<Self> {
        let raw = if encoded.len() == 64 && encoded.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode(encoded).map_err(|e| CipherError::InvalidKeyMaterial(e.to_string()))?
        } else {
            BASE64
                .decode(encoded)
                .map_err(|e| CipherError::InvalidKeyMaterial(e.to_string()))?
        };
        let material: [u8; 32] = raw
            .try_into()
            .map_err(|_| CipherError::InvalidKeyMaterial("expected 32 bytes".into()))?;
        Ok(Self::new(key_id, version, material))
    }

    pub(crate) fn material(&self) -> &[u8; 32] {
        &self.material
    }

    /// Short stable identifier safe to log.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.material);
        hex::encode(hasher.finalize())[..16].to_string()
    }
}

/// Versioned key registry. Encryption always uses the active key; decryption
/// resolves whichever key the record's metadata names.
#[derive(Clone, Debug, Default)]
pub struct Keyring {
    keys: HashMap<String, DataKey>,
    active: Option<String>,
}

impl Keyring {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_active(key: DataKey) -> Self {
        let mut ring = Self::default();
        let id = key.key_id.clone();
        ring.keys.insert(id.clone(), key);
        ring.active = Some(id);
        ring
    }

    /// Registers a retired key so records written under it stay readable.
    pub fn insert(&mut self, key: DataKey) {
        self.keys.insert(key.key_id.clone(), key);
    }

    pub fn set_active(&mut self, key: DataKey) {
        let id = key.key_id.clone();
        self.keys.insert(id.clone(), key);
        self.active = Some(id);
    }

    pub fn active(&self) -> CipherResult<&DataKey> {
        self.active
            .as_deref()
            .and_then(|id| self.keys.get(id))
            .ok_or(CipherError::NoActiveKey)
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn get(&self, key_id: &str) -> CipherResult<&DataKey> {
        self.keys
            .get(key_id)
            .ok_or_else(|| CipherError::UnknownKey(key_id.to_string()))
    }

    /// Builds a keyring from the deployment environment.
    ///
    /// `PHI_DATA_KEY` holds hex- or base64-encoded 256-bit key material;
    /// absence of the variable leaves the ring without an active key, which
    /// downgrades the cipher to permissive (plaintext) mode.
    pub fn from_env() -> Self {
        let Ok(encoded) = std::env::var("PHI_DATA_KEY") else {
            return Self::empty();
        };
        let key_id =
            std::env::var("PHI_DATA_KEY_ID").unwrap_or_else(|_| "dek-primary".to_string());
        let version = std::env::var("PHI_DATA_KEY_VERSION").unwrap_or_else(|_| "1".to_string());
        match DataKey::from_encoded(key_id, version, encoded.trim()) {
            Ok(key) => Self::with_active(key),
            Err(err) => {
                tracing::warn!(%err, "PHI_DATA_KEY present but unusable, PHI will not be encrypted");
                Self::empty()
            }
        }
    }
}
