use std::collections::BTreeMap;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{CipherError, CipherResult};
use crate::fields::{METADATA_FIELD, PHI_FIELDS};
use crate::keyring::{DataKey, Keyring};
use crate::Record;

pub const ALGORITHM: &str = "AES-256-GCM";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Write-time behavior, fixed by the deployment (key present or not),
/// never toggled at runtime.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CipherMode {
    /// A key is configured; an encryption failure is fatal to the write.
    Enforced,
    /// No key configured; PHI fields pass through as plaintext.
    Permissive,
}

/// Per-field encryption metadata stored alongside the record.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    pub key_id: String,
    pub key_version: String,
    pub algorithm: String,
}

pub struct FieldCipher {
    keyring: Keyring,
}

impl FieldCipher {
    pub fn new(keyring: Keyring) -> Self {
        Self { keyring }
    }

    pub fn from_env() -> Self {
        Self::new(Keyring::from_env())
    }

    pub fn mode(&self) -> CipherMode {
        if self.keyring.has_active() {
            CipherMode::Enforced
        } else {
            CipherMode::Permissive
        }
    }

    /// Encrypts every present PHI field in place and attaches the metadata
    /// map. Untouched fields pass through unchanged. With no key configured
    /// the record is stored as plaintext; with a key configured any
    /// per-field failure aborts the write.
    pub fn prepare_for_storage(&self, record: &mut Record) -> CipherResult<()> {
        if self.mode() == CipherMode::Permissive {
            debug!("no encryption key configured, storing PHI fields as plaintext");
            return Ok(());
        }
        let key = self.keyring.active()?;

        let mut metadata = BTreeMap::new();
        for field in PHI_FIELDS {
            let Some(value) = record.get(*field) else {
                continue;
            };
            let Some(plaintext) = scalar_as_string(value) else {
                continue;
            };
            if plaintext.is_empty() {
                continue;
            }
            let blob = encrypt_value(key, &plaintext).map_err(|err| {
                warn!(field, %err, "PHI field encryption failed");
                CipherError::EncryptFailed {
                    field: (*field).to_string(),
                }
            })?;
            record.insert((*field).to_string(), Value::String(blob));
            metadata.insert(
                (*field).to_string(),
                FieldMetadata {
                    key_id: key.key_id.clone(),
                    key_version: key.version.clone(),
                    algorithm: ALGORITHM.to_string(),
                },
            );
        }

        if !metadata.is_empty() {
            record.insert(
                METADATA_FIELD.to_string(),
                serde_json::to_value(metadata).unwrap_or_default(),
            );
        }
        Ok(())
    }

    /// Decrypts in place, best-effort per field. A field whose ciphertext
    /// cannot be decrypted keeps its stored (opaque) value so a list
    /// operation still returns every record. Metadata is stripped from the
    /// revealed record.
    pub fn reveal(&self, record: &mut Record) {
        let metadata = parse_metadata(record);
        if metadata.is_empty() {
            // No metadata: migration-era plaintext record, nothing to do.
            record.remove(METADATA_FIELD);
            return;
        }

        for (field, meta) in &metadata {
            let Some(Value::String(stored)) = record.get(field.as_str()) else {
                continue;
            };
            if !looks_encrypted(stored) {
                // Metadata promised ciphertext but the value reads as
                // plaintext; leave it alone.
                continue;
            }
            match self.decrypt_value(meta, stored) {
                Ok(plaintext) => {
                    record.insert(field.clone(), Value::String(plaintext));
                }
                Err(err) => {
                    warn!(field = field.as_str(), %err, "PHI field unreadable, returning stored value");
                }
            }
        }
        record.remove(METADATA_FIELD);
    }

    /// Reveals a whole result set; a record that fails to decrypt degrades
    /// field-by-field instead of failing the list.
    pub fn reveal_all(&self, records: &mut [Record]) {
        for record in records.iter_mut() {
            self.reveal(record);
        }
    }

    pub(crate) fn decrypt_value(&self, meta: &FieldMetadata, blob: &str) -> CipherResult<String> {
        let key = self.keyring.get(&meta.key_id)?;
        decrypt_value(key, blob)
    }
}

/// Coerces a scalar JSON value to the string form that gets encrypted.
fn scalar_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Stored blobs are base64 over `nonce || tag || ciphertext`.
fn encrypt_value(key: &DataKey, plaintext: &str) -> CipherResult<String> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.material()));
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| CipherError::EncryptFailed {
            field: String::new(),
        })?;
    // aes-gcm appends the tag; stored layout keeps it up front after the nonce.
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    let mut combined = Vec::with_capacity(NONCE_LEN + TAG_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(tag);
    combined.extend_from_slice(ciphertext);
    Ok(BASE64.encode(combined))
}

fn decrypt_value(key: &DataKey, blob: &str) -> CipherResult<String> {
    let malformed = || CipherError::Malformed {
        field: String::new(),
    };
    let combined = BASE64.decode(blob).map_err(|_| malformed())?;
    if combined.len() < NONCE_LEN + TAG_LEN {
        return Err(malformed());
    }
    let (nonce, rest) = combined.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.material()));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), sealed.as_slice())
        .map_err(|_| CipherError::DecryptFailed {
            field: String::new(),
        })?;
    String::from_utf8(plaintext).map_err(|_| CipherError::DecryptFailed {
        field: String::new(),
    })
}

/// Heuristic from the storage format: encrypted blobs are base64 and never
/// short. Plaintext names and addresses fail one of the two checks.
pub(crate) fn looks_encrypted(value: &str) -> bool {
    value.len() > 20
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
}

pub(crate) fn parse_metadata(record: &Record) -> BTreeMap<String, FieldMetadata> {
    let Some(raw) = record.get(METADATA_FIELD) else {
        return BTreeMap::new();
    };
    serde_json::from_value(raw.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_cipher() -> FieldCipher {
        FieldCipher::new(Keyring::with_active(DataKey::new("dek-1", "1", [42u8; 32])))
    }

    fn patient() -> Record {
        let Value::Object(map) = json!({
            "id": "p-1",
            "mrn": "100042",
            "first_name": "Jane",
            "last_name": "Doe",
            "ssn": "123-45-6789",
            "insurance_provider": "Acme Health",
        }) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn roundtrip_restores_every_phi_field() {
        let cipher = test_cipher();
        let original = patient();
        let mut record = original.clone();

        cipher.prepare_for_storage(&mut record).unwrap();
        assert_ne!(record["first_name"], original["first_name"]);
        assert!(looks_encrypted(record["ssn"].as_str().unwrap()));
        assert!(record.contains_key(METADATA_FIELD));
        // Non-PHI fields pass through untouched.
        assert_eq!(record["mrn"], original["mrn"]);
        assert_eq!(record["insurance_provider"], original["insurance_provider"]);

        cipher.reveal(&mut record);
        assert!(!record.contains_key(METADATA_FIELD));
        assert_eq!(record, original);
    }

    #[test]
    fn metadata_names_the_writing_key() {
        let cipher = test_cipher();
        let mut record = patient();
        cipher.prepare_for_storage(&mut record).unwrap();

        let metadata = parse_metadata(&record);
        let meta = metadata.get("first_name").unwrap();
        assert_eq!(meta.key_id, "dek-1");
        assert_eq!(meta.key_version, "1");
        assert_eq!(meta.algorithm, ALGORITHM);
    }

    #[test]
    fn record_without_metadata_is_treated_as_plaintext() {
        let cipher = test_cipher();
        let mut record = patient();
        cipher.reveal(&mut record);
        assert_eq!(record["first_name"], json!("Jane"));
    }

    #[test]
    fn old_key_version_still_decrypts() {
        let old = DataKey::new("dek-1", "1", [1u8; 32]);
        let writer = FieldCipher::new(Keyring::with_active(old.clone()));
        let mut record = patient();
        writer.prepare_for_storage(&mut record).unwrap();

        let mut ring = Keyring::with_active(DataKey::new("dek-2", "2", [2u8; 32]));
        ring.insert(old);
        let reader = FieldCipher::new(ring);
        reader.reveal(&mut record);
        assert_eq!(record["first_name"], json!("Jane"));
    }

    #[test]
    fn wrong_key_leaves_value_opaque_not_error() {
        let writer = FieldCipher::new(Keyring::with_active(DataKey::new("dek-1", "1", [1u8; 32])));
        let mut record = patient();
        writer.prepare_for_storage(&mut record).unwrap();
        let stored = record["first_name"].clone();

        // Same key id, different material: decryption fails per field.
        let reader = FieldCipher::new(Keyring::with_active(DataKey::new("dek-1", "1", [9u8; 32])));
        let mut revealed = record.clone();
        reader.reveal(&mut revealed);
        assert_eq!(revealed["first_name"], stored);
        assert!(!revealed.contains_key(METADATA_FIELD));
    }

    #[test]
    fn permissive_mode_passes_plaintext_through() {
        let cipher = FieldCipher::new(Keyring::empty());
        assert_eq!(cipher.mode(), CipherMode::Permissive);
        let mut record = patient();
        cipher.prepare_for_storage(&mut record).unwrap();
        assert_eq!(record["first_name"], json!("Jane"));
        assert!(!record.contains_key(METADATA_FIELD));
    }

    #[test]
    fn empty_and_null_fields_are_skipped() {
        let cipher = test_cipher();
        let mut record = patient();
        record.insert("email".into(), json!(""));
        record.insert("phone".into(), json!(null));
        cipher.prepare_for_storage(&mut record).unwrap();
        assert_eq!(record["email"], json!(""));
        assert_eq!(record["phone"], json!(null));
        let metadata = parse_metadata(&record);
        assert!(!metadata.contains_key("email"));
        assert!(!metadata.contains_key("phone"));
    }
}
