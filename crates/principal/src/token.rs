use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::{AuthError, AuthResult};

/// Claims carried by the signed bearer credential.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject: the account id.
    pub sub: String,
    /// Expiry, seconds since epoch.
    pub exp: usize,
    /// Tenant (clinic) the token was minted for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

/// HS256 verification of bearer credentials.
pub struct TokenVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret),
            encoding: EncodingKey::from_secret(secret),
            validation: Validation::default(),
        }
    }

    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".to_string());
        Self::new(secret.as_bytes())
    }

    /// Signature and expiry check. Every failure collapses to the same
    /// caller-visible error.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(%err, "token verification failed");
                AuthError::InvalidOrExpired
            })
    }

    /// Mints a token with this verifier's key. Login flows live outside
    /// this layer; this exists for provisioning tools and tests.
    pub fn issue(&self, claims: &Claims) -> AuthResult<String> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|_| AuthError::InvalidOrExpired)
    }
}
