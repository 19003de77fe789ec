use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CipherError {
    #[error("no active encryption key configured")]
    NoActiveKey,
    #[error("unknown encryption key id: {0}")]
    UnknownKey(String),
    #[error("failed to encrypt field {field}")]
    EncryptFailed { field: String },
    #[error("stored ciphertext malformed for field {field}")]
    Malformed { field: String },
    #[error("failed to decrypt field {field}")]
    DecryptFailed { field: String },
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),
}

pub type CipherResult<T> = Result<T, CipherError>;
