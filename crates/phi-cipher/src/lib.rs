//! Field-level encryption for protected health information.
//!
//! Records are plain JSON maps; a fixed set of PHI fields is encrypted on
//! every write and decrypted on every read. Each record carries its own
//! `encryption_metadata` describing, per field, which key wrote it — the
//! metadata, not a global switch, decides whether a stored value is
//! ciphertext.

pub mod cipher;
pub mod errors;
pub mod fields;
pub mod keyring;
pub mod repair;

pub use cipher::{CipherMode, FieldCipher, FieldMetadata, ALGORITHM};
pub use errors::{CipherError, CipherResult};
pub use fields::{is_phi_field, METADATA_FIELD, PHI_FIELDS, PLAINTEXT_FIELDS};
pub use keyring::{DataKey, Keyring};
pub use repair::{RepairOutcome, RepairReport};

/// Record shape this crate operates on.
pub type Record = serde_json::Map<String, serde_json::Value>;
