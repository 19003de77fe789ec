use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use chartgate_phi_cipher::{CipherError, FieldCipher, Record, RepairReport};

/// Minimal protected-record store: every write passes through the field
/// cipher, every read is revealed best-effort. Stands in for the patients
/// table the real platform keeps in Postgres.
pub struct PatientStore {
    cipher: FieldCipher,
    records: RwLock<Vec<Record>>,
}

impl PatientStore {
    pub fn new(cipher: FieldCipher) -> Arc<Self> {
        Arc::new(Self {
            cipher,
            records: RwLock::new(Vec::new()),
        })
    }

    /// Encrypts and stores a new patient; returns the revealed view.
    pub fn create(&self, mut record: Record) -> Result<Record, CipherError> {
        if !record.contains_key("id") {
            record.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        if !record.contains_key("mrn") {
            let mrn = format!("{:06}", self.records.read().len() + 100_000);
            record.insert("mrn".into(), Value::String(mrn));
        }
        self.cipher.prepare_for_storage(&mut record)?;
        self.records.write().push(record.clone());

        let mut revealed = record;
        self.cipher.reveal(&mut revealed);
        Ok(revealed)
    }

    pub fn list(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self.records.read().clone();
        self.cipher.reveal_all(&mut records);
        records
    }

    pub fn get(&self, id: &str) -> Option<Record> {
        let mut record = self.stored(id)?;
        self.cipher.reveal(&mut record);
        Some(record)
    }

    /// Stored (at-rest) form, ciphertext and metadata included.
    pub fn stored(&self, id: &str) -> Option<Record> {
        self.records
            .read()
            .iter()
            .find(|record| record.get("id").and_then(Value::as_str) == Some(id))
            .cloned()
    }

    /// Explicit maintenance pass over the whole table; see
    /// [`FieldCipher::repair`].
    pub fn repair_all(&self) -> RepairReport {
        let mut records = self.records.write();
        self.cipher.repair(&mut records)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
