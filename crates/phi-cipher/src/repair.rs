//! One-time repair of records whose ciphertext is unreadable.
//!
//! When key material is lost, the affected values cannot be recovered; this
//! scan rewrites them with deterministic placeholders derived from the
//! record's medical record number and clears the metadata so the record
//! reads as plaintext from then on. Irreversible — callers audit every run
//! and never invoke it from request handling.

use serde_json::Value;
use tracing::info;

use crate::cipher::{looks_encrypted, parse_metadata, FieldCipher};
use crate::fields::METADATA_FIELD;
use crate::Record;

/// What happened to one scanned record.
#[derive(Clone, Debug)]
pub struct RepairOutcome {
    pub record_id: Option<String>,
    pub mrn: Option<String>,
    /// Fields whose values were replaced with placeholders.
    pub rewritten_fields: Vec<String>,
    /// Metadata was cleared without touching values (plaintext remnants).
    pub metadata_only: bool,
}

#[derive(Clone, Debug, Default)]
pub struct RepairReport {
    pub scanned: usize,
    pub rewritten: usize,
    pub outcomes: Vec<RepairOutcome>,
}

impl FieldCipher {
    /// Scans records carrying encryption metadata and repairs the ones that
    /// can no longer be decrypted. Readable records are left untouched.
    pub fn repair(&self, records: &mut [Record]) -> RepairReport {
        let mut report = RepairReport::default();

        for record in records.iter_mut() {
            let metadata = parse_metadata(record);
            if metadata.is_empty() {
                continue;
            }
            report.scanned += 1;

            let record_id = record
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string);
            let mrn = record
                .get("mrn")
                .and_then(Value::as_str)
                .map(str::to_string);

            let mut unreadable = Vec::new();
            let mut any_ciphertext = false;
            for (field, meta) in &metadata {
                let Some(Value::String(stored)) = record.get(field.as_str()) else {
                    continue;
                };
                if !looks_encrypted(stored) {
                    continue;
                }
                any_ciphertext = true;
                if self.decrypt_value(meta, stored).is_err() {
                    unreadable.push(field.clone());
                }
            }

            if unreadable.is_empty() {
                if !any_ciphertext {
                    // Values are already plaintext; the metadata is stale.
                    record.remove(METADATA_FIELD);
                    report.outcomes.push(RepairOutcome {
                        record_id,
                        mrn,
                        rewritten_fields: Vec::new(),
                        metadata_only: true,
                    });
                }
                continue;
            }

            for field in &unreadable {
                let placeholder = placeholder_for(field, mrn.as_deref(), record_id.as_deref());
                record.insert(field.clone(), placeholder);
            }
            record.remove(METADATA_FIELD);
            report.rewritten += 1;
            info!(
                record = record_id.as_deref().unwrap_or("?"),
                fields = unreadable.len(),
                "rewrote unreadable PHI fields with placeholders"
            );
            report.outcomes.push(RepairOutcome {
                record_id,
                mrn,
                rewritten_fields: unreadable,
                metadata_only: false,
            });
        }

        report
    }
}

/// Placeholders must be readable, deterministic, and free of PHI. Names get
/// the chart-friendly `Patient` / `MRN-…` pair; everything else is nulled.
fn placeholder_for(field: &str, mrn: Option<&str>, record_id: Option<&str>) -> Value {
    match field {
        "first_name" => Value::String("Patient".to_string()),
        "last_name" => match (mrn, record_id) {
            (Some(mrn), _) => Value::String(format!("MRN-{mrn}")),
            (None, Some(id)) => Value::String(format!("ID-{}", &id[..id.len().min(8)])),
            (None, None) => Value::String("ID-unknown".to_string()),
        },
        _ => Value::Null,
    }
}
