use chartgate_phi_cipher::{DataKey, FieldCipher, Keyring, Record, METADATA_FIELD};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn patient(n: usize) -> Record {
    let Value::Object(map) = json!({
        "id": format!("p-{n}"),
        "mrn": format!("10{n:04}"),
        "first_name": format!("First{n}"),
        "last_name": format!("Last{n}"),
        "phone": "555-0100",
    }) else {
        unreachable!()
    };
    map
}

#[test]
fn list_reveal_survives_partial_decryption_failure() {
    let key_a = DataKey::new("dek-a", "1", [11u8; 32]);
    let key_b = DataKey::new("dek-b", "1", [22u8; 32]);

    let writer_a = FieldCipher::new(Keyring::with_active(key_a.clone()));
    let writer_b = FieldCipher::new(Keyring::with_active(key_b));

    // 5 records: 3 written under key A, 2 under the now-lost key B.
    let mut records: Vec<Record> = (0..5).map(patient).collect();
    for (i, record) in records.iter_mut().enumerate() {
        if i < 3 {
            writer_a.prepare_for_storage(record).unwrap();
        } else {
            writer_b.prepare_for_storage(record).unwrap();
        }
    }

    let reader = FieldCipher::new(Keyring::with_active(key_a));
    reader.reveal_all(&mut records);

    // Degraded but complete: every record comes back.
    assert_eq!(records.len(), 5);
    for (i, record) in records.iter().enumerate() {
        assert!(!record.contains_key(METADATA_FIELD));
        if i < 3 {
            assert_eq!(record["first_name"], json!(format!("First{i}")));
        } else {
            // Unreadable fields stay opaque rather than failing the call.
            let value = record["first_name"].as_str().unwrap();
            assert_ne!(value, format!("First{i}"));
        }
        // Non-PHI lookup fields are always readable.
        assert_eq!(record["mrn"], json!(format!("10{i:04}")));
    }
}
