//! PHI sanitization of audit detail payloads.
//!
//! Detail payloads keep metadata, never PHI values: any key from the fixed
//! PHI list is replaced with the redaction marker at any nesting depth, and
//! free-standing string values that match well-known identifier shapes
//! (SSN, NPI, DEA, card numbers) are redacted even under unlisted keys.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

pub const REDACTION_MARKER: &str = "[REDACTED]";

const MAX_DEPTH: usize = 10;

/// Keys whose values are always redacted, matched case-insensitively.
const PHI_KEYS: &[&str] = &[
    "ssn",
    "social_security_number",
    "mrn",
    "medical_record_number",
    "dob",
    "date_of_birth",
    "birth_date",
    "birthdate",
    "first_name",
    "firstname",
    "last_name",
    "lastname",
    "name",
    "full_name",
    "fullname",
    "address",
    "address_line1",
    "addressline1",
    "address_line2",
    "addressline2",
    "city",
    "state",
    "zip",
    "phone",
    "phone_number",
    "phonenumber",
    "email",
    "email_address",
    "emailaddress",
    "insurance_id",
    "insuranceid",
    "insurance_number",
    "insurancenumber",
    "note",
    "notes",
    "note_draft",
    "notedraft",
    "note_signed",
    "notesigned",
    "diagnosis",
    "assessment",
    "plan",
    "medication",
    "allergy",
    "problem",
];

static VALUE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\d{3}-\d{2}-\d{4}$",        // SSN with dashes
        r"^\d{9}$",                    // bare SSN / MRN
        r"^\d{10}$",                   // NPI
        r"^(?i)[A-Z]{2}\d{7}$",        // DEA number
        r"^\d{4}-\d{4}-\d{4}-\d{4}$",  // card number
        r"^(?i)[A-Z][0-9]{8}$",        // passport
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

fn is_phi_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    PHI_KEYS.contains(&lowered.as_str())
}

fn is_phi_shaped(value: &str) -> bool {
    VALUE_PATTERNS.iter().any(|re| re.is_match(value))
}

/// Returns a sanitized copy of a detail payload. Non-object roots pass
/// through string-pattern screening only.
pub fn sanitize_details(details: &Value) -> Value {
    sanitize_value(details, 0)
}

fn sanitize_value(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String("[MAX_DEPTH]".to_string());
    }
    match value {
        Value::Object(map) => Value::Object(sanitize_map(map, depth)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| sanitize_value(item, depth + 1))
                .collect(),
        ),
        Value::String(s) if is_phi_shaped(s) => Value::String(REDACTION_MARKER.to_string()),
        other => other.clone(),
    }
}

fn sanitize_map(map: &Map<String, Value>, depth: usize) -> Map<String, Value> {
    let mut sanitized = Map::with_capacity(map.len());
    for (key, value) in map {
        if is_phi_key(key) {
            sanitized.insert(key.clone(), Value::String(REDACTION_MARKER.to_string()));
        } else {
            sanitized.insert(key.clone(), sanitize_value(value, depth + 1));
        }
    }
    sanitized
}
