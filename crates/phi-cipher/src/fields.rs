/// Record key holding the per-field encryption metadata map.
pub const METADATA_FIELD: &str = "encryption_metadata";

/// Fields treated as PHI and encrypted at rest.
///
/// Date-typed fields (dob, subscriber dob) are absent: their storage columns
/// cannot hold ciphertext strings, so they stay plaintext until the schema
/// moves them to text.
pub const PHI_FIELDS: &[&str] = &[
    "first_name",
    "last_name",
    "middle_name",
    "name_suffix",
    "preferred_name",
    "phone",
    "phone_secondary",
    "phone_cell",
    "phone_work",
    "email",
    "email_secondary",
    "address_line1",
    "address_line2",
    "city",
    "state",
    "zip",
    "country",
    "ssn",
    "social_security_number",
    "insurance_id",
    "insurance_subscriber_name",
    "emergency_contact_name",
    "emergency_contact_phone",
    "emergency_contact_address",
    "pharmacy_address",
    "pharmacy_phone",
];

/// Fields that intentionally remain plaintext for lookup and indexing.
pub const PLAINTEXT_FIELDS: &[&str] = &[
    "mrn",
    "id",
    "created_at",
    "updated_at",
    "primary_care_provider",
    "insurance_provider",
    "pharmacy_name",
    "pharmacy_npi",
];

pub fn is_phi_field(name: &str) -> bool {
    PHI_FIELDS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phi_and_plaintext_sets_are_disjoint() {
        for field in PHI_FIELDS {
            assert!(
                !PLAINTEXT_FIELDS.contains(field),
                "{field} listed as both PHI and plaintext"
            );
        }
    }

    #[test]
    fn mrn_stays_plaintext() {
        assert!(!is_phi_field("mrn"));
        assert!(is_phi_field("ssn"));
    }
}
