//! Role-name normalization.
//!
//! Clinics name roles freely ("Physician", "MD", "Nurse Practitioner"); all
//! comparisons happen on the canonical form, case-insensitively. The alias
//! table is fixed — adding a clinic-specific alias is a code change, not a
//! data change, so the authorization surface stays reviewable.

/// Resolves a role name to its canonical form. Unknown names pass through
/// lower-cased so exotic custom roles still compare consistently.
pub fn canonical_role(name: &str) -> String {
    let normalized = name.trim().to_lowercase();
    match normalized.as_str() {
        "clinician" | "physician" | "doctor" | "md" | "nurse practitioner" | "np"
        | "physician assistant" | "pa" => "clinician".to_string(),
        "nurse" | "medical assistant" | "ma" => "nurse".to_string(),
        "front desk" | "front_desk" | "receptionist" | "billing" => "front_desk".to_string(),
        "admin" | "administrator" | "superadmin" | "super admin" => "admin".to_string(),
        _ => normalized,
    }
}

/// SuperAdmin is checked literally (not through the alias table): the
/// super-admin tier must never be reachable by renaming a role.
pub fn is_super_admin_role(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("superadmin")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clinician_aliases_resolve_case_insensitively() {
        for name in [
            "physician",
            "Doctor",
            "MD",
            "Nurse Practitioner",
            "np",
            "PA",
            "Physician Assistant",
        ] {
            assert_eq!(canonical_role(name), "clinician", "alias {name}");
        }
    }

    #[test]
    fn admin_family_collapses_but_super_admin_stays_distinct() {
        assert_eq!(canonical_role("SuperAdmin"), "admin");
        assert!(is_super_admin_role("SuperAdmin"));
        assert!(is_super_admin_role("superadmin"));
        assert!(!is_super_admin_role("Admin"));
    }

    #[test]
    fn unknown_roles_pass_through_lower_cased() {
        assert_eq!(canonical_role("Care Coordinator"), "care coordinator");
    }
}
