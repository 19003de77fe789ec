//! Canonical seed grants and the static fallback table.
//!
//! The fallback table answers privilege checks when the store was
//! unreachable at principal resolution time. Trading strictness for
//! availability is deliberate and bounded: the table is keyed by canonical
//! role, grants less than the store does, and a role absent here is simply
//! denied. `fallback_matches_seed_grants` keeps the two representations
//! from drifting apart.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

/// Canonical role → privileges, used to seed the store at provisioning
/// time. The `(role, system)` flag marks roles the platform itself owns.
pub fn seed_grants() -> Vec<(&'static str, bool, Vec<&'static str>)> {
    vec![
        (
            "clinician",
            true,
            vec![
                "patient:view",
                "patient:create",
                "patient:edit",
                "visit:view",
                "visit:create",
                "visit:edit",
                "note:view",
                "note:create",
                "note:sign",
                "order:create",
                "prescription:create",
                "document:view",
            ],
        ),
        (
            "nurse",
            true,
            vec![
                "patient:view",
                "patient:edit",
                "visit:view",
                "visit:create",
                "note:view",
                "note:create",
                "document:view",
            ],
        ),
        (
            "front_desk",
            true,
            vec![
                "patient:view",
                "patient:create",
                "appointment:view",
                "appointment:create",
                "appointment:edit",
                "document:view",
            ],
        ),
    ]
}

static FALLBACK_GRANTS: Lazy<HashMap<&'static str, HashSet<&'static str>>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert(
        "clinician",
        HashSet::from([
            "patient:view",
            "patient:create",
            "patient:edit",
            "visit:view",
            "visit:create",
            "visit:edit",
            "note:view",
            "note:create",
            "note:sign",
            "order:create",
            "prescription:create",
            "document:view",
        ]),
    );
    table.insert(
        "nurse",
        HashSet::from([
            "patient:view",
            "patient:edit",
            "visit:view",
            "visit:create",
            "note:view",
            "note:create",
            "document:view",
        ]),
    );
    table.insert(
        "front_desk",
        HashSet::from([
            "patient:view",
            "patient:create",
            "appointment:view",
            "appointment:create",
            "appointment:edit",
            "document:view",
        ]),
    );
    table
});

/// Privileges a canonical role holds when the store is unreachable.
/// `None` for roles outside the table: deny-by-default still applies.
pub fn fallback_privileges(canonical_role: &str) -> Option<&'static HashSet<&'static str>> {
    FALLBACK_GRANTS.get(canonical_role)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Consistency check: a privilege added to the seed grants without the
    /// fallback table (or vice versa) is silent privilege drift.
    #[test]
    fn fallback_matches_seed_grants() {
        let seeds = seed_grants();
        assert_eq!(seeds.len(), FALLBACK_GRANTS.len());
        for (role, _system, privileges) in seeds {
            let fallback = fallback_privileges(role)
                .unwrap_or_else(|| panic!("role {role} missing from fallback table"));
            let seeded: HashSet<&str> = privileges.into_iter().collect();
            assert_eq!(
                &seeded, fallback,
                "fallback grants for {role} drifted from seed grants"
            );
        }
    }

    #[test]
    fn unlisted_role_gets_nothing() {
        assert!(fallback_privileges("care coordinator").is_none());
    }
}
