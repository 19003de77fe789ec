use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A named bundle of privileges assignable to accounts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Platform-owned roles: renaming or deleting them is refused outright.
    pub is_system_role: bool,
    pub created_at: DateTime<Utc>,
}

/// Fine-grained permission key, `resource:action`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Privilege {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// What a protected operation demands.
#[derive(Clone, Debug)]
pub enum Requirement {
    /// One privilege key.
    Privilege(String),
    /// At least one of the listed privileges.
    AnyOf(Vec<String>),
    /// Every listed privilege.
    AllOf(Vec<String>),
    /// Principal's role must alias to one of the listed roles.
    RoleIn(Vec<String>),
    /// Admin tier (admin flag or admin-family role).
    Admin,
    /// SuperAdmin role literally; the admin flag is not enough.
    SuperAdmin,
}

impl Requirement {
    /// Audit action name for a denial of this requirement.
    pub fn denied_action(&self) -> String {
        match self {
            Requirement::Privilege(name) => format!("{name}.denied"),
            Requirement::AnyOf(names) | Requirement::AllOf(names) => names
                .first()
                .map(|name| format!("{name}.denied"))
                .unwrap_or_else(|| "privilege.denied".to_string()),
            Requirement::RoleIn(_) => "role_access.denied".to_string(),
            Requirement::Admin => "admin.access.denied".to_string(),
            Requirement::SuperAdmin => "superadmin.access.denied".to_string(),
        }
    }

    /// The `required` field of the caller-visible 403 body.
    pub fn describe(&self) -> Value {
        match self {
            Requirement::Privilege(name) => json!(name),
            Requirement::AnyOf(names) | Requirement::AllOf(names) => json!(names),
            Requirement::RoleIn(names) => json!(names),
            Requirement::Admin => json!("admin"),
            Requirement::SuperAdmin => json!("superadmin"),
        }
    }
}

/// Why an allow decision passed; the guard layer records bypasses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AllowReason {
    /// Admin flag or admin-family role short-circuited the check.
    AdminBypass,
    /// Privilege present in the principal's loaded permission set.
    Granted,
    /// Granted by the static fallback table while the store was down.
    FallbackGrant,
    /// Role requirement satisfied after alias normalization.
    RoleMatch,
}

/// Caller-visible denial: names what was missing and what the caller has,
/// and nothing else.
#[derive(Clone, Debug, Serialize)]
pub struct Denial {
    pub required: Value,
    pub current_role: Option<String>,
}

#[derive(Clone, Debug)]
pub enum Decision {
    Allow(AllowReason),
    Deny(Denial),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_action_names_the_attempted_privilege() {
        assert_eq!(
            Requirement::Privilege("patient:view".into()).denied_action(),
            "patient:view.denied"
        );
        assert_eq!(
            Requirement::RoleIn(vec!["clinician".into()]).denied_action(),
            "role_access.denied"
        );
        assert_eq!(
            Requirement::Admin.denied_action(),
            "admin.access.denied"
        );
    }
}
