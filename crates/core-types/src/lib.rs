#![allow(dead_code)]

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type for cross-crate boundaries in the access layer.
#[derive(Debug, Error, Clone)]
pub enum PlatformError {
    #[error("{message}")]
    Message { message: String },
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the entity an action was performed against.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TargetId(pub String);

impl TargetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Final outcome of a guarded operation as seen by the audit trail.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn from_http_status(status: u16) -> Self {
        if status < 400 {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

/// Immutable per-request context threaded explicitly through every call.
///
/// Replaces ambient attachment of principal/tenant data to a shared request
/// object: the context is built once at the edge and passed by reference.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub tenant: Option<TenantId>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: RequestId,
    pub path: String,
    pub method: String,
}

impl RequestContext {
    pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            tenant: None,
            ip: None,
            user_agent: None,
            request_id: RequestId::new(),
            path: path.into(),
            method: method.into(),
        }
    }

    pub fn with_tenant(mut self, tenant: TenantId) -> Self {
        self.tenant = Some(tenant);
        self
    }

    pub fn with_peer(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.ip = ip;
        self.user_agent = user_agent;
        self
    }
}

/// Strict admin flag, normalized exactly once at the storage boundary.
///
/// Upstream systems have recorded this flag as a boolean, the strings
/// "true"/"t"/"1", or the integer 1. Whatever the physical encoding, it is
/// parsed here and nowhere else; downstream checks only ever see a bool.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AdminFlag(bool);

impl AdminFlag {
    pub fn granted(self) -> bool {
        self.0
    }

    pub fn from_encoding(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        Self(matches!(normalized.as_str(), "true" | "t" | "1"))
    }
}

impl From<bool> for AdminFlag {
    fn from(value: bool) -> Self {
        Self(value)
    }
}

#[cfg(feature = "serde-full")]
impl AdminFlag {
    /// Boundary parser for heterogeneous stored encodings.
    pub fn from_raw(raw: &serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Bool(b) => Self(*b),
            serde_json::Value::String(s) => Self::from_encoding(s),
            serde_json::Value::Number(n) => Self(n.as_i64() == Some(1)),
            _ => Self(false),
        }
    }
}

#[cfg(feature = "serde-full")]
impl serde::Serialize for AdminFlag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.0)
    }
}

#[cfg(feature = "serde-full")]
impl<'de> serde::Deserialize<'de> for AdminFlag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_raw(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_flag_accepts_heterogeneous_encodings() {
        assert!(AdminFlag::from(true).granted());
        assert!(AdminFlag::from_encoding("true").granted());
        assert!(AdminFlag::from_encoding("T").granted());
        assert!(AdminFlag::from_encoding("1").granted());
        assert!(!AdminFlag::from_encoding("false").granted());
        assert!(!AdminFlag::from_encoding("yes").granted());
        assert!(!AdminFlag::from_encoding("").granted());
    }

    #[cfg(feature = "serde-full")]
    #[test]
    fn admin_flag_parses_json_values() {
        use serde_json::json;
        assert!(AdminFlag::from_raw(&json!(true)).granted());
        assert!(AdminFlag::from_raw(&json!("t")).granted());
        assert!(AdminFlag::from_raw(&json!(1)).granted());
        assert!(!AdminFlag::from_raw(&json!(0)).granted());
        assert!(!AdminFlag::from_raw(&json!(null)).granted());
    }

    #[test]
    fn outcome_tracks_http_status() {
        assert_eq!(Outcome::from_http_status(200), Outcome::Success);
        assert_eq!(Outcome::from_http_status(399), Outcome::Success);
        assert_eq!(Outcome::from_http_status(403), Outcome::Failure);
        assert_eq!(Outcome::from_http_status(500), Outcome::Failure);
    }
}
