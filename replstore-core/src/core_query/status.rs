/*
    status.rs - Query status enumeration and its host-visible tagged form

    A query either succeeded or failed. The embedding environment sees the
    status as an enumerant of the `Store::QueryStatus` type, which is looked up
    in the process-wide type registry the first time a status is produced and
    memoized for the lifetime of the process.
*/

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Qualified name of the status enum type in the host registry
pub const QUERY_STATUS_TYPE: &str = "Store::QueryStatus";

const SUCCESS_NAME: &str = "SUCCESS";
const FAILURE_NAME: &str = "FAILURE";

/// Outcome of a store query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    Success,
    Failure,
}

impl QueryStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryStatus::Success)
    }

    /// Host-visible enumerant for this status.
    ///
    /// Both enumerants are resolved together on first use; every later call
    /// returns the same `&'static` value.
    pub fn enum_value(&self) -> &'static EnumValue {
        resolved_statuses().pick(self.is_success()).1
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Success => SUCCESS_NAME,
            QueryStatus::Failure => FAILURE_NAME,
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a status from a success flag.
///
/// Resolves the host enumerants on first use, so a registry missing the
/// status type fails here rather than when the status is first shown.
pub fn status(success: bool) -> QueryStatus {
    resolved_statuses().pick(success).0
}

/// An enumerant as the host environment sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub type_name: &'static str,
    pub name: &'static str,
    pub ordinal: u32,
}

/// An enum type registered with the host
#[derive(Debug, Clone)]
pub struct EnumType {
    name: &'static str,
    enumerants: Vec<(&'static str, u32)>,
}

impl EnumType {
    pub fn new(name: &'static str, enumerants: Vec<(&'static str, u32)>) -> Self {
        Self { name, enumerants }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Look up an enumerant by name
    pub fn lookup(&self, enumerant: &str) -> Option<EnumValue> {
        self.enumerants
            .iter()
            .find(|(name, _)| *name == enumerant)
            .map(|&(name, ordinal)| EnumValue { type_name: self.name, name, ordinal })
    }
}

/// Registry of host-visible types
#[derive(Debug, Default)]
pub struct TypeRegistry {
    enums: HashMap<&'static str, EnumType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the types this crate exposes
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_enum(EnumType::new(
            QUERY_STATUS_TYPE,
            vec![(SUCCESS_NAME, 0), (FAILURE_NAME, 1)],
        ));
        registry
    }

    pub fn register_enum(&mut self, ty: EnumType) {
        self.enums.insert(ty.name(), ty);
    }

    pub fn lookup_enum(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }
}

/// Process-wide host type registry
pub fn type_registry() -> &'static TypeRegistry {
    static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(TypeRegistry::builtin)
}

struct ResolvedStatuses {
    success: EnumValue,
    failure: EnumValue,
}

impl ResolvedStatuses {
    fn pick(&self, success: bool) -> (QueryStatus, &EnumValue) {
        if success {
            (QueryStatus::Success, &self.success)
        } else {
            (QueryStatus::Failure, &self.failure)
        }
    }
}

fn resolved_statuses() -> &'static ResolvedStatuses {
    static RESOLVED: OnceLock<ResolvedStatuses> = OnceLock::new();
    RESOLVED.get_or_init(|| resolve_statuses(type_registry()))
}

// A registry without the status type is a broken embedding, not a runtime condition.
fn resolve_statuses(registry: &TypeRegistry) -> ResolvedStatuses {
    let ty = registry
        .lookup_enum(QUERY_STATUS_TYPE)
        .unwrap_or_else(|| panic!("host type registry has no `{}` type", QUERY_STATUS_TYPE));
    let lookup = |name: &str| {
        ty.lookup(name)
            .unwrap_or_else(|| panic!("`{}` has no enumerant `{}`", QUERY_STATUS_TYPE, name))
    };

    ResolvedStatuses { success: lookup(SUCCESS_NAME), failure: lookup(FAILURE_NAME) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_flag() {
        assert_eq!(status(true), QueryStatus::Success);
        assert_eq!(status(false), QueryStatus::Failure);
        assert_ne!(status(true), status(false));
    }

    #[test]
    fn test_enum_values_are_memoized() {
        let first = status(true).enum_value();
        let second = status(true).enum_value();
        assert!(std::ptr::eq(first, second));

        let failure = status(false).enum_value();
        assert!(std::ptr::eq(failure, status(false).enum_value()));
        assert!(!std::ptr::eq(first, failure));
    }

    #[test]
    fn test_status_and_enum_value_come_from_same_table() {
        let resolved = resolved_statuses();
        for flag in [true, false] {
            let (expected, value) = resolved.pick(flag);
            assert_eq!(status(flag), expected);
            assert!(std::ptr::eq(status(flag).enum_value(), value));
        }
    }

    #[test]
    fn test_enum_values_match_registry() {
        let success = QueryStatus::Success.enum_value();
        assert_eq!(success.type_name, QUERY_STATUS_TYPE);
        assert_eq!(success.name, "SUCCESS");
        assert_eq!(success.ordinal, 0);

        let failure = QueryStatus::Failure.enum_value();
        assert_eq!(failure.name, "FAILURE");
        assert_eq!(failure.ordinal, 1);
    }

    #[test]
    #[should_panic(expected = "has no `Store::QueryStatus` type")]
    fn test_missing_registry_entry_is_fatal() {
        resolve_statuses(&TypeRegistry::new());
    }

    #[test]
    #[should_panic(expected = "has no enumerant `FAILURE`")]
    fn test_missing_enumerant_is_fatal() {
        let mut registry = TypeRegistry::new();
        registry.register_enum(EnumType::new(QUERY_STATUS_TYPE, vec![("SUCCESS", 0)]));
        resolve_statuses(&registry);
    }

    #[test]
    fn test_status_display_and_serde() {
        assert_eq!(QueryStatus::Success.to_string(), "SUCCESS");
        assert_eq!(serde_json::to_string(&QueryStatus::Failure).unwrap(), "\"FAILURE\"");
    }
}
