//! # Error Types
//!
//! Domain-specific error types for roster-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  roster-core errors (this file)                                        │
//! │  ├── CoreError        - Entity invariants and record mapping           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  roster-db errors (separate crate)                                     │
//! │  ├── QueryError       - Query translation and parameter binding        │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (entity, field, id)
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::entity::EntityId;

// =============================================================================
// Core Error
// =============================================================================

/// Entity model errors.
///
/// These errors represent broken entity invariants or records that cannot
/// be turned back into entities.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An association was requested with an entity that has no identity yet.
    ///
    /// ## When This Occurs
    /// - `member.change_team(&mut team)` before the team was saved
    #[error("{entity} must be saved before it can be referenced")]
    TransientReference { entity: &'static str },

    /// A lazy reference was resolved with a value carrying another identity.
    #[error("Reference to {entity} {expected} cannot be resolved with id {actual:?}")]
    ReferenceMismatch {
        entity: &'static str,
        expected: EntityId,
        actual: Option<EntityId>,
    },

    /// A relation name that the entity does not declare.
    #[error("{entity} has no relation named '{relation}'")]
    UnknownRelation {
        entity: &'static str,
        relation: String,
    },

    /// A record handed to `from_record` lacks a field.
    #[error("Field '{field}' of {entity} is missing from the record")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    /// A record field holds a value of the wrong kind.
    #[error("Field '{field}' of {entity} has unexpected value {value}")]
    InvalidField {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by entity constructors and intention-revealing mutators before any
/// state changes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::TransientReference { entity: "Team" };
        assert_eq!(
            err.to_string(),
            "Team must be saved before it can be referenced"
        );

        let err = CoreError::MissingField {
            entity: "Member",
            field: "username",
        };
        assert_eq!(
            err.to_string(),
            "Field 'username' of Member is missing from the record"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "username".to_string(),
        };
        assert_eq!(err.to_string(), "username is required");

        let err = ValidationError::OutOfRange {
            field: "age".to_string(),
            min: 0,
            max: 10,
        };
        assert_eq!(err.to_string(), "age must be between 0 and 10");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
