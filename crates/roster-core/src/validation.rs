//! # Validation Module
//!
//! Input validation used by entity constructors and mutators.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Entity API (THIS MODULE)                                     │
//! │  ├── Member::new / change_username / change_age                        │
//! │  └── Team::new / rename                                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Record mapping (Entity::from_record)                         │
//! │  └── Rejects persisted rows that break the same rules                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── CHECK (age >= 0)                                                  │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_PAGE_SIZE, MAX_TEAM_NAME_LENGTH, MAX_USERNAME_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a member username.
///
/// ## Rules
/// - Must not be blank
/// - At most [`MAX_USERNAME_LENGTH`] characters
///
/// ## Example
/// ```rust
/// use roster_core::validation::validate_username;
///
/// assert!(validate_username("member1").is_ok());
/// assert!(validate_username("  ").is_err());
/// ```
pub fn validate_username(username: &str) -> ValidationResult<()> {
    validate_required_text("username", username, MAX_USERNAME_LENGTH)
}

/// Validates a team name. Same rules as usernames.
pub fn validate_team_name(name: &str) -> ValidationResult<()> {
    validate_required_text("name", name, MAX_TEAM_NAME_LENGTH)
}

fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an age read from storage and narrows it to `u32`.
///
/// Ages in the entity API are already `u32`; this covers values coming back
/// from the database as `i64`.
pub fn validate_age(age: i64) -> ValidationResult<u32> {
    u32::try_from(age).map_err(|_| ValidationError::OutOfRange {
        field: "age".to_string(),
        min: 0,
        max: i64::from(u32::MAX),
    })
}

/// Validates a requested page size.
///
/// ## Rules
/// - Must be at least 1
/// - At most [`MAX_PAGE_SIZE`]
pub fn validate_page_size(size: u32) -> ValidationResult<()> {
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "size".to_string(),
            min: 1,
            max: i64::from(MAX_PAGE_SIZE),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("member1").is_ok());
        assert!(validate_username("AAA").is_ok());

        assert_eq!(
            validate_username(""),
            Err(ValidationError::Required {
                field: "username".to_string()
            })
        );
        assert!(validate_username("   ").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_team_name() {
        assert!(validate_team_name("teamA").is_ok());
        assert!(validate_team_name("").is_err());
    }

    #[test]
    fn test_validate_age() {
        assert_eq!(validate_age(0), Ok(0));
        assert_eq!(validate_age(25), Ok(25));
        assert!(validate_age(-1).is_err());
        assert!(validate_age(i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn test_validate_page_size() {
        assert!(validate_page_size(1).is_ok());
        assert!(validate_page_size(MAX_PAGE_SIZE).is_ok());
        assert!(validate_page_size(0).is_err());
        assert!(validate_page_size(MAX_PAGE_SIZE + 1).is_err());
    }
}
