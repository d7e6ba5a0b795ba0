//! # Query Translator
//!
//! Turns operation names and explicit SQL into executable statements.
//!
//! ## Translation Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Query Translation                                  │
//! │                                                                         │
//! │  "findByUsernameAndAgeGreaterThan"      "SELECT m.* ... = :username"   │
//! │       │                                         │                       │
//! │       ▼ derived::parse_method_name              ▼ named::ParsedSql      │
//! │  DerivedQuery { subject, criteria, sort }   fragments + slots           │
//! │       │                                         │                       │
//! │       ▼ sql::QueryPlan::select(&params)         ▼ bind(&params)         │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  Statement { sql: "... = ? AND ... > ?", binds: [..] }      │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Both paths bind strictly by name through `Params`.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`derived`] - operation name parser
//! - [`criteria`] - predicates and operators
//! - [`named`] - `:name` placeholders and parameter binding
//! - [`sql`] - SQLite rendering

pub mod criteria;
pub mod derived;
pub mod named;
pub mod sql;

use thiserror::Error;

pub use criteria::{Criteria, Operand, Operator, Predicate};
pub use derived::{parse_method_name, DerivedQuery, Subject};
pub use named::{ParamValue, Params, ParsedSql};
pub use sql::{QueryPlan, Statement};

// =============================================================================
// Query Error
// =============================================================================

/// Translation and binding errors.
///
/// Raised while a repository is built (bad names, bad SQL) or when a query
/// is run with the wrong parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A property in an operation name or criteria does not exist.
    ///
    /// ## When This Occurs
    /// - `findByNickname` on Member
    /// - `findByUsernameAndAgeGreaterThen` (the tail of `age` is left over)
    #[error("No property '{property}' found for type '{entity}'")]
    NoProperty { property: String, entity: String },

    /// An operation name that does not follow the naming grammar.
    #[error("Invalid query method name '{name}': {reason}")]
    InvalidMethodName { name: String, reason: String },

    /// A fetch or load asked for a relation the entity does not declare.
    #[error("No relation '{relation}' on type '{entity}'")]
    UnknownRelation { relation: String, entity: String },

    /// A query was looked up by a name nobody registered.
    #[error("No query named '{0}'")]
    UnknownQuery(String),

    /// A query was run through the wrong call (e.g. a modifying query as a select).
    #[error("Query '{name}' cannot be used here: {reason}")]
    WrongQueryKind { name: String, reason: String },

    /// Explicit SQL that cannot be parsed.
    #[error("Invalid SQL: {0}")]
    InvalidSql(String),

    /// A predicate whose operands do not fit its operator.
    #[error("Invalid predicate on '{property}': {reason}")]
    InvalidPredicate { property: String, reason: String },

    /// A sort property that does not resolve to a column.
    #[error("Cannot sort by '{property}' on type '{entity}'")]
    InvalidSort { property: String, entity: String },

    /// A placeholder with no bound value.
    #[error("No value bound for parameter '{0}'")]
    MissingParameter(String),

    /// A bound value no placeholder uses.
    #[error("Parameter '{0}' is not used by the query")]
    UnexpectedParameter(String),

    /// The same name bound more than once.
    #[error("Parameter '{0}' is bound more than once")]
    DuplicateParameter(String),

    /// A bulk update that cannot be expressed.
    #[error("Invalid bulk update: {0}")]
    InvalidUpdate(String),
}
