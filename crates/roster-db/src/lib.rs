//! # roster-db: Repository Layer for Roster
//!
//! Derived and explicit queries, paging, bulk updates and a unit of work
//! over SQLite, for the entities of `roster-core`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Roster Data Flow                                 │
//! │                                                                         │
//! │  Application code (seed binary, tests)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    roster-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌───────────────┐   │   │
//! │  │   │ Repositories  │──►│    query      │   │  Migrations   │   │   │
//! │  │   │ Member, Team  │   │ derived/named │   │  (embedded)   │   │   │
//! │  │   │ Repository<E> │   │ sql, criteria │   │               │   │   │
//! │  │   └───────┬───────┘   └───────────────┘   └───────────────┘   │   │
//! │  │           ▼                                                     │   │
//! │  │   ┌───────────────┐   ┌───────────────┐                       │   │
//! │  │   │  UnitOfWork   │◄──│  BulkUpdate   │                       │   │
//! │  │   │ identity map  │   │               │                       │   │
//! │  │   └───────┬───────┘   └───────────────┘                       │   │
//! │  │           ▼                                                     │   │
//! │  │   ┌───────────────┐                                            │   │
//! │  │   │   Database    │  SqlitePool                                │   │
//! │  │   └───────────────┘                                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (file in WAL mode, or :memory:)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and repository access
//! - [`unit_of_work`] - Transaction, identity map, flush
//! - [`repository`] - Generic and typed repositories
//! - [`query`] - Derived-name parser, named parameters, SQL rendering
//! - [`bulk`] - Set-based updates
//! - [`config`] - TOML and environment configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roster_core::{Member, PageRequest};
//! use roster_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("roster.db")).await?;
//! let mut uow = db.begin().await?;
//!
//! db.members().save(&mut uow, Member::with_age("member1", 10)?).await?;
//! let page = db.members().find_by_age(&mut uow, 10, &PageRequest::of(0, 3)?).await?;
//!
//! uow.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod bulk;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod query;
pub mod repository;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use bulk::{BulkUpdate, Modifying};
pub use config::RosterConfig;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use query::{Criteria, Operator, Params, QueryError};
pub use repository::{MemberRepository, QueryDefinition, Repository, RepositoryBuilder, TeamRepository};
pub use unit_of_work::{FlushMode, StatementStats, UnitOfWork};
