//! # roster-core: Entities and Paging for Roster
//!
//! Entity types, table mappings and paging arithmetic. Nothing in this crate
//! touches a database; roster-db turns these descriptions into SQL.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Roster Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Application / seed binary                       │   │
//! │  │    db.members().find_by_age(..)   uow.save(..)   uow.commit()   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    roster-db (Persistence)                      │   │
//! │  │   query translator • repositories • unit of work • bulk ops     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ roster-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  entity   │  │   types   │  │pagination │  │ validation│  │   │
//! │  │   │ Record    │  │  Member   │  │PageRequest│  │   rules   │  │   │
//! │  │   │EntityMeta │  │   Team    │  │Page/Slice │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`entity`] - `Entity` trait, table metadata, `Record`/`Value`
//! - [`types`] - Member, Team, MemberDto
//! - [`lazy`] - Explicitly loaded associations
//! - [`pagination`] - PageRequest, Sort, Page, Slice
//! - [`error`] - Domain error types
//! - [`validation`] - Field rules
//!
//! ## Example Usage
//!
//! ```rust
//! use roster_core::{Member, Page, PageRequest};
//!
//! let member = Member::with_age("member1", 10).unwrap();
//! assert!(member.id().is_none());
//!
//! let request = PageRequest::of(0, 3).unwrap();
//! let page = Page::new(vec![member], &request, 5);
//! assert_eq!(page.total_pages(), 2);
//! assert!(page.has_next());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod entity;
pub mod error;
pub mod lazy;
pub mod pagination;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use entity::{Entity, EntityId, EntityMeta, FieldKind, FieldMeta, Record, RelationMeta, Value};
pub use error::{CoreError, CoreResult, ValidationError};
pub use lazy::{Lazy, Reference};
pub use pagination::{Direction, Order, Page, PageRequest, Slice, Sort};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum username length in characters.
pub const MAX_USERNAME_LENGTH: usize = 100;

/// Maximum team name length in characters.
pub const MAX_TEAM_NAME_LENGTH: usize = 100;

/// Largest page a caller may request.
///
/// Guards against `PageRequest::of(0, u32::MAX)` turning into an unbounded read.
pub const MAX_PAGE_SIZE: u32 = 2000;

/// Page size used when a caller does not choose one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
