//! # Explicit Lazy Loading
//!
//! Associations are never loaded behind the caller's back. A to-one
//! association is a [`Reference`] that always knows the target identity and
//! may or may not hold the loaded value; a to-many back-reference is a
//! [`Lazy`] collection that is either `NotLoaded` or `Loaded`.
//!
//! ```text
//! member.team()            → Some(Reference { id: 7, value: None })
//! repo.load_team(&mut m)   → SELECT ... FROM team WHERE team_id = 7
//! member.team()            → Some(Reference { id: 7, value: Some(Team) })
//! ```

use serde::Serialize;

use crate::entity::{Entity, EntityId};
use crate::error::{CoreError, CoreResult};

// =============================================================================
// Reference
// =============================================================================

/// A to-one association: target identity plus an optionally loaded value.
///
/// Equality compares identities only; whether the value is loaded does not
/// change which row is referenced.
#[derive(Debug, Clone, Serialize)]
pub struct Reference<T> {
    id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<T>,
}

impl<T> Reference<T> {
    /// A reference whose target has not been fetched.
    pub fn unloaded(id: EntityId) -> Self {
        Reference { id, value: None }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the loaded target, or `None` when not fetched yet.
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.value.is_some()
    }

    /// Drops the loaded value, keeping the identity.
    pub fn unload(&mut self) {
        self.value = None;
    }
}

impl<T: Entity> Reference<T> {
    /// A reference with its target already in hand.
    pub fn loaded(value: T) -> CoreResult<Self> {
        let id = value.id().ok_or(CoreError::TransientReference {
            entity: T::meta().name,
        })?;
        Ok(Reference {
            id,
            value: Some(value),
        })
    }

    /// Fills in the target; fails when `value` is a different row.
    pub fn resolve(&mut self, value: T) -> CoreResult<&T> {
        if value.id() != Some(self.id) {
            return Err(CoreError::ReferenceMismatch {
                entity: T::meta().name,
                expected: self.id,
                actual: value.id(),
            });
        }
        Ok(&*self.value.insert(value))
    }
}

impl<T> PartialEq for Reference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Reference<T> {}

// =============================================================================
// Lazy
// =============================================================================

/// A lazily materialized value. Serializes as `null` until loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Lazy<T> {
    #[default]
    NotLoaded,
    Loaded(T),
}

impl<T> Lazy<T> {
    pub fn get(&self) -> Option<&T> {
        match self {
            Lazy::Loaded(value) => Some(value),
            Lazy::NotLoaded => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Lazy::Loaded(value) => Some(value),
            Lazy::NotLoaded => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Lazy::Loaded(_))
    }
}
