//! # Entity Metadata
//!
//! Describes how an entity maps onto a table, and converts entities to and
//! from flat [`Record`]s.
//!
//! ## Mapping Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Entity ⇄ Record ⇄ Row                              │
//! │                                                                         │
//! │  Member { id, username, age, team: Reference<Team> }                   │
//! │       │  to_record()                      ▲ from_record()              │
//! │       ▼                                   │                            │
//! │  Record { id: 1, username: "AAA", age: 10, team: 7 }                   │
//! │       │  (roster-db binds / reads by EntityMeta column)                │
//! │       ▼                                                                 │
//! │  member(member_id, username, age, team_id)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Records are also what the unit of work snapshots for dirty checking, so
//! `Record` equality is field-by-field value equality.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// Store-generated entity identity.
pub type EntityId = i64;

// =============================================================================
// Value
// =============================================================================

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
}

impl Value {
    /// Returns true for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(value) => write!(f, "{}", value),
            Value::Text(value) => write!(f, "'{}'", value),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Record
// =============================================================================

/// Field-name keyed values of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: BTreeMap<&'static str, Value>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    /// Sets a field, replacing any previous value.
    pub fn insert(&mut self, field: &'static str, value: impl Into<Value>) {
        self.values.insert(field, value.into());
    }

    /// Builder-style [`Record::insert`].
    pub fn with(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.values.iter().map(|(field, value)| (*field, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reads a nullable integer field.
    pub fn integer(&self, entity: &'static str, field: &'static str) -> CoreResult<Option<i64>> {
        match self.values.get(field) {
            None => Err(CoreError::MissingField { entity, field }),
            Some(Value::Null) => Ok(None),
            Some(Value::Integer(value)) => Ok(Some(*value)),
            Some(other) => Err(CoreError::InvalidField {
                entity,
                field,
                value: other.to_string(),
            }),
        }
    }

    /// Reads a non-null integer field.
    pub fn required_integer(&self, entity: &'static str, field: &'static str) -> CoreResult<i64> {
        self.integer(entity, field)?.ok_or(CoreError::InvalidField {
            entity,
            field,
            value: Value::Null.to_string(),
        })
    }

    /// Reads a non-null text field.
    pub fn required_text(&self, entity: &'static str, field: &'static str) -> CoreResult<String> {
        match self.values.get(field) {
            None => Err(CoreError::MissingField { entity, field }),
            Some(Value::Text(value)) => Ok(value.clone()),
            Some(other) => Err(CoreError::InvalidField {
                entity,
                field,
                value: other.to_string(),
            }),
        }
    }

    /// Returns the fields whose values differ from `previous`.
    ///
    /// Used by dirty checking; a field missing from `previous` counts as changed.
    pub fn changed_fields(&self, previous: &Record) -> Vec<&'static str> {
        self.values
            .iter()
            .filter(|(field, value)| previous.values.get(*field) != Some(*value))
            .map(|(field, _)| *field)
            .collect()
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// Storage kind of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Text,
    /// Foreign key of an owning relation (stored as an integer).
    Reference,
}

/// One mapped field: entity-side name and table column.
#[derive(Debug)]
pub struct FieldMeta {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

/// An owning to-one relation (`Member.team → Team`).
#[derive(Debug)]
pub struct RelationMeta {
    /// Relation name, also the name of the foreign-key field in the record.
    pub name: &'static str,
    /// Foreign-key column on the owning table.
    pub column: &'static str,
    pub target: &'static EntityMeta,
}

/// Table mapping of an entity type.
#[derive(Debug)]
pub struct EntityMeta {
    /// Entity name used in messages and named queries (`Member`).
    pub name: &'static str,
    pub table: &'static str,
    pub id: FieldMeta,
    /// Persistent fields excluding the identity.
    pub fields: &'static [FieldMeta],
    pub relations: &'static [RelationMeta],
}

impl EntityMeta {
    /// Looks up a field by entity-side name, including the identity.
    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        if self.id.name == name {
            return Some(&self.id);
        }
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationMeta> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    /// Identity followed by every persistent field.
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldMeta> {
        std::iter::once(&self.id).chain(self.fields.iter())
    }
}

// =============================================================================
// Entity Trait
// =============================================================================

/// A persistent type managed by the repository layer.
///
/// `from_record` is the only way to obtain an entity carrying a store
/// identity; application code goes through the entity's own constructors.
pub trait Entity: Clone + Send + Sync + 'static {
    fn meta() -> &'static EntityMeta;

    /// `None` until the entity has been saved.
    fn id(&self) -> Option<EntityId>;

    /// Flattens the entity. Includes the `id` field only when assigned.
    fn to_record(&self) -> Record;

    /// Rebuilds an entity from a record that includes its identity.
    fn from_record(record: &Record) -> CoreResult<Self>;

    /// Attaches an eagerly fetched relation target.
    fn attach(&mut self, relation: &str, _target: &Record) -> CoreResult<()> {
        Err(CoreError::UnknownRelation {
            entity: Self::meta().name,
            relation: relation.to_string(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(10), Value::Integer(10));
        assert_eq!(Value::from(10u32), Value::Integer(10));
        assert_eq!(Value::from("AAA"), Value::Text("AAA".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(3i64)), Value::Integer(3));
    }

    #[test]
    fn test_record_accessors() {
        let record = Record::new()
            .with("id", 1i64)
            .with("username", "AAA")
            .with("team", None::<i64>);

        assert_eq!(record.required_integer("Member", "id").unwrap(), 1);
        assert_eq!(record.required_text("Member", "username").unwrap(), "AAA");
        assert_eq!(record.integer("Member", "team").unwrap(), None);
        assert!(matches!(
            record.required_text("Member", "age"),
            Err(CoreError::MissingField { field: "age", .. })
        ));
        assert!(matches!(
            record.required_integer("Member", "username"),
            Err(CoreError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_changed_fields() {
        let before = Record::new().with("username", "AAA").with("age", 10i64);
        let after = Record::new().with("username", "AAA").with("age", 11i64);

        assert_eq!(after.changed_fields(&before), vec!["age"]);
        assert!(before.changed_fields(&before).is_empty());
    }

    #[test]
    fn test_attach_without_relations_is_rejected() {
        let mut team = crate::types::Team::new("teamA").unwrap();
        let err = team.attach("members", &Record::new()).unwrap_err();

        assert!(matches!(
            err,
            CoreError::UnknownRelation { entity: "Team", ref relation } if relation == "members"
        ));
    }
}
