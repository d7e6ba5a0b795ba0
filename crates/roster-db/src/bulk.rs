//! # Bulk Updates
//!
//! Set-based `UPDATE` statements that run inside a unit of work without
//! loading rows.
//!
//! ## Staleness
//! ```text
//! uow.find::<Member>(5)                 → age 25 (now managed)
//! BulkUpdate::<Member>::new()
//!     .increment("age", 1)
//!     .filter(age >= 20)
//!     .execute(&mut uow)                → 3 rows, store holds 26
//! uow.find::<Member>(5)                 → age 25 (identity map)
//! uow.clear(); uow.find::<Member>(5)    → age 26
//! ```
//!
//! Pending writes are flushed before the statement runs.

use std::marker::PhantomData;

use roster_core::{Entity, FieldKind, Value};

use crate::error::DbResult;
use crate::query::sql::{resolve_path, JoinSet};
use crate::query::{Criteria, Params, QueryError, Statement};
use crate::unit_of_work::UnitOfWork;

/// Options of a registered modifying query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifying {
    /// Clear the identity map after the statement so later reads see the
    /// new values.
    pub clear_automatically: bool,
}

impl Modifying {
    pub fn clearing() -> Self {
        Modifying {
            clear_automatically: true,
        }
    }
}

#[derive(Debug, Clone)]
enum Assignment {
    Set { field: String, value: Value },
    Increment { field: String, delta: i64 },
}

impl Assignment {
    fn field(&self) -> &str {
        match self {
            Assignment::Set { field, .. } | Assignment::Increment { field, .. } => field,
        }
    }
}

/// A set-based update over `E`'s table.
///
/// ## Example
/// ```rust,ignore
/// let affected = BulkUpdate::<Member>::new()
///     .increment("age", 1)
///     .filter(Criteria::new().value("age", Operator::GreaterThanEqual, 20))
///     .execute(&mut uow)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct BulkUpdate<E: Entity> {
    assignments: Vec<Assignment>,
    criteria: Criteria,
    params: Params,
    modifying: Modifying,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Default for BulkUpdate<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> BulkUpdate<E> {
    pub fn new() -> Self {
        BulkUpdate {
            assignments: Vec::new(),
            criteria: Criteria::new(),
            params: Params::new(),
            modifying: Modifying::default(),
            _entity: PhantomData,
        }
    }

    /// `field = value`
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.assignments.push(Assignment::Set {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    /// `field = field + delta`
    pub fn increment(mut self, field: &str, delta: i64) -> Self {
        self.assignments.push(Assignment::Increment {
            field: field.to_string(),
            delta,
        });
        self
    }

    /// Restricts the update to rows matching `criteria`. No filter updates
    /// every row.
    pub fn filter(mut self, criteria: Criteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Values for `Operand::Param` slots in the filter.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn clear_automatically(mut self, clear: bool) -> Self {
        self.modifying.clear_automatically = clear;
        self
    }

    /// Renders `UPDATE <table> SET ... [WHERE ...]`.
    ///
    /// ## Errors
    /// `InvalidUpdate` for an empty SET list, the identity column, a joined
    /// property, or an increment on a non-integer field.
    pub fn to_statement(&self) -> Result<Statement, QueryError> {
        let meta = E::meta();
        if self.assignments.is_empty() {
            return Err(QueryError::InvalidUpdate("nothing to set".to_string()));
        }
        self.params.check(self.criteria.parameter_names())?;

        let mut out = Statement::new();
        out.push_sql(&format!("UPDATE {} SET ", meta.table));

        for (i, assignment) in self.assignments.iter().enumerate() {
            let field = assignment.field();
            let resolved = resolve_path(meta, field).ok_or_else(|| QueryError::NoProperty {
                property: field.to_string(),
                entity: meta.name.to_string(),
            })?;
            if resolved.join.is_some() {
                return Err(QueryError::InvalidUpdate(format!(
                    "'{}' belongs to a joined table",
                    field
                )));
            }
            if resolved.column == meta.id.column {
                return Err(QueryError::InvalidUpdate("the identity cannot be updated".to_string()));
            }

            if i > 0 {
                out.push_sql(", ");
            }
            match assignment {
                Assignment::Set { value, .. } => {
                    out.push_sql(&format!("{} = ", resolved.column));
                    out.push_bind(value.clone());
                }
                Assignment::Increment { delta, .. } => {
                    if resolved.kind != FieldKind::Integer {
                        return Err(QueryError::InvalidUpdate(format!(
                            "'{}' is not an integer field",
                            field
                        )));
                    }
                    out.push_sql(&format!("{} = {} + ", resolved.column, resolved.column));
                    out.push_bind(Value::Integer(*delta));
                }
            }
        }

        if !self.criteria.is_empty() {
            let mut joins = JoinSet::default();
            let mut where_clause = Statement::new();
            self.criteria
                .render(meta, &self.params, &mut joins, &mut where_clause)?;
            if !joins.is_empty() {
                return Err(QueryError::InvalidUpdate(
                    "filters cannot reach across relations".to_string(),
                ));
            }
            out.push_sql(" WHERE ");
            out.append(where_clause);
        }

        Ok(out)
    }

    /// Runs the update. Returns the number of affected rows.
    pub async fn execute(&self, uow: &mut UnitOfWork) -> DbResult<u64> {
        let statement = self.to_statement()?;
        let affected = uow.execute_bulk(&statement).await?;
        if self.modifying.clear_automatically {
            uow.clear();
        }
        Ok(affected)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::query::Operator;
    use roster_core::{Member, Team};

    fn adults() -> Criteria {
        Criteria::new().value("age", Operator::GreaterThanEqual, 20)
    }

    #[test]
    fn test_renders_increment_with_filter() {
        let statement = BulkUpdate::<Member>::new()
            .increment("age", 1)
            .filter(adults())
            .to_statement()
            .unwrap();

        assert_eq!(
            statement.sql(),
            "UPDATE member SET age = age + ? WHERE (member.age >= ?)"
        );
        assert_eq!(statement.binds(), &[Value::Integer(1), Value::Integer(20)]);
    }

    #[test]
    fn test_rejects_invalid_updates() {
        assert!(matches!(
            BulkUpdate::<Member>::new().to_statement(),
            Err(QueryError::InvalidUpdate(_))
        ));
        assert!(matches!(
            BulkUpdate::<Member>::new().set("team.name", "x").to_statement(),
            Err(QueryError::InvalidUpdate(_))
        ));
        assert!(matches!(
            BulkUpdate::<Member>::new().set("id", 3).to_statement(),
            Err(QueryError::InvalidUpdate(_))
        ));
        assert!(matches!(
            BulkUpdate::<Member>::new().increment("username", 1).to_statement(),
            Err(QueryError::InvalidUpdate(_))
        ));
        assert!(matches!(
            BulkUpdate::<Member>::new().set("nickname", "x").to_statement(),
            Err(QueryError::NoProperty { .. })
        ));
        assert!(matches!(
            BulkUpdate::<Member>::new()
                .set("age", 0)
                .filter(Criteria::new().eq("team.name", "teamA"))
                .to_statement(),
            Err(QueryError::InvalidUpdate(_))
        ));
    }

    #[test]
    fn test_param_slots_require_values() {
        let update = BulkUpdate::<Team>::new()
            .set("name", "renamed")
            .filter(Criteria::new().param("name", Operator::Equals, "name"));
        assert!(matches!(
            update.to_statement(),
            Err(QueryError::MissingParameter(_))
        ));

        let statement = update
            .with_params(Params::new().bind("name", "teamA"))
            .to_statement()
            .unwrap();
        assert_eq!(statement.sql(), "UPDATE team SET name = ? WHERE (team.name = ?)");
    }

    #[tokio::test]
    async fn test_bulk_update_leaves_managed_entities_stale() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        let mut last = None;
        for (username, age) in [("member1", 10), ("member2", 20), ("member3", 21), ("member4", 19), ("member5", 25)] {
            last = Some(uow.save(Member::with_age(username, age).unwrap()).await.unwrap());
        }
        let member5 = last.unwrap().id().unwrap();

        let affected = BulkUpdate::<Member>::new()
            .increment("age", 1)
            .filter(adults())
            .execute(&mut uow)
            .await
            .unwrap();
        assert_eq!(affected, 3);
        assert_eq!(uow.stats().bulk, 1);

        let stale: Member = uow.find(member5).await.unwrap().unwrap();
        assert_eq!(stale.age(), 25);

        uow.clear();
        let fresh: Member = uow.find(member5).await.unwrap().unwrap();
        assert_eq!(fresh.age(), 26);
    }

    #[tokio::test]
    async fn test_clear_automatically() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        let member = uow.save(Member::with_age("member1", 30).unwrap()).await.unwrap();
        BulkUpdate::<Member>::new()
            .increment("age", 5)
            .clear_automatically(true)
            .execute(&mut uow)
            .await
            .unwrap();

        assert_eq!(uow.managed_count(), 0);
        let fresh: Member = uow.find(member.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(fresh.age(), 35);
    }
}
