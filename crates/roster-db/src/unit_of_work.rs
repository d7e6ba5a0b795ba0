//! # Unit of Work
//!
//! One SQLite transaction plus an identity map of the entities it manages.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Unit of Work                                     │
//! │                                                                         │
//! │  db.begin() ──► BEGIN                                                  │
//! │       │                                                                 │
//! │       ├── save(new)       INSERT ... RETURNING id   (immediately)      │
//! │       ├── save(managed)   current record replaced   (dirty)            │
//! │       ├── remove(e)       marked removed            (queued)           │
//! │       ├── find / query    identity map first, then SELECT              │
//! │       │                   (FlushMode::Auto flushes before querying)    │
//! │       ├── bulk update     flush, then UPDATE ... WHERE ...             │
//! │       │                   (identity map NOT refreshed: stale)          │
//! │       ├── clear()         identity map emptied                         │
//! │       │                                                                 │
//! │       ├── commit()  ──► flush ──► COMMIT                               │
//! │       └── rollback() / drop ──► ROLLBACK                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity Map
//! Keyed by `(table, id)`. Each entry keeps the record as last read or
//! written (`snapshot`) and the record as the application wants it
//! (`current`). Flushing writes `UPDATE`s for the fields that differ, then
//! `DELETE`s for removed entries.
//!
//! A row that is already managed is always served from the map, even when a
//! query reads a newer version from the store. After a bulk update call
//! [`UnitOfWork::clear`] (or use `Modifying { clear_automatically: true }`)
//! to see the new values.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use roster_core::{CoreError, Entity, EntityId, EntityMeta, FieldKind, Record, RelationMeta, Value};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::query::sql::{fetched_column, select_by_id};
use crate::query::{Params, ParsedSql, Statement};

// =============================================================================
// Flush Mode
// =============================================================================

/// When pending updates and deletes are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Before every query and on commit.
    #[default]
    Auto,
    /// Only on commit, explicit `flush()`, or a bulk update.
    Commit,
}

impl fmt::Display for FlushMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushMode::Auto => write!(f, "auto"),
            FlushMode::Commit => write!(f, "commit"),
        }
    }
}

impl FromStr for FlushMode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(FlushMode::Auto),
            "commit" => Ok(FlushMode::Commit),
            other => Err(DbError::Config(format!(
                "Unknown flush mode: '{}'. Valid options: auto, commit",
                other
            ))),
        }
    }
}

// =============================================================================
// Statement Statistics
// =============================================================================

/// Statements executed by one unit of work, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatementStats {
    pub selects: u64,
    pub counts: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub bulk: u64,
}

impl StatementStats {
    pub fn total(&self) -> u64 {
        self.selects + self.counts + self.inserts + self.updates + self.deletes + self.bulk
    }
}

// =============================================================================
// Unit of Work
// =============================================================================

type EntityKey = (&'static str, EntityId);

struct Managed {
    meta: &'static EntityMeta,
    current: Record,
    snapshot: Record,
    removed: bool,
}

impl Managed {
    fn is_dirty(&self) -> bool {
        self.removed || self.current != self.snapshot
    }
}

/// A transaction with an identity map. Obtain one from `Database::begin`.
pub struct UnitOfWork {
    id: Uuid,
    tx: Transaction<'static, Sqlite>,
    flush_mode: FlushMode,
    managed: BTreeMap<EntityKey, Managed>,
    stats: StatementStats,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("flush_mode", &self.flush_mode)
            .field("managed", &self.managed.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl UnitOfWork {
    pub(crate) async fn begin(pool: &SqlitePool, flush_mode: FlushMode) -> DbResult<Self> {
        let tx = pool.begin().await?;
        let id = Uuid::new_v4();
        debug!(uow = %id, %flush_mode, "Unit of work started");

        Ok(UnitOfWork {
            id,
            tx,
            flush_mode,
            managed: BTreeMap::new(),
            stats: StatementStats::default(),
        })
    }

    /// Correlation id used in log events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    pub fn set_flush_mode(&mut self, flush_mode: FlushMode) {
        self.flush_mode = flush_mode;
    }

    pub fn stats(&self) -> StatementStats {
        self.stats
    }

    /// Whether `(E, id)` is in the identity map.
    pub fn is_managed<E: Entity>(&self, id: EntityId) -> bool {
        self.managed.contains_key(&(E::meta().table, id))
    }

    /// Number of managed entities.
    pub fn managed_count(&self) -> usize {
        self.managed.len()
    }

    /// Whether a flush would write anything.
    pub fn has_pending_changes(&self) -> bool {
        self.managed.values().any(Managed::is_dirty)
    }

    // =========================================================================
    // Entity Operations
    // =========================================================================

    /// Persists a new entity or merges a changed one.
    ///
    /// ## Behavior
    /// - No id: `INSERT` runs now; the returned copy carries the generated id
    ///   and comes back with its associations unloaded.
    /// - Managed id: the entity replaces the managed state; the `UPDATE` is
    ///   written on flush.
    /// - Unmanaged id: the stored row becomes the snapshot and the entity the
    ///   current state. `NotFound` if the row is gone.
    pub async fn save<E: Entity>(&mut self, entity: E) -> DbResult<E> {
        let meta = E::meta();

        let Some(id) = entity.id() else {
            let id = self.insert(meta, &entity.to_record()).await?;
            let mut record = entity.to_record();
            record.insert(meta.id.name, id);
            let saved = E::from_record(&record)?;
            self.managed.insert(
                (meta.table, id),
                Managed {
                    meta,
                    current: record.clone(),
                    snapshot: record,
                    removed: false,
                },
            );
            return Ok(saved);
        };

        let record = entity.to_record();
        if let Some(managed) = self.managed.get_mut(&(meta.table, id)) {
            managed.current = record;
            managed.removed = false;
            return Ok(entity);
        }

        let snapshot = self
            .load_record(meta, id)
            .await?
            .ok_or_else(|| DbError::not_found(meta.name, id))?;
        self.managed.insert(
            (meta.table, id),
            Managed {
                meta,
                current: record,
                snapshot,
                removed: false,
            },
        );
        Ok(entity)
    }

    /// Looks up an entity by id, serving managed entities without SQL.
    pub async fn find<E: Entity>(&mut self, id: EntityId) -> DbResult<Option<E>> {
        let meta = E::meta();
        if let Some(managed) = self.managed.get(&(meta.table, id)) {
            if managed.removed {
                return Ok(None);
            }
            return Ok(Some(E::from_record(&managed.current)?));
        }

        match self.load_record(meta, id).await? {
            Some(record) => {
                let record = self.manage(meta, record)?;
                Ok(Some(E::from_record(&record)?))
            }
            None => Ok(None),
        }
    }

    /// Schedules `entity` for deletion at the next flush.
    pub async fn remove<E: Entity>(&mut self, entity: &E) -> DbResult<()> {
        let meta = E::meta();
        let id = entity
            .id()
            .ok_or(CoreError::TransientReference { entity: meta.name })?;
        self.remove_by_id(meta, id).await
    }

    pub(crate) async fn remove_by_id(&mut self, meta: &'static EntityMeta, id: EntityId) -> DbResult<()> {
        if let Some(managed) = self.managed.get_mut(&(meta.table, id)) {
            managed.removed = true;
            return Ok(());
        }

        let record = self
            .load_record(meta, id)
            .await?
            .ok_or_else(|| DbError::not_found(meta.name, id))?;
        self.managed.insert(
            (meta.table, id),
            Managed {
                meta,
                current: record.clone(),
                snapshot: record,
                removed: true,
            },
        );
        Ok(())
    }

    // =========================================================================
    // Flush / Clear / Commit
    // =========================================================================

    /// Writes pending updates, then pending deletes.
    pub async fn flush(&mut self) -> DbResult<()> {
        let mut updates = Vec::new();
        let mut deletes = Vec::new();

        for (key, managed) in &self.managed {
            if managed.removed {
                deletes.push((*key, managed.meta));
                continue;
            }
            let changed = managed.current.changed_fields(&managed.snapshot);
            if changed.is_empty() {
                continue;
            }
            let mut assignments = Vec::with_capacity(changed.len());
            for field in changed {
                if field == managed.meta.id.name {
                    continue;
                }
                let column = managed
                    .meta
                    .field(field)
                    .map(|meta| meta.column)
                    .ok_or_else(|| DbError::Internal(format!("unmapped field '{}'", field)))?;
                let value = managed.current.get(field).cloned().unwrap_or(Value::Null);
                assignments.push((column, value));
            }
            updates.push((*key, managed.meta, assignments));
        }

        if updates.is_empty() && deletes.is_empty() {
            return Ok(());
        }

        for ((table, id), meta, assignments) in updates {
            let mut statement = Statement::new();
            statement.push_sql(&format!("UPDATE {} SET ", table));
            for (i, (column, value)) in assignments.into_iter().enumerate() {
                if i > 0 {
                    statement.push_sql(", ");
                }
                statement.push_sql(&format!("{} = ", column));
                statement.push_bind(value);
            }
            statement.push_sql(&format!(" WHERE {} = ", meta.id.column));
            statement.push_bind(Value::Integer(id));

            debug!(uow = %self.id, sql = statement.sql(), "flush update");
            let result = statement.query().execute(&mut *self.tx).await?;
            self.stats.updates += 1;
            if result.rows_affected() == 0 {
                return Err(DbError::not_found(meta.name, id));
            }

            if let Some(managed) = self.managed.get_mut(&(table, id)) {
                managed.snapshot = managed.current.clone();
            }
        }

        for ((table, id), meta) in deletes {
            let mut statement = Statement::new();
            statement.push_sql(&format!("DELETE FROM {} WHERE {} = ", table, meta.id.column));
            statement.push_bind(Value::Integer(id));

            debug!(uow = %self.id, sql = statement.sql(), "flush delete");
            let result = statement.query().execute(&mut *self.tx).await?;
            self.stats.deletes += 1;
            self.managed.remove(&(table, id));
            if result.rows_affected() == 0 {
                return Err(DbError::not_found(meta.name, id));
            }
        }

        debug!(uow = %self.id, managed = self.managed.len(), "Flushed");
        Ok(())
    }

    /// Empties the identity map. Unflushed changes are discarded.
    pub fn clear(&mut self) {
        let discarded = self.managed.values().filter(|managed| managed.is_dirty()).count();
        if discarded > 0 {
            warn!(uow = %self.id, discarded, "Clearing unit of work with unflushed changes");
        }
        debug!(uow = %self.id, managed = self.managed.len(), "Identity map cleared");
        self.managed.clear();
    }

    /// Flushes and commits.
    pub async fn commit(mut self) -> DbResult<()> {
        self.flush().await?;
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        info!(uow = %self.id, stats = ?self.stats, "Unit of work committed");
        Ok(())
    }

    /// Discards everything. Dropping without commit does the same.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        info!(uow = %self.id, "Unit of work rolled back");
        Ok(())
    }

    // =========================================================================
    // Native SQL
    // =========================================================================

    /// Runs explicit SQL returning one column per row.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let ages: Vec<i64> = uow
    ///     .query_scalars("SELECT age FROM member WHERE username = :username",
    ///                    &Params::new().bind("username", "member5"))
    ///     .await?;
    /// ```
    pub async fn query_scalars<T>(&mut self, sql: &str, params: &Params) -> DbResult<Vec<T>>
    where
        T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite> + Send + Unpin,
    {
        let statement = ParsedSql::parse(sql)?.bind(params)?;
        self.select_scalars(&statement).await
    }

    /// Runs explicit modifying SQL as a bulk statement. Returns affected rows.
    pub async fn execute(&mut self, sql: &str, params: &Params) -> DbResult<u64> {
        let statement = ParsedSql::parse(sql)?.bind(params)?;
        self.execute_bulk(&statement).await
    }

    // =========================================================================
    // Crate-Internal Execution
    // =========================================================================

    async fn before_query(&mut self) -> DbResult<()> {
        if self.flush_mode == FlushMode::Auto {
            self.flush().await?;
        }
        Ok(())
    }

    /// Runs a select and hydrates `E`, attaching fetch-joined relations.
    pub(crate) async fn select_entities<E: Entity>(
        &mut self,
        statement: &Statement,
        fetch: &[&'static RelationMeta],
    ) -> DbResult<Vec<E>> {
        self.before_query().await?;
        debug!(uow = %self.id, sql = statement.sql(), binds = statement.binds().len(), "select");

        let rows = statement.query().fetch_all(&mut *self.tx).await?;
        self.stats.selects += 1;

        let meta = E::meta();
        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = self.manage(meta, read_record(row, meta, None)?)?;
            let mut entity = E::from_record(&record)?;

            for relation in fetch {
                let target = read_record(row, relation.target, Some(relation.name))?;
                let Some(target_id) = target.get(relation.target.id.name).and_then(Value::as_integer) else {
                    continue;
                };
                // The managed owner may point elsewhere until its change is flushed.
                if record.get(relation.name).and_then(Value::as_integer) != Some(target_id) {
                    continue;
                }
                let target = self.manage(relation.target, target)?;
                entity.attach(relation.name, &target)?;
            }
            entities.push(entity);
        }

        debug!(uow = %self.id, rows = entities.len(), "select returned");
        Ok(entities)
    }

    pub(crate) async fn select_scalars<T>(&mut self, statement: &Statement) -> DbResult<Vec<T>>
    where
        T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite> + Send + Unpin,
    {
        self.before_query().await?;
        debug!(uow = %self.id, sql = statement.sql(), "select scalars");

        let rows = statement.query().fetch_all(&mut *self.tx).await?;
        self.stats.selects += 1;
        rows.iter()
            .map(|row| row.try_get::<T, _>(0).map_err(DbError::from))
            .collect()
    }

    pub(crate) async fn select_projections<T>(&mut self, statement: &Statement) -> DbResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
    {
        self.before_query().await?;
        debug!(uow = %self.id, sql = statement.sql(), "select projections");

        let rows = statement.query().fetch_all(&mut *self.tx).await?;
        self.stats.selects += 1;
        rows.iter()
            .map(|row| T::from_row(row).map_err(DbError::from))
            .collect()
    }

    pub(crate) async fn select_count(&mut self, statement: &Statement) -> DbResult<u64> {
        self.before_query().await?;
        debug!(uow = %self.id, sql = statement.sql(), "count");

        let row = statement.query().fetch_one(&mut *self.tx).await?;
        self.stats.counts += 1;
        let count: i64 = row.try_get(0)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    pub(crate) async fn select_exists(&mut self, statement: &Statement) -> DbResult<bool> {
        self.before_query().await?;
        debug!(uow = %self.id, sql = statement.sql(), "exists");

        let row = statement.query().fetch_optional(&mut *self.tx).await?;
        self.stats.selects += 1;
        Ok(row.is_some())
    }

    /// Runs a set-based statement. Pending writes are flushed first whatever
    /// the flush mode; managed entities are left as they are.
    pub(crate) async fn execute_bulk(&mut self, statement: &Statement) -> DbResult<u64> {
        self.flush().await?;
        debug!(uow = %self.id, sql = statement.sql(), "bulk");

        let result = statement.query().execute(&mut *self.tx).await?;
        self.stats.bulk += 1;
        let affected = result.rows_affected();
        info!(uow = %self.id, affected, "Bulk statement executed");

        if !self.managed.is_empty() {
            debug!(
                uow = %self.id,
                managed = self.managed.len(),
                "Managed entities may now be stale"
            );
        }
        Ok(affected)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn insert(&mut self, meta: &'static EntityMeta, record: &Record) -> DbResult<EntityId> {
        let columns: Vec<(&str, Value)> = meta
            .fields
            .iter()
            .filter_map(|field| record.get(field.name).map(|value| (field.column, value.clone())))
            .collect();

        let mut statement = Statement::new();
        if columns.is_empty() {
            statement.push_sql(&format!("INSERT INTO {} DEFAULT VALUES", meta.table));
        } else {
            let names: Vec<&str> = columns.iter().map(|(column, _)| *column).collect();
            statement.push_sql(&format!("INSERT INTO {} ({}) VALUES (", meta.table, names.join(", ")));
            for (i, (_, value)) in columns.into_iter().enumerate() {
                if i > 0 {
                    statement.push_sql(", ");
                }
                statement.push_bind(value);
            }
            statement.push_sql(")");
        }
        statement.push_sql(&format!(" RETURNING {}", meta.id.column));

        debug!(uow = %self.id, sql = statement.sql(), "insert");
        let row = statement.query().fetch_one(&mut *self.tx).await?;
        self.stats.inserts += 1;
        let id: i64 = row.try_get(0)?;
        Ok(id)
    }

    async fn load_record(&mut self, meta: &'static EntityMeta, id: EntityId) -> DbResult<Option<Record>> {
        let statement = select_by_id(meta, id);
        debug!(uow = %self.id, sql = statement.sql(), id, "select by id");

        let row = statement.query().fetch_optional(&mut *self.tx).await?;
        self.stats.selects += 1;
        row.map(|row| read_record(&row, meta, None)).transpose()
    }

    /// Registers a freshly read record, or returns the managed one.
    fn manage(&mut self, meta: &'static EntityMeta, record: Record) -> DbResult<Record> {
        let id = record.required_integer(meta.name, meta.id.name)?;
        match self.managed.entry((meta.table, id)) {
            Entry::Occupied(entry) => Ok(entry.get().current.clone()),
            Entry::Vacant(entry) => {
                entry.insert(Managed {
                    meta,
                    current: record.clone(),
                    snapshot: record.clone(),
                    removed: false,
                });
                Ok(record)
            }
        }
    }
}

/// Reads the mapped columns of `meta` from `row`.
///
/// With a `prefix`, columns are read under their fetch-join alias
/// (`team__name`).
fn read_record(row: &SqliteRow, meta: &'static EntityMeta, prefix: Option<&str>) -> DbResult<Record> {
    let mut record = Record::new();
    for field in meta.all_fields() {
        let column = match prefix {
            Some(prefix) => fetched_column(prefix, field.column),
            None => field.column.to_string(),
        };
        let value = match field.kind {
            FieldKind::Integer | FieldKind::Reference => {
                Value::from(row.try_get::<Option<i64>, _>(column.as_str())?)
            }
            FieldKind::Text => Value::from(row.try_get::<Option<String>, _>(column.as_str())?),
        };
        record.insert(field.name, value);
    }
    Ok(record)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use roster_core::{Member, Team};

    async fn database() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_assigns_id_and_find_uses_identity_map() {
        let db = database().await;
        let mut uow = db.begin().await.unwrap();

        let member = uow.save(Member::with_age("memberA", 10).unwrap()).await.unwrap();
        let id = member.id().unwrap();
        assert!(uow.is_managed::<Member>(id));

        let found: Member = uow.find(id).await.unwrap().unwrap();
        assert_eq!(found, member);
        assert_eq!(uow.stats().inserts, 1);
        assert_eq!(uow.stats().selects, 0);
    }

    #[tokio::test]
    async fn test_dirty_checking_writes_changed_fields_once() {
        let db = database().await;
        let mut uow = db.begin().await.unwrap();

        let mut member = uow.save(Member::with_age("memberA", 10).unwrap()).await.unwrap();
        member.change_age(11);
        uow.save(member.clone()).await.unwrap();
        assert!(uow.has_pending_changes());

        uow.flush().await.unwrap();
        uow.flush().await.unwrap();
        assert_eq!(uow.stats().updates, 1);
        assert!(!uow.has_pending_changes());

        uow.clear();
        let reloaded: Member = uow.find(member.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(reloaded.age(), 11);
    }

    #[tokio::test]
    async fn test_remove_is_written_on_flush() {
        let db = database().await;
        let mut uow = db.begin().await.unwrap();

        let team = uow.save(Team::new("teamA").unwrap()).await.unwrap();
        uow.remove(&team).await.unwrap();
        assert_eq!(uow.stats().deletes, 0);
        assert_eq!(uow.find::<Team>(team.id().unwrap()).await.unwrap(), None);

        uow.flush().await.unwrap();
        assert_eq!(uow.stats().deletes, 1);
        assert_eq!(uow.managed_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_transient_entity_fails() {
        let db = database().await;
        let mut uow = db.begin().await.unwrap();

        let err = uow.remove(&Team::new("teamA").unwrap()).await.unwrap_err();
        assert!(matches!(err, DbError::Mapping(CoreError::TransientReference { .. })));
    }

    #[tokio::test]
    async fn test_save_detached_entity_with_missing_row() {
        let db = database().await;
        let mut uow = db.begin().await.unwrap();

        let ghost = Team::from_record(&Record::new().with("id", 99i64).with("name", "ghost")).unwrap();
        let err = uow.save(ghost).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_rollback_discards_inserts() {
        let db = database().await;

        let mut uow = db.begin().await.unwrap();
        let team = uow.save(Team::new("teamA").unwrap()).await.unwrap();
        uow.rollback().await.unwrap();

        let mut uow = db.begin().await.unwrap();
        assert_eq!(uow.find::<Team>(team.id().unwrap()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_commit_persists_pending_updates() {
        let db = database().await;

        let mut uow = db.begin().await.unwrap();
        let mut team = uow.save(Team::new("teamA").unwrap()).await.unwrap();
        team.rename("teamB").unwrap();
        uow.save(team.clone()).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = db.begin().await.unwrap();
        let found: Team = uow.find(team.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(found.name(), "teamB");
    }

    #[tokio::test]
    async fn test_clear_discards_unflushed_changes() {
        let db = database().await;
        let mut uow = db.begin().await.unwrap();

        let mut team = uow.save(Team::new("teamA").unwrap()).await.unwrap();
        team.rename("teamB").unwrap();
        uow.save(team.clone()).await.unwrap();
        uow.clear();

        assert_eq!(uow.managed_count(), 0);
        let found: Team = uow.find(team.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(found.name(), "teamA");
    }

    #[tokio::test]
    async fn test_native_queries() {
        let db = database().await;
        let mut uow = db.begin().await.unwrap();
        uow.save(Member::with_age("member1", 10).unwrap()).await.unwrap();
        uow.save(Member::with_age("member2", 20).unwrap()).await.unwrap();

        let affected = uow
            .execute(
                "UPDATE member SET age = age + 1 WHERE age >= :age",
                &Params::new().bind("age", 20),
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let ages: Vec<i64> = uow
            .query_scalars("SELECT age FROM member ORDER BY age", &Params::new())
            .await
            .unwrap();
        assert_eq!(ages, vec![10, 21]);
        assert_eq!(uow.stats().bulk, 1);
    }

    #[test]
    fn test_flush_mode_parsing() {
        assert_eq!("auto".parse::<FlushMode>().unwrap(), FlushMode::Auto);
        assert_eq!("COMMIT".parse::<FlushMode>().unwrap(), FlushMode::Commit);
        assert!("never".parse::<FlushMode>().is_err());
        assert_eq!(FlushMode::default(), FlushMode::Auto);
    }
}
