//! # SQL Rendering
//!
//! Turns entity metadata, criteria and sorting into SQLite statements with
//! positional `?` binds.
//!
//! ## Generated Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  select   SELECT [DISTINCT] member.*[, team.team_id AS team__team_id,  │
//! │                  team.name AS team__name]                              │
//! │           FROM member [LEFT|INNER JOIN team ON team.team_id =          │
//! │                        member.team_id]                                 │
//! │           [WHERE ...] [ORDER BY ...] [LIMIT ? OFFSET ?]                 │
//! │                                                                         │
//! │  count    SELECT COUNT(*) FROM member [JOIN ...] [WHERE ...]           │
//! │  exists   SELECT 1 FROM member [JOIN ...] [WHERE ...] LIMIT 1          │
//! │  by id    SELECT member.* FROM member WHERE member.member_id = ?       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tables are not aliased: columns are qualified with the table name, and a
//! joined relation is qualified with its target table. Fetched relation
//! columns are aliased `<relation>__<column>` so the root entity's columns
//! keep their plain names.

use roster_core::{EntityMeta, FieldKind, PageRequest, RelationMeta, Sort, Value};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;

use super::criteria::Criteria;
use super::named::Params;
use super::QueryError;

// =============================================================================
// Statement
// =============================================================================

/// Rendered SQL plus bind values in placeholder order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    binds: Vec<Value>,
}

impl Statement {
    pub fn new() -> Self {
        Statement::default()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &[Value] {
        &self.binds
    }

    pub(crate) fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    pub(crate) fn push_bind(&mut self, value: Value) {
        self.sql.push('?');
        self.binds.push(value);
    }

    /// Pushes `(?, ?, ...)`. An empty list renders `()`, which SQLite
    /// evaluates as an empty set.
    pub(crate) fn push_bind_list(&mut self, values: &[Value]) {
        self.sql.push('(');
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_bind(value.clone());
        }
        self.sql.push(')');
    }

    fn push_limit(&mut self, limit: Option<u64>, offset: Option<u64>) {
        if limit.is_none() && offset.is_none() {
            return;
        }
        // SQLite needs a LIMIT before OFFSET; -1 means unbounded.
        self.push_sql(" LIMIT ");
        self.push_bind(Value::Integer(limit.map_or(-1, to_i64)));
        if let Some(offset) = offset {
            self.push_sql(" OFFSET ");
            self.push_bind(Value::Integer(to_i64(offset)));
        }
    }

    /// Builds an sqlx query with every value bound.
    pub(crate) fn query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        let mut query = sqlx::query(&self.sql);
        for value in &self.binds {
            query = match value {
                Value::Null => query.bind(None::<i64>),
                Value::Integer(value) => query.bind(*value),
                Value::Text(value) => query.bind(value.as_str()),
            };
        }
        query
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// =============================================================================
// Property Resolution
// =============================================================================

/// A property path resolved to a column, possibly across the owning relation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedColumn {
    pub table: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
    pub join: Option<&'static RelationMeta>,
}

impl ResolvedColumn {
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// Resolves a dotted property path (`username`, `team`, `team.id`,
/// `team.name`) against `meta`.
///
/// `team` and `team.id` both map to the foreign key on the root table, so
/// neither needs a join.
pub(crate) fn resolve_path(meta: &'static EntityMeta, path: &str) -> Option<ResolvedColumn> {
    match path.split_once('.') {
        None => meta.field(path).map(|field| ResolvedColumn {
            table: meta.table,
            column: field.column,
            kind: field.kind,
            join: None,
        }),
        Some((relation_name, rest)) => {
            let relation = meta.relation(relation_name)?;
            let target = relation.target;
            if rest == target.id.name {
                return Some(ResolvedColumn {
                    table: meta.table,
                    column: relation.column,
                    kind: FieldKind::Reference,
                    join: None,
                });
            }
            if rest.contains('.') {
                return None;
            }
            target.field(rest).map(|field| ResolvedColumn {
                table: target.table,
                column: field.column,
                kind: field.kind,
                join: Some(relation),
            })
        }
    }
}

/// Relations that must be joined, in first-use order.
#[derive(Debug, Default)]
pub(crate) struct JoinSet {
    relations: Vec<&'static RelationMeta>,
}

impl JoinSet {
    pub fn add(&mut self, relation: &'static RelationMeta) {
        if !self.contains(relation.name) {
            self.relations.push(relation);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.relations.iter().any(|relation| relation.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    fn iter(&self) -> impl Iterator<Item = &'static RelationMeta> + '_ {
        self.relations.iter().copied()
    }
}

/// Appends `ORDER BY ...` for `sort`, or nothing when unsorted.
///
/// `qualify` chooses between `member.username` (generated queries) and a
/// bare `username` (explicit queries wrapped as a subquery).
pub(crate) fn render_order_by(
    meta: &'static EntityMeta,
    sort: &Sort,
    qualify: bool,
    joins: &mut JoinSet,
    out: &mut Statement,
) -> Result<(), QueryError> {
    if !sort.is_sorted() {
        return Ok(());
    }

    out.push_sql(" ORDER BY ");
    for (i, order) in sort.orders().iter().enumerate() {
        let resolved = resolve_path(meta, &order.property).ok_or_else(|| QueryError::InvalidSort {
            property: order.property.clone(),
            entity: meta.name.to_string(),
        })?;

        let column = match (qualify, resolved.join) {
            (true, Some(relation)) => {
                joins.add(relation);
                resolved.qualified()
            }
            (true, None) => resolved.qualified(),
            (false, None) => resolved.column.to_string(),
            (false, Some(_)) => {
                return Err(QueryError::InvalidSort {
                    property: order.property.clone(),
                    entity: meta.name.to_string(),
                })
            }
        };

        if i > 0 {
            out.push_sql(", ");
        }
        if order.ignore_case {
            out.push_sql(&format!("UPPER({}) {}", column, order.direction.as_sql()));
        } else {
            out.push_sql(&format!("{} {}", column, order.direction.as_sql()));
        }
    }
    Ok(())
}

// =============================================================================
// Query Plan
// =============================================================================

/// What a generated query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Projection {
    Entities,
    Count,
    Exists,
}

/// A generated query over one entity table.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    meta: &'static EntityMeta,
    criteria: Criteria,
    sort: Sort,
    distinct: bool,
    limit: Option<u64>,
    offset: Option<u64>,
    fetch: Vec<&'static RelationMeta>,
}

impl QueryPlan {
    pub fn new(meta: &'static EntityMeta) -> Self {
        QueryPlan {
            meta,
            criteria: Criteria::new(),
            sort: Sort::unsorted(),
            distinct: false,
            limit: None,
            offset: None,
            fetch: Vec::new(),
        }
    }

    pub fn meta(&self) -> &'static EntityMeta {
        self.meta
    }

    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Appends orders after any already present.
    pub fn sorted_by(mut self, sort: Sort) -> Self {
        self.sort = std::mem::take(&mut self.sort).and(sort);
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    /// Applies a page window. An existing smaller limit (`findTop3By...`)
    /// still caps the window.
    pub fn window(mut self, offset: u64, size: u64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(self.limit.map_or(size, |limit| limit.min(size)));
        self
    }

    /// Applies a page request: its sort and its window.
    pub fn page(self, request: &PageRequest) -> Self {
        self.sorted_by(request.sort().clone())
            .window(request.offset(), u64::from(request.size()))
    }

    /// Eagerly loads `relation` in the same statement.
    pub fn fetch(mut self, relation: &str) -> Result<Self, QueryError> {
        let relation = self
            .meta
            .relation(relation)
            .ok_or_else(|| QueryError::UnknownRelation {
                relation: relation.to_string(),
                entity: self.meta.name.to_string(),
            })?;
        if !self.fetch.iter().any(|fetched| fetched.name == relation.name) {
            self.fetch.push(relation);
        }
        Ok(self)
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn fetched(&self) -> &[&'static RelationMeta] {
        &self.fetch
    }

    pub fn select(&self, params: &Params) -> Result<Statement, QueryError> {
        self.render(Projection::Entities, params)
    }

    pub fn count(&self, params: &Params) -> Result<Statement, QueryError> {
        self.render(Projection::Count, params)
    }

    pub fn exists(&self, params: &Params) -> Result<Statement, QueryError> {
        self.render(Projection::Exists, params)
    }

    pub(crate) fn render(&self, projection: Projection, params: &Params) -> Result<Statement, QueryError> {
        params.check(self.criteria.parameter_names())?;

        let meta = self.meta;
        let mut joins = JoinSet::default();
        let mut where_clause = Statement::new();
        self.criteria.render(meta, params, &mut joins, &mut where_clause)?;
        // Joins before this index filter rows; later ones only sort
        let filtering_joins = joins.len();

        let mut order_clause = Statement::new();
        if projection == Projection::Entities {
            render_order_by(meta, &self.sort, true, &mut joins, &mut order_clause)?;
        }

        let fetching = projection == Projection::Entities && !self.fetch.is_empty();
        if fetching {
            for relation in &self.fetch {
                joins.add(relation);
            }
        }

        let mut out = Statement::new();
        match projection {
            Projection::Entities => {
                out.push_sql("SELECT ");
                if self.distinct {
                    out.push_sql("DISTINCT ");
                }
                out.push_sql(&format!("{}.*", meta.table));
                if fetching {
                    for relation in &self.fetch {
                        for field in relation.target.all_fields() {
                            out.push_sql(&format!(
                                ", {}.{} AS {}",
                                relation.target.table,
                                field.column,
                                fetched_column(relation.name, field.column)
                            ));
                        }
                    }
                }
            }
            Projection::Count if self.distinct => {
                out.push_sql(&format!("SELECT COUNT(DISTINCT {}.{})", meta.table, meta.id.column));
            }
            Projection::Count => out.push_sql("SELECT COUNT(*)"),
            Projection::Exists => out.push_sql("SELECT 1"),
        }

        out.push_sql(&format!(" FROM {}", meta.table));
        for (index, relation) in joins.iter().enumerate() {
            let fetched = fetching && self.fetch.iter().any(|fetched| fetched.name == relation.name);
            let kind = if index < filtering_joins && !fetched {
                "INNER JOIN"
            } else {
                "LEFT JOIN"
            };
            out.push_sql(&format!(
                " {} {} ON {}.{} = {}.{}",
                kind,
                relation.target.table,
                relation.target.table,
                relation.target.id.column,
                meta.table,
                relation.column
            ));
        }

        if !where_clause.sql.is_empty() {
            out.push_sql(" WHERE ");
            out.append(where_clause);
        }
        out.append(order_clause);

        match projection {
            Projection::Entities => out.push_limit(self.limit, self.offset),
            Projection::Exists => out.push_sql(" LIMIT 1"),
            Projection::Count => {}
        }

        Ok(out)
    }
}

impl Statement {
    pub(crate) fn append(&mut self, other: Statement) {
        self.sql.push_str(&other.sql);
        self.binds.extend(other.binds);
    }
}

/// Column alias of a fetch-joined relation column.
pub(crate) fn fetched_column(relation: &str, column: &str) -> String {
    format!("{}__{}", relation, column)
}

/// `SELECT member.* FROM member WHERE member.member_id = ?`
pub(crate) fn select_by_id(meta: &EntityMeta, id: i64) -> Statement {
    let mut out = Statement::new();
    out.push_sql(&format!(
        "SELECT {}.* FROM {} WHERE {}.{} = ",
        meta.table, meta.table, meta.table, meta.id.column
    ));
    out.push_bind(Value::Integer(id));
    out
}

/// Wraps explicit SQL so a page request can sort and window it.
///
/// ```text
/// SELECT * FROM (<explicit>) AS paged ORDER BY username DESC LIMIT ? OFFSET ?
/// ```
pub(crate) fn window_explicit(
    meta: &'static EntityMeta,
    inner: Statement,
    sort: &Sort,
    limit: u64,
    offset: u64,
) -> Result<Statement, QueryError> {
    let mut out = Statement::new();
    out.push_sql("SELECT * FROM (");
    out.append(inner);
    out.push_sql(") AS paged");
    let mut joins = JoinSet::default();
    render_order_by(meta, sort, false, &mut joins, &mut out)?;
    out.push_limit(Some(limit), Some(offset));
    Ok(out)
}

/// Wraps explicit SQL so its rows carry fetched relation columns.
///
/// ```text
/// SELECT root.*, team.team_id AS team__team_id, team.name AS team__name
/// FROM (<explicit>) AS root LEFT JOIN team ON team.team_id = root.team_id
/// ```
pub(crate) fn fetch_explicit(inner: Statement, fetch: &[&'static RelationMeta]) -> Statement {
    if fetch.is_empty() {
        return inner;
    }

    let mut out = Statement::new();
    out.push_sql("SELECT root.*");
    for relation in fetch {
        for field in relation.target.all_fields() {
            out.push_sql(&format!(
                ", {}.{} AS {}",
                relation.target.table,
                field.column,
                fetched_column(relation.name, field.column)
            ));
        }
    }
    out.push_sql(" FROM (");
    out.append(inner);
    out.push_sql(") AS root");
    for relation in fetch {
        out.push_sql(&format!(
            " LEFT JOIN {} ON {}.{} = root.{}",
            relation.target.table, relation.target.table, relation.target.id.column, relation.column
        ));
    }
    out
}

/// `SELECT COUNT(*) FROM (<explicit>) AS counted`
pub(crate) fn count_explicit(inner: Statement) -> Statement {
    let mut out = Statement::new();
    out.push_sql("SELECT COUNT(*) FROM (");
    out.append(inner);
    out.push_sql(") AS counted");
    out
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::criteria::Operator;
    use roster_core::{Direction, MEMBER_META};

    #[test]
    fn test_resolve_paths() {
        let username = resolve_path(&MEMBER_META, "username").unwrap();
        assert_eq!(username.qualified(), "member.username");
        assert!(username.join.is_none());

        let team_id = resolve_path(&MEMBER_META, "team.id").unwrap();
        assert_eq!(team_id.qualified(), "member.team_id");
        assert!(team_id.join.is_none());

        let team_name = resolve_path(&MEMBER_META, "team.name").unwrap();
        assert_eq!(team_name.qualified(), "team.name");
        assert_eq!(team_name.join.map(|relation| relation.name), Some("team"));

        assert!(resolve_path(&MEMBER_META, "nickname").is_none());
        assert!(resolve_path(&MEMBER_META, "team.size").is_none());
    }

    #[test]
    fn test_select_with_criteria_and_sort() {
        let plan = QueryPlan::new(&MEMBER_META)
            .with_criteria(
                Criteria::new()
                    .param("username", Operator::Equals, "username")
                    .param("age", Operator::GreaterThan, "age"),
            )
            .sorted_by(Sort::by(Direction::Desc, &["username"]));

        let statement = plan
            .select(&Params::new().bind("username", "AAA").bind("age", 15))
            .unwrap();
        assert_eq!(
            statement.sql(),
            "SELECT member.* FROM member WHERE (member.username = ? AND member.age > ?) \
             ORDER BY member.username DESC"
        );
        assert_eq!(statement.binds(), &[Value::from("AAA"), Value::from(15)]);
    }

    #[test]
    fn test_fetch_join_aliases_relation_columns() {
        let plan = QueryPlan::new(&MEMBER_META).fetch("team").unwrap();
        let statement = plan.select(&Params::new()).unwrap();

        assert_eq!(
            statement.sql(),
            "SELECT member.*, team.team_id AS team__team_id, team.name AS team__name \
             FROM member LEFT JOIN team ON team.team_id = member.team_id"
        );
        assert!(QueryPlan::new(&MEMBER_META).fetch("club").is_err());
    }

    #[test]
    fn test_joined_criteria_use_inner_join() {
        let plan = QueryPlan::new(&MEMBER_META)
            .with_criteria(Criteria::new().value("team.name", Operator::Equals, "teamA"));
        let statement = plan.count(&Params::new()).unwrap();

        assert_eq!(
            statement.sql(),
            "SELECT COUNT(*) FROM member INNER JOIN team ON team.team_id = member.team_id \
             WHERE (team.name = ?)"
        );
    }

    #[test]
    fn test_relation_sort_uses_left_join() {
        let plan = QueryPlan::new(&MEMBER_META)
            .with_criteria(Criteria::new().param("age", Operator::Equals, "age"))
            .sorted_by(Sort::by(Direction::Asc, &["team.name"]));
        let statement = plan.select(&Params::new().bind("age", 10)).unwrap();

        assert_eq!(
            statement.sql(),
            "SELECT member.* FROM member LEFT JOIN team ON team.team_id = member.team_id \
             WHERE (member.age = ?) ORDER BY team.name ASC"
        );
    }

    #[test]
    fn test_page_window() {
        let request = PageRequest::of_sorted(1, 3, Sort::by(Direction::Desc, &["username"])).unwrap();
        let statement = QueryPlan::new(&MEMBER_META)
            .page(&request)
            .select(&Params::new())
            .unwrap();

        assert!(statement.sql().ends_with("ORDER BY member.username DESC LIMIT ? OFFSET ?"));
        assert_eq!(statement.binds(), &[Value::Integer(3), Value::Integer(3)]);
    }

    #[test]
    fn test_static_limit_caps_window() {
        let plan = QueryPlan::new(&MEMBER_META).limit(Some(2)).window(0, 10);
        let statement = plan.select(&Params::new()).unwrap();
        assert_eq!(statement.binds(), &[Value::Integer(2), Value::Integer(0)]);
    }

    #[test]
    fn test_invalid_sort_property() {
        let plan = QueryPlan::new(&MEMBER_META).sorted_by(Sort::by(Direction::Asc, &["nickname"]));
        assert!(matches!(
            plan.select(&Params::new()),
            Err(QueryError::InvalidSort { .. })
        ));
    }

    #[test]
    fn test_window_explicit_rejects_joined_sort() {
        let sort = Sort::by(Direction::Asc, &["team.name"]);
        let result = window_explicit(&MEMBER_META, Statement::new(), &sort, 3, 0);
        assert!(matches!(result, Err(QueryError::InvalidSort { .. })));
    }

    #[test]
    fn test_fetch_explicit_wraps_inner_query() {
        let inner = crate::query::ParsedSql::parse("SELECT m.* FROM member m")
            .unwrap()
            .bind(&Params::new())
            .unwrap();
        let team = MEMBER_META.relation("team").unwrap();
        let statement = fetch_explicit(inner, &[team]);

        assert_eq!(
            statement.sql(),
            "SELECT root.*, team.team_id AS team__team_id, team.name AS team__name \
             FROM (SELECT m.* FROM member m) AS root LEFT JOIN team ON team.team_id = root.team_id"
        );
    }
}
