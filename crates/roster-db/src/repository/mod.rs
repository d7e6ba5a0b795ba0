//! # Repository Module
//!
//! Generic CRUD and query-by-name access over one entity type.
//!
//! ## Registration and Execution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Lifecycle                                 │
//! │                                                                         │
//! │  Repository::<Member>::builder()                                       │
//! │       ├── .named_query("Member.findByUsername", "SELECT ...")          │
//! │       ├── .derived("findByUsernameAndAgeGreaterThan")                  │
//! │       ├── .explicit("findUser", "SELECT m.* ... = :username ...")      │
//! │       ├── .paged("findByAge", "SELECT ...", "SELECT COUNT(...) ...")   │
//! │       └── .modifying("bulkAgePlus", "UPDATE ...", Modifying::clearing())│
//! │       │                                                                 │
//! │       ▼ build()   every name parsed, every SQL scanned                 │
//! │  Repository<Member>          (or DbError::Configuration)               │
//! │       │                                                                 │
//! │       │  repo.list(&mut uow, "findUser", &params)                      │
//! │       ▼                                                                 │
//! │  QueryDefinition ──► Statement ──► UnitOfWork ──► hydrated entities    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A derived registration whose name matches a named query
//! `<Entity>.<operation>` runs that query instead of deriving one.
//!
//! ## Available Repositories
//!
//! - [`Repository`] - generic entity repository
//! - [`MemberRepository`] - member operations
//! - [`TeamRepository`] - team operations

pub mod member;
pub mod team;

use std::collections::HashMap;
use std::marker::PhantomData;

use roster_core::{Entity, EntityId, EntityMeta, Page, PageRequest, RelationMeta, Slice, Sort};
use sqlx::sqlite::SqliteRow;
use sqlx::Sqlite;
use tracing::{debug, info};

use crate::bulk::Modifying;
use crate::error::{DbError, DbResult};
use crate::query::sql::{count_explicit, fetch_explicit, window_explicit};
use crate::query::{parse_method_name, Criteria, Params, ParsedSql, QueryError, QueryPlan, Statement, Subject};
use crate::unit_of_work::UnitOfWork;

pub use member::MemberRepository;
pub use team::TeamRepository;

// =============================================================================
// Query Definitions
// =============================================================================

/// A registered query, ready to bind.
#[derive(Debug, Clone)]
pub enum QueryDefinition {
    /// Parsed from the operation name.
    Derived { subject: Subject, plan: QueryPlan },
    /// Explicit select, optionally with a separate count query.
    Explicit {
        sql: ParsedSql,
        fetch: Vec<&'static RelationMeta>,
        count: Option<ParsedSql>,
    },
    /// Explicit `UPDATE`/`DELETE`.
    Modifying { sql: ParsedSql, options: Modifying },
}

#[derive(Debug)]
enum Registration {
    Derived {
        operation: String,
        fetch: Vec<String>,
    },
    DerivedGraph {
        operation: String,
        graph: String,
    },
    Explicit {
        operation: String,
        sql: String,
        fetch: Vec<String>,
        count: Option<String>,
    },
    Modifying {
        operation: String,
        sql: String,
        options: Modifying,
    },
}

impl Registration {
    fn operation(&self) -> &str {
        match self {
            Registration::Derived { operation, .. }
            | Registration::DerivedGraph { operation, .. }
            | Registration::Explicit { operation, .. }
            | Registration::Modifying { operation, .. } => operation,
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Collects query registrations; [`RepositoryBuilder::build`] validates them.
#[derive(Debug)]
pub struct RepositoryBuilder<E: Entity> {
    named_queries: HashMap<String, String>,
    named_graphs: HashMap<String, Vec<String>>,
    registrations: Vec<Registration>,
    find_all_graph: Vec<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> RepositoryBuilder<E> {
    fn new() -> Self {
        RepositoryBuilder {
            named_queries: HashMap::new(),
            named_graphs: HashMap::new(),
            registrations: Vec::new(),
            find_all_graph: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Declares a named query such as `Member.findByUsername`.
    pub fn named_query(mut self, name: &str, sql: &str) -> Self {
        self.named_queries.insert(name.to_string(), sql.to_string());
        self
    }

    /// Declares a named set of relations to fetch (`Member.all`).
    pub fn named_entity_graph(mut self, name: &str, relations: &[&str]) -> Self {
        self.named_graphs
            .insert(name.to_string(), relations.iter().map(|r| r.to_string()).collect());
        self
    }

    /// Registers a query derived from `operation`.
    pub fn derived(self, operation: &str) -> Self {
        self.derived_fetching(operation, &[])
    }

    /// Registers a derived query that fetch-joins `relations`.
    pub fn derived_fetching(mut self, operation: &str, relations: &[&str]) -> Self {
        self.registrations.push(Registration::Derived {
            operation: operation.to_string(),
            fetch: relations.iter().map(|r| r.to_string()).collect(),
        });
        self
    }

    /// Registers a derived query that fetches a named entity graph.
    pub fn derived_with_graph(mut self, operation: &str, graph: &str) -> Self {
        self.registrations.push(Registration::DerivedGraph {
            operation: operation.to_string(),
            graph: graph.to_string(),
        });
        self
    }

    /// Registers explicit SQL with `:name` placeholders.
    pub fn explicit(self, operation: &str, sql: &str) -> Self {
        self.explicit_fetching(operation, sql, &[])
    }

    /// Registers explicit SQL whose rows also load `relations`.
    pub fn explicit_fetching(mut self, operation: &str, sql: &str, relations: &[&str]) -> Self {
        self.registrations.push(Registration::Explicit {
            operation: operation.to_string(),
            sql: sql.to_string(),
            fetch: relations.iter().map(|r| r.to_string()).collect(),
            count: None,
        });
        self
    }

    /// Registers explicit SQL for paging with its own count query.
    pub fn paged(mut self, operation: &str, sql: &str, count_sql: &str) -> Self {
        self.registrations.push(Registration::Explicit {
            operation: operation.to_string(),
            sql: sql.to_string(),
            fetch: Vec::new(),
            count: Some(count_sql.to_string()),
        });
        self
    }

    /// Registers an explicit modifying statement.
    pub fn modifying(mut self, operation: &str, sql: &str, options: Modifying) -> Self {
        self.registrations.push(Registration::Modifying {
            operation: operation.to_string(),
            sql: sql.to_string(),
            options,
        });
        self
    }

    /// Relations that `find_all` fetch-joins.
    pub fn entity_graph(mut self, relations: &[&str]) -> Self {
        self.find_all_graph = relations.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Validates every registration.
    ///
    /// ## Errors
    /// `DbError::Configuration` naming the first operation that failed, e.g.
    /// `Invalid query 'findByUsernameAndAgeGreaterThen': No property
    /// 'greaterThen' found for type 'Member.age'`.
    pub fn build(self) -> DbResult<Repository<E>> {
        let meta = E::meta();

        for (name, sql) in &self.named_queries {
            ParsedSql::parse(sql).map_err(|e| DbError::configuration(name.as_str(), e))?;
        }

        let find_all_graph = resolve_relations(meta, &self.find_all_graph)
            .map_err(|e| DbError::configuration("findAll", e))?;

        let mut queries = HashMap::new();
        for registration in &self.registrations {
            let operation = registration.operation();
            let definition = self
                .define(meta, registration)
                .map_err(|e| DbError::configuration(operation, e))?;

            if queries.insert(operation.to_string(), definition).is_some() {
                return Err(DbError::configuration(
                    operation,
                    QueryError::InvalidMethodName {
                        name: operation.to_string(),
                        reason: "registered more than once".to_string(),
                    },
                ));
            }
        }

        info!(entity = meta.name, queries = queries.len(), "Repository built");

        Ok(Repository {
            queries,
            find_all_graph,
            _entity: PhantomData,
        })
    }

    fn define(&self, meta: &'static EntityMeta, registration: &Registration) -> Result<QueryDefinition, QueryError> {
        match registration {
            Registration::Derived { operation, fetch } => self.define_derived(meta, operation, fetch),
            Registration::DerivedGraph { operation, graph } => {
                let fetch = self
                    .named_graphs
                    .get(graph)
                    .ok_or_else(|| QueryError::UnknownQuery(graph.clone()))?;
                self.define_derived(meta, operation, fetch)
            }
            Registration::Explicit {
                sql, fetch, count, ..
            } => Ok(QueryDefinition::Explicit {
                sql: ParsedSql::parse(sql)?,
                fetch: resolve_relations(meta, fetch)?,
                count: count.as_deref().map(ParsedSql::parse).transpose()?,
            }),
            Registration::Modifying { sql, options, .. } => Ok(QueryDefinition::Modifying {
                sql: ParsedSql::parse(sql)?,
                options: *options,
            }),
        }
    }

    fn define_derived(
        &self,
        meta: &'static EntityMeta,
        operation: &str,
        fetch: &[String],
    ) -> Result<QueryDefinition, QueryError> {
        let fetch_relations = resolve_relations(meta, fetch)?;

        if let Some(sql) = self.named_queries.get(&format!("{}.{}", meta.name, operation)) {
            debug!(entity = meta.name, operation, "Using named query");
            return Ok(QueryDefinition::Explicit {
                sql: ParsedSql::parse(sql)?,
                fetch: fetch_relations,
                count: None,
            });
        }

        let derived = parse_method_name(operation, meta)?;
        let mut plan = QueryPlan::new(meta)
            .with_criteria(derived.criteria)
            .sorted_by(derived.sort)
            .distinct(derived.distinct)
            .limit(derived.limit);
        for relation in fetch_relations {
            plan = plan.fetch(relation.name)?;
        }

        Ok(QueryDefinition::Derived {
            subject: derived.subject,
            plan,
        })
    }
}

fn resolve_relations(meta: &'static EntityMeta, names: &[String]) -> Result<Vec<&'static RelationMeta>, QueryError> {
    names
        .iter()
        .map(|name| {
            meta.relation(name).ok_or_else(|| QueryError::UnknownRelation {
                relation: name.clone(),
                entity: meta.name.to_string(),
            })
        })
        .collect()
}

// =============================================================================
// Repository
// =============================================================================

/// CRUD and registered queries for `E`. Every call runs in the given unit
/// of work.
///
/// ## Usage
/// ```rust,ignore
/// let repo = Repository::<Team>::builder().derived("findByName").build()?;
///
/// let mut uow = db.begin().await?;
/// let team = repo.save(&mut uow, Team::new("teamA")?).await?;
/// let found = repo.list(&mut uow, "findByName", &Params::new().bind("name", "teamA")).await?;
/// uow.commit().await?;
/// ```
#[derive(Debug)]
pub struct Repository<E: Entity> {
    queries: HashMap<String, QueryDefinition>,
    find_all_graph: Vec<&'static RelationMeta>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<E> {
    pub fn builder() -> RepositoryBuilder<E> {
        RepositoryBuilder::new()
    }

    /// Whether `operation` was registered.
    pub fn has_query(&self, operation: &str) -> bool {
        self.queries.contains_key(operation)
    }

    pub fn definition(&self, operation: &str) -> DbResult<&QueryDefinition> {
        self.queries
            .get(operation)
            .ok_or_else(|| QueryError::UnknownQuery(operation.to_string()).into())
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Inserts a new entity or merges a changed one. See [`UnitOfWork::save`].
    pub async fn save(&self, uow: &mut UnitOfWork, entity: E) -> DbResult<E> {
        uow.save(entity).await
    }

    pub async fn save_all(&self, uow: &mut UnitOfWork, entities: impl IntoIterator<Item = E>) -> DbResult<Vec<E>> {
        let mut saved = Vec::new();
        for entity in entities {
            saved.push(uow.save(entity).await?);
        }
        Ok(saved)
    }

    pub async fn find_by_id(&self, uow: &mut UnitOfWork, id: EntityId) -> DbResult<Option<E>> {
        uow.find(id).await
    }

    pub async fn exists_by_id(&self, uow: &mut UnitOfWork, id: EntityId) -> DbResult<bool> {
        Ok(uow.find::<E>(id).await?.is_some())
    }

    /// Every row, fetching the repository's entity graph if one was set.
    pub async fn find_all(&self, uow: &mut UnitOfWork) -> DbResult<Vec<E>> {
        self.find_all_sorted(uow, Sort::unsorted()).await
    }

    pub async fn find_all_sorted(&self, uow: &mut UnitOfWork, sort: Sort) -> DbResult<Vec<E>> {
        let plan = self.base_plan()?.sorted_by(sort);
        let statement = plan.select(&Params::new())?;
        uow.select_entities(&statement, plan.fetched()).await
    }

    /// Rows matching ad-hoc criteria.
    pub async fn find_all_by(&self, uow: &mut UnitOfWork, criteria: Criteria) -> DbResult<Vec<E>> {
        let plan = self.base_plan()?.with_criteria(criteria);
        let statement = plan.select(&Params::new())?;
        uow.select_entities(&statement, plan.fetched()).await
    }

    /// One page of rows matching `criteria`.
    pub async fn find_page(
        &self,
        uow: &mut UnitOfWork,
        criteria: Criteria,
        request: &PageRequest,
    ) -> DbResult<Page<E>> {
        let plan = self.base_plan()?.with_criteria(criteria);
        self.page_plan(uow, &plan, &Params::new(), request).await
    }

    pub async fn count(&self, uow: &mut UnitOfWork) -> DbResult<u64> {
        self.count_by(uow, Criteria::new()).await
    }

    pub async fn count_by(&self, uow: &mut UnitOfWork, criteria: Criteria) -> DbResult<u64> {
        let statement = QueryPlan::new(E::meta())
            .with_criteria(criteria)
            .count(&Params::new())?;
        uow.select_count(&statement).await
    }

    /// Schedules the entity for deletion.
    pub async fn delete(&self, uow: &mut UnitOfWork, entity: &E) -> DbResult<()> {
        uow.remove(entity).await
    }

    /// Schedules the row for deletion; `NotFound` if it does not exist.
    pub async fn delete_by_id(&self, uow: &mut UnitOfWork, id: EntityId) -> DbResult<()> {
        uow.remove_by_id(E::meta(), id).await
    }

    /// Loads and removes every row. Returns how many were scheduled.
    pub async fn delete_all(&self, uow: &mut UnitOfWork) -> DbResult<u64> {
        let statement = QueryPlan::new(E::meta()).select(&Params::new())?;
        let entities: Vec<E> = uow.select_entities(&statement, &[]).await?;
        for entity in &entities {
            uow.remove(entity).await?;
        }
        Ok(entities.len() as u64)
    }

    // =========================================================================
    // Registered Queries
    // =========================================================================

    /// Runs a select query and returns every row.
    pub async fn list(&self, uow: &mut UnitOfWork, operation: &str, params: &Params) -> DbResult<Vec<E>> {
        let definition = self.definition(operation)?;
        let (statement, fetch) = select_statement(operation, definition, params)?;
        uow.select_entities(&statement, fetch).await
    }

    /// Runs a select query expected to match at most one row.
    ///
    /// ## Errors
    /// `NonUniqueResult` when more than one row matches.
    pub async fn one(&self, uow: &mut UnitOfWork, operation: &str, params: &Params) -> DbResult<Option<E>> {
        let mut rows = self.list(uow, operation, params).await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            count => Err(DbError::NonUniqueResult {
                operation: operation.to_string(),
                count,
            }),
        }
    }

    /// Counts the rows a query matches.
    pub async fn count_query(&self, uow: &mut UnitOfWork, operation: &str, params: &Params) -> DbResult<u64> {
        let statement = match self.definition(operation)? {
            QueryDefinition::Derived { plan, .. } => plan.count(params)?,
            QueryDefinition::Explicit {
                count: Some(count), ..
            } => count.bind(params)?,
            QueryDefinition::Explicit { sql, .. } => count_explicit(sql.bind(params)?),
            QueryDefinition::Modifying { .. } => return Err(wrong_kind(operation, "modifying query").into()),
        };
        uow.select_count(&statement).await
    }

    /// Whether a query matches any row.
    pub async fn exists(&self, uow: &mut UnitOfWork, operation: &str, params: &Params) -> DbResult<bool> {
        let statement = match self.definition(operation)? {
            QueryDefinition::Derived { plan, .. } => plan.exists(params)?,
            QueryDefinition::Explicit { sql, .. } => {
                let mut out = Statement::new();
                out.push_sql("SELECT 1 FROM (");
                out.append(sql.bind(params)?);
                out.push_sql(") AS probe LIMIT 1");
                out
            }
            QueryDefinition::Modifying { .. } => return Err(wrong_kind(operation, "modifying query").into()),
        };
        uow.select_exists(&statement).await
    }

    /// Loads the rows of a derived query and removes them one by one.
    pub async fn delete_query(&self, uow: &mut UnitOfWork, operation: &str, params: &Params) -> DbResult<u64> {
        let QueryDefinition::Derived { plan, .. } = self.definition(operation)? else {
            return Err(wrong_kind(operation, "use modify for explicit statements").into());
        };
        let statement = plan.select(params)?;
        let entities: Vec<E> = uow.select_entities(&statement, &[]).await?;
        for entity in &entities {
            uow.remove(entity).await?;
        }
        debug!(operation, removed = entities.len(), "Derived delete scheduled");
        Ok(entities.len() as u64)
    }

    /// Runs a select query for one page plus its total.
    ///
    /// ## Count Query
    /// Skipped when the content alone decides the total (see
    /// [`PageRequest::infer_total`]). Otherwise the registered count query
    /// runs, or the select wrapped as `SELECT COUNT(*) FROM (...)`.
    pub async fn page(
        &self,
        uow: &mut UnitOfWork,
        operation: &str,
        params: &Params,
        request: &PageRequest,
    ) -> DbResult<Page<E>> {
        match self.definition(operation)? {
            QueryDefinition::Derived {
                subject: Subject::Find,
                plan,
            } => self.page_plan(uow, plan, params, request).await,
            QueryDefinition::Explicit { sql, fetch, count } => {
                let inner = fetch_explicit(sql.bind(params)?, fetch);
                let statement = window_explicit(
                    E::meta(),
                    inner,
                    request.sort(),
                    u64::from(request.size()),
                    request.offset(),
                )?;
                let content = uow.select_entities(&statement, fetch).await?;

                let total = match request.infer_total(content.len()) {
                    Some(total) => total,
                    None => {
                        let count_statement = match count {
                            Some(count) => count.bind(params)?,
                            None => count_explicit(sql.bind(params)?),
                        };
                        uow.select_count(&count_statement).await?
                    }
                };
                Ok(Page::new(content, request, total))
            }
            _ => Err(wrong_kind(operation, "not a select query").into()),
        }
    }

    /// Runs a select query for one slice: `size + 1` rows, no count.
    pub async fn slice(
        &self,
        uow: &mut UnitOfWork,
        operation: &str,
        params: &Params,
        request: &PageRequest,
    ) -> DbResult<Slice<E>> {
        let overfetch = u64::from(request.size()) + 1;
        let (statement, fetch) = match self.definition(operation)? {
            QueryDefinition::Derived {
                subject: Subject::Find,
                plan,
            } => {
                let plan = plan
                    .clone()
                    .sorted_by(request.sort().clone())
                    .window(request.offset(), overfetch);
                (plan.select(params)?, plan.fetched().to_vec())
            }
            QueryDefinition::Explicit { sql, fetch, .. } => {
                let inner = fetch_explicit(sql.bind(params)?, fetch);
                let statement = window_explicit(E::meta(), inner, request.sort(), overfetch, request.offset())?;
                (statement, fetch.clone())
            }
            _ => return Err(wrong_kind(operation, "not a select query").into()),
        };

        let rows = uow.select_entities(&statement, &fetch).await?;
        Ok(Slice::from_overfetch(rows, request))
    }

    /// Runs an explicit query whose first column is the result.
    pub async fn fetch_scalars<T>(&self, uow: &mut UnitOfWork, operation: &str, params: &Params) -> DbResult<Vec<T>>
    where
        T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite> + Send + Unpin,
    {
        let statement = self.explicit_statement(operation, params)?;
        uow.select_scalars(&statement).await
    }

    /// Runs an explicit query and maps each row onto `T` (a DTO).
    pub async fn fetch_projections<T>(
        &self,
        uow: &mut UnitOfWork,
        operation: &str,
        params: &Params,
    ) -> DbResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let statement = self.explicit_statement(operation, params)?;
        uow.select_projections(&statement).await
    }

    /// Runs a registered modifying statement. Returns affected rows.
    pub async fn modify(&self, uow: &mut UnitOfWork, operation: &str, params: &Params) -> DbResult<u64> {
        let QueryDefinition::Modifying { sql, options } = self.definition(operation)? else {
            return Err(wrong_kind(operation, "not a modifying query").into());
        };
        let statement = sql.bind(params)?;
        let affected = uow.execute_bulk(&statement).await?;
        if options.clear_automatically {
            uow.clear();
        }
        Ok(affected)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn base_plan(&self) -> Result<QueryPlan, QueryError> {
        let mut plan = QueryPlan::new(E::meta());
        for relation in &self.find_all_graph {
            plan = plan.fetch(relation.name)?;
        }
        Ok(plan)
    }

    fn explicit_statement(&self, operation: &str, params: &Params) -> DbResult<Statement> {
        match self.definition(operation)? {
            QueryDefinition::Explicit { sql, .. } => Ok(sql.bind(params)?),
            _ => Err(wrong_kind(operation, "only explicit queries return projections").into()),
        }
    }

    async fn page_plan(
        &self,
        uow: &mut UnitOfWork,
        plan: &QueryPlan,
        params: &Params,
        request: &PageRequest,
    ) -> DbResult<Page<E>> {
        let windowed = plan.clone().page(request);
        let statement = windowed.select(params)?;
        let content = uow.select_entities(&statement, windowed.fetched()).await?;

        let total = match request.infer_total(content.len()) {
            Some(total) => total,
            None => uow.select_count(&plan.count(params)?).await?,
        };
        Ok(Page::new(content, request, total))
    }
}

fn select_statement<'a>(
    operation: &str,
    definition: &'a QueryDefinition,
    params: &Params,
) -> Result<(Statement, &'a [&'static RelationMeta]), QueryError> {
    match definition {
        QueryDefinition::Derived {
            subject: Subject::Find,
            plan,
        } => Ok((plan.select(params)?, plan.fetched())),
        QueryDefinition::Derived { subject, .. } => Err(wrong_kind(
            operation,
            &format!("{:?} queries do not return entities", subject),
        )),
        QueryDefinition::Explicit { sql, fetch, .. } => Ok((fetch_explicit(sql.bind(params)?, fetch), fetch)),
        QueryDefinition::Modifying { .. } => Err(wrong_kind(operation, "modifying query")),
    }
}

fn wrong_kind(operation: &str, reason: &str) -> QueryError {
    QueryError::WrongQueryKind {
        name: operation.to_string(),
        reason: reason.to_string(),
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
    use roster_core::{Direction, Team};

    fn team_repository() -> Repository<Team> {
        Repository::<Team>::builder()
            .derived("findByName")
            .derived("countByName")
            .derived("existsByName")
            .derived("deleteByName")
            .derived("findByNameStartingWithOrderByNameDesc")
            .explicit("findNames", "SELECT t.name FROM team t ORDER BY t.name")
            .modifying("renameAll", "UPDATE team SET name = :name", Modifying::default())
            .build()
            .unwrap()
    }

    async fn seeded(db: &Database, repo: &Repository<Team>) -> UnitOfWork {
        let mut uow = db.begin().await.unwrap();
        for name in ["teamA", "teamB", "teamC", "other"] {
            repo.save(&mut uow, Team::new(name).unwrap()).await.unwrap();
        }
        uow
    }

    #[test]
    fn test_build_rejects_bad_registrations() {
        let err = Repository::<Team>::builder().derived("findByTitle").build().unwrap_err();
        assert!(matches!(err, DbError::Configuration { ref operation, .. } if operation == "findByTitle"));

        let err = Repository::<Team>::builder()
            .explicit("broken", "SELECT * FROM team WHERE name = ?")
            .build()
            .unwrap_err();
        assert!(matches!(err, DbError::Configuration { source: QueryError::InvalidSql(_), .. }));

        let err = Repository::<Team>::builder()
            .derived("findByName")
            .derived("findByName")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("registered more than once"));

        let err = Repository::<Team>::builder().entity_graph(&["members"]).build().unwrap_err();
        assert!(matches!(err, DbError::Configuration { source: QueryError::UnknownRelation { .. }, .. }));
    }

    #[test]
    fn test_named_query_takes_precedence() {
        let repo = Repository::<Team>::builder()
            .named_query("Team.findByName", "SELECT t.* FROM team t WHERE t.name = :name")
            .derived("findByName")
            .build()
            .unwrap();

        assert!(matches!(
            repo.definition("findByName").unwrap(),
            QueryDefinition::Explicit { .. }
        ));
        assert!(matches!(
            repo.definition("findByNickname"),
            Err(DbError::Query(QueryError::UnknownQuery(_)))
        ));
    }

    #[tokio::test]
    async fn test_crud_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = team_repository();
        let mut uow = seeded(&db, &repo).await;

        assert_eq!(repo.count(&mut uow).await.unwrap(), 4);
        let teams = repo.find_all_sorted(&mut uow, Sort::by(Direction::Asc, &["name"])).await.unwrap();
        assert_eq!(teams.first().map(Team::name), Some("other"));

        let team_a = repo
            .one(&mut uow, "findByName", &Params::new().bind("name", "teamA"))
            .await
            .unwrap()
            .unwrap();
        assert!(repo.exists_by_id(&mut uow, team_a.id().unwrap()).await.unwrap());

        repo.delete(&mut uow, &team_a).await.unwrap();
        assert_eq!(repo.count(&mut uow).await.unwrap(), 3);

        let err = repo.delete_by_id(&mut uow, 999).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        assert_eq!(repo.delete_all(&mut uow).await.unwrap(), 3);
        assert_eq!(repo.count(&mut uow).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count_exists_and_delete_queries() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = team_repository();
        let mut uow = seeded(&db, &repo).await;
        let params = Params::new().bind("name", "teamB");

        assert_eq!(repo.count_query(&mut uow, "countByName", &params).await.unwrap(), 1);
        assert!(repo.exists(&mut uow, "existsByName", &params).await.unwrap());
        assert_eq!(repo.delete_query(&mut uow, "deleteByName", &params).await.unwrap(), 1);
        assert!(!repo.exists(&mut uow, "existsByName", &params).await.unwrap());

        let err = repo.list(&mut uow, "countByName", &params).await.unwrap_err();
        assert!(matches!(err, DbError::Query(QueryError::WrongQueryKind { .. })));
    }

    #[tokio::test]
    async fn test_derived_order_and_scalars() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = team_repository();
        let mut uow = seeded(&db, &repo).await;

        let teams = repo
            .list(
                &mut uow,
                "findByNameStartingWithOrderByNameDesc",
                &Params::new().bind("name", "team"),
            )
            .await
            .unwrap();
        let names: Vec<&str> = teams.iter().map(Team::name).collect();
        assert_eq!(names, vec!["teamC", "teamB", "teamA"]);

        let names: Vec<String> = repo.fetch_scalars(&mut uow, "findNames", &Params::new()).await.unwrap();
        assert_eq!(names.len(), 4);
    }

    #[tokio::test]
    async fn test_find_page_by_criteria() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = team_repository();
        let mut uow = seeded(&db, &repo).await;

        let criteria = Criteria::new().value("name", Operator::StartingWith, "team");
        let request = PageRequest::of_sorted(0, 2, Sort::by(Direction::Asc, &["name"])).unwrap();
        let page = repo.find_page(&mut uow, criteria, &request).await.unwrap();

        assert_eq!(page.number_of_elements(), 2);
        assert_eq!(page.total_elements(), 3);
        assert_eq!(page.total_pages(), 2);
        assert!(page.has_next());
        assert_eq!(uow.stats().counts, 1);
    }

    #[tokio::test]
    async fn test_modify_runs_bulk_statement() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = team_repository();
        let mut uow = seeded(&db, &repo).await;

        let affected = repo
            .modify(&mut uow, "renameAll", &Params::new().bind("name", "same"))
            .await
            .unwrap();
        assert_eq!(affected, 4);

        let err = repo.modify(&mut uow, "findByName", &Params::new()).await.unwrap_err();
        assert!(matches!(err, DbError::Query(QueryError::WrongQueryKind { .. })));
    }
}
