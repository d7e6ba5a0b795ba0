//! # Member Repository
//!
//! Typed member operations on top of [`Repository<Member>`].
//!
//! ## Query Catalogue
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Kind        Operation                          Returns                │
//! │  ─────────   ───────────────────────────────    ─────────────────────  │
//! │  derived     findByUsernameAndAgeGreaterThan    Vec<Member>            │
//! │  named       Member.findByUsername              Vec<Member>            │
//! │  explicit    findUser                           Vec<Member>            │
//! │  scalar      findUsernameList                   Vec<String>            │
//! │  dto         findMemberDto                      Vec<MemberDto>         │
//! │  IN list     findByNames                        Vec<Member>            │
//! │  derived     findListByUsername                 Vec<Member>            │
//! │  derived     findMemberByUsername               Option<Member>         │
//! │  derived     findOptionalByUsername             Option<Member>         │
//! │  paged       findByAge (+ count query)          Page<Member>           │
//! │  derived     findMemberSliceByAge               Slice<Member>          │
//! │  modifying   bulkAgePlus (clears)               u64                    │
//! │  fetch join  findMemberFetchJoin                Vec<Member> + team     │
//! │  graph       findAll / findMemberEntityGraph    Vec<Member> + team     │
//! │  graph       findEntityGraphByUsername          Vec<Member> + team     │
//! │  explicit    findByPage / totalCount            Vec<Member> / u64      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::ops::Deref;

use roster_core::{Entity, Member, MemberDto, Page, PageRequest, Slice, Team};
use tracing::debug;

use super::Repository;
use crate::bulk::Modifying;
use crate::error::{DbError, DbResult};
use crate::query::Params;
use crate::unit_of_work::UnitOfWork;

const FIND_BY_USERNAME: &str = "SELECT m.* FROM member m WHERE m.username = :username";

const FIND_USER: &str = "SELECT m.* FROM member m WHERE m.username = :username AND m.age = :age";

const FIND_USERNAME_LIST: &str = "SELECT m.username FROM member m";

const FIND_MEMBER_DTO: &str = "SELECT m.member_id AS id, m.username, t.name AS team_name \
     FROM member m INNER JOIN team t ON t.team_id = m.team_id";

const FIND_BY_NAMES: &str = "SELECT m.* FROM member m WHERE m.username IN :names";

const FIND_BY_AGE: &str = "SELECT m.* FROM member m LEFT JOIN team t ON t.team_id = m.team_id \
     WHERE m.age = :age";

const COUNT_BY_AGE: &str = "SELECT COUNT(m.member_id) FROM member m WHERE m.age = :age";

const BULK_AGE_PLUS: &str = "UPDATE member SET age = age + 1 WHERE age >= :age";

const ALL_MEMBERS: &str = "SELECT m.* FROM member m";

const FIND_BY_PAGE: &str = "SELECT m.* FROM member m WHERE m.age = :age \
     ORDER BY m.username DESC LIMIT :limit OFFSET :offset";

const TOTAL_COUNT: &str = "SELECT COUNT(m.member_id) FROM member m WHERE m.age = :age";

/// Member operations.
///
/// Dereferences to [`Repository<Member>`] for CRUD; `find_all` fetches each
/// member's team.
#[derive(Debug)]
pub struct MemberRepository {
    inner: Repository<Member>,
}

impl Deref for MemberRepository {
    type Target = Repository<Member>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl MemberRepository {
    /// Registers and validates every member query.
    pub fn new() -> DbResult<Self> {
        let inner = Repository::<Member>::builder()
            .named_query("Member.findByUsername", FIND_BY_USERNAME)
            .named_entity_graph("Member.all", &["team"])
            .entity_graph(&["team"])
            .derived("findByUsernameAndAgeGreaterThan")
            .derived("findByUsername")
            .explicit("findUser", FIND_USER)
            .explicit("findUsernameList", FIND_USERNAME_LIST)
            .explicit("findMemberDto", FIND_MEMBER_DTO)
            .explicit("findByNames", FIND_BY_NAMES)
            .derived("findListByUsername")
            .derived("findMemberByUsername")
            .derived("findOptionalByUsername")
            .paged("findByAge", FIND_BY_AGE, COUNT_BY_AGE)
            .derived("findMemberSliceByAge")
            .modifying("bulkAgePlus", BULK_AGE_PLUS, Modifying::clearing())
            .explicit_fetching("findMemberFetchJoin", ALL_MEMBERS, &["team"])
            .explicit_fetching("findMemberEntityGraph", ALL_MEMBERS, &["team"])
            .derived_fetching("findEntityGraphByUsername", &["team"])
            .derived_with_graph("findNamedEntityGraphByUsername", "Member.all")
            .explicit("findByPage", FIND_BY_PAGE)
            .explicit("totalCount", TOTAL_COUNT)
            .build()?;

        Ok(MemberRepository { inner })
    }

    pub async fn find_by_username_and_age_greater_than(
        &self,
        uow: &mut UnitOfWork,
        username: &str,
        age: u32,
    ) -> DbResult<Vec<Member>> {
        let params = Params::new().bind("username", username).bind("age", age);
        self.list(uow, "findByUsernameAndAgeGreaterThan", &params).await
    }

    /// Runs the named query `Member.findByUsername`.
    pub async fn find_by_username(&self, uow: &mut UnitOfWork, username: &str) -> DbResult<Vec<Member>> {
        self.list(uow, "findByUsername", &Params::new().bind("username", username))
            .await
    }

    pub async fn find_user(&self, uow: &mut UnitOfWork, username: &str, age: u32) -> DbResult<Vec<Member>> {
        let params = Params::new().bind("username", username).bind("age", age);
        self.list(uow, "findUser", &params).await
    }

    pub async fn find_username_list(&self, uow: &mut UnitOfWork) -> DbResult<Vec<String>> {
        self.fetch_scalars(uow, "findUsernameList", &Params::new()).await
    }

    /// Members that belong to a team, with the team name.
    pub async fn find_member_dto(&self, uow: &mut UnitOfWork) -> DbResult<Vec<MemberDto>> {
        self.fetch_projections(uow, "findMemberDto", &Params::new()).await
    }

    /// Members whose username is in `names`. An empty list matches nothing.
    pub async fn find_by_names(&self, uow: &mut UnitOfWork, names: &[&str]) -> DbResult<Vec<Member>> {
        let params = Params::new().bind_list("names", names.iter().copied());
        self.list(uow, "findByNames", &params).await
    }

    pub async fn find_list_by_username(&self, uow: &mut UnitOfWork, username: &str) -> DbResult<Vec<Member>> {
        self.list(uow, "findListByUsername", &Params::new().bind("username", username))
            .await
    }

    /// Single-result lookup; `NonUniqueResult` if the username is shared.
    pub async fn find_member_by_username(&self, uow: &mut UnitOfWork, username: &str) -> DbResult<Option<Member>> {
        self.one(uow, "findMemberByUsername", &Params::new().bind("username", username))
            .await
    }

    pub async fn find_optional_by_username(
        &self,
        uow: &mut UnitOfWork,
        username: &str,
    ) -> DbResult<Option<Member>> {
        self.one(uow, "findOptionalByUsername", &Params::new().bind("username", username))
            .await
    }

    /// Members of one age, paged. The count query skips the team join.
    pub async fn find_by_age(&self, uow: &mut UnitOfWork, age: u32, request: &PageRequest) -> DbResult<Page<Member>> {
        self.page(uow, "findByAge", &Params::new().bind("age", age), request)
            .await
    }

    pub async fn find_member_slice_by_age(
        &self,
        uow: &mut UnitOfWork,
        age: u32,
        request: &PageRequest,
    ) -> DbResult<Slice<Member>> {
        self.slice(uow, "findMemberSliceByAge", &Params::new().bind("age", age), request)
            .await
    }

    /// Adds one to the age of every member at least `age` old.
    ///
    /// Clears the unit of work afterwards, so later reads see the new ages.
    pub async fn bulk_age_plus(&self, uow: &mut UnitOfWork, age: u32) -> DbResult<u64> {
        let affected = self
            .modify(uow, "bulkAgePlus", &Params::new().bind("age", age))
            .await?;
        debug!(age, affected, "bulkAgePlus");
        Ok(affected)
    }

    /// Every member with its team loaded in the same statement.
    pub async fn find_member_fetch_join(&self, uow: &mut UnitOfWork) -> DbResult<Vec<Member>> {
        self.list(uow, "findMemberFetchJoin", &Params::new()).await
    }

    /// Every member with its team, through an explicit query plus graph.
    pub async fn find_all_with_team(&self, uow: &mut UnitOfWork) -> DbResult<Vec<Member>> {
        self.list(uow, "findMemberEntityGraph", &Params::new()).await
    }

    pub async fn find_entity_graph_by_username(&self, uow: &mut UnitOfWork, username: &str) -> DbResult<Vec<Member>> {
        self.list(uow, "findEntityGraphByUsername", &Params::new().bind("username", username))
            .await
    }

    pub async fn find_named_entity_graph_by_username(
        &self,
        uow: &mut UnitOfWork,
        username: &str,
    ) -> DbResult<Vec<Member>> {
        self.list(
            uow,
            "findNamedEntityGraphByUsername",
            &Params::new().bind("username", username),
        )
        .await
    }

    /// Manual paging: members of `age`, username descending.
    pub async fn find_by_page(
        &self,
        uow: &mut UnitOfWork,
        age: u32,
        offset: u64,
        limit: u64,
    ) -> DbResult<Vec<Member>> {
        let params = Params::new()
            .bind("age", age)
            .bind("offset", i64::try_from(offset).unwrap_or(i64::MAX))
            .bind("limit", i64::try_from(limit).unwrap_or(i64::MAX));
        self.list(uow, "findByPage", &params).await
    }

    pub async fn total_count(&self, uow: &mut UnitOfWork, age: u32) -> DbResult<u64> {
        let counts: Vec<i64> = self
            .fetch_scalars(uow, "totalCount", &Params::new().bind("age", age))
            .await?;
        Ok(counts.first().copied().map_or(0, |count| u64::try_from(count).unwrap_or(0)))
    }

    /// Loads the member's team if it has one and it is not loaded yet.
    ///
    /// ## Errors
    /// `NotFound` when the referenced team row is gone.
    pub async fn load_team(&self, uow: &mut UnitOfWork, member: &mut Member) -> DbResult<()> {
        let Some(team_id) = member.team_id() else {
            return Ok(());
        };
        if member.team().is_some_and(|team| team.is_loaded()) {
            return Ok(());
        }

        let team: Team = uow
            .find(team_id)
            .await?
            .ok_or_else(|| DbError::not_found(Team::meta().name, team_id))?;
        if let Some(reference) = member.team_mut() {
            reference.resolve(team)?;
        }
        Ok(())
    }
}
