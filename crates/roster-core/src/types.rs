//! # Domain Types
//!
//! Entities and projections used throughout Roster.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────────┐   team_id   ┌─────────────────────┐           │
//! │  │       Member        │ ──────────► │        Team         │           │
//! │  │  ─────────────────  │  (owning)   │  ─────────────────  │           │
//! │  │  id (generated)     │             │  id (generated)     │           │
//! │  │  username           │ ◄────────── │  name               │           │
//! │  │  age (>= 0)         │  members    │  members (lazy)     │           │
//! │  │  team: Reference    │ (non-owning)│                     │           │
//! │  └─────────────────────┘             └─────────────────────┘           │
//! │                                                                         │
//! │  ┌─────────────────────┐                                               │
//! │  │     MemberDto       │  id, username, team_name                      │
//! │  │  (read-only join)   │                                               │
//! │  └─────────────────────┘                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Mutation Rules
//! Fields are private. Entities change only through named operations
//! (`change_team`, `change_username`, `change_age`, `rename`) so that the
//! invariants live in one place.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, EntityMeta, FieldKind, FieldMeta, Record, RelationMeta};
use crate::error::{CoreError, CoreResult};
use crate::lazy::{Lazy, Reference};
use crate::validation::{validate_age, validate_team_name, validate_username};

// =============================================================================
// Table Mappings
// =============================================================================

/// Mapping of [`Team`] onto the `team` table.
pub static TEAM_META: EntityMeta = EntityMeta {
    name: "Team",
    table: "team",
    id: FieldMeta {
        name: "id",
        column: "team_id",
        kind: FieldKind::Integer,
    },
    fields: &[FieldMeta {
        name: "name",
        column: "name",
        kind: FieldKind::Text,
    }],
    relations: &[],
};

/// Mapping of [`Member`] onto the `member` table.
pub static MEMBER_META: EntityMeta = EntityMeta {
    name: "Member",
    table: "member",
    id: FieldMeta {
        name: "id",
        column: "member_id",
        kind: FieldKind::Integer,
    },
    fields: &[
        FieldMeta {
            name: "username",
            column: "username",
            kind: FieldKind::Text,
        },
        FieldMeta {
            name: "age",
            column: "age",
            kind: FieldKind::Integer,
        },
        FieldMeta {
            name: "team",
            column: "team_id",
            kind: FieldKind::Reference,
        },
    ],
    relations: &[RelationMeta {
        name: "team",
        column: "team_id",
        target: &TEAM_META,
    }],
};

// =============================================================================
// Member
// =============================================================================

/// A member, optionally belonging to one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    id: Option<EntityId>,
    username: String,
    age: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    team: Option<Reference<Team>>,
}

impl Member {
    /// Creates a member with age 0 and no team.
    pub fn new(username: impl Into<String>) -> CoreResult<Self> {
        Self::with_age(username, 0)
    }

    /// Creates a member with an age and no team.
    ///
    /// ## Example
    /// ```rust
    /// use roster_core::Member;
    ///
    /// let member = Member::with_age("member1", 10).unwrap();
    /// assert_eq!(member.age(), 10);
    /// assert!(member.id().is_none());
    /// assert!(Member::with_age("", 10).is_err());
    /// ```
    pub fn with_age(username: impl Into<String>, age: u32) -> CoreResult<Self> {
        let username = username.into();
        validate_username(&username)?;

        Ok(Member {
            id: None,
            username,
            age,
            team: None,
        })
    }

    /// Creates a member and associates it with `team` (both sides).
    ///
    /// ## Errors
    /// `CoreError::TransientReference` when the team has not been saved.
    pub fn with_team(username: impl Into<String>, age: u32, team: &mut Team) -> CoreResult<Self> {
        let mut member = Self::with_age(username, age)?;
        member.change_team(team)?;
        Ok(member)
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    /// The team association, loaded or not.
    pub fn team(&self) -> Option<&Reference<Team>> {
        self.team.as_ref()
    }

    /// Mutable access for resolving the reference; identities are still checked.
    pub fn team_mut(&mut self) -> Option<&mut Reference<Team>> {
        self.team.as_mut()
    }

    pub fn team_id(&self) -> Option<EntityId> {
        self.team.as_ref().map(Reference::id)
    }

    /// Moves this member into `team`, updating the team's collection as well.
    ///
    /// ## Association Flow
    /// ```text
    /// member.change_team(&mut team)
    ///   ├── member.team   = Reference(team.id, loaded)
    ///   └── team.members += member   (only if the collection is loaded)
    /// ```
    ///
    /// A team whose collection was never loaded stays `NotLoaded`; the next
    /// explicit load reads the member from the store.
    pub fn change_team(&mut self, team: &mut Team) -> CoreResult<()> {
        self.team = Some(Reference::loaded(team.detached())?);
        team.admit(self);
        Ok(())
    }

    pub fn change_username(&mut self, username: impl Into<String>) -> CoreResult<()> {
        let username = username.into();
        validate_username(&username)?;
        self.username = username;
        Ok(())
    }

    pub fn change_age(&mut self, age: u32) {
        self.age = age;
    }
}

impl Entity for Member {
    fn meta() -> &'static EntityMeta {
        &MEMBER_META
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new()
            .with("username", self.username.as_str())
            .with("age", self.age)
            .with("team", self.team_id());
        if let Some(id) = self.id {
            record.insert("id", id);
        }
        record
    }

    fn from_record(record: &Record) -> CoreResult<Self> {
        let id = record.required_integer("Member", "id")?;
        let username = record.required_text("Member", "username")?;
        validate_username(&username)?;
        let age = validate_age(record.required_integer("Member", "age")?)?;
        let team = record.integer("Member", "team")?.map(Reference::unloaded);

        Ok(Member {
            id: Some(id),
            username,
            age,
            team,
        })
    }

    fn attach(&mut self, relation: &str, target: &Record) -> CoreResult<()> {
        if relation != "team" {
            return Err(CoreError::UnknownRelation {
                entity: "Member",
                relation: relation.to_string(),
            });
        }

        let team = Team::from_record(target)?;
        match self.team.as_mut() {
            Some(reference) => {
                reference.resolve(team)?;
            }
            None => self.team = Some(Reference::loaded(team)?),
        }
        Ok(())
    }
}

// =============================================================================
// Team
// =============================================================================

/// A team. The member collection is the non-owning side of `Member.team`.
#[derive(Debug, Clone, Serialize)]
pub struct Team {
    id: Option<EntityId>,
    name: String,
    members: Lazy<Vec<Member>>,
}

impl Team {
    /// Creates a new team. Its (empty) member collection counts as loaded.
    pub fn new(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        validate_team_name(&name)?;

        Ok(Team {
            id: None,
            name,
            members: Lazy::Loaded(Vec::new()),
        })
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members of this team, if the collection has been loaded.
    pub fn members(&self) -> &Lazy<Vec<Member>> {
        &self.members
    }

    pub fn rename(&mut self, name: impl Into<String>) -> CoreResult<()> {
        let name = name.into();
        validate_team_name(&name)?;
        self.name = name;
        Ok(())
    }

    /// Installs the loaded member collection.
    ///
    /// ## Errors
    /// `CoreError::ReferenceMismatch` if any member points at another team.
    pub fn resolve_members(&mut self, members: Vec<Member>) -> CoreResult<()> {
        let id = self.id.ok_or(CoreError::TransientReference { entity: "Team" })?;

        if let Some(stray) = members.iter().find(|member| member.team_id() != Some(id)) {
            return Err(CoreError::ReferenceMismatch {
                entity: "Team",
                expected: id,
                actual: stray.team_id(),
            });
        }

        self.members = Lazy::Loaded(members);
        Ok(())
    }

    /// Copy without the member collection, used as the target of a reference.
    fn detached(&self) -> Team {
        Team {
            id: self.id,
            name: self.name.clone(),
            members: Lazy::NotLoaded,
        }
    }

    /// Reciprocal half of `Member::change_team`.
    fn admit(&mut self, member: &Member) {
        let Some(members) = self.members.get_mut() else {
            return;
        };

        if let Some(id) = member.id {
            members.retain(|existing| existing.id != Some(id));
        }
        members.push(member.clone());
    }
}

impl PartialEq for Team {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl Eq for Team {}

impl Entity for Team {
    fn meta() -> &'static EntityMeta {
        &TEAM_META
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new().with("name", self.name.as_str());
        if let Some(id) = self.id {
            record.insert("id", id);
        }
        record
    }

    fn from_record(record: &Record) -> CoreResult<Self> {
        let id = record.required_integer("Team", "id")?;
        let name = record.required_text("Team", "name")?;
        validate_team_name(&name)?;

        Ok(Team {
            id: Some(id),
            name,
            members: Lazy::NotLoaded,
        })
    }
}

// =============================================================================
// MemberDto
// =============================================================================

/// Read-only projection of a member and its team name.
///
/// Built by a join query so that list screens do not pull whole entity
/// graphs. `team_name` is `None` for members without a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub id: EntityId,
    pub username: String,
    pub team_name: Option<String>,
}

impl MemberDto {
    pub fn new(id: EntityId, username: impl Into<String>, team_name: Option<String>) -> Self {
        MemberDto {
            id,
            username: username.into(),
            team_name,
        }
    }

    /// Summarizes a saved member. The team name is taken from the loaded
    /// reference, if any.
    pub fn from_member(member: &Member) -> CoreResult<Self> {
        let id = member
            .id()
            .ok_or(CoreError::TransientReference { entity: "Member" })?;
        let team_name = member
            .team()
            .and_then(Reference::get)
            .map(|team| team.name().to_string());

        Ok(MemberDto::new(id, member.username(), team_name))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn saved_team(id: EntityId, name: &str) -> Team {
        Team::from_record(&Record::new().with("id", id).with("name", name)).unwrap()
    }

    fn saved_member(id: EntityId, username: &str, age: i64, team: Option<i64>) -> Member {
        Member::from_record(
            &Record::new()
                .with("id", id)
                .with("username", username)
                .with("age", age)
                .with("team", team),
        )
        .unwrap()
    }

    #[test]
    fn test_member_requires_username() {
        assert!(Member::new("memberA").is_ok());
        assert!(matches!(
            Member::new(""),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_change_team_updates_both_sides() {
        let mut team = saved_team(1, "teamA");
        team.resolve_members(Vec::new()).unwrap();

        let mut member = Member::with_age("member1", 10).unwrap();
        member.change_team(&mut team).unwrap();

        assert_eq!(member.team_id(), Some(1));
        assert_eq!(member.team().and_then(Reference::get).map(Team::name), Some("teamA"));

        let members = team.members().get().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].username(), "member1");
    }

    #[test]
    fn test_change_team_does_not_duplicate_saved_member() {
        let mut team = saved_team(1, "teamA");
        team.resolve_members(Vec::new()).unwrap();

        let mut member = saved_member(5, "member1", 10, None);
        member.change_team(&mut team).unwrap();
        member.change_team(&mut team).unwrap();

        assert_eq!(team.members().get().map(Vec::len), Some(1));
    }

    #[test]
    fn test_change_team_requires_saved_team() {
        let mut team = Team::new("teamA").unwrap();
        let mut member = Member::new("member1").unwrap();

        let err = member.change_team(&mut team).unwrap_err();
        assert!(matches!(err, CoreError::TransientReference { entity: "Team" }));
        assert!(member.team().is_none());
    }

    #[test]
    fn test_change_team_leaves_unloaded_collection_alone() {
        let mut team = saved_team(2, "teamB");
        let mut member = Member::new("member1").unwrap();

        member.change_team(&mut team).unwrap();

        assert!(!team.members().is_loaded());
        assert_eq!(member.team_id(), Some(2));
    }

    #[test]
    fn test_member_record_round_trip() {
        let member = saved_member(3, "AAA", 20, Some(9));
        let record = member.to_record();

        assert_eq!(record.get("team"), Some(&crate::Value::Integer(9)));
        assert_eq!(Member::from_record(&record).unwrap(), member);
    }

    #[test]
    fn test_transient_member_record_has_no_id() {
        let member = Member::with_age("AAA", 20).unwrap();
        assert!(member.to_record().get("id").is_none());
        assert!(Member::from_record(&member.to_record()).is_err());
    }

    #[test]
    fn test_from_record_rejects_negative_age() {
        let record = Record::new()
            .with("id", 1i64)
            .with("username", "AAA")
            .with("age", -1i64)
            .with("team", None::<i64>);
        assert!(Member::from_record(&record).is_err());
    }

    #[test]
    fn test_attach_resolves_team() {
        let mut member = saved_member(3, "AAA", 20, Some(9));
        let team_record = Record::new().with("id", 9i64).with("name", "teamA");

        member.attach("team", &team_record).unwrap();
        assert_eq!(
            member.team().and_then(Reference::get).map(Team::name),
            Some("teamA")
        );

        let other = Record::new().with("id", 10i64).with("name", "teamB");
        assert!(member.attach("team", &other).is_err());
        assert!(member.attach("club", &team_record).is_err());
    }

    #[test]
    fn test_resolve_members_rejects_foreign_member() {
        let mut team = saved_team(1, "teamA");
        let stray = saved_member(2, "BBB", 10, Some(7));

        assert!(team.resolve_members(vec![stray]).is_err());
        assert!(!team.members().is_loaded());
    }

    #[test]
    fn test_member_dto_from_member() {
        let mut team = saved_team(1, "teamA");
        let mut member = saved_member(4, "AAA", 10, None);
        member.change_team(&mut team).unwrap();

        let dto = MemberDto::from_member(&member).unwrap();
        assert_eq!(dto, MemberDto::new(4, "AAA", Some("teamA".to_string())));

        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["teamName"], "teamA");
    }

    #[test]
    fn test_team_equality_ignores_members() {
        let a = saved_team(1, "teamA");
        let mut b = saved_team(1, "teamA");
        b.resolve_members(Vec::new()).unwrap();
        assert_eq!(a, b);
    }
}
