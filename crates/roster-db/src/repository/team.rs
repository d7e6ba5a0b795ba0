//! # Team Repository
//!
//! Team CRUD plus explicit loading of a team's member collection.

use std::ops::Deref;

use roster_core::{CoreError, Member, Team};
use tracing::debug;

use super::Repository;
use crate::error::DbResult;
use crate::query::Params;
use crate::unit_of_work::UnitOfWork;

/// Team operations. Dereferences to [`Repository<Team>`].
#[derive(Debug)]
pub struct TeamRepository {
    inner: Repository<Team>,
    members: Repository<Member>,
}

impl Deref for TeamRepository {
    type Target = Repository<Team>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl TeamRepository {
    pub fn new() -> DbResult<Self> {
        let inner = Repository::<Team>::builder().derived("findByName").build()?;
        let members = Repository::<Member>::builder()
            .derived("findByTeamOrderByIdAsc")
            .build()?;

        Ok(TeamRepository { inner, members })
    }

    pub async fn find_by_name(&self, uow: &mut UnitOfWork, name: &str) -> DbResult<Vec<Team>> {
        self.list(uow, "findByName", &Params::new().bind("name", name)).await
    }

    /// Fills `team.members()` from the store.
    ///
    /// ## Errors
    /// `Mapping(TransientReference)` when the team has not been saved.
    pub async fn load_members(&self, uow: &mut UnitOfWork, team: &mut Team) -> DbResult<()> {
        let id = team.id().ok_or(CoreError::TransientReference { entity: "Team" })?;
        let members = self
            .members
            .list(uow, "findByTeamOrderByIdAsc", &Params::new().bind("team", id))
            .await?;

        debug!(team = id, members = members.len(), "Loaded team members");
        team.resolve_members(members)?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_load_members() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let teams = TeamRepository::new().unwrap();
        let mut uow = db.begin().await.unwrap();

        let mut team_a = teams.save(&mut uow, Team::new("teamA").unwrap()).await.unwrap();
        let mut team_b = teams.save(&mut uow, Team::new("teamB").unwrap()).await.unwrap();
        uow.save(Member::with_team("member1", 10, &mut team_a).unwrap()).await.unwrap();
        uow.save(Member::with_team("member2", 20, &mut team_a).unwrap()).await.unwrap();
        uow.save(Member::with_team("member3", 30, &mut team_b).unwrap()).await.unwrap();

        let mut loaded = teams
            .find_by_name(&mut uow, "teamA")
            .await
            .unwrap()
            .pop()
            .unwrap();
        assert!(!loaded.members().is_loaded());

        teams.load_members(&mut uow, &mut loaded).await.unwrap();
        let usernames: Vec<&str> = loaded
            .members()
            .get()
            .unwrap()
            .iter()
            .map(Member::username)
            .collect();
        assert_eq!(usernames, vec!["member1", "member2"]);
    }

    #[tokio::test]
    async fn test_load_members_requires_saved_team() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let teams = TeamRepository::new().unwrap();
        let mut uow = db.begin().await.unwrap();

        let mut team = Team::new("teamA").unwrap();
        assert!(teams.load_members(&mut uow, &mut team).await.is_err());
    }
}
