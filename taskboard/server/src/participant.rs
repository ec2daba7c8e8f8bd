//! Project membership records.
//!
//! Participants are owned by the wider project-management application. This
//! service only reads them: to decide whether a caller may touch a project's
//! tasks, and to resolve the people assigned to a task.

use crate::entities::participant;
use crate::store::StoreResult;
use async_trait::async_trait;
use sea_orm::*;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub struct Participant {
    id: Uuid,
    project_id: Uuid,
    user_id: Uuid,
    active: bool,
}

impl Participant {
    pub fn new(id: Uuid, project_id: Uuid, user_id: Uuid, active: bool) -> Self {
        Self {
            id,
            project_id,
            user_id,
            active,
        }
    }

    /// Returns the ID of the participant record.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the project this membership belongs to.
    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    /// Returns the user this membership belongs to.
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl From<participant::Model> for Participant {
    fn from(model: participant::Model) -> Self {
        Participant::new(model.id, model.project_id, model.user_id, model.active)
    }
}

/// Read access to project participants.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    /// Finds the participant with the given ID, but only within `project_id`.
    async fn find_in_project(
        &self,
        project_id: Uuid,
        participant_id: Uuid,
    ) -> StoreResult<Option<Participant>>;

    /// Finds the active membership of `user_id` in `project_id`, if any.
    async fn find_active_for_user(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Participant>>;

    /// Finds every participant whose ID is in `ids`. Unknown IDs are skipped.
    async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Participant>>;
}

pub struct SeaOrmParticipantRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmParticipantRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ParticipantRepository for SeaOrmParticipantRepository {
    #[tracing::instrument(skip(self))]
    async fn find_in_project(
        &self,
        project_id: Uuid,
        participant_id: Uuid,
    ) -> StoreResult<Option<Participant>> {
        let model = participant::Entity::find()
            .filter(participant::Column::Id.eq(participant_id))
            .filter(participant::Column::ProjectId.eq(project_id))
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Participant::from))
    }

    #[tracing::instrument(skip(self))]
    async fn find_active_for_user(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Participant>> {
        let model = participant::Entity::find()
            .filter(participant::Column::ProjectId.eq(project_id))
            .filter(participant::Column::UserId.eq(user_id))
            .filter(participant::Column::Active.eq(true))
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Participant::from))
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Participant>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let participants = participant::Entity::find()
            .filter(participant::Column::Id.is_in(ids.iter().copied()))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(Participant::from)
            .collect();
        Ok(participants)
    }
}
