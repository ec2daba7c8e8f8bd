use super::{Task, TaskSchedule};
use crate::entities::{task, task_participant};
use crate::store::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::*;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Fields of a task that is about to be stored for the first time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub project_id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub schedule: Option<TaskSchedule>,
}

/// Persistence contract for tasks and their participant links.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Returns the tasks of a project ordered by creation time, oldest first.
    /// Tasks created at the same instant are ordered by ID.
    async fn find_by_project(&self, project_id: Uuid) -> StoreResult<Vec<Task>>;

    /// Finds a task by ID, returning `None` when it does not exist.
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Task>>;

    /// Stores a new task and returns it with its generated ID and timestamps.
    async fn insert(&self, new_task: NewTask) -> StoreResult<Task>;

    /// Persists title, description and schedule of an existing task.
    async fn update(&self, task: &Task) -> StoreResult<Task>;

    /// Appends a participant to the task, after every participant already
    /// linked when the link is written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateParticipant`] when the link already
    /// exists.
    async fn add_participant(&self, task: &Task, participant_id: Uuid) -> StoreResult<Task>;

    /// Removes a task and its participant links.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}

pub struct SeaOrmTaskRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmTaskRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Loads the participant links of the given tasks, keyed by task ID.
    async fn participant_ids_by_task<C: ConnectionTrait>(
        db: &C,
        task_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Vec<Uuid>>> {
        let mut by_task: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        if task_ids.is_empty() {
            return Ok(by_task);
        }

        let links = task_participant::Entity::find()
            .filter(task_participant::Column::TaskId.is_in(task_ids.iter().copied()))
            .order_by_asc(task_participant::Column::Position)
            .all(db)
            .await?;
        for link in links {
            by_task
                .entry(link.task_id)
                .or_default()
                .push(link.participant_id);
        }
        Ok(by_task)
    }

    async fn reload<C: ConnectionTrait>(db: &C, id: Uuid) -> StoreResult<Option<Task>> {
        let Some(model) = task::Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };
        let participant_ids = Self::participant_ids_by_task(db, &[id])
            .await?
            .remove(&id)
            .unwrap_or_default();
        task_from_model(model, participant_ids).map(Some)
    }
}

fn task_from_model(model: task::Model, participant_ids: Vec<Uuid>) -> StoreResult<Task> {
    let schedule = match (model.starts_at, model.ends_at) {
        (None, None) => None,
        (Some(start), Some(end)) => Some(TaskSchedule::new(start, end).map_err(|_| {
            StoreError::InvalidPersistedData(format!("task {} ends before it starts", model.id))
        })?),
        _ => {
            return Err(StoreError::InvalidPersistedData(format!(
                "task {} has only one of start and end",
                model.id
            )));
        }
    };

    Ok(Task {
        id: model.id,
        project_id: model.project_id,
        creator_id: model.creator_id,
        title: model.title,
        description: model.description,
        schedule,
        participant_ids,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

#[async_trait]
impl TaskRepository for SeaOrmTaskRepository {
    #[tracing::instrument(skip(self))]
    async fn find_by_project(&self, project_id: Uuid) -> StoreResult<Vec<Task>> {
        let models = task::Entity::find()
            .filter(task::Column::ProjectId.eq(project_id))
            .order_by_asc(task::Column::CreatedAt)
            .order_by_asc(task::Column::Id)
            .all(self.db.as_ref())
            .await?;

        let task_ids: Vec<Uuid> = models.iter().map(|model| model.id).collect();
        let mut links = Self::participant_ids_by_task(self.db.as_ref(), &task_ids).await?;

        models
            .into_iter()
            .map(|model| {
                let participant_ids = links.remove(&model.id).unwrap_or_default();
                task_from_model(model, participant_ids)
            })
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Self::reload(self.db.as_ref(), id).await
    }

    #[tracing::instrument(skip(self))]
    async fn insert(&self, new_task: NewTask) -> StoreResult<Task> {
        let now = Utc::now();
        let active_model = task::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            project_id: ActiveValue::Set(new_task.project_id),
            creator_id: ActiveValue::Set(new_task.creator_id),
            title: ActiveValue::Set(new_task.title),
            description: ActiveValue::Set(new_task.description),
            starts_at: ActiveValue::Set(new_task.schedule.map(|schedule| schedule.start())),
            ends_at: ActiveValue::Set(new_task.schedule.map(|schedule| schedule.end())),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };
        let created_model = active_model.insert(self.db.as_ref()).await?;
        task_from_model(created_model, Vec::new())
    }

    #[tracing::instrument(skip(self, task), fields(task = %task.id))]
    async fn update(&self, task: &Task) -> StoreResult<Task> {
        let active_model = task::ActiveModel {
            id: ActiveValue::Unchanged(task.id),
            title: ActiveValue::Set(task.title.clone()),
            description: ActiveValue::Set(task.description.clone()),
            starts_at: ActiveValue::Set(task.schedule.map(|schedule| schedule.start())),
            ends_at: ActiveValue::Set(task.schedule.map(|schedule| schedule.end())),
            updated_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        };
        let updated_model = active_model.update(self.db.as_ref()).await?;
        task_from_model(updated_model, task.participant_ids.clone())
    }

    #[tracing::instrument(skip(self, task), fields(task = %task.id))]
    async fn add_participant(&self, task: &Task, participant_id: Uuid) -> StoreResult<Task> {
        let txn = self.db.begin().await?;

        // Serializes concurrent adds to the same task.
        task::Entity::find_by_id(task.id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| StoreError::InvalidPersistedData(format!("task {} vanished", task.id)))?;

        let already_linked = task_participant::Entity::find_by_id((task.id, participant_id))
            .one(&txn)
            .await?
            .is_some();
        if already_linked {
            return Err(StoreError::DuplicateParticipant {
                task_id: task.id,
                participant_id,
            });
        }

        let last_position = task_participant::Entity::find()
            .select_only()
            .column_as(task_participant::Column::Position.max(), "last_position")
            .filter(task_participant::Column::TaskId.eq(task.id))
            .into_tuple::<Option<i32>>()
            .one(&txn)
            .await?
            .flatten();
        let position = match last_position {
            None => 0,
            Some(last) => last.checked_add(1).ok_or_else(|| {
                StoreError::InvalidPersistedData(format!(
                    "task {} has too many participants",
                    task.id
                ))
            })?,
        };

        let link = task_participant::ActiveModel {
            task_id: ActiveValue::Set(task.id),
            participant_id: ActiveValue::Set(participant_id),
            position: ActiveValue::Set(position),
        };
        if let Err(err) = task_participant::Entity::insert(link)
            .exec_without_returning(&txn)
            .await
        {
            return Err(match err.sql_err() {
                // The position index is the other unique key on this table.
                Some(SqlErr::UniqueConstraintViolation(message)) if !message.contains("position") => {
                    StoreError::DuplicateParticipant {
                        task_id: task.id,
                        participant_id,
                    }
                }
                _ => StoreError::Database(err),
            });
        }

        task::ActiveModel {
            id: ActiveValue::Unchanged(task.id),
            updated_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .update(&txn)
        .await?;

        let updated = Self::reload(&txn, task.id).await?.ok_or_else(|| {
            StoreError::InvalidPersistedData(format!("task {} vanished", task.id))
        })?;
        txn.commit().await?;
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let txn = self.db.begin().await?;
        task_participant::Entity::delete_many()
            .filter(task_participant::Column::TaskId.eq(id))
            .exec(&txn)
            .await?;
        task::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;
        Ok(())
    }
}
