use crate::participant::{Participant, ParticipantRepository, SeaOrmParticipantRepository};
use crate::store::{StoreError, StoreResult};
use crate::user::{SeaOrmUserRepository, User, UserRepository};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

pub mod api;
pub mod repository;
pub mod validation;

pub use repository::{NewTask, SeaOrmTaskRepository, TaskRepository};
pub use validation::{TaskChanges, TaskDraft};

/// Start and end of a task. Both are always present together and the end
/// never precedes the start.
#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub struct TaskSchedule {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TaskSchedule {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TaskServiceError> {
        if end < start {
            return Err(TaskServiceError::EndDateBeforeStart);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Task {
    id: Uuid,
    project_id: Uuid,
    creator_id: Uuid,
    title: String,
    description: Option<String>,
    schedule: Option<TaskSchedule>,
    participant_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    /// Returns the ID of the task.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the project owning the task.
    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    /// Returns the user who created the task.
    pub fn creator_id(&self) -> Uuid {
        self.creator_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn schedule(&self) -> Option<TaskSchedule> {
        self.schedule
    }

    /// Returns the assigned participants in the order they were added.
    pub fn participant_ids(&self) -> &[Uuid] {
        &self.participant_ids
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// A participant of a task together with the user behind it.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct AssignedParticipant {
    participant: Participant,
    user: User,
}

impl AssignedParticipant {
    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn user(&self) -> &User {
        &self.user
    }
}

/// A task with its creator and participants resolved to full records.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct PopulatedTask {
    task: Task,
    creator: User,
    participants: Vec<AssignedParticipant>,
}

impl PopulatedTask {
    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn creator(&self) -> &User {
        &self.creator
    }

    pub fn participants(&self) -> &[AssignedParticipant] {
        &self.participants
    }
}

/// Error type for TaskService operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    /// The title is missing or blank.
    #[error("A non-blank title is required")]
    MissingTitle,
    /// Only one of start and end was given.
    #[error("Either both start and end dates or none must be given")]
    EitherBothDatesOrNone,
    /// A date could not be parsed.
    #[error("Invalid date '{0}'")]
    InvalidDate(String),
    /// The end date precedes the start date.
    #[error("End date is before start date")]
    EndDateBeforeStart,
    #[error("Task {0} not found")]
    TaskNotFound(Uuid),
    /// The participant does not exist within the task's project.
    #[error("Participant {0} not found in project")]
    ParticipantNotFound(Uuid),
    /// The task exists but belongs to another project.
    #[error("Task {task_id} does not belong to project {project_id}")]
    WrongProject { task_id: Uuid, project_id: Uuid },
    #[error("Participant {0} is already assigned to the task")]
    AlreadyParticipant(Uuid),
    /// Storing a new task failed.
    #[error("Task creation failed: {0}")]
    CreationFailed(#[source] StoreError),
    /// Represents a storage error.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Task use cases for a single project, built on injected repositories.
#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
    participants: Arc<dyn ParticipantRepository>,
    users: Arc<dyn UserRepository>,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        participants: Arc<dyn ParticipantRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            tasks,
            participants,
            users,
        }
    }

    /// Creates a service backed by the sea-orm repositories.
    pub fn with_database(db: Arc<DatabaseConnection>) -> Self {
        Self::new(
            Arc::new(SeaOrmTaskRepository::new(db.clone())),
            Arc::new(SeaOrmParticipantRepository::new(db.clone())),
            Arc::new(SeaOrmUserRepository::new(db)),
        )
    }

    /// Lists the tasks of a project, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<PopulatedTask>, TaskServiceError> {
        let tasks = self.tasks.find_by_project(project_id).await?;
        Ok(self.populate(tasks).await?)
    }

    /// Creates a task in `project_id` on behalf of `creator`.
    ///
    /// # Returns
    ///
    /// The stored task with creator and participants resolved. Storage
    /// failures are reported as [`TaskServiceError::CreationFailed`].
    #[tracing::instrument(skip(self, creator), fields(creator = %creator.id()))]
    pub async fn create_task(
        &self,
        project_id: Uuid,
        creator: &User,
        draft: TaskDraft,
    ) -> Result<PopulatedTask, TaskServiceError> {
        let changes = validation::validate(draft)?;
        let new_task = NewTask {
            project_id,
            creator_id: creator.id(),
            title: changes.title,
            description: changes.description.flatten(),
            schedule: changes.schedule,
        };

        let task = self
            .tasks
            .insert(new_task)
            .await
            .map_err(TaskServiceError::CreationFailed)?;
        self.populate_one(task)
            .await
            .map_err(TaskServiceError::CreationFailed)
    }

    /// Replaces the title, description and dates of a task.
    ///
    /// Leaving out both dates clears any dates the task already has.
    #[tracing::instrument(skip(self))]
    pub async fn update_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        draft: TaskDraft,
    ) -> Result<PopulatedTask, TaskServiceError> {
        let mut task = self.find_task_in_project(project_id, task_id).await?;
        let changes = validation::validate(draft)?;

        task.title = changes.title;
        if let Some(description) = changes.description {
            task.description = description;
        }
        task.schedule = changes.schedule;

        let task = self.tasks.update(&task).await?;
        Ok(self.populate_one(task).await?)
    }

    /// Assigns a participant of the same project to a task.
    #[tracing::instrument(skip(self))]
    pub async fn add_participant(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        participant_id: Uuid,
    ) -> Result<PopulatedTask, TaskServiceError> {
        let task = self.find_task_in_project(project_id, task_id).await?;

        let participant = match self
            .participants
            .find_in_project(project_id, participant_id)
            .await
        {
            Ok(Some(participant)) => participant,
            Ok(None) => return Err(TaskServiceError::ParticipantNotFound(participant_id)),
            Err(err) => {
                tracing::error!("Failed to look up participant {}: {}", participant_id, err);
                return Err(TaskServiceError::ParticipantNotFound(participant_id));
            }
        };

        if task.participant_ids.contains(&participant.id()) {
            return Err(TaskServiceError::AlreadyParticipant(participant.id()));
        }

        let task = self
            .tasks
            .add_participant(&task, participant.id())
            .await
            .map_err(|err| match err {
                StoreError::DuplicateParticipant { participant_id, .. } => {
                    TaskServiceError::AlreadyParticipant(participant_id)
                }
                other => TaskServiceError::Store(other),
            })?;
        Ok(self.populate_one(task).await?)
    }

    /// Deletes a task for good.
    ///
    /// # Returns
    ///
    /// The task as it was right before removal.
    #[tracing::instrument(skip(self))]
    pub async fn delete_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> Result<PopulatedTask, TaskServiceError> {
        let task = self.find_task_in_project(project_id, task_id).await?;
        let snapshot = self.populate_one(task).await?;
        self.tasks.delete(snapshot.task.id).await?;
        Ok(snapshot)
    }

    async fn find_task_in_project(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> Result<Task, TaskServiceError> {
        let task = self
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or(TaskServiceError::TaskNotFound(task_id))?;

        if task.project_id != project_id {
            return Err(TaskServiceError::WrongProject {
                task_id,
                project_id,
            });
        }
        Ok(task)
    }

    async fn populate_one(&self, task: Task) -> StoreResult<PopulatedTask> {
        let task_id = task.id;
        self.populate(vec![task])
            .await?
            .pop()
            .ok_or_else(|| StoreError::InvalidPersistedData(format!("task {task_id} vanished")))
    }

    /// Resolves creators and participants of `tasks` with two batched lookups.
    async fn populate(&self, tasks: Vec<Task>) -> StoreResult<Vec<PopulatedTask>> {
        let participant_ids: Vec<Uuid> = tasks
            .iter()
            .flat_map(|task| task.participant_ids.iter().copied())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let participants: HashMap<Uuid, Participant> = self
            .participants
            .find_by_ids(&participant_ids)
            .await?
            .into_iter()
            .map(|participant| (participant.id(), participant))
            .collect();

        let user_ids: Vec<Uuid> = tasks
            .iter()
            .map(|task| task.creator_id)
            .chain(participants.values().map(Participant::user_id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let users: HashMap<Uuid, User> = self
            .users
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|user| (user.id(), user))
            .collect();

        tasks
            .into_iter()
            .map(|task| -> StoreResult<PopulatedTask> {
                let creator = users.get(&task.creator_id).cloned().ok_or_else(|| {
                    StoreError::InvalidPersistedData(format!(
                        "creator {} of task {} does not exist",
                        task.creator_id, task.id
                    ))
                })?;
                let assigned = task
                    .participant_ids
                    .iter()
                    .filter_map(|id| participants.get(id))
                    .filter_map(|participant| {
                        let user = users.get(&participant.user_id())?;
                        Some(AssignedParticipant {
                            participant: participant.clone(),
                            user: user.clone(),
                        })
                    })
                    .collect();
                Ok(PopulatedTask {
                    task,
                    creator,
                    participants: assigned,
                })
            })
            .collect()
    }
}
