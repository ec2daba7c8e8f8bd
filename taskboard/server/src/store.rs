use uuid::Uuid;

/// Error type shared by the sea-orm backed repositories.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    /// A stored row could not be turned back into a domain value.
    #[error("Invalid persisted data: {0}")]
    InvalidPersistedData(String),
    /// The participant is already linked to the task.
    #[error("Participant {participant_id} is already linked to task {task_id}")]
    DuplicateParticipant { task_id: Uuid, participant_id: Uuid },
}

pub type StoreResult<T> = Result<T, StoreError>;
