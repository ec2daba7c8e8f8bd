use crate::entities::user;
use crate::store::StoreResult;
use async_trait::async_trait;
use sea_orm::*;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub struct User {
    id: Uuid,
    username: String,
    display_name: String,
}

impl User {
    pub fn new(id: Uuid, username: String, display_name: String) -> Self {
        Self {
            id,
            username,
            display_name,
        }
    }

    /// Returns the ID of the user.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the unique login name of the user.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the name shown to other project members.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        User::new(model.id, model.username, model.display_name)
    }
}

/// Read access to registered users.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Finds a user by ID, returning `None` when no such user is registered.
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Finds every user whose ID is in `ids`. Unknown IDs are skipped.
    async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;
}

pub struct SeaOrmUserRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmUserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let model = user::Entity::find_by_id(id).one(self.db.as_ref()).await?;
        Ok(model.map(User::from))
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let users = user::Entity::find()
            .filter(user::Column::Id.is_in(ids.iter().copied()))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(User::from)
            .collect();
        Ok(users)
    }
}
