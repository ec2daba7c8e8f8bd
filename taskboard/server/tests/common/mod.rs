use chrono::Utc;
use migration::MigratorTrait;
use sea_orm::{ActiveModelTrait, ActiveValue, ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use taskboard_server::config::Config;
use taskboard_server::entities::{participant, project, user};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret";

/// Connects to a fresh in-memory sqlite database with all migrations applied.
///
/// The pool holds exactly one connection, since every sqlite memory
/// connection sees its own empty database.
pub async fn setup_db() -> anyhow::Result<DatabaseConnection> {
    // Allow multiple calls to init for tests.
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        db_url: "sqlite::memory:".to_string(),
        port: 0,
        jwt_secret: JWT_SECRET.to_string(),
        notification_capacity: 16,
    }
}

#[allow(dead_code)]
pub fn token_for(user_id: Uuid) -> String {
    taskboard_server::auth::encode_jwt(user_id, JWT_SECRET).unwrap()
}

pub async fn create_user(db: &DatabaseConnection, username: &str) -> user::Model {
    user::ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4()),
        username: ActiveValue::Set(username.to_string()),
        display_name: ActiveValue::Set(format!("{} (display)", username)),
        created_at: ActiveValue::Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_project(db: &DatabaseConnection, name: &str) -> project::Model {
    project::ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4()),
        name: ActiveValue::Set(name.to_string()),
        created_at: ActiveValue::Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_participant(
    db: &DatabaseConnection,
    project_id: Uuid,
    user_id: Uuid,
    active: bool,
) -> participant::Model {
    participant::ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4()),
        project_id: ActiveValue::Set(project_id),
        user_id: ActiveValue::Set(user_id),
        active: ActiveValue::Set(active),
        created_at: ActiveValue::Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap()
}

/// Two projects. `alice` and `bob` take part in the first, `carol` only in
/// the second.
#[allow(dead_code)]
pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub project: project::Model,
    pub other_project: project::Model,
    pub alice: user::Model,
    pub alice_participant: participant::Model,
    pub bob: user::Model,
    pub bob_participant: participant::Model,
    pub carol: user::Model,
    pub carol_participant: participant::Model,
}

pub async fn setup() -> anyhow::Result<TestContext> {
    let db = setup_db().await?;

    let project = create_project(&db, "Launch").await;
    let other_project = create_project(&db, "Maintenance").await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let carol = create_user(&db, "carol").await;
    let alice_participant = create_participant(&db, project.id, alice.id, true).await;
    let bob_participant = create_participant(&db, project.id, bob.id, true).await;
    let carol_participant = create_participant(&db, other_project.id, carol.id, true).await;

    Ok(TestContext {
        db: Arc::new(db),
        project,
        other_project,
        alice,
        alice_participant,
        bob,
        bob_participant,
        carol,
        carol_participant,
    })
}
