use axum::Router;
use axum::extract::MatchedPath;
use axum::http::header::AUTHORIZATION;
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::Span;

use crate::auth::AuthState;
use crate::auth::guard::GuardChain;
use crate::config::Config;
use crate::notify::NotificationSink;
use crate::participant::SeaOrmParticipantRepository;
use crate::task::TaskService;
use crate::task::api::v1::TaskState;
use crate::user::SeaOrmUserRepository;

pub mod api;

/// Request spans that record where a request went but never its headers, so
/// bearer tokens stay out of the logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct FilteredMakeSpan;

impl<B> MakeSpan<B> for FilteredMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let matched_path = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);

        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            matched_path,
        )
    }
}

/// Assembles the application router on top of an already migrated database.
pub fn build_router(
    config: &Config,
    db: Arc<DatabaseConnection>,
    notifier: Arc<dyn NotificationSink>,
) -> Router {
    let auth_state = Arc::new(AuthState::from_config(config));
    let guards = Arc::new(GuardChain::project_participant(
        auth_state,
        Arc::new(SeaOrmUserRepository::new(db.clone())),
        Arc::new(SeaOrmParticipantRepository::new(db.clone())),
    ));
    let task_state = Arc::new(TaskState {
        service: TaskService::with_database(db),
        notifier,
    });

    Router::new()
        .route("/health", axum::routing::get(health_check_handler))
        .merge(api::create_api_router(guards, task_state))
        .layer(
            ServiceBuilder::new()
                .layer(SetSensitiveRequestHeadersLayer::new([AUTHORIZATION]))
                .layer(TraceLayer::new_for_http().make_span_with(FilteredMakeSpan))
                .layer(CorsLayer::new()),
        )
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.db_url).await?;
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let notifier = Arc::new(crate::notify::BroadcastNotifier::new(
        config.notification_capacity,
    ));
    let app = build_router(&config, Arc::new(db), notifier);

    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}
