//! Request guards for project-scoped routes.
//!
//! A [`GuardChain`] is an ordered list of [`Guard`]s. Each guard inspects the
//! request head and either lets it through, possibly leaving something in the
//! request extensions for later guards and the handler, or rejects it with an
//! [`ApiError`]. The first rejection ends the request.

use async_trait::async_trait;
use axum::extract::{FromRequestParts, RawPathParams, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use uuid::Uuid;

use super::{AuthState, CurrentUser, bearer_token, decode_jwt};
use crate::participant::{Participant, ParticipantRepository};
use crate::user::{User, UserRepository};
use crate::web::api::v1::ApiError;

/// Name of the path parameter holding the project ID.
pub const PROJECT_PARAM: &str = "project";

#[async_trait]
pub trait Guard: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn check(&self, parts: &mut Parts) -> Result<(), ApiError>;
}

/// Guards evaluated in order before a handler runs.
#[derive(Clone, Default)]
pub struct GuardChain {
    guards: Vec<Arc<dyn Guard>>,
}

impl GuardChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a guard to the end of the chain.
    pub fn with(mut self, guard: impl Guard + 'static) -> Self {
        self.guards.push(Arc::new(guard));
        self
    }

    /// The chain protecting every task route: authenticated, registered, and
    /// an active participant of the project in the path.
    pub fn project_participant(
        auth_state: Arc<AuthState>,
        users: Arc<dyn UserRepository>,
        participants: Arc<dyn ParticipantRepository>,
    ) -> Self {
        Self::new()
            .with(EnsureAuthenticated::new(auth_state))
            .with(EnsureUser::new(users))
            .with(EnsureActiveProjectParticipant::new(participants))
    }

    /// Runs the guards in order, stopping at the first rejection.
    pub async fn check(&self, parts: &mut Parts) -> Result<(), ApiError> {
        for guard in &self.guards {
            if let Err(err) = guard.check(parts).await {
                tracing::debug!(guard = guard.name(), error = %err, "Request rejected");
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Middleware running a [`GuardChain`]. Apply it with `route_layer` so path
/// parameters are already matched.
pub async fn guard_middleware(
    State(chain): State<Arc<GuardChain>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    if let Err(err) = chain.check(&mut parts).await {
        return err.into_response();
    }
    next.run(Request::from_parts(parts, body)).await
}

/// Requires a valid bearer token and records the [`CurrentUser`].
pub struct EnsureAuthenticated {
    state: Arc<AuthState>,
}

impl EnsureAuthenticated {
    pub fn new(state: Arc<AuthState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Guard for EnsureAuthenticated {
    fn name(&self) -> &'static str {
        "ensure_authenticated"
    }

    async fn check(&self, parts: &mut Parts) -> Result<(), ApiError> {
        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let claims =
            decode_jwt(token, &self.state.jwt_secret).map_err(|_| ApiError::Unauthorized)?;
        parts.extensions.insert(CurrentUser::new(claims.sub));
        Ok(())
    }
}

/// Requires the [`CurrentUser`] to be a registered [`User`] and records it.
pub struct EnsureUser {
    users: Arc<dyn UserRepository>,
}

impl EnsureUser {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Guard for EnsureUser {
    fn name(&self) -> &'static str {
        "ensure_user"
    }

    async fn check(&self, parts: &mut Parts) -> Result<(), ApiError> {
        let current_user = parts
            .extensions
            .get::<CurrentUser>()
            .copied()
            .ok_or(ApiError::Unauthorized)?;

        let user = self
            .users
            .find_by_id(current_user.user_id)
            .await
            .map_err(|err| {
                tracing::error!("Failed to look up user {}: {}", current_user.user_id, err);
                ApiError::InternalServerError
            })?
            .ok_or(ApiError::UnknownUser)?;

        parts.extensions.insert(user);
        Ok(())
    }
}

/// Requires the [`User`] to be an active participant of the project named in
/// the path, and records the [`Participant`].
pub struct EnsureActiveProjectParticipant {
    participants: Arc<dyn ParticipantRepository>,
}

impl EnsureActiveProjectParticipant {
    pub fn new(participants: Arc<dyn ParticipantRepository>) -> Self {
        Self { participants }
    }
}

#[async_trait]
impl Guard for EnsureActiveProjectParticipant {
    fn name(&self) -> &'static str {
        "ensure_active_project_participant"
    }

    async fn check(&self, parts: &mut Parts) -> Result<(), ApiError> {
        let user_id = parts
            .extensions
            .get::<User>()
            .map(User::id)
            .ok_or(ApiError::UnknownUser)?;

        let project_id = project_from_path(parts).await?;

        let participant: Participant = self
            .participants
            .find_active_for_user(project_id, user_id)
            .await
            .map_err(|err| {
                tracing::error!(
                    "Failed to look up membership of user {} in project {}: {}",
                    user_id,
                    project_id,
                    err
                );
                ApiError::InternalServerError
            })?
            .ok_or(ApiError::PermissionError)?;

        parts.extensions.insert(participant);
        Ok(())
    }
}

/// Reads the project ID from the matched path. A missing or malformed ID
/// cannot name a project the caller belongs to.
async fn project_from_path(parts: &mut Parts) -> Result<Uuid, ApiError> {
    let params = RawPathParams::from_request_parts(parts, &())
        .await
        .map_err(|_| ApiError::PermissionError)?;
    params
        .iter()
        .find(|(name, _)| *name == PROJECT_PARAM)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
        .ok_or(ApiError::PermissionError)
}
