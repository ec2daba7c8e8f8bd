use std::sync::Arc;

use axum::{Json, Router, middleware::from_fn_with_state, routing::get};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::guard::{GuardChain, guard_middleware};
use crate::task::api::v1::TaskState;

pub mod v1;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::task::api::v1::list_tasks_handler,
        crate::task::api::v1::create_task_handler,
        crate::task::api::v1::update_task_handler,
        crate::task::api::v1::add_participant_handler,
        crate::task::api::v1::delete_task_handler,
    ),
    components(schemas(
        crate::task::TaskDraft,
        crate::task::api::v1::TaskJson,
        crate::task::api::v1::ParticipantJson,
        crate::task::api::v1::UserJson,
        crate::task::api::v1::TaskResponse,
        crate::task::api::v1::TaskListResponse,
        v1::ErrorResponse,
    )),
    modifiers(&BearerSecurity),
    tags((name = "Tasks", description = "Tasks within a project"))
)]
pub struct ApiDoc;

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Handler for GET /api-docs/openapi.json
pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Creates the API routes for JSON API endpoints.
///
/// Every task route runs behind `guards`. The guards are added as a route
/// layer so that unmatched paths still answer 404.
pub fn create_api_router(guards: Arc<GuardChain>, task_state: Arc<TaskState>) -> Router {
    let task_routes = crate::task::api::v1::create_api_router(task_state)
        .route_layer(from_fn_with_state(guards, guard_middleware));

    Router::new()
        .nest("/api/v1", task_routes)
        .route("/api-docs/openapi.json", get(openapi_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_document_every_task_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        assert_eq!(
            paths,
            vec![
                "/api/v1/projects/{project}/tasks",
                "/api/v1/projects/{project}/tasks/{task}",
                "/api/v1/projects/{project}/tasks/{task}/participants/{participant}",
            ]
        );
        let tasks = &doc.paths.paths["/api/v1/projects/{project}/tasks"];
        assert!(tasks.get.is_some());
        assert!(tasks.post.is_some());
    }

    #[test]
    fn can_document_bearer_security() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();

        assert!(components.security_schemes.contains_key("bearer"));
        assert!(components.schemas.contains_key("TaskJson"));
    }
}
