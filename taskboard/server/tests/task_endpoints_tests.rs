use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use insta::assert_json_snapshot;
use serde_json::{Value, json};
use std::sync::Arc;
use taskboard_server::notify::{ApiAction, BroadcastNotifier};
use taskboard_server::task::api::v1::{TaskJson, TaskListResponse, TaskResponse};
use taskboard_server::web::api::v1::ErrorResponse;
use taskboard_server::web::build_router;
use tower::ServiceExt;
use uuid::Uuid;

mod common;

struct TestApp {
    state: common::TestContext,
    notifier: Arc<BroadcastNotifier>,
    router: Router,
}

async fn setup() -> anyhow::Result<TestApp> {
    let state = common::setup().await?;
    let notifier = Arc::new(BroadcastNotifier::new(16));
    let router = build_router(&common::test_config(), state.db.clone(), notifier.clone());
    Ok(TestApp {
        state,
        notifier,
        router,
    })
}

impl TestApp {
    fn tasks_uri(&self) -> String {
        format!("/api/v1/projects/{}/tasks", self.state.project.id)
    }

    fn task_uri(&self, task_id: Uuid) -> String {
        format!("{}/{}", self.tasks_uri(), task_id)
    }

    /// Sends a request as `user`, returning the status and the raw body.
    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", common::token_for(user_id)),
            );
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn create_task(&self, title: &str) -> TaskJson {
        let (status, body) = self
            .send(
                Method::POST,
                &self.tasks_uri(),
                Some(self.state.alice.id),
                Some(json!({ "title": title })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice::<TaskResponse>(&body).unwrap().data
    }
}

fn error(body: &[u8]) -> ErrorResponse {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn can_reject_request_without_token() {
    let app = setup().await.expect("Failed to setup test context");

    let (status, body) = app.send(Method::GET, &app.tasks_uri(), None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_json_snapshot!(error(&body), @r#"
    {
      "error": "unauthorized",
      "message": "Authentication required to access this resource"
    }
    "#);
}

#[tokio::test]
async fn can_reject_token_of_unknown_user() {
    let app = setup().await.expect("Failed to setup test context");

    let (status, body) = app
        .send(Method::GET, &app.tasks_uri(), Some(Uuid::new_v4()), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_json_snapshot!(error(&body), @r#"
    {
      "error": "unknown_user",
      "message": "The authenticated user is not registered"
    }
    "#);
}

#[tokio::test]
async fn can_reject_caller_outside_project() {
    let app = setup().await.expect("Failed to setup test context");

    let (status, body) = app
        .send(
            Method::POST,
            &app.tasks_uri(),
            Some(app.state.carol.id),
            Some(json!({ "title": "Sneaky" })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_json_snapshot!(error(&body), @r#"
    {
      "error": "permission_error",
      "message": "You are not allowed to access this resource"
    }
    "#);
}

#[tokio::test]
async fn can_reject_inactive_participant() {
    let app = setup().await.expect("Failed to setup test context");
    let dave = common::create_user(&app.state.db, "dave").await;
    common::create_participant(&app.state.db, app.state.project.id, dave.id, false).await;

    let (status, _) = app
        .send(Method::GET, &app.tasks_uri(), Some(dave.id), None)
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn can_create_task_and_notify() {
    let app = setup().await.expect("Failed to setup test context");
    let mut events = app.notifier.subscribe();

    let (status, body) = app
        .send(
            Method::POST,
            &app.tasks_uri(),
            Some(app.state.alice.id),
            Some(json!({
                "title": "  Draft agenda  ",
                "description": "For Monday",
                "start": "2025-05-05T09:00:00Z",
                "end": "2025-05-05T10:30:00Z"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let task = serde_json::from_slice::<TaskResponse>(&body).unwrap().data;
    assert_eq!(task.title, "Draft agenda");
    assert_eq!(task.description.as_deref(), Some("For Monday"));
    assert_eq!(task.project, app.state.project.id);
    assert_eq!(task.creator.id, app.state.alice.id);
    assert_eq!(task.creator.username, "alice");
    assert!(task.participants.is_empty());
    assert!(task.start.is_some() && task.end.is_some());

    let event = events.recv().await.unwrap();
    assert_eq!(event.action, ApiAction::Create);
    assert_eq!(event.actor, app.state.alice.id);
    assert_eq!(event.resource["id"], json!(task.id));
}

#[tokio::test]
async fn can_validate_task_body() {
    let app = setup().await.expect("Failed to setup test context");
    let alice = Some(app.state.alice.id);
    let uri = app.tasks_uri();

    let (status, body) = app
        .send(Method::POST, &uri, alice, Some(json!({ "title": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_snapshot!(error(&body), @r#"
    {
      "error": "required_parameter_missing",
      "message": "A required parameter is missing"
    }
    "#);

    let (status, body) = app
        .send(
            Method::POST,
            &uri,
            alice,
            Some(json!({ "title": "Plan", "end": "2025-01-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error(&body).error, "either_both_dates_or_none");

    let (status, body) = app
        .send(
            Method::POST,
            &uri,
            alice,
            Some(json!({ "title": "Plan", "start": "2025-01-02", "end": "2025-01-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error(&body).error, "end_date_before_start");

    let (status, body) = app
        .send(
            Method::POST,
            &uri,
            alice,
            Some(json!({ "title": "Plan", "start": "tomorrow", "end": "2025-01-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error(&body).error, "invalid_date");

    let (status, body) = app
        .send(Method::POST, &uri, alice, Some(json!(["not", "an", "object"])))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error(&body).error, "invalid_request_body");

    let (_, body) = app.send(Method::GET, &uri, alice, None).await;
    let tasks = serde_json::from_slice::<TaskListResponse>(&body).unwrap();
    assert!(tasks.data.is_empty());
}

#[tokio::test]
async fn can_list_tasks_in_creation_order() {
    let app = setup().await.expect("Failed to setup test context");
    app.create_task("one").await;
    app.create_task("two").await;

    let (status, body) = app
        .send(Method::GET, &app.tasks_uri(), Some(app.state.bob.id), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let tasks = serde_json::from_slice::<TaskListResponse>(&body).unwrap();
    let titles: Vec<&str> = tasks.data.iter().map(|task| task.title.as_str()).collect();
    assert_eq!(titles, vec!["one", "two"]);
}

#[tokio::test]
async fn can_update_task() {
    let app = setup().await.expect("Failed to setup test context");
    let task = app.create_task("Plan").await;
    let mut events = app.notifier.subscribe();

    let (status, body) = app
        .send(
            Method::PUT,
            &app.task_uri(task.id),
            Some(app.state.bob.id),
            Some(json!({ "title": "Plan2", "description": "" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let updated = serde_json::from_slice::<TaskResponse>(&body).unwrap().data;
    assert_eq!(updated.id, task.id);
    assert_eq!(updated.title, "Plan2");
    assert_eq!(updated.creator.id, app.state.alice.id);

    let event = events.recv().await.unwrap();
    assert_eq!(event.action, ApiAction::Update);
    assert_eq!(event.actor, app.state.bob.id);
}

#[tokio::test]
async fn can_reject_invalid_dates_on_update_without_changes() {
    let app = setup().await.expect("Failed to setup test context");
    let alice = Some(app.state.alice.id);
    let (status, body) = app
        .send(
            Method::POST,
            &app.tasks_uri(),
            alice,
            Some(json!({ "title": "Plan", "start": "2025-01-01", "end": "2025-01-03" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let task = serde_json::from_slice::<TaskResponse>(&body).unwrap().data;
    let mut events = app.notifier.subscribe();

    let (status, body) = app
        .send(
            Method::PUT,
            &app.task_uri(task.id),
            alice,
            Some(json!({ "title": "Replan", "start": "2025-02-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_snapshot!(error(&body), @r#"
    {
      "error": "either_both_dates_or_none",
      "message": "Provide both a start and an end date, or neither"
    }
    "#);

    let (status, body) = app
        .send(
            Method::PUT,
            &app.task_uri(task.id),
            alice,
            Some(json!({ "title": "Replan", "start": "2025-02-02", "end": "2025-02-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_snapshot!(error(&body), @r#"
    {
      "error": "end_date_before_start",
      "message": "The end date must not be before the start date"
    }
    "#);

    let (_, body) = app.send(Method::GET, &app.tasks_uri(), alice, None).await;
    let tasks = serde_json::from_slice::<TaskListResponse>(&body).unwrap();
    assert_eq!(tasks.data, vec![task]);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn can_refuse_update_of_task_in_other_project() {
    let app = setup().await.expect("Failed to setup test context");
    let foreign_uri = format!("/api/v1/projects/{}/tasks", app.state.other_project.id);
    let (status, body) = app
        .send(
            Method::POST,
            &foreign_uri,
            Some(app.state.carol.id),
            Some(json!({ "title": "Theirs" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let foreign = serde_json::from_slice::<TaskResponse>(&body).unwrap().data;

    let (status, body) = app
        .send(
            Method::PUT,
            &app.task_uri(foreign.id),
            Some(app.state.alice.id),
            Some(json!({ "title": "Mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error(&body).error, "permission_error");

    let (status, _) = app
        .send(
            Method::DELETE,
            &app.task_uri(foreign.id),
            Some(app.state.alice.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn can_answer_not_found_for_unknown_or_malformed_task() {
    let app = setup().await.expect("Failed to setup test context");
    let alice = Some(app.state.alice.id);

    let (status, body) = app
        .send(
            Method::PUT,
            &app.task_uri(Uuid::new_v4()),
            alice,
            Some(json!({ "title": "Plan" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_snapshot!(error(&body), @r#"
    {
      "error": "not_found",
      "message": "The requested resource was not found"
    }
    "#);

    let uri = format!("{}/not-a-task", app.tasks_uri());
    let (status, _) = app.send(Method::DELETE, &uri, alice, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn can_add_participant_once() {
    let app = setup().await.expect("Failed to setup test context");
    let task = app.create_task("Plan").await;
    let uri = format!(
        "{}/participants/{}",
        app.task_uri(task.id),
        app.state.bob_participant.id
    );

    let (status, body) = app
        .send(Method::POST, &uri, Some(app.state.alice.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let updated = serde_json::from_slice::<TaskResponse>(&body).unwrap().data;
    assert_eq!(updated.participants.len(), 1);
    assert_eq!(updated.participants[0].id, app.state.bob_participant.id);
    assert_eq!(updated.participants[0].project, app.state.project.id);
    assert!(updated.participants[0].active);
    assert_eq!(updated.participants[0].user.username, "bob");

    let (status, body) = app
        .send(Method::POST, &uri, Some(app.state.alice.id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_snapshot!(error(&body), @r#"
    {
      "error": "already_is_a_participant",
      "message": "The participant is already assigned to this task"
    }
    "#);
}

#[tokio::test]
async fn can_refuse_participant_of_other_project() {
    let app = setup().await.expect("Failed to setup test context");
    let task = app.create_task("Plan").await;
    let uri = format!(
        "{}/participants/{}",
        app.task_uri(task.id),
        app.state.carol_participant.id
    );

    let (status, body) = app
        .send(Method::POST, &uri, Some(app.state.alice.id), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error(&body).error, "not_found");
}

#[tokio::test]
async fn can_delete_task() {
    let app = setup().await.expect("Failed to setup test context");
    let task = app.create_task("Plan").await;
    let mut events = app.notifier.subscribe();

    let (status, body) = app
        .send(
            Method::DELETE,
            &app.task_uri(task.id),
            Some(app.state.alice.id),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let deleted = serde_json::from_slice::<TaskResponse>(&body).unwrap().data;
    assert_eq!(deleted, task);

    let event = events.recv().await.unwrap();
    assert_eq!(event.action, ApiAction::Delete);
    assert_eq!(event.resource["title"], "Plan");

    let (_, body) = app
        .send(Method::GET, &app.tasks_uri(), Some(app.state.alice.id), None)
        .await;
    let tasks = serde_json::from_slice::<TaskListResponse>(&body).unwrap();
    assert!(tasks.data.is_empty());
}

#[tokio::test]
async fn can_serve_health_check_and_openapi_document() {
    let app = setup().await.expect("Failed to setup test context");

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");

    let (status, body) = app
        .send(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert!(doc["paths"]["/api/v1/projects/{project}/tasks"]["post"].is_object());
}
