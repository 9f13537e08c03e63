use std::time::Duration;

use axum::Router;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use habitrpg_restapi::{
    AuthenticationInfo, HabitRpgClient, HabitRpgConfig, NewTask, RestErrorKind, RestResult,
    ServerStatus, Task, TaskType, User,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::sleep;

const API_USER: &str = "e2e-user";
const API_KEY: &str = "e2e-key";

#[derive(Deserialize)]
struct TasksQuery {
    #[serde(rename = "type")]
    task_type: Option<String>,
}

fn capture<T: Send + 'static>() -> (
    impl FnOnce(RestResult<T>) + Send + 'static,
    oneshot::Receiver<RestResult<T>>,
) {
    let (tx, rx) = oneshot::channel::<RestResult<T>>();
    let handler = move |result: RestResult<T>| {
        let _ = tx.send(result);
    };
    (handler, rx)
}

fn client_for(server: &TestServer, auth: AuthenticationInfo) -> HabitRpgClient {
    let config = HabitRpgConfig::new(auth).with_base_url(&server.base_url);
    HabitRpgClient::from_config(Handle::current(), config).expect("test server url is valid")
}

fn authorized() -> AuthenticationInfo {
    AuthenticationInfo::new(API_USER, API_KEY)
}

#[tokio::test]
async fn e2e_status_roundtrip() {
    let server = TestServer::start().await;
    let client = client_for(&server, authorized());

    let (handler, rx) = capture::<ServerStatus>();
    client.get_status(handler);
    let status = rx
        .await
        .expect("handler should run")
        .expect("status should load");

    assert!(status.is_up());
}

#[tokio::test]
async fn e2e_auth_headers_are_sent() {
    let server = TestServer::start().await;
    let client = client_for(&server, authorized());

    let (handler, rx) = capture::<User>();
    client.get_user(handler);
    let user = rx.await.expect("handler should run").expect("user should load");

    assert_eq!(user.id, API_USER);
    assert_eq!(user.profile.name, "e2e");
}

#[tokio::test]
async fn e2e_wrong_credentials_are_rejected() {
    let server = TestServer::start().await;
    let client = client_for(&server, AuthenticationInfo::new(API_USER, "wrong"));

    let (handler, rx) = capture::<User>();
    client.get_user(handler);
    let err = rx
        .await
        .expect("handler should run")
        .expect_err("bad key should fail");

    assert_eq!(err.kind(), RestErrorKind::Rejected);
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn e2e_task_filter_reaches_server() {
    let server = TestServer::start().await;
    let client = client_for(&server, authorized());

    let (handler, rx) = capture::<Vec<Task>>();
    client.get_tasks(handler, Some(TaskType::Reward));
    let tasks = rx.await.expect("handler should run").expect("tasks should load");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].task_type, TaskType::Reward);

    let (handler, rx) = capture::<Vec<Task>>();
    client.get_tasks(handler, None);
    let tasks = rx.await.expect("handler should run").expect("tasks should load");
    assert_eq!(tasks.len(), 2);
}

#[tokio::test]
async fn e2e_create_and_delete_task() {
    let server = TestServer::start().await;
    let client = client_for(&server, authorized());

    let (handler, rx) = capture::<Task>();
    client.create_task(&NewTask::new(TaskType::Todo, "ship it"), handler);
    let created = rx.await.expect("handler should run").expect("create should succeed");
    assert_eq!(created.text, "ship it");

    let (handler, rx) = capture::<()>();
    client.delete_task(&created.id, handler);
    rx.await.expect("handler should run").expect("delete should succeed");
}

#[tokio::test]
async fn e2e_configured_timeout_triggers() {
    let server = TestServer::start().await;
    let config = HabitRpgConfig::new(authorized())
        .with_base_url(server.url("/slow"))
        .with_timeout(Duration::from_millis(200));
    let client = HabitRpgClient::from_config(Handle::current(), config).expect("valid url");

    let (handler, rx) = capture::<ServerStatus>();
    client.get_status(handler);
    let err = rx
        .await
        .expect("handler should run")
        .expect_err("slow endpoint should time out");

    assert_eq!(err.kind(), RestErrorKind::Timeout);
}

#[tokio::test]
async fn e2e_cancel_stops_slow_request() {
    let server = TestServer::start().await;
    let config = HabitRpgConfig::new(authorized()).with_base_url(server.url("/slow"));
    let client = HabitRpgClient::from_config(Handle::current(), config).expect("valid url");

    let (handler, rx) = capture::<ServerStatus>();
    let mut handle = client.get_status(handler);
    sleep(Duration::from_millis(50)).await;
    assert!(handle.cancel());

    let err = rx
        .await
        .expect("handler should run")
        .expect_err("cancelled request should fail");
    assert_eq!(err.kind(), RestErrorKind::Cancelled);
}

struct TestServer {
    base_url: String,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let app = Router::new()
            .route("/api/v1/status", get(status_handler))
            .route("/api/v1/user", get(user_handler))
            .route("/api/v1/user/tasks", get(tasks_handler).post(create_handler))
            .route("/api/v1/user/tasks/{id}", delete(delete_handler))
            .route("/slow/api/v1/status", get(slow_handler))
            .route("/slow/api/v1/user/tasks", post(slow_handler));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{}", addr);

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { base_url, task }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn is_authorized(headers: &HeaderMap) -> bool {
    headers.get("x-api-user").and_then(|v| v.to_str().ok()) == Some(API_USER)
        && headers.get("x-api-key").and_then(|v| v.to_str().ok()) == Some(API_KEY)
}

async fn status_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, r#"{"status":"up"}"#)
}

async fn user_handler(headers: HeaderMap) -> (StatusCode, &'static str) {
    if !is_authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, r#"{"err":"No user found."}"#);
    }
    (
        StatusCode::OK,
        r#"{"_id":"e2e-user","profile":{"name":"e2e"},"stats":{"hp":50,"lvl":1}}"#,
    )
}

async fn tasks_handler(
    headers: HeaderMap,
    Query(query): Query<TasksQuery>,
) -> (StatusCode, &'static str) {
    if !is_authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, r#"{"err":"No user found."}"#);
    }
    match query.task_type.as_deref() {
        Some("reward") => (
            StatusCode::OK,
            r#"[{"id":"r-1","type":"reward","text":"Cake","value":10}]"#,
        ),
        Some(_) => (StatusCode::OK, "[]"),
        None => (
            StatusCode::OK,
            r#"[{"id":"h-1","type":"habit","text":"Floss"},{"id":"r-1","type":"reward","text":"Cake","value":10}]"#,
        ),
    }
}

async fn create_handler(headers: HeaderMap, body: String) -> (StatusCode, String) {
    if !is_authorized(&headers) || !body.contains(r#""text":"ship it""#) {
        return (StatusCode::BAD_REQUEST, String::new());
    }
    (
        StatusCode::OK,
        r#"{"id":"t-new","type":"todo","text":"ship it"}"#.to_string(),
    )
}

async fn delete_handler(headers: HeaderMap) -> StatusCode {
    if is_authorized(&headers) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn slow_handler() -> (StatusCode, &'static str) {
    sleep(Duration::from_millis(2500)).await;
    (StatusCode::OK, r#"{"status":"up"}"#)
}
