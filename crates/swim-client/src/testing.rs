//! Test utilities for swim-client
//!
//! Provides an in-process mock controller and a server harness for running
//! integration tests against it.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::config::{ControllerConfig, ControllerConfigBuilder};
use crate::error::Result;
use crate::ControllerClient;

/// Username the mock controller accepts
pub const MOCK_USERNAME: &str = "admin";
/// Password the mock controller accepts
pub const MOCK_PASSWORD: &str = "C1sco12345";
/// Token the mock controller issues
pub const MOCK_TOKEN: &str = "mock-token";

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: ControllerClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Create a new test server from an axum Router
    ///
    /// # Example
    ///
    /// ```ignore
    /// use swim_client::testing::{MockController, TestServer};
    ///
    /// let controller = MockController::new().with_device("edge1", "dev-1");
    /// let server = TestServer::start(controller.router()).await?;
    /// let token = server.client.authenticate().await?;
    /// ```
    pub async fn start(router: Router) -> Result<Self> {
        Self::start_with_timeout(router, Duration::from_secs(5), Duration::from_secs(2)).await
    }

    /// Create a new test server with custom timeouts
    pub async fn start_with_timeout(
        router: Router,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        // Spawn the server
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let config = Self::config_builder(addr)
            .request_timeout_ms(timeout.as_millis() as u64)
            .connect_timeout_ms(connect_timeout.as_millis() as u64)
            .build();
        let client = ControllerClient::new(config)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Config builder pointing at a server with the mock credentials
    pub fn config_builder(addr: SocketAddr) -> ControllerConfigBuilder {
        ControllerConfig::builder(format!("http://{}", addr))
            .credentials(MOCK_USERNAME, MOCK_PASSWORD)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal if not already done
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Abort the task if still running
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Mock controller
// =============================================================================

/// A request the mock controller received on a submission endpoint
#[derive(Debug, Clone)]
pub struct RecordedSubmission {
    pub path: String,
    pub body: Value,
}

#[derive(Default)]
struct MockState {
    images: HashMap<String, Vec<Value>>,
    devices: HashMap<String, Vec<Value>>,
    scripts: VecDeque<Vec<Value>>,
    tasks: HashMap<String, VecDeque<Value>>,
    status_calls: HashMap<String, usize>,
    submissions: Vec<RecordedSubmission>,
    submit_failure: Option<u16>,
    omit_task_id: bool,
    next_task: usize,
}

/// Scriptable stand-in for the controller's SWIM and task endpoints
///
/// Each submission creates a task `T1`, `T2`, ... whose status snapshots are
/// taken from the next queued script. The last snapshot of a script repeats.
/// Without a script, a task finishes on the first status check.
#[derive(Clone, Default)]
pub struct MockController {
    state: Arc<Mutex<MockState>>,
}

impl MockController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image record for a version
    pub fn with_image(self, version: &str, image_uuid: &str) -> Self {
        self.lock().images.insert(
            version.to_string(),
            vec![json!({ "imageUuid": image_uuid, "name": format!("cat9k_iosxe.{version}.SPA.bin"), "version": version })],
        );
        self
    }

    /// Register a device record for a hostname
    pub fn with_device(self, hostname: &str, device_id: &str) -> Self {
        self.lock().devices.insert(
            hostname.to_string(),
            vec![json!({ "id": device_id, "hostname": hostname })],
        );
        self
    }

    /// Queue the status snapshots for the next submitted task
    pub fn script_next_task(self, snapshots: Vec<Value>) -> Self {
        self.lock().scripts.push_back(snapshots);
        self
    }

    /// Make every submission fail with the given HTTP status
    pub fn fail_submissions(self, status: u16) -> Self {
        self.lock().submit_failure = Some(status);
        self
    }

    /// Answer submissions with an envelope lacking `taskId`
    pub fn omit_task_id(self) -> Self {
        self.lock().omit_task_id = true;
        self
    }

    /// Number of status requests seen for a task
    pub fn status_calls(&self, task_id: &str) -> usize {
        self.lock().status_calls.get(task_id).copied().unwrap_or(0)
    }

    /// Total status requests across all tasks
    pub fn total_status_calls(&self) -> usize {
        self.lock().status_calls.values().sum()
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.lock().submissions.clone()
    }

    /// Build the axum router serving the controller API
    pub fn router(&self) -> Router {
        Router::new()
            .route("/dna/system/api/v1/auth/token", post(issue_token))
            .route("/dna/intent/api/v1/image/importation", get(list_images))
            .route("/dna/intent/api/v1/network-device", get(list_devices))
            .route("/dna/intent/api/v1/image/distribution", post(submit_distribution))
            .route("/dna/intent/api/v1/image/activation/device", post(submit_activation))
            .route("/dna/intent/api/v1/task/{task_id}", get(task_status))
            .route("/dna/intent/api/v1/tasks", get(child_tasks))
            .with_state(self.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn submit(&self, path: &str, body: Value) -> (StatusCode, Json<Value>) {
        let mut state = self.lock();
        state.submissions.push(RecordedSubmission {
            path: path.to_string(),
            body,
        });

        if let Some(code) = state.submit_failure {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, Json(json!({ "message": "submission rejected" })));
        }

        state.next_task += 1;
        let task_id = format!("T{}", state.next_task);
        let script = state.scripts.pop_front().unwrap_or_else(|| {
            vec![json!({ "isError": false, "progress": "completed", "endTime": 1_704_067_260_000_i64 })]
        });
        state.tasks.insert(task_id.clone(), script.into());

        let response = if state.omit_task_id {
            json!({ "response": { "url": "/api/v1/task/unknown" } })
        } else {
            json!({ "response": { "taskId": task_id, "url": format!("/api/v1/task/{task_id}") } })
        };
        (StatusCode::ACCEPTED, Json(response))
    }
}

type Reply = (StatusCode, Json<Value>);

fn unauthorized() -> Reply {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "missing or invalid x-auth-token" })),
    )
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("x-auth-token")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == MOCK_TOKEN)
}

async fn issue_token(headers: HeaderMap) -> Reply {
    // "admin:C1sco12345"
    let expected = "Basic YWRtaW46QzFzY28xMjM0NQ==";
    let ok = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);

    if ok {
        (StatusCode::OK, Json(json!({ "Token": MOCK_TOKEN })))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Authentication has failed" })),
        )
    }
}

async fn list_images(
    State(mock): State<MockController>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    let version = query.get("version").cloned().unwrap_or_default();
    let records = mock.lock().images.get(&version).cloned().unwrap_or_default();
    (StatusCode::OK, Json(json!({ "response": records })))
}

async fn list_devices(
    State(mock): State<MockController>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    let hostname = query.get("hostname").cloned().unwrap_or_default();
    let records = mock.lock().devices.get(&hostname).cloned().unwrap_or_default();
    (StatusCode::OK, Json(json!({ "response": records })))
}

async fn submit_distribution(
    State(mock): State<MockController>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    mock.submit("/dna/intent/api/v1/image/distribution", body)
}

async fn submit_activation(
    State(mock): State<MockController>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    mock.submit("/dna/intent/api/v1/image/activation/device", body)
}

async fn task_status(
    State(mock): State<MockController>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }

    let mut state = mock.lock();
    *state.status_calls.entry(task_id.clone()).or_default() += 1;

    let Some(script) = state.tasks.get_mut(&task_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": format!("task {task_id} not found") })),
        );
    };

    let mut snapshot = if script.len() > 1 {
        script.pop_front().unwrap_or_default()
    } else {
        script.front().cloned().unwrap_or_default()
    };
    if let Value::Object(map) = &mut snapshot {
        map.entry("id").or_insert_with(|| Value::String(task_id.clone()));
    }

    (StatusCode::OK, Json(json!({ "response": snapshot })))
}

async fn child_tasks(
    State(mock): State<MockController>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    let parent = query.get("parentId").cloned().unwrap_or_default();
    if !mock.lock().tasks.contains_key(&parent) {
        return (StatusCode::OK, Json(json!({ "response": [] })));
    }

    let children = json!([{
        "id": format!("{parent}-1"),
        "parentId": parent,
        "isError": false,
        "progress": "Device upgrade step completed",
        "endTime": 1_704_067_260_000_i64
    }]);
    (StatusCode::OK, Json(json!({ "response": children })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_format() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = TestServer::config_builder(addr).build();
        assert_eq!(config.base_url(), "http://127.0.0.1:8080");
        assert_eq!(config.connection.username, MOCK_USERNAME);
    }

    #[test]
    fn test_mock_builder_records_scripts() {
        let mock = MockController::new()
            .with_image("17.9.4", "img-1")
            .script_next_task(vec![json!({ "isError": false })]);
        assert_eq!(mock.lock().scripts.len(), 1);
        assert!(mock.lock().images.contains_key("17.9.4"));
        assert_eq!(mock.total_status_calls(), 0);
    }
}
