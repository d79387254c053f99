//! Controller HTTP client implementation

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::ControllerConfig;
use crate::error::{Result, SwimError};
use crate::types::*;

const TOKEN_PATH: &str = "/dna/system/api/v1/auth/token";
const TASK_PATH: &str = "/dna/intent/api/v1/task";
const TASKS_PATH: &str = "/dna/intent/api/v1/tasks";
const IMAGE_PATH: &str = "/dna/intent/api/v1/image/importation";
const DEVICE_PATH: &str = "/dna/intent/api/v1/network-device";

const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Submit-and-inspect operations the task poller and orchestrator rely on.
///
/// Implementations make a single attempt per call; retry policy belongs to
/// the caller.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Submit an operation and return the task it created
    async fn submit(&self, request: &OperationRequest) -> Result<TaskHandle>;

    /// Fetch the current status of a task
    async fn fetch_status(&self, handle: &TaskHandle) -> Result<TaskStatus>;
}

/// Catalyst Center REST client
///
/// Cheap to clone; holds no mutable state once the token is set.
#[derive(Debug, Clone)]
pub struct ControllerClient {
    client: Client,
    base_url: Url,
    config: ControllerConfig,
    token: Option<String>,
}

impl ControllerClient {
    /// Create a new, unauthenticated client from configuration
    pub fn new(config: ControllerConfig) -> Result<Self> {
        if config.tls.accept_invalid_certs {
            warn!(
                "TLS certificate verification disabled for {}",
                config.connection.host
            );
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .danger_accept_invalid_certs(config.tls.accept_invalid_certs)
            .build()?;

        let base_url = Url::parse(&config.base_url())?;

        info!("Controller client created for {}", base_url);

        Ok(Self {
            client,
            base_url,
            config,
            token: None,
        })
    }

    /// Create a client and obtain a token with the configured credentials
    pub async fn connect(config: ControllerConfig) -> Result<Self> {
        let client = Self::new(config)?;
        let token = client.authenticate().await?;
        Ok(client.with_token(token))
    }

    /// Attach a pre-issued token to every subsequent request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Request a token using HTTP Basic credentials
    #[instrument(skip(self))]
    pub async fn authenticate(&self) -> Result<String> {
        let url = self.build_url(TOKEN_PATH)?;
        debug!("Requesting token from {}", url);

        let response = self
            .client
            .post(url)
            .basic_auth(
                &self.config.connection.username,
                Some(&self.config.connection.password),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let body: TokenResponse = self.handle_response(response).await?;
        let token = body
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SwimError::Auth("token missing from response".into()))?;

        info!("Got token from {}", self.config.connection.host);
        Ok(token)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Resolve a software version string to the first matching image
    #[instrument(skip(self))]
    pub async fn resolve_image(&self, version: &str) -> Result<ImageRecord> {
        let url = self.build_url(IMAGE_PATH)?;
        let response = self
            .authorized(self.client.get(url))
            .query(&[("version", version)])
            .send()
            .await?;

        let envelope: Envelope<Vec<ImageRecord>> = self.handle_response(response).await?;
        let image = envelope
            .response
            .into_iter()
            .next()
            .ok_or_else(|| SwimError::ImageNotFound(version.to_string()))?;

        debug!("Image {} resolved to {}", version, image.image_uuid);
        Ok(image)
    }

    /// Resolve a device hostname to the first matching device
    #[instrument(skip(self))]
    pub async fn resolve_device(&self, hostname: &str) -> Result<DeviceRecord> {
        let url = self.build_url(DEVICE_PATH)?;
        let response = self
            .authorized(self.client.get(url))
            .query(&[("hostname", hostname)])
            .send()
            .await?;

        let envelope: Envelope<Vec<DeviceRecord>> = self.handle_response(response).await?;
        let device = envelope
            .response
            .into_iter()
            .next()
            .ok_or_else(|| SwimError::DeviceNotFound(hostname.to_string()))?;

        debug!("Device {} resolved to {}", hostname, device.id);
        Ok(device)
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// List the child tasks spawned by a parent task
    #[instrument(skip(self))]
    pub async fn child_tasks(&self, parent: &TaskHandle) -> Result<Vec<TaskStatus>> {
        let url = self.build_url(TASKS_PATH)?;
        let response = self
            .authorized(self.client.get(url))
            .query(&[("parentId", parent.as_str())])
            .send()
            .await?;

        let envelope: Envelope<Vec<TaskStatus>> = self.handle_response(response).await?;
        Ok(envelope.response)
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    fn build_url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(Into::into)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(reqwest::header::CONTENT_TYPE, "application/json");
        match &self.token {
            Some(token) => request.header(AUTH_TOKEN_HEADER, token),
            None => request,
        }
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.build_url(path)?;
        let response = self.authorized(self.client.post(url)).json(body).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            serde_json::from_slice(&bytes).map_err(|e| SwimError::malformed(e.to_string()))
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| format!("HTTP {}", status));
            Err(SwimError::status(status.as_u16(), message))
        }
    }
}

#[async_trait]
impl TaskApi for ControllerClient {
    #[instrument(skip(self, request), fields(kind = %request.kind()))]
    async fn submit(&self, request: &OperationRequest) -> Result<TaskHandle> {
        let kind = request.kind();
        info!(
            "Submitting {} for device {}",
            kind,
            request.device_uuid()
        );

        let envelope: Envelope<TaskSubmission> =
            self.post_json(kind.path(), std::slice::from_ref(request)).await?;

        let task_id = envelope
            .response
            .task_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SwimError::malformed("taskId missing from submission response"))?;

        info!("Waiting for task {}", task_id);
        Ok(TaskHandle::new(task_id))
    }

    #[instrument(skip(self))]
    async fn fetch_status(&self, handle: &TaskHandle) -> Result<TaskStatus> {
        let url = self.build_url(&format!("{}/{}", TASK_PATH, handle))?;
        debug!("Getting task status from {}", url);

        let response = self.authorized(self.client.get(url)).send().await?;
        let envelope: Envelope<TaskStatus> = self.handle_response(response).await?;

        let mut status = envelope.response;
        if status.task_id.is_empty() {
            status.task_id = handle.as_str().to_string();
        }
        Ok(status)
    }
}
