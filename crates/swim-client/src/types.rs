//! Wire types for the controller's image management and task APIs

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Envelopes
// =============================================================================

/// `{ "response": ... }` wrapper used by every intent API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub response: T,
}

/// Response body of the token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(rename = "Token", default)]
    pub token: Option<String>,
}

/// Response body of an operation submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSubmission {
    #[serde(default)]
    pub task_id: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
}

// =============================================================================
// Tasks
// =============================================================================

/// Opaque task identifier returned by a submit call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Timestamp reported by the controller
///
/// The controller sends epoch milliseconds; RFC 3339 strings are accepted too,
/// and anything else is kept verbatim since only presence is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    EpochMillis(i64),
    Rfc3339(DateTime<Utc>),
    Other(String),
}

impl Timestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::EpochMillis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Self::Rfc3339(dt) => Some(*dt),
            Self::Other(_) => None,
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => match self {
                Self::Other(s) => f.write_str(s),
                Self::EpochMillis(ms) => write!(f, "{}", ms),
                Self::Rfc3339(dt) => write!(f, "{}", dt),
            },
        }
    }
}

/// Snapshot of a task at one poll instant
///
/// `end_time` being present is what makes a snapshot terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawTaskStatus")]
pub struct TaskStatus {
    pub task_id: String,

    pub is_error: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,

    /// Free-form progress text, the error detail when `is_error` is set
    pub progress: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Status body as the controller sends it
///
/// Every field may be missing or `null`. The status endpoint names the id
/// `id`, submissions name it `taskId`; either (or both) is accepted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTaskStatus {
    id: Option<String>,
    task_id: Option<String>,
    is_error: Option<bool>,
    end_time: Option<Timestamp>,
    progress: Option<String>,
    start_time: Option<Timestamp>,
    failure_reason: Option<String>,
    service_type: Option<String>,
    parent_id: Option<String>,
}

impl From<RawTaskStatus> for TaskStatus {
    fn from(raw: RawTaskStatus) -> Self {
        Self {
            task_id: raw.task_id.or(raw.id).unwrap_or_default(),
            is_error: raw.is_error.unwrap_or(false),
            end_time: raw.end_time,
            progress: raw.progress.unwrap_or_default(),
            start_time: raw.start_time,
            failure_reason: raw.failure_reason,
            service_type: raw.service_type,
            parent_id: raw.parent_id,
        }
    }
}

impl TaskStatus {
    /// Check whether the controller considers the task finished
    pub fn is_terminal(&self) -> bool {
        self.end_time.is_some()
    }

    /// Text for progress listings: `failureReason` if set, else `progress`
    ///
    /// Display only. [`SwimError::RemoteTask`](crate::SwimError::RemoteTask)
    /// always carries `progress`.
    pub fn display_reason(&self) -> &str {
        self.failure_reason
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.progress)
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Which image operation to submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Distribution,
    Activation,
}

impl OperationKind {
    /// Submission endpoint, relative to the controller base URL
    pub fn path(&self) -> &'static str {
        match self {
            Self::Distribution => "/dna/intent/api/v1/image/distribution",
            Self::Activation => "/dna/intent/api/v1/image/activation/device",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Distribution => write!(f, "distribution"),
            Self::Activation => write!(f, "activation"),
        }
    }
}

/// Body element of `POST /image/distribution`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRequest {
    pub device_uuid: String,
    pub image_uuid: String,
}

/// Body element of `POST /image/activation/device`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRequest {
    pub activate_lower_image_version: bool,
    pub device_upgrade_mode: String,
    pub device_uuid: String,
    pub distribute_if_needed: bool,
    pub image_uuid_list: Vec<String>,
    pub smu_image_uuid_list: Vec<String>,
}

/// Payload of a distribute or activate call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OperationRequest {
    Distribution(DistributionRequest),
    Activation(ActivationRequest),
}

impl OperationRequest {
    pub fn distribution(device_uuid: impl Into<String>, image_uuid: impl Into<String>) -> Self {
        Self::Distribution(DistributionRequest {
            device_uuid: device_uuid.into(),
            image_uuid: image_uuid.into(),
        })
    }

    /// Activation that never re-distributes and keeps the current upgrade mode
    pub fn activation(device_uuid: impl Into<String>, image_uuid: impl Into<String>) -> Self {
        Self::Activation(ActivationRequest {
            activate_lower_image_version: true,
            device_upgrade_mode: "currentlyExists".to_string(),
            device_uuid: device_uuid.into(),
            distribute_if_needed: false,
            image_uuid_list: vec![image_uuid.into()],
            smu_image_uuid_list: Vec::new(),
        })
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Distribution(_) => OperationKind::Distribution,
            Self::Activation(_) => OperationKind::Activation,
        }
    }

    pub fn device_uuid(&self) -> &str {
        match self {
            Self::Distribution(r) => &r.device_uuid,
            Self::Activation(r) => &r.device_uuid,
        }
    }
}

// =============================================================================
// Lookups
// =============================================================================

/// Image record from `GET /image/importation`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub image_uuid: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub family: Option<String>,
}

/// Device record from `GET /network-device`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: String,

    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub management_ip_address: Option<String>,

    #[serde(default)]
    pub software_version: Option<String>,

    #[serde(default)]
    pub platform_id: Option<String>,
}
