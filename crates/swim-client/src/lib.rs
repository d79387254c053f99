//! SWIM Client Library
//!
//! Drives software image upgrades on a Catalyst Center controller: resolve an
//! image and a device, submit a distribution or activation, then poll the
//! resulting task until it finishes, fails, or times out.
//!
//! # Example
//!
//! ```rust,no_run
//! use swim_client::{CancellationToken, ControllerClient, ControllerConfig, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), swim_client::SwimError> {
//!     let config = ControllerConfig::builder("catc.example.com")
//!         .credentials("admin", "secret")
//!         .build();
//!     let policy = config.polling.policy();
//!     let client = ControllerClient::connect(config).await?;
//!
//!     let image = client.resolve_image("17.9.4").await?;
//!     let device = client.resolve_device("edge1.example.com").await?;
//!
//!     let orchestrator = Orchestrator::new(&client);
//!     let cancel = CancellationToken::new();
//!     orchestrator
//!         .distribute(&device.id, &image.image_uuid, policy, &cancel)
//!         .await?;
//!     orchestrator
//!         .activate(&device.id, &image.image_uuid, policy, &cancel)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Failure classification
//!
//! Every fallible call returns [`SwimError`]. Use [`SwimError::kind`] to tell
//! transport faults apart from remote task errors, timeouts and cancellation.

mod client;
mod config;
mod error;
mod orchestrator;
mod poller;
pub mod testing;
mod types;

pub use client::{ControllerClient, TaskApi};
pub use config::*;
pub use error::{ErrorKind, Result, SwimError, TransportError};
pub use orchestrator::{OperationResult, Orchestrator};
pub use poller::{PollPolicy, TaskPoller, DEFAULT_RETRY_INTERVAL, DEFAULT_TASK_TIMEOUT};
pub use types::*;

// Re-export the cancellation token used by the poller
pub use tokio_util::sync::CancellationToken;
