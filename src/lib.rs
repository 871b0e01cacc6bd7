//! # nexus-client
//!
//! Runtime core of the Nexus API client: authenticated request execution,
//! bulk data loading and export jobs.
//!
//! ## Design Philosophy
//!
//! nexus-client is designed to be:
//! - **Self-healing** - Expired access tokens are refreshed and the request resent, once
//! - **Safe to share** - One client serves many concurrent tasks; refreshes are single-flight
//! - **Library-first** - No CLI or UI; the caller installs its own `tracing` subscriber
//! - **Cancellable** - Every operation takes a `CancellationToken`
//!
//! ## Quick Start
//!
//! ```no_run
//! use nexus_client::{ClientConfig, NexusClient};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_base_url("https://nexus.example.com")?;
//!     let client = NexusClient::new(config)?;
//!     let cancel = CancellationToken::new();
//!
//!     client.sign_in("my-refresh-token", &cancel).await?;
//!
//!     let end = chrono::Utc::now();
//!     let begin = end - chrono::Duration::hours(1);
//!     let paths = vec!["/sample/temperature/T1/1_s".to_string()];
//!
//!     let data = client.load(begin, end, &paths, None, &cancel).await?;
//!     for (path, response) in &data {
//!         println!("{}: {} samples", path, response.values.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Authentication: credential ownership, refresh and persistence
pub mod auth;
/// Blocking adapter over the async client
pub mod blocking;
/// Bulk loading of many resource paths
pub mod bulk;
/// Async client facade
pub mod client;
/// Configuration types
pub mod config;
/// Endpoint sub-clients
pub mod endpoints;
/// Error types
pub mod error;
/// Request execution with the 401 refresh-retry policy
pub mod executor;
/// Export jobs: submit, poll, download, extract
pub mod export;
/// Binary sample frame decoding
pub mod frame;
/// Shared HTTP transport
pub mod transport;
/// Wire models
pub mod types;

// Re-export commonly used types
pub use auth::{AuthCoordinator, FileTokenStore, MemoryTokenStore, TokenStore};
pub use bulk::BulkLoader;
pub use client::{ConfigurationGuard, NexusClient};
pub use config::ClientConfig;
pub use error::{Error, FrameError, Result};
pub use executor::RequestExecutor;
pub use export::{ExportOrchestrator, ExportRequest};
pub use types::{
    CatalogItem, DataResponse, ExportParameters, Job, JobState, JobStatus, Representation,
    Resource, Stage, TokenPair,
};
pub use tokio_util::sync::CancellationToken;
