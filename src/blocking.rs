//! A blocking Nexus client
//!
//! [`NexusClient`] owns a current-thread tokio runtime and drives the async
//! client on it. Each call blocks the calling thread until the operation
//! finishes.
//!
//! Calling into this client from inside an async runtime panics, because tokio
//! refuses to start a nested `block_on`. Use [`crate::NexusClient`] there.

use crate::auth::TokenStore;
use crate::bulk::LoadProgress;
use crate::client::{self, ConfigurationGuard};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::export::{ExportProgress, ExportRequest};
use crate::types::DataResponse;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

/// Blocking client for a Nexus service
pub struct NexusClient {
    inner: client::NexusClient,
    runtime: Runtime,
}

impl NexusClient {
    /// Create a client persisting tokens under the configured token directory
    pub fn new(config: ClientConfig) -> Result<Self> {
        let runtime = build_runtime()?;
        let inner = client::NexusClient::new(config)?;
        Ok(Self { inner, runtime })
    }

    /// Create a client with a custom token store
    pub fn with_token_store(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let runtime = build_runtime()?;
        let inner = client::NexusClient::with_token_store(config, store)?;
        Ok(Self { inner, runtime })
    }

    /// The async client driven by this adapter
    pub fn as_async(&self) -> &client::NexusClient {
        &self.inner
    }

    /// The client configuration
    pub fn config(&self) -> &ClientConfig {
        self.inner.config()
    }

    /// Whether the client currently holds a credential
    pub fn is_authenticated(&self) -> bool {
        self.inner.is_authenticated()
    }

    /// Sign in with a refresh token; see [`client::NexusClient::sign_in`]
    pub fn sign_in(&self, refresh_token: &str, cancel: &CancellationToken) -> Result<()> {
        self.block_on(self.inner.sign_in(refresh_token, cancel))
    }

    /// Drop the credential
    pub fn sign_out(&self) {
        self.inner.sign_out();
    }

    /// Attach configuration to all subsequent requests
    pub fn attach_configuration<T: Serialize + ?Sized>(
        &self,
        configuration: &T,
    ) -> Result<ConfigurationGuard> {
        self.inner.attach_configuration(configuration)
    }

    /// Clear attached configuration
    pub fn clear_configuration(&self) {
        self.inner.clear_configuration();
    }

    /// Load and decode many resource paths
    pub fn load(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        resource_paths: &[String],
        on_progress: Option<LoadProgress<'_>>,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, DataResponse>> {
        self.block_on(
            self.inner
                .load(begin, end, resource_paths, on_progress, cancel),
        )
    }

    /// Run an export job end to end
    pub fn export(
        &self,
        request: &ExportRequest,
        on_progress: Option<ExportProgress<'_>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.block_on(self.inner.export(request, on_progress, cancel))
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

fn build_runtime() -> Result<Runtime> {
    Ok(Builder::new_current_thread().enable_all().build()?)
}
