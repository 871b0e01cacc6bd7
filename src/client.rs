//! The asynchronous Nexus client
//!
//! [`NexusClient`] wires the shared transport, the credential owner, the
//! request executor, the endpoint stubs and the two high-level operations
//! together. Clones share all state, including the default-header set.

use crate::auth::{AuthCoordinator, FileTokenStore, HttpTokenRedeemer, TokenStore};
use crate::bulk::{BulkLoader, LoadProgress};
use crate::config::ClientConfig;
use crate::endpoints::{ArtifactsClient, CatalogsClient, DataClient, JobsClient, UsersClient};
use crate::error::Result;
use crate::executor::RequestExecutor;
use crate::export::{ExportOrchestrator, ExportProgress, ExportRequest};
use crate::transport::Transport;
use crate::types::DataResponse;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Client for a Nexus service
#[derive(Clone)]
pub struct NexusClient {
    config: Arc<ClientConfig>,
    executor: RequestExecutor,
    users: UsersClient,
    catalogs: CatalogsClient,
    data: DataClient,
    jobs: JobsClient,
    artifacts: ArtifactsClient,
    loader: BulkLoader,
    exporter: ExportOrchestrator,
}

impl NexusClient {
    /// Create a client persisting tokens under the configured token directory
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = Transport::new(&config)?;
        let store = Arc::new(FileTokenStore::new(config.token_dir()));
        Ok(Self::assemble(transport, store, config))
    }

    /// Create a client around an existing `reqwest` client
    pub fn with_http_client(http: reqwest::Client, config: ClientConfig) -> Result<Self> {
        let transport = Transport::with_http_client(http, &config)?;
        let store = Arc::new(FileTokenStore::new(config.token_dir()));
        Ok(Self::assemble(transport, store, config))
    }

    /// Create a client with a custom token store
    pub fn with_token_store(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let transport = Transport::new(&config)?;
        Ok(Self::assemble(transport, store, config))
    }

    fn assemble(transport: Transport, store: Arc<dyn TokenStore>, config: ClientConfig) -> Self {
        let redeemer = Arc::new(HttpTokenRedeemer::new(transport.clone()));
        let auth = Arc::new(AuthCoordinator::new(
            transport.clone(),
            config.authorization_header.clone(),
            store,
            redeemer,
        ));
        let executor = RequestExecutor::new(transport, auth);

        let users = UsersClient::new(executor.clone());
        let catalogs = CatalogsClient::new(executor.clone());
        let data = DataClient::new(executor.clone());
        let jobs = JobsClient::new(executor.clone());
        let artifacts = ArtifactsClient::new(executor.clone());

        let loader = BulkLoader::new(catalogs.clone(), data.clone());
        let exporter = ExportOrchestrator::new(jobs.clone(), artifacts.clone(), &config);

        Self {
            config: Arc::new(config),
            executor,
            users,
            catalogs,
            data,
            jobs,
            artifacts,
            loader,
            exporter,
        }
    }

    /// The client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The request executor every endpoint call goes through
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// User endpoints
    pub fn users(&self) -> &UsersClient {
        &self.users
    }

    /// Catalog endpoints
    pub fn catalogs(&self) -> &CatalogsClient {
        &self.catalogs
    }

    /// Data endpoints
    pub fn data(&self) -> &DataClient {
        &self.data
    }

    /// Job endpoints
    pub fn jobs(&self) -> &JobsClient {
        &self.jobs
    }

    /// Artifact endpoints
    pub fn artifacts(&self) -> &ArtifactsClient {
        &self.artifacts
    }

    /// Whether the client currently holds a credential
    pub fn is_authenticated(&self) -> bool {
        self.executor.auth().is_authenticated()
    }

    /// Sign in with a refresh token, resuming a persisted session if one exists
    pub async fn sign_in(&self, refresh_token: &str, cancel: &CancellationToken) -> Result<()> {
        self.executor.auth().sign_in(refresh_token, cancel).await
    }

    /// Drop the credential; no network call
    pub fn sign_out(&self) {
        self.executor.auth().sign_out();
    }

    /// Attach configuration to all subsequent requests
    ///
    /// The value is sent JSON-encoded and base64-wrapped in the configuration
    /// header. There is a single header slot per client (shared by clones):
    /// operations running concurrently on one client must not attach different
    /// configurations, and releasing any guard clears the slot for everyone.
    pub fn attach_configuration<T: Serialize + ?Sized>(
        &self,
        configuration: &T,
    ) -> Result<ConfigurationGuard> {
        let encoded = STANDARD.encode(serde_json::to_vec(configuration)?);
        let transport = self.executor.transport();
        transport.set_default_header(&self.config.configuration_header, &encoded)?;
        debug!(bytes = encoded.len(), "configuration attached");

        Ok(ConfigurationGuard {
            transport: transport.clone(),
            header: self.config.configuration_header.clone(),
            released: false,
        })
    }

    /// Clear attached configuration
    pub fn clear_configuration(&self) {
        self.executor
            .transport()
            .remove_default_header(&self.config.configuration_header);
    }

    /// Load and decode many resource paths; see [`BulkLoader::load`]
    pub async fn load(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        resource_paths: &[String],
        on_progress: Option<LoadProgress<'_>>,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, DataResponse>> {
        self.loader
            .load(begin, end, resource_paths, on_progress, cancel)
            .await
    }

    /// Run an export job end to end; see [`ExportOrchestrator::export`]
    pub async fn export(
        &self,
        request: &ExportRequest,
        on_progress: Option<ExportProgress<'_>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.exporter.export(request, on_progress, cancel).await
    }
}

/// Clears attached configuration when released or dropped
#[must_use = "dropping the guard immediately clears the attached configuration"]
pub struct ConfigurationGuard {
    transport: Transport,
    header: String,
    released: bool,
}

impl ConfigurationGuard {
    /// Clear the attached configuration now
    pub fn release(mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        if !self.released {
            self.transport.remove_default_header(&self.header);
            self.released = true;
        }
    }
}

impl Drop for ConfigurationGuard {
    fn drop(&mut self) {
        self.clear();
    }
}
