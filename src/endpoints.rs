//! Endpoint stubs used by the runtime core
//!
//! Each sub-client only builds the relative URL (path parameters and query
//! string percent-encoded here) and hands the exchange to [`RequestExecutor`].

use crate::error::Result;
use crate::executor::RequestExecutor;
use crate::transport::RequestSpec;
use crate::types::{CatalogItem, ExportParameters, Job, JobStatus, RefreshTokenRequest, TokenPair};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, Response};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

const JSON: &str = "application/json";
const OCTET_STREAM: &str = "application/octet-stream";

fn encode_time(time: &DateTime<Utc>) -> String {
    urlencoding::encode(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true)).into_owned()
}

/// User endpoints
#[derive(Clone)]
pub struct UsersClient {
    executor: RequestExecutor,
}

impl UsersClient {
    pub(crate) fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Exchange a refresh token for a new token pair
    pub async fn refresh_token(
        &self,
        request: &RefreshTokenRequest,
        cancel: &CancellationToken,
    ) -> Result<TokenPair> {
        let spec = RequestSpec::new(Method::POST, "api/v1/users/tokens/refresh")
            .accept(JSON)
            .json_body(request)?;
        self.executor.invoke_json(&spec, cancel).await
    }
}

/// Catalog endpoints
#[derive(Clone)]
pub struct CatalogsClient {
    executor: RequestExecutor,
}

impl CatalogsClient {
    pub(crate) fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Resolve many resource paths to catalog items in one request
    pub async fn search_catalog_items(
        &self,
        resource_paths: &[String],
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, CatalogItem>> {
        let spec = RequestSpec::new(Method::POST, "api/v1/catalogs/search-items")
            .accept(JSON)
            .json_body(resource_paths)?;
        self.executor.invoke_json(&spec, cancel).await
    }
}

/// Data endpoints
#[derive(Clone)]
pub struct DataClient {
    executor: RequestExecutor,
}

impl DataClient {
    pub(crate) fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Request the raw sample stream of a resource path for a time range
    pub async fn get_stream(
        &self,
        resource_path: &str,
        begin: &DateTime<Utc>,
        end: &DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let url = format!(
            "api/v1/data?resourcePath={}&begin={}&end={}",
            urlencoding::encode(resource_path),
            encode_time(begin),
            encode_time(end)
        );
        let spec = RequestSpec::new(Method::GET, url).accept(OCTET_STREAM);
        self.executor.invoke_raw(&spec, cancel).await
    }
}

/// Job endpoints
#[derive(Clone)]
pub struct JobsClient {
    executor: RequestExecutor,
}

impl JobsClient {
    pub(crate) fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Submit an export job
    pub async fn export(
        &self,
        parameters: &ExportParameters,
        cancel: &CancellationToken,
    ) -> Result<Job> {
        let spec = RequestSpec::new(Method::POST, "api/v1/jobs/export")
            .accept(JSON)
            .json_body(parameters)?;
        self.executor.invoke_json(&spec, cancel).await
    }

    /// Poll the status of a job
    pub async fn get_job_status(&self, job_id: &str, cancel: &CancellationToken) -> Result<JobStatus> {
        let url = format!("api/v1/jobs/{}/status", urlencoding::encode(job_id));
        let spec = RequestSpec::new(Method::GET, url).accept(JSON);
        self.executor.invoke_json(&spec, cancel).await
    }
}

/// Artifact endpoints
#[derive(Clone)]
pub struct ArtifactsClient {
    executor: RequestExecutor,
}

impl ArtifactsClient {
    pub(crate) fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Download an artifact as a raw stream
    pub async fn download(&self, artifact_id: &str, cancel: &CancellationToken) -> Result<Response> {
        let url = format!("api/v1/artifacts/{}", urlencoding::encode(artifact_id));
        let spec = RequestSpec::new(Method::GET, url).accept(OCTET_STREAM);
        self.executor.invoke_raw(&spec, cancel).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_are_rfc3339_utc_and_percent_encoded() {
        let time: DateTime<Utc> = "2024-01-02T03:04:05Z".parse().unwrap();
        assert_eq!(encode_time(&time), "2024-01-02T03%3A04%3A05Z");
    }
}
