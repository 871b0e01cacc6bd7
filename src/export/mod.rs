//! Export job orchestration
//!
//! An export runs as a pipeline: submit the job, poll it to completion,
//! download the resulting artifact into a temporary archive, unpack it into
//! the target folder, and delete the archive. Progress is reported per
//! [`Stage`]; every stage that runs ends with a `1.0` report.
//!
//! Cancellation is checked at submission, before each poll wait (and during
//! it), and before each HTTP send. The byte copy of the download is not a
//! cancellation checkpoint.

mod extract;


pub use extract::extract_zip;

use crate::config::ClientConfig;
use crate::endpoints::{ArtifactsClient, JobsClient};
use crate::error::{Error, Result};
use crate::frame::{body_error, body_reader};
use crate::transport::{canceled, check_canceled};
use crate::types::{ExportParameters, JobState, Stage};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempPath;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callback receiving `(progress, stage)` during an export
pub type ExportProgress<'a> = &'a (dyn Fn(f64, Stage) + Send + Sync);

/// What to export and where to put it
#[derive(Clone, Debug)]
pub struct ExportRequest {
    /// Begin of the exported period
    pub begin: DateTime<Utc>,
    /// End of the exported period
    pub end: DateTime<Utc>,
    /// Period covered by each file; zero produces a single file
    pub file_period: Duration,
    /// Target file format; `None` only forces server-side computation and skips
    /// download and extraction
    pub file_format: Option<String>,
    /// Resource paths to export
    pub resource_paths: Vec<String>,
    /// Opaque writer configuration
    pub configuration: Option<HashMap<String, serde_json::Value>>,
    /// Folder receiving the extracted files
    pub target_folder: PathBuf,
}

impl ExportRequest {
    fn parameters(&self) -> ExportParameters {
        ExportParameters {
            begin: self.begin,
            end: self.end,
            file_period: self.file_period,
            file_format: self.file_format.clone(),
            resource_paths: self.resource_paths.clone(),
            configuration: self.configuration.clone(),
        }
    }
}

/// Runs export jobs end to end
#[derive(Clone)]
pub struct ExportOrchestrator {
    jobs: JobsClient,
    artifacts: ArtifactsClient,
    poll_interval: Duration,
    chunk_size: usize,
    progress_interval: Duration,
    staging_dir: Option<PathBuf>,
}

impl ExportOrchestrator {
    /// Create an orchestrator over the job and artifact endpoints
    pub fn new(jobs: JobsClient, artifacts: ArtifactsClient, config: &ClientConfig) -> Self {
        Self {
            jobs,
            artifacts,
            poll_interval: config.poll_interval,
            chunk_size: config.download_chunk_size.max(1),
            progress_interval: config.progress_interval,
            staging_dir: config.staging_dir.clone(),
        }
    }

    /// Run an export
    pub async fn export(
        &self,
        request: &ExportRequest,
        on_progress: Option<ExportProgress<'_>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let report = |progress: f64, stage: Stage| {
            if let Some(on_progress) = on_progress {
                on_progress(progress, stage);
            }
        };

        check_canceled(cancel)?;
        let job = self.jobs.export(&request.parameters(), cancel).await?;
        info!(job_id = %job.id, resources = request.resource_paths.len(), "export job submitted");

        let artifact_id = self.wait_for_artifact(&job.id, &report, cancel).await?;
        report(1.0, Stage::Export);

        if request.file_format.is_none() {
            debug!(job_id = %job.id, "no file format requested, skipping download");
            return Ok(());
        }

        let archive = self.download(&artifact_id, &report, cancel).await?;
        let extracted = extract_in_background(&archive, &request.target_folder).await;
        cleanup(archive);

        let files = extracted?;
        info!(
            target_folder = %request.target_folder.display(),
            files = files.len(),
            "export extracted"
        );
        report(1.0, Stage::Extract);

        Ok(())
    }

    /// Poll the job until it reaches a terminal state; returns the artifact id
    async fn wait_for_artifact(
        &self,
        job_id: &str,
        report: &(dyn Fn(f64, Stage) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<String> {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(canceled()),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            let status = self.jobs.get_job_status(job_id, cancel).await?;
            debug!(job_id, status = ?status.status, progress = status.progress, "job polled");

            match status.status {
                JobState::Canceled => {
                    return Err(Error::Canceled("The job has been cancelled.".to_string()));
                }
                JobState::Faulted => {
                    return Err(Error::Canceled(format!(
                        "The job has failed. Reason: {}",
                        status.exception_message.unwrap_or_default()
                    )));
                }
                JobState::Completed => {
                    return match status.result {
                        Some(serde_json::Value::String(artifact_id)) => Ok(artifact_id),
                        _ => Err(Error::InvalidJobResult),
                    };
                }
                JobState::Running => {
                    if status.progress < 1.0 {
                        report(status.progress, Stage::Export);
                    }
                }
            }
        }
    }

    /// Stream the artifact into a fresh temporary file
    ///
    /// Mid-copy progress is reported at most once per `progress_interval`, only
    /// when the response declared its length, and never at or above `1.0`.
    async fn download(
        &self,
        artifact_id: &str,
        report: &(dyn Fn(f64, Stage) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<TempPath> {
        let response = self.artifacts.download(artifact_id, cancel).await?;
        let length = response.content_length();

        let archive = self.create_staging_file()?;
        let mut file = tokio::fs::File::create(&archive).await?;
        let mut reader = body_reader(response);
        let mut buffer = vec![0u8; self.chunk_size];
        let mut consumed: u64 = 0;
        let mut throttle = ProgressThrottle::new(self.progress_interval);

        loop {
            let received = reader.read(&mut buffer).await.map_err(body_error)?;
            if received == 0 {
                break;
            }

            file.write_all(&buffer[..received]).await?;
            consumed += received as u64;

            if throttle.ready()
                && let Some(length) = length
                && consumed < length
            {
                report(consumed as f64 / length as f64, Stage::Download);
            }
        }

        file.flush().await?;
        drop(file);

        info!(artifact_id, bytes = consumed, "artifact downloaded");
        report(1.0, Stage::Download);

        Ok(archive)
    }

    fn create_staging_file(&self) -> Result<TempPath> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("nexus-export-").suffix(".zip");

        let file = match &self.staging_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempfile_in(dir)?
            }
            None => builder.tempfile()?,
        };

        Ok(file.into_temp_path())
    }
}

async fn extract_in_background(archive: &Path, target_folder: &Path) -> Result<Vec<PathBuf>> {
    let archive = archive.to_path_buf();
    let target_folder = target_folder.to_path_buf();

    tokio::task::spawn_blocking(move || extract_zip(&archive, &target_folder))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("extraction task failed: {}", e))))?
}

/// Delete the staged archive; failures are logged and otherwise ignored
fn cleanup(archive: TempPath) {
    let path = archive.to_path_buf();
    if let Err(e) = archive.close() {
        warn!(path = %path.display(), error = %e, "failed to delete temporary archive");
    }
}

/// Rate limit for progress reports
pub(crate) struct ProgressThrottle {
    interval: Duration,
    last: Instant,
}

impl ProgressThrottle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// True at most once per interval; restarts the interval when it fires
    pub(crate) fn ready(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}
