//! Configuration types for nexus-client

use crate::error::{Error, Result};
use reqwest::header::HeaderName;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Client configuration
///
/// Every field except `base_url` has a sensible default, so a config can be
/// deserialized from a partial JSON/TOML document or built with
/// [`ClientConfig::new`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the Nexus service; endpoint paths are resolved against it
    pub base_url: Url,

    /// Maximum wait for response headers; body streaming is not limited (default: 60 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Directory holding persisted refresh-token records
    /// (default: `<home>/.nexus-api/tokens`)
    #[serde(default)]
    pub token_dir: Option<PathBuf>,

    /// Directory for temporary export archives (default: the system temp directory)
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    /// Delay between export job status polls (default: 1 second)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Buffer size used when copying a downloaded artifact to disk (default: 32 KiB)
    #[serde(default = "default_download_chunk_size")]
    pub download_chunk_size: usize,

    /// Minimum wall time between two download progress reports (default: 1 second)
    #[serde(default = "default_progress_interval", with = "duration_serde")]
    pub progress_interval: Duration,

    /// Header carrying attached configuration (default: "Nexus-Configuration")
    #[serde(default = "default_configuration_header")]
    pub configuration_header: String,

    /// Header carrying the bearer token (default: "Authorization")
    #[serde(default = "default_authorization_header")]
    pub authorization_header: String,
}

impl ClientConfig {
    /// Create a configuration for the given base URL with all defaults
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: default_timeout(),
            token_dir: None,
            staging_dir: None,
            poll_interval: default_poll_interval(),
            download_chunk_size: default_download_chunk_size(),
            progress_interval: default_progress_interval(),
            configuration_header: default_configuration_header(),
            authorization_header: default_authorization_header(),
        }
    }

    /// Parse the base URL and create a configuration with all defaults
    pub fn from_base_url(base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url)
            .map_err(|e| Error::config("base_url", format!("invalid base URL: {}", e)))?;
        Ok(Self::new(url))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.cannot_be_a_base() {
            return Err(Error::config(
                "base_url",
                format!("{} cannot be used as a base URL", self.base_url),
            ));
        }

        if self.download_chunk_size == 0 {
            return Err(Error::config(
                "download_chunk_size",
                "download chunk size must be greater than zero",
            ));
        }

        for (key, value) in [
            ("configuration_header", &self.configuration_header),
            ("authorization_header", &self.authorization_header),
        ] {
            HeaderName::from_bytes(value.as_bytes())
                .map_err(|e| Error::config(key, format!("invalid header name {:?}: {}", value, e)))?;
        }

        Ok(())
    }

    /// The directory holding persisted refresh-token records
    ///
    /// Falls back to `<home>/.nexus-api/tokens`, or a relative `.nexus-api/tokens`
    /// when no home directory can be determined.
    pub fn token_dir(&self) -> PathBuf {
        self.token_dir.clone().unwrap_or_else(default_token_dir)
    }
}

/// Default token directory under the user's home
pub fn default_token_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".nexus-api")
        .join("tokens")
}

// Default value functions
fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_download_chunk_size() -> usize {
    32 * 1024
}

fn default_progress_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_configuration_header() -> String {
    "Nexus-Configuration".to_string()
}

fn default_authorization_header() -> String {
    "Authorization".to_string()
}

// Duration serialization helper (whole milliseconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
