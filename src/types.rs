//! Core types for nexus-client
//!
//! Wire models exchanged with the Nexus service plus the aggregate types
//! returned by the high-level operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Access/refresh token pair issued by the token endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Short-lived bearer token
    pub access_token: String,
    /// Long-lived token exchanged for the next pair; rotates on every use
    pub refresh_token: String,
}

// Tokens are secrets; never print them.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Body of a token refresh request
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    /// The refresh token to redeem
    pub refresh_token: String,
}

impl RefreshTokenRequest {
    /// Create a new refresh request
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
        }
    }
}

/// Handle of a server-side job, returned on submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Job identifier used for polling
    pub id: String,
    /// Job type (e.g. "export")
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Owner of the job
    #[serde(default)]
    pub owner: Option<String>,
}

/// Lifecycle state of a server-side job
///
/// `Completed`, `Faulted` and `Canceled` are terminal. Every non-terminal wire
/// state (created, waiting, running, ...) maps to `Running`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Finished successfully
    #[serde(rename = "RanToCompletion", alias = "Completed")]
    Completed,
    /// Finished with an error
    Faulted,
    /// Canceled on the server
    Canceled,
    /// Not yet finished
    #[serde(other)]
    Running,
}

impl JobState {
    /// Whether the state is final
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running)
    }
}

/// Result of polling a job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// Start time of the job
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// Current state
    pub status: JobState,
    /// Progress in [0, 1]
    #[serde(default)]
    pub progress: f64,
    /// Error text when the job faulted
    #[serde(default)]
    pub exception_message: Option<String>,
    /// Opaque job result (the artifact id for export jobs)
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

/// Parameters of an export job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportParameters {
    /// Begin of the exported period
    pub begin: DateTime<Utc>,
    /// End of the exported period
    pub end: DateTime<Utc>,
    /// Period covered by each file; zero produces a single file
    #[serde(with = "timespan")]
    pub file_period: Duration,
    /// Target file format; `None` only computes (and caches) the data server-side
    #[serde(rename = "type")]
    pub file_format: Option<String>,
    /// Resource paths to export
    pub resource_paths: Vec<String>,
    /// Opaque writer configuration
    pub configuration: Option<HashMap<String, serde_json::Value>>,
}

/// Catalog item resolved for a resource path
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    /// The resource
    pub resource: Resource,
    /// The representation selected by the resource path
    pub representation: Representation,
    /// Optional representation parameters
    #[serde(default)]
    pub parameters: Option<HashMap<String, String>>,
}

/// A resource in a catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Resource identifier
    pub id: String,
    /// Free-form property bag
    #[serde(default)]
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
    /// Available representations
    #[serde(default)]
    pub representations: Option<Vec<Representation>>,
}

impl Resource {
    /// A string-typed entry of the property bag
    ///
    /// Returns `None` when the bag is absent, the key is missing, or the value
    /// is not a JSON string.
    pub fn string_property(&self, key: &str) -> Option<String> {
        self.properties
            .as_ref()?
            .get(key)?
            .as_str()
            .map(str::to_string)
    }
}

/// A representation of a resource
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Representation {
    /// Sample data type (e.g. "FLOAT64")
    pub data_type: String,
    /// Time between two consecutive samples
    #[serde(with = "timespan")]
    pub sample_period: Duration,
    /// Optional representation parameters
    #[serde(default)]
    pub parameters: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Decoded data of one resource path
#[derive(Clone, Debug, PartialEq)]
pub struct DataResponse {
    /// The catalog item the data belongs to
    pub catalog_item: CatalogItem,
    /// Resource name
    pub name: String,
    /// Optional unit from the resource properties
    pub unit: Option<String>,
    /// Optional description from the resource properties
    pub description: Option<String>,
    /// Time between two consecutive samples
    pub sample_period: Duration,
    /// Decoded samples
    pub values: Vec<f64>,
}

/// Stage reported alongside export progress
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Server-side job execution
    Export,
    /// Artifact download
    Download,
    /// Archive extraction
    Extract,
}

impl Stage {
    /// The stage label passed to progress callbacks
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Export => "export",
            Stage::Download => "download",
            Stage::Extract => "extract",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TimeSpan text serialization (`[d.]hh:mm:ss[.fffffff]`)
pub mod timespan {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    const NANOS_PER_TICK: u32 = 100;

    /// Format a duration as TimeSpan text
    pub fn format(duration: &Duration) -> String {
        let total = duration.as_secs();
        let days = total / 86_400;
        let hours = (total % 86_400) / 3_600;
        let minutes = (total % 3_600) / 60;
        let seconds = total % 60;
        let ticks = duration.subsec_nanos() / NANOS_PER_TICK;

        let mut text = String::new();
        if days > 0 {
            text.push_str(&format!("{}.", days));
        }
        text.push_str(&format!("{:02}:{:02}:{:02}", hours, minutes, seconds));
        if ticks > 0 {
            text.push_str(&format!(".{:07}", ticks));
        }
        text
    }

    /// Parse TimeSpan text into a duration
    pub fn parse(text: &str) -> Option<Duration> {
        let text = text.trim();
        let colon = text.find(':')?;

        let (days, clock) = match text[..colon].find('.') {
            Some(dot) => (text[..dot].parse::<u64>().ok()?, &text[dot + 1..]),
            None => (0, text),
        };

        let mut parts = clock.splitn(3, ':');
        let hours: u64 = parts.next()?.parse().ok()?;
        let minutes: u64 = parts.next()?.parse().ok()?;
        let seconds_part = parts.next()?;

        let (seconds, nanos) = match seconds_part.split_once('.') {
            Some((whole, fraction)) => {
                if fraction.is_empty()
                    || fraction.len() > 9
                    || !fraction.bytes().all(|b| b.is_ascii_digit())
                {
                    return None;
                }
                let scaled = format!("{:0<9}", fraction);
                (whole.parse::<u64>().ok()?, scaled.parse::<u32>().ok()?)
            }
            None => (seconds_part.parse::<u64>().ok()?, 0),
        };

        if hours > 23 || minutes > 59 || seconds > 59 {
            return None;
        }

        let secs = days
            .checked_mul(86_400)?
            .checked_add(hours * 3_600 + minutes * 60 + seconds)?;
        Some(Duration::new(secs, nanos))
    }

    /// Serialize a duration as TimeSpan text
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(duration))
    }

    /// Deserialize TimeSpan text into a duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        parse(&text).ok_or_else(|| de::Error::custom(format!("invalid time span: {}", text)))
    }
}
