//! Type definitions for the downloader job API

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Heights the backend knows how to select a format for
pub const SUPPORTED_HEIGHTS: [u32; 6] = [144, 240, 360, 480, 720, 1080];

/// What kind of media to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
}

impl MediaKind {
    /// Value of the `type` query parameter on the direct download endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// Name used when the response carries nothing better
    pub fn suggested_filename(&self) -> &'static str {
        match self {
            MediaKind::Video => "video.mp4",
            MediaKind::Audio => "audio.mp3",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            other => Err(format!("unknown media type '{}', expected video or audio", other)),
        }
    }
}

/// Requested video quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Best,
    /// Maximum frame height in pixels
    Height(u32),
}

impl Quality {
    /// Form/query value understood by the backend
    pub fn as_param(&self) -> String {
        match self {
            Quality::Best => "best".to_string(),
            Quality::Height(h) => h.to_string(),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_param())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches('p');
        if s.eq_ignore_ascii_case("best") {
            return Ok(Quality::Best);
        }
        match s.parse::<u32>() {
            Ok(h) if SUPPORTED_HEIGHTS.contains(&h) => Ok(Quality::Height(h)),
            _ => Err(format!(
                "unsupported quality '{}', expected best or one of {:?}",
                s, SUPPORTED_HEIGHTS
            )),
        }
    }
}

/// Options for a single download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadOptions {
    pub kind: MediaKind,
    pub quality: Quality,
}

impl DownloadOptions {
    pub fn video(quality: Quality) -> Self {
        Self {
            kind: MediaKind::Video,
            quality,
        }
    }

    pub fn audio() -> Self {
        Self {
            kind: MediaKind::Audio,
            quality: Quality::Best,
        }
    }
}

/// Response from starting a job
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

/// Job status as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Processing,
    Done,
    Failed,
    /// Any value the client does not understand
    Unknown(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "processing" => JobStatus::Processing,
            "done" => JobStatus::Done,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Unknown(value),
        }
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(JobStatus::from)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Processing => f.write_str("processing"),
            JobStatus::Done => f.write_str("done"),
            JobStatus::Failed => f.write_str("failed"),
            JobStatus::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// Response from the status endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Client-side view of a server job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

impl Job {
    pub fn from_status(id: &str, response: StatusResponse) -> Self {
        Self {
            id: id.to_string(),
            status: response.status,
            download_url: response.download_url,
            error: response.error,
        }
    }
}

/// Error body returned by the backend.
///
/// The direct endpoint uses `error`; framework-level errors use `detail`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorEnvelope {
    /// The first non-empty message in the envelope
    pub fn message(&self) -> Option<String> {
        if let Some(error) = self.error.as_deref().filter(|e| !e.trim().is_empty()) {
            return Some(error.to_string());
        }
        match &self.detail {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }
}

/// A completed download held in memory
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub filename: String,
    pub bytes: Vec<u8>,
    /// URL the bytes were fetched from
    pub source_url: String,
    pub content_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_response_parsing() {
        let done: StatusResponse =
            serde_json::from_str(r#"{"status":"done","download_url":"/downloads/a.mp4"}"#).unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert_eq!(done.download_url.as_deref(), Some("/downloads/a.mp4"));

        let failed: StatusResponse =
            serde_json::from_str(r#"{"status":"failed","error":"boom"}"#).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));

        let processing: StatusResponse = serde_json::from_str(r#"{"status":"processing"}"#).unwrap();
        assert!(!processing.status.is_terminal());
    }

    #[test]
    fn test_unknown_status_preserved() {
        let queued: StatusResponse = serde_json::from_str(r#"{"status":"queued"}"#).unwrap();
        assert_eq!(queued.status, JobStatus::Unknown("queued".to_string()));
        assert_eq!(queued.status.to_string(), "queued");
    }

    #[test]
    fn test_quality_parsing() {
        assert_eq!("best".parse::<Quality>().unwrap(), Quality::Best);
        assert_eq!("720".parse::<Quality>().unwrap(), Quality::Height(720));
        assert_eq!("1080p".parse::<Quality>().unwrap(), Quality::Height(1080));
        assert!("999".parse::<Quality>().is_err());
        assert_eq!(Quality::Height(360).as_param(), "360");
    }

    #[test]
    fn test_media_kind_parsing() {
        assert_eq!("Audio".parse::<MediaKind>().unwrap(), MediaKind::Audio);
        assert!("gif".parse::<MediaKind>().is_err());
        assert_eq!(MediaKind::Audio.suggested_filename(), "audio.mp3");
    }

    #[test]
    fn test_error_envelope_message() {
        let direct: ErrorEnvelope = serde_json::from_str(r#"{"error":"Missing url"}"#).unwrap();
        assert_eq!(direct.message().as_deref(), Some("Missing url"));

        let framework: ErrorEnvelope =
            serde_json::from_str(r#"{"detail":"Job not found"}"#).unwrap();
        assert_eq!(framework.message().as_deref(), Some("Job not found"));

        let empty: ErrorEnvelope = serde_json::from_str("{}").unwrap();
        assert!(empty.message().is_none());
    }
}
