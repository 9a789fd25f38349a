//! Error types for media-downloader

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloaderError {
    #[error("Please paste a media URL")]
    Validation,

    #[error("Failed to start job: {0}")]
    Submission(String),

    #[error("Status check failed for job {job_id}: {message}")]
    StatusQuery { job_id: String, message: String },

    #[error("Backend {url} is not reachable: {message}")]
    Unreachable { url: String, message: String },

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Unknown job status: {0}")]
    UnknownStatus(String),

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Job {job_id} still processing after {attempts} status checks")]
    PollTimeout { job_id: String, attempts: u32 },

    #[error("Download cancelled")]
    Cancelled,

    #[error("Another download is already in progress")]
    Busy,

    #[error("Failed to save {path}: {source}")]
    Save {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("Failed to build HTTP client: {0}")]
    ClientInit(#[source] reqwest::Error),
}

impl DownloaderError {
    /// Whether the error came from the caller's input rather than the backend
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation)
    }
}

pub type Result<T> = std::result::Result<T, DownloaderError>;
