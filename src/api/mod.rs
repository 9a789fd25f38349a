//! Downloader backend API: wire types and HTTP client

pub mod client;
pub mod types;

pub use client::{validate_source_url, JobApiClient};
pub use types::{
    DownloadOptions, DownloadResult, ErrorEnvelope, Job, JobStatus, MediaKind, Quality,
    StatusResponse, SubmitResponse,
};
