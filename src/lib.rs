//! Media Downloader - client for a media-conversion job API
//!
//! Submits a source URL to the downloader backend, polls the job until it
//! reaches a terminal state, fetches the produced file and saves it.
//!
//! Backend routes used:
//! - `POST /download`, `POST /download-audio` - start a job
//! - `GET /status/{job_id}` - job status
//! - `GET {download_url}` - finished file
//! - `GET /download?url=..&type=..&quality=..` - direct, job-less download

pub mod api;
pub mod config;
pub mod error;
pub mod filename;
pub mod poller;
pub mod save;
pub mod session;

pub use api::{DownloadOptions, DownloadResult, Job, JobApiClient, JobStatus, MediaKind, Quality};
pub use config::ClientConfig;
pub use error::{DownloaderError, Result};
pub use filename::{parse_content_disposition, resolve_filename, DispositionFilename};
pub use poller::JobPoller;
pub use save::save_blob;
pub use session::{DownloadSession, SavedDownload, SessionState, StatusEvent, StatusListener};

/// Download `url` into the configured output directory and return where it landed.
///
/// Uses the job API; progress is only logged.
///
/// # Example
/// ```ignore
/// use media_downloader::{download_media, ClientConfig, DownloadOptions, Quality};
///
/// #[tokio::main]
/// async fn main() -> media_downloader::Result<()> {
///     let config = ClientConfig::builder().output_dir("./downloads").build();
///     let saved = download_media(config, "https://youtu.be/abc", DownloadOptions::video(Quality::Height(720))).await?;
///     println!("{}", saved.path.display());
///     Ok(())
/// }
/// ```
pub async fn download_media(
    config: ClientConfig,
    url: &str,
    options: DownloadOptions,
) -> Result<SavedDownload> {
    let listener = |event: &StatusEvent| tracing::debug!("{:?}", event);
    let session = DownloadSession::new(config, std::sync::Arc::new(listener))?;
    session.run(url, options).await
}
