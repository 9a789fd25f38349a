//! Download session - drives one job from submission to a saved file
//!
//! States: `Idle -> Submitting -> Polling -> Saving -> Done`, with any error
//! moving straight to `Failed`. Progress is published to a [`StatusListener`]
//! instead of being written to shared UI state.

use crate::api::{validate_source_url, DownloadOptions, DownloadResult, JobApiClient};
use crate::config::ClientConfig;
use crate::error::{DownloaderError, Result};
use crate::poller::JobPoller;
use crate::save::save_blob;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Submitting,
    Polling,
    Saving,
    Done,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Submitting => "submitting",
            SessionState::Polling => "processing",
            SessionState::Saving => "saving",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Progress notifications emitted by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    StateChanged(SessionState),
    Submitted { job_id: String },
    Polling { attempt: u32 },
    Saved { path: PathBuf },
    /// Human-readable failure, emitted once per failed run
    Failed { message: String },
}

/// Receives session progress
pub trait StatusListener: Send + Sync {
    fn on_event(&self, event: &StatusEvent);
}

impl<F> StatusListener for F
where
    F: Fn(&StatusEvent) + Send + Sync,
{
    fn on_event(&self, event: &StatusEvent) {
        self(event)
    }
}

/// A result written to disk
#[derive(Debug, Clone)]
pub struct SavedDownload {
    /// `None` for direct downloads
    pub job_id: Option<String>,
    pub filename: String,
    pub path: PathBuf,
    pub size: usize,
}

/// Runs downloads one at a time and reports progress to a listener
pub struct DownloadSession {
    client: JobApiClient,
    config: ClientConfig,
    listener: Arc<dyn StatusListener>,
    busy: AtomicBool,
    cancel: CancellationToken,
}

/// Clears the busy flag when a run ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DownloadSession {
    /// Create a session for the backend in `config`
    pub fn new(config: ClientConfig, listener: Arc<dyn StatusListener>) -> Result<Self> {
        let client = JobApiClient::new(&config)?;
        Ok(Self {
            client,
            config,
            listener,
            busy: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        })
    }

    /// Session-wide stop switch. Cancelling aborts the running job, and every
    /// later run on this session fails with [`DownloaderError::Cancelled`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn client(&self) -> &JobApiClient {
        &self.client
    }

    /// Whether a run is currently in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn emit(&self, event: StatusEvent) {
        self.listener.on_event(&event);
    }

    fn enter(&self, state: SessionState) {
        info!("Session state: {}", state);
        self.emit(StatusEvent::StateChanged(state));
    }

    fn acquire(&self) -> Result<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DownloaderError::Busy)?;
        Ok(BusyGuard(&self.busy))
    }

    /// Submit a job for `url`, wait for it and save the result.
    ///
    /// A second call while one is running returns [`DownloaderError::Busy`]
    /// without touching the network.
    pub async fn run(&self, url: &str, options: DownloadOptions) -> Result<SavedDownload> {
        let _guard = self.acquire()?;
        let result = self.run_job(url, options).await;
        self.finish(result)
    }

    /// Fetch `url` through the direct endpoint and save it; no job is created
    pub async fn run_direct(&self, url: &str, options: DownloadOptions) -> Result<SavedDownload> {
        let _guard = self.acquire()?;
        let result = self.run_direct_inner(url, options).await;
        self.finish(result)
    }

    async fn run_job(&self, url: &str, options: DownloadOptions) -> Result<SavedDownload> {
        let source = validate_source_url(url)?;
        self.ensure_not_cancelled()?;

        self.enter(SessionState::Submitting);
        let job_id = self
            .cancellable(self.client.submit_job(source, &options))
            .await?;
        self.emit(StatusEvent::Submitted {
            job_id: job_id.clone(),
        });

        self.enter(SessionState::Polling);
        let poller = JobPoller::new(self.client.clone(), &self.config)
            .with_cancel_token(self.cancel.clone());
        let download = poller
            .poll_until_terminal_with(&job_id, |attempt| {
                self.emit(StatusEvent::Polling { attempt })
            })
            .await?;

        self.save(Some(job_id), download).await
    }

    async fn run_direct_inner(&self, url: &str, options: DownloadOptions) -> Result<SavedDownload> {
        let source = validate_source_url(url)?;
        self.ensure_not_cancelled()?;

        self.enter(SessionState::Submitting);
        let download = self
            .cancellable(self.client.direct_download(source, &options))
            .await?;

        self.save(None, download).await
    }

    async fn save(&self, job_id: Option<String>, download: DownloadResult) -> Result<SavedDownload> {
        self.enter(SessionState::Saving);
        let path = save_blob(&download.bytes, &download.filename, &self.config.output_dir).await?;
        self.emit(StatusEvent::Saved { path: path.clone() });

        Ok(SavedDownload {
            job_id,
            filename: download.filename,
            path,
            size: download.bytes.len(),
        })
    }

    async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DownloaderError::Cancelled),
            result = fut => result,
        }
    }

    fn ensure_not_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(DownloaderError::Cancelled);
        }
        Ok(())
    }

    fn finish(&self, result: Result<SavedDownload>) -> Result<SavedDownload> {
        match &result {
            Ok(saved) => {
                info!("Download saved to {}", saved.path.display());
                self.enter(SessionState::Done);
            }
            Err(e) => {
                error!("Download failed: {}", e);
                self.enter(SessionState::Failed);
                self.emit(StatusEvent::Failed {
                    message: e.to_string(),
                });
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_session() -> (DownloadSession, Arc<Mutex<Vec<StatusEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let listener = move |event: &StatusEvent| sink.lock().unwrap().push(event.clone());
        // Port 9 (discard) is never served here; validation must fail first.
        let config = ClientConfig::builder().base_url("http://127.0.0.1:9").build();
        let session = DownloadSession::new(config, Arc::new(listener)).unwrap();
        (session, events)
    }

    #[tokio::test]
    async fn test_blank_url_fails_once_without_submitting() {
        let (session, events) = recording_session();

        let err = session.run("   ", DownloadOptions::default()).await.unwrap_err();
        assert!(err.is_validation());

        let events = events.lock().unwrap();
        assert!(!events.contains(&StatusEvent::StateChanged(SessionState::Submitting)));
        let failures: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, StatusEvent::Failed { .. }))
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(
            events.last(),
            Some(&StatusEvent::Failed {
                message: "Please paste a media URL".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_cancelled_session_rejects_new_runs() {
        let (session, _events) = recording_session();
        session.cancel_token().cancel();

        let err = session
            .run("https://example.com/v", DownloadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloaderError::Cancelled));
        assert!(!session.is_busy());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Polling.to_string(), "processing");
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Saving.is_terminal());
    }
}
