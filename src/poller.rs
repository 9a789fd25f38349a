//! Job poller - waits for a job to reach a terminal state and fetches its result

use crate::api::{DownloadResult, Job, JobApiClient, JobStatus};
use crate::config::ClientConfig;
use crate::error::{DownloaderError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Message used when the backend marks a job failed without saying why
pub const GENERIC_FAILURE: &str = "unknown error";

/// Polls the status endpoint at a fixed interval until a job finishes
pub struct JobPoller {
    client: JobApiClient,
    poll_interval: Duration,
    max_attempts: Option<u32>,
    cancel: CancellationToken,
}

impl JobPoller {
    /// Create a poller using the interval and attempt bound from `config`
    pub fn new(client: JobApiClient, config: &ClientConfig) -> Self {
        Self {
            client,
            poll_interval: config.poll_interval,
            max_attempts: config.max_poll_attempts,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort polling and fetching when `token` is cancelled
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts this poller
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Poll until the job finishes, then download its result
    pub async fn poll_until_terminal(&self, job_id: &str) -> Result<DownloadResult> {
        self.poll_until_terminal_with(job_id, |_| {}).await
    }

    /// Same as [`poll_until_terminal`](Self::poll_until_terminal), calling
    /// `on_poll` with the attempt number before each status check
    pub async fn poll_until_terminal_with<F>(
        &self,
        job_id: &str,
        on_poll: F,
    ) -> Result<DownloadResult>
    where
        F: FnMut(u32),
    {
        let job = self.wait_for_completion(job_id, on_poll).await?;

        let download_url = job
            .download_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| DownloaderError::Fetch {
                url: format!("status/{}", job_id),
                message: "job finished without a download_url".to_string(),
            })?;

        info!("Job {} done, fetching {}", job_id, download_url);
        self.cancellable(self.client.fetch_result(&download_url))
            .await
    }

    /// Poll until the job is done; failures and unknown states become errors
    pub async fn wait_for_completion<F>(&self, job_id: &str, mut on_poll: F) -> Result<Job>
    where
        F: FnMut(u32),
    {
        let mut attempt: u32 = 0;

        loop {
            if let Some(max) = self.max_attempts {
                if attempt >= max {
                    warn!("Job {} not finished after {} status checks", job_id, attempt);
                    return Err(DownloaderError::PollTimeout {
                        job_id: job_id.to_string(),
                        attempts: attempt,
                    });
                }
            }

            self.cancellable(async {
                sleep(self.poll_interval).await;
                Ok(())
            })
            .await?;

            attempt += 1;
            on_poll(attempt);

            let job = self.cancellable(self.client.job_status(job_id)).await?;
            debug!("Job {} poll #{}: {}", job_id, attempt, job.status);

            match &job.status {
                JobStatus::Processing => continue,
                JobStatus::Done => return Ok(job),
                JobStatus::Failed => {
                    let message = job
                        .error
                        .filter(|e| !e.trim().is_empty())
                        .unwrap_or_else(|| GENERIC_FAILURE.to_string());
                    warn!("Job {} failed: {}", job_id, message);
                    return Err(DownloaderError::JobFailed(message));
                }
                JobStatus::Unknown(status) => {
                    warn!("Job {} reported unknown status '{}'", job_id, status);
                    return Err(DownloaderError::UnknownStatus(status.clone()));
                }
            }
        }
    }

    async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DownloaderError::Cancelled),
            result = fut => result,
        }
    }
}
