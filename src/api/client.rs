//! REST API client for the downloader backend

use super::types::{
    DownloadOptions, DownloadResult, ErrorEnvelope, Job, MediaKind, StatusResponse, SubmitResponse,
};
use crate::config::ClientConfig;
use crate::error::{DownloaderError, Result};
use crate::filename::{resolve_filename, FilenameSources};
use reqwest::header::{HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Trim a source URL and reject it if nothing is left
pub fn validate_source_url(url: &str) -> Result<&str> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(DownloaderError::Validation);
    }
    Ok(trimmed)
}

/// HTTP client for the job API
#[derive(Debug, Clone)]
pub struct JobApiClient {
    /// Base with a trailing slash, for relative joins
    base: Url,
    client: Client,
    /// Applied to API calls only; result bodies can take as long as they need
    request_timeout: Duration,
}

impl JobApiClient {
    /// Create a client for the backend named in `config`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base = config.base()?;
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(DownloaderError::ClientInit)?;

        Ok(Self {
            base,
            client,
            request_timeout: config.request_timeout,
        })
    }

    /// Base address without the trailing slash
    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    /// Check that the backend answers on its root route
    pub async fn health_check(&self) -> Result<()> {
        let url = self.endpoint("")?;
        let unreachable = |message: String| DownloaderError::Unreachable {
            url: self.base_url().to_string(),
            message,
        };
        match self.client.get(url).timeout(self.request_timeout).send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(unreachable(format!("status {}", response.status()))),
            Err(e) => Err(unreachable(e.to_string())),
        }
    }

    /// Start a conversion job and return its id
    pub async fn submit_job(&self, url: &str, options: &DownloadOptions) -> Result<String> {
        let source = validate_source_url(url)?;

        let (endpoint, form): (_, Vec<(&str, String)>) = match options.kind {
            MediaKind::Video => (
                self.endpoint("download")?,
                vec![("url", source.to_string()), ("quality", options.quality.as_param())],
            ),
            MediaKind::Audio => (
                self.endpoint("download-audio")?,
                vec![("url", source.to_string())],
            ),
        };
        debug!("Submitting {} job to {}", options.kind, endpoint);

        let response = self
            .client
            .post(endpoint)
            .form(&form)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| DownloaderError::Submission(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DownloaderError::Submission(error_message(response).await));
        }

        let submitted = response
            .json::<SubmitResponse>()
            .await
            .map_err(|e| DownloaderError::Submission(format!("Failed to parse response: {}", e)))?;

        info!("Job {} started for {}", submitted.job_id, source);
        Ok(submitted.job_id)
    }

    /// Query the current status of a job
    pub async fn job_status(&self, job_id: &str) -> Result<Job> {
        let url = self.endpoint(&format!("status/{}", urlencoding::encode(job_id)))?;
        let query_error = |message: String| DownloaderError::StatusQuery {
            job_id: job_id.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| query_error(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = error_message(response).await;
            return Err(query_error(format!("HTTP {}: {}", status.as_u16(), message)));
        }

        let body = response
            .json::<StatusResponse>()
            .await
            .map_err(|e| query_error(format!("Failed to parse status: {}", e)))?;

        Ok(Job::from_status(job_id, body))
    }

    /// Turn a `download_url` from the status endpoint into an absolute URL.
    ///
    /// Root-relative paths are appended to the configured base, so a base of
    /// `http://host/api` and `/downloads/a.mp4` yields `http://host/api/downloads/a.mp4`.
    pub fn resolve_download_url(&self, download_url: &str) -> Result<Url> {
        let location = download_url.trim();
        let fetch_error = |message: String| DownloaderError::Fetch {
            url: location.to_string(),
            message,
        };

        if location.is_empty() {
            return Err(fetch_error("empty download location".to_string()));
        }

        if location.starts_with("//") {
            return self.base.join(location).map_err(|e| fetch_error(e.to_string()));
        }
        if let Some(path) = location.strip_prefix('/') {
            return self.base.join(path).map_err(|e| fetch_error(e.to_string()));
        }
        match Url::parse(location) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                self.base.join(location).map_err(|e| fetch_error(e.to_string()))
            }
            Err(e) => Err(fetch_error(e.to_string())),
        }
    }

    /// Download the file a finished job points at
    pub async fn fetch_result(&self, download_url: &str) -> Result<DownloadResult> {
        let url = self.resolve_download_url(download_url)?;
        let response = self.get_binary(url, &[]).await?;
        read_download(response, None).await
    }

    /// Ask the backend for the file directly, without a job
    pub async fn direct_download(
        &self,
        url: &str,
        options: &DownloadOptions,
    ) -> Result<DownloadResult> {
        let source = validate_source_url(url)?;
        let endpoint = self.endpoint("download")?;

        let mut query = vec![("url", source.to_string()), ("type", options.kind.to_string())];
        if options.kind == MediaKind::Video {
            query.push(("quality", options.quality.as_param()));
        }
        debug!("Direct {} download of {}", options.kind, source);

        let response = self.get_binary(endpoint, &query).await?;
        read_download(response, Some(options.kind.suggested_filename())).await
    }

    async fn get_binary(&self, url: Url, query: &[(&str, String)]) -> Result<Response> {
        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| DownloaderError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let final_url = response.url().to_string();
            return Err(DownloaderError::Fetch {
                url: final_url,
                message: error_message(response).await,
            });
        }
        Ok(response)
    }
}

/// Read a successful binary response and name it.
///
/// With a `suggested` name the URL path is ignored, since the direct
/// endpoint's path says nothing about the file.
async fn read_download(response: Response, suggested: Option<&str>) -> Result<DownloadResult> {
    let final_url = response.url().clone();
    // Backends send the disposition filename as raw UTF-8, which `to_str` rejects
    let header = |name: HeaderName| {
        response
            .headers()
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
    };
    let disposition = header(CONTENT_DISPOSITION);
    let content_type = header(CONTENT_TYPE);

    let filename = resolve_filename(FilenameSources {
        content_disposition: disposition.as_deref(),
        content_type: content_type.as_deref(),
        url: if suggested.is_some() { None } else { Some(&final_url) },
        fallback: suggested,
    });

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DownloaderError::Fetch {
            url: final_url.to_string(),
            message: e.to_string(),
        })?
        .to_vec();

    debug!("Fetched {} bytes from {} as {}", bytes.len(), final_url, filename);
    Ok(DownloadResult {
        filename,
        bytes,
        source_url: final_url.to_string(),
        content_type,
    })
}

/// Best message for a failed response: the JSON envelope if there is one,
/// otherwise the HTTP status text
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|envelope| envelope.message())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> JobApiClient {
        let config = ClientConfig::builder().base_url(base).build();
        JobApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = client("http://127.0.0.1:8080/");
        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_validate_source_url() {
        assert_eq!(validate_source_url("  https://youtu.be/x \n").unwrap(), "https://youtu.be/x");
        assert!(validate_source_url("").unwrap_err().is_validation());
        assert!(validate_source_url(" \t ").unwrap_err().is_validation());
    }

    #[test]
    fn test_resolve_root_relative() {
        let client = client("http://127.0.0.1:8080");
        let url = client.resolve_download_url("/downloads/a.mp4").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/downloads/a.mp4");
    }

    #[test]
    fn test_resolve_root_relative_keeps_base_path() {
        let client = client("https://media.example.com/api");
        let url = client.resolve_download_url("/downloads/a.mp4").unwrap();
        assert_eq!(url.as_str(), "https://media.example.com/api/downloads/a.mp4");
    }

    #[test]
    fn test_resolve_absolute_untouched() {
        let client = client("http://127.0.0.1:8080");
        let url = client
            .resolve_download_url("https://cdn.example.com/files/b.mp3")
            .unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/files/b.mp3");
    }

    #[test]
    fn test_resolve_empty_is_fetch_error() {
        let client = client("http://127.0.0.1:8080");
        assert!(matches!(
            client.resolve_download_url("  "),
            Err(DownloaderError::Fetch { .. })
        ));
    }

    #[tokio::test]
    async fn test_submit_rejects_blank_url_without_network() {
        // Nothing listens on port 9; a network attempt would surface as Submission.
        let client = client("http://127.0.0.1:9");
        let err = client
            .submit_job("   ", &DownloadOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
