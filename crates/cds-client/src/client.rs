//! Submit, poll and download against the CDS job protocol.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::error::{CdsError, CdsResult};
use crate::request::Era5Request;

/// Endpoint the official Python client defaults to.
pub const DEFAULT_BASE_URL: &str = "https://cds.climate.copernicus.eu/api/v2";

#[derive(Debug, Clone)]
pub struct CdsConfig {
    pub base_url: String,
    /// Either `uid:key` (basic auth) or a bare personal access token.
    pub api_key: String,
    /// First poll delay; doubles up to `poll_max`.
    pub poll_initial: Duration,
    pub poll_max: Duration,
    /// Total time a job may stay queued or running before we give up.
    pub total_wait: Duration,
    /// Per-request HTTP timeout, sized for the result download.
    pub request_timeout: Duration,
}

impl CdsConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            poll_initial: Duration::from_secs(1),
            poll_max: Duration::from_secs(30),
            total_wait: Duration::from_secs(600), // 10 minutes
            request_timeout: Duration::from_secs(600),
        }
    }

    /// Read `CDSAPI_URL` (optional, defaults to the public endpoint) and
    /// `CDSAPI_KEY` (required).
    pub fn from_env() -> CdsResult<Self> {
        let base_url =
            std::env::var("CDSAPI_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var("CDSAPI_KEY")
            .map_err(|_| CdsError::Config("CDSAPI_KEY is not set".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(CdsError::Config("CDSAPI_KEY is empty".to_string()));
        }
        Ok(Self::new(base_url, api_key))
    }
}

/// Job handle returned by the submit endpoint.
#[derive(Debug, Clone, Deserialize)]
struct Job {
    request_id: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskReply {
    #[serde(default)]
    state: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

pub struct Client {
    http: reqwest::Client,
    config: CdsConfig,
}

impl Client {
    pub fn new(config: CdsConfig) -> CdsResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()?;
        Ok(Self { http, config })
    }

    /// Run the full retrieval: submit, wait, download to `dest`.
    ///
    /// The result streams to `<dest>.part` and is renamed into place only
    /// after the body is fully written and synced, so a `dest` that exists
    /// is always a complete download.
    #[instrument(skip(self, request), fields(dataset = %request.dataset, time = %request.time))]
    pub async fn retrieve(&self, request: &Era5Request, dest: &Path) -> CdsResult<PathBuf> {
        let job = self.submit(request).await?;
        info!(job_id = %job.request_id, "CDS job submitted");

        let location = self.wait_for_result(&job).await?;
        self.download(&location, dest).await?;
        Ok(dest.to_path_buf())
    }

    async fn submit(&self, request: &Era5Request) -> CdsResult<Job> {
        let url = format!("{}/resources/{}", self.base(), request.dataset);
        let response = self.authed(self.http.post(&url)).json(request).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(classify_rejection(status, &text));
        }
        serde_json::from_str(&text)
            .map_err(|_| CdsError::Protocol(format!("unparseable submit reply: {}", truncate(&text))))
    }

    /// Poll the task endpoint until the job resolves or the wait budget
    /// runs out. The poll interval doubles up to `poll_max`.
    async fn wait_for_result(&self, job: &Job) -> CdsResult<String> {
        if job.state == "completed" {
            if let Some(location) = &job.location {
                return Ok(location.clone());
            }
        }

        let started = Instant::now();
        let mut delay = self.config.poll_initial;

        loop {
            let elapsed = started.elapsed();
            if elapsed >= self.config.total_wait {
                return Err(CdsError::Timeout {
                    job_id: job.request_id.clone(),
                    waited_secs: elapsed.as_secs(),
                });
            }
            tokio::time::sleep(delay.min(self.config.total_wait - elapsed)).await;
            delay = std::cmp::min(delay * 2, self.config.poll_max);

            let url = format!("{}/tasks/{}", self.base(), job.request_id);
            let response = self.authed(self.http.get(&url)).send().await?;
            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(classify_rejection(status, &text));
            }
            let reply: TaskReply = serde_json::from_str(&text).map_err(|_| {
                CdsError::Protocol(format!("unparseable task reply: {}", truncate(&text)))
            })?;

            match reply.state.as_str() {
                "completed" => {
                    return reply.location.ok_or_else(|| {
                        CdsError::Protocol("completed job carries no result location".to_string())
                    });
                }
                "failed" => {
                    let reason = error_text(reply.error.as_ref());
                    if looks_like_no_data(&reason) {
                        return Err(CdsError::NoData(reason));
                    }
                    return Err(CdsError::JobFailed {
                        job_id: job.request_id.clone(),
                        reason,
                    });
                }
                "queued" | "running" => {
                    debug!(
                        job_id = %job.request_id,
                        state = %reply.state,
                        elapsed_secs = started.elapsed().as_secs(),
                        "CDS job in progress"
                    );
                }
                other => {
                    return Err(CdsError::Protocol(format!("unknown job state {other:?}")));
                }
            }
        }
    }

    async fn download(&self, location: &str, dest: &Path) -> CdsResult<()> {
        let url = resolve_location(&self.config.base_url, location)?;
        info!(url = %url, "downloading CDS result");

        let response = self.authed(self.http.get(url)).send().await?;
        if !response.status().is_success() {
            return Err(CdsError::Protocol(format!(
                "result download returned HTTP {}",
                response.status()
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let part = partial_path(dest);
        let written = match stream_to(response, &part).await {
            Ok(written) => written,
            Err(err) => {
                // Never leave a truncated body where a retry would find it.
                let _ = tokio::fs::remove_file(&part).await;
                return Err(err);
            }
        };
        if let Err(err) = tokio::fs::rename(&part, dest).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(err.into());
        }
        info!(bytes = written, path = %dest.display(), "CDS result stored");
        Ok(())
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.api_key.split_once(':') {
            Some((uid, key)) => builder.basic_auth(uid, Some(key)),
            None => builder.header("PRIVATE-TOKEN", &self.config.api_key),
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

async fn stream_to(response: reqwest::Response, part: &Path) -> CdsResult<u64> {
    let mut file = tokio::fs::File::create(part).await?;
    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

fn resolve_location(base_url: &str, location: &str) -> CdsResult<Url> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Url::parse(location)
            .map_err(|e| CdsError::Protocol(format!("bad result URL {location:?}: {e}")));
    }
    let base = Url::parse(base_url)
        .map_err(|e| CdsError::Config(format!("bad base URL {base_url:?}: {e}")))?;
    base.join(location)
        .map_err(|e| CdsError::Protocol(format!("bad result URL {location:?}: {e}")))
}

/// Pick out the human-readable reason from an error reply body.
fn classify_rejection(status: StatusCode, body: &str) -> CdsError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("reason")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate(body));

    if looks_like_no_data(&detail) {
        CdsError::NoData(detail)
    } else {
        CdsError::Rejected(format!("HTTP {status}: {detail}"))
    }
}

/// The archive words empty selections a few different ways.
fn looks_like_no_data(reason: &str) -> bool {
    let lower = reason.to_lowercase();
    lower.contains("no data")
        || lower.contains("none of the data")
        || lower.contains("not available yet")
        || lower.contains("out of range")
}

fn error_text(error: Option<&serde_json::Value>) -> String {
    match error {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(value) => value
            .get("message")
            .or_else(|| value.get("reason"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        None => "no reason given".to_string(),
    }
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 200;
    let trimmed = text.trim();
    if trimmed.len() <= LIMIT {
        return trimmed.to_string();
    }
    let mut end = LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_rejection_keeps_archive_text() {
        let body = r#"{"reason": "None of the data you have requested is available yet. The latest date available for this dataset is: 2024-11-21 00:00"}"#;
        match classify_rejection(StatusCode::BAD_REQUEST, body) {
            CdsError::NoData(text) => {
                assert!(text.contains("2024-11-21 00:00"));
            }
            other => panic!("expected NoData, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_rejection_includes_status() {
        let err = classify_rejection(StatusCode::FORBIDDEN, "invalid key");
        match err {
            CdsError::Rejected(text) => {
                assert!(text.contains("403"));
                assert!(text.contains("invalid key"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_looks_like_no_data() {
        assert!(looks_like_no_data("None of the data you have requested is available yet"));
        assert!(looks_like_no_data("Requested date is OUT OF RANGE"));
        assert!(!looks_like_no_data("invalid api key"));
    }

    #[test]
    fn test_error_text_variants() {
        let string = serde_json::json!("boom");
        assert_eq!(error_text(Some(&string)), "boom");

        let object = serde_json::json!({"message": "queue full", "code": 17});
        assert_eq!(error_text(Some(&object)), "queue full");

        assert_eq!(error_text(None), "no reason given");
    }

    #[test]
    fn test_resolve_location() {
        let absolute = resolve_location(DEFAULT_BASE_URL, "https://download.cds.example/x.nc")
            .unwrap();
        assert_eq!(absolute.as_str(), "https://download.cds.example/x.nc");

        let rooted = resolve_location(DEFAULT_BASE_URL, "/download/result.nc").unwrap();
        assert_eq!(
            rooted.as_str(),
            "https://cds.climate.copernicus.eu/download/result.nc"
        );
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        let part = partial_path(Path::new("/data/era5/20241124_10.nc"));
        assert_eq!(part, PathBuf::from("/data/era5/20241124_10.nc.part"));
    }

    #[test]
    fn test_truncate_long_bodies() {
        let long = "x".repeat(500);
        let short = truncate(&long);
        assert!(short.len() <= 204);
        assert!(short.ends_with("..."));
    }
}
