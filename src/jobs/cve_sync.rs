//! Daily CVE download followed by the arango-cve-processor enrichment
//! chain on the upstream service.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::clients::VulmatchClient;
use crate::errors::UpstreamError;

pub const JOB_STATUS_CHECK_DELAY: Duration = Duration::from_secs(300);
pub const MAX_DOWNLOAD_RESTARTS: u32 = 3;
pub const SYNC_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

pub const PROCESSOR_MODES: [&str; 4] = ["cve-cwe", "cve-capec", "cve-attack", "cve-kev"];

#[derive(Error, Debug)]
pub enum CveSyncError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Upstream job payload has no {0}")]
    MissingField(&'static str),

    #[error("CVE download for {date} failed after {attempts} attempts")]
    GaveUp { date: NaiveDate, attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Completed,
    Pending,
    Failed(String),
}

impl JobState {
    pub fn from_payload(job: &Value) -> Self {
        match job.get("state").and_then(Value::as_str) {
            Some("completed") => JobState::Completed,
            Some("pending") => JobState::Pending,
            Some(other) => JobState::Failed(other.to_string()),
            None => JobState::Failed("unknown".to_string()),
        }
    }
}

pub fn yesterday() -> NaiveDate {
    (Utc::now() - chrono::Duration::days(1)).date_naive()
}

pub fn download_body(date: NaiveDate) -> Value {
    let date = date.format("%Y-%m-%d").to_string();
    json!({
        "last_modified_earliest": date,
        "last_modified_latest": date,
        "ignore_embedded_relationships": true,
    })
}

pub fn processor_body(date: NaiveDate) -> Value {
    let date = date.format("%Y-%m-%d");
    json!({
        "ignore_embedded_relationships": true,
        "modified_min": format!("{}T00:00:00.000Z", date),
        "created_min": format!("{}T23:59:59.999Z", date),
    })
}

pub struct CveSyncJob {
    client: VulmatchClient,
    poll_interval: Duration,
    max_restarts: u32,
}

impl CveSyncJob {
    pub fn new(client: VulmatchClient) -> Self {
        Self {
            client,
            poll_interval: JOB_STATUS_CHECK_DELAY,
            max_restarts: MAX_DOWNLOAD_RESTARTS,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    async fn start_download(&self, date: NaiveDate) -> Result<String, CveSyncError> {
        let job = self.client.post_json("/api/v1/cve/", &download_body(date)).await?;
        let id = job
            .get("id")
            .and_then(Value::as_str)
            .ok_or(CveSyncError::MissingField("id"))?;
        info!("Started CVE download job {} for {}", id, date);
        Ok(id.to_string())
    }

    async fn wait_for(&self, job_id: &str) -> Result<JobState, CveSyncError> {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let job = self
                .client
                .get_json(&format!("/api/v1/jobs/{}/", job_id))
                .await?;
            let state = JobState::from_payload(&job);
            debug!("Job {} is {:?}", job_id, state);
            if state != JobState::Pending {
                return Ok(state);
            }
        }
    }

    /// Downloads the CVEs modified on `date`, restarting a failed download
    /// at most `max_restarts` times, then runs every processor mode in order.
    pub async fn run_for_date(&self, date: NaiveDate) -> Result<(), CveSyncError> {
        let attempts = self.max_restarts + 1;
        let mut completed = false;
        for attempt in 1..=attempts {
            let job_id = self.start_download(date).await?;
            match self.wait_for(&job_id).await? {
                JobState::Completed => {
                    completed = true;
                    break;
                }
                state => warn!(
                    "CVE download job {} ended as {:?} (attempt {}/{})",
                    job_id, state, attempt, attempts
                ),
            }
        }
        if !completed {
            return Err(CveSyncError::GaveUp { date, attempts });
        }

        for mode in PROCESSOR_MODES {
            let path = format!("/api/v1/arango-cve-processor/{}/", mode);
            self.client.post_json(&path, &processor_body(date)).await?;
            info!("Requested {} processing for {}", mode, date);
        }
        Ok(())
    }

    pub async fn run_once(&self) -> Result<(), CveSyncError> {
        self.run_for_date(yesterday()).await
    }

    /// Runs the chain once per day until the process exits.
    pub fn spawn_daily(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SYNC_PERIOD);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                if let Err(e) = self.run_once().await {
                    error!("CVE sync failed: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_request_bodies() {
        assert_eq!(
            download_body(date()),
            json!({
                "last_modified_earliest": "2024-05-01",
                "last_modified_latest": "2024-05-01",
                "ignore_embedded_relationships": true
            })
        );
        assert_eq!(processor_body(date())["modified_min"], "2024-05-01T00:00:00.000Z");
        assert_eq!(processor_body(date())["created_min"], "2024-05-01T23:59:59.999Z");
    }

    #[test]
    fn test_job_state() {
        assert_eq!(JobState::from_payload(&json!({"state": "completed"})), JobState::Completed);
        assert_eq!(JobState::from_payload(&json!({"state": "pending"})), JobState::Pending);
        assert_eq!(
            JobState::from_payload(&json!({"state": "failed"})),
            JobState::Failed("failed".into())
        );
        assert_eq!(JobState::from_payload(&json!({})), JobState::Failed("unknown".into()));
    }

    #[tokio::test]
    async fn test_completed_download_runs_processors() {
        let server = MockServer::start_async().await;
        let download = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/cve/");
                then.status(201).json_body(json!({"id": "job-1"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/jobs/job-1/");
                then.status(200).json_body(json!({"id": "job-1", "state": "completed"}));
            })
            .await;
        let mut processors = Vec::new();
        for mode in PROCESSOR_MODES {
            let path = format!("/api/v1/arango-cve-processor/{}/", mode);
            processors.push(
                server
                    .mock_async(|when, then| {
                        when.method(POST)
                            .path(path)
                            .json_body_partial(r#"{"modified_min": "2024-05-01T00:00:00.000Z"}"#);
                        then.status(201).json_body(json!({"id": "p"}));
                    })
                    .await,
            );
        }

        let job = CveSyncJob::new(VulmatchClient::new(server.base_url()))
            .with_poll_interval(Duration::ZERO);
        job.run_for_date(date()).await.unwrap();

        download.assert_hits_async(1).await;
        for processor in &processors {
            processor.assert_hits_async(1).await;
        }
    }

    #[tokio::test]
    async fn test_failed_download_is_restarted_then_abandoned() {
        let server = MockServer::start_async().await;
        let download = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/cve/");
                then.status(201).json_body(json!({"id": "job-2"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/jobs/job-2/");
                then.status(200).json_body(json!({"state": "failed"}));
            })
            .await;
        let processor = server
            .mock_async(|when, then| {
                when.method(POST).path_contains("arango-cve-processor");
                then.status(201);
            })
            .await;

        let job = CveSyncJob::new(VulmatchClient::new(server.base_url()))
            .with_poll_interval(Duration::ZERO)
            .with_max_restarts(2);
        let err = job.run_for_date(date()).await.unwrap_err();

        assert!(matches!(err, CveSyncError::GaveUp { attempts: 3, .. }));
        download.assert_hits_async(3).await;
        processor.assert_hits_async(0).await;
    }
}
