//! Job execution history for refresh runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const CURRENCY_RATE_FETCH: &str = "CURRENCY_RATE_FETCH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Started,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                JobStatus::Started => "STARTED",
                JobStatus::Completed => "COMPLETED",
                JobStatus::Failed => "FAILED",
            }
        )
    }
}

/// One record per refresh run. Created as `Started`, always finalized with an end time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionRecord {
    /// Assigned by the store on first save.
    pub id: Option<u64>,
    pub job_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub records_processed: Option<u64>,
}

impl JobExecutionRecord {
    pub fn start(job_name: &str) -> Self {
        JobExecutionRecord {
            id: None,
            job_name: job_name.to_string(),
            start_time: Utc::now(),
            end_time: None,
            status: JobStatus::Started,
            error_message: None,
            records_processed: None,
        }
    }

    pub fn complete(&mut self, records_processed: u64) {
        self.status = JobStatus::Completed;
        self.records_processed = Some(records_processed);
        self.end_time = Some(Utc::now());
    }

    pub fn fail(&mut self, error_message: String) {
        self.status = JobStatus::Failed;
        self.error_message = Some(error_message);
        self.end_time = Some(Utc::now());
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}
