//! Batch job record and its lifecycle.
//!
//! Transitions: `Queued → Processing → Completed | Failed`. Terminal records
//! are never mutated again; every transition method returns
//! `InvalidJobTransition` when called out of order.

use crate::error::{FlowError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RowError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

// ---------------------------------------------------------------------------
// BatchJob
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: Uuid,
    pub template_id: String,
    pub project_id: String,
    pub status: JobStatus,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub success_count: usize,
    pub error_count: usize,
    #[serde(default)]
    pub detailed_errors: Vec<RowError>,
    /// Set only when the job failed as a whole.
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl BatchJob {
    pub fn new(
        template_id: impl Into<String>,
        project_id: impl Into<String>,
        total_rows: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            template_id: template_id.into(),
            project_id: project_id.into(),
            status: JobStatus::Queued,
            total_rows,
            processed_rows: 0,
            success_count: 0,
            error_count: 0,
            detailed_errors: Vec::new(),
            error_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        self.require(JobStatus::Queued, JobStatus::Processing)?;
        let now = Utc::now();
        self.status = JobStatus::Processing;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn record_success(&mut self) -> Result<()> {
        self.require(JobStatus::Processing, JobStatus::Processing)?;
        self.success_count += 1;
        self.advance();
        Ok(())
    }

    pub fn record_error(&mut self, row: usize, message: impl Into<String>) -> Result<()> {
        self.require(JobStatus::Processing, JobStatus::Processing)?;
        self.error_count += 1;
        self.detailed_errors.push(RowError {
            row,
            message: message.into(),
        });
        self.advance();
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.require(JobStatus::Processing, JobStatus::Completed)?;
        self.finish(JobStatus::Completed);
        Ok(())
    }

    /// Abort the job. Allowed from `Queued` too, for faults hit before the
    /// first row (e.g. the template vanished).
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.bad_transition(JobStatus::Failed));
        }
        self.error_message = Some(message.into());
        self.finish(JobStatus::Failed);
        Ok(())
    }

    /// 0..=100, rounded down.
    pub fn progress_percentage(&self) -> u8 {
        if self.total_rows == 0 {
            return if self.status.is_terminal() { 100 } else { 0 };
        }
        ((self.processed_rows * 100) / self.total_rows).min(100) as u8
    }

    fn advance(&mut self) {
        self.processed_rows = (self.processed_rows + 1).min(self.total_rows);
        self.updated_at = Utc::now();
    }

    fn finish(&mut self, status: JobStatus) {
        let now = Utc::now();
        self.status = status;
        // every row counts as attempted once the job is terminal
        self.processed_rows = self.total_rows;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    fn require(&self, from: JobStatus, to: JobStatus) -> Result<()> {
        if self.status != from {
            return Err(self.bad_transition(to));
        }
        Ok(())
    }

    fn bad_transition(&self, to: JobStatus) -> FlowError {
        FlowError::InvalidJobTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// JobStatusView
// ---------------------------------------------------------------------------

/// What a status poll returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub progress_percentage: u8,
    pub detailed_errors: Vec<RowError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Creation to completion, or to now while the job is still running.
    pub duration_ms: i64,
}

impl From<&BatchJob> for JobStatusView {
    fn from(job: &BatchJob) -> Self {
        let end = job.completed_at.unwrap_or_else(Utc::now);
        Self {
            job_id: job.id,
            status: job.status,
            total_rows: job.total_rows,
            processed_rows: job.processed_rows,
            success_count: job.success_count,
            error_count: job.error_count,
            progress_percentage: job.progress_percentage(),
            detailed_errors: job.detailed_errors.clone(),
            error_message: job.error_message.clone(),
            duration_ms: (end - job.created_at).num_milliseconds().max(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle() {
        let mut job = BatchJob::new("mw-link", "p1", 3);
        assert_eq!(job.status, JobStatus::Queued);
        job.start().unwrap();
        job.record_success().unwrap();
        job.record_error(2, "missing site for alias Near-end").unwrap();
        assert_eq!(job.processed_rows, 2);
        assert_eq!(job.progress_percentage(), 66);
        job.complete().unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed_rows, 3);
        assert_eq!(job.success_count, 1);
        assert_eq!(job.error_count, 1);
        assert_eq!(job.detailed_errors[0].row, 2);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn terminal_jobs_do_not_change() {
        let mut job = BatchJob::new("mw-link", "p1", 1);
        job.start().unwrap();
        job.complete().unwrap();
        assert!(job.record_success().is_err());
        assert!(job.fail("late").is_err());
        assert!(job.complete().is_err());
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.error_message, None);
    }

    #[test]
    fn rows_need_a_started_job() {
        let mut job = BatchJob::new("mw-link", "p1", 2);
        let err = job.record_success().unwrap_err();
        assert_eq!(err.to_string(), "invalid job transition from queued to processing");
        assert!(job.complete().is_err());
    }

    #[test]
    fn failing_marks_all_rows_attempted() {
        let mut job = BatchJob::new("mw-link", "p1", 4);
        job.start().unwrap();
        job.record_success().unwrap();
        job.fail("storage unavailable").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.processed_rows, 4);
        assert_eq!(job.success_count, 1);
        assert_eq!(job.progress_percentage(), 100);
    }

    #[test]
    fn queued_job_can_fail() {
        let mut job = BatchJob::new("gone", "p1", 10);
        job.fail("template not found: gone").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn status_view_mirrors_job() {
        let mut job = BatchJob::new("mw-link", "p1", 2);
        job.start().unwrap();
        job.record_error(1, "bad").unwrap();
        let view = JobStatusView::from(&job);
        assert_eq!(view.status, JobStatus::Processing);
        assert_eq!(view.progress_percentage, 50);
        assert_eq!(view.detailed_errors.len(), 1);
        assert!(view.duration_ms >= 0);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "processing");
        assert!(json.get("error_message").is_none());
    }
}
