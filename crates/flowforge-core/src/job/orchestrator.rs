//! Batch materialization, inline or as a background job.
//!
//! Small batches run on the caller's thread and return a summary. Larger ones
//! get a `BatchJob` record and run on the blocking pool; the caller receives a
//! `JobHandle` and polls the `JobStore` for progress. Dropping the handle does
//! not cancel the job.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::alias::SiteGroup;
use crate::batch::{parse_batch, BatchRow};
use crate::error::{FlowError, Result};
use crate::materialize::{self, Materializer, MaterializeOutcome, NamingPolicy, Task};
use crate::sink::TaskSink;
use crate::template_store::TemplateStore;

use super::record::{BatchJob, JobStatusView, RowError};
use super::store::JobStore;

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

/// Job submission: a tabular batch, header row first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub flow_template_id: String,
    pub project_id: String,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub auto_id_prefix: Option<String>,
    #[serde(default)]
    pub auto_id_start: Option<u64>,
    pub batch_rows: Vec<Vec<String>>,
}

impl BatchRequest {
    fn naming(&self) -> NamingPolicy {
        NamingPolicy {
            task_name: self.task_name.clone(),
            auto_id_prefix: self.auto_id_prefix.clone(),
            auto_id_start: self.auto_id_start,
        }
    }
}

/// Non-batch materialization call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializeRequest {
    pub flow_template_id: String,
    pub project_id: String,
    pub site_groups: Vec<SiteGroup>,
    #[serde(default)]
    pub task_naming: NamingPolicy,
}

/// Result of a batch processed inline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub created_count: usize,
    pub error_count: usize,
    pub errors: Vec<RowError>,
}

pub enum Submission {
    Inline(BatchSummary),
    Queued(JobHandle),
}

// ---------------------------------------------------------------------------
// JobHandle
// ---------------------------------------------------------------------------

/// Handle to one background job, owned by whoever submitted it.
pub struct JobHandle {
    job_id: Uuid,
    join: JoinHandle<()>,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the worker to exit. The outcome is in the job record.
    pub async fn join(self) -> Result<()> {
        self.join
            .await
            .map_err(|e| FlowError::Background(e.to_string()))
    }
}

/// Poll `jobs` every `interval` until the job is terminal, giving up once
/// `timeout` has passed.
pub async fn wait_for_terminal(
    jobs: &dyn JobStore,
    job_id: Uuid,
    interval: Duration,
    timeout: Option<Duration>,
) -> Result<JobStatusView> {
    let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
    loop {
        let job = jobs.get(job_id)?;
        if job.status.is_terminal() {
            return Ok(JobStatusView::from(&job));
        }
        if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
            return Err(FlowError::Background(format!(
                "job {job_id} still {} after {}ms",
                job.status,
                timeout.unwrap_or_default().as_millis()
            )));
        }
        tokio::time::sleep(interval).await;
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Orchestrator {
    templates: Arc<dyn TemplateStore>,
    jobs: Arc<dyn JobStore>,
    sink: Arc<dyn TaskSink>,
    sync_threshold: usize,
}

impl Orchestrator {
    /// Batches with fewer than `sync_threshold` rows run inline.
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        jobs: Arc<dyn JobStore>,
        sink: Arc<dyn TaskSink>,
        sync_threshold: usize,
    ) -> Self {
        Self {
            templates,
            jobs,
            sink,
            sync_threshold: sync_threshold.max(1),
        }
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    pub fn sync_threshold(&self) -> usize {
        self.sync_threshold
    }

    /// Materialize explicit site groups, each one independently.
    pub fn materialize(&self, req: &MaterializeRequest) -> Result<MaterializeOutcome> {
        let template = self.templates.get(&req.flow_template_id)?;
        let outcome = materialize::materialize_groups(
            &template,
            &req.project_id,
            req.task_naming.clone(),
            &req.site_groups,
            self.sink.as_ref(),
        )?;
        info!(
            template = %req.flow_template_id,
            created = outcome.created_count,
            errors = outcome.errors.len(),
            "materialized site groups"
        );
        Ok(outcome)
    }

    /// Validate and submit a batch.
    ///
    /// Header and template problems are returned here and no job is created.
    /// Background submission needs a running tokio runtime.
    pub fn submit(&self, req: BatchRequest) -> Result<Submission> {
        let template = self.templates.get(&req.flow_template_id)?;
        let parsed = parse_batch(&req.batch_rows, &template.required_aliases())?;
        let materializer = Materializer::new(&template, &req.project_id, req.naming())?;

        if parsed.len() < self.sync_threshold {
            debug!(rows = parsed.len(), "processing batch inline");
            let summary = self.run_inline(materializer, &parsed.rows)?;
            return Ok(Submission::Inline(summary));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| FlowError::Background(format!("no async runtime: {e}")))?;

        let job = BatchJob::new(&req.flow_template_id, &req.project_id, parsed.len());
        self.jobs.insert(&job)?;
        let job_id = job.id;
        info!(job_id = %job_id, total_rows = job.total_rows, "batch job queued");

        let worker = self.clone();
        let policy = req.naming();
        let rows = parsed.rows;
        let join = runtime.spawn_blocking(move || worker.run_job(job, rows, policy));
        Ok(Submission::Queued(JobHandle { job_id, join }))
    }

    pub fn status(&self, job_id: Uuid) -> Result<JobStatusView> {
        Ok(JobStatusView::from(&self.jobs.get(job_id)?))
    }

    fn run_inline(&self, mut materializer: Materializer, rows: &[BatchRow]) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        for (index, row) in rows.iter().enumerate() {
            match self.materialize_row(&mut materializer, row, index) {
                Ok(_) => summary.created_count += 1,
                Err(e) if e.is_row_error() => {
                    summary.error_count += 1;
                    summary.errors.push(RowError {
                        row: row.row,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(summary)
    }

    fn run_job(&self, mut job: BatchJob, rows: Vec<BatchRow>, policy: NamingPolicy) {
        let job_id = job.id;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.process(&mut job, &rows, policy)
        }))
        .unwrap_or_else(|payload| {
            Err(FlowError::Background(format!(
                "worker panicked: {}",
                panic_message(payload.as_ref())
            )))
        });

        let finished = match result {
            Ok(()) => job.complete(),
            Err(e) => {
                error!(job_id = %job_id, error = %e, "batch job failed");
                job.fail(e.to_string())
            }
        };
        if let Err(e) = finished.and_then(|_| self.jobs.update(&job)) {
            error!(job_id = %job_id, error = %e, "could not record final job state");
            return;
        }
        info!(
            job_id = %job_id,
            status = %job.status,
            success = job.success_count,
            errors = job.error_count,
            "batch job finished"
        );
    }

    /// Row errors are recorded on the job; anything else is returned and
    /// fails the job.
    fn process(&self, job: &mut BatchJob, rows: &[BatchRow], policy: NamingPolicy) -> Result<()> {
        job.start()?;
        self.jobs.update(job)?;

        // the template may have been removed since submission
        let template = self.templates.get(&job.template_id)?;
        let mut materializer = Materializer::new(&template, &job.project_id, policy)?;

        let total = rows.len();
        for (index, row) in rows.iter().enumerate() {
            match self.materialize_row(&mut materializer, row, index) {
                Ok(task) => {
                    debug!(job_id = %job.id, row = row.row, task_id = %task.task_id, "row materialized");
                    job.record_success()?;
                }
                Err(e) if e.is_row_error() => {
                    warn!(job_id = %job.id, row = row.row, error = %e, "row rejected");
                    job.record_error(row.row, e.to_string())?;
                }
                Err(e) => return Err(e),
            }
            // the final increment is stored together with the terminal status
            if index + 1 < total {
                self.jobs.update(job)?;
            }
        }
        Ok(())
    }

    fn materialize_row(
        &self,
        materializer: &mut Materializer,
        row: &BatchRow,
        index: usize,
    ) -> Result<Task> {
        let task = materializer.materialize(&row.group, index)?;
        self.sink.persist(&task)?;
        Ok(task)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
