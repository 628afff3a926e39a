//! Job status storage.
//!
//! # Table design
//!
//! `RedbJobStore` keeps a single `JOBS` table keyed by the 16 raw bytes of
//! the job uuid, with the JSON-encoded `BatchJob` as value. Jobs are never
//! deleted: terminal records stay available for later inspection.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use redb::{Database, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::error::{FlowError, Result};

use super::record::BatchJob;

/// Persist and query batch job records.
///
/// `update` refuses to touch a terminal record and refuses to move
/// `processed_rows` backwards, so observers always see monotonic progress.
pub trait JobStore: Send + Sync {
    fn insert(&self, job: &BatchJob) -> Result<()>;
    fn get(&self, id: Uuid) -> Result<BatchJob>;
    fn update(&self, job: &BatchJob) -> Result<()>;
    /// All jobs, newest first.
    fn list(&self) -> Result<Vec<BatchJob>>;
}

fn check_update(existing: &BatchJob, next: &BatchJob) -> Result<()> {
    if existing.status.is_terminal() || next.processed_rows < existing.processed_rows {
        return Err(FlowError::InvalidJobTransition {
            from: existing.status.to_string(),
            to: next.status.to_string(),
        });
    }
    Ok(())
}

fn storage<E: std::fmt::Display>(e: E) -> FlowError {
    FlowError::Storage(e.to_string())
}

// ---------------------------------------------------------------------------
// RedbJobStore
// ---------------------------------------------------------------------------

const JOBS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("jobs");

pub struct RedbJobStore {
    db: Database,
}

impl RedbJobStore {
    /// Open or create the database at `path`, creating the table if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(storage)?;
        let wt = db.begin_write().map_err(storage)?;
        wt.open_table(JOBS).map_err(storage)?;
        wt.commit().map_err(storage)?;
        Ok(Self { db })
    }
}

impl JobStore for RedbJobStore {
    fn insert(&self, job: &BatchJob) -> Result<()> {
        let value = serde_json::to_vec(job)?;
        let wt = self.db.begin_write().map_err(storage)?;
        {
            let mut table = wt.open_table(JOBS).map_err(storage)?;
            table
                .insert(job.id.as_bytes().as_slice(), value.as_slice())
                .map_err(storage)?;
        }
        wt.commit().map_err(storage)?;
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<BatchJob> {
        let rt = self.db.begin_read().map_err(storage)?;
        let table = rt.open_table(JOBS).map_err(storage)?;
        let guard = table
            .get(id.as_bytes().as_slice())
            .map_err(storage)?
            .ok_or_else(|| FlowError::JobNotFound(id.to_string()))?;
        Ok(serde_json::from_slice(guard.value())?)
    }

    fn update(&self, job: &BatchJob) -> Result<()> {
        let key = job.id.as_bytes();
        let value = serde_json::to_vec(job)?;
        let wt = self.db.begin_write().map_err(storage)?;
        {
            let mut table = wt.open_table(JOBS).map_err(storage)?;
            let existing: BatchJob = match table.get(key.as_slice()).map_err(storage)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(FlowError::JobNotFound(job.id.to_string())),
            };
            check_update(&existing, job)?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(storage)?;
        }
        wt.commit().map_err(storage)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<BatchJob>> {
        let rt = self.db.begin_read().map_err(storage)?;
        let table = rt.open_table(JOBS).map_err(storage)?;
        let mut jobs = Vec::new();
        for entry in table.iter().map_err(storage)? {
            let (_, v) = entry.map_err(storage)?;
            jobs.push(serde_json::from_slice::<BatchJob>(v.value())?);
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}

// ---------------------------------------------------------------------------
// MemoryJobStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, BatchJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, BatchJob>>> {
        self.jobs
            .lock()
            .map_err(|e| FlowError::Storage(format!("job store poisoned: {e}")))
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, job: &BatchJob) -> Result<()> {
        self.lock()?.insert(job.id, job.clone());
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<BatchJob> {
        self.lock()?
            .get(&id)
            .cloned()
            .ok_or_else(|| FlowError::JobNotFound(id.to_string()))
    }

    fn update(&self, job: &BatchJob) -> Result<()> {
        let mut jobs = self.lock()?;
        let existing = jobs
            .get(&job.id)
            .ok_or_else(|| FlowError::JobNotFound(job.id.to_string()))?;
        check_update(existing, job)?;
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<BatchJob>> {
        let mut jobs: Vec<BatchJob> = self.lock()?.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
