//! Batch job data model, storage, and orchestration.
//!
//! `BatchJob` is the record observers poll, `JobStore` persists it, and
//! `Orchestrator` drives a tabular batch through alias resolution and
//! materialization, inline or in the background depending on its size.

pub mod orchestrator;
pub mod record;
pub mod store;

pub use orchestrator::{
    wait_for_terminal, BatchRequest, BatchSummary, JobHandle, MaterializeRequest, Orchestrator,
    Submission,
};
pub use record::{BatchJob, JobStatus, JobStatusView, RowError};
pub use store::{JobStore, MemoryJobStore, RedbJobStore};
