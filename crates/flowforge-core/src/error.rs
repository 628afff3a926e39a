use crate::alias::AliasIssue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("not initialized: run 'flowforge init'")]
    NotInitialized,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("invalid id '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("invalid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("{}", join_issues(.0))]
    UnresolvedAliases(Vec<AliasIssue>),

    #[error("duplicate sequence order {order} at site {site}: activities '{first}' and '{second}'")]
    DuplicateSequenceOrder {
        order: u32,
        site: String,
        first: String,
        second: String,
    },

    #[error("duplicate task id: {0}")]
    DuplicateTaskId(String),

    #[error("invalid task id '{0}': must be a non-empty file name of at most 250 bytes")]
    InvalidTaskId(String),

    #[error("task id counter overflows: {prefix}{start} + {offset}")]
    TaskIdOverflow {
        prefix: String,
        start: u64,
        offset: usize,
    },

    #[error("cannot write task {task_id}: {reason}")]
    TaskWrite { task_id: String, reason: String },

    #[error("task already exists: {0}")]
    TaskExists(String),

    #[error("malformed batch header: {0}")]
    MalformedHeader(String),

    #[error("index {index} out of range for a sequence of {len}")]
    ReorderOutOfRange { index: usize, len: usize },

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("invalid job transition from {from} to {to}")]
    InvalidJobTransition { from: String, to: String },

    #[error("storage unavailable: {0}")]
    Storage(String),

    #[error("background job error: {0}")]
    Background(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl FlowError {
    /// Errors caused by the content of one site group or batch row.
    ///
    /// These are collected into `detailed_errors` and never fail a job; every
    /// other variant aborts the job it occurs in.
    pub fn is_row_error(&self) -> bool {
        matches!(
            self,
            FlowError::UnresolvedAliases(_)
                | FlowError::DuplicateSequenceOrder { .. }
                | FlowError::DuplicateTaskId(_)
                | FlowError::InvalidTaskId(_)
                | FlowError::TaskIdOverflow { .. }
                | FlowError::TaskWrite { .. }
                | FlowError::TaskExists(_)
        )
    }
}

fn join_issues(issues: &[AliasIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, FlowError>;
