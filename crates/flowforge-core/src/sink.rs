//! Downstream persistence for materialized tasks.

use crate::error::{FlowError, Result};
use crate::io;
use crate::materialize::Task;
use crate::paths;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Receives each successfully materialized task exactly once.
pub trait TaskSink: Send + Sync {
    fn persist(&self, task: &Task) -> Result<()>;
}

// ---------------------------------------------------------------------------
// FileTaskSink
// ---------------------------------------------------------------------------

/// Writes `.flowforge/tasks/<project>/<task_id>.yaml`, refusing to overwrite.
pub struct FileTaskSink {
    root: PathBuf,
}

impl FileTaskSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn load(&self, project_id: &str, task_id: &str) -> Result<Task> {
        io::read_yaml(&paths::task_path(&self.root, project_id, task_id))
    }

    pub fn list(&self, project_id: &str) -> Result<Vec<Task>> {
        let dir = paths::project_tasks_dir(&self.root, project_id);
        io::yaml_stems(&dir)?
            .iter()
            .map(|id| self.load(project_id, id))
            .collect()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TaskSink for FileTaskSink {
    fn persist(&self, task: &Task) -> Result<()> {
        paths::validate_task_id(&task.task_id)?;
        let path = paths::task_path(&self.root, &task.project_id, &task.task_id);
        if path.exists() {
            return Err(FlowError::TaskExists(task.task_id.clone()));
        }
        // a failed write loses this task only
        io::write_yaml(&path, task).map_err(|e| match e {
            FlowError::Io(e) => FlowError::TaskWrite {
                task_id: task.task_id.clone(),
                reason: e.to_string(),
            },
            other => other,
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryTaskSink
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryTaskSink {
    tasks: Mutex<Vec<Task>>,
}

impl MemoryTaskSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }
}

impl TaskSink for MemoryTaskSink {
    fn persist(&self, task: &Task) -> Result<()> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|e| FlowError::Storage(format!("task sink poisoned: {e}")))?;
        if tasks
            .iter()
            .any(|t| t.project_id == task.project_id && t.task_id == task.task_id)
        {
            return Err(FlowError::TaskExists(task.task_id.clone()));
        }
        tasks.push(task.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
