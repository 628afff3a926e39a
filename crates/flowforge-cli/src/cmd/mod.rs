pub mod batch;
pub mod init;
pub mod job;
pub mod materialize;
pub mod serve;
pub mod template;

use anyhow::Context;
use flowforge_core::config::Config;
use flowforge_core::job::Orchestrator;
use flowforge_core::workspace;
use std::path::Path;

pub(crate) fn open(root: &Path) -> anyhow::Result<(Config, Orchestrator)> {
    workspace::open(root).context("failed to open project")
}
