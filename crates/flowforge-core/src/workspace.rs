//! Wiring of the file-backed stores under one project root.

use crate::config::{Config, WarnLevel};
use crate::error::{FlowError, Result};
use crate::job::{Orchestrator, RedbJobStore};
use crate::paths;
use crate::sink::FileTaskSink;
use crate::template_store::FileTemplateStore;
use std::path::Path;
use std::sync::Arc;

/// Load and check the config under `root`, then open its stores.
///
/// Config errors abort; config warnings are logged.
pub fn open(root: &Path) -> Result<(Config, Orchestrator)> {
    let config = Config::load(root)?;
    for w in config.validate() {
        match w.level {
            WarnLevel::Error => return Err(FlowError::InvalidConfig(w.message)),
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
        }
    }
    let orchestrator = open_orchestrator(root, &config)?;
    Ok((config, orchestrator))
}

/// Build an orchestrator over `.flowforge/` in `root`.
///
/// The job database is exclusive to one process; a second opener gets a
/// storage error.
pub fn open_orchestrator(root: &Path, config: &Config) -> Result<Orchestrator> {
    let templates = Arc::new(FileTemplateStore::new(root));
    let jobs = Arc::new(RedbJobStore::open(&paths::jobs_db_path(root))?);
    let sink = Arc::new(FileTaskSink::new(root));
    Ok(Orchestrator::new(
        templates,
        jobs,
        sink,
        config.jobs.sync_threshold,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::batch_header;
    use crate::job::{BatchRequest, Submission};
    use crate::template::{FlowActivity, FlowSiteAlias, FlowTemplate};
    use crate::types::ActivityType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn inline_batch_lands_on_disk() {
        let dir = TempDir::new().unwrap();
        let config = Config::new("rollout");
        config.save(dir.path()).unwrap();

        let mut t = FlowTemplate::new("survey", "Site Survey", "rf");
        t.sites = vec![FlowSiteAlias {
            alias: "Site".into(),
            order: 1,
        }];
        t.activities =
            vec![FlowActivity::new("walk", "Walk", 1, ActivityType::SiteSurvey).at("Site")];
        FileTemplateStore::new(dir.path()).save(&t).unwrap();

        let orchestrator = open_orchestrator(dir.path(), &config).unwrap();
        let table = vec![
            batch_header(&["Site".to_string()]),
            vec!["S-1".into(), "42".into(), "".into(), "".into()],
        ];
        let sub = orchestrator
            .submit(BatchRequest {
                flow_template_id: "survey".into(),
                project_id: "p1".into(),
                task_name: None,
                auto_id_prefix: None,
                auto_id_start: None,
                batch_rows: table,
            })
            .unwrap();
        assert!(matches!(sub, Submission::Inline(ref s) if s.created_count == 1));
        assert!(dir.path().join(".flowforge/tasks/p1/S-1.yaml").exists());
        assert!(dir.path().join(".flowforge/jobs.db").exists());
    }

    #[test]
    fn open_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new("rollout");
        config.jobs.poll_interval_ms = 0;
        config.save(dir.path()).unwrap();
        assert!(matches!(
            open(dir.path()),
            Err(FlowError::InvalidConfig(_))
        ));
    }

    #[test]
    fn open_uninitialized_root() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(open(dir.path()), Err(FlowError::NotInitialized)));
    }
}
