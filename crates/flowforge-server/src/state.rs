use flowforge_core::config::Config;
use flowforge_core::job::Orchestrator;
use flowforge_core::template_store::FileTemplateStore;
use flowforge_core::workspace;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub templates: Arc<FileTemplateStore>,
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Load config and open the project's stores.
    pub fn open(root: PathBuf) -> flowforge_core::Result<Self> {
        let (config, orchestrator) = workspace::open(&root)?;
        Ok(Self {
            templates: Arc::new(FileTemplateStore::new(&root)),
            config: Arc::new(config),
            orchestrator,
            root,
        })
    }
}
