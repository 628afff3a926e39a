//! Read access to flow templates owned by the surrounding application.

use crate::error::{FlowError, Result};
use crate::io;
use crate::paths;
use crate::template::FlowTemplate;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

pub trait TemplateStore: Send + Sync {
    fn get(&self, id: &str) -> Result<FlowTemplate>;
    fn list(&self) -> Result<Vec<FlowTemplate>>;
}

// ---------------------------------------------------------------------------
// FileTemplateStore
// ---------------------------------------------------------------------------

/// Templates stored as `.flowforge/templates/<id>.yaml`.
pub struct FileTemplateStore {
    root: PathBuf,
}

impl FileTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn save(&self, template: &FlowTemplate) -> Result<()> {
        template.validate()?;
        io::write_yaml(&paths::template_path(&self.root, &template.id), template)
    }
}

impl TemplateStore for FileTemplateStore {
    fn get(&self, id: &str) -> Result<FlowTemplate> {
        paths::validate_slug(id)?;
        let path = paths::template_path(&self.root, id);
        if !path.exists() {
            return Err(FlowError::TemplateNotFound(id.to_string()));
        }
        let template: FlowTemplate = io::read_yaml(&path)?;
        if template.id != id {
            return Err(FlowError::InvalidTemplate {
                template: id.to_string(),
                reason: format!("file declares id '{}'", template.id),
            });
        }
        Ok(template)
    }

    fn list(&self) -> Result<Vec<FlowTemplate>> {
        io::yaml_stems(&paths::templates_dir(&self.root))?
            .iter()
            .map(|id| self.get(id))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// MemoryTemplateStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: RwLock<BTreeMap<String, FlowTemplate>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, template: FlowTemplate) {
        if let Ok(mut map) = self.templates.write() {
            map.insert(template.id.clone(), template);
        }
    }

    pub fn remove(&self, id: &str) -> Option<FlowTemplate> {
        self.templates.write().ok().and_then(|mut map| map.remove(id))
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn get(&self, id: &str) -> Result<FlowTemplate> {
        let map = self
            .templates
            .read()
            .map_err(|e| FlowError::Storage(format!("template store poisoned: {e}")))?;
        map.get(id)
            .cloned()
            .ok_or_else(|| FlowError::TemplateNotFound(id.to_string()))
    }

    fn list(&self) -> Result<Vec<FlowTemplate>> {
        let map = self
            .templates
            .read()
            .map_err(|e| FlowError::Storage(format!("template store poisoned: {e}")))?;
        Ok(map.values().cloned().collect())
    }
}
