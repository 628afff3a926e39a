use crate::error::{FlowError, Result};
use crate::materialize::NamingPolicy;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// JobsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Batches with fewer rows than this are processed inline.
    #[serde(default = "default_sync_threshold")]
    pub sync_threshold: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_sync_threshold() -> usize {
    10
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            sync_threshold: default_sync_threshold(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl JobsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

// ---------------------------------------------------------------------------
// NamingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default)]
    pub default_prefix: Option<String>,
    #[serde(default = "default_start")]
    pub default_start: u64,
}

fn default_start() -> u64 {
    1
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            default_prefix: None,
            default_start: default_start(),
        }
    }
}

impl NamingConfig {
    /// Caller-supplied values win; the configured prefix applies otherwise.
    pub fn policy(
        &self,
        task_name: Option<String>,
        prefix: Option<String>,
        start: Option<u64>,
    ) -> NamingPolicy {
        let prefix = prefix.or_else(|| self.default_prefix.clone());
        let start = prefix
            .as_ref()
            .map(|_| start.unwrap_or(self.default_start));
        NamingPolicy {
            task_name,
            auto_id_prefix: prefix,
            auto_id_start: start,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub naming: NamingConfig,
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
            },
            jobs: JobsConfig::default(),
            naming: NamingConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(FlowError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Like `load`, but an uninitialized root yields defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(FlowError::NotInitialized) => Ok(Self::new("flowforge")),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.jobs.sync_threshold == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "jobs.sync_threshold is 0; treated as 1".to_string(),
            });
        }
        if self.jobs.poll_interval_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "jobs.poll_interval_ms must be greater than 0".to_string(),
            });
        }
        if matches!(self.naming.default_prefix.as_deref(), Some(p) if p.trim().is_empty()) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "naming.default_prefix is blank and will be ignored".to_string(),
            });
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("rollout");
        cfg.jobs.sync_threshold = 25;
        cfg.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.project.name, "rollout");
        assert_eq!(loaded.jobs.sync_threshold, 25);
        assert_eq!(loaded.jobs.poll_interval_ms, 2000);
    }

    #[test]
    fn missing_config_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(FlowError::NotInitialized)
        ));
        let cfg = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.jobs.sync_threshold, 10);
    }

    #[test]
    fn minimal_yaml_gets_defaults() {
        let yaml = "version: 1\nproject:\n  name: test\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.jobs.sync_threshold, 10);
        assert_eq!(cfg.naming.default_start, 1);
        assert!(cfg.naming.default_prefix.is_none());
    }

    #[test]
    fn validate_default_has_no_warnings() {
        assert!(Config::new("x").validate().is_empty());
    }

    #[test]
    fn validate_flags_bad_values() {
        let mut cfg = Config::new("x");
        cfg.jobs.sync_threshold = 0;
        cfg.jobs.poll_interval_ms = 0;
        cfg.naming.default_prefix = Some("  ".into());
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Error));
    }

    #[test]
    fn naming_policy_prefers_caller_values() {
        let naming = NamingConfig {
            default_prefix: Some("NET-".into()),
            default_start: 500,
        };
        let p = naming.policy(None, None, None);
        assert_eq!(p.auto_id_prefix.as_deref(), Some("NET-"));
        assert_eq!(p.auto_id_start, Some(500));

        let p = naming.policy(Some("Links".into()), Some("MW-".into()), Some(1));
        assert_eq!(p.auto_id_prefix.as_deref(), Some("MW-"));
        assert_eq!(p.auto_id_start, Some(1));
        assert_eq!(p.task_name.as_deref(), Some("Links"));

        let p = NamingConfig::default().policy(None, None, Some(9));
        assert_eq!(p.auto_id_prefix, None);
        assert_eq!(p.auto_id_start, None);
    }
}
