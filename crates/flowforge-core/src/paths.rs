use crate::error::{FlowError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const FLOWFORGE_DIR: &str = ".flowforge";
pub const TEMPLATES_DIR: &str = ".flowforge/templates";
pub const TASKS_DIR: &str = ".flowforge/tasks";

pub const CONFIG_FILE: &str = ".flowforge/config.yaml";
pub const JOBS_DB_FILE: &str = ".flowforge/jobs.db";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn flowforge_dir(root: &Path) -> PathBuf {
    root.join(FLOWFORGE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn jobs_db_path(root: &Path) -> PathBuf {
    root.join(JOBS_DB_FILE)
}

pub fn templates_dir(root: &Path) -> PathBuf {
    root.join(TEMPLATES_DIR)
}

pub fn template_path(root: &Path, id: &str) -> PathBuf {
    templates_dir(root).join(format!("{id}.yaml"))
}

pub fn project_tasks_dir(root: &Path, project_id: &str) -> PathBuf {
    root.join(TASKS_DIR).join(project_id)
}

pub fn task_path(root: &Path, project_id: &str, task_id: &str) -> PathBuf {
    project_tasks_dir(root, project_id).join(format!("{task_id}.yaml"))
}

// ---------------------------------------------------------------------------
// Identifier validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").expect("valid slug regex")
    })
}

/// Template ids and project ids double as directory names.
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(FlowError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

/// Longest task id whose `<id>.yaml` still fits a 255-byte file name.
pub const MAX_TASK_ID_BYTES: usize = 250;

/// Task ids become file names, so they must stay inside their directory.
pub fn validate_task_id(id: &str) -> Result<()> {
    if id.trim().is_empty()
        || id.len() > MAX_TASK_ID_BYTES
        || id.contains(['/', '\\'])
        || id.chars().any(char::is_control)
        || id == "."
        || id == ".."
    {
        return Err(FlowError::InvalidTaskId(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_slugs() {
        for slug in ["microwave-link", "a", "relocation-2024", "x1"] {
            validate_slug(slug).unwrap_or_else(|_| panic!("expected valid: {slug}"));
        }
    }

    #[test]
    fn invalid_slugs() {
        for slug in ["", "-dash", "dash-", "has spaces", "UPPER", "a_b"] {
            assert!(validate_slug(slug).is_err(), "expected invalid: {slug}");
        }
    }

    #[test]
    fn task_ids_cannot_escape() {
        assert!(validate_task_id("MW-0001").is_ok());
        assert!(validate_task_id("T_bulk_abc_1").is_ok());
        for id in ["", "  ", "../x", "a/b", "a\\b", "..", "a\0b", "tab\there"] {
            assert!(validate_task_id(id).is_err(), "expected invalid: {id}");
        }
    }

    #[test]
    fn task_ids_fit_a_file_name() {
        assert!(validate_task_id(&"x".repeat(MAX_TASK_ID_BYTES)).is_ok());
        assert!(validate_task_id(&"x".repeat(MAX_TASK_ID_BYTES + 1)).is_err());
        // multi-byte characters count by encoded length
        assert!(validate_task_id(&"é".repeat(126)).is_err());
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.flowforge/config.yaml")
        );
        assert_eq!(
            template_path(root, "mw-link"),
            PathBuf::from("/tmp/proj/.flowforge/templates/mw-link.yaml")
        );
        assert_eq!(
            task_path(root, "p1", "T1"),
            PathBuf::from("/tmp/proj/.flowforge/tasks/p1/T1.yaml")
        );
    }
}
