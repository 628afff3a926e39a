//! Flow templates: the reusable, site-agnostic definition of a workflow.
//!
//! A template declares its site roles (aliases) and an ordered list of
//! activities. Each activity is assigned to zero or more aliases and may
//! depend on other activities of the same template. Templates are read-only
//! input to materialization; the only mutations offered here are the
//! authoring helpers `reorder`/`renumber` and scope annotation.

use crate::error::{FlowError, Result};
use crate::paths;
use crate::scope;
use crate::types::{ActivityType, DependencyScope, SiteScope};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Authored identifier of an activity, unique within its template.
pub type ActivityId = String;

// ---------------------------------------------------------------------------
// FlowSiteAlias
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSiteAlias {
    pub alias: String,
    pub order: u32,
}

// ---------------------------------------------------------------------------
// FlowActivity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowActivity {
    pub id: ActivityId,
    pub name: String,
    /// Topological hint. Parallel steps share a value.
    pub sequence_order: u32,
    pub activity_type: ActivityType,
    /// Empty means the activity applies to every site (scope `all`).
    #[serde(default)]
    pub assigned_site_aliases: BTreeSet<String>,
    #[serde(default)]
    pub dependencies: Vec<ActivityId>,
    /// Derived by [`annotate_scopes`]; any authored value is overwritten.
    #[serde(default)]
    pub dependency_scope: DependencyScope,
}

impl FlowActivity {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        sequence_order: u32,
        activity_type: ActivityType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sequence_order,
            activity_type,
            assigned_site_aliases: BTreeSet::new(),
            dependencies: Vec::new(),
            dependency_scope: DependencyScope::SiteLocal,
        }
    }

    pub fn at(mut self, alias: impl Into<String>) -> Self {
        self.assigned_site_aliases.insert(alias.into());
        self
    }

    pub fn after(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    pub fn site_scope(&self) -> SiteScope {
        SiteScope::from_alias_count(self.assigned_site_aliases.len())
    }
}

// ---------------------------------------------------------------------------
// FlowTemplate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub sites: Vec<FlowSiteAlias>,
    #[serde(default)]
    pub activities: Vec<FlowActivity>,
}

impl FlowTemplate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            sites: Vec::new(),
            activities: Vec::new(),
        }
    }

    /// Declared aliases in `order`, ties broken by declaration position.
    pub fn required_aliases(&self) -> Vec<String> {
        let mut indexed: Vec<(usize, &FlowSiteAlias)> = self.sites.iter().enumerate().collect();
        indexed.sort_by_key(|(i, s)| (s.order, *i));
        indexed.into_iter().map(|(_, s)| s.alias.clone()).collect()
    }

    pub fn activity(&self, id: &str) -> Option<&FlowActivity> {
        self.activities.iter().find(|a| a.id == id)
    }

    /// Activities in ascending `sequence_order`; equal orders keep their
    /// authored position.
    pub fn ordered_activities(&self) -> Vec<&FlowActivity> {
        let mut ordered: Vec<&FlowActivity> = self.activities.iter().collect();
        ordered.sort_by_key(|a| a.sequence_order);
        ordered
    }

    pub fn validate(&self) -> Result<()> {
        paths::validate_slug(&self.id)?;

        let mut aliases = HashSet::new();
        for site in &self.sites {
            if site.alias.trim().is_empty() {
                return Err(self.invalid("site alias must not be empty".to_string()));
            }
            if !aliases.insert(site.alias.as_str()) {
                return Err(self.invalid(format!("alias '{}' declared twice", site.alias)));
            }
        }

        let mut ids = HashSet::new();
        for activity in &self.activities {
            if !ids.insert(activity.id.as_str()) {
                return Err(self.invalid(format!("activity id '{}' used twice", activity.id)));
            }
        }

        for activity in &self.activities {
            if let Some(alias) = activity
                .assigned_site_aliases
                .iter()
                .find(|a| !aliases.contains(a.as_str()))
            {
                return Err(self.invalid(format!(
                    "activity '{}' is assigned to undeclared alias '{alias}'",
                    activity.id
                )));
            }
            for dep in &activity.dependencies {
                if dep == &activity.id {
                    return Err(self.invalid(format!("activity '{}' depends on itself", dep)));
                }
                if !ids.contains(dep.as_str()) {
                    return Err(self.invalid(format!(
                        "activity '{}' depends on unknown activity '{dep}'",
                        activity.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Rewrite `sequence_order` to 1..=N following `sequence`, which must list
    /// every activity id exactly once. Scopes are re-derived afterwards.
    pub fn renumber(&mut self, sequence: &[ActivityId]) -> Result<()> {
        let expected: BTreeSet<&str> = self.activities.iter().map(|a| a.id.as_str()).collect();
        let given: BTreeSet<&str> = sequence.iter().map(String::as_str).collect();
        if given != expected || sequence.len() != self.activities.len() {
            return Err(self.invalid(
                "renumber sequence must list every activity exactly once".to_string(),
            ));
        }

        let mut reordered = Vec::with_capacity(self.activities.len());
        for (i, id) in sequence.iter().enumerate() {
            let pos = self
                .activities
                .iter()
                .position(|a| &a.id == id)
                .ok_or_else(|| self.invalid(format!("unknown activity '{id}'")))?;
            let mut activity = self.activities.swap_remove(pos);
            activity.sequence_order = i as u32 + 1;
            reordered.push(activity);
        }
        self.activities = reordered;
        annotate_scopes(self);
        Ok(())
    }

    fn invalid(&self, reason: String) -> FlowError {
        FlowError::InvalidTemplate {
            template: self.id.clone(),
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Authoring helpers
// ---------------------------------------------------------------------------

/// Move the element at `from` so it ends up at `to`.
pub fn reorder(sequence: &[ActivityId], from: usize, to: usize) -> Result<Vec<ActivityId>> {
    let len = sequence.len();
    for index in [from, to] {
        if index >= len {
            return Err(FlowError::ReorderOutOfRange { index, len });
        }
    }
    let mut out = sequence.to_vec();
    let moved = out.remove(from);
    out.insert(to, moved);
    Ok(out)
}

/// Derive `dependency_scope` for every activity of the template.
pub fn annotate_scopes(template: &mut FlowTemplate) {
    let scopes: Vec<DependencyScope> = template
        .activities
        .iter()
        .map(|a| scope::classify(a, &template.activities))
        .collect();
    for (activity, scope) in template.activities.iter_mut().zip(scopes) {
        activity.dependency_scope = scope;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn link_template() -> FlowTemplate {
        let mut t = FlowTemplate::new("mw-link", "Microwave Link", "transmission");
        t.sites = vec![
            FlowSiteAlias {
                alias: "Near-end".into(),
                order: 2,
            },
            FlowSiteAlias {
                alias: "Far-end".into(),
                order: 1,
            },
        ];
        t.activities = vec![
            FlowActivity::new("survey-far", "Survey", 1, ActivityType::SiteSurvey).at("Far-end"),
            FlowActivity::new("survey-near", "Survey", 1, ActivityType::SiteSurvey).at("Near-end"),
            FlowActivity::new("email", "Deviation Email", 2, ActivityType::Notification)
                .after("survey-far")
                .after("survey-near"),
        ];
        t
    }

    #[test]
    fn required_aliases_follow_order() {
        assert_eq!(link_template().required_aliases(), vec!["Far-end", "Near-end"]);
    }

    #[test]
    fn valid_template_passes() {
        link_template().validate().unwrap();
    }

    #[test]
    fn undeclared_alias_is_rejected() {
        let mut t = link_template();
        t.activities[0].assigned_site_aliases.insert("Hub".into());
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("undeclared alias 'Hub'"), "{err}");
    }

    #[test]
    fn unknown_and_self_dependencies_are_rejected() {
        let mut t = link_template();
        t.activities[2].dependencies.push("nope".into());
        assert!(t.validate().unwrap_err().to_string().contains("unknown activity 'nope'"));

        let mut t = link_template();
        t.activities[0].dependencies.push("survey-far".into());
        assert!(t.validate().unwrap_err().to_string().contains("depends on itself"));
    }

    #[test]
    fn duplicate_activity_id_is_rejected() {
        let mut t = link_template();
        t.activities[1].id = "survey-far".into();
        assert!(t.validate().unwrap_err().to_string().contains("used twice"));
    }

    #[test]
    fn reorder_moves_one_element() {
        let seq: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(reorder(&seq, 0, 2).unwrap(), vec!["b", "c", "a", "d"]);
        assert_eq!(reorder(&seq, 3, 0).unwrap(), vec!["d", "a", "b", "c"]);
        assert_eq!(reorder(&seq, 1, 1).unwrap(), seq);
    }

    #[test]
    fn reorder_rejects_out_of_range() {
        let seq = vec!["a".to_string()];
        assert!(matches!(
            reorder(&seq, 0, 1),
            Err(FlowError::ReorderOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn renumber_rewrites_orders_and_scopes() {
        let mut t = link_template();
        let seq: Vec<String> = t.activities.iter().map(|a| a.id.clone()).collect();
        let seq = reorder(&seq, 2, 0).unwrap();
        t.renumber(&seq).unwrap();
        let orders: Vec<(&str, u32)> = t
            .activities
            .iter()
            .map(|a| (a.id.as_str(), a.sequence_order))
            .collect();
        assert_eq!(orders, vec![("email", 1), ("survey-far", 2), ("survey-near", 3)]);
        // email now precedes both dependencies: no coordinated pattern left
        assert_eq!(t.activities[0].dependency_scope, DependencyScope::Global);
    }

    #[test]
    fn renumber_requires_every_activity() {
        let mut t = link_template();
        assert!(t.renumber(&["email".to_string()]).is_err());
    }

    #[test]
    fn annotate_marks_fan_in_cross_site() {
        let mut t = link_template();
        annotate_scopes(&mut t);
        assert_eq!(t.activities[0].dependency_scope, DependencyScope::SiteLocal);
        assert_eq!(t.activities[2].dependency_scope, DependencyScope::CrossSite);
    }

    #[test]
    fn template_loads_from_yaml() {
        let yaml = r#"
id: mw-link
name: Microwave Link
category: transmission
sites:
  - { alias: Far-end, order: 1 }
activities:
  - id: survey
    name: Survey
    sequence_order: 1
    activity_type: site_survey
    assigned_site_aliases: [Far-end]
"#;
        let t: FlowTemplate = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(t.activities[0].site_scope(), SiteScope::Single);
        assert!(t.activities[0].dependencies.is_empty());
        t.validate().unwrap();
    }
}
