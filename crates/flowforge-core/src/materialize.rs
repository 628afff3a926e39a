//! Task materialization: template + site group → concrete task graph.
//!
//! Every activity of the template becomes one `SubActivity` per assigned
//! alias (or a single `ALL` sub-activity when it has none). Template-level
//! dependency ids are rewritten to positions within the generated task.

use crate::alias::{self, SiteDescriptor, SiteGroup};
use crate::error::{FlowError, Result};
use crate::paths;
use crate::sink::TaskSink;
use crate::template::{annotate_scopes, FlowActivity, FlowTemplate};
use crate::types::{ActivityType, DependencyScope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Output model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiteBinding {
    /// Template-wide activity, not tied to one site.
    All,
    Site { alias: String, site_id: u64 },
}

impl SiteBinding {
    fn alias(&self) -> Option<&str> {
        match self {
            SiteBinding::All => None,
            SiteBinding::Site { alias, .. } => Some(alias),
        }
    }

    fn site_id(&self) -> Option<u64> {
        match self {
            SiteBinding::All => None,
            SiteBinding::Site { site_id, .. } => Some(*site_id),
        }
    }
}

impl fmt::Display for SiteBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteBinding::All => f.write_str("ALL"),
            SiteBinding::Site { site_id, .. } => write!(f, "{site_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubActivity {
    pub position: usize,
    pub activity_id: String,
    pub name: String,
    pub sequence_order: u32,
    pub activity_type: ActivityType,
    pub site: SiteBinding,
    /// Positions of the sub-activities this one waits for.
    pub dependencies: Vec<usize>,
    pub dependency_scope: DependencyScope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub task_name: String,
    pub project_id: String,
    pub template_id: String,
    pub sites: Vec<SiteDescriptor>,
    pub sub_activities: Vec<SubActivity>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// NamingPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingPolicy {
    /// Base task name when the site group carries none.
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub auto_id_prefix: Option<String>,
    /// First number issued after the prefix; defaults to 1.
    #[serde(default)]
    pub auto_id_start: Option<u64>,
}

impl NamingPolicy {
    pub fn with_prefix(mut self, prefix: impl Into<String>, start: u64) -> Self {
        self.auto_id_prefix = Some(prefix.into());
        self.auto_id_start = Some(start);
        self
    }

    fn prefix(&self) -> Option<&str> {
        self.auto_id_prefix
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Materializer
// ---------------------------------------------------------------------------

/// Materializes one template for many site groups.
///
/// Holds the scope-annotated copy of the template and the set of task ids
/// issued so far, so ids stay pairwise distinct across one call or batch.
pub struct Materializer {
    template: FlowTemplate,
    project_id: String,
    policy: NamingPolicy,
    batch_tag: Uuid,
    issued: HashSet<String>,
}

impl Materializer {
    pub fn new(template: &FlowTemplate, project_id: &str, policy: NamingPolicy) -> Result<Self> {
        template.validate()?;
        paths::validate_slug(project_id)?;
        let mut template = template.clone();
        annotate_scopes(&mut template);
        Ok(Self {
            template,
            project_id: project_id.to_string(),
            policy,
            batch_tag: Uuid::new_v4(),
            issued: HashSet::new(),
        })
    }

    pub fn template(&self) -> &FlowTemplate {
        &self.template
    }

    /// Id for the group at `index`: explicit client id, then prefix + counter,
    /// then a synthesized bulk id.
    pub fn task_id_for(&self, group: &SiteGroup, index: usize) -> Result<String> {
        if let Some(id) = group.explicit_task_id() {
            return Ok(id.to_string());
        }
        if let Some(prefix) = self.policy.prefix() {
            let start = self.policy.auto_id_start.unwrap_or(1);
            let n = u64::try_from(index)
                .ok()
                .and_then(|i| start.checked_add(i))
                .ok_or_else(|| FlowError::TaskIdOverflow {
                    prefix: prefix.to_string(),
                    start,
                    offset: index,
                })?;
            return Ok(format!("{prefix}{n}"));
        }
        Ok(format!("T_bulk_{}_{}", self.batch_tag.simple(), index + 1))
    }

    pub fn materialize(&mut self, group: &SiteGroup, index: usize) -> Result<Task> {
        let resolved = alias::resolve(&self.template, group)?;

        let task_id = self.task_id_for(group, index)?;
        paths::validate_task_id(&task_id)?;
        if self.issued.contains(&task_id) {
            return Err(FlowError::DuplicateTaskId(task_id));
        }

        let alias_order = self.template.required_aliases();
        let ordered = self.template.ordered_activities();

        // Expand activities into sub-activities.
        let mut subs: Vec<SubActivity> = Vec::new();
        let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
        for activity in &ordered {
            for site in bindings(activity, &alias_order, &resolved) {
                let position = subs.len();
                positions
                    .entry(activity.id.as_str())
                    .or_default()
                    .push(position);
                subs.push(SubActivity {
                    position,
                    activity_id: activity.id.clone(),
                    name: activity.name.clone(),
                    sequence_order: activity.sequence_order,
                    activity_type: activity.activity_type,
                    site,
                    dependencies: Vec::new(),
                    dependency_scope: activity.dependency_scope,
                });
            }
        }

        check_unique_orders(&subs)?;

        // Rewrite template dependency ids to sub-activity positions.
        let mut rewired = Vec::with_capacity(subs.len());
        for sub in &subs {
            let Some(activity) = self.template.activity(&sub.activity_id) else {
                rewired.push(Vec::new());
                continue;
            };
            let mut deps = Vec::new();
            for dep_id in &activity.dependencies {
                let targets = positions.get(dep_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                let same_site: Vec<usize> = targets
                    .iter()
                    .copied()
                    .filter(|&p| sub.site.alias().is_some() && subs[p].site.alias() == sub.site.alias())
                    .collect();
                let chosen = if sub.dependency_scope == DependencyScope::SiteLocal
                    && !same_site.is_empty()
                {
                    same_site
                } else {
                    targets.to_vec()
                };
                for p in chosen {
                    if !deps.contains(&p) {
                        deps.push(p);
                    }
                }
            }
            rewired.push(deps);
        }
        for (sub, deps) in subs.iter_mut().zip(rewired) {
            sub.dependencies = deps;
        }

        let task_name = group
            .task_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .or(self.policy.task_name.as_deref())
            .unwrap_or(&self.template.name)
            .to_string();

        self.issued.insert(task_id.clone());
        Ok(Task {
            task_id,
            task_name,
            project_id: self.project_id.clone(),
            template_id: self.template.id.clone(),
            sites: resolved.into_vec(),
            sub_activities: subs,
            created_at: Utc::now(),
        })
    }
}

fn bindings(
    activity: &FlowActivity,
    alias_order: &[String],
    resolved: &alias::ResolvedSites,
) -> Vec<SiteBinding> {
    if activity.assigned_site_aliases.is_empty() {
        return vec![SiteBinding::All];
    }
    alias_order
        .iter()
        .filter(|a| activity.assigned_site_aliases.contains(*a))
        .filter_map(|a| resolved.get(a))
        .map(|s| SiteBinding::Site {
            alias: s.alias.clone(),
            site_id: s.site_id,
        })
        .collect()
}

/// Two sub-activities may share a sequence order only when they run on
/// different concrete sites.
fn check_unique_orders(subs: &[SubActivity]) -> Result<()> {
    let mut seen: HashMap<(u32, Option<u64>), &SubActivity> = HashMap::new();
    for sub in subs {
        let key = (sub.sequence_order, sub.site.site_id());
        if let Some(first) = seen.get(&key) {
            return Err(FlowError::DuplicateSequenceOrder {
                order: sub.sequence_order,
                site: sub.site.to_string(),
                first: first.activity_id.clone(),
                second: sub.activity_id.clone(),
            });
        }
        seen.insert(key, sub);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Multi-group materialization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupError {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializeOutcome {
    pub created_count: usize,
    /// Distinct concrete sites across the created tasks.
    pub total_sites: usize,
    pub tasks: Vec<Task>,
    pub errors: Vec<GroupError>,
}

/// Materialize and persist each group independently.
///
/// A group that fails validation is reported in `errors` and skipped; the
/// others still succeed, including one whose task file cannot be written.
/// Template faults and store outages abort the whole call.
pub fn materialize_groups(
    template: &FlowTemplate,
    project_id: &str,
    policy: NamingPolicy,
    groups: &[SiteGroup],
    sink: &dyn TaskSink,
) -> Result<MaterializeOutcome> {
    let mut materializer = Materializer::new(template, project_id, policy)?;
    let mut tasks = Vec::new();
    let mut errors = Vec::new();

    for (index, group) in groups.iter().enumerate() {
        let result = materializer
            .materialize(group, index)
            .and_then(|task| sink.persist(&task).map(|_| task));
        match result {
            Ok(task) => tasks.push(task),
            Err(e) if e.is_row_error() => errors.push(GroupError {
                index,
                message: e.to_string(),
            }),
            Err(e) => return Err(e),
        }
    }

    let total_sites = tasks
        .iter()
        .flat_map(|t| t.sites.iter().map(|s| s.site_id))
        .collect::<BTreeSet<_>>()
        .len();

    Ok(MaterializeOutcome {
        created_count: tasks.len(),
        total_sites,
        tasks,
        errors,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemoryTaskSink;
    use crate::template::FlowSiteAlias;

    /// Far-end/Near-end link: survey both ends in parallel, email once both
    /// surveys are done, then install at each end after the email.
    fn link_template() -> FlowTemplate {
        let mut t = FlowTemplate::new("mw-link", "Microwave Link", "transmission");
        t.sites = vec![
            FlowSiteAlias {
                alias: "Far-end".into(),
                order: 1,
            },
            FlowSiteAlias {
                alias: "Near-end".into(),
                order: 2,
            },
        ];
        t.activities = vec![
            FlowActivity::new("survey-far", "Survey", 1, ActivityType::SiteSurvey).at("Far-end"),
            FlowActivity::new("survey-near", "Survey", 1, ActivityType::SiteSurvey).at("Near-end"),
            FlowActivity::new("email", "Deviation Email", 2, ActivityType::Notification)
                .after("survey-far")
                .after("survey-near"),
            FlowActivity::new("install", "Install", 3, ActivityType::Installation)
                .at("Far-end")
                .at("Near-end")
                .after("email"),
        ];
        t
    }

    fn group(far: u64, near: u64) -> SiteGroup {
        SiteGroup::new().with_site("Far-end", far).with_site("Near-end", near)
    }

    #[test]
    fn expands_activities_per_site() {
        let mut m = Materializer::new(&link_template(), "p1", NamingPolicy::default()).unwrap();
        let task = m.materialize(&group(10, 20), 0).unwrap();

        let shape: Vec<(&str, String)> = task
            .sub_activities
            .iter()
            .map(|s| (s.activity_id.as_str(), s.site.to_string()))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("survey-far", "10".to_string()),
                ("survey-near", "20".to_string()),
                ("email", "ALL".to_string()),
                ("install", "10".to_string()),
                ("install", "20".to_string()),
            ]
        );
        assert_eq!(task.sub_activities[2].dependencies, vec![0, 1]);
        assert_eq!(task.sub_activities[2].dependency_scope, DependencyScope::CrossSite);
        assert_eq!(task.sub_activities[3].dependencies, vec![2]);
        assert_eq!(task.task_name, "Microwave Link");
        assert_eq!(task.project_id, "p1");
    }

    #[test]
    fn site_local_dependencies_stay_on_their_site() {
        let mut t = link_template();
        t.activities.push(
            FlowActivity::new("commission", "Commission", 4, ActivityType::Commissioning)
                .at("Far-end")
                .at("Near-end")
                .after("install"),
        );
        let mut m = Materializer::new(&t, "p1", NamingPolicy::default()).unwrap();
        let task = m.materialize(&group(10, 20), 0).unwrap();
        let commission: Vec<&SubActivity> = task
            .sub_activities
            .iter()
            .filter(|s| s.activity_id == "commission")
            .collect();
        assert_eq!(commission[0].dependency_scope, DependencyScope::SiteLocal);
        assert_eq!(commission[0].dependencies, vec![3]);
        assert_eq!(commission[1].dependencies, vec![4]);
    }

    #[test]
    fn explicit_id_wins_over_prefix() {
        let policy = NamingPolicy::default().with_prefix("MW-", 100);
        let mut m = Materializer::new(&link_template(), "p1", policy).unwrap();
        let mut g = group(1, 2);
        g.client_task_id = Some("CLIENT-9".into());
        assert_eq!(m.materialize(&g, 0).unwrap().task_id, "CLIENT-9");
        assert_eq!(m.materialize(&group(3, 4), 1).unwrap().task_id, "MW-101");
    }

    #[test]
    fn counter_overflow_fails_only_that_group() {
        let policy = NamingPolicy::default().with_prefix("MW-", u64::MAX);
        let mut m = Materializer::new(&link_template(), "p1", policy).unwrap();
        let last = format!("MW-{}", u64::MAX);
        assert_eq!(m.materialize(&group(1, 2), 0).unwrap().task_id, last);

        let err = m.materialize(&group(3, 4), 1).unwrap_err();
        assert!(matches!(err, FlowError::TaskIdOverflow { offset: 1, .. }));
        assert!(err.is_row_error());

        let mut g = group(5, 6);
        g.client_task_id = Some("LINK-5".into());
        assert_eq!(m.materialize(&g, 2).unwrap().task_id, "LINK-5");
    }

    #[test]
    fn overlong_client_id_is_a_group_error() {
        let sink = MemoryTaskSink::new();
        let mut long = group(3, 4);
        long.client_task_id = Some("L".repeat(300));
        let groups = vec![group(1, 2), long, group(5, 6)];
        let outcome = materialize_groups(
            &link_template(),
            "p1",
            NamingPolicy::default(),
            &groups,
            &sink,
        )
        .unwrap();
        assert_eq!(outcome.created_count, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].index, 1);
        assert!(outcome.errors[0].message.starts_with("invalid task id"));
    }

    #[test]
    fn synthesized_ids_are_distinct() {
        let mut m = Materializer::new(&link_template(), "p1", NamingPolicy::default()).unwrap();
        let ids: HashSet<String> = (0..25)
            .map(|i| m.materialize(&group(i + 1, i + 100), i as usize).unwrap().task_id)
            .collect();
        assert_eq!(ids.len(), 25);
        assert!(ids.iter().all(|id| id.starts_with("T_bulk_")));
        assert!(ids.iter().any(|id| id.ends_with("_25")));
    }

    #[test]
    fn repeated_client_id_is_rejected() {
        let mut m = Materializer::new(&link_template(), "p1", NamingPolicy::default()).unwrap();
        let mut g = group(1, 2);
        g.client_task_id = Some("SAME".into());
        m.materialize(&g, 0).unwrap();
        let err = m.materialize(&g, 1).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateTaskId(ref id) if id == "SAME"));
    }

    #[test]
    fn same_site_for_both_ends_duplicates_sequence_order() {
        let mut m = Materializer::new(&link_template(), "p1", NamingPolicy::default()).unwrap();
        let err = m.materialize(&group(7, 7), 0).unwrap_err();
        assert!(err.is_row_error());
        let msg = err.to_string();
        assert!(msg.contains("duplicate sequence order 1 at site 7"), "{msg}");
        assert!(msg.contains("survey-far") && msg.contains("survey-near"), "{msg}");
    }

    #[test]
    fn parallel_template_wide_steps_collide() {
        let mut t = link_template();
        t.activities
            .push(FlowActivity::new("report", "Report", 2, ActivityType::Documentation));
        let mut m = Materializer::new(&t, "p1", NamingPolicy::default()).unwrap();
        let err = m.materialize(&group(1, 2), 0).unwrap_err();
        assert!(err.to_string().contains("at site ALL"), "{err}");
    }

    #[test]
    fn group_task_name_overrides_policy() {
        let policy = NamingPolicy {
            task_name: Some("Rollout".into()),
            ..Default::default()
        };
        let mut m = Materializer::new(&link_template(), "p1", policy).unwrap();
        assert_eq!(m.materialize(&group(1, 2), 0).unwrap().task_name, "Rollout");
        let mut g = group(3, 4);
        g.task_name = Some("Link 3-4".into());
        assert_eq!(m.materialize(&g, 1).unwrap().task_name, "Link 3-4");
    }

    #[test]
    fn invalid_project_id_is_rejected_up_front() {
        assert!(Materializer::new(&link_template(), "Bad Project", NamingPolicy::default()).is_err());
    }

    #[test]
    fn materialize_groups_isolates_bad_groups() {
        let sink = MemoryTaskSink::new();
        let groups = vec![
            group(1, 2),
            SiteGroup::new().with_site("Far-end", 3),
            group(5, 6),
        ];
        let outcome = materialize_groups(
            &link_template(),
            "p1",
            NamingPolicy::default(),
            &groups,
            &sink,
        )
        .unwrap();
        assert_eq!(outcome.created_count, 2);
        assert_eq!(outcome.total_sites, 4);
        assert_eq!(
            outcome.errors,
            vec![GroupError {
                index: 1,
                message: "missing site for alias Near-end".into()
            }]
        );
        assert_eq!(sink.tasks().len(), 2);
    }
}
