use crate::output::{print_json, print_table};
use anyhow::{bail, Context};
use clap::Args;
use flowforge_core::{alias::SiteGroup, job::MaterializeRequest};
use std::path::Path;

#[derive(Args)]
pub struct MaterializeArgs {
    /// Template id
    pub template: String,
    /// Project the tasks belong to
    #[arg(long)]
    pub project: String,
    /// Site group as Alias=site_id pairs, e.g. "Far-end=101,Near-end=102" (repeatable)
    #[arg(long = "group", required = true)]
    pub groups: Vec<String>,
    /// Client task id, paired with --group by position (repeatable)
    #[arg(long = "task-id")]
    pub task_ids: Vec<String>,
    /// Task name (default: template name)
    #[arg(long)]
    pub task_name: Option<String>,
    /// Prefix for sequential task ids
    #[arg(long)]
    pub prefix: Option<String>,
    /// First number after the prefix
    #[arg(long, requires = "prefix")]
    pub start: Option<u64>,
}

pub fn run(root: &Path, args: MaterializeArgs, json: bool) -> anyhow::Result<()> {
    if args.task_ids.len() > args.groups.len() {
        bail!(
            "{} --task-id values for {} --group values",
            args.task_ids.len(),
            args.groups.len()
        );
    }

    let site_groups = args
        .groups
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let mut group =
                parse_group(raw).with_context(|| format!("invalid --group '{raw}'"))?;
            group.client_task_id = args.task_ids.get(i).cloned();
            Ok(group)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let (config, orchestrator) = super::open(root)?;
    let req = MaterializeRequest {
        flow_template_id: args.template,
        project_id: args.project,
        site_groups,
        task_naming: config
            .naming
            .policy(args.task_name, args.prefix, args.start),
    };
    let outcome = orchestrator.materialize(&req)?;

    if json {
        return print_json(&outcome);
    }

    println!(
        "Created {} task(s) across {} site(s)",
        outcome.created_count, outcome.total_sites
    );
    if !outcome.tasks.is_empty() {
        let rows = outcome
            .tasks
            .iter()
            .map(|t| {
                vec![
                    t.task_id.clone(),
                    t.task_name.clone(),
                    t.sites
                        .iter()
                        .map(|s| format!("{}={}", s.alias, s.site_id))
                        .collect::<Vec<_>>()
                        .join(","),
                    t.sub_activities.len().to_string(),
                ]
            })
            .collect();
        print_table(&["TASK", "NAME", "SITES", "STEPS"], rows);
    }
    for e in &outcome.errors {
        eprintln!("group {}: {}", e.index + 1, e.message);
    }
    Ok(())
}

/// `Alias=value,Alias=value`. Values are passed through unparsed; site id
/// validation happens during resolution so all issues are reported together.
fn parse_group(raw: &str) -> anyhow::Result<SiteGroup> {
    let mut group = SiteGroup::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((alias, value)) = pair.split_once('=') else {
            bail!("expected Alias=site_id, got '{pair}'");
        };
        let alias = alias.trim();
        if alias.is_empty() {
            bail!("empty alias in '{pair}'");
        }
        group = group.with_site(alias, value.trim());
    }
    Ok(group)
}
