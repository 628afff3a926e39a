use crate::output::{print_json, print_table, progress_bar};
use anyhow::Context;
use clap::Subcommand;
use flowforge_core::job::{JobStatusView, JobStore, RedbJobStore};
use flowforge_core::paths;
use std::path::Path;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum JobSubcommand {
    /// Show status and row errors of one job
    Status { id: String },
    /// List all jobs, newest first
    List,
}

pub fn run(root: &Path, subcmd: JobSubcommand, json: bool) -> anyhow::Result<()> {
    let store = RedbJobStore::open(&paths::jobs_db_path(root))
        .context("cannot open job database (is 'flowforge serve' running?)")?;
    match subcmd {
        JobSubcommand::Status { id } => {
            let job_id = Uuid::parse_str(&id).with_context(|| format!("invalid job id '{id}'"))?;
            let job = store.get(job_id)?;
            print_status(&JobStatusView::from(&job), json)
        }
        JobSubcommand::List => list(&store, json),
    }
}

pub(crate) fn print_status(view: &JobStatusView, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(view);
    }
    println!("Job:       {}", view.job_id);
    println!("Status:    {}", view.status);
    println!(
        "Progress:  {} ({}/{} rows)",
        progress_bar(view.progress_percentage),
        view.processed_rows,
        view.total_rows
    );
    println!(
        "Results:   {} created, {} failed",
        view.success_count, view.error_count
    );
    println!("Duration:  {}ms", view.duration_ms);
    if let Some(msg) = &view.error_message {
        println!("Error:     {msg}");
    }
    for e in &view.detailed_errors {
        println!("  row {}: {}", e.row, e.message);
    }
    Ok(())
}

fn list(store: &RedbJobStore, json: bool) -> anyhow::Result<()> {
    let jobs = store.list()?;
    if json {
        let views: Vec<JobStatusView> = jobs.iter().map(JobStatusView::from).collect();
        return print_json(&views);
    }
    if jobs.is_empty() {
        println!("No jobs.");
        return Ok(());
    }
    let rows = jobs
        .iter()
        .map(|j| {
            vec![
                j.id.to_string(),
                j.template_id.clone(),
                j.project_id.clone(),
                j.status.to_string(),
                format!("{}/{}", j.processed_rows, j.total_rows),
                j.error_count.to_string(),
                j.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();
    print_table(
        &["JOB", "TEMPLATE", "PROJECT", "STATUS", "ROWS", "ERRORS", "CREATED"],
        rows,
    );
    Ok(())
}
