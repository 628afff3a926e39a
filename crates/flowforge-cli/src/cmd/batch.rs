use crate::output::{print_json, progress_bar};
use anyhow::Context;
use clap::Subcommand;
use flowforge_core::{
    batch::read_csv_table,
    job::{BatchRequest, BatchSummary, Orchestrator, Submission},
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Subcommand)]
pub enum BatchSubcommand {
    /// Materialize one task per CSV row
    Submit {
        /// Template id
        template: String,
        /// CSV file whose first row is the template's batch header
        file: PathBuf,
        /// Project the tasks belong to
        #[arg(long)]
        project: String,
        /// Task name (default: template name)
        #[arg(long)]
        task_name: Option<String>,
        /// Prefix for sequential task ids
        #[arg(long)]
        prefix: Option<String>,
        /// First number after the prefix
        #[arg(long, requires = "prefix")]
        start: Option<u64>,
        /// Print progress while a background job runs
        #[arg(long)]
        wait: bool,
    },
}

pub fn run(root: &Path, subcmd: BatchSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        BatchSubcommand::Submit {
            template,
            file,
            project,
            task_name,
            prefix,
            start,
            wait,
        } => {
            let reader =
                File::open(&file).with_context(|| format!("cannot open {}", file.display()))?;
            let table = read_csv_table(reader)
                .with_context(|| format!("cannot read {}", file.display()))?;
            submit(root, template, project, table, task_name, prefix, start, wait, json)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn submit(
    root: &Path,
    template: String,
    project: String,
    table: Vec<Vec<String>>,
    task_name: Option<String>,
    prefix: Option<String>,
    start: Option<u64>,
    wait: bool,
    json: bool,
) -> anyhow::Result<()> {
    let (config, orchestrator) = super::open(root)?;
    let naming = config.naming.policy(task_name, prefix, start);
    let req = BatchRequest {
        flow_template_id: template,
        project_id: project,
        task_name: naming.task_name,
        auto_id_prefix: naming.auto_id_prefix,
        auto_id_start: naming.auto_id_start,
        batch_rows: table,
    };
    let interval = config.jobs.poll_interval();

    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    rt.block_on(submit_and_track(orchestrator, req, interval, wait, json))
}

async fn submit_and_track(
    orchestrator: Orchestrator,
    req: BatchRequest,
    interval: Duration,
    wait: bool,
    json: bool,
) -> anyhow::Result<()> {
    let handle = match orchestrator.submit(req)? {
        Submission::Inline(summary) => return print_summary(&summary, json),
        Submission::Queued(handle) => handle,
    };

    let job_id = handle.job_id();
    if !json {
        println!("Queued job {job_id}");
    }
    if wait {
        loop {
            let view = orchestrator.status(job_id)?;
            if !json {
                println!(
                    "  {} {}/{} rows",
                    progress_bar(view.progress_percentage),
                    view.processed_rows,
                    view.total_rows
                );
            }
            if view.status.is_terminal() || handle.is_finished() {
                break;
            }
            tokio::time::sleep(interval).await;
        }
    }
    // the worker lives in this process; stay until it exits
    handle.join().await?;
    let view = orchestrator.status(job_id)?;
    super::job::print_status(&view, json)
}

fn print_summary(summary: &BatchSummary, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(summary);
    }
    println!(
        "Processed inline: {} created, {} failed",
        summary.created_count, summary.error_count
    );
    for e in &summary.errors {
        println!("  row {}: {}", e.row, e.message);
    }
    Ok(())
}
