use crate::output::print_json;
use anyhow::Context;
use flowforge_core::{
    config::Config,
    io, paths,
    template::{FlowActivity, FlowSiteAlias, FlowTemplate},
    template_store::FileTemplateStore,
    types::ActivityType,
};
use std::path::Path;

pub const SAMPLE_TEMPLATE_ID: &str = "microwave-link";

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let project_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    let mut created = Vec::new();

    for dir in [paths::FLOWFORGE_DIR, paths::TEMPLATES_DIR, paths::TASKS_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    if !paths::config_path(root).exists() {
        Config::new(&project_name)
            .save(root)
            .context("failed to write config.yaml")?;
        created.push(paths::CONFIG_FILE.to_string());
    }

    // seed a template only into an empty catalog
    let templates = io::yaml_stems(&paths::templates_dir(root))?;
    if templates.is_empty() {
        FileTemplateStore::new(root)
            .save(&sample_template())
            .context("failed to write sample template")?;
        created.push(format!("{}/{SAMPLE_TEMPLATE_ID}.yaml", paths::TEMPLATES_DIR));
    }

    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "project": project_name,
            "created": created,
        }))?;
    } else {
        println!("Initialized flowforge in: {}", root.display());
        for path in &created {
            println!("  created: {path}");
        }
        if created.is_empty() {
            println!("  nothing to do");
        }
    }
    Ok(())
}

/// Two-ended link: survey both ends, notify, install, then commission as a pair.
fn sample_template() -> FlowTemplate {
    let mut t = FlowTemplate::new(SAMPLE_TEMPLATE_ID, "Microwave Link", "transmission");
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
        FlowActivity::new("survey-far", "Site Survey", 1, ActivityType::SiteSurvey).at("Far-end"),
        FlowActivity::new("survey-near", "Site Survey", 1, ActivityType::SiteSurvey)
            .at("Near-end"),
        FlowActivity::new("deviation-email", "Deviation Email", 2, ActivityType::Notification)
            .after("survey-far")
            .after("survey-near"),
        FlowActivity::new("install", "Install Radio", 3, ActivityType::Installation)
            .at("Far-end")
            .at("Near-end")
            .after("deviation-email"),
        FlowActivity::new("commission", "Commission Link", 4, ActivityType::Commissioning)
            .at("Far-end")
            .at("Near-end")
            .after("install"),
    ];
    t
}
