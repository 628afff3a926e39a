use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use flowforge_core::{
    batch::batch_header,
    scope,
    template::{self, annotate_scopes, FlowTemplate},
    template_store::{FileTemplateStore, TemplateStore},
};
use std::path::Path;

#[derive(Subcommand)]
pub enum TemplateSubcommand {
    /// List templates in the catalog
    List,
    /// Show a template's aliases and activities
    Show { id: String },
    /// Show the derived dependency scope of each activity
    Scopes { id: String },
    /// Print the batch header row for a template
    Header { id: String },
    /// Move the activity at position FROM to position TO and renumber
    Reorder {
        id: String,
        /// 0-based position in the current sequence
        from: usize,
        /// 0-based target position
        to: usize,
        /// Write the renumbered template back to the catalog
        #[arg(long)]
        save: bool,
    },
}

pub fn run(root: &Path, subcmd: TemplateSubcommand, json: bool) -> anyhow::Result<()> {
    let store = FileTemplateStore::new(root);
    match subcmd {
        TemplateSubcommand::List => list(&store, json),
        TemplateSubcommand::Show { id } => show(&store, &id, json),
        TemplateSubcommand::Scopes { id } => scopes(&store, &id, json),
        TemplateSubcommand::Header { id } => header(&store, &id, json),
        TemplateSubcommand::Reorder { id, from, to, save } => {
            reorder(&store, &id, from, to, save, json)
        }
    }
}

fn load(store: &FileTemplateStore, id: &str) -> anyhow::Result<FlowTemplate> {
    let t = store
        .get(id)
        .with_context(|| format!("cannot load template '{id}'"))?;
    t.validate()?;
    Ok(t)
}

fn aliases_of(activity_aliases: &std::collections::BTreeSet<String>) -> String {
    if activity_aliases.is_empty() {
        "ALL".to_string()
    } else {
        activity_aliases
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn list(store: &FileTemplateStore, json: bool) -> anyhow::Result<()> {
    let templates = store.list()?;
    if json {
        let items: Vec<_> = templates
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "name": t.name,
                    "category": t.category,
                    "aliases": t.required_aliases(),
                    "activities": t.activities.len(),
                })
            })
            .collect();
        return print_json(&items);
    }
    if templates.is_empty() {
        println!("No templates.");
        return Ok(());
    }
    let rows = templates
        .iter()
        .map(|t| {
            vec![
                t.id.clone(),
                t.name.clone(),
                t.category.clone(),
                t.required_aliases().join(","),
                t.activities.len().to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "CATEGORY", "ALIASES", "ACTIVITIES"], rows);
    Ok(())
}

fn show(store: &FileTemplateStore, id: &str, json: bool) -> anyhow::Result<()> {
    let mut t = load(store, id)?;
    annotate_scopes(&mut t);
    if json {
        return print_json(&t);
    }
    println!("{} ({})", t.name, t.id);
    if !t.category.is_empty() {
        println!("Category: {}", t.category);
    }
    println!("Aliases:  {}", t.required_aliases().join(", "));
    println!();
    let rows = t
        .ordered_activities()
        .into_iter()
        .map(|a| {
            vec![
                a.sequence_order.to_string(),
                a.id.clone(),
                a.name.clone(),
                a.activity_type.to_string(),
                aliases_of(&a.assigned_site_aliases),
                a.dependencies.join(","),
            ]
        })
        .collect();
    print_table(&["ORDER", "ID", "NAME", "TYPE", "SITES", "DEPENDS"], rows);
    Ok(())
}

fn scopes(store: &FileTemplateStore, id: &str, json: bool) -> anyhow::Result<()> {
    let t = load(store, id)?;
    let classified: Vec<_> = t
        .ordered_activities()
        .into_iter()
        .map(|a| (a, scope::classify(a, &t.activities)))
        .collect();

    if json {
        let items: Vec<_> = classified
            .iter()
            .map(|(a, s)| {
                serde_json::json!({
                    "activity_id": a.id,
                    "site_scope": a.site_scope(),
                    "dependency_scope": s,
                })
            })
            .collect();
        return print_json(&items);
    }
    let rows = classified
        .into_iter()
        .map(|(a, s)| {
            vec![
                a.id.clone(),
                a.site_scope().to_string(),
                s.to_string(),
            ]
        })
        .collect();
    print_table(&["ACTIVITY", "SITE SCOPE", "DEPENDENCY SCOPE"], rows);
    Ok(())
}

fn header(store: &FileTemplateStore, id: &str, json: bool) -> anyhow::Result<()> {
    let t = load(store, id)?;
    let header = batch_header(&t.required_aliases());
    if json {
        return print_json(&header);
    }
    // CSV-quote cells that need it so the line pastes into a spreadsheet
    let line: Vec<String> = header
        .iter()
        .map(|c| {
            if c.contains(',') || c.contains('"') {
                format!("\"{}\"", c.replace('"', "\"\""))
            } else {
                c.clone()
            }
        })
        .collect();
    println!("{}", line.join(","));
    Ok(())
}

fn reorder(
    store: &FileTemplateStore,
    id: &str,
    from: usize,
    to: usize,
    save: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut t = load(store, id)?;
    let sequence: Vec<String> = t.ordered_activities().iter().map(|a| a.id.clone()).collect();
    let moved = template::reorder(&sequence, from, to)?;
    t.renumber(&moved)?;

    if save {
        store.save(&t).context("failed to save template")?;
    }

    if json {
        return print_json(&serde_json::json!({
            "template_id": t.id,
            "saved": save,
            "activities": t.ordered_activities(),
        }));
    }
    let rows = t
        .ordered_activities()
        .into_iter()
        .map(|a| {
            vec![
                a.sequence_order.to_string(),
                a.id.clone(),
                a.dependency_scope.to_string(),
            ]
        })
        .collect();
    print_table(&["ORDER", "ID", "SCOPE"], rows);
    if !save {
        println!("\n(dry run; pass --save to write)");
    }
    Ok(())
}
