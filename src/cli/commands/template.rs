//! Template command implementations.

use super::open_storage;
use crate::cli::TemplateCommands;
use crate::config::default_actor;
use crate::error::Result;
use crate::model::ColumnDefinition;
use crate::validate::validate_template_name;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct TemplateCreateOutput {
    id: i64,
    name: String,
}

#[derive(Serialize)]
struct TemplateShowOutput<'a> {
    id: i64,
    name: &'a str,
    columns: &'a [ColumnDefinition],
    record_count: usize,
    created_at: i64,
    updated_at: i64,
}

/// Execute template commands.
///
/// # Errors
///
/// Returns an error if the database is missing, the template is unknown, or
/// the name is invalid or taken.
pub fn execute(
    command: &TemplateCommands,
    db_path: Option<&Path>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    match command {
        TemplateCommands::Create { name } => create(name, db_path, actor, json),
        TemplateCommands::List => list(db_path, json),
        TemplateCommands::Show { name } => show(name, db_path, json),
        TemplateCommands::Delete { name } => delete(name, db_path, actor, json),
    }
}

fn create(name: &str, db_path: Option<&Path>, actor: Option<&str>, json: bool) -> Result<()> {
    let name = validate_template_name(name)?;
    let mut storage = open_storage(db_path)?;
    let actor = actor.map(ToString::to_string).unwrap_or_else(default_actor);

    let template = storage.create_template(&name, &actor)?;

    if json {
        let output = TemplateCreateOutput {
            id: template.id,
            name: template.name,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if !crate::is_quiet() {
        println!("Created template: {} (id {})", template.name, template.id);
        println!();
        println!("Next: sheetsync column add {} <column> --type <type>", template.name);
    }

    Ok(())
}

fn list(db_path: Option<&Path>, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let templates = storage.list_templates()?;

    if json {
        let output = serde_json::json!({
            "templates": templates,
            "count": templates.len(),
        });
        println!("{output}");
    } else if templates.is_empty() {
        println!("No templates found.");
    } else {
        println!("Templates ({} found):", templates.len());
        println!();
        for t in &templates {
            println!(
                "  {:<30} {:>3} columns  {:>6} records",
                t.name, t.column_count, t.record_count
            );
        }
    }

    Ok(())
}

fn show(name: &str, db_path: Option<&Path>, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let template = storage.require_template(name)?;
    let record_count = storage.count_records(template.id)?;

    if json {
        let output = TemplateShowOutput {
            id: template.id,
            name: &template.name,
            columns: &template.columns,
            record_count,
            created_at: template.created_at,
            updated_at: template.updated_at,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{} (id {})", template.name, template.id);
    println!("  Records: {record_count}");
    println!();
    if template.columns.is_empty() {
        println!("  No columns yet.");
    } else {
        super::column::print_columns(&template.columns);
    }

    Ok(())
}

fn delete(name: &str, db_path: Option<&Path>, actor: Option<&str>, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let actor = actor.map(ToString::to_string).unwrap_or_else(default_actor);
    let template = storage.require_template(name)?;

    storage.delete_template(template.id, &actor)?;

    if json {
        let output = serde_json::json!({
            "name": template.name,
            "deleted": true
        });
        println!("{output}");
    } else if !crate::is_quiet() {
        println!("Deleted template: {}", template.name);
    }

    Ok(())
}
