//! Column command implementations.

use super::open_storage;
use crate::cli::ColumnCommands;
use crate::config::default_actor;
use crate::error::Result;
use crate::model::ColumnDefinition;
use crate::validate::{normalize_data_type, validate_column_name};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ColumnListOutput<'a> {
    template: &'a str,
    columns: &'a [ColumnDefinition],
    count: usize,
}

/// Execute column commands.
///
/// # Errors
///
/// Returns an error if the template or column is unknown, the name or type
/// is invalid, or the database is missing.
pub fn execute(
    command: &ColumnCommands,
    db_path: Option<&Path>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    match command {
        ColumnCommands::Add {
            template,
            name,
            data_type,
            required,
        } => add(template, name, data_type, *required, db_path, actor, json),
        ColumnCommands::Remove { template, name } => remove(template, name, db_path, actor, json),
        ColumnCommands::List { template } => list(template, db_path, json),
    }
}

#[allow(clippy::too_many_arguments)]
fn add(
    template: &str,
    name: &str,
    data_type: &str,
    required: bool,
    db_path: Option<&Path>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    let name = validate_column_name(name)?;
    let data_type = normalize_data_type(data_type)?;

    let mut storage = open_storage(db_path)?;
    let actor = actor.map(ToString::to_string).unwrap_or_else(default_actor);
    let template = storage.require_template(template)?;

    let column = storage.add_column(template.id, &name, data_type, required, &actor)?;

    if json {
        println!("{}", serde_json::to_string(&column)?);
    } else if !crate::is_quiet() {
        println!(
            "Added column {} ({}{}) to {} at position {}",
            column.name,
            column.data_type,
            if column.required { ", required" } else { "" },
            template.name,
            column.position
        );
    }

    Ok(())
}

fn remove(
    template: &str,
    name: &str,
    db_path: Option<&Path>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let actor = actor.map(ToString::to_string).unwrap_or_else(default_actor);
    let template = storage.require_template(template)?;

    storage.remove_column(template.id, name, &actor)?;

    if json {
        let output = serde_json::json!({
            "template": template.name,
            "column": name,
            "removed": true
        });
        println!("{output}");
    } else if !crate::is_quiet() {
        println!("Removed column {name} from {}", template.name);
    }

    Ok(())
}

fn list(template: &str, db_path: Option<&Path>, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let template = storage.require_template(template)?;

    if json {
        let output = ColumnListOutput {
            template: &template.name,
            columns: &template.columns,
            count: template.columns.len(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if template.columns.is_empty() {
        println!("No columns in {}.", template.name);
    } else {
        println!("Columns of {} ({} found):", template.name, template.columns.len());
        println!();
        print_columns(&template.columns);
    }

    Ok(())
}

/// Print columns as an aligned table.
pub(crate) fn print_columns(columns: &[ColumnDefinition]) {
    for c in columns {
        println!(
            "  {:>3}. {:<30} {:<8} {}",
            c.position,
            c.name,
            c.data_type,
            if c.required { "required" } else { "" }
        );
    }
}
