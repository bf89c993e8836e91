//! Export command implementation.

use super::open_storage;
use crate::cli::{ExportArgs, ExportKind};
use crate::error::{Error, Result};
use crate::sync::{atomic_write, ExportMode, Exporter, DEFAULT_SAMPLE_ROWS};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct ExportOutput {
    template: String,
    path: PathBuf,
    bytes: usize,
    columns: usize,
}

/// Execute the export command.
///
/// # Errors
///
/// Returns an error if the template is unknown, the options conflict, or the
/// workbook cannot be written.
pub fn execute(args: &ExportArgs, db_path: Option<&Path>, json: bool) -> Result<()> {
    let mode = export_mode(args.mode, args.rows)?;
    check_output_path(&args.output)?;

    let storage = open_storage(db_path)?;
    let template = storage.require_template(&args.template)?;

    let bytes = Exporter::new(&storage).generate_export(&template, mode)?;
    atomic_write(&args.output, &bytes)?;

    if json {
        let output = ExportOutput {
            template: template.name,
            path: args.output.clone(),
            bytes: bytes.len(),
            columns: template.columns.len(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if !crate::is_quiet() {
        println!("Exported {} to {}", template.name, args.output.display());
    }

    Ok(())
}

fn export_mode(kind: ExportKind, rows: Option<usize>) -> Result<ExportMode> {
    match (kind, rows) {
        (ExportKind::Headers, None) => Ok(ExportMode::HeadersOnly),
        (ExportKind::Data, None) => Ok(ExportMode::WithData),
        (ExportKind::Sample, rows) => Ok(ExportMode::WithSamples(rows.unwrap_or(DEFAULT_SAMPLE_ROWS))),
        (_, Some(_)) => Err(Error::InvalidArgument(
            "--rows only applies to --mode sample".to_string(),
        )),
    }
}

fn check_output_path(path: &Path) -> Result<()> {
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if is_xlsx {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "output must be an .xlsx file: {}",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_mode_mapping() {
        assert_eq!(export_mode(ExportKind::Headers, None).unwrap(), ExportMode::HeadersOnly);
        assert_eq!(export_mode(ExportKind::Data, None).unwrap(), ExportMode::WithData);
        assert_eq!(
            export_mode(ExportKind::Sample, None).unwrap(),
            ExportMode::WithSamples(DEFAULT_SAMPLE_ROWS)
        );
        assert_eq!(
            export_mode(ExportKind::Sample, Some(12)).unwrap(),
            ExportMode::WithSamples(12)
        );
        assert!(export_mode(ExportKind::Data, Some(3)).is_err());
    }

    #[test]
    fn test_output_must_be_xlsx() {
        assert!(check_output_path(Path::new("out.XLSX")).is_ok());
        assert!(check_output_path(Path::new("out.csv")).is_err());
        assert!(check_output_path(Path::new("out")).is_err());
    }
}
