//! CLI definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

/// sheetsync - spreadsheet round-trips against a typed schema
#[derive(Parser, Debug)]
#[command(name = "sheetsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.sheetsync/data/sheetsync.db)
    #[arg(long, global = true, env = "SHEETSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Actor name for audit trail
    #[arg(long, global = true, env = "SHEETSYNC_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the sheetsync database
    Init {
        /// Overwrite existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Template management
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },

    /// Column management for a template
    Column {
        #[command(subcommand)]
        command: ColumnCommands,
    },

    /// Write a template to an .xlsx file
    Export(ExportArgs),

    /// Apply an .xlsx file to a template
    Import(ImportArgs),

    /// Background job status
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
}

/// Supported shells for completions.
#[derive(ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Template Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// Create a new template
    Create {
        /// Template name
        name: String,
    },

    /// List templates
    List,

    /// Show a template's columns and record count
    Show {
        /// Template name
        name: String,
    },

    /// Delete a template with all its columns and records
    Delete {
        /// Template name
        name: String,
    },
}

// ============================================================================
// Column Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ColumnCommands {
    /// Append a column to a template
    Add {
        /// Template name
        template: String,

        /// Column name (becomes the sheet header)
        name: String,

        /// Data type: string, number, date, boolean
        #[arg(short = 't', long = "type", default_value = "string")]
        data_type: String,

        /// Reject rows that leave this column empty
        #[arg(long)]
        required: bool,
    },

    /// Remove a column and its stored values
    Remove {
        /// Template name
        template: String,

        /// Column name
        name: String,
    },

    /// List a template's columns in order
    List {
        /// Template name
        template: String,
    },
}

// ============================================================================
// Export / Import
// ============================================================================

/// What an export contains below the header row.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportKind {
    /// Header row only
    Headers,
    /// All stored records
    #[default]
    Data,
    /// Placeholder rows
    Sample,
}

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Template name
    pub template: String,

    /// Output file (.xlsx)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Export mode
    #[arg(long, value_enum, default_value_t)]
    pub mode: ExportKind,

    /// Number of sample rows (with --mode sample)
    #[arg(long)]
    pub rows: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// Template name
    pub template: String,

    /// Spreadsheet to apply (.xlsx or .xls)
    pub file: PathBuf,

    /// Run as a tracked job and report its final status
    #[arg(long)]
    pub background: bool,

    /// Validate and plan without writing to the database
    #[arg(long, conflicts_with = "background")]
    pub dry_run: bool,
}

// ============================================================================
// Job Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum JobCommands {
    /// Show the last known status of a job
    Status {
        /// Job ID printed by `import --background`
        job_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_column_add() {
        let cli = Cli::parse_from([
            "sheetsync", "column", "add", "People", "Age", "--type", "number", "--required",
        ]);
        match cli.command {
            Commands::Column {
                command: ColumnCommands::Add { template, name, data_type, required },
            } => {
                assert_eq!(template, "People");
                assert_eq!(name, "Age");
                assert_eq!(data_type, "number");
                assert!(required);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_export_defaults() {
        let cli = Cli::parse_from(["sheetsync", "export", "People", "-o", "out.xlsx"]);
        match cli.command {
            Commands::Export(args) => {
                assert_eq!(args.mode, ExportKind::Data);
                assert_eq!(args.rows, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["sheetsync", "import", "People", "in.xlsx", "--dry-run", "--json"]);
        assert!(cli.json);
        match cli.command {
            Commands::Import(args) => assert!(args.dry_run),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_dry_run_only_applies_to_import() {
        let err = Cli::try_parse_from(["sheetsync", "--dry-run", "template", "delete", "People"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);

        let err = Cli::try_parse_from([
            "sheetsync", "import", "People", "in.xlsx", "--dry-run", "--background",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
