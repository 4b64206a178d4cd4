//! sqlbridge — convert MySQL SQL batches to PostgreSQL SQL.
//!
//! # Usage
//!
//! ```bash
//! # Convert inline SQL
//! sqlbridge --sql "SELECT IFNULL(comment, 'No Comment') FROM grades;"
//!
//! # Convert a dump file
//! sqlbridge --in-file dump.sql --out-file dump.pg.sql
//!
//! # Machine-readable result with a per-statement report
//! sqlbridge --in-file dump.sql --format json
//! ```
//!
//! Statements without a safe automatic mapping are emitted as `-- TODO:` or
//! `-- ERROR:` annotated comments; grep the output for those prefixes to find
//! what still needs a human.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use colored::*;
use sqlbridge_core::prelude::*;

#[derive(Parser)]
#[command(name = "sqlbridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Convert MySQL SQL batches to PostgreSQL SQL", long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["sql", "in_file"])))]
struct Cli {
    /// Inline SQL to convert
    #[arg(long)]
    sql: Option<String>,

    /// Read SQL from this file
    #[arg(long, value_name = "PATH")]
    in_file: Option<PathBuf>,

    /// Write output to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    out_file: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "sql")]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Sql,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let input = match (cli.sql, cli.in_file) {
        (Some(sql), None) => sql,
        (None, Some(path)) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            // Dump files exported on Windows often open with a BOM.
            text.trim_start_matches('\u{feff}').to_string()
        }
        _ => unreachable!("clap enforces exactly one input source"),
    };

    let conversion = convert_batch(&input);

    let output = match cli.format {
        OutputFormat::Sql => conversion.sql.clone(),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&serde_json::json!({
                "sql": conversion.sql,
                "report": conversion.report,
            }))?;
            json.push('\n');
            json
        }
    };

    match cli.out_file {
        Some(path) => fs::write(&path, output)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{output}"),
    }

    if conversion.report.failed > 0 {
        eprintln!(
            "{}",
            format!(
                "{} of {} statement(s) need manual attention (grep for -- TODO: / -- ERROR:)",
                conversion.report.failed,
                conversion.report.statements.len()
            )
            .yellow()
        );
    }
    Ok(())
}
