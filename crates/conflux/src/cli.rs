//! Connector commands

use std::fmt::Write as _;

use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use tracing::info;

use conflux_common::Config;
use conflux_connectors::{build_handler, ResultEnvelope, SourceHandler};

use crate::{EXIT_FAILURE, EXIT_OK};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that a configured data source is reachable
    Check {
        /// Source name from the `sources` config section
        source: String,
    },

    /// Run a query against a data source
    Query {
        source: String,

        /// Query text, in the source's dialect unless `--sql` is given
        query: String,

        /// Parse the query as SQL and translate it for the source
        #[arg(long)]
        sql: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// List the tables of a data source
    Tables {
        source: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Describe the columns of one table
    Columns {
        source: String,
        table: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Run a connector command and return the process exit status.
pub async fn execute(command: Command, config: &Config) -> Result<u8> {
    match command {
        Command::Check { source } => {
            let mut handler = handler(config, &source)?;
            let status = handler.check_connection().await;
            match status.error_message {
                None => {
                    println!("{}: OK", source);
                    Ok(EXIT_OK)
                }
                Some(message) => {
                    println!("{}: FAILED ({})", source, message);
                    Ok(EXIT_FAILURE)
                }
            }
        }

        Command::Query {
            source,
            query,
            sql,
            format,
        } => {
            let mut handler = handler(config, &source)?;
            let result = if sql {
                handler.run_sql(&query).await
            } else {
                handler.run_native_query(&query).await
            };
            print_result(&result, format)
        }

        Command::Tables { source, format } => {
            let mut handler = handler(config, &source)?;
            let result = handler.list_tables().await;
            print_result(&result, format)
        }

        Command::Columns {
            source,
            table,
            format,
        } => {
            let mut handler = handler(config, &source)?;
            let result = handler.list_columns(&table).await;
            print_result(&result, format)
        }

        Command::Version => {
            println!("conflux version {}", env!("CARGO_PKG_VERSION"));
            Ok(EXIT_OK)
        }
    }
}

fn handler(config: &Config, source: &str) -> Result<Box<dyn SourceHandler>> {
    let source_config = config.source(source)?;
    let handler = build_handler(source, source_config)?;
    info!("Using {} source '{}'", handler.engine(), source);
    Ok(handler)
}

fn print_result(result: &ResultEnvelope, format: OutputFormat) -> Result<u8> {
    match format {
        OutputFormat::Table => print!("{}", render_table(result)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
    }

    Ok(if result.is_error() { EXIT_FAILURE } else { EXIT_OK })
}

/// Render an envelope as an aligned text table.
pub fn render_table(result: &ResultEnvelope) -> String {
    match result {
        ResultEnvelope::Ok => "OK\n".to_string(),
        ResultEnvelope::Error { message } => format!("ERROR: {}\n", message),
        ResultEnvelope::Table { columns, rows } => {
            let cells: Vec<Vec<String>> = rows
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .map(|column| row.get(column).map(ToString::to_string).unwrap_or_default())
                        .collect()
                })
                .collect();

            let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
            for line in &cells {
                for (width, cell) in widths.iter_mut().zip(line) {
                    *width = (*width).max(cell.chars().count());
                }
            }

            let mut out = String::new();
            write_line(&mut out, columns, &widths);
            let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            write_line(&mut out, &separator, &widths);
            for line in &cells {
                write_line(&mut out, line, &widths);
            }
            let _ = writeln!(
                out,
                "({} row{})",
                rows.len(),
                if rows.len() == 1 { "" } else { "s" }
            );
            out
        }
    }
}

fn write_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    let _ = writeln!(out, "{}", padded.join(" | ").trim_end());
}
