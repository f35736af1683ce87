//! csvql - query a directory of CSV/TSV files with SQL
//!
//! Entry point for the csvql command line tool.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use csvql::app::shutdown_signal;
use csvql::observability::init_tracing;
use csvql::{App, Config, QueryResult};

/// Keep a `SQLite` database in sync with a directory of CSV/TSV files
#[derive(Parser, Debug)]
#[command(name = "csvql")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to scan for CSV/TSV files
    #[arg(short, long, env = "CSVQL_DIR", default_value = ".")]
    dir: PathBuf,

    /// `SQLite` database path (default: .csvql.db in the scanned directory)
    #[arg(long, env = "CSVQL_DB")]
    db: Option<PathBuf>,

    /// Execute a single query and exit
    #[arg(short, long)]
    query: Option<String>,

    /// Output format for query results
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Load once and exit instead of watching for changes
    #[arg(long, env = "CSVQL_NO_WATCH")]
    no_watch: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CSVQL_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "CSVQL_LOG_JSON")]
    log_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);

    let one_shot = cli.query.is_some() || cli.no_watch;
    let config = Config {
        root_dir: cli.dir,
        db_path: cli.db,
        watch: !one_shot,
        log_level: cli.log_level,
        log_json: cli.log_json,
        ..Config::default()
    };

    tracing::debug!(?config, "Configuration loaded");

    let (app, mut events) = App::open_with_events(&config).with_context(|| {
        format!("failed to open csvql for {}", config.root_dir.display())
    })?;

    if let Some(sql) = cli.query {
        let outcome = app.query(&sql);
        app.close().await;
        let result = outcome.context("query failed")?;
        print_result(&result, cli.format)?;
        return Ok(());
    }

    print_banner(&app)?;

    if one_shot {
        app.close().await;
        return Ok(());
    }

    println!("Watching for changes... (Ctrl+C to stop)");
    println!();

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("{event}");
        }
    });

    shutdown_signal().await?;

    println!();
    println!("Stopping...");
    app.close().await;
    printer.abort();

    Ok(())
}

fn print_banner(app: &App) -> anyhow::Result<()> {
    let tables = app.list_tables().context("failed to list tables")?;

    println!("csvql - CSV/TSV to SQLite");
    println!("Database: {}", app.db_path().display());
    println!("Loaded {} table(s):", tables.len());
    for table in &tables {
        let columns = app.table_info(table).map(|c| c.len()).unwrap_or(0);
        println!("  - {table} ({columns} columns)");
    }
    println!();
    Ok(())
}

fn print_result(result: &QueryResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Table => {
            if result.is_empty() {
                println!("(no results)");
                return Ok(());
            }
            print!("{}", render_table(result));
            println!();
            println!("({} rows)", result.len());
        }
    }
    Ok(())
}

/// Left-aligned columns separated by two spaces, with a dashed rule under
/// the header.
fn render_table(result: &QueryResult) -> String {
    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for row in &result.rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule: Vec<String> = result
        .columns
        .iter()
        .map(|c| "-".repeat(c.chars().count()))
        .collect();

    let mut out = String::new();
    for line in std::iter::once(&result.columns)
        .chain(std::iter::once(&rule))
        .chain(&result.rows)
    {
        let cells: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}
