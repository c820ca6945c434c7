use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::xref_retain::RetainTarget;
use crate::commands::{self, CommandReport};

#[derive(Parser)]
#[command(name = "XREF")]
#[command(about = "OE to YV part-number cross-reference resolution")]
struct Cli {
    /// Print the command report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve one OE number to its YV codes
    Search {
        /// OE number, at least two characters
        query: String,
    },

    /// Annotate a query sheet with the YV codes found for its OE columns
    Match {
        /// Query sheet to annotate
        #[arg(long)]
        file: PathBuf,
        /// Comma-separated column keywords, e.g. "OE,TRW"
        #[arg(long)]
        keywords: String,
        /// Name used to derive the output file name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Rebuild the cache snapshot from a reference sheet
    Update {
        #[arg(long)]
        file: PathBuf,
    },

    /// Apply keep-newest-N retention to the working directories
    Retain {
        #[arg(value_enum, default_value = "all", conflicts_with = "dir")]
        target: RetainTarget,
        /// Files to keep; negative values are treated as zero
        #[arg(long, allow_negative_numbers = true)]
        keep: Option<i64>,
        /// Sweep an arbitrary directory instead of the configured ones
        #[arg(long, requires = "keep")]
        dir: Option<PathBuf>,
    },

    /// Show resolved paths, configuration, and cache state
    Status,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let state = if report.ok { "ok" } else { "failed" };
    println!("{}: {state}", report.command);
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let report = match cli.command {
        Command::Search { query } => commands::xref_search::run(&query)?,
        Command::Match {
            file,
            keywords,
            name,
        } => commands::xref_match::run(&file, &keywords, name.as_deref())?,
        Command::Update { file } => commands::xref_update::run(&file)?,
        Command::Retain { target, keep, dir } => commands::xref_retain::run(target, keep, dir)?,
        Command::Status => commands::xref_status::run()?,
    };

    print_report(&report, cli.json)?;
    if report.ok {
        return Ok(());
    }
    Err(anyhow!("{} failed", report.command))
}
