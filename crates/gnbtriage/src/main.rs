//! gnbt - severity triage for 5G base-station test logs
//!
//! Thin CLI over `gnbtriage-core`: resolves configuration, installs logging,
//! and dispatches to the batch drivers. Results go to stdout or the given
//! files; diagnostics go to stderr.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use gnbtriage_core::analyze::Analyzer;
use gnbtriage_core::breakdown::CrashBreakdown;
use gnbtriage_core::catalog;
use gnbtriage_core::categorize;
use gnbtriage_core::config::{Config, LogFormat};
use gnbtriage_core::error::{ConfigError, format_error_with_remediation};
use gnbtriage_core::logging::init_logging;
use gnbtriage_core::organize;
use gnbtriage_core::report::{self, BatchReport, RecordBuilder, ReportSummary};
use gnbtriage_core::Classifier;

#[derive(Parser)]
#[command(name = "gnbt")]
#[command(about = "Severity triage for 5G base-station test logs", long_about = None)]
#[command(version = gnbtriage_core::VERSION)]
struct Cli {
    /// Config file (default: $GNBT_CONFIG, ./gnbtriage.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides [logging].level)
    #[arg(long, global = true, env = "GNBT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: pretty or json
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify bundle directories, .json files, or .jsonl corpora
    Classify {
        /// Inputs to classify (default: [paths].inputs)
        inputs: Vec<PathBuf>,

        /// Descend into subdirectories
        #[arg(long, short)]
        recursive: bool,

        /// Write the results report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Also write a plain-text summary here
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Keep at most N evidence entries per record (default: [report].evidence_limit)
        #[arg(long, value_name = "N")]
        evidence_limit: Option<usize>,
    },

    /// Copy bundles into per-severity folders with a classification report
    Organize {
        /// Source tree (default: [paths].source)
        source: Option<PathBuf>,
        /// Destination tree (default: [paths].destination)
        dest: Option<PathBuf>,
    },

    /// Copy bundles lacking a PDU session accept into a separate directory
    Isolate {
        /// Source directory (default: [paths].source)
        source: Option<PathBuf>,
        /// Destination directory (default: [paths].destination)
        dest: Option<PathBuf>,
    },

    /// Summarize an existing results file
    Summary {
        /// Results JSON written by `gnbt classify`
        results: PathBuf,

        /// Also write the summary here
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Assign failure categories to each line of a JSONL corpus
    Categorize {
        /// JSONL corpus (default: [paths].jsonl)
        input: Option<PathBuf>,

        /// Write CSV rows here instead of stdout
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write category statistics here
        #[arg(long)]
        stats: Option<PathBuf>,
    },

    /// Count crash signatures and SCTP failure details in a JSONL corpus
    Breakdown {
        /// JSONL corpus (default: [paths].jsonl)
        input: Option<PathBuf>,

        /// Entries shown per section
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// List the detection rules
    Rules,

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<gnbtriage_core::Error>() {
                Some(core) => eprintln!("{}", format_error_with_remediation(core)),
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if cli.log_file.is_some() {
        config.logging.file = cli.log_file;
    }
    init_logging(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Commands::Classify {
            inputs,
            recursive,
            output,
            summary,
            evidence_limit,
        } => classify(&config, inputs, recursive, output, summary, evidence_limit),
        Commands::Organize { source, dest } => {
            let (source, dest) = source_and_dest(&config, source, dest)?;
            let outcome = organize::organize(
                &source,
                &dest,
                &Classifier::new(config.classifier.clone()),
                &RecordBuilder::new(Some(config.report.evidence_limit)),
            )?;
            print!("{}", outcome.render_text());
            Ok(())
        }
        Commands::Isolate { source, dest } => {
            let (source, dest) = source_and_dest(&config, source, dest)?;
            let outcome = organize::isolate_error_cases(&source, &dest)?;
            println!("Error cases copied: {}", outcome.copied);
            println!("Success cases skipped: {}", outcome.skipped_success);
            if outcome.unreadable > 0 {
                println!("Unreadable files: {}", outcome.unreadable);
            }
            Ok(())
        }
        Commands::Summary { results, output } => {
            let records = report::load_records(&results).map_err(gnbtriage_core::Error::from)?;
            let text = ReportSummary::from_records(&records, &config.report).render_text();
            print!("{text}");
            if let Some(path) = output.or_else(|| config.paths.summary.clone()) {
                write_output(&path, &text)?;
            }
            Ok(())
        }
        Commands::Categorize { input, csv, stats } => {
            let input = input
                .or_else(|| config.paths.jsonl.clone())
                .ok_or(gnbtriage_core::Error::from(ConfigError::MissingPath("JSONL input")))?;
            let run = categorize::categorize_jsonl(&input)?;
            let csv_text = categorize::format_csv(&run.rows);
            let stats_text = run.stats.render_text();

            match csv.or_else(|| config.paths.categories_csv.clone()) {
                Some(path) => {
                    write_output(&path, &csv_text)?;
                    print!("{stats_text}");
                }
                None => print!("{csv_text}"),
            }
            if let Some(path) = stats.or_else(|| config.paths.categories_stats.clone()) {
                write_output(&path, &stats_text)?;
            }
            Ok(())
        }
        Commands::Breakdown { input, top } => {
            let input = input
                .or_else(|| config.paths.jsonl.clone())
                .ok_or(gnbtriage_core::Error::from(ConfigError::MissingPath("JSONL input")))?;
            let breakdown = CrashBreakdown::from_jsonl(&input)?;
            print!("{}", breakdown.render_text(top));
            Ok(())
        }
        Commands::Rules => {
            for rule in catalog::all_rules() {
                println!("{:<20} {:<38} {}", rule.tier, rule.id, rule.description);
                println!("{:<20} {:<38} /{}/", "", "", rule.pattern);
            }
            Ok(())
        }
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn classify(
    config: &Config,
    inputs: Vec<PathBuf>,
    recursive: bool,
    output: Option<PathBuf>,
    summary: Option<PathBuf>,
    evidence_limit: Option<usize>,
) -> Result<()> {
    let inputs = if inputs.is_empty() {
        config.paths.inputs.clone()
    } else {
        inputs
    };
    if inputs.is_empty() {
        return Err(gnbtriage_core::Error::from(ConfigError::MissingPath("input")).into());
    }

    let analyzer = Analyzer::new(
        Classifier::new(config.classifier.clone()),
        RecordBuilder::new(Some(evidence_limit.unwrap_or(config.report.evidence_limit))),
    );
    let records = analyzer.analyze_inputs(&inputs, recursive)?;
    let report = BatchReport::new(records, &config.report);
    let json = serde_json::to_string_pretty(&report).context("failed to serialize results")?;

    match output.or_else(|| config.paths.results.clone()) {
        Some(path) => {
            write_output(&path, &json)?;
            tracing::info!(path = %path.display(), records = report.total, "Results written");
            print!("{}", report.summary.render_text());
        }
        None => println!("{json}"),
    }
    if let Some(path) = summary.or_else(|| config.paths.summary.clone()) {
        write_output(&path, &report.summary.render_text())?;
    }
    Ok(())
}

fn source_and_dest(
    config: &Config,
    source: Option<PathBuf>,
    dest: Option<PathBuf>,
) -> Result<(PathBuf, PathBuf)> {
    let source = source
        .or_else(|| config.paths.source.clone())
        .ok_or(gnbtriage_core::Error::from(ConfigError::MissingPath("source directory")))?;
    let dest = dest
        .or_else(|| config.paths.destination.clone())
        .ok_or(gnbtriage_core::Error::from(ConfigError::MissingPath("destination directory")))?;
    if !source.is_dir() {
        anyhow::bail!("source directory not found: {}", source.display());
    }
    Ok((source, dest))
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
