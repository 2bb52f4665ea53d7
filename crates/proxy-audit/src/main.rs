//! CLI entry point for proxy-variable auditing.

use anyhow::{Result, anyhow};
use clap::Parser;
use proxy_audit::{AnalysisOutcome, AnalysisReport, MethodResult, ScoreTable, Session};
use std::path::Path;
use tracing::{debug, info};

/// Rules printed in the human-readable summary.
const SUMMARY_RULE_LIMIT: usize = 10;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Proxy-variable auditing for tabular datasets",
    long_about = "Finds columns that act as proxies for sensitive attributes.\n\n\
                  ALGORITHMS:\n  \
                  correlation   Pearson, Spearman and Kendall against the sensitive columns\n  \
                  facet         Model-based redundancy (requires --target)\n  \
                  arm           Association rule mining\n\n\
                  EXAMPLES:\n  \
                  # Correlation of two sensitive columns with everything else\n  \
                  proxy-audit -i data.csv -a correlation --sensitive age,sex\n\n  \
                  # FACET on a reproducible 25% sample\n  \
                  proxy-audit -i data.csv -a facet --sensitive age -t income \\\n      \
                  --sample-percentage 25 --seed 7\n\n  \
                  # Rules mined from a subset, as JSON\n  \
                  proxy-audit -i data.csv -a arm --sensitive age --filter \"age > 30\" --json"
)]
struct Args {
    /// Path to the CSV file to analyze
    #[arg(short, long)]
    input: String,

    /// Analysis to run (correlation, facet, arm or a full display name)
    #[arg(short, long)]
    algorithm: String,

    /// Comma-separated sensitive columns
    #[arg(short, long, value_delimiter = ',', required = true)]
    sensitive: Vec<String>,

    /// Target column (required by facet)
    #[arg(short, long)]
    target: Option<String>,

    /// Random seed for sampling and the analyzers
    ///
    /// -1 runs the rule miner unseeded
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    seed: i64,

    /// Analyze a random sample of this percentage of rows (0, 100]
    #[arg(long, conflicts_with = "filter")]
    sample_percentage: Option<f64>,

    /// Analyze only rows matching this SQL predicate, e.g. "age > 30 AND sex = 1"
    #[arg(long)]
    filter: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output the analysis outcome as JSON to stdout
    ///
    /// Disables all progress logs; only outputs the JSON document.
    #[arg(long)]
    json: bool,

    /// Write a JSON report with heatmap matrices to this path
    #[arg(short = 'r', long)]
    report: Option<String>,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    let mut session = Session::new();
    info!("Loading dataset from: {}", args.input);
    session.load_csv_path(&args.input)?;

    if let Some(percentage) = args.sample_percentage {
        let rows = session.sample(percentage, args.seed)?.height();
        info!("Sampled {}% of rows: {} remain", percentage, rows);
    } else {
        session.set_seed(args.seed);
    }
    if let Some(ref predicate) = args.filter {
        let rows = session.filter(predicate)?.height();
        info!("Filter '{}' kept {} rows", predicate, rows);
    }

    let algorithm = session.select_algorithm(&args.algorithm)?;
    session.set_sensitive_columns(args.sensitive.as_slice())?;
    if let Some(ref target) = args.target {
        session.set_target_column(target)?;
    }
    debug!("Session state: {}", session.state());

    info!("Running {}", algorithm);
    let outcome = session.run_analysis()?;

    if let Some(ref path) = args.report {
        let view = session
            .working_view()
            .ok_or_else(|| anyhow!("No working view after analysis"))?;
        AnalysisReport::new(outcome.clone(), view).write_to_file(path)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome);
    }

    Ok(())
}

/// Print a human-readable summary of the outcome.
fn print_summary(outcome: &AnalysisOutcome) {
    println!("\n{}", "=".repeat(80));
    println!("{}", outcome.status_message().to_uppercase());
    println!("{}\n", "=".repeat(80));

    match outcome {
        AnalysisOutcome::Correlation(results) => {
            for (method, result) in results {
                println!("{}", method.as_str().to_uppercase());
                println!("{}", "-".repeat(40));
                match result {
                    MethodResult::Scores(table) => print_table(table),
                    MethodResult::Failed(message) => println!("  failed: {}", message),
                }
                println!();
            }
        }
        AnalysisOutcome::Redundancy(table) => {
            println!("REDUNDANCY (%)");
            println!("{}", "-".repeat(40));
            print_table(table);
            println!();
        }
        AnalysisOutcome::RuleMining(rules) => {
            println!(
                "{:<40} {:<8} {:<8} {:<10} {:<8}",
                "Rule", "Fitness", "Support", "Confidence", "Lift"
            );
            println!("{}", "-".repeat(78));
            for rule in rules.iter().take(SUMMARY_RULE_LIMIT) {
                let text = format!(
                    "{} => {}",
                    rule.antecedent.join(" & "),
                    rule.consequent.join(" & ")
                );
                println!(
                    "{:<40} {:<8.4} {:<8.4} {:<10.4} {:<8.4}",
                    truncate_str(&text, 39),
                    rule.fitness,
                    rule.support,
                    rule.confidence,
                    rule.lift
                );
            }
            if rules.len() > SUMMARY_RULE_LIMIT {
                println!("  ... and {} more", rules.len() - SUMMARY_RULE_LIMIT);
            }
            println!();
        }
    }
}

fn print_table(table: &ScoreTable) {
    let Some(first) = table.values().next() else {
        println!("  (no results)");
        return;
    };

    print!("  {:<16}", "");
    for column in first.keys() {
        print!(" {:>12}", truncate_str(column, 12));
    }
    println!();

    for (sensitive, row) in table {
        print!("  {:<16}", truncate_str(sensitive, 16));
        for value in row.values() {
            match value.as_f64() {
                Some(v) => print!(" {:>12.4}", v),
                None => print!(" {:>12}", "NaN"),
            }
        }
        println!();
    }
}

/// Truncate a string to a maximum number of characters.
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
