//! IsoGuard CLI - clearance and creepage verification from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use isoguard::compliance::{RequirementResolver, StandardTable};
use isoguard::{
    BoardSnapshot, CheckStatus, Distance, DistanceKind, FeatureProvider, IsoGuardCore,
    IsolationConfig, RunOptions, Standard, VerificationReport, Violation,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "isoguard")]
#[command(about = "PCB clearance and creepage verification tool", long_about = None)]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify every voltage domain pair on a board
    Check {
        /// Board snapshot (JSON)
        #[arg(value_name = "BOARD")]
        board: PathBuf,

        /// Isolation rules (JSON)
        #[arg(short, long, value_name = "RULES")]
        rules: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code on violations, or also on unverified checks
        #[arg(long, value_enum)]
        fail_on: Option<FailOn>,

        /// Evaluate domain pairs on all cores
        #[arg(long)]
        parallel: bool,
    },

    /// Show how nets are assigned to voltage domains
    Domains {
        /// Board snapshot (JSON)
        #[arg(value_name = "BOARD")]
        board: PathBuf,

        /// Isolation rules (JSON)
        #[arg(short, long, value_name = "RULES")]
        rules: PathBuf,
    },

    /// List the standards tables selected by a rules file
    Tables {
        /// Isolation rules (JSON), defaults apply when omitted
        #[arg(short, long, value_name = "RULES")]
        rules: Option<PathBuf>,

        /// List every table, not only the selected ones
        #[arg(short, long)]
        all: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
    /// GitHub Actions format
    Github,
    /// GitLab CI format
    Gitlab,
}

#[derive(Clone, ValueEnum)]
enum FailOn {
    /// Measured shortfalls and broken creepage paths
    Violation,
    /// Violations plus checks that could not be completed
    Inconclusive,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Check {
            board,
            rules,
            format,
            fail_on,
            parallel,
        } => handle_check(&board, &rules, format, fail_on, parallel),
        Commands::Domains { board, rules } => handle_domains(&board, &rules).map(|_| 0),
        Commands::Tables { rules, all } => handle_tables(rules.as_deref(), all).map(|_| 0),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_inputs(board: &Path, rules: &Path) -> Result<(BoardSnapshot, IsolationConfig)> {
    let snapshot = BoardSnapshot::load(board)
        .with_context(|| format!("loading board {}", board.display()))?;
    let config = IsolationConfig::load(rules)
        .with_context(|| format!("loading rules {}", rules.display()))?;
    Ok((snapshot, config))
}

fn handle_check(
    board: &Path,
    rules: &Path,
    format: OutputFormat,
    fail_on: Option<FailOn>,
    parallel: bool,
) -> Result<i32> {
    let (snapshot, config) = load_inputs(board, rules)?;
    tracing::debug!(
        "Loaded {} features and {} voltage domains",
        snapshot.features().len(),
        config.voltage_domains.len()
    );
    let options = RunOptions { parallel, cancel: None };
    let report = IsoGuardCore::verify(&snapshot, &config, options)
        .with_context(|| format!("verifying {}", board.display()))?;

    output_report(board, &report, &format)?;

    let failed = match fail_on {
        Some(FailOn::Violation) => report.failures().next().is_some(),
        Some(FailOn::Inconclusive) => !report.passed(),
        None => false,
    };
    Ok(if failed { 1 } else { 0 })
}

fn output_report(board: &Path, report: &VerificationReport, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => output_human(board, report),
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Github => output_github(board, report),
        OutputFormat::Gitlab => output_gitlab(board, report)?,
    }
    Ok(())
}

fn output_human(board: &Path, report: &VerificationReport) {
    println!("\nBoard: {}", board.display());
    println!("Selection: {}", report.selection);
    println!("{}", "─".repeat(60));

    if report.pairs.is_empty() {
        println!("  No domain pairs to check");
    }

    for pair in &report.pairs {
        println!("\n  {} <-> {}  [{}]", pair.domain_a, pair.domain_b, pair.status);
        println!("    {}", pair.requirement.description);
        print_distance("Clearance", pair.clearance, pair.requirement.clearance_mm);
        print_distance("Creepage", pair.creepage, pair.requirement.creepage_mm);

        for index in &pair.units {
            let unit = &report.units[*index];
            let algorithm = unit
                .algorithm
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "      {}: {} obstacles, {}{}",
                unit.scope,
                unit.obstacle_count,
                algorithm,
                if unit.skipped { ", SKIPPED" } else { "" }
            );
        }
    }

    let failures: Vec<&Violation> = report.failures().collect();
    let unverified: Vec<&Violation> = report.inconclusive().collect();
    if !failures.is_empty() {
        println!("\n  VIOLATIONS:");
        for v in failures {
            println!("    - {}", v.message);
            println!("      at ({:.3}, {:.3})", v.location.x, v.location.y);
        }
    }
    if !unverified.is_empty() {
        println!("\n  NOT VERIFIED:");
        for v in unverified {
            println!("    - {}", v.message);
        }
    }

    println!("\n  Summary:");
    println!("    Domain pairs:  {}", report.stats.pairs_checked);
    println!("    Layer checks:  {}", report.stats.units_evaluated);
    println!("    Skipped:       {}", report.stats.units_skipped);
    println!("    Violations:    {}", report.stats.violations);
    println!("    Inconclusive:  {}", report.stats.inconclusive);
    if report.stats.degenerate_features > 0 {
        println!("    Degenerate features ignored: {}", report.stats.degenerate_features);
    }
}

fn print_distance(label: &str, actual: Option<Distance>, required: f64) {
    match actual {
        Some(d) => println!(
            "    {:<10} {:>14}  (required {:.3} mm)",
            label,
            d.to_string(),
            required
        ),
        None => println!("    {:<10} {:>14}", label, "not checked"),
    }
}

fn output_github(board: &Path, report: &VerificationReport) {
    for violation in &report.violations {
        let level = match violation.status {
            CheckStatus::Fail => "error",
            _ => "warning",
        };
        println!(
            "::{} file={},title={}::{}",
            level,
            board.display(),
            check_name(violation.kind),
            violation.message.replace('\n', " ")
        );
    }
}

fn check_name(kind: DistanceKind) -> &'static str {
    match kind {
        DistanceKind::Clearance => "isoguard/clearance",
        DistanceKind::Creepage => "isoguard/creepage",
    }
}

fn output_gitlab(board: &Path, report: &VerificationReport) -> Result<()> {
    let issues: Vec<serde_json::Value> = report
        .violations
        .iter()
        .map(|v| {
            serde_json::json!({
                "description": v.message,
                "check_name": check_name(v.kind),
                "fingerprint": v.id.to_string(),
                "severity": if v.inconclusive { "major" } else { "blocker" },
                "location": {
                    "path": board.display().to_string(),
                    "lines": { "begin": 1 },
                }
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&issues)?);
    Ok(())
}

fn handle_domains(board: &Path, rules: &Path) -> Result<()> {
    let (snapshot, config) = load_inputs(board, rules)?;
    let domains = IsoGuardCore::classify(&snapshot, &config)?;

    println!("Voltage domains:\n");
    for domain in domains.summary() {
        println!(
            "  {} ({:.1} V{})",
            domain.name,
            domain.voltage,
            if domain.reinforced { ", reinforced" } else { "" }
        );
        println!("    Features: {}", domain.feature_count);
        if !domain.nets_from_class.is_empty() {
            println!("    By net class: {}", domain.nets_from_class.join(", "));
        }
        if !domain.nets_from_pattern.is_empty() {
            println!("    By pattern:   {}", domain.nets_from_pattern.join(", "));
        }
        println!();
    }
    if domains.degenerate_count() > 0 {
        println!("  {} degenerate features ignored", domains.degenerate_count());
    }
    Ok(())
}

fn handle_tables(rules: Option<&Path>, all: bool) -> Result<()> {
    let config = match rules {
        Some(path) => IsolationConfig::load(path)
            .with_context(|| format!("loading rules {}", path.display()))?,
        None => IsolationConfig::default(),
    };
    let resolver = RequirementResolver::new(&config)?;
    println!("Selection: {}\n", config.selection());

    let standards: &[Standard] = match config.standard {
        Standard::Both => &[Standard::Iec60664, Standard::Ipc2221],
        Standard::Iec60664 => &[Standard::Iec60664],
        Standard::Ipc2221 => &[Standard::Ipc2221],
    };

    let mut tables: Vec<&StandardTable> = Vec::new();
    if all {
        tables.extend(resolver.tables().tables().iter());
    } else {
        for &standard in standards {
            for kind in [DistanceKind::Clearance, DistanceKind::Creepage] {
                for reinforced in [false, true] {
                    let selected =
                        resolver
                            .tables()
                            .select(standard, kind, resolver.selection(), reinforced);
                    if let Some(table) = selected {
                        if !tables.iter().any(|t| std::ptr::eq(*t, table)) {
                            tables.push(table);
                        }
                    }
                }
            }
        }
    }

    for table in tables {
        println!(
            "  {} [{} {}, {}{}]",
            table.name,
            table.standard,
            table.kind,
            table.insulation,
            if table.builtin { "" } else { ", user" }
        );
        let row: Vec<String> = table
            .breakpoints
            .iter()
            .map(|(v, d)| format!("{}V:{}mm", v, d))
            .collect();
        println!("    {}\n", row.join("  "));
    }
    Ok(())
}
