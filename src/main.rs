//! lcpscan - multi-trial Lighthouse measurement and aggregation
//!
//! A CLI tool that runs Lighthouse several times per URL with bounded
//! concurrency, reduces each URL to median metrics with Core Web Vitals
//! grades, and summarizes which elements and resources are the recurring
//! bottlenecks across a URL list.
//!
//! Exit codes:
//!   0 - Success (individual URL failures are recorded in the reports)
//!   1 - Runtime error (bad arguments, unreadable input, unwritable output)
//!   2 - Some URL failed on every run and --fail-on-error was set

mod analysis;
mod audit;
mod cli;
mod config;
mod error;
mod measure;
mod models;
mod report;
mod targets;

use anyhow::{Context, Result};
use audit::LighthouseRunner;
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use measure::Scheduler;
use models::{MeasurementResult, Metric, Report, Summary};
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging, so the config file can enable verbose output
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(config.log_level(&args));

    info!("lcpscan v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let outcome = match args.compare {
        Some(ref paths) => handle_compare(paths),
        None => run_measurement(args, config).await,
    };

    match outcome {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .lcpscan.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize device, repeats, concurrency, Chrome flags, and more.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Handle --compare: print the before/after table for two JSON reports.
fn handle_compare(paths: &[std::path::PathBuf]) -> Result<i32> {
    let [old_path, new_path] = paths else {
        anyhow::bail!("--compare takes exactly two reports");
    };

    let old = report::load_report(old_path)?;
    let new = report::load_report(new_path)?;

    println!("📊 {} → {}\n", old_path.display(), new_path.display());
    print!("{}", report::format_comparison(&report::compare_reports(&old, &new)));
    Ok(0)
}

/// Run the complete measurement workflow. Returns exit code (0 or 2).
async fn run_measurement(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();
    let started_at = Utc::now();

    let settings = config.settings();
    debug!("Settings: {:?}", settings);

    // Step 1: Read the URL list
    let urls = targets::read_urls(args.url.as_deref(), args.urls_file.as_deref())?;
    let plan = settings.plan(urls.clone());
    plan.validate()?;

    println!("🔦 Measuring {} URLs", plan.urls.len());
    println!("   Device: {}", settings.device);
    println!("   Runs per URL: {}", settings.repeats);
    println!("   Concurrency: {}", settings.concurrency);
    println!("   Timeout: {}s", settings.timeout_seconds);
    println!("   Output: {}\n", settings.output_dir.display());

    // Step 2: Run Lighthouse across the URL set
    let runner = LighthouseRunner::new(settings.lighthouse_config());
    let progress = create_progress_bar(plan.urls.len(), args.quiet);

    let mut results = Scheduler::new(&runner)
        .run_with_progress(&plan, |result| {
            progress.inc(1);
            progress.println(describe_result(result));
        })
        .await?;
    progress.finish_and_clear();

    // Reports list URLs in input order
    results.sort_by_key(|r| urls.iter().position(|u| u == r.url()));

    // Step 3: Summarize and write reports
    println!("\n📝 Generating reports...");

    let summary = analysis::summarize(&results);
    let report = Report {
        generated_at: Utc::now(),
        started_at,
        settings: settings.clone(),
        summary,
        results,
    };

    let written = report::write_reports(&report, &config.report, &settings.output_dir)?;

    // Print summary
    print_summary(&report.summary);
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());

    println!("\n✅ Done! Reports saved to: {}", settings.output_dir.display());
    for path in &written {
        println!("   - {}", path.display());
    }

    if args.fail_on_error && report.summary.failed > 0 {
        eprintln!(
            "\n⛔ {} URL(s) failed on every run. Failing (exit code 2).",
            report.summary.failed
        );
        return Ok(2);
    }

    Ok(0)
}

fn create_progress_bar(len: usize, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// One line per finished URL, plus its two most important findings.
fn describe_result(result: &MeasurementResult) -> String {
    match result {
        MeasurementResult::Measured(m) => {
            let mut line = format!(
                "[OK] {} | Score {} | LCP {} ({}) | TTFB {} | CLS {} | TBT {}",
                m.url,
                report::format_metric(Metric::PerfScore, m.metrics.perf_score),
                report::format_metric(Metric::Lcp, m.metrics.lcp),
                m.grade(Metric::Lcp),
                report::format_metric(Metric::Ttfb, m.metrics.ttfb),
                report::format_metric(Metric::Cls, m.metrics.cls),
                report::format_metric(Metric::Tbt, m.metrics.tbt),
            );
            if m.successful_trials < m.repeats {
                line.push_str(&format!(" [{}/{} runs]", m.successful_trials, m.repeats));
            }
            for finding in m.findings.iter().take(2) {
                line.push_str(&format!("\n     - [{}] {}", finding.level, finding.title));
            }
            line
        }
        MeasurementResult::Failed(f) => {
            let first_line = f.error.lines().next().unwrap_or_default();
            format!("[FAIL] {} | {}", f.url, first_line)
        }
    }
}

fn print_summary(summary: &Summary) {
    println!("\n📊 Measurement Summary:");
    println!(
        "   URLs: {} | ✅ Measured: {} | ❌ Failed: {}",
        summary.count, summary.success, summary.failed
    );

    for metric in Metric::GRADED {
        let Some(rows) = summary.worst.get(&metric).filter(|r| !r.is_empty()) else {
            continue;
        };
        println!("\n   Worst {}:", metric);
        for (i, row) in rows.iter().enumerate() {
            println!(
                "     {}. {} {}",
                i + 1,
                report::format_metric(metric, Some(row.value)),
                row.url
            );
        }
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is initialized, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
