//! Vigil Agent CLI
//!
//! Endpoint monitoring supervisor and report pipeline.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vigil_agent::{
    config::Config,
    delivery::DeliveryResult,
    policy::PolicyStore,
    registry::builtin_registry,
    report::{today_key, Aggregator, SUMMARY_DOCUMENT},
    scheduler::{run_pipeline, run_pipeline_timeboxed, Scheduler},
    supervisor::Supervisor,
    watcher::{notification_channel, PolicyWatcher},
    VERSION,
};

#[derive(Parser)]
#[command(name = "vigil-agent")]
#[command(version = VERSION)]
#[command(about = "Endpoint monitoring supervisor and report pipeline", long_about = None)]
struct Cli {
    /// Path to an alternate configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent: reconcile policy changes and schedule reports
    Run,

    /// Aggregate today's artifacts into the summary document
    Report {
        /// Day to aggregate, as DD-MM-YYYY (defaults to today)
        #[arg(long)]
        day: Option<String>,
    },

    /// Run the full pipeline now: reports, aggregation, bundling, delivery
    Send {
        /// Day to send, as DD-MM-YYYY (defaults to today)
        #[arg(long)]
        day: Option<String>,
    },

    /// Show policy and feature state
    Status,

    /// Show effective configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Run => cmd_run(config),
        Commands::Report { day } => cmd_report(config, day),
        Commands::Send { day } => cmd_send(config, day),
        Commands::Status => cmd_status(config),
        Commands::Config => cmd_config(config),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Config {
    let result = match path {
        Some(p) => Config::load_from(p),
        None => Config::load(),
    };
    match result {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: could not load configuration: {e}");
            std::process::exit(1);
        }
    }
}

fn build_supervisor(config: &Config) -> Arc<Supervisor> {
    let registry = builtin_registry(&config.report_root);
    let store = PolicyStore::new(config.policy_path.clone());
    Arc::new(Supervisor::new(registry, store))
}

fn outcome_summary(outcome: &vigil_agent::supervisor::PassOutcome) -> String {
    format!(
        "{} enabled, {} disabled, {} failed",
        outcome.enabled.len(),
        outcome.disabled.len(),
        outcome.failed.len()
    )
}

fn print_results(results: &[DeliveryResult]) {
    if results.is_empty() {
        println!("No delivery sinks configured.");
        return;
    }
    for r in results {
        let status = if r.success { "ok" } else { "FAILED" };
        println!("  {}: {} ({} bytes) - {}", r.sink, status, r.bytes, r.message);
    }
}

fn cmd_run(config: Config) {
    println!("Vigil Agent v{VERSION}");

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: could not create directories: {e}");
    }

    let supervisor = build_supervisor(&config);

    // Bring features in line with the on-disk policy before watching it.
    let outcome = supervisor.apply_policy();
    println!("Initial policy applied: {}", outcome_summary(&outcome));

    let (tx, rx) = notification_channel();
    let _watcher = PolicyWatcher::spawn(
        &config.policy_path,
        Duration::from_millis(config.debounce_ms),
        tx,
    );

    let loop_supervisor = Arc::clone(&supervisor);
    thread::Builder::new()
        .name("reconcile".to_string())
        .spawn(move || loop_supervisor.run_loop(rx))
        .expect("failed to spawn reconcile thread");

    let scheduler = Scheduler::spawn(config.clone(), Arc::clone(&supervisor));

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    println!("Watching {:?}", config.policy_path);
    println!("Press Ctrl+C to stop");

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    println!();
    println!("Shutting down, running final report pipeline...");
    scheduler.shutdown();

    let timeout = Duration::from_secs(config.shutdown_timeout_secs);
    match run_pipeline_timeboxed(&config, &supervisor, timeout) {
        Some(results) => print_results(&results),
        None => println!("Final pipeline timed out after {}s.", timeout.as_secs()),
    }
}

fn cmd_report(config: Config, day: Option<String>) {
    let day = day.unwrap_or_else(today_key);
    let supervisor = build_supervisor(&config);
    supervisor.apply_policy();

    let aggregator = Aggregator::new(&config.report_root);
    match aggregator.aggregate(&day, &supervisor.snapshot()) {
        Ok(summary) => {
            println!("Report for {day}:");
            println!("  Active: {}s, Idle: {}s", summary.active_secs, summary.idle_secs);
            println!(
                "  Keystrokes: {}, Words: {}, Clicks: {}",
                summary.keystrokes, summary.words, summary.clicks
            );
            println!(
                "  Top applications: {}, top URLs: {}",
                summary.top_apps.len(),
                summary.top_urls.len()
            );
            println!(
                "  Document: {}",
                aggregator.day_dir(&day).join(SUMMARY_DOCUMENT).display()
            );
        }
        Err(e) => {
            eprintln!("Error: aggregation failed: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_send(config: Config, day: Option<String>) {
    let day = day.unwrap_or_else(today_key);
    let supervisor = build_supervisor(&config);
    supervisor.apply_policy();

    println!("Running pipeline for {day}...");
    let results = run_pipeline(&config, &supervisor, &day);
    print_results(&results);

    if results.iter().any(|r| !r.success) {
        std::process::exit(1);
    }
}

fn cmd_status(config: Config) {
    let supervisor = build_supervisor(&config);
    let outcome = supervisor.apply_policy();
    if !outcome.failed.is_empty() {
        for (feature, reason) in &outcome.failed {
            eprintln!("Warning: {feature}: {reason}");
        }
    }

    println!("Vigil Agent v{VERSION}");
    println!("Policy file: {:?}", config.policy_path);
    println!("Report root: {:?}", config.report_root);
    println!();
    println!("Features:");
    for (name, enabled) in supervisor.snapshot() {
        let state = if enabled { "enabled" } else { "disabled" };
        println!("  {name}: {state}");
    }
}

fn cmd_config(config: Config) {
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: could not serialize configuration: {e}");
            std::process::exit(1);
        }
    }
}
