//! Turnstile CLI
//!
//! Run load scenarios against a visitor-management deployment.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use turnstile::api::{ApiState, start_api_server};
use turnstile::config::Config;
use turnstile::executor::run_scenario;
use turnstile::metrics::Metrics;
use turnstile::scenarios::{Scenario, ScenarioReport, registry::SCENARIOS};
use turnstile::summary::SummaryReport;

/// Turnstile - load tests for the visitor-management API
#[derive(Debug, Parser)]
#[command(name = "turnstile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run scenarios against the target
    Run {
        /// Path to run configuration file
        #[arg(short, long, default_value = "turnstile.yaml")]
        config: String,

        /// Specific scenarios to run (comma-separated)
        #[arg(short, long)]
        scenarios: Option<String>,

        /// Override target.base_url
        #[arg(long)]
        base_url: Option<String>,

        /// Write scenario reports as JSON to this path
        #[arg(long)]
        summary_export: Option<String>,

        /// Start HTTP status API on this port
        #[arg(long)]
        api_port: Option<u16>,

        /// Keep running after scenarios complete (for API access)
        #[arg(long)]
        keep_alive: bool,
    },

    /// Generate a default configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "turnstile.yaml")]
        output: String,
    },

    /// List available scenarios
    List,

    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "turnstile.yaml")]
        config: String,
    },
}

fn setup_logging(verbose: bool, json: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.json);

    match cli.command {
        Commands::Run {
            config: config_path,
            scenarios: scenario_filter,
            base_url,
            summary_export,
            api_port,
            keep_alive,
        } => {
            let opts = RunOptions {
                scenario_filter,
                base_url,
                summary_export,
                api_port,
                keep_alive,
            };
            run_scenarios(&config_path, opts).await
        }

        Commands::Init { output } => init_config(&output),

        Commands::List => {
            list_scenarios();
            Ok(())
        }

        Commands::Validate {
            config: config_path,
        } => validate_config(&config_path),
    }
}

struct RunOptions {
    scenario_filter: Option<String>,
    base_url: Option<String>,
    summary_export: Option<String>,
    api_port: Option<u16>,
    keep_alive: bool,
}

/// Load the config file, falling back to defaults when it does not exist
fn load_config(config_path: &str) -> Result<Config> {
    let mut config = if std::path::Path::new(config_path).exists() {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path}"))?
    } else {
        tracing::warn!(config = %config_path, "Config file not found, using defaults");
        Config::default_config()
    };
    config.apply_env();
    Ok(config)
}

/// Run the selected scenarios concurrently
async fn run_scenarios(config_path: &str, opts: RunOptions) -> Result<()> {
    tracing::info!(config = %config_path, "Loading configuration");

    let mut config = load_config(config_path)?;
    if let Some(base_url) = opts.base_url {
        config.target.base_url = base_url;
    }
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        base_url = %config.target.base_url,
        health_urls = config.target.health_urls.len(),
        location = %config.visitor.location,
        "Target configuration loaded"
    );

    // Determine which scenarios to run
    let to_run: Vec<Arc<dyn Scenario>> = if let Some(filter) = &opts.scenario_filter {
        filter
            .split(',')
            .filter_map(|name| {
                let name = name.trim();
                SCENARIOS.get(name).cloned().or_else(|| {
                    tracing::warn!(scenario = name, "Unknown scenario, skipping");
                    None
                })
            })
            .collect()
    } else {
        SCENARIOS
            .iter()
            .filter(|(name, _)| config.is_scenario_enabled(name))
            .map(|(_, scenario)| scenario.clone())
            .collect()
    };

    if to_run.is_empty() {
        tracing::warn!("No scenarios to run");
        return Ok(());
    }

    let api_state = ApiState::new();
    api_state.set_total_scenarios(to_run.len());

    if let Some(port) = opts.api_port {
        let state_clone = api_state.clone();
        tokio::spawn(async move {
            if let Err(e) = start_api_server(port, state_clone).await {
                tracing::error!(error = %e, "API server error");
            }
        });
        // Give the server a moment to start
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    tracing::info!(
        count = to_run.len(),
        scenarios = ?to_run.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "Running scenarios in parallel"
    );

    let mut handles = Vec::new();
    for scenario in to_run {
        let name = scenario.name().to_string();
        let scenario_opts = config
            .scenario_config(&name)
            .map(|c| c.to_options(&scenario.default_options()))
            .unwrap_or_else(|| scenario.default_options());

        // Each scenario records into its own registry
        let metrics = Metrics::new();
        let ctx = config
            .to_scenario_context(metrics.clone(), &scenario_opts)
            .with_context(|| format!("Failed to create context for {name}"))?;
        api_state.start_scenario(&name, metrics);

        handles.push(tokio::spawn(async move {
            tracing::info!(scenario = %name, "Starting scenario");
            let result = run_scenario(scenario, Arc::new(ctx), &scenario_opts).await;
            (name, result)
        }));
    }

    let mut reports: Vec<ScenarioReport> = Vec::new();
    let mut all_passed = true;
    for handle in futures::future::join_all(handles).await {
        match handle {
            Ok((name, Ok(report))) => {
                print_summary(&report);
                if report.passed {
                    tracing::info!(
                        scenario = %name,
                        duration_ms = report.duration.as_millis() as u64,
                        message = ?report.message,
                        "Scenario PASSED"
                    );
                } else {
                    tracing::error!(
                        scenario = %name,
                        duration_ms = report.duration.as_millis() as u64,
                        message = ?report.message,
                        crossed = report.crossed_thresholds().count(),
                        "Scenario FAILED"
                    );
                    all_passed = false;
                }
                api_state.record_result(report.clone());
                reports.push(report);
            }
            Ok((name, Err(e))) => {
                tracing::error!(scenario = %name, error = %e, "Scenario error");
                api_state.record_error(&name);
                all_passed = false;
            }
            Err(e) => {
                tracing::error!(error = %e, "Scenario task panicked");
                all_passed = false;
            }
        }
    }

    api_state.complete(all_passed);

    if let Some(path) = &opts.summary_export {
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialize reports")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write summary to {path}"))?;
        tracing::info!(path = %path, "Summary exported");
    }

    if all_passed {
        tracing::info!("All scenarios PASSED");
    } else {
        tracing::error!("Some scenarios FAILED");
    }

    // If keep_alive is set and API is running, wait forever
    if opts.keep_alive && opts.api_port.is_some() {
        tracing::info!("Keeping alive for API access. Press Ctrl+C to exit.");
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        }
    }

    if all_passed {
        Ok(())
    } else {
        anyhow::bail!("Some scenarios crossed their thresholds")
    }
}

fn print_summary(report: &ScenarioReport) {
    let summary = SummaryReport::from_report(report);
    println!();
    println!("[{}]", report.scenario);
    print!("{summary}");
    println!("{}", summary.completion_line());
}

/// Generate a default configuration file
fn init_config(output: &str) -> Result<()> {
    let config = Config::default_config();
    let yaml = config.to_yaml().context("Failed to serialize config")?;

    std::fs::write(output, &yaml).with_context(|| format!("Failed to write config to {output}"))?;

    tracing::info!(path = %output, "Configuration file created");
    println!("Created {output}");
    println!();
    println!("Edit the file to point at your deployment, then run:");
    println!("  turnstile run --config {output}");

    Ok(())
}

/// List available scenarios
fn list_scenarios() {
    println!("Available scenarios:");
    println!();

    for (name, scenario) in SCENARIOS.iter() {
        let opts = scenario.default_options();
        println!(
            "  {name:15} - {} [{}, up to {} VUs]",
            scenario.description(),
            opts.executor.kind(),
            opts.executor.max_vus()
        );
    }

    println!();
    println!("Run specific scenarios with:");
    println!("  turnstile run --scenarios health");
}

/// Validate a configuration file
fn validate_config(config_path: &str) -> Result<()> {
    tracing::info!(config = %config_path, "Validating configuration");

    let config = Config::from_file(config_path)
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    config.validate().context("Invalid configuration")?;

    println!("Configuration is valid!");
    println!();
    println!("Target: {}", config.target.base_url);
    println!("Health URLs: {}", config.target.health_urls.len());
    for url in &config.target.health_urls {
        println!("  - {url}");
    }
    println!("Location: {}", config.visitor.location);

    println!();
    println!("Scenarios configured: {}", config.scenarios.len());

    for (name, scenario_config) in &config.scenarios {
        let status = if scenario_config.enabled {
            "enabled"
        } else {
            "disabled"
        };
        let executor = scenario_config
            .executor
            .as_ref()
            .map(|e| e.kind())
            .unwrap_or("default");
        println!("  - {name}: {status} ({executor})");
    }

    Ok(())
}
