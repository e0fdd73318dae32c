//! TraceMetrics CLI
//!
//! Command-line interface for computing agent run metrics.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use tracemetrics::api::HttpServer;
use tracemetrics::config::LoggingConfig;
use tracemetrics::models::{BatchReport, DataSourceConfig, RunOutcome, DEFAULT_INDEX_PATTERN};
use tracemetrics::pipeline::BatchOrchestrator;
use tracemetrics::source::{SearchSourceOptions, SearchSpanSource};
use tracemetrics::Config;

/// TraceMetrics - Per-run metrics for AI agents
#[derive(Parser)]
#[command(name = "tracemetrics")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "TRACEMETRICS_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the metrics API server
    Serve {
        /// HTTP API port (overrides configuration)
        #[arg(long)]
        http_port: Option<u16>,

        /// Port for the Prometheus exporter (overrides configuration)
        #[arg(long)]
        metrics_port: Option<u16>,
    },

    /// Compute metrics for one or more runs
    Metrics {
        /// Run identifiers
        #[arg(required = true)]
        run_ids: Vec<String>,

        /// Trace backend URL (overrides configuration)
        #[arg(long)]
        endpoint: Option<String>,

        /// Basic auth username
        #[arg(long)]
        username: Option<String>,

        /// Basic auth password
        #[arg(long, env = "TRACEMETRICS_SOURCE_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Index pattern to search
        #[arg(long)]
        index: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        generate_completions(shell);
        return ExitCode::SUCCESS;
    }

    let _ = dotenvy::dotenv();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    init_logging(&config.logging, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Serve {
            http_port,
            metrics_port,
        } => run_serve(config, http_port, metrics_port).await,
        Commands::Metrics {
            run_ids,
            endpoint,
            username,
            password,
            index,
        } => {
            let override_source = endpoint.map(|endpoint| {
                let source = DataSourceConfig::new(endpoint, index.unwrap_or_else(|| DEFAULT_INDEX_PATTERN.to_string()));
                match username {
                    Some(username) => source.with_credentials(username, password),
                    None => source,
                }
            });
            run_metrics(config, &run_ids, override_source, cli.format).await
        }
        Commands::Completions { .. } => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Logs go to stderr so `metrics --format json` stays pipeable
    if logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn build_orchestrator(config: &Config) -> anyhow::Result<BatchOrchestrator> {
    let source = SearchSpanSource::new(SearchSourceOptions::from(&config.source))
        .context("failed to build trace backend client")?;
    Ok(BatchOrchestrator::from_config(Arc::new(source), &config.pipeline))
}

async fn run_serve(config: Config, http_port: Option<u16>, metrics_port: Option<u16>) -> anyhow::Result<()> {
    let http_port = http_port.unwrap_or(config.server.http_port);

    if let Some(port) = metrics_port.or(config.server.metrics_port) {
        let addr: SocketAddr = format!("{}:{port}", config.server.host)
            .parse()
            .with_context(|| format!("invalid metrics address for host {}", config.server.host))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!("Prometheus exporter listening on {}", addr);
    }

    let default_source = config.source.default_source();
    match &default_source {
        Some(source) => info!(endpoint = %source.endpoint, index = %source.index_pattern, "Default data source configured"),
        None => info!("No default data source; live runs need request headers"),
    }

    let orchestrator = Arc::new(build_orchestrator(&config)?);
    let server = HttpServer::new(orchestrator, default_source);

    info!("Starting TraceMetrics on HTTP:{}", http_port);
    server.serve(&format!("{}:{http_port}", config.server.host)).await?;

    Ok(())
}

async fn run_metrics(
    config: Config,
    run_ids: &[String],
    override_source: Option<DataSourceConfig>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(&config)?;
    let data_source = override_source.or_else(|| config.source.default_source());

    let report = orchestrator.run(run_ids, data_source.as_ref()).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }

    Ok(())
}

fn print_report(report: &BatchReport) {
    for run in &report.runs {
        match &run.outcome {
            RunOutcome::Success(summary) => {
                let cost = summary
                    .cost_usd
                    .map_or_else(|| "unpriced".to_string(), |c| format!("${c:.4}"));
                println!(
                    "{:<24} ok     tokens={:<8} cost={:<10} duration={:.0}ms llm={} tools={}",
                    run.run_id,
                    summary.total_tokens,
                    cost,
                    summary.duration_ms,
                    summary.llm_calls,
                    summary.tool_calls,
                );
            }
            RunOutcome::Error { message } => {
                println!("{:<24} error  {}", run.run_id, message);
            }
        }
    }

    let aggregate = &report.aggregate;
    println!();
    println!(
        "{} of {} runs succeeded",
        report.runs.len() - report.failed_count(),
        report.runs.len()
    );
    println!("Total tokens:   {}", aggregate.total_tokens);
    println!("Total cost:     ${:.4}", aggregate.total_cost_usd);
    if let Some(avg) = aggregate.avg_duration_ms {
        println!("Avg duration:   {avg:.0}ms");
    }
    println!("LLM calls:      {}", aggregate.total_llm_calls);
    println!("Tool calls:     {}", aggregate.total_tool_calls);
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "tracemetrics", &mut io::stdout());
}
