// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use processing_broker::broker::{build_router, Collaborators, ProcessingBroker};
use processing_broker::channel::{NatsChannel, RetryPolicy};
use processing_broker::config::consts::{DEFAULT_STREAM_NAME, WORKER_PASSWORD_ENV};
use processing_broker::config::{load_raw_config, BrokerConfig, ProcessorMap, ResourceSearchPath};
use processing_broker::errors::ConfigError;
use processing_broker::observability::messages::broker::{HttpListening, ShutdownIncomplete};
use processing_broker::observability::messages::validation::{ConfigProblem, ConfigValidated};
use processing_broker::observability::messages::StructuredLog;
use processing_broker::worker::ProcessingWorker;

#[derive(Parser)]
#[command(name = "processing-broker")]
#[command(about = "Deploys OCR-D processing agents and orchestrates jobs and workflows", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the configured agents and serve the HTTP API
    Serve {
        /// Broker configuration (YAML, or TOML by extension)
        #[arg(short, long)]
        config: PathBuf,

        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },

    /// Check a configuration file and list every problem
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Run a processing worker for one or more processors
    Worker {
        /// Processor to serve; repeat for several
        #[arg(long = "processor", required = true)]
        processors: Vec<String>,

        #[arg(long)]
        queue_url: String,

        #[arg(long, default_value = "admin")]
        username: String,

        #[arg(long, env = WORKER_PASSWORD_ENV, hide_env_values = true)]
        password: String,

        #[arg(long, default_value = DEFAULT_STREAM_NAME)]
        stream: String,

        /// Directory job logs are written to
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { config, host, port } => serve(config, &host, port).await,
        Commands::Validate { config } => validate(config),
        Commands::Worker {
            processors,
            queue_url,
            username,
            password,
            stream,
            log_dir,
        } => worker(processors, &queue_url, &username, &password, &stream, log_dir).await,
    }
}

async fn serve(config: PathBuf, host: &str, port: u16) -> Result<()> {
    let raw = load_raw_config(&config)?;
    let broker = ProcessingBroker::start(raw, Collaborators::production(ResourceSearchPath::from_env()))
        .await
        .context("processing broker failed to start")?;
    let broker = Arc::new(broker);

    let address = format!("{}:{}", host, port);
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(error) => {
            if let Err(teardown) = broker.shutdown().await {
                ShutdownIncomplete { error: &teardown }.log();
            }
            return Err(error).with_context(|| format!("cannot listen on {}", address));
        }
    };
    HttpListening { address: &address }.log();

    let served = axum::serve(listener, build_router(broker.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Best effort: leftover agents are reported, the exit status stays clean.
    if let Err(error) = broker.shutdown().await {
        ShutdownIncomplete { error: &error }.log();
    }
    served.context("HTTP server failed")
}

fn validate(config: PathBuf) -> Result<()> {
    let source = config.display().to_string();
    let raw = load_raw_config(&config)?;

    match BrokerConfig::from_value(raw) {
        Ok(_) => {
            ConfigValidated { source: &source, problems: 0 }.log();
            Ok(())
        }
        Err(ConfigError::Validation(problems)) => {
            for problem in &problems {
                ConfigProblem { problem }.log();
            }
            ConfigValidated { source: &source, problems: problems.len() }.log();
            anyhow::bail!("{} is not a valid configuration", source)
        }
        Err(error) => Err(error.into()),
    }
}

async fn worker(
    processors: Vec<String>,
    queue_url: &str,
    username: &str,
    password: &str,
    stream: &str,
    log_dir: Option<PathBuf>,
) -> Result<()> {
    if let Some(dir) = &log_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    }

    let channel = NatsChannel::connect(queue_url, username, password, stream, RetryPolicy::default())
        .await
        .with_context(|| format!("cannot connect to {}", queue_url))?;
    let worker = ProcessingWorker::new(Arc::new(channel), ProcessorMap::from_names(processors.as_slice()));
    worker.run_until(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
