// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Accord Gateway
//!
//! Entry point for the `accord-node` binary. Parses CLI arguments,
//! initializes logging and metrics, reconciles the signing identity with the
//! ledger node, and serves the agreement API.
//!
//! The binary supports three subcommands:
//!
//! - `run`: start the gateway
//! - `status`: query a running gateway's status endpoint
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;

use accord_protocol::crypto::LedgerKeypair;
use accord_protocol::dispatch::Dispatcher;
use accord_protocol::identity::Identity;
use accord_protocol::ledger::{HttpLedgerClient, LedgerClient};

use cli::{AccordNodeCli, Commands};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AccordNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the gateway: reconciles with the node, then serves the API and
/// metrics listeners until a shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&args.log_format),
    );

    let keypair = LedgerKeypair::from_hex(&args.private_key)
        .context("failed to load signing key from ACCORD_PRIVATE_KEY")?;
    let address = keypair.address();

    tracing::info!(
        node_url = %args.node_url,
        %address,
        contract = %args.contract,
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        "starting accord-node"
    );

    // --- Ledger node ---
    let ledger = Arc::new(
        HttpLedgerClient::new(args.node_url.clone())
            .context("failed to build ledger client")?,
    );

    let node_chain_id = ledger
        .chain_id()
        .await
        .with_context(|| format!("ledger node at {} is unreachable", args.node_url))?;
    if let Some(configured) = args.chain_id {
        if configured != node_chain_id {
            bail!(
                "configured chain id {} does not match node chain id {}",
                configured,
                node_chain_id
            );
        }
    }

    let start_nonce = ledger
        .current_nonce(address)
        .await
        .context("failed to read pending nonce for signing identity")?;

    match ledger.balance(address).await {
        Ok(balance) if balance.is_zero() => {
            tracing::warn!(%address, "signing identity has zero balance; submissions will fail")
        }
        Ok(balance) => tracing::info!(%address, %balance, "signing identity balance"),
        Err(e) => tracing::warn!(error = %e, "could not read signing identity balance"),
    }

    tracing::info!(
        chain_id = node_chain_id,
        start_nonce,
        replay_protected = args.chain_id.is_some(),
        "ledger node reconciled"
    );

    // --- Dispatch core ---
    let identity = Identity::new(keypair, start_nonce);
    let dispatcher = Arc::new(Dispatcher::new(
        identity,
        ledger,
        args.dispatch_config(args.chain_id),
    ));

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());
    node_metrics.observe_sequencer(&dispatcher.status());

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            accord_protocol::config::PROTOCOL_VERSION,
        ),
        dispatcher,
        metrics: Arc::clone(&node_metrics),
        admin_token: args.admin_token.as_deref().map(Arc::from),
    };
    if app_state.admin_token.is_none() {
        tracing::warn!("no admin token configured; /admin routes are unauthenticated");
    }

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", args.host, args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("{}:{}", args.host, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    // In-flight requests finish before the process exits.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let api_server = axum::serve(api_listener, api_router)
        .with_graceful_shutdown(wait_for(shutdown_rx.clone()))
        .into_future();
    let metrics_server = axum::serve(metrics_listener, metrics_router)
        .with_graceful_shutdown(wait_for(shutdown_rx))
        .into_future();

    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received, draining connections");
        let _ = shutdown_tx.send(true);
    });

    let (api_result, metrics_result) = tokio::join!(api_server, metrics_server);
    api_result.context("API server error")?;
    metrics_result.context("metrics server error")?;

    tracing::info!("accord-node stopped");
    Ok(())
}

async fn wait_for(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Queries a running gateway's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.api_url.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("failed to reach {}", url))?;
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("status endpoint returned invalid JSON")?;

    if !status.is_success() {
        bail!("status endpoint returned {}: {}", status, body);
    }
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("accord-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", accord_protocol::config::PROTOCOL_VERSION);
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// If a handler cannot be installed that branch never resolves, leaving the
/// other one in charge.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
