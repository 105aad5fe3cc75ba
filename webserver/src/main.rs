//! WebServer entry point
//!
//! Reads configuration, builds the processing chain, serves HTTP and tears
//! the worker pool down once the server has drained.

use clap::Parser;
use pool::{CliRunner, FallbackOrchestrator, HttpRemoteProvider, ProcessPool, WorkerPool};
use shared::{logging, process_info, ProcessId};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

use webserver::{AppState, Config, SupabaseLedger, WebServer, WebServerError, WebServerResult};

#[derive(Parser, Debug)]
#[command(name = "webserver")]
#[command(about = "CV optimization HTTP service backed by a Python worker pool")]
struct Args {
    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port for HTTP server
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> WebServerResult<()> {
    let args = Args::parse();

    // Variables already set in the environment win over .env
    let _ = dotenvy::dotenv();

    ProcessId::init_webserver();
    logging::init_tracing(Some(&args.log_level));

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|_| WebServerError::InvalidConfig {
            field: "host".to_string(),
            value: args.host.clone(),
        })?;

    let worker_pool = Arc::new(WorkerPool::new(config.worker_command()));
    let direct = Arc::new(CliRunner::new(config.cli_command(), config.temp_dir.clone()).with_timeout(config.python_timeout));
    let remote = Arc::new(HttpRemoteProvider::new(config.remote_url.clone())?);

    if config.enable_python_processing {
        worker_pool.initialize();
    } else {
        process_info!(ProcessId::current(), "🐍 Python processing disabled, requests go to the remote provider");
    }

    let ledger = match &config.supabase {
        Some(supabase) => Some(SupabaseLedger::new(supabase)?),
        None => None,
    };

    let orchestrator = FallbackOrchestrator::new(worker_pool.clone(), direct, remote);
    let mut state = AppState::new(config, orchestrator);
    if let Some(ledger) = ledger {
        state = state.with_ledger(Arc::new(ledger));
    }

    WebServer::new(state).run(addr, shutdown_signal()).await?;

    worker_pool.shutdown().await;
    logging::log_success(ProcessId::current(), "WebServer stopped gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            logging::log_error(ProcessId::current(), "Signal handling", &err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                logging::log_error(ProcessId::current(), "SIGTERM handler", &err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => logging::log_shutdown(ProcessId::current(), "Received Ctrl+C signal"),
        _ = terminate => logging::log_shutdown(ProcessId::current(), "Received SIGTERM"),
    }
}
