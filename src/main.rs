#![allow(dead_code)]

mod handler;
mod ids;
mod protocol;
mod rate_limit;
mod room;
mod routes;
mod services;
mod state;

use std::process::ExitCode;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::protocol::constants::{BUCKET_IDLE_SECONDS, GHOST_CURSOR_TIMEOUT_MS, HEARTBEAT_INTERVAL_MS};

const DEFAULT_PORT: u16 = 8080;

fn usage(program: &str) {
    println!("Usage: {program} [port]");
    println!("  port: Port number to listen on (default: {DEFAULT_PORT})");
}

/// Resolve the listen port: CLI arg > `PORT` env > default. A bad CLI arg
/// is fatal; a bad env value falls back to the default with a warning.
fn resolve_port(program: &str) -> Result<u16, ExitCode> {
    if let Some(arg) = std::env::args().nth(1) {
        if arg == "-h" || arg == "--help" {
            usage(program);
            return Err(ExitCode::SUCCESS);
        }
        return arg.parse().map_err(|_| {
            eprintln!("Invalid port number: {arg}");
            usage(program);
            ExitCode::FAILURE
        });
    }

    if let Ok(env_port) = std::env::var("PORT") {
        return Ok(env_port.parse().unwrap_or_else(|_| {
            eprintln!("Invalid PORT env: {env_port}, using {DEFAULT_PORT}");
            DEFAULT_PORT
        }));
    }

    Ok(DEFAULT_PORT)
}

/// Periodic housekeeping: flag ghost cursors and evict idle limiter
/// buckets. The room engine itself runs no timers.
fn spawn_maintenance_task(state: state::AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(HEARTBEAT_INTERVAL_MS));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            for room in state.rooms.rooms() {
                state
                    .rooms
                    .presence()
                    .mark_ghosts_inactive(&room, GHOST_CURSOR_TIMEOUT_MS);
            }
            let evicted = state.rooms.presence().cleanup_buckets(BUCKET_IDLE_SECONDS);
            if evicted > 0 {
                warn!(evicted, "evicted idle rate-limit buckets");
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> ExitCode {
    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "inkroom".to_owned());
    let port = match resolve_port(&program) {
        Ok(port) => port,
        Err(code) => return code,
    };

    tracing_subscriber::fmt::init();

    let state = state::AppState::new();
    let _maintenance = spawn_maintenance_task(state.clone());

    let app = routes::app(state);
    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %port, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(%port, "inkroom listening");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server failed");
        return ExitCode::FAILURE;
    }

    info!("server stopped");
    ExitCode::SUCCESS
}
