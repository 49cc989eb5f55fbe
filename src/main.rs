// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use token_gate_server::{
    api::router,
    build_app,
    config::{AppConfig, SecretSource, JWT_SECRET_ENV, LOG_FORMAT_ENV},
    telemetry::{init_tracing, LogFormat},
    StartupError,
};

#[tokio::main]
async fn main() -> ExitCode {
    let log_format = std::env::var(LOG_FORMAT_ENV)
        .map(|v| LogFormat::from_str(&v))
        .unwrap_or_default();
    init_tracing(log_format);

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    if config.secret_source == SecretSource::Generated {
        warn!(
            "{JWT_SECRET_ENV} is not set; using a random per-process secret. \
             Tokens will not survive a restart or verify on other instances."
        );
    }

    let app = build_app(&config).await?;
    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(app.sweeper.run(shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        issuer = %config.issuer,
        access_ttl_secs = config.access_ttl.as_secs(),
        "Token gate listening (docs at /docs)"
    );

    let signal = shutdown.clone();
    axum::serve(listener, router(app.state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "Sweeper task ended abnormally");
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
