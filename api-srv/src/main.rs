use anyhow::{Context, Result};
use clap::Parser;
use keygate_api_srv::app::{Environment, build_router};
use keygate_api_srv::state::AppState;
use keygate_api_srv::telemetry::TelemetryGuardBuilder;
use keygate_auth::config::KeycloakConfig;
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[clap(name = "keygate api server")]
#[clap(about = "Claims API authenticated by a Keycloak realm", version)]
struct Cli {
    #[clap(long, default_value = "0.0.0.0:3000", env = "LISTEN_ENDPOINT_HTTP")]
    listen_endpoint_http: SocketAddr,

    /// API documentation is not served in production
    #[clap(long, value_enum, default_value_t = Environment::Development, env = "APP_ENVIRONMENT")]
    environment: Environment,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Ctrl+C was hit, shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry_guard = TelemetryGuardBuilder::default()
        .with_target_max_level("keygate_auth", LevelFilter::DEBUG)
        .build()?;
    let args = Cli::parse();

    let config = KeycloakConfig::from_env()
        .inspect_err(|e| error!("invalid configuration: {e}"))
        .context("loading identity provider configuration")?;
    info!("identity provider: {config:?}");

    let state = AppState::new(config).context("creating application state")?;
    let app = build_router(state, args.environment)?;

    let listener = tokio::net::TcpListener::bind(args.listen_endpoint_http)
        .await
        .with_context(|| format!("binding {}", args.listen_endpoint_http))?;
    info!(
        "Server running on {} environment={:?}",
        args.listen_endpoint_http, args.environment
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}
