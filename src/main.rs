//! palisade: a multi-provider AI inference gateway.
//!
//! Accepts OpenAI-compatible chat completion requests, terminates client
//! authentication, and routes each request across the configured upstream
//! backends with per-provider translation, signing and fallback.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

mod api_types;
mod auth;
mod config;
mod context;
mod error;
mod jobs;
mod middleware;
mod observability;
mod providers;
mod router;
mod routes;
mod transport;

#[cfg(test)]
mod tests;

use auth::{Authenticator, CredentialStore};
use config::GatewayConfig;
use jobs::provider_health::HealthMonitor;
use middleware::RateLimiter;
use providers::{AdapterSet, ProviderSecrets};
use router::Router as ModelRouter;
use transport::Transport;

#[derive(Parser)]
#[command(name = "palisade", version, about = "Multi-provider AI inference gateway")]
struct Cli {
    /// Path to the gateway configuration file.
    #[arg(short, long, default_value = "palisade.toml")]
    config: PathBuf,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway (default).
    Serve {
        /// Override the configured listen port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Enroll a new principal and print its credential exactly once.
    Enroll {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Credential lifetime in days; unset means no expiry.
        #[arg(long)]
        lifetime_days: Option<u64>,
    },
    /// Enroll a TOTP second factor for an existing principal.
    EnrollTwoFactor {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        account_name: String,
    },
    /// Deactivate a principal and revoke its sessions.
    Deactivate {
        #[arg(long)]
        user_id: i64,
    },
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub authenticator: Arc<Authenticator>,
    pub model_router: Arc<ModelRouter>,
    pub adapters: AdapterSet,
    pub transport: Arc<Transport>,
    pub health: Arc<HealthMonitor>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire every subsystem up from configuration and environment.
    pub async fn from_config(
        config: GatewayConfig,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let secrets = ProviderSecrets::from_env();
        let adapters = AdapterSet::from_config(&config.providers, &secrets)?;
        let transport = Arc::new(Transport::from_config(&config.providers)?);
        let model_router = Arc::new(ModelRouter::from_config(&config)?);

        let store = Arc::new(
            CredentialStore::connect(&config.auth.database_path, config.auth.verify_concurrency)
                .await?,
        );
        let authenticator = Arc::new(Authenticator::new(
            store,
            config.auth.require_two_factor,
            Duration::from_secs(config.auth.session_lifetime_secs),
        ));

        let health = Arc::new(HealthMonitor::new(config.health.failure_threshold));
        let rate_limiter = Arc::new(RateLimiter::new(&config.limits.rate_limit));

        Ok(Self {
            config: Arc::new(config),
            authenticator,
            model_router,
            adapters,
            transport,
            health,
            rate_limiter,
            metrics_handle,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    observability::tracing_init::init(cli.json_logs);

    let config = GatewayConfig::load(&cli.config)?;

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(config, port).await,
        Command::Enroll {
            name,
            email,
            description,
            lifetime_days,
        } => {
            let store =
                CredentialStore::connect(&config.auth.database_path, config.auth.verify_concurrency)
                    .await?;
            let lifetime = lifetime_days.map(|d| Duration::from_secs(d * 24 * 60 * 60));
            let (principal, credential) = store
                .enroll(&name, email.as_deref(), description.as_deref(), lifetime)
                .await?;
            println!("Enrolled principal {} ({})", principal.id, principal.name);
            println!("Credential (shown once, store it now): {}", credential);
            Ok(())
        }
        Command::EnrollTwoFactor {
            user_id,
            account_name,
        } => {
            let store =
                CredentialStore::connect(&config.auth.database_path, config.auth.verify_concurrency)
                    .await?;
            let enrollment = store
                .enroll_two_factor(user_id, &account_name, "palisade")
                .await?;
            println!("Secret: {}", enrollment.secret_base32);
            println!("Provisioning URI: {}", enrollment.provisioning_uri);
            println!("Backup codes (single use):");
            for code in &enrollment.backup_codes {
                println!("  {}", code);
            }
            Ok(())
        }
        Command::Deactivate { user_id } => {
            let store =
                CredentialStore::connect(&config.auth.database_path, config.auth.verify_concurrency)
                    .await?;
            store.deactivate(user_id).await?;
            let revoked = store.revoke_all_sessions(user_id).await?;
            println!("Deactivated principal {} ({} sessions revoked)", user_id, revoked);
            Ok(())
        }
    }
}

async fn serve(mut config: GatewayConfig, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port {
        config.server.port = port;
    }

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;
    let state = AppState::from_config(config, Some(metrics_handle)).await?;

    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();

    tracker.spawn(jobs::provider_health::run(
        state.health.clone(),
        state.adapters.clone(),
        state.transport.clone(),
        Duration::from_secs(state.config.health.interval_secs),
        shutdown.clone(),
    ));
    tracker.spawn(jobs::session_sweep::run(
        state.authenticator.store().clone(),
        Duration::from_secs(state.config.auth.sweep_interval_secs),
        Duration::from_secs(state.config.auth.sweep_grace_secs),
        shutdown.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()?;
    let app = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "palisade listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

    // Server loop is done; stop the background jobs and wait for them.
    shutdown.cancel();
    tracker.close();
    tracker.wait().await;
    tracing::info!("palisade stopped");

    Ok(())
}

/// Resolve on SIGINT or SIGTERM, cancelling the shared shutdown token so
/// background jobs exit alongside the server.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
    shutdown.cancel();
}
