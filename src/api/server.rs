//! API Server
//!
//! Wires configuration, store, directory collaborators and the dispatcher
//! into an axum application.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::config::WalletConfig;
use crate::directory::{AccountDirectory, SessionOracle};
use crate::dispatcher::{DispatchSettings, RequestDispatcher};
use crate::engine::{EngineSettings, TransactionEngine};
use crate::errors::{WalletError, WalletResult};
use crate::metrics::ProtocolMetrics;
use crate::signature::SignatureCodec;
use crate::store::WalletStore;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Assemble the engine and dispatcher described by `config`
pub fn build_dispatcher(
    config: &WalletConfig,
    store: Arc<dyn WalletStore>,
    sessions: Arc<dyn SessionOracle>,
    accounts: Arc<dyn AccountDirectory>,
) -> WalletResult<Arc<RequestDispatcher>> {
    let policy = config
        .signature_policy()
        .map_err(crate::errors::ConfigurationError::from)?;

    let engine = Arc::new(TransactionEngine::new(
        store,
        sessions,
        accounts,
        EngineSettings {
            default_api_version: config.provider.api_version.clone(),
        },
    ));

    Ok(Arc::new(RequestDispatcher::new(
        engine,
        SignatureCodec::new(&config.provider.signature_secret),
        policy,
        DispatchSettings {
            verify_signatures: config.provider.signature_validation,
            max_batch_bets: config.server.max_batch_size,
            default_api_version: config.provider.api_version.clone(),
        },
        ProtocolMetrics::new()?,
    )))
}

/// Install the global tracing subscriber; later calls are no-ops
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .try_init();
}

pub struct ApiServer {
    config: WalletConfig,
    dispatcher: Arc<RequestDispatcher>,
}

impl ApiServer {
    pub fn new(config: WalletConfig, dispatcher: Arc<RequestDispatcher>) -> Self {
        Self { config, dispatcher }
    }

    /// Start the API server
    pub async fn run(self) -> WalletResult<()> {
        init_tracing(&self.config.monitoring.log_filter);

        info!("🚀 Starting Groove wallet server");
        if !self.config.provider.signature_validation {
            warn!("⚠️  Signature validation is DISABLED; every provider call is trusted");
        }

        self.run_http().await
    }

    async fn run_http(self) -> WalletResult<()> {
        let app = self.create_app();
        let addr = self.get_socket_addr()?;

        info!("🌐 Listening on http://{}", addr);
        self.log_server_info();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| WalletError::Server(format!("Failed to bind {}: {}", addr, e)))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| WalletError::Server(e.to_string()))?;

        info!("🛑 Server stopped gracefully");
        Ok(())
    }

    /// Router with the full middleware stack
    pub fn create_app(&self) -> axum::Router {
        let state = Arc::new(AppState {
            dispatcher: self.dispatcher.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            metrics_enabled: self.config.monitoring.enable_metrics,
        });

        create_router(state)
            .layer(axum::middleware::from_fn(request_id_middleware))
            .layer(create_cors_layer(self.config.server.allowed_origins.clone()))
            .layer(TimeoutLayer::new(self.config.request_timeout()))
            .layer(TraceLayer::new_for_http())
    }

    fn get_socket_addr(&self) -> WalletResult<SocketAddr> {
        let ip = self
            .config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| crate::errors::ConfigurationError::InvalidValue {
                field: "server.host".to_string(),
                value: self.config.server.host.clone(),
                reason: e.to_string(),
            })?;
        Ok(SocketAddr::from((ip, self.config.server.port)))
    }

    fn log_server_info(&self) {
        info!("📋 Server Configuration:");
        info!("   API version: {}", self.config.provider.api_version);
        info!("   Storage: {:?}", self.config.storage.backend);
        info!("   Default currency: {}", self.config.ledger.default_currency);
        info!("   CORS: {:?}", self.config.server.allowed_origins);
        info!("   Request timeout: {}s", self.config.server.request_timeout_secs);
        info!("   Max batch size: {}", self.config.server.max_batch_size);
        info!("   Metrics enabled: {}", self.config.monitoring.enable_metrics);

        info!("📊 Available endpoints:");
        info!("   GET  /groove          - Provider calls");
        info!("   POST /groove          - Batch wagers");
        info!("   GET  /health          - Health check");
        info!("   GET  /metrics         - Prometheus metrics");
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
