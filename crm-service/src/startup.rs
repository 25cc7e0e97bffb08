//! Application startup and lifecycle management.

use std::future::Future;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{CrmConfig, StorageBackend};
use crate::handlers;
use crate::invoicing::{InvoiceService, InvoiceSettings};
use crate::services::{CustomerDirectory, Database, InvoiceStore, MemoryStore};

/// Storage the application is wired to.
#[derive(Clone)]
pub enum Storage {
    Postgres(Database),
    Memory(MemoryStore),
}

impl Storage {
    /// Open the configured backend; PostgreSQL is migrated before use.
    pub async fn connect(config: &CrmConfig) -> Result<Self, AppError> {
        match config.storage {
            StorageBackend::Postgres => {
                let db = Database::new(
                    &config.database.url,
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    AppError::DatabaseError(anyhow::Error::new(e))
                })?;

                db.run_migrations().await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to run database migrations");
                    AppError::DatabaseError(anyhow::Error::new(e))
                })?;

                Ok(Storage::Postgres(db))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Ok(Storage::Memory(MemoryStore::new()))
            }
        }
    }

    fn invoice_store(&self) -> Arc<dyn InvoiceStore> {
        match self {
            Storage::Postgres(db) => Arc::new(db.clone()),
            Storage::Memory(store) => Arc::new(store.clone()),
        }
    }

    fn customer_directory(&self) -> Arc<dyn CustomerDirectory> {
        match self {
            Storage::Postgres(db) => Arc::new(db.clone()),
            Storage::Memory(store) => Arc::new(store.clone()),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub invoices: InvoiceService,
    pub store: Arc<dyn InvoiceStore>,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: CrmConfig) -> Result<Self, AppError> {
        let storage = Storage::connect(&config).await?;
        Self::build_with_storage(config, storage).await
    }

    /// Build on top of already opened storage (port 0 = random port for testing).
    pub async fn build_with_storage(config: CrmConfig, storage: Storage) -> Result<Self, AppError> {
        let store = storage.invoice_store();
        let invoices = InvoiceService::new(
            store.clone(),
            storage.customer_directory(),
            InvoiceSettings::from(&config.invoicing),
        );
        let state = AppState { invoices, store };

        let addr = config.common.bind_address();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(http_port = port, "CRM service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics_endpoint))
            .route(
                "/invoices",
                get(handlers::list_invoices).post(handlers::create_invoice),
            )
            .route("/invoices/calculate", post(handlers::calculate_line))
            .route("/invoices/:invoice_id", get(handlers::get_invoice))
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(metrics_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(state)
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.run_with_shutdown(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then let in-flight requests finish.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(
            service = "crm-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, Self::router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "HTTP server error");
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}
