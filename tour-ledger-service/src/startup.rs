//! Application startup and lifecycle management.

use crate::config::{LedgerConfig, SalaryConfig, TourLedgerConfig};
use crate::handlers;
use crate::ledger::{
    AttachmentLedgerBinder, AttachmentLedgerUnbinder, ConfirmationCodeAllocator, InvoiceIndex,
    SalaryProfiles, ScheduleReconciler,
};
use crate::middleware::metrics_middleware;
use crate::services::{init_metrics, BlobStore, LedgerStore, LocalBlobStore, PgLedgerStore};
use crate::workers::SalaryScheduleWorker;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub binder: Arc<AttachmentLedgerBinder>,
    pub unbinder: Arc<AttachmentLedgerUnbinder>,
    pub reconciler: Arc<ScheduleReconciler>,
    pub allocator: Arc<ConfirmationCodeAllocator>,
    pub invoice_index: Arc<InvoiceIndex>,
    pub profiles: Arc<SalaryProfiles>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        blobs: Arc<dyn BlobStore>,
        ledger: &LedgerConfig,
        salary: &SalaryConfig,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            binder: Arc::new(AttachmentLedgerBinder::new(
                store.clone(),
                blobs.clone(),
                ledger.base_currency.clone(),
                ledger.allowed_currencies.clone(),
            )),
            unbinder: Arc::new(AttachmentLedgerUnbinder::new(store.clone(), blobs)),
            reconciler: Arc::new(ScheduleReconciler::new(store.clone())),
            allocator: Arc::new(ConfirmationCodeAllocator::new(store.clone())),
            invoice_index: Arc::new(InvoiceIndex::new(store.clone())),
            profiles: Arc::new(SalaryProfiles::new(
                store.clone(),
                ledger.allowed_currencies.clone(),
                salary.manager_roles.clone(),
            )),
            store,
            max_upload_bytes,
        }
    }
}

/// HTTP routes with the request-id, metrics and trace layers applied.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/bookings/:booking_id/attachments",
            post(handlers::upload_attachment).get(handlers::list_attachments),
        )
        .route(
            "/bookings/:booking_id/attachments/:attachment_id",
            delete(handlers::delete_attachment),
        )
        .route(
            "/bookings/:booking_id/invoice-amounts/rebuild",
            post(handlers::rebuild_invoice_amounts),
        )
        .route(
            "/bookings/:booking_id/confirmation-code",
            post(handlers::assign_confirmation_code),
        )
        .route(
            "/confirmation-codes/preview",
            get(handlers::preview_confirmation_code),
        )
        .route(
            "/salary-profiles",
            get(handlers::list_profiles).put(handlers::upsert_profile),
        )
        .route("/salary-profiles/reconcile", post(handlers::reconcile))
        .route(
            "/salary-profiles/:profile_id",
            delete(handlers::deactivate_profile),
        )
        .layer(DefaultBodyLimit::max(state.max_upload_bytes + 64 * 1024));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
    reconcile_worker: Option<SalaryScheduleWorker>,
    shutdown: CancellationToken,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: TourLedgerConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: TourLedgerConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(
        config: TourLedgerConfig,
        run_migrations: bool,
    ) -> Result<Self, AppError> {
        init_metrics();

        let db = PgLedgerStore::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let blobs = LocalBlobStore::new(&config.storage.local_path)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, path = %config.storage.local_path, "Failed to prepare blob storage");
                e
            })?;

        let store: Arc<dyn LedgerStore> = Arc::new(db);
        let state = AppState::new(
            store,
            Arc::new(blobs),
            &config.ledger,
            &config.salary,
            config.storage.max_upload_bytes,
        );

        let shutdown = CancellationToken::new();
        let reconcile_worker = match config.salary.reconcile_interval() {
            Some(interval) => Some(SalaryScheduleWorker::new(
                state.reconciler.clone(),
                interval,
                shutdown.child_token(),
            )),
            None => {
                tracing::info!("Salary schedule worker disabled by configuration");
                None
            }
        };

        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %http_addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(http_port = http_port, "Tour ledger service listener bound");

        Ok(Self {
            http_port,
            http_listener,
            state,
            reconcile_worker,
            shutdown,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Token that stops background workers when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        let worker_handle = self
            .reconcile_worker
            .map(|worker| tokio::spawn(worker.run()));

        tracing::info!(
            service = "tour-ledger-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        let shutdown = self.shutdown.clone();
        let result = axum::serve(self.http_listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;

        self.shutdown.cancel();
        if let Some(handle) = worker_handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Salary schedule worker ended abnormally");
            }
        }

        result.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
