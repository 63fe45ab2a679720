use axum::{
    Json, Router,
    extract::{Path, State as AxumState},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use sysinfo::System;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

use super::types::{
    EnsurePluginResponse, HealthStatus, PluginRequest, ReleaseWorkerResponse, ServerError,
    Supervisor, SupervisorServer,
};
use crate::lib::worker::types::{HostStats, WorkerRecord};

#[derive(Clone)]
struct AppState {
    supervisor: Arc<Supervisor>,
    sysinfo: Arc<Mutex<System>>,
}

impl SupervisorServer {
    pub fn new(supervisor: Arc<Supervisor>, address: &str, port: u16) -> Self {
        Self {
            supervisor,
            address: address.to_string(),
            port,
        }
    }

    async fn ensure_plugin(
        AxumState(state): AxumState<AppState>,
        Json(request): Json<PluginRequest>,
    ) -> impl IntoResponse {
        info!(plugin_id = %request.plugin.id, "EnsurePlugin");
        let plugin_state = state.supervisor.ensure_plugin(&request.plugin.id).await;
        Json(EnsurePluginResponse::new(plugin_state))
    }

    async fn allocate_worker(
        AxumState(state): AxumState<AppState>,
        Json(request): Json<PluginRequest>,
    ) -> impl IntoResponse {
        info!(plugin_id = %request.plugin.id, "AllocateWorker");
        Json(state.supervisor.allocate_worker(&request.plugin.id).await)
    }

    async fn release_worker(
        AxumState(state): AxumState<AppState>,
        Path(id): Path<String>,
    ) -> impl IntoResponse {
        info!(worker_id = %id, "ReleaseWorker");
        state.supervisor.release(&id).await;
        Json(ReleaseWorkerResponse::default())
    }

    async fn health(AxumState(state): AxumState<AppState>) -> impl IntoResponse {
        let report = state.supervisor.health().await;
        let code = match report.status {
            HealthStatus::Ok => StatusCode::OK,
            HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
        };
        (code, Json(report))
    }

    async fn get_worker(
        AxumState(state): AxumState<AppState>,
        Path(id): Path<String>,
    ) -> impl IntoResponse {
        match state.supervisor.registry.get(&id).await {
            Some(worker) => (StatusCode::OK, Json(worker)).into_response(),
            None => (
                StatusCode::NOT_FOUND,
                format!("Worker with id {} not found", id),
            )
                .into_response(),
        }
    }

    async fn get_workers(AxumState(state): AxumState<AppState>) -> Json<Vec<WorkerRecord>> {
        Json(state.supervisor.registry.list().await)
    }

    async fn stats(AxumState(state): AxumState<AppState>) -> impl IntoResponse {
        let live_workers = state.supervisor.registry.live_count().await;
        let mut sysinfo = state.sysinfo.lock().await;
        sysinfo.refresh_cpu_usage();
        sysinfo.refresh_memory();
        Json(HostStats::collect(&sysinfo, live_workers))
    }

    fn router(&self) -> Router {
        let state = AppState {
            supervisor: self.supervisor.clone(),
            sysinfo: Arc::new(Mutex::new(System::new_all())),
        };

        Router::new()
            .route("/plugins/ensure", post(SupervisorServer::ensure_plugin))
            .route(
                "/workers",
                get(SupervisorServer::get_workers).post(SupervisorServer::allocate_worker),
            )
            .route(
                "/workers/{id}",
                get(SupervisorServer::get_worker).delete(SupervisorServer::release_worker),
            )
            .route("/health", get(SupervisorServer::health))
            .route("/stats", get(SupervisorServer::stats))
            .with_state(state)
    }

    /// Serve until `shutdown` resolves.
    pub async fn start_server(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let address = format!("{}:{}", self.address, self.port);
        let app = self.router();

        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;
        info!(%address, "runtime supervisor listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)
    }
}
