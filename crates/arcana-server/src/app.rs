//! Application builder: assembles a `Runtime` from configuration and starts
//! the background components and admin HTTP surface appropriate to the
//! requested role.

use crate::cli::Role;
use arcana_core::ArcanaResult;
use arcana_jobs::{metrics::register_metrics, JobsConfig, Reaper, Runtime, Scheduler, WorkerPool};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing::info;

/// Builds the runtime for one process and runs it until shutdown.
pub struct AppBuilder {
    config: Option<JobsConfig>,
    role: Role,
}

impl AppBuilder {
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self { config: None, role }
    }

    #[must_use]
    pub fn with_config(mut self, config: JobsConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Connects to the store, starts the scheduler and reaper (and the
    /// worker pool, for `worker`/`all`), then serves the admin HTTP surface
    /// until a shutdown signal arrives.
    pub async fn run(self) -> ArcanaResult<()> {
        let config = self.config.unwrap_or_default();
        register_metrics();
        let metrics_handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| arcana_core::ArcanaError::Internal(format!("failed to install metrics recorder: {e}")))?;

        let runtime = Arc::new(Runtime::connect(config).await?);
        let bind_addr = runtime.config.admin.bind_addr.clone();

        let scheduler = Arc::new(runtime.scheduler());
        let reaper = Arc::new(runtime.reaper());
        let scheduler_task = spawn_scheduler(scheduler.clone());
        let reaper_task = spawn_reaper(reaper.clone());

        let worker_pool = matches!(self.role, Role::Worker | Role::All).then(|| Arc::new(runtime.worker_pool()));
        let worker_task = worker_pool.clone().map(spawn_worker_pool);

        let admin_state = arcana_admin::AppState::new(runtime.clone(), metrics_handle);
        let router = arcana_admin::create_router(admin_state);

        info!(%bind_addr, role = ?role_name(self.role), "starting admin http surface");
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| arcana_core::ArcanaError::Internal(format!("failed to bind admin http surface on {bind_addr}: {e}")))?;
        crate::startup::print_startup_info(&bind_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(crate::startup::shutdown_signal())
            .await
            .map_err(|e| arcana_core::ArcanaError::Internal(format!("admin http server error: {e}")))?;

        info!("shutting down background components");
        scheduler.stop();
        reaper.stop();
        if let Some(pool) = &worker_pool {
            pool.stop();
        }

        let _ = scheduler_task.await;
        let _ = reaper_task.await;
        if let Some(task) = worker_task {
            let _ = task.await;
        }

        info!("shutdown complete");
        Ok(())
    }
}

fn spawn_scheduler(scheduler: Arc<Scheduler>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = scheduler.start().await {
            tracing::error!(error = %e, "scheduler exited with an error");
        }
    })
}

fn spawn_reaper(reaper: Arc<Reaper>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = reaper.start().await {
            tracing::error!(error = %e, "reaper exited with an error");
        }
    })
}

fn spawn_worker_pool(pool: Arc<WorkerPool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = pool.start().await {
            tracing::error!(error = %e, "worker pool exited with an error");
        }
    })
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::Worker => "worker",
        Role::Producer => "producer",
        Role::All => "all",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_no_config() {
        let builder = AppBuilder::new(Role::All);
        assert!(builder.config.is_none());
    }

    #[test]
    fn with_config_sets_the_config() {
        let builder = AppBuilder::new(Role::Worker).with_config(JobsConfig::default());
        assert!(builder.config.is_some());
    }
}
