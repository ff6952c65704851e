use dispenser_core::{
    config::AppConfig,
    factory,
    traits::HostBackend,
    web_server::{self, AppState},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Wires the host backend into the core services and serves the HTTP API
/// until `shutdown` is cancelled.
pub async fn run_provisioning_server<B>(
    backend: Arc<B>,
    config: AppConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()>
where
    B: HostBackend + 'static,
{
    let registration = factory::build_registration_backend(&config)?;
    let services = factory::build_services(backend, registration, &config);

    tracing::info!("📡 Runner: Starting provisioning server...");
    let state = Arc::new(AppState { services, shutdown });
    web_server::start_web_server(state, config.server.bind_addr).await?;
    Ok(())
}
