use crate::config::AppConfig;
use crate::flow::ProvisioningFlow;
use crate::loader::NativeModuleLoader;
use crate::permissions::PermissionGate;
use crate::registration::Registrar;
use crate::registration::http::HttpRegistrationBackend;
use crate::scanner::WifiScanner;
use crate::traits::{HostBackend, RegistrationBackend, SettingsLauncher};
use std::sync::Arc;

/// Everything the HTTP surface needs, wired to one host backend.
#[derive(Clone)]
pub struct Services {
    pub scanner: Arc<WifiScanner>,
    pub registrar: Arc<Registrar>,
    pub flow: Arc<ProvisioningFlow>,
    pub settings: Arc<dyn SettingsLauncher>,
}

/// Builds the scanner for a host: permission gate, module loader (with its
/// first load attempt already made) and the orchestrator itself.
pub fn build_scanner<B: HostBackend + 'static>(backend: Arc<B>, config: &AppConfig) -> WifiScanner {
    let platform = backend.platform();
    tracing::info!("🧩 Host platform: {:?} {}", platform.os, platform.version);

    let permissions = Arc::new(PermissionGate::new(
        platform,
        backend.clone(),
        config.permissions.cache_ttl,
    ));

    let loader = Arc::new(NativeModuleLoader::new(
        backend.clone(),
        config.scanner.max_init_attempts,
    ));
    if !loader.initialize() {
        tracing::warn!("⚠️ Native WiFi module not available, scanning will retry on demand");
    }

    WifiScanner::new(platform, backend, permissions, loader, config.scanner.clone())
}

/// 创建 HTTP 注册后端
pub fn build_registration_backend(
    config: &AppConfig,
) -> crate::Result<Arc<dyn RegistrationBackend>> {
    tracing::info!("🌐 Registration API: {}", config.registration.api_url);
    Ok(Arc::new(HttpRegistrationBackend::new(&config.registration)?))
}

pub fn build_services<B: HostBackend + 'static>(
    backend: Arc<B>,
    registration: Arc<dyn RegistrationBackend>,
    config: &AppConfig,
) -> Services {
    let scanner = Arc::new(build_scanner(backend.clone(), config));
    let registrar = Arc::new(Registrar::new(registration));
    let flow = Arc::new(ProvisioningFlow::new(scanner.clone(), registrar.clone()));
    Services {
        scanner,
        registrar,
        flow,
        settings: backend,
    }
}
