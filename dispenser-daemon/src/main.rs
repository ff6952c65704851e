mod runner;

use dispenser_core::config::{self, AppConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// --- 1. 选择后端实现 ---
// 两个特性同时开启时优先使用模拟后端（本地开发）

#[cfg(feature = "backend_mock")]
fn get_backend() -> Arc<dispenser_core::backends::mock::MockBackend> {
    tracing::info!("🚀 Using Mock Backend");
    Arc::new(dispenser_core::backends::mock::MockBackend::new())
}

#[cfg(all(feature = "backend_nmcli", not(feature = "backend_mock")))]
fn get_backend() -> Arc<dispenser_core::backends::nmcli::NmcliBackend> {
    tracing::info!("🚀 Using nmcli Backend");
    Arc::new(dispenser_core::backends::nmcli::NmcliBackend::new())
}

// 如果没有选择任何后端，编译失败
#[cfg(not(any(feature = "backend_mock", feature = "backend_nmcli")))]
compile_error!(
    "No backend feature selected. Please choose one, e.g., --features dispenser-daemon/backend_nmcli"
);

// --- 2. 加载配置 ---
fn load_config() -> anyhow::Result<AppConfig> {
    match std::env::var("DISPENSER_CONFIG") {
        Ok(path) => {
            tracing::info!("📄 Loading configuration from {}", path);
            let raw = std::fs::read_to_string(&path)?;
            Ok(config::load_config_from_toml_str(&raw)?)
        }
        Err(_) => {
            tracing::info!("📄 Using built-in configuration");
            Ok(config::default_config()?)
        }
    }
}

// --- 3. 启动服务器 ---
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match load_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("❌ Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("👋 Shutdown requested");
                signal_token.cancel();
            }
            Err(e) => tracing::warn!("⚠️ Unable to listen for shutdown signal: {}", e),
        }
    });

    if let Err(e) = runner::run_provisioning_server(get_backend(), config, shutdown).await {
        tracing::error!("❌ Provisioning server failed: {}", e);
        std::process::exit(1);
    }
}
