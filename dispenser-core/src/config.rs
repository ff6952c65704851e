use serde::Deserialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// 内置的默认配置
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../configs.toml");

/// 顶层应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub permissions: PermissionConfig,
    pub registration: RegistrationConfig,
    pub server: ServerConfig,
}

/// 用于解析 TOML 的临时结构
#[derive(Deserialize)]
struct AppConfigFile {
    #[serde(default)]
    scanner: ScannerConfigToml,
    #[serde(default)]
    permissions: PermissionConfigToml,
    registration: RegistrationConfigToml,
    server: ServerConfigToml,
}

// ============= 扫描配置 =============

/// Retry, timeout and backoff bounds of the scan orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    pub max_scan_attempts: u32,
    pub scan_timeout: Duration,
    pub retry_backoff: Duration,
    pub ssid_attempts: u32,
    pub ssid_retry_delay: Duration,
    pub max_init_attempts: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfigToml::default().into()
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct ScannerConfigToml {
    max_scan_attempts: u32,
    scan_timeout_ms: u64,
    retry_backoff_ms: u64,
    ssid_attempts: u32,
    ssid_retry_delay_ms: u64,
    max_init_attempts: u32,
}

impl Default for ScannerConfigToml {
    fn default() -> Self {
        Self {
            max_scan_attempts: 3,
            scan_timeout_ms: 10_000,
            retry_backoff_ms: 1_500,
            ssid_attempts: 3,
            ssid_retry_delay_ms: 500,
            max_init_attempts: 3,
        }
    }
}

impl From<ScannerConfigToml> for ScannerConfig {
    fn from(t: ScannerConfigToml) -> Self {
        ScannerConfig {
            max_scan_attempts: t.max_scan_attempts,
            scan_timeout: Duration::from_millis(t.scan_timeout_ms),
            retry_backoff: Duration::from_millis(t.retry_backoff_ms),
            ssid_attempts: t.ssid_attempts,
            ssid_retry_delay: Duration::from_millis(t.ssid_retry_delay_ms),
            max_init_attempts: t.max_init_attempts,
        }
    }
}

// ============= 权限配置 =============

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionConfig {
    pub cache_ttl: Duration,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        PermissionConfigToml::default().into()
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct PermissionConfigToml {
    cache_ttl_ms: u64,
}

impl Default for PermissionConfigToml {
    fn default() -> Self {
        Self { cache_ttl_ms: 5_000 }
    }
}

impl From<PermissionConfigToml> for PermissionConfig {
    fn from(t: PermissionConfigToml) -> Self {
        PermissionConfig {
            cache_ttl: Duration::from_millis(t.cache_ttl_ms),
        }
    }
}

// ============= 注册后端配置 =============

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationConfig {
    /// 后端根地址，不含 `/device` 前缀
    pub api_url: String,
    pub request_timeout: Duration,
}

#[derive(Deserialize)]
struct RegistrationConfigToml {
    api_url: String,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

// ============= HTTP 服务配置 =============

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

#[derive(Deserialize)]
struct ServerConfigToml {
    bind_addr: String,
}

// ============= 配置加载函数 =============

/// 从 TOML 字符串加载应用配置
pub fn load_config_from_toml_str(s: &str) -> Result<AppConfig> {
    let parsed: AppConfigFile = toml::from_str(s)?;

    let bind_addr = SocketAddr::from_str(&parsed.server.bind_addr).map_err(|e| {
        Error::InvalidConfig(format!(
            "Invalid server.bind_addr '{}': {}",
            parsed.server.bind_addr, e
        ))
    })?;

    let api_url = parsed.registration.api_url.trim_end_matches('/').to_string();
    if api_url.is_empty() {
        return Err(Error::InvalidConfig("registration.api_url must not be empty".into()));
    }

    let scanner = ScannerConfig::from(parsed.scanner);
    if scanner.max_scan_attempts == 0 {
        return Err(Error::InvalidConfig("scanner.max_scan_attempts must be at least 1".into()));
    }

    Ok(AppConfig {
        scanner,
        permissions: parsed.permissions.into(),
        registration: RegistrationConfig {
            api_url,
            request_timeout: Duration::from_millis(parsed.registration.request_timeout_ms),
        },
        server: ServerConfig { bind_addr },
    })
}

/// 加载内置默认配置
pub fn default_config() -> Result<AppConfig> {
    load_config_from_toml_str(DEFAULT_CONFIG_TOML)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_match_scanner_bounds() {
        let config = default_config().unwrap();
        assert_eq!(config.scanner, ScannerConfig::default());
        assert_eq!(config.scanner.scan_timeout, Duration::from_secs(10));
        assert_eq!(config.scanner.retry_backoff, Duration::from_millis(1500));
        assert_eq!(config.permissions.cache_ttl, Duration::from_secs(5));
        assert_eq!(config.server.bind_addr.port(), 3000);
    }

    #[test]
    fn missing_tables_fall_back_to_defaults() {
        let config = load_config_from_toml_str(
            r#"
            [registration]
            api_url = "https://api.example.com/"

            [server]
            bind_addr = "0.0.0.0:8080"
            "#,
        )
        .unwrap();
        assert_eq!(config.scanner.max_scan_attempts, 3);
        assert_eq!(config.registration.api_url, "https://api.example.com");
    }

    #[test]
    fn rejects_bad_bind_addr() {
        let err = load_config_from_toml_str(
            r#"
            [registration]
            api_url = "http://x"
            [server]
            bind_addr = "not-an-addr"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
