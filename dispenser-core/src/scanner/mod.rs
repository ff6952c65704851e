//! WiFi scan orchestrator.
//!
//! One scan runs `connectivity → native module → permissions → native scan`
//! with a bounded number of attempts, a timeout per attempt and a fixed
//! backoff between attempts. Every expected failure comes back as a
//! [`ScanFailure`] with a suggestion for the operator.

pub mod processing;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::config::ScannerConfig;
use crate::loader::{NativeModuleLoader, ScannerCapability};
use crate::permissions::{PermissionGate, PermissionSnapshot};
use crate::structs::{
    ConnectionDetails, ConnectionType, DeviceDescriptor, Network, NetworkInfo, NetworkState,
    Platform, SignalLevel,
};
use crate::traits::{NetworkStatusProvider, WifiMethod, WifiModule};

const GENERIC_WIFI_SSID: &str = "Connected WiFi Network";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanFailureKind {
    ModuleUnavailable,
    MaxAttemptsReached,
    PermissionDenied,
    ScanFailed,
    NoNetworksFound,
    Cancelled,
    NotConnected,
    NotWifi,
    NoIpAddress,
    NetworkUnavailable,
}

/// Expected scan failure, ready to be shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{error}")]
pub struct ScanFailure {
    pub kind: ScanFailureKind,
    pub error: String,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_error: Option<String>,
    pub can_open_settings: bool,
}

impl ScanFailure {
    fn new(kind: ScanFailureKind, error: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            kind,
            error: error.into(),
            suggestion: suggestion.into(),
            scan_attempts: None,
            last_error: None,
            permission_error: None,
            can_open_settings: false,
        }
    }

    fn cancelled(attempts: u32) -> Self {
        Self {
            scan_attempts: Some(attempts),
            ..Self::new(
                ScanFailureKind::Cancelled,
                "WiFi scan cancelled",
                "Start the scan again when ready",
            )
        }
    }
}

/// Successful WiFi scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WifiScan {
    pub networks: Vec<Network>,
    pub current_network: Option<NetworkInfo>,
    pub scan_time: DateTime<Utc>,
    pub method: &'static str,
    pub real_wifi: bool,
    pub total_found: usize,
    pub scan_attempts: u32,
}

/// Result of the device-on-network scan. Discovery itself is not implemented,
/// so `devices` is always empty and `real_network_scan` is `false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceScan {
    pub devices: Vec<DeviceDescriptor>,
    pub relevant_devices: Vec<DeviceDescriptor>,
    pub total_found: usize,
    pub relevant_found: usize,
    pub network_info: NetworkInfo,
    pub subnet: String,
    pub current_ip: Ipv4Addr,
    pub scan_time: DateTime<Utc>,
    pub real_network_scan: bool,
    pub scan_method: &'static str,
    pub note: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedPermissions {
    pub cached: bool,
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub can_scan_networks: bool,
    pub can_connect_to_wifi: bool,
    pub can_scan_devices: bool,
    pub can_open_settings: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannerStatus {
    #[serde(flatten)]
    pub capability: ScannerCapability,
    pub platform: Platform,
    pub permissions: CachedPermissions,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedNetworkStatus {
    pub network_info: Option<NetworkInfo>,
    pub scanner_status: ScannerStatus,
    pub permissions: PermissionSnapshot,
    pub device_scan: Option<DeviceScan>,
    pub timestamp: DateTime<Utc>,
    pub is_connected: bool,
    pub is_internet_reachable: bool,
    pub is_airplane_mode_enabled: bool,
    pub can_scan_wifi: bool,
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
    pub ssid: Option<String>,
}

/// 单项诊断的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Probe<T> {
    Passed { value: T },
    Failed { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MethodCheck {
    pub method: WifiMethod,
    pub available: bool,
}

/// Snapshot of the native module and the link, for troubleshooting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleDiagnostics {
    pub platform: Platform,
    #[serde(flatten)]
    pub capability: ScannerCapability,
    /// Empty when no module is loaded.
    pub method_availability: Vec<MethodCheck>,
    /// Only probed when a module is loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi_info: Option<Probe<Option<String>>>,
    pub network_state: Probe<NetworkState>,
    pub errors: Vec<String>,
}

/// Owns everything a scan needs; nothing here is process-global.
pub struct WifiScanner {
    platform: Platform,
    network: Arc<dyn NetworkStatusProvider>,
    permissions: Arc<PermissionGate>,
    loader: Arc<NativeModuleLoader>,
    config: ScannerConfig,
}

impl WifiScanner {
    pub fn new(
        platform: Platform,
        network: Arc<dyn NetworkStatusProvider>,
        permissions: Arc<PermissionGate>,
        loader: Arc<NativeModuleLoader>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            platform,
            network,
            permissions,
            loader,
            config,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn permissions(&self) -> &Arc<PermissionGate> {
        &self.permissions
    }

    pub fn loader(&self) -> &Arc<NativeModuleLoader> {
        &self.loader
    }

    /// Scans for nearby WiFi networks.
    pub async fn scan_wifi_networks(
        &self,
        cancel: &CancellationToken,
    ) -> Result<WifiScan, ScanFailure> {
        tracing::info!("📡 Starting WiFi network scan...");

        let network_info = match self.current_network_info().await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!("⚠️ Could not read current network info: {}", e);
                None
            }
        };

        let module = self.ensure_module()?;
        self.ensure_permissions().await?;

        let current_ssid = network_info.as_ref().and_then(|n| n.ssid.clone());
        let max_attempts = self.config.max_scan_attempts;
        let mut last_error: Option<String> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tracing::debug!("⏱️ Waiting {:?} before retry...", self.config.retry_backoff);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ScanFailure::cancelled(attempt - 1)),
                    _ = sleep(self.config.retry_backoff) => {}
                }
            }

            tracing::info!("🔍 Scan attempt {}/{}", attempt, max_attempts);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ScanFailure::cancelled(attempt)),
                r = timeout(self.config.scan_timeout, module.load_wifi_list()) => r,
            };

            let failure = match outcome {
                Ok(Ok(raw)) => {
                    tracing::info!("Found {} networks in scan attempt {}", raw.len(), attempt);
                    let networks =
                        processing::process_scan(raw, current_ssid.as_deref(), Utc::now());
                    if !networks.is_empty() {
                        tracing::info!("✅ Processed {} unique networks", networks.len());
                        return Ok(WifiScan {
                            total_found: networks.len(),
                            networks,
                            current_network: network_info,
                            scan_time: Utc::now(),
                            method: "native_module",
                            real_wifi: true,
                            scan_attempts: attempt,
                        });
                    }
                    tracing::info!("⚠️ Scan attempt {} returned no networks", attempt);
                    last_error = Some(format!("No networks found in attempt {}", attempt));
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!(
                    "WiFi scan timed out after {} seconds",
                    self.config.scan_timeout.as_secs()
                ),
            };

            tracing::error!("WiFi scan attempt {} error: {}", attempt, failure);
            if attempt >= max_attempts {
                tracing::error!("❌ All native scan attempts failed");
                return Err(ScanFailure {
                    scan_attempts: Some(attempt),
                    last_error: Some(failure.clone()),
                    ..ScanFailure::new(
                        ScanFailureKind::ScanFailed,
                        format!("WiFi scan failed after multiple attempts: {}", failure),
                        "Please check if WiFi is enabled and permissions are granted. Try turning WiFi off and on again.",
                    )
                });
            }
            last_error = Some(failure);
        }

        tracing::warn!("❌ All scan attempts completed but no networks found");
        Err(ScanFailure {
            scan_attempts: Some(max_attempts),
            last_error,
            ..ScanFailure::new(
                ScanFailureKind::NoNetworksFound,
                "No WiFi networks found after multiple scan attempts",
                "Please check if WiFi is enabled and other devices can see networks. Try restarting WiFi or moving closer to access points.",
            )
        })
    }

    /// 确保原生模块可用；不可用时直接失败，不做假扫描
    fn ensure_module(&self) -> Result<Arc<dyn WifiModule>, ScanFailure> {
        if let Some(module) = self.loader.module() {
            return Ok(module);
        }

        if self.loader.attempts_exhausted() {
            tracing::error!("❌ Max initialization attempts reached - cannot scan for networks");
            return Err(ScanFailure::new(
                ScanFailureKind::MaxAttemptsReached,
                "WiFi scanning not available - native module initialization failed after multiple attempts",
                "Please rebuild the app or check if the native WiFi module is properly installed",
            ));
        }

        if self.loader.retry() {
            if let Some(module) = self.loader.module() {
                tracing::info!("✅ WiFi module reinitialized successfully");
                return Ok(module);
            }
        }

        tracing::error!("❌ WiFi module reinitialization failed - cannot scan for networks");
        Err(ScanFailure::new(
            ScanFailureKind::ModuleUnavailable,
            "WiFi scanning not available - native module failed to initialize",
            "Please ensure the native WiFi module is properly installed and linked into the app build",
        ))
    }

    async fn ensure_permissions(&self) -> Result<(), ScanFailure> {
        if self.permissions.check().await.granted {
            tracing::debug!("✅ WiFi permissions already granted for scanning");
            return Ok(());
        }

        tracing::info!("🔐 WiFi permissions needed for scanning...");
        self.permissions.request().await.map(|_| ()).map_err(|denial| ScanFailure {
            permission_error: Some(denial.error),
            can_open_settings: true,
            ..ScanFailure::new(
                ScanFailureKind::PermissionDenied,
                "WiFi scanning requires location permissions",
                "Please grant location permissions in your device settings to scan for WiFi networks",
            )
        })
    }

    /// Connection type, IP address and, when on WiFi, SSID and link details.
    pub async fn current_network_info(&self) -> crate::Result<NetworkInfo> {
        let state = self.network.network_state().await?;
        let ip_address = self.network.ip_address().await?;
        let module = self.loader.module();

        let (ssid, details) = match (state.connection_type, module.as_ref()) {
            (ConnectionType::Wifi, Some(module)) => {
                let mut ssid = None;
                match self.native_details(&**module, &mut ssid).await {
                    Ok(details) => (ssid, Some(details)),
                    Err(e) => {
                        tracing::warn!("Could not get detailed WiFi info: {}", e);
                        let label =
                            ssid.unwrap_or_else(|| degraded_ssid(&e.to_string()).to_string());
                        let label = label.replace(['"', '\''], "").trim().to_string();
                        (
                            Some(label),
                            Some(ConnectionDetails {
                                bssid: None,
                                signal: -50,
                                frequency_mhz: None,
                                signal_level: SignalLevel::Good,
                                real_wifi: false,
                                fallback: false,
                                note: None,
                                error: Some(e.to_string()),
                            }),
                        )
                    }
                }
            }
            (ConnectionType::Wifi, None) => {
                tracing::info!("📶 Using fallback WiFi info (native module not available)");
                (
                    Some(GENERIC_WIFI_SSID.to_string()),
                    Some(ConnectionDetails {
                        bssid: None,
                        signal: -50,
                        frequency_mhz: Some(2400),
                        signal_level: SignalLevel::Good,
                        real_wifi: false,
                        fallback: true,
                        note: Some("Using fallback - limited WiFi details available".to_string()),
                        error: None,
                    }),
                )
            }
            _ => (None, None),
        };

        Ok(NetworkInfo {
            is_connected: state.is_connected,
            is_internet_reachable: state.is_internet_reachable,
            connection_type: state.connection_type,
            ip_address,
            ssid,
            connection_details: details,
            native_wifi_available: module.is_some(),
        })
    }

    /// 读取 SSID（有限次重试）以及 BSSID / 频率 / 信号
    async fn native_details(
        &self,
        module: &dyn WifiModule,
        ssid: &mut Option<String>,
    ) -> crate::Result<ConnectionDetails> {
        let attempts = self.config.ssid_attempts.max(1);
        for attempt in 1..=attempts {
            match module.current_ssid().await {
                Ok(Some(s)) if !s.trim().is_empty() => {
                    *ssid = Some(s);
                    break;
                }
                Ok(_) => tracing::debug!("📶 SSID attempt {}: empty", attempt),
                Err(e) => {
                    tracing::warn!("SSID retrieval attempt {} failed: {}", attempt, e);
                    if attempt >= attempts {
                        return Err(e);
                    }
                    sleep(self.config.ssid_retry_delay).await;
                }
            }
        }

        let frequency = module.frequency().await?;
        let signal = module.current_signal_strength().await?;
        let bssid = module.bssid().await?;

        Ok(ConnectionDetails {
            bssid,
            signal,
            frequency_mhz: frequency,
            signal_level: SignalLevel::from_dbm(signal),
            real_wifi: true,
            fallback: false,
            note: None,
            error: None,
        })
    }

    /// Stub: reports the /24 it would scan and returns no devices.
    pub async fn scan_local_devices(&self) -> Result<DeviceScan, ScanFailure> {
        let info = self.current_network_info().await.map_err(|e| {
            ScanFailure::new(
                ScanFailureKind::NetworkUnavailable,
                e.to_string(),
                "Try manual device entry or check network connection",
            )
        })?;

        if !info.is_connected {
            return Err(ScanFailure::new(
                ScanFailureKind::NotConnected,
                "Not connected to any network",
                "Please connect to a WiFi network first",
            ));
        }
        if info.connection_type != ConnectionType::Wifi {
            return Err(ScanFailure::new(
                ScanFailureKind::NotWifi,
                "Device scanning is only available on WiFi networks",
                "Please connect to a WiFi network to scan for devices",
            ));
        }
        let Some(ip) = info.ip_address else {
            return Err(ScanFailure::new(
                ScanFailureKind::NoIpAddress,
                "Could not determine network IP address",
                "Check your WiFi connection and try again",
            ));
        };

        let [a, b, c, _] = ip.octets();
        let subnet = format!("{}.{}.{}.0/24", a, b, c);
        tracing::info!("🔍 Would scan network {} for devices...", subnet);

        Ok(DeviceScan {
            devices: Vec::new(),
            relevant_devices: Vec::new(),
            total_found: 0,
            relevant_found: 0,
            network_info: info,
            subnet,
            current_ip: ip,
            scan_time: Utc::now(),
            real_network_scan: false,
            scan_method: "real_scan_not_available",
            note: "Real device scanning requires additional native modules. Please use manual IP entry to connect to devices.",
        })
    }

    /// Best effort: no link, no reachability and no IP address.
    pub async fn check_airplane_mode(&self) -> bool {
        let state = match self.network.network_state().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Could not detect airplane mode: {}", e);
                return false;
            }
        };
        if state.is_connected || state.is_internet_reachable == Some(true) {
            return false;
        }
        match self.network.ip_address().await {
            Ok(ip) => ip.is_none(),
            Err(_) => true,
        }
    }

    pub async fn status(&self) -> ScannerStatus {
        let capability = self.loader.status();
        let cached = self.permissions.cached_state().await;
        let native = capability.native_available;
        ScannerStatus {
            capability,
            platform: self.platform,
            permissions: CachedPermissions {
                cached: cached.is_some_and(|(granted, _)| granted),
                last_checked: cached.map(|(_, at)| at),
            },
            capabilities: Capabilities {
                can_scan_networks: native,
                can_connect_to_wifi: native,
                can_scan_devices: true,
                can_open_settings: true,
            },
        }
    }

    /// Reports what the loaded module offers and whether the host answers.
    /// Never spends a load attempt.
    pub async fn diagnose(&self) -> ModuleDiagnostics {
        tracing::info!("🧪 Starting WiFi module diagnostic test...");
        let capability = self.loader.status();
        let module = self.loader.module();
        let mut errors = Vec::new();

        if module.is_none() {
            if let Some(e) = capability.last_error.as_deref() {
                errors.push(format!("Module import failed: {}", e));
            }
        }

        let method_availability = module
            .as_ref()
            .map(|m| {
                let methods = m.methods();
                WifiMethod::REQUIRED
                    .iter()
                    .map(|&method| MethodCheck {
                        method,
                        available: methods.contains(&method),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let wifi_info = match module.as_ref() {
            Some(m) => Some(match m.current_ssid().await {
                Ok(ssid) => Probe::Passed { value: ssid },
                Err(e) => {
                    errors.push(format!("WiFi info retrieval failed: {}", e));
                    Probe::Failed { error: e.to_string() }
                }
            }),
            None => None,
        };

        let network_state = match self.network.network_state().await {
            Ok(state) => Probe::Passed { value: state },
            Err(e) => Probe::Failed { error: e.to_string() },
        };

        tracing::info!("🧪 WiFi module diagnostics completed ({} error(s))", errors.len());
        ModuleDiagnostics {
            platform: self.platform,
            capability,
            method_availability,
            wifi_info,
            network_state,
            errors,
        }
    }

    pub async fn detailed_network_status(&self) -> DetailedNetworkStatus {
        let network_info = match self.current_network_info().await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!("⚠️ Failed to get network info: {}", e);
                None
            }
        };
        let scanner_status = self.status().await;
        let permissions = self.permissions.check().await;
        let airplane = self.check_airplane_mode().await;

        let on_wifi = network_info
            .as_ref()
            .is_some_and(|n| n.is_connected && n.connection_type == ConnectionType::Wifi);
        let device_scan = if on_wifi {
            match self.scan_local_devices().await {
                Ok(scan) => Some(scan),
                Err(e) => {
                    tracing::warn!("Device scan failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let is_connected = network_info.as_ref().is_some_and(|n| n.is_connected);
        DetailedNetworkStatus {
            is_connected,
            is_internet_reachable: network_info
                .as_ref()
                .and_then(|n| n.is_internet_reachable)
                .unwrap_or(false),
            is_airplane_mode_enabled: airplane,
            can_scan_wifi: (permissions.granted || on_wifi) && is_connected && !airplane,
            connection_type: network_info
                .as_ref()
                .map(|n| n.connection_type)
                .unwrap_or(ConnectionType::Unknown),
            ssid: network_info.as_ref().and_then(|n| n.ssid.clone()),
            network_info,
            scanner_status,
            permissions,
            device_scan,
            timestamp: Utc::now(),
        }
    }
}

/// 原生调用失败时，根据错误信息给出一个可读的占位 SSID
fn degraded_ssid(error: &str) -> &'static str {
    if error.contains("permission") {
        "WiFi Network (Permission Required)"
    } else if error.contains("not found") {
        "WiFi Network (Not Available)"
    } else {
        GENERIC_WIFI_SSID
    }
}
