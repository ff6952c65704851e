use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

// ============= 平台 =============

/// 运行环境的操作系统
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Android,
    Ios,
    Linux,
    Other,
}

/// 平台信息：操作系统 + 版本（Android 下为 API level）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    pub version: u32,
}

impl Platform {
    pub fn android(api_level: u32) -> Self {
        Self { os: Os::Android, version: api_level }
    }

    pub fn ios(version: u32) -> Self {
        Self { os: Os::Ios, version }
    }

    pub fn linux() -> Self {
        Self { os: Os::Linux, version: 0 }
    }

    pub fn is_android(&self) -> bool {
        self.os == Os::Android
    }
}

// ============= 网络连接状态 =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Unknown,
}

/// 操作系统报告的原始连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    pub is_connected: bool,
    /// `None` when the OS has not finished probing reachability.
    pub is_internet_reachable: Option<bool>,
    pub connection_type: ConnectionType,
}

/// 信号强度等级（dBm 划分）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalLevel {
    Excellent,
    Good,
    Fair,
    Weak,
}

impl SignalLevel {
    pub fn from_dbm(signal: i32) -> Self {
        if signal > -50 {
            SignalLevel::Excellent
        } else if signal > -60 {
            SignalLevel::Good
        } else if signal > -70 {
            SignalLevel::Fair
        } else {
            SignalLevel::Weak
        }
    }
}

/// Link details of the WiFi network the phone is currently joined to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionDetails {
    pub bssid: Option<String>,
    pub signal: i32,
    pub frequency_mhz: Option<u32>,
    pub signal_level: SignalLevel,
    /// `true` only when every value came from the native module.
    pub real_wifi: bool,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Connectivity summary assembled by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkInfo {
    pub is_connected: bool,
    pub is_internet_reachable: Option<bool>,
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
    pub ip_address: Option<Ipv4Addr>,
    pub ssid: Option<String>,
    pub connection_details: Option<ConnectionDetails>,
    pub native_wifi_available: bool,
}

// ============= WiFi 扫描 =============

/// 原生模块返回的单条扫描记录（字段名沿用原生库的大小写）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNetwork {
    #[serde(rename = "SSID", default)]
    pub ssid: String,
    #[serde(rename = "BSSID", default)]
    pub bssid: Option<String>,
    /// 信号强度 (dBm)
    #[serde(default)]
    pub level: Option<i32>,
    /// 频率 (MHz)
    #[serde(default)]
    pub frequency: Option<u32>,
    #[serde(default)]
    pub capabilities: Option<String>,
}

/// Represents a single Wi-Fi network found during a scan.
/// Wi-Fi 扫描时单个网络的具体信息。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Network {
    pub ssid: String,
    pub bssid: String,
    pub signal: i32, // 信号强度 (dBm)，越大越强
    pub frequency: u32,
    pub capabilities: String,
    pub security: String, // 无线网络安全性 "WPA3", "WPA2", "WPA", "WEP", "Open"
    pub secure: bool,
    pub level: SignalLevel,
    pub is_current: bool,
    pub seen_at: DateTime<Utc>,
}

// ============= 二维码 / 文本解析结果 =============

/// 凭据的来源解析器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    WifiQr,
    Plaintext,
    Fallback,
}

/// WiFi credentials recovered from a QR code or free text. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredential {
    pub ssid: String,
    pub password: String,
    pub security: String,
    pub hidden: bool,
    pub is_open: bool,
    pub parsed_from: CredentialSource,
}

/// 设备是如何被发现的
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    Manual,
    QrCode,
    Bluetooth,
    #[default]
    NetworkScan,
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiscoveryMethod::Manual => "manual",
            DiscoveryMethod::QrCode => "qr_code",
            DiscoveryMethod::Bluetooth => "bluetooth",
            DiscoveryMethod::NetworkScan => "network_scan",
        };
        f.write_str(s)
    }
}

/// A candidate device before registration.
///
/// Accepts the camelCase keys found in device QR payloads (`deviceType`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default, alias = "deviceType")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub services: Option<Vec<String>>,
    #[serde(default, alias = "discoveryMethod")]
    pub discovery_method: DiscoveryMethod,
}

impl DeviceDescriptor {
    pub fn has_identifier(&self) -> bool {
        [&self.ip, &self.hostname, &self.device_id]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}
