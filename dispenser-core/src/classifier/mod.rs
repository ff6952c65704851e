//! QR / free-text classifier.
//!
//! A decoded QR string (or text typed by the operator) is run through a fixed
//! cascade of parsers; the first one that succeeds decides the payload type:
//!
//! 1. standard `WIFI:` QR codes
//! 2. unlabelled plain-text credentials (`"<ssid> <password>"`)
//! 3. device JSON with an `ip` or `hostname` key
//! 4. a dotted-quad IPv4 address
//! 5. any short, tame string, taken as an open network name
//!
//! Nothing here returns `crate::Error`: an unreadable code is an expected
//! outcome and comes back as a [`ClassifyError`] carrying a suggestion.

pub mod ipv4;
mod plaintext;
mod wifi_qr;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::structs::{CredentialSource, DeviceDescriptor, DiscoveryMethod, WifiCredential};

pub use plaintext::looks_like_credentials;

/// 失败时给用户的提示，列出所有支持的格式
pub const SUPPORTED_FORMATS_HINT: &str = "Make sure the QR code contains:\n\
    • WiFi network information (WIFI: format)\n\
    • Plain text WiFi credentials (NetworkName password)\n\
    • Device JSON with IP/hostname\n\
    • Plain IP address";

pub const DEFAULT_DEVICE_TYPE: &str = "Smart Device";

/// Successful classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ScanPayload {
    Wifi(WifiCredential),
    Device(DeviceDescriptor),
    Ip(DeviceDescriptor),
}

impl ScanPayload {
    pub fn scan_type(&self) -> ScanType {
        match self {
            ScanPayload::Wifi(_) => ScanType::Wifi,
            ScanPayload::Device(_) => ScanType::Device,
            ScanPayload::Ip(_) => ScanType::Ip,
        }
    }

    /// UI 下一步动作
    pub fn action(&self) -> &'static str {
        match self {
            ScanPayload::Wifi(_) => "connect_wifi",
            ScanPayload::Device(_) | ScanPayload::Ip(_) => "add_device",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ScanPayload::Wifi(w) if w.parsed_from == CredentialSource::Fallback => {
                format!("WiFi network detected (fallback): {}", w.ssid)
            }
            ScanPayload::Wifi(w) => format!("WiFi network detected: {}", w.ssid),
            ScanPayload::Device(d) => format!(
                "Device detected: {}",
                d.hostname.as_deref().or(d.ip.as_deref()).unwrap_or_default()
            ),
            ScanPayload::Ip(d) => {
                format!("IP address detected: {}", d.ip.as_deref().unwrap_or_default())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Wifi,
    Device,
    Ip,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("Invalid QR code data")]
    Empty,
    #[error("QR code format not recognized")]
    Unrecognized,
}

impl ClassifyError {
    pub fn suggestion(&self) -> &'static str {
        SUPPORTED_FORMATS_HINT
    }
}

/// Payload data as it appears in [`ScanResult::data`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScanData {
    Wifi(WifiCredential),
    Device(DeviceDescriptor),
}

/// Boundary shape handed to UI callers: `success` plus either the payload or
/// an error with a suggestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub success: bool,
    #[serde(rename = "type")]
    pub kind: ScanType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ScanData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<String>,
}

impl ScanResult {
    pub fn from_classification(raw: &str, result: Result<ScanPayload, ClassifyError>) -> Self {
        match result {
            Ok(payload) => {
                let kind = payload.scan_type();
                let action = Some(payload.action());
                let message = Some(payload.message());
                let data = match payload {
                    ScanPayload::Wifi(w) => ScanData::Wifi(w),
                    ScanPayload::Device(d) | ScanPayload::Ip(d) => ScanData::Device(d),
                };
                ScanResult {
                    success: true,
                    kind,
                    data: Some(data),
                    action,
                    message,
                    error: None,
                    suggestion: None,
                    raw_data: None,
                }
            }
            Err(e) => ScanResult {
                success: false,
                kind: ScanType::Unknown,
                data: None,
                action: None,
                message: None,
                error: Some(e.to_string()),
                suggestion: Some(e.suggestion()),
                raw_data: Some(raw.to_string()),
            },
        }
    }
}

/// 按固定优先级识别二维码 / 文本内容，第一个成功的解析器胜出
pub fn classify(raw: &str) -> Result<ScanPayload, ClassifyError> {
    if raw.is_empty() {
        tracing::warn!("❌ Empty QR code data");
        return Err(ClassifyError::Empty);
    }
    let data = raw.trim();
    tracing::debug!("🔍 Classifying QR data ({} chars)", data.len());

    // 1. 标准 WiFi 二维码
    if data.starts_with(wifi_qr::PREFIX) {
        match wifi_qr::parse(data) {
            Ok(wifi) => {
                tracing::info!("📶 Detected standard WiFi QR code: {}", wifi.ssid);
                return Ok(ScanPayload::Wifi(wifi));
            }
            Err(e) => tracing::info!("❌ WiFi QR code parsing failed: {}", e),
        }
    }

    // 2. 纯文本 WiFi 凭据
    if plaintext::looks_like_credentials(data) {
        let wifi = plaintext::parse(data);
        if !wifi.ssid.is_empty() {
            tracing::info!("📱 Detected plain text WiFi credentials: {}", wifi.ssid);
            return Ok(ScanPayload::Wifi(wifi));
        }
    }

    // 3. 设备 JSON
    if data.starts_with('{') && data.ends_with('}') {
        if let Some(device) = parse_device_json(data) {
            tracing::info!("📱 Detected device JSON");
            return Ok(ScanPayload::Device(device));
        }
    }

    // 4. 纯 IP 地址
    if ipv4::is_valid_ipv4(data) {
        tracing::info!("🌐 Detected IP address: {}", data);
        return Ok(ScanPayload::Ip(DeviceDescriptor {
            ip: Some(data.to_string()),
            hostname: Some(format!("Device-{}", ipv4::last_octet(data))),
            device_type: Some(DEFAULT_DEVICE_TYPE.to_string()),
            discovery_method: DiscoveryMethod::QrCode,
            ..Default::default()
        }));
    }

    // 5. 兜底：把合理的短文本当作开放网络名
    if looks_like_network_name(data) {
        tracing::info!("📱 Using fallback WiFi network parsing: {}", data);
        return Ok(ScanPayload::Wifi(WifiCredential {
            ssid: data.to_string(),
            password: String::new(),
            security: "unknown".to_string(),
            hidden: false,
            is_open: true,
            parsed_from: CredentialSource::Fallback,
        }));
    }

    tracing::warn!("❌ QR code format not recognized");
    Err(ClassifyError::Unrecognized)
}

/// JSON 对象且 `ip` 或 `hostname` 为真值时才算设备二维码
fn parse_device_json(data: &str) -> Option<DeviceDescriptor> {
    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => {
            tracing::info!("⚠️ Not valid JSON format");
            return None;
        }
    };
    let obj = value.as_object()?;
    if !obj.get("ip").is_some_and(is_truthy) && !obj.get("hostname").is_some_and(is_truthy) {
        return None;
    }
    let method_given = obj.contains_key("discovery_method") || obj.contains_key("discoveryMethod");

    let mut device: DeviceDescriptor = match serde_json::from_value(value) {
        Ok(d) => d,
        Err(e) => {
            tracing::info!("⚠️ Device JSON has unexpected field types: {}", e);
            return None;
        }
    };
    if !method_given {
        device.discovery_method = DiscoveryMethod::QrCode;
    }
    Some(device)
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn looks_like_network_name(data: &str) -> bool {
    let len = data.chars().count();
    (3..=50).contains(&len)
        && !data.contains('\n')
        && !data.contains('\t')
        && data
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || matches!(c, '_' | '.' | '-'))
}
