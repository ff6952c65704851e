//! Device registration: payload formatting, validation and the registrar flow.

pub mod http;
mod registrar;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::classifier::{DEFAULT_DEVICE_TYPE, ipv4};
use crate::structs::{DeviceDescriptor, DiscoveryMethod};

pub use registrar::{RegistrationFailure, RegistrationOutcome, Registrar};

pub const DEFAULT_ROOM: &str = "Unassigned";
pub const DEFAULT_TISSUE_TYPE: &str = "hand_towel";
pub const DEFAULT_METER_CAPACITY: u32 = 500;
pub const DEFAULT_FIRMWARE: &str = "1.0.0";
pub const DEFAULT_MANUFACTURER: &str = "Unknown";
pub const DEFAULT_PORT: u16 = 80;

/// 楼层可以是数字，也可以是用户输入的文本（"3", "3F"）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FloorNumber {
    Number(i64),
    Text(String),
}

impl FloorNumber {
    /// Leading-integer parse: `" 3F"` → 3, `"x"` → 0.
    pub fn value(&self) -> i32 {
        match self {
            FloorNumber::Number(n) => i32::try_from(*n).unwrap_or(0),
            FloorNumber::Text(s) => {
                let s = s.trim_start();
                let (sign, digits) = match s.strip_prefix('-') {
                    Some(rest) => (-1, rest),
                    None => (1, s.strip_prefix('+').unwrap_or(s)),
                };
                let end = digits
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(digits.len());
                digits[..end].parse::<i32>().map(|n| sign * n).unwrap_or(0)
            }
        }
    }
}

/// Fields the operator fills in on the registration form. All optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserFields {
    pub name: Option<String>,
    pub room_number: Option<String>,
    pub floor_number: Option<FloorNumber>,
    pub tissue_type: Option<String>,
    pub meter_capacity: Option<u32>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
}

/// Body sent to the registration backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationPayload {
    pub device_id: String,
    pub name: String,
    pub room_number: String,
    pub floor_number: i32,
    pub tissue_type: String,
    pub meter_capacity: u32,
    pub mac_address: Option<String>,
    pub ip_address: Option<String>,
    pub hostname: Option<String>,
    pub device_type: String,
    pub manufacturer: String,
    pub model: String,
    pub firmware_version: String,
    pub discovery_method: DiscoveryMethod,
    pub port: u16,
    pub services: Vec<String>,
}

impl RegistrationPayload {
    /// Recovers formatter inputs that reproduce this payload exactly.
    pub fn to_inputs(&self) -> (DeviceDescriptor, UserFields) {
        let device = DeviceDescriptor {
            ip: self.ip_address.clone(),
            hostname: self.hostname.clone(),
            device_id: Some(self.device_id.clone()),
            name: None,
            mac: self.mac_address.clone(),
            manufacturer: Some(self.manufacturer.clone()),
            device_type: Some(self.device_type.clone()),
            port: Some(self.port),
            services: Some(self.services.clone()),
            discovery_method: self.discovery_method,
        };
        let fields = UserFields {
            name: Some(self.name.clone()),
            room_number: Some(self.room_number.clone()),
            floor_number: Some(FloorNumber::Number(i64::from(self.floor_number))),
            tissue_type: Some(self.tissue_type.clone()),
            meter_capacity: Some(self.meter_capacity),
            model: Some(self.model.clone()),
            firmware_version: Some(self.firmware_version.clone()),
        };
        (device, fields)
    }
}

/// Backend answer to the duplicate check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub device: Option<Value>,
}

/// Device record returned by the backend after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredDevice {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// 只保留 ASCII 字母数字并转大写
fn normalize_device_id(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

pub fn synthetic_device_id(now: DateTime<Utc>) -> String {
    format!("DEVICE{}", now.timestamp_millis())
}

/// Stable id: hostname, then IP with dots as dashes, then the given id.
fn derive_device_id(device: &DeviceDescriptor, now: DateTime<Utc>) -> String {
    let candidates = [
        device.hostname.clone(),
        device.ip.as_ref().map(|ip| ip.replace('.', "-")),
        device.device_id.clone(),
    ];
    candidates
        .iter()
        .flatten()
        .map(|c| normalize_device_id(c))
        .find(|id| !id.is_empty())
        .unwrap_or_else(|| synthetic_device_id(now))
}

/// Builds the registration payload, filling defaults for anything missing.
pub fn format_for_registration(
    device: &DeviceDescriptor,
    fields: &UserFields,
) -> RegistrationPayload {
    format_for_registration_at(device, fields, Utc::now())
}

/// Same as [`format_for_registration`] with an explicit clock for the
/// synthetic id fallback.
pub fn format_for_registration_at(
    device: &DeviceDescriptor,
    fields: &UserFields,
    now: DateTime<Utc>,
) -> RegistrationPayload {
    let device_id = derive_device_id(device, now);

    let name = non_empty(fields.name.as_ref())
        .or(non_empty(device.hostname.as_ref()))
        .map(str::to_string)
        .unwrap_or_else(|| match non_empty(device.ip.as_ref()) {
            Some(ip) => format!("Device {}", ip),
            None => format!("Device {}", device_id),
        });

    let device_type = non_empty(device.device_type.as_ref())
        .unwrap_or(DEFAULT_DEVICE_TYPE)
        .to_string();

    RegistrationPayload {
        name,
        room_number: non_empty(fields.room_number.as_ref())
            .unwrap_or(DEFAULT_ROOM)
            .to_string(),
        floor_number: fields.floor_number.as_ref().map(FloorNumber::value).unwrap_or(0),
        tissue_type: non_empty(fields.tissue_type.as_ref())
            .unwrap_or(DEFAULT_TISSUE_TYPE)
            .to_string(),
        meter_capacity: fields
            .meter_capacity
            .filter(|c| *c > 0)
            .unwrap_or(DEFAULT_METER_CAPACITY),
        mac_address: device.mac.clone().filter(|m| m != "Unknown"),
        ip_address: device.ip.clone(),
        hostname: device.hostname.clone(),
        model: non_empty(fields.model.as_ref())
            .unwrap_or(&device_type)
            .to_string(),
        device_type,
        manufacturer: non_empty(device.manufacturer.as_ref())
            .unwrap_or(DEFAULT_MANUFACTURER)
            .to_string(),
        firmware_version: non_empty(fields.firmware_version.as_ref())
            .unwrap_or(DEFAULT_FIRMWARE)
            .to_string(),
        discovery_method: device.discovery_method,
        port: device.port.filter(|p| *p > 0).unwrap_or(DEFAULT_PORT),
        services: device
            .services
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| vec!["HTTP".to_string()]),
        device_id,
    }
}

// ============= 设备信息校验 =============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{error}")]
pub struct ValidationError {
    pub error: String,
    pub suggestion: &'static str,
}

/// Checks that a device can be registered and cleans its `device_id`.
pub fn validate_device(mut device: DeviceDescriptor) -> Result<DeviceDescriptor, ValidationError> {
    if !device.has_identifier() {
        tracing::error!("❌ Device validation failed: missing all identifiers");
        return Err(ValidationError {
            error: "Device information is incomplete - missing IP address, hostname, or device ID"
                .to_string(),
            suggestion: "Please provide at least an IP address or device identifier",
        });
    }

    if let Some(ip) = non_empty(device.ip.as_ref()) {
        if !ipv4::is_valid_ipv4(ip) {
            return Err(ValidationError {
                error: format!("Invalid IP address format: {}", ip),
                suggestion: "Please enter a valid IP address (e.g., 192.168.1.100)",
            });
        }
    }

    if let Some(id) = non_empty(device.device_id.as_ref()) {
        let id = id.trim();
        if id.chars().count() < 2 {
            return Err(ValidationError {
                error: "Device ID is too short".to_string(),
                suggestion: "Device ID should be at least 2 characters long",
            });
        }
        let cleaned: String = id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
            .map(|c| c.to_ascii_uppercase())
            .collect();
        device.device_id = Some(cleaned);
    }

    Ok(device)
}
