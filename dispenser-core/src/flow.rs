//! Multi-step QR provisioning flows built on the classifier, the scanner and
//! the registrar.
//!
//! A WiFi QR code leads the operator through joining the network and then
//! looking for devices on it; a device or IP QR code goes straight to
//! registration.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::classifier::{self, ScanPayload, ScanType};
use crate::registration::{Registrar, RegistrationOutcome, UserFields};
use crate::scanner::{DeviceScan, WifiScanner};
use crate::structs::{ConnectionType, DeviceDescriptor, NetworkInfo, WifiCredential};

const NO_DEVICES_SUGGESTIONS: [&str; 4] = [
    "Make sure your device is powered on",
    "Check if device is connected to the same WiFi",
    "Try manual IP entry",
    "Verify device is in pairing mode",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum FlowStep {
    WifiDetected {
        wifi: WifiCredential,
        message: String,
        sub_message: String,
        instructions: Vec<String>,
    },
    DeviceRegistered {
        qr_type: ScanType,
        outcome: RegistrationOutcome,
    },
    ConnectionRequired {
        wifi: WifiCredential,
        message: String,
        sub_message: String,
        instructions: Vec<String>,
    },
    DevicesFound {
        wifi: WifiCredential,
        message: String,
        current_network: Option<String>,
        devices: Vec<DeviceDescriptor>,
        relevant_devices: Vec<DeviceDescriptor>,
        scan: DeviceScan,
    },
    GenericDevicesFound {
        wifi: WifiCredential,
        message: String,
        current_network: Option<String>,
        devices: Vec<DeviceDescriptor>,
        suggestion: &'static str,
        scan: DeviceScan,
    },
    NoDevicesFound {
        wifi: WifiCredential,
        message: String,
        current_network: Option<String>,
        suggestions: Vec<&'static str>,
        network_info: NetworkInfo,
    },
    /// 不带 WiFi 凭据的重新扫描结果
    ScanRetried {
        action: FlowAction,
        message: String,
        current_network: Option<String>,
        scan: DeviceScan,
    },
}

/// What the UI should offer next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    RetryConnection,
    ConnectWifi,
    RetryScan,
    ManualDeviceEntry,
    SelectDevice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedStep {
    InvalidQr,
    RegistrationFailed,
    InvalidWifiData,
    NotConnected,
    NotWifi,
    ScanFailed,
    NoConnection,
    WrongNetwork,
    ConnectionFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct FlowFailure {
    pub step: FailedStep,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<FlowAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_network: Option<String>,
}

impl FlowFailure {
    fn new(step: FailedStep, message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            error: None,
            suggestion: Some(suggestion.into()),
            actions: Vec::new(),
            current_network: None,
            expected_network: None,
        }
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    fn with_actions(mut self, actions: &[FlowAction]) -> Self {
        self.actions = actions.to_vec();
        self
    }

    fn with_networks(mut self, current: Option<String>, expected: &str) -> Self {
        self.current_network = current;
        self.expected_network = Some(expected.to_string());
        self
    }
}

pub struct ProvisioningFlow {
    scanner: Arc<WifiScanner>,
    registrar: Arc<Registrar>,
}

impl ProvisioningFlow {
    pub fn new(scanner: Arc<WifiScanner>, registrar: Arc<Registrar>) -> Self {
        Self { scanner, registrar }
    }

    /// Classifies a scanned code and starts the matching flow.
    pub async fn process_qr(
        &self,
        token: &str,
        raw: &str,
        fields: &UserFields,
    ) -> Result<FlowStep, FlowFailure> {
        tracing::info!("🔍 Processing QR code for device registration...");

        let payload = classifier::classify(raw)
            .map_err(|e| FlowFailure::new(FailedStep::InvalidQr, e.to_string(), e.suggestion()))?;

        let qr_type = payload.scan_type();
        match payload {
            ScanPayload::Wifi(wifi) => {
                tracing::info!("📶 WiFi QR detected: {}", wifi.ssid);
                Ok(FlowStep::WifiDetected {
                    message: format!("WiFi network detected: {}", wifi.ssid),
                    sub_message: password_line(&wifi),
                    instructions: vec![
                        "1. Go to your device's WiFi settings".to_string(),
                        format!("2. Connect to network: \"{}\"", wifi.ssid),
                        if wifi.password.is_empty() {
                            "3. No password required - just connect".to_string()
                        } else {
                            format!("3. Enter password: \"{}\"", wifi.password)
                        },
                        "4. Return to this app and continue".to_string(),
                    ],
                    wifi,
                })
            }
            ScanPayload::Device(device) | ScanPayload::Ip(device) => {
                tracing::info!("📱 Device QR detected, proceeding with registration...");
                let outcome = self
                    .registrar
                    .complete_registration(token, device, fields)
                    .await
                    .map_err(|f| FlowFailure {
                        suggestion: f.suggestion,
                        ..FlowFailure::new(FailedStep::RegistrationFailed, f.error, "")
                    })?;
                Ok(FlowStep::DeviceRegistered { qr_type, outcome })
            }
        }
    }

    /// Called after a WiFi QR code: goes on to device discovery when the
    /// phone is already on the target network, otherwise asks the operator
    /// to join it.
    pub async fn process_wifi_handoff(
        &self,
        wifi: WifiCredential,
    ) -> Result<FlowStep, FlowFailure> {
        tracing::info!("🔄 Starting WiFi QR with device flow: {}", wifi.ssid);
        if wifi.ssid.is_empty() {
            return Err(FlowFailure::new(
                FailedStep::InvalidWifiData,
                "Invalid WiFi data - missing SSID",
                "Please scan a WiFi QR code or device QR code",
            ));
        }

        let current = self.current_network().await;
        if let Some(info) = current.as_ref() {
            if info.is_connected && info.ssid.as_deref() == Some(wifi.ssid.as_str()) {
                tracing::info!("✅ Already connected to target WiFi network");
                return self.continue_after_wifi(wifi).await;
            }
        }

        Ok(FlowStep::ConnectionRequired {
            message: format!("Please connect to \"{}\" manually", wifi.ssid),
            sub_message: password_line(&wifi),
            instructions: vec![
                "1. Go to WiFi settings on your device".to_string(),
                format!("2. Connect to network: \"{}\"", wifi.ssid),
                if wifi.password.is_empty() {
                    "3. No password required".to_string()
                } else {
                    format!("3. Use password: \"{}\"", wifi.password)
                },
                "4. Return to this app and tap \"Continue\" to scan for devices".to_string(),
            ],
            wifi,
        })
    }

    /// Runs once the operator says they joined the network.
    ///
    /// A different SSID only logs a warning; use
    /// [`handle_manual_connection`](Self::handle_manual_connection) to insist
    /// on the target network.
    pub async fn continue_after_wifi(
        &self,
        wifi: WifiCredential,
    ) -> Result<FlowStep, FlowFailure> {
        tracing::info!("🔄 Continuing after WiFi connection: {}", wifi.ssid);

        let info = self.current_network().await;
        let Some(info) = info.filter(|i| i.is_connected) else {
            return Err(FlowFailure::new(
                FailedStep::NotConnected,
                "Not connected to WiFi",
                "Please connect to WiFi first and try again",
            )
            .with_actions(&[FlowAction::RetryConnection]));
        };
        if info.connection_type != ConnectionType::Wifi {
            return Err(FlowFailure::new(
                FailedStep::NotWifi,
                "Not connected to WiFi network",
                "Please connect to a WiFi network and try again",
            )
            .with_actions(&[FlowAction::RetryConnection]));
        }

        let actual = info.ssid.clone();
        if actual.as_deref() != Some(wifi.ssid.as_str()) {
            // 连到了别的网络也继续，只记录警告
            tracing::warn!(
                "⚠️ Connected to different network. Expected: {}, Got: {}",
                wifi.ssid,
                actual.as_deref().unwrap_or("Unknown")
            );
        }

        self.discover_devices(wifi, actual).await
    }

    /// Checks the link once the operator reports joining the network by
    /// hand. Only the target SSID moves on to device discovery.
    pub async fn handle_manual_connection(
        &self,
        wifi: WifiCredential,
    ) -> Result<FlowStep, FlowFailure> {
        tracing::info!("🔄 Handling manual WiFi connection result...");

        let Some(info) = self.current_network().await.filter(|i| i.is_connected) else {
            tracing::info!("❌ Not connected to any WiFi network");
            return Err(FlowFailure::new(
                FailedStep::NoConnection,
                "Not connected to WiFi",
                "Please connect to WiFi and try again",
            )
            .with_actions(&[FlowAction::RetryConnection]));
        };

        if info.ssid.as_deref() != Some(wifi.ssid.as_str()) {
            tracing::info!(
                "⚠️ Connected to different network: {}",
                info.ssid.as_deref().unwrap_or("Unknown")
            );
            return Err(FlowFailure::new(
                FailedStep::WrongNetwork,
                "Connected to wrong WiFi network",
                format!("Please connect to \"{}\" and try again", wifi.ssid),
            )
            .with_actions(&[FlowAction::RetryConnection])
            .with_networks(info.ssid, &wifi.ssid));
        }

        tracing::info!("✅ Connected to correct WiFi network, scanning for devices...");
        self.discover_devices(wifi, info.ssid).await
    }

    /// Retry from the "connect manually" screen. Offers manual device entry
    /// as well as another attempt when the phone is still elsewhere.
    pub async fn retry_after_wifi(&self, wifi: WifiCredential) -> Result<FlowStep, FlowFailure> {
        tracing::info!("🔄 Retrying device scan after WiFi connection: {}", wifi.ssid);

        let info = self.current_network().await;
        match info {
            Some(info) if info.is_connected && info.ssid.as_deref() == Some(wifi.ssid.as_str()) => {
                tracing::info!("✅ Successfully connected to target WiFi network");
                self.discover_devices(wifi, info.ssid).await
            }
            other => {
                let current = other
                    .and_then(|i| i.ssid)
                    .unwrap_or_else(|| "Unknown".to_string());
                Err(FlowFailure::new(
                    FailedStep::ConnectionFailed,
                    "Not connected to target WiFi network",
                    format!("Please ensure you're connected to \"{}\" and try again", wifi.ssid),
                )
                .with_actions(&[FlowAction::RetryConnection, FlowAction::ManualDeviceEntry])
                .with_networks(Some(current), &wifi.ssid))
            }
        }
    }

    /// Scans the current WiFi network again, without a target credential.
    pub async fn retry_device_scan(&self) -> Result<FlowStep, FlowFailure> {
        tracing::info!("🔄 Retrying device scan...");

        let on_wifi = self
            .current_network()
            .await
            .filter(|i| i.is_connected && i.connection_type == ConnectionType::Wifi);
        let Some(info) = on_wifi else {
            return Err(FlowFailure::new(
                FailedStep::NotConnected,
                "Not connected to WiFi",
                "Please connect to WiFi first",
            )
            .with_actions(&[FlowAction::ConnectWifi]));
        };

        let scan = self.scanner.scan_local_devices().await.map_err(|e| {
            FlowFailure::new(
                FailedStep::ScanFailed,
                "Device scan failed",
                "Try manual device entry",
            )
            .with_error(e.error)
            .with_actions(&[FlowAction::ManualDeviceEntry])
        })?;

        let relevant = scan.relevant_devices.len();
        Ok(FlowStep::ScanRetried {
            action: if relevant > 0 {
                FlowAction::SelectDevice
            } else {
                FlowAction::ManualDeviceEntry
            },
            message: if relevant > 0 {
                format!("Found {} smart device(s)", relevant)
            } else {
                "No smart devices found".to_string()
            },
            current_network: info.ssid,
            scan,
        })
    }

    async fn discover_devices(
        &self,
        wifi: WifiCredential,
        current_network: Option<String>,
    ) -> Result<FlowStep, FlowFailure> {
        tracing::info!("🔍 Scanning for devices on network...");
        let scan = self.scanner.scan_local_devices().await.map_err(|e| {
            FlowFailure::new(
                FailedStep::ScanFailed,
                "Failed to scan for devices",
                "Try manual device entry or check network connection",
            )
            .with_error(e.error)
            .with_actions(&[FlowAction::RetryScan, FlowAction::ManualDeviceEntry])
        })?;

        Ok(discovery_step(wifi, current_network, scan))
    }

    async fn current_network(&self) -> Option<NetworkInfo> {
        match self.scanner.current_network_info().await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!("⚠️ Could not read current network: {}", e);
                None
            }
        }
    }
}

fn password_line(wifi: &WifiCredential) -> String {
    if wifi.password.is_empty() {
        "No password required".to_string()
    } else {
        format!("Password: {}", wifi.password)
    }
}

fn discovery_step(
    wifi: WifiCredential,
    current_network: Option<String>,
    scan: DeviceScan,
) -> FlowStep {
    if !scan.relevant_devices.is_empty() {
        FlowStep::DevicesFound {
            message: format!("Found {} smart device(s)", scan.relevant_devices.len()),
            devices: scan.devices.clone(),
            relevant_devices: scan.relevant_devices.clone(),
            wifi,
            current_network,
            scan,
        }
    } else if !scan.devices.is_empty() {
        FlowStep::GenericDevicesFound {
            message: format!(
                "Found {} device(s) but none appear to be smart dispensers",
                scan.devices.len()
            ),
            devices: scan.devices.clone(),
            suggestion: "You can manually select a device or enter IP manually",
            wifi,
            current_network,
            scan,
        }
    } else {
        FlowStep::NoDevicesFound {
            message: "No devices found on network".to_string(),
            suggestions: NO_DEVICES_SUGGESTIONS.to_vec(),
            network_info: scan.network_info,
            wifi,
            current_network,
        }
    }
}
