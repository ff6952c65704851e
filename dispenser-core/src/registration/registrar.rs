use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use super::{
    RegisteredDevice, UserFields, format_for_registration, synthetic_device_id, validate_device,
};
use crate::structs::DeviceDescriptor;
use crate::traits::RegistrationBackend;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistrationOutcome {
    AlreadyRegistered {
        device_id: String,
        device: Option<Value>,
        message: String,
    },
    Registered {
        device_id: String,
        device: RegisteredDevice,
        message: String,
    },
}

impl RegistrationOutcome {
    pub fn message(&self) -> &str {
        match self {
            RegistrationOutcome::AlreadyRegistered { message, .. }
            | RegistrationOutcome::Registered { message, .. } => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{error}")]
pub struct RegistrationFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl RegistrationFailure {
    fn new(error: impl Into<String>, suggestion: Option<&str>) -> Self {
        Self {
            error: error.into(),
            suggestion: suggestion.map(str::to_string),
        }
    }
}

/// Registers devices through a [`RegistrationBackend`], skipping devices the
/// backend already knows.
pub struct Registrar {
    backend: Arc<dyn RegistrationBackend>,
}

impl Registrar {
    pub fn new(backend: Arc<dyn RegistrationBackend>) -> Self {
        Self { backend }
    }

    /// Registers a device picked from a list or typed in by the operator.
    /// The device is validated first.
    pub async fn register_selected(
        &self,
        token: &str,
        device: DeviceDescriptor,
        fields: &UserFields,
    ) -> Result<RegistrationOutcome, RegistrationFailure> {
        tracing::info!("🔄 Registering selected device...");
        require_token(token)?;

        let device = validate_device(device)
            .map_err(|v| RegistrationFailure::new(v.error, Some(v.suggestion)))?;
        self.submit(token, &device, fields).await.map_err(|e| {
            RegistrationFailure::new(e, Some("Please check the device information and try again"))
        })
    }

    /// Registers a device recovered from a QR code. A device without any
    /// identifier gets a synthetic one.
    pub async fn complete_registration(
        &self,
        token: &str,
        mut device: DeviceDescriptor,
        fields: &UserFields,
    ) -> Result<RegistrationOutcome, RegistrationFailure> {
        tracing::info!("🔄 Starting device registration flow...");
        require_token(token)?;

        if !device.has_identifier() {
            let fallback_id = synthetic_device_id(chrono::Utc::now());
            tracing::info!(
                "⚠️ No device IP, hostname, or device_id provided. Using fallback: {}",
                fallback_id
            );
            let tail_start = fallback_id.len().saturating_sub(6);
            device.hostname = Some(format!("Device-{}", &fallback_id[tail_start..]));
            device.device_id = Some(fallback_id);
        }

        self.submit(token, &device, fields)
            .await
            .map_err(|e| RegistrationFailure::new(e, None))
    }

    async fn submit(
        &self,
        token: &str,
        device: &DeviceDescriptor,
        fields: &UserFields,
    ) -> Result<RegistrationOutcome, String> {
        let payload = format_for_registration(device, fields);
        tracing::info!("📝 Registration data prepared for {}", payload.device_id);

        // 查询失败时按"未注册"处理
        let status = match self.backend.check_device_status(token, &payload.device_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("Error checking device status: {}", e);
                Default::default()
            }
        };

        if status.exists {
            tracing::info!("⚠️ Device already exists in system");
            let shown = status
                .device
                .as_ref()
                .and_then(|d| d.get("name"))
                .and_then(Value::as_str)
                .unwrap_or(&payload.device_id)
                .to_string();
            return Ok(RegistrationOutcome::AlreadyRegistered {
                message: format!("Device \"{}\" is already registered", shown),
                device_id: payload.device_id,
                device: status.device,
            });
        }

        let registered = self
            .backend
            .register_device(token, &payload)
            .await
            .map_err(|e| format!("Registration failed: {}", e))?;
        tracing::info!("✅ Device registered successfully: {}", payload.device_id);

        let shown = registered.name.clone().unwrap_or_else(|| payload.name.clone());
        Ok(RegistrationOutcome::Registered {
            message: format!("Device \"{}\" registered successfully", shown),
            device_id: payload.device_id,
            device: registered,
        })
    }
}

fn require_token(token: &str) -> Result<(), RegistrationFailure> {
    if token.trim().is_empty() {
        return Err(RegistrationFailure::new("Authentication token is required", None));
    }
    Ok(())
}
