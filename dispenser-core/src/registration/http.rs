// 注册后端的 HTTP 实现
//
// Base path: {api_url}/device/
// Auth: Authorization: Bearer <token>

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{DeviceStatus, RegisteredDevice, RegistrationPayload};
use crate::config::RegistrationConfig;
use crate::traits::RegistrationBackend;
use crate::{Error, Result};

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    device_id: &'a str,
}

/// `RegistrationBackend` over the dispenser REST API.
pub struct HttpRegistrationBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRegistrationBackend {
    pub fn new(config: &RegistrationConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::from_reqwest(&config.api_url, http))
    }

    /// Wrap an existing client.
    pub fn from_reqwest(api_url: &str, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: format!("{}/device", api_url.trim_end_matches('/')),
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        token: &str,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!("POST {}", url);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let raw = resp.text().await?;
        if status.is_success() {
            return Ok(serde_json::from_str(&raw)?);
        }

        // 优先使用服务端返回的 message / error 字段
        let message = serde_json::from_str::<ErrorResponse>(&raw)
            .ok()
            .and_then(|e| e.message.or(e.error))
            .unwrap_or_else(|| format!("{} ({})", fallback, status));
        Err(Error::Api(message))
    }
}

#[async_trait]
impl RegistrationBackend for HttpRegistrationBackend {
    async fn check_device_status(&self, token: &str, device_id: &str) -> Result<DeviceStatus> {
        self.post(
            token,
            "devices/check-status/",
            &StatusRequest { device_id },
            "Failed to check device status",
        )
        .await
    }

    async fn register_device(
        &self,
        token: &str,
        payload: &RegistrationPayload,
    ) -> Result<RegisteredDevice> {
        self.post(token, "wifi/", payload, "Failed to register device via WiFi")
            .await
    }
}
