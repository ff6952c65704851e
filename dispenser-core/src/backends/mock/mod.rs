use crate::Result;
use crate::settings::SettingsLink;
use crate::structs::{ConnectionType, NetworkState, Platform, RawNetwork};
use crate::traits::{
    HostBackend, NetworkStatusProvider, Permission, PermissionPlatform, PermissionStatus,
    SettingsLauncher, WifiMethod, WifiModule, WifiModuleProvider,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

const MOCK_SSID: &str = "MyHomeWiFi";

/// A mock host for development and demos.
/// It pretends to be an Android phone joined to `MyHomeWiFi`, grants every
/// permission it is asked for, and returns a fixed scan list.
#[derive(Debug)]
pub struct MockBackend {
    platform: Platform,
    granted: Mutex<HashSet<Permission>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            platform: Platform::android(33),
            granted: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl PermissionPlatform for MockBackend {
    async fn check(&self, permission: Permission) -> Result<bool> {
        Ok(self.granted.lock().await.contains(&permission))
    }

    async fn request_multiple(
        &self,
        permissions: &[Permission],
    ) -> Result<Vec<(Permission, PermissionStatus)>> {
        tracing::info!(
            "🤖 [MockBackend] Granting {} permission(s) (simulated).",
            permissions.len()
        );
        let mut granted = self.granted.lock().await;
        Ok(permissions
            .iter()
            .map(|p| {
                granted.insert(*p);
                (*p, PermissionStatus::Granted)
            })
            .collect())
    }
}

#[async_trait]
impl NetworkStatusProvider for MockBackend {
    async fn network_state(&self) -> Result<NetworkState> {
        Ok(NetworkState {
            is_connected: true,
            is_internet_reachable: Some(true),
            connection_type: ConnectionType::Wifi,
        })
    }

    async fn ip_address(&self) -> Result<Option<Ipv4Addr>> {
        Ok(Some(Ipv4Addr::new(192, 168, 1, 42)))
    }
}

impl WifiModuleProvider for MockBackend {
    fn load(&self) -> Result<Arc<dyn WifiModule>> {
        tracing::info!("🤖 [MockBackend] Loading simulated WiFi module.");
        Ok(Arc::new(MockWifiModule))
    }
}

#[async_trait]
impl SettingsLauncher for MockBackend {
    async fn open(&self, link: &SettingsLink) -> Result<()> {
        tracing::info!("🤖 [MockBackend] Opening settings: {} (simulated).", link);
        Ok(())
    }
}

impl HostBackend for MockBackend {
    fn platform(&self) -> Platform {
        self.platform
    }
}

/// 模拟的原生 WiFi 模块
#[derive(Debug, Default)]
pub struct MockWifiModule;

fn raw(ssid: &str, bssid: &str, level: i32, frequency: u32, capabilities: &str) -> RawNetwork {
    RawNetwork {
        ssid: ssid.to_string(),
        bssid: Some(bssid.to_string()),
        level: Some(level),
        frequency: Some(frequency),
        capabilities: Some(capabilities.to_string()),
    }
}

#[async_trait]
impl WifiModule for MockWifiModule {
    fn methods(&self) -> Vec<WifiMethod> {
        WifiMethod::REQUIRED.to_vec()
    }

    async fn load_wifi_list(&self) -> Result<Vec<RawNetwork>> {
        tracing::info!("🤖 [MockBackend] Scanning for networks...");
        // Simulate a delay
        sleep(Duration::from_secs(2)).await;

        // 同一个 SSID 出现两次（双频路由），扫描器会保留信号更强的那条
        let networks = vec![
            raw(MOCK_SSID, "a4:2b:b0:10:00:01", -48, 5180, "[WPA2-PSK-CCMP][RSN-PSK-CCMP][ESS]"),
            raw(MOCK_SSID, "a4:2b:b0:10:00:02", -61, 2437, "[WPA2-PSK-CCMP][RSN-PSK-CCMP][ESS]"),
            raw("CafeGuest", "3c:84:6a:22:10:0f", -67, 2412, "[ESS]"),
            raw("Neighbor's Network", "f0:9f:c2:5e:aa:31", -78, 2462, "[WPA-PSK-TKIP][ESS]"),
            raw("Dispenser-Setup", "b8:27:eb:4d:19:02", -55, 2437, "[SAE][ESS]"),
            raw("", "00:11:22:33:44:55", -82, 2412, "[WPA2-PSK-CCMP][ESS]"),
        ];

        tracing::info!("🤖 [MockBackend] Found {} networks.", networks.len());
        Ok(networks)
    }

    async fn current_ssid(&self) -> Result<Option<String>> {
        Ok(Some(format!("\"{}\"", MOCK_SSID)))
    }

    async fn frequency(&self) -> Result<Option<u32>> {
        Ok(Some(5180))
    }

    async fn current_signal_strength(&self) -> Result<i32> {
        Ok(-48)
    }

    async fn bssid(&self) -> Result<Option<String>> {
        Ok(Some("a4:2b:b0:10:00:01".to_string()))
    }
}
