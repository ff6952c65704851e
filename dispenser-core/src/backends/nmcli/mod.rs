// Linux 主机后端：通过 nmcli 命令行访问 NetworkManager。
// 桌面 Linux 上没有运行时定位权限，也没有可跳转的系统设置页。

use crate::backends::utils;
use crate::settings::SettingsLink;
use crate::structs::{NetworkState, Platform, RawNetwork};
use crate::traits::{
    HostBackend, NetworkStatusProvider, Permission, PermissionPlatform, PermissionStatus,
    SettingsLauncher, WifiMethod, WifiModule, WifiModuleProvider,
};
use crate::{Error, Result};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::process::Command;

async fn nmcli(args: &[&str]) -> Result<String> {
    let output = Command::new("nmcli").args(args).output().await?;
    if !output.status.success() {
        let err = String::from_utf8_lossy(&output.stderr);
        return Err(Error::CommandFailed(format!(
            "nmcli {} failed: {}",
            args.join(" "),
            err.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[derive(Debug, Default)]
pub struct NmcliBackend;

impl NmcliBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PermissionPlatform for NmcliBackend {
    async fn check(&self, _permission: Permission) -> Result<bool> {
        Ok(true)
    }

    async fn request_multiple(
        &self,
        permissions: &[Permission],
    ) -> Result<Vec<(Permission, PermissionStatus)>> {
        Ok(permissions
            .iter()
            .map(|p| (*p, PermissionStatus::Granted))
            .collect())
    }
}

#[async_trait]
impl NetworkStatusProvider for NmcliBackend {
    async fn network_state(&self) -> Result<NetworkState> {
        let devices = nmcli(&["-t", "-f", "TYPE,STATE", "device"]).await?;
        // connectivity 查询失败时视为"未知"
        let connectivity = nmcli(&["networking", "connectivity"])
            .await
            .unwrap_or_default();
        Ok(utils::parse_network_state(&devices, &connectivity))
    }

    async fn ip_address(&self) -> Result<Option<Ipv4Addr>> {
        let output = nmcli(&["-g", "IP4.ADDRESS", "device", "show"]).await?;
        Ok(utils::parse_ipv4_address(&output))
    }
}

impl WifiModuleProvider for NmcliBackend {
    fn load(&self) -> Result<Arc<dyn WifiModule>> {
        Ok(Arc::new(NmcliWifiModule))
    }
}

#[async_trait]
impl SettingsLauncher for NmcliBackend {
    async fn open(&self, link: &SettingsLink) -> Result<()> {
        Err(Error::CommandFailed(format!(
            "Cannot open {} on this host",
            link
        )))
    }
}

impl HostBackend for NmcliBackend {
    fn platform(&self) -> Platform {
        Platform::linux()
    }
}

/// WiFi module backed by `nmcli device wifi`.
#[derive(Debug, Default)]
pub struct NmcliWifiModule;

impl NmcliWifiModule {
    async fn active_link(&self) -> Result<Option<utils::ActiveLink>> {
        let output = nmcli(&[
            "-t",
            "-f",
            "ACTIVE,SSID,BSSID,FREQ,SIGNAL",
            "device",
            "wifi",
        ])
        .await?;
        Ok(utils::parse_active_link(&output))
    }
}

#[async_trait]
impl WifiModule for NmcliWifiModule {
    fn methods(&self) -> Vec<WifiMethod> {
        WifiMethod::REQUIRED.to_vec()
    }

    async fn load_wifi_list(&self) -> Result<Vec<RawNetwork>> {
        tracing::debug!("nmcli: scanning for networks");
        let output = nmcli(&[
            "-t",
            "-f",
            "SSID,BSSID,SIGNAL,FREQ,SECURITY",
            "device",
            "wifi",
            "list",
            "--rescan",
            "yes",
        ])
        .await?;
        Ok(utils::parse_wifi_list(&output))
    }

    async fn current_ssid(&self) -> Result<Option<String>> {
        Ok(self.active_link().await?.map(|l| l.ssid))
    }

    async fn frequency(&self) -> Result<Option<u32>> {
        Ok(self.active_link().await?.and_then(|l| l.frequency))
    }

    async fn current_signal_strength(&self) -> Result<i32> {
        self.active_link()
            .await?
            .and_then(|l| l.signal)
            .ok_or_else(|| Error::CommandFailed("No active WiFi link".into()))
    }

    async fn bssid(&self) -> Result<Option<String>> {
        Ok(self.active_link().await?.and_then(|l| l.bssid))
    }
}
