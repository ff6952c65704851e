use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::registration::{DeviceStatus, RegisteredDevice, RegistrationPayload};
use crate::settings::SettingsLink;
use crate::structs::{NetworkState, Platform, RawNetwork};

// 在这里定义所有外部协作者的 trait：操作系统权限、网络状态、
// 可选的原生 WiFi 模块、注册后端以及系统设置跳转。

// ============= 权限 =============

/// Runtime permissions the WiFi scan APIs depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    FineLocation,
    CoarseLocation,
    BackgroundLocation,
}

impl Permission {
    /// Android manifest name of the permission.
    pub fn android_name(&self) -> &'static str {
        match self {
            Permission::FineLocation => "android.permission.ACCESS_FINE_LOCATION",
            Permission::CoarseLocation => "android.permission.ACCESS_COARSE_LOCATION",
            Permission::BackgroundLocation => "android.permission.ACCESS_BACKGROUND_LOCATION",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.android_name())
    }
}

/// 一次权限申请的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// 用户勾选了"不再询问"，只能去系统设置里手动开启
    NeverAskAgain,
}

/// 操作系统运行时权限接口。
#[async_trait]
pub trait PermissionPlatform: Send + Sync {
    /// 查询单个权限当前是否已授予（不弹窗）
    async fn check(&self, permission: Permission) -> crate::Result<bool>;

    /// 批量申请权限，返回每个权限的结果
    async fn request_multiple(
        &self,
        permissions: &[Permission],
    ) -> crate::Result<Vec<(Permission, PermissionStatus)>>;
}

// ============= 网络状态 =============

/// 连接状态查询接口
#[async_trait]
pub trait NetworkStatusProvider: Send + Sync {
    async fn network_state(&self) -> crate::Result<NetworkState>;

    /// 当前的 IPv4 地址，未分配时为 `None`
    async fn ip_address(&self) -> crate::Result<Option<Ipv4Addr>>;
}

// ============= 原生 WiFi 模块 =============

/// Methods of the native WiFi control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WifiMethod {
    #[serde(rename = "loadWifiList")]
    LoadWifiList,
    #[serde(rename = "getCurrentWifiSSID")]
    GetCurrentWifiSsid,
    #[serde(rename = "getFrequency")]
    GetFrequency,
    #[serde(rename = "getCurrentSignalStrength")]
    GetCurrentSignalStrength,
    #[serde(rename = "getBSSID")]
    GetBssid,
}

impl WifiMethod {
    /// The method surface a fully functional module advertises.
    pub const REQUIRED: [WifiMethod; 5] = [
        WifiMethod::LoadWifiList,
        WifiMethod::GetCurrentWifiSsid,
        WifiMethod::GetFrequency,
        WifiMethod::GetCurrentSignalStrength,
        WifiMethod::GetBssid,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WifiMethod::LoadWifiList => "loadWifiList",
            WifiMethod::GetCurrentWifiSsid => "getCurrentWifiSSID",
            WifiMethod::GetFrequency => "getFrequency",
            WifiMethod::GetCurrentSignalStrength => "getCurrentSignalStrength",
            WifiMethod::GetBssid => "getBSSID",
        }
    }
}

impl fmt::Display for WifiMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 可选的原生 WiFi 控制库。
///
/// 实现者通过 `methods()` 声明自己真正支持的方法；
/// 未声明的方法被调用时应返回 `Error::Unsupported`。
#[async_trait]
pub trait WifiModule: Send + Sync {
    fn methods(&self) -> Vec<WifiMethod>;

    /// 执行一次扫描并返回可见网络
    async fn load_wifi_list(&self) -> crate::Result<Vec<RawNetwork>>;

    async fn current_ssid(&self) -> crate::Result<Option<String>>;

    async fn frequency(&self) -> crate::Result<Option<u32>>;

    async fn current_signal_strength(&self) -> crate::Result<i32>;

    async fn bssid(&self) -> crate::Result<Option<String>>;
}

/// Resolves the native module, if the host has one.
pub trait WifiModuleProvider: Send + Sync {
    fn load(&self) -> crate::Result<Arc<dyn WifiModule>>;
}

// ============= 注册后端 =============

/// 设备注册 API（外部服务）
#[async_trait]
pub trait RegistrationBackend: Send + Sync {
    /// 按 device_id 查询设备是否已经注册
    async fn check_device_status(&self, token: &str, device_id: &str)
    -> crate::Result<DeviceStatus>;

    async fn register_device(
        &self,
        token: &str,
        payload: &RegistrationPayload,
    ) -> crate::Result<RegisteredDevice>;
}

// ============= 系统设置 =============

#[async_trait]
pub trait SettingsLauncher: Send + Sync {
    async fn open(&self, link: &SettingsLink) -> crate::Result<()>;
}

/// Everything a host must provide to run the scanner.
pub trait HostBackend:
    PermissionPlatform + NetworkStatusProvider + WifiModuleProvider + SettingsLauncher
{
    fn platform(&self) -> Platform;
}
