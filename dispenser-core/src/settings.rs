//! OS settings deep links ("open WiFi settings" / "open app settings").

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::structs::{Os, Platform};
use crate::traits::SettingsLauncher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsTarget {
    Wifi,
    App,
}

impl FromStr for SettingsTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wifi" => Ok(SettingsTarget::Wifi),
            "app" => Ok(SettingsTarget::App),
            other => Err(format!("Unknown settings target '{}'", other)),
        }
    }
}

impl SettingsTarget {
    fn failure_message(&self) -> &'static str {
        match self {
            SettingsTarget::Wifi => "Failed to open WiFi settings",
            SettingsTarget::App => "Failed to open app settings",
        }
    }
}

/// 平台相关的跳转方式：iOS 用 URL scheme，Android 用 intent action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SettingsLink {
    Url(&'static str),
    Intent(&'static str),
}

impl fmt::Display for SettingsLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsLink::Url(u) => write!(f, "url:{}", u),
            SettingsLink::Intent(i) => write!(f, "intent:{}", i),
        }
    }
}

pub fn settings_link(platform: Platform, target: SettingsTarget) -> Option<SettingsLink> {
    match (platform.os, target) {
        (Os::Ios, SettingsTarget::Wifi) => Some(SettingsLink::Url("App-Prefs:root=WIFI")),
        (Os::Ios, SettingsTarget::App) => Some(SettingsLink::Url("app-settings:")),
        (Os::Android, SettingsTarget::Wifi) => {
            Some(SettingsLink::Intent("android.settings.WIFI_SETTINGS"))
        }
        (Os::Android, SettingsTarget::App) => {
            Some(SettingsLink::Intent("android.settings.APPLICATION_DETAILS_SETTINGS"))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<SettingsLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// 打开系统设置；任何失败都归一化成固定的提示文字
pub async fn open_settings(
    launcher: &dyn SettingsLauncher,
    platform: Platform,
    target: SettingsTarget,
) -> SettingsOutcome {
    let failed = |link| SettingsOutcome {
        success: false,
        link,
        error: Some(target.failure_message()),
    };

    let Some(link) = settings_link(platform, target) else {
        tracing::warn!("⚠️ No settings deep link for platform {:?}", platform.os);
        return failed(None);
    };

    match launcher.open(&link).await {
        Ok(()) => SettingsOutcome {
            success: true,
            link: Some(link),
            error: None,
        },
        Err(e) => {
            tracing::error!("{}: {}", target.failure_message(), e);
            failed(Some(link))
        }
    }
}
