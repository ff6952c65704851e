//! Location permission gate with a short-lived snapshot cache.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::structs::{Os, Platform};
use crate::traits::{Permission, PermissionPlatform, PermissionStatus};

/// 后台定位从 Android 10 (API 29) 起才需要单独申请
const BACKGROUND_LOCATION_MIN_API: u32 = 29;

const ESSENTIAL: [Permission; 2] = [Permission::FineLocation, Permission::CoarseLocation];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionState {
    pub permission: Permission,
    pub granted: bool,
    pub required: bool,
}

/// Result of a permission check. `granted` only reflects the essential set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionSnapshot {
    pub granted: bool,
    pub essential: Vec<PermissionState>,
    pub optional: Vec<PermissionState>,
    pub all_optional_granted: bool,
    pub needs_permissions: bool,
    pub checked_at: DateTime<Utc>,
    pub from_cache: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Remedy {
    /// 再弹一次系统授权框
    Retry,
    /// 有权限被永久拒绝，只能跳转系统设置
    OpenSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionGrant {
    pub already_granted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{error}")]
pub struct PermissionDenial {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_error: Option<String>,
    pub remedy: Remedy,
    pub can_retry: bool,
    pub can_open_settings: bool,
    pub denied: Vec<Permission>,
    pub never_ask_again: Vec<Permission>,
    pub permissions_needed: Vec<&'static str>,
}

impl PermissionDenial {
    fn request_failed(message: String) -> Self {
        PermissionDenial {
            error: message,
            detailed_error: None,
            remedy: Remedy::Retry,
            can_retry: true,
            can_open_settings: true,
            denied: Vec::new(),
            never_ask_again: Vec::new(),
            permissions_needed: Vec::new(),
        }
    }
}

/// Uncached breakdown of every permission the gate knows about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionReport {
    pub platform: Os,
    pub required: bool,
    pub essential_granted: bool,
    pub all_granted: bool,
    pub permissions: Vec<PermissionState>,
}

struct CachedSnapshot {
    snapshot: PermissionSnapshot,
    stored_at: Instant,
}

/// Checks and requests the location permissions WiFi scanning depends on.
///
/// A granted snapshot is reused for `ttl`; a denial is re-checked on every
/// call. Call [`reset_cache`](Self::reset_cache) when the user comes back
/// from the OS settings screen.
pub struct PermissionGate {
    platform: Platform,
    os: Arc<dyn PermissionPlatform>,
    ttl: Duration,
    cache: Mutex<Option<CachedSnapshot>>,
}

impl PermissionGate {
    pub fn new(platform: Platform, os: Arc<dyn PermissionPlatform>, ttl: Duration) -> Self {
        Self {
            platform,
            os,
            ttl,
            cache: Mutex::new(None),
        }
    }

    pub fn essential_permissions(&self) -> Vec<Permission> {
        if self.platform.is_android() {
            ESSENTIAL.to_vec()
        } else {
            Vec::new()
        }
    }

    pub fn optional_permissions(&self) -> Vec<Permission> {
        if self.platform.is_android() && self.platform.version >= BACKGROUND_LOCATION_MIN_API {
            vec![Permission::BackgroundLocation]
        } else {
            Vec::new()
        }
    }

    pub async fn reset_cache(&self) {
        *self.cache.lock().await = None;
        tracing::info!("🔄 Permission cache reset");
    }

    /// 缓存中的授权状态与检查时间（不触发系统调用）
    pub async fn cached_state(&self) -> Option<(bool, DateTime<Utc>)> {
        self.cache
            .lock()
            .await
            .as_ref()
            .map(|c| (c.snapshot.granted, c.snapshot.checked_at))
    }

    /// Returns the cached snapshot while it is fresh and granted, otherwise
    /// queries the OS.
    pub async fn check(&self) -> PermissionSnapshot {
        if !self.platform.is_android() {
            return granted_without_os_call();
        }

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.snapshot.granted && cached.stored_at.elapsed() < self.ttl {
                tracing::debug!("✅ Using cached permission state");
                let mut snapshot = cached.snapshot.clone();
                snapshot.from_cache = true;
                return snapshot;
            }
        }

        let essential = self.query_all(&self.essential_permissions(), true).await;
        let optional = self.query_all(&self.optional_permissions(), false).await;
        let snapshot = build_snapshot(essential, optional);
        tracing::info!(
            "🔐 Essential WiFi permissions granted: {}",
            snapshot.granted
        );

        *cache = Some(CachedSnapshot {
            snapshot: snapshot.clone(),
            stored_at: Instant::now(),
        });
        snapshot
    }

    /// Asks the user for the essential permissions, then (only if those were
    /// granted) for the optional ones.
    pub async fn request(&self) -> Result<PermissionGrant, PermissionDenial> {
        if !self.platform.is_android() {
            return Ok(PermissionGrant { already_granted: true });
        }

        self.reset_cache().await;
        if self.check().await.granted {
            tracing::info!("✅ Essential WiFi permissions already granted");
            return Ok(PermissionGrant { already_granted: true });
        }

        let essential = self.essential_permissions();
        tracing::info!("🔐 Requesting {} essential permissions...", essential.len());
        let results = self.os.request_multiple(&essential).await.map_err(|e| {
            tracing::error!("Permission request failed: {}", e);
            PermissionDenial::request_failed(format!("Permission request failed: {}", e))
        })?;

        let status_of = |p: Permission| {
            results
                .iter()
                .find(|(q, _)| *q == p)
                .map(|(_, s)| *s)
                .unwrap_or(PermissionStatus::Denied)
        };
        let essential_states: Vec<PermissionState> = essential
            .iter()
            .map(|&p| PermissionState {
                permission: p,
                granted: status_of(p) == PermissionStatus::Granted,
                required: true,
            })
            .collect();
        let essential_granted = essential_states.iter().all(|s| s.granted);

        let mut optional_states = Vec::new();
        let optional = self.optional_permissions();
        if essential_granted && !optional.is_empty() {
            tracing::info!("📍 Requesting {} optional permissions...", optional.len());
            match self.os.request_multiple(&optional).await {
                Ok(opt) => {
                    optional_states = opt
                        .iter()
                        .map(|(p, s)| PermissionState {
                            permission: *p,
                            granted: *s == PermissionStatus::Granted,
                            required: false,
                        })
                        .collect();
                    if optional_states.iter().all(|s| s.granted) {
                        tracing::info!("✅ Optional permissions also granted");
                    } else {
                        tracing::info!("⚠️ Some optional permissions denied (this is OK)");
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Optional permission request failed (continuing anyway): {}",
                        e
                    )
                }
            }
        }

        *self.cache.lock().await = Some(CachedSnapshot {
            snapshot: build_snapshot(essential_states, optional_states),
            stored_at: Instant::now(),
        });

        if essential_granted {
            tracing::info!("✅ Essential WiFi permissions granted successfully");
            return Ok(PermissionGrant { already_granted: false });
        }

        let denied: Vec<Permission> = essential
            .iter()
            .copied()
            .filter(|&p| status_of(p) != PermissionStatus::Granted)
            .collect();
        let never_ask_again: Vec<Permission> = essential
            .iter()
            .copied()
            .filter(|&p| status_of(p) == PermissionStatus::NeverAskAgain)
            .collect();
        tracing::warn!("❌ Essential WiFi permissions denied: {:?}", denied);

        let mut error =
            "Location permissions are required for WiFi scanning and device discovery.".to_string();
        let remedy = if never_ask_again.is_empty() {
            error.push_str(" Please grant location permissions to enable device discovery.");
            Remedy::Retry
        } else {
            error.push_str(
                " Some permissions were permanently denied. Please enable them manually in your device settings.",
            );
            Remedy::OpenSettings
        };

        Err(PermissionDenial {
            error,
            detailed_error: Some(
                "Location permission is required by Android for WiFi scanning. This is a security measure to protect user privacy."
                    .to_string(),
            ),
            remedy,
            can_retry: remedy == Remedy::Retry,
            can_open_settings: true,
            denied,
            never_ask_again,
            permissions_needed: vec![
                "Fine Location (required for WiFi scanning)",
                "Coarse Location (required for network discovery)",
            ],
        })
    }

    /// Per-permission breakdown, always fresh.
    pub async fn status(&self) -> PermissionReport {
        if !self.platform.is_android() {
            return PermissionReport {
                platform: self.platform.os,
                required: false,
                essential_granted: true,
                all_granted: true,
                permissions: Vec::new(),
            };
        }

        let mut permissions = self.query_all(&self.essential_permissions(), true).await;
        permissions.extend(self.query_all(&self.optional_permissions(), false).await);

        PermissionReport {
            platform: self.platform.os,
            required: true,
            essential_granted: permissions.iter().filter(|s| s.required).all(|s| s.granted),
            all_granted: permissions.iter().all(|s| s.granted),
            permissions,
        }
    }

    async fn query_all(&self, permissions: &[Permission], required: bool) -> Vec<PermissionState> {
        let mut states = Vec::with_capacity(permissions.len());
        for &permission in permissions {
            let granted = match self.os.check(permission).await {
                Ok(g) => g,
                Err(e) => {
                    tracing::warn!("⚠️ Error checking permission {}: {}", permission, e);
                    false
                }
            };
            states.push(PermissionState {
                permission,
                granted,
                required,
            });
        }
        states
    }
}

fn build_snapshot(
    essential: Vec<PermissionState>,
    optional: Vec<PermissionState>,
) -> PermissionSnapshot {
    let granted = essential.iter().all(|s| s.granted);
    PermissionSnapshot {
        granted,
        all_optional_granted: optional.iter().all(|s| s.granted),
        needs_permissions: !granted,
        essential,
        optional,
        checked_at: Utc::now(),
        from_cache: false,
    }
}

fn granted_without_os_call() -> PermissionSnapshot {
    PermissionSnapshot {
        granted: true,
        essential: Vec::new(),
        optional: Vec::new(),
        all_optional_granted: true,
        needs_permissions: false,
        checked_at: Utc::now(),
        from_cache: false,
    }
}
