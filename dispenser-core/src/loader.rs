//! Bounded loader for the optional native WiFi module.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::traits::{WifiMethod, WifiModule, WifiModuleProvider};

/// Read-only view of the loader state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannerCapability {
    pub native_available: bool,
    pub init_attempts: u32,
    pub max_attempts: u32,
    pub methods: Vec<WifiMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Default)]
struct LoaderState {
    module: Option<Arc<dyn WifiModule>>,
    methods: Vec<WifiMethod>,
    attempts: u32,
    last_error: Option<String>,
}

/// Resolves the native module through a [`WifiModuleProvider`] at most
/// `max_attempts` times over the loader's lifetime.
pub struct NativeModuleLoader {
    provider: Arc<dyn WifiModuleProvider>,
    max_attempts: u32,
    state: Mutex<LoaderState>,
}

impl NativeModuleLoader {
    pub fn new(provider: Arc<dyn WifiModuleProvider>, max_attempts: u32) -> Self {
        Self {
            provider,
            max_attempts,
            state: Mutex::new(LoaderState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoaderState> {
        // 状态里只有简单字段，锁中毒后继续使用内部数据即可
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Loads and validates the module. Returns `false` on any failure, or
    /// once the attempt budget is spent.
    pub fn initialize(&self) -> bool {
        let mut state = self.lock();
        if state.attempts >= self.max_attempts {
            tracing::warn!("⚠️ Maximum initialization attempts reached");
            return false;
        }
        state.attempts += 1;
        let attempt = state.attempts;
        tracing::info!(
            "🔄 Attempting WiFi module initialization (attempt {}/{})",
            attempt,
            self.max_attempts
        );

        state.module = None;
        state.methods.clear();

        let loaded = self.provider.load().and_then(|module| {
            let methods = module.methods();
            let missing: Vec<WifiMethod> = WifiMethod::REQUIRED
                .iter()
                .copied()
                .filter(|m| !methods.contains(m))
                .collect();
            if !missing.is_empty() {
                tracing::warn!("⚠️ Missing methods on native WiFi module: {:?}", missing);
            }
            if !methods.contains(&WifiMethod::LoadWifiList) {
                return Err(crate::Error::Unsupported(WifiMethod::LoadWifiList));
            }
            Ok((module, methods))
        });

        match loaded {
            Ok((module, methods)) => {
                tracing::info!(
                    "✅ Native WiFi module loaded and validated ({}/{} methods)",
                    WifiMethod::REQUIRED.iter().filter(|m| methods.contains(m)).count(),
                    WifiMethod::REQUIRED.len()
                );
                state.module = Some(module);
                state.methods = methods;
                state.last_error = None;
                true
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ Native WiFi module initialization failed (attempt {}): {}",
                    attempt,
                    e
                );
                state.last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Same as [`initialize`](Self::initialize); a no-op past the bound.
    pub fn retry(&self) -> bool {
        if self.attempts_exhausted() {
            tracing::warn!("⚠️ Maximum initialization attempts reached");
            return false;
        }
        tracing::info!("🔄 Retrying WiFi module initialization...");
        self.initialize()
    }

    pub fn module(&self) -> Option<Arc<dyn WifiModule>> {
        self.lock().module.clone()
    }

    pub fn is_available(&self) -> bool {
        self.lock().module.is_some()
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.lock().attempts >= self.max_attempts
    }

    pub fn status(&self) -> ScannerCapability {
        let state = self.lock();
        ScannerCapability {
            native_available: state.module.is_some(),
            init_attempts: state.attempts,
            max_attempts: self.max_attempts,
            methods: state.methods.clone(),
            last_error: state.last_error.clone(),
        }
    }
}
