#![allow(dead_code)]

// 集成测试共用的假协作者，全部带调用计数

use async_trait::async_trait;
use dispenser_core::config::ScannerConfig;
use dispenser_core::loader::NativeModuleLoader;
use dispenser_core::permissions::PermissionGate;
use dispenser_core::registration::{DeviceStatus, RegisteredDevice, RegistrationPayload};
use dispenser_core::scanner::WifiScanner;
use dispenser_core::structs::{ConnectionType, NetworkState, Platform, RawNetwork};
use dispenser_core::traits::{
    NetworkStatusProvider, Permission, PermissionPlatform, PermissionStatus, RegistrationBackend,
    WifiMethod, WifiModule, WifiModuleProvider,
};
use dispenser_core::{Error, Result};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub fn raw(ssid: &str, level: i32) -> RawNetwork {
    RawNetwork {
        ssid: ssid.to_string(),
        bssid: Some(format!("aa:bb:cc:{:02x}:00:01", level.unsigned_abs())),
        level: Some(level),
        frequency: Some(2437),
        capabilities: Some("[WPA2-PSK-CCMP][ESS]".to_string()),
    }
}

// ============= 权限 =============

#[derive(Default)]
pub struct FakePermissions {
    granted: Mutex<HashSet<Permission>>,
    answers: Mutex<HashMap<Permission, PermissionStatus>>,
    fail_requests: AtomicBool,
    pub checks: AtomicUsize,
    pub requests: Mutex<Vec<Vec<Permission>>>,
}

impl FakePermissions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn granting_all() -> Arc<Self> {
        let fake = Self::default();
        fake.grant(&[
            Permission::FineLocation,
            Permission::CoarseLocation,
            Permission::BackgroundLocation,
        ]);
        Arc::new(fake)
    }

    pub fn grant(&self, permissions: &[Permission]) {
        self.granted.lock().unwrap().extend(permissions.iter().copied());
    }

    /// How the "user" answers a future request for `permission`.
    /// Unscripted permissions are granted.
    pub fn answer(&self, permission: Permission, status: PermissionStatus) {
        self.answers.lock().unwrap().insert(permission, status);
    }

    pub fn fail_requests(&self) {
        self.fail_requests.store(true, Ordering::SeqCst);
    }

    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn request_log(&self) -> Vec<Vec<Permission>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PermissionPlatform for FakePermissions {
    async fn check(&self, permission: Permission) -> Result<bool> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.granted.lock().unwrap().contains(&permission))
    }

    async fn request_multiple(
        &self,
        permissions: &[Permission],
    ) -> Result<Vec<(Permission, PermissionStatus)>> {
        self.requests.lock().unwrap().push(permissions.to_vec());
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(Error::Permission("activity not attached".into()));
        }
        let answers = self.answers.lock().unwrap();
        let mut granted = self.granted.lock().unwrap();
        Ok(permissions
            .iter()
            .map(|p| {
                let status = answers.get(p).copied().unwrap_or(PermissionStatus::Granted);
                if status == PermissionStatus::Granted {
                    granted.insert(*p);
                }
                (*p, status)
            })
            .collect())
    }
}

// ============= 网络状态 =============

pub struct FakeNetwork {
    state: Mutex<NetworkState>,
    ip: Mutex<Option<Ipv4Addr>>,
}

impl FakeNetwork {
    pub fn wifi(ip: [u8; 4]) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(NetworkState {
                is_connected: true,
                is_internet_reachable: Some(true),
                connection_type: ConnectionType::Wifi,
            }),
            ip: Mutex::new(Some(Ipv4Addr::from(ip))),
        })
    }

    pub fn cellular() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(NetworkState {
                is_connected: true,
                is_internet_reachable: Some(true),
                connection_type: ConnectionType::Cellular,
            }),
            ip: Mutex::new(Some(Ipv4Addr::new(10, 20, 30, 40))),
        })
    }

    pub fn offline() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(NetworkState {
                is_connected: false,
                is_internet_reachable: Some(false),
                connection_type: ConnectionType::Unknown,
            }),
            ip: Mutex::new(None),
        })
    }
}

#[async_trait]
impl NetworkStatusProvider for FakeNetwork {
    async fn network_state(&self) -> Result<NetworkState> {
        Ok(*self.state.lock().unwrap())
    }

    async fn ip_address(&self) -> Result<Option<Ipv4Addr>> {
        Ok(*self.ip.lock().unwrap())
    }
}

// ============= 原生模块 =============

#[derive(Debug, Clone)]
pub enum ScanStep {
    Networks(Vec<RawNetwork>),
    Fail(&'static str),
    /// Never returns; only the scan timeout gets past it.
    Hang,
}

pub struct FakeModule {
    methods: Vec<WifiMethod>,
    script: Mutex<VecDeque<ScanStep>>,
    ssid: Option<String>,
    pub scans: AtomicUsize,
}

impl FakeModule {
    pub fn new(ssid: Option<&str>, script: Vec<ScanStep>) -> Arc<Self> {
        Self::with_methods(WifiMethod::REQUIRED.to_vec(), ssid, script)
    }

    pub fn with_methods(
        methods: Vec<WifiMethod>,
        ssid: Option<&str>,
        script: Vec<ScanStep>,
    ) -> Arc<Self> {
        Arc::new(Self {
            methods,
            script: Mutex::new(script.into()),
            ssid: ssid.map(str::to_string),
            scans: AtomicUsize::new(0),
        })
    }

    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WifiModule for FakeModule {
    fn methods(&self) -> Vec<WifiMethod> {
        self.methods.clone()
    }

    async fn load_wifi_list(&self) -> Result<Vec<RawNetwork>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ScanStep::Networks(Vec::new()));
        match step {
            ScanStep::Networks(n) => Ok(n),
            ScanStep::Fail(msg) => Err(Error::Module(msg.to_string())),
            ScanStep::Hang => std::future::pending().await,
        }
    }

    async fn current_ssid(&self) -> Result<Option<String>> {
        Ok(self.ssid.clone())
    }

    async fn frequency(&self) -> Result<Option<u32>> {
        Ok(Some(2437))
    }

    async fn current_signal_strength(&self) -> Result<i32> {
        Ok(-55)
    }

    async fn bssid(&self) -> Result<Option<String>> {
        Ok(Some("aa:bb:cc:dd:ee:ff".to_string()))
    }
}

pub struct FakeProvider {
    module: Option<Arc<FakeModule>>,
    pub loads: AtomicUsize,
}

impl FakeProvider {
    pub fn with(module: Arc<FakeModule>) -> Arc<Self> {
        Arc::new(Self {
            module: Some(module),
            loads: AtomicUsize::new(0),
        })
    }

    pub fn missing() -> Arc<Self> {
        Arc::new(Self {
            module: None,
            loads: AtomicUsize::new(0),
        })
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl WifiModuleProvider for FakeProvider {
    fn load(&self) -> Result<Arc<dyn WifiModule>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.module {
            Some(module) => Ok(module.clone() as Arc<dyn WifiModule>),
            None => Err(Error::Module("native module is not linked".into())),
        }
    }
}

// ============= 组装 =============

pub struct Harness {
    pub scanner: Arc<WifiScanner>,
    pub permissions: Arc<FakePermissions>,
    pub provider: Arc<FakeProvider>,
}

pub fn harness(
    platform: Platform,
    permissions: Arc<FakePermissions>,
    network: Arc<FakeNetwork>,
    provider: Arc<FakeProvider>,
) -> Harness {
    let gate = Arc::new(PermissionGate::new(
        platform,
        permissions.clone(),
        Duration::from_secs(5),
    ));
    let loader = Arc::new(NativeModuleLoader::new(provider.clone(), 3));
    loader.initialize();
    let scanner = Arc::new(WifiScanner::new(
        platform,
        network,
        gate,
        loader,
        ScannerConfig::default(),
    ));
    Harness {
        scanner,
        permissions,
        provider,
    }
}

// ============= 注册后端 =============

#[derive(Default)]
pub struct FakeRegistration {
    existing: Mutex<HashSet<String>>,
    fail_checks: AtomicBool,
    pub checks: Mutex<Vec<String>>,
    pub registered: Mutex<Vec<RegistrationPayload>>,
}

impl FakeRegistration {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_existing(device_id: &str) -> Arc<Self> {
        let fake = Self::default();
        fake.existing.lock().unwrap().insert(device_id.to_string());
        Arc::new(fake)
    }

    pub fn fail_checks(&self) {
        self.fail_checks.store(true, Ordering::SeqCst);
    }

    pub fn registered(&self) -> Vec<RegistrationPayload> {
        self.registered.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistrationBackend for FakeRegistration {
    async fn check_device_status(&self, _token: &str, device_id: &str) -> Result<DeviceStatus> {
        self.checks.lock().unwrap().push(device_id.to_string());
        if self.fail_checks.load(Ordering::SeqCst) {
            return Err(Error::Api("status service unavailable".into()));
        }
        let exists = self.existing.lock().unwrap().contains(device_id);
        Ok(DeviceStatus {
            exists,
            device: exists.then(|| json!({ "name": "Lobby Dispenser", "device_id": device_id })),
        })
    }

    async fn register_device(
        &self,
        _token: &str,
        payload: &RegistrationPayload,
    ) -> Result<RegisteredDevice> {
        self.registered.lock().unwrap().push(payload.clone());
        self.existing.lock().unwrap().insert(payload.device_id.clone());
        Ok(RegisteredDevice {
            name: Some(payload.name.clone()),
            device_id: Some(payload.device_id.clone()),
            extra: Default::default(),
        })
    }
}
