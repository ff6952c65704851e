mod common;

use common::{
    FakeModule, FakeNetwork, FakePermissions, FakeProvider, ScanStep, harness, raw,
};
use dispenser_core::scanner::{MethodCheck, Probe, ScanFailureKind};
use dispenser_core::structs::{ConnectionType, Platform};
use dispenser_core::traits::{Permission, PermissionStatus, WifiMethod};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

fn android() -> Platform {
    Platform::android(33)
}

#[tokio::test(start_paused = true)]
async fn test_scan_dedupes_and_sorts() {
    let module = FakeModule::new(
        Some("HomeNet"),
        vec![ScanStep::Networks(vec![
            raw("Cafe", -75),
            raw("HomeNet", -62),
            raw("HomeNet", -41),
            raw("", -30),
            raw("Office", -58),
        ])],
    );
    let h = harness(
        android(),
        FakePermissions::granting_all(),
        FakeNetwork::wifi([192, 168, 1, 23]),
        FakeProvider::with(module.clone()),
    );

    let scan = h.scanner.scan_wifi_networks(&CancellationToken::new()).await.unwrap();

    let ssids: Vec<&str> = scan.networks.iter().map(|n| n.ssid.as_str()).collect();
    assert_eq!(ssids, vec!["HomeNet", "Office", "Cafe"]);
    assert_eq!(scan.networks[0].signal, -41);
    assert!(scan.networks[0].is_current);
    assert!(!scan.networks[1].is_current);
    assert_eq!(scan.total_found, 3);
    assert_eq!(scan.scan_attempts, 1);
    assert_eq!(scan.method, "native_module");
    assert!(scan.real_wifi);
    assert_eq!(module.scan_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_module_fails_before_permissions() {
    let h = harness(
        android(),
        FakePermissions::new(),
        FakeNetwork::wifi([192, 168, 1, 23]),
        FakeProvider::missing(),
    );
    let cancel = CancellationToken::new();

    // construction used the first load attempt; each scan retries once
    let failure = h.scanner.scan_wifi_networks(&cancel).await.unwrap_err();
    assert_eq!(failure.kind, ScanFailureKind::ModuleUnavailable);
    let failure = h.scanner.scan_wifi_networks(&cancel).await.unwrap_err();
    assert_eq!(failure.kind, ScanFailureKind::ModuleUnavailable);

    let failure = h.scanner.scan_wifi_networks(&cancel).await.unwrap_err();
    assert_eq!(failure.kind, ScanFailureKind::MaxAttemptsReached);
    assert_eq!(h.provider.load_count(), 3);

    // no permission prompt and no fake results
    assert!(h.permissions.request_log().is_empty());
    assert_eq!(h.permissions.check_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_three_timeouts_take_33_seconds() {
    let module = FakeModule::new(
        Some("HomeNet"),
        vec![ScanStep::Hang, ScanStep::Hang, ScanStep::Hang],
    );
    let h = harness(
        android(),
        FakePermissions::granting_all(),
        FakeNetwork::wifi([192, 168, 1, 23]),
        FakeProvider::with(module.clone()),
    );

    let started = Instant::now();
    let failure = h
        .scanner
        .scan_wifi_networks(&CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(started.elapsed(), Duration::from_secs(33));
    assert_eq!(failure.kind, ScanFailureKind::ScanFailed);
    assert_eq!(failure.scan_attempts, Some(3));
    assert_eq!(
        failure.error,
        "WiFi scan failed after multiple attempts: WiFi scan timed out after 10 seconds"
    );
    assert_eq!(module.scan_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_error_then_success_waits_backoff() {
    let module = FakeModule::new(
        Some("HomeNet"),
        vec![
            ScanStep::Fail("scan throttled"),
            ScanStep::Networks(vec![raw("HomeNet", -50)]),
        ],
    );
    let h = harness(
        android(),
        FakePermissions::granting_all(),
        FakeNetwork::wifi([192, 168, 1, 23]),
        FakeProvider::with(module),
    );

    let started = Instant::now();
    let scan = h.scanner.scan_wifi_networks(&CancellationToken::new()).await.unwrap();
    assert_eq!(started.elapsed(), Duration::from_millis(1_500));
    assert_eq!(scan.scan_attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_results_end_as_no_networks() {
    let module = FakeModule::new(Some("HomeNet"), Vec::new());
    let h = harness(
        android(),
        FakePermissions::granting_all(),
        FakeNetwork::wifi([192, 168, 1, 23]),
        FakeProvider::with(module.clone()),
    );

    let failure = h
        .scanner
        .scan_wifi_networks(&CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(failure.kind, ScanFailureKind::NoNetworksFound);
    assert_eq!(failure.last_error.as_deref(), Some("No networks found in attempt 3"));
    assert_eq!(module.scan_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_a_hanging_scan() {
    let module = FakeModule::new(Some("HomeNet"), vec![ScanStep::Hang]);
    let h = harness(
        android(),
        FakePermissions::granting_all(),
        FakeNetwork::wifi([192, 168, 1, 23]),
        FakeProvider::with(module.clone()),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(4)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let failure = h.scanner.scan_wifi_networks(&cancel).await.unwrap_err();
    assert_eq!(failure.kind, ScanFailureKind::Cancelled);
    assert_eq!(started.elapsed(), Duration::from_secs(4));
    assert_eq!(module.scan_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_denied_permission_blocks_scan() {
    let permissions = FakePermissions::new();
    permissions.answer(Permission::FineLocation, PermissionStatus::NeverAskAgain);
    let module = FakeModule::new(
        Some("HomeNet"),
        vec![ScanStep::Networks(vec![raw("HomeNet", -50)])],
    );
    let h = harness(
        android(),
        permissions,
        FakeNetwork::wifi([192, 168, 1, 23]),
        FakeProvider::with(module.clone()),
    );

    let failure = h
        .scanner
        .scan_wifi_networks(&CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(failure.kind, ScanFailureKind::PermissionDenied);
    assert!(failure.can_open_settings);
    assert!(failure.permission_error.unwrap().contains("permanently denied"));
    assert_eq!(module.scan_count(), 0);
}

#[tokio::test]
async fn test_network_info_uses_native_details() {
    let module = FakeModule::new(Some("HomeNet"), Vec::new());
    let h = harness(
        android(),
        FakePermissions::granting_all(),
        FakeNetwork::wifi([192, 168, 1, 23]),
        FakeProvider::with(module),
    );

    let info = h.scanner.current_network_info().await.unwrap();
    assert_eq!(info.ssid.as_deref(), Some("HomeNet"));
    assert!(info.native_wifi_available);
    let details = info.connection_details.unwrap();
    assert!(details.real_wifi);
    assert_eq!(details.frequency_mhz, Some(2437));
    assert_eq!(details.bssid.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
}

#[tokio::test]
async fn test_network_info_falls_back_without_module() {
    let h = harness(
        android(),
        FakePermissions::granting_all(),
        FakeNetwork::wifi([192, 168, 1, 23]),
        FakeProvider::missing(),
    );

    let info = h.scanner.current_network_info().await.unwrap();
    assert_eq!(info.ssid.as_deref(), Some("Connected WiFi Network"));
    assert!(!info.native_wifi_available);
    let details = info.connection_details.unwrap();
    assert!(details.fallback);
    assert_eq!(details.frequency_mhz, Some(2400));
}

#[tokio::test]
async fn test_device_scan_stub_reports_subnet() {
    let h = harness(
        android(),
        FakePermissions::granting_all(),
        FakeNetwork::wifi([192, 168, 1, 23]),
        FakeProvider::missing(),
    );

    let scan = h.scanner.scan_local_devices().await.unwrap();
    assert_eq!(scan.subnet, "192.168.1.0/24");
    assert_eq!(scan.current_ip.to_string(), "192.168.1.23");
    assert!(scan.devices.is_empty());
    assert!(!scan.real_network_scan);
    assert_eq!(scan.scan_method, "real_scan_not_available");
}

#[tokio::test]
async fn test_device_scan_requires_wifi() {
    let h = harness(
        android(),
        FakePermissions::granting_all(),
        FakeNetwork::cellular(),
        FakeProvider::missing(),
    );
    let failure = h.scanner.scan_local_devices().await.unwrap_err();
    assert_eq!(failure.kind, ScanFailureKind::NotWifi);

    let h = harness(
        android(),
        FakePermissions::granting_all(),
        FakeNetwork::offline(),
        FakeProvider::missing(),
    );
    let failure = h.scanner.scan_local_devices().await.unwrap_err();
    assert_eq!(failure.kind, ScanFailureKind::NotConnected);
}

#[tokio::test]
async fn test_detailed_status_when_offline() {
    let h = harness(
        android(),
        FakePermissions::granting_all(),
        FakeNetwork::offline(),
        FakeProvider::missing(),
    );

    let status = h.scanner.detailed_network_status().await;
    assert!(!status.is_connected);
    assert!(status.is_airplane_mode_enabled);
    assert!(!status.can_scan_wifi);
    assert_eq!(status.connection_type, ConnectionType::Unknown);
    assert!(status.device_scan.is_none());
}

#[tokio::test]
async fn test_diagnose_reports_partial_module() {
    let module = FakeModule::with_methods(
        vec![WifiMethod::LoadWifiList, WifiMethod::GetCurrentWifiSsid],
        Some("HomeNet"),
        Vec::new(),
    );
    let h = harness(
        android(),
        FakePermissions::granting_all(),
        FakeNetwork::wifi([192, 168, 1, 23]),
        FakeProvider::with(module),
    );

    let report = h.scanner.diagnose().await;
    assert!(report.capability.native_available);
    assert_eq!(report.method_availability.len(), WifiMethod::REQUIRED.len());
    assert!(report.method_availability.contains(&MethodCheck {
        method: WifiMethod::LoadWifiList,
        available: true,
    }));
    assert!(report.method_availability.contains(&MethodCheck {
        method: WifiMethod::GetBssid,
        available: false,
    }));
    assert_eq!(
        report.wifi_info,
        Some(Probe::Passed {
            value: Some("HomeNet".to_string())
        })
    );
    match report.network_state {
        Probe::Passed { value } => {
            assert!(value.is_connected);
            assert_eq!(value.connection_type, ConnectionType::Wifi);
        }
        other => panic!("unexpected probe: {:?}", other),
    }
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn test_diagnose_without_module_spends_no_attempt() {
    let h = harness(
        android(),
        FakePermissions::granting_all(),
        FakeNetwork::offline(),
        FakeProvider::missing(),
    );

    let report = h.scanner.diagnose().await;
    assert!(!report.capability.native_available);
    assert!(report.method_availability.is_empty());
    assert!(report.wifi_info.is_none());
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Module import failed:"));
    assert!(report.errors[0].contains("not linked"));

    // only the load from construction
    assert_eq!(h.provider.load_count(), 1);
    assert_eq!(report.capability.init_attempts, 1);
}
