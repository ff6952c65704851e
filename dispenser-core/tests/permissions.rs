mod common;

use common::FakePermissions;
use dispenser_core::permissions::{PermissionGate, Remedy};
use dispenser_core::structs::Platform;
use dispenser_core::traits::{Permission, PermissionStatus};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::advance;

const TTL: Duration = Duration::from_secs(5);

fn gate(platform: Platform, os: &Arc<FakePermissions>) -> PermissionGate {
    PermissionGate::new(platform, os.clone(), TTL)
}

#[tokio::test]
async fn test_non_android_needs_no_os_calls() {
    let os = FakePermissions::new();
    let gate = gate(Platform::ios(17), &os);

    let snapshot = gate.check().await;
    assert!(snapshot.granted);
    assert!(!snapshot.needs_permissions);
    assert!(gate.request().await.unwrap().already_granted);

    assert_eq!(os.check_count(), 0);
    assert!(os.request_log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_reused_within_ttl() {
    let os = FakePermissions::granting_all();
    // API 28: only the two essential permissions are queried
    let gate = gate(Platform::android(28), &os);

    let first = gate.check().await;
    assert!(first.granted);
    assert!(!first.from_cache);
    assert_eq!(os.check_count(), 2);

    advance(Duration::from_millis(4_900)).await;
    let second = gate.check().await;
    assert!(second.from_cache);
    assert_eq!(second.checked_at, first.checked_at);
    assert_eq!(os.check_count(), 2);

    advance(Duration::from_millis(200)).await;
    let third = gate.check().await;
    assert!(!third.from_cache);
    assert_eq!(os.check_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_denial_is_rechecked_every_time() {
    let os = FakePermissions::new();
    let gate = gate(Platform::android(28), &os);

    assert!(!gate.check().await.granted);
    let second = gate.check().await;
    assert!(!second.granted);
    assert!(!second.from_cache);
    assert_eq!(os.check_count(), 4);

    // Granted in the OS settings; picked up without a reset
    os.grant(&[Permission::FineLocation, Permission::CoarseLocation]);
    assert!(gate.check().await.granted);
    assert_eq!(os.check_count(), 6);

    assert!(gate.check().await.from_cache);
    assert_eq!(os.check_count(), 6);
}

#[tokio::test]
async fn test_optional_permission_only_on_newer_android() {
    let os = FakePermissions::new();
    assert!(gate(Platform::android(28), &os).optional_permissions().is_empty());
    assert_eq!(
        gate(Platform::android(29), &os).optional_permissions(),
        vec![Permission::BackgroundLocation]
    );
    assert!(gate(Platform::ios(17), &os).essential_permissions().is_empty());
}

#[tokio::test]
async fn test_request_already_granted() {
    let os = FakePermissions::granting_all();
    let gate = gate(Platform::android(33), &os);

    let grant = gate.request().await.unwrap();
    assert!(grant.already_granted);
    assert!(os.request_log().is_empty());
}

#[tokio::test]
async fn test_request_asks_optional_after_essentials() {
    let os = FakePermissions::new();
    let gate = gate(Platform::android(33), &os);

    let grant = gate.request().await.unwrap();
    assert!(!grant.already_granted);
    assert_eq!(
        os.request_log(),
        vec![
            vec![Permission::FineLocation, Permission::CoarseLocation],
            vec![Permission::BackgroundLocation],
        ]
    );

    let (granted, _) = gate.cached_state().await.unwrap();
    assert!(granted);
}

#[tokio::test]
async fn test_optional_denial_does_not_fail_request() {
    let os = FakePermissions::new();
    os.answer(Permission::BackgroundLocation, PermissionStatus::Denied);
    let gate = gate(Platform::android(33), &os);

    assert!(gate.request().await.is_ok());
    let snapshot = gate.check().await;
    assert!(snapshot.granted);
    assert!(!snapshot.all_optional_granted);
}

#[tokio::test]
async fn test_denied_essentials_skip_optional_and_offer_retry() {
    let os = FakePermissions::new();
    os.answer(Permission::FineLocation, PermissionStatus::Denied);
    let gate = gate(Platform::android(33), &os);

    let denial = gate.request().await.unwrap_err();
    assert_eq!(denial.remedy, Remedy::Retry);
    assert!(denial.can_retry);
    assert_eq!(denial.denied, vec![Permission::FineLocation]);
    assert!(denial.never_ask_again.is_empty());
    assert!(denial.error.starts_with("Location permissions are required"));

    // The optional batch was never requested
    assert_eq!(os.request_log().len(), 1);
}

#[tokio::test]
async fn test_never_ask_again_points_to_settings() {
    let os = FakePermissions::new();
    os.answer(Permission::CoarseLocation, PermissionStatus::NeverAskAgain);
    let gate = gate(Platform::android(33), &os);

    let denial = gate.request().await.unwrap_err();
    assert_eq!(denial.remedy, Remedy::OpenSettings);
    assert!(!denial.can_retry);
    assert!(denial.can_open_settings);
    assert_eq!(denial.never_ask_again, vec![Permission::CoarseLocation]);
    assert!(denial.error.contains("permanently denied"));
}

#[tokio::test]
async fn test_request_error_is_reported() {
    let os = FakePermissions::new();
    os.fail_requests();
    let gate = gate(Platform::android(33), &os);

    let denial = gate.request().await.unwrap_err();
    assert!(denial.error.starts_with("Permission request failed:"));
    assert_eq!(denial.remedy, Remedy::Retry);
}

#[tokio::test]
async fn test_status_is_never_cached() {
    let os = FakePermissions::new();
    os.grant(&[Permission::FineLocation, Permission::CoarseLocation]);
    let gate = gate(Platform::android(33), &os);

    let report = gate.status().await;
    assert!(report.required);
    assert!(report.essential_granted);
    assert!(!report.all_granted);
    assert_eq!(report.permissions.len(), 3);

    gate.status().await;
    assert_eq!(os.check_count(), 6);
    assert!(gate.cached_state().await.is_none());
}
