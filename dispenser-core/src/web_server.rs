use crate::classifier::{self, ScanResult};
use crate::factory::Services;
use crate::registration::{self, RegistrationFailure, UserFields};
use crate::scanner::{ScanFailure, ScanFailureKind};
use crate::settings::{self, SettingsTarget};
use crate::structs::{DeviceDescriptor, WifiCredential};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

// The shared state for our web server.
pub type WebServerState = State<Arc<AppState>>;

pub struct AppState {
    pub services: Services,
    /// 进程退出时取消，正在进行的扫描会在下一个等待点停止
    pub shutdown: CancellationToken,
}

/// Builds the router. Exposed separately so tests can serve it on an
/// ephemeral port.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/qr", post(api_classify_qr))
        .route("/api/qr/process", post(api_process_qr))
        .route("/api/flow/wifi", post(api_wifi_handoff))
        .route("/api/flow/continue", post(api_continue_after_wifi))
        .route("/api/flow/manual", post(api_manual_connection))
        .route("/api/flow/retry", post(api_retry_after_wifi))
        .route("/api/flow/rescan", post(api_retry_device_scan))
        .route("/api/scan", get(api_scan_wifi))
        .route("/api/devices/scan", get(api_scan_devices))
        .route("/api/network", get(api_network_info))
        .route("/api/status", get(api_status))
        .route("/api/permissions", get(api_permission_status))
        .route("/api/permissions/request", post(api_request_permissions))
        .route("/api/permissions/reset", post(api_reset_permissions))
        .route("/api/scanner/retry", post(api_retry_scanner))
        .route("/api/scanner/diagnostics", get(api_diagnose_scanner))
        .route("/api/registration/format", post(api_format_registration))
        .route("/api/registration", post(api_register_device))
        .route("/api/settings/{target}", post(api_open_settings))
        // Captive portal detection for Android
        .route("/generate_204", get(handle_captive_portal))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the Axum web server and runs until `state.shutdown` is cancelled.
pub async fn start_web_server(state: Arc<AppState>, bind_addr: SocketAddr) -> crate::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("🌐 Web server listening on {}", listener.local_addr()?);
    serve(listener, state).await
}

pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> crate::Result<()> {
    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    tracing::info!("🛑 Web server stopped");
    Ok(())
}

// --- Response helpers ---

#[derive(Serialize)]
struct Success<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(Success { success: true, body })).into_response()
}

fn fail<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, Json(Success { success: false, body })).into_response()
}

fn internal_error(e: crate::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    )
        .into_response()
}

fn scan_failure(f: ScanFailure) -> Response {
    let status = match f.kind {
        ScanFailureKind::PermissionDenied => StatusCode::FORBIDDEN,
        ScanFailureKind::ModuleUnavailable | ScanFailureKind::MaxAttemptsReached => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ScanFailureKind::NoNetworksFound => StatusCode::NOT_FOUND,
        ScanFailureKind::NotConnected
        | ScanFailureKind::NotWifi
        | ScanFailureKind::NoIpAddress
        | ScanFailureKind::NetworkUnavailable => StatusCode::CONFLICT,
        ScanFailureKind::ScanFailed | ScanFailureKind::Cancelled => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    fail(status, f)
}

fn registration_failure(token: &str, f: RegistrationFailure) -> Response {
    let status = if token.trim().is_empty() {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::BAD_GATEWAY
    };
    fail(status, f)
}

/// `Authorization: Bearer <token>`; a missing header yields an empty token,
/// which the registrar rejects.
fn bearer_token(headers: &HeaderMap) -> String {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .trim()
        .to_string()
}

// --- Route Handlers ---

#[derive(Deserialize)]
pub struct QrRequest {
    data: String,
    #[serde(default)]
    fields: UserFields,
}

#[derive(Deserialize)]
pub struct DeviceRequest {
    device: DeviceDescriptor,
    #[serde(default)]
    fields: UserFields,
}

/// Classifies a scanned code without side effects.
async fn api_classify_qr(Json(req): Json<QrRequest>) -> impl IntoResponse {
    let result = ScanResult::from_classification(&req.data, classifier::classify(&req.data));
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(result))
}

async fn api_process_qr(
    State(state): WebServerState,
    headers: HeaderMap,
    Json(req): Json<QrRequest>,
) -> Response {
    let token = bearer_token(&headers);
    match state.services.flow.process_qr(&token, &req.data, &req.fields).await {
        Ok(step) => ok(step),
        Err(f) => fail(StatusCode::UNPROCESSABLE_ENTITY, f),
    }
}

async fn api_wifi_handoff(
    State(state): WebServerState,
    Json(wifi): Json<WifiCredential>,
) -> Response {
    match state.services.flow.process_wifi_handoff(wifi).await {
        Ok(step) => ok(step),
        Err(f) => fail(StatusCode::UNPROCESSABLE_ENTITY, f),
    }
}

async fn api_continue_after_wifi(
    State(state): WebServerState,
    Json(wifi): Json<WifiCredential>,
) -> Response {
    match state.services.flow.continue_after_wifi(wifi).await {
        Ok(step) => ok(step),
        Err(f) => fail(StatusCode::CONFLICT, f),
    }
}

async fn api_manual_connection(
    State(state): WebServerState,
    Json(wifi): Json<WifiCredential>,
) -> Response {
    match state.services.flow.handle_manual_connection(wifi).await {
        Ok(step) => ok(step),
        Err(f) => fail(StatusCode::CONFLICT, f),
    }
}

async fn api_retry_after_wifi(
    State(state): WebServerState,
    Json(wifi): Json<WifiCredential>,
) -> Response {
    match state.services.flow.retry_after_wifi(wifi).await {
        Ok(step) => ok(step),
        Err(f) => fail(StatusCode::CONFLICT, f),
    }
}

async fn api_retry_device_scan(State(state): WebServerState) -> Response {
    match state.services.flow.retry_device_scan().await {
        Ok(step) => ok(step),
        Err(f) => fail(StatusCode::CONFLICT, f),
    }
}

/// API endpoint to scan for Wi-Fi networks.
async fn api_scan_wifi(State(state): WebServerState) -> Response {
    let cancel = state.shutdown.child_token();
    match state.services.scanner.scan_wifi_networks(&cancel).await {
        Ok(scan) => ok(scan),
        Err(f) => scan_failure(f),
    }
}

async fn api_scan_devices(State(state): WebServerState) -> Response {
    match state.services.scanner.scan_local_devices().await {
        Ok(scan) => ok(scan),
        Err(f) => scan_failure(f),
    }
}

async fn api_network_info(State(state): WebServerState) -> Response {
    match state.services.scanner.current_network_info().await {
        Ok(info) => ok(info),
        Err(e) => internal_error(e),
    }
}

async fn api_status(State(state): WebServerState) -> Response {
    ok(state.services.scanner.detailed_network_status().await)
}

async fn api_permission_status(State(state): WebServerState) -> Response {
    ok(state.services.scanner.permissions().status().await)
}

async fn api_request_permissions(State(state): WebServerState) -> Response {
    match state.services.scanner.permissions().request().await {
        Ok(grant) => ok(grant),
        Err(denial) => fail(StatusCode::FORBIDDEN, denial),
    }
}

/// Called when the user comes back from the system settings screen.
async fn api_reset_permissions(State(state): WebServerState) -> Response {
    let permissions = state.services.scanner.permissions();
    permissions.reset_cache().await;
    ok(permissions.check().await)
}

async fn api_retry_scanner(State(state): WebServerState) -> Response {
    let loader = state.services.scanner.loader();
    let available = loader.retry();
    let status = loader.status();
    if available {
        ok(status)
    } else {
        fail(StatusCode::SERVICE_UNAVAILABLE, status)
    }
}

async fn api_diagnose_scanner(State(state): WebServerState) -> Response {
    ok(state.services.scanner.diagnose().await)
}

async fn api_format_registration(Json(req): Json<DeviceRequest>) -> Response {
    ok(registration::format_for_registration(&req.device, &req.fields))
}

async fn api_register_device(
    State(state): WebServerState,
    headers: HeaderMap,
    Json(req): Json<DeviceRequest>,
) -> Response {
    let token = bearer_token(&headers);
    match state
        .services
        .registrar
        .register_selected(&token, req.device, &req.fields)
        .await
    {
        Ok(outcome) => ok(outcome),
        Err(f) => registration_failure(&token, f),
    }
}

async fn api_open_settings(State(state): WebServerState, Path(target): Path<String>) -> Response {
    let target = match target.parse::<SettingsTarget>() {
        Ok(t) => t,
        Err(e) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "success": false, "error": e })),
            )
                .into_response();
        }
    };
    let outcome = settings::open_settings(
        state.services.settings.as_ref(),
        state.services.scanner.platform(),
        target,
    )
    .await;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(outcome)).into_response()
}

async fn handle_captive_portal() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), "");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), "abc123");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(bearer_token(&headers), "");
    }
}
