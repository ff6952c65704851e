//! Core library for the smart dispenser provisioning flow.
//! This crate defines the collaborator traits (OS permissions, network status,
//! the optional native WiFi module, the registration API) and the logic built
//! on top of them: the QR/text classifier, the permission gate, the native
//! module loader, the WiFi scan orchestrator and the registration formatter.
//! Host backends are selected by feature flags.

pub mod backends;
pub mod classifier;
pub mod config;
pub mod factory;
pub mod flow;
pub mod loader;
pub mod permissions;
pub mod registration;
pub mod scanner;
pub mod settings;
pub mod structs;
pub mod traits;
pub mod web_server;

use thiserror::Error;

use crate::traits::WifiMethod;

// Define a shared Error and Result type for the entire crate.
// 面向界面的"预期失败"（无法识别的二维码、权限被拒等）不走这里，
// 而是以带 suggestion 的类型化结果返回。

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Native WiFi module error: {0}")]
    Module(String),

    #[error("Method '{0}' is not available on the native WiFi module")]
    Unsupported(WifiMethod),

    #[error("Permission error: {0}")]
    Permission(String),

    #[error("Registration API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;
