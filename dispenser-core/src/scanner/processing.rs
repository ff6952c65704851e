use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::structs::{Network, RawNetwork, SignalLevel};

const DEFAULT_SIGNAL_DBM: i32 = -70;
const DEFAULT_FREQUENCY_MHZ: u32 = 2400;

/// 是否加密：WPA / WEP，或带 PSK 但不是 NONE
pub fn is_secure(capabilities: &str) -> bool {
    capabilities.contains("WPA")
        || capabilities.contains("WEP")
        || (capabilities.contains("PSK") && !capabilities.contains("NONE"))
}

/// Human-readable security label derived from the capability flags.
pub fn security_label(capabilities: &str) -> &'static str {
    if capabilities.contains("WPA3") || capabilities.contains("SAE") {
        "WPA3"
    } else if capabilities.contains("WPA2") || capabilities.contains("RSN") {
        "WPA2"
    } else if capabilities.contains("WPA") {
        "WPA"
    } else if capabilities.contains("WEP") {
        "WEP"
    } else {
        "Open"
    }
}

/// Turns one native scan pass into display records, strongest first, one per SSID.
pub fn process_scan(
    raw: Vec<RawNetwork>,
    current_ssid: Option<&str>,
    seen_at: DateTime<Utc>,
) -> Vec<Network> {
    let networks = raw
        .into_iter()
        .filter(|n| !n.ssid.trim().is_empty())
        .map(|n| {
            let capabilities = n.capabilities.filter(|c| !c.is_empty());
            let signal = n.level.unwrap_or(DEFAULT_SIGNAL_DBM);
            let flags = capabilities.as_deref().unwrap_or_default();
            Network {
                is_current: current_ssid == Some(n.ssid.as_str()),
                secure: is_secure(flags),
                security: security_label(flags).to_string(),
                capabilities: capabilities.clone().unwrap_or_else(|| "[OPEN]".to_string()),
                bssid: n.bssid.unwrap_or_else(|| "Unknown".to_string()),
                frequency: n.frequency.unwrap_or(DEFAULT_FREQUENCY_MHZ),
                level: SignalLevel::from_dbm(signal),
                signal,
                ssid: n.ssid,
                seen_at,
            }
        })
        .collect();

    dedupe_strongest(networks)
}

/// 按信号强度降序排序，同名网络只保留最强的一条
pub fn dedupe_strongest(mut networks: Vec<Network>) -> Vec<Network> {
    networks.sort_by(|a, b| b.signal.cmp(&a.signal));
    let mut seen = HashSet::new();
    networks.retain(|n| seen.insert(n.ssid.clone()));
    networks
}
