use crate::structs::{ConnectionType, NetworkState, RawNetwork};

/// Splits one line of `nmcli -t` output into fields.
/// 字段中的 `:` 会被转义成 `\:`，反斜杠本身转义成 `\\`。
pub fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// nmcli reports signal quality as 0..=100; maps it back onto dBm.
pub fn percent_to_dbm(percent: u8) -> i32 {
    i32::from(percent.min(100)) / 2 - 100
}

/// Parses "2437 MHz" (or a bare "2437").
pub fn parse_frequency(field: &str) -> Option<u32> {
    field.split_whitespace().next()?.parse().ok()
}

/// Builds a capabilities string in the bracketed style the native module
/// reports, e.g. `WPA2 WPA3` becomes `[WPA2][WPA3]`.
pub fn capabilities_from_security(security: &str) -> String {
    let parts: Vec<&str> = security
        .split_whitespace()
        .filter(|s| *s != "--")
        .collect();
    if parts.is_empty() {
        return "[OPEN]".to_string();
    }
    parts.iter().map(|p| format!("[{}]", p)).collect()
}

/// Parses `nmcli -t -f SSID,BSSID,SIGNAL,FREQ,SECURITY device wifi list`.
pub fn parse_wifi_list(output: &str) -> Vec<RawNetwork> {
    output
        .lines()
        .filter_map(|line| {
            let fields = split_terse(line);
            if fields.len() < 5 {
                return None;
            }
            let ssid = fields[0].trim().to_string();
            if ssid.is_empty() {
                return None;
            }
            Some(RawNetwork {
                ssid,
                bssid: Some(fields[1].clone()).filter(|b| !b.is_empty()),
                level: fields[2].trim().parse::<u8>().ok().map(percent_to_dbm),
                frequency: parse_frequency(&fields[3]),
                capabilities: Some(capabilities_from_security(&fields[4])),
            })
        })
        .collect()
}

/// 当前连接的无线链路
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveLink {
    pub ssid: String,
    pub bssid: Option<String>,
    pub frequency: Option<u32>,
    pub signal: Option<i32>,
}

/// Parses `nmcli -t -f ACTIVE,SSID,BSSID,FREQ,SIGNAL device wifi` and returns
/// the row marked active.
pub fn parse_active_link(output: &str) -> Option<ActiveLink> {
    output.lines().find_map(|line| {
        let fields = split_terse(line);
        if fields.len() < 5 || fields[0] != "yes" {
            return None;
        }
        Some(ActiveLink {
            ssid: fields[1].clone(),
            bssid: Some(fields[2].clone()).filter(|b| !b.is_empty()),
            frequency: parse_frequency(&fields[3]),
            signal: fields[4].trim().parse::<u8>().ok().map(percent_to_dbm),
        })
    })
}

/// Parses `nmcli -t -f TYPE,STATE device` together with the output of
/// `nmcli networking connectivity`.
pub fn parse_network_state(devices: &str, connectivity: &str) -> NetworkState {
    let connected: Vec<String> = devices
        .lines()
        .map(split_terse)
        .filter(|f| f.len() >= 2 && f[1] == "connected")
        .map(|mut f| f.swap_remove(0))
        .collect();

    let connection_type = if connected.iter().any(|t| t == "wifi") {
        ConnectionType::Wifi
    } else {
        ConnectionType::Unknown
    };

    let is_internet_reachable = match connectivity.trim() {
        "full" => Some(true),
        "none" | "limited" | "portal" => Some(false),
        _ => None,
    };

    NetworkState {
        is_connected: !connected.is_empty(),
        is_internet_reachable,
        connection_type,
    }
}

/// Picks the first address out of `nmcli -g IP4.ADDRESS device show`,
/// dropping the prefix length.
pub fn parse_ipv4_address(output: &str) -> Option<std::net::Ipv4Addr> {
    output
        .lines()
        .flat_map(|line| line.split('|'))
        .filter_map(|entry| {
            entry
                .trim()
                .split('/')
                .next()?
                .parse::<std::net::Ipv4Addr>()
                .ok()
        })
        .next()
}
