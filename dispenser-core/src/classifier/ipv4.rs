use regex::Regex;
use std::sync::LazyLock;

static IPV4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}",
        r"(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$",
    ))
    .expect("ipv4 pattern compiles")
});

/// Dotted-quad IPv4 check with per-octet range validation.
///
/// Zero-padded octets such as `010` pass while `256` and `999` do not.
pub fn is_valid_ipv4(s: &str) -> bool {
    IPV4_RE.is_match(s)
}

/// 取 IPv4 地址的最后一段，用于生成 "Device-<n>" 形式的主机名
pub fn last_octet(ip: &str) -> &str {
    ip.rsplit('.').next().unwrap_or(ip)
}
