//! Heuristic detection of unlabelled WiFi credentials such as
//! `"Galaxy M05 5740 khadar123"` (phone hotspot) or `"I Wont Tell"`.
//!
//! The checks below are tried in order and the first match wins. Several of
//! them overlap; the order is kept as-is because ordinary two-word device
//! names also read as `"<ssid> <password>"`.

use crate::structs::{CredentialSource, WifiCredential};
use regex::Regex;
use std::sync::LazyLock;

const PASSWORD_SYMBOLS: &str = "@#$%^&*!";

// 依次尝试，命中第一个即可
static PATTERNS: LazyLock<[(&str, Regex); 10]> = LazyLock::new(|| {
    [
        ("name + password", r"^[A-Za-z0-9\s_-]+ [A-Za-z0-9@#$%^&*!]{4,}$"),
        (
            "phone hotspot",
            concat!(
                r"(?i)^(Galaxy|iPhone|Pixel|OnePlus|Xiaomi|Samsung|Huawei|Oppo|Vivo|Mi|Redmi)",
                r"\s+[A-Za-z0-9\s_-]+ [A-Za-z0-9@#$%^&*!]+$",
            ),
        ),
        ("words + password", r"^[A-Za-z][A-Za-z0-9\s_-]{2,50} [A-Za-z0-9@#$%^&*!]{3,}$"),
        ("name + number + password", r"^[A-Za-z0-9\s_-]+ [0-9]{2,5} [A-Za-z0-9@#$%^&*!]+$"),
        (
            "three words + password",
            r"^[A-Za-z]+\s+[A-Za-z]+\s+[A-Za-z]+\s+[A-Za-z0-9@#$%^&*!]+$",
        ),
        ("two words + password", r"^[A-Za-z]+\s+[A-Za-z]+\s+[A-Za-z0-9@#$%^&*!]+$"),
        ("three words", r"^[A-Za-z]+\s+[A-Za-z]+\s+[A-Za-z]+$"),
        ("single word", r"^[A-Za-z0-9_-]{3,}$"),
        ("two words", r"^[A-Za-z]+\s+[A-Za-z]+$"),
        ("short name", r"^[A-Za-z0-9\s_-]{3,30}$"),
    ]
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("credential pattern compiles")))
});

/// 判断文本是否像 "网络名 密码" 形式的 WiFi 凭据
pub fn looks_like_credentials(text: &str) -> bool {
    let text = text.trim();
    if text.chars().count() < 2 {
        return false;
    }
    if text.starts_with("WIFI:") || text.starts_with('{') || text.contains("://") {
        return false;
    }

    match PATTERNS.iter().find(|(_, re)| re.is_match(text)) {
        Some((name, _)) => {
            tracing::debug!("✅ WiFi credentials pattern matched: {}", name);
            true
        }
        None => false,
    }
}

/// 拆分 SSID 与密码：两段 => "ssid password"；三段及以上时，
/// 最后一段含数字/符号或长度 >= 8 才视为密码，否则整串都是 SSID
pub fn parse(text: &str) -> WifiCredential {
    let text = text.trim();
    let parts: Vec<&str> = text.split_whitespace().collect();

    let (ssid, password) = match parts.as_slice() {
        [ssid, password] => (ssid.to_string(), password.to_string()),
        [head @ .., last] if head.len() >= 2 => {
            if looks_like_password(last) {
                (head.join(" "), last.to_string())
            } else {
                (text.to_string(), String::new())
            }
        }
        _ => (text.to_string(), String::new()),
    };

    let shown = if password.is_empty() { "(none)" } else { "********" };
    tracing::debug!("🔍 Plain text parsing: {:?} | {}", ssid, shown);

    let is_open = password.is_empty();
    WifiCredential {
        ssid,
        security: if is_open { "nopass".to_string() } else { "WPA2".to_string() },
        password,
        hidden: false,
        is_open,
        parsed_from: CredentialSource::Plaintext,
    }
}

fn looks_like_password(token: &str) -> bool {
    token
        .chars()
        .any(|c| c.is_ascii_digit() || PASSWORD_SYMBOLS.contains(c))
        || token.chars().count() >= 8
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn phone_hotspot_with_password() {
        assert!(looks_like_credentials("Galaxy M05 5740 khadar123"));
        let c = parse("Galaxy M05 5740 khadar123");
        assert_eq!(c.ssid, "Galaxy M05 5740");
        assert_eq!(c.password, "khadar123");
        assert_eq!(c.security, "WPA2");
        assert!(!c.is_open);
    }

    #[test]
    fn three_plain_words_are_an_ssid() {
        assert!(looks_like_credentials("I Wont Tell"));
        let c = parse("I Wont Tell");
        assert_eq!(c.ssid, "I Wont Tell");
        assert_eq!(c.password, "");
        assert_eq!(c.security, "nopass");
        assert!(c.is_open);
    }

    #[test]
    fn long_last_word_is_a_password() {
        let c = parse("My Home Network");
        assert_eq!(c.ssid, "My Home Network");
        let c = parse("My Home passwordxx");
        assert_eq!(c.ssid, "My Home");
        assert_eq!(c.password, "passwordxx");
    }

    #[test]
    fn two_tokens_split_into_ssid_and_password() {
        let c = parse("HomeNet hunter22");
        assert_eq!(c.ssid, "HomeNet");
        assert_eq!(c.password, "hunter22");
    }

    #[test]
    fn single_token_has_no_password() {
        assert!(looks_like_credentials("Office_5G"));
        let c = parse("Office_5G");
        assert_eq!(c.ssid, "Office_5G");
        assert!(c.is_open);
    }

    #[test]
    fn rejects_special_formats() {
        assert!(!looks_like_credentials("WIFI:S:x;;"));
        assert!(!looks_like_credentials("{\"ip\":\"1.2.3.4\"}"));
        assert!(!looks_like_credentials("https://example.com"));
        assert!(!looks_like_credentials("x"));
    }

    #[test]
    fn dotted_text_matches_nothing() {
        assert!(!looks_like_credentials("192.168.1.250"));
        assert!(!looks_like_credentials("999.1.1.1"));
    }

    fn matched(text: &str) -> Option<&'static str> {
        PATTERNS.iter().find(|(_, re)| re.is_match(text)).map(|(name, _)| *name)
    }

    #[test]
    fn patterns_are_tried_in_order() {
        assert_eq!(matched("HomeNet hunter22"), Some("name + password"));
        assert_eq!(matched("iphone 13 p!"), Some("phone hotspot"));
        assert_eq!(matched("Router 57 a!"), Some("name + number + password"));
        assert_eq!(matched("A b c"), Some("two words + password"));
        assert_eq!(matched("Office_5G"), Some("single word"));
        assert_eq!(matched("A b"), Some("two words"));
    }

    #[test]
    fn characters_outside_the_classes_are_rejected() {
        assert!(!looks_like_credentials("Caf\u{e9} hunter22"));
        assert!(!looks_like_credentials("Home+Net"));
    }
}
