//! `WIFI:T:<security>;S:<ssid>;P:<password>;H:<hidden>;;` 格式解析

use crate::structs::{CredentialSource, WifiCredential};

pub const PREFIX: &str = "WIFI:";

/// 解析标准 WiFi 二维码。调用方已经 trim 过输入。
///
/// 字段之间以未转义的 `;` 分隔，值中的 `\;` `\:` `\,` `\\` 会被还原。
pub fn parse(data: &str) -> Result<WifiCredential, String> {
    let body = data
        .strip_prefix(PREFIX)
        .ok_or_else(|| "Not a WiFi QR code - missing WIFI: prefix".to_string())?;

    let mut security: Option<String> = None;
    let mut ssid: Option<String> = None;
    let mut password: Option<String> = None;
    let mut hidden = false;

    for field in split_unescaped(body, ';') {
        if field.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = field.split_once(':') else {
            continue;
        };
        match key.trim().to_ascii_uppercase().as_str() {
            "T" => {
                security = Some(if value.is_empty() {
                    "nopass".to_string()
                } else {
                    unescape(value)
                })
            }
            "S" => ssid = Some(unescape(value)),
            "P" => password = Some(unescape(value)),
            "H" => hidden = value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    let ssid = match ssid {
        Some(s) if !s.is_empty() => s,
        _ => return Err("No SSID found in WiFi QR code".to_string()),
    };
    let password = password.unwrap_or_default();
    let security = security.unwrap_or_else(|| "nopass".to_string());
    let is_open = security == "nopass" || password.is_empty();

    Ok(WifiCredential {
        ssid,
        password,
        security,
        hidden,
        is_open,
        parsed_from: CredentialSource::WifiQr,
    })
}

/// 按未被反斜杠转义的分隔符切分，保留转义序列原样，留给 `unescape` 处理
fn split_unescaped(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if c == sep {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

/// `\x` => `x`；结尾孤立的反斜杠按字面量保留
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_standard_fields() {
        let c = parse("WIFI:T:WPA;S:HomeNet;P:secret123;H:false;;").unwrap();
        assert_eq!(c.ssid, "HomeNet");
        assert_eq!(c.password, "secret123");
        assert_eq!(c.security, "WPA");
        assert!(!c.hidden);
        assert!(!c.is_open);
    }

    #[test]
    fn recovers_escaped_separators() {
        let c = parse(r"WIFI:T:WPA;S:Cafe\;Bar\:2;P:p\\a\;ss;H:true;;").unwrap();
        assert_eq!(c.ssid, "Cafe;Bar:2");
        assert_eq!(c.password, r"p\a;ss");
        assert!(c.hidden);
    }

    #[test]
    fn keys_are_case_insensitive_and_order_free() {
        let c = parse("WIFI:s:Office;t:WEP;p:abc;;").unwrap();
        assert_eq!(c.ssid, "Office");
        assert_eq!(c.security, "WEP");
    }

    #[test]
    fn nopass_network_is_open() {
        let c = parse("WIFI:T:nopass;S:Guest;;").unwrap();
        assert!(c.is_open);
        assert_eq!(c.password, "");
    }

    #[test]
    fn missing_or_empty_ssid_fails() {
        assert!(parse("WIFI:T:WPA;P:secret;;").is_err());
        assert!(parse("WIFI:T:WPA;S:;P:secret;;").is_err());
    }
}
