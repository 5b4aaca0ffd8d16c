//! Device fingerprint headers sent with every request.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// Client type reported to the service.
pub const CLIENT_TYPE: &str = "enhanced-cli";

/// Stable 16-hex-char hash of the host platform.
pub fn device_fingerprint() -> String {
    let mut info = BTreeMap::new();
    info.insert("platform", std::env::consts::OS);
    info.insert("family", std::env::consts::FAMILY);
    info.insert("architecture", std::env::consts::ARCH);
    info.insert("client_version", env!("CARGO_PKG_VERSION"));

    // BTreeMap keeps keys sorted, so the digest is stable.
    let data = serde_json::to_string(&info).unwrap_or_default();
    let digest = Sha256::digest(data.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// User agent string.
pub fn user_agent() -> String {
    format!(
        "Agent700-CLI/{} ({} {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Local offset from UTC in minutes.
fn timezone_offset_minutes() -> i32 {
    chrono::Local::now().offset().local_minus_utc() / 60
}

/// Full header set identifying this device.
pub fn device_headers() -> Vec<(&'static str, String)> {
    vec![
        ("X-Screen-Resolution", "1920x1080".to_string()),
        ("X-Timezone-Offset", timezone_offset_minutes().to_string()),
        ("X-User-Agent", user_agent()),
        ("X-Client-Type", CLIENT_TYPE.to_string()),
        ("X-Device-Fingerprint", device_fingerprint()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = device_fingerprint();
        let b = device_fingerprint();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_device_headers_complete() {
        let headers = device_headers();
        let names: Vec<_> = headers.iter().map(|(k, _)| *k).collect();
        assert!(names.contains(&"X-Device-Fingerprint"));
        assert!(names.contains(&"X-Client-Type"));
        assert!(names.contains(&"X-Timezone-Offset"));
    }
}
