//! User agent heuristics and device fingerprints.

use sha2::{Digest, Sha256};

use keyward_entity::device::DeviceType;

/// Length of a device fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 32;

/// Derive the device fingerprint from the user agent and client IP.
///
/// `sha256("{ua}-{ip}")` as hex, truncated. A missing part hashes as the
/// empty string, so two clients sharing both values share a device row.
pub fn fingerprint(user_agent: Option<&str>, ip_address: Option<&str>) -> String {
    let data = format!("{}-{}", user_agent.unwrap_or(""), ip_address.unwrap_or(""));
    let mut digest = format!("{:x}", Sha256::digest(data.as_bytes()));
    digest.truncate(FINGERPRINT_LEN);
    digest
}

/// Coarse description of a client parsed from its user agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub browser: Option<&'static str>,
    pub os: Option<&'static str>,
    pub device_type: Option<DeviceType>,
    pub device_name: Option<String>,
}

/// Substring heuristics over a user agent. A missing user agent yields
/// nothing at all.
pub fn parse_user_agent(user_agent: Option<&str>) -> UserAgentInfo {
    let Some(ua) = user_agent.filter(|ua| !ua.is_empty()) else {
        return UserAgentInfo::default();
    };

    // Order matters: Chrome-based UAs also mention Safari, Edge mentions Chrome.
    let browser = if ua.contains("Chrome") && !ua.contains("Edg") {
        Some("Chrome")
    } else if ua.contains("Firefox") {
        Some("Firefox")
    } else if ua.contains("Safari") && !ua.contains("Chrome") {
        Some("Safari")
    } else if ua.contains("Edg") {
        Some("Edge")
    } else if ua.contains("Opera") {
        Some("Opera")
    } else {
        None
    };

    let os = if ua.contains("Windows") {
        Some("Windows")
    } else if ua.contains("Mac OS") {
        Some("macOS")
    } else if ua.contains("Linux") {
        Some("Linux")
    } else if ua.contains("Android") {
        Some("Android")
    } else if ua.contains("iOS") || ua.contains("iPhone") || ua.contains("iPad") {
        Some("iOS")
    } else {
        None
    };

    let device_type = if ua.contains("Mobile") || ua.contains("Android") || ua.contains("iPhone") {
        DeviceType::Mobile
    } else if ua.contains("Tablet") || ua.contains("iPad") {
        DeviceType::Tablet
    } else {
        DeviceType::Desktop
    };

    UserAgentInfo {
        browser,
        os,
        device_type: Some(device_type),
        device_name: Some(format!(
            "{} on {}",
            browser.unwrap_or("Unknown"),
            os.unwrap_or("Unknown")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const EDGE_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const SAFARI_IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/604.1";

    #[test]
    fn test_fingerprint_shape() {
        let fp = fingerprint(Some("ua"), Some("1.2.3.4"));
        assert_eq!(fp.len(), FINGERPRINT_LEN);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(fp, fingerprint(Some("ua"), Some("1.2.3.4")));
        assert_ne!(fp, fingerprint(Some("ua"), Some("1.2.3.5")));
    }

    #[test]
    fn test_fingerprint_missing_parts() {
        assert_eq!(fingerprint(None, None), fingerprint(Some(""), Some("")));
    }

    #[test]
    fn test_chrome_on_windows() {
        let info = parse_user_agent(Some(CHROME_WINDOWS));
        assert_eq!(info.browser, Some("Chrome"));
        assert_eq!(info.os, Some("Windows"));
        assert_eq!(info.device_type, Some(DeviceType::Desktop));
        assert_eq!(info.device_name.as_deref(), Some("Chrome on Windows"));
    }

    #[test]
    fn test_edge_is_not_chrome() {
        assert_eq!(parse_user_agent(Some(EDGE_WINDOWS)).browser, Some("Edge"));
    }

    #[test]
    fn test_iphone_reports_mac_os_first() {
        let info = parse_user_agent(Some(SAFARI_IPHONE));
        assert_eq!(info.browser, Some("Safari"));
        assert_eq!(info.os, Some("macOS"));
        assert_eq!(info.device_type, Some(DeviceType::Mobile));
    }

    #[test]
    fn test_ipad_is_tablet() {
        assert_eq!(
            parse_user_agent(Some(SAFARI_IPAD)).device_type,
            Some(DeviceType::Tablet)
        );
    }

    #[test]
    fn test_unknown_agent() {
        let info = parse_user_agent(Some("curl/8.0"));
        assert_eq!(info.browser, None);
        assert_eq!(info.device_type, Some(DeviceType::Desktop));
        assert_eq!(info.device_name.as_deref(), Some("Unknown on Unknown"));
        assert_eq!(parse_user_agent(None), UserAgentInfo::default());
    }
}
