//! Device entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// A client a user has logged in from, keyed by fingerprint.
///
/// `(user_id, device_id)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Device {
    /// Unique row identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Stable fingerprint derived from user agent and IP.
    pub device_id: String,
    /// Human-readable label, e.g. `"Chrome on Windows"`.
    pub device_name: Option<String>,
    /// `"desktop"`, `"mobile"` or `"tablet"`.
    pub device_type: Option<String>,
    /// Detected browser family.
    pub browser: Option<String>,
    /// Detected operating system.
    pub os: Option<String>,
    /// IP address seen on the most recent login.
    pub ip_address: Option<String>,
    /// Whether the user marked this device as trusted.
    pub is_trusted: bool,
    /// Whether the device is blocked.
    pub is_blocked: bool,
    /// Number of logins from this device.
    pub login_count: i32,
    /// First login from this device.
    pub first_seen_at: DateTime<Utc>,
    /// Most recent login from this device.
    pub last_seen_at: DateTime<Utc>,
}

/// Data recorded when a login resolves a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDevice {
    /// Owning user.
    pub user_id: Uuid,
    /// Fingerprint.
    pub device_id: String,
    /// Display label.
    pub device_name: Option<String>,
    /// Device class.
    pub device_type: Option<String>,
    /// Browser family.
    pub browser: Option<String>,
    /// Operating system.
    pub os: Option<String>,
    /// Client IP address.
    pub ip_address: Option<String>,
}

/// Coarse device class derived from the user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Desktop or laptop browser.
    Desktop,
    /// Phone.
    Mobile,
    /// Tablet.
    Tablet,
}

impl DeviceType {
    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
