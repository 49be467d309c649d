//! Network credentials baked in at compile time by `build.rs`

use tankmon_core::config::{AccessPointConfig, StationConfig};

pub const WIFI_SSID: &str = env!(
    "TANKMON_WIFI_SSID",
    "set TANKMON_WIFI_SSID in crates/tankmon-firmware/.env"
);
pub const WIFI_PASSWORD: &str = match option_env!("TANKMON_WIFI_PASSWORD") {
    Some(password) => password,
    None => "",
};

const AP_SSID: Option<&str> = option_env!("TANKMON_AP_SSID");
const AP_PASSWORD: Option<&str> = option_env!("TANKMON_AP_PASSWORD");

pub fn station() -> StationConfig<'static> {
    StationConfig {
        ssid: WIFI_SSID,
        password: WIFI_PASSWORD,
    }
}

/// Access point settings, defaulting to the factory network.
pub fn access_point() -> AccessPointConfig<'static> {
    let defaults = AccessPointConfig::default();
    AccessPointConfig {
        ssid: AP_SSID.unwrap_or(defaults.ssid),
        password: AP_PASSWORD.unwrap_or(defaults.password),
        ..defaults
    }
}
