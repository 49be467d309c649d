//! Startup configuration for the node
//!
//! Everything here is fixed once the node boots: network credentials for the
//! upstream station link and the local access point, the sensor calibration,
//! and the loop cadence.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Full node configuration, borrowed from whatever buffer it was parsed from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct NodeConfig<'a> {
    #[serde(borrow)]
    pub station: StationConfig<'a>,
    #[serde(borrow, default)]
    pub access_point: AccessPointConfig<'a>,
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

impl NodeConfig<'_> {
    /// Check credentials. The calibration range is already validated on construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_credentials(self.station.ssid, self.station.password)?;
        validate_credentials(self.access_point.ssid, self.access_point.password)
    }
}

/// Upstream network the node joins as a client.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StationConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

/// Local network the node always hosts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPointConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
    /// Node address on the access point network, also used as its gateway.
    pub address: [u8; 4],
    pub prefix_len: u8,
}

impl Default for AccessPointConfig<'_> {
    fn default() -> Self {
        Self {
            ssid: "esp32-ap",
            password: "esp32-pass",
            address: [192, 168, 4, 1],
            prefix_len: 24,
        }
    }
}

fn validate_credentials(ssid: &str, password: &str) -> Result<(), ConfigError> {
    if ssid.is_empty() || ssid.len() > 32 {
        return Err(ConfigError::SsidLength(ssid.len()));
    }
    // WPA2 passphrases are 8..=63 ASCII characters or a 64 digit hex PSK.
    if !password.is_empty() && !(8..=64).contains(&password.len()) {
        return Err(ConfigError::PassphraseLength(password.len()));
    }
    Ok(())
}

/// Reference points mapping raw ADC counts onto the tank.
///
/// Only constructible through [`CalibrationConfig::new`] or deserialization,
/// both of which enforce `min_raw < max_raw`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "CalibrationFields")]
pub struct CalibrationConfig {
    min_raw: u16,
    max_raw: u16,
    tank_capacity_litre: u16,
    km_per_litre: u16,
}

impl CalibrationConfig {
    pub fn new(
        min_raw: u16,
        max_raw: u16,
        tank_capacity_litre: u16,
        km_per_litre: u16,
    ) -> Result<Self, ConfigError> {
        if min_raw >= max_raw {
            return Err(ConfigError::EmptyCalibrationRange {
                min: min_raw,
                max: max_raw,
            });
        }
        Ok(Self {
            min_raw,
            max_raw,
            tank_capacity_litre,
            km_per_litre,
        })
    }

    pub const fn min_raw(&self) -> u16 {
        self.min_raw
    }

    pub const fn max_raw(&self) -> u16 {
        self.max_raw
    }

    pub const fn tank_capacity_litre(&self) -> u16 {
        self.tank_capacity_litre
    }

    pub const fn km_per_litre(&self) -> u16 {
        self.km_per_litre
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_raw: 1900,
            max_raw: 3850,
            tank_capacity_litre: 4,
            km_per_litre: 40,
        }
    }
}

#[derive(Deserialize)]
struct CalibrationFields {
    min_raw: u16,
    max_raw: u16,
    tank_capacity_litre: u16,
    km_per_litre: u16,
}

impl TryFrom<CalibrationFields> for CalibrationConfig {
    type Error = ConfigError;

    fn try_from(fields: CalibrationFields) -> Result<Self, Self::Error> {
        Self::new(
            fields.min_raw,
            fields.max_raw,
            fields.tank_capacity_litre,
            fields.km_per_litre,
        )
    }
}

/// Cadence of the control loop and the connectivity policy, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    /// Delay between two sample loop passes
    pub period_ms: u64,
    /// Minimum spacing between two pushes to the display channel
    pub display_interval_ms: u64,
    /// Longest the sample loop waits for room in the display channel
    pub send_timeout_ms: u64,
    /// Minimum spacing between two station reconnect attempts
    pub reconnect_interval_ms: u64,
    /// Link polls during startup before falling back to access-point-only mode
    pub startup_attempts: u8,
    pub startup_retry_delay_ms: u32,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            period_ms: 10,
            display_interval_ms: 100,
            send_timeout_ms: 100,
            reconnect_interval_ms: 5_000,
            startup_attempts: 10,
            startup_retry_delay_ms: 1_000,
        }
    }
}
