//! Error types shared by the node components

use thiserror_no_std::Error;

/// Startup configuration rejected by validation
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("calibration range is empty: min_raw {min} must be below max_raw {max}")]
    EmptyCalibrationRange { min: u16, max: u16 },
    #[error("SSID must be 1 to 32 bytes, got {0}")]
    SsidLength(usize),
    #[error("passphrase must be empty or 8 to 64 bytes, got {0}")]
    PassphraseLength(usize),
}

/// Sensor port failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("ADC read failed on {sensor}")]
    ReadFailed { sensor: &'static str },
}

/// Node-level failures that stop bring-up
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The local access point is the node's control plane and has no fallback.
    #[error("access point bring-up failed")]
    AccessPoint,
    #[error("sensor error: {0}")]
    Sensor(#[from] SensorError),
}
