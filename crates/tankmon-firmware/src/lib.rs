//! ESP32-S3 firmware-specific modules for tankmon
//!
//! This crate contains the hardware ports that cannot compile on desktop
//! targets: the ADC level sensor, the I2C character LCD, the Wi-Fi link and
//! the network tasks, plus compile-time credential management.

#![no_std]

extern crate alloc;

pub mod lcd;
pub mod sensor;
pub mod web;
pub mod wifi;
pub mod wifi_secrets;
