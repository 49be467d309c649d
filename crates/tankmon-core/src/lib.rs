//! Hardware-independent core library for tankmon
//!
//! This crate contains all platform-agnostic logic for the tank level
//! telemetry node: calibration of raw ADC samples, the display handoff
//! channel and layout, the station link state machine, the periodic sample
//! loop, and the shared telemetry state served over HTTP.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod calibration;
pub mod channel;
pub mod config;
pub mod connectivity;
pub mod display;
pub mod error;
pub mod http;
pub mod sampling;
pub mod telemetry;
