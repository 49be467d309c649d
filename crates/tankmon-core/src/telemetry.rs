//! Shared latest-value store and the JSON view served over HTTP
//!
//! The sample loop is the only writer. Readers take a copy of the whole
//! reading inside a short critical section, so a request that races a write
//! sees either the previous reading or the new one, never a mix of both.
//! Serialization happens on the copy, outside the lock.

use alloc::string::{String, ToString};
use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::Serialize;

use crate::calibration::LevelReading;
use crate::config::CalibrationConfig;
use crate::http::{Request, Response};

/// Path of the telemetry endpoint
pub const TELEMETRY_PATH: &str = "/api/get-data";

/// Process-wide telemetry state: fixed calibration plus the latest reading.
pub struct TelemetryState {
    calibration: CalibrationConfig,
    latest: Mutex<CriticalSectionRawMutex, Cell<LevelReading>>,
}

/// Consistent copy of the telemetry state at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    pub calibration: CalibrationConfig,
    pub reading: LevelReading,
}

impl TelemetryState {
    pub const fn new(calibration: CalibrationConfig) -> Self {
        Self {
            calibration,
            latest: Mutex::new(Cell::new(LevelReading {
                percentage: 0,
                volume_litre: 0.0,
                raw_value: 0,
            })),
        }
    }

    /// Replace the latest reading.
    pub fn publish(&self, reading: LevelReading) {
        self.latest.lock(|latest| latest.set(reading));
    }

    pub fn latest(&self) -> LevelReading {
        self.latest.lock(Cell::get)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            calibration: self.calibration,
            reading: self.latest(),
        }
    }

    pub fn calibration(&self) -> &CalibrationConfig {
        &self.calibration
    }
}

/// Wire format of `GET /api/get-data`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct TelemetryPayload {
    pub max_capacity_in_litre: u16,
    pub km_per_litre: u16,
    pub value_in_litre: f32,
    pub raw_value: u16,
    pub percentage: u8,
}

impl TelemetryPayload {
    pub fn from_snapshot(snapshot: &TelemetrySnapshot) -> Self {
        Self {
            max_capacity_in_litre: snapshot.calibration.tank_capacity_litre(),
            km_per_litre: snapshot.calibration.km_per_litre(),
            value_in_litre: snapshot.reading.volume_litre,
            raw_value: snapshot.reading.raw_value,
            percentage: snapshot.reading.percentage,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Request handler answering from the latest snapshot.
#[derive(Clone, Copy)]
pub struct TelemetryService<'a> {
    state: &'a TelemetryState,
}

impl<'a> TelemetryService<'a> {
    pub const fn new(state: &'a TelemetryState) -> Self {
        Self { state }
    }

    /// Build the response for one raw HTTP request.
    pub fn handle(&self, raw_request: &[u8]) -> Response {
        let request = match Request::parse(raw_request) {
            Ok(request) => request,
            Err(e) => {
                log::debug!("Rejecting malformed request: {}", e);
                return Response::bad_request(&e.to_string());
            }
        };

        if request.path != TELEMETRY_PATH {
            return Response::not_found();
        }
        if request.method != "GET" {
            return Response::method_not_allowed();
        }

        let payload = TelemetryPayload::from_snapshot(&self.state.snapshot());
        match payload.to_json() {
            Ok(body) => Response::ok_json(body),
            // Only reachable with a non-finite volume, which the clamp rules out.
            Err(e) => {
                log::error!("Telemetry serialization failed: {}", e);
                Response::ok_json(String::from("{}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::calibration;
    use crate::http::Status;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn scenario_state() -> TelemetryState {
        TelemetryState::new(CalibrationConfig::new(1900, 3850, 4, 40).unwrap())
    }

    #[test]
    fn test_snapshot_reflects_latest_publish() {
        let state = scenario_state();
        assert_eq!(state.latest(), LevelReading::default());

        let reading = calibration::map(2875, state.calibration());
        state.publish(reading);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.reading, reading);
        assert_eq!(snapshot.calibration.km_per_litre(), 40);
    }

    #[test]
    fn test_payload_json_fields() {
        let state = scenario_state();
        state.publish(calibration::map(2875, state.calibration()));

        let json = TelemetryPayload::from_snapshot(&state.snapshot())
            .to_json()
            .unwrap();

        assert_eq!(
            json,
            r#"{"max_capacity_in_litre":4,"km_per_litre":40,"value_in_litre":2.0,"raw_value":2875,"percentage":50}"#
        );
    }

    #[test]
    fn test_service_serves_latest_reading() {
        let state = scenario_state();
        state.publish(calibration::map(3850, state.calibration()));
        let service = TelemetryService::new(&state);

        let response = service.handle(b"GET /api/get-data HTTP/1.1\r\nHost: 192.168.4.1\r\n\r\n");

        assert_eq!(response.status, Status::Ok);
        let value: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(value["percentage"], 100);
        assert_eq!(value["value_in_litre"], 4.0);
        assert_eq!(value["raw_value"], 3850);
        assert_eq!(value["max_capacity_in_litre"], 4);
    }

    #[test]
    fn test_service_rejects_other_routes() {
        let state = scenario_state();
        let service = TelemetryService::new(&state);

        assert_eq!(service.handle(b"GET / HTTP/1.1\r\n\r\n").status, Status::NotFound);
        assert_eq!(
            service.handle(b"POST /api/get-data HTTP/1.1\r\n\r\n").status,
            Status::MethodNotAllowed
        );
        assert_eq!(service.handle(b"\xff\xfe\r\n\r\n").status, Status::BadRequest);
        assert_eq!(
            service.handle(b"GET / SPDY/3\r\n\r\n").body,
            r#"{"error":"only HTTP/1.x is supported"}"#
        );
    }

    #[test]
    fn test_concurrent_reads_never_see_partial_writes() {
        let state = Arc::new(scenario_state());
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let state = Arc::clone(&state);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for round in 0..20_000u32 {
                    let raw = 1800 + (round % 2200) as u16;
                    state.publish(calibration::map(raw, state.calibration()));
                }
                done.store(true, Ordering::Release);
            })
        };

        let service = TelemetryService::new(&state);
        let mut checked = 0;
        while !done.load(Ordering::Acquire) || checked < 100 {
            let response = service.handle(b"GET /api/get-data HTTP/1.1\r\n\r\n");
            let value: serde_json::Value = serde_json::from_str(&response.body).unwrap();

            // Every field must come from the same reading.
            let raw = value["raw_value"].as_u64().unwrap() as u16;
            let expected = calibration::map(raw, state.calibration());
            assert_eq!(value["percentage"].as_u64().unwrap(), u64::from(expected.percentage));
            let volume = value["value_in_litre"].as_f64().unwrap();
            assert!((volume - f64::from(expected.volume_litre)).abs() < 1e-6);
            checked += 1;
        }

        writer.join().unwrap();
    }
}
