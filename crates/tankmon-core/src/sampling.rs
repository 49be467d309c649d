//! The periodic control loop
//!
//! Every pass reads the sensor, calibrates the sample, publishes it for the
//! HTTP side, forwards the percentage to the display channel when the display
//! interval has elapsed, and gives the connectivity manager its tick.
//!
//! [`SampleLoop::step`] takes the current time as an argument so cadence logic
//! can be exercised without waiting on a real clock; [`SampleLoop::run`] wraps
//! it with `embassy_time`.

use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::calibration::{self, LevelReading, RawSample};
use crate::channel::LevelChannel;
use crate::config::LoopTiming;
use crate::connectivity::{ConnectivityManager, StationLink};
use crate::error::SensorError;
use crate::telemetry::TelemetryState;

/// Source of raw level samples.
pub trait LevelSensor {
    fn read_raw(&mut self) -> Result<RawSample, SensorError>;
}

pub struct SampleLoop<'a, S, L, P, const K: usize> {
    sensor: S,
    state: &'a TelemetryState,
    channel: &'a LevelChannel<K>,
    connectivity: ConnectivityManager<L, P>,
    timing: LoopTiming,
    last_display_push_ms: Option<u64>,
}

impl<'a, S, L, P, const K: usize> SampleLoop<'a, S, L, P, K>
where
    S: LevelSensor,
    L: StationLink,
    P: OutputPin,
{
    pub fn new(
        sensor: S,
        state: &'a TelemetryState,
        channel: &'a LevelChannel<K>,
        connectivity: ConnectivityManager<L, P>,
        timing: LoopTiming,
    ) -> Self {
        Self {
            sensor,
            state,
            channel,
            connectivity,
            timing,
            last_display_push_ms: None,
        }
    }

    /// Run one pass of the loop at `now_ms`.
    ///
    /// Returns the reading computed in this pass, or `None` when the sensor
    /// read failed.
    pub async fn step(&mut self, now_ms: u64) -> Option<LevelReading> {
        let reading = match self.sensor.read_raw() {
            Ok(raw) => {
                let reading = calibration::map(raw, self.state.calibration());
                self.state.publish(reading);
                Some(reading)
            }
            Err(e) => {
                warn!("Skipping sample: {}", e);
                None
            }
        };

        if let Some(reading) = reading {
            if self.display_due(now_ms) {
                self.last_display_push_ms = Some(now_ms);
                let timeout = Duration::from_millis(self.timing.send_timeout_ms);
                if !self.channel.try_send(reading.percentage, timeout).await {
                    debug!("Display channel full, dropped {}%", reading.percentage);
                }
            }
        }

        self.connectivity.tick(now_ms);
        reading
    }

    /// Drive [`Self::step`] forever at the configured period.
    pub async fn run(&mut self) -> ! {
        let period = Duration::from_millis(self.timing.period_ms);
        loop {
            self.step(Instant::now().as_millis()).await;
            Timer::after(period).await;
        }
    }

    pub fn connectivity(&self) -> &ConnectivityManager<L, P> {
        &self.connectivity
    }

    pub fn connectivity_mut(&mut self) -> &mut ConnectivityManager<L, P> {
        &mut self.connectivity
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    fn display_due(&self, now_ms: u64) -> bool {
        match self.last_display_push_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.timing.display_interval_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccessPointConfig, CalibrationConfig, StationConfig};
    use crate::connectivity::ConnectivityState;
    use core::convert::Infallible;
    use embassy_futures::block_on;

    struct ScriptedSensor {
        next: Result<RawSample, SensorError>,
    }

    impl LevelSensor for ScriptedSensor {
        fn read_raw(&mut self) -> Result<RawSample, SensorError> {
            self.next
        }
    }

    struct StubLink {
        up: bool,
        attempts: u32,
    }

    impl StationLink for StubLink {
        type Error = Infallible;

        fn start(
            &mut self,
            _access_point: &AccessPointConfig<'_>,
            _station: &StationConfig<'_>,
        ) -> Result<(), Infallible> {
            Ok(())
        }

        fn connect(&mut self) -> Result<(), Infallible> {
            self.attempts += 1;
            Ok(())
        }

        fn is_connected(&mut self) -> bool {
            self.up
        }
    }

    struct NoLed;

    impl embedded_hal::digital::ErrorType for NoLed {
        type Error = Infallible;
    }

    impl OutputPin for NoLed {
        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    fn scenario_state() -> TelemetryState {
        TelemetryState::new(CalibrationConfig::new(1900, 3850, 4, 40).unwrap())
    }

    fn sample_loop<'a, const K: usize>(
        state: &'a TelemetryState,
        channel: &'a LevelChannel<K>,
        raw: RawSample,
    ) -> SampleLoop<'a, ScriptedSensor, StubLink, NoLed, K> {
        let timing = LoopTiming {
            send_timeout_ms: 1,
            ..LoopTiming::default()
        };
        let link = StubLink {
            up: false,
            attempts: 0,
        };
        let mut connectivity = ConnectivityManager::new(link, NoLed, timing.reconnect_interval_ms);
        connectivity
            .initialize(&AccessPointConfig::default(), &StationConfig::default(), 0)
            .unwrap();
        SampleLoop::new(
            ScriptedSensor { next: Ok(raw) },
            state,
            channel,
            connectivity,
            timing,
        )
    }

    #[test]
    fn test_step_publishes_reading() {
        let state = scenario_state();
        let channel: LevelChannel = LevelChannel::new();
        let mut sampler = sample_loop(&state, &channel, 2875);

        let reading = block_on(sampler.step(0)).unwrap();

        assert_eq!(reading.percentage, 50);
        assert_eq!(state.latest(), reading);
        assert_eq!(channel.try_receive(), Some(50));
    }

    #[test]
    fn test_display_push_is_rate_limited() {
        let state = scenario_state();
        let channel: LevelChannel = LevelChannel::new();
        let mut sampler = sample_loop(&state, &channel, 3850);

        block_on(async {
            for now in (0..=300).step_by(10) {
                sampler.step(now).await;
            }
        });

        // Pushes at 0, 100, 200 and 300 ms only.
        assert_eq!(channel.len(), 4);
    }

    #[test]
    fn test_state_updates_every_pass() {
        let state = scenario_state();
        let channel: LevelChannel = LevelChannel::new();
        let mut sampler = sample_loop(&state, &channel, 1900);

        block_on(sampler.step(0));
        sampler.sensor_mut().next = Ok(3850);
        block_on(sampler.step(10));

        assert_eq!(state.latest().percentage, 100);
        // Only the first pass reached the display.
        assert_eq!(channel.try_receive(), Some(0));
        assert_eq!(channel.try_receive(), None);
    }

    #[test]
    fn test_full_channel_does_not_stall_sampling() {
        let state = scenario_state();
        let channel: LevelChannel<1> = LevelChannel::new();
        let mut sampler = sample_loop(&state, &channel, 2875);

        block_on(async {
            sampler.step(0).await;
            sampler.sensor_mut().next = Ok(3850);
            let reading = sampler.step(100).await;
            assert_eq!(reading.map(|r| r.percentage), Some(100));
        });

        assert_eq!(state.latest().percentage, 100);
        assert_eq!(channel.try_receive(), Some(50));
        assert_eq!(channel.try_receive(), None);
    }

    #[test]
    fn test_sensor_error_keeps_last_reading() {
        let state = scenario_state();
        let channel: LevelChannel = LevelChannel::new();
        let mut sampler = sample_loop(&state, &channel, 2875);

        block_on(sampler.step(0));
        sampler.sensor_mut().next = Err(SensorError::ReadFailed { sensor: "test" });
        let reading = block_on(sampler.step(200));

        assert!(reading.is_none());
        assert_eq!(state.latest().percentage, 50);
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn test_step_ticks_connectivity() {
        let state = scenario_state();
        let channel: LevelChannel = LevelChannel::new();
        let mut sampler = sample_loop(&state, &channel, 2875);

        block_on(sampler.step(10));
        assert_eq!(sampler.connectivity().state(), ConnectivityState::Connecting);

        sampler.connectivity_mut().link_mut().up = true;
        block_on(sampler.step(20));
        assert_eq!(sampler.connectivity().state(), ConnectivityState::Connected);

        sampler.connectivity_mut().link_mut().up = false;
        block_on(async {
            for now in (30..=5_000).step_by(10) {
                sampler.step(now).await;
            }
        });
        assert_eq!(sampler.connectivity().link().attempts, 2);
        assert_eq!(sampler.connectivity().state(), ConnectivityState::Connecting);
    }
}
