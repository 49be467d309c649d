//! Station link state machine
//!
//! The node always hosts its own access point and additionally joins an
//! upstream network as a station. The access point is brought up once and
//! never state-machined; the station link moves between
//! [`ConnectivityState`]s, driven by polling the link every control-loop tick.
//!
//! Reconnect attempts are fire-and-forget and only issued from
//! `Disconnected`, at most once per reconnect interval. The status indicator
//! follows the link: on when connected, off when disconnected.

use core::fmt::Debug;

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::{AccessPointConfig, StationConfig};
use crate::error::NodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    Connecting,
    Connected,
}

/// Link notification delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Up,
    Down,
}

/// Radio port used by the [`ConnectivityManager`].
pub trait StationLink {
    type Error: Debug;

    /// Bring up the access point and start the station radio.
    fn start(
        &mut self,
        access_point: &AccessPointConfig<'_>,
        station: &StationConfig<'_>,
    ) -> Result<(), Self::Error>;

    /// Begin a station connection attempt without waiting for its outcome.
    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Whether the station link is currently up.
    fn is_connected(&mut self) -> bool;
}

pub struct ConnectivityManager<L, P> {
    link: L,
    indicator: P,
    state: ConnectivityState,
    last_attempt_ms: Option<u64>,
    reconnect_interval_ms: u64,
}

impl<L, P> ConnectivityManager<L, P>
where
    L: StationLink,
    P: OutputPin,
{
    pub fn new(link: L, indicator: P, reconnect_interval_ms: u64) -> Self {
        Self {
            link,
            indicator,
            state: ConnectivityState::Disconnected,
            last_attempt_ms: None,
            reconnect_interval_ms,
        }
    }

    /// Bring up the access point and issue the first station attempt.
    ///
    /// Access point failure is fatal. A failed first station attempt is left
    /// to the reconnect policy.
    pub fn initialize(
        &mut self,
        access_point: &AccessPointConfig<'_>,
        station: &StationConfig<'_>,
        now_ms: u64,
    ) -> Result<(), NodeError> {
        self.set_indicator(false);

        self.link.start(access_point, station).map_err(|e| {
            log::error!("Access point {} failed to start: {:?}", access_point.ssid, e);
            NodeError::AccessPoint
        })?;
        info!(
            "Access point {} up at {}.{}.{}.{}/{}",
            access_point.ssid,
            access_point.address[0],
            access_point.address[1],
            access_point.address[2],
            access_point.address[3],
            access_point.prefix_len
        );

        info!("Joining {}", station.ssid);
        self.attempt(now_ms);
        Ok(())
    }

    /// Poll the link at startup until it comes up or `attempts` polls ran out.
    ///
    /// Returns `false` when the node should carry on in access-point-only mode.
    pub async fn wait_for_link<D: DelayNs>(
        &mut self,
        attempts: u8,
        retry_delay_ms: u32,
        delay: &mut D,
    ) -> bool {
        for attempt in 0..attempts {
            if self.link.is_connected() {
                self.transition(ConnectivityState::Connected);
                return true;
            }
            debug!("Waiting for station link ({}/{})", attempt + 1, attempts);
            delay.delay_ms(retry_delay_ms).await;
        }

        if self.link.is_connected() {
            self.transition(ConnectivityState::Connected);
            return true;
        }
        warn!("Station link not up after {} polls, continuing with access point only", attempts);
        false
    }

    /// Poll the link, apply transitions and reconnect when due.
    pub fn tick(&mut self, now_ms: u64) -> ConnectivityState {
        let event = if self.link.is_connected() {
            LinkEvent::Up
        } else {
            LinkEvent::Down
        };
        self.handle_event(event, now_ms)
    }

    /// Apply a link notification, then reconnect when due.
    pub fn handle_event(&mut self, event: LinkEvent, now_ms: u64) -> ConnectivityState {
        match (self.state, event) {
            (ConnectivityState::Connected, LinkEvent::Down) => {
                warn!("Station link lost");
                self.transition(ConnectivityState::Disconnected);
            }
            (ConnectivityState::Connecting, LinkEvent::Down) if self.attempt_due(now_ms) => {
                debug!("Station attempt timed out");
                self.transition(ConnectivityState::Disconnected);
            }
            (ConnectivityState::Disconnected | ConnectivityState::Connecting, LinkEvent::Up) => {
                self.transition(ConnectivityState::Connected);
            }
            _ => {}
        }

        if self.state == ConnectivityState::Disconnected && self.attempt_due(now_ms) {
            info!("Reconnecting station link");
            self.attempt(now_ms);
        }

        self.state
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn last_attempt_ms(&self) -> Option<u64> {
        self.last_attempt_ms
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn indicator(&self) -> &P {
        &self.indicator
    }

    fn attempt_due(&self, now_ms: u64) -> bool {
        match self.last_attempt_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.reconnect_interval_ms,
        }
    }

    fn attempt(&mut self, now_ms: u64) {
        // Stamped even on failure so a broken radio never turns into a busy loop.
        self.last_attempt_ms = Some(now_ms);
        match self.link.connect() {
            Ok(()) => self.transition(ConnectivityState::Connecting),
            Err(e) => warn!("Station connect attempt failed: {:?}", e),
        }
    }

    fn transition(&mut self, next: ConnectivityState) {
        if self.state == next {
            return;
        }
        info!("Station link {:?} -> {:?}", self.state, next);
        self.state = next;
        match next {
            ConnectivityState::Connected => self.set_indicator(true),
            ConnectivityState::Disconnected => self.set_indicator(false),
            ConnectivityState::Connecting => {}
        }
    }

    fn set_indicator(&mut self, on: bool) {
        let result = if on {
            self.indicator.set_high()
        } else {
            self.indicator.set_low()
        };
        if let Err(e) = result {
            warn!("Status indicator write failed: {:?}", e);
        }
    }
}
