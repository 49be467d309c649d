//! Bounded handoff from the sample loop to the display consumer
//!
//! The sampling cadence is fixed while a display write costs bus I/O. The
//! channel sits between the two so a slow display never perturbs sensor
//! timing: the producer waits at most a short timeout for room and otherwise
//! drops the value, the consumer suspends until something arrives.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, with_timeout};

/// Default number of percentage values buffered between producer and consumer
pub const LEVEL_CHANNEL_CAPACITY: usize = 10;

/// FIFO of fill percentages with capacity `K`.
///
/// Safe to place in a `static`; all access goes through a critical-section mutex.
pub struct LevelChannel<const K: usize = LEVEL_CHANNEL_CAPACITY> {
    inner: Channel<CriticalSectionRawMutex, u8, K>,
}

impl<const K: usize> LevelChannel<K> {
    pub const fn new() -> Self {
        const { assert!(K >= 1, "level channel needs room for at least one value") };
        Self {
            inner: Channel::new(),
        }
    }

    /// Queue `value`, waiting at most `timeout` for room.
    ///
    /// Returns `false` when the channel stayed full and the value was dropped.
    pub async fn try_send(&self, value: u8, timeout: Duration) -> bool {
        if self.inner.try_send(value).is_ok() {
            return true;
        }
        with_timeout(timeout, self.inner.send(value)).await.is_ok()
    }

    /// Wait until a value is available and take it.
    pub async fn receive(&self) -> u8 {
        self.inner.receive().await
    }

    pub fn try_receive(&self) -> Option<u8> {
        self.inner.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        K
    }
}

impl<const K: usize> Default for LevelChannel<K> {
    fn default() -> Self {
        Self::new()
    }
}
