//! Level sensor on an ADC1 channel

use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcPin};
use esp_hal::peripherals::{ADC1, GPIO4};
use tankmon_core::calibration::{ADC_MAX, RawSample};
use tankmon_core::error::SensorError;
use tankmon_core::sampling::LevelSensor;

pub type LevelAdc = Adc<'static, ADC1<'static>, Blocking>;
pub type LevelAdcPin = AdcPin<GPIO4<'static>, ADC1<'static>>;

/// Float sensor wired to GPIO4, read at 11 dB attenuation for the full 0-3.3 V swing.
pub struct AdcLevelSensor {
    adc: LevelAdc,
    pin: LevelAdcPin,
}

impl AdcLevelSensor {
    pub fn new(adc: LevelAdc, pin: LevelAdcPin) -> Self {
        Self { adc, pin }
    }
}

impl LevelSensor for AdcLevelSensor {
    fn read_raw(&mut self) -> Result<RawSample, SensorError> {
        let raw = nb::block!(self.adc.read_oneshot(&mut self.pin))
            .map_err(|_| SensorError::ReadFailed { sensor: "adc1/gpio4" })?;
        Ok(raw.min(ADC_MAX))
    }
}
