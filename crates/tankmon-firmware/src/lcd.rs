//! HD44780 character LCD behind a PCF8574 I2C backpack
//!
//! The backpack exposes the controller's 4-bit bus on its port pins:
//! P0 = RS, P1 = RW, P2 = EN, P3 = backlight, P4..P7 = D4..D7.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::info;
use tankmon_core::display::{DISPLAY_COLUMNS, DISPLAY_ROWS, DisplaySink};
use thiserror_no_std::Error;

/// Default address of a PCF8574 backpack with A0..A2 pulled high
pub const LCD_ADDRESS: u8 = 0x27;

const RS: u8 = 1 << 0;
const EN: u8 = 1 << 2;
const BACKLIGHT: u8 = 1 << 3;

const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE_INCREMENT: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;

const ROW_OFFSETS: [u8; 2] = [0x00, 0x40];

#[derive(Error, Debug)]
pub enum LcdError<E: core::fmt::Debug> {
    #[error("I2C transfer failed: {0:?}")]
    Bus(E),
    #[error("cursor ({col}, {row}) is outside the display")]
    Cursor { col: u8, row: u8 },
}

pub struct I2cLcd<I, D> {
    i2c: I,
    delay: D,
    address: u8,
}

impl<I, D> I2cLcd<I, D>
where
    I: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    /// Run the 4-bit initialization sequence and turn the display on.
    pub async fn init(&mut self) -> Result<(), LcdError<I::Error>> {
        // Power-on settle time before the controller accepts commands.
        self.delay.delay_ms(50).await;

        // Three 8-bit function sets resynchronize the controller whatever its state.
        self.write_nibble(0x30).await?;
        self.delay.delay_us(4_500).await;
        self.write_nibble(0x30).await?;
        self.delay.delay_us(4_500).await;
        self.write_nibble(0x30).await?;
        self.delay.delay_us(150).await;
        self.write_nibble(0x20).await?;

        self.command(CMD_FUNCTION_4BIT_2LINE).await?;
        self.command(CMD_DISPLAY_ON).await?;
        self.command(CMD_CLEAR).await?;
        self.delay.delay_ms(2).await;
        self.command(CMD_ENTRY_MODE_INCREMENT).await?;

        info!("LCD ready at 0x{:02x}", self.address);
        Ok(())
    }

    async fn command(&mut self, value: u8) -> Result<(), LcdError<I::Error>> {
        self.send(value, 0).await
    }

    async fn send(&mut self, value: u8, mode: u8) -> Result<(), LcdError<I::Error>> {
        self.write_nibble((value & 0xF0) | mode).await?;
        self.write_nibble((value << 4) | mode).await
    }

    async fn write_nibble(&mut self, bits: u8) -> Result<(), LcdError<I::Error>> {
        let bits = bits | BACKLIGHT;
        self.i2c
            .write(self.address, &[bits | EN])
            .await
            .map_err(LcdError::Bus)?;
        self.delay.delay_us(1).await;
        self.i2c
            .write(self.address, &[bits])
            .await
            .map_err(LcdError::Bus)?;
        // Most instructions need 37 us to execute.
        self.delay.delay_us(50).await;
        Ok(())
    }
}

impl<I, D> DisplaySink for I2cLcd<I, D>
where
    I: I2c,
    D: DelayNs,
{
    type Error = LcdError<I::Error>;

    async fn clear(&mut self) -> Result<(), Self::Error> {
        self.command(CMD_CLEAR).await?;
        self.delay.delay_ms(2).await;
        Ok(())
    }

    async fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), Self::Error> {
        if col >= DISPLAY_COLUMNS || row >= DISPLAY_ROWS {
            return Err(LcdError::Cursor { col, row });
        }
        self.command(CMD_SET_DDRAM | (ROW_OFFSETS[row as usize] + col))
            .await
    }

    async fn print(&mut self, text: &str) -> Result<(), Self::Error> {
        for byte in text.bytes() {
            self.send(byte, RS).await?;
        }
        Ok(())
    }
}
