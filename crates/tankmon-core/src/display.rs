//! Character display layout and the display consumer task
//!
//! The display is a 16x2 character LCD. Row 0 holds a fixed header, row 1 a
//! `Level = NN%` line whose value field is overwritten in place on every
//! update.

use core::fmt::{Debug, Write};

use log::{error, info};

use crate::channel::LevelChannel;

pub const DISPLAY_COLUMNS: u8 = 16;
pub const DISPLAY_ROWS: u8 = 2;

const HEADER: &str = "Tank Info";
const LEVEL_LABEL: &str = "Level = ";
const LEVEL_ROW: u8 = 1;
const LEVEL_COLUMN: u8 = LEVEL_LABEL.len() as u8;
const LEVEL_FIELD_WIDTH: usize = (DISPLAY_COLUMNS - LEVEL_COLUMN) as usize;

/// Text sink accepting lines at a cursor position.
pub trait DisplaySink {
    type Error: Debug;

    fn clear(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    fn set_cursor(&mut self, col: u8, row: u8) -> impl Future<Output = Result<(), Self::Error>>;

    fn print(&mut self, text: &str) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Renders the tank level on a [`DisplaySink`].
pub struct LevelDisplay<D> {
    sink: D,
}

impl<D: DisplaySink> LevelDisplay<D> {
    pub fn new(sink: D) -> Self {
        Self { sink }
    }

    /// Boot message shown while the rest of the node comes up.
    pub async fn show_splash(&mut self) -> Result<(), D::Error> {
        self.sink.clear().await?;
        self.sink.set_cursor(0, 0).await?;
        self.sink.print("Initializing").await
    }

    /// Draw the fixed layout with an empty level.
    pub async fn show_header(&mut self) -> Result<(), D::Error> {
        self.sink.clear().await?;
        self.sink.set_cursor(0, 0).await?;
        self.sink.print(HEADER).await?;
        self.sink.set_cursor(0, LEVEL_ROW).await?;
        self.sink.print(LEVEL_LABEL).await?;
        self.show_level(0).await
    }

    /// Overwrite the level field, padding to the end of the row.
    pub async fn show_level(&mut self, percentage: u8) -> Result<(), D::Error> {
        let text = level_field(percentage);
        self.sink.set_cursor(LEVEL_COLUMN, LEVEL_ROW).await?;
        self.sink.print(&text).await
    }

    /// Render every value arriving on `channel`. Never returns.
    pub async fn run<const K: usize>(&mut self, channel: &LevelChannel<K>) -> ! {
        info!("Display consumer started");
        loop {
            let percentage = channel.receive().await;
            if let Err(e) = self.show_level(percentage).await {
                error!("Display update failed: {:?}", e);
            }
        }
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    pub fn into_inner(self) -> D {
        self.sink
    }
}

fn level_field(percentage: u8) -> heapless::String<LEVEL_FIELD_WIDTH> {
    let mut text = heapless::String::new();
    // Three digits and a percent sign always fit the eight-column field.
    let _ = write!(text, "{}%", percentage.min(100));
    while text.push(' ').is_ok() {}
    text
}
