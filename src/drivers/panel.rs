//! Display panel seam.

use anyhow::Result;
use log::{debug, info};

use crate::display::frame::Frame;

/// Width and height of the SATA HAT OLED.
pub const PANEL_SIZE: (u32, u32) = (128, 32);

/// Pixel-level display driver.
///
/// Each [`Frame`] arrives with its image rasterized and oriented; the driver
/// only pushes the pixels over the bus.
pub trait Panel: Send {
    fn begin(&mut self) -> Result<()>;

    fn clear(&mut self) -> Result<()>;

    fn display(&mut self, frame: &Frame) -> Result<()>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;
}

/// Panel that writes each frame to the log.
#[derive(Debug, Default)]
pub struct HeadlessPanel;

impl HeadlessPanel {
    pub fn new() -> Self {
        Self
    }
}

impl Panel for HeadlessPanel {
    fn begin(&mut self) -> Result<()> {
        info!(
            "Headless display {}x{} ready",
            PANEL_SIZE.0, PANEL_SIZE.1
        );
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        debug!("display: clear");
        Ok(())
    }

    fn display(&mut self, frame: &Frame) -> Result<()> {
        let text: Vec<&str> = frame.records.iter().map(|r| r.text.as_str()).collect();
        debug!("display ({} px lit): {}", frame.image.lit(), text.join(" | "));
        Ok(())
    }

    fn width(&self) -> u32 {
        PANEL_SIZE.0
    }

    fn height(&self) -> u32 {
        PANEL_SIZE.1
    }
}
