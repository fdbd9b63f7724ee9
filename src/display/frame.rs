//! Draw records and the exclusive renderer.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;

use super::raster::{Image, rasterize};
use crate::drivers::panel::Panel;

/// Font size of the three status lines.
pub const LINE_FONT: u8 = 11;
/// Vertical offsets of the three status lines.
pub const LINE_ROWS: [i32; 3] = [-2, 10, 21];

/// One piece of text at a pixel position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRecord {
    pub position: (i32, i32),
    pub text: String,
    pub font_size: u8,
}

impl DrawRecord {
    pub fn new(position: (i32, i32), text: impl Into<String>, font_size: u8) -> Self {
        Self {
            position,
            text: text.into(),
            font_size,
        }
    }

    /// Status line `row` (0..3) at the left edge.
    pub fn line(row: usize, text: impl Into<String>) -> Self {
        let y = LINE_ROWS.get(row).copied().unwrap_or(LINE_ROWS[2]);
        Self::new((0, y), text, LINE_FONT)
    }
}

/// Three status lines.
pub fn lines(texts: [String; 3]) -> Vec<DrawRecord> {
    texts
        .into_iter()
        .enumerate()
        .map(|(row, text)| DrawRecord::line(row, text))
        .collect()
}

/// A full screen handed to the panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub records: Vec<DrawRecord>,
    /// The records rasterized, already turned when the board is upside down.
    pub image: Image,
}

/// Owns the panel; every blit goes through it.
pub struct Renderer {
    panel: Box<dyn Panel>,
    rotate: bool,
}

impl Renderer {
    pub fn new(panel: Box<dyn Panel>, rotate: bool) -> Self {
        Self { panel, rotate }
    }

    pub fn show(&mut self, records: Vec<DrawRecord>) -> Result<()> {
        let mut image = rasterize(&records);
        if self.rotate {
            image = image.rotated_180();
        }
        self.panel.display(&Frame { records, image })
    }

    /// Blanks the screen.
    pub fn blank(&mut self) -> Result<()> {
        self.show(Vec::new())
    }
}

/// The render critical section shared by every path that draws.
pub type DisplayLock = Arc<Mutex<Renderer>>;

pub fn display_lock(renderer: Renderer) -> DisplayLock {
    Arc::new(Mutex::new(renderer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex as StdMutex;

    #[derive(Clone, Default)]
    struct CapturePanel(Arc<StdMutex<Vec<Frame>>>);

    impl Panel for CapturePanel {
        fn begin(&mut self) -> Result<()> {
            Ok(())
        }
        fn clear(&mut self) -> Result<()> {
            Ok(())
        }
        fn display(&mut self, frame: &Frame) -> Result<()> {
            self.0.lock().unwrap().push(frame.clone());
            Ok(())
        }
        fn width(&self) -> u32 {
            128
        }
        fn height(&self) -> u32 {
            32
        }
    }

    fn shown_with(rotate: bool, records: Vec<DrawRecord>) -> Frame {
        let panel = CapturePanel::default();
        let mut renderer = Renderer::new(Box::new(panel.clone()), rotate);
        renderer.show(records).unwrap();
        let frames = panel.0.lock().unwrap();
        frames[0].clone()
    }

    #[test]
    fn rotate_turns_the_image_upside_down() {
        let records = lines([
            "Uptime: 3 min".into(),
            "CPU Temp: 45.1°C".into(),
            "IP 10.0.0.2".into(),
        ]);
        let upright = shown_with(false, records.clone());
        let turned = shown_with(true, records);

        assert_eq!(upright.records, turned.records);
        assert!(upright.image.lit() > 0);
        assert_ne!(upright.image, turned.image);
        for y in 0..32 {
            for x in 0..128 {
                assert_eq!(turned.image.pixel(x, y), upright.image.pixel(127 - x, 31 - y));
            }
        }
    }

    #[test]
    fn blank_shows_a_dark_frame() {
        let panel = CapturePanel::default();
        let mut renderer = Renderer::new(Box::new(panel.clone()), true);
        renderer.blank().unwrap();

        let frames = panel.0.lock().unwrap();
        assert!(frames[0].records.is_empty());
        assert_eq!(frames[0].image.lit(), 0);
    }

    #[test]
    fn status_lines_use_fixed_rows() {
        let records = lines(["a".into(), "b".into(), "c".into()]);
        assert_eq!(
            records.iter().map(|r| r.position).collect::<Vec<_>>(),
            vec![(0, -2), (0, 10), (0, 21)]
        );
        assert!(records.iter().all(|r| r.font_size == LINE_FONT));
    }
}
