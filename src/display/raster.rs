//! Monochrome framebuffer for the 128x32 OLED.
//!
//! Draw records are turned into pixels here with embedded-graphics mono
//! fonts, so every panel driver receives a finished [`Image`].

use std::convert::Infallible;

use embedded_graphics::{
    mono_font::{
        MonoFont, MonoTextStyle,
        iso_8859_1::{FONT_5X8, FONT_6X10, FONT_6X13, FONT_7X14},
    },
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};

use super::frame::DrawRecord;
use crate::drivers::panel::PANEL_SIZE;

const WIDTH: usize = PANEL_SIZE.0 as usize;
const HEIGHT: usize = PANEL_SIZE.1 as usize;

/// Closest mono font for a point size.
///
/// ISO 8859-1 so that the degree sign renders.
pub fn font_for(size: u8) -> &'static MonoFont<'static> {
    match size {
        0..=8 => &FONT_5X8,
        9..=11 => &FONT_6X10,
        12..=13 => &FONT_6X13,
        _ => &FONT_7X14,
    }
}

/// One bit per pixel, row-major, origin at the top left.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    pixels: Vec<BinaryColor>,
}

impl Default for Image {
    fn default() -> Self {
        Self::blank()
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Image({WIDTH}x{HEIGHT}, {} lit)", self.lit())
    }
}

impl Image {
    pub fn blank() -> Self {
        Self {
            pixels: vec![BinaryColor::Off; WIDTH * HEIGHT],
        }
    }

    /// Pixel at `(x, y)`; off outside the panel.
    pub fn pixel(&self, x: usize, y: usize) -> BinaryColor {
        if x < WIDTH && y < HEIGHT {
            self.pixels[y * WIDTH + x]
        } else {
            BinaryColor::Off
        }
    }

    /// Number of lit pixels.
    pub fn lit(&self) -> usize {
        self.pixels.iter().filter(|p| p.is_on()).count()
    }

    /// The image turned 180°, for boards mounted upside down.
    ///
    /// Reversing a row-major buffer maps `(x, y)` to
    /// `(WIDTH - 1 - x, HEIGHT - 1 - y)`.
    pub fn rotated_180(mut self) -> Self {
        self.pixels.reverse();
        self
    }
}

impl OriginDimensions for Image {
    fn size(&self) -> Size {
        Size::new(PANEL_SIZE.0, PANEL_SIZE.1)
    }
}

impl DrawTarget for Image {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            let (x, y) = (coord.x, coord.y);
            if x >= 0 && y >= 0 && (x as usize) < WIDTH && (y as usize) < HEIGHT {
                self.pixels[y as usize * WIDTH + x as usize] = color;
            }
        }
        Ok(())
    }
}

/// Draws every record, top-left anchored, onto a blank image.
///
/// Text running past the edges is clipped.
pub fn rasterize(records: &[DrawRecord]) -> Image {
    let mut image = Image::blank();
    for record in records {
        let style = MonoTextStyle::new(font_for(record.font_size), BinaryColor::On);
        let origin = Point::new(record.position.0, record.position.1);
        let _ = Text::with_baseline(&record.text, origin, style, Baseline::Top).draw(&mut image);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::frame::{LINE_FONT, lines};
    use pretty_assertions::assert_eq;

    #[test]
    fn no_records_leave_the_image_dark() {
        assert_eq!(rasterize(&[]).lit(), 0);
    }

    #[test]
    fn text_lights_pixels_only_inside_its_cell() {
        let image = rasterize(&[DrawRecord::new((0, 0), "M", LINE_FONT)]);
        let font = font_for(LINE_FONT);
        let (w, h) = (
            font.character_size.width as usize,
            font.character_size.height as usize,
        );

        assert!(image.lit() > 0);
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                if x >= w || y >= h {
                    assert_eq!(image.pixel(x, y), BinaryColor::Off, "({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn bottom_status_line_starts_at_its_row() {
        let image = rasterize(&lines(["", "", "#"].map(String::from)));
        let lit_rows: Vec<usize> = (0..HEIGHT)
            .filter(|&y| (0..WIDTH).any(|x| image.pixel(x, y).is_on()))
            .collect();

        assert!(!lit_rows.is_empty());
        assert!(lit_rows.iter().all(|&y| y >= 21));
    }

    #[test]
    fn text_past_the_edge_is_clipped() {
        let image = rasterize(&[DrawRecord::new((122, 24), "WWWWWW", 14)]);
        assert!(image.lit() > 0);
        assert_eq!(image.pixel(WIDTH, 0), BinaryColor::Off);
    }

    #[test]
    fn degree_sign_renders() {
        let image = rasterize(&[DrawRecord::new((0, 0), "°", LINE_FONT)]);
        let question = rasterize(&[DrawRecord::new((0, 0), "?", LINE_FONT)]);
        assert!(image.lit() > 0);
        assert_ne!(image, question);
    }

    #[test]
    fn rotation_is_a_point_reflection() {
        let plain = rasterize(&[DrawRecord::line(0, "CPU Temp: 45.1°C")]);
        let turned = plain.clone().rotated_180();

        assert_eq!(turned.lit(), plain.lit());
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                assert_eq!(turned.pixel(x, y), plain.pixel(WIDTH - 1 - x, HEIGHT - 1 - y));
            }
        }
        assert_eq!(turned.rotated_180(), plain);
    }
}
