use ab_glyph::{FontArc, PxScale};
use image::Rgb;
use imageproc::drawing::{draw_filled_circle_mut, draw_text_mut};

use crate::{Frame, Result};

/// DejaVu Sans Mono, see `assets/DejaVuSansMono.LICENSE`.
static FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

/// Where the elapsed time counter goes, from the top left corner.
pub const ELAPSED_POSITION: (i32, i32) = (10, 10);
pub const ELAPSED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Text height in pixels.
pub const TEXT_SCALE: f32 = 20.0;
pub const LEFT_CLICK_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const RIGHT_CLICK_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
pub const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const MARKER_RADIUS: i32 = 3;

/// Draws annotations onto frames in place. Drawing is clipped to the frame,
/// frames never change size.
#[derive(Clone, Debug)]
pub struct Overlays {
    font: FontArc,
    scale: PxScale,
}

impl Overlays {
    pub fn new() -> Result<Self> {
        Ok(Self {
            font: FontArc::try_from_slice(FONT)?,
            scale: PxScale::from(TEXT_SCALE),
        })
    }

    /// Set the text height in pixels.
    pub fn set_scale(mut self, scale: f32) -> Self {
        self.scale = PxScale::from(scale.max(1.0));
        self
    }

    /// Prints the time since the session started in the top left corner.
    pub fn elapsed_time(&self, frame: &mut Frame, timestamp: f64) {
        let seconds = if timestamp.is_finite() && timestamp > 0.0 {
            timestamp
        } else {
            0.0
        };
        let (x, y) = ELAPSED_POSITION;
        draw_text_mut(
            frame,
            ELAPSED_COLOR,
            x,
            y,
            self.scale,
            &self.font,
            &format!("elapsed: {:.2}s", seconds),
        );
    }

    /// Marks a clicked point with its coordinates and a dot.
    pub fn coordinates(
        &self,
        frame: &mut Frame,
        x: i32,
        y: i32,
        color: Rgb<u8>,
    ) {
        let label = format!("({},{})", x, y);
        draw_text_mut(frame, color, x, y, self.scale, &self.font, &label);
        draw_filled_circle_mut(frame, (x, y), MARKER_RADIUS, MARKER_COLOR);
    }
}
