//! ABOUTME: Draws the timestamp banner and the recording indicator onto frames
//! ABOUTME: Banner with anti-aliased text sits top-left, the anti-aliased red dot top-right

use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use chrono::{DateTime, Local};
use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::pixelops::interpolate;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use vg_core::{banner_timestamp, Error, Result};
use vg_vision::Frame;

pub const BANNER_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
pub const INDICATOR_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// DejaVu Sans Mono, see assets/DejaVuSansMono-LICENSE
static BANNER_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

/// Sub-samples per axis when estimating circle coverage
const SUPERSAMPLE: u32 = 4;

/// Overlay geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationStyle {
    /// Banner text height in pixels
    pub font_size: f32,
    /// Space between the text and the banner edge
    pub banner_padding: u32,
    pub indicator_radius: u32,
    /// Distance from the top and right frame edges to the indicator's bounding box
    pub indicator_margin: u32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            font_size: 20.0,
            banner_padding: 2,
            indicator_radius: 10,
            indicator_margin: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Annotator {
    style: AnnotationStyle,
    font: FontRef<'static>,
}

impl Annotator {
    pub fn new(style: AnnotationStyle) -> Result<Self> {
        if !style.font_size.is_finite() || style.font_size <= 0.0 {
            return Err(Error::Validation(format!(
                "Banner font size must be positive, got {}",
                style.font_size
            )));
        }

        let font = FontRef::try_from_slice(BANNER_FONT)
            .map_err(|e| Error::Validation(format!("Banner font is unreadable: {}", e)))?;
        Ok(Self { style, font })
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    fn scale(&self) -> PxScale {
        PxScale::from(self.style.font_size)
    }

    /// Draw the overlays for one frame and hand it back
    pub fn annotate(&self, mut frame: Frame, now: &DateTime<Local>, is_recording: bool) -> Frame {
        if frame.width() == 0 || frame.height() == 0 {
            return frame;
        }

        self.draw_timestamp(&mut frame, now);
        if is_recording {
            self.draw_recording_indicator(&mut frame);
        }
        frame
    }

    /// Rendered (width, height) of `text` without the banner padding.
    ///
    /// The width is the summed glyph advance; the height is the font's full
    /// line height so digits and descenders both stay inside the banner.
    pub fn text_size(&self, text: &str) -> (u32, u32) {
        if text.is_empty() {
            return (0, 0);
        }

        let (width, ink_height) = text_size(self.scale(), &self.font, text);
        let scaled = self.font.as_scaled(self.scale());
        let line_height = (scaled.ascent() - scaled.descent()).ceil() as u32;
        (width, line_height.max(ink_height))
    }

    /// Banner rectangle for `text`, anchored at the frame origin
    pub fn banner_rect(&self, text: &str) -> Rect {
        let (width, height) = self.text_size(text);
        let padding = self.style.banner_padding;
        Rect::at(0, 0).of_size(
            (width + 2 * padding).max(1),
            (height + 2 * padding).max(1),
        )
    }

    /// Indicator centre for a frame `frame_width` pixels wide
    pub fn indicator_center(&self, frame_width: u32) -> (i32, i32) {
        let radius = self.style.indicator_radius as i32;
        let margin = self.style.indicator_margin as i32;
        (frame_width as i32 - radius - margin, radius + margin)
    }

    pub fn draw_timestamp(&self, frame: &mut Frame, now: &DateTime<Local>) {
        let text = banner_timestamp(now);
        draw_filled_rect_mut(frame, self.banner_rect(&text), BANNER_COLOR);

        let padding = self.style.banner_padding as i32;
        draw_text_mut(
            frame,
            TEXT_COLOR,
            padding,
            padding,
            self.scale(),
            &self.font,
            &text,
        );
    }

/// Filled red circle with edge pixels blended by their covered area
    pub fn draw_recording_indicator(&self, frame: &mut Frame) {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        let (cx, cy) = self.indicator_center(width);
        let radius = self.style.indicator_radius as i32;
        let x_range = (cx - radius - 1).max(0)..=(cx + radius + 1).min(width as i32 - 1);
        let y_range = (cy - radius - 1).max(0)..=(cy + radius + 1).min(height as i32 - 1);

        for y in y_range {
            for x in x_range.clone() {
                let coverage = circle_coverage(x - cx, y - cy, radius as f32);
                if coverage > 0.0 {
                    let pixel = frame.get_pixel_mut(x as u32, y as u32);
                    *pixel = interpolate(INDICATOR_COLOR, *pixel, coverage);
                }
            }
        }
    }
}

/// Fraction of the pixel at offset (dx, dy) from the centre that lies inside the circle
fn circle_coverage(dx: i32, dy: i32, radius: f32) -> f32 {
    let step = 1.0 / SUPERSAMPLE as f32;
    let radius2 = radius * radius;
    let mut inside = 0u32;

    for sy in 0..SUPERSAMPLE {
        let oy = dy as f32 + (sy as f32 + 0.5) * step - 0.5;
        for sx in 0..SUPERSAMPLE {
            let ox = dx as f32 + (sx as f32 + 0.5) * step - 0.5;
            if ox * ox + oy * oy <= radius2 {
                inside += 1;
            }
        }
    }

    inside as f32 / (SUPERSAMPLE * SUPERSAMPLE) as f32
}
