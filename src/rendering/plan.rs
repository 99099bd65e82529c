//! Canvas sizing shared by the vector and markup paths

use serde::{Deserialize, Serialize};
use resvg::tiny_skia::Transform;

use crate::{Error, Result};

/// 128 megapixels, 512 MiB of RGBA
pub const DEFAULT_MAX_CANVAS_PIXELS: u64 = 128 * 1024 * 1024;

/// Calibration constants for canvas sizing and capture offsets.
///
/// The defaults were tuned against a browser rasterizer that clips content
/// at the left and top edges; other backends may want different values.
/// All lengths are in logical (un-oversampled) units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Floor for the smaller content dimension
    pub min_dimension: f64,
    /// Padding on all sides of vector content
    pub padding: f64,
    /// Extra canvas width reserved for left/right balance
    pub horizontal_offset: f64,
    /// Extra left shift of vector content inside the padding
    pub left_bias: f64,
    /// Canvas oversample factor for SVG input
    pub vector_oversample: f64,
    /// Multiplier applied to the SVG `width`/`height` attributes before loading
    pub attribute_scale: f64,
    /// Capture oversample factor for HTML input
    pub markup_oversample: f64,
    /// Horizontal capture origin offset for HTML input (content moves right)
    pub capture_offset_x: f64,
    /// Vertical capture origin offset for HTML input (content moves down)
    pub capture_offset_y: f64,
    /// Added to the measured HTML height
    pub height_slack: f64,
    /// Left padding injected into mounted HTML documents
    pub markup_left_padding: f64,
    /// Largest canvas, in pixels, either path may allocate
    pub max_canvas_pixels: u64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            min_dimension: 300.0,
            padding: 30.0,
            horizontal_offset: 50.0,
            left_bias: 30.0,
            vector_oversample: 2.0,
            attribute_scale: 2.0,
            markup_oversample: 4.0,
            capture_offset_x: 40.0,
            capture_offset_y: 20.0,
            height_slack: 100.0,
            markup_left_padding: 20.0,
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
        }
    }
}

impl Calibration {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("vector_oversample", self.vector_oversample),
            ("attribute_scale", self.attribute_scale),
            ("markup_oversample", self.markup_oversample),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::ConfigError(format!("{} must be positive, got {}", name, value)));
            }
        }
        let non_negative = [
            ("min_dimension", self.min_dimension),
            ("padding", self.padding),
            ("horizontal_offset", self.horizontal_offset),
            ("left_bias", self.left_bias),
            ("height_slack", self.height_slack),
            ("markup_left_padding", self.markup_left_padding),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::ConfigError(format!("{} must be non-negative, got {}", name, value)));
            }
        }
        if !(self.capture_offset_x.is_finite() && self.capture_offset_y.is_finite()) {
            return Err(Error::ConfigError("capture offsets must be finite".into()));
        }
        if self.max_canvas_pixels == 0 {
            return Err(Error::ConfigError("max_canvas_pixels must be at least 1".into()));
        }
        Ok(())
    }
}

/// Scale `(width, height)` up so the smaller side is at least `min`,
/// keeping the aspect ratio.
pub fn enforce_min_dimension(width: f64, height: f64, min: f64) -> (f64, f64) {
    let smaller = width.min(height);
    if smaller <= 0.0 || smaller >= min {
        return (width, height);
    }
    let factor = min / smaller;
    (width * factor, height * factor)
}

/// Where and how large content is drawn on the output canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterPlan {
    pub oversample_factor: f64,
    pub padding: f64,
    pub horizontal_offset: f64,
    /// Content size after the minimum-dimension floor, in logical units
    pub content_width: f64,
    pub content_height: f64,
    /// Top-left corner of the content, in logical units
    pub draw_offset_x: f64,
    pub draw_offset_y: f64,
    pub canvas_width_px: u32,
    pub canvas_height_px: u32,
}

impl RasterPlan {
    /// Plan for SVG content: minimum-size floor, padding, horizontal offset
    /// and left bias, oversampled by `vector_oversample`.
    pub fn for_vector(width: f64, height: f64, cal: &Calibration) -> Result<Self> {
        let (content_width, content_height) = enforce_min_dimension(width, height, cal.min_dimension);
        let s = cal.vector_oversample;
        let p = cal.padding;
        let o = cal.horizontal_offset;

        let plan = Self {
            oversample_factor: s,
            padding: p,
            horizontal_offset: o,
            content_width,
            content_height,
            draw_offset_x: p + cal.left_bias,
            draw_offset_y: p,
            canvas_width_px: to_pixels((content_width + 2.0 * p + o) * s)?,
            canvas_height_px: to_pixels((content_height + 2.0 * p) * s)?,
        };
        log::debug!("vector plan: {:?}", plan);
        plan.within(cal.max_canvas_pixels)
    }

    /// Plan for a captured HTML document: the canvas matches the measured
    /// content and the capture is shifted by the capture offsets.
    pub fn for_markup(width: f64, height: f64, cal: &Calibration) -> Result<Self> {
        let s = cal.markup_oversample;
        let plan = Self {
            oversample_factor: s,
            padding: 0.0,
            horizontal_offset: 0.0,
            content_width: width,
            content_height: height,
            draw_offset_x: cal.capture_offset_x,
            draw_offset_y: cal.capture_offset_y,
            canvas_width_px: to_pixels(width * s)?,
            canvas_height_px: to_pixels(height * s)?,
        };
        log::debug!("markup plan: {:?}", plan);
        plan.within(cal.max_canvas_pixels)
    }

    /// Total canvas pixels
    pub fn canvas_pixels(&self) -> u64 {
        self.canvas_width_px as u64 * self.canvas_height_px as u64
    }

    fn within(self, max_pixels: u64) -> Result<Self> {
        if self.canvas_pixels() > max_pixels {
            return Err(Error::RenderError(format!(
                "canvas of {}x{} pixels exceeds the limit of {} pixels",
                self.canvas_width_px, self.canvas_height_px, max_pixels
            )));
        }
        Ok(self)
    }

    /// Logical-to-pixel transform: scale by the oversample factor, then move
    /// to the draw offset. Draws through it are expressed in content units.
    pub fn content_transform(&self) -> Transform {
        let s = self.oversample_factor as f32;
        Transform::from_scale(s, s).pre_translate(self.draw_offset_x as f32, self.draw_offset_y as f32)
    }

    /// Draw offset in canvas pixels
    pub fn draw_offset_px(&self) -> (i32, i32) {
        (
            (self.draw_offset_x * self.oversample_factor).round() as i32,
            (self.draw_offset_y * self.oversample_factor).round() as i32,
        )
    }
}

fn to_pixels(value: f64) -> Result<u32> {
    let px = value.ceil();
    if !(px.is_finite() && px >= 1.0 && px <= u32::MAX as f64) {
        return Err(Error::RenderError(format!("invalid canvas dimension: {}", value)));
    }
    Ok(px as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_content_is_scaled_to_minimum() {
        let (w, h) = enforce_min_dimension(100.0, 50.0, 300.0);
        assert_eq!(h, 300.0);
        assert!((w / h - 2.0).abs() < 1e-9);
    }

    #[test]
    fn large_content_is_untouched() {
        assert_eq!(enforce_min_dimension(800.0, 600.0, 300.0), (800.0, 600.0));
        assert_eq!(enforce_min_dimension(300.0, 1000.0, 300.0), (300.0, 1000.0));
    }

    #[test]
    fn vector_canvas_for_800_by_600() {
        let plan = RasterPlan::for_vector(800.0, 600.0, &Calibration::default()).unwrap();
        assert_eq!(plan.canvas_width_px, 1820);
        assert_eq!(plan.canvas_height_px, 1320);
        assert_eq!((plan.draw_offset_x, plan.draw_offset_y), (60.0, 30.0));
        assert_eq!(plan.draw_offset_px(), (120, 60));
    }

    #[test]
    fn vector_canvas_uses_floored_content() {
        let plan = RasterPlan::for_vector(100.0, 50.0, &Calibration::default()).unwrap();
        assert_eq!((plan.content_width, plan.content_height), (600.0, 300.0));
        assert_eq!(plan.canvas_width_px, (600 + 60 + 50) * 2);
        assert_eq!(plan.canvas_height_px, (300 + 60) * 2);
    }

    #[test]
    fn markup_canvas_is_oversampled_content() {
        let plan = RasterPlan::for_markup(1280.0, 500.0, &Calibration::default()).unwrap();
        assert_eq!((plan.canvas_width_px, plan.canvas_height_px), (5120, 2000));
        assert_eq!(plan.draw_offset_px(), (160, 80));
    }

    #[test]
    fn content_transform_maps_origin_to_offset() {
        let plan = RasterPlan::for_vector(800.0, 600.0, &Calibration::default()).unwrap();
        let t = plan.content_transform();
        assert_eq!((t.tx, t.ty), (120.0, 60.0));
        assert_eq!((t.sx, t.sy), (2.0, 2.0));
    }

    #[test]
    fn empty_content_cannot_be_planned() {
        assert!(RasterPlan::for_markup(0.0, 10.0, &Calibration::default()).is_err());
    }

    #[test]
    fn oversized_canvas_is_a_render_error() {
        let cal = Calibration::default();
        // 200220 x 200120 px
        let err = RasterPlan::for_vector(100_000.0, 100_000.0, &cal).unwrap_err();
        assert!(matches!(err, Error::RenderError(msg) if msg.contains("exceeds the limit")));

        // a very long page: 5120 x 400000 px
        assert!(matches!(
            RasterPlan::for_markup(1280.0, 100_000.0, &cal),
            Err(Error::RenderError(_))
        ));
    }

    #[test]
    fn canvas_limit_is_inclusive_and_configurable() {
        let cal = Calibration {
            max_canvas_pixels: 1820 * 1320,
            ..Default::default()
        };
        assert!(RasterPlan::for_vector(800.0, 600.0, &cal).is_ok());

        let tight = Calibration {
            max_canvas_pixels: 1820 * 1320 - 1,
            ..cal
        };
        assert!(RasterPlan::for_vector(800.0, 600.0, &tight).is_err());
        assert!(Calibration { max_canvas_pixels: 0, ..cal }.validate().is_err());
    }

    #[test]
    fn calibration_rejects_zero_oversample() {
        let cal = Calibration {
            vector_oversample: 0.0,
            ..Default::default()
        };
        assert!(matches!(cal.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn partial_calibration_json_keeps_defaults() {
        let cal: Calibration = serde_json::from_str(r#"{ "padding": 10 }"#).unwrap();
        assert_eq!(cal.padding, 10.0);
        assert_eq!(cal.horizontal_offset, 50.0);
    }
}
