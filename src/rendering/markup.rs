//! HTML rasterization through a `DocumentContext`

use log::{debug, warn};
use resvg::tiny_skia::{PixmapPaint, Transform};

use super::plan::{Calibration, RasterPlan};
use super::raster;
use crate::context::{wait_for_stable_layout, CaptureRequest, DocumentContext, LayoutMetrics};
use crate::normalize::HtmlSurface;
use crate::{ConversionResult, ConverterConfig, Error, OutputFormat, Result};

/// Styles that stop capture backends from clipping content at the edges.
pub fn corrective_css(cal: &Calibration) -> String {
    format!(
        "html, body {{ overflow: visible !important; height: auto !important; min-height: 0 !important; }}\n\
         body {{ padding-bottom: 0 !important; margin-bottom: 0 !important; padding-left: {}px !important; }}\n\
         * {{ overflow-y: visible !important; }}",
        cal.markup_left_padding
    )
}

/// Content size used for the canvas: full scroll width, and the larger of
/// the scroll and offset heights plus `height_slack`.
pub fn content_size(metrics: &LayoutMetrics, cal: &Calibration) -> (f64, f64) {
    let height = metrics.scroll_height.max(metrics.offset_height) + cal.height_slack;
    (metrics.scroll_width, height)
}

/// Mount, settle, measure and capture an HTML surface.
///
/// The mount is torn down whether or not mounting and capture succeeded; a
/// failed mount may still have left a partly loaded document behind.
pub fn rasterize_html(
    surface: &HtmlSurface,
    format: OutputFormat,
    ctx: &mut dyn DocumentContext,
    config: &ConverterConfig,
) -> Result<ConversionResult> {
    let outcome = ctx
        .mount(surface.markup(), config.viewport)
        .and_then(|()| capture_mounted(format, ctx, config));
    if let Err(e) = ctx.unmount() {
        warn!("{}: failed to remove document mount: {}", ctx.name(), e);
    }
    outcome
}

fn capture_mounted(
    format: OutputFormat,
    ctx: &mut dyn DocumentContext,
    config: &ConverterConfig,
) -> Result<ConversionResult> {
    let cal = &config.calibration;
    wait_for_stable_layout(ctx, &config.settle)?;

    if let Err(e) = ctx.inject_style(&corrective_css(cal)) {
        warn!("{}: style injection failed, capturing unstyled: {}", ctx.name(), e);
    }

    // Styles can reflow the document; measure again once it settles.
    let settled = wait_for_stable_layout(ctx, &config.settle)?;
    let (width, height) = content_size(&settled.metrics, cal);
    if width <= 0.0 {
        return Err(Error::RenderError("document has no measurable width".into()));
    }
    debug!("{}: content {}x{} (stable: {})", ctx.name(), width, height, settled.stable);

    let plan = RasterPlan::for_markup(width, height, cal)?;
    let shot = ctx.capture(&CaptureRequest {
        width,
        height,
        scale: plan.oversample_factor,
    })?;

    let mut canvas = raster::white_canvas(plan.canvas_width_px, plan.canvas_height_px)?;
    let (x, y) = plan.draw_offset_px();
    canvas.draw_pixmap(x, y, shot.as_ref(), &PixmapPaint::default(), Transform::identity(), None);

    let data = raster::encode(&canvas, format)?;
    Ok(ConversionResult::new(data, format, plan.canvas_width_px, plan.canvas_height_px))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SettlePolicy;
    use crate::normalize::{normalize, RenderSurface};
    use crate::{SourceKind, Viewport};
    use resvg::tiny_skia::{Color, Pixmap};

    /// Fixed-size document that paints itself solid blue, recording calls.
    #[derive(Default)]
    struct Recording {
        mounted: bool,
        unmounts: u32,
        styles: Vec<String>,
        fail_capture: bool,
        fail_style: bool,
        fail_mount: bool,
    }

    impl DocumentContext for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }
        fn mount(&mut self, _markup: &str, _viewport: Viewport) -> Result<()> {
            self.mounted = true;
            if self.fail_mount {
                return Err(Error::RenderError("navigation timed out".into()));
            }
            Ok(())
        }
        fn inject_style(&mut self, css: &str) -> Result<()> {
            if self.fail_style {
                return Err(Error::RenderError("no head element".into()));
            }
            self.styles.push(css.to_string());
            Ok(())
        }
        fn measure(&mut self) -> Result<LayoutMetrics> {
            Ok(LayoutMetrics {
                scroll_width: 100.0,
                scroll_height: 40.0,
                offset_height: 50.0,
            })
        }
        fn capture(&mut self, request: &CaptureRequest) -> Result<Pixmap> {
            if self.fail_capture {
                return Err(Error::RenderError("canvas tainted".into()));
            }
            let (w, h) = request.pixel_size();
            let mut p = Pixmap::new(w, h).unwrap();
            p.fill(Color::from_rgba8(0, 0, 255, 255));
            Ok(p)
        }
        fn unmount(&mut self) -> Result<()> {
            self.mounted = false;
            self.unmounts += 1;
            Ok(())
        }
    }

    fn config() -> ConverterConfig {
        ConverterConfig {
            settle: SettlePolicy::immediate(),
            ..Default::default()
        }
    }

    fn surface() -> HtmlSurface {
        match normalize("<p>hello</p>", SourceKind::Html).unwrap() {
            RenderSurface::Markup(html) => html,
            other => panic!("unexpected surface {:?}", other),
        }
    }

    #[test]
    fn canvas_is_measured_content_at_4x() {
        let mut ctx = Recording::default();
        let res = rasterize_html(&surface(), OutputFormat::Png, &mut ctx, &config()).unwrap();
        // height = max(40, 50) + 100
        assert_eq!((res.width(), res.height()), (400, 600));
        assert_eq!(ctx.styles.len(), 1);
        assert!(ctx.styles[0].contains("overflow: visible"));
        assert!(!ctx.mounted);
        assert_eq!(ctx.unmounts, 1);
    }

    #[test]
    fn capture_is_shifted_by_the_origin_offsets() {
        let mut ctx = Recording::default();
        let res = rasterize_html(&surface(), OutputFormat::Png, &mut ctx, &config()).unwrap();
        let img = image::load_from_memory(res.data()).unwrap().to_rgb8();
        // (40, 20) logical * 4
        assert_eq!(img.get_pixel(150, 70).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(170, 90).0, [0, 0, 255]);
    }

    #[test]
    fn capture_failure_still_unmounts() {
        let mut ctx = Recording {
            fail_capture: true,
            ..Default::default()
        };
        let err = rasterize_html(&surface(), OutputFormat::Png, &mut ctx, &config()).unwrap_err();
        match err {
            Error::RenderError(msg) => assert_eq!(msg, "canvas tainted"),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!ctx.mounted);
        assert_eq!(ctx.unmounts, 1);
    }

    #[test]
    fn mount_failure_still_unmounts() {
        let mut ctx = Recording {
            fail_mount: true,
            ..Default::default()
        };
        let err = rasterize_html(&surface(), OutputFormat::Png, &mut ctx, &config()).unwrap_err();
        assert!(matches!(err, Error::RenderError(msg) if msg == "navigation timed out"));
        assert!(ctx.styles.is_empty());
        assert!(!ctx.mounted);
        assert_eq!(ctx.unmounts, 1);
    }

    #[test]
    fn style_failure_is_not_fatal() {
        let mut ctx = Recording {
            fail_style: true,
            ..Default::default()
        };
        assert!(rasterize_html(&surface(), OutputFormat::Jpeg, &mut ctx, &config()).is_ok());
    }
}
