//! Lite document context: a pure-Rust stand-in for an embedded browser.
//!
//! Markup is parsed with `scraper`, laid out as stacked text blocks and
//! painted with tiny-skia. No JavaScript runs and layout is synchronous, so
//! measurements settle immediately. Of injected stylesheets only
//! `padding-left` is honored.

use resvg::tiny_skia::Pixmap;
use scraper::Html;

use crate::context::{CaptureRequest, DocumentContext, LayoutMetrics};
use crate::rendering::layout::{document_extent, layout_document, LayoutNode, LayoutOptions};
use crate::rendering::paint::{build_display_list, paint};
use crate::{Error, Result, Viewport};

struct Mounted {
    document: Html,
    viewport: Viewport,
    padding_left: u32,
}

/// Pure-Rust `DocumentContext`
#[derive(Default)]
pub struct LiteContext {
    mounted: Option<Mounted>,
}

impl LiteContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    fn layout(&self) -> Result<(Vec<LayoutNode>, LayoutOptions)> {
        let m = self
            .mounted
            .as_ref()
            .ok_or_else(|| Error::RenderError("no document is mounted".into()))?;
        let opts = LayoutOptions {
            width: m.viewport.width,
            padding_left: m.padding_left,
        };
        Ok((layout_document(&m.document, opts), opts))
    }
}

impl DocumentContext for LiteContext {
    fn name(&self) -> &'static str {
        "lite"
    }

    fn mount(&mut self, markup: &str, viewport: Viewport) -> Result<()> {
        self.mounted = Some(Mounted {
            document: Html::parse_document(markup),
            viewport,
            padding_left: 0,
        });
        Ok(())
    }

    fn inject_style(&mut self, css: &str) -> Result<()> {
        let m = self
            .mounted
            .as_mut()
            .ok_or_else(|| Error::RenderError("no document is mounted".into()))?;
        if let Some(px) = declared_px(css, "padding-left") {
            m.padding_left = px;
        }
        Ok(())
    }

    fn measure(&mut self) -> Result<LayoutMetrics> {
        let (nodes, opts) = self.layout()?;
        let (width, height) = document_extent(&nodes, opts);
        Ok(LayoutMetrics {
            scroll_width: width as f64,
            scroll_height: height as f64,
            offset_height: height as f64,
        })
    }

    fn capture(&mut self, request: &CaptureRequest) -> Result<Pixmap> {
        let (nodes, _) = self.layout()?;
        let (w, h) = request.pixel_size();
        let mut pixmap = Pixmap::new(w, h)
            .ok_or_else(|| Error::RenderError(format!("cannot allocate a {}x{} capture", w, h)))?;
        paint(&build_display_list(&nodes), &mut pixmap, request.scale as f32);
        Ok(pixmap)
    }

    fn unmount(&mut self) -> Result<()> {
        self.mounted = None;
        Ok(())
    }
}

/// Last `<property>: <n>px` declaration in `css`, if any.
fn declared_px(css: &str, property: &str) -> Option<u32> {
    css.split(|c| c == ';' || c == '{' || c == '}')
        .filter_map(|decl| decl.split_once(':'))
        .filter(|(prop, _)| prop.trim() == property)
        .filter_map(|(_, value)| {
            let value = value.trim().trim_end_matches("!important").trim();
            value.strip_suffix("px").unwrap_or(value).trim().parse::<f64>().ok()
        })
        .last()
        .map(|px| px.max(0.0).round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{wait_for_stable_layout, SettlePolicy};

    const PAGE: &str = "<html><body><h1>Title</h1><p>Some paragraph text.</p></body></html>";

    #[test]
    fn measure_requires_a_mount() {
        let mut ctx = LiteContext::new();
        assert!(matches!(ctx.measure(), Err(Error::RenderError(_))));
    }

    #[test]
    fn layout_settles_immediately() {
        let mut ctx = LiteContext::new();
        ctx.mount(PAGE, Viewport::default()).unwrap();
        let settled = wait_for_stable_layout(&mut ctx, &SettlePolicy::immediate()).unwrap();
        assert!(settled.stable);
        assert_eq!(settled.attempts, 2);
        assert_eq!(settled.metrics.scroll_width, 1280.0);
        assert!(settled.metrics.scroll_height > 40.0);
    }

    #[test]
    fn injected_padding_is_honored() {
        assert_eq!(declared_px("body { padding-left: 20px !important; }", "padding-left"), Some(20));
        assert_eq!(declared_px("body { margin: 0 }", "padding-left"), None);

        let mut ctx = LiteContext::new();
        ctx.mount(PAGE, Viewport { width: 200, height: 100 }).unwrap();
        let before = ctx.measure().unwrap();
        ctx.inject_style("body { padding-left: 120px; }").unwrap();
        let after = ctx.measure().unwrap();
        // the narrower column wraps the paragraph onto more lines
        assert!(after.scroll_height > before.scroll_height);
    }

    #[test]
    fn capture_paints_text() {
        let mut ctx = LiteContext::new();
        ctx.mount(PAGE, Viewport { width: 300, height: 200 }).unwrap();
        let m = ctx.measure().unwrap();
        let shot = ctx
            .capture(&CaptureRequest {
                width: m.scroll_width,
                height: m.scroll_height,
                scale: 2.0,
            })
            .unwrap();
        assert_eq!(shot.width(), 600);
        assert!(shot.pixels().iter().any(|p| p.alpha() == 255));
    }

    #[test]
    fn unmount_clears_the_document() {
        let mut ctx = LiteContext::new();
        ctx.mount(PAGE, Viewport::default()).unwrap();
        ctx.unmount().unwrap();
        assert!(!ctx.is_mounted());
    }
}
