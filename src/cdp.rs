//! Chrome DevTools Protocol document context

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use resvg::tiny_skia::Pixmap;

use crate::context::{CaptureRequest, DocumentContext, LayoutMetrics};
use crate::{ConverterConfig, Error, Result, Viewport};

const MEASURE_SCRIPT: &str = r#"
(function() {
    const root = document.documentElement;
    const body = document.body;
    return JSON.stringify({
        scroll_width: Math.max(root ? root.scrollWidth : 0, body ? body.scrollWidth : 0),
        scroll_height: Math.max(root ? root.scrollHeight : 0, body ? body.scrollHeight : 0),
        offset_height: body ? body.offsetHeight : 0
    });
})()
"#;

/// Headless Chrome `DocumentContext` (uses the `headless_chrome` crate)
///
/// Launches one browser with a single tab. Documents are mounted by
/// navigating the tab to a `data:` URL and unmounted by navigating to
/// `about:blank`.
pub struct CdpContext {
    browser: Browser,
    tab: Arc<Tab>,
}

impl CdpContext {
    pub fn launch(config: &ConverterConfig) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(Duration::from_millis(config.timeout_ms));

        Ok(Self { browser, tab })
    }

    fn evaluate_string(&self, script: &str) -> Result<String> {
        let eval = self
            .tab
            .evaluate(script, false)
            .map_err(|e| Error::RenderError(format!("Evaluation failed: {}", e)))?;
        match eval.value {
            Some(serde_json::Value::String(s)) => Ok(s),
            Some(other) => Ok(other.to_string()),
            None => Err(Error::RenderError("No value returned from evaluation".into())),
        }
    }
}

impl DocumentContext for CdpContext {
    fn name(&self) -> &'static str {
        "cdp"
    }

    fn mount(&mut self, markup: &str, _viewport: Viewport) -> Result<()> {
        let b64 = Base64Engine::encode(&base64::engine::general_purpose::STANDARD, markup);
        let url = format!("data:text/html;charset=utf-8;base64,{}", b64);

        self.tab
            .navigate_to(&url)
            .map_err(|e| Error::RenderError(format!("Mount failed: {}", e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::RenderError(format!("Wait for mount failed: {}", e)))?;
        Ok(())
    }

    fn inject_style(&mut self, css: &str) -> Result<()> {
        let css_literal =
            serde_json::to_string(css).map_err(|e| Error::Other(format!("Failed to encode css: {}", e)))?;
        let script = format!(
            "(function() {{ const s = document.createElement('style'); s.textContent = {}; \
             (document.head || document.documentElement).appendChild(s); return 'ok'; }})()",
            css_literal
        );
        self.evaluate_string(&script).map(|_| ())
    }

    fn measure(&mut self) -> Result<LayoutMetrics> {
        let json = self.evaluate_string(MEASURE_SCRIPT)?;
        serde_json::from_str(&json).map_err(|e| Error::RenderError(format!("Bad layout metrics {}: {}", json, e)))
    }

    fn capture(&mut self, request: &CaptureRequest) -> Result<Pixmap> {
        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: request.width,
            height: request.height,
            scale: request.scale,
        };
        let png = self
            .tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))?;

        Pixmap::decode_png(&png).map_err(|e| Error::RenderError(format!("Screenshot is not a PNG: {}", e)))
    }

    fn unmount(&mut self) -> Result<()> {
        self.tab
            .navigate_to("about:blank")
            .map_err(|e| Error::RenderError(format!("Unmount failed: {}", e)))?;
        Ok(())
    }
}

impl Drop for CdpContext {
    fn drop(&mut self) {
        log::debug!("closing browser (pid {:?})", self.browser.get_process_id());
    }
}
