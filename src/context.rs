//! Off-screen document contexts for HTML input
//!
//! A `DocumentContext` mounts markup somewhere invisible, reports the realized
//! layout size, and captures the laid-out document as a bitmap. Layout may
//! keep changing after mount (fonts, images, scripts), and no backend can
//! report "done" reliably, so `wait_for_stable_layout` polls the measurements
//! until two consecutive readings agree.

use std::time::Duration;

use resvg::tiny_skia::Pixmap;
use serde::{Deserialize, Serialize};

use crate::{Backend, ConverterConfig, Error, Result, Viewport};

/// Realized layout size of a mounted document, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutMetrics {
    pub scroll_width: f64,
    pub scroll_height: f64,
    pub offset_height: f64,
}

/// Region and density of a capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRequest {
    /// Width of the captured region in CSS pixels, from the document origin
    pub width: f64,
    /// Height of the captured region in CSS pixels
    pub height: f64,
    /// Device pixels per CSS pixel
    pub scale: f64,
}

impl CaptureRequest {
    /// Pixel size of the bitmap a backend should return
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width * self.scale).ceil().max(1.0) as u32,
            (self.height * self.scale).ceil().max(1.0) as u32,
        )
    }
}

/// An embedded rendering context that can host one document at a time
pub trait DocumentContext {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// Mount `markup` off-screen at the provisional `viewport` size, replacing
    /// any previous mount.
    fn mount(&mut self, markup: &str, viewport: Viewport) -> Result<()>;

    /// Append a stylesheet to the mounted document
    fn inject_style(&mut self, css: &str) -> Result<()>;

    /// Measure the mounted document's realized size
    fn measure(&mut self) -> Result<LayoutMetrics>;

    /// Capture the mounted document. The bitmap may have a transparent
    /// background; callers composite it onto their own canvas.
    fn capture(&mut self, request: &CaptureRequest) -> Result<Pixmap>;

    /// Remove the mounted document
    fn unmount(&mut self) -> Result<()>;
}

/// Polling policy for `wait_for_stable_layout`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlePolicy {
    /// Delay before the first measurement
    pub initial_delay_ms: u64,
    /// Delay between measurements
    pub poll_interval_ms: u64,
    /// Upper bound on measurements
    pub max_attempts: u32,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 50,
            poll_interval_ms: 100,
            max_attempts: 30,
        }
    }
}

impl SettlePolicy {
    /// No sleeping; used by tests and synchronous backends.
    pub fn immediate() -> Self {
        Self {
            initial_delay_ms: 0,
            poll_interval_ms: 0,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::ConfigError("settle max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// Outcome of waiting for layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settled {
    pub metrics: LayoutMetrics,
    /// Whether two consecutive measurements matched
    pub stable: bool,
    /// Number of measurements taken
    pub attempts: u32,
}

/// Measure until two consecutive readings match or `max_attempts` is reached.
///
/// Hitting the bound is not an error: the last reading is returned with
/// `stable == false` and the caller proceeds best-effort.
pub fn wait_for_stable_layout(ctx: &mut dyn DocumentContext, policy: &SettlePolicy) -> Result<Settled> {
    pause(policy.initial_delay_ms);
    let mut previous = ctx.measure()?;
    let mut attempts = 1;

    while attempts < policy.max_attempts {
        pause(policy.poll_interval_ms);
        let current = ctx.measure()?;
        attempts += 1;
        if current == previous {
            log::debug!("{}: layout stable after {} measurements: {:?}", ctx.name(), attempts, current);
            return Ok(Settled {
                metrics: current,
                stable: true,
                attempts,
            });
        }
        previous = current;
    }

    log::warn!(
        "{}: layout still changing after {} measurements; capturing anyway",
        ctx.name(),
        attempts
    );
    Ok(Settled {
        metrics: previous,
        stable: false,
        attempts,
    })
}

fn pause(ms: u64) {
    if ms > 0 {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Open the document context selected by `config.backend`.
pub fn open_context(config: &ConverterConfig) -> Result<Box<dyn DocumentContext>> {
    match config.backend {
        #[cfg(feature = "lite")]
        Backend::Lite => Ok(Box::new(crate::lite::LiteContext::new())),
        #[cfg(feature = "cdp")]
        Backend::Cdp => Ok(Box::new(crate::cdp::CdpContext::launch(config)?)),
        #[allow(unreachable_patterns)]
        other => Err(Error::InitializationError(format!(
            "the {:?} backend is not compiled in (enable its cargo feature)",
            other
        ))),
    }
}
