//! markshot
//!
//! Convert HTML and SVG documents into PNG or JPEG images.
//!
//! # Features
//!
//! - **Vector path**: SVG input is normalized (dimensions resolved, `viewBox`
//!   synthesized) and rasterized with resvg onto a padded, oversampled canvas
//! - **Markup path**: HTML input is mounted into an off-screen document
//!   context, measured once its layout is stable, and captured
//! - **Swappable document contexts**: a pure-Rust `lite` backend (default) and
//!   a headless Chrome `cdp` backend
//!
//! # Example
//!
//! ```no_run
//! use markshot::{ConversionRequest, Converter, ConverterConfig, OutputFormat, SourceKind};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="300">
//!   <rect x="10" y="10" width="200" height="100" fill="teal"/>
//! </svg>"#;
//!
//! let request = ConversionRequest::from_code(svg, SourceKind::Svg, OutputFormat::Png)?;
//! let mut converter = Converter::new(ConverterConfig::default())?;
//! let result = converter.convert(&request)?;
//! println!("{} ({} bytes)", result.download_filename(), result.data().len());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::Engine as Base64Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod error;
pub use error::{Error, Result};

pub mod normalize;
pub use normalize::{normalize, HtmlSurface, RenderSurface, SvgSurface};

pub mod rendering;
pub use rendering::plan::{Calibration, RasterPlan};

pub mod context;
pub use context::{CaptureRequest, DocumentContext, LayoutMetrics, SettlePolicy};

// Pure-Rust document context (block layout over scraper, no JavaScript)
#[cfg(feature = "lite")]
pub mod lite;

// Headless Chrome document context
#[cfg(feature = "cdp")]
pub mod cdp;

pub mod convert;
pub use convert::{Conversion, ConversionState, Converter};

pub mod presenter;
pub use presenter::{Presentation, ResultSlot, Ticket, DOWNLOAD_STEM};

// Async facade: a worker thread owns the converter and its document context
pub mod async_api;
pub use async_api::ConverterService;

/// Kind of markup supplied by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Svg,
    Html,
}

impl SourceKind {
    /// Infer the kind from a file name. Only `.svg` and `.html` are accepted.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "svg" => Some(SourceKind::Svg),
            "html" => Some(SourceKind::Html),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Svg => "svg",
            SourceKind::Html => "html",
        })
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "svg" => Ok(SourceKind::Svg),
            "html" => Ok(SourceKind::Html),
            other => Err(format!("unknown source kind '{}' (expected svg or html)", other)),
        }
    }
}

/// Encoded output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            other => Err(format!("unknown output format '{}' (expected png or jpeg)", other)),
        }
    }
}

/// A single user-initiated conversion
///
/// Requests are immutable once built. `from_file` checks the extension before
/// reading anything; `from_code` takes an explicit kind and never sniffs.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    source_kind: SourceKind,
    markup: String,
    output_format: OutputFormat,
}

impl ConversionRequest {
    /// Build a request from pasted source text.
    pub fn from_code(markup: &str, source_kind: SourceKind, output_format: OutputFormat) -> Result<Self> {
        let markup = markup.trim();
        if markup.is_empty() {
            return Err(Error::InputError(format!("no {} code was entered", source_kind)));
        }
        Ok(Self {
            source_kind,
            markup: markup.to_string(),
            output_format,
        })
    }

    /// Build a request from a file on disk. The file name must end in `.svg` or `.html`.
    pub fn from_file(path: impl AsRef<Path>, output_format: OutputFormat) -> Result<Self> {
        let path = path.as_ref();
        let source_kind = SourceKind::from_path(path).ok_or_else(|| {
            Error::InputError(format!(
                "unsupported file '{}': please upload an HTML or SVG file",
                path.display()
            ))
        })?;
        let markup = std::fs::read_to_string(path)?;
        Self::from_code(&markup, source_kind, output_format)
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }
}

/// An encoded raster image produced by one successful conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    data: Vec<u8>,
    format: OutputFormat,
    width: u32,
    height: u32,
}

impl ConversionResult {
    pub fn new(data: Vec<u8>, format: OutputFormat, width: u32, height: u32) -> Self {
        Self {
            data,
            format,
            width,
            height,
        }
    }

    /// Encoded image bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Pixel width of the encoded image
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Pixel height of the encoded image
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `data:` URI suitable for inline display
    pub fn data_uri(&self) -> String {
        let b64 = Base64Engine::encode(&base64::engine::general_purpose::STANDARD, &self.data);
        format!("data:{};base64,{}", self.format.mime_type(), b64)
    }

    /// File name offered for download, e.g. `converted-image.png`
    pub fn download_filename(&self) -> String {
        format!("{}.{}", DOWNLOAD_STEM, self.format.extension())
    }

    /// Hex-encoded SHA-256 of the encoded bytes
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.data))
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Which document context renders HTML input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Pure-Rust block layout (no JavaScript, approximate text)
    Lite,
    /// Headless Chrome over the DevTools protocol
    Cdp,
}

impl Default for Backend {
    // Prefer the lite backend when compiled in: it does not require Chrome.
    fn default() -> Self {
        if cfg!(feature = "lite") {
            Backend::Lite
        } else {
            Backend::Cdp
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lite" => Ok(Backend::Lite),
            "cdp" | "chrome" => Ok(Backend::Cdp),
            other => Err(format!("unknown backend '{}' (expected lite or cdp)", other)),
        }
    }
}

/// Provisional size of the off-screen document mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Configuration for a `Converter`
///
/// Defaults reproduce the stock calibration: 2x oversampling for SVG, 4x for
/// HTML, 30-unit padding and a 300-unit minimum dimension.
///
/// # Examples
///
/// ```
/// let cfg = markshot::ConverterConfig::default();
/// assert_eq!(cfg.calibration.vector_oversample, 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Document context used for HTML input
    pub backend: Backend,
    /// Provisional mount size for HTML input
    pub viewport: Viewport,
    /// Canvas sizing and capture offsets
    pub calibration: Calibration,
    /// How long to wait for HTML layout to settle
    pub settle: SettlePolicy,
    /// Timeout for backend operations in milliseconds
    pub timeout_ms: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            viewport: Viewport::default(),
            calibration: Calibration::default(),
            settle: SettlePolicy::default(),
            timeout_ms: 30000,
        }
    }
}

impl ConverterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError("viewport must be non-empty".into()));
        }
        self.calibration.validate()?;
        self.settle.validate()
    }
}
