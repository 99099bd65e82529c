//! Input normalization: turn raw markup into a renderable surface.
//!
//! SVG input gets deterministic dimensions. The precedence is explicit
//! `width`/`height`, then the `viewBox` size, then 800x600. The root element is
//! rewritten so it always carries `width`, `height`, `viewBox` and
//! `preserveAspectRatio`, which keeps the document scalable when it is later
//! loaded at a different pixel density. Running the normalizer over its own
//! output changes nothing.
//!
//! HTML input is passed through untouched; its size is only known once a
//! document context has laid it out.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::{Error, Result, SourceKind};

pub const DEFAULT_WIDTH: f64 = 800.0;
pub const DEFAULT_HEIGHT: f64 = 600.0;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const CENTER_FIT: &str = "xMidYMid meet";

/// A normalized SVG document with resolved logical dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct SvgSurface {
    markup: String,
    width: f64,
    height: f64,
}

impl SvgSurface {
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Logical width in user units
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Logical height in user units
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Serialize with the root `width`/`height` multiplied by `scale`.
    ///
    /// The logical size reported by the surface is unaffected; only the pixel
    /// density of the loaded resource changes.
    pub fn to_scaled_markup(&self, scale: f64) -> Result<String> {
        if (scale - 1.0).abs() < f64::EPSILON {
            return Ok(self.markup.clone());
        }
        rewrite_root(
            &self.markup,
            &[
                ("width", format_number(self.width * scale)),
                ("height", format_number(self.height * scale)),
            ],
        )
    }
}

/// Raw HTML waiting to be mounted
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlSurface {
    markup: String,
}

impl HtmlSurface {
    pub fn markup(&self) -> &str {
        &self.markup
    }
}

/// Output of the normalizer, one variant per rasterization path
#[derive(Debug, Clone, PartialEq)]
pub enum RenderSurface {
    Vector(SvgSurface),
    Markup(HtmlSurface),
}

impl RenderSurface {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            RenderSurface::Vector(_) => SourceKind::Svg,
            RenderSurface::Markup(_) => SourceKind::Html,
        }
    }

    /// Logical dimensions, when they are known before mounting
    pub fn dimensions(&self) -> Option<(f64, f64)> {
        match self {
            RenderSurface::Vector(svg) => Some((svg.width, svg.height)),
            RenderSurface::Markup(_) => None,
        }
    }
}

/// Normalize `markup` according to its declared kind.
pub fn normalize(markup: &str, kind: SourceKind) -> Result<RenderSurface> {
    if markup.trim().is_empty() {
        return Err(Error::InputError(format!("no {} markup to convert", kind)));
    }
    match kind {
        SourceKind::Svg => normalize_svg(markup).map(RenderSurface::Vector),
        SourceKind::Html => Ok(RenderSurface::Markup(HtmlSurface {
            markup: markup.to_string(),
        })),
    }
}

/// Parse, size and rewrite an SVG document.
pub fn normalize_svg(markup: &str) -> Result<SvgSurface> {
    let opts = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = roxmltree::Document::parse_with_options(markup, opts)
        .map_err(|e| Error::ParseError(e.to_string()))?;

    let root = doc.root_element();
    if root.tag_name().name() != "svg" {
        return Err(Error::ParseError(format!(
            "no <svg> root element found (root is <{}>)",
            root.tag_name().name()
        )));
    }

    let view_box = root.attribute("viewBox");
    let (width, height) = resolve_dimensions(root.attribute("width"), root.attribute("height"), view_box);

    let mut overrides = vec![("width", format_number(width)), ("height", format_number(height))];
    if view_box.is_none() {
        overrides.push((
            "viewBox",
            format!("0 0 {} {}", format_number(width), format_number(height)),
        ));
    }
    if root.attribute("preserveAspectRatio").is_none() {
        overrides.push(("preserveAspectRatio", CENTER_FIT.to_string()));
    }
    // Image loaders refuse un-namespaced roots
    if root.tag_name().namespace().is_none() {
        overrides.push(("xmlns", SVG_NS.to_string()));
    }

    let markup = rewrite_root(markup, &overrides)?;
    log::debug!("normalized svg: {}x{}", width, height);
    Ok(SvgSurface { markup, width, height })
}

fn resolve_dimensions(width: Option<&str>, height: Option<&str>, view_box: Option<&str>) -> (f64, f64) {
    if let (Some(w), Some(h)) = (width.and_then(parse_length), height.and_then(parse_length)) {
        return (w, h);
    }
    if let Some(size) = view_box.and_then(parse_view_box_size) {
        return size;
    }
    (DEFAULT_WIDTH, DEFAULT_HEIGHT)
}

/// Absolute length units and their size in px
const UNITS: &[(&str, f64)] = &[
    ("px", 1.0),
    ("pt", 4.0 / 3.0),
    ("pc", 16.0),
    ("in", 96.0),
    ("cm", 96.0 / 2.54),
    ("mm", 96.0 / 25.4),
];

/// Parse an absolute SVG length into user units (px).
///
/// Only a trailing unit is split off, so exponents (`4e2`) stay part of the
/// number. Percentages and font-relative units have no fixed size and yield
/// `None`.
fn parse_length(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.ends_with('%') {
        return None;
    }
    let (number, factor) = UNITS
        .iter()
        .find_map(|(unit, factor)| value.strip_suffix(unit).map(|n| (n, *factor)))
        .unwrap_or((value, 1.0));
    let number: f64 = number.trim().parse().ok()?;
    let px = number * factor;
    (px.is_finite() && px > 0.0).then_some(px)
}

/// Width and height of a `viewBox="min-x min-y width height"` declaration.
fn parse_view_box_size(value: &str) -> Option<(f64, f64)> {
    let parts = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [_, _, w, h] if *w > 0.0 && *h > 0.0 => Some((*w, *h)),
        _ => None,
    }
}

/// Shortest text that parses back to exactly `value`
fn format_number(value: f64) -> String {
    format!("{}", value)
}

/// Rewrite attributes on the first element of `markup`, leaving every other
/// byte of the document as it was. Existing attributes are replaced in place;
/// missing ones are appended.
fn rewrite_root(markup: &str, overrides: &[(&str, String)]) -> Result<String> {
    let mut reader = Reader::from_str(markup);
    let mut writer = Writer::new(Vec::with_capacity(markup.len() + 128));
    let mut rewritten = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::ParseError(e.to_string()))?;
        let event = match event {
            Event::Eof => break,
            Event::Start(start) if !rewritten => {
                rewritten = true;
                Event::Start(with_overrides(&start, overrides)?)
            }
            Event::Empty(start) if !rewritten => {
                rewritten = true;
                Event::Empty(with_overrides(&start, overrides)?)
            }
            other => other,
        };
        writer
            .write_event(event)
            .map_err(|e| Error::Other(format!("failed to serialize svg: {}", e)))?;
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| Error::Other(format!("serialized svg is not UTF-8: {}", e)))
}

fn with_overrides(start: &BytesStart<'_>, overrides: &[(&str, String)]) -> Result<BytesStart<'static>> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| Error::ParseError(e.to_string()))?
        .to_string();
    let mut out = BytesStart::new(name);
    let mut applied = vec![false; overrides.len()];

    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::ParseError(e.to_string()))?;
        match overrides.iter().position(|(k, _)| k.as_bytes() == attr.key.as_ref()) {
            Some(idx) => {
                applied[idx] = true;
                out.push_attribute((overrides[idx].0, overrides[idx].1.as_str()));
            }
            None => out.push_attribute(attr),
        }
    }
    for ((key, value), done) in overrides.iter().zip(applied) {
        if !done {
            out.push_attribute((*key, value.as_str()));
        }
    }
    Ok(out)
}
