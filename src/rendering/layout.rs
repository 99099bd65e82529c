/// Block layout for the lite document context
///
/// Stacks block-level text elements vertically with fixed margins and
/// padding. Text is set on an 8px character grid; this is not a browser, but
/// it produces stable, content-dependent geometry.

use scraper::{ElementRef, Html, Selector};

/// Character cell size in CSS pixels at scale 1
pub const GLYPH: u32 = 8;

const BLOCK_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "pre", "blockquote"];
const LIST_INDENT: u32 = 16;
const PAGE_MARGIN: u32 = 8;

pub type Rgba = (u8, u8, u8, u8);

pub const BLACK: Rgba = (0, 0, 0, 255);

#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxModel {
    pub margin: u32,
    pub border: u32,
    pub padding: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    pub rect: Rect,
    pub box_model: BoxModel,
}

impl LayoutBox {
    pub fn content_width(&self) -> u32 {
        let total = self.box_model.border + self.box_model.padding * 2;
        self.rect.width.saturating_sub(total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    Heading(u8),
    Paragraph,
    ListItem,
    Preformatted,
}

/// A laid-out block: its box, wrapped text and colors
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub lb: LayoutBox,
    pub text: String,
    pub elem_type: ElementType,
    pub scale: u32,
    pub color: Rgba,
    pub background: Option<Rgba>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    /// Page width in CSS pixels
    pub width: u32,
    /// Extra left padding on the body
    pub padding_left: u32,
}

/// Lay out the visible text blocks of `document` top to bottom.
pub fn layout_document(document: &Html, opts: LayoutOptions) -> Vec<LayoutNode> {
    let Ok(block_sel) = Selector::parse(&BLOCK_TAGS.join(", ")) else {
        return Vec::new();
    };

    let mut y = PAGE_MARGIN;
    let mut nodes = Vec::new();

    for el in document.select(&block_sel) {
        if has_block_ancestor(el) {
            continue;
        }
        if let Some(node) = layout_block(el, opts, y) {
            y = node.lb.rect.bottom() as u32 + node.lb.box_model.margin;
            nodes.push(node);
        }
    }

    // Bare text with no block elements still renders as one paragraph.
    if nodes.is_empty() {
        if let Ok(body_sel) = Selector::parse("body") {
            if let Some(body) = document.select(&body_sel).next() {
                let text = visible_text(body);
                if !text.trim().is_empty() {
                    nodes.push(text_block(&text, ElementType::Paragraph, opts, y, inline_colors(body)));
                }
            }
        }
    }

    nodes
}

/// Realized document size: at least the page width, and tall enough for the
/// last block plus the page margin.
pub fn document_extent(nodes: &[LayoutNode], opts: LayoutOptions) -> (u32, u32) {
    let right = nodes
        .iter()
        .map(|n| n.lb.rect.right().max(0) as u32 + PAGE_MARGIN)
        .max()
        .unwrap_or(0);
    let bottom = nodes
        .iter()
        .map(|n| n.lb.rect.bottom().max(0) as u32 + n.lb.box_model.margin)
        .max()
        .unwrap_or(0);
    (right.max(opts.width), bottom + PAGE_MARGIN)
}

fn layout_block(el: ElementRef<'_>, opts: LayoutOptions, y: u32) -> Option<LayoutNode> {
    let name = el.value().name();
    let elem_type = match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => ElementType::Heading(name[1..].parse().unwrap_or(1)),
        "li" => ElementType::ListItem,
        "pre" => ElementType::Preformatted,
        _ => ElementType::Paragraph,
    };
    let text = visible_text(el);
    if text.trim().is_empty() {
        return None;
    }
    Some(text_block(&text, elem_type, opts, y, inline_colors(el)))
}

fn text_block(
    raw: &str,
    elem_type: ElementType,
    opts: LayoutOptions,
    y: u32,
    (color, background): (Rgba, Option<Rgba>),
) -> LayoutNode {
    let (scale, padding, margin) = match elem_type {
        ElementType::Heading(1) | ElementType::Heading(2) => (2, 8, 8),
        ElementType::Heading(_) => (1, 8, 8),
        _ => (1, 6, 6),
    };
    let indent = if elem_type == ElementType::ListItem { LIST_INDENT } else { 0 };
    let x = PAGE_MARGIN + opts.padding_left + indent;
    let page_width = opts
        .width
        .saturating_sub(PAGE_MARGIN * 2 + opts.padding_left + indent);

    let cell = GLYPH * scale;
    let lines = if elem_type == ElementType::Preformatted {
        raw.trim_matches('\n').lines().map(|l| l.trim_end().to_string()).collect()
    } else {
        let content_w = page_width.saturating_sub(padding * 2);
        let chars_per_line = (content_w / cell).max(1) as usize;
        wrap(raw, chars_per_line)
    };

    let longest = lines.iter().map(|l| l.chars().count() as u32).max().unwrap_or(0);
    let width = page_width.max(longest * cell + padding * 2);
    let height = (lines.len() as u32).max(1) * cell + padding * 2;

    LayoutNode {
        lb: LayoutBox {
            rect: Rect {
                x: x as i32,
                y: y as i32,
                width,
                height,
            },
            box_model: BoxModel {
                margin,
                border: 0,
                padding,
            },
        },
        text: lines.join("\n"),
        elem_type,
        scale,
        color,
        background,
    }
}

fn wrap(text: &str, chars_per_line: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut cur = String::new();
    for word in text.split_whitespace() {
        if !cur.is_empty() && cur.chars().count() + word.chars().count() + 1 > chars_per_line {
            lines.push(std::mem::take(&mut cur));
        }
        if !cur.is_empty() {
            cur.push(' ');
        }
        cur.push_str(word);
    }
    if !cur.is_empty() {
        lines.push(cur);
    }
    lines
}

fn has_block_ancestor(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| BLOCK_TAGS.contains(&a.value().name()))
}

/// Text under `el`, skipping script and style contents.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style")))
            .unwrap_or(false);
        if !hidden {
            out.push_str(text);
        }
    }
    out
}

/// `color` and `background`/`background-color` from an inline style.
fn inline_colors(el: ElementRef<'_>) -> (Rgba, Option<Rgba>) {
    let mut color = BLACK;
    let mut background = None;
    if let Some(style) = el.value().attr("style") {
        for decl in style.split(';') {
            let Some((prop, value)) = decl.split_once(':') else {
                continue;
            };
            match prop.trim().to_ascii_lowercase().as_str() {
                "color" => color = parse_color(value).unwrap_or(color),
                "background" | "background-color" => background = parse_color(value).or(background),
                _ => {}
            }
        }
    }
    (color, background)
}

/// Parse `#rgb`, `#rrggbb` or a basic color keyword.
pub fn parse_color(value: &str) -> Option<Rgba> {
    let value = value.trim().trim_end_matches("!important").trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        let digits = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => hex.to_string(),
            _ => return None,
        };
        let n = u32::from_str_radix(&digits, 16).ok()?;
        return Some(((n >> 16) as u8, (n >> 8) as u8, n as u8, 255));
    }
    let rgb = match value.as_str() {
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        "gray" | "grey" => (128, 128, 128),
        "silver" => (192, 192, 192),
        "navy" => (0, 0, 128),
        "teal" => (0, 128, 128),
        "maroon" => (128, 0, 0),
        _ => return None,
    };
    Some((rgb.0, rgb.1, rgb.2, 255))
}
