/// Paint commands for the lite document context
///
/// Text is drawn as solid glyph cells (one block per visible character),
/// which keeps output deterministic without a font stack.

use resvg::tiny_skia::{Paint, Pixmap, Rect as SkRect, Transform};

use super::layout::{LayoutNode, Rgba, GLYPH};

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgba: Rgba,
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        scale: u32,
        rgba: Rgba,
    },
}

/// Turn laid-out blocks into paint commands, backgrounds first.
pub fn build_display_list(nodes: &[LayoutNode]) -> Vec<PaintCommand> {
    let mut commands = Vec::with_capacity(nodes.len() * 2);
    for node in nodes {
        let rect = &node.lb.rect;
        if let Some(rgba) = node.background {
            commands.push(PaintCommand::SolidRect {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                rgba,
            });
        }
        let padding = node.lb.box_model.padding as i32;
        commands.push(PaintCommand::Text {
            x: rect.x + padding,
            y: rect.y + padding,
            text: node.text.clone(),
            scale: node.scale,
            rgba: node.color,
        });
    }
    commands
}

/// Execute `commands` on `pixmap`, with coordinates in CSS pixels scaled by `scale`.
pub fn paint(commands: &[PaintCommand], pixmap: &mut Pixmap, scale: f32) {
    let transform = Transform::from_scale(scale, scale);
    for cmd in commands {
        match cmd {
            PaintCommand::SolidRect {
                x,
                y,
                width,
                height,
                rgba,
            } => {
                fill(pixmap, *x as f32, *y as f32, *width as f32, *height as f32, *rgba, transform);
            }
            PaintCommand::Text {
                x,
                y,
                text,
                scale: text_scale,
                rgba,
            } => {
                let cell = (GLYPH * text_scale) as f32;
                let unit = *text_scale as f32;
                for (row, line) in text.lines().enumerate() {
                    for (col, ch) in line.chars().enumerate() {
                        if ch.is_whitespace() {
                            continue;
                        }
                        let gx = *x as f32 + col as f32 * cell + unit;
                        let gy = *y as f32 + row as f32 * cell + unit;
                        fill(pixmap, gx, gy, cell - 2.0 * unit, cell - unit, *rgba, transform);
                    }
                }
            }
        }
    }
}

fn fill(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, rgba: Rgba, transform: Transform) {
    let Some(rect) = SkRect::from_xywh(x, y, w, h) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgba.0, rgba.1, rgba.2, rgba.3);
    paint.anti_alias = false;
    pixmap.fill_rect(rect, &paint, transform, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::layout::{BoxModel, ElementType, LayoutBox, Rect};

    fn node(background: Option<Rgba>) -> LayoutNode {
        LayoutNode {
            lb: LayoutBox {
                rect: Rect {
                    x: 0,
                    y: 0,
                    width: 40,
                    height: 20,
                },
                box_model: BoxModel {
                    margin: 6,
                    border: 0,
                    padding: 6,
                },
            },
            text: "ab c".into(),
            elem_type: ElementType::Paragraph,
            scale: 1,
            color: (0, 0, 0, 255),
            background,
        }
    }

    #[test]
    fn background_precedes_text() {
        let list = build_display_list(&[node(Some((255, 0, 0, 255)))]);
        assert_eq!(list.len(), 2);
        assert!(matches!(list[0], PaintCommand::SolidRect { width: 40, .. }));
        assert!(matches!(list[1], PaintCommand::Text { x: 6, y: 6, .. }));
    }

    #[test]
    fn glyph_cells_are_painted_and_spaces_skipped() {
        let list = build_display_list(&[node(None)]);
        let mut pixmap = Pixmap::new(40, 20).unwrap();
        paint(&list, &mut pixmap, 1.0);
        let alpha = |x: u32, y: u32| pixmap.pixel(x, y).map(|p| p.alpha()).unwrap_or(0);
        // first glyph cell starts at (6 + 1, 6 + 1)
        assert_eq!(alpha(8, 8), 255);
        // third cell is a space
        assert_eq!(alpha(6 + 16 + 3, 8), 0);
        // padding stays transparent
        assert_eq!(alpha(1, 1), 0);
    }
}
