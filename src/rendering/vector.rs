//! SVG rasterization

use std::sync::{Arc, OnceLock};

use resvg::tiny_skia::Transform;
use resvg::usvg::{self, fontdb};

use super::plan::{Calibration, RasterPlan};
use super::raster;
use crate::normalize::SvgSurface;
use crate::{ConversionResult, Error, OutputFormat, Result};

static FONTS: OnceLock<Arc<fontdb::Database>> = OnceLock::new();

fn system_fonts() -> Arc<fontdb::Database> {
    FONTS
        .get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            log::debug!("loaded {} font faces", db.len());
            Arc::new(db)
        })
        .clone()
}

/// Load SVG markup as an image resource.
pub fn load_tree(markup: &str) -> Result<usvg::Tree> {
    let mut opt = usvg::Options::default();
    opt.fontdb = system_fonts();
    usvg::Tree::from_str(markup, &opt)
        .map_err(|e| Error::RenderError(format!("failed to load vector image: {}", e)))
}

/// Rasterize a normalized SVG surface onto a padded, oversampled canvas.
///
/// The loaded resource carries the attribute upscale, but layout uses the
/// surface's logical size: the tree is fitted into the content box.
pub fn rasterize_svg(surface: &SvgSurface, format: OutputFormat, cal: &Calibration) -> Result<ConversionResult> {
    let plan = RasterPlan::for_vector(surface.width(), surface.height(), cal)?;
    let scaled = surface.to_scaled_markup(cal.attribute_scale)?;
    let tree = load_tree(&scaled)?;

    let mut canvas = raster::white_canvas(plan.canvas_width_px, plan.canvas_height_px)?;
    let size = tree.size();
    let fit = Transform::from_scale(
        plan.content_width as f32 / size.width(),
        plan.content_height as f32 / size.height(),
    );
    resvg::render(&tree, plan.content_transform().pre_concat(fit), &mut canvas.as_mut());

    let data = raster::encode(&canvas, format)?;
    Ok(ConversionResult::new(data, format, plan.canvas_width_px, plan.canvas_height_px))
}
