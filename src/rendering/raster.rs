//! Output canvas allocation and encoding

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use resvg::tiny_skia::{Color, Pixmap};

use crate::{Error, OutputFormat, Result};

/// JPEG quality used for every encode (maximum)
pub const JPEG_QUALITY: u8 = 100;

/// Allocate a canvas filled with opaque white.
pub fn white_canvas(width: u32, height: u32) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| Error::RenderError(format!("cannot allocate a {}x{} canvas", width, height)))?;
    pixmap.fill(Color::WHITE);
    Ok(pixmap)
}

/// Encode a canvas as PNG or JPEG.
///
/// Canvases from `white_canvas` are fully opaque, so their premultiplied
/// pixels are already straight RGBA.
pub fn encode(pixmap: &Pixmap, format: OutputFormat) -> Result<Vec<u8>> {
    let rgba = RgbaImage::from_raw(pixmap.width(), pixmap.height(), pixmap.data().to_vec())
        .ok_or_else(|| Error::EncodeError("canvas buffer has an unexpected size".into()))?;
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut bytes = Vec::new();
    match format {
        OutputFormat::Png => {
            DynamicImage::ImageRgb8(rgb)
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .map_err(|e| Error::EncodeError(format!("PNG: {}", e)))?;
        }
        OutputFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
                .encode_image(&rgb)
                .map_err(|e| Error::EncodeError(format!("JPEG: {}", e)))?;
        }
    }
    Ok(bytes)
}
