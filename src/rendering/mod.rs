//! Rasterization: canvas planning, the SVG and HTML paths, and encoding

pub mod markup;
pub mod plan;
pub mod raster;
pub mod vector;

// Block layout and painting for the lite document context
#[cfg(feature = "lite")]
pub mod layout;
#[cfg(feature = "lite")]
pub mod paint;

pub use markup::rasterize_html;
pub use vector::rasterize_svg;
