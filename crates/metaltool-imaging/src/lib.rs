//! MetalTool Imaging - CPU image processing
//!
//! Provides the `ImageContext` used for software rendering:
//! premultiplied float images, gaussian blur and sharpening filters,
//! and a quad rasterizer that mirrors the GPU blit pipeline.

pub mod context;
pub mod filters;
pub mod image;
pub mod raster;

pub use context::{ImageContext, ImageContextOptions};
pub use filters::{blur_radius, gaussian_blur, gaussian_kernel, sharpen};
pub use crate::image::{Image, Pixel};
pub use raster::{blend_over, draw_placement};
