//! Texture loading from encoded images.

use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use metaltool_core::{MetalToolError, Result};
use tracing::debug;

use crate::texture::{GpuTexture, TEXTURE_USAGE};

/// Decodes PNG/JPEG images into premultiplied `Rgba8Unorm` textures.
pub struct TextureLoader {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl TextureLoader {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    /// Decode an in-memory image.
    pub fn load_from_memory(&self, bytes: &[u8]) -> Result<GpuTexture> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| MetalToolError::Image(format!("Failed to decode image: {}", e)))?;
        self.load_image(&decoded.to_rgba8())
    }

    /// Decode an image file.
    pub fn load_from_path(&self, path: &Path) -> Result<GpuTexture> {
        let bytes = std::fs::read(path)?;
        debug!(path = %path.display(), "loading texture");
        self.load_from_memory(&bytes)
    }

    /// Upload a straight-alpha image.
    pub fn load_image(&self, image: &RgbaImage) -> Result<GpuTexture> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(MetalToolError::InvalidParameter("image has no pixels".to_string()));
        }

        let mut data = image.as_raw().clone();
        for px in data.chunks_exact_mut(4) {
            let a = px[3] as u32;
            for c in &mut px[..3] {
                *c = ((*c as u32 * a + 127) / 255) as u8;
            }
        }

        let texture = GpuTexture::new(
            &self.device,
            width,
            height,
            wgpu::TextureFormat::Rgba8Unorm,
            TEXTURE_USAGE,
            Some("metaltool.loaded_texture"),
        );
        texture.upload_rgba8(&self.queue, &data)?;
        Ok(texture)
    }
}
