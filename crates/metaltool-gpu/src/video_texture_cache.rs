//! Pixel buffer to texture bridge.
//!
//! Decoded frames are converted to premultiplied RGBA8 and uploaded into
//! pooled `Rgba8Unorm` textures, so a steady stream of same-sized frames
//! allocates nothing after warm-up.

use std::sync::Arc;

use metaltool_core::memory_budget::VIDEO_TEXTURE_CACHE_BUDGET;
use metaltool_core::{MetalToolError, PixelBuffer, Result};
use parking_lot::Mutex;
use tracing::trace;

use crate::texture::GpuTexture;
use crate::texture_pool::{TextureKey, TexturePool};

pub struct VideoTextureCache {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pool: Mutex<TexturePool<GpuTexture>>,
}

impl VideoTextureCache {
    /// Format of every frame texture.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self::with_budget(device, queue, VIDEO_TEXTURE_CACHE_BUDGET)
    }

    pub fn with_budget(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, budget: usize) -> Self {
        Self {
            device,
            queue,
            pool: Mutex::new(TexturePool::new(budget)),
        }
    }

    /// Upload `buffer` into a texture. Without `keep_alpha` the texture is opaque.
    pub fn texture_for(&self, buffer: &PixelBuffer, keep_alpha: bool) -> Result<GpuTexture> {
        if buffer.is_empty() {
            return Err(MetalToolError::InvalidParameter(format!(
                "cannot upload an empty {}x{} pixel buffer",
                buffer.width, buffer.height
            )));
        }

        let key = TextureKey::new(buffer.width, buffer.height, Self::FORMAT);
        let texture = self
            .pool
            .lock()
            .acquire(key, |key| GpuTexture::intermediate(&self.device, key));
        texture.upload_rgba8(&self.queue, &buffer.to_premultiplied_rgba8(keep_alpha))?;
        trace!(width = buffer.width, height = buffer.height, format = ?buffer.format, "frame uploaded");
        Ok(texture)
    }

    /// Return a frame texture for reuse.
    pub fn recycle(&self, texture: GpuTexture) {
        self.pool.lock().release(texture);
    }

    /// Drop every idle texture.
    pub fn flush(&self) {
        self.pool.lock().clear();
    }

    /// Drop idle textures until at most `target` bytes remain.
    pub fn trim(&self, target: usize) {
        self.pool.lock().evict_to(target);
    }

    pub fn idle_size(&self) -> usize {
        self.pool.lock().memory_usage()
    }

    pub fn idle_count(&self) -> usize {
        self.pool.lock().texture_count()
    }
}
