//! GPU texture management.

use metaltool_core::{MetalToolError, Result};

use crate::texture_pool::{PooledResource, TextureKey};

/// Usage of every texture the renderer allocates.
pub const TEXTURE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::RENDER_ATTACHMENT)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

/// A GPU texture together with its default view.
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl GpuTexture {
    /// Create a new GPU texture with the given dimensions.
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        label: Option<&str>,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }

    /// Texture usable as a sampled source, render target and copy endpoint.
    pub fn intermediate(device: &wgpu::Device, key: TextureKey) -> Self {
        Self::new(
            device,
            key.width,
            key.height,
            key.format,
            TEXTURE_USAGE,
            Some("metaltool.intermediate"),
        )
    }

    pub fn key(&self) -> TextureKey {
        TextureKey {
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }

    /// Upload tightly packed 4-byte pixels covering the whole texture.
    pub fn upload_rgba8(&self, queue: &wgpu::Queue, data: &[u8]) -> Result<()> {
        if bytes_per_pixel(self.format)? != 4 {
            return Err(MetalToolError::UnsupportedFormat(format!(
                "cannot upload 8-bit RGBA into {:?}",
                self.format
            )));
        }
        let expected = self.width as usize * self.height as usize * 4;
        if data.len() != expected {
            return Err(MetalToolError::InvalidParameter(format!(
                "upload of {} bytes does not match {}x{} texture ({} bytes)",
                data.len(),
                self.width,
                self.height,
                expected
            )));
        }

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.width * 4),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );

        Ok(())
    }

    /// Memory usage estimate in bytes.
    pub fn memory_size(&self) -> usize {
        let texel = self.format.block_copy_size(None).unwrap_or(0) as usize;
        self.width as usize * self.height as usize * texel
    }
}

impl PooledResource for GpuTexture {
    fn pool_key(&self) -> TextureKey {
        self.key()
    }

    fn memory_size(&self) -> usize {
        GpuTexture::memory_size(self)
    }
}

/// Bytes per texel for the formats the renderer uses.
pub fn bytes_per_pixel(format: wgpu::TextureFormat) -> Result<usize> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm
        | wgpu::TextureFormat::Rgba8UnormSrgb
        | wgpu::TextureFormat::Bgra8Unorm
        | wgpu::TextureFormat::Bgra8UnormSrgb => Ok(4),
        wgpu::TextureFormat::Rgba16Float => Ok(8),
        wgpu::TextureFormat::Rgba32Float => Ok(16),
        other => Err(MetalToolError::UnsupportedFormat(format!(
            "texture format {:?} is not supported",
            other
        ))),
    }
}

/// Whether texels are stored blue-first.
pub fn is_bgra(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
    )
}
