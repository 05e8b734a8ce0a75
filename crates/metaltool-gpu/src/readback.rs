//! Texture readback to CPU images.

use image::RgbaImage;
use metaltool_core::{MetalToolError, Result};

use crate::context::Context;
use crate::texture::{bytes_per_pixel, is_bgra, GpuTexture};

/// Row pitch of a copy, padded to the buffer copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copy `texture` back to the CPU as a straight-alpha RGBA image.
///
/// The texture holds premultiplied 8-bit texels; BGRA textures are swizzled
/// and sRGB textures are decoded back to the linear values that were drawn.
pub fn read_texture(context: &Context, texture: &GpuTexture) -> Result<RgbaImage> {
    if bytes_per_pixel(texture.format)? != 4 {
        return Err(MetalToolError::UnsupportedFormat(format!(
            "cannot read back {:?}",
            texture.format
        )));
    }
    let (width, height) = (texture.width, texture.height);
    let padded = padded_bytes_per_row(width);
    let device = context.device();

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("metaltool.readback"),
        size: padded as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("metaltool.readback"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture: &texture.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    context.queue().submit(std::iter::once(encoder.finish()));

    // Map and read
    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |r| {
        let _ = tx.send(r);
    });
    device.poll(wgpu::Maintain::Wait);

    rx.recv()
        .map_err(|_| MetalToolError::Gpu("Map channel closed".into()))?
        .map_err(|e| MetalToolError::Gpu(format!("Map failed: {e}")))?;

    let mapped = slice.get_mapped_range();
    let pixels = unpack_rows(&mapped, width, height, padded as usize, texture.format);
    drop(mapped);
    staging.unmap();

    RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| MetalToolError::Internal("readback size mismatch".to_string()))
}

/// Strip row padding, swizzle to RGBA, decode sRGB and un-premultiply.
pub fn unpack_rows(
    data: &[u8],
    width: u32,
    height: u32,
    row_pitch: usize,
    format: wgpu::TextureFormat,
) -> Vec<u8> {
    let bgra = is_bgra(format);
    // the GPU encodes color channels on store; alpha stays linear
    let decode = if format.is_srgb() {
        srgb_decode_table()
    } else {
        std::array::from_fn(|i| i as u8)
    };

    let row_bytes = width as usize * 4;
    let mut out = Vec::with_capacity(row_bytes * height as usize);
    for row in data.chunks(row_pitch).take(height as usize) {
        for px in row[..row_bytes].chunks_exact(4) {
            let (r, g, b, a) = if bgra {
                (px[2], px[1], px[0], px[3])
            } else {
                (px[0], px[1], px[2], px[3])
            };
            let [r, g, b] = [r, g, b].map(|c| unpremultiply(decode[c as usize], a));
            out.extend_from_slice(&[r, g, b, a]);
        }
    }
    out
}

/// sRGB-encoded byte to linear byte.
fn srgb_decode_table() -> [u8; 256] {
    std::array::from_fn(|i| {
        let c = i as f32 / 255.0;
        let linear = if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        };
        (linear * 255.0).round() as u8
    })
}

#[inline]
fn unpremultiply(c: u8, a: u8) -> u8 {
    match a {
        0 => 0,
        255 => c,
        _ => ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8,
    }
}
