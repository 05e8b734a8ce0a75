//! Pixel buffers: decoded video frames in CPU memory.
//!
//! A `PixelBuffer` plays the role of a platform decoded-frame container. It
//! holds one or two planes with 64-byte aligned strides and converts to
//! tightly packed, straight-alpha RGBA8 for upload or CPU processing.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

use crate::error::{MetalToolError, Result};

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit BGRA, the native decoder output on Apple platforms
    #[default]
    Bgra8,
    /// 8-bit RGBA
    Rgba8,
    /// 8-bit 4:2:0 bi-planar YCbCr, BT.601 video range
    Nv12,
}

impl PixelFormat {
    /// Bytes per pixel of the first plane.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra8 | Self::Rgba8 => 4,
            Self::Nv12 => 1,
        }
    }

    /// Number of planes for this format.
    pub fn plane_count(self) -> usize {
        match self {
            Self::Bgra8 | Self::Rgba8 => 1,
            Self::Nv12 => 2,
        }
    }

    /// Whether the format carries an alpha channel.
    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Bgra8 | Self::Rgba8)
    }

    /// Tightly packed size in bytes of a frame of this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            Self::Bgra8 | Self::Rgba8 => w * h * 4,
            Self::Nv12 => w * h + chroma_dim(width) as usize * chroma_dim(height) as usize * 2,
        }
    }
}

/// A plane of pixel data with stride information.
#[derive(Debug, Clone)]
pub struct FramePlane {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Bytes per row (may include padding)
    pub stride: usize,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per pixel in this plane
    pub bytes_per_pixel: usize,
}

impl FramePlane {
    /// Create a new zeroed plane with the given dimensions.
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        // Align stride to 64 bytes for SIMD and GPU compatibility
        let min_stride = (width as usize) * bytes_per_pixel;
        let stride = (min_stride + 63) & !63;
        let data = vec![0u8; stride * height as usize];
        Self {
            data,
            stride,
            width,
            height,
            bytes_per_pixel,
        }
    }

    /// Create a plane from tightly packed rows.
    fn from_packed(width: u32, height: u32, bytes_per_pixel: usize, packed: &[u8]) -> Self {
        let mut plane = Self::new(width, height, bytes_per_pixel);
        let row_len = width as usize * bytes_per_pixel;
        for y in 0..height {
            let src = &packed[y as usize * row_len..(y as usize + 1) * row_len];
            plane.row_mut(y).copy_from_slice(src);
        }
        plane
    }

    /// Get a row of pixel data.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.bytes_per_pixel;
        &self.data[start..end]
    }

    /// Get a mutable row of pixel data.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.bytes_per_pixel;
        &mut self.data[start..end]
    }
}

/// A decoded video frame in CPU memory.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel data planes (1-2 depending on format)
    pub planes: SmallVec<[FramePlane; 2]>,
}

impl PixelBuffer {
    /// Create a new zeroed pixel buffer with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let planes = match format {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => {
                smallvec::smallvec![FramePlane::new(width, height, 4)]
            }
            PixelFormat::Nv12 => {
                smallvec::smallvec![
                    FramePlane::new(width, height, 1),                              // Y
                    FramePlane::new(chroma_dim(width), chroma_dim(height), 2),      // CbCr interleaved
                ]
            }
        };

        Self {
            format,
            width,
            height,
            planes,
        }
    }

    /// Wrap tightly packed BGRA8 or RGBA8 pixels.
    pub fn from_packed(width: u32, height: u32, format: PixelFormat, data: &[u8]) -> Result<Self> {
        if format == PixelFormat::Nv12 {
            return Err(MetalToolError::UnsupportedFormat(
                "NV12 frames must be built with PixelBuffer::from_nv12".to_string(),
            ));
        }
        check_len("packed", data.len(), format.frame_size(width, height))?;

        Ok(Self {
            format,
            width,
            height,
            planes: smallvec::smallvec![FramePlane::from_packed(width, height, 4, data)],
        })
    }

    /// Wrap tightly packed NV12 luma and interleaved chroma planes.
    pub fn from_nv12(width: u32, height: u32, luma: &[u8], chroma: &[u8]) -> Result<Self> {
        let (cw, ch) = (chroma_dim(width), chroma_dim(height));
        check_len("luma", luma.len(), width as usize * height as usize)?;
        check_len("chroma", chroma.len(), cw as usize * ch as usize * 2)?;

        Ok(Self {
            format: PixelFormat::Nv12,
            width,
            height,
            planes: smallvec::smallvec![
                FramePlane::from_packed(width, height, 1, luma),
                FramePlane::from_packed(cw, ch, 2, chroma),
            ],
        })
    }

    /// Parse a raw frame file: packed BGRA8/RGBA8, or NV12 luma followed by chroma.
    pub fn from_raw(width: u32, height: u32, format: PixelFormat, data: &[u8]) -> Result<Self> {
        match format {
            PixelFormat::Nv12 => {
                check_len("raw NV12", data.len(), format.frame_size(width, height))?;
                let split = width as usize * height as usize;
                Self::from_nv12(width, height, &data[..split], &data[split..])
            }
            _ => Self::from_packed(width, height, format, data),
        }
    }

    /// Whether the frame is empty (zero width or height).
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.planes.iter().map(|p| p.data.len()).sum()
    }

    /// Get the primary plane (plane 0).
    #[inline]
    pub fn primary_plane(&self) -> &FramePlane {
        &self.planes[0]
    }

    /// Get the primary plane mutably.
    #[inline]
    pub fn primary_plane_mut(&mut self) -> &mut FramePlane {
        &mut self.planes[0]
    }

    /// Convert to tightly packed, straight-alpha RGBA8.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut out = vec![0u8; w * h * 4];

        match self.format {
            PixelFormat::Rgba8 => {
                for y in 0..self.height {
                    let dst = &mut out[y as usize * w * 4..(y as usize + 1) * w * 4];
                    dst.copy_from_slice(self.primary_plane().row(y));
                }
            }
            PixelFormat::Bgra8 => {
                for y in 0..self.height {
                    let src = self.primary_plane().row(y);
                    let dst = &mut out[y as usize * w * 4..(y as usize + 1) * w * 4];
                    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                        d.copy_from_slice(&[s[2], s[1], s[0], s[3]]);
                    }
                }
            }
            PixelFormat::Nv12 => {
                let luma = &self.planes[0];
                let chroma = &self.planes[1];
                for y in 0..self.height {
                    let luma_row = luma.row(y);
                    let chroma_row = chroma.row(y / 2);
                    let dst = &mut out[y as usize * w * 4..(y as usize + 1) * w * 4];
                    for x in 0..w {
                        let cx = (x / 2) * 2;
                        let rgb = ycbcr_to_rgb(luma_row[x], chroma_row[cx], chroma_row[cx + 1]);
                        dst[x * 4..x * 4 + 4].copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
                    }
                }
            }
        }

        out
    }

    /// Convert to tightly packed, premultiplied RGBA8.
    ///
    /// Without `keep_alpha` the alpha channel is ignored and every pixel is opaque.
    pub fn to_premultiplied_rgba8(&self, keep_alpha: bool) -> Vec<u8> {
        let mut rgba = self.to_rgba8();
        for px in rgba.chunks_exact_mut(4) {
            if !keep_alpha {
                px[3] = 255;
            } else if px[3] < 255 {
                let a = px[3] as u32;
                for c in &mut px[..3] {
                    *c = ((*c as u32 * a + 127) / 255) as u8;
                }
            }
        }
        rgba
    }

    /// Create a test pattern frame (color bars), BGRA like a camera frame.
    pub fn test_pattern(width: u32, height: u32) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Bgra8);
        let plane = frame.primary_plane_mut();

        // Color bars pattern (8 bars), stored BGRA
        let colors: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [0, 255, 255, 255],   // Yellow
            [255, 255, 0, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [0, 0, 255, 255],     // Red
            [255, 0, 0, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];

        for y in 0..height {
            let row = plane.row_mut(y);
            for x in 0..width {
                let i = (x * 4) as usize;
                let bar = (x as u64 * 8 / width.max(1) as u64) as usize;
                row[i..i + 4].copy_from_slice(&colors[bar.min(7)]);
            }
        }

        frame
    }
}

/// Arc-wrapped pixel buffer for shared ownership.
pub type SharedPixelBuffer = Arc<PixelBuffer>;

/// Chroma plane dimension for 4:2:0 subsampling.
#[inline]
fn chroma_dim(luma_dim: u32) -> u32 {
    luma_dim.div_ceil(2)
}

fn check_len(what: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(MetalToolError::InvalidParameter(format!(
            "{what} data is {actual} bytes, expected {expected}"
        )));
    }
    Ok(())
}

/// BT.601 video-range YCbCr to RGB.
#[inline]
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = 1.164 * (y as f32 - 16.0);
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    let r = y + 1.596 * cr;
    let g = y - 0.392 * cb - 0.813 * cr;
    let b = y + 2.017 * cb;
    [
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    ]
}
