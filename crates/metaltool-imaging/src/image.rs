//! Premultiplied floating-point images.

use image::RgbaImage;
use metaltool_core::{Color, PixelBuffer, Vec2};

/// One premultiplied RGBA pixel.
pub type Pixel = [f32; 4];

/// An RGBA image with premultiplied `f32` channels in `0..=1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// Row-major pixels, `width * height` entries.
    pub data: Vec<Pixel>,
}

impl Image {
    /// Fully transparent image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![[0.0; 4]; width as usize * height as usize],
        }
    }

    /// Image filled with a (straight alpha) color.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            width,
            height,
            data: vec![color.to_premultiplied_array(); width as usize * height as usize],
        }
    }

    /// Build from tightly packed straight-alpha RGBA8.
    pub fn from_rgba8(width: u32, height: u32, rgba: &[u8], keep_alpha: bool) -> Self {
        let data = rgba
            .chunks_exact(4)
            .map(|px| {
                let a = if keep_alpha { px[3] as f32 / 255.0 } else { 1.0 };
                [
                    px[0] as f32 / 255.0 * a,
                    px[1] as f32 / 255.0 * a,
                    px[2] as f32 / 255.0 * a,
                    a,
                ]
            })
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Load a decoded frame. Without `keep_alpha` the frame is made opaque.
    pub fn from_pixel_buffer(buffer: &PixelBuffer, keep_alpha: bool) -> Self {
        Self::from_rgba8(buffer.width, buffer.height, &buffer.to_rgba8(), keep_alpha)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Memory usage in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<Pixel>()
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Pixel with coordinates clamped to the edge.
    #[inline]
    pub fn pixel_clamped(&self, x: i64, y: i64) -> Pixel {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.pixel(x, y)
    }

    /// Bilinear sample at a normalized coordinate, clamped to the edge.
    ///
    /// Texel centers sit at `(i + 0.5) / size`, matching GPU sampling.
    pub fn sample_bilinear(&self, uv: Vec2) -> Pixel {
        if self.is_empty() {
            return [0.0; 4];
        }
        let fx = uv.x * self.width as f32 - 0.5;
        let fy = uv.y * self.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p00 = self.pixel_clamped(x0, y0);
        let p10 = self.pixel_clamped(x0 + 1, y0);
        let p01 = self.pixel_clamped(x0, y0 + 1);
        let p11 = self.pixel_clamped(x0 + 1, y0 + 1);

        let mut out = [0.0; 4];
        for c in 0..4 {
            let top = p00[c] + (p10[c] - p00[c]) * tx;
            let bottom = p01[c] + (p11[c] - p01[c]) * tx;
            out[c] = top + (bottom - top) * ty;
        }
        out
    }

    /// Convert to a straight-alpha 8-bit image.
    pub fn to_rgba8(&self) -> RgbaImage {
        let mut bytes = Vec::with_capacity(self.data.len() * 4);
        for px in &self.data {
            let a = px[3].clamp(0.0, 1.0);
            let unpremultiply = |c: f32| {
                if a > 0.0 {
                    (c / a).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            };
            bytes.extend_from_slice(&[
                to_u8(unpremultiply(px[0])),
                to_u8(unpremultiply(px[1])),
                to_u8(unpremultiply(px[2])),
                to_u8(a),
            ]);
        }
        // Length always matches width * height * 4.
        RgbaImage::from_raw(self.width, self.height, bytes)
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v * 255.0).round() as u8
}
