//! CPU filters: separable gaussian blur and unsharp-mask sharpening.
//!
//! The kernels match the WGSL filter shaders so both renderers produce the
//! same image up to 8-bit rounding.

use rayon::prelude::*;

use crate::image::{Image, Pixel};

/// Kernel radius for a gaussian of the given sigma, `ceil(3σ)` capped.
pub fn blur_radius(sigma: f32, max_radius: u32) -> u32 {
    if !(sigma.is_finite() && sigma > 0.0) {
        return 0;
    }
    ((sigma * 3.0).ceil() as u32).clamp(1, max_radius.max(1))
}

/// Normalized 1D gaussian kernel of length `2 * radius + 1`.
pub fn gaussian_kernel(sigma: f32, max_radius: u32) -> Vec<f32> {
    let r = blur_radius(sigma, max_radius) as i32;
    if r == 0 {
        return vec![1.0];
    }
    let sigma2 = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (-r..=r)
        .map(|i| {
            let d = i as f32;
            (-d * d / sigma2).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Run `f(y, row)` over every row, on the rayon pool when `parallel`.
pub(crate) fn for_each_row<F>(data: &mut [Pixel], width: u32, parallel: bool, f: F)
where
    F: Fn(usize, &mut [Pixel]) + Send + Sync,
{
    let width = (width as usize).max(1);
    if parallel {
        data.par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| f(y, row));
    } else {
        data.chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| f(y, row));
    }
}

/// Separable gaussian blur with clamp-to-edge addressing.
pub fn gaussian_blur(src: &Image, sigma: f32, max_radius: u32, parallel: bool) -> Image {
    let kernel = gaussian_kernel(sigma, max_radius);
    if kernel.len() == 1 || src.is_empty() {
        return src.clone();
    }
    let r = (kernel.len() / 2) as i64;

    // Horizontal pass
    let mut horizontal = Image::new(src.width, src.height);
    for_each_row(&mut horizontal.data, src.width, parallel, |y, row| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut acc = [0.0f32; 4];
            for (k, weight) in kernel.iter().enumerate() {
                let p = src.pixel_clamped(x as i64 + k as i64 - r, y as i64);
                for c in 0..4 {
                    acc[c] += p[c] * weight;
                }
            }
            *out = acc;
        }
    });

    // Vertical pass
    let mut out = Image::new(src.width, src.height);
    for_each_row(&mut out.data, src.width, parallel, |y, row| {
        for (x, dst) in row.iter_mut().enumerate() {
            let mut acc = [0.0f32; 4];
            for (k, weight) in kernel.iter().enumerate() {
                let p = horizontal.pixel_clamped(x as i64, y as i64 + k as i64 - r);
                for c in 0..4 {
                    acc[c] += p[c] * weight;
                }
            }
            *dst = acc;
        }
    });

    out
}

/// Unsharp mask over the 4-neighbourhood: `c + amount * (4c - n - s - e - w) / 4`.
///
/// Color channels are clamped to `[0, alpha]` so the result stays premultiplied.
pub fn sharpen(src: &Image, amount: f32, parallel: bool) -> Image {
    if amount == 0.0 || src.is_empty() {
        return src.clone();
    }

    let mut out = Image::new(src.width, src.height);
    for_each_row(&mut out.data, src.width, parallel, |y, row| {
        let y = y as i64;
        for (x, dst) in row.iter_mut().enumerate() {
            let x = x as i64;
            let c = src.pixel_clamped(x, y);
            let n = src.pixel_clamped(x, y - 1);
            let s = src.pixel_clamped(x, y + 1);
            let e = src.pixel_clamped(x + 1, y);
            let w = src.pixel_clamped(x - 1, y);

            let mut px = [0.0f32; 4];
            for ch in 0..4 {
                let laplacian = (4.0 * c[ch] - n[ch] - s[ch] - e[ch] - w[ch]) * 0.25;
                px[ch] = c[ch] + amount * laplacian;
            }
            px[3] = px[3].clamp(0.0, 1.0);
            for ch in 0..3 {
                px[ch] = px[ch].clamp(0.0, px[3]);
            }
            *dst = px;
        }
    });
    out
}
