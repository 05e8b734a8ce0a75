//! Quad rasterization with premultiplied "over" compositing.

use metaltool_core::{Placement, Rect, Size, Vec2};

use crate::filters::for_each_row;
use crate::image::{Image, Pixel};

/// Coverage tolerance in texture space for pixel centers on the quad edge.
const EDGE_EPSILON: f32 = 1e-5;

/// Composite `src` over `dst`, both premultiplied.
#[inline]
pub fn blend_over(dst: Pixel, src: Pixel) -> Pixel {
    let inv = 1.0 - src[3];
    [
        src[0] + dst[0] * inv,
        src[1] + dst[1] * inv,
        src[2] + dst[2] * inv,
        src[3] + dst[3] * inv,
    ]
}

/// Draw `src` into `canvas` at `placement`, blending over the existing pixels.
///
/// A canvas pixel is covered when its center falls inside the quad. Samples
/// are bilinear with clamp-to-edge addressing.
pub fn draw_placement(canvas: &mut Image, src: &Image, placement: &Placement, parallel: bool) {
    if src.is_empty() || canvas.is_empty() || placement.is_empty() {
        return;
    }
    let Some(visible) = placement
        .bounds()
        .intersection(Rect::from_size(Size::new(canvas.width as f32, canvas.height as f32)))
    else {
        return;
    };

    let x_start = visible.x.floor().max(0.0) as usize;
    let x_end = (visible.x + visible.width).ceil().min(canvas.width as f32) as usize;
    let y_start = visible.y.floor().max(0.0) as usize;
    let y_end = (visible.y + visible.height).ceil().min(canvas.height as f32) as usize;

    for_each_row(&mut canvas.data, canvas.width, parallel, |y, row| {
        if y < y_start || y >= y_end {
            return;
        }
        for x in x_start..x_end {
            let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let Some(uv) = placement.uv_at(center) else {
                return;
            };
            let inside = (-EDGE_EPSILON..=1.0 + EDGE_EPSILON).contains(&uv.x)
                && (-EDGE_EPSILON..=1.0 + EDGE_EPSILON).contains(&uv.y);
            if inside {
                row[x] = blend_over(row[x], src.sample_bilinear(uv));
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaltool_core::{compute_placement, Color, DisplayMode, RotateMode};

    fn quadrants() -> Image {
        // 2x2: red, green / blue, white
        Image::from_rgba8(
            2,
            2,
            &[
                255, 0, 0, 255, 0, 255, 0, 255, //
                0, 0, 255, 255, 255, 255, 255, 255,
            ],
            true,
        )
    }

    fn place(rot: RotateMode, mode: DisplayMode, view: (u32, u32), offset: Vec2) -> Placement {
        compute_placement(Size::new(2.0, 2.0), Size::from(view), rot, mode, offset)
    }

    #[test]
    fn test_identity_copy() {
        let src = quadrants();
        let mut canvas = Image::filled(2, 2, Color::BLACK);
        draw_placement(
            &mut canvas,
            &src,
            &place(RotateMode::NONE, DisplayMode::ScaleIn, (2, 2), Vec2::ZERO),
            false,
        );
        assert_eq!(canvas, src);
    }

    #[test]
    fn test_rotate_90_moves_bottom_left_to_top_left() {
        let src = quadrants();
        let mut canvas = Image::filled(2, 2, Color::BLACK);
        draw_placement(
            &mut canvas,
            &src,
            &place(RotateMode::ROTATE_90, DisplayMode::ScaleIn, (2, 2), Vec2::ZERO),
            true,
        );
        assert_eq!(canvas.pixel(0, 0), [0.0, 0.0, 1.0, 1.0]); // blue
        assert_eq!(canvas.pixel(1, 0), [1.0, 0.0, 0.0, 1.0]); // red
        assert_eq!(canvas.pixel(1, 1), [0.0, 1.0, 0.0, 1.0]); // green
    }

    #[test]
    fn test_mirror_swaps_columns() {
        let src = quadrants();
        let mut canvas = Image::filled(2, 2, Color::BLACK);
        draw_placement(
            &mut canvas,
            &src,
            &place(RotateMode::MIRROR, DisplayMode::ScaleIn, (2, 2), Vec2::ZERO),
            false,
        );
        assert_eq!(canvas.pixel(0, 0), [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(canvas.pixel(1, 0), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_letterbox_leaves_canvas() {
        let src = Image::filled(4, 2, Color::WHITE);
        let mut canvas = Image::filled(4, 4, Color::RED);
        let p = compute_placement(
            Size::new(4.0, 2.0),
            Size::new(4.0, 4.0),
            RotateMode::NONE,
            DisplayMode::ScaleIn,
            Vec2::ZERO,
        );
        draw_placement(&mut canvas, &src, &p, false);
        assert_eq!(canvas.pixel(0, 0), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(canvas.pixel(0, 1), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(canvas.pixel(3, 2), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(canvas.pixel(3, 3), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_translucent_blends_over_canvas() {
        let src = Image::filled(1, 1, Color::new(1.0, 1.0, 1.0, 0.5));
        let mut canvas = Image::filled(1, 1, Color::BLACK);
        let p = place(RotateMode::NONE, DisplayMode::ScaleFull, (1, 1), Vec2::ZERO);
        draw_placement(&mut canvas, &src, &p, false);
        let px = canvas.pixel(0, 0);
        assert!((px[0] - 0.5).abs() < 1e-6);
        assert!((px[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_offscreen_draws_nothing() {
        let src = Image::filled(2, 2, Color::WHITE);
        let mut canvas = Image::filled(2, 2, Color::BLACK);
        let before = canvas.clone();
        let p = place(RotateMode::NONE, DisplayMode::ScaleIn, (2, 2), Vec2::new(10.0, 0.0));
        draw_placement(&mut canvas, &src, &p, true);
        assert_eq!(canvas, before);
    }
}
