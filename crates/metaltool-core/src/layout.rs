//! Presentation layout: where a frame lands in the view.
//!
//! A frame is rotated, mirrored, scaled per `DisplayMode`, centered in the
//! view and finally offset. The result is a `Placement`: four destination
//! corners in view pixels (top-left origin) and the source texture
//! coordinate shown at each corner. Both renderers consume placements, so
//! the GPU and CPU paths agree on geometry.

use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, Size, Vec2};
use crate::orientation::{DisplayMode, RotateMode};

/// Corner order used throughout: top-left, top-right, bottom-left, bottom-right.
/// This is also triangle-strip order.
pub const CORNER_COUNT: usize = 4;

/// A frame quad positioned in the view.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Placement {
    /// Destination corners in view pixels.
    pub corners: [Vec2; CORNER_COUNT],
    /// Source texture coordinates (0..1) shown at each corner.
    pub uvs: [Vec2; CORNER_COUNT],
}

impl Placement {
    /// Axis-aligned bounds of the destination quad.
    pub fn bounds(&self) -> Rect {
        Rect::bounding(&self.corners)
    }

    /// Whether the quad covers no area.
    pub fn is_empty(&self) -> bool {
        let b = self.bounds();
        !(b.width > 0.0 && b.height > 0.0)
    }

    /// Whether any part of the quad is visible in a view of `view` size.
    pub fn intersects_view(&self, view: Size) -> bool {
        !self.is_empty() && !view.is_empty() && self.bounds().overlaps(Rect::from_size(view))
    }

    /// Source texture coordinate at a point inside the destination quad.
    ///
    /// The quad is a parallelogram, so the mapping is affine in the two edge
    /// vectors leaving the top-left corner. Returns `None` for empty quads.
    pub fn uv_at(&self, point: Vec2) -> Option<Vec2> {
        let [tl, tr, bl, _] = self.corners;
        let e_x = tr - tl;
        let e_y = bl - tl;
        let det = e_x.x * e_y.y - e_x.y * e_y.x;
        if det.abs() <= f32::EPSILON {
            return None;
        }
        let d = point - tl;
        let s = (d.x * e_y.y - d.y * e_y.x) / det;
        let t = (e_x.x * d.y - e_x.y * d.x) / det;
        let [uv_tl, uv_tr, uv_bl, _] = self.uvs;
        Some(uv_tl + (uv_tr - uv_tl) * s + (uv_bl - uv_tl) * t)
    }

    /// Corners converted to normalized device coordinates (+y up).
    pub fn ndc_corners(&self, view: Size) -> [Vec2; CORNER_COUNT] {
        self.corners.map(|c| {
            Vec2::new(
                c.x / view.width * 2.0 - 1.0,
                1.0 - c.y / view.height * 2.0,
            )
        })
    }
}

/// Texture coordinate at each destination corner for a rotation/mirror.
pub fn corner_uvs(rotate_mode: RotateMode) -> [Vec2; CORNER_COUNT] {
    let dest = [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 1.0),
        Vec2::new(1.0, 1.0),
    ];
    let mirrored = rotate_mode.is_mirrored();
    let turns = rotate_mode.quarter_turns();

    dest.map(|d| {
        let d = if mirrored { Vec2::new(1.0 - d.x, d.y) } else { d };
        // Undo a clockwise rotation of `turns` quarter turns.
        match turns {
            0 => d,
            1 => Vec2::new(d.y, 1.0 - d.x),
            2 => Vec2::new(1.0 - d.x, 1.0 - d.y),
            _ => Vec2::new(1.0 - d.y, d.x),
        }
    })
}

/// Size of the frame after rotation and scaling into the view.
pub fn fitted_size(video: Size, view: Size, rotate_mode: RotateMode, mode: DisplayMode) -> Size {
    if video.is_empty() || view.is_empty() {
        return Size::ZERO;
    }

    let rotated = if rotate_mode.swaps_axes() {
        video.transposed()
    } else {
        video
    };

    let sx = view.width / rotated.width;
    let sy = view.height / rotated.height;
    let (sx, sy) = match mode {
        DisplayMode::ScaleIn => (sx.min(sy), sx.min(sy)),
        DisplayMode::ScaleOut => (sx.max(sy), sx.max(sy)),
        DisplayMode::ScaleFull => (sx, sy),
    };

    Size::new(rotated.width * sx, rotated.height * sy)
}

/// Compute where a `video` sized frame lands in a `view` sized surface.
///
/// `offset` moves the fitted frame in view pixels (+x right, +y down).
pub fn compute_placement(
    video: Size,
    view: Size,
    rotate_mode: RotateMode,
    mode: DisplayMode,
    offset: Vec2,
) -> Placement {
    let fitted = fitted_size(video, view, rotate_mode, mode);
    if fitted.is_empty() {
        return Placement::default();
    }

    let center = view.to_vec2() * 0.5 + offset;
    let rect = Rect::from_center_size(center, fitted.to_vec2());
    let (min, max) = (rect.min(), rect.max());

    Placement {
        corners: [
            min,
            Vec2::new(max.x, min.y),
            Vec2::new(min.x, max.y),
            max,
        ],
        uvs: corner_uvs(rotate_mode),
    }
}

/// Per-frame presentation parameters recorded on a context.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PresentationState {
    pub rotate_mode: RotateMode,
    pub video_width: i32,
    pub video_height: i32,
    pub view_size: Size,
    /// Render offset in view pixels.
    pub view_offset_x: f32,
    pub view_offset_y: f32,
    /// Alpha blending of the frame over the canvas.
    pub blend_enable: bool,
}

impl PresentationState {
    /// Placement of the recorded frame in the recorded view.
    pub fn placement(&self, mode: DisplayMode) -> Placement {
        compute_placement(
            Size::new(self.video_width.max(0) as f32, self.video_height.max(0) as f32),
            self.view_size,
            self.rotate_mode,
            mode,
            Vec2::new(self.view_offset_x, self.view_offset_y),
        )
    }
}
