//! Presentation configuration of a view.

use metaltool_core::{Color, DisplayMode, RotateMode, Size};
use serde::{Deserialize, Serialize};

/// Sharpen amount applied by the quality enhancer.
pub const QUALITY_SHARPEN_AMOUNT: f32 = 0.5;

/// Blur sigma of the edge-blur background: 2% of the longer video side.
pub fn edge_blur_sigma(video: Size) -> f32 {
    (video.width.max(video.height) * 0.02).clamp(2.0, 16.0)
}

/// Settings applied to every subsequent draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub canvas_color: Color,
    pub rotate_mode: RotateMode,
    /// Frame offset in view pixels, +x right.
    pub translate_x: f32,
    /// Frame offset in view pixels, +y down.
    pub translate_y: f32,
    pub display_mode: DisplayMode,
    pub quality_enhancer: bool,
    pub edge_blur: bool,
    /// Blend the frame's own alpha over the canvas.
    pub alpha: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            canvas_color: Color::BLACK,
            rotate_mode: RotateMode::NONE,
            translate_x: 0.0,
            translate_y: 0.0,
            display_mode: DisplayMode::ScaleIn,
            quality_enhancer: false,
            edge_blur: false,
            alpha: false,
        }
    }
}
