//! MetalTool Core - Foundation types for frame presentation
//!
//! This crate provides the fundamental types used throughout MetalTool:
//! - Pixel buffers and pixel formats
//! - Canvas colors and geometric primitives
//! - Rotation / display modes and presentation layout
//! - The render graph shared by the GPU and CPU renderers

pub mod color;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod layout;
pub mod orientation;
pub mod render_graph;

pub use color::Color;
pub use error::{MetalToolError, Result};
pub use frame::{FramePlane, PixelBuffer, PixelFormat, SharedPixelBuffer};
pub use geometry::{Rect, Size, Vec2};
pub use layout::{compute_placement, corner_uvs, fitted_size, Placement, PresentationState};
pub use orientation::{DisplayMode, RotateMode};
pub use render_graph::{FrameSet, NodeId, NodeOp, OptimizeStats, RenderGraph, RenderNode};

/// Resource budget constants
pub mod memory_budget {
    /// Idle texture memory a context keeps for reuse
    pub const IDLE_RESOURCE_BUDGET: usize = 256 * 1024 * 1024; // 256 MB

    /// Idle upload textures kept by the video texture cache
    pub const VIDEO_TEXTURE_CACHE_BUDGET: usize = 128 * 1024 * 1024; // 128 MB

    /// Largest gaussian kernel radius, in texels
    pub const MAX_BLUR_RADIUS: u32 = 48;

    /// Frames a frame queue holds before dropping the oldest
    pub const FRAME_QUEUE_DEPTH: usize = 3;
}
