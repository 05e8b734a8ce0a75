//! MetalTool View - frame presentation
//!
//! `MetalView` turns decoded frames into a per-frame render graph and draws
//! it on the GPU or on the CPU. `FrameQueue` feeds a view from other threads.

pub mod config;
pub mod graph;
pub mod queue;
pub mod renderer;
pub mod view;

pub use config::{edge_blur_sigma, ViewConfig, QUALITY_SHARPEN_AMOUNT};
pub use graph::{build_render_graph, FRAME_ID};
pub use queue::{FrameQueue, QueueStats};
pub use renderer::{DrawRequest, FrameRenderer, GpuRenderer, SoftwareRenderer};
pub use view::MetalView;
