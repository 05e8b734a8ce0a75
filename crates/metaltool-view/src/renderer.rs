//! Frame renderers: the seam between a view and the device that draws.

use std::sync::Arc;

use image::RgbaImage;
use metaltool_core::{FrameSet, NodeId, PixelBuffer, PresentationState, RenderGraph, Result, Size};
use metaltool_gpu::{execute_graph, read_texture, Context, GpuTexture};
use metaltool_imaging::{Image, ImageContext};

use crate::config::ViewConfig;
use crate::graph::FRAME_ID;

/// Everything a renderer needs for one draw.
pub struct DrawRequest<'a> {
    pub graph: &'a RenderGraph,
    pub output: NodeId,
    pub frame: &'a PixelBuffer,
    pub config: &'a ViewConfig,
    pub view_size: (u32, u32),
}

/// Executes render graphs and keeps the last rendered frame.
pub trait FrameRenderer: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether graphs should be optimized before `render`.
    fn optimizes_graphs(&self) -> bool;

    fn render(&mut self, request: &DrawRequest<'_>) -> Result<()>;

    /// The last rendered frame, `None` before the first successful render.
    fn snapshot(&mut self) -> Result<Option<RgbaImage>>;
}

/// Renders on a shared GPU `Context`.
pub struct GpuRenderer {
    context: Arc<Context>,
    last: Option<GpuTexture>,
}

impl GpuRenderer {
    pub fn new(context: Arc<Context>) -> Self {
        Self {
            context,
            last: None,
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }
}

impl FrameRenderer for GpuRenderer {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn optimizes_graphs(&self) -> bool {
        self.context.is_render_graph_optimization_enabled()
    }

    fn render(&mut self, request: &DrawRequest<'_>) -> Result<()> {
        let frames = FrameSet::single(FRAME_ID, request.frame);
        let texture = execute_graph(&self.context, request.graph, request.output, &frames)?;
        if let Some(previous) = self.last.replace(texture) {
            self.context.recycle_texture(previous);
        }

        let config = request.config;
        self.context.set_presentation(PresentationState {
            rotate_mode: config.rotate_mode,
            video_width: request.frame.width as i32,
            video_height: request.frame.height as i32,
            view_size: Size::from(request.view_size),
            view_offset_x: config.translate_x,
            view_offset_y: config.translate_y,
            blend_enable: config.alpha,
        });
        Ok(())
    }

    fn snapshot(&mut self) -> Result<Option<RgbaImage>> {
        match &self.last {
            Some(texture) => read_texture(&self.context, texture).map(Some),
            None => Ok(None),
        }
    }
}

impl Drop for GpuRenderer {
    fn drop(&mut self) {
        if let Some(texture) = self.last.take() {
            self.context.recycle_texture(texture);
        }
    }
}

/// Renders on the CPU through an `ImageContext`.
pub struct SoftwareRenderer {
    image_context: ImageContext,
    optimize: bool,
    last: Option<Image>,
}

impl SoftwareRenderer {
    pub fn new(image_context: ImageContext) -> Self {
        Self {
            image_context,
            optimize: true,
            last: None,
        }
    }

    /// Turn render-graph optimization on or off.
    pub fn with_optimization(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// The last rendered frame, premultiplied.
    pub fn last_image(&self) -> Option<&Image> {
        self.last.as_ref()
    }
}

impl FrameRenderer for SoftwareRenderer {
    fn name(&self) -> &'static str {
        "software"
    }

    fn optimizes_graphs(&self) -> bool {
        self.optimize
    }

    fn render(&mut self, request: &DrawRequest<'_>) -> Result<()> {
        let frames = FrameSet::single(FRAME_ID, request.frame);
        let image = self
            .image_context
            .render(request.graph, request.output, &frames)?;
        self.last = Some(image);
        Ok(())
    }

    fn snapshot(&mut self) -> Result<Option<RgbaImage>> {
        Ok(self.last.as_ref().map(Image::to_rgba8))
    }
}
