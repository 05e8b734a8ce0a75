//! The presentation view.

use std::sync::Arc;

use image::RgbaImage;
use metaltool_core::{Color, DisplayMode, MetalToolError, PixelBuffer, Result, RotateMode};
use metaltool_gpu::Context;
use metaltool_imaging::ImageContext;
use tracing::{debug, warn};

use crate::config::ViewConfig;
use crate::graph::build_render_graph;
use crate::renderer::{DrawRequest, FrameRenderer, GpuRenderer, SoftwareRenderer};

/// An offscreen surface that presents decoded frames.
///
/// Setters change the configuration used by subsequent draws; a draw
/// renders synchronously and replaces the frame returned by `snapshot`.
pub struct MetalView {
    renderer: Box<dyn FrameRenderer>,
    width: u32,
    height: u32,
    config: ViewConfig,
    frames_drawn: u64,
}

impl MetalView {
    /// A view rendering on the GPU context.
    pub fn new(context: Arc<Context>, width: u32, height: u32) -> Self {
        Self::with_renderer(Box::new(GpuRenderer::new(context)), width, height)
    }

    /// A view rendering on the CPU.
    pub fn software(image_context: ImageContext, width: u32, height: u32) -> Self {
        Self::with_renderer(
            Box::new(SoftwareRenderer::new(image_context)),
            width,
            height,
        )
    }

    pub fn with_renderer(renderer: Box<dyn FrameRenderer>, width: u32, height: u32) -> Self {
        debug!(renderer = renderer.name(), width, height, "view created");
        Self {
            renderer,
            width,
            height,
            config: ViewConfig::default(),
            frames_drawn: 0,
        }
    }

    /// Draw a frame with the current configuration. Failures are logged.
    pub fn draw_pixel_buffer(&mut self, buffer: &PixelBuffer) {
        if let Err(e) = self.try_draw(buffer) {
            warn!(renderer = self.renderer.name(), "draw failed: {}", e);
        }
    }

    /// Draw a frame with the current configuration.
    pub fn try_draw(&mut self, buffer: &PixelBuffer) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MetalToolError::InvalidParameter(format!(
                "view size {}x{} is empty",
                self.width, self.height
            )));
        }
        if buffer.is_empty() {
            return Err(MetalToolError::InvalidParameter(
                "pixel buffer has no pixels".to_string(),
            ));
        }

        let view_size = (self.width, self.height);
        let (mut graph, output) = build_render_graph(&self.config, buffer, view_size);
        if self.renderer.optimizes_graphs() {
            graph.optimize(output);
        }

        self.renderer.render(&DrawRequest {
            graph: &graph,
            output,
            frame: buffer,
            config: &self.config,
            view_size,
        })?;
        self.frames_drawn += 1;
        Ok(())
    }

    pub fn set_canvas_color(&mut self, color: Color) {
        self.config.canvas_color = color;
    }

    pub fn set_rotate_mode(&mut self, rotate_mode: RotateMode) {
        self.config.rotate_mode = rotate_mode;
    }

    /// Horizontal frame offset in view pixels.
    pub fn translate_x(&mut self, x: f32) {
        self.config.translate_x = x;
    }

    /// Vertical frame offset in view pixels.
    pub fn translate_y(&mut self, y: f32) {
        self.config.translate_y = y;
    }

    pub fn enable_quality_enhancer(&mut self, enable: bool) {
        self.config.quality_enhancer = enable;
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.config.display_mode = mode;
    }

    pub fn enable_edge_blur(&mut self, enable: bool) {
        self.config.edge_blur = enable;
    }

    pub fn enable_alpha(&mut self, enable: bool) {
        self.config.alpha = enable;
    }

    /// Replace the whole configuration.
    pub fn set_config(&mut self, config: ViewConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// The last rendered frame. `None` before the first draw or when
    /// readback fails (logged).
    pub fn snapshot(&mut self) -> Option<RgbaImage> {
        match self.try_snapshot() {
            Ok(image) => image,
            Err(e) => {
                warn!(renderer = self.renderer.name(), "snapshot failed: {}", e);
                None
            }
        }
    }

    pub fn try_snapshot(&mut self) -> Result<Option<RgbaImage>> {
        self.renderer.snapshot()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    /// Frames drawn successfully.
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }
}

impl std::fmt::Debug for MetalView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetalView")
            .field("renderer", &self.renderer.name())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("config", &self.config)
            .finish()
    }
}
