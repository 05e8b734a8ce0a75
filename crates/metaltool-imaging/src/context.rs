//! CPU image-processing context.
//!
//! `ImageContext` executes a render graph entirely on the CPU. It is the
//! bridge used for software rendering and for processing images outside a
//! GPU command stream.

use std::collections::HashMap;
use std::sync::Arc;

use metaltool_core::memory_budget::MAX_BLUR_RADIUS;
use metaltool_core::{
    FrameSet, MetalToolError, NodeId, NodeOp, Placement, RenderGraph, Result,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::filters;
use crate::image::Image;
use crate::raster;

/// Options for an `ImageContext`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageContextOptions {
    /// Process rows on the rayon thread pool.
    pub parallel: bool,
    /// Largest gaussian kernel radius, in pixels.
    pub max_blur_radius: u32,
}

impl Default for ImageContextOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            max_blur_radius: MAX_BLUR_RADIUS,
        }
    }
}

/// Intermediate result of one node.
#[derive(Clone)]
enum NodeResult {
    Image(Arc<Image>),
    Layer(Arc<Image>, Placement),
}

/// CPU image-processing context.
#[derive(Debug, Clone, Default)]
pub struct ImageContext {
    options: ImageContextOptions,
}

impl ImageContext {
    pub fn new(options: ImageContextOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ImageContextOptions {
        &self.options
    }

    /// Gaussian blur with this context's radius cap.
    pub fn blur(&self, image: &Image, sigma: f32) -> Image {
        filters::gaussian_blur(image, sigma, self.options.max_blur_radius, self.options.parallel)
    }

    /// Unsharp-mask sharpening.
    pub fn sharpen(&self, image: &Image, amount: f32) -> Image {
        filters::sharpen(image, amount, self.options.parallel)
    }

    /// Execute `graph` up to `output` and return the output image.
    pub fn render(&self, graph: &RenderGraph, output: NodeId, frames: &FrameSet<'_>) -> Result<Image> {
        let order = graph.execution_order(output).ok_or_else(|| {
            MetalToolError::Internal("render graph has a cycle or a dangling input".to_string())
        })?;
        let mut remaining = graph.consumer_counts(&order);
        let mut results: HashMap<NodeId, NodeResult> = HashMap::new();

        for id in order {
            let node = graph
                .node(id)
                .ok_or_else(|| MetalToolError::Internal(format!("missing node {id:?}")))?;
            trace!(?id, op = ?node.op, "cpu execute");

            let result = match &node.op {
                NodeOp::Source {
                    frame_id,
                    keep_alpha,
                } => {
                    let frame = frames.get(*frame_id).ok_or_else(|| {
                        MetalToolError::InvalidParameter(format!("no frame bound to source {frame_id}"))
                    })?;
                    NodeResult::Image(Arc::new(Image::from_pixel_buffer(frame, *keep_alpha)))
                }
                NodeOp::Blur { sigma } => {
                    let input = take_image(&mut results, &mut remaining, node.inputs.first())?;
                    NodeResult::Image(Arc::new(self.blur(&input, *sigma)))
                }
                NodeOp::Sharpen { amount } => {
                    let input = take_image(&mut results, &mut remaining, node.inputs.first())?;
                    NodeResult::Image(Arc::new(self.sharpen(&input, *amount)))
                }
                NodeOp::Layer { placement } => {
                    let input = take_image(&mut results, &mut remaining, node.inputs.first())?;
                    NodeResult::Layer(input, *placement)
                }
                NodeOp::Output { clear } => {
                    let (w, h) = node.output_size;
                    let mut canvas = Image::filled(w, h, *clear);
                    for input in &node.inputs {
                        match take(&mut results, &mut remaining, Some(input))? {
                            NodeResult::Layer(image, placement) => {
                                raster::draw_placement(&mut canvas, &image, &placement, self.options.parallel)
                            }
                            NodeResult::Image(_) => {
                                return Err(MetalToolError::Internal(format!(
                                    "output input {input:?} is not a layer"
                                )))
                            }
                        }
                    }
                    if id == output {
                        return Ok(canvas);
                    }
                    NodeResult::Image(Arc::new(canvas))
                }
            };
            results.insert(id, result);
        }

        Err(MetalToolError::Internal(format!(
            "node {output:?} is not an output node"
        )))
    }
}

/// Fetch an input result, dropping it once its last consumer has read it.
fn take(
    results: &mut HashMap<NodeId, NodeResult>,
    remaining: &mut HashMap<NodeId, usize>,
    input: Option<&NodeId>,
) -> Result<NodeResult> {
    let id = *input.ok_or_else(|| MetalToolError::Internal("node is missing its input".to_string()))?;
    let count = remaining.entry(id).or_insert(1);
    *count = count.saturating_sub(1);
    let result = if *count == 0 {
        results.remove(&id)
    } else {
        results.get(&id).cloned()
    };
    result.ok_or_else(|| MetalToolError::Internal(format!("input {id:?} has not been produced")))
}

fn take_image(
    results: &mut HashMap<NodeId, NodeResult>,
    remaining: &mut HashMap<NodeId, usize>,
    input: Option<&NodeId>,
) -> Result<Arc<Image>> {
    match take(results, remaining, input)? {
        NodeResult::Image(image) => Ok(image),
        NodeResult::Layer(..) => Err(MetalToolError::Internal(
            "filters cannot read a layer".to_string(),
        )),
    }
}
