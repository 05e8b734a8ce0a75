//! GPU execution of a render graph.
//!
//! Nodes run in topological order and are recorded into a single command
//! encoder, submitted once per graph. Filter intermediates go back to the
//! context's idle pool as soon as their last consumer has been recorded.
//! Frame textures are written through the queue, so they are only returned
//! to the video texture cache after submission.

use std::collections::HashMap;

use metaltool_core::memory_budget::MAX_BLUR_RADIUS;
use metaltool_core::{FrameSet, MetalToolError, NodeId, NodeOp, Placement, RenderGraph, Result, Size};
use metaltool_imaging::blur_radius;
use tracing::trace;

use crate::context::Context;
use crate::pipeline::{FilterPipeline, FilterUniform};
use crate::texture::GpuTexture;

enum Produced {
    /// Render target owned by the context pool.
    Texture(GpuTexture),
    /// Uploaded frame owned by the video texture cache.
    Frame(GpuTexture),
    /// A placed input, drawn when the output consumes it.
    Layer { source: NodeId, placement: Placement },
}

struct Execution<'a> {
    context: &'a Context,
    results: HashMap<NodeId, Produced>,
    remaining: HashMap<NodeId, usize>,
    finished_frames: Vec<GpuTexture>,
}

impl<'a> Execution<'a> {
    fn texture(&self, id: NodeId) -> Result<&GpuTexture> {
        match self.results.get(&id) {
            Some(Produced::Texture(texture)) | Some(Produced::Frame(texture)) => Ok(texture),
            Some(Produced::Layer { .. }) => Err(MetalToolError::Internal(format!(
                "node {id:?} is a layer, not a texture"
            ))),
            None => Err(MetalToolError::Internal(format!(
                "input {id:?} has not been produced"
            ))),
        }
    }

    fn input(&self, inputs: &[NodeId]) -> Result<NodeId> {
        inputs
            .first()
            .copied()
            .ok_or_else(|| MetalToolError::Internal("node is missing its input".to_string()))
    }

    /// One consumer of `id` has been recorded.
    fn release(&mut self, id: NodeId) {
        let count = self.remaining.entry(id).or_insert(1);
        *count = count.saturating_sub(1);
        if *count > 0 {
            return;
        }
        match self.results.remove(&id) {
            Some(Produced::Texture(texture)) => self.context.recycle_texture(texture),
            Some(Produced::Frame(texture)) => self.finished_frames.push(texture),
            Some(Produced::Layer { source, .. }) => self.release(source),
            None => {}
        }
    }
}

/// Execute `graph` up to `output` and return the rendered texture.
///
/// The output texture has the context's working pixel format. Hand it back
/// with `Context::recycle_texture` once read.
pub fn execute_graph(
    context: &Context,
    graph: &RenderGraph,
    output: NodeId,
    frames: &FrameSet<'_>,
) -> Result<GpuTexture> {
    let order = graph.execution_order(output).ok_or_else(|| {
        MetalToolError::Internal("render graph has a cycle or a dangling input".to_string())
    })?;
    let device = context.device();
    let max_radius = context
        .options()
        .image_context_options
        .as_ref()
        .map_or(MAX_BLUR_RADIUS, |o| o.max_blur_radius);

    let mut exec = Execution {
        context,
        remaining: graph.consumer_counts(&order),
        results: HashMap::new(),
        finished_frames: Vec::new(),
    };
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("metaltool.graph"),
    });
    let mut rendered = None;

    for id in order {
        let node = graph
            .node(id)
            .ok_or_else(|| MetalToolError::Internal(format!("missing node {id:?}")))?;
        trace!(?id, op = ?node.op, "gpu execute");

        match &node.op {
            NodeOp::Source {
                frame_id,
                keep_alpha,
            } => {
                let frame = frames.get(*frame_id).ok_or_else(|| {
                    MetalToolError::InvalidParameter(format!("no frame bound to source {frame_id}"))
                })?;
                let texture = context.video_texture_cache().texture_for(frame, *keep_alpha)?;
                exec.results.insert(id, Produced::Frame(texture));
            }
            NodeOp::Blur { sigma } => {
                let input = exec.input(&node.inputs)?;
                let source = exec.texture(input)?;
                let (w, h) = (source.width, source.height);
                let radius = blur_radius(*sigma, max_radius);
                let horizontal = context.acquire_texture_with_format(w, h, FilterPipeline::FORMAT);
                let out = context.acquire_texture_with_format(w, h, FilterPipeline::FORMAT);
                let filter = context.filter_pipeline();
                filter.blur_pass(
                    device,
                    &mut encoder,
                    source,
                    &horizontal,
                    FilterUniform::blur([1, 0], *sigma, radius),
                );
                filter.blur_pass(
                    device,
                    &mut encoder,
                    &horizontal,
                    &out,
                    FilterUniform::blur([0, 1], *sigma, radius),
                );
                context.recycle_texture(horizontal);
                exec.release(input);
                exec.results.insert(id, Produced::Texture(out));
            }
            NodeOp::Sharpen { amount } => {
                let input = exec.input(&node.inputs)?;
                let source = exec.texture(input)?;
                let out = context.acquire_texture_with_format(
                    source.width,
                    source.height,
                    FilterPipeline::FORMAT,
                );
                context
                    .filter_pipeline()
                    .sharpen_pass(device, &mut encoder, source, &out, *amount);
                exec.release(input);
                exec.results.insert(id, Produced::Texture(out));
            }
            NodeOp::Layer { placement } => {
                let input = exec.input(&node.inputs)?;
                exec.results.insert(
                    id,
                    Produced::Layer {
                        source: input,
                        placement: *placement,
                    },
                );
            }
            NodeOp::Output { clear } => {
                let (w, h) = node.output_size;
                if w == 0 || h == 0 {
                    return Err(MetalToolError::InvalidParameter(format!(
                        "output size {w}x{h} is empty"
                    )));
                }
                let blit = context.blit_pipeline();
                // layers can only be blitted into the format the pipeline was built for
                let target = context.acquire_texture_with_format(w, h, blit.target_format());
                let view = Size::new(w as f32, h as f32);

                let mut bind_groups = Vec::with_capacity(node.inputs.len());
                for layer in &node.inputs {
                    match exec.results.get(layer) {
                        Some(Produced::Layer { source, placement }) => {
                            let texture = exec.texture(*source)?;
                            bind_groups.push(blit.bind_group(device, texture, placement, view));
                        }
                        _ => {
                            return Err(MetalToolError::Internal(format!(
                                "output input {layer:?} is not a layer"
                            )))
                        }
                    }
                }

                let [r, g, b, a] = clear.to_premultiplied_array();
                {
                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("metaltool.output"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &target.view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color {
                                    r: r as f64,
                                    g: g as f64,
                                    b: b as f64,
                                    a: a as f64,
                                }),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    for bind_group in &bind_groups {
                        blit.draw(&mut pass, bind_group);
                    }
                }

                for layer in &node.inputs {
                    exec.release(*layer);
                }
                if id == output {
                    rendered = Some(target);
                    break;
                }
                exec.results.insert(id, Produced::Texture(target));
            }
        }
    }

    context.queue().submit(std::iter::once(encoder.finish()));

    for frame in exec.finished_frames.drain(..) {
        context.video_texture_cache().recycle(frame);
    }
    for (_, produced) in exec.results.drain() {
        match produced {
            Produced::Texture(texture) => context.recycle_texture(texture),
            Produced::Frame(texture) => context.video_texture_cache().recycle(texture),
            Produced::Layer { .. } => {}
        }
    }

    rendered.ok_or_else(|| MetalToolError::Internal(format!("node {output:?} is not an output node")))
}
