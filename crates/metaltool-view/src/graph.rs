//! Per-frame render graph construction.

use metaltool_core::{
    compute_placement, DisplayMode, NodeId, NodeOp, PixelBuffer, RenderGraph, Size, Vec2,
};

use crate::config::{edge_blur_sigma, ViewConfig, QUALITY_SHARPEN_AMOUNT};

/// Frame id the drawn pixel buffer is bound to.
pub const FRAME_ID: u64 = 0;

/// Build the render graph presenting `frame` in a `view` sized surface.
///
/// Layers, back to front: the edge-blur background (when enabled), then the
/// foreground frame. The foreground keeps its alpha only when alpha is
/// enabled, and is sharpened when the quality enhancer is on.
pub fn build_render_graph(
    config: &ViewConfig,
    frame: &PixelBuffer,
    view: (u32, u32),
) -> (RenderGraph, NodeId) {
    let mut graph = RenderGraph::new();
    let frame_size = (frame.width, frame.height);
    let video = Size::from(frame_size);
    let view_size = Size::from(view);
    let mut layers = Vec::with_capacity(2);

    if config.edge_blur {
        let src = graph.add_node(
            NodeOp::Source {
                frame_id: FRAME_ID,
                keep_alpha: false,
            },
            vec![],
            frame_size,
        );
        let blur = graph.add_node(
            NodeOp::Blur {
                sigma: edge_blur_sigma(video),
            },
            vec![src],
            frame_size,
        );
        let placement = compute_placement(
            video,
            view_size,
            config.rotate_mode,
            DisplayMode::ScaleOut,
            Vec2::ZERO,
        );
        layers.push(graph.add_node(NodeOp::Layer { placement }, vec![blur], view));
    }

    let mut foreground = graph.add_node(
        NodeOp::Source {
            frame_id: FRAME_ID,
            keep_alpha: config.alpha,
        },
        vec![],
        frame_size,
    );
    if config.quality_enhancer {
        foreground = graph.add_node(
            NodeOp::Sharpen {
                amount: QUALITY_SHARPEN_AMOUNT,
            },
            vec![foreground],
            frame_size,
        );
    }
    let placement = compute_placement(
        video,
        view_size,
        config.rotate_mode,
        config.display_mode,
        Vec2::new(config.translate_x, config.translate_y),
    );
    layers.push(graph.add_node(NodeOp::Layer { placement }, vec![foreground], view));

    let out = graph.add_node(
        NodeOp::Output {
            clear: config.canvas_color,
        },
        layers,
        view,
    );
    (graph, out)
}
