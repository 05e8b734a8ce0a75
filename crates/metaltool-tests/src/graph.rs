//! Render graph optimization must never change what the output shows.

use metaltool_core::{
    compute_placement, Color, DisplayMode, FrameSet, NodeId, NodeOp, PixelBuffer, RenderGraph,
    RotateMode, Size, Vec2,
};
use metaltool_imaging::{Image, ImageContext};
use metaltool_view::{build_render_graph, ViewConfig, FRAME_ID};

const VIEW: (u32, u32) = (48, 32);

fn render(graph: &RenderGraph, output: NodeId, frame: &PixelBuffer) -> Image {
    ImageContext::default()
        .render(graph, output, &FrameSet::single(FRAME_ID, frame))
        .unwrap()
}

fn assert_same_image(a: &Image, b: &Image) {
    assert_eq!((a.width, a.height), (b.width, b.height));
    for (pa, pb) in a.data.iter().zip(&b.data) {
        for c in 0..4 {
            assert!((pa[c] - pb[c]).abs() < 1e-4, "{:?} != {:?}", pa, pb);
        }
    }
}

fn layer(graph: &mut RenderGraph, input: NodeId, frame: &PixelBuffer, offset: Vec2) -> NodeId {
    let placement = compute_placement(
        Size::new(frame.width as f32, frame.height as f32),
        Size::from(VIEW),
        RotateMode::ROTATE_90,
        DisplayMode::ScaleIn,
        offset,
    );
    graph.add_node(NodeOp::Layer { placement }, vec![input], VIEW)
}

/// A graph every optimization applies to: a zero-sigma blur, a layer far
/// outside the view, duplicate sources and a dangling sharpen.
fn redundant_graph(frame: &PixelBuffer) -> (RenderGraph, NodeId) {
    let size = (frame.width, frame.height);
    let mut graph = RenderGraph::new();
    let source = |graph: &mut RenderGraph| {
        graph.add_node(
            NodeOp::Source {
                frame_id: FRAME_ID,
                keep_alpha: false,
            },
            vec![],
            size,
        )
    };

    let a = source(&mut graph);
    let b = source(&mut graph);
    let noop = graph.add_node(NodeOp::Blur { sigma: 0.0 }, vec![a], size);
    let blurred = graph.add_node(NodeOp::Blur { sigma: 2.0 }, vec![b], size);
    graph.add_node(NodeOp::Sharpen { amount: 1.0 }, vec![a], size);

    let back = layer(&mut graph, blurred, frame, Vec2::ZERO);
    let off_screen = layer(&mut graph, noop, frame, Vec2::new(500.0, 0.0));
    let front = layer(&mut graph, noop, frame, Vec2::new(6.0, -4.0));
    let output = graph.add_node(
        NodeOp::Output {
            clear: Color::new(0.1, 0.2, 0.3, 1.0),
        },
        vec![back, off_screen, front],
        VIEW,
    );
    (graph, output)
}

#[test]
fn optimizing_preserves_output() {
    let frame = PixelBuffer::test_pattern(40, 24);
    let (graph, output) = redundant_graph(&frame);
    let before = render(&graph, output, &frame);

    let mut optimized = graph.clone();
    let stats = optimized.optimize(output);
    assert_eq!(stats.removed_filters, 1);
    assert_eq!(stats.culled_layers, 1);
    assert!(stats.merged_nodes >= 1);
    assert!(stats.pruned_nodes >= 1);
    assert!(optimized.node_count() < graph.node_count());

    assert_same_image(&before, &render(&optimized, output, &frame));
}

#[test]
fn optimizing_twice_is_stable() {
    let frame = PixelBuffer::test_pattern(40, 24);
    let (mut graph, output) = redundant_graph(&frame);
    graph.optimize(output);
    let count = graph.node_count();
    assert_eq!(graph.optimize(output).total(), 0);
    assert_eq!(graph.node_count(), count);
}

#[test]
fn view_graphs_render_the_same_optimized() {
    let frame = PixelBuffer::test_pattern(30, 20);
    let configs = [
        ViewConfig::default(),
        ViewConfig {
            edge_blur: true,
            quality_enhancer: true,
            rotate_mode: RotateMode::ROTATE_180_MIRROR,
            ..Default::default()
        },
        ViewConfig {
            edge_blur: true,
            alpha: true,
            display_mode: DisplayMode::ScaleFull,
            translate_x: -3.0,
            ..Default::default()
        },
        ViewConfig {
            translate_x: 1000.0,
            canvas_color: Color::BLUE,
            ..Default::default()
        },
    ];

    for config in configs {
        let (graph, output) = build_render_graph(&config, &frame, VIEW);
        let mut optimized = graph.clone();
        optimized.optimize(output);
        assert_same_image(
            &render(&graph, output, &frame),
            &render(&optimized, output, &frame),
        );
    }
}

#[test]
fn off_screen_frame_shows_only_canvas() {
    let frame = PixelBuffer::test_pattern(30, 20);
    let config = ViewConfig {
        translate_y: 1000.0,
        canvas_color: Color::RED,
        ..Default::default()
    };
    let (mut graph, output) = build_render_graph(&config, &frame, VIEW);
    let stats = graph.optimize(output);
    assert_eq!(stats.culled_layers, 1);
    // only the output survives
    assert_eq!(graph.node_count(), 1);

    let image = render(&graph, output, &frame).to_rgba8();
    assert!(image.pixels().all(|p| p.0 == [255, 0, 0, 255]));
}
