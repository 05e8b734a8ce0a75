//! Software view presentation tests: orientation, fitting, offsets, edge
//! blur, alpha and the frame queue.

use std::sync::Arc;

use image::RgbaImage;
use metaltool_core::{Color, DisplayMode, PixelBuffer, PixelFormat, RotateMode, SharedPixelBuffer};
use metaltool_imaging::ImageContext;
use metaltool_view::{FrameQueue, MetalView};

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];

fn rgba_frame(width: u32, height: u32, pixels: &[[u8; 4]]) -> PixelBuffer {
    let data: Vec<u8> = pixels.iter().flatten().copied().collect();
    PixelBuffer::from_packed(width, height, PixelFormat::Rgba8, &data).unwrap()
}

fn solid(width: u32, height: u32, rgba: [u8; 4]) -> PixelBuffer {
    rgba_frame(width, height, &vec![rgba; width as usize * height as usize])
}

/// 2x2 frame: red, green / blue, white.
fn quadrants() -> PixelBuffer {
    rgba_frame(2, 2, &[RED, GREEN, BLUE, WHITE])
}

fn software_view(width: u32, height: u32) -> MetalView {
    MetalView::software(ImageContext::default(), width, height)
}

fn draw(view: &mut MetalView, frame: &PixelBuffer) -> RgbaImage {
    view.try_draw(frame).unwrap();
    view.snapshot().unwrap()
}

fn present(rotate_mode: RotateMode, frame: &PixelBuffer, view_size: (u32, u32)) -> RgbaImage {
    let mut view = software_view(view_size.0, view_size.1);
    view.set_rotate_mode(rotate_mode);
    view.set_display_mode(DisplayMode::ScaleFull);
    draw(&mut view, frame)
}

fn quad(image: &RgbaImage) -> [[u8; 4]; 4] {
    [
        image.get_pixel(0, 0).0,
        image.get_pixel(1, 0).0,
        image.get_pixel(0, 1).0,
        image.get_pixel(1, 1).0,
    ]
}

#[test]
fn rotations_turn_clockwise() {
    let frame = quadrants();
    assert_eq!(quad(&present(RotateMode::NONE, &frame, (2, 2))), [RED, GREEN, BLUE, WHITE]);
    assert_eq!(quad(&present(RotateMode::ROTATE_90, &frame, (2, 2))), [BLUE, RED, WHITE, GREEN]);
    assert_eq!(quad(&present(RotateMode::ROTATE_180, &frame, (2, 2))), [WHITE, BLUE, GREEN, RED]);
    assert_eq!(quad(&present(RotateMode::ROTATE_270, &frame, (2, 2))), [GREEN, WHITE, RED, BLUE]);
}

#[test]
fn mirror_applies_after_rotation() {
    let frame = quadrants();
    assert_eq!(quad(&present(RotateMode::MIRROR, &frame, (2, 2))), [GREEN, RED, WHITE, BLUE]);
    assert_eq!(
        quad(&present(RotateMode::ROTATE_90_MIRROR, &frame, (2, 2))),
        [RED, BLUE, GREEN, WHITE]
    );
    assert_eq!(
        quad(&present(RotateMode::ROTATE_270_MIRROR, &frame, (2, 2))),
        [WHITE, GREEN, BLUE, RED]
    );
}

#[test]
fn combined_rotations_render_as_their_sum() {
    let frame = PixelBuffer::test_pattern(16, 6);
    let cases = [
        (RotateMode::ROTATE_90 | RotateMode::ROTATE_180, RotateMode::ROTATE_270),
        (RotateMode::ROTATE_90 | RotateMode::ROTATE_270, RotateMode::NONE),
        (RotateMode::ROTATE_180 | RotateMode::ROTATE_270, RotateMode::ROTATE_90),
        (
            RotateMode::ROTATE_90 | RotateMode::ROTATE_180 | RotateMode::ROTATE_270,
            RotateMode::ROTATE_180,
        ),
        (
            RotateMode::ROTATE_90 | RotateMode::ROTATE_180 | RotateMode::MIRROR,
            RotateMode::ROTATE_270_MIRROR,
        ),
    ];
    for (union, equivalent) in cases {
        assert_eq!(
            present(union, &frame, (12, 12)),
            present(equivalent, &frame, (12, 12)),
            "{:?} vs {:?}",
            union,
            equivalent
        );
    }
}

#[test]
fn rotated_frame_swaps_its_aspect() {
    // 4x2 frame rotated a quarter turn fits as 2x4 into a 4x4 view
    let mut view = software_view(4, 4);
    view.set_canvas_color(Color::BLUE);
    view.set_rotate_mode(RotateMode::ROTATE_90);
    let snap = draw(&mut view, &solid(4, 2, RED));
    for y in 0..4 {
        assert_eq!(snap.get_pixel(0, y).0, BLUE);
        assert_eq!(snap.get_pixel(1, y).0, RED);
        assert_eq!(snap.get_pixel(2, y).0, RED);
        assert_eq!(snap.get_pixel(3, y).0, BLUE);
    }
}

#[test]
fn display_modes_fit_differently() {
    let frame = rgba_frame(2, 1, &[RED, BLUE]);

    let mut view = software_view(4, 4);
    view.set_canvas_color(Color::GREEN);

    // 4x2 band in the middle
    view.set_display_mode(DisplayMode::ScaleIn);
    let snap = draw(&mut view, &frame);
    assert_eq!(snap.get_pixel(0, 0).0, GREEN);
    assert_eq!(snap.get_pixel(0, 3).0, GREEN);
    assert_eq!(snap.get_pixel(0, 1).0, RED);
    assert_eq!(snap.get_pixel(3, 2).0, BLUE);

    // 8x4, cropped left and right
    view.set_display_mode(DisplayMode::ScaleOut);
    let snap = draw(&mut view, &frame);
    assert!(snap.pixels().all(|p| p.0[1] == 0 && p.0[3] == 255));
    let left = snap.get_pixel(0, 0).0;
    let right = snap.get_pixel(3, 0).0;
    assert!(left[0] > left[2]);
    assert!(right[2] > right[0]);

    // stretched to 4x4
    view.set_display_mode(DisplayMode::ScaleFull);
    let snap = draw(&mut view, &frame);
    assert_eq!(snap.get_pixel(0, 0).0, RED);
    assert_eq!(snap.get_pixel(0, 3).0, RED);
    assert_eq!(snap.get_pixel(3, 0).0, BLUE);
}

#[test]
fn translation_moves_the_frame() {
    let mut view = software_view(4, 2);
    view.set_canvas_color(Color::BLACK);

    let snap = draw(&mut view, &quadrants());
    assert_eq!(snap.get_pixel(1, 0).0, RED);
    assert_eq!(snap.get_pixel(2, 0).0, GREEN);

    view.translate_x(1.0);
    view.translate_y(-1.0);
    let snap = draw(&mut view, &quadrants());
    assert_eq!(snap.get_pixel(1, 0).0, [0, 0, 0, 255]);
    assert_eq!(snap.get_pixel(2, 0).0, BLUE);
    assert_eq!(snap.get_pixel(3, 0).0, WHITE);
    assert_eq!(snap.get_pixel(2, 1).0, [0, 0, 0, 255]);
}

#[test]
fn edge_blur_fills_the_letterbox() {
    let mut view = software_view(8, 8);
    view.set_canvas_color(Color::BLUE);
    let frame = solid(8, 4, RED);

    let snap = draw(&mut view, &frame);
    assert_eq!(snap.get_pixel(4, 0).0, BLUE);

    view.enable_edge_blur(true);
    let snap = draw(&mut view, &frame);
    assert!(snap.pixels().all(|p| p.0 == RED));
}

#[test]
fn edge_blur_background_stays_opaque() {
    let frame = solid(4, 2, [255, 255, 255, 0]);
    let mut view = software_view(4, 4);
    view.set_canvas_color(Color::BLACK);
    view.enable_alpha(true);
    view.enable_edge_blur(true);

    // transparent foreground shows the opaque white background
    let snap = draw(&mut view, &frame);
    assert!(snap.pixels().all(|p| p.0 == WHITE));
}

#[test]
fn alpha_blends_over_canvas() {
    let frame = solid(2, 2, [255, 255, 255, 128]);
    let mut view = software_view(2, 2);
    view.set_canvas_color(Color::BLACK);
    view.enable_alpha(true);

    let px = draw(&mut view, &frame).get_pixel(0, 0).0;
    assert_eq!(px[3], 255);
    for c in &px[..3] {
        assert!((*c as i32 - 128).abs() <= 1, "{:?}", px);
    }
}

#[test]
fn quality_enhancer_keeps_flat_areas() {
    let mut view = software_view(6, 6);
    view.enable_quality_enhancer(true);
    let snap = draw(&mut view, &solid(6, 6, [100, 150, 200, 255]));
    assert!(snap.pixels().all(|p| p.0 == [100, 150, 200, 255]));
}

#[test]
fn nv12_frames_are_presented() {
    // mid gray luma with neutral chroma
    let frame = PixelBuffer::from_nv12(4, 4, &[126; 16], &[128; 8]).unwrap();
    let mut view = software_view(4, 4);
    let px = draw(&mut view, &frame).get_pixel(1, 1).0;
    assert_eq!(px[3], 255);
    assert!(px[0] == px[1] && px[1] == px[2]);
    assert!((100..160).contains(&px[0]));
}

#[test]
fn queue_presents_the_latest_frame() {
    let queue = FrameQueue::with_depth(software_view(4, 4), 1).unwrap();
    queue.configure(|view| view.set_display_mode(DisplayMode::ScaleFull));

    let colors = [RED, GREEN, BLUE, WHITE, GREEN];
    for rgba in colors {
        let frame: SharedPixelBuffer = Arc::new(solid(2, 2, rgba));
        queue.submit(frame);
    }
    queue.flush();

    let snap = queue.snapshot().unwrap();
    assert!(snap.pixels().all(|p| p.0 == GREEN));

    let stats = queue.stats();
    assert_eq!(stats.submitted, 5);
    assert_eq!(stats.rendered + stats.dropped, 5);

    let view = queue.shutdown().unwrap();
    assert_eq!(view.frames_drawn(), stats.rendered);
    assert_eq!(view.config().display_mode, DisplayMode::ScaleFull);
}

#[test]
fn queue_counts_rejected_frames_as_failed() {
    let queue = FrameQueue::new(software_view(4, 4)).unwrap();
    queue.submit(solid(2, 2, RED));
    queue.flush();
    let before = queue.stats();
    assert_eq!((before.rendered, before.failed), (1, 0));

    queue.submit(PixelBuffer::new(0, 0, PixelFormat::Rgba8));
    queue.flush();
    let after = queue.stats();
    assert_eq!(after.rendered, before.rendered);
    assert_eq!(after.failed, 1);
    assert_eq!(after.rendered + after.dropped + after.failed, after.submitted);

    // the rejected frame leaves the last good one on screen
    let snap = queue.snapshot().unwrap();
    assert!(snap.pixels().all(|p| p.0 == RED));
}

#[test]
fn queue_configures_before_drawing_later_frames() {
    let queue = FrameQueue::new(software_view(4, 4)).unwrap();
    let frame: SharedPixelBuffer = Arc::new(solid(4, 2, RED));
    let canvases = [(Color::GREEN, GREEN), (Color::BLUE, BLUE)];

    for round in 0..40 {
        let (color, expected) = canvases[round % 2];
        queue.configure(move |view| view.set_canvas_color(color));
        queue.submit(Arc::clone(&frame));
        queue.flush();

        let snap = queue.snapshot().unwrap();
        // letterbox rows show the canvas configured before the frame
        assert_eq!(snap.get_pixel(0, 0).0, expected, "round {}", round);
        assert_eq!(snap.get_pixel(0, 1).0, RED);
    }
    assert_eq!(queue.stats().failed, 0);
}
