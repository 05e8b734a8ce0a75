//! Integration tests for the GPU context.
//!
//! Tests that need an adapter skip themselves when none is available.

use std::io::Cursor;
use std::sync::Arc;

use image::{ImageFormat, Rgba, RgbaImage};
use metaltool_core::{
    Color, DisplayMode, MetalToolError, PixelBuffer, PixelFormat, RotateMode, Size,
};
use metaltool_gpu::{
    Context, ContextOptions, DeviceRequest, ShaderLibrary, ShaderSource, WorkingPixelFormat,
};
use metaltool_imaging::ImageContext;
use metaltool_view::MetalView;

fn gpu_context(options: ContextOptions) -> Option<Arc<Context>> {
    match Context::with_options(&DeviceRequest::with_backends(wgpu::Backends::all()), options) {
        Ok(context) => Some(Arc::new(context)),
        Err(e) => {
            eprintln!("skipping GPU test: {}", e);
            None
        }
    }
}

fn rgba_context() -> Option<Arc<Context>> {
    gpu_context(ContextOptions {
        working_pixel_format: WorkingPixelFormat::Rgba8Unorm,
        ..Default::default()
    })
}

fn png_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// Mean absolute channel difference between two images of equal size.
fn mean_difference(a: &RgbaImage, b: &RgbaImage) -> f64 {
    assert_eq!(a.dimensions(), b.dimensions());
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(x, y)| (*x as i64 - *y as i64).unsigned_abs())
        .sum();
    total as f64 / a.as_raw().len() as f64
}

#[test]
fn unusable_device_request_fails() {
    let result = Context::new(&DeviceRequest::with_backends(wgpu::Backends::empty()));
    assert!(matches!(result, Err(MetalToolError::Gpu(_))));
}

#[test]
fn invalid_options_fail_before_device_creation() {
    let options = ContextOptions {
        label: String::new(),
        ..Default::default()
    };
    let result = Context::with_options(&DeviceRequest::default(), options);
    assert!(matches!(result, Err(MetalToolError::InvalidParameter(_))));
}

#[test]
fn default_device_compute_probe_does_not_panic() {
    let _ = Context::default_device_supports_compute();
}

#[test]
fn context_exposes_resources() {
    let Some(context) = gpu_context(ContextOptions::default()) else {
        return;
    };

    assert_eq!(context.label(), "metaltool.context");
    assert_eq!(context.working_pixel_format(), WorkingPixelFormat::Bgra8Unorm);
    assert!(context.is_render_graph_optimization_enabled());
    assert!(context.default_library().module("blit").is_some());
    assert!(context.default_library().module("filter").is_some());
    assert!(context
        .default_library()
        .function_names()
        .contains(&"filter::fs_blur".to_string()));
    assert!(context.image_context().options().parallel);
    assert_eq!(context.video_texture_cache().idle_count(), 0);

    let mut image = RgbaImage::new(3, 2);
    image.put_pixel(1, 1, Rgba([255, 0, 0, 255]));
    let texture = context
        .texture_loader()
        .load_from_memory(&png_bytes(&image))
        .unwrap();
    assert_eq!((texture.width, texture.height), (3, 2));
    assert_eq!(texture.format, wgpu::TextureFormat::Rgba8Unorm);

    let readback = metaltool_gpu::read_texture(&context, &texture).unwrap();
    assert_eq!(readback, image);
}

#[test]
fn texture_loader_rejects_garbage() {
    let Some(context) = gpu_context(ContextOptions::default()) else {
        return;
    };
    let err = context.texture_loader().load_from_memory(b"not an image").unwrap_err();
    assert!(matches!(err, MetalToolError::Image(_)));
}

#[test]
fn invalid_shader_is_rejected() {
    let Some(context) = gpu_context(ContextOptions::default()) else {
        return;
    };
    let broken = [ShaderSource {
        name: "broken",
        source: "@fragment fn fs_main( -> @location(0) vec4<f32> { return 1; }",
        entry_points: &["fs_main"],
    }];
    let result = ShaderLibrary::from_sources(context.device(), &broken);
    assert!(matches!(result, Err(MetalToolError::Shader(_))));
}

#[test]
fn idle_accounting_drops_to_zero_on_reclaim() {
    let Some(context) = gpu_context(ContextOptions::default()) else {
        return;
    };

    let textures: Vec<_> = (0..3).map(|_| context.acquire_texture(64, 64)).collect();
    assert_eq!(context.idle_resource_count(), 0);
    for texture in textures {
        context.recycle_texture(texture);
    }
    assert_eq!(context.idle_resource_count(), 3);
    assert_eq!(context.idle_resource_size(), 3 * 64 * 64 * 4);

    let frame = PixelBuffer::test_pattern(32, 16);
    let uploaded = context.video_texture_cache().texture_for(&frame, false).unwrap();
    context.video_texture_cache().recycle(uploaded);
    assert_eq!(context.idle_resource_count(), 4);

    let (size, count) = (context.idle_resource_size(), context.idle_resource_count());
    context.reclaim_resources();
    assert!(context.idle_resource_size() <= size);
    assert!(context.idle_resource_count() <= count);
    assert_eq!(context.idle_resource_size(), 0);
    assert_eq!(context.idle_resource_count(), 0);
}

#[test]
fn trimming_keeps_frame_textures_longest() {
    let Some(context) = gpu_context(ContextOptions::default()) else {
        return;
    };
    let textures: Vec<_> = (0..3).map(|_| context.acquire_texture(64, 64)).collect();
    for texture in textures {
        context.recycle_texture(texture);
    }
    let frame = PixelBuffer::test_pattern(32, 16);
    let uploaded = context.video_texture_cache().texture_for(&frame, false).unwrap();
    context.video_texture_cache().recycle(uploaded);
    let frame_bytes = 32 * 16 * 4;
    let intermediate_bytes = 64 * 64 * 4;

    context.trim_resources(frame_bytes + intermediate_bytes);
    assert_eq!(context.idle_resource_size(), frame_bytes + intermediate_bytes);
    assert_eq!(context.video_texture_cache().idle_count(), 1);

    context.trim_resources(frame_bytes);
    assert_eq!(context.idle_resource_count(), 1);
    assert_eq!(context.video_texture_cache().idle_size(), frame_bytes);

    context.video_texture_cache().flush();
    assert_eq!(context.idle_resource_size(), 0);
    assert_eq!(context.idle_resource_count(), 0);
}

#[test]
fn idle_pool_respects_budget() {
    let Some(context) = gpu_context(ContextOptions {
        idle_resource_budget: 64 * 64 * 4,
        ..Default::default()
    }) else {
        return;
    };
    let a = context.acquire_texture(64, 64);
    let b = context.acquire_texture(64, 64);
    context.recycle_texture(a);
    context.recycle_texture(b);
    assert_eq!(context.idle_resource_count(), 1);
}

#[test]
fn gpu_view_matches_software_view() {
    let Some(context) = rgba_context() else {
        return;
    };
    let frame = PixelBuffer::test_pattern(96, 48);

    let configure = |view: &mut MetalView| {
        view.set_canvas_color(Color::new(0.2, 0.2, 0.2, 1.0));
        view.set_rotate_mode(RotateMode::ROTATE_90_MIRROR);
        view.enable_edge_blur(true);
        view.enable_quality_enhancer(true);
        view.translate_x(4.0);
    };

    let mut gpu = MetalView::new(Arc::clone(&context), 80, 120);
    configure(&mut gpu);
    gpu.try_draw(&frame).unwrap();
    let gpu_snapshot = gpu.try_snapshot().unwrap().unwrap();

    let mut cpu = MetalView::software(ImageContext::default(), 80, 120);
    configure(&mut cpu);
    cpu.try_draw(&frame).unwrap();
    let cpu_snapshot = cpu.snapshot().unwrap();

    assert!(mean_difference(&gpu_snapshot, &cpu_snapshot) < 4.0);
}

#[test]
fn srgb_working_format_reads_back_linear() {
    let Some(context) = gpu_context(ContextOptions {
        working_pixel_format: WorkingPixelFormat::Rgba8UnormSrgb,
        ..Default::default()
    }) else {
        return;
    };
    let gray = PixelBuffer::from_packed(2, 2, PixelFormat::Rgba8, &[128; 16]).unwrap();

    let mut view = MetalView::new(Arc::clone(&context), 8, 8);
    view.set_display_mode(DisplayMode::ScaleFull);
    view.try_draw(&gray).unwrap();
    let snapshot = view.try_snapshot().unwrap().unwrap();
    for px in snapshot.pixels() {
        assert_eq!(px.0[3], 255);
        for c in &px.0[..3] {
            assert!((*c as i32 - 128).abs() <= 2, "{:?}", px);
        }
    }

    let frame = PixelBuffer::test_pattern(96, 48);
    let configure = |view: &mut MetalView| {
        view.set_canvas_color(Color::new(0.2, 0.2, 0.2, 1.0));
        view.set_rotate_mode(RotateMode::ROTATE_180);
        view.enable_edge_blur(true);
    };
    let mut gpu = MetalView::new(Arc::clone(&context), 120, 80);
    configure(&mut gpu);
    gpu.try_draw(&frame).unwrap();

    let mut cpu = MetalView::software(ImageContext::default(), 120, 80);
    configure(&mut cpu);
    cpu.try_draw(&frame).unwrap();

    let (gpu_snapshot, cpu_snapshot) = (gpu.snapshot().unwrap(), cpu.snapshot().unwrap());
    assert!(mean_difference(&gpu_snapshot, &cpu_snapshot) < 4.0);
}

#[test]
fn gpu_draw_records_presentation_state() {
    let Some(context) = gpu_context(ContextOptions::default()) else {
        return;
    };
    let mut view = MetalView::new(Arc::clone(&context), 64, 64);
    view.set_rotate_mode(RotateMode::ROTATE_270);
    view.translate_y(-3.0);
    view.enable_alpha(true);
    view.set_display_mode(DisplayMode::ScaleOut);
    view.draw_pixel_buffer(&PixelBuffer::test_pattern(40, 20));

    let state = context.presentation();
    assert_eq!(state.rotate_mode, RotateMode::ROTATE_270);
    assert_eq!((state.video_width, state.video_height), (40, 20));
    assert_eq!(state.view_size, Size::new(64.0, 64.0));
    assert_eq!(state.view_offset_y, -3.0);
    assert!(state.blend_enable);

    // BGRA working format reads back as RGBA
    let snapshot = view.snapshot().unwrap();
    assert_eq!(snapshot.dimensions(), (64, 64));
}

#[test]
fn presentation_setters_update_state() {
    let Some(context) = gpu_context(ContextOptions::default()) else {
        return;
    };
    context.set_rotate_mode(RotateMode::MIRROR);
    context.set_video_size(1920, 1080);
    context.set_view_size(Size::new(640.0, 360.0));
    context.set_view_offset(5.0, 6.0);
    context.set_blend_enable(true);

    let state = context.presentation();
    assert_eq!(state.rotate_mode, RotateMode::MIRROR);
    assert_eq!((state.video_width, state.video_height), (1920, 1080));
    assert_eq!((state.view_offset_x, state.view_offset_y), (5.0, 6.0));
    assert!(state.blend_enable);

    let bounds = state.placement(DisplayMode::ScaleIn).bounds();
    assert!((bounds.width - 640.0).abs() < 1e-3);
}
