//! Render pipelines: quad blit and full-screen filters.

use bytemuck::{Pod, Zeroable};
use metaltool_core::{Placement, Result, Size};
use wgpu::util::DeviceExt;

use crate::library::ShaderLibrary;
use crate::texture::GpuTexture;

/// Per-draw quad uniform: NDC position in xy, texture coordinate in zw.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct QuadUniform {
    pub corners: [[f32; 4]; 4],
}

impl QuadUniform {
    pub fn from_placement(placement: &Placement, view: Size) -> Self {
        let ndc = placement.ndc_corners(view);
        let mut corners = [[0.0; 4]; 4];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = [ndc[i].x, ndc[i].y, placement.uvs[i].x, placement.uvs[i].y];
        }
        Self { corners }
    }
}

/// Uniform shared by the filter passes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FilterUniform {
    pub direction: [i32; 2],
    pub radius: i32,
    pub sigma: f32,
    pub amount: f32,
    pub _pad: [f32; 3],
}

impl FilterUniform {
    pub fn blur(direction: [i32; 2], sigma: f32, radius: u32) -> Self {
        Self {
            direction,
            radius: radius as i32,
            sigma,
            amount: 0.0,
            _pad: [0.0; 3],
        }
    }

    pub fn sharpen(amount: f32) -> Self {
        Self {
            direction: [0, 0],
            radius: 0,
            sigma: 0.0,
            amount,
            _pad: [0.0; 3],
        }
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Draws a textured quad with premultiplied-alpha blending.
pub struct BlitPipeline {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    target_format: wgpu::TextureFormat,
}

impl BlitPipeline {
    pub fn new(
        device: &wgpu::Device,
        library: &ShaderLibrary,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let shader = library.require("blit")?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit.layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit.pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("blit.pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("blit.sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            pipeline,
            layout,
            sampler,
            target_format,
        })
    }

    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    /// Bind group for drawing `source` at `placement` in a target of `view` size.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        source: &GpuTexture,
        placement: &Placement,
        view: Size,
    ) -> wgpu::BindGroup {
        let uniform = QuadUniform::from_placement(placement, view);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("blit.quad"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit.bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    /// Draw one quad into an open render pass.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, bind_group: &wgpu::BindGroup) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..4, 0..1);
    }
}

/// Full-screen blur and sharpen passes into `Rgba8Unorm` intermediates.
pub struct FilterPipeline {
    blur: wgpu::RenderPipeline,
    sharpen: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
}

impl FilterPipeline {
    /// Format of every filter output.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(device: &wgpu::Device, library: &ShaderLibrary) -> Result<Self> {
        let shader = library.require("filter")?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("filter.layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT), texture_entry(1)],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("filter.pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let build = |label: &str, entry_point: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some("vs_fullscreen"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some(entry_point),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: Self::FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        Ok(Self {
            blur: build("filter.blur", "fs_blur"),
            sharpen: build("filter.sharpen", "fs_sharpen"),
            layout,
        })
    }

    /// One direction of a separable gaussian blur, `source` into `target`.
    pub fn blur_pass(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        source: &GpuTexture,
        target: &GpuTexture,
        params: FilterUniform,
    ) {
        self.run(device, encoder, &self.blur, source, target, params, "filter.blur_pass");
    }

    /// Unsharp-mask sharpen, `source` into `target`.
    pub fn sharpen_pass(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        source: &GpuTexture,
        target: &GpuTexture,
        amount: f32,
    ) {
        self.run(
            device,
            encoder,
            &self.sharpen,
            source,
            target,
            FilterUniform::sharpen(amount),
            "filter.sharpen_pass",
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::RenderPipeline,
        source: &GpuTexture,
        target: &GpuTexture,
        params: FilterUniform,
        label: &str,
    ) {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("filter.params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("filter.bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
