use std::collections::HashMap;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};

use crate::error::RendererError;
use crate::vertex::{CommandVertex, ImageLoadVertex, OutputVertex, SemiTransparencyMode, Topology, VertexLayout};

use super::programs::{self, ProgramSource, FRAGMENT_ENTRY, VERTEX_ENTRY};
use super::stores::{NATIVE_FORMAT, ORDER_FORMAT, TARGET_FORMAT};

// ── uniforms ─────────────────────────────────────────────────────────────

/// Command program state; `pass_kind` 0 = all, 1 = non-semi, 2 = semi only.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
pub(super) struct DrawUniform {
    pub offset: [i32; 2],
    pub scale: u32,
    pub pass_kind: u32,
    pub color_depth_16: u32,
    pub scale_dither: u32,
    pub _pad: [u32; 2],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
pub(super) struct LoadUniform {
    pub depth: f32,
    pub scale: u32,
    pub _pad: [u32; 2],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
pub(super) struct SyncUniform {
    pub scale: u32,
    pub _pad: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
pub(super) struct OutputUniform {
    pub origin: [u32; 2],
    pub scale: u32,
    pub depth_24bpp: u32,
}

/// Depth value stored for an order index: later orders are nearer.
#[inline]
pub(super) fn order_depth(order: i16) -> f32 {
    1.0 - (order as f32 + 1.0) / 32768.0
}

// ── blend states ─────────────────────────────────────────────────────────

/// Fixed-function blend for a semi-transparency mode. Alpha carries the
/// mask bit and is replaced.
pub(super) fn blend_state(mode: SemiTransparencyMode) -> wgpu::BlendState {
    use wgpu::{BlendFactor as F, BlendOperation as Op};

    let (src_factor, dst_factor, operation) = match mode {
        SemiTransparencyMode::Average => (F::Constant, F::Constant, Op::Add),
        SemiTransparencyMode::Add => (F::One, F::One, Op::Add),
        SemiTransparencyMode::SubtractSource => (F::One, F::One, Op::ReverseSubtract),
        SemiTransparencyMode::AddQuarterSource => (F::Constant, F::One, Op::Add),
    };
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor,
            dst_factor,
            operation,
        },
        alpha: wgpu::BlendComponent::REPLACE,
    }
}

/// Blend constant the mode's factors refer to.
pub(super) fn blend_constant(mode: SemiTransparencyMode) -> Option<wgpu::Color> {
    let c = match mode {
        SemiTransparencyMode::Average => 0.5,
        SemiTransparencyMode::AddQuarterSource => 0.25,
        _ => return None,
    };
    Some(wgpu::Color { r: c, g: c, b: c, a: 1.0 })
}

// ── layouts ──────────────────────────────────────────────────────────────

fn uniform_entry(binding: u32, size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(size as u64),
        },
        count: None,
    }
}

fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

const UINT_TEXTURE: wgpu::TextureSampleType = wgpu::TextureSampleType::Uint;
const FLOAT_TEXTURE: wgpu::TextureSampleType = wgpu::TextureSampleType::Float { filterable: false };

/// Compiled module plus its bind group and pipeline layouts.
pub(super) struct Program {
    pub source: ProgramSource,
    pub bind_group_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    module: wgpu::ShaderModule,
}

impl Program {
    fn new(
        device: &wgpu::Device,
        source: ProgramSource,
        buffers: &[wgpu::VertexBufferLayout<'_>],
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<Self, RendererError> {
        let module = programs::compile(device, &source, buffers)?;
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(source.name),
            entries,
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(source.name),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });
        Ok(Self {
            source,
            bind_group_layout,
            layout,
            module,
        })
    }

    fn pipeline(&self, device: &wgpu::Device, desc: PipelineDesc<'_>) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.source.name),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: &self.module,
                entry_point: Some(VERTEX_ENTRY),
                compilation_options: Default::default(),
                buffers: desc.buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.module,
                entry_point: Some(FRAGMENT_ENTRY),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.format,
                    blend: desc.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: desc.topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: desc.polygon_mode,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: desc.depth_compare.map(|depth_compare| wgpu::DepthStencilState {
                format: ORDER_FORMAT,
                depth_write_enabled: true,
                depth_compare,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }
}

struct PipelineDesc<'a> {
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    topology: wgpu::PrimitiveTopology,
    polygon_mode: wgpu::PolygonMode,
    depth_compare: Option<wgpu::CompareFunction>,
}

impl Default for PipelineDesc<'_> {
    fn default() -> Self {
        Self {
            buffers: &[],
            format: TARGET_FORMAT,
            blend: None,
            topology: wgpu::PrimitiveTopology::TriangleList,
            polygon_mode: wgpu::PolygonMode::Fill,
            depth_compare: None,
        }
    }
}

/// Command pipeline variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(super) struct CommandKey {
    pub topology: Topology,
    /// `None` writes fragments unblended.
    pub blend: Option<SemiTransparencyMode>,
    pub wireframe: bool,
}

/// All programs and their pipelines.
///
/// Command pipelines are created on first use per [`CommandKey`]; the
/// other programs have a single pipeline built up front.
pub(super) struct Pipelines {
    pub command: Program,
    command_cache: HashMap<CommandKey, wgpu::RenderPipeline>,
    pub image_load: Program,
    pub image_load_pipeline: wgpu::RenderPipeline,
    pub downsample: Program,
    pub downsample_pipeline: wgpu::RenderPipeline,
    pub output: Program,
    pub output_pipeline: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(device: &wgpu::Device) -> Result<Self, RendererError> {
        let command = Program::new(
            device,
            programs::COMMAND,
            &[CommandVertex::layout()],
            &[
                uniform_entry(0, std::mem::size_of::<DrawUniform>()),
                texture_entry(1, UINT_TEXTURE),
            ],
        )?;

        let image_load = Program::new(
            device,
            programs::IMAGE_LOAD,
            &[ImageLoadVertex::layout()],
            &[
                uniform_entry(0, std::mem::size_of::<LoadUniform>()),
                texture_entry(1, UINT_TEXTURE),
            ],
        )?;
        let image_load_pipeline = image_load.pipeline(
            device,
            PipelineDesc {
                buffers: &[ImageLoadVertex::layout()],
                depth_compare: Some(wgpu::CompareFunction::Always),
                ..Default::default()
            },
        );

        let downsample = Program::new(
            device,
            programs::DOWNSAMPLE,
            &[],
            &[
                uniform_entry(0, std::mem::size_of::<SyncUniform>()),
                texture_entry(1, FLOAT_TEXTURE),
            ],
        )?;
        let downsample_pipeline = downsample.pipeline(
            device,
            PipelineDesc {
                format: NATIVE_FORMAT,
                ..Default::default()
            },
        );

        let output = Program::new(
            device,
            programs::OUTPUT,
            &[OutputVertex::layout()],
            &[
                uniform_entry(0, std::mem::size_of::<OutputUniform>()),
                texture_entry(1, FLOAT_TEXTURE),
                texture_entry(2, UINT_TEXTURE),
            ],
        )?;
        let output_pipeline = output.pipeline(
            device,
            PipelineDesc {
                buffers: &[OutputVertex::layout()],
                ..Default::default()
            },
        );

        Ok(Self {
            command,
            command_cache: HashMap::new(),
            image_load,
            image_load_pipeline,
            downsample,
            downsample_pipeline,
            output,
            output_pipeline,
        })
    }

    /// Command pipeline for `key`, created on first use.
    pub fn command_pipeline(&mut self, device: &wgpu::Device, key: CommandKey) -> &wgpu::RenderPipeline {
        let program = &self.command;
        self.command_cache.entry(key).or_insert_with(|| {
            log::debug!("creating command pipeline {key:?}");
            program.pipeline(
                device,
                PipelineDesc {
                    buffers: &[CommandVertex::layout()],
                    blend: key.blend.map(blend_state),
                    topology: match key.topology {
                        Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
                        Topology::Lines => wgpu::PrimitiveTopology::LineList,
                    },
                    polygon_mode: if key.wireframe {
                        wgpu::PolygonMode::Line
                    } else {
                        wgpu::PolygonMode::Fill
                    },
                    depth_compare: Some(wgpu::CompareFunction::LessEqual),
                    ..Default::default()
                },
            )
        })
    }
}
