//! wgpu implementation of [`Backend`].
//!
//! Resources:
//! - native store: `R16Uint`, sampled by every draw and written by the
//!   downsample program and by host uploads
//! - render target: `Rgba8Unorm` color (alpha = mask bit) plus a
//!   `Depth32Float` order buffer
//! - frontend framebuffer: `Rgba8Unorm`, read back after each frame
//!
//! Every draw records into a fresh encoder and submits immediately, so the
//! queue order is the call order.

mod init;
mod pipelines;
mod programs;
mod readback;
mod stores;

pub use init::GpuInit;

use bytemuck::Pod;

use crate::backend::frame::pack_xrgb;
use crate::backend::{Backend, CommandPass, CommandPassKind, Frame, ImageLoadPass, OutputPass};
use crate::batch::DrawSink;
use crate::config::{ColorDepth, MAX_UPSCALING};
use crate::coords::{FrontendResolution, VramRect};
use crate::error::{BackendError, RendererError};
use crate::vertex::{CommandVertex, ImageLoadVertex, OutputVertex, SemiTransparencyMode, Topology};

use pipelines::{
    blend_constant, order_depth, CommandKey, DrawUniform, LoadUniform, OutputUniform, Pipelines, SyncUniform,
};
use stores::{FrontendTarget, RenderTarget, TexelStorePair};

/// Smallest vertex buffer allocation, in bytes.
const MIN_STREAM_BYTES: u64 = 1024;

/// Growable vertex buffer for one program.
struct VertexStream {
    label: &'static str,
    buffer: Option<wgpu::Buffer>,
}

impl VertexStream {
    fn new(label: &'static str) -> Self {
        Self { label, buffer: None }
    }

    /// Uploads `vertices`, growing the buffer to the next power of two when
    /// they do not fit.
    fn upload<V: Pod>(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, vertices: &[V]) -> &wgpu::Buffer {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let needed = bytes.len() as u64;
        let buffer = match self.buffer.take() {
            Some(buffer) if buffer.size() >= needed => buffer,
            _ => {
                let size = needed.next_power_of_two().max(MIN_STREAM_BYTES);
                log::debug!("{}: vertex buffer grown to {size} bytes", self.label);
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(self.label),
                    size,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            }
        };
        queue.write_buffer(&buffer, 0, bytes);
        self.buffer.insert(buffer)
    }
}

fn uniform_buffer<U: Pod>(device: &wgpu::Device, label: &'static str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<U>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// One uniform buffer per program, rewritten before each submit.
struct Uniforms {
    draw: wgpu::Buffer,
    load: wgpu::Buffer,
    sync: wgpu::Buffer,
    output: wgpu::Buffer,
}

impl Uniforms {
    fn new(device: &wgpu::Device) -> Self {
        Self {
            draw: uniform_buffer::<DrawUniform>(device, "ember draw uniform"),
            load: uniform_buffer::<LoadUniform>(device, "ember load uniform"),
            sync: uniform_buffer::<SyncUniform>(device, "ember sync uniform"),
            output: uniform_buffer::<OutputUniform>(device, "ember output uniform"),
        }
    }
}

/// Bind groups over the current texel stores. Rebuilt when the render
/// target is reallocated.
struct BindGroups {
    command: wgpu::BindGroup,
    image_load: wgpu::BindGroup,
    downsample: wgpu::BindGroup,
    output: wgpu::BindGroup,
}

impl BindGroups {
    fn new(device: &wgpu::Device, pipelines: &Pipelines, uniforms: &Uniforms, stores: &TexelStorePair) -> Self {
        let group = |label: &'static str, layout: &wgpu::BindGroupLayout, uniform: &wgpu::Buffer, views: &[&wgpu::TextureView]| {
            let mut entries = vec![wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }];
            for (i, view) in views.iter().copied().enumerate() {
                entries.push(wgpu::BindGroupEntry {
                    binding: i as u32 + 1,
                    resource: wgpu::BindingResource::TextureView(view),
                });
            }
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &entries,
            })
        };

        let native = &stores.native_view;
        let target = &stores.target.color_view;
        Self {
            command: group("ember command bg", &pipelines.command.bind_group_layout, &uniforms.draw, &[native]),
            image_load: group(
                "ember image-load bg",
                &pipelines.image_load.bind_group_layout,
                &uniforms.load,
                &[native],
            ),
            downsample: group(
                "ember downsample bg",
                &pipelines.downsample.bind_group_layout,
                &uniforms.sync,
                &[target],
            ),
            output: group(
                "ember output bg",
                &pipelines.output.bind_group_layout,
                &uniforms.output,
                &[target, native],
            ),
        }
    }
}

/// GPU backend on a headless wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: wgpu::AdapterInfo,
    stores: TexelStorePair,
    pipelines: Pipelines,
    uniforms: Uniforms,
    bind_groups: BindGroups,
    command_stream: VertexStream,
    image_load_stream: VertexStream,
    output_stream: VertexStream,
    frontend: Option<FrontendTarget>,
    wireframe: bool,
    max_upscaling: u32,
    draw_calls: u64,
}

impl WgpuBackend {
    /// Requests an adapter and device, then builds every program.
    pub fn new(init: GpuInit) -> Result<Self, RendererError> {
        let headless = init::request_headless_device(&init)?;
        Self::from_device(headless.device, headless.queue, headless.info)
    }

    /// Builds the backend on an existing device.
    pub fn from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        info: wgpu::AdapterInfo,
    ) -> Result<Self, RendererError> {
        let pipelines = Pipelines::new(&device)?;
        let stores = TexelStorePair::new(&device, 1)?;
        let uniforms = Uniforms::new(&device);
        let bind_groups = BindGroups::new(&device, &pipelines, &uniforms, &stores);
        let wireframe = device.features().contains(wgpu::Features::POLYGON_MODE_LINE);
        let max_upscaling = stores::max_scale(&device).clamp(1, MAX_UPSCALING);
        log::info!(
            "wgpu backend ready on {} (max {max_upscaling}x, wireframe: {wireframe})",
            info.name
        );

        let mut backend = Self {
            device,
            queue,
            info,
            stores,
            pipelines,
            uniforms,
            bind_groups,
            command_stream: VertexStream::new("ember command vertices"),
            image_load_stream: VertexStream::new("ember image-load vertices"),
            output_stream: VertexStream::new("ember output vertices"),
            frontend: None,
            wireframe,
            max_upscaling,
            draw_calls: 0,
        };
        backend
            .clear_order()
            .map_err(|e| RendererError::Device(e.to_string()))?;
        Ok(backend)
    }

    #[inline]
    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.info
    }

    /// Number of render passes submitted since construction.
    #[inline]
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    fn submit(&mut self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
        self.draw_calls += 1;
    }

    fn encoder(&self, label: &'static str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    /// One submit of the staged command vertices.
    ///
    /// `pass_kind` selects which fragments survive: 0 all, 1 non-semi,
    /// 2 semi-transparent only.
    fn submit_command(
        &mut self,
        count: u32,
        pass: &CommandPass,
        pass_kind: u32,
        blend: Option<SemiTransparencyMode>,
    ) -> Result<(), BackendError> {
        let scale = self.stores.scale();
        let state = pass.state;
        let uniform = DrawUniform {
            offset: [state.offset.0 as i32, state.offset.1 as i32],
            scale,
            pass_kind,
            color_depth_16: (state.color_depth == ColorDepth::Bits16) as u32,
            scale_dither: state.scale_dither as u32,
            _pad: [0; 2],
        };
        self.queue
            .write_buffer(&self.uniforms.draw, 0, bytemuck::bytes_of(&uniform));

        let key = CommandKey {
            topology: pass.topology,
            blend,
            wireframe: pass.wireframe && self.wireframe && pass.topology == Topology::Triangles,
        };
        let mut encoder = self.encoder("ember command encoder");
        {
            let pipeline = self.pipelines.command_pipeline(&self.device, key);
            let Some(vbo) = self.command_stream.buffer.as_ref() else {
                return Err(BackendError::Device("command vertices were not uploaded".into()));
            };

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ember command pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.stores.target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.stores.target.order_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &self.bind_groups.command, &[]);
            rpass.set_vertex_buffer(0, vbo.slice(..));
            if let Some(constant) = blend.and_then(blend_constant) {
                rpass.set_blend_constant(constant);
            }
            let scissor = state.scissor;
            rpass.set_scissor_rect(
                scissor.left as u32 * scale,
                scissor.top as u32 * scale,
                scissor.width() as u32 * scale,
                scissor.height() as u32 * scale,
            );
            rpass.draw(0..count, 0..1);
        }
        self.submit(encoder);
        Ok(())
    }

    fn rebind(&mut self) {
        self.bind_groups = BindGroups::new(&self.device, &self.pipelines, &self.uniforms, &self.stores);
    }
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.info.name)
            .field("upscaling", &self.stores.scale())
            .field("max_upscaling", &self.max_upscaling)
            .field("wireframe", &self.wireframe)
            .finish_non_exhaustive()
    }
}

impl DrawSink<CommandVertex> for WgpuBackend {
    type Pass = CommandPass;

    fn draw(&mut self, vertices: &[CommandVertex], pass: &CommandPass) -> Result<(), BackendError> {
        let per = pass.topology.vertices_per_primitive();
        let count = (vertices.len() / per * per) as u32;
        if count == 0 || pass.state.scissor.is_empty() {
            return Ok(());
        }
        self.command_stream
            .upload(&self.device, &self.queue, &vertices[..count as usize]);

        match pass.kind {
            CommandPassKind::Opaque => self.submit_command(count, pass, 0, None),
            CommandPassKind::SemiTransparent(mode) => {
                self.submit_command(count, pass, 1, None)?;
                self.submit_command(count, pass, 2, Some(mode))
            }
        }
    }
}

impl DrawSink<ImageLoadVertex> for WgpuBackend {
    type Pass = ImageLoadPass;

    fn draw(&mut self, vertices: &[ImageLoadVertex], pass: &ImageLoadPass) -> Result<(), BackendError> {
        if vertices.is_empty() {
            return Ok(());
        }
        let uniform = LoadUniform {
            depth: order_depth(pass.order),
            scale: self.stores.scale(),
            _pad: [0; 2],
        };
        self.queue
            .write_buffer(&self.uniforms.load, 0, bytemuck::bytes_of(&uniform));
        let vbo = self.image_load_stream.upload(&self.device, &self.queue, vertices);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("ember image-load encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ember image-load pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.stores.target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.stores.target.order_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            rpass.set_pipeline(&self.pipelines.image_load_pipeline);
            rpass.set_bind_group(0, &self.bind_groups.image_load, &[]);
            rpass.set_vertex_buffer(0, vbo.slice(..));
            rpass.draw(0..vertices.len() as u32, 0..1);
        }
        self.submit(encoder);
        Ok(())
    }
}

impl DrawSink<OutputVertex> for WgpuBackend {
    type Pass = OutputPass;

    fn draw(&mut self, vertices: &[OutputVertex], pass: &OutputPass) -> Result<(), BackendError> {
        let Some([left, top, _, _]) = OutputVertex::fb_bounds(vertices) else {
            return Ok(());
        };
        let stale = self
            .frontend
            .as_ref()
            .is_none_or(|f| FrontendResolution::new(f.width, f.height) != pass.resolution);
        if stale {
            self.bind_frontend(pass.resolution)?;
        }

        let uniform = OutputUniform {
            origin: [left as u32, top as u32],
            scale: self.stores.scale(),
            depth_24bpp: pass.depth_24bpp as u32,
        };
        self.queue
            .write_buffer(&self.uniforms.output, 0, bytemuck::bytes_of(&uniform));
        let vbo = self.output_stream.upload(&self.device, &self.queue, vertices);
        let Some(frontend) = self.frontend.as_ref() else {
            return Err(BackendError::Device("no frontend framebuffer bound".into()));
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("ember output encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ember output pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frontend.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            rpass.set_pipeline(&self.pipelines.output_pipeline);
            rpass.set_bind_group(0, &self.bind_groups.output, &[]);
            rpass.set_vertex_buffer(0, vbo.slice(..));
            rpass.draw(0..vertices.len() as u32, 0..1);
        }
        self.submit(encoder);
        Ok(())
    }
}

impl Backend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn upscaling(&self) -> u32 {
        self.stores.scale()
    }

    fn max_upscaling(&self) -> u32 {
        self.max_upscaling
    }

    fn supports_wireframe(&self) -> bool {
        self.wireframe
    }

    fn reallocate(&mut self, upscaling: u32) -> Result<(), RendererError> {
        if upscaling == 0 || upscaling > self.max_upscaling {
            return Err(RendererError::UnsupportedCapability(format!(
                "{upscaling}x upscaling (device maximum {}x)",
                self.max_upscaling
            )));
        }
        let target = RenderTarget::new(&self.device, upscaling)?;
        self.stores.target = target;
        self.rebind();
        self.clear_order()
            .map_err(|e| RendererError::Device(e.to_string()))
    }

    fn clear_order(&mut self) -> Result<(), BackendError> {
        let mut encoder = self.encoder("ember order clear");
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ember order clear"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.stores.target.order_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        self.submit(encoder);
        Ok(())
    }

    fn write_native(&mut self, rect: VramRect, texels: &[u16]) -> Result<(), BackendError> {
        let (w, h) = (rect.width() as u32, rect.height() as u32);
        if texels.len() != w as usize * h as usize {
            return Err(BackendError::Device(format!(
                "{} texels for a {w}x{h} write",
                texels.len()
            )));
        }
        if texels.is_empty() {
            return Ok(());
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.stores.native,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: rect.left as u32,
                    y: rect.top as u32,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(w * 2),
                rows_per_image: Some(h),
            },
            wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn read_native(&mut self, rect: VramRect) -> Result<Vec<u16>, BackendError> {
        let bytes = readback::read_texture(
            &self.device,
            &self.queue,
            &self.stores.native,
            [rect.left as u32, rect.top as u32],
            [rect.width() as u32, rect.height() as u32],
            2,
        )?;
        Ok(bytes
            .chunks_exact(2)
            .map(|b| u16::from_ne_bytes([b[0], b[1]]))
            .collect())
    }

    fn sync_native(&mut self, rect: VramRect) -> Result<(), BackendError> {
        if rect.is_empty() {
            return Ok(());
        }
        let uniform = SyncUniform {
            scale: self.stores.scale(),
            _pad: [0; 3],
        };
        self.queue
            .write_buffer(&self.uniforms.sync, 0, bytemuck::bytes_of(&uniform));

        let mut encoder = self.encoder("ember downsample encoder");
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ember downsample pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.stores.native_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            rpass.set_pipeline(&self.pipelines.downsample_pipeline);
            rpass.set_bind_group(0, &self.bind_groups.downsample, &[]);
            rpass.set_scissor_rect(
                rect.left as u32,
                rect.top as u32,
                rect.width() as u32,
                rect.height() as u32,
            );
            rpass.draw(0..3, 0..1);
        }
        self.submit(encoder);
        Ok(())
    }

    fn bind_frontend(&mut self, resolution: FrontendResolution) -> Result<(), BackendError> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if resolution.w > limit || resolution.h > limit {
            return Err(BackendError::Device(format!(
                "{}x{} frontend framebuffer exceeds the texture limit {limit}",
                resolution.w, resolution.h
            )));
        }
        self.frontend = Some(FrontendTarget::new(&self.device, resolution.w, resolution.h));
        Ok(())
    }

    fn frontend_frame(&mut self) -> Result<Frame, BackendError> {
        let Some(frontend) = self.frontend.as_ref() else {
            return Ok(Frame::default());
        };
        if frontend.width == 0 || frontend.height == 0 {
            return Ok(Frame::new(FrontendResolution::new(frontend.width, frontend.height)));
        }
        let bytes = readback::read_texture(
            &self.device,
            &self.queue,
            &frontend.texture,
            [0, 0],
            [frontend.width, frontend.height],
            4,
        )?;
        Ok(Frame {
            width: frontend.width,
            height: frontend.height,
            pixels: bytes
                .chunks_exact(4)
                .map(|p| pack_xrgb([p[0], p[1], p[2]]))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Color, Dimensions, TopLeft};
    use crate::backend::DrawState;

    fn backend() -> WgpuBackend {
        WgpuBackend::new(GpuInit::default().with_fallback_adapter(true)).unwrap()
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn native_store_round_trips_through_the_device() {
        let mut backend = backend();
        let rect = VramRect::new(TopLeft::new(3, 5), Dimensions::new(4, 2)).unwrap();
        let texels: Vec<u16> = (0..8).map(|i| 0x8000 | i * 0x421).collect();
        backend.write_native(rect, &texels).unwrap();
        assert_eq!(backend.read_native(rect).unwrap(), texels);
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn drawn_quad_reaches_the_native_store() {
        let mut backend = backend();
        let red = Color::new(248, 0, 0);
        let mut quad = [
            CommandVertex::new(0, 0, red),
            CommandVertex::new(8, 0, red),
            CommandVertex::new(0, 8, red),
            CommandVertex::new(8, 0, red),
            CommandVertex::new(8, 8, red),
            CommandVertex::new(0, 8, red),
        ];
        for v in &mut quad {
            v.stamp(0, false);
        }
        let pass = CommandPass {
            topology: Topology::Triangles,
            kind: CommandPassKind::Opaque,
            wireframe: false,
            state: DrawState {
                scissor: VramRect::FULL,
                offset: (0, 0),
                color_depth: ColorDepth::Bits32,
                scale_dither: false,
            },
        };
        backend.draw(&quad, &pass).unwrap();
        let rect = VramRect::new(TopLeft::new(2, 2), Dimensions::new(1, 1)).unwrap();
        backend.sync_native(rect).unwrap();
        assert_eq!(backend.read_native(rect).unwrap(), vec![0x001f]);
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn reallocate_keeps_previous_target_on_failure() {
        let mut backend = backend();
        let max = backend.max_upscaling();
        assert!(backend.reallocate(max + 1).is_err());
        assert_eq!(backend.upscaling(), 1);
    }
}
