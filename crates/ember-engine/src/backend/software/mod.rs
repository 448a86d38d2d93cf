//! CPU reference backend.
//!
//! Implements the same programs as the wgpu backend on plain vectors, one
//! fragment at a time. Deterministic, so the renderer's batching rules can
//! be checked for bit-exact output.

mod present;
mod raster;
mod shade;
mod stores;

use crate::backend::{Backend, CommandPass, CommandPassKind, Frame, ImageLoadPass, OutputPass};
use crate::batch::DrawSink;
use crate::config::MAX_UPSCALING;
use crate::coords::{FrontendResolution, VramRect};
use crate::error::{BackendError, RendererError};
use crate::vertex::{CommandVertex, ImageLoadVertex, OutputVertex, SemiTransparencyMode, Topology};

use present::DisplayRect;
use raster::PixelClip;
use stores::{pack, unpack, TexelStores};

/// Default scale ceiling: 8x is 8192 × 4096 pixels.
pub const SOFTWARE_MAX_UPSCALING: u32 = 8;

/// Which fragments of a primitive a pass writes.
#[derive(Debug, Copy, Clone)]
enum FragmentFilter {
    All,
    OpaqueOnly,
    SemiOnly(SemiTransparencyMode),
}

/// Software implementation of [`Backend`].
#[derive(Debug)]
pub struct SoftwareBackend {
    stores: TexelStores,
    frontend: Frame,
    max_upscaling: u32,
    draw_calls: u64,
}

impl SoftwareBackend {
    /// Allocates the native store and a 1x render target.
    pub fn new() -> Result<Self, RendererError> {
        Ok(Self {
            stores: TexelStores::new(1)?,
            frontend: Frame::default(),
            max_upscaling: SOFTWARE_MAX_UPSCALING,
            draw_calls: 0,
        })
    }

    /// Overrides the scale ceiling (clamped to `1..=MAX_UPSCALING`).
    pub fn with_max_upscaling(mut self, max: u32) -> Self {
        self.max_upscaling = max.clamp(1, MAX_UPSCALING);
        self
    }

    /// Number of draw calls issued since construction.
    #[inline]
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    fn draw_primitive(&mut self, prim: &[CommandVertex], pass: &CommandPass, filter: FragmentFilter) {
        let TexelStores {
            native,
            target,
            order,
            scale,
        } = &mut self.stores;
        let scale = *scale;
        let width = VramRect::FULL.width() as usize * scale as usize;
        let state = pass.state;
        let flat = prim[0];
        let s = scale as i64;
        let clip = PixelClip {
            left: state.scissor.left as i64 * s,
            top: state.scissor.top as i64 * s,
            right: state.scissor.right as i64 * s,
            bottom: state.scissor.bottom as i64 * s,
        };

        let mut write = |x: u32, y: u32, interp: raster::Interp| {
            let Some(frag) = shade::shade(native, &flat, interp, &state, scale, x, y) else {
                return;
            };
            let blend = match filter {
                FragmentFilter::All => None,
                FragmentFilter::OpaqueOnly if frag.semi => return,
                FragmentFilter::OpaqueOnly => None,
                FragmentFilter::SemiOnly(_) if !frag.semi => return,
                FragmentFilter::SemiOnly(mode) => Some(mode),
            };
            let i = y as usize * width + x as usize;
            if (flat.order() as i32) < order[i] {
                return;
            }
            let rgb = match blend {
                Some(mode) => mode.blend(frag.rgb, unpack(target[i]).0),
                None => frag.rgb,
            };
            target[i] = pack(rgb, frag.mask);
            order[i] = flat.order() as i32;
        };

        match (pass.topology, prim) {
            (Topology::Triangles, [a, b, c]) if pass.wireframe => {
                raster::line(a, b, state.offset, scale, clip, &mut write);
                raster::line(b, c, state.offset, scale, clip, &mut write);
                raster::line(c, a, state.offset, scale, clip, &mut write);
            }
            (Topology::Triangles, [a, b, c]) => raster::triangle([a, b, c], state.offset, scale, clip, write),
            (Topology::Lines, [a, b]) => raster::line(a, b, state.offset, scale, clip, write),
            _ => log::debug!("software: skipped incomplete {:?} primitive", pass.topology),
        }
    }
}

impl DrawSink<CommandVertex> for SoftwareBackend {
    type Pass = CommandPass;

    fn draw(&mut self, vertices: &[CommandVertex], pass: &CommandPass) -> Result<(), BackendError> {
        let per = pass.topology.vertices_per_primitive();
        match pass.kind {
            CommandPassKind::Opaque => {
                for prim in vertices.chunks_exact(per) {
                    self.draw_primitive(prim, pass, FragmentFilter::All);
                }
                self.draw_calls += 1;
            }
            CommandPassKind::SemiTransparent(mode) => {
                for prim in vertices.chunks_exact(per) {
                    self.draw_primitive(prim, pass, FragmentFilter::OpaqueOnly);
                }
                for prim in vertices.chunks_exact(per) {
                    self.draw_primitive(prim, pass, FragmentFilter::SemiOnly(mode));
                }
                self.draw_calls += 2;
            }
        }
        Ok(())
    }
}

impl DrawSink<ImageLoadVertex> for SoftwareBackend {
    type Pass = ImageLoadPass;

    fn draw(&mut self, vertices: &[ImageLoadVertex], pass: &ImageLoadPass) -> Result<(), BackendError> {
        for quad in vertices.chunks_exact(6) {
            if let Some(rect) = ImageLoadVertex::bounds(quad) {
                self.stores.load_rect(rect, pass.order);
            }
        }
        self.draw_calls += 1;
        Ok(())
    }
}

impl DrawSink<OutputVertex> for SoftwareBackend {
    type Pass = OutputPass;

    fn draw(&mut self, vertices: &[OutputVertex], pass: &OutputPass) -> Result<(), BackendError> {
        let Some([left, top, right, bottom]) = OutputVertex::fb_bounds(vertices) else {
            return Ok(());
        };
        let rect = DisplayRect {
            left: left as u32,
            top: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        };
        if self.frontend.resolution() != pass.resolution {
            self.bind_frontend(pass.resolution)?;
        }
        if pass.depth_24bpp {
            present::blit_24bpp(&self.stores, rect, &mut self.frontend);
        } else {
            present::blit_15bpp(&self.stores, rect, &mut self.frontend);
        }
        self.draw_calls += 1;
        Ok(())
    }
}

impl Backend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn upscaling(&self) -> u32 {
        self.stores.scale
    }

    fn max_upscaling(&self) -> u32 {
        self.max_upscaling
    }

    fn supports_wireframe(&self) -> bool {
        true
    }

    fn reallocate(&mut self, upscaling: u32) -> Result<(), RendererError> {
        if upscaling == 0 || upscaling > self.max_upscaling {
            return Err(RendererError::UnsupportedCapability(format!(
                "{upscaling}x upscaling (software maximum {}x)",
                self.max_upscaling
            )));
        }
        self.stores.reallocate(upscaling)
    }

    fn clear_order(&mut self) -> Result<(), BackendError> {
        self.stores.clear_order();
        Ok(())
    }

    fn write_native(&mut self, rect: VramRect, texels: &[u16]) -> Result<(), BackendError> {
        if texels.len() != rect.width() as usize * rect.height() as usize {
            return Err(BackendError::Device(format!(
                "{} texels for a {}x{} write",
                texels.len(),
                rect.width(),
                rect.height()
            )));
        }
        self.stores.write_native(rect, texels);
        Ok(())
    }

    fn read_native(&mut self, rect: VramRect) -> Result<Vec<u16>, BackendError> {
        Ok(self.stores.read_native(rect))
    }

    fn sync_native(&mut self, rect: VramRect) -> Result<(), BackendError> {
        self.stores.sync_native(rect);
        Ok(())
    }

    fn bind_frontend(&mut self, resolution: FrontendResolution) -> Result<(), BackendError> {
        self.frontend = Frame::new(resolution);
        Ok(())
    }

    fn frontend_frame(&mut self) -> Result<Frame, BackendError> {
        Ok(self.frontend.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DrawState;
    use crate::config::ColorDepth;
    use crate::coords::{Color, Dimensions, TopLeft};

    fn pass(kind: CommandPassKind, depth: ColorDepth) -> CommandPass {
        CommandPass {
            topology: Topology::Triangles,
            kind,
            wireframe: false,
            state: DrawState {
                scissor: VramRect::FULL,
                offset: (0, 0),
                color_depth: depth,
                scale_dither: false,
            },
        }
    }

    fn quad(x: i16, y: i16, w: i16, h: i16, color: Color, order: i16, semi: bool) -> [CommandVertex; 6] {
        let mut v = [
            CommandVertex::new(x, y, color),
            CommandVertex::new(x + w, y, color),
            CommandVertex::new(x, y + h, color),
            CommandVertex::new(x + w, y, color),
            CommandVertex::new(x + w, y + h, color),
            CommandVertex::new(x, y + h, color),
        ];
        for vertex in &mut v {
            vertex.stamp(order, semi);
        }
        v
    }

    fn texel_at(backend: &mut SoftwareBackend, x: u16, y: u16) -> u16 {
        let rect = VramRect::new(TopLeft::new(x, y), Dimensions::new(1, 1)).unwrap();
        backend.sync_native(rect).unwrap();
        backend.read_native(rect).unwrap()[0]
    }

    #[test]
    fn later_order_wins_regardless_of_draw_order() {
        let mut backend = SoftwareBackend::new().unwrap();
        let p = pass(CommandPassKind::Opaque, ColorDepth::Bits32);
        backend.draw(&quad(0, 0, 4, 4, Color::new(255, 0, 0), 2, false), &p).unwrap();
        backend.draw(&quad(0, 0, 4, 4, Color::new(0, 0, 255), 1, false), &p).unwrap();
        assert_eq!(texel_at(&mut backend, 1, 1), 0x001f);
    }

    #[test]
    fn semi_pass_blends_with_destination() {
        let mut backend = SoftwareBackend::new().unwrap();
        let opaque = pass(CommandPassKind::Opaque, ColorDepth::Bits32);
        backend.draw(&quad(0, 0, 4, 4, Color::new(128, 128, 128), 0, false), &opaque).unwrap();
        let semi = pass(CommandPassKind::SemiTransparent(SemiTransparencyMode::Add), ColorDepth::Bits32);
        backend.draw(&quad(0, 0, 4, 4, Color::new(64, 0, 255), 1, true), &semi).unwrap();
        let rgb = unpack(backend.stores.target[1024 + 1]).0;
        assert_eq!(rgb, [192, 128, 255]);
        assert_eq!(backend.draw_calls(), 3);
    }

    #[test]
    fn opaque_texels_of_semi_primitive_are_not_blended() {
        let mut backend = SoftwareBackend::new().unwrap();
        let tex = VramRect::new(TopLeft::new(512, 0), Dimensions::new(2, 1)).unwrap();
        backend.write_native(tex, &[0x801f, 0x001f]).unwrap();
        let opaque = pass(CommandPassKind::Opaque, ColorDepth::Bits32);
        backend.draw(&quad(0, 0, 2, 1, Color::new(0, 0, 248), 0, false), &opaque).unwrap();

        let mut prim = quad(0, 0, 2, 1, Color::white(), 1, true);
        for (i, v) in prim.iter_mut().enumerate() {
            let u = [0, 2, 0, 2, 2, 0][i];
            *v = v.textured(
                [u, 0],
                TopLeft::new(512, 0),
                TopLeft::origin(),
                crate::vertex::TextureDepth::T16Bpp,
                crate::vertex::TextureBlendMode::Raw,
            );
        }
        let semi = pass(CommandPassKind::SemiTransparent(SemiTransparencyMode::Add), ColorDepth::Bits32);
        backend.draw(&prim, &semi).unwrap();

        // texel 0: mask set, added onto blue; texel 1: opaque red
        assert_eq!(unpack(backend.stores.target[0]), ([255, 0, 248], true));
        assert_eq!(unpack(backend.stores.target[1]), ([255, 0, 0], false));
    }

    #[test]
    fn wireframe_triangle_draws_edges_only() {
        let mut backend = SoftwareBackend::new().unwrap();
        let mut p = pass(CommandPassKind::Opaque, ColorDepth::Bits32);
        p.wireframe = true;
        let tri = quad(0, 0, 8, 8, Color::new(255, 0, 0), 0, false);
        backend.draw(&tri[..3], &p).unwrap();

        for (x, y) in [(0, 0), (4, 0), (8, 0), (0, 4), (0, 8), (4, 4)] {
            assert_eq!(texel_at(&mut backend, x, y), 0x001f, "edge texel ({x}, {y})");
        }
        assert_eq!(texel_at(&mut backend, 2, 2), 0);
        assert_eq!(texel_at(&mut backend, 1, 5), 0);

        p.wireframe = false;
        backend.draw(&tri[..3], &p).unwrap();
        assert_eq!(texel_at(&mut backend, 2, 2), 0x001f);
    }

    #[test]
    fn reallocate_rejects_scale_above_ceiling() {
        let mut backend = SoftwareBackend::new().unwrap().with_max_upscaling(2);
        assert!(matches!(
            backend.reallocate(4),
            Err(RendererError::UnsupportedCapability(_))
        ));
        assert_eq!(backend.upscaling(), 1);
        backend.reallocate(2).unwrap();
        assert_eq!(backend.upscaling(), 2);
    }
}
