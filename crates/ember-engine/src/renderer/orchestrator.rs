use crate::backend::{Backend, CommandPass, CommandPassKind, DrawState, ImageLoadPass, OutputPass};
use crate::batch::{DrawBuffer, FlushPolicy};
use crate::config::{BatchLimits, DrawConfig, RendererSettings, SettingsProvider};
use crate::coords::{Color, Dimensions, FrontendResolution, TopLeft, VramRect, VRAM_HEIGHT, VRAM_WIDTH};
use crate::error::{BackendError, CommandKind, FrameFault, RendererError, TransferError, UpscalingDowngrade};
use crate::vertex::{CommandVertex, ImageLoadVertex, OutputVertex, SemiTransparencyMode, Topology};

use super::command::DrawCommand;
use super::frame::{DisplayMode, Frame};
use super::ordering::OrderCounter;
use super::regions::DirtyRegions;

/// Largest primitive extent the hardware rasterizes, in native texels.
const MAX_PRIMITIVE_WIDTH: i32 = 1023;
const MAX_PRIMITIVE_HEIGHT: i32 = 511;

/// One output quad, redrawn every frame until the display changes.
const OUTPUT_VERTICES: usize = 6;

#[inline]
fn to_i16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// `start..start + len` inside `0..limit`, or the whole range if it wraps.
#[inline]
fn span(start: u16, len: u16, limit: u16) -> (i32, i32) {
    let end = start as i32 + len as i32;
    if end <= limit as i32 {
        (start as i32, end)
    } else {
        (0, limit as i32)
    }
}

/// Batched draw engine over a [`Backend`].
///
/// Single-threaded: every method runs on the thread that owns the GPU
/// context, and commands take effect in call order.
pub struct Renderer<B: Backend> {
    backend: B,
    settings: Box<dyn SettingsProvider>,
    applied: RendererSettings,
    config: DrawConfig,
    display: DisplayMode,
    pending_display: Option<DisplayMode>,

    command: DrawBuffer<CommandVertex>,
    command_topology: Topology,
    semi: DrawBuffer<CommandVertex>,
    semi_topology: Topology,
    semi_mode: SemiTransparencyMode,
    image_load: DrawBuffer<ImageLoadVertex>,
    output: DrawBuffer<OutputVertex>,
    /// Pass the retained output quad was built for.
    output_pass: Option<OutputPass>,

    order: OrderCounter,
    regions: DirtyRegions,
    faults: Vec<FrameFault>,
    last_downgrade: Option<UpscalingDowngrade>,
}

impl<B: Backend> Renderer<B> {
    /// Builds a renderer with nominal batch capacities.
    ///
    /// Upscaling and color depth come from the settings snapshot, which
    /// overrides the matching `config` fields.
    pub fn new(
        backend: B,
        config: DrawConfig,
        settings: impl SettingsProvider + 'static,
    ) -> Result<Self, RendererError> {
        Self::with_limits(backend, config, settings, BatchLimits::default())
    }

    /// Builds a renderer with explicit batch capacities.
    pub fn with_limits(
        mut backend: B,
        mut config: DrawConfig,
        settings: impl SettingsProvider + 'static,
        limits: BatchLimits,
    ) -> Result<Self, RendererError> {
        let mut applied = settings.settings().sanitized();
        if applied.wireframe && !backend.supports_wireframe() {
            log::warn!("{} backend cannot draw wireframe, disabled", backend.name());
            applied.wireframe = false;
        }
        if config.internal_upscaling != applied.upscaling {
            log::debug!(
                "draw config asks for {}x, settings provider for {}x; using the provider",
                config.internal_upscaling,
                applied.upscaling
            );
        }
        config.internal_upscaling = applied.upscaling;
        config.internal_color_depth = applied.color_depth;

        if backend.upscaling() != applied.upscaling {
            backend.reallocate(applied.upscaling)?;
        }
        backend
            .clear_order()
            .map_err(|e| RendererError::Device(e.to_string()))?;

        let limits = limits.sanitized();
        let display = Self::checked_display(DisplayMode {
            top_left: config.display_top_left,
            resolution: config.display_resolution,
            depth_24bpp: config.display_24bpp,
        });
        config.display_resolution = display.resolution;

        let mut renderer = Self {
            backend,
            settings: Box::new(settings),
            applied,
            config,
            display,
            pending_display: None,
            command: DrawBuffer::new("command", limits.command, FlushPolicy::Discard),
            command_topology: Topology::Triangles,
            semi: DrawBuffer::new("semi-transparent", limits.semi_transparent, FlushPolicy::Discard),
            semi_topology: Topology::Triangles,
            semi_mode: SemiTransparencyMode::default(),
            image_load: DrawBuffer::new("image-load", limits.image_load, FlushPolicy::Discard),
            output: DrawBuffer::new("output", OUTPUT_VERTICES, FlushPolicy::Retain),
            output_pass: None,
            order: OrderCounter::new(),
            regions: DirtyRegions::default(),
            faults: Vec::new(),
            last_downgrade: None,
        };

        let (_, _, pass) = renderer.output_target();
        renderer
            .backend
            .bind_frontend(pass.resolution)
            .map_err(|e| RendererError::Allocation {
                what: "frontend framebuffer",
                message: e.to_string(),
            })?;

        log::info!(
            "renderer ready: {} backend, {}x upscaling, {}-bit",
            renderer.backend.name(),
            renderer.applied.upscaling,
            renderer.config.internal_color_depth.bits()
        );
        Ok(renderer)
    }

    // ── accessors ────────────────────────────────────────────────────────

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn draw_config(&self) -> &DrawConfig {
        &self.config
    }

    /// Settings currently in effect (after sanitizing and downgrades).
    #[inline]
    pub fn settings(&self) -> RendererSettings {
        self.applied
    }

    #[inline]
    pub fn display_mode(&self) -> DisplayMode {
        self.display
    }

    /// Faults recorded since the last [`prepare_render`](Self::prepare_render).
    #[inline]
    pub fn faults(&self) -> &[FrameFault] {
        &self.faults
    }

    /// Last upscaling change that failed, cleared by the next success.
    #[inline]
    pub fn last_downgrade(&self) -> Option<&UpscalingDowngrade> {
        self.last_downgrade.as_ref()
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.order.epoch()
    }

    /// Size of the framebuffer the next frame is presented at.
    pub fn frontend_resolution(&self) -> FrontendResolution {
        self.output_target().2.resolution
    }

    // ── frame lifecycle ──────────────────────────────────────────────────

    /// Starts a frame: clears the fault log and opens a new ordering epoch.
    pub fn prepare_render(&mut self) {
        self.faults.clear();
        self.new_epoch();
    }

    /// Dispatches one decoded command.
    pub fn draw(&mut self, command: DrawCommand<'_>) -> Result<(), TransferError> {
        match command {
            DrawCommand::Triangle {
                vertices,
                semi_transparency,
            } => self.push_triangle(vertices, semi_transparency),
            DrawCommand::Line {
                vertices,
                semi_transparency,
            } => self.push_line(vertices, semi_transparency),
            DrawCommand::FillRect {
                color,
                top_left,
                dimensions,
            } => self.fill_rect(color, top_left, dimensions),
            DrawCommand::CopyRect { src, dst, dimensions } => return self.copy_rect(src, dst, dimensions),
            DrawCommand::UploadTextures {
                top_left,
                dimensions,
                texels,
            } => return self.upload_textures(top_left, dimensions, texels),
            DrawCommand::UploadVramWindow {
                top_left,
                dimensions,
                texels,
            } => return self.upload_vram_window(top_left, dimensions, texels),
            DrawCommand::SetDrawOffset { x, y } => self.set_draw_offset(x, y),
            DrawCommand::SetDrawArea { top_left, dimensions } => self.set_draw_area(top_left, dimensions),
            DrawCommand::SetDisplayMode {
                top_left,
                resolution,
                depth_24bpp,
            } => self.set_display_mode(top_left, resolution, depth_24bpp),
            DrawCommand::Flush => self.flush(),
        }
        Ok(())
    }

    /// Draws every staged primitive: opaque batch, then semi-transparent.
    pub fn flush(&mut self) {
        self.flush_semi();
    }

    /// Flushes, presents the display region and closes the ordering epoch.
    pub fn finalize_frame(&mut self) -> Frame {
        self.flush();

        if let Some(mode) = self.pending_display.take() {
            if mode != self.display {
                log::debug!("display mode {:?} -> {:?}", self.display, mode);
                self.display = mode;
                self.config.display_top_left = mode.top_left;
                self.config.display_resolution = mode.resolution;
                self.config.display_24bpp = mode.depth_24bpp;
            }
        }

        let (bounds, vram, pass) = self.output_target();
        let frame = if pass.resolution.pixel_count() == 0 {
            Frame::new(pass.resolution)
        } else {
            if pass.depth_24bpp && vram.iter().any(|r| self.regions.unsynced_overlaps(*r)) {
                self.sync_unsynced();
            }
            self.present(bounds, vram[0], pass)
        };

        self.new_epoch();
        frame
    }

    /// Re-targets presentation at the current frontend resolution.
    pub fn bind_frontend_framebuffer(&mut self) -> FrontendResolution {
        let (_, vram, pass) = self.output_target();
        if let Err(e) = self.backend.bind_frontend(pass.resolution) {
            self.record_fault(CommandKind::Present, Some(vram[0]), e.to_string());
        }
        self.output_pass = None;
        pass.resolution
    }

    // ── primitives ───────────────────────────────────────────────────────

    /// Stages a triangle; `semi_transparency` selects the blended path.
    pub fn push_triangle(&mut self, vertices: [CommandVertex; 3], semi_transparency: Option<SemiTransparencyMode>) {
        if Self::exceeds_extent(&vertices) {
            log::debug!("dropped oversized triangle {:?}", vertices.map(|v| (v.x(), v.y())));
            return;
        }
        let order = self.next_order();
        self.stage(CommandKind::Triangle, vertices, Topology::Triangles, semi_transparency, order);
    }

    /// Stages a line (both endpoints drawn).
    pub fn push_line(&mut self, vertices: [CommandVertex; 2], semi_transparency: Option<SemiTransparencyMode>) {
        if Self::exceeds_extent(&vertices) {
            log::debug!("dropped oversized line {:?}", vertices.map(|v| (v.x(), v.y())));
            return;
        }
        let order = self.next_order();
        self.stage(CommandKind::Line, vertices, Topology::Lines, semi_transparency, order);
    }

    /// Fills a rectangle in absolute VRAM coordinates.
    ///
    /// Drawn as two opaque triangles sharing one order index; the draw
    /// offset is compensated, the draw area still clips.
    pub fn fill_rect(&mut self, color: Color, top_left: TopLeft, dimensions: Dimensions) {
        if dimensions.is_empty() {
            return;
        }
        let (ox, oy) = self.config.draw_offset;
        let l = to_i16(top_left.x as i32 - ox as i32);
        let t = to_i16(top_left.y as i32 - oy as i32);
        let r = to_i16(l as i32 + dimensions.w as i32);
        let b = to_i16(t as i32 + dimensions.h as i32);
        let v = |x, y| CommandVertex::new(x, y, color);

        let order = self.next_order();
        self.stage(CommandKind::FillRect, [v(l, t), v(r, t), v(l, b)], Topology::Triangles, None, order);
        self.stage(CommandKind::FillRect, [v(r, t), v(r, b), v(l, b)], Topology::Triangles, None, order);
    }

    /// Shared pre-flight check: flushes the batch a primitive of
    /// `nvertices` would overflow or whose configuration it does not match.
    pub fn maybe_force_draw(
        &mut self,
        nvertices: usize,
        topology: Topology,
        semi_transparency: Option<SemiTransparencyMode>,
    ) {
        match semi_transparency {
            None => {
                let mismatch = !self.command.is_empty() && self.command_topology != topology;
                if mismatch || !self.command.fits(nvertices) {
                    log::trace!("forced opaque flush ({} staged, mismatch: {mismatch})", self.command.len());
                    self.flush_opaque();
                }
            }
            Some(mode) => {
                let mismatch =
                    !self.semi.is_empty() && (self.semi_mode != mode || self.semi_topology != topology);
                if mismatch || !self.semi.fits(nvertices) {
                    log::trace!("forced semi-transparent flush ({} staged, mismatch: {mismatch})", self.semi.len());
                    self.flush_semi();
                }
            }
        }
    }

    // ── transfers ────────────────────────────────────────────────────────

    /// VRAM-to-VRAM copy through the native store.
    pub fn copy_rect(&mut self, src: TopLeft, dst: TopLeft, dimensions: Dimensions) -> Result<(), TransferError> {
        let src_rect = Self::transfer_rect(src, dimensions)?;
        let dst_rect = Self::transfer_rect(dst, dimensions)?;
        if dimensions.is_empty() {
            return Ok(());
        }

        if self.regions.pending_overlaps(src_rect) || self.regions.pending_overlaps(dst_rect) {
            self.flush();
        }
        if self.regions.unsynced_overlaps(src_rect) {
            self.sync_unsynced();
        }

        let texels = match self.backend.read_native(src_rect) {
            Ok(texels) => texels,
            Err(e) => return Err(self.transfer_fault(CommandKind::CopyRect, src_rect, e)),
        };
        self.load_rect(CommandKind::CopyRect, dst_rect, &texels)
    }

    /// Uploads texture-page data. Same semantics as
    /// [`upload_vram_window`](Self::upload_vram_window).
    pub fn upload_textures(
        &mut self,
        top_left: TopLeft,
        dimensions: Dimensions,
        texels: &[u16],
    ) -> Result<(), TransferError> {
        log::trace!("texture upload {top_left:?} {dimensions:?}");
        self.upload(top_left, dimensions, texels)
    }

    /// Writes `texels` (row-major, `w × h`) into VRAM.
    pub fn upload_vram_window(
        &mut self,
        top_left: TopLeft,
        dimensions: Dimensions,
        texels: &[u16],
    ) -> Result<(), TransferError> {
        log::trace!("vram upload {top_left:?} {dimensions:?}");
        self.upload(top_left, dimensions, texels)
    }

    /// Reads a VRAM rectangle back, row-major.
    pub fn download_vram_window(
        &mut self,
        top_left: TopLeft,
        dimensions: Dimensions,
    ) -> Result<Vec<u16>, TransferError> {
        let rect = Self::transfer_rect(top_left, dimensions)?;
        if dimensions.is_empty() {
            return Ok(Vec::new());
        }
        if self.regions.pending_overlaps(rect) {
            self.flush();
        }
        if self.regions.unsynced_overlaps(rect) {
            self.sync_unsynced();
        }
        self.backend
            .read_native(rect)
            .map_err(|e| self.transfer_fault(CommandKind::Download, rect, e))
    }

    // ── state ────────────────────────────────────────────────────────────

    pub fn set_draw_offset(&mut self, x: i16, y: i16) {
        if self.config.draw_offset == (x, y) {
            return;
        }
        if self.has_staged() {
            log::trace!("draw offset change, flushing");
            self.flush();
        }
        self.config.draw_offset = (x, y);
    }

    pub fn set_draw_area(&mut self, top_left: TopLeft, dimensions: Dimensions) {
        if self.config.draw_area_top_left == top_left && self.config.draw_area_dimensions == dimensions {
            return;
        }
        if self.has_staged() {
            log::trace!("draw area change, flushing");
            self.flush();
        }
        self.config.draw_area_top_left = top_left;
        self.config.draw_area_dimensions = dimensions;
    }

    /// Records the display mode; applied by the next
    /// [`finalize_frame`](Self::finalize_frame).
    ///
    /// Resolutions beyond the VRAM grid are clamped to it.
    pub fn set_display_mode(&mut self, top_left: TopLeft, resolution: Dimensions, depth_24bpp: bool) {
        self.pending_display = Some(Self::checked_display(DisplayMode {
            top_left,
            resolution,
            depth_24bpp,
        }));
    }

    /// Polls the settings provider. Returns true if the texel stores were
    /// reallocated.
    pub fn refresh_variables(&mut self) -> bool {
        let mut next = self.settings.settings().sanitized();
        if next.wireframe && !self.backend.supports_wireframe() {
            next.wireframe = false;
        }
        let requested = next.upscaling;
        next.upscaling = self.applied.upscaling;

        if next != self.applied {
            self.flush();
            log::debug!("settings changed: {:?} -> {:?}", self.applied, next);
            self.applied = next;
            self.config.internal_color_depth = next.color_depth;
            self.output_pass = None;
        }

        if requested == self.backend.upscaling() {
            return false;
        }
        if self.last_downgrade.as_ref().is_some_and(|d| d.requested == requested) {
            return false;
        }
        self.reallocate(requested)
    }

    // ── internals ────────────────────────────────────────────────────────

    fn exceeds_extent(vertices: &[CommandVertex]) -> bool {
        let xs = vertices.iter().map(|v| v.x() as i32);
        let ys = vertices.iter().map(|v| v.y() as i32);
        let w = xs.clone().max().unwrap_or(0) - xs.min().unwrap_or(0);
        let h = ys.clone().max().unwrap_or(0) - ys.min().unwrap_or(0);
        w > MAX_PRIMITIVE_WIDTH || h > MAX_PRIMITIVE_HEIGHT
    }

    fn checked_display(mode: DisplayMode) -> DisplayMode {
        let clamped = mode.clamped();
        if clamped != mode {
            log::warn!(
                "display resolution {:?} exceeds VRAM, clamped to {:?}",
                mode.resolution,
                clamped.resolution
            );
        }
        clamped
    }

    fn draw_area(&self) -> VramRect {
        let tl = self.config.draw_area_top_left;
        let dim = self.config.draw_area_dimensions;
        VramRect::clamped(
            tl.x as i32,
            tl.y as i32,
            tl.x as i32 + dim.w as i32,
            tl.y as i32 + dim.h as i32,
        )
    }

    fn draw_state(&self) -> DrawState {
        DrawState {
            scissor: self.draw_area(),
            offset: self.config.draw_offset,
            color_depth: self.config.internal_color_depth,
            scale_dither: self.applied.scale_dither,
        }
    }

    #[inline]
    fn has_staged(&self) -> bool {
        !self.command.is_empty() || !self.semi.is_empty()
    }

    /// Native-space bounds of a primitive after offset and clipping.
    fn primitive_bounds(&self, vertices: &[CommandVertex]) -> Option<VramRect> {
        let (ox, oy) = self.config.draw_offset;
        let xs = vertices.iter().map(|v| v.x() as i32 + ox as i32);
        let ys = vertices.iter().map(|v| v.y() as i32 + oy as i32);
        let rect = VramRect::clamped(
            xs.clone().min()?,
            ys.clone().min()?,
            xs.max()? + 1,
            ys.max()? + 1,
        );
        rect.intersect(self.draw_area())
    }

    /// VRAM read by a textured primitive: its texture page and CLUT row.
    fn texture_footprint(flat: &CommandVertex) -> [VramRect; 2] {
        let depth = flat.texture_depth();
        let (px0, px1) = span(flat.texture_page[0], depth.page_width(), VRAM_WIDTH);
        let (py0, py1) = span(flat.texture_page[1], 256, VRAM_HEIGHT);
        let page = VramRect::clamped(px0, py0, px1, py1);

        let clut = if depth.clut_entries() == 0 {
            VramRect::default()
        } else {
            let (cx0, cx1) = span(flat.clut[0], depth.clut_entries(), VRAM_WIDTH);
            let cy = flat.clut[1] as i32;
            VramRect::clamped(cx0, cy, cx1, cy + 1)
        };
        [page, clut]
    }

    /// Makes the native store current for everything in `footprint`.
    fn sync_texture_footprint(&mut self, footprint: &[VramRect; 2]) {
        if footprint.iter().any(|r| self.regions.pending_overlaps(*r)) {
            log::trace!("texture footprint {footprint:?} overlaps staged draws, flushing");
            self.flush();
        }
        if footprint.iter().any(|r| self.regions.unsynced_overlaps(*r)) {
            self.sync_unsynced();
        }
    }

    fn stage<const N: usize>(
        &mut self,
        kind: CommandKind,
        mut vertices: [CommandVertex; N],
        topology: Topology,
        semi_transparency: Option<SemiTransparencyMode>,
        order: i16,
    ) {
        let Some(bounds) = self.primitive_bounds(&vertices) else {
            return;
        };
        let footprint = vertices[0]
            .blend_mode()
            .is_textured()
            .then(|| Self::texture_footprint(&vertices[0]));
        if let Some(footprint) = &footprint {
            self.sync_texture_footprint(footprint);
        }
        self.maybe_force_draw(N, topology, semi_transparency);

        let semi = semi_transparency.is_some();
        for v in &mut vertices {
            v.stamp(order, semi);
        }
        let buffer = if semi { &mut self.semi } else { &mut self.command };
        if let Err(full) = buffer.try_push(&vertices) {
            self.record_fault(kind, Some(bounds), full.to_string());
            return;
        }
        match semi_transparency {
            Some(mode) => {
                self.semi_mode = mode;
                self.semi_topology = topology;
            }
            None => self.command_topology = topology,
        }
        self.regions.stage(semi, bounds);
        if let Some(footprint) = &footprint {
            self.regions.stage_reads(semi, footprint);
        }
    }

    fn flush_opaque(&mut self) {
        if self.command.is_empty() {
            return;
        }
        let pass = CommandPass {
            topology: self.command_topology,
            kind: CommandPassKind::Opaque,
            wireframe: self.applied.wireframe,
            state: self.draw_state(),
        };
        let result = self.command.flush(&mut self.backend, &pass);
        self.regions.opaque_flushed();
        if let Err(e) = result {
            self.record_fault(CommandKind::Flush, None, e.to_string());
        }
    }

    fn flush_semi(&mut self) {
        self.flush_opaque();
        if self.semi.is_empty() {
            return;
        }
        let pass = CommandPass {
            topology: self.semi_topology,
            kind: CommandPassKind::SemiTransparent(self.semi_mode),
            wireframe: self.applied.wireframe,
            state: self.draw_state(),
        };
        let result = self.semi.flush(&mut self.backend, &pass);
        self.regions.semi_flushed();
        if let Err(e) = result {
            self.record_fault(CommandKind::Flush, None, e.to_string());
        }
    }

    fn next_order(&mut self) -> i16 {
        if let Some(order) = self.order.take() {
            return order;
        }
        log::debug!(
            "order counter exhausted after {} primitives, starting epoch {}",
            self.order.used(),
            self.order.epoch() + 1
        );
        self.new_epoch();
        self.order.take().unwrap_or(0)
    }

    fn new_epoch(&mut self) {
        self.flush();
        if let Err(e) = self.backend.clear_order() {
            self.record_fault(CommandKind::Flush, None, e.to_string());
        }
        self.order.reset();
    }

    fn sync_unsynced(&mut self) {
        if self.regions.sync_hits_reads() {
            log::trace!("sync lands under staged texture reads, flushing");
            self.flush();
        }
        let Some(rect) = self.regions.take_unsynced() else {
            return;
        };
        if let Err(e) = self.backend.sync_native(rect) {
            self.regions.mark_unsynced(rect);
            self.record_fault(CommandKind::Sync, Some(rect), e.to_string());
        }
    }

    fn transfer_rect(top_left: TopLeft, dimensions: Dimensions) -> Result<VramRect, TransferError> {
        VramRect::new(top_left, dimensions).ok_or(TransferError::OutOfBounds {
            x: top_left.x,
            y: top_left.y,
            w: dimensions.w,
            h: dimensions.h,
        })
    }

    fn upload(&mut self, top_left: TopLeft, dimensions: Dimensions, texels: &[u16]) -> Result<(), TransferError> {
        let rect = Self::transfer_rect(top_left, dimensions)?;
        if texels.len() != dimensions.area() {
            return Err(TransferError::LengthMismatch {
                expected: dimensions.area(),
                actual: texels.len(),
            });
        }
        if dimensions.is_empty() {
            return Ok(());
        }
        self.load_rect(CommandKind::Upload, rect, texels)
    }

    /// Writes the native store, then mirrors `rect` into the render target.
    ///
    /// Staged primitives drawing into `rect` or sampling from it are drawn
    /// first.
    fn load_rect(&mut self, kind: CommandKind, rect: VramRect, texels: &[u16]) -> Result<(), TransferError> {
        if self.regions.pending_overlaps(rect) || self.regions.reads_overlap(rect) {
            log::trace!("write to {rect:?} overlaps staged draws, flushing");
            self.flush();
        }
        if let Err(e) = self.backend.write_native(rect, texels) {
            return Err(self.transfer_fault(kind, rect, e));
        }
        self.image_load(rect)
            .map_err(|e| self.transfer_fault(kind, rect, e))
    }

    /// Image-load draw of `rect` from the native store, under a fresh order index.
    fn image_load(&mut self, rect: VramRect) -> Result<(), BackendError> {
        let pass = ImageLoadPass {
            order: self.next_order(),
        };
        let quad = ImageLoadVertex::quad(rect);
        let mut result = self.image_load.push(&quad, &mut self.backend, &pass);
        if result.is_ok() {
            result = self.image_load.flush(&mut self.backend, &pass);
        }
        if result.is_err() {
            self.image_load.clear();
        }
        result
    }

    fn reallocate(&mut self, requested: u32) -> bool {
        let kept = self.backend.upscaling();
        self.flush();
        self.sync_unsynced();

        if let Err(e) = self.backend.reallocate(requested) {
            log::warn!("keeping {kept}x upscaling: {e}");
            self.last_downgrade = Some(UpscalingDowngrade {
                requested,
                kept,
                reason: e.to_string(),
            });
            return false;
        }

        log::info!("render target reallocated: {kept}x -> {requested}x");
        self.applied.upscaling = requested;
        self.config.internal_upscaling = requested;
        self.last_downgrade = None;
        self.output_pass = None;

        if let Err(e) = self.backend.clear_order() {
            self.record_fault(CommandKind::Sync, None, e.to_string());
        }
        self.order.reset();
        if let Err(e) = self.image_load(VramRect::FULL) {
            self.record_fault(CommandKind::Sync, Some(VramRect::FULL), e.to_string());
        }
        let (_, vram, pass) = self.output_target();
        if let Err(e) = self.backend.bind_frontend(pass.resolution) {
            self.record_fault(CommandKind::Present, Some(vram[0]), e.to_string());
        }
        true
    }

    /// Output quad bounds, VRAM regions read and pass for the current display.
    fn output_target(&self) -> ([u16; 4], [VramRect; 4], OutputPass) {
        let s = self.backend.upscaling();
        if self.applied.display_full_vram {
            let pass = OutputPass {
                depth_24bpp: false,
                resolution: FrontendResolution::new(VRAM_WIDTH as u32 * s, VRAM_HEIGHT as u32 * s),
            };
            let vram = [VramRect::FULL, VramRect::default(), VramRect::default(), VramRect::default()];
            return ([0, 0, VRAM_WIDTH, VRAM_HEIGHT], vram, pass);
        }

        let mode = self.display;
        let (x, y) = (mode.top_left.x, mode.top_left.y);
        let bounds = [
            x,
            y,
            x.saturating_add(mode.resolution.w),
            y.saturating_add(mode.resolution.h),
        ];
        let pass = OutputPass {
            depth_24bpp: mode.depth_24bpp,
            resolution: mode.frontend_resolution(s),
        };
        (bounds, mode.vram_rects(), pass)
    }

    fn present(&mut self, bounds: [u16; 4], vram: VramRect, pass: OutputPass) -> Frame {
        if self.output_pass != Some(pass) || self.output.is_empty() {
            self.output.clear();
            let quad = OutputVertex::quad(bounds[0], bounds[1], bounds[2], bounds[3]);
            if let Err(e) = self.output.try_push(&quad) {
                self.record_fault(CommandKind::Present, Some(vram), e.to_string());
                return Frame::new(pass.resolution);
            }
            self.output_pass = Some(pass);
        }

        let drawn = self
            .output
            .flush(&mut self.backend, &pass)
            .and_then(|()| self.backend.frontend_frame());
        match drawn {
            Ok(frame) => frame,
            Err(e) => {
                self.record_fault(CommandKind::Present, Some(vram), e.to_string());
                Frame::new(pass.resolution)
            }
        }
    }

    fn transfer_fault(&mut self, kind: CommandKind, rect: VramRect, error: BackendError) -> TransferError {
        let message = error.to_string();
        self.record_fault(kind, Some(rect), message.clone());
        TransferError::Backend(message)
    }

    fn record_fault(&mut self, command: CommandKind, region: Option<VramRect>, message: String) {
        let fault = FrameFault {
            command,
            region,
            upscaling: self.backend.upscaling(),
            color_depth: self.config.internal_color_depth,
            message,
        };
        fault.log();
        self.faults.push(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::software::SoftwareBackend;
    use crate::config::StaticSettings;

    fn renderer(limits: BatchLimits) -> Renderer<SoftwareBackend> {
        Renderer::with_limits(
            SoftwareBackend::new().unwrap(),
            DrawConfig::default(),
            StaticSettings::default(),
            limits,
        )
        .unwrap()
    }

    fn tri(x: i16, y: i16, size: i16, color: Color) -> [CommandVertex; 3] {
        [
            CommandVertex::new(x, y, color),
            CommandVertex::new(x + size, y, color),
            CommandVertex::new(x, y + size, color),
        ]
    }

    // ── batching ─────────────────────────────────────────────────────────

    #[test]
    fn topology_change_flushes_opaque_batch() {
        let mut r = renderer(BatchLimits::default());
        r.push_triangle(tri(0, 0, 4, Color::white()), None);
        assert_eq!(r.command.len(), 3);
        let line = [CommandVertex::new(0, 10, Color::white()), CommandVertex::new(5, 10, Color::white())];
        r.push_line(line, None);
        assert_eq!(r.command.len(), 2);
        assert_eq!(r.backend().draw_calls(), 1);
    }

    #[test]
    fn semi_mode_change_flushes_semi_batch_after_opaque() {
        let mut r = renderer(BatchLimits::default());
        r.push_triangle(tri(0, 0, 4, Color::white()), None);
        r.push_triangle(tri(0, 0, 4, Color::white()), Some(SemiTransparencyMode::Add));
        assert_eq!(r.backend().draw_calls(), 0);
        r.push_triangle(tri(0, 0, 4, Color::white()), Some(SemiTransparencyMode::Average));
        // opaque batch + two semi passes
        assert_eq!(r.backend().draw_calls(), 3);
        assert!(r.command.is_empty());
        assert_eq!(r.semi.len(), 3);
    }

    #[test]
    fn full_batch_flushes_before_push() {
        let mut r = renderer(BatchLimits::eager());
        r.push_triangle(tri(0, 0, 4, Color::white()), None);
        r.push_triangle(tri(8, 0, 4, Color::white()), None);
        assert_eq!(r.backend().draw_calls(), 1);
        assert_eq!(r.command.len(), 3);
    }

    #[test]
    fn oversized_triangle_is_dropped() {
        let mut r = renderer(BatchLimits::default());
        r.push_triangle(
            [
                CommandVertex::new(0, 0, Color::white()),
                CommandVertex::new(1024, 0, Color::white()),
                CommandVertex::new(0, 10, Color::white()),
            ],
            None,
        );
        assert!(r.command.is_empty());
        assert!(r.faults().is_empty());
    }

    #[test]
    fn offset_change_flushes_staged_work() {
        let mut r = renderer(BatchLimits::default());
        r.push_triangle(tri(0, 0, 4, Color::white()), None);
        r.set_draw_offset(0, 0);
        assert_eq!(r.command.len(), 3);
        r.set_draw_offset(3, 3);
        assert!(r.command.is_empty());
    }

    // ── ordering ─────────────────────────────────────────────────────────

    #[test]
    fn exhausted_counter_starts_new_epoch() {
        let mut r = renderer(BatchLimits::default());
        let epoch = r.epoch();
        for _ in 0..=i16::MAX as u32 {
            r.order.take();
        }
        r.push_triangle(tri(0, 0, 4, Color::white()), None);
        assert_eq!(r.epoch(), epoch + 1);
        assert_eq!(r.command.vertices()[0].order(), 0);
    }

    #[test]
    fn fill_rect_uses_one_order_index() {
        let mut r = renderer(BatchLimits::default());
        r.fill_rect(Color::white(), TopLeft::new(0, 0), Dimensions::new(8, 8));
        let orders: Vec<i16> = r.command.vertices().iter().map(|v| v.order()).collect();
        assert_eq!(orders.len(), 6);
        assert!(orders.iter().all(|&o| o == orders[0]));
    }

    // ── transfers ────────────────────────────────────────────────────────

    #[test]
    fn upload_rejects_bad_rectangles() {
        let mut r = renderer(BatchLimits::default());
        assert_eq!(
            r.upload_vram_window(TopLeft::new(1020, 0), Dimensions::new(8, 1), &[0; 8]),
            Err(TransferError::OutOfBounds { x: 1020, y: 0, w: 8, h: 1 })
        );
        assert_eq!(
            r.upload_vram_window(TopLeft::new(0, 0), Dimensions::new(2, 2), &[0; 3]),
            Err(TransferError::LengthMismatch { expected: 4, actual: 3 })
        );
    }

    #[test]
    fn upload_flushes_overlapping_pending_draws_only() {
        let mut r = renderer(BatchLimits::default());
        r.push_triangle(tri(0, 0, 4, Color::white()), None);
        r.upload_vram_window(TopLeft::new(100, 100), Dimensions::new(1, 1), &[1]).unwrap();
        assert_eq!(r.command.len(), 3);
        r.upload_vram_window(TopLeft::new(1, 1), Dimensions::new(1, 1), &[1]).unwrap();
        assert!(r.command.is_empty());
    }

    // ── settings ─────────────────────────────────────────────────────────

    #[test]
    fn failed_upscale_is_reported_and_not_retried() {
        let settings = StaticSettings::default();
        let backend = SoftwareBackend::new().unwrap().with_max_upscaling(2);
        let mut r = Renderer::new(backend, DrawConfig::default(), settings.clone()).unwrap();

        settings.update(|s| s.upscaling = 4);
        assert!(!r.refresh_variables());
        let d = r.last_downgrade().cloned().unwrap();
        assert_eq!((d.requested, d.kept), (4, 1));
        assert_eq!(r.settings().upscaling, 1);
        assert!(!r.refresh_variables());

        settings.update(|s| s.upscaling = 2);
        assert!(r.refresh_variables());
        assert!(r.last_downgrade().is_none());
        assert_eq!(r.draw_config().internal_upscaling, 2);
    }

    #[test]
    fn display_mode_applies_at_frame_end() {
        let mut r = renderer(BatchLimits::default());
        r.set_display_mode(TopLeft::new(0, 0), Dimensions::new(640, 480), false);
        assert_eq!(r.display_mode().resolution, Dimensions::new(320, 240));
        let frame = r.finalize_frame();
        assert_eq!((frame.width, frame.height), (640, 480));
        assert_eq!(r.display_mode().resolution, Dimensions::new(640, 480));
    }
}
