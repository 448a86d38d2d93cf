//! End-to-end draws through `Renderer<SoftwareBackend>`.
//!
//! VRAM contents are compared after a full download, so every check covers
//! batching, ordering, syncing and the reference rasterizer together.

use ember_engine::logging::{init_logging, LoggingConfig};
use ember_engine::{
    BatchLimits, Color, ColorDepth, CommandVertex, Dimensions, DrawCommand, DrawConfig, Renderer, RendererSettings,
    SemiTransparencyMode, SoftwareBackend, StaticSettings, TextureBlendMode, TextureDepth, TopLeft,
};

fn renderer_with(limits: BatchLimits, settings: RendererSettings) -> Renderer<SoftwareBackend> {
    init_logging(LoggingConfig::for_tests());
    Renderer::with_limits(
        SoftwareBackend::new().unwrap(),
        DrawConfig::default(),
        StaticSettings::new(settings),
        limits,
    )
    .unwrap()
}

fn bits32() -> RendererSettings {
    RendererSettings {
        color_depth: ColorDepth::Bits32,
        ..RendererSettings::default()
    }
}

fn quad(x: i16, y: i16, w: i16, h: i16, color: Color) -> [[CommandVertex; 3]; 2] {
    let v = |x, y| CommandVertex::new(x, y, color);
    [
        [v(x, y), v(x + w, y), v(x, y + h)],
        [v(x + w, y), v(x + w, y + h), v(x, y + h)],
    ]
}

fn textured_quad(x: i16, y: i16, size: i16, page: TopLeft, blend: TextureBlendMode) -> [[CommandVertex; 3]; 2] {
    let v = |px: i16, py: i16| {
        CommandVertex::new(px, py, Color::new(128, 128, 128)).textured(
            [(px - x) as u16, (py - y) as u16],
            page,
            TopLeft::origin(),
            TextureDepth::T16Bpp,
            blend,
        )
    };
    let (r, b) = (x + size, y + size);
    [[v(x, y), v(r, y), v(x, b)], [v(r, y), v(r, b), v(x, b)]]
}

fn texel(r: &mut Renderer<SoftwareBackend>, x: u16, y: u16) -> u16 {
    r.download_vram_window(TopLeft::new(x, y), Dimensions::new(1, 1)).unwrap()[0]
}

fn rgb15(r: u16, g: u16, b: u16) -> u16 {
    r | g << 5 | b << 10
}

fn vram(r: &mut Renderer<SoftwareBackend>) -> Vec<u16> {
    r.download_vram_window(TopLeft::origin(), Dimensions::new(1024, 512))
        .unwrap()
}

/// A scene mixing every path that can reorder GPU work.
fn busy_scene(r: &mut Renderer<SoftwareBackend>) {
    r.fill_rect(Color::new(40, 80, 120), TopLeft::new(0, 0), Dimensions::new(64, 64));
    for (i, mode) in SemiTransparencyMode::ALL.into_iter().enumerate() {
        let o = i as i16 * 8;
        for t in quad(o, o, 24, 24, Color::new(200, 16 * i as u8, 64)) {
            r.push_triangle(t, None);
        }
        for t in quad(o + 4, o + 4, 24, 24, Color::new(96, 160, 32)) {
            r.push_triangle(t, Some(mode));
        }
    }
    r.push_line(
        [
            CommandVertex::new(0, 60, Color::white()),
            CommandVertex::new(63, 2, Color::white()),
        ],
        Some(SemiTransparencyMode::Add),
    );
    // samples the area drawn above
    for t in textured_quad(200, 0, 32, TopLeft::new(0, 0), TextureBlendMode::Raw) {
        r.push_triangle(t, None);
    }
    r.copy_rect(TopLeft::new(0, 0), TopLeft::new(300, 100), Dimensions::new(32, 32))
        .unwrap();
    for t in quad(310, 110, 8, 8, Color::new(0, 255, 0)) {
        r.push_triangle(t, Some(SemiTransparencyMode::SubtractSource));
    }
}

#[test]
fn batch_capacity_does_not_change_output() {
    let mut eager = renderer_with(BatchLimits::eager(), bits32());
    let mut lazy = renderer_with(BatchLimits::default(), bits32());
    busy_scene(&mut eager);
    busy_scene(&mut lazy);

    assert!(eager.backend().draw_calls() > lazy.backend().draw_calls());
    assert!(vram(&mut eager) == vram(&mut lazy));
}

const PAGE: TopLeft = TopLeft::new(512, 0);

fn fill_page(r: &mut Renderer<SoftwareBackend>, texel: u16) {
    r.upload_textures(PAGE, Dimensions::new(16, 16), &[texel; 256]).unwrap();
}

/// Staged sampler, then the page it samples is overwritten.
fn rewrite_sampled_page(r: &mut Renderer<SoftwareBackend>) -> u16 {
    fill_page(r, rgb15(31, 0, 0));
    for t in textured_quad(0, 0, 16, PAGE, TextureBlendMode::Raw) {
        r.push_triangle(t, None);
    }
    fill_page(r, rgb15(0, 0, 31));
    r.flush();
    texel(r, 1, 1)
}

#[test]
fn upload_under_staged_sampler_keeps_old_texels() {
    let mut eager = renderer_with(BatchLimits::eager(), RendererSettings::default());
    let mut lazy = renderer_with(BatchLimits::default(), RendererSettings::default());

    assert_eq!(rewrite_sampled_page(&mut eager), rgb15(31, 0, 0));
    assert_eq!(rewrite_sampled_page(&mut lazy), rgb15(31, 0, 0));
    assert!(vram(&mut eager) == vram(&mut lazy));
}

#[test]
fn copy_onto_staged_sampler_keeps_old_texels() {
    let run = |r: &mut Renderer<SoftwareBackend>| {
        fill_page(r, rgb15(31, 0, 0));
        r.upload_vram_window(TopLeft::new(600, 0), Dimensions::new(16, 16), &[rgb15(0, 31, 0); 256])
            .unwrap();
        for t in textured_quad(0, 0, 16, PAGE, TextureBlendMode::Raw) {
            r.push_triangle(t, None);
        }
        r.copy_rect(TopLeft::new(600, 0), PAGE, Dimensions::new(16, 16))
            .unwrap();
        vram(r)
    };
    let mut eager = renderer_with(BatchLimits::eager(), RendererSettings::default());
    let mut lazy = renderer_with(BatchLimits::default(), RendererSettings::default());

    let lazy_vram = run(&mut lazy);
    assert_eq!(lazy_vram[1024 + 1], rgb15(31, 0, 0));
    assert_eq!(lazy_vram[512], rgb15(0, 31, 0));
    assert!(run(&mut eager) == lazy_vram);
}

/// A staged semi-transparent sampler must not see opaque writes staged
/// after it, even when those are drawn (and synced) first.
fn sync_under_staged_semi_sampler(r: &mut Renderer<SoftwareBackend>) -> Vec<u16> {
    fill_page(r, rgb15(31, 0, 0));
    for t in textured_quad(0, 0, 16, PAGE, TextureBlendMode::Raw) {
        r.push_triangle(t, Some(SemiTransparencyMode::Add));
    }
    for t in quad(512, 0, 16, 16, Color::new(0, 255, 0)) {
        r.push_triangle(t, None);
    }
    // topology change: draws the opaque batch only
    r.push_line(
        [
            CommandVertex::new(100, 100, Color::white()),
            CommandVertex::new(110, 100, Color::white()),
        ],
        None,
    );
    for t in textured_quad(200, 0, 16, PAGE, TextureBlendMode::Raw) {
        r.push_triangle(t, None);
    }
    r.flush();
    vram(r)
}

#[test]
fn sync_waits_for_staged_semi_sampler() {
    let mut eager = renderer_with(BatchLimits::eager(), RendererSettings::default());
    let mut lazy = renderer_with(BatchLimits::default(), RendererSettings::default());

    let lazy_vram = sync_under_staged_semi_sampler(&mut lazy);
    assert_eq!(lazy_vram[1024 + 1], rgb15(31, 0, 0));
    assert_eq!(lazy_vram[1024 + 201], rgb15(0, 31, 0));
    assert!(sync_under_staged_semi_sampler(&mut eager) == lazy_vram);
}

#[test]
fn self_texturing_needs_no_explicit_flush() {
    let mut implicit = renderer_with(BatchLimits::default(), RendererSettings::default());
    let mut explicit = renderer_with(BatchLimits::default(), RendererSettings::default());

    for r in [&mut implicit, &mut explicit] {
        for t in quad(0, 0, 16, 16, Color::new(255, 0, 0)) {
            r.push_triangle(t, None);
        }
    }
    explicit.draw(DrawCommand::Flush).unwrap();

    for r in [&mut implicit, &mut explicit] {
        for t in textured_quad(100, 0, 16, TopLeft::new(0, 0), TextureBlendMode::Raw) {
            r.push_triangle(t, None);
        }
    }

    assert_eq!(texel(&mut implicit, 104, 4), rgb15(31, 0, 0));
    assert!(vram(&mut implicit) == vram(&mut explicit));
}

#[test]
fn later_primitive_wins_across_batches() {
    let mut r = renderer_with(BatchLimits::default(), RendererSettings::default());
    for t in quad(0, 0, 8, 8, Color::new(255, 0, 0)) {
        r.push_triangle(t, None);
    }
    // semi batch is drawn after the opaque one, but the later opaque
    // primitive must still win
    for t in quad(0, 0, 8, 8, Color::new(0, 0, 255)) {
        r.push_triangle(t, Some(SemiTransparencyMode::Add));
    }
    for t in quad(2, 2, 4, 4, Color::new(0, 255, 0)) {
        r.push_triangle(t, None);
    }

    assert_eq!(texel(&mut r, 3, 3), rgb15(0, 31, 0));
    assert_eq!(texel(&mut r, 0, 0), rgb15(31, 0, 31));
}

#[test]
fn semi_transparency_equations() {
    let cases = [
        (SemiTransparencyMode::Average, 96 >> 3),
        (SemiTransparencyMode::Add, 192 >> 3),
        (SemiTransparencyMode::SubtractSource, 64 >> 3),
        (SemiTransparencyMode::AddQuarterSource, 144 >> 3),
    ];
    for (mode, expected) in cases {
        let mut r = renderer_with(BatchLimits::default(), bits32());
        r.fill_rect(Color::new(128, 128, 128), TopLeft::new(0, 0), Dimensions::new(8, 8));
        for t in quad(0, 0, 8, 8, Color::new(64, 64, 64)) {
            r.push_triangle(t, Some(mode));
        }
        assert_eq!(texel(&mut r, 4, 4), rgb15(expected, expected, expected), "{mode:?}");
    }
}

#[test]
fn blending_saturates() {
    let mut r = renderer_with(BatchLimits::default(), bits32());
    r.fill_rect(Color::new(200, 10, 200), TopLeft::new(0, 0), Dimensions::new(4, 4));
    for t in quad(0, 0, 4, 4, Color::new(200, 200, 0)) {
        r.push_triangle(t, Some(SemiTransparencyMode::Add));
    }
    for t in quad(0, 0, 4, 4, Color::new(0, 255, 0)) {
        r.push_triangle(t, Some(SemiTransparencyMode::SubtractSource));
    }
    assert_eq!(texel(&mut r, 1, 1), rgb15(31, 0, 25));
}

#[test]
fn draw_area_clips_and_offset_translates() {
    let mut r = renderer_with(BatchLimits::default(), RendererSettings::default());
    r.set_draw_area(TopLeft::new(10, 10), Dimensions::new(4, 4));
    for t in quad(0, 0, 32, 32, Color::new(255, 255, 255)) {
        r.push_triangle(t, None);
    }
    assert_eq!(texel(&mut r, 9, 10), 0);
    assert_eq!(texel(&mut r, 10, 10), rgb15(31, 31, 31));
    assert_eq!(texel(&mut r, 13, 13), rgb15(31, 31, 31));
    assert_eq!(texel(&mut r, 14, 13), 0);

    r.set_draw_area(TopLeft::origin(), Dimensions::new(1024, 512));
    r.set_draw_offset(100, 50);
    for t in quad(0, 0, 4, 4, Color::new(255, 0, 0)) {
        r.push_triangle(t, None);
    }
    assert_eq!(texel(&mut r, 101, 51), rgb15(31, 0, 0));
    assert_eq!(texel(&mut r, 1, 1), 0);
}

#[test]
fn fill_rect_ignores_draw_offset() {
    let mut r = renderer_with(BatchLimits::default(), RendererSettings::default());
    r.set_draw_offset(-20, 7);
    r.fill_rect(Color::new(0, 0, 255), TopLeft::new(40, 40), Dimensions::new(2, 2));
    assert_eq!(texel(&mut r, 40, 40), rgb15(0, 0, 31));
    assert_eq!(texel(&mut r, 41, 41), rgb15(0, 0, 31));
    assert_eq!(texel(&mut r, 42, 42), 0);
}

#[test]
fn dithering_only_applies_at_16_bits() {
    let dithered = |settings| {
        let mut r = renderer_with(BatchLimits::default(), settings);
        let v = |x, y| CommandVertex::new(x, y, Color::new(104, 104, 104)).with_dither(true);
        r.push_triangle([v(0, 0), v(8, 0), v(0, 8)], None);
        r.push_triangle([v(8, 0), v(8, 8), v(0, 8)], None);
        r.download_vram_window(TopLeft::origin(), Dimensions::new(4, 1))
            .unwrap()
    };

    let native = dithered(RendererSettings::default());
    // offsets -4, 0, -3, +1 around 104
    let (lo, hi) = (rgb15(12, 12, 12), rgb15(13, 13, 13));
    assert_eq!(native, vec![lo, hi, lo, hi]);

    let full = dithered(bits32());
    assert!(full.iter().all(|&t| t == hi));
}

#[test]
fn textured_blend_modulates_with_vertex_color() {
    let mut r = renderer_with(BatchLimits::default(), bits32());
    r.upload_textures(TopLeft::new(512, 0), Dimensions::new(1, 1), &[rgb15(16, 16, 16)])
        .unwrap();
    let v = |x: i16, y: i16| {
        CommandVertex::new(x, y, Color::new(64, 128, 255)).textured(
            [0, 0],
            TopLeft::new(512, 0),
            TopLeft::origin(),
            TextureDepth::T16Bpp,
            TextureBlendMode::Blended,
        )
    };
    r.push_triangle([v(0, 0), v(4, 0), v(0, 4)], None);

    // texel 16 expands to 132: 132*64/128, 132*128/128, min(132*255/128, 255)
    assert_eq!(texel(&mut r, 0, 0), rgb15(66 >> 3, 132 >> 3, 31));
}

#[test]
fn clut_lookup_for_4bpp_textures() {
    let mut r = renderer_with(BatchLimits::default(), RendererSettings::default());
    let clut = TopLeft::new(0, 480);
    r.upload_textures(clut, Dimensions::new(16, 1), &(0..16).map(|i| rgb15(i, 0, 31 - i)).collect::<Vec<_>>())
        .unwrap();
    // indices 3, 2, 1, 0 from low to high nibble
    r.upload_textures(TopLeft::new(640, 0), Dimensions::new(1, 1), &[0x0123])
        .unwrap();

    let v = |x: i16, y: i16| {
        CommandVertex::new(x, y, Color::white()).textured(
            [x as u16, 0],
            TopLeft::new(640, 0),
            clut,
            TextureDepth::T4Bpp,
            TextureBlendMode::Raw,
        )
    };
    r.push_triangle([v(0, 0), v(4, 0), v(0, 1)], None);
    r.push_triangle([v(4, 0), v(4, 1), v(0, 1)], None);

    assert_eq!(texel(&mut r, 0, 0), rgb15(3, 0, 28));
    assert_eq!(texel(&mut r, 1, 0), rgb15(2, 0, 29));
}

#[test]
fn epoch_advances_every_frame() {
    let mut r = renderer_with(BatchLimits::default(), RendererSettings::default());
    let start = r.epoch();
    r.prepare_render();
    r.finalize_frame();
    assert_eq!(r.epoch(), start + 2);
}
