//! Built-in demo command stream.
//!
//! Touches every command family once per frame: fills, Gouraud and
//! textured triangles, lines, the four semi-transparency modes, a
//! VRAM-to-VRAM copy and draw-offset changes.

use ember_engine::{
    Color, CommandVertex, Dimensions, DrawCommand, SemiTransparencyMode, TextureBlendMode, TextureDepth, TopLeft,
};

const PAGE: TopLeft = TopLeft::new(640, 0);
const CLUT: TopLeft = TopLeft::new(640, 256);
const TEXTURE_SIZE: u16 = 64;

pub const DISPLAY: Dimensions = Dimensions::new(320, 240);

fn rgb15(r: u16, g: u16, b: u16) -> u16 {
    (r & 31) | (g & 31) << 5 | (b & 31) << 10
}

pub struct DemoScene {
    clut: Vec<u16>,
    page: Vec<u16>,
}

impl DemoScene {
    pub fn new() -> Self {
        // entry 0 stays transparent
        let clut = (0..16u16)
            .map(|i| if i == 0 { 0 } else { rgb15(i * 2, 31 - i * 2, 12) })
            .collect();

        let index = |u: u16, v: u16| -> u16 {
            if (u / 8 + v / 8) % 2 == 0 {
                1 + (u / 4 + v / 16) % 15
            } else {
                0
            }
        };
        let words = TEXTURE_SIZE / 4;
        let mut page = Vec::with_capacity(words as usize * TEXTURE_SIZE as usize);
        for v in 0..TEXTURE_SIZE {
            for w in 0..words {
                let word = (0..4).fold(0u16, |acc, k| acc | index(w * 4 + k, v) << (k * 4));
                page.push(word);
            }
        }

        Self { clut, page }
    }

    /// Commands issued once before the first frame.
    pub fn setup(&self) -> Vec<DrawCommand<'_>> {
        vec![
            DrawCommand::SetDisplayMode {
                top_left: TopLeft::origin(),
                resolution: DISPLAY,
                depth_24bpp: false,
            },
            DrawCommand::SetDrawArea {
                top_left: TopLeft::origin(),
                dimensions: DISPLAY,
            },
            DrawCommand::UploadTextures {
                top_left: PAGE,
                dimensions: Dimensions::new(TEXTURE_SIZE / 4, TEXTURE_SIZE),
                texels: &self.page,
            },
            DrawCommand::UploadTextures {
                top_left: CLUT,
                dimensions: Dimensions::new(16, 1),
                texels: &self.clut,
            },
        ]
    }

    /// Commands of frame `index`.
    pub fn frame(&self, index: u32) -> Vec<DrawCommand<'_>> {
        let mut cmds = vec![DrawCommand::FillRect {
            color: Color::new(16, 24, 64),
            top_left: TopLeft::origin(),
            dimensions: DISPLAY,
        }];

        cmds.push(DrawCommand::triangle([
            CommandVertex::new(20, 20, Color::new(255, 0, 0)).with_dither(true),
            CommandVertex::new(150, 40, Color::new(0, 255, 0)).with_dither(true),
            CommandVertex::new(60, 110, Color::new(0, 0, 255)).with_dither(true),
        ]));

        // textured quad sliding right, one texel column per frame
        let dx = (index % 64) as i16;
        cmds.push(DrawCommand::SetDrawOffset { x: dx, y: 0 });
        let t = |x: i16, y: i16, u: u16, v: u16| {
            CommandVertex::new(x, y, Color::new(128, 128, 128)).textured(
                [u, v],
                PAGE,
                CLUT,
                TextureDepth::T4Bpp,
                TextureBlendMode::Blended,
            )
        };
        let (x0, y0, s) = (20, 130, TEXTURE_SIZE as i16);
        let m = TEXTURE_SIZE;
        cmds.push(DrawCommand::triangle([t(x0, y0, 0, 0), t(x0 + s, y0, m, 0), t(x0, y0 + s, 0, m)]));
        cmds.push(DrawCommand::triangle([t(x0 + s, y0, m, 0), t(x0 + s, y0 + s, m, m), t(x0, y0 + s, 0, m)]));
        cmds.push(DrawCommand::SetDrawOffset { x: 0, y: 0 });

        for (i, mode) in SemiTransparencyMode::ALL.into_iter().enumerate() {
            let y = 20 + i as i16 * 44;
            let c = Color::new(200, 120, 40);
            let v = |x, y| CommandVertex::new(x, y, c);
            for vertices in [
                [v(170, y), v(300, y), v(170, y + 34)],
                [v(300, y), v(300, y + 34), v(170, y + 34)],
            ] {
                cmds.push(DrawCommand::Triangle {
                    vertices,
                    semi_transparency: Some(mode),
                });
            }
        }

        for k in 0..8i16 {
            let angle = k * 20;
            cmds.push(DrawCommand::line([
                CommandVertex::new(160, 230, Color::white()),
                CommandVertex::new(100 + angle, 190, Color::new(255, 255, 0)),
            ]));
        }

        // copy of the Gouraud triangle's corner, reading this frame's pixels
        cmds.push(DrawCommand::CopyRect {
            src: TopLeft::new(20, 20),
            dst: TopLeft::new(250, 200),
            dimensions: Dimensions::new(48, 32),
        });
        cmds
    }
}
