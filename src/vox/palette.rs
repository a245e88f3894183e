//! Palette colors
//!
//! A palette is a fixed 256-slot color table indexed by voxel id. Files
//! without an `RGBA` chunk fall back to the stock editor palette, generated
//! here: a 6-level color cube followed by single-channel and gray ramps.

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;

/// Number of palette slots.
pub const PALETTE_SIZE: usize = 256;

/// Columns per row in the palette atlas sampled by diffuse faces.
pub const PALETTE_COLUMNS: u32 = 8;

/// Rows in the palette atlas.
pub const PALETTE_ROWS: u32 = PALETTE_SIZE as u32 / PALETTE_COLUMNS;

/// 8-bit RGBA color, exactly 4 bytes on the wire.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Stock palette used when a file carries no `RGBA` chunk. Read-only,
/// shared process-wide.
pub static DEFAULT_PALETTE: [Rgba; PALETTE_SIZE] = build_default_palette();

const CUBE_LEVELS: [u8; 6] = [255, 204, 153, 102, 51, 0];
const RAMP_LEVELS: [u8; 10] = [
    0xEE, 0xDD, 0xBB, 0xAA, 0x88, 0x77, 0x55, 0x44, 0x22, 0x11,
];

const fn build_default_palette() -> [Rgba; PALETTE_SIZE] {
    let mut table = [Rgba::new(0, 0, 0, 255); PALETTE_SIZE];
    table[0] = Rgba::new(0, 0, 0, 0);

    // 215 cube colors; pure black is left to the ramp section.
    let mut i = 0;
    while i < 215 {
        table[1 + i] = Rgba::new(
            CUBE_LEVELS[i / 36],
            CUBE_LEVELS[(i / 6) % 6],
            CUBE_LEVELS[i % 6],
            255,
        );
        i += 1;
    }

    let mut j = 0;
    while j < RAMP_LEVELS.len() {
        let v = RAMP_LEVELS[j];
        table[216 + j] = Rgba::new(v, 0, 0, 255);
        table[226 + j] = Rgba::new(0, v, 0, 255);
        table[236 + j] = Rgba::new(0, 0, v, 255);
        table[246 + j] = Rgba::new(v, v, v, 255);
        j += 1;
    }

    table
}

/// Render a palette as the atlas image sampled by diffuse faces.
///
/// Slot `i` lands in column `i % 8`, row `i / 8`, with row 0 at the image
/// bottom so a v-up sampler sees the same layout the UVs address.
pub fn palette_image(colors: &[Rgba; PALETTE_SIZE]) -> RgbaImage {
    let mut image = RgbaImage::new(PALETTE_COLUMNS, PALETTE_ROWS);
    for (i, color) in colors.iter().enumerate() {
        let col = i as u32 % PALETTE_COLUMNS;
        let row = i as u32 / PALETTE_COLUMNS;
        image.put_pixel(col, PALETTE_ROWS - 1 - row, image::Rgba(color.to_array()));
    }
    image
}
