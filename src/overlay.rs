// Debug drawing on top of a panel framebuffer.
// Visual effects provided here:
// 1) The raw 8x8 depth grid as gray squares (near = dark), with the tracked zone in red.
// 2) A crosshair showing where the eyes are heading.
// 3) A tiny 5x7 bitmap font for the FPS / state HUD and the boot splash.
// Everything is written in panel bus order, same as the renderer.

use crate::palette::{gray, to_bus, BLACK, RED};
use crate::types::{DepthGrid, EyePosition, FrameBuffer, GridCell, GRID_SIDE};

/// Distances mapped onto the gray ramp of the depth grid.
const GRID_NEAR_MM: i32 = 10;
const GRID_FAR_MM: i32 = 500;

/// Glyph cell size including the 1-pixel gap.
const GLYPH_ADVANCE: i32 = 6;
const GLYPH_HEIGHT: i32 = 7;

/// Put a pixel on the framebuffer if (x,y) is inside bounds.
#[inline]
fn put_pixel(fb: &mut FrameBuffer, x: i32, y: i32, color: u16) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    let idx = y * fb.width + x;
    fb.pixels[idx] = to_bus(color);
}

/// Filled axis-aligned square, clipped to the panel.
fn fill_rect(fb: &mut FrameBuffer, x: i32, y: i32, w: i32, h: i32, color: u16) {
    for py in y..y + h {
        for px in x..x + w {
            put_pixel(fb, px, py, color);
        }
    }
}

/// A "+" centred at (cx, cy) with arms `size` pixels long.
pub fn draw_crosshair(fb: &mut FrameBuffer, cx: i32, cy: i32, size: i32, color: u16) {
    for x in (cx - size)..=(cx + size) {
        put_pixel(fb, x, cy, color);
    }
    for y in (cy - size)..=(cy + size) {
        put_pixel(fb, cx, y, color);
    }
}

/// Draw the depth grid as a `size` x `size` square with its top-left at (x, y).
///
/// The grid is shown transposed so it matches what the eye does: screen
/// columns follow grid rows (the eye's x axis), screen rows follow grid columns.
pub fn draw_depth_grid(
    fb: &mut FrameBuffer,
    x: i32,
    y: i32,
    size: i32,
    grid: &DepthGrid,
    highlight: Option<GridCell>,
) {
    let cell = size / GRID_SIDE as i32;
    for screen_col in 0..GRID_SIDE {
        for screen_row in 0..GRID_SIDE {
            let (row, col) = (screen_col, screen_row);
            let color = if highlight == Some(GridCell { row, col }) {
                RED
            } else {
                let d = grid.zone(row, col).distance_mm as i32;
                let level = ((d - GRID_NEAR_MM) * 255 / (GRID_FAR_MM - GRID_NEAR_MM)).clamp(0, 255);
                gray(level as u8)
            };
            fill_rect(
                fb,
                x + screen_col as i32 * cell,
                y + screen_row as i32 * cell,
                cell,
                cell,
                color,
            );
        }
    }
}

/// Crosshair at a normalized eye position, mapped into the debug grid square.
pub fn draw_aim_marker(fb: &mut FrameBuffer, x: i32, y: i32, size: i32, aim: EyePosition, color: u16) {
    let half = size as f32 / 2.0;
    let cx = x + (half + aim.x.clamp(-1.0, 1.0) * half) as i32;
    let cy = y + (half + aim.y.clamp(-1.0, 1.0) * half) as i32;
    draw_crosshair(fb, cx, cy, 3, color);
}

/* ---------- 5x7 bitmap font (HUD + splash character set) ---------- */

/// Return a 5x7 glyph bitmap for a limited character set.
/// Each u8 is a row; the low 5 bits are the pixels (bit 4 = leftmost).
fn glyph5x7(ch: char) -> Option<[u8; 7]> {
    macro_rules! g { ($a:expr,$b:expr,$c:expr,$d:expr,$e:expr,$f:expr,$g:expr) => {
        Some([$a,$b,$c,$d,$e,$f,$g])
    }; }

    match ch.to_ascii_uppercase() {
        '0' => g!(0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110),
        '1' => g!(0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110),
        '2' => g!(0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111),
        '3' => g!(0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110),
        '4' => g!(0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010),
        '5' => g!(0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110),
        '6' => g!(0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110),
        '7' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000),
        '8' => g!(0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110),
        '9' => g!(0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100),

        'A' => g!(0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'C' => g!(0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110),
        'D' => g!(0b11100,0b10010,0b10001,0b10001,0b10001,0b10010,0b11100),
        'E' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111),
        'F' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b10000),
        'H' => g!(0b10001,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'I' => g!(0b01110,0b00100,0b00100,0b00100,0b00100,0b00100,0b01110),
        'K' => g!(0b10001,0b10010,0b10100,0b11000,0b10100,0b10010,0b10001),
        'L' => g!(0b10000,0b10000,0b10000,0b10000,0b10000,0b10000,0b11111),
        'O' => g!(0b01110,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'P' => g!(0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000),
        'R' => g!(0b11110,0b10001,0b10001,0b11110,0b10100,0b10010,0b10001),
        'S' => g!(0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110),
        'T' => g!(0b11111,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        'Y' => g!(0b10001,0b10001,0b01010,0b00100,0b00100,0b00100,0b00100),

        ' ' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b00000),
        '|' => g!(0b00100,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        ':' => g!(0b00000,0b00100,0b00000,0b00000,0b00100,0b00000,0b00000),
        '.' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00100,0b00000),
        '-' => g!(0b00000,0b00000,0b00000,0b11111,0b00000,0b00000,0b00000),

        _ => None,
    }
}

/// Pixel width of `text` at the given integer scale.
pub fn text_width(text: &str, scale: i32) -> i32 {
    let n = text.chars().count() as i32;
    if n == 0 { 0 } else { (n * GLYPH_ADVANCE - 1) * scale }
}

pub fn text_height(scale: i32) -> i32 {
    GLYPH_HEIGHT * scale
}

/// Draw a single 5x7 character at (x,y), each font pixel a `scale` x `scale` block,
/// with a 1-pixel black shadow for contrast.
fn draw_char_5x7(fb: &mut FrameBuffer, x: i32, y: i32, ch: char, color: u16, scale: i32) {
    let Some(rows) = glyph5x7(ch) else {
        return;
    };
    for (shadow, c) in [(1, BLACK), (0, color)] {
        for (ry, rowbits) in rows.iter().enumerate() {
            for rx in 0..5 {
                if (rowbits & (1 << (4 - rx))) != 0 {
                    fill_rect(
                        fb,
                        x + rx * scale + shadow,
                        y + ry as i32 * scale + shadow,
                        scale,
                        scale,
                        c,
                    );
                }
            }
        }
    }
}

/// Draw a text string using 5x7 glyphs; unknown characters leave a gap.
pub fn draw_text_5x7(fb: &mut FrameBuffer, mut x: i32, y: i32, text: &str, color: u16, scale: i32) {
    for ch in text.chars() {
        draw_char_5x7(fb, x, y, ch, color, scale);
        x += GLYPH_ADVANCE * scale;
    }
}

/// Text centred horizontally on the panel.
pub fn draw_text_centered(fb: &mut FrameBuffer, y: i32, text: &str, color: u16, scale: i32) {
    let x = (fb.width as i32 - text_width(text, scale)) / 2;
    draw_text_5x7(fb, x, y, text, color, scale);
}

/// Boot screen: black panel with the splash text in the middle.
pub fn draw_splash(fb: &mut FrameBuffer, text: &str, color: u16) {
    fb.pixels.fill(to_bus(BLACK));
    let scale = 3;
    let y = (fb.height as i32 - text_height(scale)) / 2;
    draw_text_centered(fb, y, text, color, scale);
}
