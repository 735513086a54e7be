// Paints one eye into one panel framebuffer.
// What ends up on screen:
// - the eye texture, shifted by the smoothed aim (up to `max_offset_px` each way),
// - cut to the round panel using the precomputed scanline mask,
// - with rows hidden top and bottom by the eyelid level,
// - with color-keyed pixels left untouched (whatever was drawn before shows through).
// Pixels are stored in the panel's bus byte order; nothing outside this module cares.

use std::path::Path;

use crate::error::Result;
use crate::fixed::{FixedAccumulator, FixedStep};
use crate::mask::ScanlineMask;
use crate::palette::to_bus;
use crate::texture::Texture;
use crate::types::{EyeImage, EyePosition, FrameBuffer};

/// Eyelid level at which the eye is fully shut.
pub const EYELID_CLOSED: u8 = 128;

#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub panel_width: usize,
    pub panel_height: usize,
    pub texture_width: usize,
    pub texture_height: usize,
    /// Source color treated as transparent.
    pub color_key: u16,
    /// Pixels the eye travels at a normalized position of +/-1.
    pub max_offset_px: i32,
    /// Top-left of the texture at rest; centres it on the panel.
    pub resting_offset: i32,
    /// Source pixels per destination pixel.
    pub scale: FixedStep,
    /// 0 = open .. `EYELID_CLOSED` = shut.
    pub eyelid_level: u8,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let panel = crate::config::DEFAULT_PANEL_SIZE;
        let texture = crate::config::DEFAULT_TEXTURE_SIZE;
        Self {
            panel_width: panel,
            panel_height: panel,
            texture_width: texture,
            texture_height: texture,
            color_key: 0x0000,
            max_offset_px: 55,
            resting_offset: (panel as i32 - texture as i32) / 2,
            scale: FixedStep::ONE,
            eyelid_level: 0,
        }
    }
}

impl RenderConfig {
    /// Change the scale and re-centre the resting offset for it.
    pub fn with_scale(mut self, scale: FixedStep) -> Self {
        self.scale = scale;
        let shown = scale.scaled_len(self.texture_width) as i32;
        self.resting_offset = (self.panel_width as i32 - shown) / 2;
        self
    }
}

pub struct Renderer {
    cfg: RenderConfig,
    mask: ScanlineMask,
    textures: [Option<Texture>; EyeImage::COUNT],
}

impl Renderer {
    /// Builds the circular mask for the panel. Textures start unset.
    pub fn new(cfg: RenderConfig) -> Self {
        let mask = ScanlineMask::circular(cfg.panel_width, cfg.panel_height);
        Self {
            cfg,
            mask,
            textures: [None, None],
        }
    }

    #[cfg(test)]
    pub fn mask(&self) -> &ScanlineMask {
        &self.mask
    }

    /// Install a texture. Ignored (returns false) if its size isn't the configured one.
    #[cfg(test)]
    pub fn set_texture(&mut self, image: EyeImage, texture: Texture) -> bool {
        if texture.width() != self.cfg.texture_width || texture.height() != self.cfg.texture_height {
            return false;
        }
        self.textures[image.index()] = Some(texture);
        true
    }

    /// Load and install a texture from disk at the configured size.
    /// On error the variant stays unset and simply won't be drawn.
    pub fn load_texture(&mut self, image: EyeImage, path: &Path) -> Result<()> {
        let texture = Texture::load(path, self.cfg.texture_width, self.cfg.texture_height)?;
        self.textures[image.index()] = Some(texture);
        Ok(())
    }

    pub fn has_texture(&self, image: EyeImage) -> bool {
        self.textures[image.index()].is_some()
    }

    /// Fill the whole panel with one color.
    pub fn clear(&self, fb: &mut FrameBuffer, color: u16) {
        fb.pixels.fill(to_bus(color));
    }

    /// Top-left destination pixel for a normalized eye position.
    pub fn placement(&self, position: EyePosition) -> (i32, i32) {
        let max = self.cfg.max_offset_px as f32;
        let dx = (position.x.clamp(-1.0, 1.0) * max) as i32;
        let dy = (position.y.clamp(-1.0, 1.0) * max) as i32;
        (self.cfg.resting_offset + dx, self.cfg.resting_offset + dy)
    }

    /// Draw one eye. Returns how many panel rows received pixels.
    /// An unloaded texture variant draws nothing.
    pub fn draw(
        &self,
        fb: &mut FrameBuffer,
        position: EyePosition,
        eyelid_level: u8,
        image: EyeImage,
    ) -> usize {
        let (x_pos, y_pos) = self.placement(position);
        self.draw_at(fb, x_pos, y_pos, eyelid_level, image)
    }

    /// Draw one eye with its top-left texel at panel pixel (x_pos, y_pos).
    pub fn draw_at(
        &self,
        fb: &mut FrameBuffer,
        x_pos: i32,
        y_pos: i32,
        eyelid_level: u8,
        image: EyeImage,
    ) -> usize {
        let Some(texture) = &self.textures[image.index()] else {
            return 0;
        };
        if fb.width != self.mask.width() || fb.height != self.mask.height() {
            return 0;
        }

        let step = self.cfg.scale;
        let scaled_w = step.scaled_len(texture.width()) as i64;
        let scaled_h = step.scaled_len(texture.height()) as i64;
        let key = self.cfg.color_key;

        // Eyelid band: rows hidden from the top and, symmetrically, the bottom.
        let level = eyelid_level.min(EYELID_CLOSED) as u64;
        let cutoff = (level * scaled_h as u64).div_ceil(2 * EYELID_CLOSED as u64) as i64;

        // Texture rows that are both open and on the panel.
        let (x_pos, y_pos) = (x_pos as i64, y_pos as i64);
        let first = cutoff.max(-y_pos);
        let last = (scaled_h - cutoff).min(fb.height as i64 - y_pos);
        if first >= last {
            return 0;
        }

        let mut rows = 0;
        let mut src_y = FixedAccumulator::starting_at(first as usize, step);
        for y in first..last {
            let dest_y = (y_pos + y) as usize;
            let src_row = src_y.index();
            src_y.advance();

            let Some(span) = self.mask.row(dest_y) else {
                continue;
            };
            let x_start = (span.x_start as i64).max(x_pos);
            let x_end = (span.x_end as i64).min(x_pos + scaled_w);
            if x_start >= x_end {
                continue;
            }

            let source = texture.row(src_row);
            let target = &mut fb.row_mut(dest_y)[x_start as usize..x_end as usize];
            let mut src_x = FixedAccumulator::starting_at((x_start - x_pos) as usize, step);
            for dst in target {
                let color = source[src_x.index()];
                if color != key {
                    *dst = to_bus(color);
                }
                src_x.advance();
            }
            rows += 1;
        }
        rows
    }
}
