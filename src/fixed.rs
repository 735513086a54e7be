// 16.16 fixed-point stepping for the texture sampler.
// The renderer walks destination pixels one at a time and asks "which source
// pixel is this?"; the answer is the integer part of an accumulator that grows
// by a constant step. No floats in the inner loop.

pub const FRAC_BITS: u32 = 16;
const ONE_RAW: u32 = 1 << FRAC_BITS;

/// Source pixels advanced per destination pixel, as a 16.16 value.
/// `ONE` is a 1:1 copy; `from_ratio(1, 2)` doubles the texture on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedStep(u32);

impl FixedStep {
    pub const ONE: Self = Self(ONE_RAW);

    /// `src` source pixels for every `dst` destination pixels.
    /// Degenerate ratios clamp to the smallest representable step.
    pub fn from_ratio(src: u32, dst: u32) -> Self {
        if dst == 0 {
            return Self::ONE;
        }
        let raw = ((src as u64) << FRAC_BITS) / dst as u64;
        Self(raw.clamp(1, u32::MAX as u64) as u32)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// How many destination pixels it takes to cover `src_len` source pixels.
    /// Every destination offset below this maps to a source index `< src_len`.
    pub fn scaled_len(self, src_len: usize) -> usize {
        ((src_len as u64) << FRAC_BITS).div_ceil(self.0 as u64) as usize
    }
}

impl Default for FixedStep {
    fn default() -> Self {
        Self::ONE
    }
}

/// Running source position for one axis of a blit.
#[derive(Clone, Copy, Debug)]
pub struct FixedAccumulator {
    acc: u64,
    step: u64,
}

impl FixedAccumulator {
    /// Accumulator positioned `dest_offset` destination pixels into the texture.
    #[inline]
    pub fn starting_at(dest_offset: usize, step: FixedStep) -> Self {
        let step = step.raw() as u64;
        Self {
            acc: dest_offset as u64 * step,
            step,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.acc >> FRAC_BITS) as usize
    }

    #[inline]
    pub fn advance(&mut self) {
        self.acc += self.step;
    }
}
