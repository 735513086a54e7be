// RGB565 color helpers.
// The preview window wants 0x00RRGGBB per pixel; panels want RGB565 in bus
// order. The expansion tables are built once so presenting a frame is two
// lookups per pixel instead of shifts and multiplies.

pub const BLACK: u16 = 0x0000;
pub const WHITE: u16 = 0xFFFF;
pub const RED: u16 = 0xF800;
pub const GREEN: u16 = 0x07E0;

/// Native RGB565 -> panel bus order (byte-swapped, as the SPI panels expect).
#[inline]
pub fn to_bus(color: u16) -> u16 {
    color.swap_bytes()
}

/// Panel bus order -> native RGB565.
#[inline]
pub fn from_bus(color: u16) -> u16 {
    color.swap_bytes()
}

/// Gray level 0..255 as RGB565.
#[inline]
pub fn gray(level: u8) -> u16 {
    let r = (level >> 3) as u16;
    let g = (level >> 2) as u16;
    let b = (level >> 3) as u16;
    (r << 11) | (g << 5) | b
}

pub struct Rgb565Lut {
    // 5-bit channel (0..31) -> 8-bit
    five_to_eight: [u8; 32],
    // 6-bit channel (0..63) -> 8-bit
    six_to_eight: [u8; 64],
}

impl Rgb565Lut {
    /// Build both tables once at startup.
    pub fn new() -> Self {
        let mut five = [0u8; 32];
        for (v, out) in five.iter_mut().enumerate() {
            *out = ((v as u32 * 255 + 15) / 31) as u8;
        }
        let mut six = [0u8; 64];
        for (v, out) in six.iter_mut().enumerate() {
            *out = ((v as u32 * 255 + 31) / 63) as u8;
        }
        Self { five_to_eight: five, six_to_eight: six }
    }

    /// Native RGB565 -> 0x00RRGGBB.
    #[inline]
    pub fn to_rgb32(&self, color: u16) -> u32 {
        let r = self.five_to_eight[(color >> 11) as usize & 0x1F] as u32;
        let g = self.six_to_eight[(color >> 5) as usize & 0x3F] as u32;
        let b = self.five_to_eight[color as usize & 0x1F] as u32;
        (r << 16) | (g << 8) | b
    }

    /// Bus-order pixel straight out of a framebuffer -> 0x00RRGGBB.
    #[inline]
    pub fn bus_to_rgb32(&self, bus: u16) -> u32 {
        self.to_rgb32(from_bus(bus))
    }
}

impl Default for Rgb565Lut {
    fn default() -> Self {
        Self::new()
    }
}
