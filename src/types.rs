// Core data passed along the per-tick pipeline:
// DepthGrid (sensor) -> Target (tracker) -> EyePosition (motion) -> FrameBuffer (renderer).

use std::fmt;

use crate::error::{Error, Result};

pub const GRID_SIDE: usize = 8;
pub const GRID_ZONES: usize = GRID_SIDE * GRID_SIDE;

/// VL53L5CX target status meaning "range valid".
pub const ZONE_STATUS_VALID: u8 = 5;

/// One ranging zone: distance plus the sensor's own status code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Zone {
    pub distance_mm: u16,
    pub status: u8,
}

impl Zone {
    pub const fn valid(distance_mm: u16) -> Self {
        Self { distance_mm, status: ZONE_STATUS_VALID }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.status == ZONE_STATUS_VALID
    }
}

/// 8x8 depth samples, row-major. Fresh every ranging cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepthGrid {
    zones: [Zone; GRID_ZONES],
}

impl Default for DepthGrid {
    fn default() -> Self {
        Self { zones: [Zone::default(); GRID_ZONES] }
    }
}

impl DepthGrid {
    #[cfg(test)]
    pub fn filled(zone: Zone) -> Self {
        Self { zones: [zone; GRID_ZONES] }
    }

    /// Build a grid from a per-(row, col) function.
    pub fn from_fn(mut f: impl FnMut(usize, usize) -> Zone) -> Self {
        let mut zones = [Zone::default(); GRID_ZONES];
        for (i, z) in zones.iter_mut().enumerate() {
            *z = f(i / GRID_SIDE, i % GRID_SIDE);
        }
        Self { zones }
    }

    #[inline]
    pub fn zone(&self, row: usize, col: usize) -> Zone {
        self.zones[row * GRID_SIDE + col]
    }

    #[cfg(test)]
    pub fn set(&mut self, row: usize, col: usize, zone: Zone) {
        self.zones[row * GRID_SIDE + col] = zone;
    }

    pub fn zones(&self) -> &[Zone; GRID_ZONES] {
        &self.zones
    }
}

// Python-friendly dump, handy for pasting captures into a notebook.
impl fmt::Display for DepthGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "distance_matrix = [")?;
        for row in 0..GRID_SIDE {
            write!(f, "  [")?;
            for col in 0..GRID_SIDE {
                let sep = if col + 1 < GRID_SIDE { ", " } else { "" };
                write!(f, "{:4}{}", self.zone(row, col).distance_mm, sep)?;
            }
            writeln!(f, "{}", if row + 1 < GRID_SIDE { "]," } else { "]" })?;
        }
        writeln!(f, "]")?;
        writeln!(f, "status_matrix = [")?;
        for row in 0..GRID_SIDE {
            write!(f, "  [")?;
            for col in 0..GRID_SIDE {
                let sep = if col + 1 < GRID_SIDE { ", " } else { "" };
                write!(f, "{}{}", self.zone(row, col).status, sep)?;
            }
            writeln!(f, "{}", if row + 1 < GRID_SIDE { "]," } else { "]" })?;
        }
        write!(f, "]")
    }
}

/// Grid coordinates of the zone a target was extracted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
}

/// Best guess of "where is the closest thing" for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Target {
    /// Normalized, from the grid row: -1.0 (row 0) .. 1.0 (row 7).
    pub x: f32,
    /// Normalized, from the grid column: -1.0 (col 0) .. 1.0 (col 7).
    pub y: f32,
    /// Raw distance of the winning zone.
    pub distance_mm: u16,
    pub is_valid: bool,
    /// Window-average distance of the winning zone; lower = more confident.
    pub score: u32,
    pub cell: Option<GridCell>,
}

impl Target {
    /// "Nothing found": sentinel (-1, -1), zero score, no cell.
    pub const fn none() -> Self {
        Self {
            x: -1.0,
            y: -1.0,
            distance_mm: 0,
            is_valid: false,
            score: 0,
            cell: None,
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::none()
    }
}

/// Smoothed aim of one eye, each axis in [-1, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EyePosition {
    pub x: f32,
    pub y: f32,
}

impl EyePosition {
    pub const REST: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Which eye art to paint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EyeImage {
    /// Relaxed eye used while idling.
    Idle,
    /// Focused eye used while a target is locked.
    Tracking,
}

impl EyeImage {
    pub const COUNT: usize = 2;

    #[inline]
    pub fn index(self) -> usize {
        match self {
            EyeImage::Idle => 0,
            EyeImage::Tracking => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EyeImage::Idle => "idle",
            EyeImage::Tracking => "tracking",
        }
    }
}

/// One panel's worth of pixels, RGB565 already in the panel's bus byte order.
#[derive(Clone, Debug)]
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u16>,
}

impl FrameBuffer {
    /// Allocate a zeroed buffer, reporting failure instead of aborting.
    pub fn try_new(width: usize, height: usize) -> Result<Self> {
        let len = width * height;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|_| Error::Allocation { bytes: len * std::mem::size_of::<u16>() })?;
        pixels.resize(len, 0);
        Ok(Self { width, height, pixels })
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u16] {
        let start = y * self.width;
        &mut self.pixels[start..start + self.width]
    }

    #[cfg(test)]
    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.pixels[y * self.width + x]
    }
}
