// Turns one noisy 8x8 depth grid into at most one target.
// A single close zone is easy to get from noise; a close zone whose 3x3
// neighbourhood is also close is much more likely to be a real object.
// So every zone is scored by the average distance of its reliable neighbours
// and the lowest-average window wins.

use crate::types::{DepthGrid, GridCell, Target, GRID_SIDE};

/// Grid index 0..7 -> -1.0..1.0, exact at both ends.
const GRID_HALF_SPAN: f32 = (GRID_SIDE as f32 - 1.0) / 2.0;

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Zones at or beyond this distance are ignored.
    pub max_distance_mm: u16,
    /// Reliable zones (centre included) a 3x3 window needs to count.
    pub min_reliable_neighbors: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_distance_mm: 400,
            min_reliable_neighbors: 4,
        }
    }
}

/// Window statistics for one candidate centre.
#[derive(Clone, Copy, Debug)]
struct Window {
    sum: u32,
    count: u32,
}

impl Window {
    /// Lower average wins; on an equal average the window backed by more
    /// reliable zones wins. Averages are compared without division.
    #[inline]
    fn beats(&self, other: &Window) -> bool {
        let lhs = self.sum as u64 * other.count as u64;
        let rhs = other.sum as u64 * self.count as u64;
        lhs < rhs || (lhs == rhs && self.count > other.count)
    }
}

#[inline]
fn normalize(index: usize) -> f32 {
    (index as f32 - GRID_HALF_SPAN) / GRID_HALF_SPAN
}

/// Pick the centre of the closest reliable 3x3 region.
///
/// Equal averages are NOT settled by plain row-major scan order. A clipped
/// window at the edge of a blob can average exactly as low as the blob's
/// centre, and scan order would then pick the edge. So on an equal average
/// the window with more reliable zones wins, and only a full tie goes to the
/// first candidate in row-major order. `test_blob_at_three_three` pins this.
/// Never fails: "nothing close enough" is `Target::none()`.
pub fn find_target(grid: &DepthGrid, cfg: &TrackerConfig) -> Target {
    let reliable = |row: usize, col: usize| {
        let z = grid.zone(row, col);
        z.is_valid() && z.distance_mm < cfg.max_distance_mm
    };

    let mut best: Option<(GridCell, Window)> = None;

    for row in 0..GRID_SIDE {
        for col in 0..GRID_SIDE {
            if !reliable(row, col) {
                continue;
            }

            // 3x3 window, clipped at the grid edge
            let mut window = Window { sum: 0, count: 0 };
            for nr in row.saturating_sub(1)..=(row + 1).min(GRID_SIDE - 1) {
                for nc in col.saturating_sub(1)..=(col + 1).min(GRID_SIDE - 1) {
                    if reliable(nr, nc) {
                        window.sum += grid.zone(nr, nc).distance_mm as u32;
                        window.count += 1;
                    }
                }
            }

            if (window.count as usize) < cfg.min_reliable_neighbors {
                continue;
            }
            let better = match &best {
                None => true,
                Some((_, current)) => window.beats(current),
            };
            if better {
                best = Some((GridCell { row, col }, window));
            }
        }
    }

    match best {
        Some((cell, window)) => Target {
            x: normalize(cell.row),
            y: normalize(cell.col),
            distance_mm: grid.zone(cell.row, cell.col).distance_mm,
            is_valid: true,
            score: window.sum / window.count,
            cell: Some(cell),
        },
        None => Target::none(),
    }
}
