// Precomputed visible span of the round panel, one entry per row.
// Built once at startup so the draw loop never touches a square root.

/// Half-open visible span `[x_start, x_end)` of one panel row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scanline {
    pub x_start: usize,
    pub x_end: usize,
}

#[derive(Clone, Debug)]
pub struct ScanlineMask {
    width: usize,
    rows: Vec<Option<Scanline>>,
}

impl ScanlineMask {
    /// Circle inscribed in the panel's square (radius = half the shorter side).
    /// Rows the circle doesn't reach get `None`.
    pub fn circular(width: usize, height: usize) -> Self {
        let center = (width.min(height) / 2) as i64;
        let radius_sq = center * center;
        let rows = (0..height)
            .map(|y| {
                let dy = y as i64 - center;
                let dy_sq = dy * dy;
                if dy_sq >= radius_sq {
                    return None;
                }
                let extent = ((radius_sq - dy_sq) as f64).sqrt() as i64;
                let x_start = (center - extent).max(0) as usize;
                let x_end = ((center + extent) as usize).min(width);
                Some(Scanline { x_start, x_end })
            })
            .collect();
        Self { width, rows }
    }

    /// Span for row `y`, `None` if the row is fully masked or off-panel.
    #[inline]
    pub fn row(&self, y: usize) -> Option<Scanline> {
        self.rows.get(y).copied().flatten()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Is pixel (x, y) inside the visible circle?
    #[cfg(test)]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        self.row(y).is_some_and(|s| x >= s.x_start && x < s.x_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_240() {
        let mask = ScanlineMask::circular(240, 240);
        assert_eq!(mask.height(), 240);
        // top row touches the circle only at a tangent point: not drawable
        assert_eq!(mask.row(0), None);
        // the equator spans the full panel
        assert_eq!(mask.row(120), Some(Scanline { x_start: 0, x_end: 240 }));
        assert_eq!(mask.row(240), None);
    }

    #[test]
    fn test_spans_are_symmetric_and_in_bounds() {
        let mask = ScanlineMask::circular(240, 240);
        for y in 1..240 {
            let s = mask.row(y).unwrap();
            assert!(s.x_start < s.x_end && s.x_end <= 240);
            assert_eq!(120 - s.x_start, s.x_end - 120, "row {y}");
        }
    }

    #[test]
    fn test_corners_are_masked() {
        let mask = ScanlineMask::circular(240, 240);
        assert!(!mask.contains(0, 0));
        assert!(!mask.contains(239, 239));
        assert!(!mask.contains(5, 20));
        assert!(mask.contains(120, 120));
    }

    #[test]
    fn test_non_square_panel_stays_in_bounds() {
        let mask = ScanlineMask::circular(100, 60);
        for y in 0..60 {
            if let Some(s) = mask.row(y) {
                assert!(s.x_end <= 100);
            }
        }
        assert_eq!(mask.row(30), Some(Scanline { x_start: 0, x_end: 60 }));
    }
}
