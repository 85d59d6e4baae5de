//! Disk dilation (Minkowski sum of a mask with a disk).
//!
//! The structuring element is the exact discrete disk
//! `{(dx, dy) : dx² + dy² <= r²}`. Rather than stamping the disk once
//! per set pixel, each horizontal run of the input is swept by every
//! chord of the disk and the resulting spans are accumulated in a
//! per-row difference array, so the cost is proportional to
//! `runs × (2r + 1)` instead of `pixels × r²`.

use crate::mask::Mask;

/// A discrete disk described by the half-width of each of its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    radius: u32,
    /// `half_widths[|dy|] = floor(sqrt(r² - dy²))`.
    half_widths: Vec<u32>,
}

impl Disk {
    /// Rasterize a disk of the given radius.
    #[must_use]
    pub fn new(radius: u32) -> Self {
        let r2 = u64::from(radius) * u64::from(radius);
        let half_widths = (0..=u64::from(radius))
            .map(|dy| u32::try_from((r2 - dy * dy).isqrt()).unwrap_or(radius))
            .collect();
        Self {
            radius,
            half_widths,
        }
    }

    /// Radius in pixels.
    #[must_use]
    pub const fn radius(&self) -> u32 {
        self.radius
    }

    /// Half-width of the chord `dy` rows away from the centre, or `None`
    /// outside the disk.
    #[must_use]
    pub fn half_width(&self, dy: i64) -> Option<u32> {
        usize::try_from(dy.unsigned_abs())
            .ok()
            .and_then(|i| self.half_widths.get(i).copied())
    }

    /// Whether the offset `(dx, dy)` lies inside the disk.
    #[must_use]
    pub fn contains(&self, dx: i64, dy: i64) -> bool {
        self.half_width(dy)
            .is_some_and(|hw| dx.unsigned_abs() <= u64::from(hw))
    }
}

/// Dilate `mask` by a disk of `radius` pixels.
///
/// The output canvas grows by `radius` on every side so nothing is
/// clipped, and its offset grows by the same amount: the input pixel at
/// canvas `(x, y)` sits at `(x + radius, y + radius)` in the output.
/// A radius of zero returns an unchanged copy.
#[must_use]
pub fn dilate(mask: &Mask, radius: u32) -> Mask {
    if radius == 0 {
        return mask.clone();
    }

    let disk = Disk::new(radius);
    let out_w = mask.width() + 2 * radius;
    let out_h = mask.height() + 2 * radius;
    let stride = out_w as usize + 1;
    let mut diff = vec![0i32; stride * out_h as usize];

    for y in 0..mask.height() {
        for (start, end) in mask.runs(y) {
            for (dy, &hw) in (0..).zip(&disk.half_widths) {
                // Chords above and below the centre share a half-width.
                let rows = [y + radius - dy, y + radius + dy];
                let rows = if dy == 0 { &rows[..1] } else { &rows[..] };
                for &row in rows {
                    let base = row as usize * stride;
                    let lo = (start + radius - hw) as usize;
                    let hi = (end + radius + hw) as usize;
                    diff[base + lo] += 1;
                    diff[base + hi + 1] -= 1;
                }
            }
        }
    }

    let mut out = Mask::new(out_w, out_h, mask.offset() + radius);
    for row in 0..out_h {
        let base = row as usize * stride;
        let mut cover = 0;
        for col in 0..out_w {
            cover += diff[base + col as usize];
            if cover > 0 {
                out.put(col, row, true);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_pixel() -> Mask {
        let mut mask = Mask::new(1, 1, 0);
        mask.put(0, 0, true);
        mask
    }

    #[test]
    fn disk_half_widths() {
        let disk = Disk::new(3);
        assert_eq!(disk.half_width(0), Some(3));
        assert_eq!(disk.half_width(1), Some(2));
        assert_eq!(disk.half_width(-2), Some(2));
        assert_eq!(disk.half_width(3), Some(0));
        assert_eq!(disk.half_width(4), None);
    }

    #[test]
    fn disk_contains_is_exact() {
        let disk = Disk::new(5);
        assert!(disk.contains(3, 4));
        assert!(disk.contains(-5, 0));
        assert!(!disk.contains(4, 4));
        assert!(!disk.contains(0, 6));
    }

    #[test]
    fn zero_radius_is_identity() {
        let mask = single_pixel().padded(2);
        assert_eq!(dilate(&mask, 0), mask);
    }

    #[test]
    fn output_grows_by_radius_on_every_side() {
        let mask = Mask::new(7, 4, 1);
        let out = dilate(&mask, 5);
        assert_eq!((out.width(), out.height()), (17, 14));
        assert_eq!(out.offset(), 6);
    }

    #[test]
    fn single_pixel_becomes_exact_disk() {
        for radius in [1, 2, 5, 12] {
            let out = dilate(&single_pixel(), radius);
            let disk = Disk::new(radius);
            let r = i64::from(radius);
            for y in 0..out.height() {
                for x in 0..out.width() {
                    let inside = disk.contains(i64::from(x) - r, i64::from(y) - r);
                    assert_eq!(out.get(x, y), inside, "radius {radius} at ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn lattice_point_counts() {
        assert_eq!(dilate(&single_pixel(), 1).count(), 5);
        assert_eq!(dilate(&single_pixel(), 2).count(), 13);
    }

    #[test]
    fn dilation_is_a_superset() {
        let mut mask = Mask::new(6, 6, 0);
        for (x, y) in [(0, 0), (3, 2), (5, 5), (4, 2)] {
            mask.put(x, y, true);
        }
        let out = dilate(&mask, 3);
        for y in 0..6 {
            for x in 0..6 {
                if mask.get(x, y) {
                    assert!(out.get(x + 3, y + 3));
                }
            }
        }
    }

    #[test]
    fn runs_dilate_like_their_pixels() {
        // A horizontal bar dilated by r is a stadium: the union of the
        // per-pixel disks.
        let mut bar = Mask::new(5, 1, 0);
        for x in 0..5 {
            bar.put(x, 0, true);
        }
        let out = dilate(&bar, 4);
        let disk = Disk::new(4);
        for y in 0..out.height() {
            for x in 0..out.width() {
                let expected = (0..5).any(|px: i64| {
                    disk.contains(i64::from(x) - 4 - px, i64::from(y) - 4)
                });
                assert_eq!(out.get(x, y), expected, "({x}, {y})");
            }
        }
    }

    #[test]
    fn empty_mask_stays_empty() {
        let out = dilate(&Mask::new(3, 3, 0), 4);
        assert!(out.is_empty());
    }

    #[test]
    fn dilating_twice_accumulates_offset() {
        let out = dilate(&dilate(&single_pixel(), 2), 3);
        assert_eq!(out.offset(), 5);
        assert!(out.contains_source(0, 0));
        assert!(out.contains_source(5, 0));
        assert!(!out.contains_source(6, 0));
    }
}
