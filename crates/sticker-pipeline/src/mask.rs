//! Binary silhouette masks.
//!
//! A [`Mask`] is a `GrayImage` holding only 0 (empty) and 255 (set),
//! plus an `offset` that records where the source image's origin sits
//! inside the mask. Stages that grow the canvas (dilation, padding) bump
//! the offset instead of re-indexing pixels, and the boolean operations
//! below align two masks through their offsets so they can be combined
//! even when their canvases differ in size.

use image::Luma;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::types::{GrayImage, RgbaImage};

const SET: Luma<u8> = Luma([255]);
const EMPTY: Luma<u8> = Luma([0]);

/// A binary mask positioned relative to the source image frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pixels: GrayImage,
    offset: u32,
}

impl Mask {
    /// An empty mask whose canvas places the source origin at
    /// `(offset, offset)`.
    #[must_use]
    pub fn new(width: u32, height: u32, offset: u32) -> Self {
        Self {
            pixels: GrayImage::new(width, height),
            offset,
        }
    }

    /// The silhouette of an image: every pixel with non-zero alpha.
    #[must_use]
    pub fn from_alpha(image: &RgbaImage) -> Self {
        let pixels = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            if image.get_pixel(x, y).0[3] == 0 {
                EMPTY
            } else {
                SET
            }
        });
        Self { pixels, offset: 0 }
    }

    /// Canvas width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Canvas height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Distance from the canvas origin to the source image origin, on
    /// both axes.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// The underlying raster (0 / 255).
    #[must_use]
    pub const fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }

    /// Whether the canvas pixel `(x, y)` is set. Out-of-range is empty.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.pixels.get_pixel_checked(x, y).is_some_and(|p| p.0[0] != 0)
    }

    /// Set or clear the canvas pixel `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the canvas.
    pub fn put(&mut self, x: u32, y: u32, value: bool) {
        self.pixels.put_pixel(x, y, if value { SET } else { EMPTY });
    }

    /// Whether the pixel at source-frame coordinates `(sx, sy)` is set.
    #[must_use]
    pub fn contains_source(&self, sx: i64, sy: i64) -> bool {
        let x = sx + i64::from(self.offset);
        let y = sy + i64::from(self.offset);
        match (u32::try_from(x), u32::try_from(y)) {
            (Ok(x), Ok(y)) => self.get(x, y),
            _ => false,
        }
    }

    /// Number of set pixels.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.pixels.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
    }

    /// Whether no pixel is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.pixels().all(|p| p.0[0] == 0)
    }

    /// Number of 4-connected fragments of set pixels.
    #[must_use]
    pub fn fragments(&self) -> u32 {
        connected_components(self.as_gray(), Connectivity::Four, EMPTY)
            .pixels()
            .map(|label| label.0[0])
            .max()
            .unwrap_or(0)
    }

    /// Copy with a transparent border of `extra` pixels on every side.
    #[must_use]
    pub fn padded(&self, extra: u32) -> Self {
        let mut out = Self::new(
            self.width() + 2 * extra,
            self.height() + 2 * extra,
            self.offset + extra,
        );
        for (x, y, p) in self.pixels.enumerate_pixels() {
            if p.0[0] != 0 {
                out.put(x + extra, y + extra, true);
            }
        }
        out
    }

    /// Set every pixel that is set in `other` (A ∪ B), clipped to this
    /// canvas.
    pub fn union(&mut self, other: &Self) {
        self.combine(other, true);
    }

    /// Clear every pixel that is set in `other` (A \ B).
    pub fn subtract(&mut self, other: &Self) {
        self.combine(other, false);
    }

    /// Write `value` wherever `other` is set, translating `other`'s canvas
    /// into this one through both offsets.
    fn combine(&mut self, other: &Self, value: bool) {
        let shift = i64::from(self.offset) - i64::from(other.offset);
        let (width, height) = (i64::from(self.width()), i64::from(self.height()));
        for (ox, oy, p) in other.pixels.enumerate_pixels() {
            if p.0[0] == 0 {
                continue;
            }
            let x = i64::from(ox) + shift;
            let y = i64::from(oy) + shift;
            if (0..width).contains(&x)
                && (0..height).contains(&y)
                && let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y))
            {
                self.put(x, y, value);
            }
        }
    }

    /// Iterate the horizontal runs of set pixels in row `y` as inclusive
    /// `(start, end)` column pairs.
    pub(crate) fn runs(&self, y: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width();
        let mut x = 0;
        std::iter::from_fn(move || {
            while x < width && !self.get(x, y) {
                x += 1;
            }
            if x >= width {
                return None;
            }
            let start = x;
            while x < width && self.get(x, y) {
                x += 1;
            }
            Some((start, x - 1))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> Mask {
        let height = u32::try_from(rows.len()).unwrap_or(0);
        let width = u32::try_from(rows.first().map_or(0, |r| r.len())).unwrap_or(0);
        let mut mask = Mask::new(width, height, 0);
        for (y, row) in (0..).zip(rows) {
            for (x, c) in (0..).zip(row.chars()) {
                mask.put(x, y, c == '#');
            }
        }
        mask
    }

    #[test]
    fn from_alpha_marks_non_transparent_pixels() {
        let mut img = RgbaImage::new(3, 1);
        img.put_pixel(0, 0, image::Rgba([0, 0, 0, 255]));
        img.put_pixel(2, 0, image::Rgba([0, 0, 0, 1]));
        let mask = Mask::from_alpha(&img);
        assert!(mask.get(0, 0));
        assert!(!mask.get(1, 0));
        assert!(mask.get(2, 0));
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.offset(), 0);
    }

    #[test]
    fn get_out_of_range_is_empty() {
        let mask = mask_from(&["##", "##"]);
        assert!(!mask.get(2, 0));
        assert!(!mask.get(0, 5));
    }

    #[test]
    fn padded_shifts_content_and_offset() {
        let mask = mask_from(&["#."]);
        let padded = mask.padded(2);
        assert_eq!((padded.width(), padded.height()), (6, 5));
        assert_eq!(padded.offset(), 2);
        assert!(padded.get(2, 2));
        assert!(!padded.get(3, 2));
        assert_eq!(padded.count(), 1);
        assert!(padded.contains_source(0, 0));
        assert!(!padded.contains_source(1, 0));
    }

    #[test]
    fn contains_source_outside_canvas_is_false() {
        let mask = mask_from(&["#"]).padded(1);
        assert!(!mask.contains_source(-2, 0));
        assert!(!mask.contains_source(0, 9));
    }

    #[test]
    fn union_aligns_offsets() {
        let mut big = Mask::new(5, 5, 2);
        let small = mask_from(&["#"]);
        big.union(&small);
        assert!(big.get(2, 2));
        assert_eq!(big.count(), 1);
    }

    #[test]
    fn subtract_clears_overlap_only() {
        let mut a = mask_from(&["###"]);
        let b = mask_from(&[".#."]);
        a.subtract(&b);
        assert!(a.get(0, 0));
        assert!(!a.get(1, 0));
        assert!(a.get(2, 0));
    }

    #[test]
    fn union_clips_to_canvas() {
        let mut small = mask_from(&["."]);
        let big = mask_from(&["###", "###"]).padded(3);
        small.union(&big);
        assert!(small.get(0, 0));
        assert_eq!(small.count(), 1);
    }

    #[test]
    fn runs_finds_every_segment() {
        let mask = mask_from(&["##..###.#"]);
        let runs: Vec<_> = mask.runs(0).collect();
        assert_eq!(runs, vec![(0, 1), (4, 6), (8, 8)]);
    }

    #[test]
    fn runs_of_empty_row() {
        let mask = mask_from(&["...."]);
        assert_eq!(mask.runs(0).count(), 0);
    }

    #[test]
    fn raster_holds_only_zero_and_full() {
        let mask = mask_from(&["#.", ".#"]);
        let values: Vec<u8> = mask.as_gray().pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![255, 0, 0, 255]);
    }

    #[test]
    fn fragments_use_four_connectivity() {
        let mask = mask_from(&["#.#", ".#.", "##."]);
        // The diagonal touches do not join; the bottom pair does.
        assert_eq!(mask.fragments(), 3);
        assert_eq!(Mask::new(2, 2, 0).fragments(), 0);
    }

    #[test]
    fn is_empty_reports_blank_canvas() {
        assert!(Mask::new(4, 4, 0).is_empty());
        assert!(!mask_from(&[".#"]).is_empty());
    }
}
