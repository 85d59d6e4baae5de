//! Color similarity for background selection.
//!
//! Similarity is the Euclidean distance between two colors in RGB space.
//! The user-facing tolerance slider (0–100) maps linearly onto
//! `[0, THRESHOLD_SCALE]`, so tolerance 0 accepts only the exact target
//! color. `THRESHOLD_SCALE` sits just under [`MAX_DISTANCE`], so even
//! tolerance 100 keeps exact opposites (black against white) apart.

use serde::{Deserialize, Serialize};

use crate::types::RgbaImage;

/// Largest possible distance between two RGB colors: `sqrt(3 * 255²)`.
pub const MAX_DISTANCE: f64 = 441.672_955_930_063_7;

/// Threshold at tolerance 100.
pub const THRESHOLD_SCALE: f64 = 441.67;

/// An opaque RGB color (alpha is never part of the comparison).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// Pure black.
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// Pure white.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Create a new color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// The RGB part of a pixel.
    #[must_use]
    pub const fn of(pixel: image::Rgba<u8>) -> Self {
        let [r, g, b, _] = pixel.0;
        Self { r, g, b }
    }

    /// Parse a `RRGGBB` hex string, with or without a leading `#`.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Euclidean distance between two colors, in `[0, MAX_DISTANCE]`.
#[must_use]
pub fn distance(a: Color, b: Color) -> f64 {
    let dr = f64::from(a.r) - f64::from(b.r);
    let dg = f64::from(a.g) - f64::from(b.g);
    let db = f64::from(a.b) - f64::from(b.b);
    dr.mul_add(dr, dg.mul_add(dg, db * db)).sqrt()
}

/// Map a tolerance slider value (0–100) to an absolute distance threshold.
///
/// Values above 100 are not clamped; callers clamp before invoking the
/// pipeline.
#[must_use]
pub fn threshold_for(tolerance: u8) -> f64 {
    f64::from(tolerance) / 100.0 * THRESHOLD_SCALE
}

/// Whether `pixel` is close enough to `target` to count as background.
///
/// The comparison is inclusive: a pixel exactly `threshold` away matches.
#[must_use]
pub fn matches(pixel: Color, target: Color, threshold: f64) -> bool {
    distance(pixel, target) <= threshold
}

/// Sample the color under `(x, y)`.
///
/// Returns `None` when the coordinate lies outside the image or the pixel
/// is fully transparent; clicking empty space selects nothing.
#[must_use]
pub fn pick_color(image: &RgbaImage, x: u32, y: u32) -> Option<Color> {
    let pixel = image.get_pixel_checked(x, y)?;
    (pixel.0[3] != 0).then(|| Color::of(*pixel))
}
