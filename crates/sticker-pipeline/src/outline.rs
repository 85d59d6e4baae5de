//! Outline compositing: a solid white ring under the cleaned image.

use image::Rgba;

use crate::dilate::dilate;
use crate::mask::Mask;
use crate::types::RgbaImage;

/// Color of the outline ring.
pub const OUTLINE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Compose the final sticker.
///
/// The output canvas is `(w + 2t) × (h + 2t)` for a `w × h` source and
/// thickness `t`. The silhouette is dilated by `t` and painted solid
/// white, clipped to that canvas, and the cleaned image is drawn
/// source-over on top at `(t, t)` so foreground colors are preserved and
/// only the surrounding ring shows white.
///
/// `silhouette` may come from the bridging stage, in which case its
/// offset places it relative to the source frame. When `thickness` is
/// zero and no bridging happened (`bridged == false`) the cleaned image
/// is returned unchanged.
///
/// Returns the sticker and the number of ring pixels, i.e. white pixels
/// not covered by an opaque-or-translucent source pixel.
#[must_use]
pub fn compose(
    cleaned: &RgbaImage,
    silhouette: &Mask,
    thickness: u32,
    bridged: bool,
) -> (RgbaImage, u64) {
    if thickness == 0 && !bridged {
        return (cleaned.clone(), 0);
    }

    let ring = dilate(silhouette, thickness);
    let t = i64::from(thickness);
    let mut canvas = RgbaImage::new(
        cleaned.width() + 2 * thickness,
        cleaned.height() + 2 * thickness,
    );
    let mut ring_pixels = 0;
    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let (sx, sy) = (i64::from(x) - t, i64::from(y) - t);
        if !ring.contains_source(sx, sy) {
            continue;
        }
        *pixel = OUTLINE;
        let covered = u32::try_from(sx)
            .ok()
            .zip(u32::try_from(sy).ok())
            .and_then(|(sx, sy)| cleaned.get_pixel_checked(sx, sy))
            .is_some_and(|p| p.0[3] != 0);
        if !covered {
            ring_pixels += 1;
        }
    }

    for (x, y, src) in cleaned.enumerate_pixels() {
        let dst = canvas.get_pixel_mut(x + thickness, y + thickness);
        *dst = source_over(*dst, *src);
    }
    (canvas, ring_pixels)
}

/// Porter-Duff source-over for straight (non-premultiplied) RGBA8.
///
/// Integer arithmetic with exact weights, so anything drawn over an
/// opaque pixel stays fully opaque.
fn source_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = u32::from(src.0[3]);
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }
    let da = u32::from(dst.0[3]);
    let src_weight = sa * 255;
    let dst_weight = da * (255 - sa);
    let total = src_weight + dst_weight;
    let mix = |s: u8, d: u8| {
        let value = (u32::from(s) * src_weight + u32::from(d) * dst_weight + total / 2) / total;
        u8::try_from(value).unwrap_or(u8::MAX)
    };
    Rgba([
        mix(src.0[0], dst.0[0]),
        mix(src.0[1], dst.0[1]),
        mix(src.0[2], dst.0[2]),
        u8::try_from((total + 127) / 255).unwrap_or(u8::MAX),
    ])
}
