//! Gap bridging by boundary-localized morphological closing.
//!
//! A plain closing (dilate, then erode uniformly) can eat through thin
//! parts of the original silhouette. Here the erosion only carves
//! material within reach of *exterior* space, i.e. transparent pixels
//! connected to the canvas border, and the original silhouette is put
//! back afterwards. The result is therefore always a superset of the
//! input: fragments closer than the gap get joined and small enclosed
//! holes get filled, but nothing that was opaque is ever lost.

use crate::dilate::dilate;
use crate::flood_fill::flood;
use crate::mask::Mask;

/// Radius of the disk whose diameter is `gap`.
///
/// Dilating two fragments by this radius makes them meet when their
/// facing edges are at most `gap` pixels apart.
#[must_use]
pub const fn radius_for_gap(gap: u32) -> u32 {
    gap.div_ceil(2)
}

/// Bridge fragments of `silhouette` that lie within `gap` pixels of each
/// other.
///
/// The returned mask keeps the one-pixel padding and the dilation
/// margin of the working canvas (see [`Mask::offset`]), so bridge
/// material that leaves the source frame is still available to the
/// outline stage. A gap of zero returns an unchanged copy.
#[must_use]
pub fn bridge(silhouette: &Mask, gap: u32) -> Mask {
    if gap == 0 {
        return silhouette.clone();
    }
    let radius = radius_for_gap(gap);

    // The padding guarantees (0, 0) is transparent and exterior.
    let mut canvas = dilate(silhouette, radius).padded(1);
    let exterior = flood(canvas.width(), canvas.height(), (0, 0), |x, y| {
        !canvas.get(x, y)
    });

    let boundary = exterior_boundary(&canvas, &exterior);
    let carve = dilate(&boundary, radius);
    canvas.subtract(&carve);
    canvas.union(silhouette);

    log::debug!(
        "bridged gap {gap} (radius {radius}): {} boundary points, {} px on a {}x{} canvas",
        boundary.count(),
        canvas.count(),
        canvas.width(),
        canvas.height(),
    );
    canvas
}

/// Exterior pixels that are 4-adjacent to a set pixel of `canvas`.
fn exterior_boundary(canvas: &Mask, exterior: &[bool]) -> Mask {
    let (width, height) = (canvas.width(), canvas.height());
    let mut boundary = Mask::new(width, height, canvas.offset());
    for y in 0..height {
        for x in 0..width {
            if !exterior[y as usize * width as usize + x as usize] {
                continue;
            }
            let touches = (x > 0 && canvas.get(x - 1, y))
                || canvas.get(x + 1, y)
                || (y > 0 && canvas.get(x, y - 1))
                || canvas.get(x, y + 1);
            if touches {
                boundary.put(x, y, true);
            }
        }
    }
    boundary
}
