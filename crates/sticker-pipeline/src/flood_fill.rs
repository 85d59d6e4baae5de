//! Seeded region growing.
//!
//! [`flood`] is the shared traversal: an explicit work stack plus a
//! visited bitmap, so every pixel is tested at most once and deep or
//! spiral-shaped regions cannot exhaust the call stack. Background
//! removal and the exterior pass of the gap bridger both build on it.

use crate::color::{self, Color};
use crate::types::{RgbaImage, Selection};

/// 4-connected neighbour offsets (left, right, up, down).
const NEIGHBOURS: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Collect the 4-connected region reachable from `start`.
///
/// `start` always belongs to the region; any other pixel joins when
/// `accept(x, y)` returns `true` and it touches a pixel already in the
/// region. The returned vector is row-major, `index = y * width + x`.
///
/// Returns an empty region when `start` lies outside the canvas.
pub(crate) fn flood<F>(width: u32, height: u32, start: (u32, u32), mut accept: F) -> Vec<bool>
where
    F: FnMut(u32, u32) -> bool,
{
    let w = width as usize;
    let mut region = vec![false; w * height as usize];
    if start.0 >= width || start.1 >= height {
        return region;
    }

    let mut visited = vec![false; region.len()];
    let mut stack = vec![start];
    visited[start.1 as usize * w + start.0 as usize] = true;

    while let Some((x, y)) = stack.pop() {
        region[y as usize * w + x as usize] = true;
        for (dx, dy) in NEIGHBOURS {
            let (Ok(nx), Ok(ny)) = (
                u32::try_from(i64::from(x) + dx),
                u32::try_from(i64::from(y) + dy),
            ) else {
                continue;
            };
            if nx >= width || ny >= height {
                continue;
            }
            let idx = ny as usize * w + nx as usize;
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            if accept(nx, ny) {
                stack.push((nx, ny));
            }
        }
    }

    region
}

/// Remove the background region under `selection` by zeroing its alpha.
///
/// Starting from the seed, the fill spreads through 4-connected pixels
/// that are not already transparent and whose color lies within
/// `threshold` of the selection's target color. Distance is always
/// measured against that fixed color, never chained from neighbour to
/// neighbour. Color channels of removed pixels are left untouched.
///
/// A seed outside the image or on a transparent pixel is a no-op.
///
/// Returns the number of pixels removed.
pub fn remove_background(image: &mut RgbaImage, selection: Selection, threshold: f64) -> usize {
    let (sx, sy) = (selection.seed.x, selection.seed.y);
    if image.get_pixel_checked(sx, sy).is_none_or(|p| p.0[3] == 0) {
        log::debug!("seed ({sx}, {sy}) is outside the image or transparent; nothing removed");
        return 0;
    }

    let target = selection.color;
    let region = {
        let view: &RgbaImage = image;
        flood(view.width(), view.height(), (sx, sy), |x, y| {
            let pixel = *view.get_pixel(x, y);
            pixel.0[3] != 0 && color::matches(Color::of(pixel), target, threshold)
        })
    };

    let mut removed = 0;
    for (pixel, inside) in image.pixels_mut().zip(region) {
        if inside {
            pixel.0[3] = 0;
            removed += 1;
        }
    }
    removed
}
