//! Integration tests: end-to-end sticker scenarios through the public API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::Rgba;
use sticker_pipeline::{
    Color, Mask, Parameters, Pipeline, RgbaImage, Seed, Selection, StickerRequest, codec,
    process, process_image,
};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);
const ORANGE: Rgba<u8> = Rgba([240, 120, 20, 255]);

fn params(tolerance: u8, thickness_px: u32, merge_gap_px: u32) -> Parameters {
    Parameters {
        tolerance,
        thickness_px,
        merge_gap_px,
    }
}

fn request(image: &RgbaImage, seed: (u32, u32), parameters: Parameters) -> StickerRequest {
    StickerRequest {
        selection: Selection::pick(image, Seed::new(seed.0, seed.1)),
        parameters,
    }
}

/// A transparent canvas with orange axis-aligned rectangles `(x, y, w, h)`.
fn rectangles(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let inside = rects
            .iter()
            .any(|&(rx, ry, rw, rh)| (rx..rx + rw).contains(&x) && (ry..ry + rh).contains(&y));
        if inside { ORANGE } else { CLEAR }
    })
}

#[test]
fn uniform_image_at_zero_tolerance_is_fully_removed() {
    let png = codec::encode_png(&RgbaImage::from_pixel(4, 4, WHITE)).unwrap();
    let selection = Some(Selection {
        seed: Seed::new(0, 0),
        color: Color::WHITE,
    });

    let out = process(&png, selection, &params(0, 0, 0)).unwrap();
    let sticker = codec::decode(&out).unwrap();

    assert_eq!(sticker.dimensions(), (4, 4));
    assert!(sticker.pixels().all(|p| p.0[3] == 0));
}

#[test]
fn checkerboard_removal_follows_four_connectivity() {
    let board = RgbaImage::from_fn(6, 6, |x, y| if (x + y) % 2 == 0 { WHITE } else { BLACK });
    // Even at full tolerance black does not match white.
    let req = request(&board, (0, 0), params(100, 0, 0));
    let cleaned = Pipeline::from_image(board, req).remove_background();

    assert_eq!(cleaned.removed(), 1);
    let img = cleaned.cleaned();
    assert_eq!(img.get_pixel(0, 0).0[3], 0);
    // Diagonal neighbours share the seed's color but are not 4-adjacent.
    assert_eq!(*img.get_pixel(1, 1), WHITE);
    assert_eq!(*img.get_pixel(2, 0), WHITE);
    assert_eq!(*img.get_pixel(5, 5), WHITE);
}

#[test]
fn same_color_region_behind_a_wall_is_kept() {
    // White | black wall | white.
    let img = RgbaImage::from_fn(11, 5, |x, _| if x == 5 { BLACK } else { WHITE });
    let req = request(&img, (0, 0), params(15, 0, 0));
    let cleaned = Pipeline::from_image(img, req).remove_background();

    assert_eq!(cleaned.removed(), 25);
    let out = cleaned.cleaned();
    for y in 0..5 {
        assert_eq!(out.get_pixel(2, y).0[3], 0);
        assert_eq!(*out.get_pixel(5, y), BLACK);
        assert_eq!(*out.get_pixel(8, y), WHITE);
    }
}

#[test]
fn narrow_merge_gap_leaves_squares_apart() {
    let img = rectangles(29, 12, &[(0, 0, 12, 12), (17, 0, 12, 12)]);
    let bridged = Pipeline::from_image(img, StickerRequest {
        selection: None,
        parameters: params(15, 0, 3),
    })
    .remove_background()
    .bridge();

    assert!(bridged.is_bridged());
    assert_eq!(bridged.silhouette().fragments(), 2);
}

#[test]
fn wide_merge_gap_joins_squares() {
    let img = rectangles(29, 12, &[(0, 0, 12, 12), (17, 0, 12, 12)]);
    let bridged = Pipeline::from_image(img, StickerRequest {
        selection: None,
        parameters: params(15, 0, 6),
    })
    .remove_background()
    .bridge();

    assert_eq!(bridged.silhouette().fragments(), 1);
    assert!(bridged.silhouette().contains_source(14, 6));
}

#[test]
fn bridged_silhouette_contains_every_opaque_pixel() {
    let img = rectangles(
        40,
        30,
        &[(2, 2, 5, 5), (12, 4, 3, 9), (20, 20, 8, 2), (33, 5, 1, 20)],
    );
    let original = Mask::from_alpha(&img);
    for gap in [1, 4, 9, 20] {
        let bridged = Pipeline::from_image(img.clone(), StickerRequest {
            selection: None,
            parameters: params(15, 0, gap),
        })
        .remove_background()
        .bridge();
        let silhouette = bridged.silhouette();
        for y in 0..original.height() {
            for x in 0..original.width() {
                if original.get(x, y) {
                    assert!(
                        silhouette.contains_source(i64::from(x), i64::from(y)),
                        "gap {gap}: ({x}, {y}) lost"
                    );
                }
            }
        }
    }
}

#[test]
fn bridge_material_is_painted_white_in_the_sticker() {
    let img = rectangles(29, 12, &[(0, 0, 12, 12), (17, 0, 12, 12)]);
    let result = process_image(&img, &StickerRequest {
        selection: None,
        parameters: params(15, 0, 6),
    })
    .unwrap();

    assert_eq!(result.output_dimensions().width, 29);
    assert_eq!(*result.image.get_pixel(14, 6), WHITE);
    assert_eq!(*result.image.get_pixel(3, 3), ORANGE);
}

#[test]
fn outline_ring_is_exactly_the_thickness_disk() {
    let t = 10;
    let img = rectangles(30, 30, &[(12, 12, 6, 6)]);
    let result = process_image(&img, &StickerRequest {
        selection: None,
        parameters: params(15, t, 0),
    })
    .unwrap();
    let sticker = &result.image;
    assert_eq!(sticker.dimensions(), (50, 50));

    let ti = i64::from(t);
    for (x, y, pixel) in sticker.enumerate_pixels() {
        let (sx, sy) = (i64::from(x) - ti, i64::from(y) - ti);
        let inside = (12..18).contains(&sx) && (12..18).contains(&sy);
        // Squared distance from the pixel to the nearest square pixel.
        let dx = (12 - sx).max(sx - 17).max(0);
        let dy = (12 - sy).max(sy - 17).max(0);
        let within = dx * dx + dy * dy <= ti * ti;

        if inside {
            assert_eq!(*pixel, ORANGE, "foreground changed at ({x}, {y})");
        } else if within {
            assert_eq!(*pixel, WHITE, "ring missing at ({x}, {y})");
        } else {
            assert_eq!(*pixel, CLEAR, "ring too wide at ({x}, {y})");
        }
    }
}

#[test]
fn output_grows_by_twice_the_thickness() {
    for (w, h, t) in [(1, 1, 0), (7, 3, 1), (20, 9, 15), (5, 12, 50)] {
        let img = RgbaImage::from_pixel(w, h, ORANGE);
        let result = process_image(&img, &StickerRequest {
            selection: None,
            parameters: params(15, t, 0),
        })
        .unwrap();
        let out = result.output_dimensions();
        assert_eq!((out.width, out.height), (w + 2 * t, h + 2 * t));
    }
}

#[test]
fn identical_inputs_give_identical_png() {
    let img = RgbaImage::from_fn(24, 18, |x, y| {
        if (8..16).contains(&x) && (4..14).contains(&y) {
            ORANGE
        } else {
            Rgba([250, 250, u8::try_from(245 + x % 5).unwrap(), 255])
        }
    });
    let png = codec::encode_png(&img).unwrap();
    let selection = Selection::pick(&img, Seed::new(0, 0));
    let p = params(10, 4, 5);
    assert_eq!(
        process(&png, selection, &p).unwrap(),
        process(&png, selection, &p).unwrap()
    );
}

#[test]
fn higher_tolerance_removes_a_superset() {
    // A wrapped diagonal ramp, so regions are irregular rather than
    // nested column prefixes.
    let ramp = RgbaImage::from_fn(32, 8, |x, y| {
        let v = u8::try_from(255 - (x * 6 + y * 11) % 200).unwrap();
        Rgba([v, v / 2, 255 - v, 255])
    });
    let removed_at = |tolerance| {
        let req = request(&ramp, (0, 0), params(tolerance, 0, 0));
        Pipeline::from_image(ramp.clone(), req)
            .remove_background()
            .cleaned()
            .pixels()
            .map(|p| p.0[3] == 0)
            .collect::<Vec<_>>()
    };

    let mut previous = removed_at(0);
    for tolerance in [2, 5, 10, 20, 40, 70, 100] {
        let current = removed_at(tolerance);
        for (i, (&before, &after)) in previous.iter().zip(&current).enumerate() {
            assert!(
                !before || after,
                "pixel {i} removed below tolerance {tolerance} but kept at it"
            );
        }
        previous = current;
    }
    assert!(previous.iter().all(|&removed| removed));
}

#[test]
fn transparent_seed_leaves_image_unchanged() {
    let img = rectangles(10, 10, &[(3, 3, 4, 4)]);
    // Picking a transparent pixel yields no selection at all.
    assert!(Selection::pick(&img, Seed::new(0, 0)).is_none());

    let forced = StickerRequest {
        selection: Some(Selection {
            seed: Seed::new(0, 0),
            color: Color::WHITE,
        }),
        parameters: params(100, 0, 0),
    };
    let cleaned = Pipeline::from_image(img.clone(), forced).remove_background();
    assert_eq!(cleaned.removed(), 0);
    assert_eq!(cleaned.cleaned(), &img);
}
