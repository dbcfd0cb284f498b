use super::*;
use crate::icc::{PrintCondition, print_profile, srgb_profile};

fn offset() -> ProofTransform {
    ProofTransform::from_bytes(
        &srgb_profile(),
        &print_profile(&PrintCondition::offset_standard()),
    )
    .unwrap()
}

fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(w, h, image::Rgba(px))
}

#[test]
fn mid_gray_is_reproducible_but_shifted_by_paper() {
    let t = offset();
    let px = t.proof_pixel([128, 128, 128]);
    assert!(!px.out_of_gamut);
    assert_ne!(px.display, [128, 128, 128]);
    // Paper is darker than display white, never lighter.
    assert!(px.display.iter().all(|&v| v < 128 && v > 90), "{:?}", px.display);
}

#[test]
fn saturated_blue_is_out_of_print_gamut() {
    let t = offset();
    assert!(t.proof_pixel([0, 0, 255]).out_of_gamut);
    assert!(t.proof_pixel([0, 255, 0]).out_of_gamut);
}

#[test]
fn rgb_to_rgb_is_nearly_identity() {
    let t = ProofTransform::from_bytes(&srgb_profile(), &srgb_profile()).unwrap();
    assert_eq!(t.output_channels(), 3);
    for rgb in [[0, 0, 0], [12, 200, 77], [255, 255, 255], [128, 128, 128]] {
        let px = t.proof_pixel(rgb);
        assert!(!px.out_of_gamut);
        for (a, b) in px.display.iter().zip(rgb) {
            assert!(a.abs_diff(b) <= 1, "{rgb:?} -> {:?}", px.display);
        }
    }
}

#[test]
fn preview_is_deterministic_and_mask_is_optional() {
    let t = offset();
    let mut img = solid(16, 8, [128, 128, 128, 255]);
    img.put_pixel(3, 2, image::Rgba([0, 0, 255, 255]));
    img.put_pixel(4, 2, image::Rgba([10, 20, 30, 0]));

    let (a, none) = t.preview(&img, None);
    assert!(none.is_none());
    let (b, mask) = t.preview(&img, Some([255, 0, 255, 255]));
    assert_eq!(a.as_raw(), b.as_raw());
    assert_eq!(a.dimensions(), img.dimensions());

    let mask = mask.unwrap();
    assert_eq!(mask.get_pixel(3, 2).0, [255, 0, 255, 255]);
    assert_eq!(mask.get_pixel(0, 0).0, [0, 0, 0, 0]);
    // Fully transparent pixels are never flagged and keep their alpha.
    assert_eq!(mask.get_pixel(4, 2).0[3], 0);
    assert_eq!(a.get_pixel(4, 2).0[3], 0);
}

#[test]
fn export_separates_cmyk_and_treats_transparency_as_paper() {
    let t = offset();
    let mut img = solid(5, 3, [128, 128, 128, 255]);
    img.put_pixel(0, 0, image::Rgba([0, 0, 0, 0]));
    let (proofed, sep) = t.export(&img);

    assert_eq!(sep.channels, 4);
    assert_eq!((sep.width, sep.height), (5, 3));
    assert_eq!(sep.data.len(), 5 * 3 * 4);
    assert!(sep.data[..4].iter().all(|&v| v <= 2), "{:?}", &sep.data[..4]);
    assert!(sep.data[4..8].iter().any(|&v| v > 40));
    assert!(proofed.pixels().all(|p| p.0[3] == 255));

    let (_, again) = t.export(&img);
    assert_eq!(sep, again);
}

#[test]
fn corrupt_profiles_are_rejected() {
    assert!(ProofTransform::from_bytes(&[], &srgb_profile()).is_err());
    assert!(ProofTransform::from_bytes(&srgb_profile(), b"garbage").is_err());
    // A print profile cannot be the source.
    let cmyk = print_profile(&PrintCondition::newsprint());
    let err = ProofTransform::from_bytes(&cmyk, &srgb_profile()).unwrap_err();
    assert!(err.to_string().contains("source"), "{err}");
}
