use super::*;
use crate::profile::{BuiltinProfile, MemoryFetcher};
use crate::surface::RasterSurface;

fn small_opts() -> ExportOpts {
    ExportOpts {
        max_pixel_dim: 40,
        timeout: Duration::from_secs(60),
    }
}

fn gradient_surface() -> RasterSurface {
    let raster = RgbaImage::from_fn(20, 10, |x, y| {
        image::Rgba([(x * 12) as u8, (y * 25) as u8, 128, 255])
    });
    RasterSurface::document(raster, 20.0, 10.0)
}

#[test]
fn dpi_tiers_follow_physical_size() {
    assert_eq!(dpi_tier(297.0), 300.0);
    assert_eq!(dpi_tier(999.9), 300.0);
    assert_eq!(dpi_tier(1000.0), 150.0);
    assert_eq!(dpi_tier(1999.0), 150.0);
    assert_eq!(dpi_tier(2000.0), 100.0);
}

#[test]
fn a4_at_full_density() {
    let g = DocumentGeometry::new(210.0, 297.0, 1.0);
    let r = choose_resolution(&g, g.printable_rect(), 8000);
    assert_eq!(r.dpi, 300.0);
    assert_eq!((r.width, r.height), (2480, 3508));
}

#[test]
fn banner_is_capped_by_pixel_ceiling() {
    let g = DocumentGeometry::new(3000.0, 1500.0, 2.0);
    let r = choose_resolution(&g, g.printable_rect(), 8000);
    assert_eq!(r.dpi, 100.0);
    assert!(r.scale < 100.0 / 25.4 / 2.0);
    assert_eq!((r.width, r.height), (8000, 4000));
}

#[test]
fn cropped_region_uses_document_tier() {
    let g = DocumentGeometry::new(1500.0, 500.0, 1.0);
    let r = choose_resolution(&g, Rect::new(0.0, 0.0, 100.0, 100.0), 8000);
    assert_eq!(r.dpi, 150.0);
    assert_eq!((r.width, r.height), (591, 591));
}

#[test]
fn separated_export_has_device_data() {
    let mut pipeline = ExportPipeline::spawn(ProfileSource::synthetic(), small_opts()).unwrap();
    let s = gradient_surface();
    let job = pipeline
        .export_separated(&s, &ExportRequest::new("srgb", "offset-standard"))
        .unwrap();
    assert_eq!(job.resolution().dpi, 300.0);
    let out = pipeline.wait(job).unwrap();
    assert_eq!(out.status, ExportStatus::Separated);
    assert_eq!((out.width, out.height), (40, 20));
    assert_eq!(out.channels, 4);
    assert_eq!(out.separated.len(), 40 * 20 * 4);
    assert_eq!(out.proofed_preview.dimensions(), (40, 20));
    assert!(!out.is_degraded());
}

#[test]
fn missing_output_profile_degrades_to_capture() {
    let fetcher = MemoryFetcher::new().with(BuiltinProfile::Srgb, BuiltinProfile::Srgb.synthesize());
    let mut pipeline = ExportPipeline::spawn(ProfileSource::new(fetcher), small_opts()).unwrap();
    let s = gradient_surface();
    let mut job = pipeline
        .export_separated(&s, &ExportRequest::new("srgb", "newsprint"))
        .unwrap();
    let out = pipeline.poll(&mut job).unwrap().unwrap();

    let expected = s
        .capture_region(s.geometry().printable_rect(), job.resolution().scale)
        .unwrap();
    assert!(out.is_degraded());
    assert!(matches!(
        out.status,
        ExportStatus::Degraded {
            role: ProfileRole::Output,
            ..
        }
    ));
    assert!(out.separated.is_empty());
    assert_eq!(out.proofed_preview, expected);
}

#[test]
fn unknown_source_profile_degrades_naming_source() {
    let mut pipeline = ExportPipeline::spawn(ProfileSource::synthetic(), small_opts()).unwrap();
    let job = pipeline
        .export_separated(&gradient_surface(), &ExportRequest::new("adobe-rgb", "newsprint"))
        .unwrap();
    let out = pipeline.wait(job).unwrap();
    assert!(matches!(
        out.status,
        ExportStatus::Degraded {
            role: ProfileRole::Source,
            ..
        }
    ));
}

#[test]
fn crop_outside_document_is_rejected() {
    let mut pipeline = ExportPipeline::spawn(ProfileSource::synthetic(), small_opts()).unwrap();
    let req = ExportRequest::new("srgb", "offset-standard").with_crop(Rect::new(50.0, 50.0, 60.0, 60.0));
    assert!(matches!(
        pipeline.export_separated(&gradient_surface(), &req),
        Err(ProofError::Validation(_))
    ));
}

#[test]
fn crop_and_shared_ids() {
    let ids = RequestIds::new();
    ids.next_id();
    let mut pipeline = ExportPipeline::spawn(ProfileSource::synthetic(), small_opts())
        .unwrap()
        .with_request_ids(ids.clone());
    let req = ExportRequest::new("srgb", "offset-uncoated").with_crop(Rect::new(0.0, 0.0, 10.0, 10.0));
    let mut job = pipeline.export_separated(&gradient_surface(), &req).unwrap();
    assert_eq!(job.id(), RequestId(2));
    assert_eq!(ids.last(), Some(job.id()));

    let started = Instant::now();
    let out = loop {
        if let Some(out) = pipeline.poll(&mut job).unwrap() {
            break out;
        }
        assert!(started.elapsed() < Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(5));
    };
    assert_eq!((out.width, out.height), (40, 40));
    assert_eq!(out.separated.len(), 40 * 40 * 4);
}

#[test]
fn custom_profile_registered_for_export() {
    let mut pipeline = ExportPipeline::spawn(ProfileSource::synthetic(), small_opts()).unwrap();
    pipeline
        .profile_source_mut()
        .insert_custom("house-press", BuiltinProfile::Newsprint.synthesize().into());
    let job = pipeline
        .export_separated(&gradient_surface(), &ExportRequest::new("srgb", "house-press"))
        .unwrap();
    let out = pipeline.wait(job).unwrap();
    assert_eq!(out.status, ExportStatus::Separated);
    assert_eq!(out.channels, 4);
}

#[test]
fn abandoned_results_are_dropped_after_timeout() {
    let mut pipeline = ExportPipeline::spawn(ProfileSource::synthetic(), small_opts()).unwrap();
    let s = gradient_surface();
    let abandoned = pipeline
        .export_separated(&s, &ExportRequest::new("srgb", "newsprint"))
        .unwrap();
    let kept = pipeline
        .export_separated(&s, &ExportRequest::new("srgb", "offset-standard"))
        .unwrap();
    let abandoned_id = abandoned.id();
    drop(abandoned);

    // The engine answers in order, so the dropped job's result gets parked.
    pipeline.wait(kept).unwrap();
    assert!(pipeline.inbox.contains_key(&abandoned_id));

    pipeline.prune_inbox(Instant::now());
    assert_eq!(pipeline.inbox.len(), 1);
    pipeline.prune_inbox(Instant::now() + small_opts().timeout);
    assert!(pipeline.inbox.is_empty());
}
