use super::*;
use crate::profile::{BuiltinProfile, MemoryFetcher};
use crate::surface::RasterSurface;
use image::RgbaImage;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted engine: records requests, replays queued responses.
#[derive(Clone, Default)]
struct FakeEngine {
    sent: Arc<Mutex<Vec<EngineRequest>>>,
    inbox: Arc<Mutex<VecDeque<EngineResponse>>>,
}

impl FakeEngine {
    fn push(&self, resp: EngineResponse) {
        self.inbox.lock().unwrap().push_back(resp);
    }

    fn inits(&self) -> Vec<RequestId> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|r| matches!(r, EngineRequest::Init { .. }))
            .map(EngineRequest::id)
            .collect()
    }

    fn previews(&self) -> Vec<(RequestId, bool, (u32, u32))> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                EngineRequest::TransformPreview(req) => Some((
                    req.id,
                    req.options.show_gamut_warning,
                    req.image.dimensions(),
                )),
                _ => None,
            })
            .collect()
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn last_init_output(&self) -> Vec<u8> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|r| match r {
                EngineRequest::Init { output_profile, .. } => Some(output_profile.clone()),
                _ => None,
            })
            .unwrap()
    }
}

impl EnginePort for FakeEngine {
    fn send(&mut self, req: EngineRequest) -> ProofResult<()> {
        self.sent.lock().unwrap().push(req);
        Ok(())
    }

    fn try_recv(&mut self) -> Option<EngineResponse> {
        self.inbox.lock().unwrap().pop_front()
    }
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn surface() -> RasterSurface {
    RasterSurface::document(
        RgbaImage::from_pixel(40, 20, image::Rgba([128, 128, 128, 255])),
        40.0,
        20.0,
    )
}

fn result_for(id: RequestId, shade: u8) -> TransformResult {
    TransformResult {
        id,
        proofed: RgbaImage::from_pixel(40, 20, image::Rgba([shade, shade, shade, 255])),
        gamut_mask: None,
        separation: None,
    }
}

fn scheduler_with(source: ProfileSource, opts: SchedulerOpts) -> (ProofScheduler, FakeEngine) {
    let engine = FakeEngine::default();
    let sched = ProofScheduler::new(source, Box::new(engine.clone()), opts);
    (sched, engine)
}

/// Poll until the loader thread finished and the scheduler reacted to it.
fn pump_load(sched: &mut ProofScheduler, now: Instant, s: &RasterSurface) -> PollReport {
    let started = Instant::now();
    loop {
        let report = sched.poll(now, s);
        if report.init_sent.is_some() || !report.errors.is_empty() {
            return report;
        }
        assert!(
            started.elapsed() < Duration::from_secs(60),
            "profile load never finished"
        );
        std::thread::sleep(ms(2));
    }
}

/// Enabled scheduler whose engine is ready and whose first preview is in flight.
fn ready(opts: SchedulerOpts) -> (ProofScheduler, FakeEngine, RasterSurface, Instant, RequestId) {
    let (mut sched, engine) = scheduler_with(ProfileSource::synthetic(), opts);
    let s = surface();
    let t0 = Instant::now();
    sched.set_enabled(true);
    assert_eq!(sched.state(), ProofState::ProfilesLoading);
    let init = pump_load(&mut sched, t0, &s).init_sent.unwrap();
    engine.push(EngineResponse::Ready { id: init });
    let report = sched.poll(t0, &s);
    assert_eq!(report.ready, Some(init));
    let first = report.issued.unwrap();
    assert_eq!(sched.state(), ProofState::Processing);
    (sched, engine, s, t0, first)
}

#[test]
fn older_result_never_overwrites_newer() {
    let (mut sched, engine, s, t0, r1) = ready(SchedulerOpts::default());
    sched.request_refresh(t0 + ms(10));
    let r2 = sched.poll(t0 + ms(210), &s).issued.unwrap();
    assert!(r2 > r1);

    engine.push(EngineResponse::Transformed(result_for(r2, 20)));
    engine.push(EngineResponse::Transformed(result_for(r1, 200)));
    let report = sched.poll(t0 + ms(220), &s);
    assert_eq!(report.applied, Some(r2));
    assert_eq!(report.stale, 1);
    assert_eq!(sched.overlay().applied_id(), Some(r2));
    assert_eq!(sched.overlay().pixels().unwrap().get_pixel(0, 0).0[0], 20);
    assert_eq!(sched.state(), ProofState::Ready);

    assert!(!sched.accept_transformed(result_for(r1, 200)).is_applied());
}

#[test]
fn result_for_non_latest_in_flight_request_is_dropped() {
    let (mut sched, engine, s, t0, r1) = ready(SchedulerOpts::default());
    sched.request_refresh(t0);
    let r2 = sched.poll(t0 + ms(200), &s).issued.unwrap();
    // R1 arrives first, before R2 has any answer: still dropped.
    engine.push(EngineResponse::Transformed(result_for(r1, 1)));
    let report = sched.poll(t0 + ms(201), &s);
    assert_eq!(report.stale, 1);
    assert!(sched.overlay().is_empty());
    assert_eq!(sched.latest_request(), Some(r2));
    assert_eq!(sched.state(), ProofState::Processing);
}

#[test]
fn refresh_burst_collapses_into_one_request() {
    let (mut sched, engine, s, t0, r1) = ready(SchedulerOpts::default());
    engine.push(EngineResponse::Transformed(result_for(r1, 50)));
    sched.poll(t0, &s);

    for i in 0..5 {
        sched.request_refresh(t0 + ms(i * 10));
    }
    assert!(sched.poll(t0 + ms(100), &s).issued.is_none());
    assert!(sched.poll(t0 + ms(239), &s).issued.is_none());
    assert!(sched.poll(t0 + ms(240), &s).issued.is_some());
    assert!(sched.poll(t0 + ms(900), &s).issued.is_none());
    assert_eq!(engine.previews().len(), 2);
}

#[test]
fn disabling_clears_overlay_and_silences_engine() {
    let (mut sched, engine, s, t0, r1) = ready(SchedulerOpts::default());
    engine.push(EngineResponse::Transformed(result_for(r1, 50)));
    sched.poll(t0, &s);
    assert!(!sched.overlay().is_empty());

    sched.request_refresh(t0);
    sched.set_enabled(false);
    assert!(sched.overlay().is_empty());
    assert_eq!(sched.state(), ProofState::Uninitialized);

    let before = engine.sent_count();
    sched.request_refresh(t0 + ms(10));
    sched.set_show_gamut_warning(true, t0 + ms(20));
    for step in 1..10 {
        sched.poll(t0 + ms(step * 500), &s);
    }
    assert_eq!(engine.sent_count(), before);
    assert!(!sched.accept_transformed(result_for(r1, 9)).is_applied());
    assert!(sched.overlay().is_empty());
}

#[test]
fn interaction_hides_overlay_and_refreshes_once_after() {
    let (mut sched, engine, s, t0, r1) = ready(SchedulerOpts::default());
    engine.push(EngineResponse::Transformed(result_for(r1, 50)));
    sched.poll(t0, &s);

    sched.begin_interaction();
    assert!(!sched.overlay().is_visible());
    sched.request_refresh(t0 + ms(5));
    assert!(sched.poll(t0 + ms(500), &s).issued.is_none());

    sched.end_interaction(t0 + ms(600));
    assert!(sched.overlay().is_visible());
    assert!(sched.overlay().is_empty());
    assert!(sched.poll(t0 + ms(800), &s).issued.is_some());
    assert_eq!(engine.previews().len(), 2);
}

#[test]
fn timeout_moves_to_error_and_late_result_is_stale() {
    let opts = SchedulerOpts {
        request_timeout: Duration::from_secs(1),
        ..SchedulerOpts::default()
    };
    let (mut sched, engine, s, t0, r1) = ready(opts);
    let report = sched.poll(t0 + Duration::from_secs(2), &s);
    assert_eq!(report.timed_out, Some(r1));
    assert!(matches!(report.errors[0], ProofError::Timeout { .. }));
    assert_eq!(sched.state(), ProofState::Error);

    engine.push(EngineResponse::Transformed(result_for(r1, 1)));
    assert_eq!(sched.poll(t0 + ms(2001), &s).stale, 1);

    // The engine is still initialized, so a refresh retries.
    sched.request_refresh(t0 + ms(2100));
    assert!(sched.poll(t0 + ms(2300), &s).issued.is_some());
    assert_eq!(sched.state(), ProofState::Processing);
}

#[test]
fn transform_error_skips_one_update() {
    let (mut sched, engine, s, t0, r1) = ready(SchedulerOpts::default());
    engine.push(EngineResponse::Error {
        id: r1,
        message: "boom".to_string(),
    });
    let report = sched.poll(t0, &s);
    assert!(matches!(report.errors[0], ProofError::TransformFailed { .. }));
    assert_eq!(sched.state(), ProofState::Ready);
    assert!(sched.last_error().unwrap().contains("boom"));
}

#[test]
fn init_error_waits_for_settings_change() {
    let (mut sched, engine) = scheduler_with(ProfileSource::synthetic(), SchedulerOpts::default());
    let s = surface();
    let t0 = Instant::now();
    sched.set_enabled(true);
    let init = pump_load(&mut sched, t0, &s).init_sent.unwrap();
    engine.push(EngineResponse::Error {
        id: init,
        message: "corrupt".to_string(),
    });
    let report = sched.poll(t0, &s);
    assert!(matches!(report.errors[0], ProofError::EngineInitFailed(_)));
    assert_eq!(sched.state(), ProofState::Error);

    sched.request_refresh(t0);
    assert!(sched.poll(t0 + ms(500), &s).is_idle());
    assert_eq!(engine.inits().len(), 1);

    sched.set_output_profile("newsprint");
    assert!(pump_load(&mut sched, t0 + ms(600), &s).init_sent.is_some());
    assert_eq!(engine.inits().len(), 2);
}

#[test]
fn missing_output_profile_is_reported_without_init() {
    let fetcher = MemoryFetcher::new().with(BuiltinProfile::Srgb, BuiltinProfile::Srgb.synthesize());
    let (mut sched, engine) = scheduler_with(ProfileSource::new(fetcher), SchedulerOpts::default());
    let s = surface();
    sched.set_enabled(true);
    let report = pump_load(&mut sched, Instant::now(), &s);
    match &report.errors[0] {
        ProofError::ProfileUnavailable {
            role, profile_id, ..
        } => {
            assert_eq!(*role, ProfileRole::Output);
            assert_eq!(profile_id, "offset-standard");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(sched.state(), ProofState::Error);
    assert_eq!(engine.sent_count(), 0);
}

#[test]
fn profile_change_reloads_once_and_ignores_superseded_ready() {
    let (mut sched, engine, s, t0, _) = ready(SchedulerOpts::default());
    let first_init = engine.inits()[0];
    sched.set_output_profile("offset-standard");
    assert_eq!(sched.state(), ProofState::Processing);

    sched.set_output_profile("newsprint");
    let second = pump_load(&mut sched, t0 + ms(1), &s).init_sent.unwrap();
    assert_eq!(engine.inits(), vec![first_init, second]);

    engine.push(EngineResponse::Ready { id: first_init });
    assert!(sched.poll(t0 + ms(2), &s).ready.is_none());
    assert_eq!(sched.state(), ProofState::ProfilesLoading);
    engine.push(EngineResponse::Ready { id: second });
    assert_eq!(sched.poll(t0 + ms(3), &s).ready, Some(second));
}

#[test]
fn gamut_toggle_refreshes_with_mask_and_downscales() {
    let opts = SchedulerOpts {
        preview_max_dim: 10,
        ..SchedulerOpts::default()
    };
    let (mut sched, engine, s, t0, _) = ready(opts);
    sched.set_show_gamut_warning(true, t0 + ms(1));
    assert!(sched.poll(t0 + ms(201), &s).issued.is_some());
    let previews = engine.previews();
    assert_eq!(previews.len(), 2);
    assert_eq!(previews[0].2, (10, 5));
    assert!(!previews[0].1);
    assert!(previews[1].1);

    // Results are scaled back up to the captured size.
    let id = previews[1].0;
    let mut r = result_for(id, 77);
    r.proofed = RgbaImage::from_pixel(10, 5, image::Rgba([77, 77, 77, 255]));
    assert!(sched.accept_transformed(r).is_applied());
    assert_eq!(sched.overlay().pixels().unwrap().dimensions(), (40, 20));
}

#[test]
fn custom_profile_bytes_reach_init_and_replacement_reloads() {
    let (mut sched, engine, s, t0, _) = ready(SchedulerOpts::default());
    let bytes = BuiltinProfile::Newsprint.synthesize();
    sched.set_custom_profile("my-press", "My press", bytes.clone());
    assert_eq!(engine.inits().len(), 1);

    sched.set_output_profile("my-press");
    pump_load(&mut sched, t0, &s).init_sent.unwrap();
    assert_eq!(engine.last_init_output(), bytes);

    let other = BuiltinProfile::OffsetUncoated.synthesize();
    sched.set_custom_profile("my-press", "My press v2", other.clone());
    pump_load(&mut sched, t0, &s).init_sent.unwrap();
    assert_eq!(engine.last_init_output(), other);
    assert_eq!(engine.inits().len(), 3);

    sched.clear_custom_profile();
    assert_eq!(sched.settings().output_profile_id, "offset-standard");
    assert!(!sched.profile_source().has_custom("my-press"));
    pump_load(&mut sched, t0, &s).init_sent.unwrap();
    assert_eq!(engine.inits().len(), 4);
}

#[test]
fn replacing_selected_custom_with_new_id_reverts_to_default() {
    let (mut sched, engine, s, t0, _) = ready(SchedulerOpts::default());
    sched.set_custom_profile("mine", "Mine", BuiltinProfile::Newsprint.synthesize());
    sched.set_output_profile("mine");
    pump_load(&mut sched, t0, &s).init_sent.unwrap();
    assert_eq!(engine.inits().len(), 2);

    sched.set_custom_profile("other", "Other", BuiltinProfile::OffsetUncoated.synthesize());
    assert_eq!(sched.settings().output_profile_id, "offset-standard");
    assert!(sched.settings().selection_is_known());
    assert_eq!(sched.settings().to_persisted().output_profile_id, "offset-standard");
    assert!(!sched.profile_source().has_custom("mine"));
    assert!(sched.profile_source().has_custom("other"));
    assert_eq!(sched.state(), ProofState::ProfilesLoading);

    let init = pump_load(&mut sched, t0, &s).init_sent.unwrap();
    engine.push(EngineResponse::Ready { id: init });
    assert_eq!(sched.poll(t0 + ms(1), &s).ready, Some(init));
    assert_eq!(engine.inits().len(), 3);
}

#[test]
fn init_timeout_moves_to_error_and_waits_for_settings_change() {
    let opts = SchedulerOpts {
        request_timeout: Duration::from_secs(1),
        ..SchedulerOpts::default()
    };
    let (mut sched, engine) = scheduler_with(ProfileSource::synthetic(), opts);
    let s = surface();
    let t0 = Instant::now();
    sched.set_enabled(true);
    let init = pump_load(&mut sched, t0, &s).init_sent.unwrap();

    let report = sched.poll(t0 + Duration::from_secs(2), &s);
    assert_eq!(report.timed_out, Some(init));
    assert!(matches!(report.errors[0], ProofError::Timeout { id } if id == init));
    assert_eq!(sched.state(), ProofState::Error);

    // A late ready for the abandoned init does not revive the engine.
    engine.push(EngineResponse::Ready { id: init });
    assert!(sched.poll(t0 + ms(2001), &s).ready.is_none());

    sched.request_refresh(t0 + ms(2100));
    assert!(sched.poll(t0 + Duration::from_secs(3), &s).issued.is_none());
    assert!(engine.previews().is_empty());
    assert_eq!(engine.inits(), vec![init]);
    assert_eq!(sched.state(), ProofState::Error);
}

#[test]
fn applying_loaded_settings_with_retired_id_inits_once() {
    let (mut sched, engine) = scheduler_with(ProfileSource::synthetic(), SchedulerOpts::default());
    let s = surface();
    let t0 = Instant::now();
    let loaded = ProofSettings::from_json(
        r#"{"enabled":true,"outputProfileId":"coated-fogra27","showGamutWarning":false}"#,
    )
    .unwrap();
    sched.apply_settings(loaded, t0);
    assert_eq!(sched.settings().output_profile_id, "offset-standard");
    pump_load(&mut sched, t0, &s).init_sent.unwrap();
    for step in 1..5 {
        sched.poll(t0 + ms(step * 100), &s);
    }
    assert_eq!(engine.inits().len(), 1);

    // Re-applying the same effective settings is a no-op.
    let same = sched.settings().clone();
    sched.apply_settings(same, t0 + ms(600));
    assert_eq!(engine.inits().len(), 1);
}
