use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Instant;

use image::imageops::{self, FilterType};

use crate::engine::{
    EnginePort, EngineRequest, EngineResponse, TransformEngine, TransformKind, TransformOptions,
    TransformRequest, TransformResult,
};
use crate::foundation::core::{RequestId, RequestIds, fit_within};
use crate::foundation::error::{ProfileRole, ProofError, ProofResult};
use crate::overlay::{Overlay, composite};
use crate::profile::{ColorProfile, ProfileSource, SOURCE_PROFILE_ID};
use crate::schedule::debounce::Debouncer;
use crate::schedule::{Delivery, PollReport, ProofState, SchedulerOpts};
use crate::settings::{CustomProfile, DEFAULT_OUTPUT_PROFILE, ProofSettings};
use crate::surface::DesignSurface;

type Loaded = ProofResult<(ColorProfile, ColorProfile)>;

/// Profile resolution running off the interactive thread.
struct PendingLoad {
    generation: u64,
    rx: Receiver<(u64, Loaded)>,
}

/// The most recently issued preview.
#[derive(Clone, Copy, Debug)]
struct Issued {
    id: RequestId,
    at: Instant,
    target: (u32, u32),
    awaiting: bool,
}

/// Orchestrates live soft-proof previews for one editing session.
///
/// Owns the session's [`ProofSettings`], its preview engine and the overlay. Every profile
/// selection change turns into exactly one fresh `Init`; every burst of refresh requests turns
/// into one preview request; only the result of the newest request reaches the overlay.
pub struct ProofScheduler {
    opts: SchedulerOpts,
    settings: ProofSettings,
    source: ProfileSource,
    engine: Box<dyn EnginePort>,
    ids: RequestIds,
    state: ProofState,
    last_error: Option<String>,
    overlay: Overlay,
    debounce: Debouncer,
    suspended: bool,
    generation: u64,
    loading: Option<PendingLoad>,
    pending_init: Option<(RequestId, Instant)>,
    initialized: bool,
    latest: Option<Issued>,
}

impl ProofScheduler {
    /// Scheduler talking to `engine`. Starts disabled with default settings.
    pub fn new(source: ProfileSource, engine: Box<dyn EnginePort>, opts: SchedulerOpts) -> Self {
        let debounce = Debouncer::new(opts.debounce);
        Self {
            opts,
            settings: ProofSettings::default(),
            source,
            engine,
            ids: RequestIds::new(),
            state: ProofState::Uninitialized,
            last_error: None,
            overlay: Overlay::new(),
            debounce,
            suspended: false,
            generation: 0,
            loading: None,
            pending_init: None,
            initialized: false,
            latest: None,
        }
    }

    /// Scheduler with its own engine thread.
    pub fn spawn(source: ProfileSource, opts: SchedulerOpts) -> ProofResult<Self> {
        let engine = TransformEngine::spawn("softproof-preview")?;
        Ok(Self::new(source, Box::new(engine), opts))
    }

    /// Issue ids from `ids` instead of a private counter.
    pub fn with_request_ids(mut self, ids: RequestIds) -> Self {
        self.ids = ids;
        self
    }

    /// The id counter, for sharing with an export pipeline.
    pub fn request_ids(&self) -> RequestIds {
        self.ids.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProofState {
        self.state
    }

    /// Current settings.
    pub fn settings(&self) -> &ProofSettings {
        &self.settings
    }

    /// The overlay to draw.
    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// User-facing message of the most recent failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Id of the newest preview request, if it has not been forgotten.
    pub fn latest_request(&self) -> Option<RequestId> {
        self.latest.map(|l| l.id)
    }

    /// Profile source (with registered custom profiles).
    pub fn profile_source(&self) -> &ProfileSource {
        &self.source
    }

    /// Turn proofing on or off.
    ///
    /// Turning it off clears the overlay, cancels the pending refresh and forgets everything in
    /// flight; nothing is sent to the engine until it is turned on again.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.settings.enabled == enabled {
            return;
        }
        self.settings.enabled = enabled;
        if enabled {
            tracing::info!(profile = %self.settings.output_profile_id, "soft proofing enabled");
            self.reload();
        } else {
            tracing::info!("soft proofing disabled");
            self.shut_down();
        }
    }

    /// Select the output profile. A change reloads the engine once.
    pub fn set_output_profile(&mut self, profile_id: impl Into<String>) {
        let profile_id = profile_id.into();
        if profile_id == self.settings.output_profile_id {
            return;
        }
        self.settings.output_profile_id = profile_id;
        self.reload();
    }

    /// Toggle the gamut warning and schedule a refresh.
    pub fn set_show_gamut_warning(&mut self, show: bool, now: Instant) {
        if self.settings.show_gamut_warning == show {
            return;
        }
        self.settings.show_gamut_warning = show;
        self.request_refresh(now);
    }

    /// Register a session-scoped custom profile. It becomes selectable under `id`.
    ///
    /// Replacing the bytes of the selected custom profile reloads the engine. Replacing a selected
    /// custom profile with one under a different id selects the default output profile instead.
    pub fn set_custom_profile(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) {
        let custom = CustomProfile {
            id: id.into(),
            name: name.into(),
            bytes: bytes.into(),
        };
        let mut reload = custom.id == self.settings.output_profile_id
            && self.settings.selected_custom() != Some(&custom);
        if let Some(old) = self.settings.custom_profile.take()
            && old.id != custom.id
        {
            self.source.remove_custom(&old.id);
            if old.id == self.settings.output_profile_id {
                tracing::info!(replaced = %old.id, "selected custom profile replaced");
                self.settings.output_profile_id = DEFAULT_OUTPUT_PROFILE.to_string();
                reload = true;
            }
        }
        self.source.insert_custom(custom.id.clone(), custom.bytes.clone());
        self.settings.custom_profile = Some(custom);
        if reload {
            self.reload();
        }
    }

    /// Drop the custom profile. If it was selected, the default output profile takes over.
    pub fn clear_custom_profile(&mut self) {
        let Some(old) = self.settings.custom_profile.take() else {
            return;
        };
        self.source.remove_custom(&old.id);
        if old.id == self.settings.output_profile_id {
            self.settings.output_profile_id = DEFAULT_OUTPUT_PROFILE.to_string();
            self.reload();
        }
    }

    /// Replace the settings value (e.g. after loading it from disk).
    ///
    /// Reloads once when proofing is on and the effective selection changed.
    pub fn apply_settings(&mut self, settings: ProofSettings, now: Instant) {
        let old = std::mem::replace(&mut self.settings, settings);

        if let Some(prev) = &old.custom_profile {
            self.source.remove_custom(&prev.id);
        }
        if let Some(custom) = &self.settings.custom_profile {
            self.source
                .insert_custom(custom.id.clone(), custom.bytes.clone());
        }

        match (old.enabled, self.settings.enabled) {
            (false, true) => {
                tracing::info!(profile = %self.settings.output_profile_id, "soft proofing enabled");
                self.reload();
            }
            (true, false) => self.shut_down(),
            (true, true) => {
                let selection_changed = old.output_profile_id != self.settings.output_profile_id
                    || old.selected_custom() != self.settings.selected_custom();
                if selection_changed {
                    self.reload();
                } else if old.show_gamut_warning != self.settings.show_gamut_warning {
                    self.request_refresh(now);
                }
            }
            (false, false) => {}
        }
    }

    /// Ask for a new preview after the debounce window.
    ///
    /// Ignored while proofing is off or an interaction is in progress. Before the engine is ready
    /// the request is folded into the first preview issued after `Ready`.
    pub fn request_refresh(&mut self, now: Instant) {
        if !self.settings.enabled || self.suspended {
            return;
        }
        if !self.initialized {
            tracing::trace!("refresh deferred until the engine is ready");
            return;
        }
        self.debounce.arm(now);
    }

    /// A gesture (drag, resize, zoom) started: hide the overlay and hold back requests.
    pub fn begin_interaction(&mut self) {
        self.suspended = true;
        self.overlay.hide();
        self.debounce.cancel();
    }

    /// The gesture ended: drop the outdated overlay and refresh once.
    pub fn end_interaction(&mut self, now: Instant) {
        if !self.suspended {
            return;
        }
        self.suspended = false;
        self.overlay.clear();
        self.overlay.show();
        self.request_refresh(now);
    }

    /// Advance the scheduler. Never blocks.
    pub fn poll(&mut self, now: Instant, surface: &dyn DesignSurface) -> PollReport {
        let mut report = PollReport::default();
        self.drain_loader(now, &mut report);
        while let Some(resp) = self.engine.try_recv() {
            self.handle_response(resp, now, &mut report);
        }
        self.check_timeouts(now, &mut report);
        if self.debounce.fire(now) {
            self.issue_preview(now, surface, &mut report);
        }
        report
    }

    /// Decide whether `result` may update the overlay.
    ///
    /// Only the result of the most recently issued preview is applied; everything else is stale,
    /// whether or not a newer result has arrived yet.
    pub fn accept_transformed(&mut self, result: TransformResult) -> Delivery {
        let current = match self.latest {
            Some(issued) if issued.id == result.id && self.settings.enabled => issued,
            _ => {
                tracing::debug!(id = %result.id, latest = ?self.latest_request(), "stale result dropped");
                return Delivery::Stale;
            }
        };
        let (w, h) = current.target;
        let pixels = composite(&result.proofed, result.gamut_mask.as_ref(), w, h);
        self.overlay.apply(result.id, pixels);
        if current.awaiting {
            self.latest = Some(Issued {
                awaiting: false,
                ..current
            });
            if self.state == ProofState::Processing {
                self.state = ProofState::Ready;
            }
        }
        Delivery::Applied(result)
    }

    fn reload(&mut self) {
        if !self.settings.enabled {
            return;
        }
        self.generation += 1;
        self.initialized = false;
        self.pending_init = None;
        self.latest = None;
        self.debounce.cancel();
        self.state = ProofState::ProfilesLoading;

        let generation = self.generation;
        let source = self.source.clone();
        let output_id = self.settings.output_profile_id.clone();
        let (tx, rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("softproof-profiles".to_string())
            .spawn(move || {
                let loaded = source
                    .resolve_as(ProfileRole::Source, SOURCE_PROFILE_ID)
                    .and_then(|src| Ok((src, source.resolve_as(ProfileRole::Output, &output_id)?)));
                let _ = tx.send((generation, loaded));
            });
        match spawned {
            Ok(_) => {
                tracing::debug!(generation, "profile load started");
                self.loading = Some(PendingLoad { generation, rx });
            }
            Err(e) => {
                self.loading = None;
                self.fail(format!("failed to start profile loader: {e}"));
            }
        }
    }

    fn shut_down(&mut self) {
        self.generation += 1;
        self.loading = None;
        self.pending_init = None;
        self.initialized = false;
        self.latest = None;
        self.debounce.cancel();
        self.overlay.clear();
        self.state = ProofState::Uninitialized;
    }

    fn fail(&mut self, message: String) {
        tracing::warn!(%message, "soft proofing error");
        self.last_error = Some(message);
        self.state = ProofState::Error;
    }

    fn drain_loader(&mut self, now: Instant, report: &mut PollReport) {
        let Some(load) = self.loading.as_ref() else {
            return;
        };
        let expected = load.generation;
        let (generation, loaded) = match load.rx.try_recv() {
            Ok(msg) => msg,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                self.loading = None;
                self.fail("profile loader exited without a result".to_string());
                return;
            }
        };
        self.loading = None;
        if generation != expected || generation != self.generation {
            return;
        }

        match loaded {
            Ok((src, out)) => {
                let id = self.ids.next_id();
                tracing::debug!(
                    %id,
                    output = %out.id,
                    fingerprint = %format!("{:016x}", out.fingerprint()),
                    "sending init"
                );
                let sent = self.engine.send(EngineRequest::Init {
                    id,
                    source_profile: src.to_engine_bytes(),
                    output_profile: out.to_engine_bytes(),
                });
                match sent {
                    Ok(()) => {
                        self.pending_init = Some((id, now));
                        report.init_sent = Some(id);
                    }
                    Err(e) => {
                        self.fail(e.to_string());
                        report.errors.push(e);
                    }
                }
            }
            Err(e) => {
                self.fail(e.to_string());
                report.errors.push(e);
            }
        }
    }

    fn handle_response(&mut self, resp: EngineResponse, now: Instant, report: &mut PollReport) {
        match resp {
            EngineResponse::Ready { id } => {
                if self.pending_init.map(|(p, _)| p) != Some(id) {
                    tracing::debug!(%id, "ignoring ready for a superseded init");
                    return;
                }
                self.pending_init = None;
                self.initialized = true;
                self.state = ProofState::Ready;
                self.last_error = None;
                report.ready = Some(id);
                if !self.suspended {
                    self.debounce.arm_immediate(now);
                }
            }
            EngineResponse::Error { id, message } => {
                if self.pending_init.map(|(p, _)| p) == Some(id) {
                    self.pending_init = None;
                    self.initialized = false;
                    let err = ProofError::EngineInitFailed(message);
                    self.fail(err.to_string());
                    report.errors.push(err);
                } else if let Some(issued) = self.latest.filter(|l| l.id == id && l.awaiting) {
                    self.latest = Some(Issued {
                        awaiting: false,
                        ..issued
                    });
                    let err = ProofError::TransformFailed { id, message };
                    tracing::warn!(error = %err, "preview skipped");
                    self.last_error = Some(err.to_string());
                    self.state = ProofState::Ready;
                    report.errors.push(err);
                } else {
                    tracing::debug!(%id, %message, "ignoring error for a superseded request");
                }
            }
            EngineResponse::Transformed(result) => match self.accept_transformed(result) {
                Delivery::Applied(r) => report.applied = Some(r.id),
                Delivery::Stale => report.stale += 1,
            },
            EngineResponse::CmykTransformed(result) => {
                tracing::warn!(id = %result.id, "export result on the preview engine ignored");
            }
        }
    }

    fn check_timeouts(&mut self, now: Instant, report: &mut PollReport) {
        let limit = self.opts.request_timeout;
        if let Some((id, at)) = self.pending_init
            && now.saturating_duration_since(at) >= limit
        {
            self.pending_init = None;
            let err = ProofError::Timeout { id };
            self.fail(err.to_string());
            report.timed_out = Some(id);
            report.errors.push(err);
        }
        if let Some(issued) = self.latest
            && issued.awaiting
            && now.saturating_duration_since(issued.at) >= limit
        {
            self.latest = None;
            let err = ProofError::Timeout { id: issued.id };
            self.fail(err.to_string());
            report.timed_out = Some(issued.id);
            report.errors.push(err);
        }
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn issue_preview(&mut self, now: Instant, surface: &dyn DesignSurface, report: &mut PollReport) {
        if !self.settings.enabled || self.suspended || !self.initialized {
            return;
        }

        let region = surface.geometry().printable_rect();
        let captured = match surface.capture_region(region, 1.0) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!(error = %e, "preview capture failed");
                self.last_error = Some(e.to_string());
                report.errors.push(e);
                return;
            }
        };
        let target = captured.dimensions();
        let (w, h) = fit_within(target.0, target.1, self.opts.preview_max_dim);
        let image = if (w, h) == target {
            captured
        } else {
            imageops::resize(&captured, w, h, FilterType::Triangle)
        };

        let id = self.ids.next_id();
        let req = EngineRequest::TransformPreview(TransformRequest {
            id,
            kind: TransformKind::Preview,
            image,
            options: TransformOptions {
                show_gamut_warning: self.settings.show_gamut_warning,
                gamut_color: self.opts.gamut_color,
                crop_region: None,
            },
        });
        if let Err(e) = self.engine.send(req) {
            self.fail(e.to_string());
            report.errors.push(e);
            return;
        }
        tracing::debug!(%id, w, h, "preview issued");
        self.latest = Some(Issued {
            id,
            at: now,
            target,
            awaiting: true,
        });
        self.state = ProofState::Processing;
        report.issued = Some(id);
    }
}

impl std::fmt::Debug for ProofScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofScheduler")
            .field("state", &self.state)
            .field("settings", &self.settings)
            .field("latest", &self.latest_request())
            .field("suspended", &self.suspended)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/scheduler.rs"]
mod tests;
