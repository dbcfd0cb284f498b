//! One-shot separated export.
//!
//! Export runs on its own engine thread so it can target a different output profile than the
//! live preview, and so a long separation never delays preview traffic.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use image::RgbaImage;

use crate::engine::{
    EnginePort, EngineRequest, EngineResponse, TransformEngine, TransformKind, TransformOptions,
    TransformRequest, TransformResult,
};
use crate::foundation::core::{Rect, RequestId, RequestIds, pixel_extent};
use crate::foundation::error::{ProfileRole, ProofError, ProofResult};
use crate::profile::ProfileSource;
use crate::surface::{DesignSurface, DocumentGeometry};

const MM_PER_INCH: f64 = 25.4;

/// Export tunables.
#[derive(Clone, Debug)]
pub struct ExportOpts {
    /// Neither side of the exported raster exceeds this.
    pub max_pixel_dim: u32,
    /// How long [`ExportPipeline::wait`] and [`ExportPipeline::poll`] give the engine.
    pub timeout: Duration,
}

impl Default for ExportOpts {
    fn default() -> Self {
        Self {
            max_pixel_dim: 8000,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Capture density picked for an export.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportResolution {
    /// Tier density. The effective density is lower when the pixel ceiling applied.
    pub dpi: f64,
    /// Surface units to pixels.
    pub scale: f64,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

/// Density tier for a document whose longest physical side is `max_side_mm`.
pub fn dpi_tier(max_side_mm: f64) -> f64 {
    if max_side_mm < 1000.0 {
        300.0
    } else if max_side_mm < 2000.0 {
        150.0
    } else {
        100.0
    }
}

/// Pick the capture multiplier for exporting `region` of a document.
///
/// The tier comes from the document's physical size; the multiplier is then lowered until
/// neither side of the output exceeds `max_pixel_dim`.
pub fn choose_resolution(
    geometry: &DocumentGeometry,
    region: Rect,
    max_pixel_dim: u32,
) -> ExportResolution {
    let dpi = dpi_tier(geometry.max_dimension_mm());
    let mut scale = dpi / MM_PER_INCH / geometry.units_per_mm;
    let longest = region.width().max(region.height());
    if longest > 0.0 {
        scale = scale.min(f64::from(max_pixel_dim.max(1)) / longest);
    }
    ExportResolution {
        dpi,
        scale,
        width: pixel_extent(region.width(), scale).min(max_pixel_dim.max(1)),
        height: pixel_extent(region.height(), scale).min(max_pixel_dim.max(1)),
    }
}

/// What to export.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportRequest {
    /// Working space profile id.
    pub source_profile_id: String,
    /// Print condition profile id. May differ from the live preview's.
    pub output_profile_id: String,
    /// Part of the document to export, in surface units. `None` exports the printable area.
    pub crop_region: Option<Rect>,
}

impl ExportRequest {
    /// Export the whole printable area from `source_profile_id` to `output_profile_id`.
    pub fn new(source_profile_id: impl Into<String>, output_profile_id: impl Into<String>) -> Self {
        Self {
            source_profile_id: source_profile_id.into(),
            output_profile_id: output_profile_id.into(),
            crop_region: None,
        }
    }

    /// Restrict the export to `region`.
    pub fn with_crop(mut self, region: Rect) -> Self {
        self.crop_region = Some(region);
        self
    }
}

/// How an export completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportStatus {
    /// Fully separated.
    Separated,
    /// A profile could not be loaded. The preview is the uncorrected capture and there is no
    /// separated data: not fit for production.
    Degraded {
        /// Which profile failed.
        role: ProfileRole,
        /// Why.
        reason: String,
    },
}

/// Export artifact.
#[derive(Clone, Debug)]
pub struct ExportOutput {
    /// Interleaved device bytes. Empty when degraded.
    pub separated: Vec<u8>,
    /// Display simulation of the print (or the raw capture when degraded).
    pub proofed_preview: RgbaImage,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Device channels per pixel in `separated`, 0 when degraded.
    pub channels: u8,
    /// Separated or degraded.
    pub status: ExportStatus,
}

impl ExportOutput {
    /// `true` when the output must not be sent to production.
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, ExportStatus::Degraded { .. })
    }

    fn degraded(capture: RgbaImage, role: ProfileRole, reason: String) -> Self {
        let (width, height) = capture.dimensions();
        Self {
            separated: Vec::new(),
            proofed_preview: capture,
            width,
            height,
            channels: 0,
            status: ExportStatus::Degraded { role, reason },
        }
    }

    fn separated(result: TransformResult) -> ProofResult<Self> {
        let id = result.id;
        let sep = result.separation.ok_or_else(|| ProofError::TransformFailed {
            id,
            message: "engine returned no separated data".to_string(),
        })?;
        Ok(Self {
            width: sep.width,
            height: sep.height,
            channels: sep.channels,
            separated: sep.data,
            proofed_preview: result.proofed,
            status: ExportStatus::Separated,
        })
    }
}

/// Handle to one export. Completed by [`ExportPipeline::poll`] or [`ExportPipeline::wait`].
#[derive(Debug)]
pub struct ExportJob {
    id: RequestId,
    resolution: ExportResolution,
    started: Instant,
    done: Option<ExportOutput>,
}

impl ExportJob {
    /// Id of the underlying engine request.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Resolution the capture was taken at.
    pub fn resolution(&self) -> ExportResolution {
        self.resolution
    }
}

/// Export orchestration with a dedicated engine.
///
/// Results for jobs other than the one being polled are parked until their job asks for them.
/// Parked results older than the export timeout belong to abandoned jobs and are dropped.
pub struct ExportPipeline {
    source: ProfileSource,
    engine: TransformEngine,
    ids: RequestIds,
    opts: ExportOpts,
    inbox: HashMap<RequestId, (Instant, EngineResponse)>,
}

impl ExportPipeline {
    /// Start a pipeline and its engine thread.
    pub fn spawn(source: ProfileSource, opts: ExportOpts) -> ProofResult<Self> {
        Ok(Self {
            source,
            engine: TransformEngine::spawn("softproof-export")?,
            ids: RequestIds::new(),
            opts,
            inbox: HashMap::new(),
        })
    }

    /// Draw ids from `ids`, typically the preview scheduler's counter.
    pub fn with_request_ids(mut self, ids: RequestIds) -> Self {
        self.ids = ids;
        self
    }

    /// Profile source (e.g. to register a custom profile for export).
    pub fn profile_source_mut(&mut self) -> &mut ProfileSource {
        &mut self.source
    }

    /// Capture `surface` and start separating it.
    ///
    /// A profile that cannot be loaded does not fail the export: the job completes at once with
    /// the uncorrected capture and [`ExportStatus::Degraded`].
    #[tracing::instrument(skip_all, fields(output = %req.output_profile_id))]
    pub fn export_separated(
        &mut self,
        surface: &dyn DesignSurface,
        req: &ExportRequest,
    ) -> ProofResult<ExportJob> {
        let geometry = surface.geometry();
        geometry.validate()?;
        let printable = geometry.printable_rect();
        let region = match req.crop_region {
            Some(crop) => {
                let r = crop.intersect(printable);
                if r.width() <= 0.0 || r.height() <= 0.0 {
                    return Err(ProofError::validation(format!(
                        "crop region {crop:?} lies outside the printable area"
                    )));
                }
                r
            }
            None => printable,
        };

        let resolution = choose_resolution(&geometry, region, self.opts.max_pixel_dim);
        let capture = surface.capture_region(region, resolution.scale)?;
        let id = self.ids.next_id();
        tracing::info!(
            %id,
            dpi = resolution.dpi,
            width = capture.width(),
            height = capture.height(),
            "export started"
        );

        let profiles = self
            .source
            .resolve_as(ProfileRole::Source, &req.source_profile_id)
            .and_then(|src| {
                let out = self
                    .source
                    .resolve_as(ProfileRole::Output, &req.output_profile_id)?;
                Ok((src, out))
            });
        let (src, out) = match profiles {
            Ok(pair) => pair,
            Err(ProofError::ProfileUnavailable { role, reason, .. }) => {
                tracing::warn!(%id, %role, %reason, "export degraded: uncorrected capture");
                return Ok(ExportJob {
                    id,
                    resolution,
                    started: Instant::now(),
                    done: Some(ExportOutput::degraded(capture, role, reason)),
                });
            }
            Err(e) => return Err(e),
        };

        self.engine.send(EngineRequest::TransformExport {
            request: TransformRequest {
                id,
                kind: TransformKind::Export,
                image: capture,
                options: TransformOptions {
                    crop_region: Some(region),
                    ..TransformOptions::default()
                },
            },
            source_profile: src.to_engine_bytes(),
            output_profile: out.to_engine_bytes(),
        })?;

        Ok(ExportJob {
            id,
            resolution,
            started: Instant::now(),
            done: None,
        })
    }

    /// Finish `job` if its result is available. Never blocks.
    ///
    /// `Ok(None)` means still running. Fails with [`ProofError::Timeout`] once the export
    /// timeout has passed.
    pub fn poll(&mut self, job: &mut ExportJob) -> ProofResult<Option<ExportOutput>> {
        if let Some(done) = job.done.take() {
            return Ok(Some(done));
        }
        let now = Instant::now();
        while let Some(resp) = self.engine.try_recv() {
            self.inbox.insert(resp.id(), (now, resp));
        }
        let parked = self.inbox.remove(&job.id);
        self.prune_inbox(now);
        if let Some((_, resp)) = parked {
            return finish(resp).map(Some);
        }
        if job.started.elapsed() >= self.opts.timeout {
            return Err(ProofError::Timeout { id: job.id });
        }
        Ok(None)
    }

    /// Block until `job` completes or the export timeout passes.
    pub fn wait(&mut self, mut job: ExportJob) -> ProofResult<ExportOutput> {
        if let Some(done) = self.poll(&mut job)? {
            return Ok(done);
        }
        loop {
            let left = self.opts.timeout.saturating_sub(job.started.elapsed());
            if left.is_zero() {
                return Err(ProofError::Timeout { id: job.id });
            }
            match self.engine.recv_timeout(left)? {
                Some(resp) if resp.id() == job.id => return finish(resp),
                Some(resp) => {
                    let now = Instant::now();
                    self.inbox.insert(resp.id(), (now, resp));
                    self.prune_inbox(now);
                }
                None => return Err(ProofError::Timeout { id: job.id }),
            }
        }
    }

    fn prune_inbox(&mut self, now: Instant) {
        let limit = self.opts.timeout;
        self.inbox.retain(|id, (at, _)| {
            let keep = now.saturating_duration_since(*at) < limit;
            if !keep {
                tracing::debug!(%id, "dropping result of an abandoned export");
            }
            keep
        });
    }
}

fn finish(resp: EngineResponse) -> ProofResult<ExportOutput> {
    match resp {
        EngineResponse::CmykTransformed(result) => {
            let out = ExportOutput::separated(result)?;
            tracing::info!(
                width = out.width,
                height = out.height,
                channels = out.channels,
                "export separated"
            );
            Ok(out)
        }
        EngineResponse::Error { id, message } => Err(ProofError::TransformFailed { id, message }),
        other => Err(ProofError::TransformFailed {
            id: other.id(),
            message: "unexpected engine response to an export".to_string(),
        }),
    }
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("engine", &self.engine)
            .field("opts", &self.opts)
            .field("queued", &self.inbox.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../tests/unit/export.rs"]
mod tests;
