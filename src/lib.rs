//! softproof simulates on screen how an RGB design will look once printed, and separates it into
//! device channels for production.
//!
//! The crate is session-oriented:
//!
//! - Resolve profiles through a [`ProfileSource`]
//! - Drive live previews with a [`ProofScheduler`] and draw its [`Overlay`]
//! - Produce separated output with an [`ExportPipeline`]
//!
//! Pixel work always happens on a [`TransformEngine`] thread; the orchestrators never block.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub mod engine;
pub mod export;
pub mod icc;
pub mod overlay;
pub mod profile;
pub mod schedule;
pub mod settings;
pub mod surface;
pub mod transform;

pub use crate::foundation::core::{Point, Rect, RequestId, RequestIds, Size, Vec2};
pub use crate::foundation::error::{ProfileRole, ProofError, ProofResult};

pub use crate::engine::{
    EnginePort, EngineRequest, EngineResponse, TransformEngine, TransformKind, TransformOptions,
    TransformRequest, TransformResult,
};
pub use crate::export::{
    ExportJob, ExportOpts, ExportOutput, ExportPipeline, ExportRequest, ExportResolution,
    ExportStatus, choose_resolution,
};
pub use crate::icc::{IccProfile, PrintCondition};
pub use crate::overlay::{Overlay, composite};
pub use crate::profile::{BuiltinProfile, ColorProfile, ProfileFetcher, ProfileSource};
pub use crate::schedule::{Delivery, PollReport, ProofScheduler, ProofState, SchedulerOpts};
pub use crate::settings::{PersistedSettings, ProofSettings};
pub use crate::surface::{DesignSurface, DocumentGeometry, RasterSurface};
pub use crate::transform::{ProofTransform, Separation};
