//! Messages exchanged with the engine thread.

use image::RgbaImage;

use crate::foundation::core::{Rect, RequestId};
use crate::transform::Separation;

/// Default gamut warning color (opaque magenta).
pub const DEFAULT_GAMUT_COLOR: [u8; 4] = [255, 0, 255, 255];

/// What a [`TransformRequest`] is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformKind {
    /// Interactive on-screen preview.
    Preview,
    /// Production separation.
    Export,
}

/// Per-request options.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformOptions {
    /// Produce a gamut mask alongside the proofed raster.
    pub show_gamut_warning: bool,
    /// RGBA color painted on out-of-gamut pixels in the mask.
    pub gamut_color: [u8; 4],
    /// Region of the document the raster was captured from, in surface units.
    pub crop_region: Option<Rect>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            show_gamut_warning: false,
            gamut_color: DEFAULT_GAMUT_COLOR,
            crop_region: None,
        }
    }
}

/// One raster handed to the engine. The image moves with the request.
#[derive(Clone, Debug)]
pub struct TransformRequest {
    /// Correlation id.
    pub id: RequestId,
    /// Preview or export.
    pub kind: TransformKind,
    /// Source raster (RGBA8, straight alpha).
    pub image: RgbaImage,
    /// Options.
    pub options: TransformOptions,
}

/// Engine output for one request.
#[derive(Clone, Debug)]
pub struct TransformResult {
    /// Id of the request this answers.
    pub id: RequestId,
    /// Display simulation of the printed result, same size as the input.
    pub proofed: RgbaImage,
    /// Gamut mask, present only when the warning was requested.
    pub gamut_mask: Option<RgbaImage>,
    /// Separated device data, present only for exports.
    pub separation: Option<Separation>,
}

/// Messages into the engine thread.
#[derive(Debug)]
pub enum EngineRequest {
    /// Load the preview transform.
    Init {
        /// Correlation id.
        id: RequestId,
        /// Source (working space) profile bytes.
        source_profile: Vec<u8>,
        /// Output (print condition) profile bytes.
        output_profile: Vec<u8>,
    },
    /// Transform with the loaded preview transform.
    TransformPreview(TransformRequest),
    /// Separate with a transform built from the bytes in the message. Does not touch the
    /// preview transform.
    TransformExport {
        /// The raster and its id.
        request: TransformRequest,
        /// Source profile bytes.
        source_profile: Vec<u8>,
        /// Output profile bytes.
        output_profile: Vec<u8>,
    },
}

impl EngineRequest {
    /// Correlation id of the message.
    pub fn id(&self) -> RequestId {
        match self {
            Self::Init { id, .. } => *id,
            Self::TransformPreview(req) => req.id,
            Self::TransformExport { request, .. } => request.id,
        }
    }

    /// Message name as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::TransformPreview(_) => "transformPreview",
            Self::TransformExport { .. } => "transformExport",
        }
    }
}

/// Messages out of the engine thread.
#[derive(Debug)]
pub enum EngineResponse {
    /// `Init` succeeded.
    Ready {
        /// Id of the `Init`.
        id: RequestId,
    },
    /// Preview result.
    Transformed(TransformResult),
    /// Export result, always carrying a separation.
    CmykTransformed(TransformResult),
    /// Any request failed.
    Error {
        /// Id of the failed request.
        id: RequestId,
        /// Reason.
        message: String,
    },
}

impl EngineResponse {
    /// Correlation id of the message.
    pub fn id(&self) -> RequestId {
        match self {
            Self::Ready { id } | Self::Error { id, .. } => *id,
            Self::Transformed(r) | Self::CmykTransformed(r) => r.id,
        }
    }
}
