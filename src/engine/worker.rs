use crate::engine::protocol::{EngineRequest, EngineResponse, TransformResult};
use crate::transform::ProofTransform;

/// State owned by the engine thread.
#[derive(Default)]
pub(crate) struct EngineState {
    preview: Option<ProofTransform>,
}

impl EngineState {
    pub(crate) fn handle(&mut self, req: EngineRequest) -> EngineResponse {
        match req {
            EngineRequest::Init {
                id,
                source_profile,
                output_profile,
            } => match ProofTransform::from_bytes(&source_profile, &output_profile) {
                Ok(t) => {
                    let (src, out) = t.fingerprints();
                    tracing::info!(
                        %id,
                        source = %format!("{src:016x}"),
                        output = %format!("{out:016x}"),
                        channels = t.output_channels(),
                        "transform initialized"
                    );
                    self.preview = Some(t);
                    EngineResponse::Ready { id }
                }
                Err(e) => {
                    tracing::warn!(%id, error = %e, "init rejected");
                    self.preview = None;
                    EngineResponse::Error {
                        id,
                        message: e.to_string(),
                    }
                }
            },
            EngineRequest::TransformPreview(req) => {
                let Some(t) = self.preview.as_ref() else {
                    return EngineResponse::Error {
                        id: req.id,
                        message: "transform requested before a successful init".to_string(),
                    };
                };
                let color = req
                    .options
                    .show_gamut_warning
                    .then_some(req.options.gamut_color);
                let (proofed, gamut_mask) = t.preview(&req.image, color);
                EngineResponse::Transformed(TransformResult {
                    id: req.id,
                    proofed,
                    gamut_mask,
                    separation: None,
                })
            }
            EngineRequest::TransformExport {
                request,
                source_profile,
                output_profile,
            } => match ProofTransform::from_bytes(&source_profile, &output_profile) {
                Ok(t) => {
                    let (proofed, separation) = t.export(&request.image);
                    EngineResponse::CmykTransformed(TransformResult {
                        id: request.id,
                        proofed,
                        gamut_mask: None,
                        separation: Some(separation),
                    })
                }
                Err(e) => EngineResponse::Error {
                    id: request.id,
                    message: e.to_string(),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::protocol::{TransformKind, TransformOptions, TransformRequest};
    use crate::foundation::core::RequestId;
    use crate::icc::{PrintCondition, print_profile, srgb_profile};
    use image::RgbaImage;

    fn preview(id: u64) -> EngineRequest {
        EngineRequest::TransformPreview(TransformRequest {
            id: RequestId(id),
            kind: TransformKind::Preview,
            image: RgbaImage::from_pixel(4, 4, image::Rgba([128, 128, 128, 255])),
            options: TransformOptions::default(),
        })
    }

    #[test]
    fn preview_before_init_is_an_error() {
        let mut state = EngineState::default();
        match state.handle(preview(1)) {
            EngineResponse::Error { id, .. } => assert_eq!(id, RequestId(1)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn failed_init_drops_previous_transform() {
        let mut state = EngineState::default();
        let ok = state.handle(EngineRequest::Init {
            id: RequestId(1),
            source_profile: srgb_profile(),
            output_profile: print_profile(&PrintCondition::newsprint()),
        });
        assert!(matches!(ok, EngineResponse::Ready { .. }));
        assert!(matches!(state.handle(preview(2)), EngineResponse::Transformed(_)));

        let bad = state.handle(EngineRequest::Init {
            id: RequestId(3),
            source_profile: srgb_profile(),
            output_profile: Vec::new(),
        });
        assert!(matches!(bad, EngineResponse::Error { .. }));
        assert!(matches!(state.handle(preview(4)), EngineResponse::Error { .. }));
    }

    #[test]
    fn export_does_not_need_init() {
        let mut state = EngineState::default();
        let resp = state.handle(EngineRequest::TransformExport {
            request: TransformRequest {
                id: RequestId(9),
                kind: TransformKind::Export,
                image: RgbaImage::from_pixel(3, 2, image::Rgba([200, 10, 10, 255])),
                options: TransformOptions::default(),
            },
            source_profile: srgb_profile(),
            output_profile: print_profile(&PrintCondition::offset_standard()),
        });
        let EngineResponse::CmykTransformed(result) = resp else {
            panic!("expected a separation");
        };
        let sep = result.separation.unwrap();
        assert_eq!(sep.data.len(), 3 * 2 * 4);
        assert!(state.preview.is_none());
    }
}
