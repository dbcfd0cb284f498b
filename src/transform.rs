//! Per-pixel soft-proof transform.
//!
//! Source RGB goes to the PCS through the source profile, into the output device through the
//! output profile (relative colorimetric), back to the PCS, and finally onto the display with the
//! paper white of the output condition simulated. The result only depends on the profile bytes
//! and the pixel, so previews and exports are reproducible bit for bit.

mod output;
mod shaper;

use image::RgbaImage;
use rayon::prelude::*;

use crate::foundation::error::{ProofError, ProofResult};
use crate::foundation::math::{D50, Vec3, delta_e76, mul_div255, to_u8, xyz_to_lab};
use crate::icc::{ColorSpace, IccProfile, fingerprint};

use output::{MAX_DEVICE_CHANNELS, OutputModel};
use shaper::MatrixShaper;

/// Color difference (CIE76) above which a pixel is reported out of gamut.
pub const GAMUT_DELTA_E: f64 = 5.0;

/// Separated device data: one byte per channel per pixel, interleaved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Separation {
    /// Interleaved channel bytes, `width * height * channels` long.
    pub data: Vec<u8>,
    /// Device channels per pixel (4 for CMYK).
    pub channels: u8,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Separation {
    /// `true` when no separated data is present.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Outcome of transforming one source pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofedPixel {
    /// Display RGB simulating the printed result.
    pub display: [u8; 3],
    /// Device values, only the first `channels` entries are meaningful.
    pub device: [u8; MAX_DEVICE_CHANNELS],
    /// Whether the color moved by more than [`GAMUT_DELTA_E`].
    pub out_of_gamut: bool,
}

/// A loaded source/output profile pair.
#[derive(Clone, Debug)]
pub struct ProofTransform {
    source: MatrixShaper,
    output: OutputModel,
    output_space: ColorSpace,
    paper_scale: Vec3,
    fingerprints: (u64, u64),
}

impl ProofTransform {
    /// Parse both profiles and build the transform.
    ///
    /// The source must be an RGB matrix/TRC profile. The output may be LUT based (any device
    /// space with up to eight channels) or an RGB matrix/TRC profile.
    pub fn from_bytes(source: &[u8], output: &[u8]) -> ProofResult<Self> {
        if source.is_empty() || output.is_empty() {
            return Err(ProofError::invalid_profile("empty profile data"));
        }
        let src = IccProfile::parse(source)
            .map_err(|e| ProofError::invalid_profile(format!("source: {e}")))?;
        let out = IccProfile::parse(output)
            .map_err(|e| ProofError::invalid_profile(format!("output: {e}")))?;
        let mut t = Self::new(&src, &out)?;
        t.fingerprints = (fingerprint(source), fingerprint(output));
        Ok(t)
    }

    /// Build the transform from decoded profiles.
    pub fn new(source: &IccProfile, output: &IccProfile) -> ProofResult<Self> {
        if source.header.color_space != ColorSpace::Rgb || !source.is_matrix_shaper() {
            return Err(ProofError::invalid_profile(
                "source must be an RGB matrix/TRC profile",
            ));
        }
        let source_model = MatrixShaper::from_profile(source)?;
        let output_model = OutputModel::from_profile(output)?;
        let white = output.media_white();
        Ok(Self {
            source: source_model,
            output: output_model,
            output_space: output.header.color_space,
            paper_scale: [white[0] / D50[0], white[1] / D50[1], white[2] / D50[2]],
            fingerprints: (0, 0),
        })
    }

    /// Device channels produced by [`ProofTransform::export`].
    pub fn output_channels(&self) -> usize {
        self.output.channels()
    }

    /// Color space of the output device.
    pub fn output_space(&self) -> ColorSpace {
        self.output_space
    }

    /// xxh3 fingerprints of the source and output bytes (zero when built from decoded profiles).
    pub fn fingerprints(&self) -> (u64, u64) {
        self.fingerprints
    }

    /// Transform a single pixel.
    pub fn proof_pixel(&self, rgb: [u8; 3]) -> ProofedPixel {
        let xyz = self.source.rgb8_to_xyz(rgb);
        let mut device = [0.0; MAX_DEVICE_CHANNELS];
        let n = self.output.from_pcs(xyz, &mut device);
        let printed = self.output.to_pcs(&device[..n]);

        let out_of_gamut = delta_e76(xyz_to_lab(xyz, D50), xyz_to_lab(printed, D50)) > GAMUT_DELTA_E;

        let on_paper = [
            printed[0] * self.paper_scale[0],
            printed[1] * self.paper_scale[1],
            printed[2] * self.paper_scale[2],
        ];
        let display = self.source.xyz_to_device(on_paper).map(to_u8);

        let mut device_u8 = [0u8; MAX_DEVICE_CHANNELS];
        for (d, v) in device_u8.iter_mut().zip(device.iter()).take(n) {
            *d = to_u8(*v);
        }
        ProofedPixel {
            display,
            device: device_u8,
            out_of_gamut,
        }
    }

    /// Preview transform: proofed raster plus, when `gamut_color` is set, a mask that is
    /// `gamut_color` on out-of-gamut pixels and transparent elsewhere.
    ///
    /// Alpha is carried through unchanged.
    #[tracing::instrument(skip_all, fields(w = image.width(), h = image.height()))]
    pub fn preview(
        &self,
        image: &RgbaImage,
        gamut_color: Option<[u8; 4]>,
    ) -> (RgbaImage, Option<RgbaImage>) {
        let (w, h) = image.dimensions();
        let stride = w as usize * 4;
        let mut proofed = vec![0u8; image.as_raw().len()];
        let mut mask = gamut_color.map(|_| vec![0u8; image.as_raw().len()]);

        if stride > 0 {
            let src_rows = image.as_raw().par_chunks(stride);
            let out_rows = proofed.par_chunks_mut(stride);
            match (mask.as_mut(), gamut_color) {
                (Some(mask), Some(color)) => {
                    src_rows
                        .zip(out_rows)
                        .zip(mask.par_chunks_mut(stride))
                        .for_each(|((src, out), mask_row)| {
                            self.preview_row(src, out, Some((mask_row, color)));
                        });
                }
                _ => {
                    src_rows
                        .zip(out_rows)
                        .for_each(|(src, out)| self.preview_row(src, out, None));
                }
            }
        }

        let proofed = RgbaImage::from_raw(w, h, proofed).unwrap_or_else(|| RgbaImage::new(w, h));
        let mask = mask.map(|m| RgbaImage::from_raw(w, h, m).unwrap_or_else(|| RgbaImage::new(w, h)));
        (proofed, mask)
    }

    fn preview_row(&self, src: &[u8], out: &mut [u8], mut mask: Option<(&mut [u8], [u8; 4])>) {
        let mut memo: Option<([u8; 3], ProofedPixel)> = None;
        for (i, (s, o)) in src.chunks_exact(4).zip(out.chunks_exact_mut(4)).enumerate() {
            let rgb = [s[0], s[1], s[2]];
            let px = match memo {
                Some((key, px)) if key == rgb => px,
                _ => {
                    let px = self.proof_pixel(rgb);
                    memo = Some((rgb, px));
                    px
                }
            };
            o[..3].copy_from_slice(&px.display);
            o[3] = s[3];
            if let Some((mask_row, color)) = mask.as_mut()
                && px.out_of_gamut
                && s[3] > 0
            {
                mask_row[i * 4..i * 4 + 4].copy_from_slice(&color[..]);
            }
        }
    }

    /// Export transform: flattens the image over white paper, then returns the opaque proofed
    /// raster and the device separation.
    #[tracing::instrument(skip_all, fields(w = image.width(), h = image.height()))]
    pub fn export(&self, image: &RgbaImage) -> (RgbaImage, Separation) {
        let (w, h) = image.dimensions();
        let channels = self.output.channels();
        let px_count = w as usize * h as usize;
        let mut proofed = vec![0u8; px_count * 4];
        let mut data = vec![0u8; px_count * channels];

        if w > 0 {
            image
                .as_raw()
                .par_chunks(w as usize * 4)
                .zip(proofed.par_chunks_mut(w as usize * 4))
                .zip(data.par_chunks_mut(w as usize * channels))
                .for_each(|((src, out), sep)| {
                    let mut memo: Option<([u8; 3], ProofedPixel)> = None;
                    for ((s, o), d) in src
                        .chunks_exact(4)
                        .zip(out.chunks_exact_mut(4))
                        .zip(sep.chunks_exact_mut(channels))
                    {
                        let rgb = flatten_over_white(s);
                        let px = match memo {
                            Some((key, px)) if key == rgb => px,
                            _ => {
                                let px = self.proof_pixel(rgb);
                                memo = Some((rgb, px));
                                px
                            }
                        };
                        o[..3].copy_from_slice(&px.display);
                        o[3] = 255;
                        d.copy_from_slice(&px.device[..channels]);
                    }
                });
        }

        let proofed = RgbaImage::from_raw(w, h, proofed).unwrap_or_else(|| RgbaImage::new(w, h));
        (
            proofed,
            Separation {
                data,
                channels: channels as u8,
                width: w,
                height: h,
            },
        )
    }
}

fn flatten_over_white(px: &[u8]) -> [u8; 3] {
    let a = u16::from(px[3]);
    let paper = 255 - a;
    [0, 1, 2].map(|i| mul_div255(u16::from(px[i]), a).saturating_add(paper as u8))
}

#[cfg(test)]
#[path = "../tests/unit/transform.rs"]
mod tests;
