//! End-to-end encode/decode pipeline.
//!
//! Wires color conversion, the patch transform, stream splitting, range
//! coding, and the post-filter chain into a single API.
//!
//! # Pipeline
//!
//! ```text
//! Encode: RGB → YCbCr planes → (chroma ÷2) → per-plane patch transform
//!         → five split streams → range code → header + stream blocks
//! Decode: header → range decode → per-plane patch reconstruction
//!         → (chroma ×2) → RGB merge → deblock → DGAA → line continuity
//! ```
//!
//! Planes are processed in parallel, the five streams of a plane are
//! coded in parallel, and patch math runs band-parallel inside each
//! plane; every stage produces output independent of the worker count.

use rayon::prelude::*;
use tracing::debug;

use crate::color;
use crate::container::{
    self, GapHeader, CANONICAL_FLAGS, FLAG_SUBSAMPLED, STREAMS_PER_PLANE,
};
use crate::error::GapError;
use crate::filters;
use crate::plane::{self, GrayPlane, PlaneStreams};
use crate::rangecoder;

/// Chroma planes reuse the Y parameters scaled by empirical constants.
const CHROMA_S_FACTOR: f32 = 0.4;
const CHROMA_T_FACTOR: f32 = 0.44;

/// Exclusive upper bound for the decay parameter (weight table coverage).
const S_LIMIT: f32 = 6.4;

/// Image encoder carrying the two quality parameters.
///
/// `s` shapes the spectral decay compensation; `threshold` controls
/// sparsification. Both apply to the Y plane; chroma planes use the
/// scaled-down variants.
pub struct GapEncoder {
    s: f32,
    threshold: f32,
}

impl GapEncoder {
    /// Create an encoder.
    ///
    /// # Errors
    ///
    /// [`GapError::ParameterOutOfRange`] unless `0 <= s < 6.4` and
    /// `threshold >= 0`.
    pub fn new(s: f32, threshold: f32) -> Result<Self, GapError> {
        if !(0.0..S_LIMIT).contains(&s) {
            return Err(GapError::ParameterOutOfRange { name: "s", value: s });
        }
        if !(threshold >= 0.0) {
            return Err(GapError::ParameterOutOfRange {
                name: "threshold",
                value: threshold,
            });
        }
        Ok(Self { s, threshold })
    }

    /// Encode an interleaved RGB image into a `.gap` container (YCbCr,
    /// 4:2:0 chroma).
    ///
    /// # Errors
    ///
    /// [`GapError::InvalidBufferSize`] if `rgb` does not hold exactly
    /// `width * height * 3` bytes.
    pub fn encode_rgb(&self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>, GapError> {
        let w = width as usize;
        let h = height as usize;
        let n_pixels = w.checked_mul(h).ok_or(GapError::DimensionOverflow)?;
        let expected = n_pixels.checked_mul(3).ok_or(GapError::DimensionOverflow)?;
        if rgb.len() != expected {
            return Err(GapError::InvalidBufferSize {
                expected,
                got: rgb.len(),
            });
        }

        let mut y = GrayPlane::new(w, h, 0);
        let mut cb = GrayPlane::new(w, h, 0);
        let mut cr = GrayPlane::new(w, h, 0);
        for i in 0..n_pixels {
            let (yy, pb, pr) = color::rgb_to_ycbcr(rgb[3 * i], rgb[3 * i + 1], rgb[3 * i + 2]);
            y.pix[i] = yy;
            cb.pix[i] = pb;
            cr.pix[i] = pr;
        }

        let planes = [y, plane::downsample(&cb), plane::downsample(&cr)];
        let chroma = (self.s * CHROMA_S_FACTOR, self.threshold * CHROMA_T_FACTOR);
        let params = [(self.s, self.threshold), chroma, chroma];

        let plane_streams: Vec<PlaneStreams> = planes
            .as_slice()
            .par_iter()
            .zip(params.as_slice().par_iter())
            .map(|(p, &(ps, pt))| plane::encode_plane(p, ps, pt))
            .collect();

        let header = GapHeader {
            width,
            height,
            s: self.s,
            threshold: self.threshold,
            flags: CANONICAL_FLAGS,
            channels: 3,
        };
        Ok(assemble(&header, &plane_streams))
    }

    /// Encode a single grayscale plane into a one-channel container.
    ///
    /// # Errors
    ///
    /// [`GapError::InvalidBufferSize`] if `gray` does not hold exactly
    /// `width * height` bytes.
    pub fn encode_gray(&self, gray: &[u8], width: u32, height: u32) -> Result<Vec<u8>, GapError> {
        let w = width as usize;
        let h = height as usize;
        let expected = w.checked_mul(h).ok_or(GapError::DimensionOverflow)?;
        if gray.len() != expected {
            return Err(GapError::InvalidBufferSize {
                expected,
                got: gray.len(),
            });
        }

        let plane = GrayPlane::from_pixels(w, h, gray.to_vec())?;
        let streams = vec![plane::encode_plane(&plane, self.s, self.threshold)];

        let header = GapHeader {
            width,
            height,
            s: self.s,
            threshold: self.threshold,
            flags: CANONICAL_FLAGS,
            channels: 1,
        };
        Ok(assemble(&header, &streams))
    }
}

fn assemble(header: &GapHeader, plane_streams: &[PlaneStreams]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&header.to_bytes());
    for (idx, streams) in plane_streams.iter().enumerate() {
        let five = streams.as_array();
        let blobs: Vec<Vec<u8>> = five
            .as_slice()
            .par_iter()
            .map(|data| rangecoder::compress(data))
            .collect();
        for (raw, blob) in five.iter().zip(blobs.iter()) {
            container::write_stream_block(&mut out, raw.len(), blob);
        }
        debug!(
            plane = idx,
            raw_bytes = streams.raw_len(),
            "plane streams coded"
        );
    }
    out
}

/// A decoded image: RGBA8, alpha fixed at 255.
#[derive(Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Image decoder for `.gap` containers.
pub struct GapDecoder;

impl GapDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decode a `.gap` container into RGBA pixels, post-filters applied.
    ///
    /// # Errors
    ///
    /// Header validation errors ([`GapError::BadMagic`],
    /// [`GapError::BadChannels`], [`GapError::UnsupportedLayout`]) or
    /// [`GapError::CorruptStream`] identifying the offending plane and
    /// stream.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedImage, GapError> {
        let header = GapHeader::from_bytes(data)?;
        header.require_supported_layout()?;

        let w = header.width as usize;
        let h = header.height as usize;
        let channels = header.channels as usize;
        let subsampled = header.flags & FLAG_SUBSAMPLED != 0;
        let n_pixels = w.checked_mul(h).ok_or(GapError::DimensionOverflow)?;
        n_pixels.checked_mul(4).ok_or(GapError::DimensionOverflow)?;
        if n_pixels == 0 {
            return Ok(DecodedImage {
                width: header.width,
                height: header.height,
                rgba: Vec::new(),
            });
        }

        // Pre-read every stream block before any parallel work.
        let mut offset = container::HEADER_BYTES;
        let mut plane_blocks = Vec::with_capacity(channels);
        for p in 0..channels {
            let mut five = Vec::with_capacity(STREAMS_PER_PLANE);
            for stream in 0..STREAMS_PER_PLANE {
                five.push(container::read_stream_block(data, &mut offset, p, stream)?);
            }
            plane_blocks.push(five);
        }

        let mut planes: Vec<GrayPlane> = plane_blocks
            .par_iter()
            .enumerate()
            .map(|(p, five)| {
                let (pw, ph) = if subsampled && p > 0 {
                    (w / 2, h / 2)
                } else {
                    (w, h)
                };
                let fill = if p > 0 { 128 } else { 0 };
                let plane_s = if p > 0 {
                    header.s * CHROMA_S_FACTOR
                } else {
                    header.s
                };

                // Bound declared lengths by the patch grid before letting
                // them size any allocation.
                let patches = pw.div_ceil(8) * ph.div_ceil(8);
                let limits = [patches, patches, patches * 4, patches * 64, patches * 128];
                for (stream, (block, limit)) in five.iter().zip(limits).enumerate() {
                    if block.uncompressed_len > limit {
                        return Err(GapError::CorruptStream {
                            plane: p,
                            stream: container::STREAM_NAMES[stream],
                            detail: format!(
                                "declared {} raw bytes, grid allows at most {limit}",
                                block.uncompressed_len
                            ),
                        });
                    }
                }

                let raw: Vec<Vec<u8>> = five
                    .par_iter()
                    .map(|block| rangecoder::decompress(block.data, block.uncompressed_len))
                    .collect();
                let mut raw = raw.into_iter();
                let streams = PlaneStreams {
                    angles: raw.next().unwrap_or_default(),
                    counts: raw.next().unwrap_or_default(),
                    max_vals: raw.next().unwrap_or_default(),
                    indices: raw.next().unwrap_or_default(),
                    values: raw.next().unwrap_or_default(),
                };
                plane::decode_plane(&streams, pw, ph, fill, plane_s, p)
            })
            .collect::<Result<Vec<_>, GapError>>()?;

        if channels == 3 && subsampled {
            let (cb, cr) = rayon::join(
                || plane::upsample_bilinear(&planes[1], w, h),
                || plane::upsample_bilinear(&planes[2], w, h),
            );
            planes[1] = cb;
            planes[2] = cr;
        }

        let mut rgba = vec![0u8; n_pixels * 4];
        if channels == 3 {
            let (yp, cbp, crp) = (&planes[0], &planes[1], &planes[2]);
            rgba.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
                for x in 0..w {
                    let (r, g, b) = color::ycbcr_to_rgb(yp.get(x, y), cbp.get(x, y), crp.get(x, y));
                    row[x * 4] = r;
                    row[x * 4 + 1] = g;
                    row[x * 4 + 2] = b;
                    row[x * 4 + 3] = 255;
                }
            });
        } else {
            let gray = &planes[0];
            rgba.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
                for x in 0..w {
                    let v = gray.get(x, y);
                    row[x * 4] = v;
                    row[x * 4 + 1] = v;
                    row[x * 4 + 2] = v;
                    row[x * 4 + 3] = 255;
                }
            });
        }

        debug!(width = w, height = h, channels, "planes merged, filtering");
        filters::apply_all(&mut rgba, w, h);

        Ok(DecodedImage {
            width: header.width,
            height: header.height,
            rgba,
        })
    }
}

impl Default for GapDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Thread-safety compile-time assertions ──────────────────────

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    const fn check() {
        assert_send_sync::<GapEncoder>();
        assert_send_sync::<GapDecoder>();
        assert_send_sync::<GapError>();
    }
};
