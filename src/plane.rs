//! Per-plane encoding and reconstruction.
//!
//! A plane is a single 8-bit channel. The encoder walks its padded 8x8
//! patch grid in raster order, transforms every patch, and splits the
//! results into five byte streams (Angles, Counts, MaxVals, Indices,
//! Values). The decoder re-parses the streams against the same grid,
//! stages the dequantized spectra, and reconstructs patches in parallel:
//! each 8-row band of the plane is owned by exactly one worker, so the
//! output is identical for any thread count.

use rayon::prelude::*;

use crate::error::GapError;
use crate::patch;

/// Patch edge length in pixels.
pub const PATCH_DIM: usize = 8;

/// A single 8-bit image plane.
#[derive(Clone, Debug, PartialEq)]
pub struct GrayPlane {
    pub width: usize,
    pub height: usize,
    pub pix: Vec<u8>,
}

impl GrayPlane {
    /// Create a plane filled with a constant value.
    #[must_use]
    pub fn new(width: usize, height: usize, fill: u8) -> Self {
        Self {
            width,
            height,
            pix: vec![fill; width * height],
        }
    }

    /// Wrap an existing pixel buffer.
    ///
    /// # Errors
    ///
    /// [`GapError::InvalidBufferSize`] if the buffer does not match the
    /// dimensions.
    pub fn from_pixels(width: usize, height: usize, pix: Vec<u8>) -> Result<Self, GapError> {
        if pix.len() != width * height {
            return Err(GapError::InvalidBufferSize {
                expected: width * height,
                got: pix.len(),
            });
        }
        Ok(Self { width, height, pix })
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.pix[y * self.width + x]
    }

    /// Patch grid dimensions: `(ceil(w/8), ceil(h/8))`.
    #[must_use]
    pub fn patch_grid(&self) -> (usize, usize) {
        (
            self.width.div_ceil(PATCH_DIM),
            self.height.div_ceil(PATCH_DIM),
        )
    }
}

/// The five per-plane byte streams, in container emission order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaneStreams {
    /// One `AngleIndex` byte per patch.
    pub angles: Vec<u8>,
    /// One keep-count byte per patch.
    pub counts: Vec<u8>,
    /// One little-endian f32 per patch.
    pub max_vals: Vec<u8>,
    /// One bin-index byte per kept coefficient, ascending within a patch.
    pub indices: Vec<u8>,
    /// One (q_re, q_im) int8 pair per kept coefficient.
    pub values: Vec<u8>,
}

impl PlaneStreams {
    /// The streams as an ordered array matching [`crate::container::STREAM_NAMES`].
    #[must_use]
    pub fn as_array(&self) -> [&Vec<u8>; 5] {
        [
            &self.angles,
            &self.counts,
            &self.max_vals,
            &self.indices,
            &self.values,
        ]
    }

    /// Total raw bytes across all five streams.
    #[must_use]
    pub fn raw_len(&self) -> usize {
        self.as_array().iter().map(|s| s.len()).sum()
    }
}

/// One quantized patch, the unit collected by the parallel encoder.
struct QuantizedPatch {
    angle: u8,
    max_val: f32,
    /// (bin, q_re, q_im), ascending by bin.
    coeffs: Vec<(u8, i8, i8)>,
}

/// Gather one 8x8 patch with edge-clamp padding, normalized to [0, 1].
fn gather_patch(plane: &GrayPlane, x0: usize, y0: usize, out: &mut [f32; 64]) {
    for py in 0..PATCH_DIM {
        let y = (y0 + py).min(plane.height - 1);
        for px in 0..PATCH_DIM {
            let x = (x0 + px).min(plane.width - 1);
            out[py * PATCH_DIM + px] = f32::from(plane.get(x, y)) / 255.0;
        }
    }
}

fn quantize_patch(compressed: &patch::CompressedPatch) -> QuantizedPatch {
    let coeffs = &compressed.coeffs;

    // MaxVal over every energetic bin; 1.0 when the spectrum is empty so
    // dequantization never divides by zero.
    let mut max_val = 0.0f32;
    for k in 0..64 {
        let re = coeffs[2 * k];
        let im = coeffs[2 * k + 1];
        if re * re + im * im > 0.0 {
            max_val = max_val.max(re.abs()).max(im.abs());
        }
    }
    if max_val == 0.0 {
        max_val = 1.0;
    }

    let mut quantized = Vec::with_capacity(compressed.kept);
    for k in 0..64 {
        let re = coeffs[2 * k];
        let im = coeffs[2 * k + 1];
        if re * re + im * im > 0.0 {
            // Truncation toward zero is part of the bitstream contract.
            let q_re = (re / max_val * 127.0) as i8;
            let q_im = (im / max_val * 127.0) as i8;
            quantized.push((k as u8, q_re, q_im));
        }
    }

    QuantizedPatch {
        angle: compressed.angle_index,
        max_val,
        coeffs: quantized,
    }
}

/// Encode one plane into its five split streams.
///
/// Patches are transformed in parallel and serialized in raster order.
#[must_use]
pub fn encode_plane(plane: &GrayPlane, s: f32, threshold: f32) -> PlaneStreams {
    let (patches_x, patches_y) = plane.patch_grid();
    let num_patches = patches_x * patches_y;
    if num_patches == 0 {
        return PlaneStreams::default();
    }

    let records: Vec<QuantizedPatch> = (0..num_patches)
        .into_par_iter()
        .map(|p| {
            let x0 = (p % patches_x) * PATCH_DIM;
            let y0 = (p / patches_x) * PATCH_DIM;
            let mut samples = [0.0f32; 64];
            gather_patch(plane, x0, y0, &mut samples);
            quantize_patch(&patch::forward(&samples, s, threshold))
        })
        .collect();

    let mut streams = PlaneStreams {
        angles: Vec::with_capacity(num_patches),
        counts: Vec::with_capacity(num_patches),
        max_vals: Vec::with_capacity(num_patches * 4),
        indices: Vec::with_capacity(num_patches * 16),
        values: Vec::with_capacity(num_patches * 32),
    };
    for record in &records {
        streams.angles.push(record.angle);
        streams.counts.push(record.coeffs.len() as u8);
        streams.max_vals.extend_from_slice(&record.max_val.to_le_bytes());
        for &(bin, q_re, q_im) in &record.coeffs {
            streams.indices.push(bin);
            streams.values.push(q_re as u8);
            streams.values.push(q_im as u8);
        }
    }
    streams
}

/// Validate stream lengths against the patch grid.
fn check_stream_lengths(
    streams: &PlaneStreams,
    num_patches: usize,
    plane_idx: usize,
) -> Result<usize, GapError> {
    let corrupt = |stream: &'static str, detail: String| GapError::CorruptStream {
        plane: plane_idx,
        stream,
        detail,
    };

    if streams.angles.len() != num_patches {
        return Err(corrupt(
            "Angles",
            format!("{} bytes for {num_patches} patches", streams.angles.len()),
        ));
    }
    if streams.counts.len() != num_patches {
        return Err(corrupt(
            "Counts",
            format!("{} bytes for {num_patches} patches", streams.counts.len()),
        ));
    }
    if streams.max_vals.len() != num_patches * 4 {
        return Err(corrupt(
            "MaxVals",
            format!(
                "{} bytes, expected {}",
                streams.max_vals.len(),
                num_patches * 4
            ),
        ));
    }
    let total_kept: usize = streams.counts.iter().map(|&c| usize::from(c)).sum();
    if streams.indices.len() != total_kept {
        return Err(corrupt(
            "Indices",
            format!("{} bytes for {total_kept} coefficients", streams.indices.len()),
        ));
    }
    if streams.values.len() != total_kept * 2 {
        return Err(corrupt(
            "Values",
            format!(
                "{} bytes, expected {}",
                streams.values.len(),
                total_kept * 2
            ),
        ));
    }
    Ok(total_kept)
}

/// Decode one plane from its five split streams.
///
/// `fill` initializes pixels the streams cannot reach (0 for Y, 128 for
/// chroma). Reconstruction runs band-parallel; every worker owns a
/// disjoint 8-row slice of the output.
///
/// # Errors
///
/// [`GapError::CorruptStream`] when any stream disagrees with the patch
/// grid implied by the plane dimensions.
pub fn decode_plane(
    streams: &PlaneStreams,
    width: usize,
    height: usize,
    fill: u8,
    s: f32,
    plane_idx: usize,
) -> Result<GrayPlane, GapError> {
    let mut plane = GrayPlane::new(width, height, fill);
    let patches_x = width.div_ceil(PATCH_DIM);
    let patches_y = height.div_ceil(PATCH_DIM);
    let num_patches = patches_x * patches_y;
    if num_patches == 0 {
        return Ok(plane);
    }

    check_stream_lengths(streams, num_patches, plane_idx)?;

    // Stage dequantized spectra for the parallel pass: 128 floats per patch.
    let mut all_coeffs = vec![0.0f32; num_patches * 128];
    let mut idx_cursor = 0usize;
    for p in 0..num_patches {
        let count = usize::from(streams.counts[p]);
        let max_val = f32::from_le_bytes([
            streams.max_vals[p * 4],
            streams.max_vals[p * 4 + 1],
            streams.max_vals[p * 4 + 2],
            streams.max_vals[p * 4 + 3],
        ]);
        let spectrum = &mut all_coeffs[p * 128..(p + 1) * 128];
        for _ in 0..count {
            let bin = usize::from(streams.indices[idx_cursor]);
            let q_re = streams.values[idx_cursor * 2] as i8;
            let q_im = streams.values[idx_cursor * 2 + 1] as i8;
            idx_cursor += 1;
            // Out-of-range bins are dropped rather than aborting the plane.
            if bin < 64 {
                spectrum[2 * bin] = f32::from(q_re) / 127.0 * max_val;
                spectrum[2 * bin + 1] = f32::from(q_im) / 127.0 * max_val;
            }
        }
    }

    plane
        .pix
        .par_chunks_mut(width * PATCH_DIM)
        .enumerate()
        .for_each(|(band, rows)| {
            let band_height = rows.len() / width;
            let mut samples = [0.0f32; 64];
            let mut spectrum = [0.0f32; 128];
            for bx in 0..patches_x {
                let p = band * patches_x + bx;
                spectrum.copy_from_slice(&all_coeffs[p * 128..(p + 1) * 128]);
                patch::inverse(&spectrum, streams.angles[p], s, &mut samples);
                for py in 0..band_height {
                    for px in 0..PATCH_DIM {
                        let x = bx * PATCH_DIM + px;
                        if x < width {
                            let v = samples[py * PATCH_DIM + px].clamp(0.0, 1.0);
                            rows[py * width + x] = (v * 255.0) as u8;
                        }
                    }
                }
            }
        });

    Ok(plane)
}

/// Downsample a plane 2x in each dimension by 2x2 averaging.
///
/// Odd source dimensions clamp the trailing row/column.
#[must_use]
pub fn downsample(src: &GrayPlane) -> GrayPlane {
    let new_w = src.width / 2;
    let new_h = src.height / 2;
    let mut dst = GrayPlane::new(new_w, new_h, 0);
    for y in 0..new_h {
        for x in 0..new_w {
            let sx = x * 2;
            let sy = y * 2;
            let x2 = (sx + 1).min(src.width - 1);
            let y2 = (sy + 1).min(src.height - 1);
            let sum = u32::from(src.get(sx, sy))
                + u32::from(src.get(x2, sy))
                + u32::from(src.get(sx, y2))
                + u32::from(src.get(x2, y2));
            dst.pix[y * new_w + x] = (sum / 4) as u8;
        }
    }
    dst
}

/// Upsample a plane to `(target_w, target_h)` with bilinear interpolation.
///
/// Degenerate (zero-area) sources yield a neutral 128 plane.
#[must_use]
pub fn upsample_bilinear(src: &GrayPlane, target_w: usize, target_h: usize) -> GrayPlane {
    if src.width == 0 || src.height == 0 || target_w == 0 || target_h == 0 {
        return GrayPlane::new(target_w, target_h, 128);
    }
    let mut dst = GrayPlane::new(target_w, target_h, 0);
    let x_ratio = src.width as f32 / target_w as f32;
    let y_ratio = src.height as f32 / target_h as f32;

    dst.pix
        .par_chunks_mut(target_w)
        .enumerate()
        .for_each(|(y, row)| {
            let src_fy = y as f32 * y_ratio;
            let y_low = src_fy as usize;
            let y_high = (y_low + 1).min(src.height - 1);
            let y_weight = src_fy - y_low as f32;

            for (x, out) in row.iter_mut().enumerate() {
                let src_fx = x as f32 * x_ratio;
                let x_low = src_fx as usize;
                let x_high = (x_low + 1).min(src.width - 1);
                let x_weight = src_fx - x_low as f32;

                let p00 = f32::from(src.get(x_low, y_low));
                let p10 = f32::from(src.get(x_high, y_low));
                let p01 = f32::from(src.get(x_low, y_high));
                let p11 = f32::from(src.get(x_high, y_high));

                let top = p00 * (1.0 - x_weight) + p10 * x_weight;
                let bottom = p01 * (1.0 - x_weight) + p11 * x_weight;
                *out = (top * (1.0 - y_weight) + bottom * y_weight) as u8;
            }
        });
    dst
}
