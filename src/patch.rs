//! Patch-level transform pipeline.
//!
//! Wires the gradient analyzer, permutation table, and spectral core into
//! a pair of pure functions on 8x8 patches:
//!
//! ```text
//! forward: analyze → permute → FFT → k^(-s) → sparsify(t) → coeffs
//! inverse: coeffs → FWSM(k^(+s)) → IFFT → scatter through permutation
//! ```
//!
//! Coefficients cross the module boundary as 128 interleaved (re, im)
//! floats, the layout the plane pipeline stages per patch.

use crate::gradient;
use crate::permute::{self, AngleIndex};
use crate::spectral;

/// Interleaved (re, im) spectrum of one patch: 64 bins, 128 floats.
pub type PatchCoeffs = [f32; 128];

/// Output of the forward patch transform.
pub struct CompressedPatch {
    /// Quantized dominant-gradient angle; selects the permutation.
    pub angle_index: AngleIndex,
    /// Sparse spectrum, interleaved (re, im).
    pub coeffs: PatchCoeffs,
    /// Number of bins surviving the threshold.
    pub kept: usize,
}

/// Forward-transform one patch.
///
/// `patch` holds 64 samples in [0, 1], row-major. The caller is
/// responsible for edge-clamp padding when the 8x8 window overruns the
/// plane.
#[must_use]
pub fn forward(patch: &[f32; 64], s: f32, threshold: f32) -> CompressedPatch {
    let grad = gradient::analyze(patch);
    let angle_index = permute::angle_index(grad.angle);
    let map = permute::map_for(angle_index);

    let mut re = [0.0f32; 64];
    let mut im = [0.0f32; 64];
    for j in 0..64 {
        re[j] = patch[map[j] as usize];
    }

    spectral::fft_forward(&mut re, &mut im);
    spectral::polylog_forward(&mut re, &mut im, s);
    let kept = spectral::sparsify(&mut re, &mut im, threshold);

    let mut coeffs = [0.0f32; 128];
    for k in 0..64 {
        coeffs[2 * k] = re[k];
        coeffs[2 * k + 1] = im[k];
    }

    CompressedPatch {
        angle_index,
        coeffs,
        kept,
    }
}

/// Inverse-transform one patch into `out`.
///
/// The imaginary residue of the IFFT is discarded; the real part is
/// scattered back through the permutation selected by `angle_index`.
/// Samples are not clamped here; the plane pipeline clamps to [0, 1] at
/// the 8-bit conversion.
pub fn inverse(coeffs: &PatchCoeffs, angle_index: AngleIndex, s: f32, out: &mut [f32; 64]) {
    let mut re = [0.0f32; 64];
    let mut im = [0.0f32; 64];
    for k in 0..64 {
        re[k] = coeffs[2 * k];
        im[k] = coeffs[2 * k + 1];
    }

    spectral::polylog_inverse(&mut re, &mut im, s);
    spectral::fft_inverse(&mut re, &mut im);

    let map = permute::map_for(angle_index);
    for j in 0..64 {
        out[map[j] as usize] = re[j];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_abs_error(a: &[f32; 64], b: &[f32; 64]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f32::max)
    }

    fn mse(a: &[f32; 64], b: &[f32; 64]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            / 64.0
    }

    #[test]
    fn test_flat_patch_keeps_dc_only() {
        let patch = [0.5f32; 64];
        let compressed = forward(&patch, 0.1, 0.5);
        assert_eq!(compressed.kept, 1, "only the DC bin should survive");
        assert_eq!(compressed.angle_index, 0);
        assert!((compressed.coeffs[0] - 32.0).abs() < 1e-4);
        for k in 1..64 {
            assert_eq!(compressed.coeffs[2 * k], 0.0);
            assert_eq!(compressed.coeffs[2 * k + 1], 0.0);
        }
    }

    #[test]
    fn test_flat_patch_roundtrip_is_exact() {
        let patch = [0.5f32; 64];
        let compressed = forward(&patch, 0.1, 0.5);
        let mut out = [0.0f32; 64];
        inverse(&compressed.coeffs, compressed.angle_index, 0.1, &mut out);
        assert!(max_abs_error(&patch, &out) < 1e-5);
    }

    #[test]
    fn test_unfiltered_roundtrip_error_floor() {
        // s = 0 and t = 0 disable shaping and sparsification: the chain is
        // permute + FFT + IFFT + scatter, and the residual error is pure
        // float noise plus the FWSM gate on near-zero bins.
        let mut patch = [0.0f32; 64];
        for y in 0..8 {
            for x in 0..8 {
                patch[y * 8 + x] = (x as f32 + 8.0 * y as f32) / 63.0;
            }
        }
        let compressed = forward(&patch, 0.0, 0.0);
        let mut out = [0.0f32; 64];
        inverse(&compressed.coeffs, compressed.angle_index, 0.0, &mut out);
        assert!(mse(&patch, &out) <= 1e-6, "mse {}", mse(&patch, &out));
    }

    #[test]
    fn test_shaped_roundtrip_stays_close() {
        let mut patch = [0.0f32; 64];
        for y in 0..8 {
            for x in 0..8 {
                patch[y * 8 + x] = 0.2 + 0.6 * (x as f32 / 7.0);
            }
        }
        let compressed = forward(&patch, 0.1, 0.5);
        let mut out = [0.0f32; 64];
        inverse(&compressed.coeffs, compressed.angle_index, 0.1, &mut out);
        assert!(mse(&patch, &out) < 0.01, "mse {}", mse(&patch, &out));
    }

    #[test]
    fn test_kept_matches_nonzero_bins() {
        let mut patch = [0.0f32; 64];
        for (i, v) in patch.iter_mut().enumerate() {
            *v = ((i * 37 + 11) % 64) as f32 / 63.0;
        }
        let compressed = forward(&patch, 0.2, 0.4);
        let nonzero = (0..64)
            .filter(|&k| {
                compressed.coeffs[2 * k] != 0.0 || compressed.coeffs[2 * k + 1] != 0.0
            })
            .count();
        assert_eq!(compressed.kept, nonzero);
    }

    #[test]
    fn test_angle_follows_dominant_direction() {
        let mut horizontal = [0.0f32; 64];
        for y in 0..8 {
            for x in 0..8 {
                horizontal[y * 8 + x] = x as f32 / 7.0;
            }
        }
        assert_eq!(forward(&horizontal, 0.1, 0.5).angle_index, 0);

        let mut vertical = [0.0f32; 64];
        for y in 0..8 {
            for x in 0..8 {
                vertical[y * 8 + x] = y as f32 / 7.0;
            }
        }
        // pi/2 quantizes to just below a quarter turn.
        assert_eq!(forward(&vertical, 0.1, 0.5).angle_index, 63);
    }
}
