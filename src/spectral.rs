//! 64-point spectral core: FFT, polylogarithmic shaping, noise masking.
//!
//! # Pipeline position
//!
//! ```text
//! Forward: permuted patch → FFT → k^(-s) weighting → threshold sparsify
//! Inverse: coeffs → noise gate + k^(+s) boost + impulse cap → IFFT
//! ```
//!
//! The polylog weights approximate the 1/f energy decay of natural images:
//! smooth, monotonic in k, and exactly invertible at matched `s`. The
//! inverse path adds Frequency-Weighted Spectral Masking (FWSM): a
//! `sqrt(k)`-scaled noise floor that gates isolated quantization noise, and
//! a hard cap that keeps a single boosted bin from ringing into a visible
//! dot after the inverse transform.
//!
//! All transforms operate on split re/im arrays of 64 `f32` values. Weight
//! and twiddle tables are process-lifetime constants.

use once_cell::sync::Lazy;

/// Samples per patch; also the DFT size.
pub const PATCH_SAMPLES: usize = 64;

/// Number of quantized decay steps covered by the weight tables.
/// `s` values at or beyond `S_STEPS / 10` are out of range.
pub const S_STEPS: usize = 64;

/// FWSM noise floor coefficient (multiplied by sqrt(k)).
const NOISE_FLOOR_COEFF: f32 = 1e-4;

/// FWSM residual magnitude cap.
const IMPULSE_CAP: f32 = 4.0;

// ── FFT ────────────────────────────────────────────────────────

/// 6-bit bit-reversal of 0..63, used to seed the iterative butterflies.
const BIT_REVERSAL: [u8; 64] = build_bit_reversal();

const fn build_bit_reversal() -> [u8; 64] {
    let mut table = [0u8; 64];
    let mut i = 0;
    while i < 64 {
        let mut v = i as u8;
        let mut r = 0u8;
        let mut bit = 0;
        while bit < 6 {
            r = (r << 1) | (v & 1);
            v >>= 1;
            bit += 1;
        }
        table[i] = r;
        i += 1;
    }
    table
}

/// Per-stage twiddle factors, flattened over stages 2, 4, .., 64.
struct FftTables {
    forward: Vec<(f32, f32)>,
    inverse: Vec<(f32, f32)>,
}

static FFT: Lazy<FftTables> = Lazy::new(|| FftTables {
    forward: build_twiddles(-1.0),
    inverse: build_twiddles(1.0),
});

fn build_twiddles(sign: f64) -> Vec<(f32, f32)> {
    let mut table = Vec::with_capacity(PATCH_SAMPLES - 1);
    let mut len = 2;
    while len <= PATCH_SAMPLES {
        let half = len / 2;
        for j in 0..half {
            let ang = sign * 2.0 * std::f64::consts::PI * j as f64 / len as f64;
            table.push((ang.cos() as f32, ang.sin() as f32));
        }
        len <<= 1;
    }
    table
}

fn butterflies(re: &mut [f32; 64], im: &mut [f32; 64], twiddles: &[(f32, f32)]) {
    for i in 0..PATCH_SAMPLES {
        let j = BIT_REVERSAL[i] as usize;
        if i < j {
            re.swap(i, j);
            im.swap(i, j);
        }
    }

    let mut offset = 0;
    let mut len = 2;
    while len <= PATCH_SAMPLES {
        let half = len / 2;
        for start in (0..PATCH_SAMPLES).step_by(len) {
            for j in 0..half {
                let (wr, wi) = twiddles[offset + j];
                let a = start + j;
                let b = a + half;
                let tr = re[b] * wr - im[b] * wi;
                let ti = re[b] * wi + im[b] * wr;
                re[b] = re[a] - tr;
                im[b] = im[a] - ti;
                re[a] += tr;
                im[a] += ti;
            }
        }
        offset += half;
        len <<= 1;
    }
}

/// Forward 64-point DFT over split re/im arrays.
///
/// For a real input, the caller zeroes `im` beforehand.
pub fn fft_forward(re: &mut [f32; 64], im: &mut [f32; 64]) {
    butterflies(re, im, &FFT.forward);
}

/// Inverse 64-point DFT; every output is divided by 64.
pub fn fft_inverse(re: &mut [f32; 64], im: &mut [f32; 64]) {
    butterflies(re, im, &FFT.inverse);
    for v in re.iter_mut() {
        *v /= PATCH_SAMPLES as f32;
    }
    for v in im.iter_mut() {
        *v /= PATCH_SAMPLES as f32;
    }
}

// ── Polylog weighting ──────────────────────────────────────────

struct WeightTables {
    forward: Box<[[f32; 64]; S_STEPS]>,
    inverse: Box<[[f32; 64]; S_STEPS]>,
}

static WEIGHTS: Lazy<WeightTables> = Lazy::new(build_weights);

fn build_weights() -> WeightTables {
    let mut forward = Box::new([[1.0f32; 64]; S_STEPS]);
    let mut inverse = Box::new([[1.0f32; 64]; S_STEPS]);
    for s_idx in 0..S_STEPS {
        let s_q = s_idx as f32 * 0.1;
        for k in 1..PATCH_SAMPLES {
            let kf = k as f32;
            forward[s_idx][k] = kf.powf(-s_q);
            inverse[s_idx][k] = kf.powf(s_q);
        }
    }
    WeightTables { forward, inverse }
}

/// Quantize a decay parameter to a weight table row.
///
/// Truncating (not rounding) is part of the bitstream contract; both
/// directions must land on the same row for a given header value.
#[must_use]
pub fn s_index(s: f32) -> usize {
    ((s * 10.0) as i32).clamp(0, S_STEPS as i32 - 1) as usize
}

/// Apply the forward polylog weighting `k^(-s_q)`. Bin 0 is untouched.
pub fn polylog_forward(re: &mut [f32; 64], im: &mut [f32; 64], s: f32) {
    let weights = &WEIGHTS.forward[s_index(s)];
    for k in 1..PATCH_SAMPLES {
        re[k] *= weights[k];
        im[k] *= weights[k];
    }
}

/// Inverse polylog weighting with FWSM. Bin 0 is untouched.
///
/// Per bin k >= 1: coefficients at or below the `1e-4 * sqrt(k)` noise
/// floor are zeroed; survivors are boosted by `k^(+s_q)` and, if the
/// boosted magnitude exceeds 4.0, rescaled so it equals 4.0 exactly.
pub fn polylog_inverse(re: &mut [f32; 64], im: &mut [f32; 64], s: f32) {
    let weights = &WEIGHTS.inverse[s_index(s)];
    for k in 1..PATCH_SAMPLES {
        let noise_floor = NOISE_FLOOR_COEFF * (k as f32).sqrt();
        let mag2 = re[k] * re[k] + im[k] * im[k];
        if mag2 <= noise_floor * noise_floor {
            re[k] = 0.0;
            im[k] = 0.0;
            continue;
        }
        re[k] *= weights[k];
        im[k] *= weights[k];
        let boosted = (re[k] * re[k] + im[k] * im[k]).sqrt();
        if boosted > IMPULSE_CAP {
            let scale = IMPULSE_CAP / boosted;
            re[k] *= scale;
            im[k] *= scale;
        }
    }
}

/// Zero every bin whose squared magnitude is below `threshold^2`.
///
/// Returns the number of surviving bins.
pub fn sparsify(re: &mut [f32; 64], im: &mut [f32; 64], threshold: f32) -> usize {
    let t2 = threshold * threshold;
    let mut kept = 0;
    for k in 0..PATCH_SAMPLES {
        let mag2 = re[k] * re[k] + im[k] * im[k];
        if mag2 < t2 {
            re[k] = 0.0;
            im[k] = 0.0;
        } else {
            kept += 1;
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pseudo_random() -> ([f32; 64], [f32; 64]) {
        let mut state = 0x2545_f491u32;
        let mut next = move || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 8) as f32 / (1u32 << 24) as f32
        };
        let re: [f32; 64] = core::array::from_fn(|_| next());
        (re, [0.0f32; 64])
    }

    #[test]
    fn test_fft_roundtrip() {
        let (orig, _) = pseudo_random();
        let mut re = orig;
        let mut im = [0.0f32; 64];
        fft_forward(&mut re, &mut im);
        fft_inverse(&mut re, &mut im);
        for k in 0..64 {
            assert!((re[k] - orig[k]).abs() < 1e-4, "bin {k}: {} vs {}", re[k], orig[k]);
            assert!(im[k].abs() < 1e-4);
        }
    }

    #[test]
    fn test_fft_dc_of_constant_input() {
        let mut re = [0.25f32; 64];
        let mut im = [0.0f32; 64];
        fft_forward(&mut re, &mut im);
        assert!((re[0] - 16.0).abs() < 1e-4);
        for k in 1..64 {
            assert!(re[k].abs() < 1e-4 && im[k].abs() < 1e-4, "bin {k} not empty");
        }
    }

    #[test]
    fn test_fft_single_tone() {
        // cos(2*pi*5*n/64) concentrates in bins 5 and 59 with weight 32.
        let mut re: [f32; 64] =
            core::array::from_fn(|n| (2.0 * core::f32::consts::PI * 5.0 * n as f32 / 64.0).cos());
        let mut im = [0.0f32; 64];
        fft_forward(&mut re, &mut im);
        assert!((re[5] - 32.0).abs() < 1e-3);
        assert!((re[59] - 32.0).abs() < 1e-3);
        assert!(re[6].abs() < 1e-3);
    }

    #[test]
    fn test_s_index_quantization() {
        assert_eq!(s_index(0.0), 0);
        assert_eq!(s_index(0.09), 0);
        assert_eq!(s_index(0.1), 1);
        assert_eq!(s_index(6.3), 63);
        assert_eq!(s_index(100.0), 63);
        assert_eq!(s_index(-1.0), 0);
    }

    #[test]
    fn test_polylog_identity_at_s_zero() {
        let (orig, _) = pseudo_random();
        let mut re = orig;
        let mut im = [0.0f32; 64];
        polylog_forward(&mut re, &mut im, 0.0);
        assert_eq!(re, orig, "forward weighting must be identity at s_idx 0");
        // Inverse weighting is also all-ones; only the noise gate may act,
        // and every sample here sits far above the floor.
        let mut re2: [f32; 64] = core::array::from_fn(|k| orig[k] + 1.0);
        let im2_orig: [f32; 64] = core::array::from_fn(|k| 0.5 + k as f32 * 0.01);
        let mut im2 = im2_orig;
        polylog_inverse(&mut re2, &mut im2, 0.0);
        for k in 0..64 {
            assert_eq!(re2[k], orig[k] + 1.0);
            assert_eq!(im2[k], im2_orig[k]);
        }
    }

    #[test]
    fn test_forward_inverse_weights_cancel() {
        // Magnitudes stay below the impulse cap so only the weights act.
        let mut re: [f32; 64] = core::array::from_fn(|k| 0.5 + k as f32 * 0.05);
        let orig = re;
        let mut im = [0.0f32; 64];
        polylog_forward(&mut re, &mut im, 1.3);
        polylog_inverse(&mut re, &mut im, 1.3);
        for k in 0..64 {
            let rel = (re[k] - orig[k]).abs() / orig[k];
            assert!(rel < 1e-5, "bin {k}: {} vs {}", re[k], orig[k]);
        }
    }

    #[test]
    fn test_fwsm_noise_gate() {
        let mut re = [0.0f32; 64];
        let mut im = [0.0f32; 64];
        re[0] = 5e-5; // DC is never gated
        re[9] = 2e-4; // floor at k=9 is 3e-4: gated
        re[10] = 0.5; // far above the floor: survives
        polylog_inverse(&mut re, &mut im, 0.0);
        assert_eq!(re[0], 5e-5);
        assert_eq!(re[9], 0.0);
        assert_eq!(re[10], 0.5);
    }

    #[test]
    fn test_fwsm_impulse_cap() {
        let mut re = [0.0f32; 64];
        let mut im = [0.0f32; 64];
        re[3] = 30.0;
        im[3] = 40.0;
        polylog_inverse(&mut re, &mut im, 0.0);
        let mag = (re[3] * re[3] + im[3] * im[3]).sqrt();
        assert!((mag - 4.0).abs() < 1e-4, "capped magnitude {mag}");
        // Direction is preserved.
        assert!((im[3] / re[3] - 40.0 / 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_fwsm_cap_applies_after_boost() {
        let mut re = [0.0f32; 64];
        let mut im = [0.0f32; 64];
        // 2.0 is below the cap, but k^s at k=32, s=1.0 boosts it far past.
        re[32] = 2.0;
        polylog_inverse(&mut re, &mut im, 1.0);
        assert!((re[32] - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_sparsify_counts_and_zeroes() {
        let mut re = [0.0f32; 64];
        let mut im = [0.0f32; 64];
        re[0] = 3.0;
        re[7] = 0.4;
        im[8] = 0.6;
        let kept = sparsify(&mut re, &mut im, 0.5);
        assert_eq!(kept, 2);
        assert_eq!(re[7], 0.0);
        assert_eq!(im[8], 0.6);
    }

    #[test]
    fn test_sparsify_zero_threshold_keeps_everything() {
        let mut re = [0.0f32; 64];
        let mut im = [0.0f32; 64];
        let kept = sparsify(&mut re, &mut im, 0.0);
        assert_eq!(kept, 64, "no squared magnitude is below zero");
    }
}
