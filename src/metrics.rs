//! Reconstruction fidelity measurements.
//!
//! Compares a decoder's output against the source it was encoded from,
//! either at the image level (RGB source vs RGBA reconstruction, alpha
//! excluded) or for a single plane. Used by the roundtrip tests and the
//! demo to keep quality regressions visible.

use crate::error::GapError;
use crate::pipeline::DecodedImage;
use crate::plane::GrayPlane;

/// Error summary between an original and its reconstruction.
#[derive(Clone, Copy, Debug)]
pub struct Distortion {
    /// Mean squared error per sample, in 8-bit units.
    pub mse: f64,
    /// Peak signal-to-noise ratio in dB; infinite for an exact match.
    pub psnr: f64,
    /// Largest single-sample deviation.
    pub max_error: u8,
}

fn accumulate(pairs: impl Iterator<Item = (u8, u8)>) -> Distortion {
    let mut sum = 0.0f64;
    let mut max_error = 0u8;
    let mut samples = 0usize;
    for (a, b) in pairs {
        let diff = i16::from(a) - i16::from(b);
        sum += f64::from(diff) * f64::from(diff);
        max_error = max_error.max(diff.unsigned_abs() as u8);
        samples += 1;
    }
    if samples == 0 || sum == 0.0 {
        return Distortion {
            mse: 0.0,
            psnr: f64::INFINITY,
            max_error,
        };
    }
    let mse = sum / samples as f64;
    Distortion {
        mse,
        psnr: 10.0 * (255.0_f64 * 255.0 / mse).log10(),
        max_error,
    }
}

/// Measure a decoded image against the RGB buffer it was encoded from.
///
/// Only the color channels are compared; the decoder pins alpha at 255,
/// and including it would dilute the numbers.
///
/// # Errors
///
/// Returns [`GapError::InvalidBufferSize`] if `rgb` does not pair 3:4
/// with the decoded RGBA pixels.
pub fn rgb_distortion(rgb: &[u8], decoded: &DecodedImage) -> Result<Distortion, GapError> {
    let expected = decoded.rgba.len() / 4 * 3;
    if decoded.rgba.len() % 4 != 0 || rgb.len() != expected {
        return Err(GapError::InvalidBufferSize {
            expected,
            got: rgb.len(),
        });
    }
    let pairs = rgb
        .chunks_exact(3)
        .zip(decoded.rgba.chunks_exact(4))
        .flat_map(|(orig, dec)| (0..3).map(move |c| (orig[c], dec[c])));
    Ok(accumulate(pairs))
}

/// Measure one reconstructed plane against its source.
///
/// # Errors
///
/// Returns [`GapError::InvalidBufferSize`] if the planes differ in shape.
pub fn plane_distortion(original: &GrayPlane, decoded: &GrayPlane) -> Result<Distortion, GapError> {
    if original.width != decoded.width || original.height != decoded.height {
        return Err(GapError::InvalidBufferSize {
            expected: original.pix.len(),
            got: decoded.pix.len(),
        });
    }
    Ok(accumulate(
        original.pix.iter().copied().zip(decoded.pix.iter().copied()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_planes_are_lossless() {
        let plane = GrayPlane::new(6, 4, 133);
        let d = plane_distortion(&plane, &plane).unwrap();
        assert!(d.psnr.is_infinite());
        assert_eq!(d.mse, 0.0);
        assert_eq!(d.max_error, 0);
    }

    #[test]
    fn test_single_pixel_deviation() {
        let original = GrayPlane::new(2, 2, 100);
        let mut decoded = original.clone();
        decoded.pix[3] = 108;
        // One sample off by 8 out of 4: MSE = 64/4 = 16.
        let d = plane_distortion(&original, &decoded).unwrap();
        assert_eq!(d.max_error, 8);
        assert!((d.mse - 16.0).abs() < 1e-12);
        assert!((d.psnr - 36.09).abs() < 0.01, "PSNR = {}", d.psnr);
    }

    #[test]
    fn test_heavier_damage_scores_worse() {
        let original = GrayPlane::new(8, 8, 60);
        let mut mild = original.clone();
        let mut severe = original.clone();
        for i in 0..8 {
            mild.pix[i] = 63;
            severe.pix[i] = 90;
        }
        let d_mild = plane_distortion(&original, &mild).unwrap();
        let d_severe = plane_distortion(&original, &severe).unwrap();
        assert!(d_severe.psnr < d_mild.psnr);
        assert!(d_severe.max_error > d_mild.max_error);
    }

    #[test]
    fn test_plane_shape_mismatch() {
        let a = GrayPlane::new(4, 4, 0);
        let b = GrayPlane::new(4, 3, 0);
        assert!(plane_distortion(&a, &b).is_err());
    }

    #[test]
    fn test_rgb_distortion_skips_alpha() {
        let rgb = vec![10u8, 20, 30, 40, 50, 60];
        let decoded = DecodedImage {
            width: 2,
            height: 1,
            // Color channels match exactly; alpha is deliberately junk.
            rgba: vec![10, 20, 30, 0, 40, 50, 60, 7],
        };
        let d = rgb_distortion(&rgb, &decoded).unwrap();
        assert!(d.psnr.is_infinite());
        assert_eq!(d.max_error, 0);
    }

    #[test]
    fn test_rgb_distortion_counts_color_error() {
        let rgb = vec![100u8, 100, 100];
        let decoded = DecodedImage {
            width: 1,
            height: 1,
            rgba: vec![101, 100, 97, 255],
        };
        // Deviations 1 and 3 over three samples: MSE = 10/3.
        let d = rgb_distortion(&rgb, &decoded).unwrap();
        assert_eq!(d.max_error, 3);
        assert!((d.mse - 10.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_rgb_length_mismatch() {
        let decoded = DecodedImage {
            width: 2,
            height: 1,
            rgba: vec![0; 8],
        };
        assert!(matches!(
            rgb_distortion(&[0u8; 5], &decoded),
            Err(GapError::InvalidBufferSize { expected: 6, got: 5 })
        ));
    }

    #[test]
    fn test_empty_image_is_trivially_exact() {
        let decoded = DecodedImage {
            width: 0,
            height: 0,
            rgba: Vec::new(),
        };
        let d = rgb_distortion(&[], &decoded).unwrap();
        assert!(d.psnr.is_infinite());
    }
}
