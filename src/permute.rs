//! Angle-indexed pixel permutations for gradient alignment.
//!
//! For each of 256 quantized angles, the 64 pixels of an 8x8 patch are
//! reordered by their projection onto the angle direction. Sorting a
//! directional structure into a monotone ramp concentrates DFT energy in
//! the low bins, which is what the polylog shaping downstream exploits.
//!
//! The table is 256 x 64 bytes, built once on first use, and must be
//! bit-identical between encoder and decoder: both sides index it with the
//! same [`AngleIndex`] byte carried in the Angles stream.

use core::f32::consts::PI;

use once_cell::sync::Lazy;

/// Quantized angle, 0..=255. Index 255 corresponds exactly to 2*pi.
pub type AngleIndex = u8;

static TABLE: Lazy<Box<[[u8; 64]; 256]>> = Lazy::new(build_table);

fn build_table() -> Box<[[u8; 64]; 256]> {
    let mut table = Box::new([[0u8; 64]; 256]);
    for (i, map) in table.iter_mut().enumerate() {
        // Divisor 255, not 256: the last index wraps to a full turn.
        let angle = i as f32 * 2.0 * PI / 255.0;
        let (sin, cos) = angle.sin_cos();

        let mut proj = [0.0f32; 64];
        for (p, slot) in proj.iter_mut().enumerate() {
            let x = (p % 8) as f32;
            let y = (p / 8) as f32;
            *slot = x * cos + y * sin;
        }

        let mut order: [u8; 64] = core::array::from_fn(|j| j as u8);
        // Stable sort; equal projections keep original linear index order.
        order.sort_by(|&a, &b| proj[a as usize].total_cmp(&proj[b as usize]));
        *map = order;
    }
    table
}

/// Quantize a raw gradient angle to a table index.
///
/// The angle is normalized into [0, 2*pi) by repeated wrapping, then mapped
/// with `trunc(theta * 255 / 2*pi)` and clamped. Truncation (not rounding)
/// is part of the bitstream contract.
#[must_use]
pub fn angle_index(angle: f32) -> AngleIndex {
    let mut theta = angle;
    while theta < 0.0 {
        theta += 2.0 * PI;
    }
    while theta >= 2.0 * PI {
        theta -= 2.0 * PI;
    }
    let idx = (theta * 255.0 / (2.0 * PI)) as i32;
    idx.clamp(0, 255) as AngleIndex
}

/// The permutation selected by a quantized angle.
///
/// Entry `j` holds the source index of the pixel that lands at sorted
/// position `j`; the inverse transform scatters through the same map.
#[must_use]
pub fn map_for(index: AngleIndex) -> &'static [u8; 64] {
    &TABLE[index as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_map_is_a_bijection() {
        for i in 0..=255u8 {
            let map = map_for(i);
            let mut seen = [false; 64];
            for &src in map.iter() {
                assert!(!seen[src as usize], "index {i}: duplicate source {src}");
                seen[src as usize] = true;
            }
        }
    }

    #[test]
    fn test_angle_zero_sorts_by_column() {
        // Projection is just x, ties broken by linear index: all pixels of
        // column 0 first (top to bottom), then column 1, and so on.
        let map = map_for(0);
        for col in 0..8 {
            for row in 0..8 {
                assert_eq!(map[col * 8 + row], (row * 8 + col) as u8);
            }
        }
    }

    #[test]
    fn test_angle_index_truncates() {
        assert_eq!(angle_index(0.0), 0);
        // Just below one quantization step stays at 0.
        assert_eq!(angle_index(2.0 * PI / 255.0 * 0.999), 0);
        assert_eq!(angle_index(2.0 * PI / 255.0), 1);
    }

    #[test]
    fn test_angle_index_wraps_negative() {
        // -x and 2*pi - x land in the same bucket.
        let a = angle_index(-0.3);
        let b = angle_index(2.0 * PI - 0.3);
        assert_eq!(a, b);
        assert!(a > 200);
    }

    #[test]
    fn test_angle_index_wraps_full_turn() {
        assert_eq!(angle_index(2.0 * PI), angle_index(0.0));
        assert_eq!(angle_index(4.0 * PI + 0.1), angle_index(0.1));
    }

    #[test]
    fn test_scatter_inverts_gather() {
        let map = map_for(73);
        let src: [f32; 64] = core::array::from_fn(|i| i as f32);
        let mut permuted = [0.0f32; 64];
        for j in 0..64 {
            permuted[j] = src[map[j] as usize];
        }
        let mut out = [0.0f32; 64];
        for j in 0..64 {
            out[map[j] as usize] = permuted[j];
        }
        assert_eq!(src, out);
    }
}
