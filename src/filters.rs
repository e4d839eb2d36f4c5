//! Post-reconstruction filter chain on RGBA pixels.
//!
//! Three passes, in fixed order, each targeting a different artifact
//! class of the patch transform:
//!
//! 1. **Deblocking**: axis-aligned seams every 8 pixels. A 4-tap stencil
//!    across each seam smooths the two boundary pixels when the seam
//!    contrast is below a flatness-dependent threshold.
//! 2. **DGAA**: diagonal whisker aliasing. Sobel orientation picks the
//!    two along-edge neighbors and averages along the edge, never across
//!    it. Isolated impulse pixels are despeckled first.
//! 3. **Line continuity**: residual broadband seam energy. Two bilateral
//!    passes restricted to a 2-pixel band around every seam.
//!
//! Every pass reads a snapshot of the previous buffer and writes a
//! distinct destination, so row-parallel execution is race-free and the
//! output is independent of worker partitioning.

use rayon::prelude::*;

// Deblocking: local flatness bound and seam-contrast thresholds.
const BETA: i32 = 12;
const NORM_THRESHOLD: i32 = 30;
const HIGH_THRESHOLD: i32 = 45;

// DGAA: minimum Sobel magnitude for along-edge smoothing, and the mean
// channel delta above which a pixel counts as an isolated impulse.
const EDGE_THRESHOLD: i32 = 30;
const IMPULSE_THRESHOLD: i32 = 100;

// Line continuity: bilateral kernel shape and the seam band half-width.
const BLOCK_SIZE: usize = 8;
const SEAM_RADIUS: usize = 2;
const FILTER_RADIUS: i32 = 3;
const SIGMA_SPACE: f64 = 2.0;
const SIGMA_COLOR: f64 = 22.0;
const NUM_PASSES: usize = 2;

/// Run the full chain in order: deblock, DGAA, line continuity.
pub fn apply_all(pix: &mut [u8], width: usize, height: usize) {
    deblock(pix, width, height);
    directional_antialias(pix, width, height);
    line_continuity(pix, width, height);
}

#[inline]
fn max_channel_diff(a: &[u8], b: &[u8]) -> i32 {
    let dr = (i32::from(a[0]) - i32::from(b[0])).abs();
    let dg = (i32::from(a[1]) - i32::from(b[1])).abs();
    let db = (i32::from(a[2]) - i32::from(b[2])).abs();
    dr.max(dg).max(db)
}

#[inline]
fn smooth_pair(p2: u8, p1: u8, q0: u8, q1: u8) -> (u8, u8) {
    let p1_new = (i32::from(p2) + 2 * i32::from(p1) + i32::from(q0) + 2) / 4;
    let q0_new = (i32::from(p1) + 2 * i32::from(q0) + i32::from(q1) + 2) / 4;
    (p1_new as u8, q0_new as u8)
}

/// Smooth the 8-pixel block seams: vertical pass, then horizontal pass.
pub fn deblock(pix: &mut [u8], width: usize, height: usize) {
    if width == 0 || height == 0 {
        return;
    }

    // Vertical seams touch only pixels within one row, so rows are the
    // parallel grain.
    let src = pix.to_vec();
    pix.par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            let srow = &src[y * width * 4..(y + 1) * width * 4];
            for x in (BLOCK_SIZE..width).step_by(BLOCK_SIZE) {
                if x + 1 >= width {
                    break;
                }
                let p2 = &srow[(x - 2) * 4..];
                let p1 = &srow[(x - 1) * 4..];
                let q0 = &srow[x * 4..];
                let q1 = &srow[(x + 1) * 4..];

                let flat_p = max_channel_diff(p2, p1) < BETA;
                let flat_q = max_channel_diff(q0, q1) < BETA;
                let threshold = if flat_p && flat_q {
                    HIGH_THRESHOLD
                } else {
                    NORM_THRESHOLD
                };
                if max_channel_diff(p1, q0) < threshold {
                    for c in 0..3 {
                        let (p1_new, q0_new) = smooth_pair(p2[c], p1[c], q0[c], q1[c]);
                        row[(x - 1) * 4 + c] = p1_new;
                        row[x * 4 + c] = q0_new;
                    }
                }
            }
        });

    // Horizontal seams modify the two rows either side of the seam. With
    // a snapshot source every output row is still independent: a row is
    // touched by at most one seam (as its p1 row or its q0 row).
    let src = pix.to_vec();
    pix.par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            let seam = if y % BLOCK_SIZE == BLOCK_SIZE - 1 && y + 2 < height {
                Some(y + 1) // this row is p1 for the seam below
            } else if y % BLOCK_SIZE == 0 && y >= BLOCK_SIZE && y + 1 < height {
                Some(y) // this row is q0 for the seam above
            } else {
                None
            };
            let Some(ys) = seam else { return };
            let is_p1_row = y + 1 == ys;

            let at = |yy: usize, x: usize| &src[(yy * width + x) * 4..];
            for x in 0..width {
                let p2 = at(ys - 2, x);
                let p1 = at(ys - 1, x);
                let q0 = at(ys, x);
                let q1 = at(ys + 1, x);

                let flat_p = max_channel_diff(p2, p1) < BETA;
                let flat_q = max_channel_diff(q0, q1) < BETA;
                let threshold = if flat_p && flat_q {
                    HIGH_THRESHOLD
                } else {
                    NORM_THRESHOLD
                };
                if max_channel_diff(p1, q0) < threshold {
                    for c in 0..3 {
                        let (p1_new, q0_new) = smooth_pair(p2[c], p1[c], q0[c], q1[c]);
                        row[x * 4 + c] = if is_p1_row { p1_new } else { q0_new };
                    }
                }
            }
        });
}

/// Directional guided antialiasing with impulse despeckling.
pub fn directional_antialias(pix: &mut [u8], width: usize, height: usize) {
    if width < 3 || height < 3 {
        return;
    }
    let src = pix.to_vec();
    pix.par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            if y == 0 || y + 1 >= height {
                return;
            }
            for x in 1..width - 1 {
                let at = |xx: usize, yy: usize, c: usize| i32::from(src[(yy * width + xx) * 4 + c]);
                let center = [at(x, y, 0), at(x, y, 1), at(x, y, 2)];

                // Despeckle: a pixel far from all eight neighbors is an
                // impulse; replace it with the neighbor mean and move on.
                let mut is_dot = true;
                let mut sums = [0i32; 3];
                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = (x as i32 + dx) as usize;
                        let ny = (y as i32 + dy) as usize;
                        let n = [at(nx, ny, 0), at(nx, ny, 1), at(nx, ny, 2)];
                        let delta = ((center[0] - n[0]).abs()
                            + (center[1] - n[1]).abs()
                            + (center[2] - n[2]).abs())
                            / 3;
                        if delta < IMPULSE_THRESHOLD {
                            is_dot = false;
                        }
                        for c in 0..3 {
                            sums[c] += n[c];
                        }
                    }
                }
                if is_dot {
                    for c in 0..3 {
                        row[x * 4 + c] = (sums[c] / 8) as u8;
                    }
                    continue;
                }

                // Sobel over the summed channels gives the edge normal.
                let mut gx = 0i32;
                let mut gy = 0i32;
                for c in 0..3 {
                    let p00 = at(x - 1, y - 1, c);
                    let p10 = at(x, y - 1, c);
                    let p20 = at(x + 1, y - 1, c);
                    let p01 = at(x - 1, y, c);
                    let p21 = at(x + 1, y, c);
                    let p02 = at(x - 1, y + 1, c);
                    let p12 = at(x, y + 1, c);
                    let p22 = at(x + 1, y + 1, c);
                    gx += -p00 + p20 - 2 * p01 + 2 * p21 - p02 + p22;
                    gy += -p00 - 2 * p10 - p20 + p02 + 2 * p12 + p22;
                }
                gx /= 3;
                gy /= 3;

                let grad_mag = (f64::from(gx * gx + gy * gy)).sqrt() as i32;
                if grad_mag > EDGE_THRESHOLD {
                    // Smooth along the edge, perpendicular to the gradient.
                    let (n1, n2) = if gx.abs() > gy.abs() {
                        ((x, y - 1), (x, y + 1))
                    } else {
                        ((x - 1, y), (x + 1, y))
                    };
                    for c in 0..3 {
                        let blended =
                            (2 * center[c] + at(n1.0, n1.1, c) + at(n2.0, n2.1, c)) / 4;
                        row[x * 4 + c] = blended as u8;
                    }
                }
            }
        });
}

/// Two bilateral passes over the pixels within two pixels of a block seam.
pub fn line_continuity(pix: &mut [u8], width: usize, height: usize) {
    if width == 0 || height == 0 {
        return;
    }

    let diameter = (2 * FILTER_RADIUS + 1) as usize;
    let mut spatial = vec![0.0f64; diameter * diameter];
    for dy in -FILTER_RADIUS..=FILTER_RADIUS {
        for dx in -FILTER_RADIUS..=FILTER_RADIUS {
            let d2 = f64::from(dx * dx + dy * dy);
            let idx = (dy + FILTER_RADIUS) as usize * diameter + (dx + FILTER_RADIUS) as usize;
            spatial[idx] = (-d2 / (2.0 * SIGMA_SPACE * SIGMA_SPACE)).exp();
        }
    }

    let near_seam = |x: usize, y: usize| {
        let xm = x % BLOCK_SIZE;
        let ym = y % BLOCK_SIZE;
        xm < SEAM_RADIUS
            || xm >= BLOCK_SIZE - SEAM_RADIUS
            || ym < SEAM_RADIUS
            || ym >= BLOCK_SIZE - SEAM_RADIUS
    };

    for _ in 0..NUM_PASSES {
        let src = pix.to_vec();
        pix.par_chunks_mut(width * 4)
            .enumerate()
            .for_each(|(y, row)| {
                for x in 0..width {
                    if !near_seam(x, y) {
                        continue;
                    }
                    let center = &src[(y * width + x) * 4..];
                    let (cr, cg, cb) = (
                        f64::from(center[0]),
                        f64::from(center[1]),
                        f64::from(center[2]),
                    );

                    let mut acc = [0.0f64; 3];
                    let mut weight_sum = 0.0f64;
                    for dy in -FILTER_RADIUS..=FILTER_RADIUS {
                        let ny = y as i32 + dy;
                        if ny < 0 || ny >= height as i32 {
                            continue;
                        }
                        for dx in -FILTER_RADIUS..=FILTER_RADIUS {
                            let nx = x as i32 + dx;
                            if nx < 0 || nx >= width as i32 {
                                continue;
                            }
                            let n = &src[(ny as usize * width + nx as usize) * 4..];
                            let (nr, ng, nb) =
                                (f64::from(n[0]), f64::from(n[1]), f64::from(n[2]));
                            let color_d2 = (cr - nr) * (cr - nr)
                                + (cg - ng) * (cg - ng)
                                + (cb - nb) * (cb - nb);
                            let color_weight =
                                (-color_d2 / (2.0 * SIGMA_COLOR * SIGMA_COLOR)).exp();
                            let sp_idx = (dy + FILTER_RADIUS) as usize * diameter
                                + (dx + FILTER_RADIUS) as usize;
                            let weight = spatial[sp_idx] * color_weight;
                            acc[0] += nr * weight;
                            acc[1] += ng * weight;
                            acc[2] += nb * weight;
                            weight_sum += weight;
                        }
                    }
                    if weight_sum > 0.0 {
                        for c in 0..3 {
                            row[x * 4 + c] = (acc[c] / weight_sum) as u8;
                        }
                    }
                }
            });
    }
}
