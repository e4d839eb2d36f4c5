//! JFIF YCbCr color conversion.
//!
//! Fixed-point forward and inverse transforms matching the usual JFIF
//! integer approximation (16-bit scaled weights, rounding bias, saturating
//! output). Chroma is biased to 128 so flat gray encodes as (Y, 128, 128).

/// Convert one RGB pixel to YCbCr.
#[inline]
#[must_use]
pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = i32::from(r);
    let g = i32::from(g);
    let b = i32::from(b);

    let y = (19595 * r + 38470 * g + 7471 * b + (1 << 15)) >> 16;
    let cb = ((-11056 * r - 21712 * g + 32768 * b + (257 << 15)) >> 16).clamp(0, 255);
    let cr = ((32768 * r - 27440 * g - 5328 * b + (257 << 15)) >> 16).clamp(0, 255);

    (y as u8, cb as u8, cr as u8)
}

/// Convert one YCbCr pixel back to RGB.
#[inline]
#[must_use]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    // 0x10101 spreads Y across the 16-bit fixed point with rounding.
    let yy = i32::from(y) * 0x10101;
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;

    let r = ((yy + 91881 * cr) >> 16).clamp(0, 255);
    let g = ((yy - 22554 * cb - 46802 * cr) >> 16).clamp(0, 255);
    let b = ((yy + 116130 * cb) >> 16).clamp(0, 255);

    (r as u8, g as u8, b as u8)
}
