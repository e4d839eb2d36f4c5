//! Basic encode/decode roundtrip for the GAP codec.
//!
//! ```sh
//! cargo run --example basic_roundtrip
//! ```

use gap_codec::{metrics, GapDecoder, GapEncoder};

fn main() {
    let width = 128u32;
    let height = 96u32;
    let n_pixels = (width * height) as usize;

    // Synthetic diagonal gradient with a soft disc in the middle.
    let mut rgb = vec![0u8; n_pixels * 3];
    for y in 0..height {
        for x in 0..width {
            let i = ((y * width + x) * 3) as usize;
            let dx = x as f32 - width as f32 / 2.0;
            let dy = y as f32 - height as f32 / 2.0;
            let disc = (1.0 - (dx * dx + dy * dy).sqrt() / 40.0).clamp(0.0, 1.0);
            rgb[i] = (x * 255 / width) as u8;
            rgb[i + 1] = (y * 255 / height) as u8;
            rgb[i + 2] = (disc * 255.0) as u8;
        }
    }

    let encoder = GapEncoder::new(0.1, 0.5).expect("parameters in range");
    let encoded = encoder
        .encode_rgb(&rgb, width, height)
        .expect("encode succeeds");

    let decoded = GapDecoder::new().decode(&encoded).expect("decode succeeds");

    let ratio = rgb.len() as f64 / encoded.len() as f64;
    let report = metrics::rgb_distortion(&rgb, &decoded).expect("matching dimensions");

    println!("Original:   {} bytes", rgb.len());
    println!("Compressed: {} bytes", encoded.len());
    println!("Ratio:      {ratio:.2}x");
    println!("PSNR:       {:.2} dB", report.psnr);
    println!("Peak error: {} levels", report.max_error);
}
