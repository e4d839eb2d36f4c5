//! GAP: a gradient-aligned patch image codec.
//!
//! Compresses 2D raster images patch by patch: each 8x8 block is aligned
//! to its dominant gradient by a precomputed pixel permutation, pushed
//! through a 64-point DFT, spectrally shaped, sparsified, quantized, and
//! range-coded into five per-plane streams.
//!
//! # Architecture
//!
//! ```text
//! RGB → YCbCr (4:2:0) → per patch: gradient → permute → FFT → k^(-s)
//!     → threshold → int8 quantize → {Angles, Counts, MaxVals, Indices,
//!       Values} → adaptive range coder → .gap container
//! ```
//!
//! Decoding mirrors the chain and finishes with a three-stage post-filter
//! (deblocking, directional antialiasing, seam bilateral) that targets
//! the block artifacts a patch transform leaves behind.
//!
//! # Example
//!
//! ```rust
//! use gap_codec::{GapDecoder, GapEncoder};
//!
//! let rgb = vec![128u8; 16 * 16 * 3];
//! let encoder = GapEncoder::new(0.1, 0.5).unwrap();
//! let bytes = encoder.encode_rgb(&rgb, 16, 16).unwrap();
//!
//! let image = GapDecoder::new().decode(&bytes).unwrap();
//! assert_eq!(image.rgba.len(), 16 * 16 * 4);
//! ```

pub mod color;
pub mod container;
pub mod error;
pub mod filters;
pub mod gradient;
pub mod metrics;
pub mod patch;
pub mod permute;
pub mod pipeline;
pub mod plane;
pub mod rangecoder;
pub mod spectral;

// Re-exports
pub use container::{GapHeader, CANONICAL_FLAGS};
pub use error::GapError;
pub use pipeline::{DecodedImage, GapDecoder, GapEncoder};
pub use plane::GrayPlane;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Patch edge length in pixels.
pub const PATCH_DIM: usize = 8;

/// Samples per patch (8x8).
pub const PATCH_SAMPLES: usize = 64;
