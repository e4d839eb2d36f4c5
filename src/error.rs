//! Error types for the GAP codec.
//!
//! All public APIs that can fail return `Result<T, GapError>`. Patch-level
//! numeric issues are never errors (degenerate samples are clamped during
//! reconstruction); only container and stream corruption is fatal.

use core::fmt;

/// Errors that can occur during encoding or decoding.
#[derive(Clone, Debug, PartialEq)]
pub enum GapError {
    /// The input does not start with the `GAP\x01` magic bytes.
    BadMagic { found: [u8; 4] },
    /// Header channel count outside {1, 3}.
    BadChannels { channels: u32 },
    /// The file uses a layout this decoder does not support
    /// (legacy gzip or non-range-coded bitstreams).
    UnsupportedLayout { flags: u32 },
    /// The container ends before the declared payload.
    Truncated { expected: usize, got: usize },
    /// A per-plane stream is inconsistent with the patch grid.
    CorruptStream {
        plane: usize,
        stream: &'static str,
        detail: String,
    },
    /// An encoder parameter is outside its documented range.
    ParameterOutOfRange { name: &'static str, value: f32 },
    /// Input buffer size does not match the declared dimensions.
    InvalidBufferSize { expected: usize, got: usize },
    /// Dimensions overflow `usize` when multiplied together.
    DimensionOverflow,
}

impl fmt::Display for GapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic { found } => {
                write!(f, "bad magic {found:02x?} (expected GAP\\x01)")
            }
            Self::BadChannels { channels } => {
                write!(f, "invalid channel count {channels} (expected 1 or 3)")
            }
            Self::UnsupportedLayout { flags } => {
                write!(f, "unsupported bitstream layout (flags {flags:#06b})")
            }
            Self::Truncated { expected, got } => {
                write!(f, "truncated container: need {expected} bytes, have {got}")
            }
            Self::CorruptStream {
                plane,
                stream,
                detail,
            } => {
                write!(f, "plane {plane} stream {stream}: {detail}")
            }
            Self::ParameterOutOfRange { name, value } => {
                write!(f, "parameter {name} = {value} out of range")
            }
            Self::InvalidBufferSize { expected, got } => {
                write!(f, "buffer size mismatch: expected {expected}, got {got}")
            }
            Self::DimensionOverflow => write!(f, "dimensions overflow usize"),
        }
    }
}

impl std::error::Error for GapError {}
