//! `.gap` container layout: header, flags, and stream blocks.
//!
//! # Layout
//!
//! ```text
//! ┌────────────────────┐
//! │ Header (28 bytes)  │  magic "GAP\x01", dims, s, threshold, flags, ch
//! ├────────────────────┤
//! │ plane 0, stream 0  │  u32 uncompressed len, u32 compressed len, data
//! │ plane 0, stream 1  │
//! │        ...         │  five streams per plane: Angles, Counts,
//! │ plane N-1, stream 4│  MaxVals, Indices, Values
//! └────────────────────┘
//! ```
//!
//! All integers and floats are little-endian. Empty streams are written as
//! two zero length words with no payload.

use crate::error::GapError;

/// File magic: "GAP" plus a format version byte.
pub const MAGIC: [u8; 4] = [0x47, 0x41, 0x50, 0x01];

/// Header size in bytes.
pub const HEADER_BYTES: usize = 28;

/// Streams per plane, in emission order.
pub const STREAMS_PER_PLANE: usize = 5;

/// Stream names in emission order, used in error reporting.
pub const STREAM_NAMES: [&str; STREAMS_PER_PLANE] =
    ["Angles", "Counts", "MaxVals", "Indices", "Values"];

/// Legacy gzip payload marker; recognized but never emitted.
pub const FLAG_GZIP: u32 = 1;
/// Coefficients are int8-quantized with a per-patch MaxVal.
pub const FLAG_QUANTIZED: u32 = 2;
/// Chroma planes are stored at quarter resolution (4:2:0).
pub const FLAG_SUBSAMPLED: u32 = 4;
/// Streams are range-coded (five-stream split layout).
pub const FLAG_RANGE_CODED: u32 = 8;

/// The only flag combination this encoder emits.
pub const CANONICAL_FLAGS: u32 = FLAG_QUANTIZED | FLAG_SUBSAMPLED | FLAG_RANGE_CODED;

/// Parsed 28-byte container header.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GapHeader {
    /// Original image width in pixels.
    pub width: u32,
    /// Original image height in pixels.
    pub height: u32,
    /// Polylog decay used for the Y plane.
    pub s: f32,
    /// Sparsifier cutoff used for the Y plane.
    pub threshold: f32,
    /// Layout flags; see the `FLAG_*` constants.
    pub flags: u32,
    /// 1 (grayscale) or 3 (YCbCr).
    pub channels: u32,
}

impl GapHeader {
    /// Serialize to the fixed 28-byte little-endian layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_BYTES] {
        let mut buf = [0u8; HEADER_BYTES];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&self.width.to_le_bytes());
        buf[8..12].copy_from_slice(&self.height.to_le_bytes());
        buf[12..16].copy_from_slice(&self.s.to_le_bytes());
        buf[16..20].copy_from_slice(&self.threshold.to_le_bytes());
        buf[20..24].copy_from_slice(&self.flags.to_le_bytes());
        buf[24..28].copy_from_slice(&self.channels.to_le_bytes());
        buf
    }

    /// Parse and validate a header from the start of `data`.
    ///
    /// # Errors
    ///
    /// [`GapError::Truncated`] if fewer than 28 bytes are available,
    /// [`GapError::BadMagic`] on a magic mismatch, and
    /// [`GapError::BadChannels`] for a channel count outside {1, 3}.
    pub fn from_bytes(data: &[u8]) -> Result<Self, GapError> {
        if data.len() < HEADER_BYTES {
            return Err(GapError::Truncated {
                expected: HEADER_BYTES,
                got: data.len(),
            });
        }
        if data[0..4] != MAGIC {
            return Err(GapError::BadMagic {
                found: [data[0], data[1], data[2], data[3]],
            });
        }
        let read_u32 =
            |off: usize| u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]]);
        let header = Self {
            width: read_u32(4),
            height: read_u32(8),
            s: f32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            threshold: f32::from_le_bytes([data[16], data[17], data[18], data[19]]),
            flags: read_u32(20),
            channels: read_u32(24),
        };
        if header.channels != 1 && header.channels != 3 {
            return Err(GapError::BadChannels {
                channels: header.channels,
            });
        }
        Ok(header)
    }

    /// Reject layouts this decoder cannot reconstruct (legacy gzip or
    /// non-range-coded, non-quantized bitstreams).
    pub fn require_supported_layout(&self) -> Result<(), GapError> {
        let required = FLAG_QUANTIZED | FLAG_RANGE_CODED;
        if self.flags & FLAG_GZIP != 0 || self.flags & required != required {
            return Err(GapError::UnsupportedLayout { flags: self.flags });
        }
        Ok(())
    }
}

/// Append one `u32 U, u32 C, C bytes` stream block.
pub fn write_stream_block(out: &mut Vec<u8>, uncompressed_len: usize, compressed: &[u8]) {
    out.extend_from_slice(&(uncompressed_len as u32).to_le_bytes());
    out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
    out.extend_from_slice(compressed);
}

/// One pre-read stream block: declared raw length plus compressed payload.
#[derive(Debug)]
pub struct StreamBlock<'a> {
    pub uncompressed_len: usize,
    pub data: &'a [u8],
}

/// Read one stream block at `*offset`, advancing it past the payload.
///
/// # Errors
///
/// [`GapError::CorruptStream`] naming the plane and stream when the
/// container ends inside the block.
pub fn read_stream_block<'a>(
    data: &'a [u8],
    offset: &mut usize,
    plane: usize,
    stream: usize,
) -> Result<StreamBlock<'a>, GapError> {
    let corrupt = |detail: String| GapError::CorruptStream {
        plane,
        stream: STREAM_NAMES[stream],
        detail,
    };

    if *offset + 8 > data.len() {
        return Err(corrupt(format!(
            "block header at offset {} past end of container ({} bytes)",
            *offset,
            data.len()
        )));
    }
    let read_u32 = |off: usize| {
        u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]]) as usize
    };
    let uncompressed_len = read_u32(*offset);
    let compressed_len = read_u32(*offset + 4);
    *offset += 8;

    if *offset + compressed_len > data.len() {
        return Err(corrupt(format!(
            "payload of {} bytes overruns container",
            compressed_len
        )));
    }
    let block = StreamBlock {
        uncompressed_len,
        data: &data[*offset..*offset + compressed_len],
    };
    *offset += compressed_len;
    Ok(block)
}
