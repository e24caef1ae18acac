// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::io;
use std::result;

/// `RobotError` enumerates every fatal condition this crate can raise while
/// parsing or decoding a Robot container. Recoverable conditions are never
/// represented here; they are logged and folded into manifest flags or
/// silently-dropped audio packets instead.
#[derive(Debug)]
pub enum RobotError {
    /// An IO error occurred while reading or seeking the source.
    Io(io::Error),
    /// The 16-bit signature at offset 0 was not `0x16`.
    BadSignature(u16),
    /// The 4-byte tag at offset 2 was not `"SOL\0"`.
    BadTag([u8; 4]),
    /// The header declared a version outside `{4, 5, 6}`.
    UnsupportedVersion(u16),
    /// `x_res`/`y_res` fell outside the caller's configured bounds.
    ResolutionOutOfRange { x_res: u32, y_res: u32 },
    /// The endianness probe byte was out of the `1..=0xFF` plausible range
    /// and no override was supplied.
    InvalidEndianness(u16),
    /// Both `force_big_endian` and `force_little_endian` were set.
    ConflictingEndiannessOverride,
    /// The fixed header could not be read in full.
    TruncatedHeader,
    /// The audio primer could not be read in full.
    TruncatedPrimer,
    /// The palette blob could not be read in full.
    TruncatedPalette,
    /// A chunk's compression type was neither 0 (LZS) nor 2 (raw).
    BadCompressionType(u16),
    /// A cel's declared width/height/vertical scale failed validation.
    CelDimensionsInvalid { width: u32, height: u32, scale: u32 },
    /// A cel's pixel count exceeded the 20,000,000 pixel budget.
    CelPixelBudgetExceeded(u64),
    /// An LZS back-reference had an offset of 0 (outside the EOS sentinel
    /// position) or one exceeding the dictionary size.
    LzsBadOffset(u32),
    /// An LZS back-reference declared a length of 0.
    LzsBadLength,
    /// LZS decompression produced more bytes than `expected_size`.
    LzsOutputOverflow { produced: usize, expected: usize },
    /// The LZS bitstream ran out of input before reaching `expected_size`.
    LzsTruncated { produced: usize, expected: usize },
    /// LZS `expected_size` exceeded the 10 MB hard cap.
    LzsTooLarge(usize),
    /// `has_audio` was set but the primer could not be established, and
    /// audio decoding was subsequently requested.
    PrimerFlagsCorrupt,
    /// A computed allocation exceeded the crate's sanity bound.
    AllocationTooLarge(u64),
    /// The sum of declared frame record sizes exceeded the remaining bytes
    /// in the source.
    FrameSizeOverflow { frame_index: usize, needed: u64, remaining: u64 },
    /// An audio sub-block declared a payload longer than the bytes left in
    /// its frame record.
    OversizedBlock { frame_index: usize, declared: usize, remaining: usize },
}

impl fmt::Display for RobotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotError::Io(err) => err.fmt(f),
            RobotError::BadSignature(v) => {
                write!(f, "bad robot signature: expected 0x16, found {:#06x}", v)
            }
            RobotError::BadTag(tag) => {
                write!(f, "bad robot tag: expected \"SOL\\0\", found {:?}", tag)
            }
            RobotError::UnsupportedVersion(v) => {
                write!(f, "unsupported robot version {} (expected 4, 5, or 6)", v)
            }
            RobotError::ResolutionOutOfRange { x_res, y_res } => {
                write!(f, "resolution {}x{} is out of the configured range", x_res, y_res)
            }
            RobotError::InvalidEndianness(v) => {
                write!(f, "endianness probe value {:#06x} is not plausible", v)
            }
            RobotError::ConflictingEndiannessOverride => {
                f.write_str("force_big_endian and force_little_endian cannot both be set")
            }
            RobotError::TruncatedHeader => f.write_str("truncated robot header"),
            RobotError::TruncatedPrimer => f.write_str("truncated audio primer"),
            RobotError::TruncatedPalette => f.write_str("truncated palette blob"),
            RobotError::BadCompressionType(t) => {
                write!(f, "unknown chunk compression type {}", t)
            }
            RobotError::CelDimensionsInvalid { width, height, scale } => {
                write!(
                    f,
                    "invalid cel dimensions: width={} height={} vertical_scale={}",
                    width, height, scale
                )
            }
            RobotError::CelPixelBudgetExceeded(n) => {
                write!(f, "cel pixel count {} exceeds the 20,000,000 pixel budget", n)
            }
            RobotError::LzsBadOffset(off) => write!(f, "lzs: bad back-reference offset {}", off),
            RobotError::LzsBadLength => f.write_str("lzs: back-reference length was 0"),
            RobotError::LzsOutputOverflow { produced, expected } => write!(
                f,
                "lzs: produced {} bytes, exceeding the expected {}",
                produced, expected
            ),
            RobotError::LzsTruncated { produced, expected } => write!(
                f,
                "lzs: input exhausted after producing {} of {} expected bytes",
                produced, expected
            ),
            RobotError::LzsTooLarge(n) => {
                write!(f, "lzs: expected size {} exceeds the 10 MB cap", n)
            }
            RobotError::PrimerFlagsCorrupt => {
                f.write_str("audio primer flags are inconsistent and audio was requested")
            }
            RobotError::AllocationTooLarge(n) => {
                write!(f, "refusing to allocate {} bytes", n)
            }
            RobotError::FrameSizeOverflow { frame_index, needed, remaining } => write!(
                f,
                "frame {} needs {} bytes but only {} remain in the source",
                frame_index, needed, remaining
            ),
            RobotError::OversizedBlock { frame_index, declared, remaining } => write!(
                f,
                "frame {}: audio sub-block declares {} bytes but only {} remain",
                frame_index, declared, remaining
            ),
        }
    }
}

impl std::error::Error for RobotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RobotError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for RobotError {
    fn from(err: io::Error) -> RobotError {
        RobotError::Io(err)
    }
}

pub type Result<T> = result::Result<T, RobotError>;
