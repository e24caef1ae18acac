// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Robot variant of Stac-LZS: an MSB-first bitstream decoder producing
//! a caller-known number of bytes, with an optional history prefix so a
//! cel's chunks can reference bytes decoded by earlier chunks.

use crate::bitstream::BitReaderMsb;
use crate::error::{RobotError, Result};

/// Hard cap on a single chunk's declared decompressed size.
pub const MAX_OUTPUT_SIZE: usize = 10_000_000;

/// History is only ever visible up to this many trailing bytes.
const MAX_OFFSET: usize = (1 << 11) - 1;

fn read_compressed_length(reader: &mut BitReaderMsb<'_>) -> Result<usize> {
    let short_error = || truncated_error();
    match reader.read_bits(2).ok_or_else(short_error)? {
        0 => Ok(2),
        1 => Ok(3),
        2 => Ok(4),
        _ => match reader.read_bits(2).ok_or_else(short_error)? {
            0 => Ok(5),
            1 => Ok(6),
            2 => Ok(7),
            _ => {
                let mut length = 8usize;
                loop {
                    let nibble = reader.read_bits(4).ok_or_else(short_error)?;
                    length += nibble as usize;
                    if nibble != 0xF {
                        break;
                    }
                }
                Ok(length)
            }
        },
    }
}

fn truncated_error() -> RobotError {
    // The precise produced/expected counts are filled in by the caller once
    // it knows how much it has actually emitted; this placeholder is only
    // ever used for the "bits ran out" case, where the caller has the
    // context to rebuild the real error.
    RobotError::LzsTruncated { produced: 0, expected: 0 }
}

/// Decompresses `input` into exactly `expected_size` bytes, consulting
/// `history` (its trailing `MAX_OFFSET` bytes, at most) as a dictionary
/// prefix for back-references that reach before the start of `input`.
pub fn decompress(input: &[u8], expected_size: usize, history: &[u8]) -> Result<Vec<u8>> {
    if expected_size > MAX_OUTPUT_SIZE {
        return Err(RobotError::LzsTooLarge(expected_size));
    }

    let history_to_copy = history.len().min(MAX_OFFSET);
    let mut dictionary = Vec::with_capacity(history_to_copy + expected_size);
    dictionary.extend_from_slice(&history[history.len() - history_to_copy..]);
    let history_len = dictionary.len();

    let mut reader = BitReaderMsb::new(input);

    while dictionary.len() - history_len < expected_size {
        let flag = reader
            .read_bit()
            .ok_or_else(|| truncated_err(dictionary.len() - history_len, expected_size))?;

        if flag == 0 {
            let byte = reader
                .read_bits(8)
                .ok_or_else(|| truncated_err(dictionary.len() - history_len, expected_size))?
                as u8;
            push_literal(&mut dictionary, history_len, expected_size, byte)?;
            continue;
        }

        let short_offset = reader
            .read_bit()
            .ok_or_else(|| truncated_err(dictionary.len() - history_len, expected_size))?
            != 0;
        let offset_bits = if short_offset { 7 } else { 11 };
        let offset = reader
            .read_bits(offset_bits)
            .ok_or_else(|| truncated_err(dictionary.len() - history_len, expected_size))?
            as usize;

        if short_offset && offset == 0 {
            // End-of-stream sentinel.
            break;
        }
        if offset == 0 || offset > dictionary.len() {
            return Err(RobotError::LzsBadOffset(offset as u32));
        }

        let length = read_compressed_length(&mut reader)
            .map_err(|_| truncated_err(dictionary.len() - history_len, expected_size))?;
        if length == 0 {
            return Err(RobotError::LzsBadLength);
        }

        let mut src = dictionary.len() - offset;
        for _ in 0..length {
            if src >= dictionary.len() {
                return Err(RobotError::LzsBadOffset(offset as u32));
            }
            let byte = dictionary[src];
            push_literal(&mut dictionary, history_len, expected_size, byte)?;
            src += 1;
        }
    }

    let produced = dictionary.len() - history_len;
    if produced != expected_size {
        return Err(RobotError::LzsTruncated { produced, expected: expected_size });
    }

    Ok(dictionary.split_off(history_len))
}

fn push_literal(
    dictionary: &mut Vec<u8>,
    history_len: usize,
    expected_size: usize,
    byte: u8,
) -> Result<()> {
    if dictionary.len() - history_len >= expected_size {
        return Err(RobotError::LzsOutputOverflow {
            produced: dictionary.len() - history_len + 1,
            expected: expected_size,
        });
    }
    dictionary.push(byte);
    Ok(())
}

fn truncated_err(produced: usize, expected: usize) -> RobotError {
    RobotError::LzsTruncated { produced, expected }
}
