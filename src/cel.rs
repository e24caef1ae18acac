// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vertical cel expansion: cels stored at less than full height are
//! decompressed at their squashed height and then expanded back out by a
//! Bresenham-style row replicator walking from the last source row to the
//! first.

use crate::error::{RobotError, Result};

/// Given a target `cel_height` and a `vertical_scale` percentage, returns
/// the height a cel is actually stored (and decompressed) at.
pub fn source_height(cel_height: u16, vertical_scale: u8) -> usize {
    if vertical_scale == 100 {
        return usize::from(cel_height);
    }
    let scaled = (u32::from(cel_height) * u32::from(vertical_scale)) / 100;
    scaled.max(1) as usize
}

/// Expands `source` (`cel_width * source_height(cel_height, vertical_scale)`
/// bytes, row-major, `bytes_per_pixel` bytes per pixel) into `target`
/// (`cel_width * cel_height * bytes_per_pixel` bytes).
pub fn expand(
    target: &mut [u8],
    source: &[u8],
    cel_width: u16,
    cel_height: u16,
    vertical_scale: u8,
    bytes_per_pixel: usize,
) -> Result<()> {
    let width = usize::from(cel_width);
    let height = usize::from(cel_height);
    let src_height = source_height(cel_height, vertical_scale);
    let row_bytes = width * bytes_per_pixel;

    let expected_source_len = row_bytes * src_height;
    let expected_target_len = row_bytes * height;
    if source.len() != expected_source_len || target.len() != expected_target_len {
        return Err(RobotError::CelDimensionsInvalid {
            width: u32::from(cel_width),
            height: u32::from(cel_height),
            scale: u32::from(vertical_scale),
        });
    }

    if vertical_scale == 100 {
        target.copy_from_slice(source);
        return Ok(());
    }

    // Walk source rows from the last to the first, handing out
    // `remainder / src_height` copies of each to the tail of the output
    // that hasn't been filled yet.
    let mut remainder: usize = 0;
    let mut out_row = height;
    for src_row in (0..src_height).rev() {
        remainder += height;
        let lines_to_draw = remainder / src_height;
        remainder %= src_height;
        let src_start = src_row * row_bytes;
        let src_slice = &source[src_start..src_start + row_bytes];
        for _ in 0..lines_to_draw {
            if out_row == 0 {
                break;
            }
            out_row -= 1;
            let dst_start = out_row * row_bytes;
            target[dst_start..dst_start + row_bytes].copy_from_slice(src_slice);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_row_duplication_worked_example() {
        let source: Vec<u8> = vec![1, 2, 3, 4, 5, 6];
        let mut target = vec![0u8; 12];
        expand(&mut target, &source, 3, 4, 50, 1).unwrap();
        assert_eq!(target, vec![1, 2, 3, 1, 2, 3, 4, 5, 6, 4, 5, 6]);
    }

    #[test]
    fn verify_full_scale_is_a_plain_copy() {
        let source: Vec<u8> = vec![9, 8, 7, 6];
        let mut target = vec![0u8; 4];
        expand(&mut target, &source, 2, 2, 100, 1).unwrap();
        assert_eq!(target, source);
    }

    #[test]
    fn verify_source_size_mismatch_is_rejected() {
        let source = vec![0u8; 3];
        let mut target = vec![0u8; 4];
        let err = expand(&mut target, &source, 2, 2, 50, 1).unwrap_err();
        assert!(matches!(err, RobotError::CelDimensionsInvalid { .. }));
    }

    #[test]
    fn verify_target_size_mismatch_is_rejected() {
        let source = vec![0u8; 2];
        let mut target = vec![0u8; 3];
        let err = expand(&mut target, &source, 2, 2, 50, 1).unwrap_err();
        assert!(matches!(err, RobotError::CelDimensionsInvalid { .. }));
    }

    #[test]
    fn verify_source_height_helper() {
        assert_eq!(source_height(4, 50), 2);
        assert_eq!(source_height(4, 100), 4);
        assert_eq!(source_height(1, 10), 1);
    }
}
