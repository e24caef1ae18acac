// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-frame decoding: cel headers, chunk dispatch (LZS/raw), vertical
//! expansion, palette lookup, and extraction of the trailing audio
//! sub-block.

use std::io::Cursor;

use log::{error, warn};

use crate::cel;
use crate::config::RobotOptions;
use crate::error::{RobotError, Result};
use crate::header::ContainerHeader;
use crate::io::ByteReader;
use crate::lzs;
use crate::manifest::{CelInfo, FrameInfo};
use crate::palette::HunkPalette;

const CEL_HEADER_SIZE: usize = 22;
const CHUNK_HEADER_SIZE: usize = 10;
const CEL_PIXEL_BUDGET: u64 = 20_000_000;
const AUDIO_SUBBLOCK_HEADER_SIZE: usize = 8;

pub struct DecodedCel {
    pub info: CelInfo,
    /// RGBA8, `width * height * 4` bytes, row-major.
    pub rgba: Vec<u8>,
}

pub struct DecodedFrame {
    pub info: FrameInfo,
    pub cels: Vec<DecodedCel>,
    /// Absolute half-sample position and raw compressed payload of the
    /// trailing audio sub-block, if any.
    pub audio_block: Option<(i32, Vec<u8>)>,
}

/// Decodes frame `frame_index` whose record starts at `record_pos` and
/// spans `frame_size` bytes (the video payload occupies the first
/// `video_size` of those).
#[allow(clippy::too_many_arguments)]
pub fn decode_frame<R: std::io::Read + std::io::Seek>(
    reader: &mut ByteReader<R>,
    frame_index: usize,
    record_pos: u64,
    frame_size: u64,
    video_size: u64,
    header: &ContainerHeader,
    palette: Option<&HunkPalette>,
    opts: &RobotOptions,
) -> Result<DecodedFrame> {
    let mut info = FrameInfo { frame_index, ..Default::default() };

    if frame_size == 0 {
        return Ok(DecodedFrame { info, cels: Vec::new(), audio_block: None });
    }

    reader.seek_to(record_pos)?;
    let raw = reader.read_vec_exact(frame_size as usize).map_err(|_| RobotError::FrameSizeOverflow {
        frame_index,
        needed: frame_size,
        remaining: 0,
    })?;

    let mut buf = ByteReader::new(Cursor::new(raw.clone()), header.big_endian);

    let num_cels = buf.read_u16()?;
    let mut cels = Vec::new();

    if num_cels > 10 {
        warn_unless_quiet(opts, &format!("frame {} declares {} cels, skipping", frame_index, num_cels));
    } else {
        let palette_present = palette.map(|p| p.valid && p.color_count > 0).unwrap_or(false);
        if palette.is_none() {
            info.palette_required = true;
        } else if !palette.unwrap().valid {
            info.palette_required = true;
            info.palette_parse_failed = true;
            info.palette_raw = true;
        }

        for cel_index in 0..num_cels {
            match decode_one_cel(&mut buf, &raw, cel_index, frame_index, palette_present, palette, opts) {
                Ok(Some(decoded)) => cels.push(decoded),
                Ok(None) => {}
                Err(err) => return Err(err),
            }
        }
    }

    info.cels = cels.iter().map(|c| c.info.clone()).collect();

    let audio_block = if header.has_audio && video_size < frame_size {
        let payload_len = (frame_size - video_size) as usize;
        if payload_len >= AUDIO_SUBBLOCK_HEADER_SIZE {
            buf.seek_to(video_size)?;
            let position = buf.read_i32()?;
            let declared_len = buf.read_u32()? as usize;
            let remaining = payload_len - AUDIO_SUBBLOCK_HEADER_SIZE;
            if declared_len > remaining {
                return Err(RobotError::OversizedBlock { frame_index, declared: declared_len, remaining });
            }
            let payload = buf.read_vec_exact(declared_len)?;
            Some((position, payload))
        } else {
            None
        }
    } else {
        None
    };

    Ok(DecodedFrame { info, cels, audio_block })
}

fn warn_unless_quiet(opts: &RobotOptions, message: &str) {
    if !opts.quiet {
        warn!("{}", message);
    }
}

fn decode_one_cel(
    buf: &mut ByteReader<Cursor<Vec<u8>>>,
    raw: &[u8],
    cel_index: u16,
    frame_index: usize,
    palette_present: bool,
    palette: Option<&HunkPalette>,
    opts: &RobotOptions,
) -> Result<Option<DecodedCel>> {
    let header_start = buf.pos()? as usize;
    if header_start + CEL_HEADER_SIZE > raw.len() {
        return Err(RobotError::TruncatedHeader);
    }
    let cel_header = &raw[header_start..header_start + CEL_HEADER_SIZE];

    let vertical_scale = cel_header[1];
    let big_endian = buf.is_big_endian();
    let width = read_u16_at(cel_header, 2, big_endian);
    let height = read_u16_at(cel_header, 4, big_endian);
    let x = read_i16_at(cel_header, 10, big_endian);
    let y = read_i16_at(cel_header, 12, big_endian);
    let _data_size = read_u16_at(cel_header, 14, big_endian);
    let num_chunks = read_u16_at(cel_header, 16, big_endian);

    if width == 0 || height == 0 || !(1..=100).contains(&vertical_scale) {
        return Err(RobotError::CelDimensionsInvalid {
            width: u32::from(width),
            height: u32::from(height),
            scale: u32::from(vertical_scale),
        });
    }
    let area = u64::from(width) * u64::from(height);
    if area > CEL_PIXEL_BUDGET {
        return Err(RobotError::CelPixelBudgetExceeded(area));
    }

    let source_height = cel::source_height(height, vertical_scale);
    let expected = usize::from(width) * source_height;
    if expected as u64 > CEL_PIXEL_BUDGET {
        return Err(RobotError::CelPixelBudgetExceeded(expected as u64));
    }

    let mut cel_buffer: Vec<u8> = Vec::with_capacity(expected);
    let cel_data_start = header_start + CEL_HEADER_SIZE;
    let mut cursor = cel_data_start;

    for _ in 0..num_chunks {
        if cursor + CHUNK_HEADER_SIZE > raw.len() {
            return Err(RobotError::TruncatedHeader);
        }
        let chunk_header = &raw[cursor..cursor + CHUNK_HEADER_SIZE];
        let comp_size = read_u32_at(chunk_header, 0, big_endian) as usize;
        let decomp_size = read_u32_at(chunk_header, 4, big_endian) as usize;
        let comp_type = read_u16_at(chunk_header, 8, big_endian);
        cursor += CHUNK_HEADER_SIZE;

        if cursor + comp_size > raw.len() {
            return Err(RobotError::TruncatedHeader);
        }

        let remaining_expected = expected.saturating_sub(cel_buffer.len());
        if decomp_size > remaining_expected {
            error!(
                "cel {} in frame {}: chunk decompressed size exceeds remaining space",
                cel_index, frame_index
            );
            cursor += comp_size;
            continue;
        }

        let comp = &raw[cursor..cursor + comp_size];
        match comp_type {
            0 => {
                let decoded = lzs::decompress(comp, decomp_size, &cel_buffer)?;
                cel_buffer.extend_from_slice(&decoded);
            }
            2 => {
                if comp_size != decomp_size {
                    return Err(RobotError::BadCompressionType(comp_type));
                }
                cel_buffer.extend_from_slice(comp);
            }
            other => return Err(RobotError::BadCompressionType(other)),
        }
        cursor += comp_size;
    }
    buf.seek_to(cursor as u64)?;

    let indexed: Vec<u8> = if vertical_scale != 100 {
        let mut expanded = vec![0u8; usize::from(width) * usize::from(height)];
        if cel_buffer.len() == expected {
            cel::expand(&mut expanded, &cel_buffer, width, height, vertical_scale, 1)?;
        } else {
            warn_unless_quiet(
                opts,
                &format!("cel {} in frame {} decompressed short; zero-filling", cel_index, frame_index),
            );
            let n = cel_buffer.len().min(expanded.len());
            expanded[..n].copy_from_slice(&cel_buffer[..n]);
        }
        expanded
    } else if cel_buffer.len() == expected {
        cel_buffer
    } else {
        warn_unless_quiet(
            opts,
            &format!("cel {} in frame {} decompressed short; zero-filling", cel_index, frame_index),
        );
        let mut full = vec![0u8; expected];
        let n = cel_buffer.len().min(full.len());
        full[..n].copy_from_slice(&cel_buffer[..n]);
        full
    };

    let mut rgba = vec![0u8; indexed.len() * 4];
    for (pixel_index, &palette_index) in indexed.iter().enumerate() {
        let dst = pixel_index * 4;
        if palette_present {
            if let Some(entry) = palette.and_then(|p| p.entry(palette_index)) {
                rgba[dst] = entry.r;
                rgba[dst + 1] = entry.g;
                rgba[dst + 2] = entry.b;
                rgba[dst + 3] = 0xFF;
                continue;
            }
        }
        rgba[dst + 3] = 0xFF;
    }

    Ok(Some(DecodedCel { info: CelInfo { width, height, x, y }, rgba }))
}

fn read_u16_at(buf: &[u8], offset: usize, big_endian: bool) -> u16 {
    let bytes = [buf[offset], buf[offset + 1]];
    if big_endian {
        u16::from_be_bytes(bytes)
    } else {
        u16::from_le_bytes(bytes)
    }
}

fn read_i16_at(buf: &[u8], offset: usize, big_endian: bool) -> i16 {
    read_u16_at(buf, offset, big_endian) as i16
}

fn read_u32_at(buf: &[u8], offset: usize, big_endian: bool) -> u32 {
    let bytes = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
    if big_endian {
        u32::from_be_bytes(bytes)
    } else {
        u32::from_le_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn verify_empty_frame_size_yields_empty_entry() {
        let mut reader = ByteReader::new(Cursor::new(vec![0u8; 0]), false);
        let header = sample_header();
        let opts = RobotOptions::default();
        let frame = decode_frame(&mut reader, 0, 0, 0, 0, &header, None, &opts).unwrap();
        assert!(frame.cels.is_empty());
        assert_eq!(frame.info.frame_index, 0);
    }

    fn sample_header() -> ContainerHeader {
        ContainerHeader {
            big_endian: false,
            version: 5,
            audio_blk_size: 0,
            primer_zero_compress: 0,
            num_frames: 1,
            palette_size: 0,
            primer_reserved_size: 0,
            x_res: 320,
            y_res: 200,
            has_palette: false,
            has_audio: false,
            frame_rate: 12,
            is_hi_res: false,
            max_skippable_packets: 0,
            max_cels_per_frame: 1,
            fixed_cel_sizes: [0; 4],
            reserved: [0; 2],
        }
    }
}
