// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Container header, audio primer, palette blob, size tables, cue tables,
//! and the deterministic file-offset/table-order resolution that turns
//! them into a record-position index.

use std::io::{Read, Seek};

use log::{debug, warn};

use crate::config::RobotOptions;
use crate::error::{RobotError, Result};
use crate::io::ByteReader;

const SECTOR_SIZE: u64 = 2048;
const SCREEN_ITEM_LIST_SIZE: u16 = 10;
const CEL_PIXEL_BUDGET: u64 = 20_000_000;
const ZERO_COMPRESS_EVEN_SIZE: usize = 19922;
const ZERO_COMPRESS_ODD_SIZE: usize = 21024;

#[derive(Debug, Clone)]
pub struct ContainerHeader {
    pub big_endian: bool,
    pub version: u16,
    pub audio_blk_size: u16,
    pub primer_zero_compress: i16,
    pub num_frames: u16,
    pub palette_size: u16,
    pub primer_reserved_size: u16,
    pub x_res: i16,
    pub y_res: i16,
    pub has_palette: bool,
    pub has_audio: bool,
    pub frame_rate: i16,
    pub is_hi_res: bool,
    pub max_skippable_packets: i16,
    pub max_cels_per_frame: i16,
    pub fixed_cel_sizes: [u32; 4],
    pub reserved: [u32; 2],
}

/// Reads the fixed 60-byte (plus version-gated extensions) container
/// header, resolving endianness first.
pub fn parse_header<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    opts: &RobotOptions,
) -> Result<ContainerHeader> {
    if opts.force_big_endian && opts.force_little_endian {
        return Err(RobotError::ConflictingEndiannessOverride);
    }

    reader.seek_to(0)?;
    let signature = reader.read_u16_order(false)?;
    if signature != 0x16 {
        return Err(RobotError::BadSignature(signature));
    }

    let mut tag = [0u8; 4];
    tag[0] = reader.read_u8()?;
    tag[1] = reader.read_u8()?;
    tag[2] = reader.read_u8()?;
    tag[3] = reader.read_u8()?;
    if &tag != b"SOL\0" {
        return Err(RobotError::BadTag(tag));
    }

    let big_endian = if opts.force_big_endian {
        true
    } else if opts.force_little_endian {
        false
    } else {
        let probe = reader.read_u16_order(true)?;
        reader.seek_to(6)?;
        (1..=0x00FF).contains(&probe)
    };
    reader.set_big_endian(big_endian);

    let version = reader.read_u16()?;
    if !(4..=6).contains(&version) {
        return Err(RobotError::UnsupportedVersion(version));
    }

    let audio_blk_size = reader.read_u16()?;
    let primer_zero_compress = reader.read_i16()?;
    if primer_zero_compress != 0 && primer_zero_compress != 1 {
        warn_unless_quiet(
            opts,
            &format!("non-standard primer_zero_compress value {}", primer_zero_compress),
        );
    }
    reader.ignore_bytes(2)?;

    let mut num_frames = reader.read_u16()?;
    if num_frames == 0 {
        warn_unless_quiet(opts, "header declares zero frames");
    }

    let palette_size = reader.read_u16()?;
    let primer_reserved_size = reader.read_u16()?;
    let x_res = reader.read_i16()?;
    let y_res = reader.read_i16()?;
    if x_res < 0
        || y_res < 0
        || u32::from(x_res.unsigned_abs()) > opts.max_x_res
        || u32::from(y_res.unsigned_abs()) > opts.max_y_res
    {
        return Err(RobotError::ResolutionOutOfRange {
            x_res: u32::from(x_res.unsigned_abs()),
            y_res: u32::from(y_res.unsigned_abs()),
        });
    }

    let has_palette = reader.read_u8()? != 0;
    let has_audio = reader.read_u8()? != 0;
    reader.ignore_bytes(2)?;

    let mut frame_rate = reader.read_i16()?;
    if frame_rate <= 0 {
        warn_unless_quiet(opts, &format!("invalid frame rate {}, clamping to 1", frame_rate));
        frame_rate = 1;
    }
    let is_hi_res = reader.read_i16()? != 0;
    let max_skippable_packets = reader.read_i16()?;
    let mut max_cels_per_frame = reader.read_i16()?;
    if max_cels_per_frame < 1 {
        warn_unless_quiet(
            opts,
            &format!("non-positive max_cels_per_frame {}", max_cels_per_frame),
        );
    } else if max_cels_per_frame > 10 {
        warn_unless_quiet(opts, &format!("large max_cels_per_frame {}", max_cels_per_frame));
        max_cels_per_frame = max_cels_per_frame.max(10);
    }

    let mut fixed_cel_sizes = [0u32; 4];
    if version >= 6 {
        for slot in fixed_cel_sizes.iter_mut() {
            let val = reader.read_i32()?;
            *slot = if val < 0 {
                warn_unless_quiet(opts, &format!("negative fixed cel area {}, using 0", val));
                0
            } else {
                val as u32
            };
        }
    }

    let mut reserved = [0u32; 2];
    if version >= 5 {
        for slot in reserved.iter_mut() {
            *slot = reader.read_u32()?;
        }
    }

    if num_frames > crate::MAX_FRAMES {
        warn_unless_quiet(opts, &format!("large declared frame count {}", num_frames));
    }
    // num_frames is used as an allocation size below; leave it as read, the
    // caller sees the same warning-only policy as the reference.
    let _ = &mut num_frames;

    Ok(ContainerHeader {
        big_endian,
        version,
        audio_blk_size,
        primer_zero_compress,
        num_frames,
        palette_size,
        primer_reserved_size,
        x_res,
        y_res,
        has_palette,
        has_audio,
        frame_rate,
        is_hi_res,
        max_skippable_packets,
        max_cels_per_frame,
        fixed_cel_sizes,
        reserved,
    })
}

fn warn_unless_quiet(opts: &RobotOptions, message: &str) {
    if !opts.quiet {
        warn!("{}", message);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Primer {
    pub even: Vec<u8>,
    pub odd: Vec<u8>,
    pub invalid: bool,
    /// True when `even`/`odd` are the fixed-size all-zero placeholder
    /// buffers synthesized for `primer_reserved_size == 0`, rather than
    /// captured audio. The reassembler marks these samples
    /// `zero_compressed` so a later real packet can silently replace them.
    pub synthesized_zero: bool,
}

/// Parses the audio primer, if any, always leaving the cursor at
/// `primer_header_start + primer_reserved_size` (or the post-header
/// position when there is no audio).
pub fn parse_primer<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    header: &ContainerHeader,
    opts: &RobotOptions,
) -> Result<Primer> {
    if !header.has_audio {
        reader.ignore_bytes(u64::from(header.primer_reserved_size))?;
        return Ok(Primer::default());
    }

    if header.primer_reserved_size == 0 {
        return if header.primer_zero_compress != 0 {
            Ok(Primer {
                even: vec![0u8; ZERO_COMPRESS_EVEN_SIZE],
                odd: vec![0u8; ZERO_COMPRESS_ODD_SIZE],
                invalid: false,
                synthesized_zero: true,
            })
        } else {
            Ok(Primer { even: Vec::new(), odd: Vec::new(), invalid: true, synthesized_zero: false })
        };
    }

    let primer_header_start = reader.pos()?;
    let total_primer_size = reader.read_i32()?;
    let comp_type = reader.read_i16()?;
    let even_size = reader.read_i32()?;
    let odd_size = reader.read_i32()?;

    let reserved_end = primer_header_start + u64::from(header.primer_reserved_size);

    if comp_type != 0 || total_primer_size < 0 || even_size < 0 || odd_size < 0 {
        warn_unless_quiet(opts, "audio primer header is internally inconsistent");
        reader.seek_to(reserved_end)?;
        return Ok(Primer { even: Vec::new(), odd: Vec::new(), invalid: true, synthesized_zero: false });
    }

    if total_primer_size == 0 {
        reader.seek_to(reserved_end)?;
        return Ok(Primer { even: Vec::new(), odd: Vec::new(), invalid: false, synthesized_zero: false });
    }

    let after_header = reader.pos()?;
    let available = reserved_end.saturating_sub(after_header);

    let even = read_primer_channel(reader, even_size as usize, available)?;
    let remaining_after_even = reserved_end.saturating_sub(reader.pos()?);
    let odd = read_primer_channel(reader, odd_size as usize, remaining_after_even)?;

    if reader.pos()? < reserved_end {
        reader.seek_to(reserved_end)?;
    }

    Ok(Primer { even, odd, invalid: false, synthesized_zero: false })
}

/// Reads up to `requested` bytes (never more than `available`), zero-filling
/// the rest of the returned buffer when the reserved region runs out early.
fn read_primer_channel<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    requested: usize,
    available: u64,
) -> Result<Vec<u8>> {
    let mut dest = vec![0u8; requested];
    let to_copy = available.min(requested as u64) as usize;
    if to_copy > 0 {
        // A short underlying read leaves `dest` zero-filled; the reserved
        // region's own bound is already respected by `to_copy`.
        let _ = reader.read_exact_rewind(&mut dest[..to_copy]);
    }
    Ok(dest)
}

/// Reads the raw HunkPalette blob verbatim for later parsing.
pub fn parse_palette_blob<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    header: &ContainerHeader,
) -> Result<Vec<u8>> {
    if !header.has_palette {
        return Ok(Vec::new());
    }
    reader
        .read_vec_exact(usize::from(header.palette_size))
        .map_err(|_| RobotError::TruncatedPalette)
}

#[derive(Debug, Clone)]
pub struct SizesCues {
    pub table_a: Vec<u64>,
    pub table_b: Vec<u64>,
    pub cue_times: Vec<i32>,
    pub cue_values: Vec<u16>,
}

/// Reads the two parallel per-frame size tables and the fixed 256-entry
/// cue tables, without yet resolving which table is "video" or "packet".
pub fn parse_sizes_cues<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    header: &ContainerHeader,
) -> Result<SizesCues> {
    let n = usize::from(header.num_frames);
    let wide = header.version >= 6;

    let mut table_a = Vec::with_capacity(n);
    for _ in 0..n {
        table_a.push(if wide { u64::from(reader.read_u32()?) } else { u64::from(reader.read_u16()?) });
    }
    let mut table_b = Vec::with_capacity(n);
    for _ in 0..n {
        table_b.push(if wide { u64::from(reader.read_u32()?) } else { u64::from(reader.read_u16()?) });
    }

    let mut cue_times = Vec::with_capacity(256);
    for _ in 0..256 {
        cue_times.push(reader.read_i32()?);
    }
    let mut cue_values = Vec::with_capacity(256);
    for _ in 0..256 {
        cue_values.push(reader.read_u16()?);
    }

    Ok(SizesCues { table_a, table_b, cue_times, cue_values })
}

#[derive(Debug, Clone)]
pub struct ResolvedIndex {
    pub video_sizes: Vec<u64>,
    pub packet_sizes: Vec<u64>,
    pub table_file_offset: u64,
    pub record_positions: Vec<u64>,
}

fn align_up_sector(pos: u64, base: u64) -> u64 {
    let diff = pos as i64 - base as i64;
    let rem = diff.rem_euclid(SECTOR_SIZE as i64) as u64;
    if rem == 0 {
        pos
    } else {
        pos + (SECTOR_SIZE - rem)
    }
}

fn read_u16_field(buf: &[u8], offset: usize, big_endian: bool) -> u16 {
    let bytes = [buf[offset], buf[offset + 1]];
    if big_endian {
        u16::from_be_bytes(bytes)
    } else {
        u16::from_le_bytes(bytes)
    }
}

fn count_plausible<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    packet: &[u64],
    base: u64,
    after_cues: u64,
    big_endian: bool,
) -> Result<usize> {
    let restore = reader.pos()?;
    let mut cur = align_up_sector(after_cues, base);
    let mut good = 0usize;
    for i in 0..packet.len().min(8) {
        if reader.seek_to(cur).is_err() {
            break;
        }
        let mut buf = [0u8; 18];
        if reader.read_exact_rewind(&mut buf).is_err() {
            break;
        }
        let screen_item_count = read_u16_field(&buf, 0, big_endian);
        if screen_item_count <= SCREEN_ITEM_LIST_SIZE {
            let cel_w = read_u16_field(&buf, 4, big_endian);
            let cel_h = read_u16_field(&buf, 6, big_endian);
            let area = u64::from(cel_w) * u64::from(cel_h);
            if cel_w > 0 && cel_h > 0 && area < CEL_PIXEL_BUDGET {
                good += 1;
            }
        }
        cur = cur.saturating_add(packet[i]);
    }
    reader.seek_to(restore)?;
    Ok(good)
}

/// Resolves the ambiguous table order and file-offset candidate, then
/// computes the aligned record position for every frame.
pub fn resolve_index<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    header: &ContainerHeader,
    sizes_cues: &SizesCues,
    opts: &RobotOptions,
) -> Result<ResolvedIndex> {
    let after_cues = reader.pos()?;
    let candidates = [0u64, 6u64];

    let mut best_count = -1i64;
    let mut best_offset = opts.file_offset;
    let mut best_swap = false;

    for &candidate in &candidates {
        let base = opts.file_offset + candidate;
        for &swap in &[false, true] {
            let packet = if swap { &sizes_cues.table_a } else { &sizes_cues.table_b };
            let count = count_plausible(reader, packet, base, after_cues, header.big_endian)? as i64;
            if opts.debug_index {
                debug!("file_offset candidate {} swap {} plausible {}", candidate, swap, count);
            }
            if count > best_count {
                best_count = count;
                best_offset = base;
                best_swap = swap;
            }
        }
    }

    let (video_sizes, packet_sizes) = if best_swap {
        (sizes_cues.table_b.clone(), sizes_cues.table_a.clone())
    } else {
        (sizes_cues.table_a.clone(), sizes_cues.table_b.clone())
    };

    let mut record_positions = Vec::with_capacity(packet_sizes.len());
    if !packet_sizes.is_empty() {
        let first = align_up_sector(after_cues, best_offset);
        record_positions.push(first);
        for i in 0..packet_sizes.len() - 1 {
            let next = align_up_sector(record_positions[i] + packet_sizes[i], best_offset);
            record_positions.push(next);
        }
    }

    Ok(ResolvedIndex {
        video_sizes,
        packet_sizes,
        table_file_offset: best_offset,
        record_positions,
    })
}
