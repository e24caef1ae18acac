// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The audio reassembler: owns the even/odd half-rate channel buffers and
//! turns a stream of primer and per-frame DPCM packets into a single
//! interleaved mono PCM16 stream.

use crate::config::RobotOptions;
use crate::dpcm;
use crate::error::{RobotError, Result};

/// Output sample rate of the reassembled stream; fixed by the container
/// format, never read from the header.
pub const SAMPLE_RATE_HZ: u32 = 22_050;

/// Minimum payload length, in bytes, carrying a full runway without
/// synthesis.
const MIN_BLOCK_BYTES: usize = 8;

/// Hard cap on a single channel's sample buffer. A legitimate Robot clip
/// never approaches this; it exists so a corrupt or adversarial position
/// field fails with `AllocationTooLarge` instead of exhausting memory.
const MAX_CHANNEL_SAMPLES: usize = 50_000_000;

/// One half-rate channel's accumulated state. See the module-level state
/// fields this mirrors: `samples`, `occupied`, `zero_compressed`,
/// `start_half_pos`, `predictor`.
#[derive(Debug, Default)]
struct Channel {
    samples: Vec<i16>,
    occupied: Vec<bool>,
    zero_compressed: Vec<bool>,
    start_half_pos: i64,
    start_initialised: bool,
    seen_non_primer_block: bool,
    predictor: i16,
    predictor_initialised: bool,
}

impl Channel {
    fn ensure_len(&mut self, n: usize) -> Result<()> {
        if n > MAX_CHANNEL_SAMPLES {
            return Err(RobotError::AllocationTooLarge(n as u64));
        }
        if self.samples.len() < n {
            self.samples.resize(n, 0);
            self.occupied.resize(n, false);
            self.zero_compressed.resize(n, false);
        }
        Ok(())
    }

    fn shift_front(&mut self, n: usize) -> Result<()> {
        if self.samples.len() + n > MAX_CHANNEL_SAMPLES {
            return Err(RobotError::AllocationTooLarge((self.samples.len() + n) as u64));
        }
        self.samples.splice(0..0, std::iter::repeat(0i16).take(n));
        self.occupied.splice(0..0, std::iter::repeat(true).take(n));
        // zero_compressed so the block that triggered the shift can write
        // its own leading samples into this region without conflicting.
        self.zero_compressed.splice(0..0, std::iter::repeat(true).take(n));
        Ok(())
    }

    fn note_predictor(&mut self, samples: &[i16]) {
        if let Some(&last) = samples.last() {
            self.predictor = last;
            self.predictor_initialised = true;
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum AppendOutcome {
    Applied,
    Skipped,
    ParityMismatch,
    Conflict,
}

/// Implements the append plan: finds where `samples` (already
/// runway-trimmed) land in `channel`, resolves overlap against what is
/// already there, and commits the non-overlapping tail.
fn append(channel: &mut Channel, half_pos: i64, samples: &[i16], zero_compressed: bool) -> Result<AppendOutcome> {
    if samples.is_empty() {
        return Ok(AppendOutcome::Skipped);
    }

    let mut start_sample: i64;
    if !channel.start_initialised {
        channel.start_half_pos = half_pos;
        channel.start_initialised = true;
        start_sample = 0;
    } else {
        let delta_half = half_pos - channel.start_half_pos;
        if delta_half % 2 != 0 {
            return Ok(AppendOutcome::ParityMismatch);
        }
        if delta_half < 0 {
            let shift = ((-delta_half) / 2) as usize;
            channel.shift_front(shift)?;
            channel.start_half_pos = half_pos;
            start_sample = 0;
        } else {
            start_sample = delta_half / 2;
        }
    }

    let mut skip = 0usize;
    if start_sample < 0 {
        skip = (-start_sample) as usize;
        start_sample = 0;
    }
    if skip >= samples.len() {
        return Ok(AppendOutcome::Skipped);
    }
    let start_sample = start_sample as usize;
    let available = samples.len() - skip;

    let mut leading_overlap = 0usize;
    while leading_overlap < available {
        let idx = start_sample + leading_overlap;
        if idx >= channel.occupied.len() || !channel.occupied[idx] {
            break;
        }
        let incoming = samples[skip + leading_overlap];
        if !channel.zero_compressed[idx] {
            if channel.samples[idx] != incoming {
                return Ok(AppendOutcome::Conflict);
            }
            leading_overlap += 1;
        } else if channel.samples[idx] == incoming {
            leading_overlap += 1;
        } else {
            break;
        }
    }

    if leading_overlap == available {
        return Ok(AppendOutcome::Skipped);
    }

    let required = start_sample + available;
    channel.ensure_len(required)?;
    for i in leading_overlap..available {
        let idx = start_sample + i;
        channel.samples[idx] = samples[skip + i];
        channel.occupied[idx] = true;
        channel.zero_compressed[idx] = zero_compressed;
    }

    Ok(AppendOutcome::Applied)
}

fn normalize_block(payload: &[u8]) -> Vec<u8> {
    if payload.len() >= MIN_BLOCK_BYTES {
        return payload.to_vec();
    }
    let mut padded = vec![0u8; MIN_BLOCK_BYTES];
    let prefix = MIN_BLOCK_BYTES - payload.len();
    padded[prefix..].copy_from_slice(payload);
    padded
}

fn warn_unless_quiet(opts: &RobotOptions, message: &str) {
    if !opts.quiet {
        log::warn!("{}", message);
    }
}

/// Owns the two channel buffers across the lifetime of one extraction run.
#[derive(Debug, Default)]
pub struct Reassembler {
    even: Channel,
    odd: Channel,
    audio_start_offset: i64,
    audio_start_offset_initialised: bool,
}

impl Reassembler {
    pub fn new() -> Self {
        Reassembler::default()
    }

    /// Ingests a primer channel's raw DPCM bytes, decompressed as a
    /// complete block with its runway stripped and routed to half-position
    /// 0 in its own channel space. `synthesized_zero` marks the
    /// fixed-size all-zero fallback primers so later real packets can
    /// silently replace them instead of conflicting.
    pub fn ingest_primer(&mut self, is_even: bool, primer_bytes: &[u8], synthesized_zero: bool) -> Result<()> {
        if primer_bytes.is_empty() {
            return Ok(());
        }
        let samples = dpcm::decode_block_trim_runway(primer_bytes);
        if samples.is_empty() {
            return Ok(());
        }
        let channel = if is_even { &mut self.even } else { &mut self.odd };
        append(channel, 0, &samples, synthesized_zero)?;
        channel.note_predictor(&samples);
        Ok(())
    }

    /// Ingests one per-frame audio sub-block: `position` is the absolute
    /// half-sample position from the frame's 8-byte audio header,
    /// `payload` the compressed DPCM bytes that follow it.
    pub fn ingest_block(&mut self, position: i32, payload: &[u8], opts: &RobotOptions) -> Result<()> {
        if !self.audio_start_offset_initialised {
            self.audio_start_offset = i64::from(position).div_euclid(4) * 4;
            self.audio_start_offset_initialised = true;
        }

        let normalized = normalize_block(payload);
        let samples = dpcm::decode_block_trim_runway(&normalized);
        if samples.is_empty() {
            warn_unless_quiet(
                opts,
                &format!("audio block at position {} carried no samples past its runway", position),
            );
            return Ok(());
        }

        let relative = i64::from(position) - self.audio_start_offset;
        let is_even = relative.rem_euclid(2) == 0;
        let channel = if is_even { &mut self.even } else { &mut self.odd };

        match append(channel, i64::from(position), &samples, false)? {
            AppendOutcome::Applied => {
                channel.seen_non_primer_block = true;
                channel.note_predictor(&samples);
            }
            AppendOutcome::Skipped => {
                channel.seen_non_primer_block = true;
                channel.note_predictor(&samples);
            }
            AppendOutcome::ParityMismatch => {
                warn_unless_quiet(
                    opts,
                    &format!("audio block at position {} has parity inconsistent with its channel, dropping", position),
                );
            }
            AppendOutcome::Conflict => {
                warn_unless_quiet(
                    opts,
                    &format!("audio block at position {} conflicts with already-written samples, dropping", position),
                );
            }
        }
        Ok(())
    }

    /// Finalizes both channels and interleaves them into the output mono
    /// stream: leading silence, interior-gap interpolation, joint-origin
    /// alignment, then sample-by-sample interleave.
    pub fn finalize(self) -> Vec<i16> {
        let mut even_stream = build_dense_stream(&self.even);
        let mut odd_stream = build_dense_stream(&self.odd);
        if even_stream.is_empty() && odd_stream.is_empty() {
            return Vec::new();
        }

        let joint_min_half_pos = [&self.even, &self.odd]
            .into_iter()
            .filter(|c| c.start_initialised)
            .map(|c| c.start_half_pos)
            .min()
            .unwrap_or(0);

        apply_leading_silence(&mut even_stream, &self.even, true, joint_min_half_pos);
        apply_leading_silence(&mut odd_stream, &self.odd, false, joint_min_half_pos);

        let max_len = even_stream.len().max(odd_stream.len());
        even_stream.resize(max_len, 0);
        odd_stream.resize(max_len, 0);

        let mut mono = Vec::with_capacity(max_len * 2);
        for i in 0..max_len {
            mono.push(even_stream[i]);
            mono.push(odd_stream[i]);
        }
        mono
    }
}

fn apply_leading_silence(stream: &mut Vec<i16>, channel: &Channel, is_even: bool, joint_min_half_pos: i64) {
    if stream.is_empty() || !channel.start_initialised {
        return;
    }
    let relative = channel.start_half_pos - joint_min_half_pos;
    if relative <= 0 {
        return;
    }
    let adjust = if relative % 2 != 0 && is_even && joint_min_half_pos % 2 != 0 { 1 } else { 0 };
    let leading = (relative + adjust) / 2;
    if leading <= 0 {
        return;
    }
    let leading = leading as usize;
    stream.splice(0..0, std::iter::repeat(0i16).take(leading));
}

/// Scans a channel's occupancy bitmap into a dense sample stream: leading
/// silence for unoccupied samples before the first write, linear
/// interpolation for interior gaps, and silence for a gap with no
/// right-hand neighbour.
fn build_dense_stream(channel: &Channel) -> Vec<i16> {
    if channel.samples.is_empty() {
        return Vec::new();
    }
    let Some(first_occupied) = channel.occupied.iter().position(|&o| o) else {
        return Vec::new();
    };
    let last_occupied = channel.occupied.iter().rposition(|&o| o).unwrap();
    let output_size = last_occupied + 1;

    let mut working = channel.samples[..output_size].to_vec();
    let mut occupied = channel.occupied[..output_size].to_vec();

    for slot in working.iter_mut().take(first_occupied) {
        *slot = 0;
    }
    for slot in occupied.iter_mut().take(first_occupied) {
        *slot = true;
    }

    let mut idx = first_occupied;
    while idx < output_size {
        if occupied[idx] {
            idx += 1;
            continue;
        }
        let gap_start = idx;
        let mut gap_end = gap_start;
        while gap_end < output_size && !occupied[gap_end] {
            gap_end += 1;
        }
        interpolate_gap(&mut working, &mut occupied, gap_start, gap_end);
        idx = gap_end;
    }

    working
}

fn interpolate_gap(working: &mut [i16], occupied: &mut [bool], gap_start: usize, gap_end: usize) {
    let fill_silence = |working: &mut [i16], occupied: &mut [bool]| {
        for i in gap_start..gap_end {
            working[i] = 0;
            occupied[i] = true;
        }
    };

    if gap_start == 0 {
        fill_silence(working, occupied);
        return;
    }
    let previous_index = (0..gap_start).rev().find(|&i| occupied[i]);
    let next_index = (gap_end..working.len()).find(|&i| occupied[i]);

    let (Some(previous_index), Some(next_index)) = (previous_index, next_index) else {
        fill_silence(working, occupied);
        return;
    };

    let distance = next_index - previous_index;
    if distance <= 1 {
        fill_silence(working, occupied);
        return;
    }

    let previous_value = i32::from(working[previous_index]);
    let next_value = i32::from(working[next_index]);
    let delta = next_value - previous_value;
    let distance = distance as i32;
    for i in gap_start..gap_end {
        let offset = (i - previous_index) as i32;
        let interpolated = previous_value + round_div(delta * offset, distance);
        working[i] = interpolated.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        occupied[i] = true;
    }
}

/// Integer division rounded to nearest (half away from zero), matching
/// `round(numerator / denominator)` without the precision loss of a
/// float round-trip. `denominator` is always positive here.
fn round_div(numerator: i32, denominator: i32) -> i32 {
    if numerator >= 0 {
        (numerator + denominator / 2) / denominator
    } else {
        -((-numerator + denominator / 2) / denominator)
    }
}
