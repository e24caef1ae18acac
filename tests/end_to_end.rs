// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios exercised through the public `extract` entry point
//! and the audio reassembler's public packet-ingestion API, as opposed to
//! the per-module unit tests that poke internal helpers directly.

use std::io::Cursor;

use robot_extract::audio::Reassembler;
use robot_extract::dpcm;
use robot_extract::{extract, RobotOptions};

fn push16(v: &mut Vec<u8>, x: u16) {
    v.extend_from_slice(&x.to_le_bytes());
}
fn push_i16(v: &mut Vec<u8>, x: i16) {
    v.extend_from_slice(&x.to_le_bytes());
}
fn push32(v: &mut Vec<u8>, x: u32) {
    v.extend_from_slice(&x.to_le_bytes());
}

/// Builds a minimal version-5 container with `num_frames` zero-size frame
/// records, no palette, and audio enabled/disabled per `has_audio`. With a
/// zero `primer_reserved_size` and no zero-compress flag (as built here),
/// a `has_audio` container's primer parses as `invalid`; callers that want
/// to decode its audio must request `extract_audio: false` or accept the
/// resulting `PrimerFlagsCorrupt` error.
fn build_container(num_frames: u16, has_audio: bool) -> Vec<u8> {
    let mut v = Vec::new();
    push16(&mut v, 0x16);
    v.extend_from_slice(b"SOL\0");
    push16(&mut v, 5); // version
    push16(&mut v, 0); // audio_blk_size
    push_i16(&mut v, 0); // primer_zero_compress
    push16(&mut v, 0); // skip
    push16(&mut v, num_frames);
    push16(&mut v, 0); // palette_size
    push16(&mut v, 0); // primer_reserved_size
    push_i16(&mut v, 320); // x_res
    push_i16(&mut v, 200); // y_res
    v.push(0); // has_palette
    v.push(has_audio as u8);
    push16(&mut v, 0); // skip
    push_i16(&mut v, 12); // frame_rate
    push_i16(&mut v, 0); // is_hi_res
    push_i16(&mut v, 0); // max_skippable_packets
    push_i16(&mut v, 1); // max_cels_per_frame
    push32(&mut v, 0);
    push32(&mut v, 0);

    for _ in 0..num_frames {
        push16(&mut v, 0); // video sizes
    }
    for _ in 0..num_frames {
        push16(&mut v, 0); // packet sizes
    }
    for _ in 0..256 {
        push32(&mut v, 0); // cue times
    }
    for _ in 0..256 {
        push16(&mut v, 0); // cue values
    }
    v
}

/// Scenario: minimal v5 file, no palette, no audio, one empty frame. The
/// manifest carries one frame with no cels, and no audio is produced.
#[test]
fn minimal_container_with_one_empty_frame_produces_empty_manifest_entry() {
    let data = build_container(1, false);
    let extraction = extract(Cursor::new(data), &RobotOptions::default()).unwrap();

    assert_eq!(extraction.manifest.frames.len(), 1);
    assert!(extraction.manifest.frames[0].cels.is_empty());
    assert_eq!(extraction.frames.len(), 1);
    assert!(extraction.frames[0].cels.is_empty());
    assert!(extraction.audio.is_empty());
    assert!(extraction.palette_raw.is_none());
    assert!(!extraction.manifest.has_audio);
    assert!(!extraction.manifest.has_palette);
}

/// A container that declares `has_audio` with an inconsistent primer is
/// still extractable when the caller opts out of audio decoding: the
/// `PrimerFlagsCorrupt` check only fires when audio was actually
/// requested, and with it disabled the run produces no audio at all.
#[test]
fn extract_audio_false_tolerates_an_invalid_primer_and_yields_no_audio() {
    let data = build_container(0, true);
    let opts = RobotOptions { extract_audio: false, ..RobotOptions::default() };
    let extraction = extract(Cursor::new(data), &opts).unwrap();

    assert!(extraction.manifest.has_audio);
    assert!(extraction.audio.is_empty());
}

/// A zero-compressed (placeholder) primer slot is silently replaced by a
/// later real per-frame block's data, and that block's non-overlapping
/// tail is appended beyond it, all driven through actual DPCM byte
/// payloads rather than pre-decoded sample arrays.
#[test]
fn real_block_silently_replaces_zero_compressed_primer_slots_and_extends_past_them() {
    let mut r = Reassembler::new();

    // An all-zero primer decodes to all-zero samples (each control byte 0
    // holds the predictor at 0), routed as the even channel's synthesized
    // placeholder starting at half-position 0.
    let zero_primer = vec![0u8; 24];
    assert!(dpcm::decode_block_trim_runway(&zero_primer).iter().all(|&s| s == 0));
    r.ingest_primer(true, &zero_primer, true).unwrap();

    // A real block with non-zero content, 24 bytes => 8 decoded samples
    // after the 16-sample runway is trimmed. Position 8 places it at
    // channel sample index 4, overlapping the primer's indices [4, 8) and
    // extending the channel to index 12.
    let block_bytes: Vec<u8> = (0..24u8).map(|i| i.wrapping_mul(17).wrapping_add(3)).collect();
    let expected_tail = dpcm::decode_block_trim_runway(&block_bytes);
    assert_eq!(expected_tail.len(), 8);
    assert!(expected_tail.iter().any(|&s| s != 0));

    r.ingest_block(8, &block_bytes, &RobotOptions::default()).unwrap();

    let mono = r.finalize();
    // Interleaved even/odd; the even channel alone spans indices [0, 12).
    let even: Vec<i16> = mono.iter().step_by(2).copied().collect();
    assert_eq!(&even[4..12], &expected_tail[..]);
}

/// Re-ingesting the exact same per-frame block at the same position is a
/// no-op: the reassembled stream is identical before and after.
#[test]
fn identical_retransmitted_block_is_idempotent() {
    let block_bytes: Vec<u8> = (0..24u8).map(|i| i.wrapping_mul(5).wrapping_add(1)).collect();

    let mut once = Reassembler::new();
    once.ingest_block(0, &block_bytes, &RobotOptions::default()).unwrap();

    let mut twice = Reassembler::new();
    twice.ingest_block(0, &block_bytes, &RobotOptions::default()).unwrap();
    twice.ingest_block(0, &block_bytes, &RobotOptions::default()).unwrap();

    assert_eq!(once.finalize(), twice.finalize());
}

/// A retransmitted block whose content disagrees with already-written,
/// non-placeholder samples is dropped in its entirety; the first block's
/// data is preserved unchanged.
#[test]
fn conflicting_retransmission_is_dropped_preserving_first_block() {
    let mut r = Reassembler::new();
    let first: Vec<u8> = (0..24u8).map(|i| i.wrapping_mul(3).wrapping_add(2)).collect();
    let second: Vec<u8> = (0..24u8).map(|i| i.wrapping_mul(11).wrapping_add(9)).collect();
    assert_ne!(
        dpcm::decode_block_trim_runway(&first),
        dpcm::decode_block_trim_runway(&second),
        "fixture blocks must actually disagree for this test to mean anything"
    );

    r.ingest_block(0, &first, &RobotOptions::default()).unwrap();
    let before = r.finalize();

    let mut r2 = Reassembler::new();
    r2.ingest_block(0, &first, &RobotOptions::default()).unwrap();
    r2.ingest_block(0, &second, &RobotOptions::default()).unwrap();
    let after = r2.finalize();

    assert_eq!(before, after);
}

/// Two non-overlapping blocks whose positions carry opposite parity land
/// in separate channels and interleave correctly in the final mono
/// stream, rather than one overwriting or conflicting with the other.
#[test]
fn even_and_odd_positioned_blocks_route_to_separate_channels() {
    let mut r = Reassembler::new();
    let even_bytes: Vec<u8> = (0..24u8).map(|i| i.wrapping_mul(13).wrapping_add(7)).collect();
    let odd_bytes: Vec<u8> = (0..24u8).map(|i| i.wrapping_mul(19).wrapping_add(1)).collect();
    let even_expected = dpcm::decode_block_trim_runway(&even_bytes);
    let odd_expected = dpcm::decode_block_trim_runway(&odd_bytes);
    assert_ne!(even_expected, odd_expected);

    // Position 0 establishes audio_start_offset at 0 and lands on the even
    // channel; position 1 is odd relative to that offset and lands on the
    // odd channel, with no overlap between the two.
    r.ingest_block(0, &even_bytes, &RobotOptions::default()).unwrap();
    r.ingest_block(1, &odd_bytes, &RobotOptions::default()).unwrap();

    let mono = r.finalize();
    let even: Vec<i16> = mono.iter().step_by(2).copied().collect();
    let odd: Vec<i16> = mono.iter().skip(1).step_by(2).copied().collect();
    assert_eq!(even, even_expected);
    assert_eq!(odd, odd_expected);
}
