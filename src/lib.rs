// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Offline decoder for Sierra "Robot" (`.RBT`) animation containers:
//! header and index parsing, LZS cel decompression, DPCM16 dual-channel
//! audio reassembly, HunkPalette parsing, and manifest assembly.
//!
//! This crate never touches a filesystem path directly and never encodes
//! PNG, WAV, or any other output container; it decodes a Robot blob from
//! any `Read + Seek` source into in-memory frames, one interleaved PCM16
//! audio stream, and a JSON-serialisable manifest, leaving packaging to
//! the caller.

pub mod audio;
pub mod bitstream;
pub mod cel;
pub mod config;
pub mod dpcm;
pub mod error;
pub mod frame;
pub mod header;
pub mod io;
pub mod lzs;
pub mod manifest;
pub mod palette;

use std::io::{Read, Seek};

pub use config::RobotOptions;
pub use error::{RobotError, Result};
pub use frame::DecodedFrame;
pub use manifest::Manifest;

use io::ByteReader;
use manifest::Cue;

/// Advisory ceiling on `num_frames`; containers declaring more only get a
/// warning (§4.6 leaves the exact bound to the implementation).
pub const MAX_FRAMES: u16 = 10_000;

/// Everything recovered from one `.RBT` source: decoded frames, the
/// reassembled audio stream, the manifest, and the palette blob verbatim
/// if its structured parse failed.
pub struct Extraction {
    pub manifest: Manifest,
    pub frames: Vec<DecodedFrame>,
    /// Interleaved mono PCM16 samples at [`audio::SAMPLE_RATE_HZ`]; empty
    /// if the container has no audio or `extract_audio` was disabled.
    pub audio: Vec<i16>,
    /// The HunkPalette blob, present only when its structured parse
    /// failed and the caller must fall back to a raw dump.
    pub palette_raw: Option<Vec<u8>>,
}

/// Runs the full decode pipeline: header, primer, palette, index, every
/// frame in order, then audio finalisation and manifest assembly.
pub fn extract<R: Read + Seek>(source: R, opts: &RobotOptions) -> Result<Extraction> {
    let mut reader = ByteReader::new(source, false);

    let header = header::parse_header(&mut reader, opts)?;
    let primer = header::parse_primer(&mut reader, &header, opts)?;
    let palette_blob = header::parse_palette_blob(&mut reader, &header)?;
    let palette = palette::parse(&palette_blob);
    let sizes_cues = header::parse_sizes_cues(&mut reader, &header)?;
    let resolved = header::resolve_index(&mut reader, &header, &sizes_cues, opts)?;

    if header.has_audio && primer.invalid && opts.extract_audio {
        return Err(RobotError::PrimerFlagsCorrupt);
    }

    let run_audio = opts.extract_audio && header.has_audio;
    let mut reassembler = audio::Reassembler::new();
    if run_audio {
        reassembler.ingest_primer(true, &primer.even, primer.synthesized_zero)?;
        reassembler.ingest_primer(false, &primer.odd, primer.synthesized_zero)?;
    }

    let palette_opt = if header.has_palette { Some(&palette) } else { None };
    let palette_raw = if header.has_palette && !palette.valid { Some(palette_blob) } else { None };

    let num_frames = resolved.record_positions.len();
    let mut frames = Vec::with_capacity(num_frames);
    let mut frame_infos = Vec::with_capacity(num_frames);
    for i in 0..num_frames {
        let decoded = frame::decode_frame(
            &mut reader,
            i,
            resolved.record_positions[i],
            resolved.packet_sizes[i],
            resolved.video_sizes[i],
            &header,
            palette_opt,
            opts,
        )?;
        if run_audio {
            if let Some((position, payload)) = &decoded.audio_block {
                reassembler.ingest_block(*position, payload, opts)?;
            }
        }
        frame_infos.push(decoded.info.clone());
        frames.push(decoded);
    }

    let audio = if run_audio { reassembler.finalize() } else { Vec::new() };

    let cues = sizes_cues
        .cue_times
        .iter()
        .zip(sizes_cues.cue_values.iter())
        .map(|(&time, &value)| Cue { time, value })
        .collect();

    let manifest = Manifest {
        version: header.version,
        frame_rate: header.frame_rate,
        x_res: header.x_res,
        y_res: header.y_res,
        has_audio: header.has_audio,
        has_palette: header.has_palette,
        cues,
        frames: frame_infos,
    };

    Ok(Extraction { manifest, frames, audio, palette_raw })
}
