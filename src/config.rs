// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Caller-facing options for a single extraction run.

/// Flat options record controlling how a container is parsed and decoded.
#[derive(Clone, Copy, Debug)]
pub struct RobotOptions {
    /// Suppress `log::warn!` calls for recoverable conditions. The
    /// underlying `log` calls still fire; this only toggles whether
    /// manifest/summary bookkeeping treats them as notable.
    pub quiet: bool,
    /// Force big-endian interpretation, bypassing the endianness probe.
    pub force_big_endian: bool,
    /// Force little-endian interpretation, bypassing the endianness probe.
    pub force_little_endian: bool,
    /// Emit verbose `log::debug!` output for the file-offset/swap
    /// plausibility probe.
    pub debug_index: bool,
    /// Resolution cap on `x_res`; containers declaring more are rejected.
    pub max_x_res: u32,
    /// Resolution cap on `y_res`; containers declaring more are rejected.
    pub max_y_res: u32,
    /// Gates the audio reassembly path (§4.8). When `false`, the primer
    /// is parsed for position only; frames are never decoded to audio and
    /// [`crate::audio::Reassembler::finalize`] is never invoked.
    pub extract_audio: bool,
    /// Offset, in bytes, at which the Robot resource begins inside its
    /// source container. `0` for a standalone `.RBT` file.
    pub file_offset: u64,
}

impl Default for RobotOptions {
    fn default() -> Self {
        RobotOptions {
            quiet: false,
            force_big_endian: false,
            force_little_endian: false,
            debug_index: false,
            max_x_res: 7680,
            max_y_res: 4320,
            extract_audio: true,
            file_offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_defaults_match_documented_caps() {
        let opts = RobotOptions::default();
        assert_eq!(opts.max_x_res, 7680);
        assert_eq!(opts.max_y_res, 4320);
        assert!(opts.extract_audio);
        assert_eq!(opts.file_offset, 0);
    }
}
