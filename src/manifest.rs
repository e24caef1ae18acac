// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The JSON manifest emitted alongside decoded frames and audio.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Cue {
    pub time: i32,
    pub value: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct CelInfo {
    pub width: u16,
    pub height: u16,
    pub x: i16,
    pub y: i16,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct FrameInfo {
    pub frame_index: usize,
    pub cels: Vec<CelInfo>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub palette_required: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub palette_parse_failed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub palette_raw: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub version: u16,
    pub frame_rate: i16,
    pub x_res: i16,
    pub y_res: i16,
    pub has_audio: bool,
    pub has_palette: bool,
    pub cues: Vec<Cue>,
    pub frames: Vec<FrameInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_optional_palette_flags_are_omitted_when_false() {
        let frame = FrameInfo { frame_index: 0, cels: Vec::new(), ..Default::default() };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(!json.contains("palette_required"));
        assert!(!json.contains("palette_raw"));
    }

    #[test]
    fn verify_palette_required_flag_is_emitted_when_set() {
        let frame = FrameInfo { frame_index: 2, palette_required: true, ..Default::default() };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"palette_required\":true"));
    }

    #[test]
    fn verify_manifest_round_trips_through_json() {
        let manifest = Manifest {
            version: 5,
            frame_rate: 12,
            x_res: 320,
            y_res: 200,
            has_audio: true,
            has_palette: true,
            cues: vec![Cue { time: 10, value: 1 }],
            frames: vec![FrameInfo {
                frame_index: 0,
                cels: vec![CelInfo { width: 32, height: 32, x: 0, y: 0 }],
                ..Default::default()
            }],
        };
        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["version"], 5);
        assert_eq!(parsed["cues"][0]["time"], 10);
        assert_eq!(parsed["frames"][0]["cels"][0]["width"], 32);
    }
}
