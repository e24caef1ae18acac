// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HunkPalette parsing: SCI's palette container format.
//!
//! This parser never fails loudly on malformed input; on any inconsistency
//! it returns a palette with `valid = false`, and the frame decoder falls
//! back to a raw blob dump and marks affected frames in the manifest.

const HUNK_HEADER_SIZE: usize = 13;
const NUM_PALETTES_OFFSET: usize = 10;
const ENTRY_HEADER_SIZE: usize = 22;
const ENTRY_START_COLOR_OFFSET: usize = 10;
const ENTRY_NUM_COLORS_OFFSET: usize = 14;
const ENTRY_USED_OFFSET: usize = 16;
const ENTRY_SHARED_USED_OFFSET: usize = 17;
const MAX_REMAP_TAIL: usize = 1200;

/// One possibly-absent palette entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct PaletteColor {
    pub present: bool,
    pub used: bool,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub struct HunkPalette {
    pub valid: bool,
    pub entries: [PaletteColor; 256],
    pub remap_data: Vec<u8>,
    pub start_color: u8,
    pub color_count: u16,
    pub shared_used: bool,
    pub default_used: bool,
}

impl Default for HunkPalette {
    fn default() -> Self {
        HunkPalette {
            valid: false,
            entries: [PaletteColor::default(); 256],
            remap_data: Vec::new(),
            start_color: 0,
            color_count: 0,
            shared_used: false,
            default_used: false,
        }
    }
}

impl HunkPalette {
    pub fn entry(&self, index: u8) -> Option<&PaletteColor> {
        let e = &self.entries[usize::from(index)];
        if e.present {
            Some(e)
        } else {
            None
        }
    }
}

fn read_u8(raw: &[u8], pos: usize) -> u8 {
    raw.get(pos).copied().unwrap_or(0)
}

fn read_u16_order(raw: &[u8], pos: usize, big_endian: bool) -> u16 {
    if pos + 1 >= raw.len() {
        return 0;
    }
    if big_endian {
        u16::from_be_bytes([raw[pos], raw[pos + 1]])
    } else {
        u16::from_le_bytes([raw[pos], raw[pos + 1]])
    }
}

struct EntryPointer {
    offset: usize,
    index: u8,
}

/// Parses a raw HunkPalette blob. An empty blob parses as an empty, but
/// valid, palette.
pub fn parse(raw: &[u8]) -> HunkPalette {
    let mut parsed = HunkPalette::default();

    if raw.is_empty() {
        parsed.valid = true;
        return parsed;
    }
    if raw.len() < HUNK_HEADER_SIZE {
        return parsed;
    }

    let num_palettes = read_u8(raw, NUM_PALETTES_OFFSET);
    let offset_table_pos = HUNK_HEADER_SIZE;

    if num_palettes == 0 {
        if offset_table_pos < raw.len() {
            let mut tail = raw[offset_table_pos..].to_vec();
            tail.truncate(MAX_REMAP_TAIL);
            parsed.remap_data = tail;
        }
        parsed.valid = true;
        return parsed;
    }

    let offsets_declared = 2 * usize::from(num_palettes);
    let bytes_available = raw.len().saturating_sub(offset_table_pos);
    let offsets_in_blob = usize::from(num_palettes).min(bytes_available / 2);
    let offsets_end = offset_table_pos + offsets_in_blob * 2;
    let table_end = offset_table_pos + offsets_declared;

    let read_offsets = |big_endian: bool| -> Vec<usize> {
        (0..offsets_in_blob)
            .map(|i| usize::from(read_u16_order(raw, offset_table_pos + i * 2, big_endian)))
            .collect()
    };

    let score = |offsets: &[usize]| -> usize {
        offsets.iter().filter(|&&o| o >= offsets_end && o <= raw.len()).count()
    };

    let offsets_le = read_offsets(false);
    let offsets_be = read_offsets(true);
    let (offsets, _big_endian) = if score(&offsets_be) > score(&offsets_le) {
        (offsets_be, true)
    } else {
        (offsets_le, false)
    };

    let mut entry_pointers: Vec<EntryPointer> = offsets
        .iter()
        .enumerate()
        .filter(|&(_, &off)| off >= offsets_end && off <= raw.len())
        .map(|(i, &off)| EntryPointer { offset: off, index: i as u8 })
        .collect();

    let min_entry_offset = entry_pointers.iter().map(|p| p.offset).min();

    let mut has_explicit_remap = false;
    let mut explicit_remap_offset = 0usize;
    if table_end + 2 <= raw.len() {
        if let Some(min_off) = min_entry_offset {
            if min_off >= table_end + 2 {
                let candidate = usize::from(read_u16_order(raw, table_end, false));
                if candidate <= raw.len() && candidate >= min_off {
                    has_explicit_remap = true;
                    explicit_remap_offset = candidate;
                }
            }
        }
    }

    entry_pointers.sort_by(|a, b| a.offset.cmp(&b.offset).then(a.index.cmp(&b.index)));

    let mut first_entry = true;
    let mut first_start: u16 = 0;
    let mut max_end: u16 = 0;
    let mut last_entry_end = offsets_end;

    for (i, ptr) in entry_pointers.iter().enumerate() {
        let offset = ptr.offset;
        if offset + ENTRY_HEADER_SIZE > raw.len() {
            continue;
        }

        let mut entry_limit = if i + 1 < entry_pointers.len() {
            entry_pointers[i + 1].offset
        } else if has_explicit_remap {
            explicit_remap_offset
        } else {
            raw.len()
        };
        entry_limit = entry_limit.min(raw.len());
        if entry_limit < offset {
            continue;
        }

        let entry_extent = entry_limit - offset;
        let max_payload = entry_extent.saturating_sub(ENTRY_HEADER_SIZE);

        let start_color = read_u8(raw, offset + ENTRY_START_COLOR_OFFSET);
        let num_colors = read_u16_order(raw, offset + ENTRY_NUM_COLORS_OFFSET, false);
        let default_used = read_u8(raw, offset + ENTRY_USED_OFFSET) != 0;
        let shared_used = read_u8(raw, offset + ENTRY_SHARED_USED_OFFSET) != 0;

        let per_color_bytes = if shared_used { 3 } else { 4 };
        let palette_capacity = 256usize.saturating_sub(usize::from(start_color));
        let available_records = max_payload / per_color_bytes;
        let actual_colors = (num_colors as usize).min(palette_capacity).min(available_records);

        let colors_start = offset + ENTRY_HEADER_SIZE;
        let mut pos = colors_start;
        for c in 0..actual_colors {
            let palette_index = usize::from(start_color) + c;
            let dest = &mut parsed.entries[palette_index];
            dest.present = true;
            if shared_used {
                dest.used = default_used;
            } else {
                dest.used = read_u8(raw, pos) != 0;
                pos += 1;
            }
            dest.r = read_u8(raw, pos);
            dest.g = read_u8(raw, pos + 1);
            dest.b = read_u8(raw, pos + 2);
            pos += 3;
        }

        let consumed = (ENTRY_HEADER_SIZE + actual_colors * per_color_bytes).min(entry_extent);
        if actual_colors == 0 {
            last_entry_end = last_entry_end.max(offset + consumed);
            continue;
        }

        let end_color = u32::from(start_color) + actual_colors as u32;
        if first_entry {
            parsed.start_color = start_color;
            parsed.color_count = actual_colors as u16;
            parsed.shared_used = shared_used;
            parsed.default_used = default_used;
            first_entry = false;
            first_start = u16::from(start_color);
            max_end = end_color as u16;
        } else {
            if u16::from(start_color) < first_start {
                parsed.start_color = start_color;
                parsed.color_count = max_end.saturating_sub(u16::from(start_color));
                first_start = u16::from(start_color);
            } else {
                let span = (end_color as u16).saturating_sub(first_start);
                if span > parsed.color_count {
                    parsed.color_count = span;
                }
            }
            if end_color as u16 > max_end {
                max_end = end_color as u16;
                parsed.color_count = max_end.saturating_sub(parsed.start_color as u16);
            }
            parsed.shared_used = parsed.shared_used && shared_used;
        }

        last_entry_end = last_entry_end.max(offset + consumed);
    }

    let mut remap_offset = if has_explicit_remap { explicit_remap_offset } else { last_entry_end };
    remap_offset = remap_offset.max(last_entry_end);

    if remap_offset < raw.len() {
        let mut tail = raw[remap_offset..].to_vec();
        tail.truncate(MAX_REMAP_TAIL);
        parsed.remap_data = tail;
    }

    parsed.valid = true;
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_blob(num_palettes: u8, entries: &[(u8, u16, bool, Vec<(bool, u8, u8, u8)>)]) -> Vec<u8> {
        let mut blob = vec![0u8; HUNK_HEADER_SIZE];
        blob[NUM_PALETTES_OFFSET] = num_palettes;
        let offset_table_pos = blob.len();
        blob.extend(std::iter::repeat(0u8).take(2 * entries.len()));
        for (i, (start_color, num_colors, shared_used, colors)) in entries.iter().enumerate() {
            let entry_offset = blob.len() as u16;
            blob[offset_table_pos + i * 2] = (entry_offset & 0xFF) as u8;
            blob[offset_table_pos + i * 2 + 1] = (entry_offset >> 8) as u8;

            let mut header = vec![0u8; ENTRY_HEADER_SIZE];
            header[ENTRY_START_COLOR_OFFSET] = *start_color;
            header[ENTRY_NUM_COLORS_OFFSET] = (*num_colors & 0xFF) as u8;
            header[ENTRY_NUM_COLORS_OFFSET + 1] = (*num_colors >> 8) as u8;
            header[ENTRY_USED_OFFSET] = 0;
            header[ENTRY_SHARED_USED_OFFSET] = u8::from(*shared_used);
            blob.extend(header);

            for (used, r, g, b) in colors {
                if !*shared_used {
                    blob.push(u8::from(*used));
                }
                blob.push(*r);
                blob.push(*g);
                blob.push(*b);
            }
        }
        blob
    }

    #[test]
    fn verify_per_color_used_flags() {
        let blob = build_blob(
            1,
            &[(3, 2, false, vec![(true, 10, 20, 30), (false, 40, 50, 60)])],
        );
        let palette = parse(&blob);
        assert!(palette.valid);
        let e3 = palette.entry(3).unwrap();
        assert!(e3.used);
        assert_eq!((e3.r, e3.g, e3.b), (10, 20, 30));
        let e4 = palette.entry(4).unwrap();
        assert!(!e4.used);
        assert_eq!((e4.r, e4.g, e4.b), (40, 50, 60));
        assert!(palette.entry(2).is_none());
        assert!(palette.entry(5).is_none());
    }

    #[test]
    fn verify_clamping_to_256_capacity() {
        let blob = build_blob(1, &[(255, 10, false, (0..10).map(|i| (true, i, i, i)).collect())]);
        let palette = parse(&blob);
        assert!(palette.valid);
        assert!(palette.entry(255).is_some());
        // Only one slot (255) is available; the rest are clamped away.
        assert_eq!(palette.color_count, 1);
    }

    #[test]
    fn verify_empty_blob_is_valid_and_empty() {
        let palette = parse(&[]);
        assert!(palette.valid);
        assert!(palette.entry(0).is_none());
    }

    #[test]
    fn verify_zero_palette_count_yields_remap_tail() {
        let mut blob = vec![0u8; HUNK_HEADER_SIZE];
        blob[NUM_PALETTES_OFFSET] = 0;
        blob.extend([1, 2, 3, 4]);
        let palette = parse(&blob);
        assert!(palette.valid);
        assert_eq!(palette.remap_data, vec![1, 2, 3, 4]);
    }
}
