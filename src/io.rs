// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Endian-aware scalar reads over any seekable byte source.
//!
//! Every other component in this crate reaches the source only through
//! [`ByteReader`]; there is no process-global endianness flag.

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::Result;

/// Wraps a `Read + Seek` source with a selectable byte order.
///
/// The byte order is a property of the reader value, set at construction
/// and flipped with [`ByteReader::set_big_endian`] once the container's
/// true endianness is known (it is not known until a few bytes in).
pub struct ByteReader<R> {
    inner: R,
    big_endian: bool,
}

impl<R: Read + Seek> ByteReader<R> {
    pub fn new(inner: R, big_endian: bool) -> Self {
        ByteReader { inner, big_endian }
    }

    pub fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    pub fn set_big_endian(&mut self, big_endian: bool) {
        self.big_endian = big_endian;
    }

    pub fn pos(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn ignore_bytes(&mut self, len: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Current(len as i64))?;
        Ok(())
    }

    /// Reads exactly `buf.len()` bytes, or rewinds to the starting
    /// position and returns an `UnexpectedEof` IO error.
    pub fn read_exact_rewind(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.pos()?;
        match self.inner.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.seek_to(start)?;
                Err(io::Error::new(io::ErrorKind::UnexpectedEof, err).into())
            }
        }
    }

    /// Reads exactly `len` bytes into a freshly allocated buffer, with the
    /// same rewind-on-short-read behaviour as [`Self::read_exact_rewind`].
    pub fn read_vec_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact_rewind(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact_rewind(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact_rewind(&mut buf)?;
        Ok(if self.big_endian { u16::from_be_bytes(buf) } else { u16::from_le_bytes(buf) })
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact_rewind(&mut buf)?;
        Ok(if self.big_endian { u32::from_be_bytes(buf) } else { u32::from_le_bytes(buf) })
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Reads a u16 in a caller-chosen order, ignoring `self.big_endian`.
    /// Used by the HunkPalette parser, which probes both orders itself.
    pub fn read_u16_order(&mut self, big_endian: bool) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact_rewind(&mut buf)?;
        Ok(if big_endian { u16::from_be_bytes(buf) } else { u16::from_le_bytes(buf) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn verify_read_u16_endianness() {
        let data = vec![0x01, 0x02, 0x03, 0x04];
        let mut be = ByteReader::new(Cursor::new(data.clone()), true);
        assert_eq!(be.read_u16().unwrap(), 0x0102);
        let mut le = ByteReader::new(Cursor::new(data), false);
        assert_eq!(le.read_u16().unwrap(), 0x0201);
    }

    #[test]
    fn verify_rewind_on_short_read() {
        let data = vec![0xAAu8, 0xBB];
        let mut r = ByteReader::new(Cursor::new(data), false);
        let start = r.pos().unwrap();
        assert!(r.read_u32().is_err());
        assert_eq!(r.pos().unwrap(), start);
    }

    #[test]
    fn verify_seek_and_ignore() {
        let data: Vec<u8> = (0..16).collect();
        let mut r = ByteReader::new(Cursor::new(data), false);
        r.seek_to(4).unwrap();
        assert_eq!(r.read_u8().unwrap(), 4);
        r.ignore_bytes(3).unwrap();
        assert_eq!(r.read_u8().unwrap(), 8);
    }
}
