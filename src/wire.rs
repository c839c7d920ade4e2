// Copyright 2024 The Rampart Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Low-level reading and writing of DNS wire data.
//!
//! The [`WireReader`] and [`WireWriter`] types provide position-aware
//! access to octet buffers. They know nothing about DNS message
//! structure; that is the business of the [`message`](crate::message)
//! module. They do, however, provide the two facilities that message
//! and name parsing require beyond a plain cursor:
//!
//! * a *bookmark* ([`WireReader::save`]/[`WireReader::restore`]), used
//!   when following compression pointers so that the reader can resume
//!   at the octet after the pointer once the name has been
//!   reassembled; and
//! * a *limit window* ([`WireReader::set_limit`]), used to confine a
//!   type-specific RDATA parser to exactly RDLENGTH octets.

use std::fmt;

////////////////////////////////////////////////////////////////////////
// READER                                                             //
////////////////////////////////////////////////////////////////////////

/// A cursor over a borrowed octet buffer.
///
/// All multi-octet reads are big-endian (network byte order), per
/// [RFC 1035 § 2.3.2].
///
/// [RFC 1035 § 2.3.2]: https://datatracker.ietf.org/doc/html/rfc1035#section-2.3.2
#[derive(Clone)]
pub struct WireReader<'a> {
    octets: &'a [u8],
    cursor: usize,
    limit: usize,
    saved: Option<Bookmark>,
}

/// A saved reader position; see [`WireReader::save`].
#[derive(Clone, Copy)]
struct Bookmark {
    cursor: usize,
    limit: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a new `WireReader` over `octets` with the cursor at the
    /// start of the buffer.
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            cursor: 0,
            limit: octets.len(),
            saved: None,
        }
    }

    /// Returns the current cursor position.
    pub fn current(&self) -> usize {
        self.cursor
    }

    /// Returns the number of octets remaining before the current limit.
    pub fn remaining(&self) -> usize {
        self.limit - self.cursor
    }

    /// Moves the cursor to an absolute position. The position must not
    /// be past the end of the underlying buffer; the active limit is
    /// reset to the end of the buffer.
    pub fn jump(&mut self, position: usize) -> Result<(), Error> {
        if position >= self.octets.len() {
            Err(Error::BadOffset)
        } else {
            self.cursor = position;
            self.limit = self.octets.len();
            Ok(())
        }
    }

    /// Bookmarks the current cursor position and limit. A later call to
    /// [`WireReader::restore`] returns to this position. Only one
    /// bookmark is kept; saving again overwrites the previous one.
    pub fn save(&mut self) {
        self.saved = Some(Bookmark {
            cursor: self.cursor,
            limit: self.limit,
        });
    }

    /// Returns to the bookmarked position. Panics if no bookmark was
    /// saved; this is always a programming error.
    pub fn restore(&mut self) {
        let saved = self.saved.take().expect("no saved reader position");
        self.cursor = saved.cursor;
        self.limit = saved.limit;
    }

    /// Returns whether a bookmark is currently saved.
    pub fn has_bookmark(&self) -> bool {
        self.saved.is_some()
    }

    /// Restricts reading to the next `len` octets. Fails if fewer than
    /// `len` octets remain.
    pub fn set_limit(&mut self, len: usize) -> Result<(), Error> {
        if len > self.remaining() {
            Err(Error::UnexpectedEnd)
        } else {
            self.limit = self.cursor + len;
            Ok(())
        }
    }

    /// Removes an active limit window, allowing reading to the end of
    /// the underlying buffer again.
    pub fn clear_limit(&mut self) {
        self.limit = self.octets.len();
    }

    /// Reads a single octet.
    pub fn read_u8(&mut self) -> Result<u8, Error> {
        if self.remaining() < 1 {
            Err(Error::UnexpectedEnd)
        } else {
            let octet = self.octets[self.cursor];
            self.cursor += 1;
            Ok(octet)
        }
    }

    /// Reads a big-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16, Error> {
        self.read_slice(2)
            .map(|slice| u16::from_be_bytes(slice.try_into().unwrap()))
    }

    /// Reads a big-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, Error> {
        self.read_slice(4)
            .map(|slice| u32::from_be_bytes(slice.try_into().unwrap()))
    }

    /// Reads the next `len` octets.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < len {
            Err(Error::UnexpectedEnd)
        } else {
            let slice = &self.octets[self.cursor..self.cursor + len];
            self.cursor += len;
            Ok(slice)
        }
    }

    /// Reads all octets up to the current limit.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let slice = &self.octets[self.cursor..self.limit];
        self.cursor = self.limit;
        slice
    }
}

impl fmt::Debug for WireReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WireReader")
            .field("len", &self.octets.len())
            .field("cursor", &self.cursor)
            .field("limit", &self.limit)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// WRITER                                                             //
////////////////////////////////////////////////////////////////////////

/// A growable output buffer for DNS wire data.
///
/// Unlike [`WireReader`], the writer is infallible: it grows as needed,
/// and callers that need to bound the output (for example, message
/// rendering with a length cap) compare [`WireWriter::current`] against
/// their own limit and roll back with [`WireWriter::truncate`].
#[derive(Debug, Default)]
pub struct WireWriter {
    octets: Vec<u8>,
}

impl WireWriter {
    /// Creates a new, empty `WireWriter`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current output position (i.e., the number of octets
    /// written so far).
    pub fn current(&self) -> usize {
        self.octets.len()
    }

    /// Rolls the output back so that `position` octets remain. Panics
    /// if `position` is past the current position.
    pub fn truncate(&mut self, position: usize) {
        assert!(position <= self.octets.len());
        self.octets.truncate(position);
    }

    /// Writes a single octet.
    pub fn write_u8(&mut self, value: u8) {
        self.octets.push(value);
    }

    /// Writes a big-endian `u16`.
    pub fn write_u16(&mut self, value: u16) {
        self.octets.extend_from_slice(&value.to_be_bytes());
    }

    /// Writes a big-endian `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.octets.extend_from_slice(&value.to_be_bytes());
    }

    /// Writes a slice of octets.
    pub fn write_slice(&mut self, slice: &[u8]) {
        self.octets.extend_from_slice(slice);
    }

    /// Overwrites two octets at `position` with a big-endian `u16`.
    /// This is used to patch section counts and length fields after the
    /// fact. Panics if the position has not been written yet.
    pub fn write_u16_at(&mut self, position: usize, value: u16) {
        self.octets[position..position + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// Returns the octets written so far.
    pub fn octets(&self) -> &[u8] {
        &self.octets
    }

    /// Consumes the writer, returning the written octets.
    pub fn into_bytes(self) -> Vec<u8> {
        self.octets
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error produced by [`WireReader`] operations.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// A read ran past the end of the buffer or the active limit.
    UnexpectedEnd,

    /// A jump target was outside the underlying buffer.
    BadOffset,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::UnexpectedEnd => f.write_str("unexpected end of wire data"),
            Self::BadOffset => f.write_str("offset outside of message"),
        }
    }
}

impl std::error::Error for Error {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_reads_integers_in_network_order() {
        let mut reader = WireReader::new(b"\x01\x02\x03\x04\x05\x06\x07");
        assert_eq!(reader.read_u8(), Ok(0x01));
        assert_eq!(reader.read_u16(), Ok(0x0203));
        assert_eq!(reader.read_u32(), Ok(0x04050607));
        assert_eq!(reader.read_u8(), Err(Error::UnexpectedEnd));
    }

    #[test]
    fn reader_save_and_restore_work() {
        let mut reader = WireReader::new(b"\x00\x01\x02\x03");
        reader.read_u16().unwrap();
        reader.save();
        reader.jump(0).unwrap();
        assert_eq!(reader.read_u8(), Ok(0x00));
        reader.restore();
        assert_eq!(reader.current(), 2);
        assert_eq!(reader.read_u16(), Ok(0x0203));
    }

    #[test]
    fn reader_limit_window_works() {
        let mut reader = WireReader::new(b"\x00\x01\x02\x03");
        reader.set_limit(2).unwrap();
        assert_eq!(reader.remaining(), 2);
        assert_eq!(reader.read_u16(), Ok(0x0001));
        assert_eq!(reader.read_u8(), Err(Error::UnexpectedEnd));
        reader.clear_limit();
        assert_eq!(reader.read_u16(), Ok(0x0203));
    }

    #[test]
    fn reader_rejects_oversized_limit() {
        let mut reader = WireReader::new(b"\x00\x01");
        assert_eq!(reader.set_limit(3), Err(Error::UnexpectedEnd));
    }

    #[test]
    fn reader_rejects_bad_jump() {
        let mut reader = WireReader::new(b"\x00\x01");
        assert_eq!(reader.jump(2), Err(Error::BadOffset));
    }

    #[test]
    fn writer_patches_u16_in_place() {
        let mut writer = WireWriter::new();
        writer.write_u32(0);
        writer.write_u16_at(1, 0xbeef);
        assert_eq!(writer.octets(), b"\x00\xbe\xef\x00");
    }

    #[test]
    fn writer_truncate_rolls_back() {
        let mut writer = WireWriter::new();
        writer.write_slice(b"abcdef");
        writer.truncate(2);
        assert_eq!(writer.octets(), b"ab");
    }
}
