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

//! Implementation of parsing of on-the-wire names.

use arrayvec::ArrayVec;

use crate::wire::WireReader;

use super::{Error, Name, MAX_LABELS, MAX_LABEL_LEN, MAX_WIRE_LEN};

////////////////////////////////////////////////////////////////////////
// PARSING OF COMPRESSED ON-THE-WIRE NAMES                            //
////////////////////////////////////////////////////////////////////////

/// Parses a (possibly compressed) name at the reader's current
/// position. This is the implementation of [`Name::from_wire`].
///
/// Compression pointers are followed through the reader's
/// [`jump`](WireReader::jump) facility; pointer targets are indices
/// into the underlying buffer, so the reader is expected to cover an
/// entire DNS message. Per [RFC 1035 § 4.1.4], a pointer must refer to
/// a *prior* occurrence of a name: any pointer whose target does not
/// strictly precede the pointer itself is rejected with
/// [`Error::BadCompression`], which also rules out pointer loops.
///
/// The reader position is bookmarked when the first pointer is
/// followed, so that on return the cursor rests on the octet after the
/// name's first chunk, ready for the following field.
///
/// [RFC 1035 § 4.1.4]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.4
pub(super) fn parse_compressed(reader: &mut WireReader) -> Result<Name, Error> {
    let mut wire = ArrayVec::<u8, MAX_WIRE_LEN>::new();
    let mut labels = 0usize;
    let mut followed_pointer = false;

    loop {
        let len = reader.read_u8()?;
        match len & 0xc0 {
            0x00 => {
                labels += 1;
                if labels > MAX_LABELS {
                    return Err(Error::TooManyLabels);
                }
                wire.try_push(len).or(Err(Error::NameTooLong))?;
                if len == 0 {
                    break;
                }
                let label = reader.read_slice(len as usize)?;
                wire.try_extend_from_slice(label)
                    .or(Err(Error::NameTooLong))?;
            }
            0xc0 => {
                let low = reader.read_u8()?;
                let target = (((len & 0x3f) as usize) << 8) | low as usize;
                if target >= reader.current() - 2 {
                    return Err(Error::BadCompression);
                }
                if !followed_pointer {
                    reader.save();
                    followed_pointer = true;
                }
                reader.jump(target).or(Err(Error::BadCompression))?;
            }
            _ => return Err(Error::BadLabelType),
        }
    }

    if followed_pointer {
        reader.restore();
    }
    Name::from_wire_repr(&wire)
}

////////////////////////////////////////////////////////////////////////
// PARSING OF UNCOMPRESSED ON-THE-WIRE NAMES                          //
////////////////////////////////////////////////////////////////////////

/// Parses an uncompressed name at the beginning of `octets`. The name
/// need not occupy the entire buffer; the number of octets consumed is
/// returned alongside the name. This is the implementation of
/// [`Name::from_uncompressed`].
pub(super) fn parse_uncompressed(octets: &[u8]) -> Result<(Name, usize), Error> {
    let mut offset = 0;
    let mut labels = 0usize;
    loop {
        let len = *octets.get(offset).ok_or(Error::UnexpectedEom)? as usize;
        if len > MAX_LABEL_LEN {
            return Err(Error::BadLabelType);
        }
        labels += 1;
        if labels > MAX_LABELS {
            return Err(Error::TooManyLabels);
        }
        offset += len + 1;
        if offset > MAX_WIRE_LEN {
            return Err(Error::NameTooLong);
        }
        if len == 0 {
            break;
        }
    }
    if offset > octets.len() {
        return Err(Error::UnexpectedEom);
    }
    let name = Name::from_wire_repr(&octets[..offset])?;
    Ok((name, offset))
}

/// Like [`parse_uncompressed`], but in addition fails if there is extra
/// data in the buffer after the name. This is the implementation of
/// [`Name::from_uncompressed_all`].
pub(super) fn parse_uncompressed_all(octets: &[u8]) -> Result<Name, Error> {
    let (name, len) = parse_uncompressed(octets)?;
    if len < octets.len() {
        Err(Error::ExtraData)
    } else {
        Ok(name)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_at(octets: &[u8], start: usize) -> Result<(Name, usize), Error> {
        let mut reader = WireReader::new(octets);
        reader.jump(start).unwrap();
        let name = parse_compressed(&mut reader)?;
        Ok((name, reader.current() - start))
    }

    #[test]
    fn parse_compressed_accepts_uncompressed_names() {
        let octets = b"junk\x07example\x04test\x00junk";
        let target: Name = "example.test.".parse().unwrap();
        assert_eq!(parse_at(octets, 4), Ok((target, 14)));
    }

    #[test]
    fn parse_compressed_accepts_compressed_names() {
        let octets = b"junk\x04test\x00junk\x07example\xc0\x04junk";
        let target: Name = "example.test.".parse().unwrap();
        assert_eq!(parse_at(octets, 14), Ok((target, 10)));
    }

    #[test]
    fn parse_compressed_resumes_after_first_pointer() {
        // A name whose first pointer leads to a chunk that itself ends
        // in a pointer. The consumed length must cover only the first
        // chunk.
        let octets = b"\x04test\x00junk\x07example\xc0\x00junk\x03www\xc0\x0a";
        let target: Name = "www.example.test.".parse().unwrap();
        assert_eq!(parse_at(octets, 24), Ok((target, 6)));
    }

    #[test]
    fn parse_compressed_rejects_self_pointer() {
        assert_eq!(
            parse_at(b"\xc0\x00", 0).unwrap_err(),
            Error::BadCompression
        );
    }

    #[test]
    fn parse_compressed_rejects_forward_pointer() {
        assert_eq!(
            parse_at(b"\x01x\xc0\x08junk\x00", 0).unwrap_err(),
            Error::BadCompression
        );
    }

    #[test]
    fn parse_compressed_rejects_equal_pointer() {
        // The pointer at offset 2 points at itself via offset 2.
        assert_eq!(
            parse_at(b"\x01x\xc0\x02", 2).unwrap_err(),
            Error::BadCompression
        );
    }

    #[test]
    fn parse_compressed_rejects_reserved_label_types() {
        assert_eq!(parse_at(b"\x40x", 0).unwrap_err(), Error::BadLabelType);
        assert_eq!(parse_at(b"\x80x", 0).unwrap_err(), Error::BadLabelType);
    }

    #[test]
    fn parse_compressed_rejects_truncated_names() {
        assert_eq!(
            parse_at(b"\x07exam", 0).unwrap_err(),
            Error::UnexpectedEom
        );
        assert_eq!(parse_at(b"\x01x", 0).unwrap_err(), Error::UnexpectedEom);
    }

    #[test]
    fn parse_compressed_enforces_name_length() {
        // 127 labels of "x." plus a pointer back to another 16 labels
        // exceeds 255 octets in uncompressed form.
        let mut octets = Vec::new();
        for _ in 0..16 {
            octets.extend_from_slice(b"\x01x");
        }
        octets.push(0);
        let start = octets.len();
        for _ in 0..112 {
            octets.extend_from_slice(b"\x01y");
        }
        octets.extend_from_slice(b"\xc0\x00");
        assert_eq!(parse_at(&octets, start).unwrap_err(), Error::NameTooLong);
    }

    #[test]
    fn parse_uncompressed_works() {
        let octets = b"\x07example\x04test\x00junk";
        let (name, len) = parse_uncompressed(octets).unwrap();
        assert_eq!(name, "example.test.".parse().unwrap());
        assert_eq!(len, 14);
    }

    #[test]
    fn parse_uncompressed_all_rejects_extra_data() {
        let octets = b"\x07example\x04test\x00junk";
        assert_eq!(parse_uncompressed_all(octets), Err(Error::ExtraData));
    }

    #[test]
    fn parse_uncompressed_rejects_compression() {
        assert_eq!(
            parse_uncompressed(b"\x07example\xc0\x00"),
            Err(Error::BadLabelType)
        );
    }
}
