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

//! Implementation of decoding DNS messages from the wire.

use std::fmt;

use crate::name::{self, Name};
use crate::rr::rdata::ReadRdataError;
use crate::rr::{Rdata, Record, Ttl, Type};
use crate::wire::{self, WireReader};

use super::{Flag, Message, Section, HEADER_SIZE};

impl Message {
    /// Decodes a DNS message from its wire form.
    ///
    /// If the message has the TC (truncation) flag set and decoding
    /// fails partway through, the records parsed so far are kept and
    /// the partial message is returned; truncated messages are
    /// understood on a best-effort basis. Without TC, a parse failure
    /// is an error.
    ///
    /// The byte offsets of a TSIG record and of a SIG(0) record (a SIG
    /// covering type 0) in the ADDITIONAL section are recorded for
    /// later signature verification over the raw octets.
    pub fn from_wire(octets: &[u8]) -> Result<Message, Error> {
        if octets.len() < HEADER_SIZE {
            return Err(Error::HeaderTooShort);
        }
        let mut reader = WireReader::new(octets);
        let id = reader.read_u16()?;
        let flags = reader.read_u16()?;
        let mut counts = [0usize; 4];
        for count in counts.iter_mut() {
            *count = reader.read_u16()? as usize;
        }

        let mut message = Message::from_header(id, flags);
        let truncated = message.flag(Flag::Tc);

        'sections: for section in Section::ALL {
            for _ in 0..counts[section.index()] {
                let start = reader.current();
                let record = match read_record(&mut reader, section) {
                    Ok(record) => record,
                    Err(_) if truncated => break 'sections,
                    Err(e) => return Err(e),
                };
                if section == Section::Additional {
                    if record.rr_type == Type::TSIG {
                        message.set_tsig_start(Some(start));
                    } else if record.rr_type == Type::SIG && record.rrset_type() == Type::from(0) {
                        message.set_sig0_start(Some(start));
                    }
                }
                message.add_record(record, section);
            }
        }
        Ok(message)
    }
}

/// Reads one record (or question entry) at the reader's position.
fn read_record(reader: &mut WireReader, section: Section) -> Result<Record, Error> {
    let owner = Name::from_wire(reader).map_err(Error::InvalidOwner)?;
    let rr_type = Type::from(reader.read_u16()?);
    let class = reader.read_u16()?.into();
    if section == Section::Question {
        return Ok(Record::question(owner, rr_type, class));
    }
    let raw_ttl = reader.read_u32()?;
    let ttl = if rr_type == Type::OPT {
        // The OPT TTL field carries flags and must not be clamped.
        Ttl::from_unchecked(raw_ttl)
    } else {
        Ttl::from(raw_ttl)
    };
    let rdlength = reader.read_u16()?;
    let rdata = Rdata::read(rr_type, reader, rdlength)?;
    Ok(Record::new(owner, rr_type, class, ttl, rdata))
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a DNS message could not be decoded.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// The buffer is too short to hold a message header.
    HeaderTooShort,

    /// A fixed-size field ran past the end of the message.
    UnexpectedEom,

    /// A record owner name was malformed.
    InvalidOwner(name::Error),

    /// Record RDATA was malformed.
    InvalidRdata(ReadRdataError),
}

impl From<wire::Error> for Error {
    fn from(_: wire::Error) -> Self {
        Self::UnexpectedEom
    }
}

impl From<ReadRdataError> for Error {
    fn from(err: ReadRdataError) -> Self {
        Self::InvalidRdata(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::HeaderTooShort => f.write_str("header too short"),
            Self::UnexpectedEom => f.write_str("unexpected end of message in field"),
            Self::InvalidOwner(err) => write!(f, "invalid owner: {}", err),
            Self::InvalidRdata(err) => err.fmt(f),
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
    use crate::class::Class;
    use crate::message::Opcode;

    /// A reply to a query for example.com. IN NS made to a recursive
    /// server: one question, two NS answers (the second compressed
    /// against the first), and an OPT record.
    const EXAMPLE_COM_NS_MESSAGE: &[u8] =
        b"\xe2\xd7\x81\x80\x00\x01\x00\x02\x00\x00\x00\x01\x07\x65\x78\x61\
          \x6d\x70\x6c\x65\x03\x63\x6f\x6d\x00\x00\x02\x00\x01\xc0\x0c\x00\
          \x02\x00\x01\x00\x01\x50\xa2\x00\x14\x01\x61\x0c\x69\x61\x6e\x61\
          \x2d\x73\x65\x72\x76\x65\x72\x73\x03\x6e\x65\x74\x00\xc0\x0c\x00\
          \x02\x00\x01\x00\x01\x50\xa2\x00\x04\x01\x62\xc0\x2b\x00\x00\x29\
          \x10\x00\x00\x00\x00\x00\x00\x00";

    #[test]
    fn from_wire_works() {
        let message = Message::from_wire(EXAMPLE_COM_NS_MESSAGE).unwrap();
        let qname: Name = "example.com.".parse().unwrap();
        let ns_a: Name = "a.iana-servers.net.".parse().unwrap();
        let ns_b: Name = "b.iana-servers.net.".parse().unwrap();

        assert_eq!(message.id(), 0xe2d7);
        assert!(message.flag(Flag::Qr));
        assert!(message.flag(Flag::Rd));
        assert!(message.flag(Flag::Ra));
        assert!(!message.flag(Flag::Aa));
        assert_eq!(message.opcode(), Opcode::Query);
        assert_eq!(message.count(Section::Question), 1);
        assert_eq!(message.count(Section::Answer), 2);
        assert_eq!(message.count(Section::Authority), 0);
        assert_eq!(message.count(Section::Additional), 1);

        let question = message.question().unwrap();
        assert_eq!(question.owner, qname);
        assert_eq!(question.rr_type, Type::NS);
        assert_eq!(question.class, Class::IN);

        let answers = message.records(Section::Answer);
        assert_eq!(answers[0].owner, qname);
        assert_eq!(answers[0].ttl, Ttl::from(86178));
        assert_eq!(answers[0].rdata.octets(), ns_a.wire_repr());
        // The second answer's RDATA was compressed on the wire; the
        // stored form must be the full name.
        assert_eq!(answers[1].rdata.octets(), ns_b.wire_repr());

        let opt = message.opt().unwrap();
        assert_eq!(opt.owner, *Name::root());
        assert_eq!(u16::from(opt.class), 4096);
    }

    #[test]
    fn from_wire_rejects_short_headers() {
        for size in 0..HEADER_SIZE {
            let buf = vec![0; size];
            assert_eq!(Message::from_wire(&buf), Err(Error::HeaderTooShort));
        }
    }

    #[test]
    fn from_wire_rejects_garbage_without_tc() {
        // Claim one question, but provide nothing.
        let octets = b"\x00\x00\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00";
        assert!(Message::from_wire(octets).is_err());
    }

    #[test]
    fn from_wire_keeps_prefix_of_truncated_messages() {
        // TC is set and the single answer is cut off mid-record; the
        // question parsed so far must be kept.
        let octets = b"\x00\x2a\x02\x00\x00\x01\x00\x01\x00\x00\x00\x00\
                       \x01x\x04test\x00\x00\x01\x00\x01\
                       \x01x\x04test\x00\x00\x01";
        let message = Message::from_wire(octets).unwrap();
        assert!(message.flag(Flag::Tc));
        assert_eq!(message.count(Section::Question), 1);
        assert_eq!(message.count(Section::Answer), 0);
    }
}
