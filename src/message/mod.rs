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

//! Implementation of reading and writing of DNS messages.

use std::fmt;
use std::sync::Arc;

use crate::name::Name;
use crate::rr::{Rdata, Record, Rrset, Ttl, Type};

pub mod compression;
pub mod tsig;

mod opcode;
mod rcode;
mod reader;
mod writer;

pub use opcode::{IntoOpcodeError, Opcode};
pub use rcode::{ExtendedRcode, IntoRcodeError, Rcode};
pub use reader::Error as ReadError;
pub use writer::{append_tsig, Error as WriteError};

/// The size of a DNS message header, in octets.
pub const HEADER_SIZE: usize = 12;

/// The maximum length of a DNS message in wire format.
pub const MAX_MESSAGE_SIZE: usize = 65535;

////////////////////////////////////////////////////////////////////////
// SECTIONS AND FLAGS                                                 //
////////////////////////////////////////////////////////////////////////

/// The four sections of a DNS message body ([RFC 1035 § 4.1]).
///
/// [RFC 1035 § 4.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Section {
    Question,
    Answer,
    Authority,
    Additional,
}

impl Section {
    /// All sections, in wire order.
    pub const ALL: [Section; 4] = [
        Section::Question,
        Section::Answer,
        Section::Authority,
        Section::Additional,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Question => 0,
            Self::Answer => 1,
            Self::Authority => 2,
            Self::Additional => 3,
        }
    }
}

/// A single-bit flag of the DNS message header.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Flag {
    /// Query response.
    Qr,

    /// Authoritative answer.
    Aa,

    /// Truncation.
    Tc,

    /// Recursion desired.
    Rd,

    /// Recursion available.
    Ra,
}

impl Flag {
    fn mask(self) -> u16 {
        match self {
            Self::Qr => 0x8000,
            Self::Aa => 0x0400,
            Self::Tc => 0x0200,
            Self::Rd => 0x0100,
            Self::Ra => 0x0080,
        }
    }
}

const OPCODE_MASK: u16 = 0x7800;
const OPCODE_SHIFT: usize = 11;
const RCODE_MASK: u16 = 0x000f;

////////////////////////////////////////////////////////////////////////
// MESSAGES                                                           //
////////////////////////////////////////////////////////////////////////

/// A DNS message: a header plus the QUESTION, ANSWER, AUTHORITY, and
/// ADDITIONAL sections.
///
/// A `Message` is constructed empty (or decoded with
/// [`Message::from_wire`]), filled by appending records, and rendered
/// to octets once with [`Message::to_wire`] or
/// [`Message::to_wire_limited`]. Messages are not shared between
/// threads; each in-flight request owns its own.
#[derive(PartialEq)]
pub struct Message {
    id: u16,
    flags: u16,
    sections: [Vec<Record>; 4],
    tsig: Option<TsigContext>,
    tsig_start: Option<usize>,
    sig0_start: Option<usize>,
}

/// TSIG signing state attached to a message awaiting rendering.
#[derive(PartialEq)]
pub(crate) struct TsigContext {
    pub(crate) key: Arc<tsig::TsigKey>,
    pub(crate) error: ExtendedRcode,
    pub(crate) query_tsig: Option<Record>,
}

impl Message {
    /// Creates a new, empty message with the given ID and all flags
    /// clear.
    pub fn new(id: u16) -> Self {
        Self {
            id,
            flags: 0,
            sections: Default::default(),
            tsig: None,
            tsig_start: None,
            sig0_start: None,
        }
    }

    /// Creates a new, empty message with the given ID and raw flags
    /// word. This is how error responses echo a received header.
    pub fn from_header(id: u16, flags: u16) -> Self {
        Self {
            flags,
            ..Self::new(id)
        }
    }

    /// Returns the 16-bit message ID.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Sets the 16-bit message ID.
    pub fn set_id(&mut self, id: u16) {
        self.id = id;
    }

    /// Returns the raw 16-bit flags word.
    pub fn flags_word(&self) -> u16 {
        self.flags
    }

    /// Returns whether the given header flag is set.
    pub fn flag(&self, flag: Flag) -> bool {
        self.flags & flag.mask() != 0
    }

    /// Sets the given header flag.
    pub fn set_flag(&mut self, flag: Flag) {
        self.flags |= flag.mask();
    }

    /// Clears the given header flag.
    pub fn clear_flag(&mut self, flag: Flag) {
        self.flags &= !flag.mask();
    }

    /// Returns the message's OPCODE.
    pub fn opcode(&self) -> Opcode {
        let raw = ((self.flags & OPCODE_MASK) >> OPCODE_SHIFT) as u8;
        raw.try_into().unwrap()
    }

    /// Sets the message's OPCODE.
    pub fn set_opcode(&mut self, opcode: Opcode) {
        self.flags &= !OPCODE_MASK;
        self.flags |= (u8::from(opcode) as u16) << OPCODE_SHIFT;
    }

    /// Returns the message's RCODE.
    pub fn rcode(&self) -> Rcode {
        ((self.flags & RCODE_MASK) as u8).try_into().unwrap()
    }

    /// Sets the message's RCODE.
    pub fn set_rcode(&mut self, rcode: Rcode) {
        self.flags &= !RCODE_MASK;
        self.flags |= u8::from(rcode) as u16;
    }

    /// Appends a record to a section.
    pub fn add_record(&mut self, record: Record, section: Section) {
        self.sections[section.index()].push(record);
    }

    /// Returns the records of a section.
    pub fn records(&self, section: Section) -> &[Record] {
        &self.sections[section.index()]
    }

    /// Returns the number of records in a section.
    pub fn count(&self, section: Section) -> usize {
        self.sections[section.index()].len()
    }

    /// Removes all records from a section.
    pub fn clear_section(&mut self, section: Section) {
        self.sections[section.index()].clear();
    }

    /// Returns the message's question (the first record of the QUESTION
    /// section), if any.
    pub fn question(&self) -> Option<&Record> {
        self.sections[0].first()
    }

    /// Returns whether the given section already contains a record of
    /// the given owner and RRset type. RRSIG records count as members
    /// of the set they cover.
    pub fn find_rrset(&self, owner: &Name, rr_type: Type, section: Section) -> bool {
        self.records(section)
            .iter()
            .any(|record| record.rrset_type() == rr_type && record.owner == *owner)
    }

    /// Groups the records of a section into RRsets, preserving the
    /// order of first appearance. RRSIG records join the set covering
    /// their type.
    pub fn section_rrsets(&self, section: Section) -> Vec<Rrset> {
        let mut sets: Vec<Rrset> = Vec::new();
        for record in self.records(section) {
            let existing = sets.iter_mut().rev().find(|set| {
                set.rr_type() == record.rrset_type()
                    && set.class() == record.class
                    && *set.owner() == record.owner
            });
            match existing {
                Some(set) => set.push(record.clone()),
                None => sets.push(Rrset::from_record(record.clone())),
            }
        }
        sets
    }

    /// Returns the message's OPT pseudo-record, if any.
    pub fn opt(&self) -> Option<&Record> {
        self.records(Section::Additional)
            .iter()
            .find(|record| record.rr_type == Type::OPT)
    }

    /// Returns the message's TSIG record. Per [RFC 8945 § 5.1], the
    /// TSIG record must be the last record of the ADDITIONAL section.
    ///
    /// [RFC 8945 § 5.1]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.1
    pub fn tsig_record(&self) -> Option<&Record> {
        self.records(Section::Additional)
            .last()
            .filter(|record| record.rr_type == Type::TSIG)
    }

    /// Returns the byte offset at which the TSIG record started in the
    /// received message, if this message was decoded and carried one.
    pub fn tsig_start(&self) -> Option<usize> {
        self.tsig_start
    }

    /// Returns the byte offset at which a SIG(0) record started in the
    /// received message, if this message was decoded and carried one.
    pub fn sig0_start(&self) -> Option<usize> {
        self.sig0_start
    }

    /// Arranges for the message to be signed when it is rendered: the
    /// encoder will generate a TSIG record over the rendered octets
    /// (chaining from the request's TSIG, if given) and append it to
    /// the ADDITIONAL section.
    pub fn set_tsig(
        &mut self,
        key: Arc<tsig::TsigKey>,
        error: ExtendedRcode,
        query_tsig: Option<Record>,
    ) {
        self.tsig = Some(TsigContext {
            key,
            error,
            query_tsig,
        });
    }

    pub(crate) fn tsig_context(&self) -> Option<&TsigContext> {
        self.tsig.as_ref()
    }

    pub(crate) fn set_tsig_start(&mut self, start: Option<usize>) {
        self.tsig_start = start;
    }

    pub(crate) fn set_sig0_start(&mut self, start: Option<usize>) {
        self.sig0_start = start;
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("opcode", &self.opcode())
            .field("rcode", &self.rcode())
            .field("flags", &format_args!("{:#06x}", self.flags))
            .field("qdcount", &self.count(Section::Question))
            .field("ancount", &self.count(Section::Answer))
            .field("nscount", &self.count(Section::Authority))
            .field("arcount", &self.count(Section::Additional))
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// EDNS(0) OPT HELPERS                                                //
////////////////////////////////////////////////////////////////////////

/// The DO (DNSSEC OK) bit of the OPT TTL field ([RFC 3225]).
///
/// [RFC 3225]: https://datatracker.ietf.org/doc/html/rfc3225
const OPT_DO_MASK: u32 = 0x8000;

/// Returns the UDP payload size advertised by an OPT record, which
/// travels in the record's CLASS field ([RFC 6891 § 6.1.2]).
///
/// [RFC 6891 § 6.1.2]: https://datatracker.ietf.org/doc/html/rfc6891#section-6.1.2
pub fn opt_payload_size(opt: &Record) -> u16 {
    u16::from(opt.class)
}

/// Returns whether an OPT record has the DO (DNSSEC OK) bit set.
pub fn opt_dnssec_ok(opt: &Record) -> bool {
    u32::from(opt.ttl) & OPT_DO_MASK != 0
}

/// Builds an OPT record advertising the given payload size and DO bit.
pub fn make_opt(payload_size: u16, dnssec_ok: bool) -> Record {
    let ttl = if dnssec_ok { OPT_DO_MASK } else { 0 };
    Record::new(
        Name::root().clone(),
        Type::OPT,
        payload_size.into(),
        Ttl::from_unchecked(ttl),
        Rdata::empty(),
    )
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;

    #[test]
    fn flags_are_independent() {
        let mut message = Message::new(0x1234);
        message.set_flag(Flag::Qr);
        message.set_flag(Flag::Aa);
        message.set_opcode(Opcode::Query);
        message.set_rcode(Rcode::NxDomain);
        assert!(message.flag(Flag::Qr));
        assert!(message.flag(Flag::Aa));
        assert!(!message.flag(Flag::Tc));
        assert_eq!(message.opcode(), Opcode::Query);
        assert_eq!(message.rcode(), Rcode::NxDomain);
        message.clear_flag(Flag::Aa);
        assert!(!message.flag(Flag::Aa));
        assert_eq!(message.rcode(), Rcode::NxDomain);
    }

    #[test]
    fn opcode_occupies_expected_bits() {
        let mut message = Message::new(0);
        message.set_opcode(Opcode::Update);
        assert_eq!(message.flags_word(), 5 << 11);
    }

    #[test]
    fn section_rrsets_groups_in_order() {
        let owner: Name = "x.test.".parse().unwrap();
        let other: Name = "y.test.".parse().unwrap();
        let mut message = Message::new(0);
        for (name, addr) in [
            (&owner, [10, 0, 0, 1]),
            (&other, [10, 0, 0, 2]),
            (&owner, [10, 0, 0, 3]),
        ] {
            message.add_record(
                Record::new(
                    name.clone(),
                    Type::A,
                    Class::IN,
                    Ttl::from(60),
                    (&addr[..]).try_into().unwrap(),
                ),
                Section::Answer,
            );
        }
        let sets = message.section_rrsets(Section::Answer);
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].owner(), &owner);
        assert_eq!(sets[0].len(), 2);
        assert_eq!(sets[1].owner(), &other);
        assert_eq!(sets[1].len(), 1);
    }

    #[test]
    fn opt_helpers_round_trip() {
        let opt = make_opt(4096, true);
        assert_eq!(opt_payload_size(&opt), 4096);
        assert!(opt_dnssec_ok(&opt));
        let opt = make_opt(1232, false);
        assert!(!opt_dnssec_ok(&opt));
    }
}
