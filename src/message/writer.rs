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

//! Implementation of encoding DNS messages to the wire.

use std::fmt;

use crate::name::Name;
use crate::rr::rdata::Component;
use crate::rr::{Record, Type};
use crate::wire::WireWriter;

use super::compression::CompressionTable;
use super::{Flag, Message, Section, HEADER_SIZE};

impl Message {
    /// Renders the message to its wire form with name compression and
    /// no length cap. OPT and TSIG handling is the caller's business;
    /// records are written exactly as they appear in the sections.
    pub fn to_wire(&self) -> Vec<u8> {
        render(self, true)
    }

    /// Like [`Message::to_wire`], but with name compression disabled.
    pub fn to_wire_uncompressed(&self) -> Vec<u8> {
        render(self, false)
    }

    /// Renders the message into at most `max_length` octets.
    ///
    /// If not everything fits, output is rolled back to the last RRset
    /// boundary of the section being written, that section's count is
    /// rewritten, the counts of the later non-ADDITIONAL sections are
    /// zeroed, and the TC flag is set. Records dropped from the
    /// ADDITIONAL section do not set TC.
    ///
    /// An OPT record present in the ADDITIONAL section and a TSIG
    /// record arranged with [`Message::set_tsig`] are accounted for
    /// outside the cap: the cap is reduced by their (for TSIG,
    /// worst-case) serialized lengths up front, and both records are
    /// appended after the capped render. Truncation therefore never
    /// drops them.
    ///
    /// Fails if `max_length` cannot even hold the 12-octet header.
    pub fn to_wire_limited(&self, max_length: usize) -> Result<Vec<u8>, Error> {
        if max_length < HEADER_SIZE {
            return Err(Error::Truncation);
        }

        let mut cap = max_length;
        if let Some(ctx) = self.tsig_context() {
            cap = cap.saturating_sub(ctx.key.record_length());
        }
        let opt_bytes = self.opt().map(|opt| {
            let mut out = WireWriter::new();
            write_record(&mut out, None, opt);
            out.into_bytes()
        });
        if let Some(ref opt_bytes) = opt_bytes {
            cap = cap.saturating_sub(opt_bytes.len());
        }

        let mut out = WireWriter::new();
        out.write_u16(self.id());
        let mut flags = self.flags_word();
        out.write_u16(flags);
        for section in Section::ALL {
            out.write_u16(self.count(section) as u16);
        }

        let mut table = CompressionTable::new();
        let mut additional_count = 0usize;
        for section in Section::ALL {
            let skipped = section_to_wire(&mut out, self, section, &mut table, cap);
            if skipped != 0 && section != Section::Additional {
                flags |= Flag::Tc.mask();
                let count = self.count(section) - skipped;
                out.write_u16_at(4 + 2 * section.index(), count as u16);
                for later in section.index() + 1..Section::Additional.index() {
                    out.write_u16_at(4 + 2 * later, 0);
                }
                break;
            }
            if section == Section::Additional {
                additional_count = self.count(section) - skipped;
            }
        }

        if let Some(opt_bytes) = opt_bytes {
            out.write_slice(&opt_bytes);
            additional_count += 1;
        }
        if flags != self.flags_word() {
            out.write_u16_at(2, flags);
        }
        if additional_count != self.count(Section::Additional) {
            out.write_u16_at(10, additional_count as u16);
        }

        let mut octets = out.into_bytes();
        if let Some(ctx) = self.tsig_context() {
            // The TSIG RR must come last, signing everything written so
            // far.
            let tsig_record = ctx.key.generate(ctx.error, &octets, ctx.query_tsig.as_ref());
            append_tsig(&mut octets, &tsig_record);
        }
        Ok(octets)
    }
}

/// Appends an already-generated TSIG record to rendered message octets,
/// incrementing the ADDITIONAL count in place. The record is written
/// without compression: after a truncating render, the compression
/// table may hold entries that no longer point at anything.
pub fn append_tsig(octets: &mut Vec<u8>, record: &Record) {
    let mut out = WireWriter::new();
    write_record(&mut out, None, record);
    octets.extend_from_slice(out.octets());
    let arcount = u16::from_be_bytes([octets[10], octets[11]]).wrapping_add(1);
    octets[10..12].copy_from_slice(&arcount.to_be_bytes());
}

/// The plain renderer behind [`Message::to_wire`].
fn render(message: &Message, compress: bool) -> Vec<u8> {
    let mut out = WireWriter::new();
    out.write_u16(message.id());
    out.write_u16(message.flags_word());
    for section in Section::ALL {
        out.write_u16(message.count(section) as u16);
    }
    let mut table = if compress {
        Some(CompressionTable::new())
    } else {
        None
    };
    for section in Section::ALL {
        for record in message.records(section) {
            if section == Section::Question {
                write_question(&mut out, table.as_mut(), record);
            } else {
                write_record(&mut out, table.as_mut(), record);
            }
        }
    }
    out.into_bytes()
}

/// Writes one section under the length cap, returning the number of
/// records *not* successfully rendered. Output that exceeds the cap is
/// rolled back to the last RRset boundary, so an RRset is never split
/// by truncation. OPT records are skipped (they are appended after the
/// capped render) and count as "not rendered" here.
fn section_to_wire(
    out: &mut WireWriter,
    message: &Message,
    section: Section,
    table: &mut CompressionTable,
    cap: usize,
) -> usize {
    let records = message.records(section);
    let n = records.len();
    let mut boundary = out.current();
    let mut rendered = 0;
    let mut skipped = 0;
    let mut last: Option<&Record> = None;

    for (i, record) in records.iter().enumerate() {
        if section == Section::Additional && record.rr_type == Type::OPT {
            skipped += 1;
            continue;
        }
        if let Some(last) = last {
            if !same_set(record, last) {
                boundary = out.current();
                rendered = i;
            }
        }
        last = Some(record);
        if section == Section::Question {
            write_question(out, Some(&mut *table), record);
        } else {
            write_record(out, Some(&mut *table), record);
        }
        if out.current() > cap {
            out.truncate(boundary);
            return n - rendered + skipped;
        }
    }
    skipped
}

/// Returns whether two records belong to the same RRset.
fn same_set(a: &Record, b: &Record) -> bool {
    a.rrset_type() == b.rrset_type() && a.class == b.class && a.owner == b.owner
}

/// Writes a question entry: owner, type, and class only.
fn write_question(out: &mut WireWriter, table: Option<&mut CompressionTable>, record: &Record) {
    write_name(out, table, &record.owner);
    out.write_u16(record.rr_type.into());
    out.write_u16(record.class.into());
}

/// Writes a full resource record, compressing the owner and any
/// compressible names embedded in the RDATA.
pub(super) fn write_record(
    out: &mut WireWriter,
    mut table: Option<&mut CompressionTable>,
    record: &Record,
) {
    write_name(out, table.as_deref_mut(), &record.owner);
    out.write_u16(record.rr_type.into());
    out.write_u16(record.class.into());
    out.write_u32(record.ttl.into());
    let rdlength_position = out.current();
    out.write_u16(0);
    match record.rdata.components(record.rr_type) {
        Ok(components) => {
            for component in components {
                match component {
                    Component::CompressibleName(name) => {
                        write_name(out, table.as_deref_mut(), &name)
                    }
                    Component::UncompressibleName(name) => out.write_slice(name.wire_repr()),
                    Component::Other(octets) => out.write_slice(octets),
                }
            }
        }
        Err(_) => out.write_slice(record.rdata.octets()),
    }
    let rdlength = out.current() - rdlength_position - 2;
    out.write_u16_at(rdlength_position, rdlength as u16);
}

/// Writes a domain name, compressing against (and extending) the table
/// if one is given.
///
/// For each label before the root, the suffix starting at that label is
/// looked up in the table; a hit is emitted as a two-octet pointer and
/// ends the name. Otherwise the current output position is recorded for
/// the suffix and the label is written. The root label is the single
/// zero octet.
fn write_name(out: &mut WireWriter, mut table: Option<&mut CompressionTable>, name: &Name) {
    debug_assert!(name.is_absolute());
    for i in 0..name.labels() - 1 {
        if let Some(table) = table.as_deref_mut() {
            let suffix = name.superdomain(i).unwrap();
            if let Some(position) = table.get(&suffix) {
                out.write_u16(0xc000 | position);
                return;
            }
            table.add(out.current(), suffix);
        }
        let label = name.label(i);
        out.write_u8(label.len() as u8);
        out.write_slice(label);
    }
    out.write_u8(0);
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a DNS message could not be encoded.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// The length cap cannot hold even a message header.
    Truncation,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Truncation => f.write_str("message does not fit in the length limit"),
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
    use crate::rr::Ttl;

    fn a_record(owner: &str, address: [u8; 4]) -> Record {
        Record::new(
            owner.parse().unwrap(),
            Type::A,
            Class::IN,
            Ttl::from(300),
            (&address[..]).try_into().unwrap(),
        )
    }

    fn query_response(answers: &[Record]) -> Message {
        let mut message = Message::new(0x1234);
        message.set_flag(Flag::Qr);
        message.add_record(
            Record::question("x.test.".parse().unwrap(), Type::A, Class::IN),
            Section::Question,
        );
        for answer in answers {
            message.add_record(answer.clone(), Section::Answer);
        }
        message
    }

    #[test]
    fn compression_points_back_at_the_qname() {
        let message = query_response(&[a_record("x.test.", [10, 0, 0, 1])]);
        let octets = message.to_wire();
        // Question: 8 (name) + 4. Answer owner compresses to a pointer
        // at the QNAME (offset 12): 0xc00c.
        assert_eq!(&octets[24..26], b"\xc0\x0c");
        let decoded = Message::from_wire(&octets).unwrap();
        assert_eq!(decoded.records(Section::Answer), message.records(Section::Answer));
    }

    #[test]
    fn uncompressed_encoding_is_stable() {
        let message = query_response(&[a_record("x.test.", [10, 0, 0, 1])]);
        let octets = message.to_wire_uncompressed();
        let decoded = Message::from_wire(&octets).unwrap();
        assert_eq!(decoded.to_wire_uncompressed(), octets);
    }

    #[test]
    fn round_trip_preserves_records_and_flags() {
        let mut message = query_response(&[
            a_record("x.test.", [10, 0, 0, 1]),
            a_record("x.test.", [10, 0, 0, 2]),
        ]);
        message.set_rcode(super::super::Rcode::NoError);
        message.set_flag(Flag::Aa);
        let decoded = Message::from_wire(&message.to_wire()).unwrap();
        assert_eq!(decoded.id(), message.id());
        assert_eq!(decoded.flags_word(), message.flags_word());
        for section in Section::ALL {
            assert_eq!(decoded.records(section), message.records(section));
        }
    }

    #[test]
    fn to_wire_limited_fails_below_header_size() {
        let message = Message::new(0);
        assert_eq!(message.to_wire_limited(11), Err(Error::Truncation));
    }

    #[test]
    fn truncation_rolls_back_to_an_rrset_boundary_and_sets_tc() {
        let answers: Vec<Record> = (0..20)
            .map(|i| a_record("x.test.", [10, 0, 0, i]))
            .collect();
        let message = query_response(&answers);
        let full_len = message.to_wire().len();
        let octets = message.to_wire_limited(full_len - 1).unwrap();
        let decoded = Message::from_wire(&octets).unwrap();
        assert!(decoded.flag(Flag::Tc));
        // All 20 answers form one RRset, so rolling back to the last
        // RRset boundary removes all of them.
        assert_eq!(decoded.count(Section::Answer), 0);
        assert_eq!(decoded.count(Section::Question), 1);
    }

    #[test]
    fn truncation_keeps_whole_earlier_rrsets() {
        let mut answers: Vec<Record> = (0..4).map(|i| a_record("x.test.", [10, 0, 0, i])).collect();
        answers.push(a_record("y.test.", [10, 0, 1, 1]));
        let message = query_response(&answers);
        let full_len = message.to_wire().len();
        let octets = message.to_wire_limited(full_len - 1).unwrap();
        let decoded = Message::from_wire(&octets).unwrap();
        assert!(decoded.flag(Flag::Tc));
        // Only the final single-record RRset is rolled back.
        assert_eq!(decoded.count(Section::Answer), 4);
    }

    #[test]
    fn dropping_additional_records_does_not_set_tc() {
        let mut message = query_response(&[a_record("x.test.", [10, 0, 0, 1])]);
        for i in 0..20 {
            message.add_record(a_record("glue.test.", [10, 1, 0, i]), Section::Additional);
        }
        let answers_only_len = {
            let trimmed = query_response(&[a_record("x.test.", [10, 0, 0, 1])]);
            trimmed.to_wire().len()
        };
        let octets = message.to_wire_limited(answers_only_len + 4).unwrap();
        let decoded = Message::from_wire(&octets).unwrap();
        assert!(!decoded.flag(Flag::Tc));
        assert_eq!(decoded.count(Section::Answer), 1);
        assert!(decoded.count(Section::Additional) < 20);
    }

    #[test]
    fn truncation_zeroes_later_sections_except_additional() {
        // Lock down the inherited behavior: when truncation strikes the
        // ANSWER section, the AUTHORITY count is zeroed but the
        // ADDITIONAL count reflects only the separately appended OPT.
        let mut message = query_response(&[
            a_record("x.test.", [10, 0, 0, 1]),
            a_record("y.test.", [10, 0, 0, 2]),
        ]);
        message.add_record(
            Record::new(
                "test.".parse().unwrap(),
                Type::NS,
                Class::IN,
                Ttl::from(300),
                (b"\x02ns\x04test\x00" as &[u8]).try_into().unwrap(),
            ),
            Section::Authority,
        );
        message.add_record(super::super::make_opt(4096, false), Section::Additional);

        // Leave room for the question and the first answer only (the
        // OPT's 11 octets are budgeted outside the cap).
        let cap = 12 + 12 + 16 + 11;
        let octets = message.to_wire_limited(cap).unwrap();
        let decoded = Message::from_wire(&octets).unwrap();
        assert!(decoded.flag(Flag::Tc));
        assert_eq!(decoded.count(Section::Answer), 1);
        assert_eq!(decoded.count(Section::Authority), 0);
        assert_eq!(decoded.count(Section::Additional), 1);
        assert!(decoded.opt().is_some());
    }
}
