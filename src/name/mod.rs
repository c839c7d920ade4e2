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

//! Implementation of data structures related to domain names.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use arrayvec::ArrayVec;
use lazy_static::lazy_static;

use crate::wire::{WireReader, WireWriter};

mod error;
mod wire;
pub use error::Error;

/// The maximum number of labels in a domain name.
const MAX_LABELS: usize = 128;

/// The maximum length of the uncompressed on-the-wire representation of
/// a domain name.
const MAX_WIRE_LEN: usize = 255;

/// The maximum length of a label in a domain name (not including the
/// octet that provides the length).
const MAX_LABEL_LEN: usize = 63;

/// The number of label offsets cached in each [`Name`]. Offsets of
/// labels past this point are recomputed by walking the wire form.
/// Names with more than seven labels are rare enough that the walk is
/// not worth avoiding.
const MAX_CACHED_OFFSETS: usize = 7;

////////////////////////////////////////////////////////////////////////
// NAME STRUCTURE                                                     //
////////////////////////////////////////////////////////////////////////

/// A domain name.
///
/// A `Name` is an ordered sequence of labels, stored canonically as the
/// concatenation of length-prefixed labels ([RFC 1035 § 3.1]). A name
/// is *absolute* if its final label is the null (zero-length) label,
/// and *relative* otherwise. Relative names arise only from text
/// parsing; names read from the wire are always absolute. A relative
/// name can be completed against an origin with [`Name::concat`] or
/// [`Name::from_text`].
///
/// Names compare equal case-insensitively (ASCII), and the [`Hash`]
/// implementation agrees with that notion of equality. The [`Ord`]
/// implementation is the canonical DNS ordering of [RFC 4034 § 6.1]:
/// names are ordered as strings of labels read from right to left.
///
/// A `Name` is immutable once constructed and may be freely shared
/// across threads.
///
/// [RFC 1035 § 3.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.1
/// [RFC 4034 § 6.1]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.1
#[derive(Clone)]
pub struct Name {
    labels: u8,
    offsets: ArrayVec<u8, MAX_CACHED_OFFSETS>,
    wire: Box<[u8]>,
}

lazy_static! {
    static ref ROOT: Name = Name::from_wire_repr(&[0]).unwrap();
}

impl Name {
    /// Constructs a `Name` from its uncompressed on-the-wire
    /// representation, validating label lengths, the total length, and
    /// the label count, and caching the first few label offsets.
    fn from_wire_repr(wire: &[u8]) -> Result<Self, Error> {
        if wire.is_empty() {
            return Err(Error::NoLabels);
        }
        if wire.len() > MAX_WIRE_LEN {
            return Err(Error::NameTooLong);
        }
        let mut offsets = ArrayVec::new();
        let mut labels = 0usize;
        let mut pos = 0usize;
        while pos < wire.len() {
            let len = wire[pos] as usize;
            if len > MAX_LABEL_LEN {
                return Err(Error::BadLabelType);
            }
            labels += 1;
            if labels > MAX_LABELS {
                return Err(Error::TooManyLabels);
            }
            if offsets.len() < MAX_CACHED_OFFSETS {
                offsets.push(pos as u8);
            }
            if len == 0 && pos + 1 != wire.len() {
                return Err(Error::NullNonTerminal);
            }
            pos += len + 1;
        }
        if pos != wire.len() {
            return Err(Error::UnexpectedEom);
        }
        Ok(Self {
            labels: labels as u8,
            offsets,
            wire: wire.into(),
        })
    }

    /// Returns the offset of label `n` in the wire representation.
    /// Offsets past the cached prefix are recomputed by walking.
    fn offset(&self, n: usize) -> usize {
        assert!(n < self.labels());
        if n < self.offsets.len() {
            self.offsets[n] as usize
        } else {
            let mut i = self.offsets.len() - 1;
            let mut pos = self.offsets[i] as usize;
            while i < n {
                pos += self.wire[pos] as usize + 1;
                i += 1;
            }
            pos
        }
    }

    /// Returns a reference to the `Name` representing the DNS root,
    /// `.`.
    pub fn root() -> &'static Name {
        &ROOT
    }

    /// Returns the number of labels in this `Name`. For absolute names
    /// this includes the terminal null label, so the root has one
    /// label.
    pub fn labels(&self) -> usize {
        self.labels as usize
    }

    /// Returns the octets of label `n`, without the length octet. The
    /// terminal null label of an absolute name yields an empty slice.
    pub fn label(&self, n: usize) -> &[u8] {
        let offset = self.offset(n);
        let len = self.wire[offset] as usize;
        &self.wire[offset + 1..offset + 1 + len]
    }

    /// Returns an iterator over the labels of this `Name`.
    pub fn iter_labels(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.labels()).map(|n| self.label(n))
    }

    /// Returns the (uncompressed) on-the-wire representation of the
    /// `Name`.
    pub fn wire_repr(&self) -> &[u8] {
        &self.wire
    }

    /// Returns the length (in octets) of the `Name`'s uncompressed
    /// on-the-wire representation.
    pub fn wire_len(&self) -> usize {
        self.wire.len()
    }

    /// Returns whether the `Name` is absolute, i.e. whether its final
    /// label is the null label.
    pub fn is_absolute(&self) -> bool {
        self.wire[self.offset(self.labels() - 1)] == 0
    }

    /// Returns whether the `Name` is the DNS root `.`.
    pub fn is_root(&self) -> bool {
        self.labels == 1 && self.wire[0] == 0
    }

    /// Returns whether the `Name` is a wildcard, i.e. whether its first
    /// label is the single octet `*`.
    pub fn is_wildcard(&self) -> bool {
        self.wire[0] == 1 && self.wire[1] == b'*'
    }

    /// Returns whether this `Name` is equal to or a subdomain of
    /// `other`; that is, whether `other`'s labels match this name's
    /// trailing labels (case-insensitively).
    pub fn subdomain(&self, other: &Name) -> bool {
        let n = other.labels();
        if self.labels() < n {
            return false;
        }
        let skip = self.labels() - n;
        (0..n).all(|i| self.label(skip + i).eq_ignore_ascii_case(other.label(i)))
    }

    /// Returns the name obtained by removing the first `skip` labels,
    /// or `None` if there aren't that many labels left.
    pub fn superdomain(&self, skip: usize) -> Option<Name> {
        if skip == 0 {
            Some(self.clone())
        } else if skip < self.labels() {
            let stripped = &self.wire[self.offset(skip)..];
            Some(Self::from_wire_repr(stripped).expect("stripping labels preserves validity"))
        } else {
            None
        }
    }

    /// Returns the wildcard name obtained by removing the first `strip`
    /// labels and prepending a `*` label. `strip` must be at least one
    /// and less than the number of labels.
    pub fn wild(&self, strip: usize) -> Name {
        assert!(strip >= 1 && strip < self.labels());
        let mut wire = Vec::with_capacity(2 + self.wire.len());
        wire.extend_from_slice(b"\x01*");
        wire.extend_from_slice(&self.wire[self.offset(strip)..]);
        Self::from_wire_repr(&wire).expect("wildcard substitution preserves validity")
    }

    /// Concatenates two names. If `prefix` is already absolute, it is
    /// returned unchanged. Fails if the combined name would exceed the
    /// wire-length or label-count limits.
    pub fn concat(prefix: &Name, suffix: &Name) -> Result<Name, Error> {
        if prefix.is_absolute() {
            return Ok(prefix.clone());
        }
        if prefix.wire.len() + suffix.wire.len() > MAX_WIRE_LEN {
            return Err(Error::NameTooLong);
        }
        if prefix.labels() + suffix.labels() > MAX_LABELS {
            return Err(Error::TooManyLabels);
        }
        let mut wire = Vec::with_capacity(prefix.wire.len() + suffix.wire.len());
        wire.extend_from_slice(&prefix.wire);
        wire.extend_from_slice(&suffix.wire);
        Self::from_wire_repr(&wire)
    }

    /// Substitutes a DNAME redirection ([RFC 6672]) into this name.
    ///
    /// If this name is not a subdomain of `owner`, `Ok(None)` is
    /// returned. Otherwise the labels of this name below `owner` are
    /// prepended to `target`; if the result would exceed 255 octets on
    /// the wire, this fails with [`Error::NameTooLong`] (which the
    /// responder maps to the YXDOMAIN RCODE).
    ///
    /// [RFC 6672]: https://datatracker.ietf.org/doc/html/rfc6672
    pub fn from_dname(&self, owner: &Name, target: &Name) -> Result<Option<Name>, Error> {
        if !self.subdomain(owner) {
            return Ok(None);
        }
        let prefix_labels = self.labels() - owner.labels();
        if prefix_labels == 0 {
            return Ok(Some(target.clone()));
        }
        let prefix = &self.wire[..self.offset(prefix_labels)];
        if prefix.len() + target.wire.len() > MAX_WIRE_LEN {
            return Err(Error::NameTooLong);
        }
        if prefix_labels + target.labels() > MAX_LABELS {
            return Err(Error::TooManyLabels);
        }
        let mut wire = Vec::with_capacity(prefix.len() + target.wire.len());
        wire.extend_from_slice(prefix);
        wire.extend_from_slice(&target.wire);
        Ok(Some(Self::from_wire_repr(&wire)?))
    }

    /// Returns the case-insensitive hash of this name, computed with a
    /// multiplicative accumulator over the lowercased wire form. Equal
    /// names always hash equally.
    pub fn hash_value(&self) -> u32 {
        let mut h: u32 = 0;
        for &octet in self.wire.iter() {
            h = h.wrapping_add((h << 3).wrapping_add(octet.to_ascii_lowercase() as u32));
        }
        h
    }

    /// Parses a (possibly compressed) name at the reader's current
    /// position. The reader should cover an entire DNS message, since
    /// compression pointer targets are message offsets. On return the
    /// cursor rests after the name's first chunk, so reading can
    /// continue with the following field.
    pub fn from_wire(reader: &mut WireReader) -> Result<Name, Error> {
        wire::parse_compressed(reader)
    }

    /// Parses an uncompressed name at the start of `octets`. Extra data
    /// after the name is ignored; the number of octets consumed is
    /// returned along with the name.
    pub fn from_uncompressed(octets: &[u8]) -> Result<(Name, usize), Error> {
        wire::parse_uncompressed(octets)
    }

    /// Like [`Name::from_uncompressed`], but fails if the name does not
    /// occupy the entire buffer.
    pub fn from_uncompressed_all(octets: &[u8]) -> Result<Name, Error> {
        wire::parse_uncompressed_all(octets)
    }

    /// Writes the name to `writer` without compression. Fails if the
    /// name is relative.
    pub fn write_uncompressed(&self, writer: &mut WireWriter) -> Result<(), Error> {
        if !self.is_absolute() {
            return Err(Error::Relative);
        }
        writer.write_slice(&self.wire);
        Ok(())
    }

    /// Writes the name to `writer` in canonical form: uncompressed,
    /// with all ASCII letters lowercased. This is the form used for
    /// signing inputs ([RFC 4034 § 6.2]). Fails if the name is
    /// relative.
    ///
    /// [RFC 4034 § 6.2]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.2
    pub fn write_canonical(&self, writer: &mut WireWriter) -> Result<(), Error> {
        if !self.is_absolute() {
            return Err(Error::Relative);
        }
        for &octet in self.wire.iter() {
            writer.write_u8(octet.to_ascii_lowercase());
        }
        Ok(())
    }

    /// Parses a name from its textual representation.
    ///
    /// `.` separates labels; `\DDD` escapes a single octet by its
    /// three-digit decimal value, and `\c` for any other `c` is the
    /// literal octet `c` ([RFC 4343 § 2.1]). A trailing dot makes the
    /// name absolute. The string `@` denotes the origin, and a relative
    /// result is completed by appending the origin, when one is given;
    /// with no origin, `@` fails and relative names are returned
    /// as-is.
    ///
    /// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
    pub fn from_text(text: &str, origin: Option<&Name>) -> Result<Name, Error> {
        if text.is_empty() {
            return Err(Error::StrEmpty);
        } else if text == "." {
            return Ok(Self::root().clone());
        } else if text == "@" {
            return origin.cloned().ok_or(Error::NoOrigin);
        }

        let mut wire = ArrayVec::<u8, MAX_WIRE_LEN>::new();
        let mut label = ArrayVec::<u8, MAX_LABEL_LEN>::new();
        let mut labels = 0usize;
        let mut last_was_dot = false;

        let flush = |label: &mut ArrayVec<u8, MAX_LABEL_LEN>,
                         wire: &mut ArrayVec<u8, MAX_WIRE_LEN>,
                         labels: &mut usize|
         -> Result<(), Error> {
            if label.is_empty() {
                return Err(Error::NullNonTerminal);
            }
            *labels += 1;
            if *labels > MAX_LABELS {
                return Err(Error::TooManyLabels);
            }
            wire.try_push(label.len() as u8)
                .or(Err(Error::NameTooLong))?;
            wire.try_extend_from_slice(label)
                .or(Err(Error::NameTooLong))?;
            label.clear();
            Ok(())
        };

        let mut remaining: &[u8] = text.as_ref();
        while let Some(&octet) = remaining.first() {
            last_was_dot = false;
            if octet == b'\\' {
                let (value, consumed) = parse_escape(&remaining[1..])?;
                label.try_push(value).or(Err(Error::LabelTooLong))?;
                remaining = &remaining[consumed + 1..];
            } else if octet == b'.' {
                flush(&mut label, &mut wire, &mut labels)?;
                last_was_dot = true;
                remaining = &remaining[1..];
            } else if !octet.is_ascii() {
                return Err(Error::StrNotAscii);
            } else {
                label.try_push(octet).or(Err(Error::LabelTooLong))?;
                remaining = &remaining[1..];
            }
        }

        if last_was_dot {
            // The trailing dot makes the name absolute.
            labels += 1;
            if labels > MAX_LABELS {
                return Err(Error::TooManyLabels);
            }
            wire.try_push(0).or(Err(Error::NameTooLong))?;
        } else {
            flush(&mut label, &mut wire, &mut labels)?;
        }

        let name = Self::from_wire_repr(&wire)?;
        if name.is_absolute() {
            Ok(name)
        } else if let Some(origin) = origin {
            Self::concat(&name, origin)
        } else {
            Ok(name)
        }
    }
}

/// Parses an escape sequence. We expect `remaining` to start with the
/// octet immediately *after* the backslash that introduces the escape
/// sequence.
fn parse_escape(remaining: &[u8]) -> Result<(u8, usize), Error> {
    if remaining.is_empty() {
        Err(Error::InvalidEscape)
    } else if remaining[0].is_ascii_digit() {
        if remaining.len() < 3 || !remaining[1].is_ascii_digit() || !remaining[2].is_ascii_digit() {
            Err(Error::InvalidEscape)
        } else {
            let hundreds = (remaining[0] - b'0') as usize;
            let tens = (remaining[1] - b'0') as usize;
            let ones = (remaining[2] - b'0') as usize;
            let value = 100 * hundreds + 10 * tens + ones;
            if value > 255 {
                Err(Error::InvalidEscape)
            } else {
                Ok((value as u8, 3))
            }
        }
    } else {
        Ok((remaining[0], 1))
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s, None)
    }
}

////////////////////////////////////////////////////////////////////////
// TRAIT IMPLEMENTATIONS                                              //
////////////////////////////////////////////////////////////////////////

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        // A length octet is at most 63 and is therefore never an ASCII
        // letter, so comparing the whole wire form case-insensitively
        // compares both structure and label content.
        self.labels == other.labels && self.wire.eq_ignore_ascii_case(&other.wire)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash_value());
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The [`Ord`] implementation for `Name` employs the canonical DNS
/// ordering of [RFC 4034 § 6.1]: names are ordered as strings of labels
/// read from right to left, comparing labels case-insensitively.
///
/// [RFC 4034 § 6.1]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.1
impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        let sn = self.labels();
        let on = other.labels();
        for i in 1..=sn.min(on) {
            match label_cmp(self.label(sn - i), other.label(on - i)) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        sn.cmp(&on)
    }
}

/// Compares two labels in canonical order: lowercased octet strings,
/// with a shorter label sorting before longer ones it prefixes.
fn label_cmp(a: &[u8], b: &[u8]) -> Ordering {
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x.to_ascii_lowercase(), y.to_ascii_lowercase());
        match x.cmp(&y) {
            Ordering::Equal => continue,
            ordering => return ordering,
        }
    }
    a.len().cmp(&b.len())
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for i in 0..self.labels() {
            if i > 0 {
                f.write_str(".")?;
            }
            fmt_label(f, self.label(i))?;
        }
        Ok(())
    }
}

/// Writes a label in master-file text form, escaping special and
/// non-printable octets.
fn fmt_label(f: &mut fmt::Formatter, label: &[u8]) -> fmt::Result {
    for &octet in label {
        match octet {
            b'"' | b'(' | b')' | b'.' | b';' | b'\\' | b'@' | b'$' => {
                write!(f, "\\{}", octet as char)?
            }
            0x21..=0x7e => write!(f, "{}", octet as char)?,
            _ => write!(f, "\\{:03}", octet)?,
        }
    }
    Ok(())
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_expected_characteristics() {
        let root = Name::root();
        assert!(root.is_root());
        assert!(root.is_absolute());
        assert_eq!(root.labels(), 1);
        assert_eq!(root.wire_repr(), &[0]);
        assert_eq!(root.to_string(), ".");
    }

    #[test]
    fn fromstr_works() {
        let name: Name = "example.test.".parse().unwrap();
        assert_eq!(name.wire_repr(), b"\x07example\x04test\x00");
        assert_eq!(name.labels(), 3);
        assert!(name.is_absolute());
    }

    #[test]
    fn fromstr_keeps_relative_names_relative() {
        let name: Name = "example.test".parse().unwrap();
        assert_eq!(name.wire_repr(), b"\x07example\x04test");
        assert_eq!(name.labels(), 2);
        assert!(!name.is_absolute());
    }

    #[test]
    fn from_text_completes_relative_names() {
        let origin: Name = "test.".parse().unwrap();
        let name = Name::from_text("example", Some(&origin)).unwrap();
        assert_eq!(name, "example.test.".parse().unwrap());
        assert!(name.is_absolute());
    }

    #[test]
    fn from_text_handles_at_sign() {
        let origin: Name = "example.test.".parse().unwrap();
        assert_eq!(Name::from_text("@", Some(&origin)).unwrap(), origin);
        assert_eq!(Name::from_text("@", None), Err(Error::NoOrigin));
    }

    #[test]
    fn from_text_ignores_origin_for_absolute_names() {
        let origin: Name = "example.test.".parse().unwrap();
        let name = Name::from_text("other.", Some(&origin)).unwrap();
        assert_eq!(name, "other.".parse().unwrap());
    }

    #[test]
    fn fromstr_rejects_empty() {
        assert_eq!("".parse::<Name>(), Err(Error::StrEmpty));
    }

    #[test]
    fn fromstr_rejects_non_ascii() {
        assert_eq!("✈.aero.".parse::<Name>(), Err(Error::StrNotAscii));
    }

    #[test]
    fn fromstr_rejects_null_non_terminal() {
        assert_eq!("a.b..c.".parse::<Name>(), Err(Error::NullNonTerminal));
        assert_eq!(".a.".parse::<Name>(), Err(Error::NullNonTerminal));
    }

    #[test]
    fn fromstr_rejects_long_label() {
        assert_eq!(
            "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx.".parse::<Name>(),
            Err(Error::LabelTooLong)
        );
    }

    #[test]
    fn fromstr_accepts_label_of_exactly_63() {
        let label = "x".repeat(63);
        let name: Name = format!("{}.", label).parse().unwrap();
        assert_eq!(name.label(0).len(), 63);
    }

    #[test]
    fn fromstr_rejects_long_name() {
        // 128 single-octet labels produce a wire form of 257 octets
        // once the root label is appended.
        let long = "x.".repeat(128);
        assert_eq!(long.parse::<Name>(), Err(Error::NameTooLong));
    }

    #[test]
    fn fromstr_accepts_name_of_exactly_255() {
        // 127 single-octet labels (254 octets) plus the root label.
        let exact = "x.".repeat(127);
        let name: Name = exact.parse().unwrap();
        assert_eq!(name.wire_len(), 255);
        assert_eq!(name.labels(), 128);
    }

    #[test]
    fn fromstr_escaping_works() {
        let escaped: Name = "\\000.\\\\\\..".parse().unwrap();
        assert_eq!(escaped.wire_repr(), b"\x01\x00\x02\\.\x00");
    }

    #[test]
    fn fromstr_rejects_invalid_escapes() {
        assert_eq!("\\00".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("\\00x.".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("\\256.".parse::<Name>(), Err(Error::InvalidEscape));
    }

    #[test]
    fn display_round_trips() {
        for text in ["example.test.", "a.b.c", "*.wild.test.", "\\000.z.test."] {
            let name: Name = text.parse().unwrap();
            let round: Name = name.to_string().parse().unwrap();
            assert_eq!(name, round);
        }
    }

    #[test]
    fn equality_is_case_insensitive() {
        let a: Name = "Example.TEST.".parse().unwrap();
        let b: Name = "exAMPLE.test.".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.hash_value(), b.hash_value());
    }

    #[test]
    fn is_wildcard_works() {
        let wildcard: Name = "*.example.test.".parse().unwrap();
        let not_a_wildcard: Name = "example.test.".parse().unwrap();
        let inner_asterisk: Name = "x.*.example.test.".parse().unwrap();
        assert!(wildcard.is_wildcard());
        assert!(!not_a_wildcard.is_wildcard());
        assert!(!inner_asterisk.is_wildcard());
    }

    #[test]
    fn subdomain_works() {
        let sub: Name = "sub.example.test.".parse().unwrap();
        let domain: Name = "example.test.".parse().unwrap();
        let other: Name = "other.test.".parse().unwrap();
        assert!(sub.subdomain(&domain));
        assert!(sub.subdomain(Name::root()));
        assert!(domain.subdomain(&domain));
        assert!(!domain.subdomain(&sub));
        assert!(!sub.subdomain(&other));
    }

    #[test]
    fn superdomain_works() {
        let sub: Name = "sub.example.test.".parse().unwrap();
        assert_eq!(sub.superdomain(0).as_ref(), Some(&sub));
        assert_eq!(sub.superdomain(1), Some("example.test.".parse().unwrap()));
        assert_eq!(sub.superdomain(2), Some("test.".parse().unwrap()));
        assert_eq!(sub.superdomain(3), Some(Name::root().clone()));
        assert_eq!(sub.superdomain(4), None);
    }

    #[test]
    fn wild_works() {
        let name: Name = "a.b.example.test.".parse().unwrap();
        assert_eq!(name.wild(1), "*.b.example.test.".parse().unwrap());
        assert_eq!(name.wild(2), "*.example.test.".parse().unwrap());
        assert_eq!(name.wild(3), "*.test.".parse().unwrap());
    }

    #[test]
    fn from_dname_substitutes() {
        let name: Name = "foo.old.test.".parse().unwrap();
        let owner: Name = "old.test.".parse().unwrap();
        let target: Name = "new.test.".parse().unwrap();
        assert_eq!(
            name.from_dname(&owner, &target).unwrap(),
            Some("foo.new.test.".parse().unwrap())
        );
    }

    #[test]
    fn from_dname_rejects_unrelated_names() {
        let name: Name = "foo.other.test.".parse().unwrap();
        let owner: Name = "old.test.".parse().unwrap();
        let target: Name = "new.test.".parse().unwrap();
        assert_eq!(name.from_dname(&owner, &target).unwrap(), None);
    }

    #[test]
    fn from_dname_reports_overflow() {
        let prefix = "x.".repeat(100);
        let name: Name = format!("{}old.test.", prefix).parse().unwrap();
        let owner: Name = "old.test.".parse().unwrap();
        let target: Name = format!("{}new.test.", "y.".repeat(26)).parse().unwrap();
        assert_eq!(
            name.from_dname(&owner, &target),
            Err(Error::NameTooLong)
        );
    }

    #[test]
    fn ord_follows_rfc_4034() {
        // This ordered list is from RFC 4034 § 6.1, which defines the
        // canonical ordering of domain names.
        let names: Vec<Name> = [
            "example.",
            "a.example.",
            "yljkjljk.a.example.",
            "Z.a.example.",
            "zABC.a.EXAMPLE.",
            "z.example.",
            "\\001.z.example.",
            "*.z.example.",
            "\\200.z.example.",
        ]
        .into_iter()
        .map(|n| n.parse().unwrap())
        .collect();

        for (i, ni) in names.iter().enumerate() {
            for (j, nj) in names.iter().enumerate() {
                assert_eq!(i.cmp(&j), ni.cmp(nj), "{} vs {}", ni, nj);
            }
        }
    }

    #[test]
    fn offsets_beyond_cache_are_recomputed() {
        let name: Name = "a.b.c.d.e.f.g.h.i.j.".parse().unwrap();
        assert_eq!(name.labels(), 11);
        assert_eq!(name.label(8), b"i");
        assert_eq!(name.label(9), b"j");
        assert_eq!(name.label(10), b"");
        assert_eq!(name.superdomain(9).unwrap(), "j.".parse().unwrap());
    }

    #[test]
    fn write_canonical_lowercases() {
        let name: Name = "ExAmple.Test.".parse().unwrap();
        let mut writer = WireWriter::new();
        name.write_canonical(&mut writer).unwrap();
        assert_eq!(writer.octets(), b"\x07example\x04test\x00");
    }

    #[test]
    fn write_uncompressed_rejects_relative_names() {
        let name: Name = "relative".parse().unwrap();
        let mut writer = WireWriter::new();
        assert_eq!(name.write_uncompressed(&mut writer), Err(Error::Relative));
    }
}
