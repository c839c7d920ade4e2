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

//! Implementation of record RDATA handling.
//!
//! Rather than one structure per RR type, RDATA is kept as a generic
//! `(type, octets)` envelope, with a codec table keyed on the type for
//! the handful of operations that need to look inside: reading from the
//! wire (decompressing embedded names into canonical form), breaking
//! the stored form into [`Component`]s for compression-aware writing,
//! type-aware equality, and additional-name extraction.

use std::fmt;
use std::ops::Deref;

use crate::name::{self, Name};
use crate::wire::{self, WireReader};

use super::Type;

////////////////////////////////////////////////////////////////////////
// RDATA STRUCTURE                                                    //
////////////////////////////////////////////////////////////////////////

/// The RDATA of a resource record.
///
/// RDATA is limited to 65,535 octets; the `TryFrom` constructors
/// enforce this. RDATA read from the wire with [`Rdata::read`] is
/// stored in *canonical* form: embedded domain names are decompressed,
/// so the stored octets are position-independent.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct Rdata {
    octets: Vec<u8>,
}

impl Rdata {
    /// Returns an empty `Rdata` (as used by question records and OPT
    /// records without options).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the underlying octets.
    pub fn octets(&self) -> &[u8] {
        &self.octets
    }

    /// Reads RDATA of the given type and length from the wire.
    ///
    /// The type-specific subparser consumes exactly `rdlength` octets
    /// starting at the reader's position; excess or shortfall is an
    /// error. Embedded domain names of the well-known types are
    /// decompressed, so the returned `Rdata` is canonical.
    pub fn read(
        rr_type: Type,
        reader: &mut WireReader,
        rdlength: u16,
    ) -> Result<Self, ReadRdataError> {
        reader.set_limit(rdlength as usize)?;
        let mut octets = Vec::with_capacity(rdlength as usize);
        match rr_type {
            Type::A => octets.extend_from_slice(reader.read_slice(4)?),
            Type::AAAA => octets.extend_from_slice(reader.read_slice(16)?),
            Type::NS
            | Type::MD
            | Type::MF
            | Type::CNAME
            | Type::MB
            | Type::MG
            | Type::MR
            | Type::PTR
            | Type::DNAME => {
                let name = Name::from_wire(reader)?;
                octets.extend_from_slice(name.wire_repr());
            }
            Type::SOA => {
                let mname = Name::from_wire(reader)?;
                let rname = Name::from_wire(reader)?;
                octets.extend_from_slice(mname.wire_repr());
                octets.extend_from_slice(rname.wire_repr());
                octets.extend_from_slice(reader.read_slice(20)?);
            }
            Type::MX => {
                octets.extend_from_slice(reader.read_slice(2)?);
                let name = Name::from_wire(reader)?;
                octets.extend_from_slice(name.wire_repr());
            }
            Type::SRV => {
                octets.extend_from_slice(reader.read_slice(6)?);
                let name = Name::from_wire(reader)?;
                octets.extend_from_slice(name.wire_repr());
            }
            Type::TSIG => {
                let algorithm = Name::from_wire(reader)?;
                octets.extend_from_slice(algorithm.wire_repr());
                // Time (6), fudge (2), MAC size (2), MAC, original ID
                // (2), error (2), other length (2), other data.
                let fixed = reader.read_slice(10)?;
                let mac_size = u16::from_be_bytes(fixed[8..10].try_into().unwrap()) as usize;
                octets.extend_from_slice(fixed);
                octets.extend_from_slice(reader.read_slice(mac_size)?);
                octets.extend_from_slice(reader.read_slice(4)?);
                let other_len = reader.read_u16()?;
                octets.extend_from_slice(&other_len.to_be_bytes());
                octets.extend_from_slice(reader.read_slice(other_len as usize)?);
            }
            _ => octets.extend_from_slice(reader.read_slice(rdlength as usize)?),
        }
        if reader.remaining() != 0 {
            return Err(ReadRdataError::LengthMismatch);
        }
        reader.clear_limit();
        Ok(Self { octets })
    }

    /// Breaks the stored (canonical) RDATA into [`Component`]s for
    /// serialization. Embedded domain names of the well-known RFC 1035
    /// types may be compressed; names in later types (DNAME, SRV, TSIG)
    /// must not be ([RFC 3597 § 4]).
    ///
    /// [RFC 3597 § 4]: https://datatracker.ietf.org/doc/html/rfc3597#section-4
    pub fn components(&self, rr_type: Type) -> Result<Vec<Component>, ReadRdataError> {
        let octets = self.octets();
        let mut components = Vec::new();
        match rr_type {
            Type::NS
            | Type::MD
            | Type::MF
            | Type::CNAME
            | Type::MB
            | Type::MG
            | Type::MR
            | Type::PTR => {
                components.push(Component::CompressibleName(Name::from_uncompressed_all(
                    octets,
                )?));
            }
            Type::SOA => {
                let (mname, mname_len) = Name::from_uncompressed(octets)?;
                let (rname, rname_len) = Name::from_uncompressed(&octets[mname_len..])?;
                components.push(Component::CompressibleName(mname));
                components.push(Component::CompressibleName(rname));
                components.push(Component::Other(&octets[mname_len + rname_len..]));
            }
            Type::MX => {
                let octets_after = octets.get(2..).ok_or(ReadRdataError::LengthMismatch)?;
                components.push(Component::Other(&octets[..2]));
                components.push(Component::CompressibleName(Name::from_uncompressed_all(
                    octets_after,
                )?));
            }
            Type::DNAME => {
                components.push(Component::UncompressibleName(Name::from_uncompressed_all(
                    octets,
                )?));
            }
            Type::SRV => {
                let octets_after = octets.get(6..).ok_or(ReadRdataError::LengthMismatch)?;
                components.push(Component::Other(&octets[..6]));
                components.push(Component::UncompressibleName(Name::from_uncompressed_all(
                    octets_after,
                )?));
            }
            Type::TSIG => {
                let (algorithm, algorithm_len) = Name::from_uncompressed(octets)?;
                components.push(Component::UncompressibleName(algorithm));
                components.push(Component::Other(&octets[algorithm_len..]));
            }
            _ => components.push(Component::Other(octets)),
        }
        Ok(components)
    }

    /// Compares two RDATAs as if both were of the given type. Embedded
    /// domain names compare case-insensitively; everything else
    /// compares exactly.
    pub fn equals(&self, other: &Rdata, rr_type: Type) -> bool {
        match (self.components(rr_type), other.components(rr_type)) {
            (Ok(a), Ok(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| match (x, y) {
                        (
                            Component::CompressibleName(m) | Component::UncompressibleName(m),
                            Component::CompressibleName(n) | Component::UncompressibleName(n),
                        ) => m == n,
                        (Component::Other(m), Component::Other(n)) => m == n,
                        _ => false,
                    })
            }
            // Malformed RDATA falls back to exact comparison.
            _ => self.octets == other.octets,
        }
    }

    /// Returns the "additional name" advertised by RDATA of the given
    /// type: the domain name whose addresses belong in the ADDITIONAL
    /// section of a response carrying this record ([RFC 1035 § 3.3]).
    ///
    /// [RFC 1035 § 3.3]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.3
    pub fn additional_name(&self, rr_type: Type) -> Option<Name> {
        let start = match rr_type {
            Type::NS | Type::MD | Type::MF | Type::MB => 0,
            Type::MX => 2,
            Type::SRV => 6,
            _ => return None,
        };
        self.octets
            .get(start..)
            .and_then(|octets| Name::from_uncompressed_all(octets).ok())
    }

    /// Returns the number of octets in the RDATA.
    pub fn len(&self) -> usize {
        self.octets.len()
    }

    /// Returns whether the RDATA is empty.
    pub fn is_empty(&self) -> bool {
        self.octets.is_empty()
    }
}

impl TryFrom<Vec<u8>> for Rdata {
    type Error = RdataTooLongError;

    fn try_from(octets: Vec<u8>) -> Result<Self, Self::Error> {
        if octets.len() > u16::MAX as usize {
            Err(RdataTooLongError)
        } else {
            Ok(Self { octets })
        }
    }
}

impl TryFrom<&[u8]> for Rdata {
    type Error = RdataTooLongError;

    fn try_from(octets: &[u8]) -> Result<Self, Self::Error> {
        octets.to_vec().try_into()
    }
}

impl From<&Name> for Rdata {
    fn from(name: &Name) -> Self {
        Self {
            octets: name.wire_repr().to_vec(),
        }
    }
}

impl Deref for Rdata {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.octets
    }
}

impl fmt::Debug for Rdata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\\# {}", self.octets.len())?;
        for octet in &self.octets {
            write!(f, " {:02x}", octet)?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////
// COMPONENTS                                                         //
////////////////////////////////////////////////////////////////////////

/// A piece of RDATA, as produced by [`Rdata::components`].
#[derive(Debug)]
pub enum Component<'a> {
    /// An embedded domain name that may be compressed on the wire.
    CompressibleName(Name),

    /// An embedded domain name that must not be compressed, but whose
    /// case is still normalized in canonical form.
    UncompressibleName(Name),

    /// Opaque octets.
    Other(&'a [u8]),
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that RDATA could not be read from the wire.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ReadRdataError {
    /// The type-specific parser did not consume exactly RDLENGTH
    /// octets.
    LengthMismatch,

    /// An embedded domain name was invalid.
    InvalidName(name::Error),

    /// The data ran out mid-field.
    UnexpectedEom,
}

impl From<name::Error> for ReadRdataError {
    fn from(err: name::Error) -> Self {
        Self::InvalidName(err)
    }
}

impl From<wire::Error> for ReadRdataError {
    fn from(_: wire::Error) -> Self {
        Self::UnexpectedEom
    }
}

impl fmt::Display for ReadRdataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::LengthMismatch => f.write_str("RDATA does not match RDLENGTH"),
            Self::InvalidName(err) => write!(f, "invalid name in RDATA: {}", err),
            Self::UnexpectedEom => f.write_str("unexpected end of RDATA"),
        }
    }
}

impl std::error::Error for ReadRdataError {}

/// An error signaling that octets cannot be converted to [`Rdata`]
/// because there are too many of them.
#[derive(Debug, Eq, PartialEq)]
pub struct RdataTooLongError;

impl fmt::Display for RdataTooLongError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("RDATA is longer than 65,535 octets")
    }
}

impl std::error::Error for RdataTooLongError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn read_at(rr_type: Type, octets: &[u8], start: usize, rdlength: u16) -> Result<Rdata, ReadRdataError> {
        let mut reader = WireReader::new(octets);
        reader.jump(start).unwrap();
        Rdata::read(rr_type, &mut reader, rdlength)
    }

    #[test]
    fn read_decompresses_embedded_names() {
        // An NS RDATA referring back to a name at offset zero.
        let octets = b"\x07example\x04test\x00\x02ns\xc0\x00";
        let rdata = read_at(Type::NS, octets, 14, 5).unwrap();
        assert_eq!(rdata.octets(), b"\x02ns\x07example\x04test\x00");
    }

    #[test]
    fn read_rejects_short_fixed_rdata() {
        assert_eq!(
            read_at(Type::A, b"\x0a\x00\x00", 0, 3).unwrap_err(),
            ReadRdataError::UnexpectedEom
        );
    }

    #[test]
    fn read_rejects_rdlength_mismatch() {
        // A 5-octet A record: the parser reads 4 octets and leaves one.
        assert_eq!(
            read_at(Type::A, b"\x0a\x00\x00\x01\xff", 0, 5).unwrap_err(),
            ReadRdataError::LengthMismatch
        );
    }

    #[test]
    fn read_accepts_unknown_types_opaquely() {
        let rdata = read_at(Type::from(0xff00), b"\x01\x02\x03", 0, 3).unwrap();
        assert_eq!(rdata.octets(), b"\x01\x02\x03");
    }

    #[test]
    fn equals_is_case_insensitive_for_names() {
        let a: Rdata = (b"\x02NS\x04test\x00" as &[u8]).try_into().unwrap();
        let b: Rdata = (b"\x02ns\x04TEST\x00" as &[u8]).try_into().unwrap();
        assert!(a.equals(&b, Type::NS));
        assert!(!a.equals(&b, Type::TXT));
    }

    #[test]
    fn equals_keeps_numeric_fields_exact() {
        // MX preference 0x41 vs 0x61: differing only by what would be
        // an ASCII case change.
        let a: Rdata = (b"\x00\x41\x04mail\x04test\x00" as &[u8]).try_into().unwrap();
        let b: Rdata = (b"\x00\x61\x04mail\x04test\x00" as &[u8]).try_into().unwrap();
        assert!(!a.equals(&b, Type::MX));
    }

    #[test]
    fn additional_name_extraction_works() {
        let ns: Rdata = (b"\x02ns\x04test\x00" as &[u8]).try_into().unwrap();
        assert_eq!(
            ns.additional_name(Type::NS),
            Some("ns.test.".parse().unwrap())
        );

        let mx: Rdata = (b"\x00\x0a\x04mail\x04test\x00" as &[u8]).try_into().unwrap();
        assert_eq!(
            mx.additional_name(Type::MX),
            Some("mail.test.".parse().unwrap())
        );

        let a: Rdata = (b"\x0a\x00\x00\x01" as &[u8]).try_into().unwrap();
        assert_eq!(a.additional_name(Type::A), None);
    }

    #[test]
    fn soa_components_split_names_and_tail() {
        let soa: Rdata = (b"\x02ns\x04test\x00\x05admin\x04test\x00\
                            \x00\x00\x00\x01\x00\x00\x0e\x10\x00\x00\x03\x84\
                            \x00\x09\x3a\x80\x00\x00\x0e\x10" as &[u8])
            .try_into()
            .unwrap();
        let components = soa.components(Type::SOA).unwrap();
        assert_eq!(components.len(), 3);
        assert!(matches!(
            &components[0],
            Component::CompressibleName(name) if *name == "ns.test.".parse().unwrap()
        ));
        assert!(matches!(
            &components[2],
            Component::Other(octets) if octets.len() == 20
        ));
    }
}
