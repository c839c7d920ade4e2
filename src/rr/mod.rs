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

//! Data structures and routines for handling DNS resource records.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::class::Class;
use crate::name::Name;

pub mod rdata;
mod rr_type;
mod rrset;
mod ttl;
pub use rdata::Rdata;
pub use rr_type::Type;
pub use rrset::Rrset;
pub use ttl::Ttl;

////////////////////////////////////////////////////////////////////////
// RECORDS                                                            //
////////////////////////////////////////////////////////////////////////

/// A resource record: the `(owner, type, class, ttl, rdata)` envelope
/// of [RFC 1035 § 3.2.1].
///
/// Question entries are represented as records with a zero TTL and
/// empty RDATA (see [`Record::question`]).
///
/// [RFC 1035 § 3.2.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.2.1
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub owner: Name,
    pub rr_type: Type,
    pub class: Class,
    pub ttl: Ttl,
    pub rdata: Rdata,
}

impl Record {
    /// Creates a new record.
    pub fn new(owner: Name, rr_type: Type, class: Class, ttl: Ttl, rdata: Rdata) -> Self {
        Self {
            owner,
            rr_type,
            class,
            ttl,
            rdata,
        }
    }

    /// Creates a question entry: a record carrying only an owner, type,
    /// and class.
    pub fn question(owner: Name, rr_type: Type, class: Class) -> Self {
        Self {
            owner,
            rr_type,
            class,
            ttl: Ttl::from(0),
            rdata: Rdata::empty(),
        }
    }

    /// Returns the type under which this record groups into an RRset.
    /// For RRSIG and SIG records this is the type the signature covers;
    /// for everything else it is the record's own type.
    pub fn rrset_type(&self) -> Type {
        if self.rr_type == Type::RRSIG || self.rr_type == Type::SIG {
            if let Some(covered) = self.rdata.octets().get(0..2) {
                return Type::from(u16::from_be_bytes(covered.try_into().unwrap()));
            }
        }
        self.rr_type
    }

    /// Returns the domain name whose addresses should accompany this
    /// record in the ADDITIONAL section, if its type advertises one.
    pub fn additional_name(&self) -> Option<Name> {
        self.rdata.additional_name(self.rr_type)
    }

    /// Returns a copy of this record with a different owner name. Used
    /// to rewrite wildcard owners to the query name.
    pub fn with_owner(&self, owner: &Name) -> Record {
        Record {
            owner: owner.clone(),
            ..self.clone()
        }
    }

    /// Parses the RDATA as a single domain name. This is the shape of
    /// NS, CNAME, PTR, and DNAME records.
    pub fn single_name(&self) -> Option<Name> {
        Name::from_uncompressed_all(self.rdata.octets()).ok()
    }

    /// For an SOA record, returns the MINIMUM field ([RFC 2308]'s
    /// negative-caching TTL). Returns `None` if the RDATA does not have
    /// the shape of an SOA.
    ///
    /// [RFC 2308]: https://datatracker.ietf.org/doc/html/rfc2308
    pub fn soa_minimum(&self) -> Option<u32> {
        let octets = self.rdata.octets();
        let (_, mname_len) = Name::from_uncompressed(octets).ok()?;
        let (_, rname_len) = Name::from_uncompressed(&octets[mname_len..]).ok()?;
        let tail = octets.get(mname_len + rname_len..)?;
        if tail.len() != 20 {
            return None;
        }
        Some(u32::from_be_bytes(tail[16..20].try_into().unwrap()))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t",
            self.owner, self.ttl, self.class, self.rr_type
        )?;
        fmt_rdata(f, self.rr_type, &self.rdata)
    }
}

/// Writes RDATA in master-file text form for a few common types, and in
/// the RFC 3597 generic form for everything else.
fn fmt_rdata(f: &mut fmt::Formatter, rr_type: Type, rdata: &Rdata) -> fmt::Result {
    let octets = rdata.octets();
    match rr_type {
        Type::A if octets.len() == 4 => {
            let array: [u8; 4] = octets.try_into().unwrap();
            write!(f, "{}", Ipv4Addr::from(array))
        }
        Type::AAAA if octets.len() == 16 => {
            let array: [u8; 16] = octets.try_into().unwrap();
            write!(f, "{}", Ipv6Addr::from(array))
        }
        Type::NS | Type::CNAME | Type::PTR | Type::DNAME => {
            match Name::from_uncompressed_all(octets) {
                Ok(name) => write!(f, "{}", name),
                Err(_) => fmt_generic_rdata(f, octets),
            }
        }
        Type::MX if octets.len() > 2 => {
            let preference = u16::from_be_bytes(octets[0..2].try_into().unwrap());
            match Name::from_uncompressed_all(&octets[2..]) {
                Ok(name) => write!(f, "{} {}", preference, name),
                Err(_) => fmt_generic_rdata(f, octets),
            }
        }
        _ => fmt_generic_rdata(f, octets),
    }
}

/// Writes RDATA in the `\# <length> <hex>` form of [RFC 3597 § 5].
///
/// [RFC 3597 § 5]: https://datatracker.ietf.org/doc/html/rfc3597#section-5
fn fmt_generic_rdata(f: &mut fmt::Formatter, octets: &[u8]) -> fmt::Result {
    write!(f, "\\# {}", octets.len())?;
    if !octets.is_empty() {
        f.write_str(" ")?;
        for octet in octets {
            write!(f, "{:02x}", octet)?;
        }
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rrset_type_unwraps_rrsig_covered_type() {
        let mut sig_rdata = vec![0u8; 20];
        sig_rdata[0..2].copy_from_slice(&u16::from(Type::AAAA).to_be_bytes());
        let record = Record::new(
            "x.test.".parse().unwrap(),
            Type::RRSIG,
            Class::IN,
            Ttl::from(300),
            sig_rdata.try_into().unwrap(),
        );
        assert_eq!(record.rrset_type(), Type::AAAA);

        let plain = Record::question("x.test.".parse().unwrap(), Type::A, Class::IN);
        assert_eq!(plain.rrset_type(), Type::A);
    }

    #[test]
    fn soa_minimum_reads_the_last_field() {
        let rdata: Rdata = (b"\x02ns\x04test\x00\x05admin\x04test\x00\
                              \x00\x00\x00\x01\x00\x00\x0e\x10\x00\x00\x03\x84\
                              \x00\x09\x3a\x80\x00\x00\x0e\x10" as &[u8])
            .try_into()
            .unwrap();
        let record = Record::new(
            "test.".parse().unwrap(),
            Type::SOA,
            Class::IN,
            Ttl::from(3600),
            rdata,
        );
        assert_eq!(record.soa_minimum(), Some(3600));
    }

    #[test]
    fn display_formats_addresses() {
        let record = Record::new(
            "x.test.".parse().unwrap(),
            Type::A,
            Class::IN,
            Ttl::from(300),
            (b"\x0a\x00\x00\x01" as &[u8]).try_into().unwrap(),
        );
        assert_eq!(record.to_string(), "x.test.\t300\tIN\tA\t10.0.0.1");
    }
}
