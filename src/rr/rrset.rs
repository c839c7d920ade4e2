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

//! Implementation of the [`Rrset`] structure.

use std::fmt;

use crate::class::Class;
use crate::name::Name;

use super::{Rdata, Record, Ttl, Type};

////////////////////////////////////////////////////////////////////////
// RRSETS                                                             //
////////////////////////////////////////////////////////////////////////

/// A set of resource records sharing an owner, type, and class.
///
/// [RFC 2181 § 5] defines an RRset as the group of records with the
/// same name, class, and type, served together. The TTL of the set is
/// the minimum of the TTLs of the records added to it. RRSIG records
/// covering the set's type may be attached; they are kept on the side
/// and never mixed into the data records.
///
/// [RFC 2181 § 5]: https://datatracker.ietf.org/doc/html/rfc2181#section-5
#[derive(Clone, Debug)]
pub struct Rrset {
    owner: Name,
    rr_type: Type,
    class: Class,
    ttl: Ttl,
    rdatas: Vec<Rdata>,
    sigs: Vec<Record>,
}

impl Rrset {
    /// Creates a new, empty `Rrset` with the given owner, type, class,
    /// and TTL.
    pub fn new(owner: Name, rr_type: Type, class: Class, ttl: Ttl) -> Self {
        Self {
            owner,
            rr_type,
            class,
            ttl,
            rdatas: Vec::new(),
            sigs: Vec::new(),
        }
    }

    /// Creates a new `Rrset` seeded with a single record. If the record
    /// is an RRSIG, the set's type is the type the signature covers and
    /// the set starts out with no data records.
    pub fn from_record(record: Record) -> Self {
        let mut rrset = Self::new(
            record.owner.clone(),
            record.rrset_type(),
            record.class,
            record.ttl,
        );
        rrset.push(record);
        rrset
    }

    /// Adds a record to the set. RRSIG records covering the set's type
    /// go to the signature side-set; anything else joins the data
    /// records, unless equal RDATA is already present (following the
    /// behavior of other nameservers, duplicates are silently
    /// discarded). The set TTL drops to the new record's TTL if that is
    /// lower.
    pub fn push(&mut self, record: Record) {
        debug_assert!(record.owner == self.owner);
        debug_assert!(record.rrset_type() == self.rr_type);
        if record.rr_type == Type::RRSIG || record.rr_type == Type::SIG {
            self.sigs.push(record);
            return;
        }
        self.ttl = self.ttl.min(record.ttl);
        self.push_rdata(record.rdata);
    }

    /// Adds bare RDATA to the set, discarding duplicates. The set TTL
    /// is unchanged.
    pub fn push_rdata(&mut self, rdata: Rdata) {
        if !self
            .rdatas
            .iter()
            .any(|existing| existing.equals(&rdata, self.rr_type))
        {
            self.rdatas.push(rdata);
        }
    }

    /// Merges the data records of `other` into this set, discarding
    /// duplicates.
    pub fn merge_from(&mut self, other: &Rrset) {
        for rdata in other.rdatas() {
            self.push_rdata(rdata.clone());
        }
    }

    /// Returns the owner name of the set.
    pub fn owner(&self) -> &Name {
        &self.owner
    }

    /// Returns the RR type of the set.
    pub fn rr_type(&self) -> Type {
        self.rr_type
    }

    /// Returns the class of the set.
    pub fn class(&self) -> Class {
        self.class
    }

    /// Returns the TTL of the set.
    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    /// Returns the RDATAs of the set's data records.
    pub fn rdatas(&self) -> &[Rdata] {
        &self.rdatas
    }

    /// Returns the first RDATA, if any.
    pub fn first(&self) -> Option<&Rdata> {
        self.rdatas.first()
    }

    /// Returns the RRSIG records attached to the set.
    pub fn sigs(&self) -> &[Record] {
        &self.sigs
    }

    /// Returns the number of data records in the set.
    pub fn len(&self) -> usize {
        self.rdatas.len()
    }

    /// Returns whether the set has no data records.
    pub fn is_empty(&self) -> bool {
        self.rdatas.is_empty()
    }

    /// Returns an iterator over the set's data records, materialized
    /// with the set's owner, class, and TTL.
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.rdatas.iter().map(|rdata| Record {
            owner: self.owner.clone(),
            rr_type: self.rr_type,
            class: self.class,
            ttl: self.ttl,
            rdata: rdata.clone(),
        })
    }
}

impl fmt::Display for Rrset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} <{} records>",
            self.owner,
            self.ttl,
            self.class,
            self.rr_type,
            self.rdatas.len(),
        )
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
