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

//! Implementation of in-memory authoritative zone data.

use std::collections::BTreeMap;
use std::sync::Mutex;

use log::warn;

use crate::class::Class;
use crate::lookup::LookupResult;
use crate::name::Name;
use crate::rr::{Record, Rrset, Type};

mod error;
pub use error::Error;

/// A DNS zone held in memory.
///
/// A `Zone` maps each owner name within it to the RRsets at that name,
/// sorted in canonical name order. Construction enforces the structural
/// invariants of a served zone: the origin must own exactly one SOA
/// record and at least one NS record, and every record must belong to
/// the zone. [`Zone::lookup`] answers queries with delegation,
/// CNAME/DNAME, and wildcard processing per [RFC 1034 § 4.3.2] and
/// [RFC 4592]; [`Zone::axfr`] iterates the zone in transfer order.
///
/// All state sits behind a single mutex; readers serialize with
/// writers, and every result is an owned copy.
///
/// [RFC 1034 § 4.3.2]: https://datatracker.ietf.org/doc/html/rfc1034#section-4.3.2
/// [RFC 4592]: https://datatracker.ietf.org/doc/html/rfc4592
#[derive(Debug)]
pub struct Zone {
    origin: Name,
    class: Class,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    data: BTreeMap<Name, Vec<Rrset>>,
    has_wild: bool,
}

impl Zone {
    /// Creates a zone from a list of records.
    ///
    /// Records whose owner is outside the origin are skipped with a
    /// warning (master files routinely carry out-of-zone glue). An SOA
    /// record whose owner is not the origin is an error. After ingest,
    /// the origin must hold exactly one SOA record and at least one NS
    /// record.
    pub fn new(
        origin: Name,
        class: Class,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<Self, Error> {
        if !origin.is_absolute() {
            return Err(Error::Relative);
        }
        let zone = Self {
            origin,
            class,
            inner: Mutex::new(Inner {
                data: BTreeMap::new(),
                has_wild: false,
            }),
        };
        {
            let mut inner = zone.inner.lock().unwrap();
            for record in records {
                if record.rr_type == Type::SOA && record.owner != zone.origin {
                    return Err(Error::SoaOwnerMismatch);
                }
                if !record.owner.subdomain(&zone.origin) {
                    warn!(
                        "skipping out-of-zone record {} (zone {})",
                        record.owner, zone.origin
                    );
                    continue;
                }
                if record.class != zone.class {
                    return Err(Error::ClassMismatch);
                }
                add_record_locked(&mut inner, record);
            }
            validate(&inner, &zone.origin)?;
        }
        Ok(zone)
    }

    /// Returns the zone's origin.
    pub fn origin(&self) -> &Name {
        &self.origin
    }

    /// Returns the zone's class.
    pub fn class(&self) -> Class {
        self.class
    }

    /// Returns the zone's SOA record.
    pub fn soa(&self) -> Option<Record> {
        let inner = self.inner.lock().unwrap();
        find_set(&inner, &self.origin, Type::SOA).and_then(|set| set.records().next())
    }

    /// Returns the NS RRset at the zone's origin.
    pub fn ns(&self) -> Option<Rrset> {
        let inner = self.inner.lock().unwrap();
        find_set(&inner, &self.origin, Type::NS)
    }

    /// Looks up records in the zone. This walks from the origin toward
    /// the query name, surfacing delegations, CNAMEs, and DNAMEs, and
    /// falls back to wildcard synthesis.
    ///
    /// Wildcard matches return the wildcard-owned RRset; rewriting the
    /// owner to the query name is the caller's business, since the
    /// unchanged set is what goes into (for example) an AXFR stream.
    pub fn lookup(&self, qname: &Name, qtype: Type) -> LookupResult {
        let inner = self.inner.lock().unwrap();
        if !qname.subdomain(&self.origin) {
            return LookupResult::NxDomain;
        }

        let labels = qname.labels();
        let olabels = self.origin.labels();
        for tlabels in olabels..=labels {
            let is_origin = tlabels == olabels;
            let is_exact = tlabels == labels;
            let tname = if is_origin {
                self.origin.clone()
            } else if is_exact {
                qname.clone()
            } else {
                qname.superdomain(labels - tlabels).unwrap()
            };

            let sets = match inner.data.get(&tname) {
                Some(sets) => sets,
                None => continue,
            };

            // A non-origin node with an NS RRset is a zone cut, even
            // when it is the query name itself.
            if !is_origin {
                if let Some(ns) = sets.iter().find(|set| set.rr_type() == Type::NS) {
                    return LookupResult::Delegation(ns.clone());
                }
            }

            if is_exact && qtype == Type::ANY {
                return LookupResult::Success(sets.clone());
            }

            if is_exact {
                if let Some(set) = sets.iter().find(|set| set.rr_type() == qtype) {
                    return LookupResult::Success(vec![set.clone()]);
                }
                if let Some(cname) = sets.iter().find(|set| set.rr_type() == Type::CNAME) {
                    return LookupResult::CName(cname.clone());
                }
            } else if let Some(dname) = sets.iter().find(|set| set.rr_type() == Type::DNAME) {
                return LookupResult::DName(dname.clone());
            }

            if is_exact {
                return LookupResult::NxRrset;
            }
        }

        if inner.has_wild {
            for strip in 1..=labels - olabels {
                let tname = qname.wild(strip);
                let sets = match inner.data.get(&tname) {
                    Some(sets) => sets,
                    None => continue,
                };
                if let Some(set) = sets.iter().find(|set| set.rr_type() == qtype) {
                    return LookupResult::Success(vec![set.clone()]);
                }
            }
        }

        LookupResult::NxDomain
    }

    /// Looks up an RRset by exact name and type, with no delegation,
    /// CNAME, or wildcard processing.
    pub fn find_exact(&self, name: &Name, rr_type: Type) -> Option<Rrset> {
        find_set(&self.inner.lock().unwrap(), name, rr_type)
    }

    /// Adds a record to the zone.
    pub fn add_record(&self, record: Record) -> Result<(), Error> {
        if record.rr_type == Type::SOA && record.owner != self.origin {
            return Err(Error::SoaOwnerMismatch);
        }
        if !record.owner.subdomain(&self.origin) {
            return Err(Error::OutOfZone);
        }
        if record.class != self.class {
            return Err(Error::ClassMismatch);
        }
        add_record_locked(&mut self.inner.lock().unwrap(), record);
        Ok(())
    }

    /// Removes a record from the zone. The RRset (and the name, once
    /// empty) disappear with their last record.
    pub fn remove_record(&self, record: &Record) {
        let mut inner = self.inner.lock().unwrap();
        let mut drop_name = false;
        if let Some(sets) = inner.data.get_mut(&record.owner) {
            if let Some(index) = sets
                .iter()
                .position(|set| set.rr_type() == record.rrset_type())
            {
                let mut set = Rrset::new(
                    record.owner.clone(),
                    sets[index].rr_type(),
                    sets[index].class(),
                    sets[index].ttl(),
                );
                for rdata in sets[index].rdatas() {
                    if !rdata.equals(&record.rdata, record.rr_type) {
                        set.push_rdata(rdata.clone());
                    }
                }
                for sig in sets[index].sigs() {
                    set.push(sig.clone());
                }
                if set.is_empty() {
                    sets.remove(index);
                } else {
                    sets[index] = set;
                }
                drop_name = sets.is_empty();
            }
        }
        if drop_name {
            inner.data.remove(&record.owner);
        }
    }

    /// Returns an iterator over the zone in AXFR order: the SOA first,
    /// then the origin NS RRset, then everything else (in the map's
    /// canonical name order), and finally the SOA again.
    ///
    /// The set of names is snapshotted when the iterator is created,
    /// but the data for each name is fetched lazily. Mutating the zone
    /// concurrently is allowed; the iterator may then observe a mix of
    /// old and new data rather than one consistent view.
    pub fn axfr(&self) -> Axfr {
        let inner = self.inner.lock().unwrap();
        let names = inner
            .data
            .keys()
            .filter(|name| **name != self.origin)
            .cloned()
            .collect();
        let mut pending = Vec::new();
        if let Some(sets) = inner.data.get(&self.origin) {
            // SOA first, then NS, then the rest of the origin's sets.
            pending.extend(sets.iter().filter(|s| s.rr_type() == Type::SOA).cloned());
            pending.extend(sets.iter().filter(|s| s.rr_type() == Type::NS).cloned());
            pending.extend(
                sets.iter()
                    .filter(|s| s.rr_type() != Type::SOA && s.rr_type() != Type::NS)
                    .cloned(),
            );
        }
        pending.reverse();
        Axfr {
            zone: self,
            names,
            next_name: 0,
            pending,
            want_last_soa: true,
        }
    }
}

/// An iterator over a zone in AXFR order; see [`Zone::axfr`].
pub struct Axfr<'a> {
    zone: &'a Zone,
    names: Vec<Name>,
    next_name: usize,
    /// RRsets queued for delivery, in reverse order (popped from the
    /// back).
    pending: Vec<Rrset>,
    want_last_soa: bool,
}

impl Iterator for Axfr<'_> {
    type Item = Rrset;

    fn next(&mut self) -> Option<Rrset> {
        loop {
            if let Some(set) = self.pending.pop() {
                return Some(set);
            }
            if self.next_name < self.names.len() {
                let name = &self.names[self.next_name];
                self.next_name += 1;
                let inner = self.zone.inner.lock().unwrap();
                if let Some(sets) = inner.data.get(name) {
                    self.pending.extend(sets.iter().rev().cloned());
                }
                continue;
            }
            if self.want_last_soa {
                self.want_last_soa = false;
                let inner = self.zone.inner.lock().unwrap();
                return find_set(&inner, &self.zone.origin, Type::SOA);
            }
            return None;
        }
    }
}

////////////////////////////////////////////////////////////////////////
// LOCKED-STORE HELPERS                                               //
////////////////////////////////////////////////////////////////////////

fn find_set(inner: &Inner, name: &Name, rr_type: Type) -> Option<Rrset> {
    inner
        .data
        .get(name)?
        .iter()
        .find(|set| set.rr_type() == rr_type)
        .cloned()
}

fn add_record_locked(inner: &mut Inner, record: Record) {
    if record.owner.is_wildcard() {
        inner.has_wild = true;
    }
    let sets = inner.data.entry(record.owner.clone()).or_default();
    match sets
        .iter_mut()
        .find(|set| set.rr_type() == record.rrset_type())
    {
        Some(set) => set.push(record),
        None => sets.push(Rrset::from_record(record)),
    }
}

/// Checks the origin invariants after construction: exactly one SOA
/// record and at least one NS RRset.
fn validate(inner: &Inner, origin: &Name) -> Result<(), Error> {
    let soa = find_set(inner, origin, Type::SOA).ok_or(Error::NoSoa)?;
    if soa.len() != 1 {
        return Err(Error::MultipleSoa);
    }
    find_set(inner, origin, Type::NS).ok_or(Error::NoNs)?;
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rr::{Rdata, Ttl};

    fn name(text: &str) -> Name {
        text.parse().unwrap()
    }

    fn soa_record(owner: &str, serial: u32) -> Record {
        let mut rdata = Vec::new();
        rdata.extend_from_slice(name("ns.example.").wire_repr());
        rdata.extend_from_slice(name("admin.example.").wire_repr());
        rdata.extend_from_slice(&serial.to_be_bytes());
        rdata.extend_from_slice(&3600u32.to_be_bytes());
        rdata.extend_from_slice(&900u32.to_be_bytes());
        rdata.extend_from_slice(&604800u32.to_be_bytes());
        rdata.extend_from_slice(&1800u32.to_be_bytes());
        Record::new(
            name(owner),
            Type::SOA,
            Class::IN,
            Ttl::from(3600),
            rdata.try_into().unwrap(),
        )
    }

    fn ns_record(owner: &str, target: &str) -> Record {
        Record::new(
            name(owner),
            Type::NS,
            Class::IN,
            Ttl::from(3600),
            Rdata::from(&name(target)),
        )
    }

    fn a_record(owner: &str, address: [u8; 4]) -> Record {
        Record::new(
            name(owner),
            Type::A,
            Class::IN,
            Ttl::from(300),
            (&address[..]).try_into().unwrap(),
        )
    }

    fn single_name_record(owner: &str, rr_type: Type, target: &str) -> Record {
        Record::new(
            name(owner),
            rr_type,
            Class::IN,
            Ttl::from(300),
            Rdata::from(&name(target)),
        )
    }

    fn base_records() -> Vec<Record> {
        vec![
            soa_record("example.", 1),
            ns_record("example.", "ns.example."),
            a_record("ns.example.", [10, 0, 0, 53]),
        ]
    }

    fn base_zone(extra: Vec<Record>) -> Zone {
        let mut records = base_records();
        records.extend(extra);
        Zone::new(name("example."), Class::IN, records).unwrap()
    }

    #[test]
    fn construction_requires_soa() {
        let records = vec![ns_record("example.", "ns.example.")];
        assert_eq!(
            Zone::new(name("example."), Class::IN, records).unwrap_err(),
            Error::NoSoa
        );
    }

    #[test]
    fn construction_requires_single_soa() {
        let mut records = base_records();
        records.push(soa_record("example.", 2));
        assert_eq!(
            Zone::new(name("example."), Class::IN, records).unwrap_err(),
            Error::MultipleSoa
        );
    }

    #[test]
    fn construction_requires_ns() {
        let records = vec![soa_record("example.", 1)];
        assert_eq!(
            Zone::new(name("example."), Class::IN, records).unwrap_err(),
            Error::NoNs
        );
    }

    #[test]
    fn construction_rejects_soa_owner_mismatch() {
        let records = vec![soa_record("other.", 1)];
        assert_eq!(
            Zone::new(name("example."), Class::IN, records).unwrap_err(),
            Error::SoaOwnerMismatch
        );
    }

    #[test]
    fn construction_rejects_relative_origin() {
        assert_eq!(
            Zone::new(name("relative"), Class::IN, base_records()).unwrap_err(),
            Error::Relative
        );
    }

    #[test]
    fn construction_skips_out_of_zone_records() {
        let zone = base_zone(vec![a_record("stray.other.", [10, 9, 9, 9])]);
        assert!(zone.find_exact(&name("stray.other."), Type::A).is_none());
    }

    #[test]
    fn lookup_finds_exact_records() {
        let zone = base_zone(vec![a_record("www.example.", [10, 0, 0, 1])]);
        match zone.lookup(&name("www.example."), Type::A) {
            LookupResult::Success(sets) => {
                assert_eq!(sets.len(), 1);
                assert_eq!(sets[0].owner(), &name("www.example."));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn lookup_any_returns_all_sets() {
        let zone = base_zone(vec![]);
        match zone.lookup(&name("example."), Type::ANY) {
            LookupResult::Success(sets) => assert_eq!(sets.len(), 2),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn lookup_reports_missing_types_as_nxrrset() {
        let zone = base_zone(vec![a_record("www.example.", [10, 0, 0, 1])]);
        assert!(matches!(
            zone.lookup(&name("www.example."), Type::AAAA),
            LookupResult::NxRrset
        ));
    }

    #[test]
    fn lookup_reports_missing_names_as_nxdomain() {
        let zone = base_zone(vec![]);
        assert!(matches!(
            zone.lookup(&name("missing.example."), Type::A),
            LookupResult::NxDomain
        ));
    }

    #[test]
    fn lookup_outside_the_zone_is_nxdomain() {
        let zone = base_zone(vec![]);
        assert!(matches!(
            zone.lookup(&name("other.test."), Type::A),
            LookupResult::NxDomain
        ));
    }

    #[test]
    fn lookup_surfaces_cnames() {
        let zone = base_zone(vec![single_name_record(
            "alias.example.",
            Type::CNAME,
            "www.example.",
        )]);
        assert!(matches!(
            zone.lookup(&name("alias.example."), Type::A),
            LookupResult::CName(_)
        ));
        // Asking for the CNAME itself succeeds.
        assert!(matches!(
            zone.lookup(&name("alias.example."), Type::CNAME),
            LookupResult::Success(_)
        ));
    }

    #[test]
    fn lookup_surfaces_dnames_for_descendants_only() {
        let zone = base_zone(vec![single_name_record(
            "old.example.",
            Type::DNAME,
            "new.example.",
        )]);
        assert!(matches!(
            zone.lookup(&name("foo.old.example."), Type::A),
            LookupResult::DName(_)
        ));
        // At the owner itself, the DNAME does not redirect.
        assert!(matches!(
            zone.lookup(&name("old.example."), Type::A),
            LookupResult::NxRrset
        ));
    }

    #[test]
    fn lookup_returns_delegations_below_cuts() {
        let zone = base_zone(vec![
            ns_record("sub.example.", "ns.sub.example."),
            a_record("ns.sub.example.", [10, 0, 1, 53]),
        ]);
        for qname in ["sub.example.", "deep.sub.example.", "ns.sub.example."] {
            match zone.lookup(&name(qname), Type::A) {
                LookupResult::Delegation(ns) => {
                    assert_eq!(ns.owner(), &name("sub.example."));
                }
                other => panic!("expected delegation for {}, got {:?}", qname, other),
            }
        }
    }

    #[test]
    fn lookup_synthesizes_from_wildcards() {
        let zone = base_zone(vec![a_record("*.wild.example.", [10, 0, 0, 9])]);
        match zone.lookup(&name("x.wild.example."), Type::A) {
            LookupResult::Success(sets) => {
                // The wildcard set itself comes back; owner rewriting
                // happens in the responder.
                assert_eq!(sets[0].owner(), &name("*.wild.example."));
            }
            other => panic!("expected success, got {:?}", other),
        }
        // An existing name shadows the wildcard.
        assert!(matches!(
            zone.lookup(&name("*.wild.example."), Type::AAAA),
            LookupResult::NxRrset
        ));
    }

    #[test]
    fn wildcard_does_not_match_other_types() {
        let zone = base_zone(vec![a_record("*.wild.example.", [10, 0, 0, 9])]);
        assert!(matches!(
            zone.lookup(&name("x.wild.example."), Type::AAAA),
            LookupResult::NxDomain
        ));
    }

    #[test]
    fn axfr_yields_soa_first_and_last() {
        let zone = base_zone(vec![
            a_record("www.example.", [10, 0, 0, 1]),
            a_record("mail.example.", [10, 0, 0, 2]),
        ]);
        let sets: Vec<Rrset> = zone.axfr().collect();
        assert_eq!(sets.first().unwrap().rr_type(), Type::SOA);
        assert_eq!(sets.last().unwrap().rr_type(), Type::SOA);
        assert_eq!(sets[1].rr_type(), Type::NS);
        // SOA, NS, ns A, mail A, www A, SOA.
        assert_eq!(sets.len(), 6);
        // In between, names follow the canonical map order.
        assert_eq!(sets[2].owner(), &name("mail.example."));
    }

    #[test]
    fn axfr_snapshot_tolerates_concurrent_removal() {
        // The name list is snapshotted up front, but data is fetched
        // lazily; names removed mid-iteration are simply skipped. This
        // is an accepted weakness: the iterator is not a consistent
        // view of the zone.
        let zone = base_zone(vec![
            a_record("www.example.", [10, 0, 0, 1]),
            a_record("zz.example.", [10, 0, 0, 2]),
        ]);
        let mut iter = zone.axfr();
        assert_eq!(iter.next().unwrap().rr_type(), Type::SOA);
        zone.remove_record(&a_record("zz.example.", [10, 0, 0, 2]));
        let rest: Vec<Rrset> = iter.collect();
        assert!(rest.iter().all(|set| *set.owner() != name("zz.example.")));
        // The final SOA still arrives.
        assert_eq!(rest.last().unwrap().rr_type(), Type::SOA);
    }

    #[test]
    fn add_record_rejects_out_of_zone_owners() {
        let zone = base_zone(vec![]);
        assert_eq!(
            zone.add_record(a_record("stray.other.", [1, 1, 1, 1])),
            Err(Error::OutOfZone)
        );
    }

    #[test]
    fn remove_record_drops_empty_sets() {
        let zone = base_zone(vec![
            a_record("www.example.", [10, 0, 0, 1]),
            a_record("www.example.", [10, 0, 0, 2]),
        ]);
        zone.remove_record(&a_record("www.example.", [10, 0, 0, 1]));
        let set = zone.find_exact(&name("www.example."), Type::A).unwrap();
        assert_eq!(set.len(), 1);
        zone.remove_record(&a_record("www.example.", [10, 0, 0, 2]));
        assert!(zone.find_exact(&name("www.example."), Type::A).is_none());
    }
}
