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

//! A credibility-aware, TTL-expiring cache of resource record sets.
//!
//! The cache maps each owner name to the set of things known about it:
//! positive RRsets and negative ("this does not exist") entries, each
//! stamped with a [`Credibility`] and an absolute expiry time. More
//! credible data replaces less credible data and is never displaced by
//! it. Negative answers are cached per [RFC 2308]: an NXDOMAIN entry is
//! recorded under the pseudo-type 0, an NXRRSET entry under the type
//! that was found missing.
//!
//! The store is bounded: names are kept in strict least-recently-used
//! order, where every lookup or insert marks a name as most recently
//! used, and inserting over capacity evicts the least recently used
//! name. All public operations take the cache's single mutex for their
//! entire duration; since lookups update the LRU order and purge
//! expired entries, reads are writers too.
//!
//! [RFC 2308]: https://datatracker.ietf.org/doc/html/rfc2308

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lru::LruCache;

use crate::class::Class;
use crate::lookup::LookupResult;
use crate::message::{Flag, Message, Rcode, Section};
use crate::name::Name;
use crate::rr::{Record, Rrset, Type};

////////////////////////////////////////////////////////////////////////
// CREDIBILITY                                                        //
////////////////////////////////////////////////////////////////////////

/// The trust rank of cached data, based on where it came from.
///
/// The variants form a total order: data with higher credibility
/// replaces data with lower credibility, never the other way around.
/// Lookups specify the minimum credibility they will accept; most
/// callers should use [`Credibility::Normal`], or [`Credibility::Any`]
/// when glue is acceptable.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Credibility {
    /// A hint or cache file on disk.
    Hint,

    /// Data not required to be credible.
    Any,

    /// Glue from the additional section of a response.
    Glue,

    /// Credible data.
    Normal,

    /// More credible data.
    Auth,

    /// Data from a locally served zone.
    Zone,
}

impl Credibility {
    /// The additional section of a response.
    pub const ADDITIONAL: Credibility = Credibility::Glue;

    /// The answer section of a nonauthoritative response.
    pub const NONAUTH_ANSWER: Credibility = Credibility::Normal;

    /// The authority section of a nonauthoritative response.
    pub const NONAUTH_AUTHORITY: Credibility = Credibility::Normal;

    /// The answer section of an authoritative response.
    pub const AUTH_ANSWER: Credibility = Credibility::Auth;

    /// The authority section of an authoritative response.
    pub const AUTH_AUTHORITY: Credibility = Credibility::Auth;
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION                                                      //
////////////////////////////////////////////////////////////////////////

/// Configuration for a [`Cache`], passed in at construction. There is
/// no process-wide option table; each cache carries its own settings.
#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
    /// The maximum number of names held. An entry consists of all
    /// records cached for one name; inserting beyond this evicts the
    /// least recently used name.
    pub max_entries: usize,

    /// A clamp on positive TTLs, in seconds. `None` means unlimited.
    pub max_ttl: Option<u32>,

    /// A clamp on negative TTLs, in seconds. `None` means unlimited.
    pub max_ncache: Option<u32>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 50_000,
            max_ttl: None,
            max_ncache: None,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// CACHE ENTRIES                                                      //
////////////////////////////////////////////////////////////////////////

/// The pseudo-type under which NXDOMAIN entries are stored.
const NXDOMAIN_TYPE: u16 = 0;

/// One cached fact about a name: either a positive RRset or a negative
/// entry. At most one element exists per (name, type).
#[derive(Clone, Debug)]
enum Element {
    Positive {
        rrset: Rrset,
        cred: Credibility,
        expire: u32,
    },
    Negative {
        owner: Name,
        nxtype: Type,
        cred: Credibility,
        expire: u32,
    },
}

impl Element {
    fn element_type(&self) -> Type {
        match self {
            Self::Positive { rrset, .. } => rrset.rr_type(),
            Self::Negative { nxtype, .. } => *nxtype,
        }
    }

    fn cred(&self) -> Credibility {
        match self {
            Self::Positive { cred, .. } | Self::Negative { cred, .. } => *cred,
        }
    }

    fn expired(&self, now: u32) -> bool {
        let expire = match self {
            Self::Positive { expire, .. } | Self::Negative { expire, .. } => *expire,
        };
        now >= expire
    }
}

/// Computes an absolute expiry from a TTL and an optional clamp.
fn limit_expire(ttl: u32, clamp: Option<u32>, now: u32) -> u32 {
    let ttl = match clamp {
        Some(max) if max < ttl => max,
        _ => ttl,
    };
    now.saturating_add(ttl)
}

/// Returns the current Unix time in seconds.
fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0) as u32
}

type Store = LruCache<Name, Vec<Element>>;

////////////////////////////////////////////////////////////////////////
// THE CACHE                                                          //
////////////////////////////////////////////////////////////////////////

/// A cache of DNS records.
///
/// See the [module documentation](self) for an overview.
pub struct Cache {
    class: Class,
    config: CacheConfig,
    data: Mutex<Store>,
}

impl Cache {
    /// Creates an empty cache for the given class with default
    /// configuration.
    pub fn new(class: Class) -> Self {
        Self::with_config(class, CacheConfig::default())
    }

    /// Creates an empty cache with the given configuration.
    pub fn with_config(class: Class, config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries)
            .unwrap_or_else(|| NonZeroUsize::new(1).unwrap());
        Self {
            class,
            config,
            data: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the class of this cache.
    pub fn class(&self) -> Class {
        self.class
    }

    /// Returns the cache's configuration.
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Returns the number of names currently held.
    pub fn size(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    /// Empties the cache.
    pub fn clear(&self) {
        self.data.lock().unwrap().clear();
    }

    /// Adds an RRset to the cache with the given credibility.
    ///
    /// An existing entry of strictly greater credibility is left
    /// untouched. An existing positive entry of equal credibility has
    /// the new records merged into it (keeping its expiry); an entry of
    /// lower credibility is replaced. An RRset with TTL zero deletes
    /// the entry instead, provided the existing entry's credibility is
    /// not strictly greater.
    pub fn add_rrset(&self, rrset: &Rrset, cred: Credibility) {
        self.add_rrset_at(rrset, cred, unix_now());
    }

    fn add_rrset_at(&self, rrset: &Rrset, cred: Credibility, now: u32) {
        let mut data = self.data.lock().unwrap();
        let name = rrset.owner();
        let rr_type = rrset.rr_type();
        let ttl = rrset.ttl().as_secs();
        let existing = find_element(&mut data, name, rr_type, Credibility::Hint, now);

        if ttl == 0 {
            if existing.map_or(false, |element| element.cred() <= cred) {
                remove_element(&mut data, name, rr_type);
            }
            return;
        }

        match existing {
            Some(element) if element.cred() > cred => (),
            Some(Element::Positive {
                cred: existing_cred,
                ..
            }) if existing_cred == cred => {
                // Merge into the stored set. The stored expiry stands.
                if let Some(elements) = data.get_mut(name) {
                    for element in elements.iter_mut() {
                        if let Element::Positive { rrset: stored, .. } = element {
                            if stored.rr_type() == rr_type {
                                stored.merge_from(rrset);
                                break;
                            }
                        }
                    }
                }
            }
            _ => {
                let expire = limit_expire(ttl, self.config.max_ttl, now);
                add_element(
                    &mut data,
                    name,
                    Element::Positive {
                        rrset: rrset.clone(),
                        cred,
                        expire,
                    },
                );
            }
        }
    }

    /// Adds a single record to the cache; equivalent to
    /// [`Cache::add_rrset`] with a singleton set.
    pub fn add_record(&self, record: &Record, cred: Credibility) {
        if !record.rrset_type().is_data() {
            return;
        }
        self.add_rrset(&Rrset::from_record(record.clone()), cred);
    }

    /// Adds a negative entry to the cache. A `rr_type` of 0 records an
    /// NXDOMAIN for the whole name; any other type records an NXRRSET
    /// for that type. The negative TTL is the lesser of the SOA
    /// record's TTL and its MINIMUM field ([RFC 2308 § 5]), or zero
    /// (meaning deletion) if no SOA is supplied.
    ///
    /// [RFC 2308 § 5]: https://datatracker.ietf.org/doc/html/rfc2308#section-5
    pub fn add_negative(
        &self,
        name: &Name,
        rr_type: Type,
        soa: Option<&Record>,
        cred: Credibility,
    ) {
        self.add_negative_at(name, rr_type, soa, cred, unix_now());
    }

    fn add_negative_at(
        &self,
        name: &Name,
        rr_type: Type,
        soa: Option<&Record>,
        cred: Credibility,
        now: u32,
    ) {
        let mut data = self.data.lock().unwrap();
        let ttl = soa
            .map(|record| {
                record
                    .ttl
                    .as_secs()
                    .min(record.soa_minimum().unwrap_or(0))
            })
            .unwrap_or(0);
        let existing = find_element(&mut data, name, rr_type, Credibility::Hint, now);

        if ttl == 0 {
            if existing.map_or(false, |element| element.cred() <= cred) {
                remove_element(&mut data, name, rr_type);
            }
            return;
        }

        if existing.map_or(true, |element| element.cred() <= cred) {
            let expire = limit_expire(ttl, self.config.max_ncache, now);
            add_element(
                &mut data,
                name,
                Element::Negative {
                    owner: name.clone(),
                    nxtype: rr_type,
                    cred,
                    expire,
                },
            );
        }
    }

    /// Looks up records in the cache, walking from the query name
    /// toward the root.
    ///
    /// At the query name itself this finds positive answers, NXRRSET
    /// and NXDOMAIN entries, and CNAMEs; at ancestors it finds DNAME
    /// redirections and delegations. The first conclusive result wins.
    /// Expired entries touched by the walk are removed and treated as
    /// absent; an expired entry is never returned.
    pub fn lookup(&self, qname: &Name, qtype: Type, min_cred: Credibility) -> LookupResult {
        self.lookup_at(qname, qtype, min_cred, unix_now())
    }

    fn lookup_at(
        &self,
        qname: &Name,
        qtype: Type,
        min_cred: Credibility,
        now: u32,
    ) -> LookupResult {
        let mut data = self.data.lock().unwrap();
        let labels = qname.labels();

        for tlabels in (1..=labels).rev() {
            let is_exact = tlabels == labels;
            let tname = if is_exact {
                qname.clone()
            } else if tlabels == 1 {
                Name::root().clone()
            } else {
                qname.superdomain(labels - tlabels).unwrap()
            };

            if !data.contains(&tname) {
                continue;
            }

            if is_exact && qtype == Type::ANY {
                let results = collect_positive(&mut data, &tname, min_cred, now);
                if !results.is_empty() {
                    return LookupResult::Success(results);
                }
            } else if is_exact {
                match find_element(&mut data, &tname, qtype, min_cred, now) {
                    Some(Element::Positive { rrset, .. }) => {
                        return LookupResult::Success(vec![rrset]);
                    }
                    Some(Element::Negative { .. }) => return LookupResult::NxRrset,
                    None => {
                        if let Some(Element::Positive { rrset, .. }) =
                            find_element(&mut data, &tname, Type::CNAME, min_cred, now)
                        {
                            return LookupResult::CName(rrset);
                        }
                    }
                }
            } else if let Some(Element::Positive { rrset, .. }) =
                find_element(&mut data, &tname, Type::DNAME, min_cred, now)
            {
                return LookupResult::DName(rrset);
            }

            if let Some(Element::Positive { rrset, .. }) =
                find_element(&mut data, &tname, Type::NS, min_cred, now)
            {
                return LookupResult::Delegation(rrset);
            }

            if is_exact {
                if let Some(Element::Negative { .. }) =
                    find_element(&mut data, &tname, Type::from(NXDOMAIN_TYPE), min_cred, now)
                {
                    return LookupResult::NxDomain;
                }
            }
        }

        LookupResult::Unknown
    }

    /// Ingests every RRset of a response message, each with the
    /// credibility its section and the AA flag call for.
    ///
    /// The CNAME/DNAME chain in the answer section is followed to
    /// establish the final name of the query, under which a negative
    /// response is recorded. Additional-section address records are
    /// admitted only if an earlier record marked their owner as needing
    /// glue. Returns what a cache lookup for the question would now
    /// produce, or `None` if nothing useful could be cached.
    pub fn add_message(&self, message: &Message) -> Option<LookupResult> {
        let rcode = message.rcode();
        if rcode != Rcode::NoError && rcode != Rcode::NxDomain {
            return None;
        }
        let question = message.question()?;
        let is_auth = message.flag(Flag::Aa);
        let qname = question.owner.clone();
        let qtype = question.rr_type;
        let qclass = question.class;

        let mut curname = qname.clone();
        let mut additional_names: HashSet<Name> = HashSet::new();
        let mut completed = false;
        let mut response: Option<LookupResult> = None;

        let answer_cred = if is_auth {
            Credibility::AUTH_ANSWER
        } else {
            Credibility::NONAUTH_ANSWER
        };
        for answer in &message.section_rrsets(Section::Answer) {
            if answer.class() != qclass {
                continue;
            }
            let rtype = answer.rr_type();
            let name = answer.owner();
            if (rtype == qtype || qtype == Type::ANY) && *name == curname {
                self.add_rrset(answer, answer_cred);
                completed = true;
                if curname == qname && response.is_none() {
                    response = Some(LookupResult::Success(vec![answer.clone()]));
                }
                mark_additional(answer, &mut additional_names);
            } else if rtype == Type::CNAME && *name == curname {
                self.add_rrset(answer, answer_cred);
                if curname == qname {
                    response = Some(LookupResult::CName(answer.clone()));
                }
                match answer
                    .first()
                    .and_then(|rdata| Name::from_uncompressed_all(rdata.octets()).ok())
                {
                    Some(target) => curname = target,
                    None => break,
                }
            } else if rtype == Type::DNAME && curname.subdomain(name) {
                self.add_rrset(answer, answer_cred);
                if curname == qname {
                    response = Some(LookupResult::DName(answer.clone()));
                }
                let owner = name.clone();
                let target = answer
                    .first()
                    .and_then(|rdata| Name::from_uncompressed_all(rdata.octets()).ok());
                match target.and_then(|target| curname.from_dname(&owner, &target).ok().flatten())
                {
                    Some(next) => curname = next,
                    None => break,
                }
            }
        }

        let authority_cred = if is_auth {
            Credibility::AUTH_AUTHORITY
        } else {
            Credibility::NONAUTH_AUTHORITY
        };
        let authority = message.section_rrsets(Section::Authority);
        let soa = authority
            .iter()
            .find(|set| set.rr_type() == Type::SOA && curname.subdomain(set.owner()));
        let ns = authority
            .iter()
            .find(|set| set.rr_type() == Type::NS && curname.subdomain(set.owner()));

        if !completed {
            // A negative response or a referral.
            let cachetype = if rcode == Rcode::NxDomain {
                Type::from(NXDOMAIN_TYPE)
            } else {
                qtype
            };
            if rcode == Rcode::NxDomain || soa.is_some() || ns.is_none() {
                let soa_record = soa.and_then(|set| set.records().next());
                self.add_negative(&curname, cachetype, soa_record.as_ref(), authority_cred);
                if response.is_none() {
                    response = Some(if rcode == Rcode::NxDomain {
                        LookupResult::NxDomain
                    } else {
                        LookupResult::NxRrset
                    });
                }
            } else if let Some(ns) = ns {
                self.add_rrset(ns, authority_cred);
                mark_additional(ns, &mut additional_names);
                if response.is_none() {
                    response = Some(LookupResult::Delegation(ns.clone()));
                }
            }
        } else if rcode == Rcode::NoError {
            // Cache the NS set accompanying a positive response.
            if let Some(ns) = ns {
                self.add_rrset(ns, authority_cred);
                mark_additional(ns, &mut additional_names);
            }
        }

        for set in message.section_rrsets(Section::Additional) {
            let rtype = set.rr_type();
            if (rtype == Type::A || rtype == Type::AAAA)
                && additional_names.contains(set.owner())
            {
                self.add_rrset(&set, Credibility::ADDITIONAL);
            }
        }

        response
    }

    /// Flushes the entry for one (name, type).
    pub fn flush_set(&self, name: &Name, rr_type: Type) {
        remove_element(&mut self.data.lock().unwrap(), name, rr_type);
    }

    /// Flushes everything cached for a name.
    pub fn flush_name(&self, name: &Name) {
        self.data.lock().unwrap().pop(name);
    }
}

/// Marks the additional names advertised by an RRset's records as
/// acceptable glue.
fn mark_additional(rrset: &Rrset, names: &mut HashSet<Name>) {
    for rdata in rrset.rdatas() {
        if let Some(name) = rdata.additional_name(rrset.rr_type()) {
            names.insert(name);
        }
    }
}

////////////////////////////////////////////////////////////////////////
// LOCKED-STORE HELPERS                                               //
////////////////////////////////////////////////////////////////////////

/// Finds the element of the given type at a name, removing it instead
/// if it has expired and filtering it out if it is below the minimum
/// credibility. The access marks the name as most recently used.
fn find_element(
    data: &mut Store,
    name: &Name,
    rr_type: Type,
    min_cred: Credibility,
    now: u32,
) -> Option<Element> {
    let mut drop_name = false;
    let mut found = None;
    if let Some(elements) = data.get_mut(name) {
        if let Some(index) = elements
            .iter()
            .position(|element| element.element_type() == rr_type)
        {
            if elements[index].expired(now) {
                elements.remove(index);
                drop_name = elements.is_empty();
            } else if elements[index].cred() >= min_cred {
                found = Some(elements[index].clone());
            }
        }
    }
    if drop_name {
        data.pop(name);
    }
    found
}

/// Collects every unexpired positive RRset at a name that meets the
/// minimum credibility, removing expired elements along the way.
fn collect_positive(data: &mut Store, name: &Name, min_cred: Credibility, now: u32) -> Vec<Rrset> {
    let mut drop_name = false;
    let mut results = Vec::new();
    if let Some(elements) = data.get_mut(name) {
        elements.retain(|element| !element.expired(now));
        for element in elements.iter() {
            if let Element::Positive { rrset, cred, .. } = element {
                if *cred >= min_cred {
                    results.push(rrset.clone());
                }
            }
        }
        drop_name = elements.is_empty();
    }
    if drop_name {
        data.pop(name);
    }
    results
}

/// Stores an element at a name, replacing any element of the same type.
/// Inserting a new name over capacity evicts the least recently used
/// name.
fn add_element(data: &mut Store, name: &Name, element: Element) {
    if let Some(elements) = data.get_mut(name) {
        let rr_type = element.element_type();
        if let Some(index) = elements
            .iter()
            .position(|existing| existing.element_type() == rr_type)
        {
            elements[index] = element;
        } else {
            elements.push(element);
        }
    } else {
        data.put(name.clone(), vec![element]);
    }
}

/// Removes the element of the given type at a name, dropping the name
/// entirely once nothing is left.
fn remove_element(data: &mut Store, name: &Name, rr_type: Type) {
    let mut drop_name = false;
    if let Some(elements) = data.get_mut(name) {
        elements.retain(|element| element.element_type() != rr_type);
        drop_name = elements.is_empty();
    }
    if drop_name {
        data.pop(name);
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rr::{Rdata, Ttl};

    fn a_rrset(owner: &str, ttl: u32, addresses: &[[u8; 4]]) -> Rrset {
        let mut rrset = Rrset::new(
            owner.parse().unwrap(),
            Type::A,
            Class::IN,
            Ttl::from(ttl),
        );
        for address in addresses {
            rrset.push_rdata((&address[..]).try_into().unwrap());
        }
        rrset
    }

    fn ns_rrset(owner: &str, target: &str) -> Rrset {
        let mut rrset = Rrset::new(
            owner.parse().unwrap(),
            Type::NS,
            Class::IN,
            Ttl::from(3600),
        );
        let target: Name = target.parse().unwrap();
        rrset.push_rdata(Rdata::from(&target));
        rrset
    }

    fn soa_record(owner: &str, ttl: u32, minimum: u32) -> Record {
        let mut rdata = Vec::new();
        let mname: Name = "ns.test.".parse().unwrap();
        let rname: Name = "admin.test.".parse().unwrap();
        rdata.extend_from_slice(mname.wire_repr());
        rdata.extend_from_slice(rname.wire_repr());
        rdata.extend_from_slice(&1u32.to_be_bytes());
        rdata.extend_from_slice(&3600u32.to_be_bytes());
        rdata.extend_from_slice(&900u32.to_be_bytes());
        rdata.extend_from_slice(&604800u32.to_be_bytes());
        rdata.extend_from_slice(&minimum.to_be_bytes());
        Record::new(
            owner.parse().unwrap(),
            Type::SOA,
            Class::IN,
            Ttl::from(ttl),
            rdata.try_into().unwrap(),
        )
    }

    fn name(text: &str) -> Name {
        text.parse().unwrap()
    }

    #[test]
    fn add_then_lookup_finds_the_set() {
        let cache = Cache::new(Class::IN);
        let rrset = a_rrset("x.test.", 300, &[[1, 2, 3, 4]]);
        cache.add_rrset(&rrset, Credibility::Auth);
        match cache.lookup(&name("x.test."), Type::A, Credibility::Normal) {
            LookupResult::Success(sets) => {
                assert_eq!(sets.len(), 1);
                assert_eq!(sets[0].rdatas(), rrset.rdatas());
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn lookup_honors_minimum_credibility() {
        let cache = Cache::new(Class::IN);
        cache.add_rrset(&a_rrset("x.test.", 300, &[[1, 2, 3, 4]]), Credibility::Glue);
        assert!(matches!(
            cache.lookup(&name("x.test."), Type::A, Credibility::Normal),
            LookupResult::Unknown
        ));
        assert!(cache
            .lookup(&name("x.test."), Type::A, Credibility::Any)
            .is_success());
    }

    #[test]
    fn higher_credibility_replaces_lower() {
        let cache = Cache::new(Class::IN);
        cache.add_rrset(&a_rrset("x.test.", 300, &[[1, 2, 3, 4]]), Credibility::Glue);
        cache.add_rrset(
            &a_rrset("x.test.", 300, &[[5, 6, 7, 8]]),
            Credibility::AUTH_ANSWER,
        );
        match cache.lookup(&name("x.test."), Type::A, Credibility::Normal) {
            LookupResult::Success(sets) => {
                assert_eq!(sets[0].rdatas().len(), 1);
                assert_eq!(sets[0].rdatas()[0].octets(), &[5, 6, 7, 8]);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn lower_credibility_does_not_replace_higher() {
        let cache = Cache::new(Class::IN);
        cache.add_rrset(&a_rrset("x.test.", 300, &[[1, 2, 3, 4]]), Credibility::Auth);
        cache.add_rrset(&a_rrset("x.test.", 300, &[[5, 6, 7, 8]]), Credibility::Glue);
        match cache.lookup(&name("x.test."), Type::A, Credibility::Any) {
            LookupResult::Success(sets) => {
                assert_eq!(sets[0].rdatas()[0].octets(), &[1, 2, 3, 4]);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn equal_credibility_merges() {
        let cache = Cache::new(Class::IN);
        cache.add_rrset(&a_rrset("x.test.", 300, &[[1, 2, 3, 4]]), Credibility::Auth);
        cache.add_rrset(&a_rrset("x.test.", 300, &[[5, 6, 7, 8]]), Credibility::Auth);
        match cache.lookup(&name("x.test."), Type::A, Credibility::Normal) {
            LookupResult::Success(sets) => assert_eq!(sets[0].rdatas().len(), 2),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn zero_ttl_deletes_unless_existing_is_more_credible() {
        let cache = Cache::new(Class::IN);
        cache.add_rrset(&a_rrset("x.test.", 300, &[[1, 2, 3, 4]]), Credibility::Normal);
        cache.add_rrset(&a_rrset("x.test.", 0, &[[1, 2, 3, 4]]), Credibility::Auth);
        assert!(matches!(
            cache.lookup(&name("x.test."), Type::A, Credibility::Any),
            LookupResult::Unknown
        ));

        cache.add_rrset(&a_rrset("x.test.", 300, &[[1, 2, 3, 4]]), Credibility::Auth);
        cache.add_rrset(&a_rrset("x.test.", 0, &[[1, 2, 3, 4]]), Credibility::Glue);
        assert!(cache
            .lookup(&name("x.test."), Type::A, Credibility::Any)
            .is_success());
    }

    #[test]
    fn expired_entries_vanish() {
        let cache = Cache::new(Class::IN);
        let now = 1_000_000;
        cache.add_rrset_at(&a_rrset("x.test.", 60, &[[1, 2, 3, 4]]), Credibility::Auth, now);
        assert!(cache
            .lookup_at(&name("x.test."), Type::A, Credibility::Normal, now + 59)
            .is_success());
        assert!(matches!(
            cache.lookup_at(&name("x.test."), Type::A, Credibility::Normal, now + 60),
            LookupResult::Unknown
        ));
        // The touch also removed the entry.
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn max_ttl_clamps_positive_entries() {
        let cache = Cache::with_config(
            Class::IN,
            CacheConfig {
                max_ttl: Some(30),
                ..Default::default()
            },
        );
        let now = 1_000_000;
        cache.add_rrset_at(&a_rrset("x.test.", 300, &[[1, 2, 3, 4]]), Credibility::Auth, now);
        assert!(matches!(
            cache.lookup_at(&name("x.test."), Type::A, Credibility::Normal, now + 31),
            LookupResult::Unknown
        ));
    }

    #[test]
    fn negative_entries_answer_nxdomain_until_expiry() {
        let cache = Cache::new(Class::IN);
        let now = 1_000_000;
        let soa = soa_record("test.", 3600, 900);
        cache.add_negative_at(
            &name("bogus.test."),
            Type::from(NXDOMAIN_TYPE),
            Some(&soa),
            Credibility::Auth,
            now,
        );
        assert!(matches!(
            cache.lookup_at(&name("bogus.test."), Type::A, Credibility::Normal, now + 899),
            LookupResult::NxDomain
        ));
        assert!(matches!(
            cache.lookup_at(&name("bogus.test."), Type::A, Credibility::Normal, now + 900),
            LookupResult::Unknown
        ));
    }

    #[test]
    fn nxrrset_entries_are_per_type() {
        let cache = Cache::new(Class::IN);
        let soa = soa_record("test.", 3600, 900);
        cache.add_negative(&name("x.test."), Type::AAAA, Some(&soa), Credibility::Auth);
        cache.add_rrset(&a_rrset("x.test.", 300, &[[1, 2, 3, 4]]), Credibility::Auth);
        assert!(matches!(
            cache.lookup(&name("x.test."), Type::AAAA, Credibility::Normal),
            LookupResult::NxRrset
        ));
        assert!(cache
            .lookup(&name("x.test."), Type::A, Credibility::Normal)
            .is_success());
    }

    #[test]
    fn delegations_surface_from_ancestors() {
        let cache = Cache::new(Class::IN);
        cache.add_rrset(&ns_rrset("sub.test.", "ns.sub.test."), Credibility::Normal);
        match cache.lookup(&name("deep.down.sub.test."), Type::A, Credibility::Normal) {
            LookupResult::Delegation(rrset) => {
                assert_eq!(rrset.owner(), &name("sub.test."));
            }
            other => panic!("expected delegation, got {:?}", other),
        }
    }

    #[test]
    fn dnames_surface_from_ancestors() {
        let cache = Cache::new(Class::IN);
        let mut dname = Rrset::new(name("old.test."), Type::DNAME, Class::IN, Ttl::from(300));
        let target: Name = name("new.test.");
        dname.push_rdata(Rdata::from(&target));
        cache.add_rrset(&dname, Credibility::Auth);
        assert!(matches!(
            cache.lookup(&name("foo.old.test."), Type::A, Credibility::Normal),
            LookupResult::DName(_)
        ));
        // At the DNAME owner itself the redirection does not apply.
        assert!(matches!(
            cache.lookup(&name("old.test."), Type::A, Credibility::Normal),
            LookupResult::Unknown
        ));
    }

    #[test]
    fn cname_is_found_for_other_types() {
        let cache = Cache::new(Class::IN);
        let mut cname = Rrset::new(name("a.test."), Type::CNAME, Class::IN, Ttl::from(300));
        let target: Name = name("b.test.");
        cname.push_rdata(Rdata::from(&target));
        cache.add_rrset(&cname, Credibility::Auth);
        assert!(matches!(
            cache.lookup(&name("a.test."), Type::A, Credibility::Normal),
            LookupResult::CName(_)
        ));
    }

    #[test]
    fn any_lookup_collects_everything_credible() {
        let cache = Cache::new(Class::IN);
        cache.add_rrset(&a_rrset("x.test.", 300, &[[1, 2, 3, 4]]), Credibility::Auth);
        let mut txt = Rrset::new(name("x.test."), Type::TXT, Class::IN, Ttl::from(300));
        txt.push_rdata((b"\x05hello" as &[u8]).try_into().unwrap());
        cache.add_rrset(&txt, Credibility::Auth);
        match cache.lookup(&name("x.test."), Type::ANY, Credibility::Normal) {
            LookupResult::Success(sets) => assert_eq!(sets.len(), 2),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn lru_eviction_is_strict() {
        let cache = Cache::with_config(
            Class::IN,
            CacheConfig {
                max_entries: 2,
                ..Default::default()
            },
        );
        cache.add_rrset(&a_rrset("a.test.", 300, &[[1, 0, 0, 1]]), Credibility::Auth);
        cache.add_rrset(&a_rrset("b.test.", 300, &[[1, 0, 0, 2]]), Credibility::Auth);
        cache.add_rrset(&a_rrset("c.test.", 300, &[[1, 0, 0, 3]]), Credibility::Auth);
        // a was evicted when c arrived. Touch b, then insert d: c goes.
        assert!(cache
            .lookup(&name("b.test."), Type::A, Credibility::Normal)
            .is_success());
        cache.add_rrset(&a_rrset("d.test.", 300, &[[1, 0, 0, 4]]), Credibility::Auth);
        assert_eq!(cache.size(), 2);
        assert!(cache
            .lookup(&name("b.test."), Type::A, Credibility::Normal)
            .is_success());
        assert!(cache
            .lookup(&name("d.test."), Type::A, Credibility::Normal)
            .is_success());
        assert!(matches!(
            cache.lookup(&name("a.test."), Type::A, Credibility::Normal),
            LookupResult::Unknown
        ));
        assert!(matches!(
            cache.lookup(&name("c.test."), Type::A, Credibility::Normal),
            LookupResult::Unknown
        ));
    }

    #[test]
    fn flush_operations_remove_entries() {
        let cache = Cache::new(Class::IN);
        cache.add_rrset(&a_rrset("x.test.", 300, &[[1, 2, 3, 4]]), Credibility::Auth);
        let mut txt = Rrset::new(name("x.test."), Type::TXT, Class::IN, Ttl::from(300));
        txt.push_rdata((b"\x02hi" as &[u8]).try_into().unwrap());
        cache.add_rrset(&txt, Credibility::Auth);

        cache.flush_set(&name("x.test."), Type::A);
        assert!(matches!(
            cache.lookup(&name("x.test."), Type::A, Credibility::Any),
            LookupResult::Unknown
        ));
        assert!(cache
            .lookup(&name("x.test."), Type::TXT, Credibility::Any)
            .is_success());

        cache.flush_name(&name("x.test."));
        assert_eq!(cache.size(), 0);
    }

    mod add_message {
        use super::*;
        use crate::message::Message;

        fn answer_message(aa: bool, rcode: Rcode) -> Message {
            let mut message = Message::new(99);
            message.set_flag(Flag::Qr);
            if aa {
                message.set_flag(Flag::Aa);
            }
            message.set_rcode(rcode);
            message
        }

        #[test]
        fn answers_become_retrievable() {
            let cache = Cache::new(Class::IN);
            let mut message = answer_message(true, Rcode::NoError);
            message.add_record(
                Record::question(name("x.test."), Type::A, Class::IN),
                Section::Question,
            );
            for record in a_rrset("x.test.", 300, &[[1, 2, 3, 4]]).records() {
                message.add_record(record, Section::Answer);
            }
            let response = cache.add_message(&message);
            assert!(matches!(response, Some(LookupResult::Success(_))));
            assert!(cache
                .lookup(&name("x.test."), Type::A, Credibility::Normal)
                .is_success());
        }

        #[test]
        fn nxdomain_is_recorded_under_the_final_chain_name() {
            let cache = Cache::new(Class::IN);
            let mut message = answer_message(true, Rcode::NxDomain);
            message.add_record(
                Record::question(name("a.test."), Type::A, Class::IN),
                Section::Question,
            );
            // a.test. CNAME b.test., and b.test. does not exist.
            let target: Name = name("b.test.");
            message.add_record(
                Record::new(
                    name("a.test."),
                    Type::CNAME,
                    Class::IN,
                    Ttl::from(300),
                    Rdata::from(&target),
                ),
                Section::Answer,
            );
            message.add_record(soa_record("test.", 3600, 900), Section::Authority);
            let response = cache.add_message(&message);
            assert!(matches!(response, Some(LookupResult::CName(_))));

            // The negative entry lives at b.test., not a.test.
            assert!(matches!(
                cache.lookup(&name("b.test."), Type::A, Credibility::Normal),
                LookupResult::NxDomain
            ));
            assert!(matches!(
                cache.lookup(&name("a.test."), Type::A, Credibility::Normal),
                LookupResult::CName(_)
            ));
        }

        #[test]
        fn glue_is_admitted_only_when_marked() {
            let cache = Cache::new(Class::IN);
            let mut message = answer_message(false, Rcode::NoError);
            message.add_record(
                Record::question(name("sub.test."), Type::A, Class::IN),
                Section::Question,
            );
            // A referral: NS in authority plus two additional A records,
            // only one of which is a nameserver named by the NS RRset.
            for record in ns_rrset("sub.test.", "ns.sub.test.").records() {
                message.add_record(record, Section::Authority);
            }
            for record in a_rrset("ns.sub.test.", 300, &[[10, 0, 0, 53]]).records() {
                message.add_record(record, Section::Additional);
            }
            for record in a_rrset("stray.test.", 300, &[[10, 9, 9, 9]]).records() {
                message.add_record(record, Section::Additional);
            }
            let response = cache.add_message(&message);
            assert!(matches!(response, Some(LookupResult::Delegation(_))));

            assert!(cache
                .lookup(&name("ns.sub.test."), Type::A, Credibility::Any)
                .is_success());
            assert!(matches!(
                cache.lookup(&name("stray.test."), Type::A, Credibility::Any),
                LookupResult::Unknown
            ));
            // Glue is below NORMAL credibility, so a NORMAL lookup
            // falls through to the delegation at sub.test. instead.
            assert!(matches!(
                cache.lookup(&name("ns.sub.test."), Type::A, Credibility::Normal),
                LookupResult::Delegation(_)
            ));
        }

        #[test]
        fn responses_with_error_rcodes_are_ignored() {
            let cache = Cache::new(Class::IN);
            let mut message = answer_message(false, Rcode::ServFail);
            message.add_record(
                Record::question(name("x.test."), Type::A, Class::IN),
                Section::Question,
            );
            assert!(cache.add_message(&message).is_none());
            assert_eq!(cache.size(), 0);
        }
    }
}
