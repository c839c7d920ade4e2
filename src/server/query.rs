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

//! The answering logic for ordinary queries.

use crate::cache::Credibility;
use crate::class::Class;
use crate::lookup::LookupResult;
use crate::message::{Flag, Message, Rcode, Section};
use crate::name::Name;
use crate::rr::{Rdata, Record, Rrset, Ttl, Type};

use super::{QueryFlags, Server};

/// How many CNAME/DNAME links may be followed while assembling one
/// answer. Deeper chains (or cycles) stop here and return whatever has
/// been assembled.
const MAX_CHAIN_DEPTH: usize = 6;

impl Server {
    /// Answers the question `(name, qtype, qclass)` into `response`,
    /// consulting the best-matching zone and falling back to the cache.
    /// CNAMEs are chased and DNAMEs synthesize CNAMEs, recursing with a
    /// depth cap. The returned RCODE is the final verdict; the caller
    /// replaces the response wholesale for RCODEs other than NOERROR
    /// and NXDOMAIN.
    pub(super) fn add_answer(
        &self,
        response: &mut Message,
        name: &Name,
        qtype: Type,
        qclass: Class,
        iterations: usize,
        flags: QueryFlags,
    ) -> Rcode {
        if iterations > MAX_CHAIN_DEPTH {
            return Rcode::NoError;
        }

        let mut qtype = qtype;
        let mut flags = flags;
        if qtype == Type::RRSIG || qtype == Type::SIG {
            qtype = Type::ANY;
            flags.sig_only = true;
        }

        let zone = self.find_best_zone(name).cloned();
        let result = match zone {
            Some(ref zone) => zone.lookup(name, qtype),
            None => self.cache(qclass).lookup(name, qtype, Credibility::Normal),
        };

        let mut rcode = Rcode::NoError;
        match result {
            LookupResult::Unknown => {
                self.add_cache_ns(response, qclass, name);
            }
            LookupResult::NxDomain => {
                response.set_rcode(Rcode::NxDomain);
                if let Some(ref zone) = zone {
                    self.add_soa(response, zone);
                    if iterations == 0 {
                        response.set_flag(Flag::Aa);
                    }
                }
                rcode = Rcode::NxDomain;
            }
            LookupResult::NxRrset => {
                if let Some(ref zone) = zone {
                    self.add_soa(response, zone);
                    if iterations == 0 {
                        response.set_flag(Flag::Aa);
                    }
                }
            }
            LookupResult::Delegation(ns) => {
                let owner = ns.owner().clone();
                self.add_rrset_to(response, &owner, &ns, Section::Authority, flags);
            }
            LookupResult::CName(rrset) => {
                self.add_rrset_to(response, name, &rrset, Section::Answer, flags);
                if zone.is_some() && iterations == 0 {
                    response.set_flag(Flag::Aa);
                }
                match rrset
                    .first()
                    .and_then(|rdata| Name::from_uncompressed_all(rdata.octets()).ok())
                {
                    Some(target) => {
                        rcode =
                            self.add_answer(response, &target, qtype, qclass, iterations + 1, flags)
                    }
                    None => rcode = Rcode::ServFail,
                }
            }
            LookupResult::DName(dname) => {
                self.add_rrset_to(response, name, &dname, Section::Answer, flags);
                let owner = dname.owner().clone();
                let target = match dname
                    .first()
                    .and_then(|rdata| Name::from_uncompressed_all(rdata.octets()).ok())
                {
                    Some(target) => target,
                    None => return Rcode::ServFail,
                };
                let newname = match name.from_dname(&owner, &target) {
                    Ok(Some(newname)) => newname,
                    Ok(None) => return Rcode::ServFail,
                    Err(_) => return Rcode::YxDomain,
                };
                // Synthesize the CNAME the DNAME implies for this query
                // name (RFC 6672 § 3).
                let mut synthesized =
                    Rrset::new(name.clone(), Type::CNAME, qclass, Ttl::from(0));
                synthesized.push_rdata(Rdata::from(&newname));
                self.add_rrset_to(response, name, &synthesized, Section::Answer, flags);
                if zone.is_some() && iterations == 0 {
                    response.set_flag(Flag::Aa);
                }
                rcode = self.add_answer(response, &newname, qtype, qclass, iterations + 1, flags);
            }
            LookupResult::Success(sets) => {
                for set in &sets {
                    self.add_rrset_to(response, name, set, Section::Answer, flags);
                }
                if let Some(ref zone) = zone {
                    self.add_ns(response, zone, flags);
                    if iterations == 0 {
                        response.set_flag(Flag::Aa);
                    }
                } else {
                    self.add_cache_ns(response, qclass, name);
                }
            }
        }
        rcode
    }

    /// Adds an RRset to a section of the response, unless the set is
    /// already present in that section or an earlier one. Records owned
    /// by a wildcard are rewritten to the name actually queried.
    fn add_rrset_to(
        &self,
        response: &mut Message,
        name: &Name,
        rrset: &Rrset,
        section: Section,
        flags: QueryFlags,
    ) {
        for earlier in [Section::Answer, Section::Authority, Section::Additional] {
            if response.find_rrset(name, rrset.rr_type(), earlier) {
                return;
            }
            if earlier == section {
                break;
            }
        }
        if !flags.sig_only {
            for record in rrset.records() {
                let record = if record.owner.is_wildcard() && !name.is_wildcard() {
                    record.with_owner(name)
                } else {
                    record
                };
                response.add_record(record, section);
            }
        }
        if flags.sig_only || flags.dnssec_ok {
            for sig in rrset.sigs() {
                let sig = if sig.owner.is_wildcard() && !name.is_wildcard() {
                    sig.with_owner(name)
                } else {
                    sig.clone()
                };
                response.add_record(sig, section);
            }
        }
    }

    /// Adds the zone's SOA to the AUTHORITY section, for negative
    /// caching ([RFC 2308 § 3]).
    ///
    /// [RFC 2308 § 3]: https://datatracker.ietf.org/doc/html/rfc2308#section-3
    fn add_soa(&self, response: &mut Message, zone: &crate::zone::Zone) {
        if let Some(soa) = zone.soa() {
            response.add_record(soa, Section::Authority);
        }
    }

    /// Adds the zone's apex NS RRset to the AUTHORITY section.
    fn add_ns(&self, response: &mut Message, zone: &crate::zone::Zone, flags: QueryFlags) {
        if let Some(ns) = zone.ns() {
            let owner = ns.owner().clone();
            self.add_rrset_to(response, &owner, &ns, Section::Authority, flags);
        }
    }

    /// Adds the cached delegation for `name` (if one is known, at any
    /// credibility) to the AUTHORITY section.
    fn add_cache_ns(&self, response: &mut Message, qclass: Class, name: &Name) {
        if let LookupResult::Delegation(ns) =
            self.cache(qclass).lookup(name, Type::NS, Credibility::Hint)
        {
            for record in ns.records() {
                response.add_record(record, Section::Authority);
            }
        }
    }

    /// The glue pass: for every record in the ANSWER and AUTHORITY
    /// sections that advertises an additional name, looks up addresses
    /// for that name and adds them to the ADDITIONAL section.
    pub(super) fn add_additional(&self, response: &mut Message, flags: QueryFlags) {
        self.add_additional_from(response, Section::Answer, flags);
        self.add_additional_from(response, Section::Authority, flags);
    }

    fn add_additional_from(&self, response: &mut Message, section: Section, flags: QueryFlags) {
        let glue_names: Vec<Name> = response
            .records(section)
            .iter()
            .filter_map(Record::additional_name)
            .collect();
        for name in glue_names {
            self.add_glue(response, &name, flags);
        }
    }

    /// Adds any A/AAAA RRsets known for `name` to the ADDITIONAL
    /// section. Glue-grade cache data is acceptable here.
    fn add_glue(&self, response: &mut Message, name: &Name, flags: QueryFlags) {
        for rr_type in [Type::A, Type::AAAA] {
            if let Some(rrset) = self.find_exact_match(name, rr_type, Class::IN, true) {
                self.add_rrset_to(response, name, &rrset, Section::Additional, flags);
            }
        }
    }

    /// Looks up an RRset by exact match in the best zone, or in the
    /// cache when no zone covers the name. With `glue` set, cached data
    /// of any credibility is accepted.
    pub fn find_exact_match(
        &self,
        name: &Name,
        rr_type: Type,
        class: Class,
        glue: bool,
    ) -> Option<Rrset> {
        if let Some(zone) = self.find_best_zone(name) {
            zone.find_exact(name, rr_type)
        } else {
            let min_cred = if glue {
                Credibility::Any
            } else {
                Credibility::Normal
            };
            match self.cache(class).lookup(name, rr_type, min_cred) {
                LookupResult::Success(sets) => sets.into_iter().next(),
                _ => None,
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
