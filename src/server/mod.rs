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

//! The query-processing engine of an authoritative/caching DNS server.
//!
//! The [`Server`] structure holds the served zones, the per-class
//! caches, and the configured TSIG keys. It consumes a received message
//! as raw octets through [`Server::handle_message`] and produces the
//! octets of the reply (or nothing, for messages that must be dropped).
//! Network I/O lives elsewhere (see the [`io`](crate::io) module); the
//! engine never blocks and never touches a socket, with one exception:
//! AXFR responses are streamed through the [`XfrSink`] the transport
//! provides.
//!
//! Every internal failure is mapped to an RCODE in an otherwise
//! well-formed reply; processing a message never fails out of the
//! server.

use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::cache::Cache;
use crate::class::Class;
use crate::message::tsig::{TsigKey, TsigRdata};
use crate::message::{
    self, append_tsig, ExtendedRcode, Flag, Message, Opcode, Rcode, Section, HEADER_SIZE,
    MAX_MESSAGE_SIZE,
};
use crate::name::Name;
use crate::rr::{Record, Type};
use crate::zone::Zone;

mod query;
pub mod xfr;

////////////////////////////////////////////////////////////////////////
// SERVER PUBLIC API AND TOP-LEVEL MESSAGE HANDLING                   //
////////////////////////////////////////////////////////////////////////

/// The message-processing core of the server.
///
/// A `Server` is configured up front (zones, keys, and primed caches
/// are added before serving starts) and is then shared immutably
/// across transport threads.
pub struct Server {
    zones: HashMap<Name, Arc<Zone>>,
    caches: Mutex<HashMap<Class, Arc<Cache>>>,
    keys: HashMap<Name, Arc<TsigKey>>,
}

impl Server {
    /// Creates a server with no zones, no keys, and empty caches.
    pub fn new() -> Self {
        Self {
            zones: HashMap::new(),
            caches: Mutex::new(HashMap::new()),
            keys: HashMap::new(),
        }
    }

    /// Adds a zone to be served authoritatively.
    pub fn add_zone(&mut self, zone: Zone) {
        info!("serving zone {}", zone.origin());
        self.zones.insert(zone.origin().clone(), Arc::new(zone));
    }

    /// Adds a TSIG key.
    pub fn add_key(&mut self, key: TsigKey) {
        self.keys.insert(key.name().clone(), Arc::new(key));
    }

    /// Installs a (possibly primed) cache, replacing the cache for its
    /// class.
    pub fn set_cache(&mut self, cache: Cache) {
        self.caches
            .lock()
            .unwrap()
            .insert(cache.class(), Arc::new(cache));
    }

    /// Returns the cache for a class, creating an empty one on first
    /// use.
    pub fn cache(&self, class: Class) -> Arc<Cache> {
        self.caches
            .lock()
            .unwrap()
            .entry(class)
            .or_insert_with(|| Arc::new(Cache::new(class)))
            .clone()
    }

    /// Returns the zone whose origin is the longest match for `name`,
    /// if any.
    pub fn find_best_zone(&self, name: &Name) -> Option<&Arc<Zone>> {
        if let Some(zone) = self.zones.get(name) {
            return Some(zone);
        }
        for strip in 1..name.labels() {
            let tname = name.superdomain(strip).unwrap();
            if let Some(zone) = self.zones.get(&tname) {
                return Some(zone);
            }
        }
        None
    }

    /// Handles a received DNS message and returns the octets of the
    /// reply, or `None` if no reply is to be sent.
    ///
    /// `stream`, when provided by a TCP transport, is the sink through
    /// which an AXFR response is streamed; in that case this returns
    /// `None` once the transfer has been written.
    pub fn handle_message(
        &self,
        received: &[u8],
        info: ReceivedInfo,
        stream: Option<&mut dyn XfrSink>,
    ) -> Option<Vec<u8>> {
        match Message::from_wire(received) {
            Ok(query) => self.generate_reply(&query, received, info, stream),
            Err(e) => {
                debug!("dropping unparseable message from {}: {}", info.source, e);
                self.formerr_message(received)
            }
        }
    }

    /// Produces a reply to a successfully decoded query.
    fn generate_reply(
        &self,
        query: &Message,
        received: &[u8],
        info: ReceivedInfo,
        stream: Option<&mut dyn XfrSink>,
    ) -> Option<Vec<u8>> {
        // Responses are dropped silently; a response to a response
        // invites loops.
        if query.flag(Flag::Qr) {
            return None;
        }
        if query.rcode() != Rcode::NoError {
            return self.error_message(query, Rcode::FormErr);
        }
        if query.opcode() != Opcode::Query {
            return self.error_message(query, Rcode::NotImp);
        }
        let question = match query.question() {
            Some(question) => question.clone(),
            None => return self.formerr_message(received),
        };

        // A signed query must verify before anything else is believed.
        let query_tsig = query.tsig_record().cloned();
        let mut key = None;
        if let Some(ref tsig_record) = query_tsig {
            key = self.keys.get(&tsig_record.owner).cloned();
            let verified = key
                .as_ref()
                .map(|key| key.verify(query, received, None) == ExtendedRcode::NOERROR)
                .unwrap_or(false);
            if !verified {
                return self.formerr_message(received);
            }
        }

        let opt = query.opt().cloned();
        let max_length = if info.transport == Transport::Tcp {
            MAX_MESSAGE_SIZE
        } else if let Some(ref opt) = opt {
            (message::opt_payload_size(opt) as usize).max(512)
        } else {
            512
        };
        let mut flags = QueryFlags::default();
        if opt.as_ref().map_or(false, message::opt_dnssec_ok) {
            flags.dnssec_ok = true;
        }

        let mut response = Message::new(query.id());
        response.set_flag(Flag::Qr);
        if query.flag(Flag::Rd) {
            response.set_flag(Flag::Rd);
        }
        response.add_record(question.clone(), Section::Question);

        let qname = question.owner.clone();
        let qtype = question.rr_type;
        let qclass = question.class;

        if qtype == Type::AXFR {
            if let Some(stream) = stream {
                return self.do_axfr(&qname, query, key, query_tsig, stream);
            }
        }
        if !qtype.is_data() && qtype != Type::ANY {
            return self.error_message(query, Rcode::NotImp);
        }

        let rcode = self.add_answer(&mut response, &qname, qtype, qclass, 0, flags);
        if rcode != Rcode::NoError && rcode != Rcode::NxDomain {
            return self.error_message(query, rcode);
        }

        self.add_additional(&mut response, flags);

        if opt.is_some() {
            response.add_record(message::make_opt(4096, flags.dnssec_ok), Section::Additional);
        }

        if let Some(key) = key {
            response.set_tsig(key, ExtendedRcode::NOERROR, query_tsig);
        }
        response.to_wire_limited(max_length).ok()
    }

    /// Streams a full zone transfer ([RFC 5936]) through the sink: one
    /// message per RRset, with the SOA opening and closing the stream.
    /// TSIG, when in use, signs the first message as a response and
    /// chains the rest.
    ///
    /// [RFC 5936]: https://datatracker.ietf.org/doc/html/rfc5936
    fn do_axfr(
        &self,
        qname: &Name,
        query: &Message,
        key: Option<Arc<TsigKey>>,
        query_tsig: Option<Record>,
        stream: &mut dyn XfrSink,
    ) -> Option<Vec<u8>> {
        let zone = match self.zones.get(qname) {
            Some(zone) => zone,
            None => return self.error_message(query, Rcode::Refused),
        };
        info!("starting AXFR of {}", qname);

        let mut prior_mac: Option<Vec<u8>> = None;
        let mut first = true;
        for rrset in zone.axfr() {
            let mut response = Message::new(query.id());
            response.set_flag(Flag::Qr);
            response.set_flag(Flag::Aa);
            for record in rrset.records() {
                response.add_record(record, Section::Answer);
            }
            for sig in rrset.sigs() {
                response.add_record(sig.clone(), Section::Answer);
            }
            let mut octets = match response.to_wire_limited(MAX_MESSAGE_SIZE) {
                Ok(octets) => octets,
                Err(_) => return None,
            };
            if let Some(ref key) = key {
                let tsig_record = if first {
                    key.generate(ExtendedRcode::NOERROR, &octets, query_tsig.as_ref())
                } else {
                    key.generate_subsequent(&octets, prior_mac.as_deref().unwrap_or(&[]))
                };
                prior_mac =
                    TsigRdata::new(tsig_record.rdata.octets()).map(|fields| fields.mac().to_vec());
                append_tsig(&mut octets, &tsig_record);
            }
            first = false;
            if let Err(e) = stream.send_message(&octets) {
                info!("AXFR of {} failed: {}", qname, e);
                return None;
            }
        }
        None
    }

    /// Builds an error reply from header fields. Following long-standing
    /// server behavior, the question is echoed only in SERVFAIL
    /// replies.
    fn build_error_message(
        &self,
        id: u16,
        flags_word: u16,
        rcode: Rcode,
        question: Option<Record>,
    ) -> Option<Vec<u8>> {
        let mut response = Message::from_header(id, flags_word);
        response.set_flag(Flag::Qr);
        response.set_rcode(rcode);
        if rcode == Rcode::ServFail {
            if let Some(question) = question {
                response.add_record(question, Section::Question);
            }
        }
        Some(response.to_wire())
    }

    /// Builds an error reply to a decoded query.
    fn error_message(&self, query: &Message, rcode: Rcode) -> Option<Vec<u8>> {
        self.build_error_message(
            query.id(),
            query.flags_word(),
            rcode,
            query.question().cloned(),
        )
    }

    /// Builds a FORMERR reply from a message that could not be decoded,
    /// using only its header. The reply carries no question.
    fn formerr_message(&self, received: &[u8]) -> Option<Vec<u8>> {
        if received.len() < HEADER_SIZE {
            return None;
        }
        let id = u16::from_be_bytes(received[0..2].try_into().unwrap());
        let flags = u16::from_be_bytes(received[2..4].try_into().unwrap());
        self.build_error_message(id, flags, Rcode::FormErr, None)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////
// TRANSPORT-FACING TYPES                                             //
////////////////////////////////////////////////////////////////////////

/// Network-related information about a received DNS message.
#[derive(Clone, Copy, Debug)]
pub struct ReceivedInfo {
    pub source: IpAddr,
    pub transport: Transport,
}

impl ReceivedInfo {
    /// Creates a new `ReceivedInfo`.
    pub fn new(source: IpAddr, transport: Transport) -> Self {
        Self { source, transport }
    }
}

/// The transport through which a DNS message was received.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Transport {
    Tcp,
    Udp,
}

/// A sink for the messages of a streamed zone transfer. TCP transports
/// implement this over their connection (adding the two-octet length
/// framing).
pub trait XfrSink {
    /// Sends one complete DNS message.
    fn send_message(&mut self, octets: &[u8]) -> io::Result<()>;
}

/// Per-query answering options, derived from the query's EDNS OPT
/// record and QTYPE.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct QueryFlags {
    /// Include RRSIGs alongside the data (the EDNS DO bit).
    pub dnssec_ok: bool,

    /// Include *only* RRSIGs (the query asked for them by type).
    pub sig_only: bool,
}
