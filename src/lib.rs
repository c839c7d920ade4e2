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

//! Rampart is a DNS protocol library and authoritative/caching name
//! server.
//!
//! The library provides the pieces needed to read and write on-the-wire
//! DNS messages ([RFC 1035], with EDNS(0) per [RFC 6891] and TSIG per
//! [RFC 8945]), to keep authoritative zone data in memory and answer
//! queries from it, and to maintain a credibility-aware, TTL-expiring
//! cache of resource record sets. The `rampartd` binary wires these
//! pieces to blocking network transports to produce a small
//! authoritative/caching server.
//!
//! The major modules are:
//!
//! * [`name`], domain-name handling;
//! * [`wire`], the low-level octet reader and writer;
//! * [`message`], DNS message reading and writing (including name
//!   compression and TSIG);
//! * [`rr`], resource records and RRsets;
//! * [`zone`], in-memory authoritative zone data;
//! * [`cache`], the credibility-aware record cache;
//! * [`server`], the query-processing engine;
//! * [`zone_file`], a master-file reader; and
//! * [`io`], blocking UDP/TCP transports for the server.
//!
//! [RFC 1035]: https://datatracker.ietf.org/doc/html/rfc1035
//! [RFC 6891]: https://datatracker.ietf.org/doc/html/rfc6891
//! [RFC 8945]: https://datatracker.ietf.org/doc/html/rfc8945

pub mod cache;
pub mod class;
pub mod io;
pub mod lookup;
pub mod message;
pub mod name;
pub mod rr;
pub mod server;
pub mod wire;
pub mod zone;
pub mod zone_file;

mod util;
