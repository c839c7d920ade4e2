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

//! The shared result type of zone and cache lookups.

use crate::rr::Rrset;

/// The outcome of looking up a `(name, type)` pair in a
/// [`Zone`](crate::zone::Zone) or [`Cache`](crate::cache::Cache).
///
/// Both stores drive the same answering logic in the
/// [`server`](crate::server) module, so they share this result type.
/// Returned RRsets are owned copies; the stores never hand out
/// references into their own (locked) state.
#[derive(Clone, Debug)]
pub enum LookupResult {
    /// Nothing is known about the name.
    Unknown,

    /// The name is known not to exist.
    NxDomain,

    /// The name exists, but owns no records of the requested type.
    NxRrset,

    /// The name is at or below a zone cut; the NS RRset of the cut is
    /// included.
    Delegation(Rrset),

    /// The name owns a CNAME (and the requested type was not CNAME).
    CName(Rrset),

    /// An ancestor of the name owns a DNAME redirection.
    DName(Rrset),

    /// The requested records were found.
    Success(Vec<Rrset>),
}

impl LookupResult {
    /// Returns whether this result is [`LookupResult::Unknown`].
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns whether this result carries answer data.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
