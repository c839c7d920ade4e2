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

//! Implementation of the [`Error`] type for zone-related errors.

use std::fmt;

/// An error signaling that zone data violates a structural invariant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// A record's class does not match the zone's class.
    ClassMismatch,

    /// The SOA RRset at the origin has more than one record.
    MultipleSoa,

    /// There is no NS RRset at the origin.
    NoNs,

    /// There is no SOA RRset at the origin.
    NoSoa,

    /// A record's owner is not within the zone.
    OutOfZone,

    /// The zone origin is not an absolute name.
    Relative,

    /// An SOA record's owner does not match the zone origin.
    SoaOwnerMismatch,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::ClassMismatch => f.write_str("record class does not match the zone"),
            Self::MultipleSoa => f.write_str("exactly one SOA record must be present"),
            Self::NoNs => f.write_str("no NS records at the zone origin"),
            Self::NoSoa => f.write_str("no SOA record at the zone origin"),
            Self::OutOfZone => f.write_str("record owner is outside of the zone"),
            Self::Relative => f.write_str("zone origin is not absolute"),
            Self::SoaOwnerMismatch => f.write_str("SOA owner does not match the zone origin"),
        }
    }
}

impl std::error::Error for Error {}
