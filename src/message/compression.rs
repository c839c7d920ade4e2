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

//! The name-compression table used while rendering a message.

use crate::name::Name;

/// The number of hash buckets. Prime, and small: a message rarely
/// mentions more than a few dozen distinct name suffixes.
const TABLE_SIZE: usize = 17;

/// The largest message offset expressible in a 14-bit compression
/// pointer ([RFC 1035 § 4.1.4]).
///
/// [RFC 1035 § 4.1.4]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.4
const MAX_POINTER: usize = 0x3fff;

/// A table mapping domain names to the message offsets at which they
/// were written, used to compress later occurrences into two-octet
/// pointers.
///
/// One `CompressionTable` is created per message render and discarded
/// afterward; it is never shared between messages or threads. Offsets
/// beyond [the 14-bit pointer range](MAX_POINTER) are never stored.
#[derive(Debug)]
pub struct CompressionTable {
    buckets: [Vec<(Name, u16)>; TABLE_SIZE],
}

impl CompressionTable {
    /// Creates a new, empty table.
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| Vec::new()),
        }
    }

    fn row(name: &Name) -> usize {
        (name.hash_value() & 0x7fff_ffff) as usize % TABLE_SIZE
    }

    /// Records that `name` was written at `position`. Positions that do
    /// not fit in a compression pointer are silently dropped.
    pub fn add(&mut self, position: usize, name: Name) {
        if position > MAX_POINTER {
            return;
        }
        let row = Self::row(&name);
        self.buckets[row].push((name, position as u16));
    }

    /// Returns the position at which `name` was most recently recorded,
    /// or `None` if it has not been written yet.
    pub fn get(&self, name: &Name) -> Option<u16> {
        let row = Self::row(name);
        self.buckets[row]
            .iter()
            .rev()
            .find(|(entry, _)| entry == name)
            .map(|&(_, position)| position)
    }
}

impl Default for CompressionTable {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
