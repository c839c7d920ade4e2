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

//! Implementation of the [`Error`] type for name-related errors.

use std::fmt;

use crate::wire;

/// An error type used to report problems constructing [`Name`]s.
///
/// [`Name`]: super::Name
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// A compression pointer did not point strictly backward in the
    /// message, or pointed outside of it.
    BadCompression,

    /// A label started with the reserved `01` or `10` bit pattern.
    BadLabelType,

    /// Extra data was found after the name while parsing.
    ExtraData,

    /// An invalid escape sequence was encountered when parsing a
    /// [`Name`](super::Name) from a [`str`].
    InvalidEscape,

    /// A label was longer than 63 octets.
    LabelTooLong,

    /// The name is too long (longer than 255 octets on the wire).
    NameTooLong,

    /// The name has no labels at all.
    NoLabels,

    /// `@` or a relative name was used where no origin was available.
    NoOrigin,

    /// A null (empty) label was found in a non-terminal position.
    NullNonTerminal,

    /// An absolute name was required, but the name is relative.
    Relative,

    /// When parsing a [`Name`](super::Name) from a [`str`], the string
    /// was empty.
    StrEmpty,

    /// When parsing a [`Name`](super::Name) from a [`str`], the string
    /// was not strictly ASCII.
    StrNotAscii,

    /// The name has more than 128 labels.
    TooManyLabels,

    /// We unexpectedly encountered the end of the message while parsing
    /// the name.
    UnexpectedEom,
}

impl From<wire::Error> for Error {
    fn from(err: wire::Error) -> Self {
        match err {
            wire::Error::UnexpectedEnd => Self::UnexpectedEom,
            wire::Error::BadOffset => Self::BadCompression,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::BadCompression => f.write_str("invalid compression pointer"),
            Self::BadLabelType => f.write_str("unknown label type"),
            Self::ExtraData => f.write_str("extra data was present"),
            Self::InvalidEscape => f.write_str("invalid escape sequence"),
            Self::LabelTooLong => f.write_str("label is longer than 63 octets"),
            Self::NameTooLong => f.write_str("name is longer than 255 octets on the wire"),
            Self::NoLabels => f.write_str("name has no labels"),
            Self::NoOrigin => f.write_str("no origin available to complete a relative name"),
            Self::NullNonTerminal => f.write_str("non-terminal label is null"),
            Self::Relative => f.write_str("name is not absolute"),
            Self::StrEmpty => f.write_str("string was empty"),
            Self::StrNotAscii => f.write_str("string was not ASCII"),
            Self::TooManyLabels => f.write_str("name has more than 128 labels"),
            Self::UnexpectedEom => f.write_str("unexpected end of message"),
        }
    }
}

impl std::error::Error for Error {}
