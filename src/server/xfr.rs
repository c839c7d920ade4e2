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

//! An inbound zone transfer (AXFR) client, used to fetch secondary
//! zones from their primaries.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::info;

use crate::class::Class;
use crate::message::{self, Message, Opcode, Rcode, Section};
use crate::name::Name;
use crate::rr::{Record, Type};

/// How long to wait on the transfer connection before giving up.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);

/// Performs a full zone transfer ([RFC 5936]) of `origin` from
/// `remote`, returning the zone's records.
///
/// The stream must open and close with the zone's SOA; the closing SOA
/// is not included in the returned records, so they can be fed straight
/// into [`Zone::new`](crate::zone::Zone::new).
///
/// [RFC 5936]: https://datatracker.ietf.org/doc/html/rfc5936
pub fn transfer(origin: &Name, class: Class, remote: SocketAddr) -> Result<Vec<Record>, Error> {
    info!("transferring zone {} from {}", origin, remote);
    let mut stream = TcpStream::connect(remote)?;
    stream.set_read_timeout(Some(TRANSFER_TIMEOUT))?;
    stream.set_write_timeout(Some(TRANSFER_TIMEOUT))?;

    let mut query = Message::new(transfer_id());
    query.set_opcode(Opcode::Query);
    query.add_record(
        Record::question(origin.clone(), Type::AXFR, class),
        Section::Question,
    );
    let octets = query.to_wire();
    stream.write_all(&(octets.len() as u16).to_be_bytes())?;
    stream.write_all(&octets)?;

    let mut records = Vec::new();
    loop {
        let mut length = [0u8; 2];
        stream.read_exact(&mut length)?;
        let mut buffer = vec![0u8; u16::from_be_bytes(length) as usize];
        stream.read_exact(&mut buffer)?;

        let response = Message::from_wire(&buffer)?;
        if response.rcode() != Rcode::NoError {
            return Err(Error::Refused(response.rcode()));
        }
        if response.count(Section::Answer) == 0 {
            return Err(Error::Protocol("transfer message carries no records"));
        }
        for record in response.records(Section::Answer) {
            if records.is_empty() {
                if record.rr_type != Type::SOA {
                    return Err(Error::Protocol("transfer does not begin with an SOA"));
                }
            } else if record.rr_type == Type::SOA {
                // The closing SOA: the transfer is complete.
                info!(
                    "transferred zone {}: {} records",
                    origin,
                    records.len()
                );
                return Ok(records);
            }
            records.push(record.clone());
        }
    }
}

/// Derives a message ID for the transfer query from the clock.
fn transfer_id() -> u16 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos() as u16)
        .unwrap_or(0)
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a zone transfer failed.
#[derive(Debug)]
pub enum Error {
    /// A network error.
    Io(io::Error),

    /// A transfer message could not be decoded.
    Message(message::ReadError),

    /// The remote answered with an error RCODE.
    Refused(Rcode),

    /// The transfer stream violated the AXFR protocol.
    Protocol(&'static str),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<message::ReadError> for Error {
    fn from(err: message::ReadError) -> Self {
        Self::Message(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "transfer I/O error: {}", err),
            Self::Message(err) => write!(f, "malformed transfer message: {}", err),
            Self::Refused(rcode) => write!(f, "transfer refused with RCODE {:?}", rcode),
            Self::Protocol(what) => f.write_str(what),
        }
    }
}

impl std::error::Error for Error {}
