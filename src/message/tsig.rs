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

//! Implementation of Secret Key Transaction Authentication for DNS
//! (TSIG), as specified by [RFC 8945].
//!
//! A [`TsigKey`] bundles a key name, an [`Algorithm`], and the shared
//! secret. Its [`generate`](TsigKey::generate) method produces the TSIG
//! record to append to a rendered message, and
//! [`verify`](TsigKey::verify) checks the TSIG record of a received
//! message against the raw received octets. Both operate at the
//! boundary of message encoding/decoding: the MAC covers rendered
//! bytes, so [`Message::to_wire_limited`](super::Message::to_wire_limited)
//! invokes `generate` after the body is rendered, and `verify` uses the
//! TSIG byte offset recorded during decoding to reconstruct the signed
//! prefix.
//!
//! The two algorithms required by [RFC 8945 § 6], HMAC-SHA1 and
//! HMAC-SHA256, are implemented.
//!
//! [RFC 8945]: https://datatracker.ietf.org/doc/html/rfc8945
//! [RFC 8945 § 6]: https://datatracker.ietf.org/doc/html/rfc8945#section-6

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::digest::OutputSizeUser;
use hmac::{Hmac, Mac};
use lazy_static::lazy_static;
use sha1::Sha1;
use sha2::Sha256;

use crate::class::Class;
use crate::name::Name;
use crate::rr::{Rdata, Record, Ttl, Type};
use crate::wire::WireWriter;

use super::{ExtendedRcode, Message};

////////////////////////////////////////////////////////////////////////
// TSIG ALGORITHMS                                                    //
////////////////////////////////////////////////////////////////////////

lazy_static! {
    static ref HMAC_SHA1_NAME: Name = "hmac-sha1.".parse().unwrap();
    static ref HMAC_SHA256_NAME: Name = "hmac-sha256.".parse().unwrap();
}

/// A supported TSIG algorithm.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Algorithm {
    HmacSha1,
    HmacSha256,
}

impl Algorithm {
    /// Returns the name assigned by [RFC 8945 § 6] to identify this
    /// algorithm.
    ///
    /// [RFC 8945 § 6]: https://datatracker.ietf.org/doc/html/rfc8945#section-6
    pub fn name(&self) -> &'static Name {
        match self {
            Self::HmacSha1 => &HMAC_SHA1_NAME,
            Self::HmacSha256 => &HMAC_SHA256_NAME,
        }
    }

    /// Finds an algorithm by its assigned name. Returns `None` if the
    /// algorithm is not defined or not supported by this
    /// implementation.
    pub fn from_name(name: &Name) -> Option<Self> {
        if name == &*HMAC_SHA1_NAME {
            Some(Self::HmacSha1)
        } else if name == &*HMAC_SHA256_NAME {
            Some(Self::HmacSha256)
        } else {
            None
        }
    }

    /// Returns the size of the MAC produced by this algorithm.
    pub fn output_size(&self) -> usize {
        match self {
            Self::HmacSha1 => Hmac::<Sha1>::output_size(),
            Self::HmacSha256 => Hmac::<Sha256>::output_size(),
        }
    }

    /// Creates a MAC authenticator for this algorithm and the given
    /// key.
    fn make_authenticator(&self, key: &[u8]) -> Box<dyn Authenticator> {
        match self {
            Self::HmacSha1 => Box::new(Hmac::<Sha1>::new_from_slice(key).unwrap()),
            Self::HmacSha256 => Box::new(Hmac::<Sha256>::new_from_slice(key).unwrap()),
        }
    }
}

impl FromStr for Algorithm {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.strip_suffix('.').unwrap_or(text);
        if text.eq_ignore_ascii_case("hmac-sha1") {
            Ok(Self::HmacSha1)
        } else if text.eq_ignore_ascii_case("hmac-sha256") {
            Ok(Self::HmacSha256)
        } else {
            Err("unsupported TSIG algorithm")
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::HmacSha1 => f.write_str("hmac-sha1"),
            Self::HmacSha256 => f.write_str("hmac-sha256"),
        }
    }
}

/// An object-safe wrapper around the `digest` crate's [`Mac`] trait, so
/// that we can work with `Box<dyn Authenticator>`.
trait Authenticator {
    fn update(&mut self, data: &[u8]);
    fn finalize(self: Box<Self>) -> Vec<u8>;
    fn verify_truncated_left(self: Box<Self>, tag: &[u8]) -> bool;
}

impl<M> Authenticator for M
where
    M: Mac,
{
    fn update(&mut self, data: &[u8]) {
        <Self as Mac>::update(self, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        <Self as Mac>::finalize(*self).into_bytes().to_vec()
    }

    fn verify_truncated_left(self: Box<Self>, tag: &[u8]) -> bool {
        <Self as Mac>::verify_truncated_left(*self, tag).is_ok()
    }
}

////////////////////////////////////////////////////////////////////////
// TSIG KEYS                                                          //
////////////////////////////////////////////////////////////////////////

/// A TSIG key: a name, an algorithm, and a shared secret.
#[derive(Clone, PartialEq)]
pub struct TsigKey {
    name: Name,
    algorithm: Algorithm,
    secret: Vec<u8>,
}

/// The default fudge: the number of seconds a signature's "time signed"
/// may differ from the local clock ([RFC 8945 § 10]).
///
/// [RFC 8945 § 10]: https://datatracker.ietf.org/doc/html/rfc8945#section-10
const FUDGE: u16 = 300;

impl TsigKey {
    /// Creates a new key. The key name must be absolute.
    pub fn new(
        name: Name,
        algorithm: Algorithm,
        secret: Vec<u8>,
    ) -> Result<Self, crate::name::Error> {
        if !name.is_absolute() {
            return Err(crate::name::Error::Relative);
        }
        Ok(Self {
            name,
            algorithm,
            secret,
        })
    }

    /// Returns the key's name.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the key's algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Returns the worst-case serialized length of a TSIG record
    /// generated with this key, used to reserve space when rendering
    /// under a length cap.
    pub fn record_length(&self) -> usize {
        self.name.wire_len()
            + 10 // type, class, TTL, RDLENGTH
            + self.algorithm.name().wire_len()
            + 6 // time signed
            + 2 // fudge
            + 2 // MAC size
            + self.algorithm.output_size()
            + 2 // original ID
            + 2 // error
            + 2 // other length
            + 6 // other data (server time, for BADTIME)
    }

    /// Generates a TSIG record for the rendered message octets.
    ///
    /// `rendered` must be the complete message as rendered so far (with
    /// the final section counts in place, not counting the TSIG record
    /// itself). For a response, `query_tsig` is the TSIG record of the
    /// request, whose MAC is chained into this one. For the BADSIG and
    /// BADKEY errors the record is generated unsigned, with an empty
    /// MAC; for BADTIME the request's time is echoed and the server
    /// time travels in the "other data" field.
    pub fn generate(
        &self,
        error: ExtendedRcode,
        rendered: &[u8],
        query_tsig: Option<&Record>,
    ) -> Record {
        self.generate_at(error, rendered, query_tsig, unix_time())
    }

    fn generate_at(
        &self,
        error: ExtendedRcode,
        rendered: &[u8],
        query_tsig: Option<&Record>,
        now: u64,
    ) -> Record {
        let query_fields = query_tsig.and_then(|record| TsigRdata::new(record.rdata.octets()));
        let (time_signed, other) = if error == ExtendedRcode::BADTIME {
            let query_time = query_fields
                .as_ref()
                .map(TsigRdata::time_signed)
                .unwrap_or(now);
            (query_time, encode_time(now).to_vec())
        } else {
            (now, Vec::new())
        };

        let signing = error != ExtendedRcode::BADSIG && error != ExtendedRcode::BADKEY;
        let mac = if signing {
            let mut authenticator = self.algorithm.make_authenticator(&self.secret);
            if let Some(ref query_fields) = query_fields {
                let query_mac = query_fields.mac();
                authenticator.update(&(query_mac.len() as u16).to_be_bytes());
                authenticator.update(query_mac);
            }
            authenticator.update(rendered);
            self.update_variables(authenticator.as_mut(), time_signed, FUDGE, error, &other);
            authenticator.finalize()
        } else {
            Vec::new()
        };

        let original_id = u16::from_be_bytes(rendered[0..2].try_into().unwrap());
        self.build_record(time_signed, FUDGE, &mac, original_id, error, &other)
    }

    /// Generates a TSIG record for a non-first message of a
    /// multi-message response (e.g. AXFR). Per [RFC 8945 § 5.3.1], the
    /// MAC chains from the prior message's MAC (unprefixed) and covers
    /// only the message and the timers.
    ///
    /// [RFC 8945 § 5.3.1]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.3.1
    pub fn generate_subsequent(&self, rendered: &[u8], prior_mac: &[u8]) -> Record {
        let now = unix_time();
        let mut authenticator = self.algorithm.make_authenticator(&self.secret);
        authenticator.update(prior_mac);
        authenticator.update(rendered);
        authenticator.update(&encode_time(now));
        authenticator.update(&FUDGE.to_be_bytes());
        let mac = authenticator.finalize();
        let original_id = u16::from_be_bytes(rendered[0..2].try_into().unwrap());
        self.build_record(
            now,
            FUDGE,
            &mac,
            original_id,
            ExtendedRcode::NOERROR,
            &[],
        )
    }

    /// Verifies the TSIG record of a received message.
    ///
    /// `received` must be the raw received octets the message was
    /// decoded from; the signed prefix is reconstructed from them using
    /// the TSIG offset recorded at decode time. `query_tsig` is our own
    /// prior TSIG record when verifying a response to a signed request.
    ///
    /// The result is the RCODE to act on: `NOERROR` on success, or
    /// BADKEY, BADSIG, BADTIME, or FORMERR.
    pub fn verify(
        &self,
        message: &Message,
        received: &[u8],
        query_tsig: Option<&Record>,
    ) -> ExtendedRcode {
        self.verify_at(message, received, query_tsig, unix_time())
    }

    fn verify_at(
        &self,
        message: &Message,
        received: &[u8],
        query_tsig: Option<&Record>,
        now: u64,
    ) -> ExtendedRcode {
        let record = match message.tsig_record() {
            Some(record) => record,
            None => return ExtendedRcode::FORMERR,
        };
        let start = match message.tsig_start() {
            Some(start) => start,
            None => return ExtendedRcode::FORMERR,
        };
        if start < super::HEADER_SIZE || start > received.len() {
            return ExtendedRcode::FORMERR;
        }
        if record.owner != self.name {
            return ExtendedRcode::BADKEY;
        }
        let fields = match TsigRdata::new(record.rdata.octets()) {
            Some(fields) => fields,
            None => return ExtendedRcode::FORMERR,
        };
        if Algorithm::from_name(&fields.algorithm()) != Some(self.algorithm) {
            return ExtendedRcode::BADKEY;
        }

        // RFC 8945 § 5.2.2.1: a MAC may be truncated, but no further
        // than half the algorithm output (and never below 10 octets).
        let mac = fields.mac();
        let output_size = self.algorithm.output_size();
        if mac.len() > output_size || mac.len() < (output_size / 2).max(10) {
            return ExtendedRcode::FORMERR;
        }

        let mut authenticator = self.algorithm.make_authenticator(&self.secret);
        if let Some(query_fields) =
            query_tsig.and_then(|record| TsigRdata::new(record.rdata.octets()))
        {
            let query_mac = query_fields.mac();
            authenticator.update(&(query_mac.len() as u16).to_be_bytes());
            authenticator.update(query_mac);
        }

        // The signed message: the original ID restored and the TSIG
        // record (and its count) removed.
        authenticator.update(&fields.original_id().to_be_bytes());
        authenticator.update(&received[2..10]);
        let arcount = u16::from_be_bytes(received[10..12].try_into().unwrap());
        authenticator.update(&arcount.wrapping_sub(1).to_be_bytes());
        authenticator.update(&received[12..start]);

        self.update_variables(
            authenticator.as_mut(),
            fields.time_signed(),
            fields.fudge(),
            fields.error(),
            fields.other(),
        );
        if !authenticator.verify_truncated_left(mac) {
            return ExtendedRcode::BADSIG;
        }

        // RFC 8945 § 5.2.3: the time check comes after the signature
        // check, so that BADTIME responses are themselves signed.
        let time_signed = fields.time_signed();
        if now.abs_diff(time_signed) > fields.fudge() as u64 {
            return ExtendedRcode::BADTIME;
        }

        ExtendedRcode::NOERROR
    }

    /// Adds the TSIG variables of [RFC 8945 § 4.3.3] to a MAC.
    ///
    /// [RFC 8945 § 4.3.3]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.3.3
    fn update_variables(
        &self,
        authenticator: &mut dyn Authenticator,
        time_signed: u64,
        fudge: u16,
        error: ExtendedRcode,
        other: &[u8],
    ) {
        authenticator.update(&canonical_wire(&self.name));
        authenticator.update(&u16::from(Class::ANY).to_be_bytes());
        authenticator.update(&0u32.to_be_bytes());
        authenticator.update(&canonical_wire(self.algorithm.name()));
        authenticator.update(&encode_time(time_signed));
        authenticator.update(&fudge.to_be_bytes());
        authenticator.update(&u16::from(error).to_be_bytes());
        authenticator.update(&(other.len() as u16).to_be_bytes());
        authenticator.update(other);
    }

    /// Assembles the TSIG record itself.
    fn build_record(
        &self,
        time_signed: u64,
        fudge: u16,
        mac: &[u8],
        original_id: u16,
        error: ExtendedRcode,
        other: &[u8],
    ) -> Record {
        let algorithm_wire = self.algorithm.name().wire_repr();
        let mut rdata = Vec::with_capacity(algorithm_wire.len() + 16 + mac.len() + other.len());
        rdata.extend_from_slice(algorithm_wire);
        rdata.extend_from_slice(&encode_time(time_signed));
        rdata.extend_from_slice(&fudge.to_be_bytes());
        rdata.extend_from_slice(&(mac.len() as u16).to_be_bytes());
        rdata.extend_from_slice(mac);
        rdata.extend_from_slice(&original_id.to_be_bytes());
        rdata.extend_from_slice(&u16::from(error).to_be_bytes());
        rdata.extend_from_slice(&(other.len() as u16).to_be_bytes());
        rdata.extend_from_slice(other);
        Record::new(
            self.name.clone(),
            Type::TSIG,
            Class::ANY,
            Ttl::from(0),
            Rdata::try_from(rdata).unwrap(),
        )
    }
}

impl fmt::Debug for TsigKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // The secret stays out of debug output.
        f.debug_struct("TsigKey")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// TSIG RDATA FIELDS                                                  //
////////////////////////////////////////////////////////////////////////

/// A view over the fields of TSIG RDATA in canonical (uncompressed)
/// form.
pub struct TsigRdata<'a> {
    octets: &'a [u8],
    algorithm_len: usize,
    mac_size: usize,
}

impl<'a> TsigRdata<'a> {
    /// Validates the layout of TSIG RDATA and returns a field view, or
    /// `None` if the octets do not have the shape of a TSIG record.
    pub fn new(octets: &'a [u8]) -> Option<Self> {
        let (_, algorithm_len) = Name::from_uncompressed(octets).ok()?;
        let fixed = octets.get(algorithm_len..algorithm_len + 10)?;
        let mac_size = u16::from_be_bytes(fixed[8..10].try_into().unwrap()) as usize;
        let after_mac = algorithm_len + 10 + mac_size;
        let tail = octets.get(after_mac..after_mac + 6)?;
        let other_len = u16::from_be_bytes(tail[4..6].try_into().unwrap()) as usize;
        if octets.len() != after_mac + 6 + other_len {
            return None;
        }
        Some(Self {
            octets,
            algorithm_len,
            mac_size,
        })
    }

    /// Returns the algorithm name.
    pub fn algorithm(&self) -> Name {
        Name::from_uncompressed(self.octets)
            .expect("validated at construction")
            .0
    }

    /// Returns the "time signed" field, a 48-bit count of seconds since
    /// the Unix epoch.
    pub fn time_signed(&self) -> u64 {
        let mut value = 0u64;
        for &octet in &self.octets[self.algorithm_len..self.algorithm_len + 6] {
            value = (value << 8) | octet as u64;
        }
        value
    }

    /// Returns the fudge field, in seconds.
    pub fn fudge(&self) -> u16 {
        u16::from_be_bytes(
            self.octets[self.algorithm_len + 6..self.algorithm_len + 8]
                .try_into()
                .unwrap(),
        )
    }

    /// Returns the MAC.
    pub fn mac(&self) -> &'a [u8] {
        &self.octets[self.algorithm_len + 10..self.algorithm_len + 10 + self.mac_size]
    }

    /// Returns the original message ID.
    pub fn original_id(&self) -> u16 {
        let start = self.algorithm_len + 10 + self.mac_size;
        u16::from_be_bytes(self.octets[start..start + 2].try_into().unwrap())
    }

    /// Returns the error field.
    pub fn error(&self) -> ExtendedRcode {
        let start = self.algorithm_len + 12 + self.mac_size;
        u16::from_be_bytes(self.octets[start..start + 2].try_into().unwrap()).into()
    }

    /// Returns the "other data" field.
    pub fn other(&self) -> &'a [u8] {
        &self.octets[self.algorithm_len + 16 + self.mac_size..]
    }
}

////////////////////////////////////////////////////////////////////////
// HELPERS                                                            //
////////////////////////////////////////////////////////////////////////

/// Returns the current Unix time, truncated to the 48 bits the TSIG
/// wire format can carry.
fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
        & 0xffff_ffff_ffff
}

/// Encodes a 48-bit timestamp in network byte order.
fn encode_time(time: u64) -> [u8; 6] {
    let octets = time.to_be_bytes();
    octets[2..8].try_into().unwrap()
}

/// Returns the canonical (lowercased, uncompressed) wire form of a
/// name.
fn canonical_wire(name: &Name) -> Vec<u8> {
    let mut writer = WireWriter::new();
    name.write_canonical(&mut writer)
        .expect("message names are absolute");
    writer.into_bytes()
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class as DnsClass;
    use crate::message::{Flag, Section};

    fn test_key() -> TsigKey {
        TsigKey::new(
            "key.test.".parse().unwrap(),
            Algorithm::HmacSha256,
            b"0123456789abcdef".to_vec(),
        )
        .unwrap()
    }

    /// Renders a signed response and returns the raw octets.
    fn signed_response(key: &TsigKey) -> Vec<u8> {
        let mut message = Message::new(0x0102);
        message.set_flag(Flag::Qr);
        message.add_record(
            Record::question("x.test.".parse().unwrap(), Type::A, DnsClass::IN),
            Section::Question,
        );
        message.set_tsig(
            std::sync::Arc::new(key.clone()),
            ExtendedRcode::NOERROR,
            None,
        );
        message.to_wire_limited(512).unwrap()
    }

    #[test]
    fn generated_records_verify() {
        let key = test_key();
        let octets = signed_response(&key);
        let message = Message::from_wire(&octets).unwrap();
        assert!(message.tsig_record().is_some());
        assert_eq!(
            key.verify(&message, &octets, None),
            ExtendedRcode::NOERROR
        );
    }

    #[test]
    fn tampering_yields_badsig() {
        let key = test_key();
        let mut octets = signed_response(&key);
        // Flip a bit in the question name.
        octets[13] ^= 0x01;
        let message = Message::from_wire(&octets).unwrap();
        assert_eq!(key.verify(&message, &octets, None), ExtendedRcode::BADSIG);
    }

    #[test]
    fn wrong_key_name_yields_badkey() {
        let key = test_key();
        let octets = signed_response(&key);
        let message = Message::from_wire(&octets).unwrap();
        let other = TsigKey::new(
            "other.test.".parse().unwrap(),
            Algorithm::HmacSha256,
            b"0123456789abcdef".to_vec(),
        )
        .unwrap();
        assert_eq!(other.verify(&message, &octets, None), ExtendedRcode::BADKEY);
    }

    #[test]
    fn stale_time_yields_badtime() {
        let key = test_key();
        let octets = signed_response(&key);
        let message = Message::from_wire(&octets).unwrap();
        let fields = TsigRdata::new(message.tsig_record().unwrap().rdata.octets()).unwrap();
        let stale = fields.time_signed() + FUDGE as u64 + 1;
        assert_eq!(
            key.verify_at(&message, &octets, None, stale),
            ExtendedRcode::BADTIME
        );
    }

    #[test]
    fn unsigned_messages_yield_formerr() {
        let key = test_key();
        let mut message = Message::new(7);
        message.add_record(
            Record::question("x.test.".parse().unwrap(), Type::A, DnsClass::IN),
            Section::Question,
        );
        let octets = message.to_wire();
        let decoded = Message::from_wire(&octets).unwrap();
        assert_eq!(key.verify(&decoded, &octets, None), ExtendedRcode::FORMERR);
    }

    #[test]
    fn record_length_covers_generated_records() {
        let key = test_key();
        let record = key.generate(ExtendedRcode::NOERROR, &signed_response(&key), None);
        // The record's serialized size: owner + fixed fields + RDATA.
        let serialized = record.owner.wire_len() + 10 + record.rdata.len();
        assert!(serialized <= key.record_length());
    }

    #[test]
    fn badkey_records_are_unsigned() {
        let key = test_key();
        let rendered = signed_response(&key);
        let record = key.generate(ExtendedRcode::BADKEY, &rendered, None);
        let fields = TsigRdata::new(record.rdata.octets()).unwrap();
        assert!(fields.mac().is_empty());
        assert_eq!(fields.error(), ExtendedRcode::BADKEY);
    }

    #[test]
    fn time_encoding_round_trips() {
        let key = test_key();
        let record = key.build_record(0x0000_0123_4567_89ab_u64 & 0xffff_ffff_ffff, 300, b"", 7, ExtendedRcode::NOERROR, b"");
        let fields = TsigRdata::new(record.rdata.octets()).unwrap();
        assert_eq!(fields.time_signed(), 0x0123_4567_89ab);
        assert_eq!(fields.fudge(), 300);
        assert_eq!(fields.original_id(), 7);
    }
}
