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

//! A reader for DNS master files ([RFC 1035 § 5]).
//!
//! The reader understands the `$ORIGIN`, `$TTL`, and `$INCLUDE`
//! directives, parenthesized continuations, `;` comments, quoted
//! strings, inherited owner names and TTLs, and TTL values with unit
//! suffixes (`42`, `1h30m`, `2w`). Textual RDATA is parsed for the
//! types the server inspects (A, AAAA, NS, CNAME, DNAME, PTR, MX, TXT,
//! SOA, and friends); everything else can be written in the generic
//! `\# <length> <hex>` form of [RFC 3597 § 5].
//!
//! The output is a flat list of [`Record`]s, ready to feed into
//! [`Zone::new`](crate::zone::Zone::new) or a cache.
//!
//! [RFC 1035 § 5]: https://datatracker.ietf.org/doc/html/rfc1035#section-5
//! [RFC 3597 § 5]: https://datatracker.ietf.org/doc/html/rfc3597#section-5

use std::fmt;
use std::fs;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use crate::class::Class;
use crate::name::Name;
use crate::rr::{Rdata, Record, Ttl, Type};
use crate::util::ascii_hex_digit_to_nibble;

////////////////////////////////////////////////////////////////////////
// PUBLIC ENTRY POINTS                                                //
////////////////////////////////////////////////////////////////////////

/// Reads the master file at `path`, relative to `origin`, producing
/// records of the given class.
pub fn read_file(path: &Path, origin: &Name, class: Class) -> Result<Vec<Record>, Error> {
    let text = fs::read_to_string(path).map_err(Error::Io)?;
    let mut parser = Parser::new(origin.clone(), class, path.parent().map(PathBuf::from));
    parser.parse_source(&text)?;
    Ok(parser.records)
}

/// Reads master-file text, relative to `origin`, producing records of
/// the given class. `$INCLUDE` is not available in this mode.
pub fn read_str(text: &str, origin: &Name, class: Class) -> Result<Vec<Record>, Error> {
    let mut parser = Parser::new(origin.clone(), class, None);
    parser.parse_source(text)?;
    Ok(parser.records)
}

////////////////////////////////////////////////////////////////////////
// PARSER                                                             //
////////////////////////////////////////////////////////////////////////

struct Parser {
    origin: Name,
    class: Class,
    directory: Option<PathBuf>,
    last_owner: Option<Name>,
    default_ttl: Option<Ttl>,
    records: Vec<Record>,
}

impl Parser {
    fn new(origin: Name, class: Class, directory: Option<PathBuf>) -> Self {
        Self {
            origin,
            class,
            directory,
            last_owner: None,
            default_ttl: None,
            records: Vec::new(),
        }
    }

    fn parse_source(&mut self, text: &str) -> Result<(), Error> {
        for line in logical_lines(text)? {
            self.parse_line(line)?;
        }
        Ok(())
    }

    fn parse_line(&mut self, line: Line) -> Result<(), Error> {
        if line.tokens.is_empty() {
            return Ok(());
        }
        let first = &line.tokens[0];
        if !first.quoted && first.text.starts_with('$') {
            return self.parse_directive(line);
        }

        // The owner is present exactly when the line does not start
        // with whitespace.
        let mut tokens = line.tokens.iter();
        let owner = if line.starts_at_margin {
            let token = tokens.next().unwrap();
            let owner = Name::from_text(&token.text, Some(&self.origin))
                .map_err(|e| line.syntax(format!("invalid owner name: {}", e)))?;
            self.last_owner = Some(owner.clone());
            owner
        } else {
            self.last_owner
                .clone()
                .ok_or_else(|| line.syntax("no previous owner name to inherit".to_string()))?
        };

        // TTL and class may appear in either order before the type.
        let mut ttl = None;
        let mut rr_type = None;
        for token in tokens.by_ref() {
            if ttl.is_none() && !token.quoted {
                if let Some(value) = parse_ttl(&token.text) {
                    ttl = Some(Ttl::from(value));
                    continue;
                }
            }
            if !token.quoted {
                if let Ok(class) = token.text.parse::<Class>() {
                    if class == self.class {
                        continue;
                    }
                    return Err(line.syntax(format!(
                        "record class {} does not match zone class {}",
                        class, self.class
                    )));
                }
                if let Ok(parsed) = token.text.parse::<Type>() {
                    rr_type = Some(parsed);
                    break;
                }
            }
            return Err(line.syntax(format!("expected TTL, class, or type: {}", token.text)));
        }
        let rr_type = rr_type.ok_or_else(|| line.syntax("missing record type".to_string()))?;
        let ttl = match ttl.or(self.default_ttl) {
            Some(ttl) => ttl,
            None => return Err(line.syntax("no TTL specified and no $TTL seen".to_string())),
        };

        let rdata_tokens: Vec<&Token> = tokens.collect();
        let rdata = parse_rdata(rr_type, &rdata_tokens, &self.origin)
            .map_err(|message| line.syntax(message))?;
        self.records
            .push(Record::new(owner, rr_type, self.class, ttl, rdata));
        Ok(())
    }

    fn parse_directive(&mut self, line: Line) -> Result<(), Error> {
        let directive = line.tokens[0].text.to_ascii_uppercase();
        let argument = line
            .tokens
            .get(1)
            .map(|token| token.text.as_str())
            .ok_or_else(|| line.syntax(format!("{} requires an argument", directive)))?;
        match directive.as_str() {
            "$ORIGIN" => {
                self.origin = Name::from_text(argument, Some(&self.origin))
                    .map_err(|e| line.syntax(format!("invalid $ORIGIN: {}", e)))?;
                Ok(())
            }
            "$TTL" => {
                let value = parse_ttl(argument)
                    .ok_or_else(|| line.syntax(format!("invalid $TTL: {}", argument)))?;
                self.default_ttl = Some(Ttl::from(value));
                Ok(())
            }
            "$INCLUDE" => {
                let directory = self
                    .directory
                    .clone()
                    .ok_or_else(|| line.syntax("$INCLUDE is not available here".to_string()))?;
                let text = fs::read_to_string(directory.join(argument)).map_err(Error::Io)?;
                self.parse_source(&text)
            }
            _ => Err(line.syntax(format!("unknown directive {}", directive))),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TOKENIZATION                                                       //
////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
struct Token {
    text: String,
    quoted: bool,
}

#[derive(Debug)]
struct Line {
    number: usize,
    starts_at_margin: bool,
    tokens: Vec<Token>,
}

impl Line {
    fn syntax(&self, message: String) -> Error {
        Error::Syntax {
            line: self.number,
            message,
        }
    }
}

/// Splits master-file text into logical lines of tokens, honoring
/// parenthesized continuations, quoted strings, escapes, and comments.
fn logical_lines(text: &str) -> Result<Vec<Line>, Error> {
    let mut lines = Vec::new();
    let mut current: Option<Line> = None;
    let mut parens = 0usize;

    for (index, raw_line) in text.lines().enumerate() {
        let number = index + 1;
        let starts_at_margin = raw_line
            .chars()
            .next()
            .map_or(false, |c| !c.is_ascii_whitespace());
        let line = current.get_or_insert_with(|| Line {
            number,
            starts_at_margin,
            tokens: Vec::new(),
        });

        let mut chars = raw_line.chars();
        let mut token: Option<Token> = None;
        let mut in_quotes = false;
        while let Some(c) = chars.next() {
            if in_quotes {
                match c {
                    '"' => {
                        in_quotes = false;
                        finish_token(&mut token, line);
                    }
                    '\\' => {
                        let token = token.as_mut().unwrap();
                        token.text.push('\\');
                        if let Some(escaped) = chars.next() {
                            token.text.push(escaped);
                        }
                    }
                    _ => token.as_mut().unwrap().text.push(c),
                }
                continue;
            }
            match c {
                ';' => break,
                '(' => {
                    finish_token(&mut token, line);
                    parens += 1;
                }
                ')' => {
                    finish_token(&mut token, line);
                    if parens == 0 {
                        return Err(Error::Syntax {
                            line: number,
                            message: "unbalanced closing parenthesis".to_string(),
                        });
                    }
                    parens -= 1;
                }
                '"' => {
                    finish_token(&mut token, line);
                    token = Some(Token {
                        text: String::new(),
                        quoted: true,
                    });
                    in_quotes = true;
                }
                '\\' => {
                    let token = token.get_or_insert_with(Token::unquoted);
                    token.text.push('\\');
                    if let Some(escaped) = chars.next() {
                        token.text.push(escaped);
                    }
                }
                c if c.is_ascii_whitespace() => finish_token(&mut token, line),
                c => token.get_or_insert_with(Token::unquoted).text.push(c),
            }
        }
        if in_quotes {
            return Err(Error::Syntax {
                line: number,
                message: "unterminated quoted string".to_string(),
            });
        }
        finish_token(&mut token, line);

        if parens == 0 {
            lines.push(current.take().unwrap());
        }
    }
    if parens != 0 {
        return Err(Error::Syntax {
            line: text.lines().count(),
            message: "unbalanced opening parenthesis".to_string(),
        });
    }
    if let Some(line) = current.take() {
        lines.push(line);
    }
    Ok(lines)
}

impl Token {
    fn unquoted() -> Self {
        Self {
            text: String::new(),
            quoted: false,
        }
    }
}

fn finish_token(token: &mut Option<Token>, line: &mut Line) {
    if let Some(token) = token.take() {
        line.tokens.push(token);
    }
}

////////////////////////////////////////////////////////////////////////
// RDATA TEXT PARSING                                                 //
////////////////////////////////////////////////////////////////////////

/// Parses textual RDATA for the given type. Errors are plain messages;
/// the caller attaches the line number.
fn parse_rdata(rr_type: Type, tokens: &[&Token], origin: &Name) -> Result<Rdata, String> {
    // The RFC 3597 generic form works for every type.
    if let Some(first) = tokens.first() {
        if !first.quoted && first.text == "\\#" {
            return parse_generic_rdata(&tokens[1..]);
        }
    }

    match rr_type {
        Type::A => {
            let address: Ipv4Addr = expect_token(tokens, 0)?
                .parse()
                .map_err(|_| "invalid IPv4 address".to_string())?;
            Ok(Rdata::try_from(&address.octets()[..]).unwrap())
        }
        Type::AAAA => {
            let address: Ipv6Addr = expect_token(tokens, 0)?
                .parse()
                .map_err(|_| "invalid IPv6 address".to_string())?;
            Ok(Rdata::try_from(&address.octets()[..]).unwrap())
        }
        Type::NS
        | Type::MD
        | Type::MF
        | Type::CNAME
        | Type::MB
        | Type::MG
        | Type::MR
        | Type::PTR
        | Type::DNAME => {
            let name = parse_name(expect_token(tokens, 0)?, origin)?;
            Ok(Rdata::from(&name))
        }
        Type::MX => {
            let preference: u16 = expect_token(tokens, 0)?
                .parse()
                .map_err(|_| "invalid MX preference".to_string())?;
            let name = parse_name(expect_token(tokens, 1)?, origin)?;
            let mut octets = preference.to_be_bytes().to_vec();
            octets.extend_from_slice(name.wire_repr());
            Ok(Rdata::try_from(octets).unwrap())
        }
        Type::SOA => {
            let mname = parse_name(expect_token(tokens, 0)?, origin)?;
            let rname = parse_name(expect_token(tokens, 1)?, origin)?;
            let mut octets = mname.wire_repr().to_vec();
            octets.extend_from_slice(rname.wire_repr());
            for index in 2..7 {
                let value = parse_ttl(expect_token(tokens, index)?)
                    .ok_or_else(|| "invalid SOA timer value".to_string())?;
                octets.extend_from_slice(&value.to_be_bytes());
            }
            Ok(Rdata::try_from(octets).unwrap())
        }
        Type::TXT => {
            if tokens.is_empty() {
                return Err("TXT requires at least one string".to_string());
            }
            let mut octets = Vec::new();
            for token in tokens {
                let string = unescape(&token.text)?;
                if string.len() > 255 {
                    return Err("TXT string is longer than 255 octets".to_string());
                }
                octets.push(string.len() as u8);
                octets.extend_from_slice(&string);
            }
            Rdata::try_from(octets).map_err(|e| e.to_string())
        }
        _ => Err(format!(
            "no text format known for type {}; use the \\# generic form",
            rr_type
        )),
    }
}

fn parse_generic_rdata(tokens: &[&Token]) -> Result<Rdata, String> {
    let length: usize = expect_token(tokens, 0)?
        .parse()
        .map_err(|_| "invalid generic RDATA length".to_string())?;
    let mut octets = Vec::with_capacity(length);
    let mut pending: Option<u8> = None;
    for token in &tokens[1..] {
        for c in token.text.bytes() {
            let nibble = ascii_hex_digit_to_nibble(c)
                .ok_or_else(|| "invalid hex digit in generic RDATA".to_string())?;
            pending = match pending {
                None => Some(nibble),
                Some(high) => {
                    octets.push((high << 4) | nibble);
                    None
                }
            };
        }
    }
    if pending.is_some() {
        return Err("odd number of hex digits in generic RDATA".to_string());
    }
    if octets.len() != length {
        return Err(format!(
            "generic RDATA length is {}, but {} octets are present",
            length,
            octets.len()
        ));
    }
    Rdata::try_from(octets).map_err(|e| e.to_string())
}

fn parse_name(text: &str, origin: &Name) -> Result<Name, String> {
    Name::from_text(text, Some(origin)).map_err(|e| format!("invalid domain name: {}", e))
}

fn expect_token<'a>(tokens: &[&'a Token], index: usize) -> Result<&'a str, String> {
    tokens
        .get(index)
        .map(|token| token.text.as_str())
        .ok_or_else(|| "missing RDATA field".to_string())
}

/// Resolves master-file escapes (`\.`, `\\`, `\DDD`) in a token into
/// raw octets.
fn unescape(text: &str) -> Result<Vec<u8>, String> {
    let mut octets = Vec::with_capacity(text.len());
    let mut bytes = text.bytes();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            octets.push(b);
            continue;
        }
        let first = bytes.next().ok_or("dangling escape")?;
        if first.is_ascii_digit() {
            let second = bytes.next().ok_or("bad decimal escape")?;
            let third = bytes.next().ok_or("bad decimal escape")?;
            if !second.is_ascii_digit() || !third.is_ascii_digit() {
                return Err("bad decimal escape".to_string());
            }
            let value = (first - b'0') as u16 * 100 + (second - b'0') as u16 * 10 + (third - b'0') as u16;
            if value > 255 {
                return Err("decimal escape out of range".to_string());
            }
            octets.push(value as u8);
        } else {
            octets.push(first);
        }
    }
    Ok(octets)
}

/// Parses a TTL value: either a plain number of seconds or a
/// concatenation of `<number><unit>` terms with units `s`, `m`, `h`,
/// `d`, and `w` (as in `1h30m`).
fn parse_ttl(text: &str) -> Option<u32> {
    if text.is_empty() {
        return None;
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse().ok();
    }
    let mut total: u64 = 0;
    let mut value: Option<u64> = None;
    for c in text.bytes() {
        match c {
            b'0'..=b'9' => {
                value = Some(value.unwrap_or(0) * 10 + (c - b'0') as u64);
            }
            _ => {
                let multiplier = match c.to_ascii_lowercase() {
                    b's' => 1,
                    b'm' => 60,
                    b'h' => 3600,
                    b'd' => 86400,
                    b'w' => 604800,
                    _ => return None,
                };
                total = total.checked_add(value.take()? * multiplier)?;
            }
        }
    }
    if let Some(rest) = value {
        // A trailing bare number counts as seconds.
        total = total.checked_add(rest)?;
    }
    u32::try_from(total).ok()
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a master file could not be read.
#[derive(Debug)]
pub enum Error {
    /// The file could not be read from disk.
    Io(io::Error),

    /// The file's contents are malformed.
    Syntax { line: usize, message: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::Syntax { line, message } => write!(f, "line {}: {}", line, message),
        }
    }
}

impl std::error::Error for Error {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn name(text: &str) -> Name {
        text.parse().unwrap()
    }

    fn read(text: &str) -> Vec<Record> {
        read_str(text, &name("example."), Class::IN).unwrap()
    }

    #[test]
    fn basic_records_parse() {
        let records = read(
            "$TTL 3600\n\
             www      IN A     10.0.0.1\n\
             mail 300 IN AAAA  ::1\n",
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].owner, name("www.example."));
        assert_eq!(records[0].rr_type, Type::A);
        assert_eq!(records[0].ttl, Ttl::from(3600));
        assert_eq!(records[0].rdata.octets(), &[10, 0, 0, 1]);
        assert_eq!(records[1].ttl, Ttl::from(300));
        assert_eq!(records[1].rdata.octets().len(), 16);
    }

    #[test]
    fn owner_and_ttl_are_inherited() {
        let records = read(
            "$TTL 1h\n\
             www IN A 10.0.0.1\n\
             \x20   IN A 10.0.0.2\n",
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].owner, name("www.example."));
        assert_eq!(records[1].ttl, Ttl::from(3600));
    }

    #[test]
    fn at_sign_and_origin_directive_work() {
        let records = read(
            "$TTL 300\n\
             @ IN NS ns\n\
             $ORIGIN sub.example.\n\
             host IN A 10.0.0.3\n",
        );
        assert_eq!(records[0].owner, name("example."));
        assert_eq!(
            records[0].single_name().unwrap(),
            name("ns.example.")
        );
        assert_eq!(records[1].owner, name("host.sub.example."));
    }

    #[test]
    fn soa_with_parentheses_parses() {
        let records = read(
            "@ 3600 IN SOA ns.example. admin.example. (\n\
             \x20   2024010101 ; serial\n\
             \x20   1h         ; refresh\n\
             \x20   15m        ; retry\n\
             \x20   1w         ; expire\n\
             \x20   30m )      ; minimum\n",
        );
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.rr_type, Type::SOA);
        assert_eq!(record.soa_minimum(), Some(1800));
    }

    #[test]
    fn mx_and_txt_parse() {
        let records = read(
            "$TTL 300\n\
             @ IN MX 10 mail\n\
             @ IN TXT \"hello world\" plain\n",
        );
        let mx = &records[0];
        assert_eq!(&mx.rdata.octets()[..2], &[0, 10]);
        assert_eq!(
            mx.additional_name().unwrap(),
            name("mail.example.")
        );
        let txt = &records[1];
        assert_eq!(txt.rdata.octets()[0], 11);
        assert_eq!(&txt.rdata.octets()[1..12], b"hello world");
        assert_eq!(txt.rdata.octets()[12], 5);
    }

    #[test]
    fn generic_rdata_parses() {
        let records = read("$TTL 300\nx IN TYPE9999 \\# 4 0a00 0001\n");
        assert_eq!(records[0].rr_type, Type::from(9999));
        assert_eq!(records[0].rdata.octets(), &[10, 0, 0, 1]);
    }

    #[test]
    fn ttl_units_parse() {
        assert_eq!(parse_ttl("42"), Some(42));
        assert_eq!(parse_ttl("1h30m"), Some(5400));
        assert_eq!(parse_ttl("2w"), Some(1209600));
        assert_eq!(parse_ttl("1x"), None);
        assert_eq!(parse_ttl(""), None);
    }

    #[test]
    fn missing_ttl_is_an_error() {
        let result = read_str("www IN A 10.0.0.1\n", &name("example."), Class::IN);
        assert!(matches!(result, Err(Error::Syntax { line: 1, .. })));
    }

    #[test]
    fn class_mismatch_is_an_error() {
        let result = read_str("$TTL 60\nwww CH A 10.0.0.1\n", &name("example."), Class::IN);
        assert!(matches!(result, Err(Error::Syntax { line: 2, .. })));
    }

    #[test]
    fn unbalanced_parentheses_are_an_error() {
        let result = read_str("$TTL 60\nx IN TXT ( \"a\"\n", &name("example."), Class::IN);
        assert!(matches!(result, Err(Error::Syntax { .. })));
    }
}
