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

//! The line-oriented configuration file.
//!
//! Recognized keywords:
//!
//! ```text
//! primary <origin> <file>
//! secondary <origin> <remote>
//! cache <file>
//! key [<algorithm>] <name> <base64-secret>
//! port <n>
//! address <ip>
//! ```
//!
//! Lines starting with `#` are comments. Malformed or unknown lines are
//! logged and skipped. The defaults are port 53 and address 0.0.0.0.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;

use rampart::message::tsig::Algorithm;
use rampart::name::Name;

/// The parsed configuration.
#[derive(Debug, Default)]
pub struct Config {
    pub primaries: Vec<(Name, PathBuf)>,
    pub secondaries: Vec<(Name, String)>,
    pub cache_files: Vec<PathBuf>,
    pub keys: Vec<KeyConfig>,
    pub ports: Vec<u16>,
    pub addresses: Vec<IpAddr>,
}

/// One `key` line.
#[derive(Debug)]
pub struct KeyConfig {
    pub algorithm: Algorithm,
    pub name: Name,
    pub secret: String,
}

/// Loads the configuration from a file.
pub fn load(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let mut config = Config::default();

    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        let tokens: Vec<&str> = line.split_ascii_whitespace().collect();
        let (keyword, rest) = match tokens.split_first() {
            Some(split) => split,
            None => continue,
        };
        if keyword.starts_with('#') {
            continue;
        }
        match (*keyword, rest) {
            ("primary", [origin, file]) => match parse_origin(origin) {
                Ok(origin) => config.primaries.push((origin, PathBuf::from(file))),
                Err(e) => warn!("line {}: invalid origin: {}", number, e),
            },
            ("secondary", [origin, remote]) => match parse_origin(origin) {
                Ok(origin) => config.secondaries.push((origin, remote.to_string())),
                Err(e) => warn!("line {}: invalid origin: {}", number, e),
            },
            ("cache", [file]) => config.cache_files.push(PathBuf::from(file)),
            ("key", rest @ ([_, _] | [_, _, _])) => match parse_key(rest) {
                Ok(key) => config.keys.push(key),
                Err(e) => warn!("line {}: invalid key: {}", number, e),
            },
            ("port", [port]) => match port.parse() {
                Ok(port) => config.ports.push(port),
                Err(_) => warn!("line {}: invalid port: {}", number, port),
            },
            ("address", [address]) => match address.parse() {
                Ok(address) => config.addresses.push(address),
                Err(_) => warn!("line {}: invalid address: {}", number, address),
            },
            (keyword, _) if KEYWORDS.contains(&keyword) => {
                warn!("line {}: invalid arguments for {}", number, keyword);
            }
            (keyword, _) => warn!("line {}: unknown keyword {}", number, keyword),
        }
    }

    if config.ports.is_empty() {
        config.ports.push(53);
    }
    if config.addresses.is_empty() {
        config.addresses.push("0.0.0.0".parse().unwrap());
    }
    Ok(config)
}

const KEYWORDS: [&str; 6] = ["primary", "secondary", "cache", "key", "port", "address"];

/// Parses a zone origin; relative names are completed with the root.
fn parse_origin(text: &str) -> Result<Name, rampart::name::Error> {
    Name::from_text(text, Some(Name::root()))
}

/// Parses a `key` line's arguments: `[<algorithm>] <name> <secret>`.
/// Without an explicit algorithm, hmac-sha256 is used.
fn parse_key(rest: &[&str]) -> Result<KeyConfig, String> {
    let (algorithm, name, secret) = match rest {
        [name, secret] => (Algorithm::HmacSha256, *name, *secret),
        [algorithm, name, secret] => (
            algorithm.parse::<Algorithm>().map_err(String::from)?,
            *name,
            *secret,
        ),
        _ => return Err("expected [<algorithm>] <name> <secret>".to_string()),
    };
    let name = parse_origin(name).map_err(|e| e.to_string())?;
    Ok(KeyConfig {
        algorithm,
        name,
        secret: secret.to_string(),
    })
}
