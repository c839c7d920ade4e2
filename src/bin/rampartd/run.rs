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

//! Implements running the server.

use std::fmt::Write;
use std::net::{SocketAddr, ToSocketAddrs};
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use base64::Engine as _;
use env_logger::Env;
use log::{error, info};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use rampart::cache::{Cache, Credibility};
use rampart::class::Class;
use rampart::io;
use rampart::message::tsig::TsigKey;
use rampart::name::Name;
use rampart::server::{xfr, Server};
use rampart::zone::Zone;
use rampart::zone_file;

use crate::args::Args;
use crate::config::{self, Config};

/// Runs the server, exiting with status 1 on a fatal startup error.
pub fn run(args: Args) {
    env_logger::init_from_env(Env::new().default_filter_or("info"));

    if let Err(e) = try_running(args) {
        let mut message = String::from("failed to run:");
        for (i, cause) in e.chain().enumerate() {
            write!(message, "\n[{}] {}", i + 1, cause).unwrap();
        }
        error!("{}", message);
        process::exit(1);
    }
    info!("exiting with success");
}

fn try_running(args: Args) -> Result<()> {
    info!(
        "rampartd v{} starting, configuration {}",
        env!("CARGO_PKG_VERSION"),
        args.config.display(),
    );
    let config = config::load(&args.config).context("failed to load the configuration")?;

    let server = build_server(&config)?;
    let server = Arc::new(server);

    // Set up signal handling before the serving threads start.
    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("failed to set up signal handling")?;

    for address in &config.addresses {
        for port in &config.ports {
            let bind = SocketAddr::new(*address, *port);
            io::spawn(&server, bind)
                .with_context(|| format!("failed to bind {}", bind))?;
        }
    }
    info!("rampartd running");

    for signal in signals.forever() {
        match signal {
            SIGINT => info!("received SIGINT; shutting down"),
            SIGTERM => info!("received SIGTERM; shutting down"),
            _ => unreachable!(),
        }
        break;
    }
    Ok(())
}

/// Builds the server from the configuration: primary zones from master
/// files, secondary zones via AXFR, cache priming, and TSIG keys.
fn build_server(config: &Config) -> Result<Server> {
    let mut server = Server::new();

    for (origin, file) in &config.primaries {
        let records = zone_file::read_file(file, origin, Class::IN)
            .with_context(|| format!("failed to read zone file {}", file.display()))?;
        let zone = Zone::new(origin.clone(), Class::IN, records)
            .with_context(|| format!("zone {} is not valid", origin))?;
        server.add_zone(zone);
    }

    for (origin, remote) in &config.secondaries {
        let remote_addr = resolve_remote(remote)
            .with_context(|| format!("cannot resolve transfer source {}", remote))?;
        let records = xfr::transfer(origin, Class::IN, remote_addr)
            .with_context(|| format!("failed to transfer zone {}", origin))?;
        let zone = Zone::new(origin.clone(), Class::IN, records)
            .with_context(|| format!("transferred zone {} is not valid", origin))?;
        server.add_zone(zone);
    }

    for file in &config.cache_files {
        let records = zone_file::read_file(file, Name::root(), Class::IN)
            .with_context(|| format!("failed to read cache file {}", file.display()))?;
        let cache = Cache::new(Class::IN);
        for record in &records {
            cache.add_record(record, Credibility::Hint);
        }
        info!("primed cache with {} names from {}", cache.size(), file.display());
        server.set_cache(cache);
    }

    for key_config in &config.keys {
        let secret = base64::engine::general_purpose::STANDARD
            .decode(&key_config.secret)
            .with_context(|| format!("key {} has an invalid base64 secret", key_config.name))?;
        let key = TsigKey::new(key_config.name.clone(), key_config.algorithm, secret)
            .map_err(|e| anyhow!("key {} is invalid: {}", key_config.name, e))?;
        server.add_key(key);
    }

    Ok(server)
}

/// Resolves a `secondary` remote: either `host:port` or a bare host,
/// which defaults to port 53.
fn resolve_remote(remote: &str) -> Result<SocketAddr> {
    if let Ok(addr) = remote.parse::<SocketAddr>() {
        return Ok(addr);
    }
    (remote, 53)
        .to_socket_addrs()
        .context("address lookup failed")?
        .next()
        .ok_or_else(|| anyhow!("no addresses found"))
}
