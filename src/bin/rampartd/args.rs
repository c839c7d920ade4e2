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

//! Implements command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

/// Parses the command-line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// The Rampart authoritative/caching DNS server
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// The configuration file to use
    #[arg(value_name = "CONFIG", default_value = "rampartd.conf")]
    pub config: PathBuf,
}
