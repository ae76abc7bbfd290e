// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// There are no subcommands: one invocation = one scan. The flags map onto
// a ScanConfig, plus the output paths which only main.rs cares about.
//
// Rust concepts:
// - Derive macros: clap generates the parser from the struct definition
// - value_parser: clap validates numeric ranges before we ever see them
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::scanner::{parse_extensions, parse_match_codes, ScanConfig};

#[derive(Parser, Debug)]
#[command(
    name = "dirprobe",
    version,
    about = "Discover hidden files and directories on a web server",
    long_about = "dirprobe requests <url>/<word> for every word in a wordlist, concurrently, \
                  and reports the paths whose status code is in the match set."
)]
pub struct Cli {
    /// Target URL (e.g. https://target.com)
    #[arg(short = 'u', long)]
    pub url: String,

    /// Wordlist path (one word per line, '#' starts a comment)
    #[arg(short = 'w', long)]
    pub wordlist: PathBuf,

    /// Number of concurrent workers
    #[arg(short = 't', long, default_value_t = 50, value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: u16,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Match status codes (comma-separated)
    #[arg(long = "mc", default_value = "200,301,302,401,403")]
    pub match_codes: String,

    /// Save results as CSV
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Save results as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Log every failed request
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Extensions (comma-separated, e.g. php,html,txt)
    #[arg(short = 'e', long, default_value = "")]
    pub extensions: String,

    /// Rescan every 301/302 hit as a new base URL
    #[arg(short = 'r', long)]
    pub recursive: bool,

    /// Max recursion depth (used with -r)
    #[arg(long, default_value_t = 3)]
    pub depth: usize,

    /// Rate limit in requests per second (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    pub rate: u32,

    /// Max retries on timeouts and dropped connections (0 = no retries)
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// Drop responses identical to the server's "not found" page
    #[arg(long)]
    pub smart_filter: bool,
}

impl Cli {
    pub fn to_config(&self) -> ScanConfig {
        let mut config = ScanConfig::new(&self.url);
        config.threads = usize::from(self.threads);
        config.timeout = Duration::from_secs(self.timeout);
        config.match_codes = parse_match_codes(&self.match_codes);
        config.verbose = self.verbose;
        config.rate = self.rate;
        config.max_retries = self.retries;
        config.recursive = self.recursive;
        config.max_depth = self.depth;
        config.extensions = parse_extensions(&self.extensions);
        config.wordlist_path = self.wordlist.clone();
        config.smart_filter = self.smart_filter;
        config
    }
}
