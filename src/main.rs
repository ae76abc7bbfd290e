// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Load the wordlist and build the scanner
// 3. Pick the scan mode (plain, extensions, recursive) and run it
// 4. Print/export the results and the statistics
// 5. Exit with proper code (0 = scan completed, 2 = error)
//
// Rust concepts used:
// - async/await: thousands of probes share a handful of worker tasks
// - Result<T, E>: For error handling (T = success type, E = error type)
// - match: Pattern matching to select the scan mode
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli;       // src/cli.rs - command-line parsing
mod logging;   // src/logging.rs - tracing setup
mod output;    // src/output.rs - tables, CSV and JSON
mod scanner;   // src/scanner/ - the scanning engine
mod wordlist;  // src/wordlist.rs - wordlist loading

use anyhow::{Context, Result};
use clap::Parser; // Parser trait enables the parse() method
use tracing::warn;

use cli::Cli;
use scanner::{ProbeResult, Scanner};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = cli.to_config();

    logging::initialize_logging(config.verbose)?;

    let words = wordlist::load_wordlist(&config.wordlist_path)?;
    output::print_banner(&config.base_url, words.len(), config.threads);

    let scanner = Scanner::new(config).context("cannot start scan")?;
    let config = scanner.config();

    let results: Vec<ProbeResult> = match (config.extensions.is_empty(), config.recursive) {
        (false, false) => scanner.scan_with_extensions(&words, &config.extensions).await,
        (_, true) => {
            scanner
                .scan_recursive(&config.base_url, &words, 0, config.max_depth)
                .await
        }
        (true, false) => scanner.scan(&words).await,
    };

    println!();
    output::print_results(&results);

    if let Some(path) = &cli.output {
        match output::save_csv(&results, path) {
            Ok(()) => println!("[+] CSV results saved to {}", path.display()),
            Err(e) => warn!(error = %format!("{:#}", e), "CSV export failed"),
        }
    }

    if let Some(path) = &cli.json {
        match output::save_json(&results, path) {
            Ok(()) => println!("[+] JSON results saved to {}", path.display()),
            Err(e) => warn!(error = %format!("{:#}", e), "JSON export failed"),
        }
    }

    output::print_stats(&scanner.stats().await);

    Ok(0)
}
