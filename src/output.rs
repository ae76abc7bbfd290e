// src/output.rs
// =============================================================================
// Everything the user sees about results:
// - a live line per hit while the scan runs
// - the aligned results table and the statistics summary afterwards
// - CSV and JSON exports
// =============================================================================

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::scanner::{ProbeResult, ScanStats};

pub fn print_banner(target: &str, words: usize, threads: usize) {
    println!("dirprobe v{}", env!("CARGO_PKG_VERSION"));
    println!("[+] Loaded {} words", words);
    println!("[+] Target: {}", target);
    println!("[+] Threads: {}", threads);
    println!();
}

pub fn print_hit(result: &ProbeResult) {
    println!(
        "[+] {} - {} [Size: {}] [Time: {:?}]",
        result.status_code, result.url, result.size, result.elapsed
    );
}

pub fn print_results(results: &[ProbeResult]) {
    print!("{}", render_table(results));
}

// Columns are padded to the widest cell, two spaces apart.
fn render_table(results: &[ProbeResult]) -> String {
    if results.is_empty() {
        return "[*] No results found\n".to_string();
    }

    let rows: Vec<[String; 4]> = results
        .iter()
        .map(|r| {
            [
                r.status_code.to_string(),
                r.size.to_string(),
                r.elapsed_ms().to_string(),
                r.url.clone(),
            ]
        })
        .collect();

    let header = ["STATUS", "SIZE", "TIME(ms)", "URL"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut table = String::new();
    let header_row = header.map(str::to_string);
    for row in std::iter::once(&header_row).chain(rows.iter()) {
        let line = format!(
            "{:<w0$}  {:<w1$}  {:<w2$}  {}",
            row[0],
            row[1],
            row[2],
            row[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
        );
        table.push_str(line.trim_end());
        table.push('\n');
    }
    table
}

pub fn print_stats(stats: &ScanStats) {
    println!();
    println!("[*] Scan Statistics:");
    println!("    Total Requests:  {}", stats.total);
    println!("    Successful:      {}", stats.success);
    println!("    Failed:          {}", stats.failed);
    println!("    Duration:        {:?}", stats.elapsed());
    println!("    Req/sec:         {:.2}", stats.requests_per_second());
}

pub fn save_csv(results: &[ProbeResult], path: &Path) -> Result<()> {
    fs::write(path, render_csv(results))
        .with_context(|| format!("cannot write CSV to {}", path.display()))
}

fn render_csv(results: &[ProbeResult]) -> String {
    let mut csv = String::from("status,size,time_ms,url\n");
    for r in results {
        csv.push_str(&format!(
            "{},{},{},{}\n",
            r.status_code,
            r.size,
            r.elapsed_ms(),
            csv_field(&r.url)
        ));
    }
    csv
}

// Quotes a field if it would otherwise break the row.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn save_json(results: &[ProbeResult], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    fs::write(path, json).with_context(|| format!("cannot write JSON to {}", path.display()))
}
