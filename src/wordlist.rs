// src/wordlist.rs
// =============================================================================
// Loads the wordlist: one candidate path per line.
//
// Lines are trimmed; blank lines and lines starting with '#' are skipped.
// Order is preserved.
// =============================================================================

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

pub fn load_wordlist(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)
        .with_context(|| format!("cannot open wordlist {}", path.display()))?;

    parse_words(BufReader::new(file))
        .with_context(|| format!("cannot read wordlist {}", path.display()))
}

fn parse_words<R: BufRead>(reader: R) -> std::io::Result<Vec<String>> {
    let mut words = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let word = line.trim();
        if !word.is_empty() && !word.starts_with('#') {
            words.push(word.to_string());
        }
    }
    Ok(words)
}
