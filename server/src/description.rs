use std::{fs::File, io::Read, path::Path};

use once_cell::sync::Lazy;
use regex::Regex;

/// Only the head of a file is ever inspected.
pub const HEADER_BYTES: u64 = 1024;
pub const MAX_LINES: usize = 5;

static SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[=\-]+$").unwrap());

/// Reads the first `HEADER_BYTES` of `path` and extracts its description.
/// Any failure yields `None`.
pub fn from_file(path: &Path) -> Option<String> {
    let mut buf = Vec::with_capacity(HEADER_BYTES as usize);
    File::open(path)
        .and_then(|f| f.take(HEADER_BYTES).read_to_end(&mut buf))
        .ok()?;
    extract(&buf)
}

/// Derives a short summary from the leading comment block of a script.
///
/// Shebang lines are skipped, `#` and `//` comment lines are collected with
/// their markers stripped, and `====`/`----` separators are dropped. The first
/// non-blank, non-comment line after the block has started ends the scan.
pub fn extract(head: &[u8]) -> Option<String> {
    let text = decode_head(head)?;

    let mut lines: Vec<&str> = Vec::new();
    let mut in_comment_block = false;

    for line in text.split('\n') {
        let trimmed = line.trim();

        if trimmed.starts_with("#!") {
            continue;
        }

        if trimmed.starts_with('#') || trimmed.starts_with("//") {
            in_comment_block = true;
            let cleaned = trimmed.trim_start_matches(['#', '/']).trim();
            if !SEPARATOR.is_match(cleaned) {
                lines.push(cleaned);
            }
        } else if in_comment_block && !trimmed.is_empty() {
            break;
        }
    }

    if lines.is_empty() {
        return None;
    }

    lines.truncate(MAX_LINES);
    Some(lines.join("\n"))
}

/// A character cut in half by the bounded read is dropped; anything else
/// that is not UTF-8 means there is no description. A leading byte-order
/// mark is not part of the first line.
fn decode_head(head: &[u8]) -> Option<&str> {
    let text = match std::str::from_utf8(head) {
        Ok(s) => s,
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&head[..e.valid_up_to()]).ok()?,
        Err(_) => return None,
    };
    Some(text.strip_prefix('\u{feff}').unwrap_or(text))
}
