// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exit markers.
//!
//! A marker is a sentinel echoed after a shell command so the output poller
//! can detect completion and capture the exit code:
//!
//! ```text
//! __EXIT__{hex-hash}__$?__
//! ```
//!
//! The shell expands `$?`, so the pane shows `__EXIT__{hash}__0__` once the
//! command finishes. The hash is unique per command, which keeps nested
//! shell composition parseable, and every marker occurrence (template and
//! expanded) is stripped before output is exposed.

use sha2::{Digest, Sha256};

const PREFIX: &str = "__EXIT__";
const HASH_LEN: usize = 16;

/// A per-command exit marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitMarker {
    hash: String,
}

impl ExitMarker {
    /// Generate a marker for a command. The hash digests the command text
    /// plus a fresh uuid, so resending the same command gets a new marker.
    pub fn generate(command: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(command.as_bytes());
        hasher.update(uuid::Uuid::new_v4().as_bytes());
        let digest = hasher.finalize();
        let mut hash = String::with_capacity(HASH_LEN);
        for byte in digest.iter().take(HASH_LEN / 2) {
            use std::fmt::Write;
            let _ = write!(hash, "{:02x}", byte);
        }
        Self { hash }
    }

    /// Reconstruct a marker from a known hash (poller side).
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The literal text keyed into the pane (shell expands `$?`).
    pub fn template(&self) -> String {
        format!("{}{}__$?__", PREFIX, self.hash)
    }

    /// Append the marker echo to a command line.
    pub fn append_to(&self, command: &str) -> String {
        format!("{}; echo \"{}\"", command, self.template())
    }

    /// Scan text for this marker's expanded form and return the exit code.
    ///
    /// The echoed command line also contains the marker template (with a
    /// literal `$?`), which must not count as completion; only a numeric
    /// expansion does.
    pub fn find_exit_code(&self, text: &str) -> Option<i32> {
        let needle = format!("{}{}__", PREFIX, self.hash);
        let mut rest = text;
        while let Some(pos) = rest.find(&needle) {
            let after = &rest[pos + needle.len()..];
            if let Some((code, _)) = parse_code(after) {
                return Some(code);
            }
            rest = &rest[pos + needle.len()..];
        }
        None
    }

    /// Remove every occurrence of this marker (template and expanded),
    /// dropping lines that become empty.
    pub fn strip(&self, text: &str) -> String {
        let needle = format!("{}{}__", PREFIX, self.hash);
        let mut out = String::with_capacity(text.len());
        for line in text.lines() {
            let cleaned = strip_line(line, &needle);
            // Drop lines that were nothing but marker
            if cleaned.trim().is_empty() && line.contains(&needle) {
                continue;
            }
            out.push_str(&cleaned);
            out.push('\n');
        }
        // Preserve absence of trailing newline
        if !text.ends_with('\n') && out.ends_with('\n') {
            out.pop();
        }
        out
    }
}

/// Parse `<code>__` or `$?__` at the start of `after`; returns the code and
/// consumed length. The template form yields no code but is still a marker.
fn parse_code(after: &str) -> Option<(i32, usize)> {
    let end = after.find("__")?;
    let body = &after[..end];
    if body.is_empty() || body.len() > 4 {
        return None;
    }
    body.parse::<i32>().ok().map(|code| (code, end + 2))
}

/// Length of a marker occurrence starting at `start` (which points at the
/// needle), covering both `$?` and numeric suffixes. None if the suffix is
/// not marker-shaped.
fn marker_suffix_len(after: &str) -> Option<usize> {
    if after.starts_with("$?__") {
        return Some(4);
    }
    parse_code(after).map(|(_, len)| len)
}

fn strip_line(line: &str, needle: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(pos) = rest.find(needle) {
        let after = &rest[pos + needle.len()..];
        match marker_suffix_len(after) {
            Some(len) => {
                let mut head = &rest[..pos];
                // Swallow the `; echo "` scaffolding around a template
                // occurrence so echoed command lines read clean.
                if after[..len].starts_with("$?") {
                    if let Some(echo_pos) = head.rfind("; echo ") {
                        head = &head[..echo_pos];
                    }
                }
                out.push_str(head.trim_end_matches('"'));
                rest = after[len..].trim_start_matches('"');
            }
            None => {
                out.push_str(&rest[..pos + needle.len()]);
                rest = &rest[pos + needle.len()..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[path = "marker_tests.rs"]
mod tests;
