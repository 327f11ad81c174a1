// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session output files.
//!
//! Each live session maintains `session_output/{short_id}.txt`, appended on
//! every poll and deleted on close or pane death. Adapters read it back for
//! large-output download links.

use std::path::{Path, PathBuf};

/// Handle on the session_output directory.
#[derive(Clone)]
pub struct OutputFiles {
    dir: PathBuf,
}

impl OutputFiles {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("session_output"),
        }
    }

    pub fn path(&self, short_id: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", short_id))
    }

    /// Create the (empty) file for a new session.
    pub fn create(&self, short_id: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(short_id), b"")?;
        Ok(())
    }

    /// Append a poll delta.
    pub fn append(&self, short_id: &str, text: &str) -> std::io::Result<()> {
        use std::io::Write;
        std::fs::create_dir_all(&self.dir)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(short_id))?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }

    pub fn read(&self, short_id: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.path(short_id))
    }

    /// Delete the file. Missing files are fine (close after death).
    pub fn delete(&self, short_id: &str) {
        if let Err(e) = std::fs::remove_file(self.path(short_id)) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(short_id, error = %e, "failed to delete output file");
            }
        }
    }

    pub fn exists(&self, short_id: &str) -> bool {
        self.path(short_id).exists()
    }
}

#[cfg(test)]
#[path = "output_file_tests.rs"]
mod tests;
