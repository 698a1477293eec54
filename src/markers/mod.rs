//! Marker search over the working tree
//!
//! Walks the tree below a root, skipping excluded directories and files,
//! symlinks, and anything that is not UTF-8 text, and reports every line
//! the pattern matches. Entries are visited in sorted order so repeated
//! scans of the same tree report the same matches in the same order.

use crate::core::step::ConditionPattern;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directories skipped unless a pipeline overrides them
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["target", ".git"];

/// Which part of the tree a marker search covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerScope {
    /// Directory names never descended into
    pub exclude_dirs: Vec<String>,

    /// File names, or paths relative to the root, never searched
    pub exclude_files: Vec<String>,
}

impl Default for MarkerScope {
    fn default() -> Self {
        Self {
            exclude_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect(),
            exclude_files: Vec::new(),
        }
    }
}

impl MarkerScope {
    fn excludes_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
    }

    fn excludes_file(&self, name: &str, relative: &Path) -> bool {
        self.exclude_files
            .iter()
            .any(|f| f == name || Path::new(f) == relative)
    }
}

/// One matching line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerMatch {
    /// Path relative to the scanned root
    pub path: PathBuf,

    /// 1-based line number
    pub line: usize,

    /// The matching line, trimmed
    pub text: String,
}

impl std::fmt::Display for MarkerMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.path.display(), self.line, self.text)
    }
}

/// Scans a tree for a pattern
pub struct MarkerScanner<'a> {
    pattern: &'a ConditionPattern,
    scope: &'a MarkerScope,
}

impl<'a> MarkerScanner<'a> {
    pub fn new(pattern: &'a ConditionPattern, scope: &'a MarkerScope) -> Self {
        Self { pattern, scope }
    }

    /// Collect every match below `root`
    ///
    /// # Errors
    /// Only if `root` itself cannot be listed. Unreadable entries below it
    /// are skipped.
    pub fn scan(&self, root: &Path) -> io::Result<Vec<MarkerMatch>> {
        let mut matches = Vec::new();
        let mut pending = vec![PathBuf::new()];
        let mut first = true;

        while let Some(relative) = pending.pop() {
            let dir = root.join(&relative);
            let entries = match sorted_entries(&dir) {
                Ok(entries) => entries,
                Err(e) if first => return Err(e),
                Err(e) => {
                    debug!("Skipping unreadable directory {}: {}", dir.display(), e);
                    continue;
                }
            };
            first = false;

            let mut subdirs = Vec::new();
            for entry in entries {
                let file_type = match entry.file_type() {
                    Ok(t) => t,
                    Err(_) => continue,
                };
                let name = entry.file_name().to_string_lossy().into_owned();
                let entry_relative = relative.join(&name);

                if file_type.is_symlink() {
                    continue;
                }
                if file_type.is_dir() {
                    if !self.scope.excludes_dir(&name) {
                        subdirs.push(entry_relative);
                    }
                    continue;
                }
                if !file_type.is_file() || self.scope.excludes_file(&name, &entry_relative) {
                    continue;
                }

                self.scan_file(&entry.path(), &entry_relative, &mut matches);
            }

            // Reverse so the stack pops subdirectories in sorted order
            pending.extend(subdirs.into_iter().rev());
        }

        Ok(matches)
    }

    fn scan_file(&self, path: &Path, relative: &Path, matches: &mut Vec<MarkerMatch>) {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Skipping unreadable file {}: {}", path.display(), e);
                return;
            }
        };
        if bytes.contains(&0) {
            return;
        }
        // Non-UTF-8 text is still searched; bad bytes become U+FFFD
        let text = String::from_utf8_lossy(&bytes);

        for (number, line) in text.lines().enumerate() {
            if self.pattern.matches(line) {
                matches.push(MarkerMatch {
                    path: relative.to_path_buf(),
                    line: number + 1,
                    text: line.trim().to_string(),
                });
            }
        }
    }
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}
