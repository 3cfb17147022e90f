//! Architectural Enforcement
//!
//! Shared helpers for the integration tests in `tests/` that enforce how the
//! client core is written:
//! - No blocking sleeps; backoff only where retries live
//! - No UI framework dependencies in the core
//! - No `unwrap()`/`expect()` in production code
//!
//! Production code is everything in a source file before its
//! `#[cfg(test)]` module.

use std::fs;
use std::path::{Path, PathBuf};

/// Source directory of the client core
pub fn core_src_dir() -> PathBuf {
    workspace_root().join("conductor/core/src")
}

/// Workspace root (two levels above this crate)
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every `.rs` file under `dir`, sorted
pub fn rust_sources(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// A line of production code
#[derive(Debug)]
pub struct CodeLine {
    /// 1-based line number
    pub number: usize,
    /// Code with any trailing `//` comment removed
    pub code: String,
    /// Original line, trimmed
    pub text: String,
}

/// Production lines of a file: stops at `#[cfg(test)]`, skips comment lines
pub fn production_lines(path: &Path) -> Vec<CodeLine> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim().starts_with("#[cfg(test)]"))
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .map(|(idx, line)| CodeLine {
            number: idx + 1,
            code: line.split("//").next().unwrap_or(line).to_string(),
            text: line.trim().to_string(),
        })
        .collect()
}

/// Path relative to the workspace root, for readable reports
pub fn display_path(path: &Path) -> String {
    path.strip_prefix(workspace_root())
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Print violations and panic if there are any
pub fn report(title: &str, hint: &str, violations: &[String]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!("\n{hint}");
    panic!(
        "\nFound {} violation(s) in production code.\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_sources_found() {
        let files = rust_sources(&core_src_dir());
        assert!(files.iter().any(|p| p.ends_with("lib.rs")));
    }
}
