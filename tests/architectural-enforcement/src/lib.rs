//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No blocking sleeps in production code
//! - The core library never prints; it logs through `tracing`
//! - The core library stays free of CLI and UI dependencies
//!
//! The helpers here locate workspace sources and strip test code and comments
//! so the checks only see production lines.

use std::fs;
use std::path::{Path, PathBuf};

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// All `.rs` files under a workspace-relative directory
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let path = workspace_root().join(dir);
    if !path.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// Production lines of a source file as `(line_number, code)`
///
/// Everything from the first `#[cfg(test)]` on is treated as test code.
/// Comment lines are dropped and trailing comments are cut.
pub fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .map(|(idx, line)| {
            let code = line.split(" // ").next().unwrap_or(line);
            (idx + 1, code.to_string())
        })
        .collect()
}

/// Every production line under `dir` containing any of `patterns`
pub fn find_violations(dir: &str, patterns: &[&str]) -> Vec<String> {
    let mut violations = Vec::new();
    for file in rust_files(dir) {
        for (line_number, code) in production_lines(&file) {
            if let Some(pattern) = patterns.iter().find(|p| code.contains(*p)) {
                violations.push(format!(
                    "{}:{}: {} ({})",
                    file.display(),
                    line_number,
                    code.trim(),
                    pattern
                ));
            }
        }
    }
    violations
}
