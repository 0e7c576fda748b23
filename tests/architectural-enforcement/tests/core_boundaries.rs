//! Integration Test: Core Boundaries
//!
//! **Policy**:
//! - Production code MUST NOT block a runtime thread with `std::thread::sleep`.
//!   Use `tokio::time::sleep(..).await`.
//! - `cyberdesk-core` MUST NOT print. Output belongs to surfaces; the core logs
//!   through `tracing`.
//! - `cyberdesk-core` MUST NOT depend on CLI or UI frameworks.

use std::fs;

use architectural_enforcement::{find_violations, rust_files, workspace_root};

fn report(kind: &str, violations: &[String]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {kind} found in production code:\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!("\nFound {} violation(s). Fix these before merging!", violations.len());
}

#[test]
fn test_sources_are_found() {
    assert!(
        !rust_files("conductor/core/src").is_empty(),
        "core sources not found under {:?}",
        workspace_root()
    );
}

#[test]
fn test_no_blocking_sleep() {
    let mut violations = find_violations("conductor/core/src", &["std::thread::sleep", "thread::sleep("]);
    violations.extend(find_violations("conductor/cli/src", &["std::thread::sleep", "thread::sleep("]));
    report("Blocking sleep", &violations);
}

#[test]
fn test_core_does_not_print() {
    let violations = find_violations(
        "conductor/core/src",
        &["println!", "eprintln!", "print!(", "eprint!(", "dbg!("],
    );
    report("Direct printing", &violations);
}

#[test]
fn test_core_has_no_surface_dependencies() {
    let manifest = fs::read_to_string(workspace_root().join("conductor/core/Cargo.toml"))
        .expect("core manifest should be readable");

    let forbidden = ["clap", "ratatui", "crossterm", "anyhow", "tracing-subscriber"];
    let violations: Vec<String> = manifest
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let name = line.split('=').next()?.trim();
            forbidden
                .contains(&name)
                .then(|| format!("conductor/core/Cargo.toml: {line}"))
        })
        .collect();

    report("Surface dependency", &violations);
}
