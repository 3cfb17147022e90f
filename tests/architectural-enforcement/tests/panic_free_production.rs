//! Integration Test: Panic-Free Production Code
//!
//! **Policy**: Every failure in the core becomes a typed error or a surface
//! notification. `unwrap()`, `expect()` and `panic!` are for tests only.

use architectural_enforcement::{core_src_dir, display_path, production_lines, report, rust_sources};

const FORBIDDEN: &[&str] = &[".unwrap()", ".expect(", "panic!(", "unreachable!("];

#[test]
fn test_no_panics_in_production_code() {
    let mut violations = Vec::new();

    for path in rust_sources(&core_src_dir()) {
        for line in production_lines(&path) {
            if let Some(pattern) = FORBIDDEN.iter().find(|p| line.code.contains(*p)) {
                violations.push(format!(
                    "{}:{} - {}: {}",
                    display_path(&path),
                    line.number,
                    pattern,
                    line.text
                ));
            }
        }
    }

    report(
        "CRITICAL: Panicking calls found in production code!",
        "✅ Propagate with `?`, map into ApiError/AuthError, or notify the surface.",
        &violations,
    );
}
