//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Core production code waits on I/O, channels and intervals,
//! never on sleeps.
//! **Exceptions**: retry backoff in the HTTP gateway.

use architectural_enforcement::{core_src_dir, display_path, production_lines, report, rust_sources};

/// Files allowed to await `tokio::time::sleep` (backoff between retries)
const BACKOFF_FILES: &[&str] = &["gateway/http.rs"];

#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();

    for path in rust_sources(&core_src_dir()) {
        let allow_backoff = BACKOFF_FILES.iter().any(|f| path.ends_with(f));

        for line in production_lines(&path) {
            if line.code.contains("thread::sleep") {
                violations.push(format!(
                    "{}:{} - Blocking sleep: {}",
                    display_path(&path),
                    line.number,
                    line.text
                ));
            }
            if line.code.contains("time::sleep") && !allow_backoff {
                violations.push(format!(
                    "{}:{} - Async sleep outside retry backoff: {}",
                    display_path(&path),
                    line.number,
                    line.text
                ));
            }
        }
    }

    report(
        "CRITICAL: Sleep calls found in production code!",
        "✅ Use tokio::time::interval() for periodic work and channels/Notify to wait for events.",
        &violations,
    );
}
