//! Integration Test: UI Independence
//!
//! **Policy**: The client core is UI-agnostic. It must not depend on any
//! terminal or GUI framework; surfaces depend on the core, never the reverse.

use std::fs;

use architectural_enforcement::{
    core_src_dir, display_path, production_lines, report, rust_sources, workspace_root,
};

const UI_CRATES: &[&str] = &["ratatui", "crossterm", "egui", "iced", "tauri", "yew", "leptos"];

#[test]
fn test_core_manifest_has_no_ui_crates() {
    let manifest = workspace_root().join("conductor/core/Cargo.toml");
    let content = fs::read_to_string(&manifest).expect("core manifest readable");

    let violations: Vec<String> = content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| {
            let name = line.split('=').next()?.trim();
            UI_CRATES
                .contains(&name)
                .then(|| format!("conductor/core/Cargo.toml - UI dependency: {}", line.trim()))
        })
        .collect();

    report(
        "CRITICAL: UI framework dependency in the core!",
        "✅ Move rendering code into a surface crate.",
        &violations,
    );
}

#[test]
fn test_core_sources_do_not_import_ui_crates() {
    let mut violations = Vec::new();

    for path in rust_sources(&core_src_dir()) {
        for line in production_lines(&path) {
            if let Some(krate) = UI_CRATES
                .iter()
                .find(|krate| line.code.contains(&format!("{krate}::")))
            {
                violations.push(format!(
                    "{}:{} - Uses {}: {}",
                    display_path(&path),
                    line.number,
                    krate,
                    line.text
                ));
            }
        }
    }

    report(
        "CRITICAL: UI framework code in the core!",
        "✅ Send a SurfaceMessage and let the surface render it.",
        &violations,
    );
}
