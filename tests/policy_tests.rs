#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Project policy tests for the spy/word client.
//!
//! These verify that Cargo.toml keeps the panic-free lint policy, that the
//! feature layout still matches what the code gates on, and that every demo
//! target points at a real file. All checks are synchronous filesystem reads.

use std::path::PathBuf;

/// Returns the project root directory (where Cargo.toml lives).
fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Reads a file relative to the project root and returns its contents.
fn read_project_file(relative_path: &str) -> String {
    let path = project_root().join(relative_path);
    std::fs::read_to_string(&path).unwrap_or_else(|e| {
        panic!(
            "Failed to read '{}': {}. This file is required by project policy.",
            path.display(),
            e
        )
    })
}

fn manifest() -> toml::Table {
    read_project_file("Cargo.toml")
        .parse::<toml::Table>()
        .expect("Cargo.toml must be valid TOML")
}

fn table<'a>(parent: &'a toml::Table, key: &str) -> &'a toml::Table {
    parent
        .get(key)
        .and_then(toml::Value::as_table)
        .unwrap_or_else(|| panic!("Cargo.toml is missing the [{key}] table"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: panic_policy
// ─────────────────────────────────────────────────────────────────────────────

mod panic_policy {
    use super::*;

    const REQUIRED_DENY_LINTS: &[&str] = &[
        "unwrap_used",
        "expect_used",
        "panic",
        "todo",
        "unimplemented",
        "indexing_slicing",
    ];

    #[test]
    fn cargo_toml_denies_all_panic_prone_lints() {
        let manifest = manifest();
        let clippy = table(table(&manifest, "lints"), "clippy");

        for lint in REQUIRED_DENY_LINTS {
            assert_eq!(
                clippy.get(*lint).and_then(toml::Value::as_str),
                Some("deny"),
                "Cargo.toml must set `{lint} = \"deny\"` in [lints.clippy]. \
                 Library code propagates errors instead of panicking."
            );
        }
    }

    #[test]
    fn test_modules_opt_out_of_panic_lints() {
        let src = project_root().join("src");
        let mut stack = vec![src];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let contents = std::fs::read_to_string(&path).unwrap();
                if let Some(at) = contents.find("#[cfg(test)]") {
                    let tail = &contents[at..];
                    assert!(
                        tail.contains("clippy::unwrap_used"),
                        "{} has a test module without the panic-lint allow block",
                        path.display()
                    );
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: manifest_policy
// ─────────────────────────────────────────────────────────────────────────────

mod manifest_policy {
    use super::*;

    #[test]
    fn default_features_cover_both_shipped_backends() {
        let manifest = manifest();
        let features = table(&manifest, "features");
        let default: Vec<&str> = features["default"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(toml::Value::as_str)
            .collect();
        assert!(default.contains(&"transport-websocket"));
        assert!(default.contains(&"query-http"));
    }

    #[test]
    fn backends_pull_in_the_runtime() {
        let manifest = manifest();
        let features = table(&manifest, "features");
        for backend in ["transport-websocket", "query-http"] {
            let enabled: Vec<&str> = features[backend]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(toml::Value::as_str)
                .collect();
            assert!(
                enabled.contains(&"tokio-runtime"),
                "feature `{backend}` must enable `tokio-runtime`"
            );
        }
    }

    #[test]
    fn msrv_is_declared() {
        let manifest = manifest();
        let package = table(&manifest, "package");
        let msrv = package
            .get("rust-version")
            .and_then(toml::Value::as_str)
            .expect("Cargo.toml must declare rust-version");
        assert!(msrv.split('.').count() >= 2, "malformed rust-version {msrv}");
    }

    #[test]
    fn every_demo_target_exists() {
        let manifest = manifest();
        let demos = manifest["example"].as_array().expect("[[example]] targets");
        assert!(!demos.is_empty());
        for demo in demos {
            let path = demo["path"].as_str().unwrap();
            assert!(
                project_root().join(path).is_file(),
                "demo target '{path}' does not exist"
            );
        }
    }
}
