//! Scan-then-load over `tests/support/discovered`.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use omni_expose::{DiscoveryError, Output, Registry, autodiscover, expose};
use omni_expose_scanner::ScanError;

#[path = "support/discovered/alpha.rs"]
mod alpha;

/// Linked, but declared outside the scanned tree.
#[expose(methods(GET), interfaces(api))]
fn outside_root() -> Output {
    Output::ok(false)
}

fn root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/support/discovered")
}

#[test]
fn only_scanned_sources_are_loaded() {
    let mut registry = Registry::new();
    let report = autodiscover(&root(), &mut registry).unwrap();

    let candidates: Vec<_> = report
        .candidates
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(candidates, vec!["alpha.rs", "beta.rs"]);

    assert_eq!(report.registered, vec!["service_status", "sum_values"]);
    assert_eq!(report.unlinked, vec!["orphaned"]);
    assert_eq!(registry.len(), 2);

    let entry = registry.get("sum_values").unwrap();
    assert_eq!(entry.description, "Sum a list of integers.");
    assert!(entry.source_file.as_deref().unwrap().ends_with("alpha.rs"));
}

#[test]
fn discovered_functions_are_callable() {
    let mut registry = Registry::new();
    autodiscover(&root(), &mut registry).unwrap();
    let entry = registry.get("sum_values").unwrap();
    let input = omni_expose::RawInput::Body(omni_expose::serde_json::json!({"values": [1, 2, 3]}));
    assert_eq!(omni_expose::invoke(entry, &input).unwrap(), Output::ok(6));
    assert_eq!(alpha::service_status(), Output::ok("running"));
}

#[test]
fn repeated_discovery_is_idempotent() {
    let mut registry = Registry::new();
    autodiscover(&root(), &mut registry).unwrap();
    registry.freeze();

    let report = autodiscover(&root(), &mut registry).unwrap();
    assert!(report.registered.is_empty());
    assert_eq!(report.already_loaded, vec!["service_status", "sum_values"]);
    assert_eq!(registry.len(), 2);
}

#[test]
fn missing_root_is_an_error() {
    let mut registry = Registry::new();
    let err = autodiscover(Path::new("/definitely/not/here"), &mut registry).unwrap_err();
    assert!(matches!(err, DiscoveryError::Scan(ScanError::RootNotFound(_))));
    assert!(registry.is_empty());
}

#[test]
fn file_root_is_an_error() {
    let mut registry = Registry::new();
    let err = autodiscover(&root().join("alpha.rs"), &mut registry).unwrap_err();
    assert!(matches!(err, DiscoveryError::Scan(ScanError::NotADirectory(_))));
}

#[test]
fn linked_declarations_outside_the_root_are_ignored() {
    assert!(
        omni_expose::declared_functions().any(|record| record.name == "outside_root")
    );
    assert_eq!(outside_root(), Output::ok(false));

    let mut registry = Registry::new();
    autodiscover(&root(), &mut registry).unwrap();
    assert!(registry.get("outside_root").is_none());
}
