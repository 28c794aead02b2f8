//! Autodiscovery: scan, then load.
//!
//! 1. **Scan** (`omni-expose-scanner`): parse the source tree and list files
//!    declaring `#[expose]` functions. Nothing runs.
//! 2. **Load**: take the `#[expose]` records linked into this binary and
//!    register only those whose source file is a scan candidate.
//!
//! Loading is idempotent: a record whose function is already registered from
//! the same source is skipped, so repeated calls add nothing and succeed even
//! on a frozen registry.

use std::path::{Path, PathBuf};

use omni_expose_scanner::{ScanCandidate, SourceScanner};

use crate::errors::DiscoveryError;
use crate::registry::{ExposedFunction, Registry, declared_functions};

/// What one autodiscovery pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Candidate files from the scan.
    pub candidates: Vec<PathBuf>,
    /// Names registered by this pass.
    pub registered: Vec<String>,
    /// Names skipped because they were already registered from the same source.
    pub already_loaded: Vec<String>,
    /// Functions marked in scanned sources but not linked into this binary.
    pub unlinked: Vec<String>,
}

/// Scan `root` and register every linked declaration found there.
///
/// # Errors
///
/// Fails when the scan cannot start or a declaration is rejected.
pub fn autodiscover(
    root: &Path,
    registry: &mut Registry,
) -> Result<DiscoveryReport, DiscoveryError> {
    let candidates = SourceScanner::new().scan(root)?;
    load(&candidates, declared_functions(), registry)
}

/// Register the declarations whose source file is among `candidates`.
///
/// # Errors
///
/// Fails on the first rejected declaration.
pub fn load<'a>(
    candidates: &[ScanCandidate],
    declared: impl IntoIterator<Item = &'a ExposedFunction>,
    registry: &mut Registry,
) -> Result<DiscoveryReport, DiscoveryError> {
    let mut selected: Vec<&ExposedFunction> = declared
        .into_iter()
        .filter(|record| candidates.iter().any(|c| c.matches_source(record.source_file)))
        .collect();
    selected.sort_by_key(|record| (record.source_file, record.name));

    let mut report = DiscoveryReport {
        candidates: candidates.iter().map(|c| c.path.clone()).collect(),
        ..DiscoveryReport::default()
    };

    for record in &selected {
        if is_loaded(registry, record) {
            report.already_loaded.push(record.name.to_string());
            continue;
        }
        let entry = registry.register(record.definition())?;
        tracing::debug!(function = %entry.name, source = record.source_file, "loaded");
        report.registered.push(record.name.to_string());
    }

    for candidate in candidates {
        for function in &candidate.functions {
            let linked = selected
                .iter()
                .any(|r| r.ident == function.name && candidate.matches_source(r.source_file));
            if !linked {
                report.unlinked.push(function.name.clone());
            }
        }
    }
    if !report.unlinked.is_empty() {
        tracing::debug!(
            functions = ?report.unlinked,
            "marked functions not linked into this binary; skipped"
        );
    }

    tracing::info!(
        candidates = report.candidates.len(),
        registered = report.registered.len(),
        already_loaded = report.already_loaded.len(),
        "autodiscovery finished"
    );
    Ok(report)
}

fn is_loaded(registry: &Registry, record: &ExposedFunction) -> bool {
    registry.get(record.name).is_some_and(|entry| {
        entry.source_file.as_deref() == Some(record.source_file)
            && entry.module_path.as_deref() == Some(record.module_path)
    })
}
