//! Omni-Expose-Scanner - phase one of autodiscovery.
//!
//! Walks a source tree and parses every `.rs` file with `syn`, reporting the
//! files that declare `#[expose]` functions. Nothing is compiled, loaded or
//! executed here; the loader in `omni-expose` decides what to register from
//! the candidate list.
//!
//! # Architecture
//!
//! ```text
//! omni-expose-scanner/src/
//! ├── lib.rs       # Module declarations and exports
//! ├── marker.rs    # Syntax-tree search for the marker attribute
//! └── scanner.rs   # Directory walk, candidate list
//! ```

pub mod marker;
pub mod scanner;

pub use marker::{MarkedFunction, find_marked_functions};
pub use scanner::{DEFAULT_MARKER, ScanCandidate, ScanError, SourceScanner};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
