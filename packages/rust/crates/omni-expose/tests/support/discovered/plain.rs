//! No marked functions; scanning skips this file even though it says expose.

/// Helper that nothing exposes.
pub fn helper() -> u8 {
    1
}
