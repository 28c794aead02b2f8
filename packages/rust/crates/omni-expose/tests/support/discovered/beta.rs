//! Marked but never compiled into the test binary.

use omni_expose::Output;

/// Declared in source only.
#[omni_expose::expose(interfaces(cli))]
pub fn orphaned() -> Output {
    Output::ok(0)
}
