//! Functions linked into the autodiscovery tests.

use omni_expose::{Output, expose};

/// Report the service status.
#[expose(methods(GET), interfaces(api, tool))]
pub fn service_status() -> Output {
    Output::ok("running")
}

/// Sum a list of integers.
///
/// # Arguments
///
/// * `values` - Integers to add.
#[expose(methods(POST), interfaces(api, cli), defaults(values = []))]
pub fn sum_values(values: Vec<i64>) -> Output {
    Output::ok(values.iter().sum::<i64>())
}
