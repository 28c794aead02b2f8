use omni_expose::{Output, expose};

/// Add two integers.
///
/// # Arguments
///
/// * `a` - Left operand.
/// * `b` - Right operand.
#[expose(methods(GET, POST), interfaces(api, cli, tool))]
fn add(a: i64, b: i64) -> Output {
    match a.checked_add(b) {
        Some(sum) => Output::ok(sum),
        None => Output::failure(format!("{a} + {b} overflows")),
    }
}

/// Divide two numbers.
///
/// # Arguments
///
/// * `dividend` - Number to divide.
/// * `divisor` - Number to divide by; must not be zero.
/// * `rounding` - How to round the quotient.
#[expose(
    methods(GET),
    interfaces(api, cli, tool),
    defaults(rounding = "none"),
    choices(rounding = ["none", "floor", "ceil", "nearest"])
)]
fn divide(dividend: f64, divisor: f64, rounding: String) -> Result<Output, String> {
    if divisor == 0.0 {
        return Err("division by zero".to_string());
    }
    let quotient = dividend / divisor;
    let quotient = match rounding.as_str() {
        "floor" => quotient.floor(),
        "ceil" => quotient.ceil(),
        "nearest" => quotient.round(),
        _ => quotient,
    };
    Ok(Output::ok(quotient))
}
