//! Functions shipped with the binary.

mod arithmetic;
mod greetings;
