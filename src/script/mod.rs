//! Job script scanning
//!
//! Splits a submitted script into its interpreter, the scheduler directives
//! embedded in comment lines, and the remaining body that is shipped to the
//! remote service.

mod scanner;

pub use scanner::*;
