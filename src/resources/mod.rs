//! Resource decoding
//!
//! Pure functions that turn scheduler resource strings (memory sizes, GPU
//! requests, generic resource lists) into normalized values, and the
//! [`ResourceRequest`] they are collected into.

mod decode;
mod list;
mod request;

pub use decode::*;
pub use list::*;
pub use request::*;
