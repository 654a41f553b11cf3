//! Submission request assembly
//!
//! Turns a reconciled job specification, the scanned script and the queue
//! metadata into the JSON payload of the JARVICE submit endpoint.

mod assembler;
mod model;
mod preamble;

pub use assembler::*;
pub use model::*;
pub use preamble::*;
