//! Flag reconciliation
//!
//! Scheduler options arrive from two places: the command line and the
//! directives embedded in the job script. Both lists are parsed against the
//! same per-dialect schema and merged into one [`ResolvedJobSpec`]. A value
//! given on the command line beats the same value given in the script,
//! unless override mode is on.

mod option;
mod reconcile;
mod schema;

pub use option::*;
pub use reconcile::*;
pub use schema::*;
