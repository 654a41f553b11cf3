//! # HPCBridge - SGE and Slurm job submission for JARVICE
//!
//! HPCBridge lets users keep their `qsub` and `sbatch` command lines and job
//! scripts while running on the JARVICE job API. A submission is translated
//! in four steps:
//!
//! - **Scanning**: the job script is split into interpreter, directive
//!   arguments (`#$ ...`, `#SBATCH ...`) and body
//! - **Reconciliation**: directive and command line options are parsed with
//!   the same per-dialect schema and merged; the command line wins unless
//!   override mode is on
//! - **Decoding**: memory, core, GPU and generic resource strings become
//!   normalized values
//! - **Assembly**: the resolved options, the queue metadata and a generated
//!   shell preamble form the JSON submission payload
//!
//! ## Quick Start
//!
//! ```no_run
//! use hpcbridge::dialect::Slurm;
//! use hpcbridge::flags::{parse_args, reconcile};
//! use hpcbridge::script::scan;
//! use hpcbridge::dialect::Dialect;
//!
//! let script = "#!/bin/bash\n#SBATCH -N 2\n#SBATCH --mem=4G\nsrun ./sim\n";
//! let set = scan(script.as_bytes(), Slurm.scan_options()).unwrap();
//! let cli = parse_args(&Slurm, &["--time=01:00:00".to_string()]).unwrap();
//! let resolved = reconcile(&Slurm, &cli, set.directive_args(), false).unwrap();
//!
//! let resources = Slurm.resources(&resolved.spec).unwrap();
//! assert_eq!(resources.memory_gib, 4);
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod commands;
pub mod config;
pub mod dialect;
pub mod error;
pub mod flags;
pub mod request;
pub mod resources;
pub mod script;

// Re-export commonly used types
pub use dialect::{Dialect, Sge, Slurm};
pub use error::{HpcError, Result};
pub use flags::ResolvedJobSpec;
pub use request::JobSubmissionRequest;
pub use script::ScriptDirectiveSet;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
