//! JARVICE API client
//!
//! Thin blocking client for the endpoints the scheduler commands use.
//!
//! ## Endpoints
//!
//! | Endpoint | Method | Used by |
//! |----------|--------|---------|
//! | `/jarvice/queues` | GET | `qsub`, `sbatch`, `sinfo`, `qconf` |
//! | `/jarvice/submit` | POST | `qsub`, `sbatch` |
//! | `/jarvice/jobs` | GET | `qstat`, `squeue`, `qacct` |
//! | `/jarvice/shutdown` | GET | `qdel`, `scancel` |
//! | `/jarvice/terminate` | GET | `qdel -f`, `scancel -f` |
//! | `/jarvice/live` | GET | `login` |
//! | `/jarvice/machines` | GET | `login` (credential check) |

mod client;
mod models;

pub use client::*;
pub use models::*;
