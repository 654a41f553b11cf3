//! Scheduler dialects
//!
//! A dialect describes one legacy command syntax: its directive marker,
//! its option table, and how a reconciled option set maps onto the remote
//! job's resources, environment and launch line. Two dialects exist, [`Sge`]
//! (`qsub`) and [`Slurm`] (`sbatch`).

mod sge;
mod slurm;

pub use sge::Sge;
pub use slurm::Slurm;

use crate::error::Result;
use crate::flags::{OptionSpec, ResolvedJobSpec};
use crate::resources::ResourceRequest;
use crate::script::ScanOptions;
use std::collections::BTreeMap;

/// Fallback directory when the submit directory is unknown
pub const HOME_DIR: &str = "${HOME}";

/// Fallback submit host name
pub const LOCALHOST: &str = "localhost";

/// Facts about the submission that are not scheduler options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobContext {
    /// Cluster label the credentials were resolved from
    pub cluster: String,
    /// API user name
    pub username: String,
    /// Label the job is submitted under
    pub job_label: String,
    /// Requested queue (partition) name
    pub queue: String,
    /// Directory the command was run from
    pub submit_dir: Option<String>,
    /// Host the command was run on
    pub submit_host: Option<String>,
}

impl JobContext {
    pub fn submit_dir_or_home(&self) -> &str {
        self.submit_dir.as_deref().unwrap_or(HOME_DIR)
    }

    pub fn submit_host_or_localhost(&self) -> &str {
        self.submit_host.as_deref().unwrap_or(LOCALHOST)
    }
}

/// One legacy scheduler syntax
pub trait Dialect {
    /// Command name (`qsub`, `sbatch`)
    fn name(&self) -> &'static str;

    /// Directive marker following `#` in scripts
    fn marker(&self) -> &'static str;

    /// Whether directives end at the first command line of the script
    fn stops_at_first_command(&self) -> bool {
        false
    }

    /// The option table
    fn options(&self) -> &'static [OptionSpec];

    /// Rewrite raw arguments into the form the option table parses
    fn normalize_args(&self, args: &[String]) -> Result<Vec<String>> {
        Ok(args.to_vec())
    }

    /// How an option is spelled in diagnostics
    fn spelling(&self, option: &OptionSpec) -> String {
        option.display_name()
    }

    /// How a flag missing from the option table is spelled in diagnostics
    fn unknown_spelling(&self, flag: &str) -> String {
        flag.to_string()
    }

    /// Scanner settings for this dialect's scripts
    fn scan_options(&self) -> ScanOptions<'static> {
        ScanOptions {
            marker: self.marker(),
            stop_at_first_command: self.stops_at_first_command(),
        }
    }

    /// Command submitted in place of a script, if any
    fn inline_command(&self, cli: &ResolvedJobSpec, positionals: &[String]) -> Result<Option<String>>;

    /// Cluster label requested through options
    fn cluster_name(&self, spec: &ResolvedJobSpec) -> Result<Option<String>>;

    /// Requested queue name
    fn queue_name(&self, spec: &ResolvedJobSpec) -> String;

    /// Job name requested through options
    fn job_name(&self, spec: &ResolvedJobSpec) -> Option<String>;

    /// Decode the resource request
    fn resources(&self, spec: &ResolvedJobSpec) -> Result<ResourceRequest>;

    /// Requested node count, not yet validated against a queue
    fn node_scale(&self, spec: &ResolvedJobSpec) -> Result<i64>;

    /// Shell the script body runs under
    fn shell(&self, _spec: &ResolvedJobSpec, interpreter: &str) -> String {
        interpreter.to_string()
    }

    /// Directory the job changes into before running
    fn working_dir(&self, spec: &ResolvedJobSpec, ctx: &JobContext) -> Option<String>;

    /// Wall clock limit passed through to the application
    fn walltime(&self, spec: &ResolvedJobSpec) -> Result<Option<String>>;

    /// `exec` line redirecting the job's output, if requested
    fn output_redirect(&self, spec: &ResolvedJobSpec) -> Option<String>;

    /// Scheduler variables exported to the job
    fn environment(&self, spec: &ResolvedJobSpec, ctx: &JobContext) -> BTreeMap<String, String>;

    /// Shell preamble; `{hosts_entry}` is replaced by the submit host entry
    fn preamble_template(&self) -> &'static str;

    /// Runtime variables set on the launch line
    fn launch_variables(&self) -> &'static [(&'static str, &'static str)];

    /// Confirmation printed after a successful submission
    fn submitted_message(&self, number: u64, label: &str) -> String;
}

/// Placeholder in preamble templates
pub const HOSTS_ENTRY: &str = "{hosts_entry}";

/// Quote a path for a POSIX shell, keeping `$` expansions live
pub(crate) fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Build an `exec` redirection line
pub(crate) fn redirect_line(stdout: Option<&str>, stderr: Option<&str>, join: bool) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(out) = stdout {
        parts.push(format!(">{}", shell_quote(out)));
    }
    match stderr {
        _ if join && stdout.is_some() => parts.push("2>&1".to_string()),
        Some(err) => parts.push(format!("2>{}", shell_quote(err))),
        None => {}
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("exec {}", parts.join(" ")))
    }
}
