//! Command line settings for HPCBridge
//!
//! The outer command line: global settings plus one subcommand per
//! emulated scheduler tool. Scheduler flags of `qsub` and `sbatch` are not
//! parsed here; they are passed through raw to the dialect schemas.

use super::cluster::{DEFAULT_CLUSTER, DEFAULT_TIMEOUT_SECS, DEFAULT_VAULT};
use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable enabling override mode
pub const SCRIPT_OVERRIDE_ENV: &str = "HPCBRIDGE_SCRIPT_OVERRIDE";

/// Environment variable naming the cluster config file
pub const CONFIG_PATH_ENV: &str = "JARVICE_HPC_CONFIG";

/// Subcommands that may be invoked through a link of the same name
pub const LINKED_COMMANDS: &[&str] = &[
    "qsub", "sbatch", "qstat", "squeue", "qacct", "qdel", "scancel", "sinfo", "qconf",
];

/// HPCBridge - run SGE and Slurm jobs on JARVICE
#[derive(Parser, Debug, Clone)]
#[command(name = "hpcbridge")]
#[command(author = "HPCBridge Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Submit SGE and Slurm batch jobs to the JARVICE job API")]
#[command(long_about = r#"
HPCBridge accepts qsub and sbatch command lines and job scripts, translates
them into JARVICE job submissions, and emulates the matching status and
control commands.

Link the binary as qsub, sbatch, qstat, ... to use it in place of the
scheduler tools.

Examples:
  hpcbridge login --endpoint https://cloud.example.com --username me --apikey KEY
  hpcbridge sbatch -N 2 --time=01:00:00 job.sh
  hpcbridge qsub -pe mpi 4 -l mc_name=n3 job.sh
  hpcbridge squeue
"#)]
pub struct CliArgs {
    /// Let job script directives override command line flags
    #[arg(long, env = SCRIPT_OVERRIDE_ENV, value_parser = FalseyValueParser::new())]
    pub script_override: bool,

    /// Cluster config file
    #[arg(long, env = CONFIG_PATH_ENV, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl CliArgs {
    /// Parse the process arguments, honouring the name the binary runs as
    pub fn from_invocation() -> Self {
        Self::parse_from(dispatch_args(std::env::args_os()))
    }
}

/// Insert the subcommand when the binary runs through a link named after it
pub fn dispatch_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let invoked = args
        .first()
        .and_then(|arg0| Path::new(arg0).file_name())
        .and_then(|name| name.to_str())
        .map(str::to_string);
    if let Some(name) = invoked {
        if LINKED_COMMANDS.contains(&name.as_str()) {
            args[0] = OsString::from("hpcbridge");
            args.insert(1, OsString::from(name));
        }
    }
    args
}

/// Raw scheduler arguments handed to a dialect
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerArgs {
    /// Scheduler flags followed by the script (or command) and its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    pub args: Vec<String>,
}

/// Cluster selection shared by the status commands
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterArg {
    /// Cluster label (defaults to the selected cluster)
    #[arg(short = 'c', long, value_name = "LABEL")]
    pub cluster: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// SGE qsub: submit a batch job
    #[command(disable_help_flag = true)]
    Qsub(SchedulerArgs),

    /// Slurm sbatch: submit a batch script
    #[command(disable_help_flag = true)]
    Sbatch(SchedulerArgs),

    /// SGE qstat: show pending and running jobs
    Qstat(ClusterArg),

    /// Slurm squeue: show pending and running jobs
    Squeue {
        /// Cluster label (defaults to the selected cluster)
        #[arg(short = 'M', long = "clusters", value_name = "LABEL")]
        cluster: Option<String>,
    },

    /// SGE qacct: report finished jobs
    Qacct(ClusterArg),

    /// SGE qdel: delete a job
    Qdel {
        /// Job number
        number: u64,
        /// Terminate immediately instead of shutting down
        #[arg(short = 'f', long)]
        force: bool,
        #[command(flatten)]
        cluster: ClusterArg,
    },

    /// Slurm scancel: cancel a job
    Scancel {
        /// Job number
        number: u64,
        /// Terminate immediately instead of shutting down
        #[arg(short = 'f', long)]
        force: bool,
        /// Cluster label (defaults to the selected cluster)
        #[arg(short = 'M', long = "clusters", value_name = "LABEL")]
        cluster: Option<String>,
    },

    /// Slurm sinfo: show partitions
    Sinfo {
        /// Cluster label (defaults to the selected cluster)
        #[arg(short = 'M', long = "clusters", value_name = "LABEL")]
        cluster: Option<String>,
    },

    /// SGE qconf: list queues
    Qconf(ClusterArg),

    /// Store credentials for a cluster
    Login {
        /// JARVICE API endpoint URL
        #[arg(long, value_name = "URL")]
        endpoint: String,
        /// JARVICE user name
        #[arg(long)]
        username: String,
        /// JARVICE API key
        #[arg(long)]
        apikey: String,
        /// Cluster label
        #[arg(long, default_value = DEFAULT_CLUSTER, value_name = "LABEL")]
        cluster: String,
        /// Vault attached to submitted jobs
        #[arg(long, default_value = DEFAULT_VAULT)]
        vault: String,
        /// Accept self-signed certificates
        #[arg(long)]
        insecure: bool,
        /// Request timeout in seconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_name = "SECS")]
        timeout: u64,
    },

    /// Change the vault of a cluster
    Vault {
        /// Vault name
        vault: String,
        #[command(flatten)]
        cluster: ClusterArg,
    },

    /// Manage configured clusters
    #[command(subcommand)]
    Cluster(ClusterCommand),
}

/// `cluster` subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ClusterCommand {
    /// List configured clusters
    List,
    /// Select the cluster commands use by default
    Use {
        label: String,
    },
    /// Forget a cluster
    Remove {
        label: String,
    },
}
