//! `qsub` and `sbatch`

use super::Session;
use crate::dialect::{Dialect, JobContext};
use crate::error::Result;
use crate::flags::{parse_args, reconcile, OptionSet, ResolvedJobSpec};
use crate::request::{assemble, HostIdentity};
use crate::script::{scan_source, ScriptDirectiveSet, ScriptSource};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// A job translated from one command line, ready to submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedJob {
    pub spec: ResolvedJobSpec,
    pub script: ScriptDirectiveSet,
    /// Label the job is submitted under
    pub label: String,
    /// Options that were given but are not honoured
    pub unsupported: Vec<String>,
}

/// Parse the command line, read the script and reconcile both option sources
pub fn prepare(dialect: &dyn Dialect, args: &[String], override_mode: bool) -> Result<PreparedJob> {
    let cli = parse_args(dialect, args)?;
    let positionals = cli.positionals();

    let (script, default_label) =
        match dialect.inline_command(&ResolvedJobSpec::from_set(&cli), positionals)? {
            Some(command) => {
                debug!("{}: inline command", dialect.name());
                let label = command_label(&command);
                (ScriptDirectiveSet::inline(&command), label)
            }
            None => {
                let source = ScriptSource::from_arg(positionals.first().map(String::as_str));
                debug!("{}: reading {}", dialect.name(), source.display_name());
                (scan_source(&source, dialect.scan_options())?, source.display_name())
            }
        };
    prepare_script(dialect, &cli, script, default_label, override_mode)
}

/// Reconcile an already scanned script with a parsed command line
fn prepare_script(
    dialect: &dyn Dialect,
    cli: &OptionSet,
    script: ScriptDirectiveSet,
    default_label: String,
    override_mode: bool,
) -> Result<PreparedJob> {
    let reconciled = reconcile(dialect, cli, script.directive_args(), override_mode)?;
    let label = dialect
        .job_name(&reconciled.spec)
        .unwrap_or(default_label);
    Ok(PreparedJob {
        spec: reconciled.spec,
        script,
        label,
        unsupported: reconciled.unsupported,
    })
}

/// Label of an inline command: the base name of its program
fn command_label(command: &str) -> String {
    command
        .split_whitespace()
        .next()
        .and_then(|program| Path::new(program).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "STDIN".to_string())
}

/// Submit a prepared job and return the dialect's confirmation line
pub fn submit_prepared(
    session: &Session,
    dialect: &dyn Dialect,
    job: &PreparedJob,
    host: &HostIdentity,
) -> Result<String> {
    let requested = dialect.cluster_name(&job.spec)?;
    let label = session.cluster_label(requested.as_deref())?;
    let (cluster, api) = session.connect(Some(&label))?;

    let queue_name = dialect.queue_name(&job.spec);
    let queue = api.queue(&queue_name)?;

    let ctx = JobContext {
        cluster: label,
        username: cluster.jarvice_user.username.clone(),
        job_label: job.label.clone(),
        queue: queue_name,
        submit_dir: host.current_dir.clone(),
        submit_host: host.hostname.clone(),
    };
    let request = assemble(
        dialect,
        &job.spec,
        &job.script,
        &queue,
        &cluster,
        &ctx,
        &host.hosts_entry(),
    )?;
    let response = api.submit(&request)?;
    info!("submitted {} as job {}", response.name, response.number);
    Ok(dialect.submitted_message(response.number, &job.label))
}

/// Full `qsub`/`sbatch` run: translate, report dropped options, submit
pub fn submit(
    session: &Session,
    dialect: &dyn Dialect,
    args: &[String],
    override_mode: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let job = prepare(dialect, args, override_mode)?;
    for option in &job.unsupported {
        eprintln!(
            "{} {}: option {} is not supported and was ignored",
            console::style("warning:").yellow().bold(),
            dialect.name(),
            option
        );
    }
    let message = submit_prepared(session, dialect, &job, &HostIdentity::detect())?;
    writeln!(out, "{message}")?;
    Ok(())
}
