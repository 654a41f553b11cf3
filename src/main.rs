//! HPCBridge CLI - SGE and Slurm commands for JARVICE

use hpcbridge::commands::{self, Login, Session};
use hpcbridge::config::{CliArgs, ClusterCommand, ClusterStore, Commands};
use hpcbridge::dialect::{Sge, Slurm};
use hpcbridge::error::Result;
use std::io::Write;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = CliArgs::from_invocation();

    // RUST_LOG wins over -v
    let default_level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    let session = Session::new(ClusterStore::open(args.config.clone())?);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    handle_command(&session, args, &mut out)?;
    out.flush()?;
    Ok(())
}

fn handle_command(session: &Session, args: CliArgs, out: &mut dyn Write) -> Result<()> {
    let override_mode = args.script_override;
    match args.command {
        Commands::Qsub(raw) => commands::submit(session, &Sge, &raw.args, override_mode, out),
        Commands::Sbatch(raw) => commands::submit(session, &Slurm, &raw.args, override_mode, out),
        Commands::Qstat(c) => commands::qstat(session, c.cluster.as_deref(), out),
        Commands::Squeue { cluster } => commands::squeue(session, cluster.as_deref(), out),
        Commands::Qacct(c) => commands::qacct(session, c.cluster.as_deref(), out),
        Commands::Qdel {
            number,
            force,
            cluster,
        } => commands::qdel(session, cluster.cluster.as_deref(), number, force, out),
        Commands::Scancel {
            number,
            force,
            cluster,
        } => commands::scancel(session, cluster.as_deref(), number, force),
        Commands::Sinfo { cluster } => commands::sinfo(session, cluster.as_deref(), out),
        Commands::Qconf(c) => commands::qconf(session, c.cluster.as_deref(), out),
        Commands::Login {
            endpoint,
            username,
            apikey,
            cluster,
            vault,
            insecure,
            timeout,
        } => commands::login(
            session,
            Login {
                cluster,
                endpoint,
                username,
                apikey,
                vault,
                insecure,
                timeout_secs: timeout,
            },
            out,
        ),
        Commands::Vault { vault, cluster } => {
            commands::set_vault(session, cluster.cluster.as_deref(), &vault)
        }
        Commands::Cluster(ClusterCommand::List) => commands::list_clusters(session, out),
        Commands::Cluster(ClusterCommand::Use { label }) => commands::use_cluster(session, &label),
        Commands::Cluster(ClusterCommand::Remove { label }) => {
            commands::remove_cluster(session, &label)
        }
    }
}
