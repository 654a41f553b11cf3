//! Payload assembly

use super::model::{Application, HpcRequest, JobSubmissionRequest, Machine, Vault};
use super::preamble::{launch_line, render_preamble};
use crate::api::QueueDescriptor;
use crate::config::ClusterConfig;
use crate::dialect::{Dialect, JobContext};
use crate::error::{HpcError, Result};
use crate::flags::ResolvedJobSpec;
use crate::script::ScriptDirectiveSet;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

/// Check a requested node count against the queue's scale limit
pub fn validate_scale(requested: i64, queue: &QueueDescriptor) -> Result<u32> {
    if requested < 1 || requested > i64::from(queue.size) {
        return Err(HpcError::Resource {
            requested,
            limit: queue.size,
        });
    }
    Ok(requested as u32)
}

/// Script body with the dialect's output redirection prepended
pub fn job_body(dialect: &dyn Dialect, spec: &ResolvedJobSpec, script: &ScriptDirectiveSet) -> Vec<u8> {
    let mut body = Vec::with_capacity(script.body().len() + 64);
    if let Some(redirect) = dialect.output_redirect(spec) {
        body.extend_from_slice(redirect.as_bytes());
        body.push(b'\n');
    }
    body.extend_from_slice(script.body());
    body
}

/// Build the submission payload for one job.
///
/// Fails before anything is sent when the scale does not fit the queue or
/// a resource string cannot be decoded.
pub fn assemble(
    dialect: &dyn Dialect,
    spec: &ResolvedJobSpec,
    script: &ScriptDirectiveSet,
    queue: &QueueDescriptor,
    cluster: &ClusterConfig,
    ctx: &JobContext,
    hosts_entry: &str,
) -> Result<JobSubmissionRequest> {
    let nodes = validate_scale(dialect.node_scale(spec)?, queue)?;
    let resources = dialect.resources(spec)?;
    let shell = dialect.shell(spec, script.interpreter());
    let working_dir = dialect.working_dir(spec, ctx);
    debug!(
        "{}: {} node(s) of {} on queue {}",
        dialect.name(),
        nodes,
        resources.machine(&queue.machine),
        queue.name
    );

    let hpc = HpcRequest {
        hpc_job_env_config: render_preamble(dialect.preamble_template(), hosts_entry),
        hpc_job_script: STANDARD.encode(job_body(dialect, spec, script)),
        hpc_job_shell: launch_line(working_dir.as_deref(), dialect.launch_variables(), &shell),
        hpc_queue: queue.name.clone(),
        hpc_umask: 0,
        hpc_envs: dialect.environment(spec, ctx),
        hpc_resources: resources.resource_map(&queue.machine),
    };

    Ok(JobSubmissionRequest {
        app: queue.app.clone(),
        staging: false,
        checkedout: false,
        application: Application::hpc_job(dialect.walltime(spec)?),
        machine: Machine {
            machine_type: resources.machine(&queue.machine).to_string(),
            nodes,
        },
        vault: Vault::read_write(&cluster.jarvice_vault),
        job_label: Some(ctx.job_label.clone()).filter(|l| !l.is_empty()),
        user: cluster.jarvice_user.clone(),
        hpc,
        licenses: resources.licenses,
        job_project: resources.project,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Credentials;
    use crate::dialect::{Sge, Slurm};
    use crate::flags::reconcile;
    use crate::script::scan;

    fn queue(size: u32) -> QueueDescriptor {
        QueueDescriptor {
            name: "default".into(),
            app: "hpc-app".into(),
            machine: "n1".into(),
            size,
        }
    }

    fn cluster() -> ClusterConfig {
        ClusterConfig {
            jarvice_endpoint: "https://cloud.example.com".into(),
            jarvice_vault: "ephemeral".into(),
            jarvice_user: Credentials {
                username: "alice".into(),
                apikey: "secret".into(),
            },
            jarvice_insecure: false,
            timeout_secs: 30,
        }
    }

    fn ctx(label: &str) -> JobContext {
        JobContext {
            cluster: "default".into(),
            username: "alice".into(),
            job_label: label.into(),
            queue: "default".into(),
            submit_dir: Some("/home/alice".into()),
            submit_host: Some("login1".into()),
        }
    }

    fn resolve(dialect: &dyn Dialect, script: &str, cli: &[&str]) -> (ResolvedJobSpec, ScriptDirectiveSet) {
        let set = scan(script.as_bytes(), dialect.scan_options()).unwrap();
        let cli: Vec<String> = cli.iter().map(|s| s.to_string()).collect();
        let cli = crate::flags::parse_args(dialect, &cli).unwrap();
        let resolved = reconcile(dialect, &cli, set.directive_args(), false).unwrap();
        (resolved.spec, set)
    }

    #[test]
    fn test_validate_scale() {
        assert!(matches!(
            validate_scale(10, &queue(8)),
            Err(HpcError::Resource { requested: 10, limit: 8 })
        ));
        assert_eq!(validate_scale(8, &queue(8)).unwrap(), 8);
        assert_eq!(validate_scale(1, &queue(8)).unwrap(), 1);
        assert!(validate_scale(0, &queue(8)).is_err());
        assert!(validate_scale(-3, &queue(8)).is_err());
    }

    #[test]
    fn test_assemble_slurm() {
        let script = "#!/bin/bash\n#SBATCH -N 2\n#SBATCH --mem=2048M\n#SBATCH --time=01:00:00\nsrun hostname\n";
        let (spec, set) = resolve(&Slurm, script, &[]);
        let req = assemble(&Slurm, &spec, &set, &queue(8), &cluster(), &ctx("run.sh"), "10.0.0.5 login1").unwrap();

        assert_eq!(req.app, "hpc-app");
        assert_eq!(req.machine.nodes, 2);
        assert_eq!(req.machine.machine_type, "n1");
        assert_eq!(req.hpc.hpc_resources["mc_ram"], "2");
        assert_eq!(req.application.walltime.as_deref(), Some("01:00:00"));
        assert_eq!(req.vault.name, "ephemeral");
        assert_eq!(req.user.username, "alice");
        assert_eq!(req.job_label.as_deref(), Some("run.sh"));
        assert_eq!(req.hpc.hpc_queue, "default");
        assert_eq!(STANDARD.decode(&req.hpc.hpc_job_script).unwrap(), b"srun hostname\n");
        assert!(req.hpc.hpc_job_shell.ends_with("/bin/bash"));
        assert!(req.hpc.hpc_job_shell.contains("SLURM_JOB_NODELIST="));
        assert!(req.hpc.hpc_job_env_config.contains("10.0.0.5 login1"));
        assert!(req.licenses.is_none());
    }

    #[test]
    fn test_assemble_rejects_oversized_scale() {
        let (spec, set) = resolve(&Slurm, "#!/bin/sh\n#SBATCH --nodes=10\ntrue\n", &[]);
        let err = assemble(&Slurm, &spec, &set, &queue(8), &cluster(), &ctx("j"), "").unwrap_err();
        assert!(matches!(err, HpcError::Resource { requested: 10, limit: 8 }));
    }

    #[test]
    fn test_assemble_sge_redirect_and_shell() {
        let script = "#$ -S /bin/bash\n#$ -o out.log -j y\n#$ -pe mpi 4\n#$ -l mc_name=n3,mc_licenses=\"matlab:2\"\nhostname\n";
        let (spec, set) = resolve(&Sge, script, &["-P", "proj1"]);
        let req = assemble(&Sge, &spec, &set, &queue(8), &cluster(), &ctx("test"), "").unwrap();

        assert_eq!(req.machine.nodes, 4);
        assert_eq!(req.machine.machine_type, "n3");
        assert_eq!(req.licenses.as_deref(), Some("matlab:2"));
        assert_eq!(req.job_project.as_deref(), Some("proj1"));
        assert!(req.hpc.hpc_job_shell.ends_with(" /bin/bash"));
        let body = STANDARD.decode(&req.hpc.hpc_job_script).unwrap();
        assert_eq!(body, b"exec >\"out.log\" 2>&1\nhostname\n");
    }

    #[test]
    fn test_payload_omits_absent_optionals() {
        let (spec, set) = resolve(&Slurm, "echo hi\n", &[]);
        let req = assemble(&Slurm, &spec, &set, &queue(1), &cluster(), &ctx(""), "").unwrap();
        let json = serde_json::to_value(&req).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("licenses"));
        assert!(!obj.contains_key("job_project"));
        assert!(!obj.contains_key("job_label"));
        assert!(!json["application"].as_object().unwrap().contains_key("walltime"));
        assert_eq!(json["application"]["command"], "HpcJob");
        assert_eq!(json["machine"]["type"], "n1");
        assert_eq!(json["hpc"]["hpc_umask"], 0);
    }
}
