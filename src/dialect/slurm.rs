//! Slurm `sbatch` dialect

use super::{redirect_line, Dialect, JobContext};
use crate::error::Result;
use crate::flags::{OptionSpec, ResolvedJobSpec, ValueKind};
use crate::resources::{
    decode_gpus, decode_memory, decode_node_info, decode_resource_list, ResourceList,
    ResourceRequest,
};
use std::collections::BTreeMap;

use ValueKind::{Bool, Int, List, Str};

static OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("job-name", Str)
        .short('J')
        .long("job-name")
        .supported()
        .help("Name of the job"),
    OptionSpec::new("nodes", Int)
        .short('N')
        .long("nodes")
        .default("1")
        .supported()
        .help("Number of nodes"),
    OptionSpec::new("time", Str)
        .short('t')
        .long("time")
        .supported()
        .help("Time limit"),
    OptionSpec::new("partition", Str)
        .short('p')
        .long("partition")
        .default("default")
        .supported()
        .help("Partition (queue) to submit to"),
    OptionSpec::new("account", Str)
        .short('A')
        .long("account")
        .supported()
        .help("Account (project) charged for the job"),
    OptionSpec::new("extra-node-info", Str)
        .short('B')
        .long("extra-node-info")
        .supported()
        .help("sockets[:cores[:threads]]; cores requested = sockets x cores"),
    OptionSpec::new("gpus", Str)
        .short('G')
        .long("gpus")
        .supported()
        .help("Total number of GPUs"),
    OptionSpec::new("mem", Str)
        .long("mem")
        .supported()
        .help("Memory per node, megabytes unless suffixed with K, M, G or T"),
    OptionSpec::new("gres", List)
        .long("gres")
        .supported()
        .help("Generic resources: name[[:type]:count],..."),
    OptionSpec::new("chdir", Str)
        .short('D')
        .long("chdir")
        .supported()
        .help("Working directory of the job"),
    OptionSpec::new("clusters", Str)
        .short('M')
        .long("clusters")
        .supported()
        .help("Cluster to submit to"),
    OptionSpec::new("licenses", Str)
        .short('L')
        .long("licenses")
        .supported()
        .help("Licenses required by the job"),
    OptionSpec::new("output", Str)
        .short('o')
        .long("output")
        .supported()
        .help("Standard output path"),
    OptionSpec::new("error", Str)
        .short('e')
        .long("error")
        .supported()
        .help("Standard error path"),
    OptionSpec::new("wrap", Str)
        .long("wrap")
        .supported()
        .help("Command to run instead of a script"),
    OptionSpec::new("array", Str).short('a').long("array"),
    OptionSpec::new("begin", Str).short('b').long("begin"),
    OptionSpec::new("constraint", Str).short('C').long("constraint"),
    OptionSpec::new("cpus-per-task", Int).short('c').long("cpus-per-task"),
    OptionSpec::new("dependency", Str).short('d').long("dependency"),
    OptionSpec::new("nodefile", Str).short('F').long("nodefile"),
    OptionSpec::new("hold", Bool).short('H').long("hold"),
    OptionSpec::new("input", Str).short('i').long("input"),
    OptionSpec::new("no-kill", Bool).short('k').long("no-kill"),
    OptionSpec::new("distribution", Str).short('m').long("distribution"),
    OptionSpec::new("ntasks", Int).short('n').long("ntasks"),
    OptionSpec::new("overcommit", Bool).short('O').long("overcommit"),
    OptionSpec::new("qos", Str).short('q').long("qos"),
    OptionSpec::new("quiet", Bool).short('Q').long("quiet"),
    OptionSpec::new("oversubscribe", Bool).short('s').long("oversubscribe"),
    OptionSpec::new("core-spec", Int).short('S').long("core-spec"),
    OptionSpec::new("verbose", Bool).short('v').long("verbose"),
    OptionSpec::new("nodelist", Str).short('w').long("nodelist"),
    OptionSpec::new("wait", Bool).short('W').long("wait"),
    OptionSpec::new("exclude", Str).short('x').long("exclude"),
    OptionSpec::new("comment", Str).long("comment"),
    OptionSpec::new("cores-per-socket", Int).long("cores-per-socket"),
    OptionSpec::new("sockets-per-node", Int).long("sockets-per-node"),
    OptionSpec::new("threads-per-core", Int).long("threads-per-core"),
    OptionSpec::new("exclusive", Bool).long("exclusive"),
    OptionSpec::new("export", Str).long("export"),
    OptionSpec::new("mail-type", Str).long("mail-type"),
    OptionSpec::new("mail-user", Str).long("mail-user"),
    OptionSpec::new("mem-per-cpu", Str).long("mem-per-cpu"),
    OptionSpec::new("mem-per-gpu", Str).long("mem-per-gpu"),
    OptionSpec::new("gpus-per-node", Str).long("gpus-per-node"),
    OptionSpec::new("ntasks-per-node", Int).long("ntasks-per-node"),
    OptionSpec::new("nice", Int).long("nice"),
    OptionSpec::new("open-mode", Str).long("open-mode"),
    OptionSpec::new("parsable", Bool).long("parsable"),
    OptionSpec::new("requeue", Bool).long("requeue"),
    OptionSpec::new("no-requeue", Bool).long("no-requeue"),
    OptionSpec::new("reservation", Str).long("reservation"),
    OptionSpec::new("signal", Str).long("signal"),
    OptionSpec::new("test-only", Bool).long("test-only"),
    OptionSpec::new("tmp", Str).long("tmp"),
    OptionSpec::new("wckey", Str).long("wckey"),
    OptionSpec::new("version", Bool).short('V').long("version"),
    OptionSpec::new("acctg-freq", Str).long("acctg-freq"),
    OptionSpec::new("batch", Str).long("batch"),
    OptionSpec::new("bb", Str).long("bb"),
    OptionSpec::new("bbf", Str).long("bbf"),
    OptionSpec::new("cluster-constraint", Str).long("cluster-constraint"),
    OptionSpec::new("contiguous", Bool).long("contiguous"),
    OptionSpec::new("cpu-freq", Str).long("cpu-freq"),
    OptionSpec::new("cpus-per-gpu", Int).long("cpus-per-gpu"),
    OptionSpec::new("deadline", Str).long("deadline"),
    OptionSpec::new("delay-boot", Int).long("delay-boot"),
    OptionSpec::new("export-file", Str).long("export-file"),
    OptionSpec::new("get-user-env", Str).long("get-user-env"),
    OptionSpec::new("gid", Str).long("gid"),
    OptionSpec::new("gpu-bind", Str).long("gpu-bind"),
    OptionSpec::new("gpu-freq", Str).long("gpu-freq"),
    OptionSpec::new("gpus-per-socket", Str).long("gpus-per-socket"),
    OptionSpec::new("gpus-per-task", Str).long("gpus-per-task"),
    OptionSpec::new("gres-flags", Str).long("gres-flags"),
    OptionSpec::new("hint", Str).long("hint"),
    OptionSpec::new("ignore-pbs", Bool).long("ignore-pbs"),
    OptionSpec::new("kill-on-invalid-dep", Bool).long("kill-on-invalid-dep"),
    OptionSpec::new("mcs-label", Str).long("mcs-label"),
    OptionSpec::new("mem-bind", Str).long("mem-bind"),
    OptionSpec::new("mincpus", Int).long("mincpus"),
    OptionSpec::new("network", Str).long("network"),
    OptionSpec::new("ntasks-per-core", Int).long("ntasks-per-core"),
    OptionSpec::new("ntasks-per-socket", Int).long("ntasks-per-socket"),
    OptionSpec::new("power", Str).long("power"),
    OptionSpec::new("priority", Str).long("priority"),
    OptionSpec::new("profile", Str).long("profile"),
    OptionSpec::new("propagate", Str).long("propagate"),
    OptionSpec::new("reboot", Bool).long("reboot"),
    OptionSpec::new("spread-job", Bool).long("spread-job"),
    OptionSpec::new("switches", Str).long("switches"),
    OptionSpec::new("thread-spec", Int).long("thread-spec"),
    OptionSpec::new("time-min", Str).long("time-min"),
    OptionSpec::new("uid", Str).long("uid"),
    OptionSpec::new("use-min-nodes", Bool).long("use-min-nodes"),
    OptionSpec::new("wait-all-nodes", Int).long("wait-all-nodes"),
];

const PREAMBLE: &str = concat!(
    r#"join () { local IFS="$1"; shift; echo "$*"; };"#,
    r#"ips=$(cat /var/JARVICE/c/hosts | awk '{print $1}' | xargs);"#,
    r#"hosts=$(cat /var/JARVICE/c/hosts | awk '{print $2}' | xargs);"#,
    r#"for i in $ips; do for j in $hosts;"#,
    r#"do alias="${alias} $j:$i:$j"; break; done; done;"#,
    r#"slurm_hosts="$(join , $hosts)";"#,
    r#"slurm_host="$(echo $hosts | awk '{print $1}')";"#,
    r#"host_alias="$(join , $alias)";"#,
    r#"numcpu="$(cat /etc/JARVICE/cores | grep $(hostname) | wc -l)";"#,
    r#"numnodes="$(cat /etc/JARVICE/nodes | wc -l )";"#,
    r#"cpupernode="$(( $(cat /etc/JARVICE/cores | wc -l) / $(cat /etc/JARVICE/nodes | wc -l) ))";"#,
    r#"procid="$(ps axo pid,command | grep '/bin/sh -l -c join ()' | awk 'NR==1{print $1}')";"#,
    r#"echo {hosts_entry} | sudo tee -a /etc/hosts || true"#,
);

const LAUNCH_VARIABLES: &[(&str, &str)] = &[
    ("SLURM_JOB_NODELIST", "${slurm_hosts}"),
    ("SLURM_NODELIST", "${slurm_hosts}"),
    ("SLURM_NODE_ALIASES", "${host_alias}"),
    ("SLURMD_NODENAME", "${slurm_host}"),
    ("SLURM_CPUS_ON_NODE", "${numcpu}"),
    ("SLURM_JOB_NUM_NODES", "${numnodes}"),
    ("SLURM_NNODES", "${numnodes}"),
    ("SLURM_JOB_CPUS_PER_NODE", "${cpupernode}"),
    ("SLURM_PROCID", "${procid}"),
];

/// Slurm `sbatch`
#[derive(Debug, Clone, Copy, Default)]
pub struct Slurm;

impl Slurm {
    fn gres(spec: &ResolvedJobSpec) -> Result<ResourceList> {
        let mut list = ResourceList::new();
        for entry in spec.list("gres") {
            list.extend(decode_resource_list(entry, ':')?);
        }
        Ok(list)
    }
}

impl Dialect for Slurm {
    fn name(&self) -> &'static str {
        "sbatch"
    }

    fn marker(&self) -> &'static str {
        "SBATCH"
    }

    fn stops_at_first_command(&self) -> bool {
        true
    }

    fn options(&self) -> &'static [OptionSpec] {
        OPTIONS
    }

    fn inline_command(&self, cli: &ResolvedJobSpec, _positionals: &[String]) -> Result<Option<String>> {
        Ok(cli.str("wrap").map(str::to_string))
    }

    fn cluster_name(&self, spec: &ResolvedJobSpec) -> Result<Option<String>> {
        Ok(spec.str("clusters").map(str::to_string))
    }

    fn queue_name(&self, spec: &ResolvedJobSpec) -> String {
        spec.str("partition").unwrap_or("default").to_string()
    }

    fn job_name(&self, spec: &ResolvedJobSpec) -> Option<String> {
        spec.str("job-name").map(str::to_string)
    }

    fn resources(&self, spec: &ResolvedJobSpec) -> Result<ResourceRequest> {
        let gres = Self::gres(spec)?;
        let core_count = match spec.str("extra-node-info") {
            Some(info) => decode_node_info(info)?,
            None => 0,
        };
        let memory_gib = match spec.str("mem") {
            Some(mem) => decode_memory(mem)?,
            None => 0,
        };
        let gpu_count = spec
            .str("gpus")
            .or_else(|| gres.value("gpu"))
            .map(decode_gpus)
            .transpose()?;
        let licenses = spec
            .str("licenses")
            .or_else(|| gres.value("mc_licenses"))
            .map(str::to_string);
        Ok(ResourceRequest {
            machine_type: gres.value("mc_name").map(str::to_string),
            core_count,
            memory_gib,
            gpu_count,
            licenses,
            project: spec.str("account").map(str::to_string),
        })
    }

    fn node_scale(&self, spec: &ResolvedJobSpec) -> Result<i64> {
        Ok(spec.int("nodes").unwrap_or(1))
    }

    fn working_dir(&self, spec: &ResolvedJobSpec, _ctx: &JobContext) -> Option<String> {
        spec.str("chdir").map(str::to_string)
    }

    fn walltime(&self, spec: &ResolvedJobSpec) -> Result<Option<String>> {
        Ok(spec.str("time").map(str::to_string))
    }

    /// Without `--error`, standard error follows standard output
    fn output_redirect(&self, spec: &ResolvedJobSpec) -> Option<String> {
        let error = spec.str("error");
        redirect_line(spec.str("output"), error, error.is_none())
    }

    fn environment(&self, spec: &ResolvedJobSpec, ctx: &JobContext) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("SLURM_CLUSTER_NAME".into(), ctx.cluster.clone());
        env.insert(
            "SLURM_JOB_ACCOUNT".into(),
            spec.str("account").unwrap_or(&ctx.username).to_string(),
        );
        env.insert("SLURM_JOB_PARTITION".into(), ctx.queue.clone());
        env.insert(
            "SLURM_SUBMIT_DIR".into(),
            spec.str("chdir")
                .unwrap_or_else(|| ctx.submit_dir_or_home())
                .to_string(),
        );
        env.insert(
            "SLURM_SUBMIT_HOST".into(),
            ctx.submit_host_or_localhost().to_string(),
        );
        env.insert("SLURM_JOB_NAME".into(), ctx.job_label.clone());
        env
    }

    fn preamble_template(&self) -> &'static str {
        PREAMBLE
    }

    fn launch_variables(&self) -> &'static [(&'static str, &'static str)] {
        LAUNCH_VARIABLES
    }

    fn submitted_message(&self, number: u64, _label: &str) -> String {
        format!("Submitted batch job {number}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HpcError;
    use crate::flags::{parse_args, reconcile};
    use crate::script::scan;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn resolved(cli: &[&str], directives: &[&str]) -> ResolvedJobSpec {
        let cli = parse_args(&Slurm, &args(cli)).unwrap();
        reconcile(&Slurm, &cli, &args(directives), false).unwrap().spec
    }

    #[test]
    fn test_script_directives() {
        let script = "#!/bin/bash\n#SBATCH --job-name=sim -N 2\n#SBATCH --mem=8G\n#PBS -l nodes=9\nsrun hostname\n#SBATCH --nodes=7\n";
        let set = scan(script.as_bytes(), Slurm.scan_options()).unwrap();
        assert_eq!(set.directive_args(), args(&["--job-name=sim", "-N", "2", "--mem=8G"]));
        assert_eq!(set.body(), b"srun hostname\n#SBATCH --nodes=7\n");

        let spec = resolved(&["job.sh"], &["--job-name=sim", "-N", "2", "--mem=8G"]);
        assert_eq!(Slurm.job_name(&spec).as_deref(), Some("sim"));
        assert_eq!(Slurm.node_scale(&spec).unwrap(), 2);
        assert_eq!(Slurm.resources(&spec).unwrap().memory_gib, 8);
    }

    #[test]
    fn test_tuning_directives_are_dropped() {
        let script = "#!/bin/bash\n#SBATCH --hint=nomultithread\n#SBATCH -N 2 --mem 8G\n#SBATCH --ntasks-per-core=1 --gpus-per-task 1 --contiguous\nsrun app\n";
        let set = scan(script.as_bytes(), Slurm.scan_options()).unwrap();
        let cli = parse_args(&Slurm, &args(&["job.sh"])).unwrap();
        let out = reconcile(&Slurm, &cli, set.directive_args(), false).unwrap();
        assert_eq!(
            out.unsupported,
            vec!["--contiguous", "--gpus-per-task", "--hint", "--ntasks-per-core"]
        );
        assert_eq!(Slurm.node_scale(&out.spec).unwrap(), 2);
        assert_eq!(Slurm.resources(&out.spec).unwrap().memory_gib, 8);
    }

    #[test]
    fn test_hint_alone_is_reported() {
        let out = {
            let cli = parse_args(&Slurm, &args(&["job.sh"])).unwrap();
            reconcile(&Slurm, &cli, &args(&["--hint=nomultithread", "-J", "sim"]), false).unwrap()
        };
        assert_eq!(out.unsupported, vec!["--hint"]);
        assert_eq!(Slurm.job_name(&out.spec).as_deref(), Some("sim"));
    }

    #[test]
    fn test_resources() {
        let spec = resolved(
            &[
                "-B",
                "2:8:2",
                "--mem",
                "2048",
                "--gres",
                "mc_name:n3,mc_licenses:abaqus",
                "--gres=gpu:2",
                "-A",
                "proj",
                "job.sh",
            ],
            &[],
        );
        let req = Slurm.resources(&spec).unwrap();
        assert_eq!(req.machine_type.as_deref(), Some("n3"));
        assert_eq!(req.core_count, 16);
        assert_eq!(req.memory_gib, 2);
        assert_eq!(req.gpu_count, Some(2));
        assert_eq!(req.licenses.as_deref(), Some("abaqus"));
        assert_eq!(req.project.as_deref(), Some("proj"));
    }

    #[test]
    fn test_defaults() {
        let spec = resolved(&["job.sh"], &[]);
        let req = Slurm.resources(&spec).unwrap();
        assert_eq!(req, ResourceRequest::default());
        assert_eq!(Slurm.node_scale(&spec).unwrap(), 1);
        assert_eq!(Slurm.queue_name(&spec), "default");
        assert_eq!(Slurm.walltime(&spec).unwrap(), None);
        assert_eq!(Slurm.output_redirect(&spec), None);
    }

    #[test]
    fn test_typed_gpus_rejected() {
        let spec = resolved(&["--gpus", "tesla:2", "job.sh"], &[]);
        assert!(matches!(Slurm.resources(&spec), Err(HpcError::Decode { .. })));
        let spec = resolved(&["--gres", "gpu:v100:1", "job.sh"], &[]);
        assert!(Slurm.resources(&spec).is_err());
    }

    #[test]
    fn test_environment() {
        let spec = resolved(&["-p", "fast", "-D", "/scratch", "job.sh"], &[]);
        let ctx = JobContext {
            cluster: "west".into(),
            username: "alice".into(),
            job_label: "job.sh".into(),
            queue: Slurm.queue_name(&spec),
            submit_dir: Some("/home/alice".into()),
            submit_host: None,
        };
        let env = Slurm.environment(&spec, &ctx);
        assert_eq!(env["SLURM_CLUSTER_NAME"], "west");
        assert_eq!(env["SLURM_JOB_ACCOUNT"], "alice");
        assert_eq!(env["SLURM_JOB_PARTITION"], "fast");
        assert_eq!(env["SLURM_SUBMIT_DIR"], "/scratch");
        assert_eq!(env["SLURM_SUBMIT_HOST"], "localhost");
        assert_eq!(env["SLURM_JOB_NAME"], "job.sh");
        assert_eq!(Slurm.working_dir(&spec, &ctx).as_deref(), Some("/scratch"));

        let spec = resolved(&["-A", "proj", "job.sh"], &[]);
        let ctx = JobContext {
            submit_dir: None,
            ..ctx
        };
        let env = Slurm.environment(&spec, &ctx);
        assert_eq!(env["SLURM_JOB_ACCOUNT"], "proj");
        assert_eq!(env["SLURM_SUBMIT_DIR"], "${HOME}");
    }

    #[test]
    fn test_output_redirect_merges_stderr_by_default() {
        let spec = resolved(&["-o", "slurm.out", "job.sh"], &[]);
        assert_eq!(
            Slurm.output_redirect(&spec).as_deref(),
            Some("exec >\"slurm.out\" 2>&1")
        );
        let spec = resolved(&["-o", "a.out", "-e", "a.err", "job.sh"], &[]);
        assert_eq!(
            Slurm.output_redirect(&spec).as_deref(),
            Some("exec >\"a.out\" 2>\"a.err\"")
        );
    }

    #[test]
    fn test_wrap() {
        let cli = parse_args(&Slurm, &args(&["--wrap", "hostname -f"])).unwrap();
        let spec = ResolvedJobSpec::from_set(&cli);
        assert_eq!(
            Slurm.inline_command(&spec, cli.positionals()).unwrap().as_deref(),
            Some("hostname -f")
        );
    }

    #[test]
    fn test_submitted_message() {
        assert_eq!(Slurm.submitted_message(7, "x"), "Submitted batch job 7");
    }
}
