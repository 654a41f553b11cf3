//! Grid Engine `qsub` dialect

use super::{redirect_line, Dialect, JobContext};
use crate::error::{HpcError, Result};
use crate::flags::{find_by_name, OptionSpec, ResolvedJobSpec, ValueKind};
use crate::resources::{
    decode_cores, decode_gpus, decode_memory, decode_resource_list, ResourceList, ResourceRequest,
    ResourceValue,
};
use std::collections::BTreeMap;

const HARD: &str = "hard-resources";
const SOFT: &str = "soft-resources";

static OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("binary", ValueKind::Str)
        .short('b')
        .supported()
        .help("Treat the arguments as a command (y) instead of a script (n)"),
    OptionSpec::new("shell", ValueKind::Str)
        .short('S')
        .supported()
        .help("Shell the job runs under"),
    OptionSpec::new("name", ValueKind::Str)
        .short('N')
        .supported()
        .help("Job name"),
    OptionSpec::new("cwd", ValueKind::Bool)
        .long("cwd")
        .supported()
        .help("Run the job from the current working directory"),
    OptionSpec::new("wd", ValueKind::Str)
        .long("wd")
        .supported()
        .help("Run the job from the given directory"),
    OptionSpec::new("queue", ValueKind::Str)
        .short('q')
        .default("default")
        .supported()
        .help("Queue the job is submitted to"),
    OptionSpec::new(HARD, ValueKind::List)
        .long(HARD)
        .supported()
        .help("Hard resource request (-l)"),
    OptionSpec::new(SOFT, ValueKind::List)
        .long(SOFT)
        .supported()
        .help("Soft resource request (-soft -l)"),
    OptionSpec::new("pe", ValueKind::List)
        .long("pe")
        .arity(2)
        .supported()
        .help("Parallel environment and slot count: -pe NAME SLOTS"),
    OptionSpec::new("project", ValueKind::Str)
        .short('P')
        .supported()
        .help("Project the job is charged to"),
    OptionSpec::new("output", ValueKind::Str)
        .short('o')
        .supported()
        .help("Standard output path"),
    OptionSpec::new("error", ValueKind::Str)
        .short('e')
        .supported()
        .help("Standard error path"),
    OptionSpec::new("join", ValueKind::Str)
        .short('j')
        .supported()
        .help("Merge standard error into standard output (y/n)"),
    OptionSpec::new("export-env", ValueKind::Bool).short('V'),
    OptionSpec::new("variables", ValueKind::List).short('v'),
    OptionSpec::new("mail-options", ValueKind::Str).short('m'),
    OptionSpec::new("mail-list", ValueKind::Str).short('M'),
    OptionSpec::new("array", ValueKind::Str).short('t'),
    OptionSpec::new("priority", ValueKind::Int).short('p'),
    OptionSpec::new("rerun", ValueKind::Str).short('r'),
    OptionSpec::new("account", ValueKind::Str).short('A'),
    OptionSpec::new("start-time", ValueKind::Str).short('a'),
    OptionSpec::new("reserve", ValueKind::Str).short('R'),
    OptionSpec::new("hold", ValueKind::Bool).short('h'),
    OptionSpec::new("hold_jid", ValueKind::Str).long("hold_jid"),
    OptionSpec::new("notify", ValueKind::Bool).long("notify"),
    OptionSpec::new("now", ValueKind::Str).long("now"),
    OptionSpec::new("clear", ValueKind::Bool).long("clear"),
    OptionSpec::new("masterq", ValueKind::Str).long("masterq"),
];

const PREAMBLE: &str = concat!(
    r#"join () { local IFS="$1"; shift; echo "$*"; };"#,
    r#"ips=$(cat /var/JARVICE/c/hosts | awk '{print $1}' | xargs);"#,
    r#"hosts=$(cat /var/JARVICE/c/hosts | awk '{print $2}' | xargs);"#,
    r#"sge_hosts="$(join , $hosts)";"#,
    r#"numcpu="$(cat /etc/JARVICE/cores | grep $(hostname) | wc -l)";"#,
    r#"numnodes="$(cat /etc/JARVICE/nodes | wc -l )";"#,
    r#"cpupernode="$(( $(cat /etc/JARVICE/cores | wc -l) / $(cat /etc/JARVICE/nodes | wc -l) ))";"#,
    r#"procid="$(ps axo pid,command | grep '/bin/sh -l -c join ()' | awk 'NR==1{print $1}')";"#,
    r#"echo {hosts_entry} | sudo tee -a /etc/hosts || true"#,
);

const LAUNCH_VARIABLES: &[(&str, &str)] = &[
    ("SGE_JOB_NODELIST", "${sge_hosts}"),
    ("SGE_CPUS_ON_NODE", "${numcpu}"),
    ("SGE_JOB_NUM_NODES", "${numnodes}"),
    ("SGE_JOB_CPUS_PER_NODE", "${cpupernode}"),
    ("SGE_PROCID", "${procid}"),
];

/// Grid Engine `qsub`
#[derive(Debug, Clone, Copy, Default)]
pub struct Sge;

impl Sge {
    /// Soft requests overlaid by hard ones
    fn resource_list(spec: &ResolvedJobSpec) -> Result<ResourceList> {
        let mut list = ResourceList::new();
        for key in [SOFT, HARD] {
            for entry in spec.list(key) {
                list.extend(decode_resource_list(entry, '=')?);
            }
        }
        Ok(list)
    }
}

fn value<'a>(list: &'a ResourceList, key: &str) -> Result<Option<&'a str>> {
    match list.get(key) {
        None => Ok(None),
        Some(ResourceValue::Flag) => Err(HpcError::decode(key, "", "a value is required")),
        Some(ResourceValue::Value(v)) => Ok(Some(v.as_str())),
    }
}

fn first_value<'a>(list: &'a ResourceList, keys: &[&str]) -> Result<Option<&'a str>> {
    for key in keys {
        if let Some(v) = value(list, key)? {
            return Ok(Some(v));
        }
    }
    Ok(None)
}

fn is_yes(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v.eq_ignore_ascii_case("y") || v.eq_ignore_ascii_case("yes"))
}

impl Dialect for Sge {
    fn name(&self) -> &'static str {
        "qsub"
    }

    fn marker(&self) -> &'static str {
        "$"
    }

    fn options(&self) -> &'static [OptionSpec] {
        OPTIONS
    }

    /// Rewrite Grid Engine arguments into GNU form.
    ///
    /// `-cwd` style options gain a second dash, `-l` is routed to the hard
    /// or soft list by the last `-hard`/`-soft` switch, and a `-pe` value
    /// joined by whitespace (as directives deliver it) is split in two.
    fn normalize_args(&self, args: &[String]) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(args.len());
        let mut soft = false;
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            let Some(name) = arg.strip_prefix('-').filter(|n| !n.is_empty() && !n.starts_with('-')) else {
                // first positional or `--`: the rest is the command
                out.push(arg.clone());
                out.extend(iter.by_ref().cloned());
                break;
            };
            match name {
                "hard" => soft = false,
                "soft" => soft = true,
                "l" => {
                    out.push(format!("--{}", if soft { SOFT } else { HARD }));
                    out.extend(iter.next().cloned());
                }
                "pe" => {
                    out.push("--pe".to_string());
                    let first = iter
                        .next()
                        .ok_or_else(|| HpcError::parse("qsub: -pe expects NAME SLOTS"))?;
                    let parts: Vec<&str> = first.split_whitespace().collect();
                    match parts.as_slice() {
                        [_] => {
                            out.push(first.clone());
                            out.extend(iter.next().cloned());
                        }
                        [name, slots] => {
                            out.push(name.to_string());
                            out.push(slots.to_string());
                        }
                        _ => {
                            return Err(HpcError::parse(format!(
                                "qsub: -pe expects NAME SLOTS, got '{first}'"
                            )))
                        }
                    }
                }
                _ => {
                    let spec = find_by_name(OPTIONS, name);
                    if name.chars().count() > 1 {
                        out.push(format!("-{arg}"));
                    } else {
                        out.push(arg.clone());
                    }
                    match spec {
                        Some(spec) if spec.takes_value() => {
                            for _ in 0..spec.arity {
                                out.extend(iter.next().cloned());
                            }
                        }
                        Some(_) => {}
                        // values of an unknown option stay with it
                        None => {
                            while let Some(value) = iter.as_slice().first().filter(|v| !v.starts_with('-')) {
                                out.push(value.clone());
                                iter.next();
                            }
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    fn spelling(&self, option: &OptionSpec) -> String {
        match (option.key, option.long, option.short) {
            (HARD | SOFT, _, _) => "-l".to_string(),
            (_, Some(long), _) => format!("-{long}"),
            (_, None, Some(short)) => format!("-{short}"),
            _ => option.key.to_string(),
        }
    }

    fn unknown_spelling(&self, flag: &str) -> String {
        match flag.strip_prefix('-') {
            Some(single) if single.starts_with('-') => single.to_string(),
            _ => flag.to_string(),
        }
    }

    fn inline_command(&self, cli: &ResolvedJobSpec, positionals: &[String]) -> Result<Option<String>> {
        if !is_yes(cli.str("binary")) {
            return Ok(None);
        }
        let command: Vec<&str> = positionals
            .iter()
            .map(String::as_str)
            .skip_while(|a| *a == "--")
            .collect();
        if command.is_empty() {
            return Err(HpcError::parse("qsub: missing command"));
        }
        Ok(Some(command.join(" ")))
    }

    fn cluster_name(&self, spec: &ResolvedJobSpec) -> Result<Option<String>> {
        let list = Self::resource_list(spec)?;
        Ok(value(&list, "mc_cluster")?.map(str::to_string))
    }

    fn queue_name(&self, spec: &ResolvedJobSpec) -> String {
        spec.str("queue").unwrap_or("default").to_string()
    }

    fn job_name(&self, spec: &ResolvedJobSpec) -> Option<String> {
        spec.str("name").map(str::to_string)
    }

    fn resources(&self, spec: &ResolvedJobSpec) -> Result<ResourceRequest> {
        let list = Self::resource_list(spec)?;
        let core_count = match first_value(&list, &["mc_cores", "cpu"])? {
            Some(v) => decode_cores(v)?,
            None => 0,
        };
        let memory_gib = match first_value(&list, &["mc_ram", "h_rss", "mem_free", "h_vmem"])? {
            Some(v) => decode_memory(v)?,
            None => 0,
        };
        let gpu_count = first_value(&list, &["mc_gpus", "gpu"])?
            .map(decode_gpus)
            .transpose()?;
        Ok(ResourceRequest {
            machine_type: value(&list, "mc_name")?.map(str::to_string),
            core_count,
            memory_gib,
            gpu_count,
            licenses: value(&list, "mc_licenses")?.map(str::to_string),
            project: spec.str("project").map(str::to_string),
        })
    }

    /// Slot count of `-pe NAME SLOTS`, 1 when absent
    fn node_scale(&self, spec: &ResolvedJobSpec) -> Result<i64> {
        let pe = spec.list("pe");
        if pe.is_empty() {
            return Ok(1);
        }
        match pe {
            [name, slots] if !name.is_empty() => slots
                .parse::<i64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    HpcError::parse(format!(
                        "qsub: -pe slot count must be a positive integer, got '{slots}'"
                    ))
                }),
            _ => Err(HpcError::parse("qsub: -pe expects NAME SLOTS")),
        }
    }

    fn shell(&self, spec: &ResolvedJobSpec, interpreter: &str) -> String {
        spec.str("shell").unwrap_or(interpreter).to_string()
    }

    fn working_dir(&self, spec: &ResolvedJobSpec, ctx: &JobContext) -> Option<String> {
        if let Some(dir) = spec.str("wd") {
            return Some(dir.to_string());
        }
        spec.flag("cwd")
            .then(|| ctx.submit_dir_or_home().to_string())
    }

    fn walltime(&self, spec: &ResolvedJobSpec) -> Result<Option<String>> {
        let list = Self::resource_list(spec)?;
        Ok(value(&list, "h_rt")?.map(str::to_string))
    }

    fn output_redirect(&self, spec: &ResolvedJobSpec) -> Option<String> {
        redirect_line(
            spec.str("output"),
            spec.str("error"),
            is_yes(spec.str("join")),
        )
    }

    fn environment(&self, spec: &ResolvedJobSpec, ctx: &JobContext) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("SGE_O_HOST".into(), ctx.submit_host_or_localhost().to_string());
        env.insert(
            "SGE_O_WORKDIR".into(),
            self.working_dir(spec, ctx)
                .unwrap_or_else(|| ctx.submit_dir_or_home().to_string()),
        );
        env.insert("JOB_NAME".into(), ctx.job_label.clone());
        env.insert("QUEUE".into(), ctx.queue.clone());
        env
    }

    fn preamble_template(&self) -> &'static str {
        PREAMBLE
    }

    fn launch_variables(&self) -> &'static [(&'static str, &'static str)] {
        LAUNCH_VARIABLES
    }

    fn submitted_message(&self, number: u64, label: &str) -> String {
        format!("Your job {number} (\"{label}\") has been submitted")
    }
}
