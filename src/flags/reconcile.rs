//! Merging command-line and directive options

use super::option::{OptionSet, ResolvedJobSpec};
use super::schema::{find_by_key, parse_options, split_unknown};
use crate::dialect::Dialect;
use crate::error::Result;
use tracing::{debug, warn};

/// Outcome of reconciling one submission's options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub spec: ResolvedJobSpec,
    /// Options that were given but are not honoured, as spelled by the user
    pub unsupported: Vec<String>,
}

/// Parse an argument list with the dialect's schema
pub fn parse_args(dialect: &dyn Dialect, args: &[String]) -> Result<OptionSet> {
    let normalized = dialect.normalize_args(args)?;
    parse_options(dialect.name(), dialect.options(), &normalized)
}

/// Parse a directive argument list, setting aside flags the schema lacks.
///
/// Returns the parsed set and the unknown flags as the dialect spells them.
pub fn parse_directive_args(dialect: &dyn Dialect, args: &[String]) -> Result<(OptionSet, Vec<String>)> {
    let normalized = dialect.normalize_args(args)?;
    let (known, unknown) = split_unknown(dialect.options(), &normalized);
    let set = parse_options(dialect.name(), dialect.options(), &known)?;
    let unknown = unknown
        .iter()
        .map(|flag| dialect.unknown_spelling(flag))
        .collect();
    Ok((set, unknown))
}

/// Merge directive options into the command-line options.
///
/// Every explicit directive value is taken when the command line did not
/// set the same key, or always in override mode. Defaults come from `cli`.
pub fn merge(directive: &OptionSet, cli: &OptionSet, override_mode: bool) -> ResolvedJobSpec {
    let mut spec = ResolvedJobSpec::from_set(cli);
    for key in directive.explicit_keys() {
        if override_mode || !cli.is_explicit(key) {
            if let Some(value) = directive.get(key) {
                spec.insert(key, value.clone());
            }
        }
    }
    spec
}

/// Parse `directive_args`, merge them with `cli` and drop unsupported options.
///
/// Directive flags the dialect does not know are reported with the
/// unsupported ones.
pub fn reconcile(
    dialect: &dyn Dialect,
    cli: &OptionSet,
    directive_args: &[String],
    override_mode: bool,
) -> Result<Reconciled> {
    let (directive, unknown) = parse_directive_args(dialect, directive_args)?;
    if !directive.positionals().is_empty() {
        warn!(
            "{}: ignoring stray directive arguments: {}",
            dialect.name(),
            directive.positionals().join(" ")
        );
    }

    let mut spec = merge(&directive, cli, override_mode);

    let mut unsupported = Vec::new();
    for key in spec.explicit_keys() {
        match find_by_key(dialect.options(), key) {
            Some(option) if option.supported => {}
            Some(option) => {
                spec.remove(key);
                unsupported.push(dialect.spelling(option));
            }
            None => {
                spec.remove(key);
                unsupported.push(key.to_string());
            }
        }
    }
    for flag in unknown {
        if !unsupported.contains(&flag) {
            unsupported.push(flag);
        }
    }
    if !unsupported.is_empty() {
        warn!(
            "{}: {} unsupported options: {}",
            dialect.name(),
            unsupported.len(),
            unsupported.join(" ")
        );
    }
    debug!(?spec, override_mode, "reconciled job options");

    Ok(Reconciled { spec, unsupported })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Sge, Slurm};
    use crate::error::HpcError;
    use crate::flags::OptionValue;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cli_wins_over_directive() {
        let cli = parse_args(&Slurm, &args(&["--nodes", "4", "job.sh"])).unwrap();
        let out = reconcile(&Slurm, &cli, &args(&["--nodes", "2"]), false).unwrap();
        assert_eq!(out.spec.int("nodes"), Some(4));
    }

    #[test]
    fn test_directive_fills_defaults() {
        let cli = parse_args(&Slurm, &args(&["job.sh"])).unwrap();
        assert!(!cli.is_explicit("nodes"));
        let out = reconcile(&Slurm, &cli, &args(&["--nodes", "2"]), false).unwrap();
        assert_eq!(out.spec.int("nodes"), Some(2));
    }

    #[test]
    fn test_override_mode_prefers_directive() {
        let cli = parse_args(&Slurm, &args(&["-N", "4", "job.sh"])).unwrap();
        let out = reconcile(&Slurm, &cli, &args(&["-N", "2"]), true).unwrap();
        assert_eq!(out.spec.int("nodes"), Some(2));
    }

    #[test]
    fn test_merge_is_keywise() {
        let cli = parse_args(&Slurm, &args(&["--time", "1:00:00", "job.sh"])).unwrap();
        let directive = parse_args(&Slurm, &args(&["--time", "2:00:00", "-J", "sim"])).unwrap();
        let spec = merge(&directive, &cli, false);
        assert_eq!(spec.str("time"), Some("1:00:00"));
        assert_eq!(spec.str("job-name"), Some("sim"));
        assert_eq!(
            spec.get("partition"),
            Some(&OptionValue::Str("default".into()))
        );
    }

    #[test]
    fn test_unsupported_options_reported_and_removed() {
        let cli = parse_args(&Slurm, &args(&["--array", "1-4", "job.sh"])).unwrap();
        let out = reconcile(&Slurm, &cli, &args(&["--mail-user", "a@b.c", "-N", "2"]), false).unwrap();
        assert_eq!(out.unsupported, vec!["--array", "--mail-user"]);
        assert!(!out.spec.contains("array"));
        assert!(!out.spec.contains("mail-user"));
        assert_eq!(out.spec.int("nodes"), Some(2));
    }

    #[test]
    fn test_bad_directive_is_parse_error() {
        let cli = parse_args(&Slurm, &args(&["job.sh"])).unwrap();
        let err = reconcile(&Slurm, &cli, &args(&["--nodes", "many"]), false).unwrap_err();
        assert!(matches!(err, HpcError::Parse(_)));
        let err = reconcile(&Slurm, &cli, &args(&["-J", "a", "-N"]), false).unwrap_err();
        assert!(matches!(err, HpcError::Parse(_)));
    }

    #[test]
    fn test_unknown_directive_flags_reported() {
        let cli = parse_args(&Slurm, &args(&["job.sh"])).unwrap();
        let out = reconcile(
            &Slurm,
            &cli,
            &args(&["--no-such-flag", "x", "-N", "2", "--also-unknown=1", "--mem", "8G"]),
            false,
        )
        .unwrap();
        assert_eq!(out.unsupported, vec!["--no-such-flag", "--also-unknown"]);
        assert_eq!(out.spec.int("nodes"), Some(2));
        assert_eq!(out.spec.str("mem"), Some("8G"));
    }

    #[test]
    fn test_unknown_cli_flag_is_parse_error() {
        let err = parse_args(&Slurm, &args(&["--no-such-flag", "job.sh"])).unwrap_err();
        assert!(matches!(err, HpcError::Parse(_)));
    }

    #[test]
    fn test_attached_cli_values() {
        let cli = parse_args(&Slurm, &args(&["-N4", "-t10", "job.sh"])).unwrap();
        assert_eq!(cli.get("nodes"), Some(&OptionValue::Int(4)));
        assert_eq!(cli.get("time"), Some(&OptionValue::Str("10".into())));
        assert_eq!(cli.positionals(), ["job.sh"]);
    }

    #[test]
    fn test_stray_directive_positionals_ignored() {
        let cli = parse_args(&Slurm, &args(&["job.sh"])).unwrap();
        let out = reconcile(&Slurm, &cli, &args(&["-J", "a", "extra"]), false).unwrap();
        assert_eq!(out.spec.str("job-name"), Some("a"));
        assert!(out.unsupported.is_empty());
    }

    #[test]
    fn test_sge_resources_from_both_origins() {
        let cli = parse_args(&Sge, &args(&["-l", "mc_cores=8", "job.sh"])).unwrap();
        let out = reconcile(&Sge, &cli, &args(&["-N", "test", "-l", "mc_cores=4"]), false).unwrap();
        assert_eq!(out.spec.list("hard-resources"), ["mc_cores=8".to_string()]);
        assert_eq!(out.spec.str("name"), Some("test"));
    }
}
