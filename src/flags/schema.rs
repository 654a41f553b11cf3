//! Static option tables and the clap parser built from them

use super::option::{OptionSet, OptionValue};
use crate::error::{HpcError, Result};
use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

const POSITIONAL_ID: &str = "__positional";

/// Kind of value an option carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Str,
    Bool,
    /// Repeatable (arity 1) or multi-value (arity > 1)
    List,
}

/// One entry of a dialect's option table
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    /// Canonical key the value is stored under
    pub key: &'static str,
    pub short: Option<char>,
    pub long: Option<&'static str>,
    pub kind: ValueKind,
    /// Number of values consumed per occurrence
    pub arity: usize,
    pub default: Option<&'static str>,
    /// Whether the translation honours the option
    pub supported: bool,
    pub help: &'static str,
}

impl OptionSpec {
    pub const fn new(key: &'static str, kind: ValueKind) -> Self {
        Self {
            key,
            short: None,
            long: None,
            kind,
            arity: 1,
            default: None,
            supported: false,
            help: "",
        }
    }

    pub const fn short(mut self, c: char) -> Self {
        self.short = Some(c);
        self
    }

    pub const fn long(mut self, name: &'static str) -> Self {
        self.long = Some(name);
        self
    }

    pub const fn arity(mut self, n: usize) -> Self {
        self.arity = n;
        self
    }

    pub const fn default(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    pub const fn supported(mut self) -> Self {
        self.supported = true;
        self
    }

    pub const fn help(mut self, text: &'static str) -> Self {
        self.help = text;
        self
    }

    /// How the option is spelled in diagnostics
    pub fn display_name(&self) -> String {
        match (self.long, self.short) {
            (Some(long), _) => format!("--{long}"),
            (None, Some(short)) => format!("-{short}"),
            (None, None) => self.key.to_string(),
        }
    }

    /// Whether the option consumes values
    pub fn takes_value(&self) -> bool {
        self.kind != ValueKind::Bool
    }

    fn to_arg(self) -> Arg {
        let mut arg = Arg::new(self.key).help(self.help);
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        if let Some(long) = self.long {
            arg = arg.long(long);
        }
        arg = match self.kind {
            ValueKind::Int => arg
                .action(ArgAction::Set)
                .value_parser(value_parser!(i64))
                .allow_negative_numbers(true),
            ValueKind::Str => arg.action(ArgAction::Set).allow_hyphen_values(true),
            ValueKind::Bool => arg.action(ArgAction::SetTrue),
            ValueKind::List if self.arity > 1 => arg
                .action(ArgAction::Set)
                .num_args(self.arity)
                .allow_hyphen_values(true),
            ValueKind::List => arg.action(ArgAction::Append).allow_hyphen_values(true),
        };
        match self.default {
            Some(default) => arg.default_value(default),
            None => arg,
        }
    }
}

/// Look an option up by its key
pub fn find_by_key<'a>(table: &'a [OptionSpec], key: &str) -> Option<&'a OptionSpec> {
    table.iter().find(|spec| spec.key == key)
}

/// Look an option up by its spelling without leading dashes
pub fn find_by_name<'a>(table: &'a [OptionSpec], name: &str) -> Option<&'a OptionSpec> {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => table.iter().find(|spec| spec.short == Some(c)),
        _ => table.iter().find(|spec| spec.long == Some(name)),
    }
}

/// Build a fresh parser for `table`
pub fn build_command(name: &'static str, table: &[OptionSpec]) -> Command {
    let positional = Arg::new(POSITIONAL_ID)
        .num_args(1..)
        .action(ArgAction::Append)
        .trailing_var_arg(true);

    Command::new(name)
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .args_override_self(true)
        .args(table.iter().map(|spec| spec.to_arg()))
        .arg(positional)
}

/// Separate options missing from `table` out of `args`.
///
/// Returns the remaining arguments and the unknown flags as spelled, without
/// any attached value. Tokens following an unknown flag that do not start
/// with `-` are taken as its values and dropped with it. Scanning stops at
/// the first positional or `--`.
pub fn split_unknown(table: &[OptionSpec], args: &[String]) -> (Vec<String>, Vec<String>) {
    let mut known = Vec::with_capacity(args.len());
    let mut unknown = Vec::new();
    let mut iter = args.iter().peekable();

    while let Some(arg) = iter.next() {
        let parsed = if arg == "--" {
            None
        } else if let Some(long) = arg.strip_prefix("--") {
            Some(match long.split_once('=') {
                Some((name, _)) => (name, true),
                None => (long, false),
            })
        } else if let Some(short) = arg.strip_prefix('-').filter(|s| !s.is_empty()) {
            let end = short.chars().next().map_or(0, char::len_utf8);
            Some((&short[..end], short.len() > end))
        } else {
            None
        };

        let Some((name, attached)) = parsed else {
            known.push(arg.clone());
            known.extend(iter.by_ref().cloned());
            break;
        };

        match find_by_name(table, name) {
            Some(spec) => {
                known.push(arg.clone());
                if spec.takes_value() && !attached {
                    for _ in 0..spec.arity {
                        known.extend(iter.next().cloned());
                    }
                }
            }
            None => {
                let dashes = if arg.starts_with("--") { "--" } else { "-" };
                unknown.push(format!("{dashes}{name}"));
                while iter.next_if(|next| !next.starts_with('-')).is_some() {}
            }
        }
    }
    (known, unknown)
}

/// Parse `args` against `table`.
///
/// Repeated options keep the last occurrence, except list options with
/// arity 1, which accumulate.
pub fn parse_options(name: &'static str, table: &[OptionSpec], args: &[String]) -> Result<OptionSet> {
    let matches = build_command(name, table)
        .try_get_matches_from(args)
        .map_err(|e| HpcError::parse(format!("{name}: {}", render_clap_error(&e))))?;

    let mut set = OptionSet::new();
    for spec in table {
        let explicit = matches.value_source(spec.key) == Some(ValueSource::CommandLine);
        if let Some(value) = extract(&matches, spec) {
            set.insert(spec.key, value, explicit);
        }
    }
    set.set_positionals(
        matches
            .get_many::<String>(POSITIONAL_ID)
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
    );
    Ok(set)
}

fn extract(matches: &ArgMatches, spec: &OptionSpec) -> Option<OptionValue> {
    match spec.kind {
        ValueKind::Int => matches.get_one::<i64>(spec.key).copied().map(OptionValue::Int),
        ValueKind::Str => matches
            .get_one::<String>(spec.key)
            .cloned()
            .map(OptionValue::Str),
        ValueKind::Bool => Some(OptionValue::Bool(matches.get_flag(spec.key))),
        ValueKind::List => matches
            .get_many::<String>(spec.key)
            .map(|values| OptionValue::List(values.cloned().collect())),
    }
}

fn render_clap_error(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[OptionSpec] = &[
        OptionSpec::new("nodes", ValueKind::Int)
            .short('N')
            .long("nodes")
            .default("1")
            .supported(),
        OptionSpec::new("job-name", ValueKind::Str)
            .short('J')
            .long("job-name")
            .supported(),
        OptionSpec::new("hold", ValueKind::Bool).short('H').long("hold"),
        OptionSpec::new("gres", ValueKind::List).long("gres").supported(),
        OptionSpec::new("pe", ValueKind::List).long("pe").arity(2).supported(),
    ];

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults_are_not_explicit() {
        let set = parse_options("test", TABLE, &[]).unwrap();
        assert_eq!(set.get("nodes"), Some(&OptionValue::Int(1)));
        assert!(!set.is_explicit("nodes"));
        assert_eq!(set.get("hold"), Some(&OptionValue::Bool(false)));
        assert!(set.get("job-name").is_none());
    }

    #[test]
    fn test_short_long_and_attached_forms() {
        let set = parse_options("test", TABLE, &args(&["-N4", "--job-name=run", "-H"])).unwrap();
        assert_eq!(set.get("nodes"), Some(&OptionValue::Int(4)));
        assert!(set.is_explicit("nodes"));
        assert_eq!(set.get("job-name"), Some(&OptionValue::Str("run".into())));
        assert_eq!(set.get("hold"), Some(&OptionValue::Bool(true)));
    }

    #[test]
    fn test_last_writer_wins_and_lists_accumulate() {
        let set = parse_options(
            "test",
            TABLE,
            &args(&["-N", "2", "--gres", "a", "-N", "3", "--gres", "b"]),
        )
        .unwrap();
        assert_eq!(set.get("nodes"), Some(&OptionValue::Int(3)));
        assert_eq!(
            set.get("gres"),
            Some(&OptionValue::List(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn test_multi_value_option() {
        let set = parse_options("test", TABLE, &args(&["--pe", "mpi", "4"])).unwrap();
        assert_eq!(
            set.get("pe"),
            Some(&OptionValue::List(vec!["mpi".into(), "4".into()]))
        );
    }

    #[test]
    fn test_positionals_stop_option_parsing() {
        let set = parse_options("test", TABLE, &args(&["-N", "2", "job.sh", "-N", "9"])).unwrap();
        assert_eq!(set.get("nodes"), Some(&OptionValue::Int(2)));
        assert_eq!(set.positionals(), ["job.sh", "-N", "9"]);
    }

    #[test]
    fn test_parse_errors() {
        for bad in [&["--bogus"][..], &["-N"], &["-N", "two"]] {
            let err = parse_options("test", TABLE, &args(bad)).unwrap_err();
            assert!(matches!(err, HpcError::Parse(_)), "{bad:?}");
            assert!(err.to_string().starts_with("test: "));
        }
    }

    #[test]
    fn test_unknown_flags_split_out() {
        let (known, unknown) = split_unknown(
            TABLE,
            &args(&["--hint=nomultithread", "-N", "2", "--prio", "high", "-x", "-J", "a", "job.sh", "--bogus"]),
        );
        assert_eq!(known, args(&["-N", "2", "-J", "a", "job.sh", "--bogus"]));
        assert_eq!(unknown, ["--hint", "--prio", "-x"]);

        let (known, unknown) = split_unknown(TABLE, &args(&["-N4", "-J", "-weird", "--", "-x"]));
        assert_eq!(known, args(&["-N4", "-J", "-weird", "--", "-x"]));
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(find_by_name(TABLE, "N").map(|s| s.key), Some("nodes"));
        assert_eq!(find_by_name(TABLE, "gres").map(|s| s.key), Some("gres"));
        assert!(find_by_name(TABLE, "x").is_none());
        assert_eq!(find_by_key(TABLE, "hold").map(|s| s.display_name()), Some("--hold".into()));
    }
}
