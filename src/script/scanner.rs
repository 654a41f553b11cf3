//! Directive scanner
//!
//! Reads a job script line by line and recognises three kinds of lines:
//! the shebang, directive comments (`#$ ...` for SGE, `#SBATCH ...` for
//! Slurm) and everything else. Directive arguments are tokenised into
//! flag/value pairs ready to be parsed with the dialect's flag schema.

use crate::error::{IoResultExt, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Interpreter used when the script has no shebang line
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Where a job script is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Standard input
    Stdin,
    /// A file on disk
    File(PathBuf),
}

impl ScriptSource {
    /// Build a source from an optional positional argument
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None | Some("-") => Self::Stdin,
            Some(path) => Self::File(PathBuf::from(path)),
        }
    }

    /// Name used for job labels and submit messages
    pub fn display_name(&self) -> String {
        match self {
            Self::Stdin => "STDIN".to_string(),
            Self::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }
}

/// Scanner settings for one dialect
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions<'a> {
    /// Directive marker following `#` (`"$"`, `"SBATCH"`)
    pub marker: &'a str,
    /// Stop honouring directives after the first command line
    pub stop_at_first_command: bool,
}

impl<'a> ScanOptions<'a> {
    /// Scan the whole file for directives with the given marker
    pub fn new(marker: &'a str) -> Self {
        Self {
            marker,
            stop_at_first_command: false,
        }
    }
}

/// A scanned job script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDirectiveSet {
    interpreter: String,
    directive_args: Vec<String>,
    body: Vec<u8>,
}

impl ScriptDirectiveSet {
    /// Script made of a single command line, with no directives
    pub fn inline(command: &str) -> Self {
        let mut body = command.as_bytes().to_vec();
        body.push(b'\n');
        Self {
            interpreter: DEFAULT_SHELL.to_string(),
            directive_args: Vec::new(),
            body,
        }
    }

    /// Interpreter from the shebang line, or [`DEFAULT_SHELL`]
    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// Directive arguments in the order they appeared
    pub fn directive_args(&self) -> &[String] {
        &self.directive_args
    }

    /// Script body without the shebang and directive lines
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Scan a script from a file or standard input
pub fn scan_source(source: &ScriptSource, options: ScanOptions<'_>) -> Result<ScriptDirectiveSet> {
    match source {
        ScriptSource::Stdin => {
            let stdin = io::stdin();
            scan(stdin.lock(), options).with_path("<stdin>")
        }
        ScriptSource::File(path) => scan_path(path, options),
    }
}

/// Scan a script file
pub fn scan_path(path: &Path, options: ScanOptions<'_>) -> Result<ScriptDirectiveSet> {
    let file = File::open(path).with_path(path)?;
    scan(BufReader::new(file), options).with_path(path)
}

/// Scan a script from any buffered reader
pub fn scan<R: BufRead>(mut reader: R, options: ScanOptions<'_>) -> io::Result<ScriptDirectiveSet> {
    let marker = options.marker.as_bytes();
    let mut interpreter = DEFAULT_SHELL.to_string();
    let mut directive_args = Vec::new();
    let mut body = Vec::new();

    let mut shelled = false;
    let mut window_open = true;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = trim_newline(&buf);

        if line.iter().all(u8::is_ascii_whitespace) {
            if shelled {
                body.extend_from_slice(line);
                body.push(b'\n');
            }
            continue;
        }
        let first_line = !shelled;
        shelled = true;

        if line.len() > 1 && line[0] == b'#' {
            if first_line && line[1] == b'!' {
                interpreter = String::from_utf8_lossy(&line[2..]).trim().to_string();
                continue;
            }
            if window_open && line[1..].starts_with(marker) {
                let rest = String::from_utf8_lossy(&line[1 + marker.len()..]);
                let args = tokenize_directive(&rest);
                debug!(?args, "directive line");
                directive_args.extend(args);
                continue;
            }
            if marker.first() != Some(&line[1]) {
                continue;
            }
        } else if options.stop_at_first_command && line[0] != b'#' {
            window_open = false;
        }

        body.extend_from_slice(line);
        body.push(b'\n');
    }

    Ok(ScriptDirectiveSet {
        interpreter,
        directive_args,
        body,
    })
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Split the text after a directive marker into flag/value arguments.
///
/// A token starting with `-` opens a flag; following tokens are joined with
/// single spaces into that flag's value. A bare `#` outside quotes ends the
/// directive.
pub fn tokenize_directive(text: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut value: Option<String> = None;

    for token in split_tokens(strip_inline_comment(text)) {
        if token.starts_with('-') && token.len() > 1 {
            flush_value(&mut args, value.take());
            // `--name=value` carries its own value
            let attached = token.split_once('=').map(|(flag, v)| format!("{flag}={}", unquote(v)));
            value = attached.is_none().then(String::new);
            args.push(attached.unwrap_or(token));
        } else if let Some(v) = value.as_mut() {
            if !v.is_empty() {
                v.push(' ');
            }
            v.push_str(&token);
        }
    }
    flush_value(&mut args, value);
    args
}

fn flush_value(args: &mut Vec<String>, value: Option<String>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        args.push(unquote(&v));
    }
}

fn strip_inline_comment(text: &str) -> &str {
    let mut in_quotes = false;
    let mut prev_space = true;
    let mut prev = '\0';
    for (idx, ch) in text.char_indices() {
        match ch {
            '"' if prev != '\\' => in_quotes = !in_quotes,
            '#' if !in_quotes && prev_space => return &text[..idx],
            _ => {}
        }
        prev_space = ch.is_whitespace();
        prev = ch;
    }
    text
}

/// Whitespace split that keeps double-quoted spans in one token
fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut prev = '\0';
    for ch in text.chars() {
        if ch == '"' && prev != '\\' {
            in_quotes = !in_quotes;
        }
        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
        prev = ch;
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        if !inner.contains('"') || inner.contains("\\\"") {
            return inner.replace("\\\"", "\"");
        }
    }
    value.to_string()
}
