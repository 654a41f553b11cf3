//! Scalar resource decoders
//!
//! Each decoder is total: malformed input yields [`HpcError::Decode`],
//! never a guessed value.

use crate::error::{HpcError, Result};
use regex::Regex;
use std::sync::OnceLock;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;
const TIB: u64 = GIB * 1024;

fn memory_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([0-9]+)([KMGT])?$").expect("valid memory regex"))
}

fn gpu_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:([A-Za-z0-9_.-]*):)?([0-9]+)$").expect("valid gpu regex")
    })
}

/// Decode a memory request into bytes.
///
/// Accepts `<digits>[K|M|G|T]`; a missing suffix means megabytes.
pub fn decode_memory_bytes(req: &str) -> Result<u64> {
    let invalid = |reason: &str| HpcError::decode("memory", req, reason);

    let caps = memory_pattern()
        .captures(req.trim())
        .ok_or_else(|| invalid("expected <number>[K|M|G|T]"))?;
    let base: u64 = caps[1]
        .parse()
        .map_err(|_| invalid("number out of range"))?;
    if base == 0 {
        return Err(invalid("must be positive"));
    }
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        Some("K") => KIB,
        Some("G") => GIB,
        Some("T") => TIB,
        _ => MIB,
    };
    base.checked_mul(multiplier)
        .ok_or_else(|| invalid("number out of range"))
}

/// Decode a memory request into whole gibibytes, rounding up
pub fn decode_memory(req: &str) -> Result<u64> {
    Ok(decode_memory_bytes(req)?.div_ceil(GIB))
}

/// Decode a GPU request of the form `[<type>:]<count>`.
///
/// Typed requests are rejected: the remote API only accepts a count.
pub fn decode_gpus(req: &str) -> Result<u32> {
    let caps = gpu_pattern()
        .captures(req.trim())
        .ok_or_else(|| HpcError::decode("gpus", req, "expected [<type>:]<count>"))?;
    if let Some(kind) = caps.get(1).filter(|m| !m.as_str().is_empty()) {
        return Err(HpcError::decode(
            "gpus",
            req,
            format!("GPU type '{}' not supported", kind.as_str()),
        ));
    }
    caps[2]
        .parse()
        .map_err(|_| HpcError::decode("gpus", req, "count out of range"))
}

/// Decode a core count; fractional requests are rounded up
pub fn decode_cores(req: &str) -> Result<u32> {
    let invalid = |reason: &str| HpcError::decode("cores", req, reason);
    let value: f64 = req
        .trim()
        .parse()
        .map_err(|_| invalid("expected a number"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid("must be positive"));
    }
    let cores = value.ceil();
    if cores > f64::from(u32::MAX) {
        return Err(invalid("number out of range"));
    }
    Ok(cores as u32)
}

/// Decode Slurm `sockets[:cores[:threads]]` into a core count.
///
/// Threads are ignored; the result is `sockets x cores`.
pub fn decode_node_info(req: &str) -> Result<u32> {
    let invalid = |reason: &str| HpcError::decode("extra-node-info", req, reason);
    let parts: Vec<&str> = req.trim().split(':').collect();
    if parts.len() > 3 {
        return Err(invalid("expected sockets[:cores[:threads]]"));
    }
    let mut numbers = parts.iter().take(2).map(|p| {
        p.parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| invalid("expected positive integers"))
    });
    let sockets = numbers.next().unwrap_or_else(|| Err(invalid("missing sockets")))?;
    let cores = numbers.next().transpose()?.unwrap_or(1);
    if let Some(threads) = parts.get(2) {
        threads
            .parse::<u32>()
            .map_err(|_| invalid("expected positive integers"))?;
    }
    sockets
        .checked_mul(cores)
        .ok_or_else(|| invalid("number out of range"))
}
