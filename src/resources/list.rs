//! Generic resource lists (`-l key=value,...`, `--gres name:type:count,...`)

use crate::error::{HpcError, Result};
use std::collections::BTreeMap;

/// Value of one entry in a resource list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceValue {
    /// Key given without a value
    Flag,
    /// Everything after the first separator, unquoted
    Value(String),
}

impl ResourceValue {
    /// Textual form; a bare flag reads as `true`
    pub fn as_str(&self) -> &str {
        match self {
            ResourceValue::Flag => "true",
            ResourceValue::Value(v) => v,
        }
    }
}

/// Decoded resource list, keyed by resource name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceList(BTreeMap<String, ResourceValue>);

impl ResourceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ResourceValue> {
        self.0.get(key)
    }

    /// Value of `key` as a string, if present
    pub fn value(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(ResourceValue::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ResourceValue) {
        self.0.insert(key.into(), value);
    }

    /// Merge `other` into `self`; entries of `other` replace existing ones
    pub fn extend(&mut self, other: ResourceList) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Decode a comma-delimited resource list.
///
/// Each token is `key` or `key<sep>value`; the value is everything after
/// the first separator. Double-quoted spans may contain commas and
/// separators. Later duplicates win.
pub fn decode_resource_list(input: &str, separator: char) -> Result<ResourceList> {
    let mut list = ResourceList::new();
    for token in split_outside_quotes(input, ',')? {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (key, value) = match find_outside_quotes(token, separator) {
            Some(idx) => (
                token[..idx].trim(),
                Some(&token[idx + separator.len_utf8()..]),
            ),
            None => (token, None),
        };
        if key.is_empty() {
            return Err(HpcError::decode("resources", input, "empty resource name"));
        }
        let value = match value {
            Some(v) => ResourceValue::Value(unquote(v.trim())),
            None => ResourceValue::Flag,
        };
        list.insert(key, value);
    }
    Ok(list)
}

fn split_outside_quotes(text: &str, delim: char) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            c if c == delim && !quoted => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if quoted {
        return Err(HpcError::decode("resources", text, "unterminated quote"));
    }
    parts.push(&text[start..]);
    Ok(parts)
}

fn find_outside_quotes(text: &str, target: char) -> Option<usize> {
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            c if c == target && !quoted => return Some(i),
            _ => {}
        }
    }
    None
}

fn unquote(value: &str) -> String {
    match value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    {
        Some(inner) if value.len() >= 2 => inner.replace("\\\"", "\""),
        _ => value.to_string(),
    }
}
