//! Option values and the sets they are collected into

use std::collections::{BTreeMap, BTreeSet};

/// Typed value of one scheduler option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Int(i64),
    Str(String),
    Bool(bool),
    List(Vec<String>),
}

impl OptionValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            OptionValue::List(v) => Some(v),
            _ => None,
        }
    }

    /// Whether two values carry the same kind
    pub fn same_kind(&self, other: &OptionValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Result of parsing one argument list against a dialect schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    values: BTreeMap<&'static str, OptionValue>,
    explicit: BTreeSet<&'static str>,
    positionals: Vec<String>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value; `explicit` marks it as supplied rather than defaulted
    pub fn insert(&mut self, key: &'static str, value: OptionValue, explicit: bool) {
        self.values.insert(key, value);
        if explicit {
            self.explicit.insert(key);
        } else {
            self.explicit.remove(key);
        }
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    pub fn is_explicit(&self, key: &str) -> bool {
        self.explicit.contains(key)
    }

    /// Keys that were supplied explicitly, in key order
    pub fn explicit_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.explicit.iter().copied()
    }

    /// Arguments following the options (script path and its arguments)
    pub fn positionals(&self) -> &[String] {
        &self.positionals
    }

    pub fn set_positionals(&mut self, positionals: Vec<String>) {
        self.positionals = positionals;
    }
}

/// The reconciled job options a submission is built from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedJobSpec {
    values: BTreeMap<&'static str, OptionValue>,
    explicit: BTreeSet<&'static str>,
}

impl ResolvedJobSpec {
    /// Start from every value of `set`, defaults included
    pub fn from_set(set: &OptionSet) -> Self {
        Self {
            values: set.values.clone(),
            explicit: set.explicit.clone(),
        }
    }

    pub fn insert(&mut self, key: &'static str, value: OptionValue) {
        if let Some(existing) = self.values.get(key) {
            debug_assert!(
                existing.same_kind(&value),
                "option '{key}' changed kind during merge"
            );
        }
        self.values.insert(key, value);
        self.explicit.insert(key);
    }

    /// Drop an option entirely
    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.explicit.remove(key);
        self.values.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Whether the option was supplied by either origin
    pub fn is_explicit(&self, key: &str) -> bool {
        self.explicit.contains(key)
    }

    pub fn explicit_keys(&self) -> Vec<&'static str> {
        self.explicit.iter().copied().collect()
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(OptionValue::as_int)
    }

    /// String value, treating an empty string as absent
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(OptionValue::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(OptionValue::as_bool).unwrap_or(false)
    }

    pub fn list(&self, key: &str) -> &[String] {
        self.get(key).and_then(OptionValue::as_list).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_tracks_explicit() {
        let mut set = OptionSet::new();
        set.insert("nodes", OptionValue::Int(1), false);
        set.insert("time", OptionValue::Str("1:00".into()), true);
        assert!(!set.is_explicit("nodes"));
        assert!(set.is_explicit("time"));
        assert_eq!(set.explicit_keys().collect::<Vec<_>>(), vec!["time"]);
    }

    #[test]
    fn test_resolved_accessors() {
        let mut set = OptionSet::new();
        set.insert("nodes", OptionValue::Int(2), true);
        set.insert("job-name", OptionValue::Str(String::new()), false);
        set.insert("cwd", OptionValue::Bool(true), true);
        set.insert("gres", OptionValue::List(vec!["gpu:2".into()]), true);

        let spec = ResolvedJobSpec::from_set(&set);
        assert_eq!(spec.int("nodes"), Some(2));
        assert_eq!(spec.str("job-name"), None);
        assert!(spec.flag("cwd"));
        assert!(!spec.flag("missing"));
        assert_eq!(spec.list("gres"), ["gpu:2".to_string()]);
        assert!(spec.list("missing").is_empty());
    }

    #[test]
    fn test_remove_clears_explicit() {
        let mut spec = ResolvedJobSpec::default();
        spec.insert("array", OptionValue::Str("1-4".into()));
        assert!(spec.is_explicit("array"));
        spec.remove("array");
        assert!(!spec.is_explicit("array"));
        assert!(!spec.contains("array"));
    }
}
