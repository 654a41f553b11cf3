//! Cluster credential store
//!
//! Credentials live in one JSON file keyed by cluster label, next to a
//! `target` file holding the label commands use when none is requested.

use crate::api::Credentials;
use crate::error::{HpcError, IoResultExt, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Label used when no cluster has been selected
pub const DEFAULT_CLUSTER: &str = "default";

/// Vault attached to jobs when none was configured
pub const DEFAULT_VAULT: &str = "ephemeral";

/// Request timeout when the entry does not set one
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const CONFIG_DIR: &str = "jarvice-hpc";
const CONFIG_FILE: &str = "config.json";
const TARGET_FILE: &str = "target";

/// One cluster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub jarvice_endpoint: String,
    pub jarvice_vault: String,
    pub jarvice_user: Credentials,
    /// Accept self-signed certificates
    #[serde(default)]
    pub jarvice_insecure: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

type Clusters = BTreeMap<String, ClusterConfig>;

/// File-backed set of cluster entries
#[derive(Debug, Clone)]
pub struct ClusterStore {
    path: PathBuf,
}

impl ClusterStore {
    /// Open the store at `path`, or at `<config dir>/jarvice-hpc/config.json`
    pub fn open(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => dirs::config_dir()
                .ok_or_else(|| HpcError::config("cannot determine the user config directory"))?
                .join(CONFIG_DIR)
                .join(CONFIG_FILE),
        };
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn target_path(&self) -> PathBuf {
        self.path.with_file_name(TARGET_FILE)
    }

    fn load(&self) -> Result<Clusters> {
        if !self.path.exists() {
            return Ok(Clusters::new());
        }
        let content = fs::read_to_string(&self.path).with_path(&self.path)?;
        serde_json::from_str(&content)
            .map_err(|e| HpcError::config(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, clusters: &Clusters) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }
        let content = serde_json::to_string_pretty(clusters)?;
        fs::write(&self.path, content).with_path(&self.path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .with_path(&self.path)?;
        }
        debug!("saved {} cluster(s) to {}", clusters.len(), self.path.display());
        Ok(())
    }

    /// Entry for `label`
    pub fn resolve(&self, label: &str) -> Result<ClusterConfig> {
        self.load()?
            .remove(label)
            .ok_or_else(|| HpcError::not_found("cluster", label))
    }

    /// Configured labels, sorted
    pub fn labels(&self) -> Result<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }

    /// Add or replace the entry for `label`
    pub fn upsert(&self, label: &str, config: ClusterConfig) -> Result<()> {
        let mut clusters = self.load()?;
        clusters.insert(label.to_string(), config);
        self.save(&clusters)
    }

    /// Change the vault of an existing entry
    pub fn set_vault(&self, label: &str, vault: &str) -> Result<()> {
        let mut clusters = self.load()?;
        let entry = clusters
            .get_mut(label)
            .ok_or_else(|| HpcError::not_found("cluster", label))?;
        entry.jarvice_vault = vault.to_string();
        self.save(&clusters)
    }

    pub fn remove(&self, label: &str) -> Result<()> {
        let mut clusters = self.load()?;
        if clusters.remove(label).is_none() {
            return Err(HpcError::not_found("cluster", label));
        }
        self.save(&clusters)
    }

    /// Selected cluster label
    pub fn target(&self) -> Result<String> {
        let path = self.target_path();
        if !path.exists() {
            return Ok(DEFAULT_CLUSTER.to_string());
        }
        let label = fs::read_to_string(&path).with_path(&path)?;
        let label = label.trim();
        Ok(if label.is_empty() {
            DEFAULT_CLUSTER.to_string()
        } else {
            label.to_string()
        })
    }

    /// Select `label`; it must already be configured
    pub fn set_target(&self, label: &str) -> Result<()> {
        self.resolve(label)?;
        let path = self.target_path();
        fs::write(&path, format!("{label}\n")).with_path(&path)
    }
}
