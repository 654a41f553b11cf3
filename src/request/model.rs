//! Submission payload
//!
//! Field names follow the remote submission schema exactly.

use crate::api::Credentials;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Application command every translated job runs
pub const HPC_COMMAND: &str = "HpcJob";

/// Display geometry the remote application expects
pub const HPC_GEOMETRY: &str = "1280x720";

/// Canonical job submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSubmissionRequest {
    pub app: String,
    pub staging: bool,
    pub checkedout: bool,
    pub application: Application,
    pub machine: Machine,
    pub vault: Vault,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_label: Option<String>,
    pub user: Credentials,
    pub hpc: HpcRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licenses: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_project: Option<String>,
}

/// Application section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walltime: Option<String>,
    pub geometry: String,
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl Application {
    pub fn hpc_job(walltime: Option<String>) -> Self {
        Self {
            command: HPC_COMMAND.to_string(),
            walltime,
            geometry: HPC_GEOMETRY.to_string(),
            parameters: BTreeMap::new(),
        }
    }
}

/// Machine type and node count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    #[serde(rename = "type")]
    pub machine_type: String,
    pub nodes: u32,
}

/// Storage vault attached to the job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub name: String,
    pub readonly: bool,
    pub force: bool,
}

impl Vault {
    pub fn read_write(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            readonly: false,
            force: false,
        }
    }
}

/// Scheduler emulation section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpcRequest {
    /// Shell preamble run before the job
    pub hpc_job_env_config: String,
    /// Base64 of the script body
    pub hpc_job_script: String,
    /// Launch line the body is piped into
    pub hpc_job_shell: String,
    pub hpc_queue: String,
    pub hpc_umask: u32,
    pub hpc_envs: BTreeMap<String, String>,
    pub hpc_resources: BTreeMap<String, String>,
}
