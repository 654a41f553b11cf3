//! API Data Models
//!
//! Wire types of the JARVICE endpoints.

use crate::error::{HpcError, Result};
use crate::request::Machine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// API user credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub apikey: String,
}

/// Queue metadata from `/jarvice/queues?info=true`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDescriptor {
    pub name: String,
    pub app: String,
    /// Default machine type
    pub machine: String,
    /// Largest node count a job may request
    pub size: u32,
}

/// Pick the queue `name` from a `queues` response.
///
/// The service may answer with a single entry under another key; that
/// entry is used when no key matches.
pub fn select_queue(
    mut queues: BTreeMap<String, QueueDescriptor>,
    name: &str,
) -> Result<QueueDescriptor> {
    if let Some(queue) = queues.remove(name) {
        return Ok(queue);
    }
    let by_name = queues.values().find(|q| q.name == name).cloned();
    if let Some(queue) = by_name {
        return Ok(queue);
    }
    let mut entries = queues.into_values();
    match (entries.next(), entries.next()) {
        (Some(only), None) => Ok(only),
        _ => Err(HpcError::not_found("queue", name)),
    }
}

/// Response of `/jarvice/submit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub name: String,
    pub number: u64,
}

/// Submission details echoed back in job listings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSubmission {
    #[serde(default)]
    pub machine: Option<Machine>,
    #[serde(default)]
    pub queue: String,
}

/// One entry of `/jarvice/jobs`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobRecord {
    pub job_label: String,
    pub job_owner_username: String,
    pub job_status: String,
    pub job_submit_time: i64,
    pub job_start_time: i64,
    pub job_end_time: i64,
    pub job_exitcode: i64,
    pub job_application: String,
    pub job_api_submission: ApiSubmission,
}

impl JobRecord {
    /// Whether the job was submitted through a scheduler command
    pub fn is_hpc(&self) -> bool {
        !self.job_api_submission.queue.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.job_status == "PROCESSING STARTING"
    }

    pub fn node_count(&self) -> u32 {
        self.job_api_submission
            .machine
            .as_ref()
            .map(|m| m.nodes)
            .unwrap_or(0)
    }

    pub fn machine_type(&self) -> &str {
        self.job_api_submission
            .machine
            .as_ref()
            .map(|m| m.machine_type.as_str())
            .unwrap_or("")
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self.job_submit_time)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self.job_start_time)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self.job_end_time)
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

/// Job listing keyed by job number
pub type JobList = BTreeMap<u64, JobRecord>;

/// `{"error": "..."}` body of a failed request
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(name: &str, size: u32) -> QueueDescriptor {
        QueueDescriptor {
            name: name.into(),
            app: "hpc-app".into(),
            machine: "n1".into(),
            size,
        }
    }

    #[test]
    fn test_select_queue() {
        let mut queues = BTreeMap::new();
        queues.insert("default".to_string(), queue("default", 8));
        queues.insert("big".to_string(), queue("big", 64));
        assert_eq!(select_queue(queues.clone(), "big").unwrap().size, 64);
        assert!(matches!(
            select_queue(queues, "gone"),
            Err(HpcError::NotFound { what: "queue", .. })
        ));

        let mut single = BTreeMap::new();
        single.insert("0".to_string(), queue("fast", 4));
        assert_eq!(select_queue(single.clone(), "fast").unwrap().name, "fast");
        assert_eq!(select_queue(single, "other").unwrap().name, "fast");

        assert!(select_queue(BTreeMap::new(), "default").is_err());
    }

    #[test]
    fn test_job_list_from_json() {
        let json = r#"{
            "12": {
                "job_label": "sim",
                "job_owner_username": "alice",
                "job_status": "PROCESSING STARTING",
                "job_submit_time": 1700000000,
                "job_api_submission": {"machine": {"type": "n3", "nodes": 2}, "queue": "default"}
            },
            "13": {"job_label": "desktop", "job_status": "SUBMITTED"}
        }"#;
        let jobs: JobList = serde_json::from_str(json).unwrap();
        let sim = &jobs[&12];
        assert!(sim.is_hpc());
        assert!(sim.is_running());
        assert_eq!(sim.node_count(), 2);
        assert_eq!(sim.machine_type(), "n3");
        assert!(sim.submitted_at().is_some());
        assert!(sim.ended_at().is_none());
        assert!(!jobs[&13].is_hpc());
    }

    #[test]
    fn test_queue_descriptor_wire_names() {
        let json = r#"{"name": "default", "app": "hpc-app", "machine": "n1", "size": 8}"#;
        let q: QueueDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(q, queue("default", 8));
    }
}
