//! Blocking HTTP client

use super::models::{select_queue, Credentials, ErrorBody, JobList, QueueDescriptor, SubmitResponse};
use crate::config::ClusterConfig;
use crate::error::{HpcError, Result};
use crate::request::JobSubmissionRequest;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Operations the scheduler commands need from the job API
pub trait JarviceApi {
    /// Descriptor of one queue
    fn queue(&self, name: &str) -> Result<QueueDescriptor> {
        select_queue(self.queues()?, name)
    }

    /// All queues with their descriptors
    fn queues(&self) -> Result<BTreeMap<String, QueueDescriptor>>;

    /// Queue names only
    fn queue_names(&self) -> Result<Vec<String>>;

    fn submit(&self, request: &JobSubmissionRequest) -> Result<SubmitResponse>;

    /// Jobs of the user; `completed` selects finished ones instead of active ones
    fn jobs(&self, completed: bool) -> Result<JobList>;

    /// Graceful shutdown, or immediate termination with `force`
    fn terminate(&self, number: u64, force: bool) -> Result<()>;

    /// Whether the service answers at all
    fn live(&self) -> Result<()>;

    /// Fails with `Http` when the credentials are rejected
    fn check_credentials(&self) -> Result<()>;
}

/// `JarviceApi` over HTTPS
pub struct HttpClient {
    client: Client,
    endpoint: String,
    user: Credentials,
}

impl HttpClient {
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.jarvice_insecure)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.jarvice_endpoint.trim_end_matches('/').to_string(),
            user: config.jarvice_user.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/jarvice/{}", self.endpoint, path)
    }

    /// GET with credentials in the query string
    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response> {
        debug!("GET /jarvice/{path}");
        let response = self
            .client
            .get(self.url(path))
            .query(&[
                ("username", self.user.username.as_str()),
                ("apikey", self.user.apikey.as_str()),
            ])
            .query(query)
            .send()?;
        check_status(response)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        Ok(self.get(path, query)?.json()?)
    }
}

impl JarviceApi for HttpClient {
    fn queues(&self) -> Result<BTreeMap<String, QueueDescriptor>> {
        self.get_json("queues", &[("info", "true")])
    }

    fn queue(&self, name: &str) -> Result<QueueDescriptor> {
        let queues = self.get_json("queues", &[("info", "true"), ("name", name)])?;
        select_queue(queues, name)
    }

    fn queue_names(&self) -> Result<Vec<String>> {
        self.get_json("queues", &[])
    }

    fn submit(&self, request: &JobSubmissionRequest) -> Result<SubmitResponse> {
        debug!("POST /jarvice/submit");
        let response = self.client.post(self.url("submit")).json(request).send()?;
        Ok(check_status(response)?.json()?)
    }

    fn jobs(&self, completed: bool) -> Result<JobList> {
        let completed = if completed { "true" } else { "false" };
        self.get_json("jobs", &[("completed", completed)])
    }

    fn terminate(&self, number: u64, force: bool) -> Result<()> {
        let path = if force { "terminate" } else { "shutdown" };
        self.get(path, &[("number", &number.to_string())])?;
        Ok(())
    }

    fn live(&self) -> Result<()> {
        debug!("GET /jarvice/live");
        let response = self.client.get(self.url("live")).send()?;
        check_status(response)?;
        Ok(())
    }

    fn check_credentials(&self) -> Result<()> {
        self.get("machines", &[])?;
        Ok(())
    }
}

/// Map a non-2xx response to `Http`, keeping the service's error text
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(HpcError::Http {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> ClusterConfig {
        ClusterConfig {
            jarvice_endpoint: endpoint.into(),
            jarvice_vault: "ephemeral".into(),
            jarvice_user: Credentials {
                username: "alice".into(),
                apikey: "key".into(),
            },
            jarvice_insecure: true,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"error": "Invalid user"}"#).as_deref(),
            Some("Invalid user")
        );
        assert_eq!(error_message(r#"{"error": ""}"#).as_deref(), Some(""));
        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let client = HttpClient::new(&config("https://cloud.example.com/")).unwrap();
        assert_eq!(client.url("submit"), "https://cloud.example.com/jarvice/submit");
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        let client = HttpClient::new(&config("http://127.0.0.1:1")).unwrap();
        assert!(matches!(client.live(), Err(HpcError::Transport(_))));
    }
}
