//! Credential and cluster management

use super::Session;
use crate::api::Credentials;
use crate::config::ClusterConfig;
use crate::error::Result;
use std::io::Write;
use tracing::info;

/// Arguments of `login`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub cluster: String,
    pub endpoint: String,
    pub username: String,
    pub apikey: String,
    pub vault: String,
    pub insecure: bool,
    pub timeout_secs: u64,
}

/// Verify the endpoint and credentials, then store them under `cluster`
pub fn login(session: &Session, login: Login, out: &mut dyn Write) -> Result<()> {
    let config = ClusterConfig {
        jarvice_endpoint: login.endpoint,
        jarvice_vault: login.vault,
        jarvice_user: Credentials {
            username: login.username,
            apikey: login.apikey,
        },
        jarvice_insecure: login.insecure,
        timeout_secs: login.timeout_secs,
    };
    let api = session.open(&config)?;
    api.live()?;
    api.check_credentials()?;

    session.store().upsert(&login.cluster, config)?;
    info!("stored credentials for {}", login.cluster);
    writeln!(out, "Logged in to cluster {}", login.cluster)?;
    Ok(())
}

/// `vault`
pub fn set_vault(session: &Session, cluster: Option<&str>, vault: &str) -> Result<()> {
    let label = session.cluster_label(cluster)?;
    session.store().set_vault(&label, vault)
}

/// `cluster list`; the selected cluster is starred
pub fn list_clusters(session: &Session, out: &mut dyn Write) -> Result<()> {
    let target = session.store().target()?;
    for label in session.store().labels()? {
        let mark = if label == target { '*' } else { ' ' };
        writeln!(out, "{mark} {label}")?;
    }
    Ok(())
}

/// `cluster use`
pub fn use_cluster(session: &Session, label: &str) -> Result<()> {
    session.store().set_target(label)
}

/// `cluster remove`
pub fn remove_cluster(session: &Session, label: &str) -> Result<()> {
    session.store().remove(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{session, FakeApi};
    use crate::error::HpcError;

    fn login_args(cluster: &str) -> Login {
        Login {
            cluster: cluster.into(),
            endpoint: "https://gpu.example.com".into(),
            username: "bob".into(),
            apikey: "k2".into(),
            vault: "data".into(),
            insecure: true,
            timeout_secs: 10,
        }
    }

    #[test]
    fn test_login_stores_verified_credentials() {
        let api = FakeApi::default();
        let (_dir, session) = session(&api);
        let mut out = Vec::new();
        login(&session, login_args("gpu"), &mut out).unwrap();
        assert_eq!(out, b"Logged in to cluster gpu\n");

        let stored = session.store().resolve("gpu").unwrap();
        assert_eq!(stored.jarvice_user.username, "bob");
        assert_eq!(stored.jarvice_vault, "data");
        assert!(stored.jarvice_insecure);
        assert_eq!(stored.timeout_secs, 10);
    }

    #[test]
    fn test_login_rejected_stores_nothing() {
        let api = FakeApi::default();
        api.0.borrow_mut().reject_credentials = true;
        let (_dir, session) = session(&api);
        let err = login(&session, login_args("gpu"), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, HpcError::Http { status: 401, .. }));
        assert!(session.store().resolve("gpu").is_err());
    }

    #[test]
    fn test_cluster_management() {
        let api = FakeApi::default();
        let (_dir, session) = session(&api);
        login(&session, login_args("gpu"), &mut Vec::new()).unwrap();

        use_cluster(&session, "gpu").unwrap();
        let mut out = Vec::new();
        list_clusters(&session, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "  default\n* gpu\n");

        set_vault(&session, None, "scratch").unwrap();
        assert_eq!(session.store().resolve("gpu").unwrap().jarvice_vault, "scratch");

        remove_cluster(&session, "gpu").unwrap();
        assert!(use_cluster(&session, "gpu").is_err());
    }
}
