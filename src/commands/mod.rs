//! Scheduler command implementations
//!
//! Each emulated tool is a function over a [`Session`], which owns the
//! cluster store and knows how to reach the API of a configured cluster.
//! Output goes to a caller-supplied writer.

mod account;
mod jobs;
mod queues;
mod submit;

pub use account::*;
pub use jobs::*;
pub use queues::*;
pub use submit::*;

use crate::api::{HttpClient, JarviceApi};
use crate::config::{ClusterConfig, ClusterStore};
use crate::error::Result;
use std::io::Write;
use tracing::debug;

type Connector = Box<dyn Fn(&ClusterConfig) -> Result<Box<dyn JarviceApi>>>;

/// Cluster store plus a way to open API clients
pub struct Session {
    store: ClusterStore,
    connector: Connector,
}

impl Session {
    /// Session talking HTTP to the configured endpoints
    pub fn new(store: ClusterStore) -> Self {
        Self::with_connector(store, |config| {
            let client: Box<dyn JarviceApi> = Box::new(HttpClient::new(config)?);
            Ok(client)
        })
    }

    /// Session with a custom client factory
    pub fn with_connector<F>(store: ClusterStore, connector: F) -> Self
    where
        F: Fn(&ClusterConfig) -> Result<Box<dyn JarviceApi>> + 'static,
    {
        Self {
            store,
            connector: Box::new(connector),
        }
    }

    pub fn store(&self) -> &ClusterStore {
        &self.store
    }

    /// Requested label, or the selected one
    pub fn cluster_label(&self, requested: Option<&str>) -> Result<String> {
        match requested {
            Some(label) => Ok(label.to_string()),
            None => self.store.target(),
        }
    }

    /// Resolve a cluster entry and open a client for it
    pub fn connect(&self, requested: Option<&str>) -> Result<(ClusterConfig, Box<dyn JarviceApi>)> {
        let label = self.cluster_label(requested)?;
        let config = self.store.resolve(&label)?;
        debug!("using cluster {label} at {}", config.jarvice_endpoint);
        let api = self.open(&config)?;
        Ok((config, api))
    }

    fn open(&self, config: &ClusterConfig) -> Result<Box<dyn JarviceApi>> {
        (self.connector)(config)
    }
}

/// Print rows as left-aligned columns; `rule` underlines the header
pub(crate) fn write_table(out: &mut dyn Write, rows: &[Vec<String>], rule: bool) -> Result<()> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            rows.iter()
                .filter_map(|row| row.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    for (i, row) in rows.iter().enumerate() {
        let mut line = String::new();
        for (c, cell) in row.iter().enumerate() {
            if c > 0 {
                line.push_str("  ");
            }
            line.push_str(&format!("{:<width$}", cell, width = widths[c]));
        }
        writeln!(out, "{}", line.trim_end())?;
        if i == 0 && rule {
            let total = widths.iter().sum::<usize>() + 2 * columns.saturating_sub(1);
            writeln!(out, "{}", "-".repeat(total))?;
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_table() {
        let rows = vec![
            vec!["ID".to_string(), "NAME".to_string()],
            vec!["1".to_string(), "long-name".to_string()],
        ];
        let mut out = Vec::new();
        write_table(&mut out, &rows, true).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ID  NAME\n-------------\n1   long-name\n"
        );
    }
}
