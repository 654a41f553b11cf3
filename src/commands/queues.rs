//! Queue (partition) listings

use super::{write_table, Session};
use crate::api::QueueDescriptor;
use crate::error::Result;
use std::collections::BTreeMap;
use std::io::Write;

/// `sinfo`
pub fn sinfo(session: &Session, cluster: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let (_, api) = session.connect(cluster)?;
    write_sinfo(&api.queues()?, out)
}

fn write_sinfo(queues: &BTreeMap<String, QueueDescriptor>, out: &mut dyn Write) -> Result<()> {
    let mut rows = vec![["PARTITION", "AVAIL", "TIMELIMIT", "NODES", "STATE", "NODELIST"]
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()];
    for queue in queues.values() {
        rows.push(vec![
            queue.name.clone(),
            "up".to_string(),
            "infinite".to_string(),
            queue.size.to_string(),
            "idle".to_string(),
            node_list(queue),
        ]);
    }
    write_table(out, &rows, false)
}

/// `machine[0-N]` for a queue of N+1 nodes
fn node_list(queue: &QueueDescriptor) -> String {
    match queue.size {
        0 => queue.machine.clone(),
        1 => format!("{}[0]", queue.machine),
        n => format!("{}[0-{}]", queue.machine, n - 1),
    }
}

/// `qconf -sql`: queue names, one per line
pub fn qconf(session: &Session, cluster: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let (_, api) = session.connect(cluster)?;
    let names = api.queue_names()?;
    if names.is_empty() {
        writeln!(out, "default")?;
    }
    for name in names {
        writeln!(out, "{name}")?;
    }
    Ok(())
}
