//! Normalized resource request

use std::collections::BTreeMap;

/// Resources a job asks for, after decoding.
///
/// `core_count` and `memory_gib` of zero leave the choice to the machine
/// default; a `machine_type` of `None` selects the queue's machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceRequest {
    pub machine_type: Option<String>,
    pub core_count: u32,
    pub memory_gib: u64,
    pub gpu_count: Option<u32>,
    pub licenses: Option<String>,
    pub project: Option<String>,
}

impl ResourceRequest {
    /// Machine type to submit on, falling back to `queue_machine`
    pub fn machine<'a>(&'a self, queue_machine: &'a str) -> &'a str {
        self.machine_type.as_deref().unwrap_or(queue_machine)
    }

    /// The `hpc_resources` map sent with a submission
    pub fn resource_map(&self, queue_machine: &str) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("mc_name".to_string(), self.machine(queue_machine).to_string());
        map.insert("mc_cores".to_string(), self.core_count.to_string());
        map.insert("mc_ram".to_string(), self.memory_gib.to_string());
        if let Some(gpus) = self.gpu_count {
            map.insert("mc_gpus".to_string(), gpus.to_string());
        }
        map
    }
}
