//! Shell preamble and launch line

use crate::dialect::{shell_quote, HOSTS_ENTRY};
use std::net::{IpAddr, UdpSocket};
use tracing::warn;

/// Identity of the host a job is submitted from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostIdentity {
    pub hostname: Option<String>,
    pub outbound_ip: Option<IpAddr>,
    pub current_dir: Option<String>,
}

impl HostIdentity {
    /// Best-effort detection; missing facts are left empty
    pub fn detect() -> Self {
        let hostname = match hostname::get() {
            Ok(name) => Some(name.to_string_lossy().into_owned()).filter(|n| !n.is_empty()),
            Err(e) => {
                warn!("cannot determine hostname: {e}");
                None
            }
        };
        let current_dir = match std::env::current_dir() {
            Ok(dir) => Some(dir.display().to_string()),
            Err(e) => {
                warn!("cannot determine working directory: {e}");
                None
            }
        };
        Self {
            hostname,
            outbound_ip: outbound_ip(),
            current_dir,
        }
    }

    /// `"<ip> <hostname>"` for the remote hosts file, empty when unknown
    pub fn hosts_entry(&self) -> String {
        match (&self.outbound_ip, &self.hostname) {
            (Some(ip), Some(name)) => format!("{ip} {name}"),
            _ => String::new(),
        }
    }
}

/// Local address of the interface that routes to the outside world.
///
/// A connected UDP socket sends nothing; it only resolves the route.
fn outbound_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

/// Fill the preamble template
pub fn render_preamble(template: &str, hosts_entry: &str) -> String {
    template.replace(HOSTS_ENTRY, hosts_entry)
}

/// `[cd <dir> && ]VAR=value ... <shell>`
pub fn launch_line(working_dir: Option<&str>, variables: &[(&str, &str)], shell: &str) -> String {
    let mut line = String::new();
    if let Some(dir) = working_dir {
        line.push_str("cd ");
        line.push_str(&shell_quote(dir));
        line.push_str(" && ");
    }
    for (name, value) in variables {
        line.push_str(name);
        line.push('=');
        line.push_str(value);
        line.push(' ');
    }
    line.push_str(shell);
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Dialect, Sge, Slurm};

    #[test]
    fn test_hosts_entry() {
        let host = HostIdentity {
            hostname: Some("login1".into()),
            outbound_ip: Some("10.0.0.5".parse().unwrap()),
            current_dir: None,
        };
        assert_eq!(host.hosts_entry(), "10.0.0.5 login1");
        assert_eq!(HostIdentity::default().hosts_entry(), "");
    }

    #[test]
    fn test_render_preamble() {
        for dialect in [&Sge as &dyn Dialect, &Slurm] {
            let text = render_preamble(dialect.preamble_template(), "10.0.0.5 login1");
            assert!(text.ends_with("echo 10.0.0.5 login1 | sudo tee -a /etc/hosts || true"));
            assert!(!text.contains(HOSTS_ENTRY));
        }
        let text = render_preamble(Slurm.preamble_template(), "");
        assert!(text.contains("slurm_hosts="));
        assert!(text.ends_with("echo  | sudo tee -a /etc/hosts || true"));
    }

    #[test]
    fn test_launch_line() {
        assert_eq!(
            launch_line(Some("/work"), &[("A", "${a}"), ("B", "1")], "/bin/bash"),
            "cd \"/work\" && A=${a} B=1 /bin/bash"
        );
        assert_eq!(launch_line(None, &[], "/bin/sh"), "/bin/sh");
    }
}
