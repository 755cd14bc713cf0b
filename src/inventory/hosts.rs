use crate::inventory::{InventoryError, Result};
use crate::types::Host;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Read a host list: one address per line, blank lines and `#` comments
/// skipped, duplicates collapsed to their first occurrence.
pub fn load_hosts_file(path: &Path) -> Result<Vec<Host>> {
    if !path.is_file() {
        return Err(InventoryError::MissingHostsFile {
            path: path.display().to_string(),
        });
    }

    let content = std::fs::read_to_string(path)?;
    let hosts = parse_host_list(&content);
    debug!("Read {} host(s) from {}", hosts.len(), path.display());
    Ok(hosts)
}

pub fn parse_host_list(content: &str) -> Vec<Host> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(line.to_string()))
        .map(Host::new)
        .collect()
}
