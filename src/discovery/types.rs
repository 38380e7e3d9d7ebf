use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;

/// An interface attached to a monitored subnet, as reported by the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub id: String,
    #[serde(default)]
    pub subnet_id: String,
    #[serde(default)]
    pub private_ip: Option<IpAddr>,
    #[serde(default)]
    pub description: Option<String>,
}

impl NetworkInterface {
    pub fn new(id: impl Into<String>, subnet_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subnet_id: subnet_id.into(),
            private_ip: None,
            description: None,
        }
    }
}

/// Membership change between two inventory polls. Both lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl InterfaceDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// `added = current \ tracked`, `removed = tracked \ current`.
pub fn diff_interfaces(tracked: &HashSet<String>, current: &HashSet<String>) -> InterfaceDiff {
    let mut added: Vec<String> = current.difference(tracked).cloned().collect();
    let mut removed: Vec<String> = tracked.difference(current).cloned().collect();
    added.sort();
    removed.sort();
    InterfaceDiff { added, removed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diff_reports_both_sides() {
        let diff = diff_interfaces(&set(&["I1", "I2"]), &set(&["I2", "I3"]));
        assert_eq!(diff.added, vec!["I3"]);
        assert_eq!(diff.removed, vec!["I1"]);
    }

    #[test]
    fn identical_sets_have_empty_diff() {
        let diff = diff_interfaces(&set(&["I1"]), &set(&["I1"]));
        assert!(diff.is_empty());
    }

    #[test]
    fn interface_json_defaults() {
        let interface: NetworkInterface = serde_json::from_str(r#"{"id":"eni-1"}"#).unwrap();
        assert_eq!(interface, NetworkInterface::new("eni-1", ""));
    }
}
