//! Multicast forwarding table

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::topology::Topology;
use crate::types::{GroupAddress, InterfaceId};

/// Which senders a forwarding entry applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceMatch {
    Any,
    Interface(InterfaceId),
}

impl SourceMatch {
    fn matches(&self, source: InterfaceId) -> bool {
        match self {
            SourceMatch::Any => true,
            SourceMatch::Interface(iface) => *iface == source,
        }
    }
}

/// One forwarding rule: packets for `group` from a matching source are
/// replicated to `outputs`. Entries never expire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingEntry {
    pub group: GroupAddress,
    pub source: SourceMatch,
    pub outputs: BTreeSet<InterfaceId>,
}

/// The forwarding table of a cell. Multiple entries per group are legal;
/// resolution takes their union.
#[derive(Debug, Clone, Default)]
pub struct ForwardingTable {
    entries: Vec<ForwardingEntry>,
}

impl ForwardingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, entry: ForwardingEntry) {
        self.entries.push(entry);
    }

    /// Remove every entry for `group` with exactly this source match.
    /// Returns `true` if anything was removed.
    pub fn remove_route(&mut self, group: &GroupAddress, source: &SourceMatch) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.group == *group && e.source == *source));
        self.entries.len() < before
    }

    pub fn entries(&self) -> &[ForwardingEntry] {
        &self.entries
    }

    /// Resolve the receiver set for a packet from `source` to `group`: the
    /// deduplicated union of all matching entries' outputs, minus the source
    /// interface, restricted to interfaces that currently have the group
    /// joined. An empty result is not an error.
    pub fn resolve(
        &self,
        source: InterfaceId,
        group: &GroupAddress,
        topology: &Topology,
    ) -> Vec<InterfaceId> {
        let mut receivers = BTreeSet::new();
        for entry in &self.entries {
            if entry.group == *group && entry.source.matches(source) {
                receivers.extend(entry.outputs.iter().copied());
            }
        }
        receivers.remove(&source);
        receivers
            .into_iter()
            .filter(|iface| topology.joined(*iface, group))
            .collect()
    }
}
