//! Cell topology: nodes, their interfaces, and group membership

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::types::{GroupAddress, InterfaceId, NodeId, Position, Role};

/// One radio interface and the groups it has joined.
#[derive(Debug, Clone)]
pub struct Interface {
    id: InterfaceId,
    joined: BTreeSet<GroupAddress>,
}

impl Interface {
    pub fn id(&self) -> InterfaceId {
        self.id
    }

    pub fn joined_groups(&self) -> impl Iterator<Item = &GroupAddress> {
        self.joined.iter()
    }
}

/// A node in the cell. Role is fixed; position changes only through
/// scheduled events.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    role: Role,
    position: Position,
    interfaces: Vec<Interface>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }
}

/// All nodes of a simulation, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    nodes: BTreeMap<NodeId, Node>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with a single interface; returns that interface's id.
    pub fn add_node(&mut self, id: NodeId, role: Role, position: Position) -> InterfaceId {
        let iface = InterfaceId::new(id, 0);
        self.nodes.insert(
            id,
            Node {
                id,
                role,
                position,
                interfaces: vec![Interface {
                    id: iface,
                    joined: BTreeSet::new(),
                }],
            },
        );
        iface
    }

    /// Add another interface to an existing node.
    pub fn add_interface(&mut self, node: NodeId) -> Option<InterfaceId> {
        let entry = self.nodes.get_mut(&node)?;
        let iface = InterfaceId::new(node, entry.interfaces.len() as u32);
        entry.interfaces.push(Interface {
            id: iface,
            joined: BTreeSet::new(),
        });
        Some(iface)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn position(&self, id: NodeId) -> Option<Position> {
        self.nodes.get(&id).map(|n| n.position)
    }

    pub fn set_position(&mut self, id: NodeId, position: Position) {
        match self.nodes.get_mut(&id) {
            Some(node) => node.position = position,
            None => warn!("position update for unknown node {}", id),
        }
    }

    /// All station node ids in ascending order.
    pub fn stations(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.role == Role::Station)
            .map(|n| n.id)
            .collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Join `group` on `iface`. Idempotent; returns `true` if the membership
    /// was newly added.
    pub fn join(&mut self, iface: InterfaceId, group: GroupAddress) -> bool {
        match self.interface_mut(iface) {
            Some(entry) => {
                let added = entry.joined.insert(group.clone());
                if added {
                    debug!("interface {} joined {}", iface, group);
                }
                added
            }
            None => {
                warn!("join on unknown interface {}", iface);
                false
            }
        }
    }

    /// Leave `group` on `iface`. Idempotent; returns `true` if the
    /// membership existed.
    pub fn leave(&mut self, iface: InterfaceId, group: &GroupAddress) -> bool {
        match self.interface_mut(iface) {
            Some(entry) => {
                let removed = entry.joined.remove(group);
                if removed {
                    debug!("interface {} left {}", iface, group);
                }
                removed
            }
            None => {
                warn!("leave on unknown interface {}", iface);
                false
            }
        }
    }

    pub fn joined(&self, iface: InterfaceId, group: &GroupAddress) -> bool {
        self.interface(iface)
            .map(|entry| entry.joined.contains(group))
            .unwrap_or(false)
    }

    pub fn interface(&self, iface: InterfaceId) -> Option<&Interface> {
        self.nodes
            .get(&iface.node)
            .and_then(|n| n.interfaces.get(iface.index as usize))
    }

    fn interface_mut(&mut self, iface: InterfaceId) -> Option<&mut Interface> {
        self.nodes
            .get_mut(&iface.node)
            .and_then(|n| n.interfaces.get_mut(iface.index as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> GroupAddress {
        GroupAddress::from("225.1.2.3")
    }

    #[test]
    fn test_join_leave_idempotent() {
        let mut topo = Topology::new();
        let iface = topo.add_node(1, Role::Station, Position::new(10.0, 0.0, 1.5));

        assert!(topo.join(iface, group()));
        assert!(!topo.join(iface, group()));
        assert!(topo.joined(iface, &group()));

        assert!(topo.leave(iface, &group()));
        assert!(!topo.leave(iface, &group()));
        assert!(!topo.joined(iface, &group()));
    }

    #[test]
    fn test_unknown_interface_is_harmless() {
        let mut topo = Topology::new();
        let ghost = InterfaceId::new(99, 0);
        assert!(!topo.join(ghost, group()));
        assert!(!topo.leave(ghost, &group()));
        assert!(!topo.joined(ghost, &group()));
    }

    #[test]
    fn test_stations_sorted_excludes_access_point() {
        let mut topo = Topology::new();
        topo.add_node(3, Role::Station, Position::new(20.0, 0.0, 1.5));
        topo.add_node(0, Role::AccessPoint, Position::new(0.0, 0.0, 10.0));
        topo.add_node(1, Role::Station, Position::new(10.0, 0.0, 1.5));

        assert_eq!(topo.stations(), vec![1, 3]);
    }

    #[test]
    fn test_extra_interfaces_are_independent() {
        let mut topo = Topology::new();
        let first = topo.add_node(1, Role::Station, Position::new(10.0, 0.0, 1.5));
        let second = topo.add_interface(1).unwrap();

        topo.join(first, group());
        assert!(topo.joined(first, &group()));
        assert!(!topo.joined(second, &group()));
    }

    #[test]
    fn test_set_position() {
        let mut topo = Topology::new();
        topo.add_node(1, Role::Station, Position::new(10.0, 0.0, 1.5));
        topo.set_position(1, Position::new(15.0, 0.0, 1.5));
        assert_eq!(topo.position(1).unwrap().x, 15.0);
    }
}
