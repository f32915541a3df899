use crate::arena::{Arena, LinkId, NodeId, PortId};
use crate::model::{Direction, Endpoint, Link, Node, Port};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

type IdIndex<V> = IndexMap<String, V, FxBuildHasher>;

/// Owns every node, port and link of the displayed topology.
///
/// Nodes and links are also indexed by their external id (datapath id, MAC, controller link id)
/// in insertion order, which is the order snapshots and default placement iterate in.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: Arena<NodeId, Node>,
    ports: Arena<PortId, Port>,
    links: Arena<LinkId, Link>,
    node_index: IdIndex<NodeId>,
    link_index: IdIndex<LinkId>,
    last_event_id: u64,
    generation: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic id of the synthetic link joining a host to its switch.
    pub fn host_link_id(host_id: &str) -> String {
        format!("host:{host_id}")
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }

    /// Highest server event id applied so far.
    pub fn last_event_id(&self) -> u64 {
        self.last_event_id
    }

    /// Moves the cursor forward; smaller ids are ignored.
    pub fn advance_cursor(&mut self, event_id: u64) -> bool {
        if event_id > self.last_event_id {
            self.last_event_id = event_id;
            return true;
        }
        false
    }

    /// Incremented by [`GraphStore::clear`]; lets callers recognise work started against an
    /// earlier topology.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.ports.clear();
        self.links.clear();
        self.node_index.clear();
        self.link_index.clear();
        self.last_event_id = 0;
        self.generation += 1;
        tracing::info!(generation = self.generation, "topology cleared");
    }

    pub fn find_node(&self, id: &str) -> Option<NodeId> {
        self.node_index.get(id).copied()
    }

    pub fn find_link(&self, id: &str) -> Option<LinkId> {
        self.link_index.get(id).copied()
    }

    pub fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node)
    }

    pub fn node_mut(&mut self, node: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node)
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.find_node(id).and_then(|node| self.nodes.get(node))
    }

    pub fn port(&self, port: PortId) -> Option<&Port> {
        self.ports.get(port)
    }

    pub fn port_mut(&mut self, port: PortId) -> Option<&mut Port> {
        self.ports.get_mut(port)
    }

    pub fn link(&self, link: LinkId) -> Option<&Link> {
        self.links.get(link)
    }

    pub fn link_mut(&mut self, link: LinkId) -> Option<&mut Link> {
        self.links.get_mut(link)
    }

    pub fn link_by_id(&self, id: &str) -> Option<&Link> {
        self.find_link(id).and_then(|link| self.links.get(link))
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.node_index
            .values()
            .filter_map(|&handle| self.nodes.get(handle).map(|node| (handle, node)))
    }

    /// Links in insertion order.
    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> + '_ {
        self.link_index
            .values()
            .filter_map(|&handle| self.links.get(handle).map(|link| (handle, link)))
    }

    /// Inserts `node` unless a node with the same id exists, in which case the existing handle is
    /// returned and `node` is dropped.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        if let Some(existing) = self.find_node(&node.id) {
            tracing::debug!(node = %node.id, "node already present");
            return existing;
        }
        node.ports.clear();
        node.links.clear();
        node.port_counts.reset();
        let id = node.id.clone();
        let handle = self.nodes.insert(node);
        tracing::info!(node = %id, "node added");
        self.node_index.insert(id, handle);
        handle
    }

    /// Removes a node together with its ports and every incident link.
    pub fn remove_node(&mut self, node: NodeId) -> Option<Node> {
        let links = self.nodes.get(node)?.links.clone();
        for link in links {
            self.remove_link_keeping(link, &[node]);
        }
        let removed = self.nodes.remove(node)?;
        for &port in &removed.ports {
            self.ports.remove(port);
        }
        self.node_index.shift_remove(&removed.id);
        tracing::info!(node = %removed.id, "node removed");
        Some(removed)
    }

    pub fn remove_node_by_id(&mut self, id: &str) -> Option<Node> {
        let node = self.find_node(id)?;
        self.remove_node(node)
    }

    /// Connects `a` and `b`, given as `(node id, port number)`.
    ///
    /// Returns `None` when either endpoint is unknown or both are the same node. An existing link
    /// with the same id is returned unchanged. A link already occupying one of the two ports is
    /// replaced.
    pub fn add_link(
        &mut self,
        id: impl Into<String>,
        a: (&str, u32),
        b: (&str, u32),
    ) -> Option<LinkId> {
        let id = id.into();
        if let Some(existing) = self.find_link(&id) {
            tracing::debug!(link = %id, "link already present");
            return Some(existing);
        }
        let (Some(na), Some(nb)) = (self.find_node(a.0), self.find_node(b.0)) else {
            tracing::warn!(link = %id, a = a.0, b = b.0, "link endpoint not found");
            return None;
        };
        if na == nb {
            tracing::warn!(link = %id, node = a.0, "self loop ignored");
            return None;
        }

        for (node, port) in [(na, a.1), (nb, b.1)] {
            if let Some(old) = self.link_on_port(node, port) {
                tracing::info!(link = %id, port, "replacing link on occupied port");
                self.remove_link_keeping(old, &[na, nb]);
            }
        }

        let to_host = [na, nb]
            .iter()
            .any(|&n| self.nodes.get(n).is_some_and(Node::is_host));
        let handle = self.links.insert(Link {
            id: id.clone(),
            a: Endpoint {
                node: na,
                port: a.1,
            },
            b: Endpoint {
                node: nb,
                port: b.1,
            },
            bandwidth: 0.0,
            load: 0.0,
            is_route: false,
            to_host,
        });
        self.link_index.insert(id.clone(), handle);

        for (node, port_no) in [(na, a.1), (nb, b.1)] {
            if let Some(n) = self.nodes.get_mut(node) {
                n.links.push(handle);
            }
            let Some(port) = self.find_port(node, port_no) else {
                continue;
            };
            let mut speed = 0.0;
            if let Some(p) = self.ports.get_mut(port) {
                p.link = Some(handle);
                speed = p.curr_speed;
            }
            if let Some(link) = self.links.get_mut(handle) {
                link.raise_bandwidth(speed);
            }
        }
        tracing::info!(link = %id, a = a.0, b = b.0, "link added");
        Some(handle)
    }

    /// Removes a link. A host left without links is removed too.
    pub fn remove_link(&mut self, link: LinkId) -> bool {
        self.remove_link_keeping(link, &[])
    }

    pub fn remove_link_by_id(&mut self, id: &str) -> bool {
        match self.find_link(id) {
            Some(link) => self.remove_link(link),
            None => false,
        }
    }

    fn remove_link_keeping(&mut self, link: LinkId, keep: &[NodeId]) -> bool {
        let Some(removed) = self.links.remove(link) else {
            return false;
        };
        self.link_index.shift_remove(&removed.id);
        for end in [removed.a, removed.b] {
            if let Some(port) = self.find_port(end.node, end.port) {
                if let Some(p) = self.ports.get_mut(port) {
                    if p.link == Some(link) {
                        p.link = None;
                    }
                }
            }
            if let Some(node) = self.nodes.get_mut(end.node) {
                node.links.retain(|&l| l != link);
            }
        }
        tracing::info!(link = %removed.id, "link removed");

        for end in [removed.a, removed.b] {
            if keep.contains(&end.node) {
                continue;
            }
            let orphan_host = self
                .nodes
                .get(end.node)
                .is_some_and(|n| n.is_host() && n.links.is_empty());
            if orphan_host {
                self.remove_node(end.node);
            }
        }
        true
    }

    /// Link attached to `node` at OpenFlow port `port`, looked up through the node's links so it
    /// works before the port itself has been discovered.
    pub fn link_on_port(&self, node: NodeId, port: u32) -> Option<LinkId> {
        let n = self.nodes.get(node)?;
        n.links.iter().copied().find(|&l| {
            self.links
                .get(l)
                .and_then(|link| link.endpoint_of(node))
                .is_some_and(|end| end.port == port)
        })
    }

    pub fn find_link_by_port(&self, node_id: &str, port: u32) -> Option<LinkId> {
        self.link_on_port(self.find_node(node_id)?, port)
    }

    pub fn find_port(&self, node: NodeId, of_port: u32) -> Option<PortId> {
        let n = self.nodes.get(node)?;
        n.ports
            .iter()
            .copied()
            .find(|&p| self.ports.get(p).is_some_and(|port| port.of_port == of_port))
    }

    /// Creates port `of_port` on `node` in the node's default direction, at the next free slot.
    ///
    /// Returns the existing port when already present, `None` when the node is gone.
    pub fn add_port(&mut self, node: NodeId, of_port: u32) -> Option<PortId> {
        if let Some(existing) = self.find_port(node, of_port) {
            return Some(existing);
        }
        let link = self.link_on_port(node, of_port);
        let n = self.nodes.get_mut(node)?;
        let direction = n.mode().default_port_direction();
        let slot = n.port_counts.take_slot(direction);
        let handle = self.ports.insert(Port {
            of_port,
            owner: node,
            direction,
            slot,
            link,
            x: 0.0,
            y: 0.0,
            size: 0.0,
            anchor: None,
            curr_speed: 0.0,
        });
        n.ports.push(handle);
        tracing::debug!(node = %n.id, port = of_port, ?direction, slot, "port added");
        Some(handle)
    }

    /// Drops every port of `node` and resets its per-side counters. Links are kept.
    pub fn clear_ports(&mut self, node: NodeId) -> usize {
        let Some(n) = self.nodes.get_mut(node) else {
            return 0;
        };
        let ports = std::mem::take(&mut n.ports);
        n.port_counts.reset();
        for &port in &ports {
            self.ports.remove(port);
        }
        ports.len()
    }

    /// Records a port's current speed and raises the attached link's bandwidth.
    pub fn set_port_speed(&mut self, port: PortId, speed: f64) {
        let Some(p) = self.ports.get_mut(port) else {
            return;
        };
        p.curr_speed = speed;
        let link = p.link;
        if let Some(link) = link.and_then(|l| self.links.get_mut(l)) {
            link.raise_bandwidth(speed);
        }
    }

    /// Ports of `node` on `direction`, ordered by slot.
    pub fn ports_on(&self, node: NodeId, direction: Direction) -> Vec<PortId> {
        let Some(n) = self.nodes.get(node) else {
            return Vec::new();
        };
        let mut out: Vec<(usize, PortId)> = n
            .ports
            .iter()
            .filter_map(|&p| {
                let port = self.ports.get(p)?;
                (port.direction == direction).then_some((port.slot, p))
            })
            .collect();
        out.sort_by_key(|(slot, _)| *slot);
        out.into_iter().map(|(_, p)| p).collect()
    }

    /// The port at the far end of the link attached to `port`, if that port is known.
    pub fn opposite_port(&self, port: PortId) -> Option<PortId> {
        let p = self.ports.get(port)?;
        let link = self.links.get(p.link?)?;
        let far = link.other(p.owner)?;
        self.find_port(far.node, far.port)
    }

    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        let Some(n) = self.nodes.get(node) else {
            return Vec::new();
        };
        n.links
            .iter()
            .filter_map(|&l| self.links.get(l)?.other(node).map(|end| end.node))
            .collect()
    }

    pub fn link_between(&self, a: NodeId, b: NodeId) -> Option<LinkId> {
        let n = self.nodes.get(a)?;
        n.links.iter().copied().find(|&l| {
            self.links
                .get(l)
                .and_then(|link| link.other(a))
                .is_some_and(|end| end.node == b)
        })
    }
}
