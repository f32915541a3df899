//! Topology entity types stored in a [`GraphStore`](crate::GraphStore).
//!
//! Cross references (port -> owner, link -> endpoint, node -> incident links) are plain handles;
//! the store owns every entity and keeps the back references consistent.

use crate::arena::{LinkId, NodeId, PortId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rendered width/height of a node icon, in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

impl Extent {
    pub fn square(side: f64) -> Self {
        Self {
            width: side,
            height: side,
        }
    }
}

/// Side of a node a port is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Right,
    #[default]
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Right => "right",
            Direction::Down => "down",
            Direction::Left => "left",
        }
    }
}

/// Number of ports currently placed on each side of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DirectionCounts {
    pub up: usize,
    pub right: usize,
    pub down: usize,
    pub left: usize,
}

impl DirectionCounts {
    pub fn get(&self, direction: Direction) -> usize {
        match direction {
            Direction::Up => self.up,
            Direction::Right => self.right,
            Direction::Down => self.down,
            Direction::Left => self.left,
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut usize {
        match direction {
            Direction::Up => &mut self.up,
            Direction::Right => &mut self.right,
            Direction::Down => &mut self.down,
            Direction::Left => &mut self.left,
        }
    }

    /// Reserves the next free slot on `direction` and returns it.
    pub fn take_slot(&mut self, direction: Direction) -> usize {
        let count = self.get_mut(direction);
        let slot = *count;
        *count += 1;
        slot
    }

    pub fn release_slot(&mut self, direction: Direction) {
        let count = self.get_mut(direction);
        *count = count.saturating_sub(1);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Controller-assigned role of a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwitchMode {
    Ar,
    Dr,
    Soc,
    Cisco,
    #[default]
    Unknown,
}

impl SwitchMode {
    pub fn from_role(role: &str) -> Self {
        match role.trim().to_ascii_uppercase().as_str() {
            "AR" => SwitchMode::Ar,
            "DR" => SwitchMode::Dr,
            "SOC" => SwitchMode::Soc,
            "CISCO" => SwitchMode::Cisco,
            _ => SwitchMode::Unknown,
        }
    }

    /// Side a freshly discovered port starts on before its link direction is known.
    pub fn default_port_direction(self) -> Direction {
        match self {
            SwitchMode::Dr => Direction::Up,
            _ => Direction::Down,
        }
    }

    /// Row used for default placement (1-based, top to bottom).
    pub fn placement_row(self) -> u32 {
        match self {
            SwitchMode::Dr => 1,
            SwitchMode::Ar => 2,
            _ => 3,
        }
    }
}

/// Path-selection marker read by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionType {
    #[default]
    None,
    Exact,
    Include,
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchStatus {
    #[default]
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SwitchInfo {
    pub dpid: String,
    pub mode: SwitchMode,
    pub status: SwitchStatus,
    /// Consecutive "down" reports; the switch is torn down on the second one.
    pub down_count: u32,
    pub selection: SelectionType,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostInfo {
    pub mac: String,
    pub switch_id: String,
    pub switch_port: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Switch(SwitchInfo),
    Host(HostInfo),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub position: Point,
    pub extent: Extent,
    /// Position came from the controller or from a user drag; default placement leaves it alone.
    pub pinned: bool,
    pub port_counts: DirectionCounts,
    pub(crate) ports: Vec<PortId>,
    pub(crate) links: Vec<LinkId>,
}

impl Node {
    pub fn switch(id: impl Into<String>, dpid: impl Into<String>) -> Self {
        let dpid = dpid.into();
        Self::new(
            id,
            dpid.clone(),
            NodeKind::Switch(SwitchInfo {
                dpid,
                ..Default::default()
            }),
        )
    }

    pub fn host(
        id: impl Into<String>,
        mac: impl Into<String>,
        switch_id: impl Into<String>,
        switch_port: u32,
    ) -> Self {
        let mac = mac.into();
        Self::new(
            id,
            mac.clone(),
            NodeKind::Host(HostInfo {
                mac,
                switch_id: switch_id.into(),
                switch_port,
            }),
        )
    }

    fn new(id: impl Into<String>, name: String, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name,
            kind,
            position: Point::default(),
            extent: Extent::square(0.0),
            pinned: false,
            port_counts: DirectionCounts::default(),
            ports: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn with_position(mut self, position: Point) -> Self {
        self.position = position;
        self
    }

    pub fn is_switch(&self) -> bool {
        matches!(self.kind, NodeKind::Switch(_))
    }

    pub fn is_host(&self) -> bool {
        matches!(self.kind, NodeKind::Host(_))
    }

    pub fn as_switch(&self) -> Option<&SwitchInfo> {
        match &self.kind {
            NodeKind::Switch(sw) => Some(sw),
            NodeKind::Host(_) => None,
        }
    }

    pub fn as_switch_mut(&mut self) -> Option<&mut SwitchInfo> {
        match &mut self.kind {
            NodeKind::Switch(sw) => Some(sw),
            NodeKind::Host(_) => None,
        }
    }

    pub fn mode(&self) -> SwitchMode {
        self.as_switch().map(|sw| sw.mode).unwrap_or_default()
    }

    pub fn selection(&self) -> SelectionType {
        self.as_switch().map(|sw| sw.selection).unwrap_or_default()
    }

    pub fn ports(&self) -> &[PortId] {
        &self.ports
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub of_port: u32,
    pub owner: NodeId,
    pub direction: Direction,
    /// Dense index of the port among its owner's ports on the same side.
    pub slot: usize,
    pub link: Option<LinkId>,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    /// Owner position the geometry was last computed for.
    pub anchor: Option<Point>,
    /// Last observed current speed, used to raise the link bandwidth.
    pub curr_speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub node: NodeId,
    pub port: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: String,
    pub a: Endpoint,
    pub b: Endpoint,
    pub bandwidth: f64,
    pub load: f64,
    /// Set while the link is part of an exact path under construction.
    pub is_route: bool,
    /// One side is a host rather than a switch.
    pub to_host: bool,
}

impl Link {
    /// The far end as seen from `node`.
    pub fn other(&self, node: NodeId) -> Option<Endpoint> {
        if self.a.node == node {
            Some(self.b)
        } else if self.b.node == node {
            Some(self.a)
        } else {
            None
        }
    }

    pub fn endpoint_of(&self, node: NodeId) -> Option<Endpoint> {
        if self.a.node == node {
            Some(self.a)
        } else if self.b.node == node {
            Some(self.b)
        } else {
            None
        }
    }

    /// Raises the bandwidth to `speed`; stale lower samples never shrink it.
    pub fn raise_bandwidth(&mut self, speed: f64) {
        if speed.is_finite() && speed > self.bandwidth {
            self.bandwidth = speed;
        }
    }
}
