#![forbid(unsafe_code)]

//! In-memory topology model for the topoview dashboard.
//!
//! Switches and hosts are nodes, switch ports hang off their owner, and links join two
//! `(node, port)` endpoints. All entities live in a [`GraphStore`] and are addressed by
//! generational handles, so removing an entity never leaves a reference that resolves to
//! something else.

pub mod arena;
mod model;
mod store;

pub use arena::{LinkId, NodeId, PortId};
pub use model::{
    Direction, DirectionCounts, Endpoint, Extent, HostInfo, Link, Node, NodeKind, Point, Port,
    SelectionType, SwitchInfo, SwitchMode, SwitchStatus,
};
pub use store::GraphStore;
