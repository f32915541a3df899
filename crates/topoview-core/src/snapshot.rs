//! Serializable view of the dashboard state handed to the renderer.

use crate::flows::FlowTable;
use crate::path::{PathMode, PathSelector};
use crate::routes::Route;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde::Serialize;
use topoview_graph::{
    Direction, Endpoint, GraphStore, Link, Node, NodeKind, SelectionType, SwitchMode, SwitchStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKindView {
    Switch,
    Host,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortView {
    pub of_port: u32,
    pub direction: Direction,
    pub slot: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub id: String,
    pub name: String,
    pub kind: NodeKindView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SwitchMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SwitchStatus>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub pinned: bool,
    pub selection: SelectionType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flows: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointView {
    pub node: String,
    pub port: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkView {
    pub id: String,
    pub a: EndpointView,
    pub b: EndpointView,
    pub bandwidth: f64,
    pub load: f64,
    pub is_route: bool,
    pub to_host: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionView {
    pub mode: Option<PathMode>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub exact: Vec<String>,
    pub include: Option<String>,
    pub exclude: Vec<String>,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteView {
    pub id: String,
    pub service: String,
    pub used_path: Option<u64>,
    /// Indices into the route's paths that can be drawn on the current topology.
    pub available: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub cursor: u64,
    pub generation: u64,
    pub nodes: Vec<NodeView>,
    pub links: Vec<LinkView>,
    pub selection: SelectionView,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteView>,
    pub flow_count: usize,
}

impl Snapshot {
    pub fn capture(
        g: &GraphStore,
        flows: &FlowTable,
        selector: &PathSelector,
        routes: &IndexMap<String, Route, FxBuildHasher>,
    ) -> Self {
        Self {
            cursor: g.last_event_id(),
            generation: g.generation(),
            nodes: g.nodes().map(|(_, n)| node_view(g, n, flows)).collect(),
            links: g.links().filter_map(|(_, l)| link_view(g, l)).collect(),
            selection: SelectionView {
                mode: selector.mode(),
                from: selector.from().map(String::from),
                to: selector.to().map(String::from),
                exact: selector.exact().to_vec(),
                include: selector.include().map(String::from),
                exclude: selector.exclude().map(String::from).collect(),
                complete: selector.is_complete(),
            },
            routes: routes
                .values()
                .map(|route| RouteView {
                    id: route.id.clone(),
                    service: route.service.clone(),
                    used_path: route.used_path,
                    available: route.available_paths(g).map(|(i, _)| i).collect(),
                })
                .collect(),
            flow_count: flows.len(),
        }
    }
}

fn node_view(g: &GraphStore, node: &Node, flows: &FlowTable) -> NodeView {
    let mut ports: Vec<PortView> = node
        .ports()
        .iter()
        .filter_map(|&p| g.port(p))
        .map(|p| PortView {
            of_port: p.of_port,
            direction: p.direction,
            slot: p.slot,
            x: p.x,
            y: p.y,
        })
        .collect();
    ports.sort_by_key(|p| p.of_port);

    let (kind, mode, status, flow_count) = match &node.kind {
        NodeKind::Switch(sw) => (
            NodeKindView::Switch,
            Some(sw.mode),
            Some(sw.status),
            Some(flows.count_for(&node.id)),
        ),
        NodeKind::Host(_) => (NodeKindView::Host, None, None, None),
    };
    NodeView {
        id: node.id.clone(),
        name: node.name.clone(),
        kind,
        mode,
        status,
        x: node.position.x,
        y: node.position.y,
        width: node.extent.width,
        height: node.extent.height,
        pinned: node.pinned,
        selection: node.selection(),
        ports,
        flows: flow_count.filter(|&n| n > 0),
    }
}

fn link_view(g: &GraphStore, link: &Link) -> Option<LinkView> {
    let end = |e: Endpoint| {
        g.node(e.node).map(|n| EndpointView {
            node: n.id.clone(),
            port: e.port,
        })
    };
    Some(LinkView {
        id: link.id.clone(),
        a: end(link.a)?,
        b: end(link.b)?,
        bandwidth: link.bandwidth,
        load: link.load,
        is_route: link.is_route,
        to_host: link.to_host,
    })
}
