//! Incremental synchronisation with the controller's event log.
//!
//! Every tick issues one long-poll request carrying the current cursor. A successful response is
//! applied category by category (switches, links, hosts, flows), each in server order, so that
//! links and hosts only ever reference switches applied before them. Applying events queues
//! follow-up [`SideRequest`]s (stored coordinates, role, ports) in the [`Outbox`]; their
//! responses come back through [`resolve`], which re-checks that the topology generation and
//! the target node are still the ones the request was issued for.

use crate::config::DashboardConfig;
use crate::flows::FlowTable;
use crate::outbox::{Outbox, Pending, SideRequest};
use crate::routes::Route;
use crate::timer::{TickHandle, Ticker};
use crate::transport::{Request, TransportResult};
use crate::wire::{
    self, EventCategory, EventEntry, EventKind, FlowRule, HostEventInfo, LinkEventInfo,
    PollResponse, PortDetail, PortList, PortStatsBatch, RoleInfo, SwitchEventInfo, WebInfo,
    LOCAL_PORTS,
};
use crate::{Error, Result};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde::Serialize;
use std::time::Duration;
use topoview_graph::{GraphStore, Node, NodeId, Point, SwitchMode, SwitchStatus};
use topoview_layout as layout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Idle,
    Polling,
}

/// Poll scheduler: decides when the next poll goes out and keeps track of its outcome.
#[derive(Debug, Clone)]
pub struct EventSyncLoop {
    ticker: Ticker,
    state: SyncState,
    services: String,
    polls_ok: u64,
    polls_failed: u64,
}

impl EventSyncLoop {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            ticker: Ticker::new(config.poll_interval()),
            state: SyncState::Idle,
            services: config.services.join("&"),
            polls_ok: 0,
            polls_failed: 0,
        }
    }

    pub fn start(&mut self, now: Duration) {
        self.state = SyncState::Idle;
        self.ticker.start(now);
    }

    pub fn handle(&self) -> TickHandle {
        self.ticker.handle()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_running()
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.ticker.next_due()
    }

    pub fn polls_ok(&self) -> u64 {
        self.polls_ok
    }

    pub fn polls_failed(&self) -> u64 {
        self.polls_failed
    }

    pub fn poll_request(&self, cursor: u64) -> Request {
        Request::get(format!("/timeout/{}/{cursor}", self.services))
    }

    /// Moves to `Polling` when a tick is due and no poll is in flight.
    pub fn begin(&mut self, now: Duration) -> bool {
        if self.state == SyncState::Polling || !self.ticker.is_due(now) {
            return false;
        }
        self.state = SyncState::Polling;
        true
    }

    /// Ends the poll in flight. The next tick is scheduled whatever the outcome.
    pub fn finish(&mut self, now: Duration, ok: bool) {
        self.state = SyncState::Idle;
        if ok {
            self.polls_ok += 1;
        } else {
            self.polls_failed += 1;
        }
        self.ticker.reschedule(now);
    }
}

/// Mutable state touched while applying events and side responses.
pub struct SyncContext<'a> {
    pub graph: &'a mut GraphStore,
    pub flows: &'a mut FlowTable,
    pub outbox: &'a mut Outbox,
    pub routes: &'a mut IndexMap<String, Route, FxBuildHasher>,
    pub config: &'a DashboardConfig,
}

impl SyncContext<'_> {
    fn queue(&mut self, request: SideRequest, not_before: Duration) {
        let epoch = self.graph.generation();
        self.outbox.push(request, epoch, not_before);
    }
}

/// What one poll response did to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ApplyReport {
    pub applied: usize,
    /// Malformed events and events referencing something that is not in the graph. They are
    /// not retried.
    pub dropped: usize,
    /// Events with no effect: repeated deletes, change notifications, unknown kinds.
    pub ignored: usize,
}

enum Applied {
    Added,
    Removed,
    Dropped,
    Ignored,
}

/// Applies a decoded poll response and advances the cursor.
pub fn apply_poll(ctx: &mut SyncContext<'_>, poll: &PollResponse, now: Duration) -> ApplyReport {
    let mut report = ApplyReport::default();
    for rejected in &poll.rejected {
        tracing::warn!(
            service = %rejected.service,
            event_id = ?rejected.event_id,
            err = %rejected.message,
            "malformed event dropped"
        );
        report.dropped += 1;
    }
    let mut added = false;
    for category in EventCategory::APPLY_ORDER {
        for entry in poll.entries(category) {
            let outcome = match apply_event(ctx, category, entry, now) {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(?category, obj = %entry.obj_id, %err, "event dropped");
                    Applied::Dropped
                }
            };
            match outcome {
                Applied::Added => {
                    added = true;
                    report.applied += 1;
                }
                Applied::Removed => report.applied += 1,
                Applied::Dropped => report.dropped += 1,
                Applied::Ignored => report.ignored += 1,
            }
        }
    }

    let cursor = poll.last_event.into_iter().chain(poll.max_event_id()).max();
    if let Some(cursor) = cursor {
        ctx.graph.advance_cursor(cursor);
    }
    if added {
        layout::default_placement(ctx.graph, &ctx.config.canvas(), &ctx.config.layout());
    }
    tracing::debug!(
        cursor = ctx.graph.last_event_id(),
        applied = report.applied,
        dropped = report.dropped,
        ignored = report.ignored,
        "poll applied"
    );
    report
}

fn apply_event(
    ctx: &mut SyncContext<'_>,
    category: EventCategory,
    entry: &EventEntry,
    now: Duration,
) -> Result<Applied> {
    let id = entry.obj_id.as_str();
    let outcome = match (category, entry.kind) {
        (_, EventKind::Change | EventKind::Unknown) => {
            tracing::debug!(?category, obj = id, kind = ?entry.kind, "event ignored");
            Applied::Ignored
        }

        (EventCategory::Switch, EventKind::Add) => {
            if ctx.graph.find_node(id).is_some() {
                return Ok(Applied::Ignored);
            }
            let dpid = entry
                .info::<SwitchEventInfo>("switch event")
                .ok()
                .map(|info| info.dpid)
                .filter(|dpid| !dpid.is_empty())
                .unwrap_or_else(|| id.to_string());
            let node = ctx.graph.add_node(Node::switch(id, dpid));
            layout::update_extent(ctx.graph, node, &ctx.config.layout());
            ctx.queue(SideRequest::WebInfo { node: id.into() }, now);
            if ctx.config.resolve_roles {
                ctx.queue(SideRequest::Role { node: id.into() }, now);
            }
            ctx.queue(
                SideRequest::PortList {
                    node: id.to_string(),
                    only_if_empty: false,
                },
                now,
            );
            ctx.queue(
                SideRequest::PortList {
                    node: id.to_string(),
                    only_if_empty: true,
                },
                now + ctx.config.port_retry(),
            );
            Applied::Added
        }
        (EventCategory::Switch, EventKind::Delete) => match ctx.graph.remove_node_by_id(id) {
            Some(_) => {
                let flows = ctx.flows.drop_switch(id);
                if flows > 0 {
                    tracing::debug!(node = id, flows, "flows of removed switch dropped");
                }
                Applied::Removed
            }
            None => Applied::Ignored,
        },

        (EventCategory::Link, EventKind::Add) => {
            if ctx.graph.find_link(id).is_some() {
                return Ok(Applied::Ignored);
            }
            let info: LinkEventInfo = entry.info("link event")?;
            let [a, b] = info.connect.as_slice() else {
                return Err(Error::Decode {
                    context: "link event",
                    message: format!("expected 2 endpoints, got {}", info.connect.len()),
                });
            };
            match ctx
                .graph
                .add_link(id, (a.id.as_str(), a.port), (b.id.as_str(), b.port))
            {
                Some(_) => {
                    point_link_ports(ctx, (a.id.as_str(), a.port), (b.id.as_str(), b.port));
                    Applied::Added
                }
                None => Applied::Dropped,
            }
        }
        (EventCategory::Link, EventKind::Delete) => {
            if ctx.graph.remove_link_by_id(id) {
                Applied::Removed
            } else {
                Applied::Ignored
            }
        }

        (EventCategory::Host, EventKind::Add) => {
            if ctx.graph.find_node(id).is_some() {
                return Ok(Applied::Ignored);
            }
            let info: HostEventInfo = entry.info("host event")?;
            if ctx.graph.find_node(&info.switch_id).is_none() {
                tracing::warn!(
                    host = id,
                    switch = %info.switch_id,
                    "host attached to unknown switch"
                );
                return Ok(Applied::Dropped);
            }
            let node = ctx.graph.add_node(Node::host(
                id,
                info.mac.clone(),
                info.switch_id.clone(),
                info.switch_port,
            ));
            let link = ctx.graph.add_link(
                GraphStore::host_link_id(id),
                (id, 0),
                (info.switch_id.as_str(), info.switch_port),
            );
            if link.is_none() {
                ctx.graph.remove_node(node);
                return Ok(Applied::Dropped);
            }
            layout::update_extent(ctx.graph, node, &ctx.config.layout());
            point_link_ports(ctx, (info.switch_id.as_str(), info.switch_port), (id, 0));
            ctx.queue(SideRequest::WebInfo { node: id.into() }, now);
            Applied::Added
        }
        (EventCategory::Host, EventKind::Delete) => match ctx.graph.remove_node_by_id(id) {
            Some(_) => Applied::Removed,
            None => Applied::Ignored,
        },

        (EventCategory::Flow, EventKind::Add) => {
            let rule: FlowRule = entry.info("flow event")?;
            if ctx.graph.find_node(&rule.switch_id).is_none() {
                tracing::debug!(
                    flow = id,
                    switch = %rule.switch_id,
                    "flow on unknown switch ignored"
                );
                return Ok(Applied::Ignored);
            }
            ctx.flows.insert(id, rule);
            Applied::Added
        }
        (EventCategory::Flow, EventKind::Delete) => {
            let hint = entry
                .info::<FlowRule>("flow event")
                .ok()
                .map(|rule| rule.switch_id);
            if hint
                .as_deref()
                .is_some_and(|switch| ctx.graph.find_node(switch).is_none())
            {
                return Ok(Applied::Ignored);
            }
            match ctx.flows.remove(id, hint.as_deref()) {
                Some(_) => Applied::Removed,
                None => Applied::Ignored,
            }
        }
    };
    Ok(outcome)
}

/// Re-points the port at whichever end of a fresh link is already known.
fn point_link_ports(ctx: &mut SyncContext<'_>, a: (&str, u32), b: (&str, u32)) {
    let opts = ctx.config.layout();
    if !opts.show_ports {
        return;
    }
    let port = [a, b].into_iter().find_map(|(node, port)| {
        let node = ctx.graph.find_node(node)?;
        ctx.graph.find_port(node, port)
    });
    if let Some(port) = port {
        layout::compute_shift(ctx.graph, port);
        layout::compute_direction(ctx.graph, port, &opts);
    }
}

/// Checks a queued request against the current graph before it goes out.
pub fn is_current(graph: &GraphStore, pending: &Pending) -> bool {
    if pending.epoch != graph.generation() {
        return false;
    }
    let Some(node_id) = pending.request.node() else {
        return true;
    };
    let Some(node) = graph.node_by_id(node_id) else {
        return false;
    };
    match pending.request {
        SideRequest::PortList {
            only_if_empty: true,
            ..
        } => {
            let down = node
                .as_switch()
                .is_some_and(|sw| sw.status == SwitchStatus::Down);
            node.ports().is_empty() && !down
        }
        _ => true,
    }
}

/// How a side response was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Applied,
    /// The graph moved on since the request was issued; the response was discarded.
    Stale,
    Failed,
}

/// Applies the response to a side request.
pub fn resolve(
    ctx: &mut SyncContext<'_>,
    pending: &Pending,
    result: TransportResult,
    now: Duration,
) -> Resolution {
    let epoch = ctx.graph.generation();
    if pending.epoch != epoch {
        tracing::debug!(
            id = pending.id,
            issued = pending.epoch,
            epoch,
            "stale side response discarded"
        );
        return Resolution::Stale;
    }
    let node = match pending.request.node() {
        Some(id) => match ctx.graph.find_node(id) {
            Some(node) => Some(node),
            None => {
                tracing::debug!(
                    id = pending.id,
                    node = id,
                    "side response for removed node discarded"
                );
                return Resolution::Stale;
            }
        },
        None => None,
    };
    let value = match result {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(id = pending.id, %err, "side request failed");
            return Resolution::Failed;
        }
    };
    match apply_side(ctx, &pending.request, node, value, now) {
        Ok(()) => Resolution::Applied,
        Err(err) => {
            tracing::warn!(id = pending.id, %err, "side response rejected");
            Resolution::Failed
        }
    }
}

fn apply_side(
    ctx: &mut SyncContext<'_>,
    request: &SideRequest,
    node: Option<NodeId>,
    value: serde_json::Value,
    now: Duration,
) -> Result<()> {
    let opts = ctx.config.layout();
    match (request, node) {
        (SideRequest::WebInfo { .. }, Some(node)) => {
            let info: WebInfo = wire::decode("webinfo", value)?;
            let stored = info.stored_position();
            let Some(n) = ctx.graph.node_mut(node) else {
                return Ok(());
            };
            if let Some(name) = info.display_name.filter(|name| !name.is_empty()) {
                n.name = name;
            }
            if let Some((x, y)) = stored {
                n.position = Point::new(x, y);
                n.pinned = true;
                layout::relayout_node(ctx.graph, node, &opts);
                relayout_neighbors(ctx.graph, node, &opts);
            }
        }
        (SideRequest::Role { .. }, Some(node)) => {
            let info: RoleInfo = wire::decode("role", value)?;
            let mode = SwitchMode::from_role(&info.role);
            let changed = match ctx.graph.node_mut(node).and_then(|n| n.as_switch_mut()) {
                Some(sw) if sw.mode != mode => {
                    sw.mode = mode;
                    true
                }
                _ => false,
            };
            if changed {
                tracing::debug!(?node, ?mode, "switch role resolved");
                layout::default_placement(ctx.graph, &ctx.config.canvas(), &opts);
            }
        }
        (SideRequest::PortList { node: id, only_if_empty }, Some(node)) => {
            let list: PortList = wire::decode("port list", value)?;
            ctx.graph.clear_ports(node);
            layout::relayout_node(ctx.graph, node, &opts);
            for port in list.ports.into_iter().filter(|p| !LOCAL_PORTS.contains(p)) {
                ctx.queue(
                    SideRequest::PortDetail {
                        node: id.clone(),
                        port,
                    },
                    now,
                );
            }
            if *only_if_empty {
                ctx.queue(
                    SideRequest::PortList {
                        node: id.clone(),
                        only_if_empty: true,
                    },
                    now + ctx.config.port_retry(),
                );
            }
        }
        (SideRequest::PortDetail { .. }, Some(node)) => {
            let detail: PortDetail = wire::decode("port detail", value)?;
            if detail.is_link_down() {
                return Ok(());
            }
            if let Some(port) = layout::attach_port(ctx.graph, node, detail.number, &opts) {
                if let Some(speed) = detail.current_speed() {
                    ctx.graph.set_port_speed(port, speed);
                }
            }
        }
        (SideRequest::PortStats, _) => {
            let batch: PortStatsBatch = wire::decode("port stats", value)?;
            for entry in &batch.array {
                let (Some(load), Some(link)) = (
                    entry.load_kbps(),
                    ctx.graph.find_link_by_port(&entry.dpid, entry.port),
                ) else {
                    continue;
                };
                if let Some(link) = ctx.graph.link_mut(link) {
                    link.load = load;
                }
            }
        }
        (SideRequest::Route { .. }, _) => {
            let route: Route = wire::decode("route", value)?;
            ctx.routes.insert(route.id.clone(), route);
        }
        (SideRequest::AddPath { route, .. }, _) => {
            if let Some(error) = value.get("error") {
                return Err(Error::Decode {
                    context: "add-path",
                    message: error.to_string(),
                });
            }
            ctx.queue(
                SideRequest::Route {
                    route: route.clone(),
                },
                now,
            );
        }
        (SideRequest::SaveCoords { .. }, _) => {}
        (_, None) => {}
    }
    Ok(())
}

fn relayout_neighbors(g: &mut GraphStore, node: NodeId, opts: &layout::LayoutOptions) {
    for far in g.neighbors(node) {
        layout::relayout_node(g, far, opts);
    }
}

/// Marks a switch up or down. A second consecutive down report drops its links and ports;
/// coming back up after that queues port discovery again.
pub fn set_switch_status(
    ctx: &mut SyncContext<'_>,
    node: NodeId,
    status: SwitchStatus,
    now: Duration,
) -> bool {
    let Some(n) = ctx.graph.node_mut(node) else {
        return false;
    };
    let id = n.id.clone();
    let Some(sw) = n.as_switch_mut() else {
        return false;
    };
    let prev = sw.status;
    sw.status = status;
    match status {
        SwitchStatus::Down => {
            sw.down_count += 1;
            if sw.down_count >= 2 {
                let links = n.links().to_vec();
                for link in links {
                    ctx.graph.remove_link(link);
                }
                ctx.graph.clear_ports(node);
                layout::relayout_node(ctx.graph, node, &ctx.config.layout());
                tracing::info!(node = %id, "switch down, links and ports dropped");
            }
        }
        SwitchStatus::Up => {
            let was_dropped = sw.down_count >= 2;
            sw.down_count = 0;
            if prev == SwitchStatus::Down && was_dropped {
                ctx.queue(
                    SideRequest::PortList {
                        node: id,
                        only_if_empty: false,
                    },
                    now,
                );
            }
        }
    }
    true
}
