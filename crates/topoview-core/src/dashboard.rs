use crate::config::DashboardConfig;
use crate::flows::FlowTable;
use crate::outbox::{Outbox, Pending, SideRequest};
use crate::path::{PathMode, PathParams, PathRequest, PathSelector};
use crate::routes::Route;
use crate::snapshot::Snapshot;
use crate::sync::{self, ApplyReport, EventSyncLoop, Resolution, SyncContext};
use crate::timer::TickHandle;
use crate::transport::{Transport, TransportResult};
use crate::wire::PollResponse;
use crate::{Error, Result};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde::Serialize;
use std::time::Duration;
use topoview_graph::{GraphStore, NodeId, Point, SwitchStatus};
use topoview_layout as layout;

/// Upper bound on request/response rounds drained from the outbox per tick. Each round may
/// queue follow-ups (a port list queues port details), so the outbox is not drained in one go.
const MAX_SIDE_ROUNDS: usize = 4;

/// What a call to [`Dashboard::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub polled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<ApplyReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_error: Option<String>,
    pub side_applied: usize,
    pub side_stale: usize,
    pub side_failed: usize,
}

/// The dashboard engine: owns the topology and everything derived from it, and talks to the
/// controller through `T`.
pub struct Dashboard<T> {
    config: DashboardConfig,
    transport: T,
    graph: GraphStore,
    flows: FlowTable,
    selector: PathSelector,
    routes: IndexMap<String, Route, FxBuildHasher>,
    outbox: Outbox,
    sync: EventSyncLoop,
}

impl<T: Transport> Dashboard<T> {
    pub fn new(config: DashboardConfig, transport: T) -> Self {
        let sync = EventSyncLoop::new(&config);
        Self {
            config,
            transport,
            graph: GraphStore::new(),
            flows: FlowTable::new(),
            selector: PathSelector::new(),
            routes: IndexMap::default(),
            outbox: Outbox::new(),
            sync,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn flows(&self) -> &FlowTable {
        &self.flows
    }

    pub fn selector(&self) -> &PathSelector {
        &self.selector
    }

    pub fn routes(&self) -> &IndexMap<String, Route, FxBuildHasher> {
        &self.routes
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn sync(&self) -> &EventSyncLoop {
        &self.sync
    }

    /// Starts polling; the first tick is due at `now`.
    pub fn start(&mut self, now: Duration) {
        self.sync.start(now);
    }

    /// Handle that stops the poll loop.
    pub fn handle(&self) -> TickHandle {
        self.sync.handle()
    }

    fn ctx(&mut self) -> SyncContext<'_> {
        SyncContext {
            graph: &mut self.graph,
            flows: &mut self.flows,
            outbox: &mut self.outbox,
            routes: &mut self.routes,
            config: &self.config,
        }
    }

    fn queue(&mut self, request: SideRequest) {
        self.outbox.push(request, self.graph.generation(), Duration::ZERO);
    }

    /// Runs one scheduler step: polls if a tick is due, then exchanges queued side requests.
    pub async fn tick(&mut self, now: Duration) -> TickReport {
        let mut report = TickReport::default();
        if self.sync.begin(now) {
            report.polled = true;
            let ok = self.poll(now, &mut report).await;
            self.sync.finish(now, ok);
        }
        self.pump(now, &mut report).await;
        report
    }

    async fn poll(&mut self, now: Duration, report: &mut TickReport) -> bool {
        let request = self.sync.poll_request(self.graph.last_event_id());
        let result = self.transport.send(&request).await;
        let poll = result.map_err(Error::from).and_then(PollResponse::from_value);
        match poll {
            Ok(poll) => {
                report.applied = Some(sync::apply_poll(&mut self.ctx(), &poll, now));
                self.selector.prune(&mut self.graph);
                if self.config.poll_port_stats && self.graph.link_count() > 0 {
                    self.queue(SideRequest::PortStats);
                }
                true
            }
            Err(err) => {
                tracing::warn!(%request, %err, "poll failed");
                report.poll_error = Some(err.to_string());
                if self.config.clear_on_transport_error {
                    self.reset_topology();
                }
                false
            }
        }
    }

    async fn pump(&mut self, now: Duration, report: &mut TickReport) {
        for _ in 0..MAX_SIDE_ROUNDS {
            let ready = self.take_ready(now);
            if ready.is_empty() {
                break;
            }
            for pending in ready {
                let request = pending.request.to_request();
                let result = self.transport.send(&request).await;
                match self.complete(&pending, result, now) {
                    Resolution::Applied => report.side_applied += 1,
                    Resolution::Stale => report.side_stale += 1,
                    Resolution::Failed => report.side_failed += 1,
                }
            }
        }
    }

    /// Side requests due at `now` that are still worth sending. Callers that drive the
    /// transport themselves hand each response back through [`Dashboard::complete`].
    pub fn take_ready(&mut self, now: Duration) -> Vec<Pending> {
        let mut ready = self.outbox.take_ready(now);
        ready.retain(|pending| sync::is_current(&self.graph, pending));
        ready
    }

    pub fn complete(
        &mut self,
        pending: &Pending,
        result: TransportResult,
        now: Duration,
    ) -> Resolution {
        sync::resolve(&mut self.ctx(), pending, result, now)
    }

    /// Drops the whole topology and stops polling until [`Dashboard::start`] is called again.
    /// Responses to requests issued before this point are discarded when they arrive.
    pub fn clear(&mut self) {
        self.reset_topology();
        self.sync.handle().cancel();
    }

    fn reset_topology(&mut self) {
        self.selector.clear(&mut self.graph);
        self.graph.clear();
        self.flows.clear();
        self.routes.clear();
        self.outbox.clear();
    }

    fn find(&self, id: &str) -> Result<NodeId> {
        self.graph.find_node(id).ok_or_else(|| Error::NotFound {
            kind: "node",
            id: id.to_string(),
        })
    }

    /// Drops node `id` at `(x, y)` and pins it there.
    pub fn move_node(&mut self, id: &str, x: f64, y: f64) -> Result<()> {
        let node = self.find(id)?;
        layout::move_node(&mut self.graph, node, Point::new(x, y), &self.config.layout());
        if self.config.persist_coordinates {
            self.queue(SideRequest::SaveCoords {
                node: id.to_string(),
                x,
                y,
            });
        }
        Ok(())
    }

    pub fn set_switch_status(
        &mut self,
        id: &str,
        status: SwitchStatus,
        now: Duration,
    ) -> Result<()> {
        let node = self.find(id)?;
        if !sync::set_switch_status(&mut self.ctx(), node, status, now) {
            return Err(Error::NotFound {
                kind: "switch",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Changes the icon scale and re-lays out every node.
    pub fn set_scale(&mut self, scale: f64) -> Result<()> {
        let mut config = self.config.clone();
        config.scale = scale;
        config.validate()?;
        self.config = config;
        let opts = self.config.layout();
        let nodes: Vec<NodeId> = self.graph.nodes().map(|(id, _)| id).collect();
        for node in nodes {
            layout::update_extent(&mut self.graph, node, &opts);
        }
        let touched = layout::refresh_stale_ports(&mut self.graph, &opts);
        tracing::debug!(scale, touched, "layout rescaled");
        Ok(())
    }

    pub fn set_path_mode(&mut self, mode: PathMode, from: &str, to: &str) {
        self.selector.set_mode(&mut self.graph, mode, from, to);
    }

    pub fn add_path_node(&mut self, id: &str) -> Result<()> {
        Ok(self.selector.add_node(&mut self.graph, id)?)
    }

    pub fn remove_path_node(&mut self, id: &str) -> Result<()> {
        Ok(self.selector.remove_node(&mut self.graph, id)?)
    }

    pub fn clear_path(&mut self) {
        self.selector.clear(&mut self.graph);
    }

    pub fn path_request(&self, params: &PathParams) -> Result<PathRequest> {
        Ok(self.selector.to_request(params)?)
    }

    /// Queues a refresh of route `route`.
    pub fn request_route(&mut self, route: &str) {
        self.queue(SideRequest::Route {
            route: route.to_string(),
        });
    }

    /// Queues the current selection as a new path of route `route`.
    pub fn submit_path(&mut self, route: &str, params: &PathParams) -> Result<()> {
        let body = serde_json::to_value(self.path_request(params)?)?;
        self.queue(SideRequest::AddPath {
            route: route.to_string(),
            body,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.graph, &self.flows, &self.selector, &self.routes)
    }
}
