use crate::transport::Request;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Follow-up exchange triggered by an applied event or a user action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideRequest {
    /// Stored canvas coordinates of a node.
    WebInfo { node: String },
    /// Controller-assigned role of a switch.
    Role { node: String },
    /// Port list of a switch. With `only_if_empty` the request is skipped unless the switch is
    /// still up and has no ports.
    PortList { node: String, only_if_empty: bool },
    PortDetail { node: String, port: u32 },
    PortStats,
    SaveCoords { node: String, x: f64, y: f64 },
    Route { route: String },
    AddPath { route: String, body: Value },
}

impl SideRequest {
    pub fn node(&self) -> Option<&str> {
        match self {
            SideRequest::WebInfo { node }
            | SideRequest::Role { node }
            | SideRequest::PortList { node, .. }
            | SideRequest::PortDetail { node, .. }
            | SideRequest::SaveCoords { node, .. } => Some(node),
            SideRequest::PortStats | SideRequest::Route { .. } | SideRequest::AddPath { .. } => {
                None
            }
        }
    }

    pub fn to_request(&self) -> Request {
        match self {
            SideRequest::WebInfo { node } => Request::get(format!("/api/webui/webinfo/{node}")),
            SideRequest::Role { node } => Request::get(format!("/switches/role/{node}/")),
            SideRequest::PortList { node, .. } => Request::get(format!("/switches/{node}/")),
            SideRequest::PortDetail { node, port } => {
                Request::get(format!("/switches/{node}/ports/{port}/"))
            }
            SideRequest::PortStats => Request::get("/switches/ports/stats/"),
            SideRequest::SaveCoords { node, x, y } => Request::put(
                format!("/api/webui/coord/{node}"),
                serde_json::json!({ "x_coord": x, "y_coord": y }),
            ),
            SideRequest::Route { route } => Request::get(format!("/routes/id/{route}/")),
            SideRequest::AddPath { route, body } => {
                Request::post(format!("/routes/id/{route}/add-path/"), body.clone())
            }
        }
    }
}

/// A queued [`SideRequest`], stamped with the topology generation it was issued against.
#[derive(Debug, Clone, PartialEq)]
pub struct Pending {
    pub id: u64,
    pub request: SideRequest,
    pub epoch: u64,
    pub not_before: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct Outbox {
    queue: Vec<Pending>,
    next_id: u64,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: SideRequest, epoch: u64, not_before: Duration) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        tracing::debug!(id, epoch, ?request, "side request queued");
        self.queue.push(Pending {
            id,
            request,
            epoch,
            not_before,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pending> + '_ {
        self.queue.iter()
    }

    /// Removes and returns every request due at `now`, oldest first.
    pub fn take_ready(&mut self, now: Duration) -> Vec<Pending> {
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.queue)
            .into_iter()
            .partition(|p| p.not_before <= now);
        self.queue = waiting;
        ready
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
