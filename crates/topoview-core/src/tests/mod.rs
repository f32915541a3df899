use crate::graph::GraphStore;
use crate::sync::{ApplyReport, SyncContext, apply_poll};
use crate::{DashboardConfig, FlowTable, Outbox, PollResponse, Route};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde_json::{Value, json};
use std::time::Duration;

mod dashboard;

/// Everything a [`SyncContext`] borrows, owned in one place.
struct Fixture {
    graph: GraphStore,
    flows: FlowTable,
    outbox: Outbox,
    routes: IndexMap<String, Route, FxBuildHasher>,
    config: DashboardConfig,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(DashboardConfig::default())
    }

    fn with_config(config: DashboardConfig) -> Self {
        Self {
            graph: GraphStore::new(),
            flows: FlowTable::new(),
            outbox: Outbox::new(),
            routes: IndexMap::default(),
            config,
        }
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

    fn apply(&mut self, poll: Value) -> ApplyReport {
        let poll = PollResponse::from_value(poll).unwrap();
        apply_poll(&mut self.ctx(), &poll, Duration::ZERO)
    }
}

fn poll(last_event: u64, events: Value) -> Value {
    json!({ "last_event": last_event, "events": events })
}

fn switch_add(id: &str) -> Value {
    json!({ "type": "Add", "obj_id": id, "obj_info": { "DPID": format!("dpid-{id}") } })
}

fn link_add(id: &str, a: (&str, u32), b: (&str, u32)) -> Value {
    json!({
        "type": "Add",
        "obj_id": id,
        "obj_info": {
            "connect": [
                { "src_id": a.0, "src_port": a.1 },
                { "dst_id": b.0, "dst_port": b.1 }
            ]
        }
    })
}

fn host_add(id: &str, switch: &str, port: u32) -> Value {
    json!({
        "type": "Add",
        "obj_id": id,
        "obj_info": { "mac": format!("mac-{id}"), "switch_id": switch, "switch_port": port }
    })
}

fn delete(id: &str) -> Value {
    json!({ "type": "Delete", "obj_id": id, "obj_info": {} })
}
