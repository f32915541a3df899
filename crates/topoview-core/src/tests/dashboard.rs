use super::{link_add, poll, switch_add};
use crate::graph::{Direction, Point, SwitchStatus};
use crate::*;
use futures::executor::block_on;
use serde_json::json;
use std::time::Duration;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn session() -> Session {
    serde_json::from_value(json!({
        "polls": [poll(3, json!({
            "switch-manager": [switch_add("S1"), switch_add("S2")],
            "topology": [link_add("L1", ("S1", 1), ("S2", 1))]
        }))],
        "responses": {
            "/switches/S1/": { "dpid": "S1", "ports": [1] },
            "/switches/S1/ports/1/": {
                "number": 1,
                "link": { "status": "up" },
                "ethernet": { "curr-speed": 1000000 }
            },
            "/api/webui/webinfo/S2": { "ID": "S2", "x_coord": 1200, "y_coord": 100 },
            "/switches/role/S2/": { "$status": 503 },
            "/routes/id/r1/add-path/": { "act": "path created", "path_id": 1, "route_id": "r1" },
            "/routes/id/r1/": {
                "id": "r1",
                "service": "demo",
                "from": "S1",
                "to": "S2",
                "paths": [{ "m_path": [["S1", 1], ["S2", 1]], "metrics": "Hop" }]
            }
        }
    }))
    .unwrap()
}

fn started(config: DashboardConfig) -> Dashboard<ReplayTransport> {
    let mut dashboard = Dashboard::new(config, ReplayTransport::new(session()));
    dashboard.start(Duration::ZERO);
    let report = block_on(dashboard.tick(Duration::ZERO));
    assert!(report.polled);
    dashboard
}

#[test]
fn first_tick_polls_and_resolves_side_requests() {
    let dashboard = started(DashboardConfig::default());

    let sent = dashboard.transport().sent();
    assert_eq!(
        sent[0].path,
        "/timeout/switch-manager&topology&host-manager&flow-manager/0"
    );
    assert_eq!(dashboard.graph().last_event_id(), 3);
    assert_eq!(dashboard.graph().node_count(), 2);

    let s2 = dashboard.graph().node_by_id("S2").unwrap();
    assert!(s2.pinned);
    assert_eq!(s2.position, Point::new(1200.0, 100.0));

    let s1 = dashboard.graph().find_node("S1").unwrap();
    let port = dashboard.graph().find_port(s1, 1).unwrap();
    assert_eq!(
        dashboard.graph().port(port).unwrap().direction,
        Direction::Right
    );
    assert_eq!(
        dashboard.graph().link_by_id("L1").unwrap().bandwidth,
        1_000_000.0
    );
}

#[test]
fn tick_report_counts_side_outcomes() {
    let mut dashboard = Dashboard::new(
        DashboardConfig::default(),
        ReplayTransport::new(session()),
    );
    dashboard.start(Duration::ZERO);
    let report = block_on(dashboard.tick(Duration::ZERO));
    assert_eq!(
        report.applied,
        Some(sync::ApplyReport {
            applied: 3,
            dropped: 0,
            ignored: 0
        })
    );
    // S1 port list, S2 coordinates, S1 port 1.
    assert_eq!(report.side_applied, 3);
    // S1 coordinates, both roles, S2 port list, port stats.
    assert_eq!(report.side_failed, 5);
    assert_eq!(report.side_stale, 0);
}

#[test]
fn malformed_event_does_not_stall_polling() {
    let session: Session = serde_json::from_value(json!({
        "polls": [
            poll(4, json!({
                "switch-manager": [switch_add("S1"), { "type": "Add", "obj_id": null }]
            })),
            poll(5, json!({ "switch-manager": [switch_add("S2")] }))
        ],
        "responses": {}
    }))
    .unwrap();
    let mut dashboard = Dashboard::new(
        DashboardConfig::default(),
        ReplayTransport::new(session),
    );
    dashboard.start(Duration::ZERO);

    let report = block_on(dashboard.tick(Duration::ZERO));
    assert!(report.poll_error.is_none());
    assert_eq!(report.applied.map(|r| (r.applied, r.dropped)), Some((1, 1)));
    assert_eq!(dashboard.graph().last_event_id(), 4);

    block_on(dashboard.tick(ms(1000)));
    let polls: Vec<_> = dashboard
        .transport()
        .sent()
        .iter()
        .filter(|r| r.path.starts_with("/timeout/"))
        .map(|r| r.path.clone())
        .collect();
    assert_eq!(polls.len(), 2);
    assert!(polls[1].ends_with("/4"), "{polls:?}");
    assert_eq!(dashboard.sync().polls_ok(), 2);
    assert_eq!(dashboard.sync().polls_failed(), 0);
    assert_eq!(dashboard.graph().node_count(), 2);
}

#[test]
fn failed_polls_keep_the_graph_and_the_schedule() {
    let mut dashboard = started(DashboardConfig::default());

    let report = block_on(dashboard.tick(ms(500)));
    assert!(!report.polled);

    let report = block_on(dashboard.tick(ms(1000)));
    assert!(report.polled);
    assert!(report.poll_error.is_some());
    assert_eq!(dashboard.graph().node_count(), 2);
    assert_eq!(dashboard.sync().polls_failed(), 1);
    assert_eq!(dashboard.sync().next_due(), Some(ms(2000)));
    assert_eq!(dashboard.sync().state(), SyncState::Idle);
}

#[test]
fn failed_poll_clears_when_configured() {
    let config = DashboardConfig {
        clear_on_transport_error: true,
        ..DashboardConfig::default()
    };
    let mut dashboard = started(config);
    block_on(dashboard.tick(ms(1000)));
    assert!(dashboard.graph().is_empty());
    assert_eq!(dashboard.graph().generation(), 1);
    assert!(dashboard.outbox().is_empty());
}

#[test]
fn cancelled_loop_stops_polling() {
    let mut dashboard = started(DashboardConfig::default());
    dashboard.handle().cancel();
    let report = block_on(dashboard.tick(ms(5000)));
    assert!(!report.polled);
}

#[test]
fn moving_a_node_pins_it_and_persists_coordinates() {
    let mut dashboard = started(DashboardConfig::default());
    dashboard.move_node("S1", 100.0, 200.0).unwrap();

    let s1 = dashboard.graph().node_by_id("S1").unwrap();
    assert!(s1.pinned);
    assert_eq!(s1.position, Point::new(100.0, 200.0));
    assert!(dashboard.outbox().iter().any(|p| p.request
        == SideRequest::SaveCoords {
            node: "S1".into(),
            x: 100.0,
            y: 200.0
        }));

    let err = dashboard.move_node("nope", 0.0, 0.0).unwrap_err();
    assert!(matches!(err, Error::NotFound { kind: "node", .. }));
}

#[test]
fn responses_after_clear_are_stale() {
    let mut dashboard = started(DashboardConfig::default());
    dashboard.move_node("S1", 10.0, 10.0).unwrap();
    let pending = dashboard.take_ready(ms(100));
    assert_eq!(pending.len(), 1);

    dashboard.clear();
    assert!(dashboard.graph().is_empty());
    assert!(!dashboard.sync().is_running());
    assert_eq!(
        dashboard.complete(&pending[0], Ok(json!({})), ms(100)),
        Resolution::Stale
    );
    assert!(!block_on(dashboard.tick(ms(10_000))).polled);

    dashboard.start(ms(10_000));
    assert!(dashboard.sync().is_running());
}

#[test]
fn switch_status_round_trip() {
    let mut dashboard = started(DashboardConfig::default());
    dashboard
        .set_switch_status("S1", SwitchStatus::Down, ms(100))
        .unwrap();
    dashboard
        .set_switch_status("S1", SwitchStatus::Down, ms(100))
        .unwrap();
    assert_eq!(dashboard.graph().link_count(), 0);

    dashboard
        .set_switch_status("S1", SwitchStatus::Up, ms(100))
        .unwrap();
    let report = block_on(dashboard.tick(ms(100)));
    assert!(!report.polled);
    let s1 = dashboard.graph().find_node("S1").unwrap();
    assert!(dashboard.graph().find_port(s1, 1).is_some());

    assert!(matches!(
        dashboard.set_switch_status("nope", SwitchStatus::Up, ms(100)),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn selected_path_is_submitted_and_route_refreshed() {
    let mut dashboard = started(DashboardConfig::default());
    dashboard.set_path_mode(PathMode::Exact, "S1", "S2");
    dashboard.add_path_node("S1").unwrap();
    assert!(matches!(
        dashboard.submit_path("r1", &PathParams::default()),
        Err(Error::Path(PathError::Incomplete))
    ));
    assert!(matches!(
        dashboard.add_path_node("S1"),
        Err(Error::Path(PathError::Cycle))
    ));

    dashboard.add_path_node("S2").unwrap();
    assert!(dashboard.graph().link_by_id("L1").unwrap().is_route);
    dashboard.submit_path("r1", &PathParams::default()).unwrap();
    let body = dashboard.outbox().iter().find_map(|p| match &p.request {
        SideRequest::AddPath { body, .. } => Some(body.clone()),
        _ => None,
    });
    assert_eq!(body.unwrap()["exact"], json!(["S1", "S2"]));

    block_on(dashboard.tick(ms(100)));
    let route = &dashboard.routes()["r1"];
    assert_eq!(route.service, "demo");
    assert_eq!(route.paths[0].hops.len(), 2);
    // S2's ports were never discovered.
    assert_eq!(route.available_paths(dashboard.graph()).count(), 0);
}

#[test]
fn rescaling_resizes_every_node() {
    let mut dashboard = started(DashboardConfig::default());
    dashboard.set_scale(32.0).unwrap();
    for (_, node) in dashboard.graph().nodes() {
        assert_eq!((node.extent.width, node.extent.height), (32.0, 32.0));
    }
    let s1 = dashboard.graph().find_node("S1").unwrap();
    let port = dashboard.graph().find_port(s1, 1).unwrap();
    assert_eq!(dashboard.graph().port(port).unwrap().size, 32.0 / 6.0);

    assert!(matches!(
        dashboard.set_scale(0.0),
        Err(Error::Config { .. })
    ));
    assert_eq!(dashboard.config().scale, 32.0);
}

#[test]
fn snapshot_serializes_nodes_links_and_selection() {
    let dashboard = started(DashboardConfig::default());
    let snapshot = serde_json::to_value(dashboard.snapshot()).unwrap();
    assert_eq!(snapshot["cursor"], json!(3));
    assert_eq!(snapshot["nodes"][0]["id"], json!("S1"));
    assert_eq!(snapshot["nodes"][0]["kind"], json!("switch"));
    assert_eq!(snapshot["nodes"][0]["mode"], json!("UNKNOWN"));
    assert_eq!(snapshot["nodes"][0]["ports"][0]["direction"], json!("right"));
    assert_eq!(snapshot["links"][0]["a"], json!({ "node": "S1", "port": 1 }));
    assert_eq!(snapshot["links"][0]["bandwidth"], json!(1_000_000.0));
    assert_eq!(snapshot["selection"]["mode"], json!(null));
}
