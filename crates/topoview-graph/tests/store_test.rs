use topoview_graph::{Direction, GraphStore, Node, SwitchMode};

fn two_switches() -> GraphStore {
    let mut g = GraphStore::new();
    g.add_node(Node::switch("1", "00:00:00:00:00:00:00:01"));
    g.add_node(Node::switch("2", "00:00:00:00:00:00:00:02"));
    g
}

#[test]
fn link_between_known_switches_is_indexed_on_both_nodes() {
    let mut g = two_switches();
    let link = g.add_link("L1", ("1", 1), ("2", 1)).unwrap();

    let s1 = g.find_node("1").unwrap();
    let s2 = g.find_node("2").unwrap();
    assert_eq!(g.node(s1).unwrap().links(), &[link]);
    assert_eq!(g.node(s2).unwrap().links(), &[link]);
    assert_eq!(g.find_link_by_port("1", 1), Some(link));
    assert_eq!(g.find_link_by_port("1", 2), None);
    assert_eq!(g.link_between(s1, s2), Some(link));
    assert_eq!(g.neighbors(s1), vec![s2]);
    assert!(!g.link(link).unwrap().to_host);
}

#[test]
fn link_with_missing_endpoint_is_dropped() {
    let mut g = two_switches();
    assert_eq!(g.add_link("L9", ("1", 1), ("9", 1)), None);
    assert_eq!(g.link_count(), 0);
    let s1 = g.find_node("1").unwrap();
    assert!(g.node(s1).unwrap().links().is_empty());
}

#[test]
fn adding_existing_ids_is_idempotent() {
    let mut g = two_switches();
    let first = g.find_node("1").unwrap();
    assert_eq!(g.add_node(Node::switch("1", "other")), first);
    assert_eq!(g.node_count(), 2);

    let l = g.add_link("L1", ("1", 1), ("2", 1)).unwrap();
    assert_eq!(g.add_link("L1", ("1", 1), ("2", 1)), Some(l));
    assert_eq!(g.link_count(), 1);
}

#[test]
fn removing_a_switch_cascades_links_and_orphan_hosts() {
    let mut g = two_switches();
    g.add_link("L1", ("1", 1), ("2", 1)).unwrap();
    g.add_node(Node::host("h1", "aa:bb:cc:dd:ee:ff", "1", 3));
    let host_link = GraphStore::host_link_id("h1");
    g.add_link(host_link.as_str(), ("h1", 0), ("1", 3)).unwrap();

    let s1 = g.find_node("1").unwrap();
    let port = g.add_port(s1, 1).unwrap();
    assert!(g.port(port).unwrap().link.is_some());

    let removed = g.remove_node(s1).unwrap();
    assert_eq!(removed.id, "1");
    assert_eq!(g.find_node("1"), None);
    assert_eq!(g.find_node("h1"), None);
    assert_eq!(g.link_count(), 0);
    assert_eq!(g.port_count(), 0);
    assert!(g.port(port).is_none());

    let s2 = g.find_node("2").unwrap();
    assert!(g.node(s2).unwrap().links().is_empty());
}

#[test]
fn removing_a_host_link_removes_the_host() {
    let mut g = two_switches();
    g.add_node(Node::host("h1", "aa:bb:cc:dd:ee:ff", "1", 3));
    let link = g.add_link("host:h1", ("h1", 0), ("1", 3)).unwrap();
    assert!(g.link(link).unwrap().to_host);

    assert!(g.remove_link(link));
    assert_eq!(g.find_node("h1"), None);
    assert!(g.find_node("1").is_some());
    assert!(!g.remove_link(link));
}

#[test]
fn new_link_on_occupied_port_replaces_the_old_one() {
    let mut g = two_switches();
    g.add_node(Node::switch("3", "00:00:00:00:00:00:00:03"));
    let s1 = g.find_node("1").unwrap();
    let port = g.add_port(s1, 1).unwrap();
    let old = g.add_link("L1", ("1", 1), ("2", 1)).unwrap();
    assert_eq!(g.port(port).unwrap().link, Some(old));

    let new = g.add_link("L2", ("1", 1), ("3", 1)).unwrap();
    assert!(g.link(old).is_none());
    assert_eq!(g.find_link("L1"), None);
    assert_eq!(g.port(port).unwrap().link, Some(new));
    let s2 = g.find_node("2").unwrap();
    assert!(g.node(s2).unwrap().links().is_empty());
}

#[test]
fn ports_get_dense_slots_in_default_direction() {
    let mut g = two_switches();
    let s1 = g.find_node("1").unwrap();
    g.node_mut(s1).unwrap().as_switch_mut().unwrap().mode = SwitchMode::Dr;

    let a = g.add_port(s1, 1).unwrap();
    let b = g.add_port(s1, 2).unwrap();
    assert_eq!(g.add_port(s1, 1), Some(a));
    assert_eq!(g.port(a).unwrap().direction, Direction::Up);
    assert_eq!(g.port(a).unwrap().slot, 0);
    assert_eq!(g.port(b).unwrap().slot, 1);
    assert_eq!(g.node(s1).unwrap().port_counts.up, 2);
    assert_eq!(g.ports_on(s1, Direction::Up), vec![a, b]);

    assert_eq!(g.clear_ports(s1), 2);
    assert_eq!(g.node(s1).unwrap().port_counts.up, 0);
    assert!(g.port(a).is_none());
}

#[test]
fn port_speed_only_raises_bandwidth() {
    let mut g = two_switches();
    let s1 = g.find_node("1").unwrap();
    let s2 = g.find_node("2").unwrap();
    let link = g.add_link("L1", ("1", 1), ("2", 1)).unwrap();
    let p1 = g.add_port(s1, 1).unwrap();
    let p2 = g.add_port(s2, 1).unwrap();

    g.set_port_speed(p1, 10_000_000.0);
    g.set_port_speed(p2, 1_000_000.0);
    assert_eq!(g.link(link).unwrap().bandwidth, 10_000_000.0);
    assert_eq!(g.opposite_port(p1), Some(p2));
}

#[test]
fn clear_bumps_generation_and_invalidates_handles() {
    let mut g = two_switches();
    let s1 = g.find_node("1").unwrap();
    g.advance_cursor(7);
    assert!(!g.advance_cursor(3));
    assert_eq!(g.last_event_id(), 7);

    let before = g.generation();
    g.clear();
    assert_eq!(g.generation(), before + 1);
    assert_eq!(g.last_event_id(), 0);
    assert!(g.node(s1).is_none());
    assert!(g.is_empty());
}

#[test]
fn nodes_iterate_in_insertion_order() {
    let mut g = GraphStore::new();
    for id in ["c", "a", "b"] {
        g.add_node(Node::switch(id, id));
    }
    g.remove_node_by_id("a");
    let ids: Vec<&str> = g.nodes().map(|(_, n)| n.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b"]);
}
