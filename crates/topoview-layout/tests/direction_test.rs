use topoview_layout::graph::{Direction, GraphStore, Node, NodeId, Point, PortId, SwitchMode};
use topoview_layout::{
    LayoutOptions, attach_port, change_direction, classify_direction, compute_direction,
};

fn switch(g: &mut GraphStore, id: &str, mode: SwitchMode, at: (f64, f64)) -> NodeId {
    let node = g.add_node(Node::switch(id, id).with_position(Point::new(at.0, at.1)));
    g.node_mut(node).unwrap().as_switch_mut().unwrap().mode = mode;
    node
}

fn assert_dense(g: &GraphStore, node: NodeId) {
    let n = g.node(node).unwrap();
    for dir in Direction::ALL {
        let mut slots: Vec<usize> = n
            .ports()
            .iter()
            .map(|&p| g.port(p).unwrap())
            .filter(|p| p.direction == dir)
            .map(|p| p.slot)
            .collect();
        slots.sort_unstable();
        let expected: Vec<usize> = (0..n.port_counts.get(dir)).collect();
        assert_eq!(slots, expected, "slots on {dir:?}");
    }
}

#[test]
fn classify_splits_along_both_diagonals() {
    let o = Point::new(0.0, 0.0);
    assert_eq!(classify_direction(o, Point::new(0.0, -10.0)), Direction::Up);
    assert_eq!(classify_direction(o, Point::new(10.0, 0.0)), Direction::Right);
    assert_eq!(classify_direction(o, Point::new(0.0, 10.0)), Direction::Down);
    assert_eq!(classify_direction(o, Point::new(-10.0, 0.0)), Direction::Left);
    assert_eq!(classify_direction(o, Point::new(5.0, -5.0)), Direction::Up);
    assert_eq!(classify_direction(o, Point::new(5.0, 5.0)), Direction::Right);
    assert_eq!(classify_direction(o, Point::new(-5.0, 5.0)), Direction::Down);
    assert_eq!(classify_direction(o, Point::new(-5.0, -5.0)), Direction::Up);
}

#[test]
fn moving_an_up_port_right_closes_the_gap() {
    let mut g = GraphStore::new();
    let s = switch(&mut g, "1", SwitchMode::Dr, (100.0, 100.0));
    let opts = LayoutOptions::default();
    let ports: Vec<_> = (1..=4).map(|n| attach_port(&mut g, s, n, &opts).unwrap()).collect();
    assert_eq!(g.node(s).unwrap().port_counts.up, 4);

    change_direction(&mut g, ports[1], Direction::Right, &opts);

    let slot = |i: usize| g.port(ports[i]).unwrap().slot;
    assert_eq!(g.port(ports[1]).unwrap().direction, Direction::Right);
    assert_eq!(slot(1), 0);
    assert_eq!((slot(0), slot(2), slot(3)), (0, 1, 2));
    let counts = g.node(s).unwrap().port_counts;
    assert_eq!((counts.up, counts.right), (3, 1));
    assert_dense(&g, s);

    // no-op when unchanged
    change_direction(&mut g, ports[1], Direction::Right, &opts);
    assert_eq!(g.node(s).unwrap().port_counts.right, 1);
}

#[test]
fn linked_ports_face_each_other() {
    let mut g = GraphStore::new();
    let a = switch(&mut g, "a", SwitchMode::Ar, (0.0, 0.0));
    let b = switch(&mut g, "b", SwitchMode::Ar, (300.0, 20.0));
    g.add_link("L", ("a", 1), ("b", 7)).unwrap();
    let opts = LayoutOptions::default();

    let pa = attach_port(&mut g, a, 1, &opts).unwrap();
    let pb = attach_port(&mut g, b, 7, &opts).unwrap();
    compute_direction(&mut g, pa, &opts);

    assert_eq!(g.port(pa).unwrap().direction, Direction::Right);
    assert_eq!(g.port(pb).unwrap().direction, Direction::Left);
    assert_eq!(g.node(a).unwrap().port_counts.down, 0);
    assert_dense(&g, a);
    assert_dense(&g, b);

    let port = g.port(pa).unwrap();
    let node = g.node(a).unwrap();
    assert_eq!(port.x, node.position.x + node.extent.width / 2.0);
}

#[test]
fn ports_on_one_side_are_ordered_by_neighbour_slope() {
    let mut g = GraphStore::new();
    let s = switch(&mut g, "s", SwitchMode::Dr, (500.0, 500.0));
    let left = switch(&mut g, "left", SwitchMode::Ar, (400.0, 100.0));
    let mid = switch(&mut g, "mid", SwitchMode::Ar, (500.0, 100.0));
    let right = switch(&mut g, "right", SwitchMode::Ar, (600.0, 100.0));
    g.add_link("L1", ("s", 1), ("left", 1)).unwrap();
    g.add_link("L2", ("s", 2), ("mid", 1)).unwrap();
    g.add_link("L3", ("s", 3), ("right", 1)).unwrap();
    let opts = LayoutOptions::default();

    let p_right = attach_port(&mut g, s, 3, &opts).unwrap();
    let p_mid = attach_port(&mut g, s, 2, &opts).unwrap();
    let p_left = attach_port(&mut g, s, 1, &opts).unwrap();
    for n in [left, mid, right] {
        attach_port(&mut g, n, 1, &opts).unwrap();
    }

    let port = |p: PortId| g.port(p).unwrap();
    assert!([p_left, p_mid, p_right].iter().all(|&p| port(p).direction == Direction::Up));
    assert_eq!(port(p_left).slot, 0);
    assert_eq!(port(p_mid).slot, 1);
    assert_eq!(port(p_right).slot, 2);
    assert!(port(p_left).x < port(p_mid).x && port(p_mid).x < port(p_right).x);
    assert_dense(&g, s);
}

#[test]
fn slots_stay_dense_through_direction_churn() {
    let mut g = GraphStore::new();
    let s = switch(&mut g, "s", SwitchMode::Unknown, (0.0, 0.0));
    let opts = LayoutOptions::default();
    let ports: Vec<_> = (1..=6).map(|n| attach_port(&mut g, s, n, &opts).unwrap()).collect();

    let moves = [
        (0, Direction::Up),
        (3, Direction::Left),
        (5, Direction::Up),
        (0, Direction::Right),
        (2, Direction::Left),
        (3, Direction::Down),
        (5, Direction::Right),
    ];
    for (i, dir) in moves {
        change_direction(&mut g, ports[i], dir, &opts);
        assert_dense(&g, s);
    }

    assert_eq!(g.clear_ports(s), 6);
    attach_port(&mut g, s, 9, &opts).unwrap();
    assert_dense(&g, s);
}
