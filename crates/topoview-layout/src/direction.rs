use crate::LayoutOptions;
use crate::geometry::{compute_xy, update_extent};
use topoview_graph::{Direction, GraphStore, NodeId, Point, PortId};

/// Side of `from` that faces `to`, splitting the plane along the two diagonals.
///
/// Canvas y grows downwards, so a neighbour straight above is `Up`. Points exactly on a diagonal
/// resolve in the order up, right, down.
pub fn classify_direction(from: Point, to: Point) -> Direction {
    let nx = to.x - from.x;
    let ny = to.y - from.y;
    if nx >= ny && nx <= -ny {
        Direction::Up
    } else if nx >= ny && nx >= -ny {
        Direction::Right
    } else if nx <= ny && nx >= -ny {
        Direction::Down
    } else {
        Direction::Left
    }
}

/// Moves a port to another side of its owner.
///
/// Ports left behind close the gap, the moved port takes the last slot of the new side and is
/// then shifted into crossing-free order. Geometry of the owner's ports is recomputed.
pub fn change_direction(g: &mut GraphStore, port: PortId, to: Direction, opts: &LayoutOptions) {
    let Some(p) = g.port(port) else {
        return;
    };
    let (owner, from, old_slot) = (p.owner, p.direction, p.slot);
    if from == to {
        return;
    }
    let Some(siblings) = g.node(owner).map(|n| n.ports().to_vec()) else {
        return;
    };

    for sibling in siblings {
        if sibling == port {
            continue;
        }
        if let Some(s) = g.port_mut(sibling) {
            if s.direction == from && s.slot > old_slot {
                s.slot -= 1;
            }
        }
    }

    let Some(node) = g.node_mut(owner) else {
        return;
    };
    node.port_counts.release_slot(from);
    let slot = node.port_counts.take_slot(to);
    if let Some(p) = g.port_mut(port) {
        p.direction = to;
        p.slot = slot;
    }

    compute_shift(g, port);
    refresh_geometry(g, owner, opts);
}

/// Moves a port towards the front of its side past every sibling whose neighbour lies further
/// along that side, pushing the passed siblings back by one.
pub fn compute_shift(g: &mut GraphStore, port: PortId) {
    let Some(p) = g.port(port) else {
        return;
    };
    let (owner, dir, old_slot) = (p.owner, p.direction, p.slot);
    let Some(far) = far_node(g, port) else {
        return;
    };
    let Some(node) = g.node(owner) else {
        return;
    };
    let origin = node.position;
    let Some(target) = g.node(far).map(|n| n.position) else {
        return;
    };

    let mut new_slot = old_slot;
    let mut same_side = Vec::new();
    for &sibling in node.ports() {
        if sibling == port {
            continue;
        }
        let Some(s) = g.port(sibling) else {
            continue;
        };
        if s.direction != dir {
            continue;
        }
        same_side.push(sibling);
        let Some(other) = far_node(g, sibling) else {
            continue;
        };
        if other == far {
            continue;
        }
        let Some(other_pos) = g.node(other).map(|n| n.position) else {
            continue;
        };
        if goes_before(dir, origin, target, other_pos) && s.slot < new_slot {
            new_slot = s.slot;
        }
    }

    if new_slot == old_slot {
        return;
    }
    for sibling in same_side {
        if let Some(s) = g.port_mut(sibling) {
            if s.slot >= new_slot && s.slot < old_slot {
                s.slot += 1;
            }
        }
    }
    if let Some(p) = g.port_mut(port) {
        p.slot = new_slot;
    }
}

/// Compares the slopes towards both neighbours. NaN slopes never win.
fn goes_before(dir: Direction, origin: Point, mine: Point, theirs: Point) -> bool {
    let (x1, y1) = (origin.x, origin.y);
    let (x2, y2) = (mine.x, mine.y);
    let (x3, y3) = (theirs.x, theirs.y);
    if dir.is_vertical() {
        (x2 - x1) / (y2 - y1) >= (x3 - x1) / (y3 - y1)
    } else {
        (y2 - y1) / (x2 - x1) <= (y3 - y1) / (x3 - x1)
    }
}

fn far_node(g: &GraphStore, port: PortId) -> Option<NodeId> {
    let p = g.port(port)?;
    let link = g.link(p.link?)?;
    let end = link.other(p.owner)?;
    g.node(end.node).map(|_| end.node)
}

/// Creates port `of_port` on `node` and lays it out: the port starts on the node's default side,
/// is shifted into order among its linked siblings and then pointed at its neighbour.
pub fn attach_port(
    g: &mut GraphStore,
    node: NodeId,
    of_port: u32,
    opts: &LayoutOptions,
) -> Option<PortId> {
    if let Some(existing) = g.find_port(node, of_port) {
        return Some(existing);
    }
    let port = g.add_port(node, of_port)?;
    compute_shift(g, port);
    if opts.show_ports {
        compute_direction(g, port, opts);
    }
    refresh_geometry(g, node, opts);
    Some(port)
}

/// Points a linked port at its neighbour and mirrors the far port to the opposite side.
pub fn compute_direction(g: &mut GraphStore, port: PortId, opts: &LayoutOptions) {
    let Some(owner) = g.port(port).map(|p| p.owner) else {
        return;
    };
    if let Some(far) = far_node(g, port) {
        let (Some(from), Some(to)) = (
            g.node(owner).map(|n| n.position),
            g.node(far).map(|n| n.position),
        ) else {
            return;
        };
        let dir = classify_direction(from, to);
        let opposite = g.opposite_port(port);
        change_direction(g, port, dir, opts);
        if let Some(opposite) = opposite {
            change_direction(g, opposite, dir.opposite(), opts);
        }
        refresh_geometry(g, far, opts);
    }
    compute_xy(g, port, opts);
}

/// Recomputes direction and geometry of every port of `node`, e.g. after it moved.
pub fn relayout_node(g: &mut GraphStore, node: NodeId, opts: &LayoutOptions) {
    let Some(ports) = g.node(node).map(|n| n.ports().to_vec()) else {
        return;
    };
    update_extent(g, node, opts);
    if !opts.show_ports {
        return;
    }
    for port in ports {
        compute_direction(g, port, opts);
    }
    refresh_geometry(g, node, opts);
}

/// Relayouts every switch that moved, or whose scale changed, since its port geometry was last
/// computed. Returns the number of switches touched.
pub fn refresh_stale_ports(g: &mut GraphStore, opts: &LayoutOptions) -> usize {
    let mut stale: Vec<NodeId> = Vec::new();
    for (_, node) in g.nodes() {
        for &port in node.ports() {
            let Some(p) = g.port(port) else {
                continue;
            };
            if p.anchor != Some(node.position) || p.size != opts.scale / 6.0 {
                stale.push(p.owner);
                break;
            }
        }
    }
    for &node in &stale {
        relayout_node(g, node, opts);
    }
    stale.len()
}

fn refresh_geometry(g: &mut GraphStore, node: NodeId, opts: &LayoutOptions) {
    let Some(ports) = g.node(node).map(|n| n.ports().to_vec()) else {
        return;
    };
    update_extent(g, node, opts);
    for port in ports {
        compute_xy(g, port, opts);
    }
}
