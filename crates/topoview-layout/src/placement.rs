use crate::direction::relayout_node;
use crate::{Canvas, LayoutOptions};
use rustc_hash::FxHashMap;
use topoview_graph::{GraphStore, NodeId, NodeKind, Point};

/// Spreads every unpinned switch over the row of its mode and hangs unpinned hosts below their
/// switch.
///
/// Row `r` (DR = 1, AR = 2, others = 3) sits at `y = r * cy / 2 + cy / 4`; the `k`-th switch of
/// a row with `n` unpinned members sits at `x = k * round(2 * cx / (n + 1))`, where `(cx, cy)` is
/// the canvas centre. Pinned nodes keep their positions and do not count towards `n`.
pub fn default_placement(g: &mut GraphStore, canvas: &Canvas, opts: &LayoutOptions) {
    let (cx, cy) = canvas.center();

    let mut rows: [Vec<NodeId>; 3] = Default::default();
    let mut hosts: Vec<(NodeId, String)> = Vec::new();
    for (id, node) in g.nodes() {
        if node.pinned {
            continue;
        }
        match &node.kind {
            NodeKind::Switch(sw) => {
                let row = sw.mode.placement_row() as usize;
                rows[row - 1].push(id);
            }
            NodeKind::Host(host) => hosts.push((id, host.switch_id.clone())),
        }
    }

    let mut moved = Vec::new();
    for (i, members) in rows.iter().enumerate() {
        if members.is_empty() {
            continue;
        }
        let row = (i + 1) as f64;
        let x_shift = (2.0 * cx / (members.len() as f64 + 1.0)).round();
        let y = (row * cy / 2.0 + cy / 4.0).round();
        for (k, &node) in members.iter().enumerate() {
            let target = Point::new(x_shift * (k + 1) as f64, y);
            if set_position(g, node, target) {
                moved.push(node);
            }
        }
    }

    let mut per_switch: FxHashMap<String, usize> = FxHashMap::default();
    for (host, switch_id) in hosts {
        let Some(switch) = g.find_node(&switch_id) else {
            continue;
        };
        let Some(anchor) = g.node(switch).map(|n| n.position) else {
            continue;
        };
        let index = per_switch.entry(switch_id).or_default();
        let target = Point::new(
            anchor.x + *index as f64 * opts.scale,
            anchor.y + 2.0 * opts.scale,
        );
        *index += 1;
        if set_position(g, host, target) && !moved.contains(&switch) {
            moved.push(switch);
        }
    }

    for node in moved {
        relayout_node(g, node, opts);
    }
}

fn set_position(g: &mut GraphStore, node: NodeId, target: Point) -> bool {
    let Some(n) = g.node_mut(node) else {
        return false;
    };
    if n.position == target {
        return false;
    }
    n.position = target;
    true
}

/// Drops `node` at `to` and pins it there. Ports of the node and of its neighbours are
/// re-pointed.
pub fn move_node(g: &mut GraphStore, node: NodeId, to: Point, opts: &LayoutOptions) -> bool {
    let Some(n) = g.node_mut(node) else {
        return false;
    };
    n.position = to;
    n.pinned = true;
    relayout_node(g, node, opts);
    tracing::debug!(?node, x = to.x, y = to.y, "node moved");
    true
}
