use crate::LayoutOptions;
use topoview_graph::{Direction, Extent, GraphStore, NodeId, NodeKind, PortId};

/// Gap between a corner and the first port on the up/down/left sides.
const EDGE_INSET: f64 = 5.0;

/// Resizes a node for its current port counts.
///
/// Switches grow by a quarter of `scale` per port on their busiest horizontal or vertical side
/// pair, never below `scale`. Hosts, and switches when ports are hidden, are `scale` square.
pub fn update_extent(g: &mut GraphStore, node: NodeId, opts: &LayoutOptions) {
    let Some(n) = g.node_mut(node) else {
        return;
    };
    let scale = opts.scale;
    n.extent = match n.kind {
        NodeKind::Switch(_) if opts.show_ports => {
            let c = n.port_counts;
            Extent {
                width: (c.down.max(c.up) as f64 * scale / 4.0).max(scale),
                height: (c.right.max(c.left) as f64 * scale / 4.0).max(scale),
            }
        }
        _ => Extent::square(scale),
    };
}

/// Places a port on its side of the owner according to its slot.
pub fn compute_xy(g: &mut GraphStore, port: PortId, opts: &LayoutOptions) {
    let Some(p) = g.port(port) else {
        return;
    };
    let Some(node) = g.node(p.owner) else {
        tracing::error!(?port, "port has no owner");
        return;
    };

    let nx = node.extent.width;
    let ny = node.extent.height;
    let count = node.port_counts.get(p.direction) as f64;
    let k = (p.slot + 1) as f64;
    let along = |len: f64| (k * len / (count + 1.0)).round();

    let (x, y) = match p.direction {
        Direction::Up => (EDGE_INSET + along(nx), 0.0),
        Direction::Right => (nx, along(ny)),
        Direction::Down => (nx - (EDGE_INSET + along(nx)), ny),
        Direction::Left => (0.0, ny - (along(ny) - EDGE_INSET)),
    };
    let origin = node.position;

    if let Some(p) = g.port_mut(port) {
        p.x = x + origin.x - nx / 2.0;
        p.y = y + origin.y - ny / 2.0;
        p.size = opts.scale / 6.0;
        p.anchor = Some(origin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topoview_graph::{Node, Point};

    #[test]
    fn up_port_of_a_bare_switch_sits_on_the_top_edge() {
        let mut g = GraphStore::new();
        let s = g.add_node(Node::switch("1", "1").with_position(Point::new(100.0, 100.0)));
        g.node_mut(s).unwrap().as_switch_mut().unwrap().mode = topoview_graph::SwitchMode::Dr;
        let p = g.add_port(s, 1).unwrap();
        let opts = LayoutOptions::default();
        update_extent(&mut g, s, &opts);
        compute_xy(&mut g, p, &opts);

        let port = g.port(p).unwrap();
        // extent 64x64, one port up: shift = 5 + round(1 * 64 / 2) = 37
        assert_eq!(port.x, 37.0 + 100.0 - 32.0);
        assert_eq!(port.y, 100.0 - 32.0);
        assert_eq!(port.size, 64.0 / 6.0);
        assert_eq!(port.anchor, Some(Point::new(100.0, 100.0)));
    }

    #[test]
    fn hidden_ports_keep_switches_at_base_scale() {
        let mut g = GraphStore::new();
        let s = g.add_node(Node::switch("1", "1"));
        for n in 1..=12 {
            g.add_port(s, n);
        }
        let mut opts = LayoutOptions::default();
        update_extent(&mut g, s, &opts);
        assert_eq!(
            g.node(s).unwrap().extent,
            Extent {
                width: 192.0,
                height: 64.0
            }
        );

        opts.show_ports = false;
        update_extent(&mut g, s, &opts);
        assert_eq!(g.node(s).unwrap().extent, Extent::square(64.0));
    }
}
