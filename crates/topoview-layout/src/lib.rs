#![forbid(unsafe_code)]

//! Geometry for the topology canvas.
//!
//! Ports sit on one of the four sides of their switch, facing the neighbour at the other end of
//! their link. Ports sharing a side occupy dense slots `0..count`, ordered so that links leaving
//! the same side do not cross. Everything here mutates a [`topoview_graph::GraphStore`] in place.

pub use topoview_graph as graph;

mod direction;
mod geometry;
mod placement;

pub use direction::{
    attach_port, change_direction, classify_direction, compute_direction, compute_shift,
    refresh_stale_ports, relayout_node,
};
pub use geometry::{compute_xy, update_extent};
pub use placement::{default_placement, move_node};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutOptions {
    /// Base icon size in canvas units.
    pub scale: f64,
    /// Whether switches grow with their port count and ports get their own geometry.
    pub show_ports: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            scale: 64.0,
            show_ports: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Canvas {
    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 1600.0,
            height: 800.0,
        }
    }
}
