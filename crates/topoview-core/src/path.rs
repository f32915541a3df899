//! Interactive construction of a route between two switches.
//!
//! A selection is either an *exact* hop-by-hop path or a pair of *dynamic* constraints: one
//! switch the route must visit (`include`) and a set of switches it must avoid (`exclude`). The
//! two families never coexist. Every accepted mutation is mirrored onto the graph through the
//! switch `selection` marker and the link `is_route` flag; a rejected one leaves both the
//! selection and the graph untouched.

use crate::PathError;
use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use topoview_graph::{GraphStore, NodeId, SelectionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMode {
    Exact,
    Include,
    Exclude,
}

impl PathMode {
    pub fn selection(self) -> SelectionType {
        match self {
            PathMode::Exact => SelectionType::Exact,
            PathMode::Include => SelectionType::Include,
            PathMode::Exclude => SelectionType::Exclude,
        }
    }

    fn is_exact(self) -> bool {
        self == PathMode::Exact
    }
}

/// Route settings sent along with a selection. Values travel as strings, as the controller
/// expects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathParams {
    pub metrics: String,
    pub flapping: String,
    pub drop_threshold: String,
    pub util_threshold: String,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            metrics: "Hop".to_string(),
            flapping: "0".to_string(),
            drop_threshold: "0".to_string(),
            util_threshold: "0".to_string(),
        }
    }
}

/// Body of `POST /routes/id/{id}/add-path/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathRequest {
    pub metrics: String,
    pub flapping: String,
    pub broken_flag: String,
    pub drop_threshold: String,
    pub util_threshold: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathSelector {
    mode: Option<PathMode>,
    from: Option<String>,
    to: Option<String>,
    exact: Vec<String>,
    include: Option<String>,
    exclude: IndexSet<String, FxBuildHasher>,
}

impl PathSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Option<PathMode> {
        self.mode
    }

    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn to(&self) -> Option<&str> {
        self.to.as_deref()
    }

    pub fn exact(&self) -> &[String] {
        &self.exact
    }

    pub fn include(&self) -> Option<&str> {
        self.include.as_deref()
    }

    pub fn exclude(&self) -> impl Iterator<Item = &str> + '_ {
        self.exclude.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.include.is_none() && self.exclude.is_empty()
    }

    /// Enters `mode` for a route between `from` and `to`.
    ///
    /// Crossing between the exact and the dynamic family drops the other family's selection.
    /// Re-entering exact mode with different endpoints restarts the path.
    pub fn set_mode(
        &mut self,
        g: &mut GraphStore,
        mode: PathMode,
        from: impl Into<String>,
        to: impl Into<String>,
    ) {
        let (from, to) = (from.into(), to.into());
        let endpoints_changed =
            self.from.as_deref() != Some(from.as_str()) || self.to.as_deref() != Some(to.as_str());
        self.from = Some(from);
        self.to = Some(to);

        if self.mode == Some(mode) {
            if mode.is_exact() && endpoints_changed {
                self.clear_static(g);
            }
        } else {
            if mode.is_exact() {
                self.clear_dynamic(g);
            } else {
                self.clear_static(g);
            }
            self.mode = Some(mode);
        }
        self.scrub_endpoints(g);
        tracing::debug!(?mode, from = ?self.from, to = ?self.to, "path mode set");
    }

    /// Adds switch `id` to the selection of the current mode.
    pub fn add_node(&mut self, g: &mut GraphStore, id: &str) -> Result<(), PathError> {
        let mode = self.mode.ok_or(PathError::NoMode)?;
        let node = switch_handle(g, id).ok_or(PathError::UnknownNode)?;
        match mode {
            PathMode::Exact => self.push_exact(g, node, id)?,
            PathMode::Include => {
                if self.is_endpoint(id) {
                    return Err(PathError::EndpointWaypoint);
                }
                if self.include.is_some() {
                    return Err(PathError::IncludeTaken);
                }
                self.exclude.shift_remove(id);
                self.include = Some(id.to_string());
            }
            PathMode::Exclude => {
                if self.is_endpoint(id) {
                    return Err(PathError::EndpointWaypoint);
                }
                if self.exclude.contains(id) {
                    return Err(PathError::AlreadySelected);
                }
                if self.include.as_deref() == Some(id) {
                    self.include = None;
                }
                self.exclude.insert(id.to_string());
            }
        }
        set_selection(g, node, mode.selection());
        Ok(())
    }

    fn push_exact(&mut self, g: &mut GraphStore, node: NodeId, id: &str) -> Result<(), PathError> {
        let Some(last) = self.exact.last() else {
            if !self.is_endpoint(id) {
                return Err(PathError::NotAnEndpoint);
            }
            self.exact.push(id.to_string());
            return Ok(());
        };
        if self.exact.iter().any(|hop| hop == id) {
            return Err(PathError::Cycle);
        }
        let has = |end: &Option<String>| {
            end.as_ref()
                .is_some_and(|end| self.exact.iter().any(|hop| hop == end))
        };
        if has(&self.from) && has(&self.to) {
            return Err(PathError::PathClosed);
        }
        let link = g
            .find_node(last)
            .and_then(|prev| g.link_between(prev, node))
            .ok_or(PathError::NotAdjacent)?;
        if let Some(link) = g.link_mut(link) {
            link.is_route = true;
        }
        self.exact.push(id.to_string());
        Ok(())
    }

    /// Takes switch `id` out of the selection. In exact mode only the tail can be removed.
    pub fn remove_node(&mut self, g: &mut GraphStore, id: &str) -> Result<(), PathError> {
        let mode = self.mode.ok_or(PathError::NoMode)?;
        match mode {
            PathMode::Exact => {
                if self.exact.last().map(String::as_str) != Some(id) {
                    return Err(if self.exact.iter().any(|hop| hop == id) {
                        PathError::NotTail
                    } else {
                        PathError::NotSelected
                    });
                }
                self.exact.pop();
                if let Some(node) = g.find_node(id) {
                    clear_route_marks(g, node);
                }
            }
            PathMode::Include => {
                if self.include.as_deref() != Some(id) {
                    return Err(PathError::NotSelected);
                }
                self.include = None;
            }
            PathMode::Exclude => {
                if !self.exclude.shift_remove(id) {
                    return Err(PathError::NotSelected);
                }
            }
        }
        if let Some(node) = g.find_node(id) {
            set_selection(g, node, SelectionType::None);
        }
        Ok(())
    }

    /// True when the exact path starts at one endpoint and ends at the other.
    pub fn is_complete(&self) -> bool {
        if self.mode != Some(PathMode::Exact) || self.exact.len() < 2 {
            return false;
        }
        let (Some(from), Some(to)) = (self.from.as_deref(), self.to.as_deref()) else {
            return false;
        };
        let (first, last) = (self.exact[0].as_str(), self.exact[self.exact.len() - 1].as_str());
        (first == from && last == to) || (first == to && last == from)
    }

    /// Leaves every mode and drops every marker this selector may have set.
    pub fn clear(&mut self, g: &mut GraphStore) {
        self.mode = None;
        self.from = None;
        self.to = None;
        self.exact.clear();
        self.include = None;
        self.exclude.clear();
        let switches: Vec<NodeId> = g
            .nodes()
            .filter(|(_, n)| n.is_switch())
            .map(|(id, _)| id)
            .collect();
        for node in switches {
            set_selection(g, node, SelectionType::None);
            clear_route_marks(g, node);
        }
    }

    /// Drops the include/exclude constraints.
    pub fn clear_dynamic(&mut self, g: &mut GraphStore) {
        self.include = None;
        self.exclude.clear();
        reset_markers(g, |sel| {
            matches!(sel, SelectionType::Include | SelectionType::Exclude)
        });
    }

    /// Drops the exact path and every route marker.
    pub fn clear_static(&mut self, g: &mut GraphStore) {
        self.exact.clear();
        let switches = reset_markers(g, |sel| sel == SelectionType::Exact);
        for node in switches {
            clear_route_marks(g, node);
        }
    }

    fn is_endpoint(&self, id: &str) -> bool {
        self.from.as_deref() == Some(id) || self.to.as_deref() == Some(id)
    }

    fn scrub_endpoints(&mut self, g: &mut GraphStore) {
        let endpoints: Vec<String> = self.from.iter().chain(self.to.iter()).cloned().collect();
        for id in endpoints {
            let mut dropped = self.exclude.shift_remove(&id);
            if self.include.as_deref() == Some(id.as_str()) {
                self.include = None;
                dropped = true;
            }
            if dropped {
                if let Some(node) = g.find_node(&id) {
                    set_selection(g, node, SelectionType::None);
                }
            }
        }
    }

    /// Forgets switches that left the graph. An exact path is cut at the first missing hop so it
    /// stays contiguous. Returns whether anything changed.
    pub fn prune(&mut self, g: &mut GraphStore) -> bool {
        let mut changed = false;
        if let Some(cut) = self.exact.iter().position(|id| switch_handle(g, id).is_none()) {
            for id in self.exact.drain(cut..) {
                if let Some(node) = g.find_node(&id) {
                    set_selection(g, node, SelectionType::None);
                    clear_route_marks(g, node);
                }
            }
            changed = true;
        }
        if self
            .include
            .as_deref()
            .is_some_and(|id| switch_handle(g, id).is_none())
        {
            self.include = None;
            changed = true;
        }
        let before = self.exclude.len();
        self.exclude.retain(|id| switch_handle(g, id).is_some());
        changed |= self.exclude.len() != before;
        if changed {
            tracing::debug!("path selection pruned");
        }
        changed
    }

    /// Builds the add-path payload from the current selection.
    pub fn to_request(&self, params: &PathParams) -> Result<PathRequest, PathError> {
        let mut request = PathRequest {
            metrics: params.metrics.clone(),
            flapping: params.flapping.clone(),
            broken_flag: "true".to_string(),
            drop_threshold: params.drop_threshold.clone(),
            util_threshold: params.util_threshold.clone(),
            exact: None,
            include: None,
            exclude: None,
        };
        match self.mode {
            Some(PathMode::Exact) => {
                if !self.is_complete() {
                    return Err(PathError::Incomplete);
                }
                request.exact = Some(self.exact.clone());
            }
            Some(PathMode::Include | PathMode::Exclude) => {
                request.include = self.include.clone().map(|id| vec![id]);
                if !self.exclude.is_empty() {
                    request.exclude = Some(self.exclude.iter().cloned().collect());
                }
            }
            None => {}
        }
        Ok(request)
    }
}

fn switch_handle(g: &GraphStore, id: &str) -> Option<NodeId> {
    let node = g.find_node(id)?;
    g.node(node)?.is_switch().then_some(node)
}

fn set_selection(g: &mut GraphStore, node: NodeId, selection: SelectionType) {
    if let Some(sw) = g.node_mut(node).and_then(|n| n.as_switch_mut()) {
        sw.selection = selection;
    }
}

fn clear_route_marks(g: &mut GraphStore, node: NodeId) {
    let links = g.node(node).map(|n| n.links().to_vec()).unwrap_or_default();
    for link in links {
        if let Some(link) = g.link_mut(link) {
            link.is_route = false;
        }
    }
}

/// Resets matching switch markers and returns every switch handle.
fn reset_markers(g: &mut GraphStore, matches: impl Fn(SelectionType) -> bool) -> Vec<NodeId> {
    let switches: Vec<(NodeId, SelectionType)> = g
        .nodes()
        .filter(|(_, n)| n.is_switch())
        .map(|(id, n)| (id, n.selection()))
        .collect();
    for &(node, sel) in &switches {
        if matches(sel) {
            set_selection(g, node, SelectionType::None);
        }
    }
    switches.into_iter().map(|(node, _)| node).collect()
}
