use crate::wire::FlowRule;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

type FlowMap = IndexMap<String, FlowRule, FxBuildHasher>;

/// Flow summaries per switch, keyed by flow id in arrival order.
#[derive(Debug, Clone, Default)]
pub struct FlowTable {
    tables: IndexMap<String, FlowMap, FxBuildHasher>,
}

impl FlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `rule` under `flow_id`. An existing entry with the same id is replaced in place.
    pub fn insert(&mut self, flow_id: impl Into<String>, rule: FlowRule) {
        self.tables
            .entry(rule.switch_id.clone())
            .or_default()
            .insert(flow_id.into(), rule);
    }

    /// Removes a flow. `switch_id` narrows the search when known.
    pub fn remove(&mut self, flow_id: &str, switch_id: Option<&str>) -> Option<FlowRule> {
        if let Some(switch_id) = switch_id {
            return self.tables.get_mut(switch_id)?.shift_remove(flow_id);
        }
        self.tables
            .values_mut()
            .find_map(|flows| flows.shift_remove(flow_id))
    }

    /// Forgets every flow of a switch; returns how many were dropped.
    pub fn drop_switch(&mut self, switch_id: &str) -> usize {
        self.tables
            .shift_remove(switch_id)
            .map_or(0, |flows| flows.len())
    }

    pub fn flows_of(&self, switch_id: &str) -> impl Iterator<Item = (&str, &FlowRule)> + '_ {
        self.tables
            .get(switch_id)
            .into_iter()
            .flat_map(|flows| flows.iter().map(|(id, rule)| (id.as_str(), rule)))
    }

    pub fn count_for(&self, switch_id: &str) -> usize {
        self.tables.get(switch_id).map_or(0, |flows| flows.len())
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(|flows| flows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}
