use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use topoview_layout::{Canvas, LayoutOptions};

/// Dashboard settings. Every field has a default, so partial JSON is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub scale: f64,
    pub show_ports: bool,
    pub poll_interval_ms: u64,
    /// Delay before port discovery is re-issued for a switch that still has no ports.
    pub port_retry_ms: u64,
    /// Event categories requested from the controller, joined with `&` in the poll URL.
    pub services: Vec<String>,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub resolve_roles: bool,
    pub persist_coordinates: bool,
    pub poll_port_stats: bool,
    /// Drop the whole topology when a poll fails instead of keeping the last good state.
    pub clear_on_transport_error: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            scale: 64.0,
            show_ports: true,
            poll_interval_ms: 1000,
            port_retry_ms: 2000,
            services: ["switch-manager", "topology", "host-manager", "flow-manager"]
                .into_iter()
                .map(String::from)
                .collect(),
            canvas_width: 1600.0,
            canvas_height: 800.0,
            resolve_roles: true,
            persist_coordinates: true,
            poll_port_stats: true,
            clear_on_transport_error: false,
        }
    }
}

impl DashboardConfig {
    /// Deep-merges `overrides` over the defaults.
    pub fn from_value(overrides: &Value) -> Result<Self> {
        if !overrides.is_object() && !overrides.is_null() {
            return Err(Error::Config {
                message: "expected a JSON object".to_string(),
            });
        }
        let mut merged = serde_json::to_value(Self::default())?;
        deep_merge_value(&mut merged, overrides);
        let config: Self = serde_json::from_value(merged).map_err(|err| Error::Config {
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|err| Error::Config {
            message: err.to_string(),
        })?;
        Self::from_value(&value)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |message: &str| {
            Err(Error::Config {
                message: message.to_string(),
            })
        };
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return fail("scale must be a positive number");
        }
        if self.poll_interval_ms == 0 {
            return fail("poll_interval_ms must be positive");
        }
        if self.services.is_empty() {
            return fail("services must not be empty");
        }
        if !(self.canvas_width > 0.0 && self.canvas_height > 0.0) {
            return fail("canvas size must be positive");
        }
        Ok(())
    }

    pub fn layout(&self) -> LayoutOptions {
        LayoutOptions {
            scale: self.scale,
            show_ports: self.show_ports,
        }
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.canvas_width,
            height: self.canvas_height,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn port_retry(&self) -> Duration {
        Duration::from_millis(self.port_retry_ms)
    }
}

fn deep_merge_value(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(in_map)) => {
            for (key, in_value) in in_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge_value(base_value, in_value),
                    None => {
                        base_map.insert(key.clone(), in_value.clone());
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (base_slot, in_value) => {
            *base_slot = in_value.clone();
        }
    }
}
