//! Controller REST payloads.
//!
//! The controller is loose about scalar types: ids and port numbers arrive either as JSON strings
//! or numbers, and `obj_info` is sometimes wrapped in a one-element array. Everything is
//! normalised here so the rest of the crate works with plain `String`/`u32`/`u64`.

use crate::{Error, Result};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) mod de {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn scalar_to_string(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub(super) fn scalar_to_u64(value: &Value) -> Option<u64> {
        match value {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let value = Value::deserialize(d)?;
        scalar_to_string(value).ok_or_else(|| D::Error::custom("expected a string or number id"))
    }

    pub fn opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        let value = Value::deserialize(d)?;
        if value.is_null() {
            return Ok(None);
        }
        scalar_to_u64(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom("expected an unsigned integer"))
    }

    pub fn port<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        let value = Value::deserialize(d)?;
        scalar_to_u64(&value)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| D::Error::custom("expected a port number"))
    }

    pub fn opt_port<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let value = Value::deserialize(d)?;
        if value.is_null() {
            return Ok(None);
        }
        scalar_to_u64(&value)
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom("expected a port number"))
    }

    /// A single port number or a list of them.
    pub fn ports<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u32>, D::Error> {
        let value = Value::deserialize(d)?;
        let items = match value {
            Value::Null => return Ok(Vec::new()),
            Value::Array(items) => items,
            other => vec![other],
        };
        items
            .iter()
            .map(|v| {
                scalar_to_u64(v)
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| D::Error::custom("expected a port number"))
            })
            .collect()
    }

    /// `true`, `false`, `"true"` or `"false"`.
    pub fn loose_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Value::deserialize(d)? {
            Value::Bool(b) => Ok(b),
            Value::String(s) => Ok(s.eq_ignore_ascii_case("true")),
            Value::Null => Ok(false),
            _ => Err(D::Error::custom("expected a boolean")),
        }
    }

    pub fn loose_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

pub(crate) fn decode<T: DeserializeOwned>(context: &'static str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| Error::decode(context, err))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Add,
    Delete,
    Change,
    #[serde(other)]
    Unknown,
}

/// Event category, derived from the service name the batch was filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Switch,
    Link,
    Host,
    Flow,
}

impl EventCategory {
    /// Order in which categories are applied within one poll response.
    pub const APPLY_ORDER: [EventCategory; 4] = [
        EventCategory::Switch,
        EventCategory::Link,
        EventCategory::Host,
        EventCategory::Flow,
    ];

    pub fn from_service(service: &str) -> Option<Self> {
        match service {
            "switch-manager" => Some(Self::Switch),
            "topology" => Some(Self::Link),
            "host-manager" => Some(Self::Host),
            "flow-manager" => Some(Self::Flow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventEntry {
    #[serde(default, deserialize_with = "de::opt_u64")]
    pub event_id: Option<u64>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(deserialize_with = "de::id")]
    pub obj_id: String,
    #[serde(default)]
    pub obj_info: Value,
}

impl EventEntry {
    /// Decodes `obj_info`, unwrapping a one-element array.
    pub fn info<T: DeserializeOwned>(&self, context: &'static str) -> Result<T> {
        let value = match &self.obj_info {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        decode(context, value)
    }
}

type ServiceBatches = IndexMap<String, Vec<EventEntry>, FxBuildHasher>;
type RawBatches = IndexMap<String, Vec<Value>, FxBuildHasher>;

/// An event entry that could not be decoded. Its event id still counts towards the cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedEntry {
    pub service: String,
    pub event_id: Option<u64>,
    pub message: String,
}

/// Response of `GET /timeout/{services}/{cursor}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollResponse {
    pub last_event: Option<u64>,
    pub events: ServiceBatches,
    pub rejected: Vec<RejectedEntry>,
}

#[derive(Deserialize)]
struct RawPoll {
    #[serde(default, deserialize_with = "de::opt_u64")]
    last_event: Option<u64>,
    #[serde(default)]
    events: RawBatches,
    /// Older controllers file batches as `[{ "<service>": [...] }, ...]`.
    #[serde(default)]
    timeout: Vec<RawBatches>,
}

impl PollResponse {
    /// Decodes the envelope strictly and each event entry on its own; a malformed entry is
    /// kept in `rejected` instead of failing the whole response.
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawPoll = decode("poll", value)?;
        let mut poll = Self {
            last_event: raw.last_event,
            ..Self::default()
        };
        for batch in std::iter::once(raw.events).chain(raw.timeout) {
            for (service, entries) in batch {
                poll.push_batch(service, entries);
            }
        }
        Ok(poll)
    }

    fn push_batch(&mut self, service: String, entries: Vec<Value>) {
        let mut decoded = Vec::with_capacity(entries.len());
        for entry in entries {
            let event_id = entry.get("event_id").and_then(de::scalar_to_u64);
            match decode::<EventEntry>("poll event", entry) {
                Ok(entry) => decoded.push(entry),
                Err(err) => self.rejected.push(RejectedEntry {
                    service: service.clone(),
                    event_id,
                    message: err.to_string(),
                }),
            }
        }
        self.events.entry(service).or_default().extend(decoded);
    }

    /// Entries of one category, in server order. Several services may map to the same category.
    pub fn entries(&self, category: EventCategory) -> impl Iterator<Item = &EventEntry> + '_ {
        self.events
            .iter()
            .filter(move |(service, _)| EventCategory::from_service(service) == Some(category))
            .flat_map(|(_, entries)| entries.iter())
    }

    /// Largest event id mentioned anywhere in the response, rejected entries included.
    pub fn max_event_id(&self) -> Option<u64> {
        self.events
            .values()
            .flat_map(|entries| entries.iter().filter_map(|e| e.event_id))
            .chain(self.rejected.iter().filter_map(|r| r.event_id))
            .max()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SwitchEventInfo {
    #[serde(rename = "DPID", alias = "dpid", default, deserialize_with = "de::id")]
    pub dpid: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinkEnd {
    #[serde(alias = "src_id", alias = "dst_id", deserialize_with = "de::id")]
    pub id: String,
    #[serde(alias = "src_port", alias = "dst_port", deserialize_with = "de::port")]
    pub port: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinkEventInfo {
    pub connect: Vec<LinkEnd>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostEventInfo {
    #[serde(default)]
    pub mac: String,
    #[serde(deserialize_with = "de::id")]
    pub switch_id: String,
    #[serde(deserialize_with = "de::port")]
    pub switch_port: u32,
}

/// Summary of a flow entry installed on a switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRule {
    #[serde(deserialize_with = "de::id")]
    pub switch_id: String,
    #[serde(default, deserialize_with = "de::opt_port")]
    pub in_port: Option<u32>,
    #[serde(default, deserialize_with = "de::ports")]
    pub out_port: Vec<u32>,
    #[serde(default)]
    pub eth_src: Option<String>,
    #[serde(default)]
    pub eth_dst: Option<String>,
    #[serde(default)]
    pub ip_src: Option<String>,
    #[serde(default)]
    pub ip_dst: Option<String>,
    #[serde(default)]
    pub set_field: Option<Value>,
}

/// `GET /api/webui/webinfo/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebInfo {
    #[serde(rename = "ID", default)]
    pub id: Value,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "WebInfo::missing")]
    pub x_coord: f64,
    #[serde(default = "WebInfo::missing")]
    pub y_coord: f64,
}

impl WebInfo {
    fn missing() -> f64 {
        -1.0
    }

    /// Negative coordinates mean the controller has no stored position.
    pub fn stored_position(&self) -> Option<(f64, f64)> {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        (valid(self.x_coord) && valid(self.y_coord)).then_some((self.x_coord, self.y_coord))
    }
}

/// `GET /switches/role/{id}/`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoleInfo {
    #[serde(default, deserialize_with = "de::id")]
    pub dpid: String,
    pub role: String,
}

/// `GET /switches/{dpid}/`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortList {
    #[serde(default, deserialize_with = "de::id")]
    pub dpid: String,
    #[serde(default, deserialize_with = "de::ports")]
    pub ports: Vec<u32>,
}

/// OFPP_LOCAL, plus the local port number some soft switches report.
pub const LOCAL_PORTS: [u32; 2] = [4_294_967_294, 999];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortLinkState {
    #[serde(default)]
    pub status: String,
}

/// `GET /switches/{dpid}/ports/{port}/`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortDetail {
    #[serde(deserialize_with = "de::port")]
    pub number: u32,
    #[serde(default)]
    pub link: Option<PortLinkState>,
    #[serde(default)]
    pub ethernet: Option<Value>,
}

impl PortDetail {
    pub fn is_link_down(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|l| l.status.eq_ignore_ascii_case("down"))
    }

    /// Negotiated speed in Kb/s. A feature list tagged `current` names a standard rate;
    /// otherwise (or for `custom-rate`) `curr-speed` is used as reported.
    pub fn current_speed(&self) -> Option<f64> {
        let eth = self.ethernet.as_ref()?.as_object()?;
        let reported = eth.get("curr-speed").and_then(de::loose_f64);
        let features = eth.get("features").and_then(Value::as_object);
        let current = features.and_then(|features| {
            features.iter().find_map(|(rate, tags)| {
                let tagged = match tags {
                    Value::Array(items) => items.iter().any(|t| t.as_str() == Some("current")),
                    Value::String(s) => s.contains("current"),
                    _ => false,
                };
                tagged.then_some(rate.as_str())
            })
        });
        match current {
            Some("custom-rate") | None => reported,
            Some(rate) => standard_rate(rate).or(reported),
        }
    }
}

fn standard_rate(rate: &str) -> Option<f64> {
    let kbps = match rate {
        "10Mb-half-duplex" | "10Mb-full-duplex" => 10_000.0,
        "100Mb-half-duplex" | "100Mb-full-duplex" => 100_000.0,
        "1Gb-half-duplex" | "1Gb-full-duplex" => 1_000_000.0,
        "10Gb-full-duplex" => 10_000_000.0,
        "40Gb-full-duplex" => 40_000_000.0,
        "100Gb-full-duplex" => 100_000_000.0,
        "1Tb-full-duplex" => 1_000_000_000.0,
        _ => return None,
    };
    Some(kbps)
}

/// One entry of `GET /switches/ports/stats/`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortStatsEntry {
    #[serde(deserialize_with = "de::id")]
    pub dpid: String,
    #[serde(deserialize_with = "de::port")]
    pub port: u32,
    #[serde(default)]
    pub stats: Value,
}

impl PortStatsEntry {
    /// `max(rx, tx)` of the current-speed sample, in Kb/s.
    pub fn load_kbps(&self) -> Option<f64> {
        let current = self.stats.get("current-speed")?;
        let kb = |key: &str| current.get(key).and_then(de::loose_f64).map(|b| 8.0 * b / 1000.0);
        Some(kb("rx-bytes")?.max(kb("tx-bytes")?))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PortStatsBatch {
    #[serde(default)]
    pub array: Vec<PortStatsEntry>,
}
