use crate::wire::de;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use topoview_graph::GraphStore;

/// One `(switch, port)` step of a route path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hop {
    pub dpid: String,
    pub port: u32,
}

impl<'de> Deserialize<'de> for Hop {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Pair(
            #[serde(deserialize_with = "de::id")] String,
            #[serde(deserialize_with = "de::port")] u32,
        );
        let Pair(dpid, port) = Pair::deserialize(d)?;
        Ok(Hop { dpid, port })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePath {
    #[serde(rename = "m_path", default)]
    pub hops: Vec<Hop>,
    #[serde(default)]
    pub metrics: Value,
    #[serde(default)]
    pub flapping: Value,
    #[serde(default, deserialize_with = "de::loose_bool")]
    pub broken_flag: bool,
    #[serde(default)]
    pub drop_threshold: Value,
    #[serde(default)]
    pub util_threshold: Value,
}

impl RoutePath {
    /// A path can be drawn once every hop names a known switch and one of its discovered ports.
    pub fn is_available(&self, g: &GraphStore) -> bool {
        self.hops.len() >= 2
            && self.hops.iter().all(|hop| {
                g.find_node(&hop.dpid)
                    .is_some_and(|node| g.find_port(node, hop.port).is_some())
            })
    }
}

/// `GET /routes/id/{id}/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default = "Route::unknown_service")]
    pub service: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "de::opt_u64")]
    pub used_path: Option<u64>,
    #[serde(default)]
    pub paths: Vec<RoutePath>,
}

impl Route {
    fn unknown_service() -> String {
        "unknown".to_string()
    }

    pub fn used(&self) -> Option<&RoutePath> {
        self.paths.get(self.used_path.unwrap_or(0) as usize)
    }

    pub fn available_paths<'a>(
        &'a self,
        g: &'a GraphStore,
    ) -> impl Iterator<Item = (usize, &'a RoutePath)> + 'a {
        self.paths
            .iter()
            .enumerate()
            .filter(move |(_, path)| path.is_available(g))
    }
}
