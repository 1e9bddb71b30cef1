pub mod router_config;

pub use router_config::RouterConfig;

use serde::{Deserialize, Serialize};

use crate::name::Name;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HyperbolicState {
    #[default]
    Off,
    On,
    /// Hyperbolic routes are computed into a separate table, link-state
    /// routes stay live.
    DryRun,
}

impl HyperbolicState {
    /// Coordinate LSAs are originated and take part in routing.
    pub fn uses_coordinates(&self) -> bool {
        !matches!(self, HyperbolicState::Off)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperbolicConfig {
    pub state: HyperbolicState,
    pub radius: f64,
    pub angles: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborConfig {
    pub name: Name,
    pub face_uri: String,
    pub link_cost: f64,
}
