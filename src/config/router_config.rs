use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{HyperbolicConfig, HyperbolicState, NeighborConfig};
use crate::name::Name;
use crate::network::{AdjacencyList, Adjacent, NamePrefixList};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub network: String,
    pub site: String,
    pub router: String,
    pub lsa_prefix: Name,
    pub lsa_refresh_time: u64,       // seconds
    pub router_dead_interval: u64,   // seconds
    pub interest_retry_number: u32,
    pub interest_resend_time: u64,   // seconds
    pub adj_lsa_build_interval: u64, // seconds
    pub routing_calc_interval: u64,  // seconds
    /// 0 means no limit.
    pub max_faces_per_prefix: usize,
    pub hyperbolic: HyperbolicConfig,
    pub seq_file_dir: PathBuf,
    pub neighbors: Vec<NeighborConfig>,
    pub advertising: Vec<Name>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            network: "ndn".to_string(),
            site: "site".to_string(),
            router: "router".to_string(),
            lsa_prefix: Name::from("/localhop/ndn/nlsr/LSA"),
            lsa_refresh_time: 1800,     // 30 minutes
            router_dead_interval: 3600, // 1 hour
            interest_retry_number: 3,
            interest_resend_time: 5,
            adj_lsa_build_interval: 10,
            routing_calc_interval: 15,
            max_faces_per_prefix: 0,
            hyperbolic: HyperbolicConfig::default(),
            seq_file_dir: PathBuf::from("."),
            neighbors: vec![],
            advertising: vec![],
        }
    }
}

impl RouterConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: RouterConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (label, value) in [("network", &self.network), ("site", &self.site), ("router", &self.router)] {
            if value.is_empty() || value.contains('/') {
                bail!("invalid {} name component: {:?}", label, value);
            }
        }
        for neighbor in &self.neighbors {
            if neighbor.link_cost < 0.0 {
                bail!("negative link cost {} for neighbor {}", neighbor.link_cost, neighbor.name);
            }
        }
        if self.hyperbolic.state == HyperbolicState::On && self.hyperbolic.angles.is_empty() {
            bail!("hyperbolic routing is on but no angle is configured");
        }
        Ok(())
    }

    /// `/<network>/<site>/<router>`
    pub fn router_prefix(&self) -> Name {
        Name::new()
            .append(self.network.as_str())
            .append(self.site.as_str())
            .append(self.router.as_str())
    }

    /// Configured neighbors, all initially inactive.
    pub fn to_adjacency_list(&self) -> AdjacencyList {
        self.neighbors
            .iter()
            .map(|n| Adjacent::new(n.name.clone(), n.face_uri.clone(), n.link_cost))
            .collect()
    }

    pub fn to_name_prefix_list(&self) -> NamePrefixList {
        self.advertising.iter().cloned().collect()
    }

    pub fn lsa_refresh_time(&self) -> Duration {
        Duration::from_secs(self.lsa_refresh_time)
    }

    pub fn router_dead_interval(&self) -> Duration {
        Duration::from_secs(self.router_dead_interval)
    }

    pub fn adj_lsa_build_interval(&self) -> Duration {
        Duration::from_secs(self.adj_lsa_build_interval)
    }

    pub fn routing_calc_interval(&self) -> Duration {
        Duration::from_secs(self.routing_calc_interval)
    }

    /// Time one neighbor needs to exhaust its hello retries.
    pub fn hello_retry_window(&self) -> Duration {
        Duration::from_secs(u64::from(self.interest_retry_number) * self.interest_resend_time)
    }
}
