use log::{debug, info, trace};
use std::fmt;
use std::time::Duration;

use super::map::Map;
use super::name_prefix_table::NamePrefixTable;
use super::nexthop::{NextHop, NexthopList};
use crate::algorithms::{dijkstra, hyperbolic};
use crate::config::{HyperbolicState, RouterConfig};
use crate::lsdb::Lsdb;
use crate::name::Name;
use crate::network::AdjacencyList;
use crate::scheduler::{Event, Scheduler, TimerHandle};

#[derive(Debug, Clone, PartialEq)]
pub struct RoutingTableEntry {
    pub destination: Name,
    pub next_hops: NexthopList,
}

impl fmt::Display for RoutingTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Destination: {}", self.destination)?;
        write!(f, "{}", self.next_hops)
    }
}

/// Debounce of route calculations: Idle -> Pending -> Running -> Idle.
#[derive(Debug)]
enum CalculationState {
    Idle,
    Pending(TimerHandle),
    Running,
}

/// Next hops towards every reachable router, rebuilt from scratch on each
/// calculation. The dry table receives hyperbolic results while link-state
/// routes stay live.
pub struct RoutingTable {
    this_router: Name,
    hyperbolic_state: HyperbolicState,
    max_faces_per_prefix: usize,
    calc_interval: Duration,
    scheduler: Scheduler,
    state: CalculationState,
    entries: Vec<RoutingTableEntry>,
    dry_entries: Vec<RoutingTableEntry>,
}

impl RoutingTable {
    pub fn new(config: &RouterConfig, scheduler: Scheduler) -> Self {
        Self {
            this_router: config.router_prefix(),
            hyperbolic_state: config.hyperbolic.state,
            max_faces_per_prefix: config.max_faces_per_prefix,
            calc_interval: config.routing_calc_interval(),
            scheduler,
            state: CalculationState::Idle,
            entries: Vec::new(),
            dry_entries: Vec::new(),
        }
    }

    /// Arms the calculation timer unless a calculation is already pending.
    pub fn schedule_calculation(&mut self) {
        match self.state {
            CalculationState::Idle => {
                debug!("Scheduling routing table calculation in {:?}", self.calc_interval);
                let timer = self.scheduler.schedule(self.calc_interval, Event::CalculateRoutes);
                self.state = CalculationState::Pending(timer);
            }
            CalculationState::Pending(_) | CalculationState::Running => {
                trace!("Routing table calculation already pending");
            }
        }
    }

    pub fn is_calculation_scheduled(&self) -> bool {
        matches!(self.state, CalculationState::Pending(_))
    }

    /// Recomputes both tables and pushes the result into the name prefix table.
    pub fn calculate(&mut self, lsdb: &Lsdb, adjacencies: &AdjacencyList, npt: &mut NamePrefixTable) {
        // Entering Running drops any pending timer.
        self.state = CalculationState::Running;

        if lsdb.get_adj_lsa(&self.this_router).is_none() {
            info!("No adjacency LSA of {}, routing table cannot be calculated", self.this_router);
            self.clear();
            npt.update_with_new_route(self);
            self.state = CalculationState::Idle;
            return;
        }

        if lsdb.is_adj_lsa_build_scheduled() {
            info!("Adjacency LSA build is scheduled, deferring routing table calculation");
            self.state = CalculationState::Idle;
            self.schedule_calculation();
            return;
        }

        debug!("Calculating routing table for {}", self.this_router);
        self.clear();

        if matches!(self.hyperbolic_state, HyperbolicState::Off | HyperbolicState::DryRun) {
            self.calculate_link_state(lsdb, adjacencies);
        }
        if self.hyperbolic_state.uses_coordinates() {
            self.calculate_hyperbolic(lsdb, adjacencies, self.hyperbolic_state == HyperbolicState::DryRun);
        }

        npt.update_with_new_route(self);
        debug!("Routing table:\n{}", self);
        self.state = CalculationState::Idle;
    }

    fn calculate_link_state(&mut self, lsdb: &Lsdb, adjacencies: &AdjacencyList) {
        let map = Map::from_adj_lsas(lsdb.adj_lsas());
        let routes = dijkstra::calculate_paths(
            &map,
            lsdb.adj_lsas(),
            &self.this_router,
            adjacencies,
            self.max_faces_per_prefix,
        );
        for (destination, hop) in routes {
            self.add_next_hop(destination, hop);
        }
    }

    fn calculate_hyperbolic(&mut self, lsdb: &Lsdb, adjacencies: &AdjacencyList, dry_run: bool) {
        let map = Map::from_coordinate_lsas(lsdb.cor_lsas());
        let routes = hyperbolic::calculate_paths(&map, &self.this_router, adjacencies, |name| lsdb.get_cor_lsa(name));
        for (destination, hop) in routes {
            if dry_run {
                self.add_next_hop_to_dry_table(destination, hop);
            } else {
                self.add_next_hop(destination, hop);
            }
        }
    }

    pub fn add_next_hop(&mut self, destination: Name, hop: NextHop) {
        add_to(&mut self.entries, destination, hop);
    }

    pub fn add_next_hop_to_dry_table(&mut self, destination: Name, hop: NextHop) {
        add_to(&mut self.dry_entries, destination, hop);
    }

    pub fn find_entry(&self, destination: &Name) -> Option<&RoutingTableEntry> {
        self.entries.iter().find(|e| &e.destination == destination)
    }

    pub fn entries(&self) -> &[RoutingTableEntry] {
        &self.entries
    }

    pub fn dry_entries(&self) -> &[RoutingTableEntry] {
        &self.dry_entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dry_entries.clear();
    }
}

fn add_to(table: &mut Vec<RoutingTableEntry>, destination: Name, hop: NextHop) {
    match table.iter_mut().find(|e| e.destination == destination) {
        Some(entry) => entry.next_hops.add(hop),
        None => {
            let mut next_hops = NexthopList::new();
            next_hops.add(hop);
            table.push(RoutingTableEntry { destination, next_hops });
        }
    }
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            write!(f, "{}", entry)?;
        }
        if !self.dry_entries.is_empty() {
            writeln!(f, "  -- dry run --")?;
            for entry in &self.dry_entries {
                write!(f, "{}", entry)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_hops_merge_per_destination() {
        let mut table = RoutingTable::new(&RouterConfig::default(), Scheduler::new());
        table.add_next_hop(Name::from("/r2"), NextHop::new("udp4://a", 10.0));
        table.add_next_hop(Name::from("/r2"), NextHop::new("udp4://b", 5.0));
        table.add_next_hop(Name::from("/r3"), NextHop::new("udp4://a", 20.0));
        table.add_next_hop_to_dry_table(Name::from("/r3"), NextHop::hyperbolic("udp4://a", 1.0));

        assert_eq!(table.entries().len(), 2);
        assert_eq!(table.find_entry(&Name::from("/r2")).unwrap().next_hops.len(), 2);
        assert_eq!(table.dry_entries().len(), 1);

        table.clear();
        assert!(table.entries().is_empty());
        assert!(table.dry_entries().is_empty());
    }

    #[test]
    fn test_schedule_is_idempotent() {
        let scheduler = Scheduler::new();
        let mut table = RoutingTable::new(&RouterConfig::default(), scheduler.clone());
        table.schedule_calculation();
        table.schedule_calculation();
        assert!(table.is_calculation_scheduled());
        assert_eq!(scheduler.pending_count(), 1);
    }
}
