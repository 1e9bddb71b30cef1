use anyhow::Result;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::RouterConfig;
use crate::lsa::{AdjLsa, CoordinateLsa, Lsa, LsaKey, NameLsa};
use crate::lsdb::{Lsdb, LsdbUpdate};
use crate::name::Name;
use crate::network::{AdjacencyList, AdjacencyStatus, NamePrefixList};
use crate::route::{Fib, NamePrefixTable, RoutingTable};
use crate::scheduler::{Event, Scheduler};
use crate::sequencing::SequencingManager;
use crate::sync::SyncPublisher;

/// Input from collaborators running in other tasks (hello protocol, sync,
/// face monitor, management).
#[derive(Debug, Clone)]
pub enum RouterCommand {
    /// Wire-encoded LSA fetched by the sync layer.
    ReceivedLsa(Vec<u8>),
    NeighborStatus { neighbor: Name, status: AdjacencyStatus },
    InterestTimedOut { neighbor: Name },
    FaceCreated { neighbor: Name, face_id: u64 },
    FaceDestroyed { face_id: u64 },
    Advertise(Name),
    Withdraw(Name),
    Shutdown,
}

/// Owns every piece of routing state and drives it from a single loop.
pub struct Router {
    config: RouterConfig,
    this_router: Name,
    adjacencies: AdjacencyList,
    prefixes: NamePrefixList,
    scheduler: Scheduler,
    lsdb: Lsdb,
    routing_table: RoutingTable,
    npt: NamePrefixTable,
}

impl Router {
    pub fn new(config: RouterConfig, sync: Box<dyn SyncPublisher>, fib: Box<dyn Fib>) -> Self {
        let scheduler = Scheduler::new();
        let sequencing = SequencingManager::new(seq_file_dir(&config));
        let lsdb = Lsdb::new(&config, sequencing, scheduler.clone(), sync);
        let routing_table = RoutingTable::new(&config, scheduler.clone());
        let npt = NamePrefixTable::new(fib, config.max_faces_per_prefix);

        Self {
            this_router: config.router_prefix(),
            adjacencies: config.to_adjacency_list(),
            prefixes: config.to_name_prefix_list(),
            config,
            scheduler,
            lsdb,
            routing_table,
            npt,
        }
    }

    /// Originates the own LSAs and arms the first adjacency LSA build.
    pub fn start(&mut self) {
        info!(
            "Starting router {} with {} neighbors and {} advertised prefixes",
            self.this_router,
            self.adjacencies.len(),
            self.prefixes.len()
        );
        let updates = self.lsdb.build_and_install_own_name_lsa(&self.prefixes);
        self.apply(updates);
        if self.config.hyperbolic.state.uses_coordinates() {
            let updates = self.lsdb.build_and_install_own_cor_lsa();
            self.apply(updates);
        }
        self.lsdb.schedule_adj_lsa_build();
    }

    /// Reactor loop: timers, collaborator commands and ctrl-c.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<RouterCommand>) -> Result<()> {
        loop {
            let deadline = self.scheduler.next_deadline();
            tokio::select! {
                _ = wait_until(deadline) => {
                    self.process_due(Instant::now());
                }
                command = commands.recv() => match command {
                    Some(RouterCommand::Shutdown) => {
                        info!("Shutdown requested");
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        warn!("Command channel closed, stopping router");
                        break;
                    }
                },
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        error!("Failed to listen for ctrl-c: {}", e);
                    }
                    info!("Interrupted, stopping router");
                    break;
                }
            }
        }
        self.lsdb.sequencing().write_to_file();
        Ok(())
    }

    pub fn handle_command(&mut self, command: RouterCommand) {
        debug!("Handling {:?}", command);
        match command {
            RouterCommand::ReceivedLsa(wire) => match Lsa::wire_decode(&wire) {
                Ok(lsa) => self.install_lsa(lsa),
                Err(e) => warn!("Dropping undecodable LSA: {}", e),
            },
            RouterCommand::NeighborStatus { neighbor, status } => self.set_neighbor_status(&neighbor, status),
            RouterCommand::InterestTimedOut { neighbor } => self.increment_timed_out_interest_count(&neighbor),
            RouterCommand::FaceCreated { neighbor, face_id } => {
                if !self.adjacencies.set_face_id(&neighbor, face_id) {
                    debug!("Face {} created for unknown neighbor {}", face_id, neighbor);
                }
            }
            RouterCommand::FaceDestroyed { face_id } => self.on_face_destroyed(face_id),
            RouterCommand::Advertise(prefix) => self.advertise(prefix),
            RouterCommand::Withdraw(prefix) => self.withdraw(&prefix),
            RouterCommand::Shutdown => {}
        }
    }

    /// Runs every timer due at `now`, including ones armed while handling.
    pub fn process_due(&mut self, now: Instant) -> usize {
        let mut handled = 0;
        while let Some(event) = self.scheduler.pop_next_due(now) {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::ExpireLsa { key, seq_no } => {
                let updates = self.lsdb.expire_or_refresh_lsa(&key, seq_no);
                self.apply(updates);
            }
            Event::BuildAdjLsa => {
                let updates = self.lsdb.scheduled_adj_lsa_build(&self.adjacencies);
                self.apply(updates);
            }
            Event::CalculateRoutes => {
                self.routing_table.calculate(&self.lsdb, &self.adjacencies, &mut self.npt);
            }
        }
    }

    fn apply(&mut self, updates: Vec<LsdbUpdate>) {
        for update in updates {
            match update {
                LsdbUpdate::NamePrefixAdded { prefix, origin } => {
                    self.npt.add_entry(&prefix, &origin, &self.routing_table);
                }
                LsdbUpdate::NamePrefixRemoved { prefix, origin } => {
                    self.npt.remove_entry(&prefix, &origin);
                }
                LsdbUpdate::RecalculateRoutes => self.routing_table.schedule_calculation(),
            }
        }
    }

    // ---- inbound LSAs ----

    pub fn install_lsa(&mut self, lsa: Lsa) {
        let updates = self.lsdb.install_lsa(lsa);
        self.apply(updates);
    }

    pub fn install_name_lsa(&mut self, lsa: NameLsa) {
        let updates = self.lsdb.install_name_lsa(lsa);
        self.apply(updates);
    }

    pub fn install_adj_lsa(&mut self, lsa: AdjLsa) {
        let updates = self.lsdb.install_adj_lsa(lsa);
        self.apply(updates);
    }

    pub fn install_cor_lsa(&mut self, lsa: CoordinateLsa) {
        let updates = self.lsdb.install_cor_lsa(lsa);
        self.apply(updates);
    }

    pub fn is_lsa_new(&self, key: &LsaKey, seq_no: u64) -> bool {
        self.lsdb.is_lsa_new(key, seq_no)
    }

    pub fn is_name_lsa_new(&self, origin: &Name, seq_no: u64) -> bool {
        self.lsdb.is_name_lsa_new(origin, seq_no)
    }

    pub fn is_adj_lsa_new(&self, origin: &Name, seq_no: u64) -> bool {
        self.lsdb.is_adj_lsa_new(origin, seq_no)
    }

    pub fn is_cor_lsa_new(&self, origin: &Name, seq_no: u64) -> bool {
        self.lsdb.is_cor_lsa_new(origin, seq_no)
    }

    // ---- neighbors ----

    pub fn set_neighbor_status(&mut self, neighbor: &Name, status: AdjacencyStatus) {
        let mut changed = self.adjacencies.set_status(neighbor, status);
        if status == AdjacencyStatus::Active {
            changed |= self.adjacencies.set_timed_out_interest_count(neighbor, 0);
        }
        if changed {
            info!("Neighbor {} is now {:?}", neighbor, status);
            self.lsdb.schedule_adj_lsa_build();
        }
    }

    /// A hello to `neighbor` went unanswered. Once the retries are used up an
    /// active neighbor goes down.
    pub fn increment_timed_out_interest_count(&mut self, neighbor: &Name) {
        let Some(count) = self.adjacencies.increment_timed_out_interest_count(neighbor) else {
            debug!("Hello timeout for unknown neighbor {}", neighbor);
            return;
        };
        debug!("Neighbor {} timed out {} time(s)", neighbor, count);
        if count >= self.config.interest_retry_number
            && self.adjacencies.set_status(neighbor, AdjacencyStatus::Inactive)
        {
            info!("Neighbor {} is down after {} timeouts", neighbor, count);
        }
        self.lsdb.schedule_adj_lsa_build();
    }

    pub fn set_timed_out_interest_count(&mut self, neighbor: &Name, count: u32) {
        if self.adjacencies.set_timed_out_interest_count(neighbor, count) {
            self.lsdb.schedule_adj_lsa_build();
        }
    }

    pub fn on_face_destroyed(&mut self, face_id: u64) {
        let Some(adjacent) = self.adjacencies.find_by_face_id(face_id) else {
            debug!("Destroyed face {} belongs to no neighbor", face_id);
            return;
        };
        let neighbor = adjacent.name.clone();
        let was_active = adjacent.is_active();
        self.adjacencies.set_face_id(&neighbor, 0);

        if was_active {
            info!("Face {} of neighbor {} destroyed", face_id, neighbor);
            self.adjacencies.set_status(&neighbor, AdjacencyStatus::Inactive);
            self.adjacencies
                .set_timed_out_interest_count(&neighbor, self.config.interest_retry_number);
            self.lsdb.schedule_adj_lsa_build();
        }
    }

    // ---- advertised prefixes ----

    pub fn advertise(&mut self, prefix: Name) {
        info!("Advertising {}", prefix);
        if self.prefixes.insert(prefix) {
            let updates = self.lsdb.build_and_install_own_name_lsa(&self.prefixes);
            self.apply(updates);
        }
    }

    pub fn withdraw(&mut self, prefix: &Name) {
        info!("Withdrawing {}", prefix);
        if self.prefixes.remove(prefix) {
            let updates = self.lsdb.build_and_install_own_name_lsa(&self.prefixes);
            self.apply(updates);
        }
    }

    // ---- accessors ----

    pub fn this_router(&self) -> &Name {
        &self.this_router
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn adjacencies(&self) -> &AdjacencyList {
        &self.adjacencies
    }

    pub fn prefixes(&self) -> &NamePrefixList {
        &self.prefixes
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn lsdb(&self) -> &Lsdb {
        &self.lsdb
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    pub fn npt(&self) -> &NamePrefixTable {
        &self.npt
    }
}

fn seq_file_dir(config: &RouterConfig) -> PathBuf {
    if config.seq_file_dir.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        config.seq_file_dir.clone()
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NeighborConfig;
    use crate::route::LoggingFib;
    use crate::sync::LoggingPublisher;
    use chrono::Utc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn router() -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RouterConfig::default();
        config.router = "r1".to_string();
        config.seq_file_dir = dir.path().to_path_buf();
        config.advertising = vec![Name::from("/video")];
        config.neighbors = vec![NeighborConfig {
            name: Name::from("/ndn/site/r2"),
            face_uri: "udp4://10.0.0.2".to_string(),
            link_cost: 10.0,
        }];
        let router = Router::new(config, Box::new(LoggingPublisher), Box::new(LoggingFib));
        (router, dir)
    }

    #[test]
    fn test_start_originates_name_lsa() {
        let (mut router, _dir) = router();
        router.start();
        let own = router.lsdb().get_name_lsa(router.this_router()).unwrap();
        assert_eq!(own.header.seq_no, 1);
        assert!(own.prefixes.contains(&Name::from("/video")));
        assert!(router.lsdb().is_adj_lsa_build_scheduled());
        assert!(router.npt().is_empty());
    }

    #[test]
    fn test_neighbor_flip_triggers_build_once() {
        let (mut router, _dir) = router();
        let r2 = Name::from("/ndn/site/r2");
        router.set_neighbor_status(&r2, AdjacencyStatus::Active);
        router.set_neighbor_status(&r2, AdjacencyStatus::Active);
        assert_eq!(router.lsdb().adj_build_count(), 1);

        // the build completes once its interval has passed
        router.process_due(Instant::now() + Duration::from_secs(11));
        assert!(router.lsdb().get_adj_lsa(router.this_router()).is_some());
        assert!(router.routing_table().is_calculation_scheduled());
    }

    #[test]
    fn test_timeouts_bring_neighbor_down() {
        let (mut router, _dir) = router();
        let r2 = Name::from("/ndn/site/r2");
        router.set_neighbor_status(&r2, AdjacencyStatus::Active);
        for _ in 0..3 {
            router.increment_timed_out_interest_count(&r2);
        }
        assert_eq!(router.adjacencies().status_of(&r2), Some(AdjacencyStatus::Inactive));
        assert_eq!(router.lsdb().adj_build_count(), 4);
    }

    #[test]
    fn test_face_destroyed() {
        let (mut router, _dir) = router();
        let r2 = Name::from("/ndn/site/r2");
        router.handle_command(RouterCommand::FaceCreated {
            neighbor: r2.clone(),
            face_id: 7,
        });
        router.set_neighbor_status(&r2, AdjacencyStatus::Active);
        router.on_face_destroyed(7);

        let adjacent = router.adjacencies().get(&r2).unwrap();
        assert_eq!(adjacent.status, AdjacencyStatus::Inactive);
        assert_eq!(adjacent.face_id, 0);
        assert_eq!(adjacent.interest_timed_out, 3);
        assert_eq!(router.lsdb().adj_build_count(), 2);

        router.on_face_destroyed(7);
        assert_eq!(router.lsdb().adj_build_count(), 2);
    }

    #[test]
    fn test_advertise_and_withdraw_rebuild_name_lsa() {
        let (mut router, _dir) = router();
        router.start();
        router.advertise(Name::from("/music"));
        router.advertise(Name::from("/music"));
        let own = router.lsdb().get_name_lsa(router.this_router()).unwrap();
        assert_eq!(own.header.seq_no, 2);
        assert_eq!(own.prefixes.len(), 2);

        router.withdraw(&Name::from("/video"));
        let own = router.lsdb().get_name_lsa(router.this_router()).unwrap();
        assert_eq!(own.header.seq_no, 3);
        assert!(!own.prefixes.contains(&Name::from("/video")));
    }

    #[tokio::test]
    async fn test_run_handles_commands_until_shutdown() {
        let (mut router, _dir) = router();
        router.start();
        let lsa = NameLsa::new(
            Name::from("/ndn/site/r3"),
            4,
            Utc::now() + chrono::Duration::hours(1),
            vec![Name::from("/docs")].into_iter().collect(),
        );
        let (tx, rx) = mpsc::channel(8);
        tx.send(RouterCommand::ReceivedLsa(Lsa::from(lsa).wire_encode())).await.unwrap();
        tx.send(RouterCommand::ReceivedLsa(vec![0x01, 0x02])).await.unwrap();
        tx.send(RouterCommand::Shutdown).await.unwrap();

        router.run(rx).await.unwrap();
        assert!(router.lsdb().get_name_lsa(&Name::from("/ndn/site/r3")).is_some());
        assert!(router.npt().contains(&Name::from("/docs"), &Name::from("/ndn/site/r3")));
    }
}
