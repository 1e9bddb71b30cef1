//! Link-state database: install, refresh and expiry of the three LSA kinds,
//! and the adjacency LSA build gate.
//!
//! The database never touches the routing table or the name prefix table
//! directly. Every mutating operation returns the [`LsdbUpdate`]s it implies
//! and the router applies them.

use chrono::{DateTime, Utc};
use log::{debug, info, trace};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::config::{HyperbolicConfig, RouterConfig};
use crate::lsa::{AdjLsa, CoordinateLsa, Lsa, LsaHeader, LsaKey, LsaType, NameLsa};
use crate::name::Name;
use crate::network::{AdjacencyList, NamePrefixList};
use crate::scheduler::{Event, Scheduler, TimerHandle};
use crate::sequencing::SequencingManager;
use crate::sync::SyncPublisher;

/// Side effect of an LSDB operation on the rest of the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LsdbUpdate {
    NamePrefixAdded { prefix: Name, origin: Name },
    NamePrefixRemoved { prefix: Name, origin: Name },
    RecalculateRoutes,
}

#[derive(Debug)]
struct StoredLsa<T> {
    lsa: T,
    // Dropping the handle cancels the pending expiry.
    expiry: TimerHandle,
}

#[derive(Debug)]
enum AdjBuildState {
    Idle,
    BuildScheduled(TimerHandle),
}

pub struct Lsdb {
    this_router: Name,
    lsa_prefix: Name,
    hyperbolic: HyperbolicConfig,
    lsa_refresh_time: Duration,
    router_dead_interval: Duration,
    adj_lsa_build_interval: Duration,
    hello_retry_window: Duration,
    interest_retry_number: u32,
    sequencing: SequencingManager,
    scheduler: Scheduler,
    sync: Box<dyn SyncPublisher>,
    name_lsas: BTreeMap<Name, StoredLsa<NameLsa>>,
    adj_lsas: BTreeMap<Name, StoredLsa<AdjLsa>>,
    cor_lsas: BTreeMap<Name, StoredLsa<CoordinateLsa>>,
    adj_build: AdjBuildState,
    adj_build_count: u32,
}

impl Lsdb {
    pub fn new(
        config: &RouterConfig,
        sequencing: SequencingManager,
        scheduler: Scheduler,
        sync: Box<dyn SyncPublisher>,
    ) -> Self {
        Self {
            this_router: config.router_prefix(),
            lsa_prefix: config.lsa_prefix.clone(),
            hyperbolic: config.hyperbolic.clone(),
            lsa_refresh_time: config.lsa_refresh_time(),
            router_dead_interval: config.router_dead_interval(),
            adj_lsa_build_interval: config.adj_lsa_build_interval(),
            hello_retry_window: config.hello_retry_window(),
            interest_retry_number: config.interest_retry_number,
            sequencing,
            scheduler,
            sync,
            name_lsas: BTreeMap::new(),
            adj_lsas: BTreeMap::new(),
            cor_lsas: BTreeMap::new(),
            adj_build: AdjBuildState::Idle,
            adj_build_count: 0,
        }
    }

    pub fn this_router(&self) -> &Name {
        &self.this_router
    }

    pub fn sequencing(&self) -> &SequencingManager {
        &self.sequencing
    }

    // ---- own LSAs ----

    pub fn build_and_install_own_name_lsa(&mut self, prefixes: &NamePrefixList) -> Vec<LsdbUpdate> {
        let seq_no = self.sequencing.increase_name_lsa_seq();
        let lsa = NameLsa::new(self.this_router.clone(), seq_no, self.own_expiration(), prefixes.clone());
        info!("Built own name LSA seq={} with {} prefixes", seq_no, lsa.prefixes.len());
        self.publish(LsaType::Name, seq_no);
        self.install_name_lsa(lsa)
    }

    pub fn build_and_install_own_adj_lsa(&mut self, adjacencies: &AdjacencyList) -> Vec<LsdbUpdate> {
        let seq_no = self.sequencing.increase_adj_lsa_seq();
        let lsa = AdjLsa::new(self.this_router.clone(), seq_no, self.own_expiration(), adjacencies);
        info!("Built own adjacency LSA seq={} with {} links", seq_no, lsa.link_count());
        self.publish(LsaType::Adjacency, seq_no);
        self.install_adj_lsa(lsa)
    }

    pub fn build_and_install_own_cor_lsa(&mut self) -> Vec<LsdbUpdate> {
        let seq_no = self.sequencing.increase_cor_lsa_seq();
        let lsa = CoordinateLsa::new(
            self.this_router.clone(),
            seq_no,
            self.own_expiration(),
            self.hyperbolic.radius,
            self.hyperbolic.angles.clone(),
        );
        info!("Built own coordinate LSA seq={}", seq_no);
        self.publish(LsaType::Coordinate, seq_no);
        self.install_cor_lsa(lsa)
    }

    // ---- install ----

    pub fn install_lsa(&mut self, lsa: Lsa) -> Vec<LsdbUpdate> {
        match lsa {
            Lsa::Name(lsa) => self.install_name_lsa(lsa),
            Lsa::Adjacency(lsa) => self.install_adj_lsa(lsa),
            Lsa::Coordinate(lsa) => self.install_cor_lsa(lsa),
        }
    }

    pub fn install_name_lsa(&mut self, lsa: NameLsa) -> Vec<LsdbUpdate> {
        let origin = lsa.header.origin_router.clone();
        if !self.is_name_lsa_new(&origin, lsa.header.seq_no) {
            debug!("Ignoring name LSA {} seq={}: not newer", origin, lsa.header.seq_no);
            return Vec::new();
        }
        let remote = origin != self.this_router;
        let expiry = self.arm_expiry(LsaType::Name, &lsa.header);
        let mut updates = Vec::new();

        if let Some(stored) = self.name_lsas.get_mut(&origin) {
            debug!("Updating name LSA {} seq {} -> {}", origin, stored.lsa.header.seq_no, lsa.header.seq_no);
            if remote {
                for prefix in lsa.prefixes.difference(&stored.lsa.prefixes) {
                    if prefix != &self.this_router {
                        updates.push(LsdbUpdate::NamePrefixAdded {
                            prefix: prefix.clone(),
                            origin: origin.clone(),
                        });
                    }
                }
                for prefix in stored.lsa.prefixes.difference(&lsa.prefixes) {
                    if prefix != &self.this_router {
                        updates.push(LsdbUpdate::NamePrefixRemoved {
                            prefix: prefix.clone(),
                            origin: origin.clone(),
                        });
                    }
                }
            }
            stored.lsa = lsa;
            stored.expiry = expiry;
            return updates;
        }

        debug!("Installing new name LSA {} seq={}", origin, lsa.header.seq_no);
        if remote {
            updates.push(LsdbUpdate::NamePrefixAdded {
                prefix: origin.clone(),
                origin: origin.clone(),
            });
            for prefix in lsa.prefixes.iter().filter(|p| *p != &self.this_router) {
                updates.push(LsdbUpdate::NamePrefixAdded {
                    prefix: prefix.clone(),
                    origin: origin.clone(),
                });
            }
        }
        self.name_lsas.insert(origin, StoredLsa { lsa, expiry });
        updates
    }

    pub fn install_adj_lsa(&mut self, lsa: AdjLsa) -> Vec<LsdbUpdate> {
        let origin = lsa.header.origin_router.clone();
        if !self.is_adj_lsa_new(&origin, lsa.header.seq_no) {
            debug!("Ignoring adjacency LSA {} seq={}: not newer", origin, lsa.header.seq_no);
            return Vec::new();
        }
        let expiry = self.arm_expiry(LsaType::Adjacency, &lsa.header);

        if let Some(stored) = self.adj_lsas.get_mut(&origin) {
            debug!("Updating adjacency LSA {} seq {} -> {}", origin, stored.lsa.header.seq_no, lsa.header.seq_no);
            let changed = !stored.lsa.is_equal_content(&lsa);
            stored.lsa.header = lsa.header;
            stored.expiry = expiry;
            if changed {
                stored.lsa.adjacencies = lsa.adjacencies;
                return vec![LsdbUpdate::RecalculateRoutes];
            }
            return Vec::new();
        }

        debug!("Installing new adjacency LSA {} seq={}", origin, lsa.header.seq_no);
        let mut updates = Vec::new();
        if origin != self.this_router {
            updates.push(LsdbUpdate::NamePrefixAdded {
                prefix: origin.clone(),
                origin: origin.clone(),
            });
        }
        self.adj_lsas.insert(origin, StoredLsa { lsa, expiry });
        updates.push(LsdbUpdate::RecalculateRoutes);
        updates
    }

    pub fn install_cor_lsa(&mut self, lsa: CoordinateLsa) -> Vec<LsdbUpdate> {
        let origin = lsa.header.origin_router.clone();
        if !self.is_cor_lsa_new(&origin, lsa.header.seq_no) {
            debug!("Ignoring coordinate LSA {} seq={}: not newer", origin, lsa.header.seq_no);
            return Vec::new();
        }
        let recalculate = self.hyperbolic.state.uses_coordinates();
        let expiry = self.arm_expiry(LsaType::Coordinate, &lsa.header);

        if let Some(stored) = self.cor_lsas.get_mut(&origin) {
            debug!("Updating coordinate LSA {} seq {} -> {}", origin, stored.lsa.header.seq_no, lsa.header.seq_no);
            let changed = !stored.lsa.is_equal_content(&lsa);
            stored.lsa.header = lsa.header;
            stored.expiry = expiry;
            if changed {
                stored.lsa.radius = lsa.radius;
                stored.lsa.angles = lsa.angles;
                if recalculate {
                    return vec![LsdbUpdate::RecalculateRoutes];
                }
            }
            return Vec::new();
        }

        debug!("Installing new coordinate LSA {} seq={}", origin, lsa.header.seq_no);
        let mut updates = Vec::new();
        if origin != self.this_router {
            updates.push(LsdbUpdate::NamePrefixAdded {
                prefix: origin.clone(),
                origin: origin.clone(),
            });
        }
        self.cor_lsas.insert(origin, StoredLsa { lsa, expiry });
        if recalculate {
            updates.push(LsdbUpdate::RecalculateRoutes);
        }
        updates
    }

    // ---- remove ----

    pub fn remove_name_lsa(&mut self, origin: &Name) -> Vec<LsdbUpdate> {
        let Some(stored) = self.name_lsas.remove(origin) else {
            return Vec::new();
        };
        debug!("Removed name LSA {}", origin);
        if origin == &self.this_router {
            return Vec::new();
        }
        let mut updates = vec![LsdbUpdate::NamePrefixRemoved {
            prefix: origin.clone(),
            origin: origin.clone(),
        }];
        for prefix in stored.lsa.prefixes.iter().filter(|p| *p != &self.this_router) {
            updates.push(LsdbUpdate::NamePrefixRemoved {
                prefix: prefix.clone(),
                origin: origin.clone(),
            });
        }
        updates
    }

    pub fn remove_adj_lsa(&mut self, origin: &Name) -> Vec<LsdbUpdate> {
        if self.adj_lsas.remove(origin).is_none() {
            return Vec::new();
        }
        debug!("Removed adjacency LSA {}", origin);
        self.retract_origin(origin)
    }

    pub fn remove_cor_lsa(&mut self, origin: &Name) -> Vec<LsdbUpdate> {
        if self.cor_lsas.remove(origin).is_none() {
            return Vec::new();
        }
        debug!("Removed coordinate LSA {}", origin);
        self.retract_origin(origin)
    }

    fn retract_origin(&self, origin: &Name) -> Vec<LsdbUpdate> {
        if origin == &self.this_router {
            return Vec::new();
        }
        vec![LsdbUpdate::NamePrefixRemoved {
            prefix: origin.clone(),
            origin: origin.clone(),
        }]
    }

    // ---- expiry ----

    /// Timer callback for the LSA under `key`, armed when it carried
    /// `seq_no`. A timer outlived by a newer version does nothing. An own LSA
    /// is refreshed with the next sequence number; a remote one is dropped.
    pub fn expire_or_refresh_lsa(&mut self, key: &LsaKey, seq_no: u64) -> Vec<LsdbUpdate> {
        match self.stored_seq_no(key) {
            Some(current) if current == seq_no => {}
            Some(current) => {
                debug!("Stale timer for {} (seq {} superseded by {})", key, seq_no, current);
                return Vec::new();
            }
            None => {
                debug!("Timer fired for {} which is no longer stored", key);
                return Vec::new();
            }
        }

        let mut updates = if key.origin_router == self.this_router {
            self.refresh_own_lsa(key.lsa_type);
            Vec::new()
        } else {
            info!("{} seq={} expired", key, seq_no);
            match key.lsa_type {
                LsaType::Name => self.remove_name_lsa(&key.origin_router),
                LsaType::Adjacency => self.remove_adj_lsa(&key.origin_router),
                LsaType::Coordinate => self.remove_cor_lsa(&key.origin_router),
            }
        };

        let recalculate = match key.lsa_type {
            LsaType::Name => false,
            LsaType::Adjacency => true,
            LsaType::Coordinate => self.hyperbolic.state.uses_coordinates(),
        };
        if recalculate {
            updates.push(LsdbUpdate::RecalculateRoutes);
        }
        updates
    }

    fn refresh_own_lsa(&mut self, lsa_type: LsaType) {
        let key = LsaKey::new(self.this_router.clone(), lsa_type);
        // An own LSA learned back from the network may be ahead of the counter.
        if let Some(installed) = self.stored_seq_no(&key) {
            if installed > self.sequencing.get(lsa_type) {
                debug!("Advancing {} counter to installed seq {}", key, installed);
                self.sequencing.set(lsa_type, installed);
            }
        }
        let seq_no = self.sequencing.increase(lsa_type);
        let expiration = self.own_expiration();
        let delay = self.lsa_refresh_time;
        let expiry = self.scheduler.schedule(delay, Event::ExpireLsa { key: key.clone(), seq_no });

        let header = match lsa_type {
            LsaType::Name => self.name_lsas.get_mut(&key.origin_router).map(|s| {
                s.expiry = expiry;
                &mut s.lsa.header
            }),
            LsaType::Adjacency => self.adj_lsas.get_mut(&key.origin_router).map(|s| {
                s.expiry = expiry;
                &mut s.lsa.header
            }),
            LsaType::Coordinate => self.cor_lsas.get_mut(&key.origin_router).map(|s| {
                s.expiry = expiry;
                &mut s.lsa.header
            }),
        };
        if let Some(header) = header {
            header.seq_no = seq_no;
            header.set_expiration(expiration);
        }
        info!("Refreshed own {} seq={}", key, seq_no);
        self.publish(lsa_type, seq_no);
    }

    // ---- adjacency LSA build gate ----

    /// Counts a neighbor change and arms the build timer when none is armed.
    pub fn schedule_adj_lsa_build(&mut self) {
        self.adj_build_count += 1;
        if let AdjBuildState::Idle = self.adj_build {
            debug!("Scheduling adjacency LSA build in {:?}", self.adj_lsa_build_interval);
            let timer = self.scheduler.schedule(self.adj_lsa_build_interval, Event::BuildAdjLsa);
            self.adj_build = AdjBuildState::BuildScheduled(timer);
        }
    }

    /// Build timer callback. Publishes only once no neighbor is mid-retry;
    /// otherwise waits one hello retry window and checks again.
    pub fn scheduled_adj_lsa_build(&mut self, adjacencies: &AdjacencyList) -> Vec<LsdbUpdate> {
        if !adjacencies.is_adj_lsa_buildable(self.interest_retry_number) {
            debug!("Adjacencies still retrying, deferring adjacency LSA build by {:?}", self.hello_retry_window);
            let timer = self.scheduler.schedule(self.hello_retry_window, Event::BuildAdjLsa);
            self.adj_build = AdjBuildState::BuildScheduled(timer);
            return Vec::new();
        }

        self.adj_build = AdjBuildState::Idle;
        if self.adj_build_count == 0 {
            trace!("No pending adjacency change");
            return Vec::new();
        }
        self.adj_build_count = 0;

        if adjacencies.active_count() > 0 {
            self.build_and_install_own_adj_lsa(adjacencies)
        } else {
            info!("No active neighbor, removing own adjacency LSA");
            let this_router = self.this_router.clone();
            let mut updates = self.remove_adj_lsa(&this_router);
            updates.push(LsdbUpdate::RecalculateRoutes);
            updates
        }
    }

    pub fn is_adj_lsa_build_scheduled(&self) -> bool {
        matches!(self.adj_build, AdjBuildState::BuildScheduled(_))
    }

    pub fn adj_build_count(&self) -> u32 {
        self.adj_build_count
    }

    // ---- lookup ----

    pub fn does_lsa_exist(&self, origin: &Name, lsa_type: LsaType) -> bool {
        match lsa_type {
            LsaType::Name => self.name_lsas.contains_key(origin),
            LsaType::Adjacency => self.adj_lsas.contains_key(origin),
            LsaType::Coordinate => self.cor_lsas.contains_key(origin),
        }
    }

    pub fn get_name_lsa(&self, origin: &Name) -> Option<&NameLsa> {
        self.name_lsas.get(origin).map(|s| &s.lsa)
    }

    pub fn get_adj_lsa(&self, origin: &Name) -> Option<&AdjLsa> {
        self.adj_lsas.get(origin).map(|s| &s.lsa)
    }

    pub fn get_cor_lsa(&self, origin: &Name) -> Option<&CoordinateLsa> {
        self.cor_lsas.get(origin).map(|s| &s.lsa)
    }

    pub fn name_lsas(&self) -> impl Iterator<Item = &NameLsa> {
        self.name_lsas.values().map(|s| &s.lsa)
    }

    pub fn adj_lsas(&self) -> impl Iterator<Item = &AdjLsa> {
        self.adj_lsas.values().map(|s| &s.lsa)
    }

    pub fn cor_lsas(&self) -> impl Iterator<Item = &CoordinateLsa> {
        self.cor_lsas.values().map(|s| &s.lsa)
    }

    pub fn is_name_lsa_new(&self, origin: &Name, seq_no: u64) -> bool {
        self.name_lsas.get(origin).is_none_or(|s| seq_no > s.lsa.header.seq_no)
    }

    pub fn is_adj_lsa_new(&self, origin: &Name, seq_no: u64) -> bool {
        self.adj_lsas.get(origin).is_none_or(|s| seq_no > s.lsa.header.seq_no)
    }

    pub fn is_cor_lsa_new(&self, origin: &Name, seq_no: u64) -> bool {
        self.cor_lsas.get(origin).is_none_or(|s| seq_no > s.lsa.header.seq_no)
    }

    pub fn is_lsa_new(&self, key: &LsaKey, seq_no: u64) -> bool {
        match key.lsa_type {
            LsaType::Name => self.is_name_lsa_new(&key.origin_router, seq_no),
            LsaType::Adjacency => self.is_adj_lsa_new(&key.origin_router, seq_no),
            LsaType::Coordinate => self.is_cor_lsa_new(&key.origin_router, seq_no),
        }
    }

    fn stored_seq_no(&self, key: &LsaKey) -> Option<u64> {
        match key.lsa_type {
            LsaType::Name => self.get_name_lsa(&key.origin_router).map(|l| l.header.seq_no),
            LsaType::Adjacency => self.get_adj_lsa(&key.origin_router).map(|l| l.header.seq_no),
            LsaType::Coordinate => self.get_cor_lsa(&key.origin_router).map(|l| l.header.seq_no),
        }
    }

    // ---- helpers ----

    /// Own LSAs are refreshed every refresh interval; remote ones expire at
    /// their advertised expiration.
    fn arm_expiry(&self, lsa_type: LsaType, header: &LsaHeader) -> TimerHandle {
        let delay = if header.origin_router == self.this_router {
            self.lsa_refresh_time
        } else {
            (header.expiration - Utc::now()).to_std().unwrap_or(Duration::ZERO)
        };
        let key = LsaKey::new(header.origin_router.clone(), lsa_type);
        trace!("{} seq={} expires in {:?}", key, header.seq_no, delay);
        self.scheduler.schedule(
            delay,
            Event::ExpireLsa {
                key,
                seq_no: header.seq_no,
            },
        )
    }

    fn own_expiration(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.router_dead_interval)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn publish(&mut self, lsa_type: LsaType, seq_no: u64) {
        let prefix = self
            .lsa_prefix
            .clone()
            .append_name(&self.this_router)
            .append(lsa_type.as_str());
        self.sync.publish_update(&prefix, seq_no);
    }
}

impl fmt::Display for Lsdb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "---- Name LSDB ----")?;
        for lsa in self.name_lsas() {
            write!(f, "{}", lsa)?;
        }
        writeln!(f, "---- Adjacency LSDB ----")?;
        for lsa in self.adj_lsas() {
            write!(f, "{}", lsa)?;
        }
        writeln!(f, "---- Coordinate LSDB ----")?;
        for lsa in self.cor_lsas() {
            write!(f, "{}", lsa)?;
        }
        Ok(())
    }
}
