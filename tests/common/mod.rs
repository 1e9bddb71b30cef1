#![allow(dead_code)]

use chrono::Utc;
use std::cell::RefCell;
use std::rc::Rc;
use tempfile::TempDir;

use nlsrd::config::NeighborConfig;
use nlsrd::lsa::{AdjLsa, NameLsa};
use nlsrd::network::{AdjacencyList, AdjacencyStatus, Adjacent};
use nlsrd::route::{Fib, NexthopList};
use nlsrd::sync::SyncPublisher;
use nlsrd::{Name, Router, RouterConfig};

#[derive(Debug, Clone, PartialEq)]
pub enum FibCall {
    Update(Name, Vec<(String, f64)>),
    Remove(Name),
}

#[derive(Clone, Default)]
pub struct RecordingFib(pub Rc<RefCell<Vec<FibCall>>>);

impl RecordingFib {
    pub fn calls_for(&self, name: &str) -> Vec<FibCall> {
        let name = Name::from(name);
        self.0
            .borrow()
            .iter()
            .filter(|call| match call {
                FibCall::Update(n, _) | FibCall::Remove(n) => *n == name,
            })
            .cloned()
            .collect()
    }
}

impl Fib for RecordingFib {
    fn update(&mut self, name: &Name, next_hops: &NexthopList) {
        let hops = next_hops.iter().map(|h| (h.face_uri.clone(), h.route_cost)).collect();
        self.0.borrow_mut().push(FibCall::Update(name.clone(), hops));
    }

    fn remove(&mut self, name: &Name) {
        self.0.borrow_mut().push(FibCall::Remove(name.clone()));
    }
}

#[derive(Clone, Default)]
pub struct RecordingPublisher(pub Rc<RefCell<Vec<(Name, u64)>>>);

impl SyncPublisher for RecordingPublisher {
    fn publish_update(&mut self, prefix: &Name, seq_no: u64) {
        self.0.borrow_mut().push((prefix.clone(), seq_no));
    }
}

pub struct TestRouter {
    pub router: Router,
    pub fib: RecordingFib,
    pub published: RecordingPublisher,
    pub dir: TempDir,
}

pub fn config(dir: &TempDir) -> RouterConfig {
    let mut config = RouterConfig::default();
    config.router = "r1".to_string();
    config.seq_file_dir = dir.path().to_path_buf();
    config.neighbors = vec![
        NeighborConfig {
            name: Name::from("/ndn/site/r2"),
            face_uri: "udp4://10.0.0.2".to_string(),
            link_cost: 10.0,
        },
        NeighborConfig {
            name: Name::from("/ndn/site/r3"),
            face_uri: "udp4://10.0.0.3".to_string(),
            link_cost: 20.0,
        },
    ];
    config
}

pub fn router_with(config: RouterConfig, dir: TempDir) -> TestRouter {
    let fib = RecordingFib::default();
    let published = RecordingPublisher::default();
    let router = Router::new(config, Box::new(published.clone()), Box::new(fib.clone()));
    TestRouter {
        router,
        fib,
        published,
        dir,
    }
}

pub fn router() -> TestRouter {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    router_with(config, dir)
}

pub fn name_lsa(origin: &str, seq_no: u64, prefixes: &[&str]) -> NameLsa {
    NameLsa::new(
        Name::from(origin),
        seq_no,
        Utc::now() + chrono::Duration::hours(1),
        prefixes.iter().map(|p| Name::from(*p)).collect(),
    )
}

pub fn adj_lsa(origin: &str, seq_no: u64, links: &[(&str, f64)]) -> AdjLsa {
    let adjacencies: AdjacencyList = links
        .iter()
        .map(|(name, cost)| {
            Adjacent::new(Name::from(*name), format!("udp4:/{}", name), *cost).with_status(AdjacencyStatus::Active)
        })
        .collect();
    AdjLsa::new(Name::from(origin), seq_no, Utc::now() + chrono::Duration::hours(1), &adjacencies)
}

pub fn later(secs: u64) -> tokio::time::Instant {
    tokio::time::Instant::now() + std::time::Duration::from_secs(secs)
}

/// r1 (this router) links to r2 at cost 10 and r3 at cost 20; r2 and r3
/// link to each other at cost 5. Leaves the router with a calculated table.
pub fn three_router_topology(t: &mut TestRouter) {
    let r2 = Name::from("/ndn/site/r2");
    let r3 = Name::from("/ndn/site/r3");
    t.router.start();
    t.router.set_neighbor_status(&r2, AdjacencyStatus::Active);
    t.router.set_neighbor_status(&r3, AdjacencyStatus::Active);
    t.router.process_due(later(11));

    t.router
        .install_adj_lsa(adj_lsa("/ndn/site/r2", 1, &[("/ndn/site/r1", 10.0), ("/ndn/site/r3", 5.0)]));
    t.router
        .install_adj_lsa(adj_lsa("/ndn/site/r3", 1, &[("/ndn/site/r1", 20.0), ("/ndn/site/r2", 5.0)]));
    t.router.process_due(later(16));
}

/// Every name entry and pool entry point at each other, and pool next hops
/// match the current routing table.
pub fn assert_npt_consistent(router: &Router) {
    let npt = router.npt();
    for pool_entry in npt.pool() {
        assert!(!pool_entry.referenced_by.is_empty(), "{} has no users", pool_entry.destination);
        for name in &pool_entry.referenced_by {
            assert!(npt.contains(name, &pool_entry.destination));
        }
        let expected = router
            .routing_table()
            .find_entry(&pool_entry.destination)
            .map(|e| e.next_hops.clone())
            .unwrap_or_default();
        assert_eq!(pool_entry.next_hops, expected);
    }
    for entry in npt.entries() {
        for destination in entry.destinations.keys() {
            let pool_entry = npt.pool_entry(destination).unwrap();
            assert!(pool_entry.referenced_by.contains(&entry.name_prefix));
        }
    }
}
