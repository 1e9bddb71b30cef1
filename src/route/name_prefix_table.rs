//! Name prefix table: maps every known name prefix to the routers that
//! advertise it and from there to forwarding next hops.
//!
//! Next hops are computed once per destination router and shared through a
//! pool. Name entries and pool entries refer to each other by key only: an
//! entry lists its destinations, a pool entry lists the names using it, and
//! a pool entry is dropped as soon as no name uses it.

use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::fib::Fib;
use super::nexthop::NexthopList;
use super::routing_table::RoutingTable;
use crate::name::Name;

#[derive(Debug, Clone)]
pub struct NamePrefixTableEntry {
    pub name_prefix: Name,
    /// Destination router -> number of LSAs contributing the association.
    pub destinations: BTreeMap<Name, u32>,
    /// Next hops currently installed in the FIB for this prefix.
    pub next_hops: NexthopList,
}

impl NamePrefixTableEntry {
    fn new(name_prefix: Name) -> Self {
        Self {
            name_prefix,
            destinations: BTreeMap::new(),
            next_hops: NexthopList::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutingTablePoolEntry {
    pub destination: Name,
    pub next_hops: NexthopList,
    pub referenced_by: BTreeSet<Name>,
}

pub struct NamePrefixTable {
    entries: BTreeMap<Name, NamePrefixTableEntry>,
    pool: BTreeMap<Name, RoutingTablePoolEntry>,
    fib: Box<dyn Fib>,
    max_faces_per_prefix: usize,
}

impl NamePrefixTable {
    pub fn new(fib: Box<dyn Fib>, max_faces_per_prefix: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            pool: BTreeMap::new(),
            fib,
            max_faces_per_prefix,
        }
    }

    /// Records that `name` is reachable through `destination`. The pool entry
    /// of a new destination is seeded from `routing_table`.
    pub fn add_entry(&mut self, name: &Name, destination: &Name, routing_table: &RoutingTable) {
        let entry = self
            .entries
            .entry(name.clone())
            .or_insert_with(|| NamePrefixTableEntry::new(name.clone()));
        let count = entry.destinations.entry(destination.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            trace!("{} -> {} now has {} contributions", name, destination, count);
            return;
        }

        let pool_entry = self.pool.entry(destination.clone()).or_insert_with(|| RoutingTablePoolEntry {
            destination: destination.clone(),
            next_hops: routing_table
                .find_entry(destination)
                .map(|e| e.next_hops.clone())
                .unwrap_or_default(),
            referenced_by: BTreeSet::new(),
        });
        pool_entry.referenced_by.insert(name.clone());
        debug!("Added {} -> {} to name prefix table", name, destination);

        sync_fib(entry, &self.pool, self.fib.as_mut(), self.max_faces_per_prefix);
    }

    /// Retracts one contribution of `name -> destination`; the association
    /// disappears with its last contribution.
    pub fn remove_entry(&mut self, name: &Name, destination: &Name) {
        let Some(entry) = self.entries.get_mut(name) else {
            trace!("{} is not in the name prefix table", name);
            return;
        };
        let Some(count) = entry.destinations.get_mut(destination) else {
            trace!("{} is not routed through {}", name, destination);
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }
        entry.destinations.remove(destination);

        if let Some(pool_entry) = self.pool.get_mut(destination) {
            pool_entry.referenced_by.remove(name);
            if pool_entry.referenced_by.is_empty() {
                debug!("Dropping unreferenced pool entry {}", destination);
                self.pool.remove(destination);
            }
        }
        debug!("Removed {} -> {} from name prefix table", name, destination);

        if entry.destinations.is_empty() {
            if !entry.next_hops.is_empty() {
                self.fib.remove(name);
            }
            self.entries.remove(name);
        } else {
            sync_fib(entry, &self.pool, self.fib.as_mut(), self.max_faces_per_prefix);
        }
    }

    /// Refreshes every pool entry from a freshly calculated routing table and
    /// reprograms the prefixes whose next hops changed.
    pub fn update_with_new_route(&mut self, routing_table: &RoutingTable) {
        debug!("Updating name prefix table with new routes");
        for pool_entry in self.pool.values_mut() {
            pool_entry.next_hops = routing_table
                .find_entry(&pool_entry.destination)
                .map(|e| e.next_hops.clone())
                .unwrap_or_default();
        }
        for entry in self.entries.values_mut() {
            sync_fib(entry, &self.pool, self.fib.as_mut(), self.max_faces_per_prefix);
        }
    }

    pub fn get(&self, name: &Name) -> Option<&NamePrefixTableEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &Name, destination: &Name) -> bool {
        self.entries
            .get(name)
            .is_some_and(|e| e.destinations.contains_key(destination))
    }

    pub fn entries(&self) -> impl Iterator<Item = &NamePrefixTableEntry> {
        self.entries.values()
    }

    pub fn pool(&self) -> impl Iterator<Item = &RoutingTablePoolEntry> {
        self.pool.values()
    }

    pub fn pool_entry(&self, destination: &Name) -> Option<&RoutingTablePoolEntry> {
        self.pool.get(destination)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merges the next hops of every destination of `entry` and pushes the
/// result to the FIB when it differs from what is installed.
fn sync_fib(
    entry: &mut NamePrefixTableEntry,
    pool: &BTreeMap<Name, RoutingTablePoolEntry>,
    fib: &mut dyn Fib,
    max_faces_per_prefix: usize,
) {
    let mut merged = NexthopList::new();
    for destination in entry.destinations.keys() {
        if let Some(pool_entry) = pool.get(destination) {
            for hop in &pool_entry.next_hops {
                merged.add(hop.clone());
            }
        }
    }
    let next_hops = merged.truncated(max_faces_per_prefix);
    if next_hops == entry.next_hops {
        return;
    }
    if next_hops.is_empty() {
        fib.remove(&entry.name_prefix);
    } else {
        fib.update(&entry.name_prefix, &next_hops);
    }
    entry.next_hops = next_hops;
}

impl fmt::Display for NamePrefixTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in self.entries.values() {
            let destinations: Vec<String> = entry.destinations.keys().map(ToString::to_string).collect();
            writeln!(f, "  {} via [{}]", entry.name_prefix, destinations.join(", "))?;
            write!(f, "{}", entry.next_hops)?;
        }
        for pool_entry in self.pool.values() {
            writeln!(
                f,
                "  pool {} ({} hops, {} users)",
                pool_entry.destination,
                pool_entry.next_hops.len(),
                pool_entry.referenced_by.len()
            )?;
        }
        Ok(())
    }
}
