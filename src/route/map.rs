use log::debug;
use std::collections::HashMap;
use std::fmt;

use crate::lsa::{AdjLsa, CoordinateLsa};
use crate::name::Name;

/// Dense numbering of the routers known to one routing calculation.
#[derive(Debug, Clone, Default)]
pub struct Map {
    names: Vec<Name>,
    indices: HashMap<Name, usize>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each origin router, then each router it lists, first seen first numbered.
    pub fn from_adj_lsas<'a>(lsas: impl IntoIterator<Item = &'a AdjLsa>) -> Self {
        let mut map = Map::new();
        for lsa in lsas {
            map.add(&lsa.header.origin_router);
            for adjacent in &lsa.adjacencies {
                map.add(&adjacent.name);
            }
        }
        debug!("Built router map with {} entries", map.len());
        map
    }

    pub fn from_coordinate_lsas<'a>(lsas: impl IntoIterator<Item = &'a CoordinateLsa>) -> Self {
        let mut map = Map::new();
        for lsa in lsas {
            map.add(&lsa.header.origin_router);
        }
        map
    }

    /// Returns the index of `router`, numbering it if it is new.
    pub fn add(&mut self, router: &Name) -> usize {
        if let Some(index) = self.indices.get(router) {
            return *index;
        }
        let index = self.names.len();
        self.names.push(router.clone());
        self.indices.insert(router.clone(), index);
        index
    }

    pub fn index_of(&self, router: &Name) -> Option<usize> {
        self.indices.get(router).copied()
    }

    pub fn name_of(&self, index: usize) -> Option<&Name> {
        self.names.get(index)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, name) in self.names.iter().enumerate() {
            writeln!(f, "  {} -> {}", index, name)?;
        }
        Ok(())
    }
}
