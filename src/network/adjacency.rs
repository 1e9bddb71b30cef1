use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::name::Name;
use crate::tlv::{types, Block, DecodeError, Encoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjacencyStatus {
    Active,
    Inactive,
}

/// A directly connected neighbor router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adjacent {
    pub name: Name,
    pub face_uri: String,
    pub link_cost: f64,
    pub status: AdjacencyStatus,
    /// Face of the forwarder reaching this neighbor, 0 when none is open.
    pub face_id: u64,
    pub interest_timed_out: u32,
}

impl Adjacent {
    pub fn new(name: Name, face_uri: impl Into<String>, link_cost: f64) -> Self {
        Self {
            name,
            face_uri: face_uri.into(),
            link_cost,
            status: AdjacencyStatus::Inactive,
            face_id: 0,
            interest_timed_out: 0,
        }
    }

    pub fn with_status(mut self, status: AdjacencyStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AdjacencyStatus::Active
    }

    /// Active, or inactive with the hello retry budget spent.
    pub fn is_settled(&self, retry_limit: u32) -> bool {
        self.is_active() || self.interest_timed_out >= retry_limit
    }

    /// `Adjacency := 132 { Name | 141 uri | 134 cost }`
    pub fn wire_encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.append_encoded(&self.name.wire_encode())
            .append_str(types::URI, &self.face_uri)
            .append_f64(types::COST_DOUBLE, self.link_cost);
        enc.finish(types::ADJACENCY)
    }

    /// Decoded adjacencies are always active: only active neighbors are advertised.
    pub fn wire_decode(block: Block<'_>) -> Result<Self, DecodeError> {
        let block = block.expect_type(types::ADJACENCY)?;
        let mut elements = block.elements();
        let name = Name::wire_decode(elements.expect_block(types::NAME, "Adjacency.Name")?)?;
        let face_uri = elements.expect_block(types::URI, "Adjacency.Uri")?.as_str()?.to_string();
        let link_cost = elements.expect_block(types::COST_DOUBLE, "Adjacency.Cost")?.as_f64()?;
        elements.expect_end()?;
        Ok(Self::new(name, face_uri, link_cost).with_status(AdjacencyStatus::Active))
    }
}

/// Timing counters, status and face id are runtime state, not identity.
impl PartialEq for Adjacent {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.face_uri == other.face_uri && self.link_cost == other.link_cost
    }
}

impl fmt::Display for Adjacent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Adjacent(name={}, uri={}, cost={}, status={:?}, face={}, timeouts={})",
            self.name, self.face_uri, self.link_cost, self.status, self.face_id, self.interest_timed_out
        )
    }
}

/// The router's direct neighbors, unique by name, in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdjacencyList {
    adjacencies: Vec<Adjacent>,
}

impl AdjacencyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when a neighbor with the same name is already present.
    pub fn insert(&mut self, adjacent: Adjacent) -> bool {
        if self.contains(&adjacent.name) {
            debug!("Neighbor {} already in adjacency list", adjacent.name);
            return false;
        }
        self.adjacencies.push(adjacent);
        true
    }

    pub fn remove(&mut self, name: &Name) -> Option<Adjacent> {
        let index = self.adjacencies.iter().position(|a| &a.name == name)?;
        Some(self.adjacencies.remove(index))
    }

    pub fn get(&self, name: &Name) -> Option<&Adjacent> {
        self.adjacencies.iter().find(|a| &a.name == name)
    }

    pub fn get_mut(&mut self, name: &Name) -> Option<&mut Adjacent> {
        self.adjacencies.iter_mut().find(|a| &a.name == name)
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.get(name).is_some()
    }

    pub fn find_by_face_id(&self, face_id: u64) -> Option<&Adjacent> {
        self.adjacencies.iter().find(|a| a.face_id != 0 && a.face_id == face_id)
    }

    pub fn find_by_face_uri(&self, face_uri: &str) -> Option<&Adjacent> {
        self.adjacencies.iter().find(|a| a.face_uri == face_uri)
    }

    pub fn status_of(&self, name: &Name) -> Option<AdjacencyStatus> {
        self.get(name).map(|a| a.status)
    }

    /// Returns true when the status actually changed.
    pub fn set_status(&mut self, name: &Name, status: AdjacencyStatus) -> bool {
        match self.get_mut(name) {
            Some(adjacent) if adjacent.status != status => {
                adjacent.status = status;
                true
            }
            _ => false,
        }
    }

    pub fn timed_out_interest_count(&self, name: &Name) -> Option<u32> {
        self.get(name).map(|a| a.interest_timed_out)
    }

    /// Returns the new count, or `None` for an unknown neighbor.
    pub fn increment_timed_out_interest_count(&mut self, name: &Name) -> Option<u32> {
        let adjacent = self.get_mut(name)?;
        adjacent.interest_timed_out = adjacent.interest_timed_out.saturating_add(1);
        Some(adjacent.interest_timed_out)
    }

    /// Returns true when the count actually changed.
    pub fn set_timed_out_interest_count(&mut self, name: &Name, count: u32) -> bool {
        match self.get_mut(name) {
            Some(adjacent) if adjacent.interest_timed_out != count => {
                adjacent.interest_timed_out = count;
                true
            }
            _ => false,
        }
    }

    pub fn set_link_cost(&mut self, name: &Name, link_cost: f64) -> bool {
        match self.get_mut(name) {
            Some(adjacent) => {
                adjacent.link_cost = link_cost;
                true
            }
            None => false,
        }
    }

    pub fn set_face_id(&mut self, name: &Name, face_id: u64) -> bool {
        match self.get_mut(name) {
            Some(adjacent) => {
                adjacent.face_id = face_id;
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.adjacencies.iter().filter(|a| a.is_active()).count()
    }

    /// True when no neighbor is in the middle of its hello retries.
    pub fn is_adj_lsa_buildable(&self, retry_limit: u32) -> bool {
        self.adjacencies.iter().all(|a| a.is_settled(retry_limit))
    }

    pub fn active_only(&self) -> AdjacencyList {
        Self {
            adjacencies: self.adjacencies.iter().filter(|a| a.is_active()).cloned().collect(),
        }
    }

    /// Order-insensitive comparison of the advertised content.
    pub fn is_equal_content(&self, other: &AdjacencyList) -> bool {
        self.len() == other.len() && self.adjacencies.iter().all(|a| other.get(&a.name).is_some_and(|b| a == b))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Adjacent> {
        self.adjacencies.iter()
    }

    pub fn len(&self) -> usize {
        self.adjacencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacencies.is_empty()
    }
}

impl FromIterator<Adjacent> for AdjacencyList {
    fn from_iter<I: IntoIterator<Item = Adjacent>>(iter: I) -> Self {
        let mut list = AdjacencyList::new();
        for adjacent in iter {
            list.insert(adjacent);
        }
        list
    }
}

impl<'a> IntoIterator for &'a AdjacencyList {
    type Item = &'a Adjacent;
    type IntoIter = std::slice::Iter<'a, Adjacent>;

    fn into_iter(self) -> Self::IntoIter {
        self.adjacencies.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbor(name: &str, status: AdjacencyStatus, timeouts: u32) -> Adjacent {
        let mut adj = Adjacent::new(Name::from(name), format!("udp4://{}", name.trim_start_matches('/')), 10.0)
            .with_status(status);
        adj.interest_timed_out = timeouts;
        adj
    }

    #[test]
    fn test_unique_by_name() {
        let mut list = AdjacencyList::new();
        assert!(list.insert(neighbor("/r1", AdjacencyStatus::Active, 0)));
        assert!(!list.insert(neighbor("/r1", AdjacencyStatus::Inactive, 0)));
        assert_eq!(list.len(), 1);
        assert_eq!(list.status_of(&Name::from("/r1")), Some(AdjacencyStatus::Active));
    }

    #[test]
    fn test_equality_ignores_runtime_state() {
        let a = neighbor("/r1", AdjacencyStatus::Active, 0);
        let mut b = neighbor("/r1", AdjacencyStatus::Inactive, 3);
        b.face_id = 42;
        assert_eq!(a, b);
        b.link_cost = 11.0;
        assert_ne!(a, b);
    }

    #[test]
    fn test_buildable_when_all_settled() {
        let list: AdjacencyList = vec![
            neighbor("/r1", AdjacencyStatus::Active, 0),
            neighbor("/r2", AdjacencyStatus::Inactive, 3),
        ]
        .into_iter()
        .collect();
        assert!(list.is_adj_lsa_buildable(3));
        assert_eq!(list.active_count(), 1);
    }

    #[test]
    fn test_not_buildable_mid_retry() {
        let list: AdjacencyList = vec![neighbor("/r1", AdjacencyStatus::Inactive, 1)].into_iter().collect();
        assert!(!list.is_adj_lsa_buildable(3));
    }

    #[test]
    fn test_set_status_reports_flip() {
        let mut list: AdjacencyList = vec![neighbor("/r1", AdjacencyStatus::Inactive, 0)].into_iter().collect();
        let r1 = Name::from("/r1");
        assert!(list.set_status(&r1, AdjacencyStatus::Active));
        assert!(!list.set_status(&r1, AdjacencyStatus::Active));
        assert!(!list.set_status(&Name::from("/unknown"), AdjacencyStatus::Active));
    }

    #[test]
    fn test_timed_out_counter() {
        let mut list: AdjacencyList = vec![neighbor("/r1", AdjacencyStatus::Active, 0)].into_iter().collect();
        let r1 = Name::from("/r1");
        assert_eq!(list.increment_timed_out_interest_count(&r1), Some(1));
        assert_eq!(list.increment_timed_out_interest_count(&r1), Some(2));
        assert!(list.set_timed_out_interest_count(&r1, 0));
        assert_eq!(list.timed_out_interest_count(&r1), Some(0));
        assert_eq!(list.increment_timed_out_interest_count(&Name::from("/r9")), None);
    }

    #[test]
    fn test_content_equality_is_order_insensitive() {
        let a: AdjacencyList = vec![
            neighbor("/r1", AdjacencyStatus::Active, 0),
            neighbor("/r2", AdjacencyStatus::Active, 0),
        ]
        .into_iter()
        .collect();
        let b: AdjacencyList = vec![
            neighbor("/r2", AdjacencyStatus::Active, 0),
            neighbor("/r1", AdjacencyStatus::Active, 0),
        ]
        .into_iter()
        .collect();
        assert!(a.is_equal_content(&b));
        assert!(!a.is_equal_content(&a.active_only().iter().take(1).cloned().collect()));
    }

    #[test]
    fn test_wire_round_trip() {
        let adj = neighbor("/ndn/site/r1", AdjacencyStatus::Active, 0);
        let wire = adj.wire_encode();
        let decoded = Adjacent::wire_decode(crate::tlv::decode_single(&wire, types::ADJACENCY).unwrap()).unwrap();
        assert_eq!(decoded, adj);
        assert!(decoded.is_active());
    }
}
