use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextHop {
    pub face_uri: String,
    pub route_cost: f64,
    pub is_hyperbolic: bool,
}

impl NextHop {
    pub fn new(face_uri: impl Into<String>, route_cost: f64) -> Self {
        Self {
            face_uri: face_uri.into(),
            route_cost,
            is_hyperbolic: false,
        }
    }

    pub fn hyperbolic(face_uri: impl Into<String>, route_cost: f64) -> Self {
        Self {
            is_hyperbolic: true,
            ..Self::new(face_uri, route_cost)
        }
    }

    fn order(&self, other: &NextHop) -> Ordering {
        self.route_cost
            .total_cmp(&other.route_cost)
            .then_with(|| self.face_uri.cmp(&other.face_uri))
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NextHop(uri={}, cost={})", self.face_uri, self.route_cost)
    }
}

/// Next hops of one destination: at most one per face, cheapest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NexthopList {
    hops: Vec<NextHop>,
}

impl NexthopList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hop through an already known face only replaces it when cheaper.
    pub fn add(&mut self, hop: NextHop) {
        if let Some(index) = self.hops.iter().position(|h| h.face_uri == hop.face_uri) {
            if hop.route_cost >= self.hops[index].route_cost {
                return;
            }
            self.hops.remove(index);
        }
        let at = self.hops.partition_point(|h| h.order(&hop) != Ordering::Greater);
        self.hops.insert(at, hop);
    }

    pub fn remove(&mut self, face_uri: &str) -> bool {
        let before = self.hops.len();
        self.hops.retain(|h| h.face_uri != face_uri);
        self.hops.len() != before
    }

    /// The `max` cheapest hops; 0 keeps them all.
    pub fn truncated(&self, max: usize) -> NexthopList {
        let keep = if max == 0 { self.hops.len() } else { max.min(self.hops.len()) };
        Self {
            hops: self.hops[..keep].to_vec(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NextHop> {
        self.hops.iter()
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn clear(&mut self) {
        self.hops.clear();
    }
}

impl<'a> IntoIterator for &'a NexthopList {
    type Item = &'a NextHop;
    type IntoIter = std::slice::Iter<'a, NextHop>;

    fn into_iter(self) -> Self::IntoIter {
        self.hops.iter()
    }
}

impl FromIterator<NextHop> for NexthopList {
    fn from_iter<I: IntoIterator<Item = NextHop>>(iter: I) -> Self {
        let mut list = NexthopList::new();
        for hop in iter {
            list.add(hop);
        }
        list
    }
}

impl fmt::Display for NexthopList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hop in &self.hops {
            writeln!(f, "    {}", hop)?;
        }
        Ok(())
    }
}
