//! Routing calculators. Both are pure: they read LSAs and the adjacency list
//! and return `(destination, next hop)` pairs for the routing table.

pub mod dijkstra;
pub mod hyperbolic;
