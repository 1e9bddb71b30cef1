pub mod adjacency;
pub mod prefix_list;

pub use adjacency::{AdjacencyList, AdjacencyStatus, Adjacent};
pub use prefix_list::NamePrefixList;
