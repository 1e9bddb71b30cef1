pub mod fib;
pub mod map;
pub mod name_prefix_table;
pub mod nexthop;
pub mod routing_table;

pub use fib::{Fib, LoggingFib};
pub use map::Map;
pub use name_prefix_table::{NamePrefixTable, NamePrefixTableEntry, RoutingTablePoolEntry};
pub use nexthop::{NextHop, NexthopList};
pub use routing_table::{RoutingTable, RoutingTableEntry};
