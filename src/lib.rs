pub mod algorithms;
pub mod config;
pub mod lsa;
pub mod lsdb;
pub mod name;
pub mod network;
pub mod route;
pub mod router;
pub mod scheduler;
pub mod sequencing;
pub mod sync;
pub mod tlv;

pub use config::RouterConfig;
pub use lsdb::{Lsdb, LsdbUpdate};
pub use name::Name;
pub use router::{Router, RouterCommand};
