use log::info;

use super::nexthop::NexthopList;
use crate::name::Name;

/// Forwarding-plane programming used by the name prefix table.
pub trait Fib {
    fn update(&mut self, name: &Name, next_hops: &NexthopList);
    fn remove(&mut self, name: &Name);
}

/// Logs every change instead of programming a forwarder.
#[derive(Debug, Default)]
pub struct LoggingFib;

impl Fib for LoggingFib {
    fn update(&mut self, name: &Name, next_hops: &NexthopList) {
        let faces: Vec<String> = next_hops
            .iter()
            .map(|h| format!("{}({})", h.face_uri, h.route_cost))
            .collect();
        info!("FIB update {} -> [{}]", name, faces.join(", "));
    }

    fn remove(&mut self, name: &Name) {
        info!("FIB remove {}", name);
    }
}
