use log::{trace, warn};
use std::f64::consts::PI;

use crate::lsa::CoordinateLsa;
use crate::name::Name;
use crate::network::AdjacencyList;
use crate::route::map::Map;
use crate::route::nexthop::NextHop;

/// Distance that cannot be computed from the available coordinates.
pub const UNKNOWN_DISTANCE: f64 = -1.0;

/// Angular distances below this are treated as the same direction.
const ANGLE_EPSILON: f64 = 1e-6;

/// Angle between two points of the unit n-sphere given in spherical
/// coordinates. All angles but the last lie in [0, pi], the last in
/// [0, 2 pi].
pub fn angular_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        warn!("Angle vectors of sizes {} and {} cannot be compared", a.len(), b.len());
        return UNKNOWN_DISTANCE;
    }
    if !angles_in_range(a) || !angles_in_range(b) {
        warn!("Hyperbolic angle out of range in {:?} or {:?}", a, b);
        return UNKNOWN_DISTANCE;
    }
    let last = a.len() - 1;

    let mut xn_a = a[last].sin();
    let mut xn_b = b[last].sin();
    for k in 0..last {
        xn_a *= a[k].sin();
        xn_b *= b[k].sin();
    }
    let mut inner_product = a[0].cos() * b[0].cos() + xn_a * xn_b;

    for m in 1..a.len() {
        let mut xm_a = a[m].cos();
        let mut xm_b = b[m].cos();
        for l in 0..m {
            xm_a *= a[l].sin();
            xm_b *= b[l].sin();
        }
        inner_product += xm_a * xm_b;
    }

    inner_product.clamp(-1.0, 1.0).acos()
}

fn angles_in_range(angles: &[f64]) -> bool {
    let last = angles.len() - 1;
    angles[..last].iter().all(|t| (0.0..=PI).contains(t)) && (0.0..=2.0 * PI).contains(&angles[last])
}

/// Hyperbolic law of cosines with curvature 1.
pub fn hyperbolic_distance(r1: f64, r2: f64, delta_theta: f64) -> f64 {
    if delta_theta == UNKNOWN_DISTANCE || r1 < 0.0 || r2 < 0.0 {
        return UNKNOWN_DISTANCE;
    }
    if delta_theta.abs() < ANGLE_EPSILON {
        return (r1 - r2).abs();
    }
    let arg = r1.cosh() * r2.cosh() - r1.sinh() * r2.sinh() * delta_theta.cos();
    arg.max(1.0).acosh()
}

/// Distance between two routers' advertised coordinates.
pub fn distance_between(src: Option<&CoordinateLsa>, dest: Option<&CoordinateLsa>) -> f64 {
    let (Some(src), Some(dest)) = (src, dest) else {
        return UNKNOWN_DISTANCE;
    };
    let delta = angular_distance(&src.angles, &dest.angles);
    let distance = hyperbolic_distance(src.radius, dest.radius, delta);
    trace!(
        "Hyperbolic distance {} -> {} is {}",
        src.header.origin_router, dest.header.origin_router, distance
    );
    distance
}

/// Hyperbolic next hops through every active neighbor.
///
/// A neighbor is its own next hop at cost 0; every other router in `map` is
/// reached through each neighbor at the neighbor's distance to it.
pub fn calculate_paths<'a>(
    map: &Map,
    this_router: &Name,
    adjacencies: &AdjacencyList,
    coordinates: impl Fn(&Name) -> Option<&'a CoordinateLsa>,
) -> Vec<(Name, NextHop)> {
    let this_index = map.index_of(this_router);
    let mut routes = Vec::new();

    for neighbor in adjacencies.iter().filter(|a| a.is_active()) {
        if &neighbor.name == this_router {
            continue;
        }
        routes.push((neighbor.name.clone(), NextHop::hyperbolic(neighbor.face_uri.clone(), 0.0)));

        let Some(src_index) = map.index_of(&neighbor.name) else {
            warn!("{} does not exist in the router map", neighbor.name);
            continue;
        };
        let Some(this_index) = this_index else {
            continue;
        };

        for dest_index in (0..map.len()).filter(|&d| d != this_index && d != src_index) {
            let Some(dest) = map.name_of(dest_index) else {
                continue;
            };
            let distance = distance_between(coordinates(&neighbor.name), coordinates(dest));
            if distance == UNKNOWN_DISTANCE {
                warn!("Could not calculate hyperbolic distance from {} to {}", neighbor.name, dest);
                continue;
            }
            routes.push((dest.clone(), NextHop::hyperbolic(neighbor.face_uri.clone(), distance)));
        }
    }
    routes
}
