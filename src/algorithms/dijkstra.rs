use log::{debug, log_enabled, trace, warn, Level};

use crate::lsa::AdjLsa;
use crate::name::Name;
use crate::network::AdjacencyList;
use crate::route::map::Map;
use crate::route::nexthop::NextHop;

/// Matrix value of a missing link; real links cost more than this.
pub const NON_ADJACENT_COST: f64 = 0.0;

fn is_link(cost: f64) -> bool {
    cost > NON_ADJACENT_COST
}

/// Dense link-cost matrix indexed by [`Map`] numbers.
#[derive(Debug, Clone)]
pub struct AdjacencyMatrix {
    size: usize,
    costs: Vec<f64>,
}

impl AdjacencyMatrix {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            costs: vec![NON_ADJACENT_COST; size * size],
        }
    }

    /// Fills the matrix from every adjacency LSA and reconciles links whose
    /// two directions disagree.
    pub fn from_adj_lsas<'a>(map: &Map, lsas: impl IntoIterator<Item = &'a AdjLsa>) -> Self {
        let mut matrix = Self::new(map.len());
        for lsa in lsas {
            let Some(row) = map.index_of(&lsa.header.origin_router) else {
                continue;
            };
            for adjacent in &lsa.adjacencies {
                if let Some(col) = map.index_of(&adjacent.name) {
                    matrix.set(row, col, adjacent.link_cost);
                }
            }
        }
        matrix.correct_asymmetric_links();
        matrix
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.costs[row * self.size + col]
    }

    pub fn set(&mut self, row: usize, col: usize, cost: f64) {
        self.costs[row * self.size + col] = cost;
    }

    /// Both directions of a link take the larger cost when both are up;
    /// a link missing in one direction is broken in both.
    pub fn correct_asymmetric_links(&mut self) {
        for row in 0..self.size {
            for col in (row + 1)..self.size {
                let to = self.get(row, col);
                let from = self.get(col, row);
                if to == from {
                    continue;
                }
                let corrected = if is_link(to) && is_link(from) {
                    to.max(from)
                } else {
                    NON_ADJACENT_COST
                };
                warn!(
                    "Cost between [{}][{}] and [{}][{}] differ ({} != {}), correcting to {}",
                    row, col, col, row, to, from, corrected
                );
                self.set(row, col, corrected);
                self.set(col, row, corrected);
            }
        }
    }

    /// Outgoing links of `source` as (neighbor index, cost).
    pub fn links_of(&self, source: usize) -> Vec<(usize, f64)> {
        (0..self.size)
            .filter(|&col| col != source && is_link(self.get(source, col)))
            .map(|col| (col, self.get(source, col)))
            .collect()
    }

    /// Leaves `link` as the only outgoing link of `source`.
    pub fn isolate_link(&mut self, source: usize, link: usize, cost: f64) {
        for col in 0..self.size {
            let value = if col == link { cost } else { NON_ADJACENT_COST };
            self.set(source, col, value);
        }
    }

    fn log(&self, map: &Map) {
        if !log_enabled!(Level::Trace) {
            return;
        }
        trace!("Adjacency matrix legend:\n{}", map);
        for row in 0..self.size {
            let line: Vec<String> = (0..self.size).map(|col| self.get(row, col).to_string()).collect();
            trace!("{}| {}", row, line.join(" "));
        }
    }
}

/// Result of one single-source run.
#[derive(Debug, Clone)]
pub struct ShortestPaths {
    pub distance: Vec<f64>,
    pub parent: Vec<Option<usize>>,
}

impl ShortestPaths {
    /// First router after `source` on the path to `dest`, if `dest` is reachable.
    pub fn next_hop(&self, dest: usize, source: usize) -> Option<usize> {
        let mut next_hop = None;
        let mut current = dest;
        while let Some(parent) = self.parent[current] {
            next_hop = Some(current);
            current = parent;
        }
        if current != source {
            return None;
        }
        next_hop
    }
}

/// Array-based Dijkstra. After each settled node the unexplored part of the
/// queue is re-sorted by distance with a swap sort, so among equal distances
/// the order of the previous pass decides which node settles first.
pub fn shortest_paths(matrix: &AdjacencyMatrix, source: usize) -> ShortestPaths {
    let n = matrix.size();
    let mut distance = vec![f64::INFINITY; n];
    let mut parent = vec![None; n];
    let mut queue: Vec<usize> = (0..n).collect();

    if source >= n {
        return ShortestPaths { distance, parent };
    }

    distance[source] = 0.0;
    sort_queue_by_distance(&mut queue, &distance, 0);

    let mut head = 0;
    while head < n {
        let u = queue[head];
        if distance[u] == f64::INFINITY {
            break;
        }
        for v in 0..n {
            let cost = matrix.get(u, v);
            if is_link(cost) && queue[head + 1..].contains(&v) && distance[u] + cost < distance[v] {
                distance[v] = distance[u] + cost;
                parent[v] = Some(u);
            }
        }
        head += 1;
        sort_queue_by_distance(&mut queue, &distance, head);
    }

    ShortestPaths { distance, parent }
}

fn sort_queue_by_distance(queue: &mut [usize], distance: &[f64], start: usize) {
    for i in start..queue.len() {
        for j in (i + 1)..queue.len() {
            if distance[queue[j]] < distance[queue[i]] {
                queue.swap(i, j);
            }
        }
    }
}

/// Link-state next hops from this router to every other router in `map`.
///
/// With `max_faces_per_prefix == 1` a single run over the full matrix gives
/// one next hop per destination. Otherwise each outgoing link is isolated in
/// turn and the runs are merged, giving every neighbor its own cost to every
/// destination.
pub fn calculate_paths<'a>(
    map: &Map,
    lsas: impl IntoIterator<Item = &'a AdjLsa>,
    this_router: &Name,
    adjacencies: &AdjacencyList,
    max_faces_per_prefix: usize,
) -> Vec<(Name, NextHop)> {
    let mut matrix = AdjacencyMatrix::from_adj_lsas(map, lsas);
    matrix.log(map);

    let Some(source) = map.index_of(this_router) else {
        debug!("{} is not in the router map, no link-state routes", this_router);
        return Vec::new();
    };

    let mut routes = Vec::new();
    if max_faces_per_prefix == 1 {
        let paths = shortest_paths(&matrix, source);
        collect_next_hops(&paths, map, source, adjacencies, &mut routes);
    } else {
        for (link, cost) in matrix.links_of(source) {
            matrix.isolate_link(source, link, cost);
            let paths = shortest_paths(&matrix, source);
            collect_next_hops(&paths, map, source, adjacencies, &mut routes);
        }
    }
    routes
}

fn collect_next_hops(
    paths: &ShortestPaths,
    map: &Map,
    source: usize,
    adjacencies: &AdjacencyList,
    routes: &mut Vec<(Name, NextHop)>,
) {
    for dest in (0..map.len()).filter(|&i| i != source) {
        let Some(hop) = paths.next_hop(dest, source) else {
            continue;
        };
        let (Some(dest_name), Some(hop_name)) = (map.name_of(dest), map.name_of(hop)) else {
            continue;
        };
        match adjacencies.get(hop_name) {
            Some(adjacent) => {
                routes.push((dest_name.clone(), NextHop::new(adjacent.face_uri.clone(), paths.distance[dest])));
            }
            None => warn!("Next hop {} towards {} is not a known neighbor", hop_name, dest_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{AdjacencyStatus, Adjacent};
    use chrono::Utc;

    fn adjacent(name: &str, cost: f64) -> Adjacent {
        Adjacent::new(Name::from(name), format!("udp4:/{}", name), cost).with_status(AdjacencyStatus::Active)
    }

    fn adj_lsa(origin: &str, links: &[(&str, f64)]) -> AdjLsa {
        let list: AdjacencyList = links.iter().map(|(n, c)| adjacent(n, *c)).collect();
        AdjLsa::new(Name::from(origin), 1, Utc::now(), &list)
    }

    /// r1 - r2 (10), r1 - r3 (50), r2 - r3 (10), r3 - r4 (5)
    fn diamond() -> Vec<AdjLsa> {
        vec![
            adj_lsa("/r1", &[("/r2", 10.0), ("/r3", 50.0)]),
            adj_lsa("/r2", &[("/r1", 10.0), ("/r3", 10.0)]),
            adj_lsa("/r3", &[("/r1", 50.0), ("/r2", 10.0), ("/r4", 5.0)]),
            adj_lsa("/r4", &[("/r3", 5.0)]),
        ]
    }

    fn r1_neighbors() -> AdjacencyList {
        vec![adjacent("/r2", 10.0), adjacent("/r3", 50.0)].into_iter().collect()
    }

    fn hops_to<'a>(routes: &'a [(Name, NextHop)], dest: &str) -> Vec<&'a NextHop> {
        routes.iter().filter(|(d, _)| d == &Name::from(dest)).map(|(_, h)| h).collect()
    }

    #[test]
    fn test_single_path() {
        let lsas = diamond();
        let map = Map::from_adj_lsas(&lsas);
        let routes = calculate_paths(&map, &lsas, &Name::from("/r1"), &r1_neighbors(), 1);

        let to_r4 = hops_to(&routes, "/r4");
        assert_eq!(to_r4.len(), 1);
        assert_eq!(to_r4[0].face_uri, "udp4://r2");
        assert_eq!(to_r4[0].route_cost, 25.0);
        assert_eq!(hops_to(&routes, "/r3")[0].route_cost, 20.0);
        assert!(hops_to(&routes, "/r1").is_empty());
    }

    #[test]
    fn test_multipath_gives_one_cost_per_link() {
        let lsas = diamond();
        let map = Map::from_adj_lsas(&lsas);
        let routes = calculate_paths(&map, &lsas, &Name::from("/r1"), &r1_neighbors(), 0);

        let to_r4 = hops_to(&routes, "/r4");
        assert_eq!(to_r4.len(), 2);
        let via_r3 = to_r4.iter().find(|h| h.face_uri == "udp4://r3").unwrap();
        let via_r2 = to_r4.iter().find(|h| h.face_uri == "udp4://r2").unwrap();
        assert_eq!(via_r2.route_cost, 25.0);
        assert_eq!(via_r3.route_cost, 55.0);
    }

    #[test]
    fn test_asymmetric_costs_use_larger() {
        let lsas = vec![adj_lsa("/r1", &[("/r2", 10.0)]), adj_lsa("/r2", &[("/r1", 30.0)])];
        let map = Map::from_adj_lsas(&lsas);
        let matrix = AdjacencyMatrix::from_adj_lsas(&map, &lsas);
        assert_eq!(matrix.get(0, 1), 30.0);
        assert_eq!(matrix.get(1, 0), 30.0);
    }

    #[test]
    fn test_one_way_link_is_broken() {
        let lsas = vec![adj_lsa("/r1", &[("/r2", 10.0)]), adj_lsa("/r2", &[])];
        let map = Map::from_adj_lsas(&lsas);
        let matrix = AdjacencyMatrix::from_adj_lsas(&map, &lsas);
        assert_eq!(matrix.get(0, 1), NON_ADJACENT_COST);
        let routes = calculate_paths(&map, &lsas, &Name::from("/r1"), &r1_neighbors(), 1);
        assert!(routes.is_empty());
    }

    #[test]
    fn test_source_missing_from_map() {
        let lsas = diamond();
        let map = Map::from_adj_lsas(&lsas);
        let routes = calculate_paths(&map, &lsas, &Name::from("/elsewhere"), &r1_neighbors(), 0);
        assert!(routes.is_empty());
    }

    #[test]
    fn test_unknown_neighbor_is_skipped() {
        let lsas = diamond();
        let map = Map::from_adj_lsas(&lsas);
        let only_r3: AdjacencyList = vec![adjacent("/r3", 50.0)].into_iter().collect();
        let routes = calculate_paths(&map, &lsas, &Name::from("/r1"), &only_r3, 1);
        assert!(routes.iter().all(|(_, h)| h.face_uri == "udp4://r3"));
        assert!(hops_to(&routes, "/r4").is_empty());
    }

    #[test]
    fn test_tie_goes_to_lower_index() {
        // r1 reaches r4 through r2 or r3 at equal cost.
        let lsas = vec![
            adj_lsa("/r1", &[("/r2", 1.0), ("/r3", 1.0)]),
            adj_lsa("/r2", &[("/r1", 1.0), ("/r4", 1.0)]),
            adj_lsa("/r3", &[("/r1", 1.0), ("/r4", 1.0)]),
            adj_lsa("/r4", &[("/r2", 1.0), ("/r3", 1.0)]),
        ];
        let map = Map::from_adj_lsas(&lsas);
        let matrix = AdjacencyMatrix::from_adj_lsas(&map, &lsas);
        let paths = shortest_paths(&matrix, 0);
        assert_eq!(paths.distance[3], 2.0);
        assert_eq!(paths.next_hop(3, 0), Some(1));
    }
}
