//! Pathfinding over the live graph.
//!
//! All algorithms apply the same eligibility rule through
//! [`Graph::traversable`]: an edge can be crossed only while its destination
//! device is Online and its link Active, checked against current state at
//! query time. No results are cached.
//!
//! Costs are not accumulated during the search. Once a predecessor chain is
//! complete, [`Graph::reconstruct`] walks it and re-reads each hop's weight
//! and latency from the adjacency entries, so the reported totals always
//! reflect the graph as it is at reconstruction time.

use super::Graph;
use crate::{
    heap::IndexedHeap,
    types::{DeviceId, PathAlgorithm, PathResult},
};
use std::collections::{HashMap, HashSet, VecDeque};

impl Graph {
    /// Find a path from `origin` to `destination` with the chosen algorithm.
    ///
    /// Unknown endpoints and unreachable destinations both produce the normal
    /// not-found result (empty path, infinite cost, zero hops) rather than an
    /// error.
    pub fn find_path(
        &self,
        origin: &DeviceId,
        destination: &DeviceId,
        algorithm: PathAlgorithm,
    ) -> PathResult {
        match algorithm {
            PathAlgorithm::Dijkstra => self.dijkstra(origin, destination),
            PathAlgorithm::Bfs => self.bfs(origin, destination),
            PathAlgorithm::Dfs => self.dfs(origin, destination),
        }
    }

    fn dijkstra(&self, origin: &DeviceId, destination: &DeviceId) -> PathResult {
        let algorithm = PathAlgorithm::Dijkstra;
        if !self.devices.contains_key(origin) || !self.devices.contains_key(destination) {
            return PathResult::not_found(algorithm);
        }

        let mut distances: HashMap<DeviceId, f64> = self
            .devices
            .keys()
            .map(|id| {
                let distance = if id == origin { 0.0 } else { f64::INFINITY };
                (id.clone(), distance)
            })
            .collect();
        let mut predecessors: HashMap<DeviceId, DeviceId> = HashMap::new();
        let mut heap = IndexedHeap::new();
        heap.insert(origin.clone(), 0.0);

        while let Some((current, _)) = heap.extract_min() {
            if current == *destination {
                return self.reconstruct(destination, &predecessors, algorithm);
            }
            let Some(&current_distance) = distances.get(&current) else {
                continue;
            };
            let Some(row) = self.rows.get(&current) else {
                continue;
            };
            for entry in row.iter() {
                if !self.traversable(entry) {
                    continue;
                }
                let candidate = current_distance + entry.weight;
                let best = distances
                    .get(&entry.destination)
                    .copied()
                    .unwrap_or(f64::INFINITY);
                if candidate < best {
                    distances.insert(entry.destination.clone(), candidate);
                    predecessors.insert(entry.destination.clone(), current.clone());
                    if heap.contains(&entry.destination) {
                        heap.decrease_key(&entry.destination, candidate);
                    } else {
                        heap.insert(entry.destination.clone(), candidate);
                    }
                }
            }
        }

        PathResult::not_found(algorithm)
    }

    fn bfs(&self, origin: &DeviceId, destination: &DeviceId) -> PathResult {
        let algorithm = PathAlgorithm::Bfs;
        if !self.devices.contains_key(origin) || !self.devices.contains_key(destination) {
            return PathResult::not_found(algorithm);
        }

        let mut visited: HashSet<DeviceId> = HashSet::new();
        let mut predecessors: HashMap<DeviceId, DeviceId> = HashMap::new();
        let mut queue: VecDeque<DeviceId> = VecDeque::new();
        visited.insert(origin.clone());
        queue.push_back(origin.clone());

        while let Some(current) = queue.pop_front() {
            if current == *destination {
                return self.reconstruct(destination, &predecessors, algorithm);
            }
            let Some(row) = self.rows.get(&current) else {
                continue;
            };
            for entry in row.iter() {
                if visited.contains(&entry.destination) || !self.traversable(entry) {
                    continue;
                }
                // Marked at discovery: the first path to reach a device wins.
                visited.insert(entry.destination.clone());
                predecessors.insert(entry.destination.clone(), current.clone());
                queue.push_back(entry.destination.clone());
            }
        }

        PathResult::not_found(algorithm)
    }

    fn dfs(&self, origin: &DeviceId, destination: &DeviceId) -> PathResult {
        let algorithm = PathAlgorithm::Dfs;
        if !self.devices.contains_key(origin) || !self.devices.contains_key(destination) {
            return PathResult::not_found(algorithm);
        }

        let mut visited: HashSet<DeviceId> = HashSet::new();
        let mut predecessors: HashMap<DeviceId, DeviceId> = HashMap::new();
        let mut stack: Vec<DeviceId> = vec![origin.clone()];

        while let Some(current) = stack.pop() {
            if current == *destination {
                return self.reconstruct(destination, &predecessors, algorithm);
            }
            // Marked at pop, not at push: a device may sit on the stack more
            // than once, and its recorded predecessor is whichever push came
            // last before the first pop.
            if visited.contains(&current) {
                continue;
            }
            visited.insert(current.clone());

            let Some(row) = self.rows.get(&current) else {
                continue;
            };
            for entry in row.iter() {
                if visited.contains(&entry.destination) || !self.traversable(entry) {
                    continue;
                }
                predecessors.insert(entry.destination.clone(), current.clone());
                stack.push(entry.destination.clone());
            }
        }

        PathResult::not_found(algorithm)
    }

    /// Route maximizing the minimum available bandwidth along the way.
    ///
    /// A Dijkstra variant: instead of minimizing summed weight it maximizes
    /// the path bottleneck `max(0, bandwidth - bandwidth_used)`, read live
    /// from each link record. The result is reconstructed like any other
    /// path, so cost and latency still report the summed weights/latencies of
    /// the chosen route.
    pub fn find_route_by_bandwidth(
        &self,
        origin: &DeviceId,
        destination: &DeviceId,
    ) -> PathResult {
        let algorithm = PathAlgorithm::Dijkstra;
        if !self.devices.contains_key(origin) || !self.devices.contains_key(destination) {
            return PathResult::not_found(algorithm);
        }

        let mut best: HashMap<DeviceId, f64> = HashMap::new();
        best.insert(origin.clone(), f64::INFINITY);
        let mut predecessors: HashMap<DeviceId, DeviceId> = HashMap::new();
        // Priorities are negated bottlenecks so the min-heap pops the widest
        // frontier device first.
        let mut heap = IndexedHeap::new();
        heap.insert(origin.clone(), f64::NEG_INFINITY);

        while let Some((current, _)) = heap.extract_min() {
            if current == *destination {
                return self.reconstruct(destination, &predecessors, algorithm);
            }
            let Some(&current_best) = best.get(&current) else {
                continue;
            };
            let Some(row) = self.rows.get(&current) else {
                continue;
            };
            for entry in row.iter() {
                if !self.traversable(entry) {
                    continue;
                }
                let available = self
                    .links
                    .get(&entry.link)
                    .map(|l| (l.bandwidth - l.bandwidth_used).max(0.0))
                    .unwrap_or(0.0);
                let candidate = current_best.min(available);
                let seen = best
                    .get(&entry.destination)
                    .copied()
                    .unwrap_or(f64::NEG_INFINITY);
                if candidate > seen {
                    best.insert(entry.destination.clone(), candidate);
                    predecessors.insert(entry.destination.clone(), current.clone());
                    if heap.contains(&entry.destination) {
                        heap.decrease_key(&entry.destination, -candidate);
                    } else {
                        heap.insert(entry.destination.clone(), -candidate);
                    }
                }
            }
        }

        PathResult::not_found(algorithm)
    }

    /// Walk the predecessor chain back from `destination`, then total the
    /// path by re-reading each hop's current weight and latency.
    fn reconstruct(
        &self,
        destination: &DeviceId,
        predecessors: &HashMap<DeviceId, DeviceId>,
        algorithm: PathAlgorithm,
    ) -> PathResult {
        let mut path = vec![destination.clone()];
        let mut current = destination;
        while let Some(previous) = predecessors.get(current) {
            path.push(previous.clone());
            current = previous;
        }
        path.reverse();

        let mut cost = 0.0;
        let mut latency = 0.0;
        for pair in path.windows(2) {
            let Some(row) = self.rows.get(&pair[0]) else {
                continue;
            };
            let Some(entry) = row.find_first(&pair[1]) else {
                continue;
            };
            cost += entry.weight;
            latency += self.links.get(&entry.link).map(|l| l.latency).unwrap_or(0.0);
        }

        PathResult {
            found: true,
            hops: path.len() - 1,
            path,
            cost,
            latency,
            algorithm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{device, link};
    use crate::{
        graph::Graph,
        types::{DeviceId, DeviceStatus, LinkId, LinkStatus, PathAlgorithm},
    };
    use std::time::SystemTime;
    use test_case::test_case;

    fn ids(result: &crate::types::PathResult) -> Vec<&str> {
        result.path.iter().map(|id| id.as_str()).collect()
    }

    /// a -> b -> c over two cheap hops, plus an expensive direct a -> c.
    fn chain_with_shortcut() -> Graph {
        let mut graph = Graph::new();
        for id in ["a", "b", "c"] {
            graph.add_device(device(id, DeviceStatus::Online)).unwrap();
        }
        let mut ab = link("ab", "a", "b", true);
        ab.latency = 5.0;
        let mut bc = link("bc", "b", "c", true);
        bc.latency = 5.0;
        let mut ac = link("ac", "a", "c", true);
        ac.latency = 80.0;
        graph.add_link(ab).unwrap();
        graph.add_link(bc).unwrap();
        graph.add_link(ac).unwrap();
        graph
    }

    #[test]
    fn dijkstra_prefers_cheaper_chain() {
        let graph = chain_with_shortcut();
        let result = graph.find_path(
            &DeviceId::from("a"),
            &DeviceId::from("c"),
            PathAlgorithm::Dijkstra,
        );
        assert!(result.found);
        assert_eq!(ids(&result), vec!["a", "b", "c"]);
        assert_eq!(result.cost, 10.0);
        assert_eq!(result.latency, 10.0);
        assert_eq!(result.hops, 2);
    }

    #[test]
    fn bfs_prefers_fewer_hops() {
        let graph = chain_with_shortcut();
        let result = graph.find_path(
            &DeviceId::from("a"),
            &DeviceId::from("c"),
            PathAlgorithm::Bfs,
        );
        assert!(result.found);
        // One expensive hop beats two cheap ones for BFS.
        assert_eq!(result.hops, 1);
        assert_eq!(result.cost, 80.0);
    }

    #[test]
    fn dfs_finds_a_valid_path() {
        let graph = chain_with_shortcut();
        let result = graph.find_path(
            &DeviceId::from("a"),
            &DeviceId::from("c"),
            PathAlgorithm::Dfs,
        );
        assert!(result.found);
        assert_eq!(result.path.first(), Some(&DeviceId::from("a")));
        assert_eq!(result.path.last(), Some(&DeviceId::from("c")));
        // Every consecutive pair must be a real edge.
        for pair in result.path.windows(2) {
            let row = graph.row(&pair[0]).unwrap();
            assert!(row.find_first(&pair[1]).is_some());
        }
    }

    #[test_case(PathAlgorithm::Dijkstra)]
    #[test_case(PathAlgorithm::Bfs)]
    #[test_case(PathAlgorithm::Dfs)]
    fn same_origin_and_destination(algorithm: PathAlgorithm) {
        let graph = chain_with_shortcut();
        let result = graph.find_path(&DeviceId::from("a"), &DeviceId::from("a"), algorithm);
        assert!(result.found);
        assert_eq!(ids(&result), vec!["a"]);
        assert_eq!(result.cost, 0.0);
        assert_eq!(result.hops, 0);
    }

    #[test_case(PathAlgorithm::Dijkstra)]
    #[test_case(PathAlgorithm::Bfs)]
    #[test_case(PathAlgorithm::Dfs)]
    fn unknown_endpoint_is_not_found(algorithm: PathAlgorithm) {
        let graph = chain_with_shortcut();
        let result = graph.find_path(&DeviceId::from("a"), &DeviceId::from("ghost"), algorithm);
        assert!(!result.found);
        assert!(result.path.is_empty());
        assert!(result.cost.is_infinite());
        assert!(result.latency.is_infinite());
        assert_eq!(result.hops, 0);
        assert_eq!(result.algorithm, algorithm);
    }

    #[test_case(PathAlgorithm::Dijkstra)]
    #[test_case(PathAlgorithm::Bfs)]
    #[test_case(PathAlgorithm::Dfs)]
    fn offline_relay_blocks_the_only_route(algorithm: PathAlgorithm) {
        let mut graph = Graph::new();
        graph.add_device(device("a", DeviceStatus::Online)).unwrap();
        graph.add_device(device("b", DeviceStatus::Offline)).unwrap();
        graph.add_device(device("c", DeviceStatus::Online)).unwrap();
        graph.add_link(link("ab", "a", "b", true)).unwrap();
        graph.add_link(link("bc", "b", "c", true)).unwrap();

        let result = graph.find_path(&DeviceId::from("a"), &DeviceId::from("c"), algorithm);
        assert!(!result.found);
    }

    #[test]
    fn eligibility_is_read_at_query_time() {
        let mut graph = chain_with_shortcut();
        let a = DeviceId::from("a");
        let c = DeviceId::from("c");

        // Deactivate the shortcut after creation: BFS must reroute.
        graph.link_mut(&LinkId::from("ac")).unwrap().status = LinkStatus::Inactive;
        let result = graph.find_path(&a, &c, PathAlgorithm::Bfs);
        assert!(result.found);
        assert_eq!(result.hops, 2);

        // Reactivate: the shortcut is immediately visible again.
        graph.link_mut(&LinkId::from("ac")).unwrap().status = LinkStatus::Active;
        let result = graph.find_path(&a, &c, PathAlgorithm::Bfs);
        assert_eq!(result.hops, 1);
    }

    #[test]
    fn reconstruction_reflects_current_weights() {
        let mut graph = chain_with_shortcut();
        let a = DeviceId::from("a");
        let b = DeviceId::from("b");
        let before = graph.find_path(&a, &b, PathAlgorithm::Dijkstra);
        assert_eq!(before.cost, 5.0);

        let now = SystemTime::UNIX_EPOCH;
        graph.link_mut(&LinkId::from("ab")).unwrap().latency = 25.0;
        graph.refresh_weight(&LinkId::from("ab"), now).unwrap();

        let after = graph.find_path(&a, &b, PathAlgorithm::Dijkstra);
        assert_eq!(after.cost, 25.0);
        assert_eq!(after.latency, 25.0);
    }

    #[test]
    fn uniform_weights_make_dijkstra_and_bfs_agree_on_hops() {
        let mut graph = Graph::new();
        for id in ["a", "b", "c", "d", "x"] {
            graph.add_device(device(id, DeviceStatus::Online)).unwrap();
        }
        // Long chain a-b-c-d plus short chain a-x-d, all identical links.
        graph.add_link(link("ab", "a", "b", true)).unwrap();
        graph.add_link(link("bc", "b", "c", true)).unwrap();
        graph.add_link(link("cd", "c", "d", true)).unwrap();
        graph.add_link(link("ax", "a", "x", true)).unwrap();
        graph.add_link(link("xd", "x", "d", true)).unwrap();

        let a = DeviceId::from("a");
        let d = DeviceId::from("d");
        let dijkstra = graph.find_path(&a, &d, PathAlgorithm::Dijkstra);
        let bfs = graph.find_path(&a, &d, PathAlgorithm::Bfs);
        assert!(dijkstra.found && bfs.found);
        assert_eq!(dijkstra.hops, bfs.hops);
        assert_eq!(dijkstra.hops, 2);
    }

    #[test]
    fn widest_route_avoids_the_thin_pipe() {
        let mut graph = Graph::new();
        for id in ["a", "b", "thin", "wide"] {
            graph.add_device(device(id, DeviceStatus::Online)).unwrap();
        }
        let mut at = link("at", "a", "thin", true);
        at.bandwidth = 10.0;
        let mut tb = link("tb", "thin", "b", true);
        tb.bandwidth = 10.0;
        // The wide detour has more latency but ten times the capacity.
        let mut aw = link("aw", "a", "wide", true);
        aw.latency = 50.0;
        let mut wb = link("wb", "wide", "b", true);
        wb.latency = 50.0;
        graph.add_link(at).unwrap();
        graph.add_link(tb).unwrap();
        graph.add_link(aw).unwrap();
        graph.add_link(wb).unwrap();

        let a = DeviceId::from("a");
        let b = DeviceId::from("b");
        // Cheapest-by-weight goes through the thin pipe.
        let cheapest = graph.find_path(&a, &b, PathAlgorithm::Dijkstra);
        assert_eq!(ids(&cheapest), vec!["a", "thin", "b"]);
        // Widest-by-bandwidth takes the detour.
        let widest = graph.find_route_by_bandwidth(&a, &b);
        assert!(widest.found);
        assert_eq!(ids(&widest), vec!["a", "wide", "b"]);
    }

    #[test]
    fn widest_route_unknown_endpoint() {
        let graph = chain_with_shortcut();
        let result = graph.find_route_by_bandwidth(&DeviceId::from("ghost"), &DeviceId::from("a"));
        assert!(!result.found);
    }
}
