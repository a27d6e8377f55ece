//! Connectivity and load analysis over the live graph.

use super::Graph;
use crate::types::{Bottleneck, Component, Degree, DeviceId, DeviceStatus};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Utilization above which a link counts as congested.
pub const CONGESTION_THRESHOLD: f64 = 0.8;

impl Graph {
    /// Group Online devices into connected components by flooding outgoing
    /// eligible edges. Devices in any other status belong to no component; a
    /// component of one is flagged isolated.
    ///
    /// Numbering follows device-id order of the component roots, so the
    /// result is deterministic for a given graph state.
    pub fn connected_components(&self) -> Vec<Component> {
        self.components_excluding(None)
    }

    fn components_excluding(&self, excluded: Option<&DeviceId>) -> Vec<Component> {
        let mut visited: HashSet<DeviceId> = HashSet::new();
        let mut components = Vec::new();

        for (id, device) in &self.devices {
            if device.status != DeviceStatus::Online
                || visited.contains(id)
                || Some(id) == excluded
            {
                continue;
            }

            let mut members = Vec::new();
            let mut stack = vec![id.clone()];
            while let Some(current) = stack.pop() {
                if !visited.insert(current.clone()) {
                    continue;
                }
                members.push(current.clone());
                let Some(row) = self.row(&current) else {
                    continue;
                };
                for entry in row.iter() {
                    if visited.contains(&entry.destination)
                        || Some(&entry.destination) == excluded
                        || !self.traversable(entry)
                    {
                        continue;
                    }
                    stack.push(entry.destination.clone());
                }
            }

            components.push(Component {
                id: components.len(),
                isolated: members.len() == 1,
                size: members.len(),
                devices: members,
            });
        }

        components
    }

    /// Links whose utilization exceeds [`CONGESTION_THRESHOLD`], most loaded
    /// first. Zero-capacity links never qualify.
    pub fn bottlenecks(&self) -> Vec<Bottleneck> {
        let mut found: Vec<Bottleneck> = self
            .links
            .values()
            .filter_map(|link| {
                let utilization = link.utilization();
                (utilization > CONGESTION_THRESHOLD).then(|| Bottleneck {
                    link: link.clone(),
                    utilization,
                })
            })
            .collect();
        found.sort_by(|a, b| b.utilization.total_cmp(&a.utilization));
        found
    }

    /// Structural in/out edge counts per device, status ignored.
    pub fn degrees(&self) -> BTreeMap<DeviceId, Degree> {
        let mut degrees: BTreeMap<DeviceId, Degree> = self
            .devices
            .keys()
            .map(|id| (id.clone(), Degree::default()))
            .collect();
        for (origin, row) in &self.rows {
            for entry in row.iter() {
                if let Some(degree) = degrees.get_mut(origin) {
                    degree.outbound += 1;
                    degree.total += 1;
                }
                if let Some(degree) = degrees.get_mut(&entry.destination) {
                    degree.inbound += 1;
                    degree.total += 1;
                }
            }
        }
        degrees
    }

    /// Devices whose individual loss would split the online network: their
    /// exclusion yields more connected components than the graph has now.
    pub fn articulation_points(&self) -> Vec<DeviceId> {
        let baseline = self.connected_components().len();
        self.devices
            .keys()
            .filter(|id| self.components_excluding(Some(id)).len() > baseline)
            .cloned()
            .collect()
    }

    /// Mean hop count over all ordered pairs of Online devices that can reach
    /// each other, 0.0 when no such pair exists.
    pub fn mean_path_length(&self) -> f64 {
        let online: Vec<&DeviceId> = self
            .devices
            .values()
            .filter(|d| d.status == DeviceStatus::Online)
            .map(|d| &d.id)
            .collect();

        let mut total_hops: u64 = 0;
        let mut pairs: u64 = 0;
        for origin in &online {
            let distances = self.hop_distances(origin);
            for destination in &online {
                if destination == origin {
                    continue;
                }
                if let Some(hops) = distances.get(*destination) {
                    total_hops += u64::from(*hops);
                    pairs += 1;
                }
            }
        }

        if pairs == 0 {
            0.0
        } else {
            total_hops as f64 / pairs as f64
        }
    }

    /// BFS hop counts from one origin over eligible edges.
    fn hop_distances(&self, origin: &DeviceId) -> HashMap<DeviceId, u32> {
        let mut distances: HashMap<DeviceId, u32> = HashMap::new();
        distances.insert(origin.clone(), 0);
        let mut queue: VecDeque<DeviceId> = VecDeque::new();
        queue.push_back(origin.clone());

        while let Some(current) = queue.pop_front() {
            let Some(&depth) = distances.get(&current) else {
                continue;
            };
            let Some(row) = self.row(&current) else {
                continue;
            };
            for entry in row.iter() {
                if distances.contains_key(&entry.destination) || !self.traversable(entry) {
                    continue;
                }
                distances.insert(entry.destination.clone(), depth + 1);
                queue.push_back(entry.destination.clone());
            }
        }

        distances
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{device, link};
    use super::*;
    use crate::types::{LinkId, LinkStatus};

    fn members(component: &Component) -> Vec<&str> {
        component.devices.iter().map(|id| id.as_str()).collect()
    }

    #[test]
    fn components_cover_only_online_devices() {
        let mut graph = Graph::new();
        graph.add_device(device("a", DeviceStatus::Online)).unwrap();
        graph.add_device(device("b", DeviceStatus::Online)).unwrap();
        graph.add_device(device("c", DeviceStatus::Online)).unwrap();
        graph.add_device(device("d", DeviceStatus::Online)).unwrap();
        graph.add_device(device("e", DeviceStatus::Offline)).unwrap();
        graph.add_device(device("f", DeviceStatus::Online)).unwrap();
        graph.add_link(link("ab", "a", "b", true)).unwrap();
        graph.add_link(link("cd", "c", "d", true)).unwrap();

        let components = graph.connected_components();
        assert_eq!(components.len(), 3);

        let mut sizes: Vec<usize> = components.iter().map(|c| c.size).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 2, 2]);

        // The offline device belongs to no component.
        for component in &components {
            assert!(!component.devices.contains(&DeviceId::from("e")));
        }
        // The lone online device is isolated.
        let isolated: Vec<_> = components.iter().filter(|c| c.isolated).collect();
        assert_eq!(isolated.len(), 1);
        assert_eq!(members(isolated[0]), vec!["f"]);
    }

    #[test]
    fn inactive_link_splits_a_component() {
        let mut graph = Graph::new();
        graph.add_device(device("a", DeviceStatus::Online)).unwrap();
        graph.add_device(device("b", DeviceStatus::Online)).unwrap();
        graph.add_link(link("ab", "a", "b", true)).unwrap();
        assert_eq!(graph.connected_components().len(), 1);

        graph.link_mut(&LinkId::from("ab")).unwrap().status = LinkStatus::Inactive;
        graph.link_mut(&LinkId::from("ab_rev")).unwrap().status = LinkStatus::Inactive;
        let components = graph.connected_components();
        assert_eq!(components.len(), 2);
        assert!(components.iter().all(|c| c.isolated));
    }

    #[test]
    fn one_way_reachability_merges_components() {
        let mut graph = Graph::new();
        graph.add_device(device("a", DeviceStatus::Online)).unwrap();
        graph.add_device(device("b", DeviceStatus::Online)).unwrap();
        graph.add_link(link("ab", "a", "b", false)).unwrap();

        // The flood follows outgoing edges, so a one-way edge is enough to
        // group both endpoints when the walk starts upstream.
        let components = graph.connected_components();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].size, 2);
    }

    #[test]
    fn bottlenecks_sorted_by_utilization() {
        let mut graph = Graph::new();
        for id in ["a", "b", "c", "d"] {
            graph.add_device(device(id, DeviceStatus::Online)).unwrap();
        }
        let mut heavy = link("heavy", "a", "b", false);
        heavy.bandwidth_used = 90.0;
        let mut heavier = link("heavier", "b", "c", false);
        heavier.bandwidth_used = 99.0;
        let mut light = link("light", "c", "d", false);
        light.bandwidth_used = 50.0;
        let mut dead = link("dead", "d", "a", false);
        dead.bandwidth = 0.0;
        dead.bandwidth_used = 10.0;
        for record in [heavy, heavier, light, dead] {
            graph.add_link(record).unwrap();
        }

        let bottlenecks = graph.bottlenecks();
        assert_eq!(bottlenecks.len(), 2);
        assert_eq!(bottlenecks[0].link.id, LinkId::from("heavier"));
        assert_eq!(bottlenecks[0].utilization, 0.99);
        assert_eq!(bottlenecks[1].link.id, LinkId::from("heavy"));
    }

    #[test]
    fn degrees_count_structure_not_status() {
        let mut graph = Graph::new();
        graph.add_device(device("a", DeviceStatus::Online)).unwrap();
        graph.add_device(device("b", DeviceStatus::Offline)).unwrap();
        graph.add_device(device("c", DeviceStatus::Online)).unwrap();
        graph.add_link(link("ab", "a", "b", true)).unwrap();
        graph.add_link(link("ac", "a", "c", false)).unwrap();

        let degrees = graph.degrees();
        let a = degrees[&DeviceId::from("a")];
        assert_eq!((a.inbound, a.outbound, a.total), (1, 2, 3));
        let b = degrees[&DeviceId::from("b")];
        assert_eq!((b.inbound, b.outbound, b.total), (1, 1, 2));
        let c = degrees[&DeviceId::from("c")];
        assert_eq!((c.inbound, c.outbound, c.total), (1, 0, 1));
    }

    #[test]
    fn chain_middle_is_an_articulation_point() {
        let mut graph = Graph::new();
        for id in ["a", "b", "c"] {
            graph.add_device(device(id, DeviceStatus::Online)).unwrap();
        }
        graph.add_link(link("ab", "a", "b", true)).unwrap();
        graph.add_link(link("bc", "b", "c", true)).unwrap();

        assert_eq!(graph.articulation_points(), vec![DeviceId::from("b")]);
    }

    #[test]
    fn cycle_has_no_articulation_points() {
        let mut graph = Graph::new();
        for id in ["a", "b", "c"] {
            graph.add_device(device(id, DeviceStatus::Online)).unwrap();
        }
        graph.add_link(link("ab", "a", "b", true)).unwrap();
        graph.add_link(link("bc", "b", "c", true)).unwrap();
        graph.add_link(link("ca", "c", "a", true)).unwrap();

        assert!(graph.articulation_points().is_empty());
    }

    #[test]
    fn mean_path_length_over_chain() {
        let mut graph = Graph::new();
        for id in ["a", "b", "c"] {
            graph.add_device(device(id, DeviceStatus::Online)).unwrap();
        }
        graph.add_link(link("ab", "a", "b", true)).unwrap();
        graph.add_link(link("bc", "b", "c", true)).unwrap();

        // Ordered pairs: four at one hop, two at two hops.
        let mean = graph.mean_path_length();
        assert!((mean - 8.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn mean_path_length_degenerate_cases() {
        let mut graph = Graph::new();
        assert_eq!(graph.mean_path_length(), 0.0);
        graph.add_device(device("a", DeviceStatus::Online)).unwrap();
        assert_eq!(graph.mean_path_length(), 0.0);
    }
}
