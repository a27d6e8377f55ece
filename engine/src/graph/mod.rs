//! Mutable weighted directed graph of devices and links.
//!
//! The graph owns three aligned stores: device records, link records, and a
//! per-device adjacency row of outgoing edges (see [`crate::adjacency`]).
//! Every structural mutation keeps the three consistent: removing a device
//! drops every link record and row entry referencing it, in O(V + E).
//!
//! Bidirectional links are two first-class records. The reverse record gets
//! the derived id `<id>_rev` and swapped endpoints at creation, then lives an
//! independent life: it is listed, exported, failed, and re-weighted on its
//! own.
//!
//! Edge weights are derived state. Callers never write them; the graph
//! recomputes them through its [`CostModel`] at insertion and on
//! [`Graph::refresh_weight`].

mod analysis;
mod path;

pub use analysis::CONGESTION_THRESHOLD;

use crate::{
    adjacency::{EdgeEntry, EdgeList},
    types::{Device, DeviceId, DeviceStatus, GraphExport, Link, LinkId, LinkStatus},
    Error,
};
use std::{collections::BTreeMap, time::SystemTime};

/// Policy deriving an edge's routing weight from its current attributes.
pub trait CostModel {
    fn weight(&self, link: &Link) -> f64;
}

/// Default policy: configured latency, plus pressure from consumed bandwidth,
/// plus ten points per percent of loss. A saturated or zero-capacity link
/// contributes the full 100-point bandwidth penalty.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCost;

impl CostModel for DefaultCost {
    fn weight(&self, link: &Link) -> f64 {
        let available = (link.bandwidth - link.bandwidth_used).max(0.0);
        let available_pct = if link.bandwidth > 0.0 {
            available / link.bandwidth * 100.0
        } else {
            0.0
        };
        link.latency + (100.0 - available_pct) + link.loss * 10.0
    }
}

/// Vertex, edge, and adjacency stores plus the cost model.
///
/// Iteration over devices and links is ordered by id, so derived results
/// (component numbering, metrics aggregation) are deterministic for a given
/// structure.
pub struct Graph {
    devices: BTreeMap<DeviceId, Device>,
    rows: BTreeMap<DeviceId, EdgeList>,
    links: BTreeMap<LinkId, Link>,
    cost: Box<dyn CostModel + Send + Sync>,
}

impl Graph {
    pub fn new() -> Self {
        Self::with_cost(Box::new(DefaultCost))
    }

    /// Build an empty graph with a custom weight policy.
    pub fn with_cost(cost: Box<dyn CostModel + Send + Sync>) -> Self {
        Self {
            devices: BTreeMap::new(),
            rows: BTreeMap::new(),
            links: BTreeMap::new(),
            cost,
        }
    }

    // ---------- Devices ----------

    /// Insert a device record and its empty adjacency row.
    pub fn add_device(&mut self, device: Device) -> Result<(), Error> {
        if self.devices.contains_key(&device.id) {
            return Err(Error::DuplicateDevice(device.id));
        }
        self.rows.insert(device.id.clone(), EdgeList::new());
        self.devices.insert(device.id.clone(), device);
        Ok(())
    }

    /// Remove a device and every link touching it. Returns the removed record,
    /// or `None` when the id is unknown.
    pub fn remove_device(&mut self, id: &DeviceId) -> Option<Device> {
        let device = self.devices.remove(id)?;

        // Incoming edges: strip matching entries from every other row and
        // drop their records.
        for (origin, row) in self.rows.iter_mut() {
            if origin == id {
                continue;
            }
            while let Some(link_id) = row.remove_first(id) {
                self.links.remove(&link_id);
            }
        }

        // Outgoing edges: the row disappears with the device, the records
        // must go explicitly.
        if let Some(row) = self.rows.remove(id) {
            for entry in row.iter() {
                self.links.remove(&entry.link);
            }
        }

        Some(device)
    }

    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    pub(crate) fn device_mut(&mut self, id: &DeviceId) -> Option<&mut Device> {
        self.devices.get_mut(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    // ---------- Links ----------

    /// Insert a link. The record's weight is recomputed here; any value the
    /// caller left in it is ignored. A bidirectional link additionally
    /// produces the mirror record with swapped endpoints and the same
    /// attributes.
    ///
    /// Fails when either endpoint is unknown or the id (or derived mirror id)
    /// is taken. Returns the stored forward record.
    pub fn add_link(&mut self, mut link: Link) -> Result<Link, Error> {
        if !self.devices.contains_key(&link.origin) {
            return Err(Error::UnknownDevice(link.origin));
        }
        if !self.devices.contains_key(&link.destination) {
            return Err(Error::UnknownDevice(link.destination));
        }
        if self.links.contains_key(&link.id) {
            return Err(Error::DuplicateLink(link.id));
        }
        let mirror_id = link.id.mirror();
        if link.bidirectional && self.links.contains_key(&mirror_id) {
            return Err(Error::DuplicateLink(mirror_id));
        }

        link.weight = self.cost.weight(&link);
        if let Some(row) = self.rows.get_mut(&link.origin) {
            row.push_front(link.destination.clone(), link.weight, link.id.clone());
        }

        if link.bidirectional {
            let mut mirror = link.clone();
            mirror.id = mirror_id;
            mirror.origin = link.destination.clone();
            mirror.destination = link.origin.clone();
            if let Some(row) = self.rows.get_mut(&mirror.origin) {
                row.push_front(mirror.destination.clone(), mirror.weight, mirror.id.clone());
            }
            self.links.insert(mirror.id.clone(), mirror);
        }

        self.links.insert(link.id.clone(), link.clone());
        Ok(link)
    }

    /// Remove a link record and its adjacency entry. For a bidirectional pair
    /// this removes both directions, whichever one was named. Returns the
    /// named record, or `None` when the id is unknown.
    pub fn remove_link(&mut self, id: &LinkId) -> Option<Link> {
        let link = self.links.remove(id)?;
        if let Some(row) = self.rows.get_mut(&link.origin) {
            row.remove_first(&link.destination);
        }
        if link.bidirectional {
            if let Some(other) = self.links.remove(&id.counterpart()) {
                if let Some(row) = self.rows.get_mut(&other.origin) {
                    row.remove_first(&other.destination);
                }
            }
        }
        Some(link)
    }

    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    pub(crate) fn link_mut(&mut self, id: &LinkId) -> Option<&mut Link> {
        self.links.get_mut(id)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Recompute a link's weight from its current latency/bandwidth/loss and
    /// store it on the record and its adjacency entry. For a bidirectional
    /// pair the mirror is recomputed too, from the mirror's own attributes,
    /// so one side's mutation never leaks into the other's weight.
    ///
    /// Returns the named record's new weight, or `None` when unknown.
    pub fn refresh_weight(&mut self, id: &LinkId, now: SystemTime) -> Option<f64> {
        let weight = self.refresh_one(id, now)?;
        let bidirectional = self.links.get(id).map(|l| l.bidirectional).unwrap_or(false);
        if bidirectional {
            self.refresh_one(&id.counterpart(), now);
        }
        Some(weight)
    }

    fn refresh_one(&mut self, id: &LinkId, now: SystemTime) -> Option<f64> {
        let link = self.links.get_mut(id)?;
        let weight = self.cost.weight(link);
        link.weight = weight;
        link.updated_at = now;
        let origin = link.origin.clone();
        if let Some(row) = self.rows.get_mut(&origin) {
            row.update_weight(id, weight);
        }
        Some(weight)
    }

    // ---------- Traversal support ----------

    pub(crate) fn row(&self, id: &DeviceId) -> Option<&EdgeList> {
        self.rows.get(id)
    }

    /// Whether an edge may be crossed right now: its destination device is
    /// Online and its link is Active. Evaluated against live state on every
    /// query.
    pub(crate) fn traversable(&self, entry: &EdgeEntry) -> bool {
        let destination_online = self
            .devices
            .get(&entry.destination)
            .is_some_and(|d| d.status == DeviceStatus::Online);
        let link_active = self
            .links
            .get(&entry.link)
            .is_some_and(|l| l.status == LinkStatus::Active);
        destination_online && link_active
    }

    // ---------- Export / import ----------

    /// Snapshot the full structure: every device and every directed link
    /// record, mirrors included.
    pub fn export(&self) -> GraphExport {
        GraphExport {
            devices: self.devices.values().cloned().collect(),
            links: self.links.values().cloned().collect(),
        }
    }

    /// Rebuild a graph from an export. Records are inserted as stored: no
    /// defaulting, no mirror synthesis, and weights are kept as exported so
    /// the result is isomorphic to the source graph.
    pub fn from_export(export: GraphExport) -> Result<Self, Error> {
        let mut graph = Self::new();
        for device in export.devices {
            graph.add_device(device)?;
        }
        for link in export.links {
            if !graph.devices.contains_key(&link.origin) {
                return Err(Error::UnknownDevice(link.origin));
            }
            if !graph.devices.contains_key(&link.destination) {
                return Err(Error::UnknownDevice(link.destination));
            }
            if graph.links.contains_key(&link.id) {
                return Err(Error::DuplicateLink(link.id));
            }
            if let Some(row) = graph.rows.get_mut(&link.origin) {
                row.push_front(link.destination.clone(), link.weight, link.id.clone());
            }
            graph.links.insert(link.id.clone(), link);
        }
        Ok(graph)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
