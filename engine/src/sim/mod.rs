//! The simulation layer: one state-owning context object over the graph.
//!
//! [`Simulation`] owns the topology plus everything that happens on it:
//! in-flight packets, active attacks, the bounded event log, resettable
//! counters, and the delivery queue. There is no global instance and no
//! internal clock; the host constructs it explicitly and passes `now` into
//! every time-dependent operation, then drives deferred work by calling
//! [`Simulation::advance`] (see [`Simulation::next_delivery_due`] for the
//! next wakeup).
//!
//! All mutation goes through one `&mut` handle. Hosts that share the engine
//! across tasks wrap it in their own lock; the engine never blocks.

mod attacks;
mod events;
mod log;
mod traffic;

use crate::{
    graph::{Graph, CONGESTION_THRESHOLD},
    metrics::Metrics,
    seed,
    types::{
        Attack, AttackId, Bottleneck, Component, Degree, Device, DeviceChanges, DeviceId,
        DeviceSpec, DeviceStatus, Event, Link, LinkChanges, LinkId, LinkSpec, LinkStatus,
        LogEvent, LogId, LogLevel, NetworkMetrics, Packet, PacketId, PathAlgorithm, PathResult,
        Position, RouteAdvice, Snapshot,
    },
    Error,
};
use events::EventBus;
use futures::channel::mpsc;
use log::EventLog;
use prometheus_client::registry::Registry;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{collections::BTreeMap, time::SystemTime};
use tracing::{debug, info};
use traffic::DeliveryQueue;

/// Device load (percent) at which route advice calls a path member degraded.
const DEGRADED_LOAD: f64 = 80.0;

/// Configuration for a [`Simulation`].
#[derive(Clone, Debug)]
pub struct Config {
    /// Seed for the engine rng (address synthesis, attack propagation).
    pub seed: u64,

    /// Entries retained by the bounded event log.
    pub log_capacity: usize,

    /// Wall milliseconds of simulated transit per millisecond of a route's
    /// estimated latency.
    pub delivery_delay_factor: f64,

    /// Whether to load the demonstration topology at startup and after
    /// [`Simulation::reset`].
    pub demo_topology: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: 0,
            log_capacity: 100,
            delivery_delay_factor: 100.0,
            demo_topology: true,
        }
    }
}

/// A packet-switched network simulation.
pub struct Simulation {
    ////////////////////////////////////////
    // Configuration
    ////////////////////////////////////////
    /// Delivery delay multiplier, wall ms per estimated latency ms.
    delivery_delay_factor: f64,

    /// Reload the demonstration topology on reset.
    demo_topology: bool,

    ////////////////////////////////////////
    // Network state
    ////////////////////////////////////////
    /// The topology.
    graph: Graph,

    /// Packets currently in flight, by id.
    packets: BTreeMap<PacketId, Packet>,

    /// Every packet ever sent, lost ones included.
    history: Vec<Packet>,

    /// Active attacks, by id.
    attacks: BTreeMap<AttackId, Attack>,

    /// Deliveries scheduled against the host clock.
    queue: DeliveryQueue,

    /// Bounded, newest-first domain log.
    log: EventLog,

    ////////////////////////////////////////
    // Counters (reset with the network)
    ////////////////////////////////////////
    packets_sent: u64,
    packets_delivered: u64,
    packets_lost: u64,

    ////////////////////////////////////////
    // Plumbing
    ////////////////////////////////////////
    /// Event push channel.
    bus: EventBus,

    /// Deterministic rng for addresses and propagation sampling.
    rng: StdRng,

    /// Process-lifetime prometheus counters.
    metrics: Metrics,
}

impl Simulation {
    /// Construct a simulation, registering its metrics with `registry`.
    ///
    /// Loads the demonstration topology unless [`Config::demo_topology`] is
    /// off.
    pub fn new(cfg: Config, registry: &mut Registry, now: SystemTime) -> Self {
        let mut sim = Self {
            delivery_delay_factor: cfg.delivery_delay_factor,
            demo_topology: cfg.demo_topology,
            graph: Graph::new(),
            packets: BTreeMap::new(),
            history: Vec::new(),
            attacks: BTreeMap::new(),
            queue: DeliveryQueue::new(),
            log: EventLog::new(cfg.log_capacity),
            bus: EventBus::new(),
            packets_sent: 0,
            packets_delivered: 0,
            packets_lost: 0,
            rng: StdRng::seed_from_u64(cfg.seed),
            metrics: Metrics::init(registry),
        };
        if sim.demo_topology {
            sim.seed_demo(now);
        }
        sim
    }

    /// Drop all engine state (topology, packets, attacks, logs, counters,
    /// scheduled deliveries) and reload the demonstration topology.
    ///
    /// The prometheus counters are process-lifetime and survive.
    pub fn reset(&mut self, now: SystemTime) {
        self.graph = Graph::new();
        self.packets.clear();
        self.history.clear();
        self.attacks.clear();
        self.queue.clear();
        self.log.clear();
        self.packets_sent = 0;
        self.packets_delivered = 0;
        self.packets_lost = 0;
        self.metrics.resets.inc();
        self.bus.emit(Event::Reset);
        info!("network reset");
        if self.demo_topology {
            self.seed_demo(now);
        }
    }

    fn seed_demo(&mut self, now: SystemTime) {
        let specs = seed::devices();
        let mut created = Vec::with_capacity(specs.len());
        for spec in specs {
            match self.add_device(spec, now) {
                Ok(device) => created.push(device.id),
                Err(_) => continue,
            }
        }

        let mut established = 0;
        for def in seed::links() {
            let (Some(origin), Some(destination)) =
                (created.get(def.origin), created.get(def.destination))
            else {
                continue;
            };
            let spec = LinkSpec {
                origin: origin.clone(),
                destination: destination.clone(),
                kind: def.kind,
                latency: Some(def.latency),
                bandwidth: Some(def.bandwidth),
                loss: None,
                bidirectional: Some(true),
            };
            if self.add_link(spec, now).is_ok() {
                established += 1;
            }
        }

        self.log(LogLevel::Info, "Demo network initialized", Vec::new(), now);
        self.log(
            LogLevel::Success,
            format!("{} devices online", created.len()),
            Vec::new(),
            now,
        );
        self.log(
            LogLevel::Success,
            format!("{established} bidirectional links established"),
            Vec::new(),
            now,
        );
        self.log(LogLevel::Info, "Traffic monitoring active", Vec::new(), now);
        info!(devices = created.len(), links = established, "demo topology seeded");
    }

    ////////////////////////////////////////
    // Devices
    ////////////////////////////////////////

    /// Create a device. Missing spec fields get defaults; IP, MAC, and
    /// position are synthesized from the engine rng when unspecified.
    pub fn add_device(&mut self, spec: DeviceSpec, now: SystemTime) -> Result<Device, Error> {
        let id = DeviceId::generate(&mut self.rng);
        let ip = spec.ip.unwrap_or_else(|| self.synth_ip());
        let mac = spec.mac.unwrap_or_else(|| self.synth_mac());
        let position = spec.position.unwrap_or_else(|| Position {
            x: self.rng.gen_range(0.0..800.0),
            y: self.rng.gen_range(0.0..600.0),
        });
        let device = Device {
            id,
            name: spec.name,
            kind: spec.kind,
            status: DeviceStatus::Online,
            ip,
            mac,
            position,
            capacity: spec.capacity.unwrap_or(50),
            load: 0.0,
            packets_processed: 0,
            created_at: now,
            updated_at: now,
        };
        self.graph.add_device(device.clone())?;
        debug!(device = %device.id, name = %device.name, "device added");
        self.log(
            LogLevel::Info,
            format!("Device \"{}\" added", device.name),
            vec![device.id.clone()],
            now,
        );
        Ok(device)
    }

    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.graph.device(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.graph.devices()
    }

    /// Merge non-`None` fields of `changes` into a device.
    pub fn update_device(
        &mut self,
        id: &DeviceId,
        changes: DeviceChanges,
        now: SystemTime,
    ) -> Option<Device> {
        let device = self.graph.device_mut(id)?;
        if let Some(name) = changes.name {
            device.name = name;
        }
        if let Some(kind) = changes.kind {
            device.kind = kind;
        }
        if let Some(position) = changes.position {
            device.position = position;
        }
        if let Some(ip) = changes.ip {
            device.ip = ip;
        }
        if let Some(mac) = changes.mac {
            device.mac = mac;
        }
        if let Some(capacity) = changes.capacity {
            device.capacity = capacity;
        }
        device.updated_at = now;
        let updated = device.clone();
        debug!(device = %id, "device updated");
        Some(updated)
    }

    /// Set a device's status directly, logging the transition.
    pub fn set_device_status(
        &mut self,
        id: &DeviceId,
        status: DeviceStatus,
        now: SystemTime,
    ) -> Option<Device> {
        let device = self.graph.device_mut(id)?;
        let previous = device.status;
        device.status = status;
        device.updated_at = now;
        let updated = device.clone();
        let level = if status == DeviceStatus::Offline {
            LogLevel::Error
        } else {
            LogLevel::Info
        };
        self.log(
            level,
            format!("{}: {} -> {}", updated.name, previous, status),
            vec![id.clone()],
            now,
        );
        Some(updated)
    }

    /// Remove a device and every link touching it.
    pub fn remove_device(&mut self, id: &DeviceId, now: SystemTime) -> bool {
        let Some(device) = self.graph.remove_device(id) else {
            return false;
        };
        debug!(device = %id, name = %device.name, "device removed");
        self.log(
            LogLevel::Warning,
            format!("Device \"{}\" removed", device.name),
            vec![id.clone()],
            now,
        );
        true
    }

    ////////////////////////////////////////
    // Links
    ////////////////////////////////////////

    /// Create a link (and its mirror when bidirectional). Fails when either
    /// endpoint does not exist.
    pub fn add_link(&mut self, spec: LinkSpec, now: SystemTime) -> Result<Link, Error> {
        let id = LinkId::generate(&mut self.rng);
        let link = Link {
            id,
            origin: spec.origin,
            destination: spec.destination,
            kind: spec.kind,
            status: LinkStatus::Active,
            latency: spec.latency.unwrap_or(10.0),
            bandwidth: spec.bandwidth.unwrap_or(100.0),
            bandwidth_used: 0.0,
            loss: spec.loss.unwrap_or(0.0),
            weight: 0.0,
            bidirectional: spec.bidirectional.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        let stored = self.graph.add_link(link)?;
        debug!(
            link = %stored.id,
            origin = %stored.origin,
            destination = %stored.destination,
            weight = stored.weight,
            "link added",
        );
        Ok(stored)
    }

    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.graph.link(id)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.graph.links()
    }

    /// Set one directed record's status. The mirror of a bidirectional pair
    /// is left alone; the two directions diverge freely.
    pub fn set_link_status(
        &mut self,
        id: &LinkId,
        status: LinkStatus,
        now: SystemTime,
    ) -> Option<Link> {
        let link = self.graph.link_mut(id)?;
        link.status = status;
        link.updated_at = now;
        Some(link.clone())
    }

    /// Merge non-`None` fields of `changes` into one directed record, then
    /// recompute its weight (and the mirror's, from the mirror's own
    /// attributes).
    pub fn update_link(
        &mut self,
        id: &LinkId,
        changes: LinkChanges,
        now: SystemTime,
    ) -> Option<Link> {
        let link = self.graph.link_mut(id)?;
        if let Some(latency) = changes.latency {
            link.latency = latency;
        }
        if let Some(bandwidth) = changes.bandwidth {
            link.bandwidth = bandwidth;
        }
        if let Some(bandwidth_used) = changes.bandwidth_used {
            link.bandwidth_used = bandwidth_used;
        }
        if let Some(loss) = changes.loss {
            link.loss = loss;
        }
        self.graph.refresh_weight(id, now)?;
        let updated = self.graph.link(id)?.clone();
        debug!(link = %id, weight = updated.weight, "link updated");
        Some(updated)
    }

    /// Remove a link record; for a bidirectional pair, both directions.
    pub fn remove_link(&mut self, id: &LinkId, now: SystemTime) -> bool {
        let Some(link) = self.graph.remove_link(id) else {
            return false;
        };
        debug!(link = %id, "link removed");
        self.log(
            LogLevel::Warning,
            "Link removed",
            vec![link.origin, link.destination],
            now,
        );
        true
    }

    ////////////////////////////////////////
    // Pathfinding
    ////////////////////////////////////////

    pub fn find_path(
        &self,
        origin: &DeviceId,
        destination: &DeviceId,
        algorithm: PathAlgorithm,
    ) -> PathResult {
        self.graph.find_path(origin, destination, algorithm)
    }

    pub fn find_route_by_bandwidth(
        &self,
        origin: &DeviceId,
        destination: &DeviceId,
    ) -> PathResult {
        self.graph.find_route_by_bandwidth(origin, destination)
    }

    /// Primary (cheapest) route plus any structurally different BFS/DFS
    /// alternatives, with a short explanation of why they might matter.
    pub fn recommend_routes(&self, origin: &DeviceId, destination: &DeviceId) -> RouteAdvice {
        let primary = self.graph.find_path(origin, destination, PathAlgorithm::Dijkstra);
        let mut alternatives: Vec<PathResult> = Vec::new();
        if primary.found {
            for algorithm in [PathAlgorithm::Bfs, PathAlgorithm::Dfs] {
                let candidate = self.graph.find_path(origin, destination, algorithm);
                if candidate.found
                    && candidate.path != primary.path
                    && !alternatives.iter().any(|a| a.path == candidate.path)
                {
                    alternatives.push(candidate);
                }
            }
        }

        let reason = if !primary.found {
            "destination unreachable from origin".to_string()
        } else if self.route_is_degraded(&primary.path) {
            "primary route crosses degraded devices".to_string()
        } else if self.route_is_congested(&primary.path) {
            "primary route crosses congested links".to_string()
        } else if alternatives.is_empty() {
            "primary route is the only viable path".to_string()
        } else {
            "alternatives available for redundancy".to_string()
        };

        RouteAdvice {
            primary,
            alternatives,
            reason,
        }
    }

    /// A path member is degraded when it is not Online (traversal gates every
    /// member but the origin) or its load sits at [`DEGRADED_LOAD`] or above.
    fn route_is_degraded(&self, path: &[DeviceId]) -> bool {
        path.iter().any(|id| {
            self.graph.device(id).is_some_and(|device| {
                device.status != DeviceStatus::Online || device.load >= DEGRADED_LOAD
            })
        })
    }

    fn route_is_congested(&self, path: &[DeviceId]) -> bool {
        path.windows(2).any(|pair| {
            self.graph
                .row(&pair[0])
                .and_then(|row| row.find_first(&pair[1]))
                .and_then(|entry| self.graph.link(&entry.link))
                .is_some_and(|link| link.utilization() > CONGESTION_THRESHOLD)
        })
    }

    ////////////////////////////////////////
    // Analysis
    ////////////////////////////////////////

    pub fn connected_components(&self) -> Vec<Component> {
        self.graph.connected_components()
    }

    pub fn bottlenecks(&self) -> Vec<Bottleneck> {
        self.graph.bottlenecks()
    }

    pub fn degrees(&self) -> BTreeMap<DeviceId, Degree> {
        self.graph.degrees()
    }

    pub fn articulation_points(&self) -> Vec<DeviceId> {
        self.graph.articulation_points()
    }

    pub fn mean_path_length(&self) -> f64 {
        self.graph.mean_path_length()
    }

    ////////////////////////////////////////
    // Failures and recovery
    ////////////////////////////////////////

    /// Force a device Offline.
    pub fn fail_device(&mut self, id: &DeviceId, now: SystemTime) -> bool {
        let Some(device) = self.graph.device_mut(id) else {
            return false;
        };
        device.status = DeviceStatus::Offline;
        device.updated_at = now;
        let name = device.name.clone();
        debug!(device = %id, "device failure injected");
        self.log(LogLevel::Error, format!("{name} went offline"), vec![id.clone()], now);
        self.bus.emit(Event::DeviceFailed(id.clone()));
        true
    }

    /// Bring a device back Online and clear its load.
    pub fn recover_device(&mut self, id: &DeviceId, now: SystemTime) -> bool {
        let Some(device) = self.graph.device_mut(id) else {
            return false;
        };
        device.status = DeviceStatus::Online;
        device.load = 0.0;
        device.updated_at = now;
        let name = device.name.clone();
        debug!(device = %id, "device recovered");
        self.log(
            LogLevel::Success,
            format!("{name} back online"),
            vec![id.clone()],
            now,
        );
        self.bus.emit(Event::DeviceRecovered(id.clone()));
        true
    }

    /// Deactivate one directed link record.
    pub fn fail_link(&mut self, id: &LinkId, now: SystemTime) -> bool {
        let Some(link) = self.graph.link_mut(id) else {
            return false;
        };
        link.status = LinkStatus::Inactive;
        link.updated_at = now;
        let endpoints = vec![link.origin.clone(), link.destination.clone()];
        debug!(link = %id, "link failure injected");
        self.log(LogLevel::Error, "Link disconnected", endpoints, now);
        self.bus.emit(Event::LinkFailed(id.clone()));
        true
    }

    /// Reactivate one directed link record.
    pub fn recover_link(&mut self, id: &LinkId, now: SystemTime) -> bool {
        let Some(link) = self.graph.link_mut(id) else {
            return false;
        };
        link.status = LinkStatus::Active;
        link.updated_at = now;
        let endpoints = vec![link.origin.clone(), link.destination.clone()];
        debug!(link = %id, "link recovered");
        self.log(LogLevel::Success, "Link restored", endpoints, now);
        self.bus.emit(Event::LinkRecovered(id.clone()));
        true
    }

    /// Force several devices Offline at once (a power outage). Unknown ids
    /// are skipped; returns the devices actually affected.
    pub fn simulate_outage(&mut self, ids: &[DeviceId], now: SystemTime) -> Vec<DeviceId> {
        let mut affected = Vec::new();
        for id in ids {
            let Some(device) = self.graph.device_mut(id) else {
                continue;
            };
            device.status = DeviceStatus::Offline;
            device.updated_at = now;
            affected.push(id.clone());
            self.bus.emit(Event::DeviceFailed(id.clone()));
        }
        if !affected.is_empty() {
            debug!(devices = affected.len(), "power outage simulated");
            self.log(
                LogLevel::Error,
                format!("Power outage: {} devices offline", affected.len()),
                affected.clone(),
                now,
            );
        }
        affected
    }

    ////////////////////////////////////////
    // Observation
    ////////////////////////////////////////

    /// Recompute the derived statistics snapshot.
    pub fn metrics(&self) -> NetworkMetrics {
        let total_devices = self.graph.device_count();
        let online_devices = self
            .graph
            .devices()
            .filter(|d| d.status == DeviceStatus::Online)
            .count();
        let total_links = self.graph.link_count();

        let mut active_links = 0;
        let mut latency_sum = 0.0;
        let mut available_bandwidth = 0.0;
        let mut congested_links = 0;
        for link in self.graph.links() {
            if link.status == LinkStatus::Active {
                active_links += 1;
            }
            latency_sum += link.latency;
            available_bandwidth += link.bandwidth - link.bandwidth_used;
            if link.utilization() > CONGESTION_THRESHOLD {
                congested_links += 1;
            }
        }

        NetworkMetrics {
            total_devices,
            online_devices,
            offline_devices: total_devices - online_devices,
            total_links,
            active_links,
            packets_sent: self.packets_sent,
            packets_delivered: self.packets_delivered,
            packets_lost: self.packets_lost,
            mean_latency: if total_links > 0 {
                latency_sum / total_links as f64
            } else {
                0.0
            },
            available_bandwidth,
            congested_links,
            compromised_devices: self
                .graph
                .devices()
                .filter(|d| d.status == DeviceStatus::Compromised)
                .count(),
            active_attacks: self.attacks.len(),
        }
    }

    /// Full state for hosts pushing to clients, with the newest `log_limit`
    /// log entries.
    pub fn snapshot(&self, log_limit: usize) -> Snapshot {
        Snapshot {
            devices: self.graph.devices().cloned().collect(),
            links: self.graph.links().cloned().collect(),
            metrics: self.metrics(),
            packets: self.packets.values().cloned().collect(),
            attacks: self.attacks.values().cloned().collect(),
            logs: self.log.recent(log_limit),
        }
    }

    /// All retained log entries, newest first.
    pub fn logs(&self) -> Vec<LogEvent> {
        self.log.iter().cloned().collect()
    }

    /// Receive every future [`Event`] as it happens. The engine never blocks
    /// on slow subscribers; dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Event> {
        self.bus.subscribe()
    }

    ////////////////////////////////////////
    // Internals
    ////////////////////////////////////////

    fn log(
        &mut self,
        level: LogLevel,
        message: impl Into<String>,
        devices: Vec<DeviceId>,
        now: SystemTime,
    ) {
        let id = LogId::generate(&mut self.rng);
        self.log.record(LogEvent {
            id,
            at: now,
            level,
            message: message.into(),
            devices,
        });
    }

    fn synth_ip(&mut self) -> String {
        format!(
            "192.168.{}.{}",
            self.rng.gen_range(0..255u8),
            self.rng.gen_range(0..255u8),
        )
    }

    fn synth_mac(&mut self) -> String {
        let octets: Vec<String> = (0..6)
            .map(|_| format!("{:02X}", self.rng.gen::<u8>()))
            .collect();
        octets.join(":")
    }
}
