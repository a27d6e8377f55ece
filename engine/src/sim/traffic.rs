//! Packet lifecycle: resolve a route at send time, hold the packet in flight
//! until the host clock passes its transit time, then deliver.
//!
//! There are no internal timers. [`Simulation::send_packet`] schedules the
//! delivery instant into a queue; the host calls [`Simulation::advance`] with
//! its current clock to complete every transit that has elapsed, and
//! [`Simulation::next_delivery_due`] to learn when to wake up next.

use super::Simulation;
use crate::types::{
    BroadcastReport, DeviceId, Event, LogLevel, Packet, PacketId, PacketSpec, PacketStatus,
};
use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap, VecDeque},
    time::{Duration, SystemTime},
};
use tracing::debug;

/// Deliveries scheduled against the host clock, soonest first.
pub(super) struct DeliveryQueue {
    pending: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

/// Field order matters: `due` first, then `seq` so simultaneous deliveries
/// drain in schedule order.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct Scheduled {
    due: SystemTime,
    seq: u64,
    packet: PacketId,
}

impl DeliveryQueue {
    pub(super) fn new() -> Self {
        Self {
            pending: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub(super) fn schedule(&mut self, due: SystemTime, packet: PacketId) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Reverse(Scheduled { due, seq, packet }));
    }

    /// When the soonest pending delivery completes, if any.
    pub(super) fn next_due(&self) -> Option<SystemTime> {
        self.pending.peek().map(|Reverse(s)| s.due)
    }

    /// Pop the soonest delivery if its transit has completed by `now`.
    pub(super) fn pop_due(&mut self, now: SystemTime) -> Option<PacketId> {
        if self.pending.peek().is_some_and(|Reverse(s)| s.due <= now) {
            return self.pending.pop().map(|Reverse(s)| s.packet);
        }
        None
    }

    pub(super) fn clear(&mut self) {
        self.pending.clear();
    }
}

impl Simulation {
    /// Resolve a route and put a packet on the wire.
    ///
    /// The sent counter increments whether or not a route exists. Packets
    /// with no route are final immediately (Lost, empty route, infinite
    /// latency). Routable packets enter the active set and deliver once the
    /// host clock passes `estimated_latency` scaled by the configured delay
    /// factor.
    pub fn send_packet(&mut self, spec: PacketSpec, now: SystemTime) -> Packet {
        let algorithm = spec.algorithm.unwrap_or_default();
        let result = self
            .graph
            .find_path(&spec.origin, &spec.destination, algorithm);

        self.packets_sent += 1;
        self.metrics.packets_sent.inc();

        let id = PacketId::generate(&mut self.rng);
        let mut packet = Packet {
            id,
            origin: spec.origin,
            destination: spec.destination,
            size: spec.size.unwrap_or(64),
            priority: spec.priority.unwrap_or(5),
            ttl: 64,
            status: PacketStatus::Sending,
            route: result.path,
            route_taken: Vec::new(),
            estimated_latency: result.latency,
            created_at: now,
            delivered_at: None,
        };

        if result.found {
            let transit = Duration::from_millis(
                (packet.estimated_latency * self.delivery_delay_factor) as u64,
            );
            self.queue.schedule(now + transit, packet.id.clone());
            self.packets.insert(packet.id.clone(), packet.clone());
            let origin_name = self
                .graph
                .device(&packet.origin)
                .map(|d| d.name.clone())
                .unwrap_or_default();
            let destination_name = self
                .graph
                .device(&packet.destination)
                .map(|d| d.name.clone())
                .unwrap_or_default();
            debug!(
                packet = %packet.id,
                hops = packet.route.len().saturating_sub(1),
                latency = packet.estimated_latency,
                "packet sent",
            );
            self.log(
                LogLevel::Info,
                format!("Packet sent from {origin_name} to {destination_name}"),
                packet.route.clone(),
                now,
            );
        } else {
            packet.status = PacketStatus::Lost;
            self.packets_lost += 1;
            self.metrics.packets_lost.inc();
            debug!(
                origin = %packet.origin,
                destination = %packet.destination,
                "packet lost, no route",
            );
            self.log(
                LogLevel::Error,
                "Failed to send packet: no route found",
                vec![packet.origin.clone(), packet.destination.clone()],
                now,
            );
        }

        self.history.push(packet.clone());
        self.bus.emit(Event::PacketSent(packet.clone()));
        packet
    }

    /// Complete every delivery whose transit has elapsed by `now`, soonest
    /// first. Returns the delivered packets.
    pub fn advance(&mut self, now: SystemTime) -> Vec<Packet> {
        let mut delivered = Vec::new();
        while let Some(id) = self.queue.pop_due(now) {
            if let Some(packet) = self.deliver(&id, now) {
                delivered.push(packet);
            }
        }
        delivered
    }

    fn deliver(&mut self, id: &PacketId, now: SystemTime) -> Option<Packet> {
        let mut packet = self.packets.remove(id)?;
        packet.status = PacketStatus::Delivered;
        packet.route_taken = packet.route.clone();
        packet.delivered_at = Some(now);

        for device_id in &packet.route {
            if let Some(device) = self.graph.device_mut(device_id) {
                device.packets_processed += 1;
            }
        }

        self.packets_delivered += 1;
        self.metrics.packets_delivered.inc();

        // The history entry tracks the packet through its lifecycle.
        if let Some(entry) = self.history.iter_mut().rev().find(|p| &p.id == id) {
            *entry = packet.clone();
        }

        debug!(packet = %id, "packet delivered");
        self.log(
            LogLevel::Success,
            "Packet delivered successfully",
            packet.route.clone(),
            now,
        );
        self.bus.emit(Event::PacketDelivered(packet.clone()));
        Some(packet)
    }

    /// When the soonest in-flight packet completes, if any. Hosts use this to
    /// pick their next wakeup.
    pub fn next_delivery_due(&self) -> Option<SystemTime> {
        self.queue.next_due()
    }

    /// Packets currently in flight.
    pub fn active_packets(&self) -> impl Iterator<Item = &Packet> {
        self.packets.values()
    }

    /// Every packet ever sent since the last reset, lost ones included, in
    /// send order.
    pub fn packet_history(&self) -> &[Packet] {
        &self.history
    }

    /// Flood from `origin` across traversable edges and report what it
    /// reaches. Returns `None` for an unknown origin.
    pub fn simulate_broadcast(
        &mut self,
        origin: &DeviceId,
        now: SystemTime,
    ) -> Option<BroadcastReport> {
        let origin_name = self.graph.device(origin)?.name.clone();

        let mut hops: HashMap<DeviceId, usize> = HashMap::from([(origin.clone(), 0)]);
        let mut latency: HashMap<DeviceId, f64> = HashMap::from([(origin.clone(), 0.0)]);
        let mut queue = VecDeque::from([(origin.clone(), 0usize, 0.0f64)]);
        while let Some((current, current_hops, current_latency)) = queue.pop_front() {
            let Some(row) = self.graph.row(&current) else {
                continue;
            };
            for entry in row {
                if hops.contains_key(&entry.destination) || !self.graph.traversable(entry) {
                    continue;
                }
                let step = self.graph.link(&entry.link).map_or(0.0, |l| l.latency);
                hops.insert(entry.destination.clone(), current_hops + 1);
                latency.insert(entry.destination.clone(), current_latency + step);
                queue.push_back((entry.destination.clone(), current_hops + 1, current_latency + step));
            }
        }

        let mut reached: Vec<DeviceId> = hops.keys().filter(|d| *d != origin).cloned().collect();
        reached.sort();
        let max_hops = hops.values().copied().max().unwrap_or(0);
        let total_latency = latency.values().copied().fold(0.0, f64::max);

        debug!(origin = %origin, reached = reached.len(), "broadcast simulated");
        self.log(
            LogLevel::Info,
            format!("Broadcast from {origin_name} reached {} devices", reached.len()),
            vec![origin.clone()],
            now,
        );
        Some(BroadcastReport {
            origin: origin.clone(),
            reached,
            max_hops,
            total_latency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sim::tests::{add_device, add_link, at, simulation},
        types::{DeviceStatus, PathAlgorithm},
    };

    #[test]
    fn packet_takes_spec_defaults() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");
        let b = add_device(&mut sim, "b");
        add_link(&mut sim, &a, &b, 10.0);
        let mut events = sim.subscribe();

        let packet = sim.send_packet(PacketSpec::new(a.clone(), b.clone()), at(0));

        assert_eq!(packet.status, PacketStatus::Sending);
        assert_eq!(packet.size, 64);
        assert_eq!(packet.priority, 5);
        assert_eq!(packet.ttl, 64);
        assert_eq!(packet.route, vec![a, b]);
        assert_eq!(packet.estimated_latency, 10.0);
        assert_eq!(sim.metrics().packets_sent, 1);
        assert_eq!(sim.active_packets().count(), 1);
        assert_eq!(sim.packet_history().len(), 1);
        assert!(matches!(events.try_next(), Ok(Some(Event::PacketSent(_)))));
    }

    #[test]
    fn unroutable_packet_is_lost_immediately() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");
        let b = add_device(&mut sim, "b");
        // No link between them.

        let packet = sim.send_packet(PacketSpec::new(a, b), at(0));

        assert_eq!(packet.status, PacketStatus::Lost);
        assert!(packet.route.is_empty());
        assert!(packet.estimated_latency.is_infinite());
        assert_eq!(sim.metrics().packets_sent, 1);
        assert_eq!(sim.metrics().packets_lost, 1);
        assert_eq!(sim.active_packets().count(), 0);
        assert!(sim.next_delivery_due().is_none());
        // Lost packets still land in history.
        assert_eq!(sim.packet_history()[0].status, PacketStatus::Lost);
        assert_eq!(sim.logs()[0].message, "Failed to send packet: no route found");
    }

    #[test]
    fn delivery_completes_when_the_clock_passes_transit() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");
        let b = add_device(&mut sim, "b");
        add_link(&mut sim, &a, &b, 10.0);
        let mut events = sim.subscribe();

        let packet = sim.send_packet(PacketSpec::new(a.clone(), b.clone()), at(0));
        // 10 ms of latency at the default factor: due at 1000 ms.
        assert_eq!(sim.next_delivery_due(), Some(at(1000)));

        assert!(sim.advance(at(999)).is_empty());
        let delivered = sim.advance(at(1000));
        assert_eq!(delivered.len(), 1);
        let delivered = &delivered[0];
        assert_eq!(delivered.id, packet.id);
        assert_eq!(delivered.status, PacketStatus::Delivered);
        assert_eq!(delivered.route_taken, delivered.route);
        assert_eq!(delivered.delivered_at, Some(at(1000)));

        assert_eq!(sim.active_packets().count(), 0);
        assert_eq!(sim.metrics().packets_delivered, 1);
        assert_eq!(sim.device(&a).unwrap().packets_processed, 1);
        assert_eq!(sim.device(&b).unwrap().packets_processed, 1);
        // History reflects the final state of the same packet.
        assert_eq!(sim.packet_history()[0].status, PacketStatus::Delivered);

        assert!(matches!(events.try_next(), Ok(Some(Event::PacketSent(_)))));
        assert!(matches!(
            events.try_next(),
            Ok(Some(Event::PacketDelivered(_)))
        ));
    }

    #[test]
    fn deliveries_drain_soonest_first() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");
        let b = add_device(&mut sim, "b");
        let c = add_device(&mut sim, "c");
        add_link(&mut sim, &a, &b, 10.0);
        add_link(&mut sim, &a, &c, 5.0);

        let slow = sim.send_packet(PacketSpec::new(a.clone(), b), at(0));
        let fast = sim.send_packet(PacketSpec::new(a, c), at(0));

        let delivered = sim.advance(at(5000));
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].id, fast.id);
        assert_eq!(delivered[1].id, slow.id);
    }

    #[test]
    fn reset_cancels_scheduled_deliveries() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");
        let b = add_device(&mut sim, "b");
        add_link(&mut sim, &a, &b, 10.0);

        sim.send_packet(PacketSpec::new(a, b), at(0));
        sim.reset(at(1));

        assert!(sim.advance(at(60_000)).is_empty());
        assert_eq!(sim.metrics().packets_delivered, 0);
        assert!(sim.packet_history().is_empty());
    }

    #[test]
    fn packet_respects_the_requested_algorithm() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");
        let b = add_device(&mut sim, "b");
        let c = add_device(&mut sim, "c");
        add_link(&mut sim, &a, &b, 5.0);
        add_link(&mut sim, &b, &c, 5.0);
        add_link(&mut sim, &a, &c, 80.0);

        let mut spec = PacketSpec::new(a.clone(), c.clone());
        spec.algorithm = Some(PathAlgorithm::Bfs);
        let packet = sim.send_packet(spec, at(0));
        // BFS takes the direct hop regardless of weight.
        assert_eq!(packet.route, vec![a, c]);
        assert_eq!(packet.estimated_latency, 80.0);
    }

    #[test]
    fn broadcast_skips_unreachable_devices() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");
        let b = add_device(&mut sim, "b");
        let c = add_device(&mut sim, "c");
        let d = add_device(&mut sim, "d");
        add_link(&mut sim, &a, &b, 5.0);
        add_link(&mut sim, &b, &c, 5.0);
        add_link(&mut sim, &b, &d, 5.0);
        sim.set_device_status(&d, DeviceStatus::Offline, at(0));

        let report = sim.simulate_broadcast(&a, at(1)).unwrap();

        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(report.reached, expected);
        assert_eq!(report.max_hops, 2);
        assert_eq!(report.total_latency, 10.0);

        assert!(sim
            .simulate_broadcast(&DeviceId::from("ghost"), at(2))
            .is_none());
    }
}
