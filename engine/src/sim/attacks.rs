//! Attack lifecycle: launch, immediate effects, malware propagation, and
//! teardown.

use super::Simulation;
use crate::{
    metrics::AttackLabel,
    types::{Attack, AttackId, AttackKind, AttackSpec, DeviceId, DeviceStatus, Event, LogLevel},
};
use rand::Rng;
use std::time::SystemTime;
use tracing::{debug, warn};

impl Simulation {
    /// Launch an attack against a set of targets.
    ///
    /// DoS and DDoS add the attack's intensity to each target's load (clamped
    /// to 100) and mark the target Congested once load reaches 90. Malware,
    /// man-in-the-middle, and malicious-router attacks mark targets
    /// Compromised. Unknown target ids stay on the record but have no effect.
    pub fn start_attack(&mut self, spec: AttackSpec, now: SystemTime) -> Attack {
        let intensity = spec.intensity.unwrap_or(50).min(100);
        let id = AttackId::generate(&mut self.rng);
        let attack = Attack {
            id,
            kind: spec.kind,
            targets: spec.targets,
            intensity,
            propagates: spec.kind.propagates(),
            active: true,
            started_at: now,
        };

        for target in &attack.targets {
            let Some(device) = self.graph.device_mut(target) else {
                continue;
            };
            match attack.kind {
                AttackKind::Dos | AttackKind::Ddos => {
                    device.load = (device.load + f64::from(intensity)).min(100.0);
                    if device.load >= 90.0 {
                        device.status = DeviceStatus::Congested;
                    }
                }
                AttackKind::Malware | AttackKind::Mitm | AttackKind::MaliciousRouter => {
                    device.status = DeviceStatus::Compromised;
                }
            }
            device.updated_at = now;
        }

        self.attacks.insert(attack.id.clone(), attack.clone());
        self.metrics
            .attacks_started
            .get_or_create(&AttackLabel::from(attack.kind))
            .inc();
        warn!(
            attack = %attack.id,
            kind = %attack.kind,
            targets = attack.targets.len(),
            "attack launched",
        );
        self.log(
            LogLevel::Attack,
            format!("{} attack launched", attack.kind),
            attack.targets.clone(),
            now,
        );
        self.bus.emit(Event::AttackStarted(attack.clone()));
        attack
    }

    /// Neutralize an attack. Every target, including devices infected by
    /// propagation, returns Online and sheds the attack's intensity of load.
    pub fn stop_attack(&mut self, id: &AttackId, now: SystemTime) -> bool {
        let Some(attack) = self.attacks.remove(id) else {
            return false;
        };
        for target in &attack.targets {
            if let Some(device) = self.graph.device_mut(target) {
                device.status = DeviceStatus::Online;
                device.load = (device.load - f64::from(attack.intensity)).max(0.0);
                device.updated_at = now;
            }
        }
        debug!(attack = %id, "attack neutralized");
        self.log(LogLevel::Success, "Attack neutralized", attack.targets, now);
        self.bus.emit(Event::AttackStopped(id.clone()));
        true
    }

    /// Attacks currently in progress.
    pub fn active_attacks(&self) -> impl Iterator<Item = &Attack> {
        self.attacks.values()
    }

    /// Spread a propagating attack one round.
    ///
    /// Every traversable neighbor of a currently compromised device is
    /// infected with probability `intensity / 100`. Newly infected devices
    /// join the attack's target list so a later [`Simulation::stop_attack`]
    /// heals them too. Returns the devices infected this round; empty for
    /// unknown or non-propagating attacks.
    pub fn propagate_malware(&mut self, id: &AttackId, now: SystemTime) -> Vec<DeviceId> {
        let Some(attack) = self.attacks.get(id) else {
            return Vec::new();
        };
        if !attack.propagates {
            return Vec::new();
        }
        let probability = f64::from(attack.intensity) / 100.0;

        // Exposure set: traversable neighbors of every compromised device,
        // in deterministic discovery order.
        let compromised: Vec<DeviceId> = self
            .graph
            .devices()
            .filter(|d| d.status == DeviceStatus::Compromised)
            .map(|d| d.id.clone())
            .collect();
        let mut exposed: Vec<DeviceId> = Vec::new();
        for source in &compromised {
            let Some(row) = self.graph.row(source) else {
                continue;
            };
            for entry in row {
                if self.graph.traversable(entry) && !exposed.contains(&entry.destination) {
                    exposed.push(entry.destination.clone());
                }
            }
        }

        let mut infected = Vec::new();
        for candidate in exposed {
            if !self.rng.gen_bool(probability) {
                continue;
            }
            let Some(device) = self.graph.device_mut(&candidate) else {
                continue;
            };
            device.status = DeviceStatus::Compromised;
            device.updated_at = now;
            infected.push(candidate);
        }

        if !infected.is_empty() {
            if let Some(attack) = self.attacks.get_mut(id) {
                attack.targets.extend(infected.iter().cloned());
            }
            warn!(attack = %id, infected = infected.len(), "malware spread");
            self.log(
                LogLevel::Attack,
                format!("Malware spread to {} devices", infected.len()),
                infected.clone(),
                now,
            );
        }
        infected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::tests::{add_device, add_link, at, simulation};
    use test_case::test_case;

    #[test]
    fn dos_attack_loads_the_target() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");

        let attack = sim.start_attack(
            AttackSpec {
                kind: AttackKind::Dos,
                targets: vec![a.clone()],
                intensity: Some(50),
            },
            at(0),
        );
        assert_eq!(attack.intensity, 50);
        assert!(!attack.propagates);

        let device = sim.device(&a).unwrap();
        assert_eq!(device.load, 50.0);
        // Below the congestion threshold: still Online.
        assert_eq!(device.status, DeviceStatus::Online);

        // A second wave pushes load to the clamp and congests.
        sim.start_attack(
            AttackSpec {
                kind: AttackKind::Ddos,
                targets: vec![a.clone()],
                intensity: Some(60),
            },
            at(1),
        );
        let device = sim.device(&a).unwrap();
        assert_eq!(device.load, 100.0);
        assert_eq!(device.status, DeviceStatus::Congested);
    }

    #[test]
    fn intensity_is_clamped_and_defaulted() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");

        let excessive = sim.start_attack(
            AttackSpec {
                kind: AttackKind::Dos,
                targets: vec![a.clone()],
                intensity: Some(250),
            },
            at(0),
        );
        assert_eq!(excessive.intensity, 100);

        let defaulted = sim.start_attack(
            AttackSpec {
                kind: AttackKind::Dos,
                targets: vec![a],
                intensity: None,
            },
            at(1),
        );
        assert_eq!(defaulted.intensity, 50);
    }

    #[test_case(AttackKind::Malware; "malware")]
    #[test_case(AttackKind::Mitm; "mitm")]
    #[test_case(AttackKind::MaliciousRouter; "malicious router")]
    fn intrusion_compromises_the_target(kind: AttackKind) {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");
        sim.start_attack(
            AttackSpec {
                kind,
                targets: vec![a.clone()],
                intensity: None,
            },
            at(0),
        );
        assert_eq!(sim.device(&a).unwrap().status, DeviceStatus::Compromised);
    }

    #[test]
    fn stop_attack_restores_every_target() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");
        let b = add_device(&mut sim, "b");
        let mut events = sim.subscribe();

        let attack = sim.start_attack(
            AttackSpec {
                kind: AttackKind::Ddos,
                targets: vec![a.clone(), b.clone()],
                intensity: Some(95),
            },
            at(0),
        );
        assert_eq!(sim.device(&a).unwrap().status, DeviceStatus::Congested);
        assert_eq!(sim.active_attacks().count(), 1);
        assert!(matches!(
            events.try_next(),
            Ok(Some(Event::AttackStarted(_)))
        ));

        assert!(sim.stop_attack(&attack.id, at(1)));
        for id in [&a, &b] {
            let device = sim.device(id).unwrap();
            assert_eq!(device.status, DeviceStatus::Online);
            assert_eq!(device.load, 0.0);
        }
        assert_eq!(sim.active_attacks().count(), 0);
        assert!(matches!(
            events.try_next(),
            Ok(Some(Event::AttackStopped(stopped))) if stopped == attack.id
        ));

        assert!(!sim.stop_attack(&AttackId::from("ghost"), at(2)));
    }

    #[test]
    fn malware_spreads_to_traversable_neighbors() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");
        let b = add_device(&mut sim, "b");
        let c = add_device(&mut sim, "c");
        add_link(&mut sim, &a, &b, 5.0);
        add_link(&mut sim, &b, &c, 5.0);

        // Full intensity: every exposed neighbor is infected.
        let attack = sim.start_attack(
            AttackSpec {
                kind: AttackKind::Malware,
                targets: vec![a.clone()],
                intensity: Some(100),
            },
            at(0),
        );
        assert!(attack.propagates);

        let infected = sim.propagate_malware(&attack.id, at(1));
        assert_eq!(infected, vec![b.clone()]);
        assert_eq!(sim.device(&b).unwrap().status, DeviceStatus::Compromised);

        // The second round reaches c through b.
        let infected = sim.propagate_malware(&attack.id, at(2));
        assert_eq!(infected, vec![c.clone()]);

        // Everyone compromised: nothing left to expose.
        assert!(sim.propagate_malware(&attack.id, at(3)).is_empty());

        // Stopping heals the infected devices too.
        let recorded = sim.active_attacks().next().unwrap().targets.clone();
        assert_eq!(recorded, vec![a.clone(), b.clone(), c.clone()]);
        sim.stop_attack(&attack.id, at(4));
        for id in [&a, &b, &c] {
            assert_eq!(sim.device(id).unwrap().status, DeviceStatus::Online);
        }
    }

    #[test]
    fn malware_does_not_cross_dead_segments() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");
        let b = add_device(&mut sim, "b");
        let c = add_device(&mut sim, "c");
        let ab = add_link(&mut sim, &a, &b, 5.0);
        add_link(&mut sim, &a, &c, 5.0);
        sim.fail_link(&ab.id, at(0));
        sim.fail_device(&c, at(0));

        let attack = sim.start_attack(
            AttackSpec {
                kind: AttackKind::Malware,
                targets: vec![a],
                intensity: Some(100),
            },
            at(1),
        );
        // b sits behind an inactive link, c is offline.
        assert!(sim.propagate_malware(&attack.id, at(2)).is_empty());
    }

    #[test]
    fn propagation_requires_a_propagating_attack() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");
        let b = add_device(&mut sim, "b");
        add_link(&mut sim, &a, &b, 5.0);

        let dos = sim.start_attack(
            AttackSpec {
                kind: AttackKind::Dos,
                targets: vec![a],
                intensity: Some(100),
            },
            at(0),
        );
        assert!(sim.propagate_malware(&dos.id, at(1)).is_empty());
        assert!(sim
            .propagate_malware(&AttackId::from("ghost"), at(2))
            .is_empty());
    }

    #[test]
    fn attack_log_names_the_kind() {
        let mut sim = simulation();
        let a = add_device(&mut sim, "a");
        sim.start_attack(
            AttackSpec {
                kind: AttackKind::Ddos,
                targets: vec![a],
                intensity: None,
            },
            at(0),
        );
        let logs = sim.logs();
        assert_eq!(logs[0].level, LogLevel::Attack);
        assert_eq!(logs[0].message, "DDoS attack launched");
    }
}
