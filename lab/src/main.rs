//! Run scripted failure, traffic, and attack scenarios against a simulated
//! network.
//!
//! Each scenario starts from the demonstration topology with a seeded rng and
//! a virtual clock, drives the engine through a short script, and prints a
//! timestamped report (text by default, JSON with `--json`). Runs are fully
//! deterministic for a given seed.

use clap::{value_parser, Arg, Command};
use meshsim_engine::{
    types::{
        AttackKind, AttackSpec, DeviceId, DeviceKind, NetworkMetrics, PacketSpec, PathAlgorithm,
    },
    Config, Simulation,
};
use prometheus_client::registry::Registry;
use serde::Serialize;
use std::{
    fmt,
    str::FromStr,
    time::{Duration, SystemTime},
};
use tracing::info;

/// A scripted scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scenario {
    /// Every host floods the core with packets; all of them deliver.
    TrafficBurst,
    /// A backbone link is cut mid-service and traffic reroutes.
    LinkFailure,
    /// A DDoS wave congests the core until it is mitigated.
    DdosWave,
    /// Malware spreads from the legacy segment until neutralized.
    MalwareOutbreak,
}

impl Scenario {
    fn all() -> [Self; 4] {
        [
            Self::TrafficBurst,
            Self::LinkFailure,
            Self::DdosWave,
            Self::MalwareOutbreak,
        ]
    }

    fn name(&self) -> &'static str {
        match self {
            Self::TrafficBurst => "traffic-burst",
            Self::LinkFailure => "link-failure",
            Self::DdosWave => "ddos-wave",
            Self::MalwareOutbreak => "malware-outbreak",
        }
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "traffic-burst" => Ok(Self::TrafficBurst),
            "link-failure" => Ok(Self::LinkFailure),
            "ddos-wave" => Ok(Self::DdosWave),
            "malware-outbreak" => Ok(Self::MalwareOutbreak),
            other => Err(format!(
                "unknown scenario: {other} (expected traffic-burst, link-failure, ddos-wave, or malware-outbreak)"
            )),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Virtual clock. Scenarios run in simulated milliseconds from a fixed epoch,
/// so reports are reproducible.
struct Clock {
    now: SystemTime,
}

impl Clock {
    fn new() -> Self {
        Self {
            now: SystemTime::UNIX_EPOCH,
        }
    }

    fn now(&self) -> SystemTime {
        self.now
    }

    fn tick(&mut self, ms: u64) -> SystemTime {
        self.now += Duration::from_millis(ms);
        self.now
    }

    fn advance_to(&mut self, t: SystemTime) -> SystemTime {
        if t > self.now {
            self.now = t;
        }
        self.now
    }

    fn elapsed_ms(&self) -> u64 {
        self.now
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }
}

/// One timestamped observation within a scenario run.
#[derive(Debug, Serialize)]
struct Step {
    at_ms: u64,
    note: String,
}

/// The full outcome of one scenario run.
#[derive(Debug, Serialize)]
struct Report {
    scenario: &'static str,
    seed: u64,
    steps: Vec<Step>,
    metrics: NetworkMetrics,
}

impl Report {
    fn new(scenario: Scenario, seed: u64) -> Self {
        Self {
            scenario: scenario.name(),
            seed,
            steps: Vec::new(),
            metrics: NetworkMetrics::default(),
        }
    }

    fn note(&mut self, clock: &Clock, note: impl Into<String>) {
        self.steps.push(Step {
            at_ms: clock.elapsed_ms(),
            note: note.into(),
        });
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = Command::new("meshsim-lab")
        .about("Run scripted failure, traffic, and attack scenarios against a simulated network")
        .arg(
            Arg::new("scenario")
                .value_parser(value_parser!(String))
                .required(false)
                .help(
                    "Scenario to run: traffic-burst, link-failure, ddos-wave, \
                     malware-outbreak (default: all)",
                ),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .default_value("42")
                .help("Engine rng seed"),
        )
        .arg(
            Arg::new("packets")
                .long("packets")
                .value_parser(value_parser!(usize))
                .default_value("25")
                .help("Packets to send during the traffic burst"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .required(false)
                .num_args(0)
                .help("Emit one JSON report per scenario instead of text"),
        )
        .get_matches();

    let scenarios: Vec<Scenario> = match matches.get_one::<String>("scenario") {
        Some(name) => match name.parse() {
            Ok(scenario) => vec![scenario],
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(2);
            }
        },
        None => Scenario::all().to_vec(),
    };
    let seed = *matches.get_one::<u64>("seed").expect("seed has a default");
    let packets = *matches
        .get_one::<usize>("packets")
        .expect("packets has a default");
    let json = matches.get_flag("json");

    for scenario in scenarios {
        info!(%scenario, seed, "running scenario");
        let report = run(scenario, seed, packets);
        if json {
            match serde_json::to_string_pretty(&report) {
                Ok(out) => println!("{out}"),
                Err(err) => eprintln!("failed to serialize report: {err}"),
            }
        } else {
            print_report(&report);
        }
    }
}

fn run(scenario: Scenario, seed: u64, packets: usize) -> Report {
    match scenario {
        Scenario::TrafficBurst => traffic_burst(seed, packets),
        Scenario::LinkFailure => link_failure(seed),
        Scenario::DdosWave => ddos_wave(seed),
        Scenario::MalwareOutbreak => malware_outbreak(seed),
    }
}

fn new_simulation(seed: u64, clock: &Clock) -> Simulation {
    let mut registry = Registry::default();
    let cfg = Config {
        seed,
        ..Config::default()
    };
    Simulation::new(cfg, &mut registry, clock.now())
}

fn device_by_name(sim: &Simulation, name: &str) -> DeviceId {
    sim.devices()
        .find(|d| d.name == name)
        .map(|d| d.id.clone())
        .expect("device exists in the demo topology")
}

/// Drain every scheduled delivery, moving the clock to each due instant.
fn drain_deliveries(sim: &mut Simulation, clock: &mut Clock) -> usize {
    let mut delivered = 0;
    while let Some(due) = sim.next_delivery_due() {
        clock.advance_to(due);
        delivered += sim.advance(clock.now()).len();
    }
    delivered
}

fn traffic_burst(seed: u64, packets: usize) -> Report {
    let mut clock = Clock::new();
    let mut sim = new_simulation(seed, &clock);
    let mut report = Report::new(Scenario::TrafficBurst, seed);

    let core = device_by_name(&sim, "Core DC");
    let hosts: Vec<DeviceId> = sim
        .devices()
        .filter(|d| d.kind == DeviceKind::Host)
        .map(|d| d.id.clone())
        .collect();
    report.note(
        &clock,
        format!("{} hosts flood the core with {packets} packets", hosts.len()),
    );

    let algorithms = [PathAlgorithm::Dijkstra, PathAlgorithm::Bfs, PathAlgorithm::Dfs];
    let mut lost = 0;
    for i in 0..packets {
        let origin = hosts[i % hosts.len()].clone();
        let mut spec = PacketSpec::new(origin, core.clone());
        spec.algorithm = Some(algorithms[i % algorithms.len()]);
        let packet = sim.send_packet(spec, clock.now());
        if packet.route.is_empty() {
            lost += 1;
        }
        clock.tick(10);
    }
    report.note(&clock, format!("{packets} packets sent, {lost} lost at send time"));

    let delivered = drain_deliveries(&mut sim, &mut clock);
    report.note(&clock, format!("{delivered} packets delivered"));

    let busiest = sim
        .devices()
        .max_by_key(|d| d.packets_processed)
        .map(|d| format!("busiest device: {} ({} packets)", d.name, d.packets_processed));
    if let Some(note) = busiest {
        report.note(&clock, note);
    }

    report.metrics = sim.metrics();
    report
}

fn link_failure(seed: u64) -> Report {
    let mut clock = Clock::new();
    let mut sim = new_simulation(seed, &clock);
    let mut report = Report::new(Scenario::LinkFailure, seed);

    let firewall = device_by_name(&sim, "Edge Firewall");
    let north = device_by_name(&sim, "Router North");
    let host = device_by_name(&sim, "Host N1");

    let before = sim.find_path(&firewall, &host, PathAlgorithm::Dijkstra);
    report.note(
        &clock,
        format!(
            "primary route: {} hops, cost {:.1}",
            before.hops, before.cost
        ),
    );

    // Cut the firewall's direct line to the north region.
    let cut = sim
        .links()
        .find(|l| l.origin == firewall && l.destination == north)
        .map(|l| l.id.clone())
        .expect("demo links the firewall to Router North");
    clock.tick(100);
    sim.fail_link(&cut, clock.now());
    report.note(&clock, "firewall uplink to Router North cut");

    let after = sim.find_path(&firewall, &host, PathAlgorithm::Dijkstra);
    if after.found {
        report.note(
            &clock,
            format!(
                "rerouted: {} hops, cost {:.1} (was {:.1})",
                after.hops, after.cost, before.cost
            ),
        );
    } else {
        report.note(&clock, "no route after the cut");
    }

    clock.tick(100);
    sim.recover_link(&cut, clock.now());
    let restored = sim.find_path(&firewall, &host, PathAlgorithm::Dijkstra);
    report.note(
        &clock,
        format!(
            "link restored, route back to {} hops at cost {:.1}",
            restored.hops, restored.cost
        ),
    );

    report.metrics = sim.metrics();
    report
}

fn ddos_wave(seed: u64) -> Report {
    let mut clock = Clock::new();
    let mut sim = new_simulation(seed, &clock);
    let mut report = Report::new(Scenario::DdosWave, seed);

    let core = device_by_name(&sim, "Core DC");
    let firewall = device_by_name(&sim, "Edge Firewall");
    let host = device_by_name(&sim, "Host N1");

    let attack = sim.start_attack(
        AttackSpec {
            kind: AttackKind::Ddos,
            targets: vec![core.clone(), firewall.clone()],
            intensity: Some(95),
        },
        clock.now(),
    );
    report.note(
        &clock,
        format!(
            "DDoS at intensity {} congests the core and the firewall",
            attack.intensity
        ),
    );

    // Traffic cannot enter a congested destination.
    clock.tick(50);
    let blocked = sim.send_packet(PacketSpec::new(host.clone(), core.clone()), clock.now());
    report.note(
        &clock,
        format!("packet to the core at mid-attack: route found = {}", !blocked.route.is_empty()),
    );

    clock.tick(200);
    sim.stop_attack(&attack.id, clock.now());
    report.note(&clock, "attack neutralized, targets restored");

    let recovered = sim.send_packet(PacketSpec::new(host, core), clock.now());
    let delivered = drain_deliveries(&mut sim, &mut clock);
    report.note(
        &clock,
        format!(
            "post-mitigation packet took {} hops, {delivered} delivery completed",
            recovered.route.len().saturating_sub(1)
        ),
    );

    report.metrics = sim.metrics();
    report
}

fn malware_outbreak(seed: u64) -> Report {
    let mut clock = Clock::new();
    let mut sim = new_simulation(seed, &clock);
    let mut report = Report::new(Scenario::MalwareOutbreak, seed);

    let patient_zero = device_by_name(&sim, "Host L1");
    let attack = sim.start_attack(
        AttackSpec {
            kind: AttackKind::Malware,
            targets: vec![patient_zero],
            intensity: Some(80),
        },
        clock.now(),
    );
    report.note(&clock, "malware lands on Host L1 in the legacy segment");

    for round in 1..=3 {
        clock.tick(100);
        let infected = sim.propagate_malware(&attack.id, clock.now());
        report.note(
            &clock,
            format!("propagation round {round}: {} newly infected", infected.len()),
        );
    }
    report.note(
        &clock,
        format!(
            "{} devices compromised at the peak",
            sim.metrics().compromised_devices
        ),
    );

    clock.tick(100);
    sim.stop_attack(&attack.id, clock.now());
    report.note(
        &clock,
        format!(
            "attack neutralized, {} devices still compromised",
            sim.metrics().compromised_devices
        ),
    );

    report.metrics = sim.metrics();
    report
}

fn print_report(report: &Report) {
    println!("\n== {} (seed {})", report.scenario, report.seed);
    for step in &report.steps {
        println!("  [{:>6} ms] {}", step.at_ms, step.note);
    }
    let m = &report.metrics;
    println!(
        "  -- devices {}/{} online, links {}/{} active, packets {}/{} delivered ({} lost)",
        m.online_devices,
        m.total_devices,
        m.active_links,
        m.total_links,
        m.packets_delivered,
        m.packets_sent,
        m.packets_lost,
    );
}
