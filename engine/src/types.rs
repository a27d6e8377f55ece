//! Core identifiers, records, and result types shared across the engine.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    str::FromStr,
    time::SystemTime,
};
use uuid::Builder;

macro_rules! define_id {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh UUID v4 id from the caller's rng. Drawing ids
            /// from the engine rng keeps whole runs reproducible for a seed.
            pub fn generate<R: Rng>(rng: &mut R) -> Self {
                Self(Builder::from_random_bytes(rng.gen()).into_uuid().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(
    /// Identifies a device (graph vertex).
    DeviceId
);
define_id!(
    /// Identifies a directed link (graph edge).
    ///
    /// Ids are string-backed because the reverse direction of a bidirectional
    /// link derives its id textually (see [`LinkId::mirror`]).
    LinkId
);
define_id!(
    /// Identifies a packet.
    PacketId
);
define_id!(
    /// Identifies an attack.
    AttackId
);
define_id!(
    /// Identifies an event log entry.
    LogId
);

/// Suffix appended to a forward link id to derive its mirror's id.
const MIRROR_SUFFIX: &str = "_rev";

impl LinkId {
    /// Derive the id of the mirror (reverse-direction) record.
    pub fn mirror(&self) -> Self {
        Self(format!("{}{}", self.0, MIRROR_SUFFIX))
    }

    /// Whether this id names a mirror record.
    pub fn is_mirror(&self) -> bool {
        self.0.ends_with(MIRROR_SUFFIX)
    }

    /// The other direction of a bidirectional pair: strips the mirror suffix
    /// if present, appends it otherwise.
    pub(crate) fn counterpart(&self) -> Self {
        match self.0.strip_suffix(MIRROR_SUFFIX) {
            Some(base) => Self(base.to_string()),
            None => self.mirror(),
        }
    }
}

/// What a device is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Router,
    Switch,
    Host,
    Server,
    Firewall,
    Hub,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Router => "router",
            Self::Switch => "switch",
            Self::Host => "host",
            Self::Server => "server",
            Self::Firewall => "firewall",
            Self::Hub => "hub",
        };
        f.write_str(name)
    }
}

/// Operational state of a device. Only [`DeviceStatus::Online`] devices are
/// eligible traversal targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Offline,
    Congested,
    Maintenance,
    Compromised,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Congested => "congested",
            Self::Maintenance => "maintenance",
            Self::Compromised => "compromised",
        };
        f.write_str(name)
    }
}

/// Physical medium of a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Ethernet,
    Fiber,
    Wireless,
    Vpn,
}

/// Operational state of a link. Only [`LinkStatus::Active`] links are
/// traversable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Active,
    Inactive,
    Congested,
    Compromised,
}

/// Lifecycle state of a packet.
///
/// `Timeout` is part of the wire vocabulary for hosts that expire stale
/// packets themselves; no engine transition produces it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketStatus {
    Sending,
    Delivered,
    Lost,
    Timeout,
}

/// Category of a simulated attack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    Dos,
    Ddos,
    Malware,
    Mitm,
    MaliciousRouter,
}

impl AttackKind {
    /// Whether attacks of this kind can spread to neighbors after launch.
    pub fn propagates(&self) -> bool {
        matches!(self, Self::Malware)
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dos => "DoS",
            Self::Ddos => "DDoS",
            Self::Malware => "malware",
            Self::Mitm => "man-in-the-middle",
            Self::MaliciousRouter => "malicious router",
        };
        f.write_str(name)
    }
}

/// Severity/category of an event log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
    Attack,
}

/// Pathfinding algorithm selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathAlgorithm {
    #[default]
    Dijkstra,
    Bfs,
    Dfs,
}

impl fmt::Display for PathAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dijkstra => "dijkstra",
            Self::Bfs => "bfs",
            Self::Dfs => "dfs",
        };
        f.write_str(name)
    }
}

impl FromStr for PathAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dijkstra" => Ok(Self::Dijkstra),
            "bfs" => Ok(Self::Bfs),
            "dfs" => Ok(Self::Dfs),
            other => Err(format!("unknown algorithm: {other}")),
        }
    }
}

/// Canvas coordinates of a device. Presentation data only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A network device (graph vertex).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub kind: DeviceKind,
    pub status: DeviceStatus,
    pub ip: String,
    pub mac: String,
    pub position: Position,
    /// Processing capacity, 0 to 100.
    pub capacity: u8,
    /// Current load, 0 to 100. Saturating: attacks add to it, recovery and
    /// attack teardown subtract, always clamped to the range.
    pub load: f64,
    /// Packets this device has forwarded as part of a delivered route.
    pub packets_processed: u64,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

/// A directed network link (graph edge).
///
/// A bidirectional link is stored as two independent records; the reverse one
/// carries the derived id `<id>_rev` and swapped endpoints. After creation the
/// two directions share nothing and may diverge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub origin: DeviceId,
    pub destination: DeviceId,
    pub kind: LinkKind,
    pub status: LinkStatus,
    /// Propagation latency in milliseconds.
    pub latency: f64,
    /// Capacity in Mbps.
    pub bandwidth: f64,
    /// Bandwidth currently in use, in Mbps.
    pub bandwidth_used: f64,
    /// Packet loss, percent (0 to 100).
    pub loss: f64,
    /// Derived routing weight. Never set directly: recomputed from latency,
    /// bandwidth, and loss whenever any of them changes.
    pub weight: f64,
    pub bidirectional: bool,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Link {
    /// Fraction of capacity in use, 0.0 to 1.0 (0.0 for zero-capacity links).
    pub fn utilization(&self) -> f64 {
        if self.bandwidth > 0.0 {
            self.bandwidth_used / self.bandwidth
        } else {
            0.0
        }
    }
}

/// A simulated packet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub id: PacketId,
    pub origin: DeviceId,
    pub destination: DeviceId,
    /// Size in KB.
    pub size: u32,
    /// Priority, 1 (lowest) to 10.
    pub priority: u8,
    pub ttl: u8,
    pub status: PacketStatus,
    /// Route resolved at send time. Empty when no path was found.
    pub route: Vec<DeviceId>,
    /// Route actually traversed. Empty until delivery.
    pub route_taken: Vec<DeviceId>,
    /// Sum of per-hop latencies of the resolved route; infinite when lost.
    pub estimated_latency: f64,
    pub created_at: SystemTime,
    pub delivered_at: Option<SystemTime>,
}

/// A simulated attack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub id: AttackId,
    pub kind: AttackKind,
    /// Devices under attack. Propagation appends newly infected devices so
    /// stopping the attack restores everything it touched.
    pub targets: Vec<DeviceId>,
    /// Strength, 0 to 100. Added to target load on launch, removed on stop.
    pub intensity: u8,
    pub propagates: bool,
    pub active: bool,
    pub started_at: SystemTime,
}

/// An entry in the bounded, newest-first event log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: LogId,
    pub at: SystemTime,
    pub level: LogLevel,
    pub message: String,
    /// Devices this entry concerns (a route, an attack's targets, a link's
    /// endpoints).
    pub devices: Vec<DeviceId>,
}

/// Parameters for creating a device. Unset fields get defaults: status
/// Online, load 0, capacity 50, a random position, and synthesized IP/MAC.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub name: String,
    pub kind: DeviceKind,
    pub position: Option<Position>,
    pub ip: Option<String>,
    pub mac: Option<String>,
    pub capacity: Option<u8>,
}

impl DeviceSpec {
    pub fn new(name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            position: None,
            ip: None,
            mac: None,
            capacity: None,
        }
    }
}

/// Partial update for a device. `None` fields are left untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeviceChanges {
    pub name: Option<String>,
    pub kind: Option<DeviceKind>,
    pub position: Option<Position>,
    pub ip: Option<String>,
    pub mac: Option<String>,
    pub capacity: Option<u8>,
}

/// Parameters for creating a link. Unset fields get defaults: latency 10 ms,
/// bandwidth 100 Mbps, loss 0, bidirectional true.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkSpec {
    pub origin: DeviceId,
    pub destination: DeviceId,
    pub kind: LinkKind,
    pub latency: Option<f64>,
    pub bandwidth: Option<f64>,
    pub loss: Option<f64>,
    pub bidirectional: Option<bool>,
}

impl LinkSpec {
    pub fn new(origin: impl Into<DeviceId>, destination: impl Into<DeviceId>, kind: LinkKind) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            kind,
            latency: None,
            bandwidth: None,
            loss: None,
            bidirectional: None,
        }
    }
}

/// Partial update for one directed link record. `None` fields are left
/// untouched; the record's weight is recomputed afterwards.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LinkChanges {
    pub latency: Option<f64>,
    pub bandwidth: Option<f64>,
    pub bandwidth_used: Option<f64>,
    pub loss: Option<f64>,
}

/// Parameters for sending a packet. Unset fields get defaults: size 64 KB,
/// priority 5, Dijkstra routing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketSpec {
    pub origin: DeviceId,
    pub destination: DeviceId,
    pub size: Option<u32>,
    pub priority: Option<u8>,
    pub algorithm: Option<PathAlgorithm>,
}

impl PacketSpec {
    pub fn new(origin: impl Into<DeviceId>, destination: impl Into<DeviceId>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            size: None,
            priority: None,
            algorithm: None,
        }
    }
}

/// Parameters for launching an attack. Unset intensity defaults to 50.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttackSpec {
    pub kind: AttackKind,
    pub targets: Vec<DeviceId>,
    pub intensity: Option<u8>,
}

/// Outcome of a pathfinding query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PathResult {
    pub found: bool,
    /// Devices from origin to destination inclusive. Empty when not found.
    pub path: Vec<DeviceId>,
    /// Sum of edge weights along the path; infinite when not found.
    pub cost: f64,
    /// Sum of edge latencies along the path; infinite when not found.
    pub latency: f64,
    /// Edge count: `path.len() - 1`, or 0 when not found.
    pub hops: usize,
    pub algorithm: PathAlgorithm,
}

impl PathResult {
    pub(crate) fn not_found(algorithm: PathAlgorithm) -> Self {
        Self {
            found: false,
            path: Vec::new(),
            cost: f64::INFINITY,
            latency: f64::INFINITY,
            hops: 0,
            algorithm,
        }
    }
}

/// A connected component of the online subgraph.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Component {
    pub id: usize,
    pub devices: Vec<DeviceId>,
    pub size: usize,
    /// A component of exactly one device.
    pub isolated: bool,
}

/// A link whose utilization exceeds the congestion threshold.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Bottleneck {
    pub link: Link,
    /// Fraction of capacity in use, 0.0 to 1.0.
    pub utilization: f64,
}

/// In/out edge counts for one device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Degree {
    pub inbound: usize,
    pub outbound: usize,
    pub total: usize,
}

/// Result of a broadcast flood from one origin.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BroadcastReport {
    pub origin: DeviceId,
    /// Devices the broadcast reached, origin excluded.
    pub reached: Vec<DeviceId>,
    pub max_hops: usize,
    /// Accumulated latency to the device that hears the broadcast last.
    pub total_latency: f64,
}

/// Primary route plus differing alternatives.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteAdvice {
    pub primary: PathResult,
    pub alternatives: Vec<PathResult>,
    pub reason: String,
}

/// Point-in-time derived statistics. Counters here are engine state and reset
/// with the network (unlike the process-lifetime prometheus counters).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NetworkMetrics {
    pub total_devices: usize,
    pub online_devices: usize,
    pub offline_devices: usize,
    pub total_links: usize,
    pub active_links: usize,
    pub packets_sent: u64,
    pub packets_delivered: u64,
    pub packets_lost: u64,
    /// Mean configured latency across all link records, ms.
    pub mean_latency: f64,
    /// Aggregate unused bandwidth across all link records, Mbps.
    pub available_bandwidth: f64,
    /// Links with utilization above the congestion threshold.
    pub congested_links: usize,
    pub compromised_devices: usize,
    pub active_attacks: usize,
}

/// Full engine state for hosts pushing to clients.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub devices: Vec<Device>,
    pub links: Vec<Link>,
    pub metrics: NetworkMetrics,
    pub packets: Vec<Packet>,
    pub attacks: Vec<Attack>,
    /// Newest first, truncated to the requested limit.
    pub logs: Vec<LogEvent>,
}

/// Serializable graph structure for export and re-import.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphExport {
    pub devices: Vec<Device>,
    pub links: Vec<Link>,
}

/// State change pushed to subscribers as it happens.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PacketSent(Packet),
    PacketDelivered(Packet),
    DeviceFailed(DeviceId),
    DeviceRecovered(DeviceId),
    LinkFailed(LinkId),
    LinkRecovered(LinkId),
    AttackStarted(Attack),
    AttackStopped(AttackId),
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_id_round_trip() {
        let id = LinkId::from("abc");
        let mirror = id.mirror();
        assert_eq!(mirror.as_str(), "abc_rev");
        assert!(mirror.is_mirror());
        assert!(!id.is_mirror());
        assert_eq!(mirror.counterpart(), id);
        assert_eq!(id.counterpart(), mirror);
    }

    #[test]
    fn algorithm_parsing() {
        assert_eq!("dijkstra".parse::<PathAlgorithm>(), Ok(PathAlgorithm::Dijkstra));
        assert_eq!("BFS".parse::<PathAlgorithm>(), Ok(PathAlgorithm::Bfs));
        assert_eq!("dfs".parse::<PathAlgorithm>(), Ok(PathAlgorithm::Dfs));
        assert!("a-star".parse::<PathAlgorithm>().is_err());
    }

    #[test]
    fn generated_ids_are_seed_deterministic() {
        use rand::{rngs::StdRng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(9);
        let a = DeviceId::generate(&mut rng);
        let b = DeviceId::generate(&mut rng);
        assert_ne!(a, b);

        let mut replay = StdRng::seed_from_u64(9);
        assert_eq!(DeviceId::generate(&mut replay), a);
        assert_eq!(DeviceId::generate(&mut replay), b);
    }

    #[test]
    fn packet_status_parses_timeout() {
        // Hosts may expire packets themselves; the token must stay decodable
        // even though the engine never sets it.
        let status: PacketStatus = serde_json::from_str("\"timeout\"").unwrap();
        assert_eq!(status, PacketStatus::Timeout);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"timeout\"");
    }

    #[test]
    fn utilization_guards_zero_capacity() {
        let now = SystemTime::UNIX_EPOCH;
        let link = Link {
            id: LinkId::from("l"),
            origin: DeviceId::from("a"),
            destination: DeviceId::from("b"),
            kind: LinkKind::Ethernet,
            status: LinkStatus::Active,
            latency: 10.0,
            bandwidth: 0.0,
            bandwidth_used: 50.0,
            loss: 0.0,
            weight: 0.0,
            bidirectional: false,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(link.utilization(), 0.0);
    }
}
