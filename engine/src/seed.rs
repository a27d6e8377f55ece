//! Fixed demonstration topology loaded on construction and on reset.
//!
//! A three-tier campus network: a core data center behind a firewall, three
//! regional routers, access switches, and their hosts, plus a VPN-attached
//! backup server and one legacy hub segment. Values here are presentation
//! data; nothing in the engine depends on them.

use crate::types::{DeviceKind, DeviceSpec, LinkKind, Position};

/// One seed link, referencing devices by their index in [`devices`].
pub(crate) struct SeedLink {
    pub origin: usize,
    pub destination: usize,
    pub kind: LinkKind,
    pub latency: f64,
    pub bandwidth: f64,
}

fn spec(name: &str, kind: DeviceKind, x: f64, y: f64, capacity: u8, ip: &str) -> DeviceSpec {
    DeviceSpec {
        name: name.to_string(),
        kind,
        position: Some(Position { x, y }),
        ip: Some(ip.to_string()),
        mac: None,
        capacity: Some(capacity),
    }
}

fn edge(origin: usize, destination: usize, kind: LinkKind, latency: f64, bandwidth: f64) -> SeedLink {
    SeedLink {
        origin,
        destination,
        kind,
        latency,
        bandwidth,
    }
}

pub(crate) fn devices() -> Vec<DeviceSpec> {
    use DeviceKind::*;
    vec![
        // Core.
        spec("Core DC", Server, 450.0, 50.0, 100, "10.0.0.1"),
        spec("Edge Firewall", Firewall, 450.0, 140.0, 95, "10.0.0.2"),
        // Regional routers.
        spec("Router North", Router, 200.0, 250.0, 85, "10.1.0.1"),
        spec("Router Central", Router, 450.0, 250.0, 80, "10.2.0.1"),
        spec("Router South", Router, 700.0, 250.0, 75, "10.3.0.1"),
        // Access switches.
        spec("Switch North A", Switch, 80.0, 380.0, 60, "10.1.1.1"),
        spec("Switch North B", Switch, 200.0, 380.0, 55, "10.1.2.1"),
        spec("Switch North C", Switch, 320.0, 380.0, 55, "10.1.3.1"),
        spec("Switch Central A", Switch, 450.0, 380.0, 60, "10.2.1.1"),
        spec("Switch Central B", Switch, 570.0, 380.0, 50, "10.2.2.1"),
        spec("Switch South A", Switch, 700.0, 380.0, 55, "10.3.1.1"),
        spec("Switch South B", Switch, 820.0, 380.0, 50, "10.3.2.1"),
        // Hosts.
        spec("Host N1", Host, 40.0, 500.0, 30, "10.1.1.10"),
        spec("Host N2", Host, 120.0, 500.0, 30, "10.1.1.11"),
        spec("Host N3", Host, 200.0, 500.0, 35, "10.1.2.10"),
        spec("Host N4", Host, 290.0, 500.0, 25, "10.1.3.10"),
        spec("Host N5", Host, 360.0, 500.0, 25, "10.1.3.11"),
        spec("Host C1", Host, 430.0, 500.0, 40, "10.2.1.10"),
        spec("Host C2", Host, 500.0, 500.0, 30, "10.2.1.11"),
        spec("Host C3", Host, 570.0, 500.0, 35, "10.2.2.10"),
        spec("Host C4", Host, 640.0, 500.0, 35, "10.2.2.11"),
        spec("Host S1", Host, 700.0, 500.0, 30, "10.3.1.10"),
        spec("Host S2", Host, 770.0, 500.0, 25, "10.3.1.11"),
        spec("Host S3", Host, 840.0, 500.0, 30, "10.3.2.10"),
        spec("Host S4", Host, 910.0, 500.0, 30, "10.3.2.11"),
        // Off-site backup.
        spec("Backup Server", Server, 900.0, 140.0, 70, "10.9.0.1"),
        // Legacy segment.
        spec("Legacy Hub", Hub, 80.0, 620.0, 30, "10.8.0.1"),
        spec("Host L1", Host, 40.0, 690.0, 20, "10.8.0.10"),
        spec("Host L2", Host, 130.0, 690.0, 20, "10.8.0.11"),
    ]
}

pub(crate) fn links() -> Vec<SeedLink> {
    use LinkKind::*;
    vec![
        // Core to firewall, firewall to the regions.
        edge(0, 1, Fiber, 1.0, 10000.0),
        edge(1, 2, Fiber, 2.0, 5000.0),
        edge(1, 3, Fiber, 3.0, 5000.0),
        edge(1, 4, Fiber, 5.0, 3000.0),
        // Inter-region backbone.
        edge(2, 3, Fiber, 10.0, 1000.0),
        edge(3, 4, Fiber, 15.0, 1000.0),
        // Routers to switches.
        edge(2, 5, Ethernet, 2.0, 1000.0),
        edge(2, 6, Ethernet, 2.0, 1000.0),
        edge(2, 7, Ethernet, 3.0, 1000.0),
        edge(3, 8, Ethernet, 2.0, 500.0),
        edge(3, 9, Ethernet, 3.0, 500.0),
        edge(4, 10, Ethernet, 2.0, 500.0),
        edge(4, 11, Ethernet, 4.0, 300.0),
        // Switches to hosts.
        edge(5, 12, Ethernet, 1.0, 100.0),
        edge(5, 13, Ethernet, 1.0, 100.0),
        edge(6, 14, Ethernet, 1.0, 100.0),
        edge(7, 15, Wireless, 5.0, 50.0),
        edge(7, 16, Wireless, 5.0, 50.0),
        edge(8, 17, Ethernet, 1.0, 100.0),
        edge(8, 18, Ethernet, 2.0, 50.0),
        edge(9, 19, Ethernet, 1.0, 100.0),
        edge(9, 20, Ethernet, 1.0, 100.0),
        edge(10, 21, Ethernet, 1.0, 100.0),
        edge(10, 22, Wireless, 8.0, 30.0),
        edge(11, 23, Ethernet, 2.0, 50.0),
        edge(11, 24, Ethernet, 2.0, 50.0),
        // Backup paths and the legacy segment.
        edge(1, 25, Vpn, 20.0, 500.0),
        edge(4, 26, Ethernet, 30.0, 100.0),
        edge(26, 27, Ethernet, 5.0, 10.0),
        edge(26, 28, Ethernet, 5.0, 10.0),
        edge(4, 25, Vpn, 25.0, 200.0),
    ]
}
