//! Simulate packet-switched networks: weighted topology, routing, failures,
//! and attacks.
//!
//! The engine is a pure state machine. It keeps no clock and spawns no tasks;
//! the host passes `now` into every time-dependent operation and drives
//! deferred packet deliveries with [`Simulation::advance`]. All derived
//! results (routes, components, metrics) are recomputed from live state on
//! every query, so a failure injected between two calls changes the answer.
//!
//! # Example
//!
//! ```
//! use meshsim_engine::{
//!     types::{DeviceKind, DeviceSpec, LinkKind, LinkSpec, PacketSpec},
//!     Config, Simulation,
//! };
//! use prometheus_client::registry::Registry;
//! use std::time::SystemTime;
//!
//! let mut registry = Registry::default();
//! let cfg = Config {
//!     demo_topology: false,
//!     ..Config::default()
//! };
//! let start = SystemTime::now();
//! let mut sim = Simulation::new(cfg, &mut registry, start);
//!
//! let a = sim.add_device(DeviceSpec::new("a", DeviceKind::Router), start)?;
//! let b = sim.add_device(DeviceSpec::new("b", DeviceKind::Host), start)?;
//! sim.add_link(LinkSpec::new(a.id.clone(), b.id.clone(), LinkKind::Fiber), start)?;
//!
//! let packet = sim.send_packet(PacketSpec::new(a.id, b.id), start);
//! assert_eq!(packet.route.len(), 2);
//!
//! // Transit completes once the host clock passes the scheduled instant.
//! let due = sim.next_delivery_due().unwrap();
//! assert_eq!(sim.advance(due).len(), 1);
//! # Ok::<(), meshsim_engine::Error>(())
//! ```

pub mod adjacency;
pub mod graph;
pub mod heap;
pub mod metrics;
mod seed;
pub mod sim;
pub mod types;

pub use graph::{CostModel, DefaultCost, Graph};
pub use sim::{Config, Simulation};

use thiserror::Error;
use types::{DeviceId, LinkId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown device: {0}")]
    UnknownDevice(DeviceId),
    #[error("duplicate device: {0}")]
    DuplicateDevice(DeviceId),
    #[error("duplicate link: {0}")]
    DuplicateLink(LinkId),
}
