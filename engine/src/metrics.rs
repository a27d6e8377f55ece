//! Process-lifetime prometheus counters.
//!
//! These survive [`Simulation::reset`](crate::sim::Simulation::reset): they
//! describe what the process has done, not the current network. The
//! resettable counters live in the [`NetworkMetrics`](crate::types::NetworkMetrics)
//! snapshot instead.

use crate::types::AttackKind;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

/// Label for per-kind attack counters.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct AttackLabel {
    pub kind: String,
}

impl From<AttackKind> for AttackLabel {
    fn from(kind: AttackKind) -> Self {
        Self {
            kind: kind.to_string(),
        }
    }
}

/// Counters for the [`Simulation`](crate::sim::Simulation).
#[derive(Default)]
pub struct Metrics {
    /// Number of packets submitted for delivery
    pub packets_sent: Counter,
    /// Number of packets delivered
    pub packets_delivered: Counter,
    /// Number of packets dropped for lack of a route
    pub packets_lost: Counter,
    /// Number of attacks launched by kind
    pub attacks_started: Family<AttackLabel, Counter>,
    /// Number of times the network was reset
    pub resets: Counter,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given registry.
    pub fn init(registry: &mut Registry) -> Self {
        let metrics = Metrics::default();
        registry.register(
            "packets_sent",
            "Number of packets submitted for delivery",
            metrics.packets_sent.clone(),
        );
        registry.register(
            "packets_delivered",
            "Number of packets delivered",
            metrics.packets_delivered.clone(),
        );
        registry.register(
            "packets_lost",
            "Number of packets dropped for lack of a route",
            metrics.packets_lost.clone(),
        );
        registry.register(
            "attacks_started",
            "Number of attacks launched by kind",
            metrics.attacks_started.clone(),
        );
        registry.register(
            "resets",
            "Number of times the network was reset",
            metrics.resets.clone(),
        );
        metrics
    }
}
