//! Resource kinds and resource amounts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A kind of resource tracked by the ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Cpu,
    Memory,
    Io,
    Network,
    Gpu,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
            ResourceKind::Io => "io",
            ResourceKind::Network => "network",
            ResourceKind::Gpu => "gpu",
        };
        f.write_str(s)
    }
}

/// Amounts per resource kind.
///
/// Used both for a task's requirements and for a worker's capacity.
/// Units are up to the caller (cores, MiB, ...) as long as requirements
/// and capacities agree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resources(BTreeMap<ResourceKind, f64>);

impl Resources {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, kind: ResourceKind, amount: f64) -> Self {
        self.set(kind, amount);
        self
    }

    pub fn set(&mut self, kind: ResourceKind, amount: f64) {
        self.0.insert(kind, amount);
    }

    pub fn get(&self, kind: ResourceKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|amount| *amount == 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.0.keys().copied()
    }

    /// Every amount is finite and non-negative.
    pub fn is_well_formed(&self) -> bool {
        self.0.values().all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl FromIterator<(ResourceKind, f64)> for Resources {
    fn from_iter<I: IntoIterator<Item = (ResourceKind, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
