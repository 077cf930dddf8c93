//! ResourceLedger - リソース種別ごとの容量と使用量
//!
//! One ledger per worker plus one global ledger whose capacity is the sum of
//! all registered workers. Allocation and release always touch both, inside
//! the same critical section.

use std::collections::BTreeMap;

use crate::domain::{ResourceKind, Resources, SchedulerError};

/// Float slack when comparing amounts.
const EPSILON: f64 = 1e-9;

/// ResourceLedger は容量と使用量を種別ごとに管理（使用量は容量を超えない）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceLedger {
    capacity: Resources,
    usage: Resources,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: Resources) -> Self {
        Self {
            capacity,
            usage: Resources::new(),
        }
    }

    pub fn capacity(&self) -> &Resources {
        &self.capacity
    }

    pub fn usage(&self) -> &Resources {
        &self.usage
    }

    pub fn add_capacity(&mut self, amount: &Resources) {
        for (kind, value) in amount.iter() {
            self.capacity.set(kind, self.capacity.get(kind) + value);
        }
    }

    /// Shrink capacity, clamped at zero.
    pub fn remove_capacity(&mut self, amount: &Resources) {
        for (kind, value) in amount.iter() {
            self.capacity.set(kind, clamp_zero(self.capacity.get(kind) - value));
        }
    }

    pub fn available(&self, kind: ResourceKind) -> f64 {
        clamp_zero(self.capacity.get(kind) - self.usage.get(kind))
    }

    /// Is `kind` requested in `amount` available right now?
    pub fn fits(&self, kind: ResourceKind, amount: f64) -> bool {
        amount <= EPSILON || amount <= self.available(kind) + EPSILON
    }

    pub fn can_allocate(&self, request: &Resources) -> bool {
        request.iter().all(|(kind, amount)| self.fits(kind, amount))
    }

    pub fn allocate(&mut self, request: &Resources) -> Result<(), SchedulerError> {
        if let Some((kind, amount)) = request.iter().find(|(k, a)| !self.fits(*k, *a)) {
            return Err(SchedulerError::ResourceExhausted(format!(
                "{kind}: requested {amount}, available {}",
                self.available(kind)
            )));
        }
        for (kind, amount) in request.iter() {
            self.usage.set(kind, self.usage.get(kind) + amount);
        }
        Ok(())
    }

    /// Return `request` to the pool. Usage never goes below zero.
    pub fn release(&mut self, request: &Resources) {
        for (kind, amount) in request.iter() {
            self.usage.set(kind, clamp_zero(self.usage.get(kind) - amount));
        }
    }

    /// `usage / capacity`; zero for kinds without capacity.
    pub fn utilization(&self, kind: ResourceKind) -> f64 {
        let capacity = self.capacity.get(kind);
        if capacity <= EPSILON {
            0.0
        } else {
            self.usage.get(kind) / capacity
        }
    }

    /// Utilization of every kind that has capacity.
    pub fn utilization_by_kind(&self) -> BTreeMap<ResourceKind, f64> {
        self.capacity
            .iter()
            .filter(|(_, cap)| *cap > EPSILON)
            .map(|(kind, _)| (kind, self.utilization(kind)))
            .collect()
    }

    /// Usage never exceeds capacity (within float slack).
    pub fn is_within_capacity(&self) -> bool {
        self.usage
            .iter()
            .all(|(kind, used)| used <= self.capacity.get(kind) + EPSILON)
    }
}

fn clamp_zero(v: f64) -> f64 {
    if v < EPSILON { 0.0 } else { v }
}
