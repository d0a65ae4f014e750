//! # Resources
//!
//! This crate provides per-process resource limits for the simulated kernel.
//!
//! ## Philosophy
//!
//! - **Resources are finite and must be explicit**
//! - **Limits are enforced, not advisory**
//! - **Accounting is deterministic and testable**
//! - **A reservation is a ticket, not a promise**: it must be committed or it
//!   is given back automatically
//!
//! ## Core Concepts
//!
//! - [`LimitableResource`]: The counted resource kinds a process is limited on
//! - [`ResourceLimitConfig`]: Immutable limits, built or deserialized
//! - [`ResourceLimit`]: Live counters for one process, safe to share across threads
//! - [`ScopedResourceReservation`]: A charge that releases itself on drop unless
//!   committed
//!
//! ## Example
//!
//! ```
//! use resources::{LimitableResource, ResourceLimit, ResourceLimitConfig};
//!
//! let limit = ResourceLimit::new(
//!     ResourceLimitConfig::unlimited().with_transfer_memory_count(1),
//! );
//!
//! let reservation = limit
//!     .reserve(LimitableResource::TransferMemoryCountMax, 1)
//!     .unwrap();
//! assert_eq!(limit.current_value(LimitableResource::TransferMemoryCountMax), 1);
//!
//! drop(reservation);
//! assert_eq!(limit.current_value(LimitableResource::TransferMemoryCountMax), 0);
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Counted resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LimitableResource {
    PhysicalMemoryMax,
    ThreadCountMax,
    EventCountMax,
    TransferMemoryCountMax,
    SessionCountMax,
}

impl LimitableResource {
    /// Every resource kind, in counter order
    pub const ALL: [LimitableResource; 5] = [
        LimitableResource::PhysicalMemoryMax,
        LimitableResource::ThreadCountMax,
        LimitableResource::EventCountMax,
        LimitableResource::TransferMemoryCountMax,
        LimitableResource::SessionCountMax,
    ];

    fn index(self) -> usize {
        match self {
            Self::PhysicalMemoryMax => 0,
            Self::ThreadCountMax => 1,
            Self::EventCountMax => 2,
            Self::TransferMemoryCountMax => 3,
            Self::SessionCountMax => 4,
        }
    }
}

impl fmt::Display for LimitableResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PhysicalMemoryMax => "physical memory",
            Self::ThreadCountMax => "thread count",
            Self::EventCountMax => "event count",
            Self::TransferMemoryCountMax => "transfer memory count",
            Self::SessionCountMax => "session count",
        };
        write!(f, "{}", name)
    }
}

/// Resource limit configuration
///
/// `None` means the resource is not constrained. Once a [`ResourceLimit`] is
/// built from a config, its limits do not change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimitConfig {
    pub physical_memory: Option<u64>,
    pub thread_count: Option<u64>,
    pub event_count: Option<u64>,
    pub transfer_memory_count: Option<u64>,
    pub session_count: Option<u64>,
}

impl ResourceLimitConfig {
    /// Creates a config with no limits
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Creates a config where every resource is limited to zero
    pub fn zero() -> Self {
        Self {
            physical_memory: Some(0),
            thread_count: Some(0),
            event_count: Some(0),
            transfer_memory_count: Some(0),
            session_count: Some(0),
        }
    }

    /// Builder: sets physical memory limit (bytes)
    pub fn with_physical_memory(mut self, limit: u64) -> Self {
        self.physical_memory = Some(limit);
        self
    }

    /// Builder: sets thread count limit
    pub fn with_thread_count(mut self, limit: u64) -> Self {
        self.thread_count = Some(limit);
        self
    }

    /// Builder: sets event count limit
    pub fn with_event_count(mut self, limit: u64) -> Self {
        self.event_count = Some(limit);
        self
    }

    /// Builder: sets transfer memory count limit
    pub fn with_transfer_memory_count(mut self, limit: u64) -> Self {
        self.transfer_memory_count = Some(limit);
        self
    }

    /// Builder: sets session count limit
    pub fn with_session_count(mut self, limit: u64) -> Self {
        self.session_count = Some(limit);
        self
    }

    /// Returns the configured limit for a resource
    pub fn limit_for(&self, resource: LimitableResource) -> Option<u64> {
        match resource {
            LimitableResource::PhysicalMemoryMax => self.physical_memory,
            LimitableResource::ThreadCountMax => self.thread_count,
            LimitableResource::EventCountMax => self.event_count,
            LimitableResource::TransferMemoryCountMax => self.transfer_memory_count,
            LimitableResource::SessionCountMax => self.session_count,
        }
    }
}

impl fmt::Display for ResourceLimitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = LimitableResource::ALL
            .iter()
            .filter_map(|r| self.limit_for(*r).map(|limit| format!("{}={}", r, limit)))
            .collect();
        if parts.is_empty() {
            write!(f, "ResourceLimitConfig[unlimited]")
        } else {
            write!(f, "ResourceLimitConfig[{}]", parts.join(", "))
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    limit: u64,
    current: u64,
    peak: u64,
}

/// Live resource counters for one process
///
/// Every update happens under the limit's own lock, so concurrent
/// reservations against the same counter are serialized: with `N` units free,
/// exactly `N` single-unit reservations succeed.
#[derive(Debug)]
pub struct ResourceLimit {
    counters: Mutex<[Counter; 5]>,
}

impl ResourceLimit {
    /// Creates counters from a config, all at zero usage
    pub fn new(config: ResourceLimitConfig) -> Self {
        let counters = LimitableResource::ALL.map(|resource| Counter {
            limit: config.limit_for(resource).unwrap_or(u64::MAX),
            current: 0,
            peak: 0,
        });
        Self {
            counters: Mutex::new(counters),
        }
    }

    /// Returns the limit for a resource (`u64::MAX` when unlimited)
    pub fn limit_value(&self, resource: LimitableResource) -> u64 {
        self.counters.lock()[resource.index()].limit
    }

    /// Returns the amount currently charged
    pub fn current_value(&self, resource: LimitableResource) -> u64 {
        self.counters.lock()[resource.index()].current
    }

    /// Returns the highest amount ever charged at once
    pub fn peak_value(&self, resource: LimitableResource) -> u64 {
        self.counters.lock()[resource.index()].peak
    }

    /// Returns how much can still be reserved
    pub fn free_value(&self, resource: LimitableResource) -> u64 {
        let counter = self.counters.lock()[resource.index()];
        counter.limit.saturating_sub(counter.current)
    }

    /// Charges `value` units of `resource`
    ///
    /// The charge is permanent until [`ResourceLimit::release`] is called.
    /// Prefer [`ResourceLimit::reserve`], which undoes the charge on drop.
    pub fn try_charge(&self, resource: LimitableResource, value: u64) -> Result<(), ResourceError> {
        let mut counters = self.counters.lock();
        let counter = &mut counters[resource.index()];

        let requested = counter
            .current
            .checked_add(value)
            .filter(|total| *total <= counter.limit)
            .ok_or(ResourceError::LimitReached {
                resource,
                limit: counter.limit,
                current: counter.current,
                requested: value,
            })?;

        counter.current = requested;
        counter.peak = counter.peak.max(requested);
        log::trace!("charged {} x{} ({}/{})", resource, value, counter.current, counter.limit);
        Ok(())
    }

    /// Gives back `value` units of `resource`
    ///
    /// Releasing more than is charged clamps the counter at zero.
    pub fn release(&self, resource: LimitableResource, value: u64) {
        let mut counters = self.counters.lock();
        let counter = &mut counters[resource.index()];

        if value > counter.current {
            log::warn!(
                "release of {} x{} exceeds current charge {}",
                resource,
                value,
                counter.current
            );
        }
        counter.current = counter.current.saturating_sub(value);
        log::trace!("released {} x{} ({}/{})", resource, value, counter.current, counter.limit);
    }

    /// Reserves `value` units of `resource` as a scoped ticket
    ///
    /// The returned guard releases the charge when dropped unless
    /// [`ScopedResourceReservation::commit`] was called first.
    pub fn reserve(
        &self,
        resource: LimitableResource,
        value: u64,
    ) -> Result<ScopedResourceReservation<'_>, ResourceError> {
        self.try_charge(resource, value)?;
        Ok(ScopedResourceReservation {
            limit: self,
            resource,
            value,
            committed: false,
        })
    }
}

impl Default for ResourceLimit {
    fn default() -> Self {
        Self::new(ResourceLimitConfig::unlimited())
    }
}

/// A pending resource charge
///
/// Exactly one of two things happens to every reservation: it is committed,
/// making the charge permanent, or it is dropped, giving the charge back.
#[derive(Debug)]
#[must_use = "dropping a reservation immediately releases it"]
pub struct ScopedResourceReservation<'a> {
    limit: &'a ResourceLimit,
    resource: LimitableResource,
    value: u64,
    committed: bool,
}

impl ScopedResourceReservation<'_> {
    /// The reserved resource kind
    pub fn resource(&self) -> LimitableResource {
        self.resource
    }

    /// The reserved amount
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Makes the charge permanent
    ///
    /// Whoever now owns the charge is responsible for releasing it through
    /// [`ResourceLimit::release`].
    pub fn commit(mut self) {
        self.committed = true;
        log::trace!("committed {} x{}", self.resource, self.value);
    }
}

impl Drop for ScopedResourceReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.limit.release(self.resource, self.value);
        }
    }
}

/// Resource-related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("Resource limit reached for {resource}: limit={limit}, current={current}, requested={requested}")]
    LimitReached {
        resource: LimitableResource,
        limit: u64,
        current: u64,
        requested: u64,
    },
}
