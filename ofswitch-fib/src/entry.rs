//! Learned (MAC, VLAN) to port bindings

use ofswitch_core::{MacAddr, PortNo, VlanId};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Lookup key of a FIB entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FibKey {
    pub mac: MacAddr,
    pub vlan: VlanId,
}

impl FibKey {
    pub fn new(mac: MacAddr, vlan: VlanId) -> Self {
        Self { mac, vlan }
    }
}

impl fmt::Display for FibKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vlan {}", self.mac, self.vlan)
    }
}

/// Identity of one entry instance
///
/// Never reused within a table: an entry removed and learned again gets a
/// fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Live, with exactly one idle timer pending
    Active,
    /// Idle timer fired without a refresh
    Expired,
    /// Removed because its port went down
    PortDown,
    /// Dropped on request, without a datapath reset
    Removed,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryState::Active => write!(f, "active"),
            EntryState::Expired => write!(f, "expired"),
            EntryState::PortDown => write!(f, "port-down"),
            EntryState::Removed => write!(f, "removed"),
        }
    }
}

/// One learned binding
///
/// Owned by [`FibTable`](crate::FibTable); callers only ever see copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibEntry {
    pub id: EntryId,
    pub key: FibKey,
    pub port: PortNo,
    /// Bumped every time the idle timer is rescheduled
    pub generation: u64,
    pub last_seen: Instant,
    pub idle_timeout: Duration,
    pub state: EntryState,
}

impl FibEntry {
    pub(crate) fn new(
        id: EntryId,
        key: FibKey,
        port: PortNo,
        now: Instant,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            id,
            key,
            port,
            generation: 0,
            last_seen: now,
            idle_timeout,
            state: EntryState::Active,
        }
    }

    pub fn mac(&self) -> MacAddr {
        self.key.mac
    }

    pub fn vlan(&self) -> VlanId {
        self.key.vlan
    }

    /// When the idle timer fires unless the entry is refreshed
    pub fn deadline(&self) -> Instant {
        self.last_seen + self.idle_timeout
    }

    /// Record an observation; `last_seen` never moves backwards
    pub(crate) fn touch(&mut self, now: Instant) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }
}

impl fmt::Display for FibEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<fibentry {} {} port {} {} idle {}s>",
            self.id,
            self.key,
            self.port,
            self.state,
            self.idle_timeout.as_secs()
        )
    }
}
