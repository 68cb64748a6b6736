//! FIB table state machine
//!
//! The table owns every entry and the single pending idle timer of each.
//! It is a plain synchronous state machine: exclusive access (`&mut self`)
//! is the only synchronization, and side effects towards the datapath are
//! returned to the caller instead of being performed here.
//!
//! Entry lifecycle:
//!
//! ```text
//! observe (new key) ──> Active ──(idle timer, current tag)──> Expired
//!                        │  ^
//!                        │  └── observe (refresh: generation + 1, timer re-armed)
//!                        └──(port down)──> PortDown
//! ```
//!
//! Removed entries never come back; observing the key again creates a new
//! entry with a new [`EntryId`].

use crate::entry::{EntryId, EntryState, FibEntry, FibKey};
use crate::timer::{TimerScheduler, TimerTag};
use ofswitch_core::{DatapathId, Error, MacAddr, PortNo, Result, VlanId};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Effect of [`FibTable::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// A new entry was created
    Learned(EntryId),
    /// Known binding seen again; only the idle timer was reset
    Refreshed(EntryId),
    /// Known key seen on a different port
    Moved { id: EntryId, from: PortNo },
}

impl Observation {
    pub fn id(&self) -> EntryId {
        match *self {
            Observation::Learned(id) | Observation::Refreshed(id) => id,
            Observation::Moved { id, .. } => id,
        }
    }

    /// Whether flow rules towards this key need to be (re)installed
    pub fn binding_changed(&self) -> bool {
        !matches!(self, Observation::Refreshed(_))
    }
}

/// Effect of [`FibTable::on_timer_expired`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The entry was removed; its flows must be reset
    Expired(FibEntry),
    /// The tag no longer matches a live entry; nothing happened
    Stale,
}

/// Learned bindings of one datapath
pub struct FibTable {
    dpid: DatapathId,
    idle_timeout: Duration,
    entries: HashMap<FibKey, FibEntry>,
    keys: HashMap<EntryId, FibKey>,
    next_id: u64,
    timers: Box<dyn TimerScheduler>,
}

impl FibTable {
    pub fn new<S>(dpid: DatapathId, idle_timeout: Duration, timers: S) -> Self
    where
        S: TimerScheduler + 'static,
    {
        Self {
            dpid,
            idle_timeout,
            entries: HashMap::new(),
            keys: HashMap::new(),
            next_id: 1,
            timers: Box::new(timers),
        }
    }

    pub fn dpid(&self) -> DatapathId {
        self.dpid
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Learn or refresh the binding of `mac` on `vlan` to `port`
    ///
    /// Multicast and all-zero addresses are rejected with `InvalidAddress`.
    pub fn observe(
        &mut self,
        mac: MacAddr,
        vlan: VlanId,
        port: PortNo,
        now: Instant,
    ) -> Result<Observation> {
        if mac.is_multicast() || mac.is_null() {
            return Err(Error::InvalidAddress(format!(
                "{} cannot be learned as a source",
                mac
            )));
        }

        let key = FibKey::new(mac, vlan);
        let Some(entry) = self.entries.get_mut(&key) else {
            let id = EntryId(self.next_id);
            self.next_id += 1;

            let entry = FibEntry::new(id, key, port, now, self.idle_timeout);
            self.timers.schedule(
                TimerTag {
                    entry: id,
                    generation: entry.generation,
                },
                entry.deadline(),
            );
            debug!(dpid = %self.dpid, mac = %mac, vlan = %vlan, port, id = %id, "learned");
            self.keys.insert(id, key);
            self.entries.insert(key, entry);
            return Ok(Observation::Learned(id));
        };

        entry.touch(now);
        entry.generation += 1;
        self.timers.schedule(
            TimerTag {
                entry: entry.id,
                generation: entry.generation,
            },
            entry.deadline(),
        );

        if entry.port == port {
            debug!(dpid = %self.dpid, mac = %mac, vlan = %vlan, port, "refreshed");
            return Ok(Observation::Refreshed(entry.id));
        }

        let from = entry.port;
        entry.port = port;
        info!(dpid = %self.dpid, mac = %mac, vlan = %vlan, from, to = port, "binding moved");
        Ok(Observation::Moved { id: entry.id, from })
    }

    /// Handle a fired idle timer
    ///
    /// Only the timer armed last for a live entry removes it; any other tag
    /// is stale and ignored.
    pub fn on_timer_expired(&mut self, tag: TimerTag) -> TimerOutcome {
        let Some(key) = self.keys.get(&tag.entry).copied() else {
            trace!(dpid = %self.dpid, entry = %tag.entry, "timer for removed entry ignored");
            return TimerOutcome::Stale;
        };
        let current = self
            .entries
            .get(&key)
            .map(|entry| entry.generation == tag.generation)
            .unwrap_or(false);
        if !current {
            trace!(
                dpid = %self.dpid,
                entry = %tag.entry,
                generation = tag.generation,
                "superseded timer ignored"
            );
            return TimerOutcome::Stale;
        }

        match self.detach(&key, EntryState::Expired) {
            Some(entry) => {
                info!(dpid = %self.dpid, key = %entry.key, port = entry.port, "entry expired");
                TimerOutcome::Expired(entry)
            }
            None => TimerOutcome::Stale,
        }
    }

    /// Handle a port status change
    ///
    /// When `port` goes down every entry bound to it is removed and returned,
    /// in unspecified order. A port coming up changes nothing.
    pub fn on_port_update(&mut self, port: PortNo, is_up: bool) -> Vec<FibEntry> {
        if is_up {
            debug!(dpid = %self.dpid, port, "port up");
            return Vec::new();
        }

        let keys: Vec<FibKey> = self
            .entries
            .values()
            .filter(|entry| entry.port == port)
            .map(|entry| entry.key)
            .collect();
        let removed: Vec<FibEntry> = keys
            .iter()
            .filter_map(|key| self.detach(key, EntryState::PortDown))
            .collect();

        if !removed.is_empty() {
            info!(dpid = %self.dpid, port, count = removed.len(), "port down, entries removed");
        }
        removed
    }

    pub fn lookup(&self, mac: MacAddr, vlan: VlanId) -> Option<&FibEntry> {
        self.entries.get(&FibKey::new(mac, vlan))
    }

    /// Learned port of `mac` on `vlan`
    pub fn port_of(&self, mac: MacAddr, vlan: VlanId) -> Option<PortNo> {
        self.lookup(mac, vlan).map(|entry| entry.port)
    }

    pub fn has_entry(&self, mac: MacAddr, vlan: VlanId) -> bool {
        self.entries.contains_key(&FibKey::new(mac, vlan))
    }

    pub fn get(&self, id: EntryId) -> Option<&FibEntry> {
        self.keys.get(&id).and_then(|key| self.entries.get(key))
    }

    /// Drop one entry without any datapath side effect
    pub fn remove(&mut self, mac: MacAddr, vlan: VlanId) -> Option<FibEntry> {
        self.detach(&FibKey::new(mac, vlan), EntryState::Removed)
    }

    /// Drop every entry and cancel all timers; returns how many were dropped
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.timers.cancel_all();
        self.entries.clear();
        self.keys.clear();
        count
    }

    /// Entries ordered by key
    pub fn entries(&self) -> Vec<FibEntry> {
        let mut entries: Vec<FibEntry> = self.entries.values().cloned().collect();
        entries.sort_by_key(|entry| entry.key);
        entries
    }

    fn detach(&mut self, key: &FibKey, state: EntryState) -> Option<FibEntry> {
        let mut entry = self.entries.remove(key)?;
        self.keys.remove(&entry.id);
        self.timers.cancel(entry.id);
        entry.state = state;
        Some(entry)
    }
}

impl fmt::Debug for FibTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FibTable")
            .field("dpid", &self.dpid)
            .field("idle_timeout", &self.idle_timeout)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl fmt::Display for FibTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<fibtable dpid {} entries {}>", self.dpid, self.len())?;
        for entry in self.entries() {
            writeln!(f, "  {}", entry)?;
        }
        Ok(())
    }
}
