//! Datapath control facade
//!
//! The FIB only needs one operation from a datapath: resetting the flow
//! rules that were installed for an entry (or for the whole table).

use crate::entry::FibEntry;
use async_trait::async_trait;
use ofswitch_core::{DatapathId, Error, MacAddr, PortNo, Result, VlanId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Which installed rules a reset covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    /// Every rule of the datapath
    Table,
    /// Rules installed for one learned binding
    Entry {
        mac: MacAddr,
        vlan: VlanId,
        port: PortNo,
    },
}

/// Argument of [`Datapath::flow_mod_reset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowResetContext {
    pub dpid: DatapathId,
    pub scope: ResetScope,
}

impl FlowResetContext {
    pub fn table(dpid: DatapathId) -> Self {
        Self {
            dpid,
            scope: ResetScope::Table,
        }
    }

    pub fn entry(dpid: DatapathId, entry: &FibEntry) -> Self {
        Self {
            dpid,
            scope: ResetScope::Entry {
                mac: entry.mac(),
                vlan: entry.vlan(),
                port: entry.port,
            },
        }
    }
}

impl fmt::Display for FlowResetContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            ResetScope::Table => write!(f, "dpid {} all flows", self.dpid),
            ResetScope::Entry { mac, vlan, port } => {
                write!(f, "dpid {} {} vlan {} port {}", self.dpid, mac, vlan, port)
            }
        }
    }
}

/// Control handle of one connected datapath
#[async_trait]
pub trait Datapath: Send + Sync {
    fn dpid(&self) -> DatapathId;

    /// Remove the flow rules described by `ctx`
    async fn flow_mod_reset(&self, ctx: FlowResetContext) -> Result<()>;
}

/// Datapath that records every reset instead of talking to a switch
///
/// Useful for tests and dry runs. Can be told to fail, to exercise the
/// error path of callers.
#[derive(Debug)]
pub struct RecordingDatapath {
    dpid: DatapathId,
    resets: Mutex<Vec<FlowResetContext>>,
    failing: AtomicBool,
}

impl RecordingDatapath {
    pub fn new(dpid: DatapathId) -> Self {
        Self {
            dpid,
            resets: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make subsequent resets fail (they are still recorded)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn resets(&self) -> Vec<FlowResetContext> {
        self.resets.lock().clone()
    }

    pub fn reset_count(&self) -> usize {
        self.resets.lock().len()
    }

    pub fn take_resets(&self) -> Vec<FlowResetContext> {
        std::mem::take(&mut *self.resets.lock())
    }
}

#[async_trait]
impl Datapath for RecordingDatapath {
    fn dpid(&self) -> DatapathId {
        self.dpid
    }

    async fn flow_mod_reset(&self, ctx: FlowResetContext) -> Result<()> {
        self.resets.lock().push(ctx);
        if self.failing.load(Ordering::Relaxed) {
            return Err(Error::datapath(format!("flow-mod reset rejected: {}", ctx)));
        }
        Ok(())
    }
}
