//! Per-datapath FIB registry
//!
//! Keeps one running [`FibService`] per connected datapath, keyed by its
//! [`DatapathId`]. All methods are safe to call concurrently.

use crate::config::FibConfig;
use crate::datapath::{Datapath, FlowResetContext};
use crate::service::{FibHandle, FibService};
use dashmap::DashMap;
use ofswitch_core::{DatapathId, Error, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry of FIB services
pub struct FibRegistry {
    fibs: DashMap<DatapathId, FibHandle>,
    config: FibConfig,
}

impl FibRegistry {
    pub fn new(config: FibConfig) -> Self {
        info!("Creating new FibRegistry");
        Self {
            fibs: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &FibConfig {
        &self.config
    }

    /// Create a fresh FIB for `datapath`, replacing any existing one
    ///
    /// The replaced service is shut down and its entries are lost.
    pub async fn add_fib(&self, datapath: Arc<dyn Datapath>) -> FibHandle {
        let dpid = datapath.dpid();
        let (handle, _task) = FibService::spawn(datapath, &self.config);

        if let Some(previous) = self.fibs.insert(dpid, handle.clone()) {
            debug!(dpid = %dpid, "replacing existing FIB");
            previous.shutdown().await;
        }
        handle
    }

    /// FIB of `datapath`, created if there is none yet
    pub fn set_fib(&self, datapath: Arc<dyn Datapath>) -> FibHandle {
        let dpid = datapath.dpid();
        self.fibs
            .entry(dpid)
            .or_insert_with(|| FibService::spawn(datapath, &self.config).0)
            .value()
            .clone()
    }

    /// FIB of `dpid`, or `NotFound`
    pub fn get_fib(&self, dpid: DatapathId) -> Result<FibHandle> {
        self.fibs
            .get(&dpid)
            .map(|fib| fib.value().clone())
            .ok_or_else(|| Error::NotFound(format!("no FIB for datapath {}", dpid)))
    }

    /// Remove and stop the FIB of `dpid`; unknown ids are ignored
    pub async fn drop_fib(&self, dpid: DatapathId) {
        if let Some((_, fib)) = self.fibs.remove(&dpid) {
            fib.shutdown().await;
            info!(dpid = %dpid, "FIB dropped");
        }
    }

    pub fn has_fib(&self, dpid: DatapathId) -> bool {
        self.fibs.contains_key(&dpid)
    }

    /// Datapath connected: start over with an empty FIB and clear its flows
    ///
    /// The table-wide reset is sent once. If it fails the error is logged and
    /// the new FIB is still returned.
    pub async fn attach(&self, datapath: Arc<dyn Datapath>) -> FibHandle {
        let dpid = datapath.dpid();
        let handle = self.add_fib(datapath.clone()).await;

        match datapath.flow_mod_reset(FlowResetContext::table(dpid)).await {
            Ok(()) => info!(dpid = %dpid, "datapath attached"),
            Err(e) => warn!(dpid = %dpid, error = %e, "flow table reset on attach failed"),
        }
        handle
    }

    /// Datapath disconnected
    pub async fn detach(&self, dpid: DatapathId) {
        self.drop_fib(dpid).await;
    }

    pub fn len(&self) -> usize {
        self.fibs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibs.is_empty()
    }

    pub fn dpids(&self) -> Vec<DatapathId> {
        let mut dpids: Vec<DatapathId> = self.fibs.iter().map(|fib| *fib.key()).collect();
        dpids.sort();
        dpids
    }

    /// Stop every FIB
    pub async fn shutdown(&self) {
        let fibs: Vec<FibHandle> = self.fibs.iter().map(|fib| fib.value().clone()).collect();
        self.fibs.clear();
        for fib in fibs {
            fib.shutdown().await;
        }
        info!("All FIBs stopped");
    }
}

impl Default for FibRegistry {
    fn default() -> Self {
        Self::new(FibConfig::default())
    }
}
