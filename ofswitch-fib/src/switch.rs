//! Learning-switch policy
//!
//! Turns a packet-in into a forwarding decision: learn where the source
//! lives, then flood, drop or install a flow towards the learned port of
//! the destination.

use crate::config::FibConfig;
use crate::service::FibHandle;
use ofswitch_core::{Error, MacAddr, PortNo, Result, VlanId};
use ofswitch_packet::ethernet::Ethernet;
use ofswitch_packet::vlan::Vlan;
use ofswitch_packet::FrameStack;
use std::time::Duration;
use tracing::{debug, warn};

/// Destinations that are never forwarded
const DISCARDED: [MacAddr; 2] = [MacAddr::STP_MULTICAST, MacAddr::MDNS_MULTICAST];

/// Flow rule the datapath should install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRule {
    pub vlan: VlanId,
    /// Matched source address; `None` matches any source
    pub src: Option<MacAddr>,
    pub dst: MacAddr,
    /// Output port; `None` drops matching packets
    pub out_port: Option<PortNo>,
    pub idle_timeout: Duration,
}

/// Decision for one packet-in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketAction {
    /// Source address cannot be learned; nothing to do
    Ignore,
    /// Drop the packet and install a drop rule for its destination
    Discard(FlowRule),
    /// Send out of every port but the ingress one
    Flood,
    /// Destination lives behind the ingress port
    Drop,
    /// Forward and install the rule
    Forward(FlowRule),
}

/// Learning switch of one datapath
#[derive(Debug, Clone)]
pub struct LearningSwitch {
    fib: FibHandle,
    flow_idle_timeout: Duration,
}

impl LearningSwitch {
    pub fn new(fib: FibHandle, config: &FibConfig) -> Self {
        Self {
            fib,
            flow_idle_timeout: config.flow_idle_timeout,
        }
    }

    pub fn fib(&self) -> &FibHandle {
        &self.fib
    }

    /// Decide what to do with `frame` received on `in_port`
    ///
    /// Codec errors are returned unchanged; the caller drops the packet.
    pub async fn packet_in(&self, in_port: PortNo, frame: &[u8]) -> Result<PacketAction> {
        let stack = FrameStack::decode_ethernet(frame)?;
        let eth = stack
            .get::<Ethernet>()
            .ok_or_else(|| Error::malformed("Ethernet", "frame without Ethernet header"))?;
        let src = eth.source();
        let dst = eth.destination();
        let vlan = stack
            .get::<Vlan>()
            .map(|tag| tag.vid())
            .unwrap_or(VlanId::UNTAGGED);

        if src.is_multicast() {
            warn!(dpid = %self.fib.dpid(), src = %src, in_port, "multicast source, ignoring");
            return Ok(PacketAction::Ignore);
        }

        match self.fib.observe(src, vlan, in_port).await {
            Ok(observation) => {
                debug!(dpid = %self.fib.dpid(), src = %src, vlan = %vlan, in_port, ?observation, "source observed")
            }
            Err(Error::InvalidAddress(reason)) => {
                warn!(dpid = %self.fib.dpid(), src = %src, reason = %reason, "hwaddr validation failed");
                return Ok(PacketAction::Ignore);
            }
            Err(e) => return Err(e),
        }

        if DISCARDED.contains(&dst) {
            return Ok(PacketAction::Discard(FlowRule {
                vlan,
                src: None,
                dst,
                out_port: None,
                idle_timeout: self.flow_idle_timeout,
            }));
        }

        if dst.is_multicast() {
            return Ok(PacketAction::Flood);
        }

        match self.fib.port_of(dst, vlan).await? {
            None => Ok(PacketAction::Flood),
            Some(port) if port == in_port => {
                debug!(dpid = %self.fib.dpid(), dst = %dst, port, "destination behind ingress port");
                Ok(PacketAction::Drop)
            }
            Some(port) => Ok(PacketAction::Forward(FlowRule {
                vlan,
                src: Some(src),
                dst,
                out_port: Some(port),
                idle_timeout: self.flow_idle_timeout,
            })),
        }
    }

    /// Forward a port status change to the FIB
    pub async fn port_status(&self, port: PortNo, is_up: bool) -> Result<usize> {
        self.fib.port_update(port, is_up).await
    }
}
