//! Ethernet II frames
//!
//! Fixed 14-byte header: destination MAC, source MAC, EtherType. The
//! EtherType selects the next layer when a frame stack is decoded.

use crate::frame::{Frame, Header, Protocol};
use ofswitch_core::types::ethertypes;
use ofswitch_core::MacAddr;
use std::fmt;

/// Common EtherType values used in Ethernet II frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EtherType {
    /// IPv4 (0x0800)
    IPv4,
    /// ARP (0x0806)
    ARP,
    /// 802.1Q VLAN tag (0x8100)
    VLAN,
    /// IPv6 (0x86DD)
    IPv6,
    /// MPLS unicast (0x8847)
    MPLS,
    /// MPLS multicast (0x8848)
    MPLSMulticast,
    /// LLDP (0x88CC)
    LLDP,
    /// Q-in-Q/802.1ad service tag (0x88A8)
    QinQ,
    /// Any other value
    Custom(u16),
}

impl EtherType {
    /// Convert EtherType to u16 value
    pub fn to_u16(self) -> u16 {
        match self {
            EtherType::IPv4 => ethertypes::IPV4,
            EtherType::ARP => ethertypes::ARP,
            EtherType::VLAN => ethertypes::DOT1Q,
            EtherType::IPv6 => ethertypes::IPV6,
            EtherType::MPLS => ethertypes::MPLS_UNICAST,
            EtherType::MPLSMulticast => ethertypes::MPLS_MULTICAST,
            EtherType::LLDP => 0x88CC,
            EtherType::QinQ => ethertypes::QINQ,
            EtherType::Custom(val) => val,
        }
    }

    /// Create EtherType from u16 value
    pub fn from_u16(value: u16) -> Self {
        match value {
            ethertypes::IPV4 => EtherType::IPv4,
            ethertypes::ARP => EtherType::ARP,
            ethertypes::DOT1Q => EtherType::VLAN,
            ethertypes::IPV6 => EtherType::IPv6,
            ethertypes::MPLS_UNICAST => EtherType::MPLS,
            ethertypes::MPLS_MULTICAST => EtherType::MPLSMulticast,
            0x88CC => EtherType::LLDP,
            ethertypes::QINQ => EtherType::QinQ,
            val => EtherType::Custom(val),
        }
    }

    /// Codec that follows a header carrying this EtherType
    ///
    /// `Protocol::Payload` for values without a codec.
    pub fn next_protocol(self) -> Protocol {
        match self {
            EtherType::IPv4 => Protocol::Ipv4,
            EtherType::ARP => Protocol::Arp,
            EtherType::VLAN | EtherType::QinQ => Protocol::Vlan,
            EtherType::IPv6 => Protocol::Ipv6,
            EtherType::MPLS | EtherType::MPLSMulticast => Protocol::Mpls,
            EtherType::LLDP | EtherType::Custom(_) => Protocol::Payload,
        }
    }
}

impl From<u16> for EtherType {
    fn from(value: u16) -> Self {
        EtherType::from_u16(value)
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::IPv4 => write!(f, "IPv4"),
            EtherType::ARP => write!(f, "ARP"),
            EtherType::VLAN => write!(f, "VLAN"),
            EtherType::IPv6 => write!(f, "IPv6"),
            EtherType::MPLS => write!(f, "MPLS"),
            EtherType::MPLSMulticast => write!(f, "MPLS-Multicast"),
            EtherType::LLDP => write!(f, "LLDP"),
            EtherType::QinQ => write!(f, "Q-in-Q"),
            EtherType::Custom(val) => write!(f, "0x{:04X}", val),
        }
    }
}

/// Ethernet II protocol marker
pub enum Ethernet {}

/// Ethernet II frame over byte storage `T`
pub type EthernetFrame<T> = Frame<Ethernet, T>;

impl Ethernet {
    /// Ethernet header size (dst + src + type)
    pub const HEADER_SIZE: usize = 14;

    /// Minimum Ethernet frame size (without FCS)
    pub const MIN_FRAME_SIZE: usize = 60;

    /// Maximum Ethernet frame size (without FCS)
    pub const MAX_FRAME_SIZE: usize = 1514;
}

impl Header for Ethernet {
    const PROTOCOL: Protocol = Protocol::Ethernet;
    const MIN_LEN: usize = Ethernet::HEADER_SIZE;
}

impl<T: AsRef<[u8]>> Frame<Ethernet, T> {
    pub fn destination(&self) -> MacAddr {
        MacAddr(self.read_array(0))
    }

    pub fn source(&self) -> MacAddr {
        MacAddr(self.read_array(6))
    }

    pub fn ethertype(&self) -> EtherType {
        EtherType::from_u16(self.ethertype_raw())
    }

    pub fn ethertype_raw(&self) -> u16 {
        self.read_u16(12)
    }

    /// True when the frame carries an 802.1Q or 802.1ad tag
    pub fn is_tagged(&self) -> bool {
        matches!(self.ethertype(), EtherType::VLAN | EtherType::QinQ)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Frame<Ethernet, T> {
    pub fn set_destination(&mut self, mac: MacAddr) {
        self.write_slice(0, mac.as_bytes());
    }

    pub fn set_source(&mut self, mac: MacAddr) {
        self.write_slice(6, mac.as_bytes());
    }

    pub fn set_ethertype(&mut self, ethertype: EtherType) {
        self.write_u16(12, ethertype.to_u16());
    }
}

impl<T: AsRef<[u8]>> fmt::Display for Frame<Ethernet, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ethernet {} > {} type {} len {}",
            self.source(),
            self.destination(),
            self.ethertype(),
            self.total_len()
        )
    }
}
