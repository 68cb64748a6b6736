//! ARP over Ethernet/IPv4 (RFC 826)
//!
//! Only the Ethernet/IPv4 address family is decoded: hardware length 6,
//! protocol length 4, giving a fixed 28-byte header. Anything after it
//! (Ethernet padding) is payload.

use crate::frame::{Frame, Header, Protocol};
use ofswitch_core::{Error, MacAddr, Result};
use std::net::Ipv4Addr;

/// ARP operation code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOperation {
    Request,
    Reply,
    Other(u16),
}

impl ArpOperation {
    pub fn to_u16(self) -> u16 {
        match self {
            ArpOperation::Request => 1,
            ArpOperation::Reply => 2,
            ArpOperation::Other(op) => op,
        }
    }

    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => ArpOperation::Request,
            2 => ArpOperation::Reply,
            op => ArpOperation::Other(op),
        }
    }
}

/// ARP protocol marker
pub enum Arp {}

/// ARP packet over byte storage `T`
pub type ArpFrame<T> = Frame<Arp, T>;

impl Arp {
    pub const HARDWARE_ETHERNET: u16 = 1;
    pub const PROTOCOL_IPV4: u16 = 0x0800;
}

impl Header for Arp {
    const PROTOCOL: Protocol = Protocol::Arp;
    const MIN_LEN: usize = 28;

    fn header_len(bytes: &[u8]) -> Result<usize> {
        let (hlen, plen) = (bytes[4], bytes[5]);
        if hlen != 6 || plen != 4 {
            return Err(Error::malformed(
                "ARP",
                format!(
                    "unsupported address lengths (hardware {}, protocol {})",
                    hlen, plen
                ),
            ));
        }
        Ok(Self::MIN_LEN)
    }
}

impl<T: AsRef<[u8]>> Frame<Arp, T> {
    pub fn hardware_type(&self) -> u16 {
        self.read_u16(0)
    }

    pub fn protocol_type(&self) -> u16 {
        self.read_u16(2)
    }

    pub fn operation(&self) -> ArpOperation {
        ArpOperation::from_u16(self.read_u16(6))
    }

    pub fn sender_hardware_addr(&self) -> MacAddr {
        MacAddr(self.read_array(8))
    }

    pub fn sender_protocol_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.read_array::<4>(14))
    }

    pub fn target_hardware_addr(&self) -> MacAddr {
        MacAddr(self.read_array(18))
    }

    pub fn target_protocol_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.read_array::<4>(24))
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Frame<Arp, T> {
    /// Write the fixed Ethernet/IPv4 address family fields
    pub fn set_ethernet_ipv4(&mut self) {
        self.write_u16(0, Arp::HARDWARE_ETHERNET);
        self.write_u16(2, Arp::PROTOCOL_IPV4);
        self.write_u8(4, 6);
        self.write_u8(5, 4);
    }

    pub fn set_operation(&mut self, op: ArpOperation) {
        self.write_u16(6, op.to_u16());
    }

    pub fn set_sender_hardware_addr(&mut self, mac: MacAddr) {
        self.write_slice(8, mac.as_bytes());
    }

    pub fn set_sender_protocol_addr(&mut self, ip: Ipv4Addr) {
        self.write_slice(14, &ip.octets());
    }

    pub fn set_target_hardware_addr(&mut self, mac: MacAddr) {
        self.write_slice(18, mac.as_bytes());
    }

    pub fn set_target_protocol_addr(&mut self, ip: Ipv4Addr) {
        self.write_slice(24, &ip.octets());
    }
}
