//! UDP datagrams
//!
//! 8-byte header; the length field covers header and data and bounds the
//! datagram inside its buffer. Checksum over IPv4 is optional (zero means
//! none), over IPv6 it is mandatory.

use crate::checksum::PseudoHeader;
use crate::frame::{Frame, Header, Protocol};
use ofswitch_core::types::ip_protocols;
use ofswitch_core::{Error, Result};

/// Common UDP port numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UdpPort(pub u16);

impl UdpPort {
    /// DNS (53)
    pub const DNS: UdpPort = UdpPort(53);

    /// DHCP Server (67)
    pub const DHCP_SERVER: UdpPort = UdpPort(67);

    /// DHCP Client (68)
    pub const DHCP_CLIENT: UdpPort = UdpPort(68);

    /// NTP (123)
    pub const NTP: UdpPort = UdpPort(123);

    /// DHCPv6 client (546)
    pub const DHCPV6_CLIENT: UdpPort = UdpPort(546);

    /// DHCPv6 server (547)
    pub const DHCPV6_SERVER: UdpPort = UdpPort(547);

    /// VXLAN (4789)
    pub const VXLAN: UdpPort = UdpPort(4789);

    pub fn new(port: u16) -> Self {
        UdpPort(port)
    }

    pub fn to_u16(self) -> u16 {
        self.0
    }
}

impl From<u16> for UdpPort {
    fn from(port: u16) -> Self {
        UdpPort(port)
    }
}

impl From<UdpPort> for u16 {
    fn from(port: UdpPort) -> Self {
        port.0
    }
}

/// UDP protocol marker
pub enum Udp {}

/// UDP datagram over byte storage `T`
pub type UdpFrame<T> = Frame<Udp, T>;

impl Header for Udp {
    const PROTOCOL: Protocol = Protocol::Udp;
    const MIN_LEN: usize = 8;

    fn declared_len(bytes: &[u8]) -> Option<usize> {
        Some(u16::from_be_bytes([bytes[4], bytes[5]]) as usize)
    }
}

impl<T: AsRef<[u8]>> Frame<Udp, T> {
    pub fn source_port(&self) -> UdpPort {
        UdpPort(self.read_u16(0))
    }

    pub fn destination_port(&self) -> UdpPort {
        UdpPort(self.read_u16(2))
    }

    pub fn length(&self) -> u16 {
        self.read_u16(4)
    }

    pub fn checksum(&self) -> u16 {
        self.read_u16(6)
    }

    /// Checksum of the datagram under `pseudo`, stored checksum excluded
    ///
    /// A computed zero is returned as 0xFFFF, zero being reserved for "no
    /// checksum".
    pub fn compute_checksum(&self, pseudo: &PseudoHeader) -> u16 {
        let checksum = pseudo.checksum_skipping(ip_protocols::UDP, self.as_bytes(), 6);
        if checksum == 0 {
            0xFFFF
        } else {
            checksum
        }
    }

    /// Validate the checksum; an absent (zero) checksum is accepted over IPv4
    pub fn verify_checksum(&self, pseudo: &PseudoHeader) -> bool {
        if self.checksum() == 0 {
            return matches!(pseudo, PseudoHeader::V4 { .. });
        }
        pseudo.verify(ip_protocols::UDP, self.as_bytes())
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Frame<Udp, T> {
    pub fn set_source_port(&mut self, port: UdpPort) {
        self.write_u16(0, port.to_u16());
    }

    pub fn set_destination_port(&mut self, port: UdpPort) {
        self.write_u16(2, port.to_u16());
    }

    pub fn set_length(&mut self, len: u16) {
        self.write_u16(4, len);
    }

    /// Set the length field from the frame's current extent
    pub fn fill_length(&mut self) -> Result<()> {
        let len = u16::try_from(self.total_len()).map_err(|_| {
            Error::construction(format!("UDP datagram of {} bytes", self.total_len()))
        })?;
        self.set_length(len);
        Ok(())
    }

    pub fn set_checksum(&mut self, checksum: u16) {
        self.write_u16(6, checksum);
    }

    /// Recompute and store the checksum under `pseudo`
    pub fn fill_checksum(&mut self, pseudo: &PseudoHeader) {
        let checksum = self.compute_checksum(pseudo);
        self.set_checksum(checksum);
    }
}
