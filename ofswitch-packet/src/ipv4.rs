//! IPv4 packets
//!
//! Header of 20 to 60 bytes; the IHL field gives its length in 32-bit words
//! and the total-length field bounds the datagram inside the buffer (the rest
//! is link-layer padding). The header checksum is recomputed on request only.

use crate::checksum::{checksum_skipping, validate_checksum};
use crate::frame::{Frame, Header, Protocol};
use ofswitch_core::types::ip_protocols;
use ofswitch_core::{Error, Result};
use std::net::Ipv4Addr;

/// IP protocol / IPv6 next-header numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpProtocol {
    /// ICMP (1)
    ICMP,
    /// IGMP (2)
    IGMP,
    /// TCP (6)
    TCP,
    /// UDP (17)
    UDP,
    /// ICMPv6 (58)
    ICMPv6,
    /// SCTP (132)
    SCTP,
    /// Custom protocol number
    Custom(u8),
}

impl IpProtocol {
    pub fn to_u8(self) -> u8 {
        match self {
            IpProtocol::ICMP => ip_protocols::ICMP,
            IpProtocol::IGMP => 2,
            IpProtocol::TCP => ip_protocols::TCP,
            IpProtocol::UDP => ip_protocols::UDP,
            IpProtocol::ICMPv6 => ip_protocols::ICMPV6,
            IpProtocol::SCTP => ip_protocols::SCTP,
            IpProtocol::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            ip_protocols::ICMP => IpProtocol::ICMP,
            2 => IpProtocol::IGMP,
            ip_protocols::TCP => IpProtocol::TCP,
            ip_protocols::UDP => IpProtocol::UDP,
            ip_protocols::ICMPV6 => IpProtocol::ICMPv6,
            ip_protocols::SCTP => IpProtocol::SCTP,
            val => IpProtocol::Custom(val),
        }
    }

    /// Codec that follows an IP header carrying this protocol number
    pub fn next_protocol(self) -> Protocol {
        match self {
            IpProtocol::ICMP => Protocol::Icmpv4,
            IpProtocol::ICMPv6 => Protocol::Icmpv6,
            IpProtocol::TCP => Protocol::Tcp,
            IpProtocol::UDP => Protocol::Udp,
            IpProtocol::SCTP => Protocol::Sctp,
            IpProtocol::IGMP | IpProtocol::Custom(_) => Protocol::Payload,
        }
    }
}

/// IP Flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IpFlags {
    /// Reserved bit (must be 0)
    pub reserved: bool,
    /// Don't Fragment flag
    pub dont_fragment: bool,
    /// More Fragments flag
    pub more_fragments: bool,
}

impl IpFlags {
    /// No flags set
    pub const NONE: IpFlags = IpFlags {
        reserved: false,
        dont_fragment: false,
        more_fragments: false,
    };

    /// Don't Fragment flag set
    pub const DONT_FRAGMENT: IpFlags = IpFlags {
        reserved: false,
        dont_fragment: true,
        more_fragments: false,
    };

    /// Convert to 3-bit value
    pub fn to_u8(self) -> u8 {
        let mut flags = 0u8;
        if self.reserved {
            flags |= 0b100;
        }
        if self.dont_fragment {
            flags |= 0b010;
        }
        if self.more_fragments {
            flags |= 0b001;
        }
        flags
    }

    /// Parse from 3-bit value
    pub fn from_u8(value: u8) -> Self {
        IpFlags {
            reserved: (value & 0b100) != 0,
            dont_fragment: (value & 0b010) != 0,
            more_fragments: (value & 0b001) != 0,
        }
    }
}

/// IPv4 protocol marker
pub enum Ipv4 {}

/// IPv4 packet over byte storage `T`
pub type Ipv4Frame<T> = Frame<Ipv4, T>;

impl Ipv4 {
    /// Maximum header size (IHL 15)
    pub const MAX_HEADER_SIZE: usize = 60;

    /// Maximum packet size
    pub const MAX_PACKET_SIZE: usize = 65535;
}

impl Header for Ipv4 {
    const PROTOCOL: Protocol = Protocol::Ipv4;
    const MIN_LEN: usize = 20;

    fn header_len(bytes: &[u8]) -> Result<usize> {
        let version = bytes[0] >> 4;
        if version != 4 {
            return Err(Error::malformed("IPv4", format!("version {}", version)));
        }
        let header_len = Self::header_len_hint(bytes);
        if header_len < Self::MIN_LEN {
            return Err(Error::malformed(
                "IPv4",
                format!("IHL {} below 5", header_len / 4),
            ));
        }
        if header_len > bytes.len() {
            return Err(Error::malformed(
                "IPv4",
                format!("IHL {} runs past {} bytes", header_len / 4, bytes.len()),
            ));
        }
        Ok(header_len)
    }

    fn header_len_hint(bytes: &[u8]) -> usize {
        ((bytes[0] & 0x0F) as usize) * 4
    }

    fn declared_len(bytes: &[u8]) -> Option<usize> {
        Some(u16::from_be_bytes([bytes[2], bytes[3]]) as usize)
    }
}

impl<T: AsRef<[u8]>> Frame<Ipv4, T> {
    pub fn version(&self) -> u8 {
        self.read_u8(0) >> 4
    }

    /// Internet header length in 32-bit words
    pub fn ihl(&self) -> u8 {
        self.read_u8(0) & 0x0F
    }

    /// Differentiated services code point
    pub fn dscp(&self) -> u8 {
        self.read_u8(1) >> 2
    }

    pub fn ecn(&self) -> u8 {
        self.read_u8(1) & 0x03
    }

    pub fn total_length(&self) -> u16 {
        self.read_u16(2)
    }

    pub fn identification(&self) -> u16 {
        self.read_u16(4)
    }

    pub fn flags(&self) -> IpFlags {
        IpFlags::from_u8(self.read_u8(6) >> 5)
    }

    /// Fragment offset in 8-byte blocks
    pub fn fragment_offset(&self) -> u16 {
        self.read_u16(6) & 0x1FFF
    }

    /// True for every fragment, the first one included
    pub fn is_fragment(&self) -> bool {
        self.flags().more_fragments || self.fragment_offset() != 0
    }

    pub fn ttl(&self) -> u8 {
        self.read_u8(8)
    }

    pub fn protocol(&self) -> IpProtocol {
        IpProtocol::from_u8(self.read_u8(9))
    }

    pub fn checksum(&self) -> u16 {
        self.read_u16(10)
    }

    pub fn source(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.read_array::<4>(12))
    }

    pub fn destination(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.read_array::<4>(16))
    }

    /// Header options (between the fixed header and IHL)
    pub fn options(&self) -> &[u8] {
        &self.header()[Ipv4::MIN_LEN..]
    }

    /// Checksum of the header as it is now, with the stored checksum zeroed
    pub fn compute_checksum(&self) -> u16 {
        checksum_skipping(self.header(), 10)
    }

    pub fn verify_checksum(&self) -> bool {
        validate_checksum(self.header())
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Frame<Ipv4, T> {
    pub fn set_version(&mut self) {
        let byte = (self.read_u8(0) & 0x0F) | 0x40;
        self.write_u8(0, byte);
    }

    /// Set the header length in 32-bit words and refresh the header split
    pub fn set_ihl(&mut self, ihl: u8) -> Result<()> {
        if !(5..=15).contains(&ihl) {
            return Err(Error::invalid_parameter(
                "ihl".to_string(),
                format!("{} outside 5..=15", ihl),
            ));
        }
        let old = self.read_u8(0);
        self.write_u8(0, (old & 0xF0) | ihl);
        if let Err(err) = self.revalidate() {
            self.write_u8(0, old);
            return Err(err);
        }
        Ok(())
    }

    pub fn set_dscp(&mut self, dscp: u8) {
        let byte = (dscp << 2) | self.ecn();
        self.write_u8(1, byte);
    }

    pub fn set_total_length(&mut self, len: u16) {
        self.write_u16(2, len);
    }

    pub fn set_identification(&mut self, id: u16) {
        self.write_u16(4, id);
    }

    pub fn set_flags(&mut self, flags: IpFlags) {
        let value = ((flags.to_u8() as u16) << 13) | self.fragment_offset();
        self.write_u16(6, value);
    }

    pub fn set_fragment_offset(&mut self, offset: u16) {
        let value = (self.read_u16(6) & 0xE000) | (offset & 0x1FFF);
        self.write_u16(6, value);
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        self.write_u8(8, ttl);
    }

    pub fn set_protocol(&mut self, protocol: IpProtocol) {
        self.write_u8(9, protocol.to_u8());
    }

    pub fn set_checksum(&mut self, checksum: u16) {
        self.write_u16(10, checksum);
    }

    pub fn set_source(&mut self, ip: Ipv4Addr) {
        self.write_slice(12, &ip.octets());
    }

    pub fn set_destination(&mut self, ip: Ipv4Addr) {
        self.write_slice(16, &ip.octets());
    }

    /// Recompute and store the header checksum
    pub fn fill_checksum(&mut self) {
        let checksum = self.compute_checksum();
        self.set_checksum(checksum);
    }
}
