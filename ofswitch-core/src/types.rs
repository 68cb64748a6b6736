//! Common types used throughout ofswitch

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MAC Address (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Broadcast MAC address (ff:ff:ff:ff:ff:ff)
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    /// Zero MAC address (00:00:00:00:00:00)
    pub const ZERO: MacAddr = MacAddr([0x00; 6]);

    /// IEEE 802.1D bridge group address (01:80:c2:00:00:00)
    pub const STP_MULTICAST: MacAddr = MacAddr([0x01, 0x80, 0xc2, 0x00, 0x00, 0x00]);

    /// mDNS IPv4 multicast address (01:00:5e:00:00:fb)
    pub const MDNS_MULTICAST: MacAddr = MacAddr([0x01, 0x00, 0x5e, 0x00, 0x00, 0xfb]);

    /// Create a new MAC address
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Create a MAC address from a slice of exactly six bytes
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 6] = slice.try_into().ok()?;
        Some(MacAddr(bytes))
    }

    /// Get bytes as slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to array
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Group bit set (includes broadcast)
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// All-zero address
    pub fn is_null(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(crate::Error::InvalidAddress(format!(
                "'{}' is not a MAC address",
                s
            )));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(part, 16).map_err(|_| {
                crate::Error::InvalidAddress(format!("invalid hex octet '{}' in '{}'", part, s))
            })?;
        }

        Ok(MacAddr(bytes))
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddr(bytes)
    }
}

impl From<MacAddr> for [u8; 6] {
    fn from(mac: MacAddr) -> Self {
        mac.0
    }
}

/// 802.1Q VLAN identifier (12 bits); `VlanId::UNTAGGED` keys untagged traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VlanId(pub u16);

impl VlanId {
    /// Key used for frames without an 802.1Q tag
    pub const UNTAGGED: VlanId = VlanId(0xffff);

    /// Highest assignable VLAN ID
    pub const MAX: u16 = 0x0fff;

    /// Create a VLAN ID, masking to 12 bits
    pub fn new(vid: u16) -> Self {
        VlanId(vid & Self::MAX)
    }

    pub fn is_untagged(&self) -> bool {
        *self == Self::UNTAGGED
    }

    pub fn to_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_untagged() {
            write!(f, "untagged")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// OpenFlow port number
pub type PortNo = u32;

/// Datapath identifier (64-bit DPID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatapathId(pub u64);

impl fmt::Display for DatapathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Ethertype constants
pub mod ethertypes {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const DOT1Q: u16 = 0x8100;
    pub const QINQ: u16 = 0x88a8;
    pub const IPV6: u16 = 0x86dd;
    pub const MPLS_UNICAST: u16 = 0x8847;
    pub const MPLS_MULTICAST: u16 = 0x8848;
}

/// IP protocol / IPv6 next-header numbers
pub mod ip_protocols {
    pub const HOPOPT: u8 = 0;
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
    pub const IPV6_ROUTE: u8 = 43;
    pub const IPV6_FRAG: u8 = 44;
    pub const AH: u8 = 51;
    pub const ICMPV6: u8 = 58;
    pub const IPV6_NONXT: u8 = 59;
    pub const IPV6_OPTS: u8 = 60;
    pub const SCTP: u8 = 132;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_display_and_parse() {
        let mac: MacAddr = "00:11:22:aa:bb:cc".parse().unwrap();
        assert_eq!(mac.0, [0x00, 0x11, 0x22, 0xaa, 0xbb, 0xcc]);
        assert_eq!(mac.to_string(), "00:11:22:aa:bb:cc");
    }

    #[test]
    fn test_mac_parse_invalid() {
        assert!("00:11:22".parse::<MacAddr>().is_err());
        assert!("00:11:22:33:44:zz".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_mac_classification() {
        assert!(MacAddr::BROADCAST.is_multicast());
        assert!(MacAddr::BROADCAST.is_broadcast());
        assert!(MacAddr::STP_MULTICAST.is_multicast());
        assert!(MacAddr::ZERO.is_null());
        assert!(MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]).is_unicast());
    }

    #[test]
    fn test_vlan_id() {
        assert_eq!(VlanId::new(0x1064).to_u16(), 0x064);
        assert!(VlanId::UNTAGGED.is_untagged());
        assert_eq!(VlanId::new(10).to_string(), "10");
        assert_eq!(VlanId::UNTAGGED.to_string(), "untagged");
    }

    #[test]
    fn test_mac_serde() {
        let mac = MacAddr([1, 2, 3, 4, 5, 6]);
        let json = serde_json::to_string(&mac).unwrap();
        let back: MacAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(mac, back);
    }

    #[test]
    fn test_datapath_id_display() {
        assert_eq!(DatapathId(0x1).to_string(), "0x0000000000000001");
    }
}
