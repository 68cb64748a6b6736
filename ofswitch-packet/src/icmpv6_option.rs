//! Neighbor Discovery options carried by ICMPv6 messages (RFC 4861 section 4.6)
//!
//! Each option is `type (1) | length (1, in 8-byte units) | data`. A length
//! of zero, or an option running past the end of the area, makes the whole
//! message malformed; no partial option list is ever exposed.

use ofswitch_core::{Error, MacAddr, Result};
use std::net::Ipv6Addr;

/// Neighbor Discovery option types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Icmpv6OptionType {
    SourceLinkLayerAddress,
    TargetLinkLayerAddress,
    PrefixInformation,
    RedirectedHeader,
    Mtu,
    Other(u8),
}

impl Icmpv6OptionType {
    pub fn to_u8(self) -> u8 {
        match self {
            Icmpv6OptionType::SourceLinkLayerAddress => 1,
            Icmpv6OptionType::TargetLinkLayerAddress => 2,
            Icmpv6OptionType::PrefixInformation => 3,
            Icmpv6OptionType::RedirectedHeader => 4,
            Icmpv6OptionType::Mtu => 5,
            Icmpv6OptionType::Other(value) => value,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Icmpv6OptionType::SourceLinkLayerAddress,
            2 => Icmpv6OptionType::TargetLinkLayerAddress,
            3 => Icmpv6OptionType::PrefixInformation,
            4 => Icmpv6OptionType::RedirectedHeader,
            5 => Icmpv6OptionType::Mtu,
            other => Icmpv6OptionType::Other(other),
        }
    }
}

/// Check that `area` is an exact sequence of well-formed options
///
/// Returns the number of options.
pub fn validate_options(area: &[u8]) -> Result<usize> {
    let mut offset = 0;
    let mut count = 0;
    while offset < area.len() {
        if offset + 2 > area.len() {
            return Err(Error::malformed(
                "ICMPv6",
                format!("truncated option header at offset {}", offset),
            ));
        }
        let units = area[offset + 1] as usize;
        if units == 0 {
            return Err(Error::malformed(
                "ICMPv6",
                format!("zero-length option at offset {}", offset),
            ));
        }
        let len = units * 8;
        if offset + len > area.len() {
            return Err(Error::malformed(
                "ICMPv6",
                format!(
                    "option of {} bytes at offset {} runs past {}",
                    len,
                    offset,
                    area.len()
                ),
            ));
        }
        offset += len;
        count += 1;
    }
    Ok(count)
}

/// One option, borrowed from its message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Icmpv6Option<'a> {
    bytes: &'a [u8],
}

impl<'a> Icmpv6Option<'a> {
    pub fn option_type(&self) -> Icmpv6OptionType {
        Icmpv6OptionType::from_u8(self.bytes[0])
    }

    /// Declared length in 8-byte units
    pub fn length_units(&self) -> u8 {
        self.bytes[1]
    }

    /// Option length in bytes, type and length octets included
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Option contents after the type and length octets
    pub fn data(&self) -> &'a [u8] {
        &self.bytes[2..]
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Source or target link-layer address
    pub fn link_layer_address(&self) -> Option<MacAddr> {
        match self.option_type() {
            Icmpv6OptionType::SourceLinkLayerAddress
            | Icmpv6OptionType::TargetLinkLayerAddress => MacAddr::from_slice(&self.data()[..6]),
            _ => None,
        }
    }

    pub fn prefix_information(&self) -> Option<PrefixInformation> {
        if self.option_type() != Icmpv6OptionType::PrefixInformation || self.len() != 32 {
            return None;
        }
        let data = self.data();
        let mut prefix = [0u8; 16];
        prefix.copy_from_slice(&data[14..30]);
        Some(PrefixInformation {
            prefix_len: data[0],
            on_link: data[1] & 0x80 != 0,
            autonomous: data[1] & 0x40 != 0,
            valid_lifetime: u32::from_be_bytes([data[2], data[3], data[4], data[5]]),
            preferred_lifetime: u32::from_be_bytes([data[6], data[7], data[8], data[9]]),
            prefix: Ipv6Addr::from(prefix),
        })
    }

    pub fn mtu(&self) -> Option<u32> {
        if self.option_type() != Icmpv6OptionType::Mtu {
            return None;
        }
        let data = self.data();
        Some(u32::from_be_bytes([data[2], data[3], data[4], data[5]]))
    }
}

/// Iterator over the options of an already validated area
#[derive(Debug, Clone)]
pub struct Icmpv6Options<'a> {
    area: &'a [u8],
}

impl<'a> Icmpv6Options<'a> {
    pub(crate) fn new(area: &'a [u8]) -> Self {
        Self { area }
    }
}

impl<'a> Iterator for Icmpv6Options<'a> {
    type Item = Icmpv6Option<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.area.len() < 2 {
            return None;
        }
        let len = self.area[1] as usize * 8;
        if len == 0 || len > self.area.len() {
            self.area = &[];
            return None;
        }
        let (bytes, rest) = self.area.split_at(len);
        self.area = rest;
        Some(Icmpv6Option { bytes })
    }
}

/// Contents of a prefix information option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixInformation {
    pub prefix_len: u8,
    pub on_link: bool,
    pub autonomous: bool,
    pub valid_lifetime: u32,
    pub preferred_lifetime: u32,
    pub prefix: Ipv6Addr,
}

/// Longest encodable option, 255 units of 8 bytes
const MAX_OPTION_LEN: usize = 255 * 8;

/// Option to be written into a message under construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Icmpv6OptionRepr {
    SourceLinkLayerAddress(MacAddr),
    TargetLinkLayerAddress(MacAddr),
    PrefixInformation(PrefixInformation),
    Mtu(u32),
    /// Arbitrary option; data is zero-padded to an 8-byte boundary
    Raw { option_type: u8, data: Vec<u8> },
}

impl Icmpv6OptionRepr {
    /// Encoded length in bytes (a multiple of 8)
    pub fn len(&self) -> usize {
        match self {
            Icmpv6OptionRepr::SourceLinkLayerAddress(_)
            | Icmpv6OptionRepr::TargetLinkLayerAddress(_)
            | Icmpv6OptionRepr::Mtu(_) => 8,
            Icmpv6OptionRepr::PrefixInformation(_) => 32,
            Icmpv6OptionRepr::Raw { data, .. } => (data.len() + 2 + 7) & !7,
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Encode the option
    ///
    /// Fails with `PacketConstruction` when the option does not fit the
    /// 8-bit length field (more than 2040 bytes).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let units = u8::try_from(self.len() / 8).map_err(|_| {
            Error::construction(format!(
                "ICMPv6 option of {} bytes exceeds {} bytes",
                self.len(),
                MAX_OPTION_LEN
            ))
        })?;
        let mut bytes = vec![0u8; self.len()];
        bytes[1] = units;
        match self {
            Icmpv6OptionRepr::SourceLinkLayerAddress(mac) => {
                bytes[0] = Icmpv6OptionType::SourceLinkLayerAddress.to_u8();
                bytes[2..8].copy_from_slice(mac.as_bytes());
            }
            Icmpv6OptionRepr::TargetLinkLayerAddress(mac) => {
                bytes[0] = Icmpv6OptionType::TargetLinkLayerAddress.to_u8();
                bytes[2..8].copy_from_slice(mac.as_bytes());
            }
            Icmpv6OptionRepr::PrefixInformation(info) => {
                bytes[0] = Icmpv6OptionType::PrefixInformation.to_u8();
                bytes[2] = info.prefix_len;
                bytes[3] = (if info.on_link { 0x80 } else { 0 })
                    | (if info.autonomous { 0x40 } else { 0 });
                bytes[4..8].copy_from_slice(&info.valid_lifetime.to_be_bytes());
                bytes[8..12].copy_from_slice(&info.preferred_lifetime.to_be_bytes());
                bytes[16..32].copy_from_slice(&info.prefix.octets());
            }
            Icmpv6OptionRepr::Mtu(mtu) => {
                bytes[0] = Icmpv6OptionType::Mtu.to_u8();
                bytes[4..8].copy_from_slice(&mtu.to_be_bytes());
            }
            Icmpv6OptionRepr::Raw { option_type, data } => {
                bytes[0] = *option_type;
                bytes[2..2 + data.len()].copy_from_slice(data);
            }
        }
        Ok(bytes)
    }
}
