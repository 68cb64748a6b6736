//! IPv6 packets
//!
//! A fixed 40-byte header followed by an optional chain of extension headers
//! (hop-by-hop, routing, fragment, destination options, AH). The chain is
//! counted as part of the header; the codec after it is chosen by the last
//! next-header value.

use crate::frame::{Frame, Header, Protocol};
use crate::ipv4::IpProtocol;
use ofswitch_core::types::ip_protocols;
use ofswitch_core::{Error, Result};
use std::net::Ipv6Addr;

/// One extension header in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionHeader {
    /// Next-header value that announced this extension
    pub kind: u8,
    /// Offset from the start of the IPv6 frame
    pub offset: usize,
    pub len: usize,
}

fn is_extension(next_header: u8) -> bool {
    matches!(
        next_header,
        ip_protocols::HOPOPT
            | ip_protocols::IPV6_ROUTE
            | ip_protocols::IPV6_FRAG
            | ip_protocols::IPV6_OPTS
            | ip_protocols::AH
    )
}

/// Walk the extension chain
///
/// Returns the extensions found and the upper-layer next-header value.
fn walk_extensions(bytes: &[u8]) -> Result<(Vec<ExtensionHeader>, u8)> {
    let mut extensions = Vec::new();
    let mut next_header = bytes[6];
    let mut offset = Ipv6::MIN_LEN;

    while is_extension(next_header) {
        if offset + 2 > bytes.len() {
            return Err(Error::malformed(
                "IPv6",
                format!("extension header {} truncated at {}", next_header, offset),
            ));
        }
        let len = match next_header {
            ip_protocols::IPV6_FRAG => 8,
            ip_protocols::AH => (bytes[offset + 1] as usize + 2) * 4,
            _ => (bytes[offset + 1] as usize + 1) * 8,
        };
        if offset + len > bytes.len() {
            return Err(Error::malformed(
                "IPv6",
                format!(
                    "extension header {} of {} bytes runs past {}",
                    next_header,
                    len,
                    bytes.len()
                ),
            ));
        }
        extensions.push(ExtensionHeader {
            kind: next_header,
            offset,
            len,
        });
        next_header = bytes[offset];
        offset += len;
    }

    Ok((extensions, next_header))
}

/// IPv6 protocol marker
pub enum Ipv6 {}

/// IPv6 packet over byte storage `T`
pub type Ipv6Frame<T> = Frame<Ipv6, T>;

impl Header for Ipv6 {
    const PROTOCOL: Protocol = Protocol::Ipv6;
    const MIN_LEN: usize = 40;

    fn header_len(bytes: &[u8]) -> Result<usize> {
        let version = bytes[0] >> 4;
        if version != 6 {
            return Err(Error::malformed("IPv6", format!("version {}", version)));
        }
        let (extensions, _) = walk_extensions(bytes)?;
        Ok(Self::MIN_LEN + extensions.iter().map(|ext| ext.len).sum::<usize>())
    }

    fn declared_len(bytes: &[u8]) -> Option<usize> {
        Some(Self::MIN_LEN + u16::from_be_bytes([bytes[4], bytes[5]]) as usize)
    }
}

impl<T: AsRef<[u8]>> Frame<Ipv6, T> {
    pub fn version(&self) -> u8 {
        self.read_u8(0) >> 4
    }

    pub fn traffic_class(&self) -> u8 {
        ((self.read_u16(0) >> 4) & 0xFF) as u8
    }

    /// 20-bit flow label
    pub fn flow_label(&self) -> u32 {
        self.read_u32(0) & 0x000F_FFFF
    }

    /// Length of everything after the fixed 40-byte header
    pub fn payload_length(&self) -> u16 {
        self.read_u16(4)
    }

    /// Next-header field of the fixed header
    pub fn next_header(&self) -> u8 {
        self.read_u8(6)
    }

    pub fn hop_limit(&self) -> u8 {
        self.read_u8(7)
    }

    pub fn source(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.read_array::<16>(8))
    }

    pub fn destination(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.read_array::<16>(24))
    }

    /// Extension headers between the fixed header and the upper layer
    pub fn extension_headers(&self) -> Vec<ExtensionHeader> {
        walk_extensions(self.header())
            .map(|(extensions, _)| extensions)
            .unwrap_or_default()
    }

    /// Protocol after the extension chain
    pub fn upper_layer_protocol(&self) -> IpProtocol {
        let next = match walk_extensions(self.header()) {
            Ok((_, next)) => next,
            Err(_) => self.next_header(),
        };
        IpProtocol::from_u8(next)
    }

    /// Bytes covered by the upper-layer checksum (header excluded)
    pub fn upper_layer_len(&self) -> usize {
        self.payload_len()
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Frame<Ipv6, T> {
    pub fn set_version(&mut self) {
        let byte = (self.read_u8(0) & 0x0F) | 0x60;
        self.write_u8(0, byte);
    }

    pub fn set_traffic_class(&mut self, class: u8) {
        let word = (self.read_u32(0) & 0xF00F_FFFF) | ((class as u32) << 20);
        self.write_u32(0, word);
    }

    pub fn set_flow_label(&mut self, label: u32) {
        let word = (self.read_u32(0) & 0xFFF0_0000) | (label & 0x000F_FFFF);
        self.write_u32(0, word);
    }

    pub fn set_payload_length(&mut self, len: u16) {
        self.write_u16(4, len);
    }

    pub fn set_next_header(&mut self, next_header: u8) {
        self.write_u8(6, next_header);
    }

    pub fn set_hop_limit(&mut self, hop_limit: u8) {
        self.write_u8(7, hop_limit);
    }

    pub fn set_source(&mut self, ip: Ipv6Addr) {
        self.write_slice(8, &ip.octets());
    }

    pub fn set_destination(&mut self, ip: Ipv6Addr) {
        self.write_slice(24, &ip.octets());
    }
}
