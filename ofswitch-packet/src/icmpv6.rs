//! ICMPv6 messages (RFC 4443, RFC 4861)
//!
//! The header is the 4-byte type/code/checksum prefix plus the fixed body of
//! the message type. For Neighbor Discovery messages the option list belongs
//! to the header as well, so a parsed ND message has an empty payload.

use crate::checksum::PseudoHeader;
use crate::frame::{Frame, Header, Protocol};
use crate::icmpv6_option::{
    validate_options, Icmpv6Option, Icmpv6OptionRepr, Icmpv6OptionType, Icmpv6Options,
    PrefixInformation,
};
use ofswitch_core::types::ip_protocols;
use ofswitch_core::{Error, MacAddr, Result};
use std::net::Ipv6Addr;

/// ICMPv6 message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Icmpv6Type {
    DestinationUnreachable,
    PacketTooBig,
    TimeExceeded,
    ParameterProblem,
    EchoRequest,
    EchoReply,
    RouterSolicitation,
    RouterAdvertisement,
    NeighborSolicitation,
    NeighborAdvertisement,
    Redirect,
    Other(u8),
}

impl Icmpv6Type {
    pub fn to_u8(self) -> u8 {
        match self {
            Icmpv6Type::DestinationUnreachable => 1,
            Icmpv6Type::PacketTooBig => 2,
            Icmpv6Type::TimeExceeded => 3,
            Icmpv6Type::ParameterProblem => 4,
            Icmpv6Type::EchoRequest => 128,
            Icmpv6Type::EchoReply => 129,
            Icmpv6Type::RouterSolicitation => 133,
            Icmpv6Type::RouterAdvertisement => 134,
            Icmpv6Type::NeighborSolicitation => 135,
            Icmpv6Type::NeighborAdvertisement => 136,
            Icmpv6Type::Redirect => 137,
            Icmpv6Type::Other(value) => value,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Icmpv6Type::DestinationUnreachable,
            2 => Icmpv6Type::PacketTooBig,
            3 => Icmpv6Type::TimeExceeded,
            4 => Icmpv6Type::ParameterProblem,
            128 => Icmpv6Type::EchoRequest,
            129 => Icmpv6Type::EchoReply,
            133 => Icmpv6Type::RouterSolicitation,
            134 => Icmpv6Type::RouterAdvertisement,
            135 => Icmpv6Type::NeighborSolicitation,
            136 => Icmpv6Type::NeighborAdvertisement,
            137 => Icmpv6Type::Redirect,
            other => Icmpv6Type::Other(other),
        }
    }

    /// Length of type, code, checksum and the type's fixed body
    pub fn fixed_len(self) -> usize {
        match self {
            Icmpv6Type::DestinationUnreachable
            | Icmpv6Type::PacketTooBig
            | Icmpv6Type::TimeExceeded
            | Icmpv6Type::ParameterProblem
            | Icmpv6Type::EchoRequest
            | Icmpv6Type::EchoReply
            | Icmpv6Type::RouterSolicitation => 8,
            Icmpv6Type::RouterAdvertisement => 16,
            Icmpv6Type::NeighborSolicitation | Icmpv6Type::NeighborAdvertisement => 24,
            Icmpv6Type::Redirect => 40,
            Icmpv6Type::Other(_) => 4,
        }
    }

    /// Neighbor Discovery messages carry an option list after the body
    pub fn has_options(self) -> bool {
        matches!(
            self,
            Icmpv6Type::RouterSolicitation
                | Icmpv6Type::RouterAdvertisement
                | Icmpv6Type::NeighborSolicitation
                | Icmpv6Type::NeighborAdvertisement
                | Icmpv6Type::Redirect
        )
    }
}

/// Flags of a neighbor advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NeighborAdvertFlags {
    pub router: bool,
    pub solicited: bool,
    pub override_: bool,
}

impl NeighborAdvertFlags {
    fn to_u8(self) -> u8 {
        (if self.router { 0x80 } else { 0 })
            | (if self.solicited { 0x40 } else { 0 })
            | (if self.override_ { 0x20 } else { 0 })
    }

    fn from_u8(value: u8) -> Self {
        Self {
            router: value & 0x80 != 0,
            solicited: value & 0x40 != 0,
            override_: value & 0x20 != 0,
        }
    }
}

/// Fixed fields of a router advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouterAdvert {
    pub cur_hop_limit: u8,
    pub managed: bool,
    pub other_config: bool,
    pub router_lifetime: u16,
    pub reachable_time: u32,
    pub retrans_timer: u32,
}

/// ICMPv6 protocol marker
pub enum Icmpv6 {}

/// ICMPv6 message over byte storage `T`
pub type Icmpv6Frame<T> = Frame<Icmpv6, T>;

impl Header for Icmpv6 {
    const PROTOCOL: Protocol = Protocol::Icmpv6;
    const MIN_LEN: usize = 4;

    fn header_len(bytes: &[u8]) -> Result<usize> {
        let icmp_type = Icmpv6Type::from_u8(bytes[0]);
        let fixed = icmp_type.fixed_len();
        if bytes.len() < fixed {
            return Err(Error::malformed(
                "ICMPv6",
                format!(
                    "type {} needs {} bytes, got {}",
                    icmp_type.to_u8(),
                    fixed,
                    bytes.len()
                ),
            ));
        }
        if !icmp_type.has_options() {
            return Ok(fixed);
        }
        validate_options(&bytes[fixed..])?;
        Ok(bytes.len())
    }

    fn header_len_hint(bytes: &[u8]) -> usize {
        Icmpv6Type::from_u8(bytes[0]).fixed_len()
    }
}

impl<T: AsRef<[u8]>> Frame<Icmpv6, T> {
    pub fn icmp_type(&self) -> Icmpv6Type {
        Icmpv6Type::from_u8(self.read_u8(0))
    }

    pub fn code(&self) -> u8 {
        self.read_u8(1)
    }

    pub fn checksum(&self) -> u16 {
        self.read_u16(2)
    }

    fn body_u16(&self, expected: &[Icmpv6Type], offset: usize) -> Option<u16> {
        if !expected.contains(&self.icmp_type()) {
            return None;
        }
        self.read(offset, 2)
            .ok()
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    fn body_u32(&self, expected: &[Icmpv6Type], offset: usize) -> Option<u32> {
        if !expected.contains(&self.icmp_type()) {
            return None;
        }
        self.read(offset, 4)
            .ok()
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn body_addr(&self, expected: &[Icmpv6Type], offset: usize) -> Option<Ipv6Addr> {
        if !expected.contains(&self.icmp_type()) {
            return None;
        }
        let bytes = self.read(offset, 16).ok()?;
        let mut octets = [0u8; 16];
        octets.copy_from_slice(bytes);
        Some(Ipv6Addr::from(octets))
    }

    pub fn echo_identifier(&self) -> Option<u16> {
        self.body_u16(&[Icmpv6Type::EchoRequest, Icmpv6Type::EchoReply], 4)
    }

    pub fn echo_sequence(&self) -> Option<u16> {
        self.body_u16(&[Icmpv6Type::EchoRequest, Icmpv6Type::EchoReply], 6)
    }

    /// MTU of a packet-too-big message
    pub fn mtu(&self) -> Option<u32> {
        self.body_u32(&[Icmpv6Type::PacketTooBig], 4)
    }

    /// Pointer of a parameter-problem message
    pub fn pointer(&self) -> Option<u32> {
        self.body_u32(&[Icmpv6Type::ParameterProblem], 4)
    }

    /// Target address of a neighbor solicitation, advertisement or redirect
    pub fn target_address(&self) -> Option<Ipv6Addr> {
        self.body_addr(
            &[
                Icmpv6Type::NeighborSolicitation,
                Icmpv6Type::NeighborAdvertisement,
                Icmpv6Type::Redirect,
            ],
            8,
        )
    }

    /// Destination address of a redirect
    pub fn redirect_destination(&self) -> Option<Ipv6Addr> {
        self.body_addr(&[Icmpv6Type::Redirect], 24)
    }

    pub fn neighbor_advert_flags(&self) -> Option<NeighborAdvertFlags> {
        if self.icmp_type() != Icmpv6Type::NeighborAdvertisement {
            return None;
        }
        self.read(4, 1)
            .ok()
            .map(|b| NeighborAdvertFlags::from_u8(b[0]))
    }

    pub fn router_advert(&self) -> Option<RouterAdvert> {
        if self.icmp_type() != Icmpv6Type::RouterAdvertisement {
            return None;
        }
        let body = self.read(4, 12).ok()?;
        Some(RouterAdvert {
            cur_hop_limit: body[0],
            managed: body[1] & 0x80 != 0,
            other_config: body[1] & 0x40 != 0,
            router_lifetime: u16::from_be_bytes([body[2], body[3]]),
            reachable_time: u32::from_be_bytes([body[4], body[5], body[6], body[7]]),
            retrans_timer: u32::from_be_bytes([body[8], body[9], body[10], body[11]]),
        })
    }

    /// Options after the fixed body, in order
    ///
    /// Empty for message types without options.
    pub fn options(&self) -> Icmpv6Options<'_> {
        let icmp_type = self.icmp_type();
        let fixed = icmp_type.fixed_len();
        if !icmp_type.has_options() || self.header_len() < fixed {
            return Icmpv6Options::new(&[]);
        }
        Icmpv6Options::new(&self.header()[fixed..])
    }

    /// First option of `option_type`
    pub fn option(&self, option_type: Icmpv6OptionType) -> Option<Icmpv6Option<'_>> {
        self.options().find(|opt| opt.option_type() == option_type)
    }

    pub fn source_link_layer_address(&self) -> Option<MacAddr> {
        self.option(Icmpv6OptionType::SourceLinkLayerAddress)?
            .link_layer_address()
    }

    pub fn target_link_layer_address(&self) -> Option<MacAddr> {
        self.option(Icmpv6OptionType::TargetLinkLayerAddress)?
            .link_layer_address()
    }

    pub fn prefix_information(&self) -> Option<PrefixInformation> {
        self.option(Icmpv6OptionType::PrefixInformation)?
            .prefix_information()
    }

    pub fn mtu_option(&self) -> Option<u32> {
        self.option(Icmpv6OptionType::Mtu)?.mtu()
    }

    /// Checksum of the message under `pseudo`, stored checksum excluded
    pub fn compute_checksum(&self, pseudo: &PseudoHeader) -> u16 {
        pseudo.checksum_skipping(ip_protocols::ICMPV6, self.as_bytes(), 2)
    }

    pub fn verify_checksum(&self, pseudo: &PseudoHeader) -> bool {
        pseudo.verify(ip_protocols::ICMPV6, self.as_bytes())
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Frame<Icmpv6, T> {
    pub fn set_icmp_type(&mut self, icmp_type: Icmpv6Type) {
        self.write_u8(0, icmp_type.to_u8());
    }

    pub fn set_code(&mut self, code: u8) {
        self.write_u8(1, code);
    }

    pub fn set_checksum(&mut self, checksum: u16) {
        self.write_u16(2, checksum);
    }

    /// Write the type-specific body that follows the first 4 bytes
    pub fn set_body(&mut self, body: &[u8]) -> Result<()> {
        self.write(4, body)
    }

    pub fn set_echo(&mut self, identifier: u16, sequence: u16) -> Result<()> {
        let mut body = [0u8; 4];
        body[..2].copy_from_slice(&identifier.to_be_bytes());
        body[2..].copy_from_slice(&sequence.to_be_bytes());
        self.set_body(&body)
    }

    pub fn set_target_address(&mut self, target: Ipv6Addr) -> Result<()> {
        self.write(8, &target.octets())
    }

    pub fn set_neighbor_advert_flags(&mut self, flags: NeighborAdvertFlags) -> Result<()> {
        self.write(4, &[flags.to_u8()])
    }

    /// Write `options` after the fixed body and refresh the header split
    ///
    /// The frame must already be long enough to hold them.
    pub fn set_options(&mut self, options: &[Icmpv6OptionRepr]) -> Result<()> {
        let mut offset = self.icmp_type().fixed_len();
        for option in options {
            self.write(offset, &option.to_bytes()?)?;
            offset += option.len();
        }
        self.revalidate()
    }

    /// Recompute and store the checksum under `pseudo`
    pub fn fill_checksum(&mut self, pseudo: &PseudoHeader) {
        let checksum = self.compute_checksum(pseudo);
        self.set_checksum(checksum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ByteBuffer;

    fn pseudo() -> PseudoHeader {
        PseudoHeader::V6 {
            src: "fe80::1".parse().unwrap(),
            dst: "ff02::1:ff00:2".parse().unwrap(),
        }
    }

    fn neighbor_solicitation(options: &[Icmpv6OptionRepr]) -> Icmpv6Frame<ByteBuffer> {
        let len = 24 + options.iter().map(|o| o.len()).sum::<usize>();
        let mut ns = Icmpv6Frame::<ByteBuffer>::alloc(len);
        ns.set_icmp_type(Icmpv6Type::NeighborSolicitation);
        ns.set_target_address("fe80::2".parse().unwrap()).unwrap();
        ns.set_options(options).unwrap();
        ns.fill_checksum(&pseudo());
        ns
    }

    #[test]
    fn test_neighbor_solicitation_with_options() {
        let mac = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        let ns = neighbor_solicitation(&[
            Icmpv6OptionRepr::SourceLinkLayerAddress(mac),
            Icmpv6OptionRepr::Mtu(1500),
        ]);

        let parsed = Icmpv6Frame::parse(ns.as_bytes()).unwrap();
        assert_eq!(parsed.icmp_type(), Icmpv6Type::NeighborSolicitation);
        assert_eq!(parsed.header_len(), 40);
        assert_eq!(parsed.payload_len(), 0);
        assert_eq!(
            parsed.target_address(),
            Some("fe80::2".parse::<Ipv6Addr>().unwrap())
        );
        assert_eq!(parsed.options().count(), 2);
        assert_eq!(parsed.source_link_layer_address(), Some(mac));
        assert_eq!(parsed.target_link_layer_address(), None);
        assert_eq!(parsed.mtu_option(), Some(1500));
        assert!(parsed.verify_checksum(&pseudo()));
    }

    #[test]
    fn test_zero_length_option_is_malformed() {
        let mut bytes = neighbor_solicitation(&[Icmpv6OptionRepr::Mtu(1500)])
            .into_inner()
            .into_vec();
        bytes[25] = 0;
        assert!(matches!(
            Icmpv6Frame::parse(&bytes[..]),
            Err(Error::MalformedFrame { protocol: "ICMPv6", .. })
        ));
    }

    #[test]
    fn test_overrunning_option_is_malformed() {
        let mut bytes = neighbor_solicitation(&[Icmpv6OptionRepr::Mtu(1500)])
            .into_inner()
            .into_vec();
        bytes[25] = 3;
        assert!(Icmpv6Frame::parse(&bytes[..]).is_err());
    }

    #[test]
    fn test_short_body_is_malformed() {
        let bytes = [136u8, 0, 0, 0, 0x60, 0, 0, 0];
        assert!(Icmpv6Frame::parse(&bytes[..]).is_err());
        assert_eq!(Icmpv6Frame::<&[u8]>::need_bytes(&bytes), 16);
    }

    #[test]
    fn test_echo_request_payload() {
        let mut echo = Icmpv6Frame::<ByteBuffer>::alloc(12);
        echo.set_icmp_type(Icmpv6Type::EchoRequest);
        echo.set_echo(0xbeef, 1).unwrap();
        echo.revalidate().unwrap();
        echo.set_payload(b"abcd").unwrap();

        let parsed = Icmpv6Frame::parse(echo.as_bytes()).unwrap();
        assert_eq!(parsed.header_len(), 8);
        assert_eq!(parsed.echo_identifier(), Some(0xbeef));
        assert_eq!(parsed.echo_sequence(), Some(1));
        assert_eq!(parsed.payload(), b"abcd");
        assert_eq!(parsed.options().count(), 0);
        assert_eq!(parsed.target_address(), None);
    }

    #[test]
    fn test_router_advert_fields() {
        let mut bytes = vec![134u8, 0, 0, 0, 64, 0xc0, 0x07, 0x08];
        bytes.extend_from_slice(&30_000u32.to_be_bytes());
        bytes.extend_from_slice(&1_000u32.to_be_bytes());
        let ra = Icmpv6Frame::parse(&bytes[..]).unwrap();
        let fields = ra.router_advert().unwrap();
        assert_eq!(fields.cur_hop_limit, 64);
        assert!(fields.managed && fields.other_config);
        assert_eq!(fields.router_lifetime, 1800);
        assert_eq!(fields.reachable_time, 30_000);
        assert_eq!(fields.retrans_timer, 1_000);
    }

    #[test]
    fn test_neighbor_advert_flags() {
        let mut na = Icmpv6Frame::<ByteBuffer>::alloc(24);
        na.set_icmp_type(Icmpv6Type::NeighborAdvertisement);
        na.set_neighbor_advert_flags(NeighborAdvertFlags {
            router: false,
            solicited: true,
            override_: true,
        })
        .unwrap();
        let flags = na.neighbor_advert_flags().unwrap();
        assert!(!flags.router && flags.solicited && flags.override_);
    }
}
