//! Packet builder for constructing frame stacks with a fluent API
//!
//! Layers are listed outermost first. [`PacketBuilder::build`] lays them out
//! in one zero-filled buffer and then encodes them innermost first: every
//! layer writes its header over the already final bytes it wraps, so length
//! fields and checksums of outer layers cover the finished inner layers.
//! Discriminators (EtherType, IP protocol, next header) are derived from the
//! following layer unless set explicitly.

use crate::arp::{Arp, ArpOperation};
use crate::checksum::PseudoHeader;
use crate::ethernet::{EtherType, Ethernet};
use crate::frame::{Frame, Header, Protocol};
use crate::icmpv4::{Icmpv4, Icmpv4Type};
use crate::icmpv6::{Icmpv6, Icmpv6Type, NeighborAdvertFlags};
use crate::icmpv6_option::Icmpv6OptionRepr;
use crate::ipv4::{IpFlags, IpProtocol, Ipv4};
use crate::ipv6::Ipv6;
use crate::memory::ByteBuffer;
use crate::mpls::{Mpls, MplsLabel};
use crate::sctp::Sctp;
use crate::tcp::{Tcp, TcpFlags, TcpPort};
use crate::udp::{Udp, UdpPort};
use crate::vlan::Vlan;
use ofswitch_core::types::ip_protocols;
use ofswitch_core::{Error, MacAddr, Result, VlanId};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Options for [`PacketBuilder::build`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Zero-pad Ethernet frames to the 60-byte minimum
    pub pad_ethernet: bool,
    /// Fill IPv4, ICMP, TCP, UDP and SCTP checksums
    pub compute_checksums: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            pad_ethernet: true,
            compute_checksums: true,
        }
    }
}

impl BuildOptions {
    pub fn with_pad_ethernet(mut self, pad: bool) -> Self {
        self.pad_ethernet = pad;
        self
    }

    pub fn with_compute_checksums(mut self, compute: bool) -> Self {
        self.compute_checksums = compute;
        self
    }
}

/// One layer of a packet under construction
#[derive(Debug, Clone)]
enum LayerSpec {
    Ethernet {
        src: MacAddr,
        dst: MacAddr,
        ethertype: Option<EtherType>,
    },
    Vlan {
        vid: VlanId,
        pcp: u8,
        ethertype: Option<EtherType>,
    },
    Mpls {
        label: u32,
        tc: u8,
        ttl: u8,
    },
    Arp {
        operation: ArpOperation,
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    },
    Ipv4 {
        src: Ipv4Addr,
        dst: Ipv4Addr,
        ttl: u8,
        identification: u16,
        dscp: u8,
        dont_fragment: bool,
        protocol: Option<IpProtocol>,
    },
    Ipv6 {
        src: Ipv6Addr,
        dst: Ipv6Addr,
        hop_limit: u8,
        traffic_class: u8,
        flow_label: u32,
        next_header: Option<IpProtocol>,
    },
    Icmpv4 {
        icmp_type: Icmpv4Type,
        code: u8,
        rest: [u8; 4],
    },
    Icmpv6 {
        icmp_type: Icmpv6Type,
        code: u8,
        /// Fixed body after type, code and checksum
        body: Vec<u8>,
        options: Vec<Icmpv6OptionRepr>,
    },
    Tcp {
        src_port: u16,
        dst_port: u16,
        seq: u32,
        ack: u32,
        flags: TcpFlags,
        window: u16,
        options: Vec<u8>,
    },
    Udp {
        src_port: u16,
        dst_port: u16,
    },
    Sctp {
        src_port: u16,
        dst_port: u16,
        verification_tag: u32,
    },
}

impl LayerSpec {
    fn protocol(&self) -> Protocol {
        match self {
            LayerSpec::Ethernet { .. } => Protocol::Ethernet,
            LayerSpec::Vlan { .. } => Protocol::Vlan,
            LayerSpec::Mpls { .. } => Protocol::Mpls,
            LayerSpec::Arp { .. } => Protocol::Arp,
            LayerSpec::Ipv4 { .. } => Protocol::Ipv4,
            LayerSpec::Ipv6 { .. } => Protocol::Ipv6,
            LayerSpec::Icmpv4 { .. } => Protocol::Icmpv4,
            LayerSpec::Icmpv6 { .. } => Protocol::Icmpv6,
            LayerSpec::Tcp { .. } => Protocol::Tcp,
            LayerSpec::Udp { .. } => Protocol::Udp,
            LayerSpec::Sctp { .. } => Protocol::Sctp,
        }
    }

    fn header_len(&self) -> usize {
        match self {
            LayerSpec::Ethernet { .. } => Ethernet::MIN_LEN,
            LayerSpec::Vlan { .. } => Vlan::MIN_LEN,
            LayerSpec::Mpls { .. } => Mpls::MIN_LEN,
            LayerSpec::Arp { .. } => Arp::MIN_LEN,
            LayerSpec::Ipv4 { .. } => Ipv4::MIN_LEN,
            LayerSpec::Ipv6 { .. } => Ipv6::MIN_LEN,
            LayerSpec::Icmpv4 { .. } => Icmpv4::MIN_LEN,
            LayerSpec::Icmpv6 {
                icmp_type, options, ..
            } => icmp_type.fixed_len() + options.iter().map(|opt| opt.len()).sum::<usize>(),
            LayerSpec::Tcp { options, .. } => Tcp::MIN_LEN + ((options.len() + 3) & !3),
            LayerSpec::Udp { .. } => Udp::MIN_LEN,
            LayerSpec::Sctp { .. } => Sctp::MIN_LEN,
        }
    }
}

/// Whether `inner` may directly follow `outer`
fn can_follow(outer: Protocol, inner: Protocol) -> bool {
    match outer {
        Protocol::Ethernet | Protocol::Vlan => matches!(
            inner,
            Protocol::Vlan | Protocol::Mpls | Protocol::Arp | Protocol::Ipv4 | Protocol::Ipv6
        ),
        Protocol::Mpls => matches!(inner, Protocol::Mpls | Protocol::Ipv4 | Protocol::Ipv6),
        Protocol::Ipv4 => matches!(
            inner,
            Protocol::Icmpv4 | Protocol::Tcp | Protocol::Udp | Protocol::Sctp
        ),
        Protocol::Ipv6 => matches!(
            inner,
            Protocol::Icmpv6 | Protocol::Tcp | Protocol::Udp | Protocol::Sctp
        ),
        _ => false,
    }
}

fn ethertype_for(explicit: Option<EtherType>, next: Option<&LayerSpec>) -> Result<EtherType> {
    if let Some(ethertype) = explicit {
        return Ok(ethertype);
    }
    match next.map(LayerSpec::protocol) {
        Some(Protocol::Vlan) => Ok(EtherType::VLAN),
        Some(Protocol::Mpls) => Ok(EtherType::MPLS),
        Some(Protocol::Arp) => Ok(EtherType::ARP),
        Some(Protocol::Ipv4) => Ok(EtherType::IPv4),
        Some(Protocol::Ipv6) => Ok(EtherType::IPv6),
        Some(other) => Err(Error::construction(format!(
            "no EtherType for {} payload",
            other
        ))),
        None => Err(Error::construction(
            "EtherType of raw payload must be set with ethertype()",
        )),
    }
}

fn ip_protocol_for(explicit: Option<IpProtocol>, next: Option<&LayerSpec>) -> IpProtocol {
    if let Some(protocol) = explicit {
        return protocol;
    }
    match next.map(LayerSpec::protocol) {
        Some(Protocol::Icmpv4) => IpProtocol::ICMP,
        Some(Protocol::Icmpv6) => IpProtocol::ICMPv6,
        Some(Protocol::Tcp) => IpProtocol::TCP,
        Some(Protocol::Udp) => IpProtocol::UDP,
        Some(Protocol::Sctp) => IpProtocol::SCTP,
        _ => IpProtocol::Custom(ip_protocols::IPV6_NONXT),
    }
}

fn length_field(protocol: Protocol, len: usize) -> Result<u16> {
    u16::try_from(len)
        .map_err(|_| Error::construction(format!("{} length {} exceeds 65535", protocol, len)))
}

/// Typed view over the region a layer occupies in the output buffer
fn layer_frame<P: Header>(region: &mut [u8], header_len: usize) -> Frame<P, &mut [u8]> {
    let len = region.len();
    Frame::from_parts(region, len, header_len)
}

/// Packet builder with fluent API for constructing network packets
///
/// # Examples
///
/// ```
/// use ofswitch_packet::PacketBuilder;
/// use ofswitch_packet::stack::FrameStack;
/// use ofswitch_packet::udp::Udp;
/// use ofswitch_core::MacAddr;
/// use std::net::Ipv4Addr;
///
/// let packet = PacketBuilder::new()
///     .ethernet(MacAddr::new([0x02, 0, 0, 0, 0, 1]), MacAddr::BROADCAST)
///     .ipv4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 255))
///     .udp(68, 67)
///     .payload(vec![0x01, 0x01, 0x06, 0x00])
///     .build()
///     .unwrap();
///
/// let stack = FrameStack::decode_ethernet(packet.as_slice()).unwrap();
/// assert_eq!(stack.get::<Udp>().unwrap().length(), 12);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PacketBuilder {
    layers: Vec<LayerSpec>,
    payload: Vec<u8>,
    options: BuildOptions,
}

impl PacketBuilder {
    /// Create a new packet builder
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Add an Ethernet layer
    ///
    /// The EtherType follows from the next layer; call [`ethertype`] for a
    /// raw payload.
    ///
    /// [`ethertype`]: PacketBuilder::ethertype
    pub fn ethernet(mut self, src: MacAddr, dst: MacAddr) -> Self {
        self.layers.push(LayerSpec::Ethernet {
            src,
            dst,
            ethertype: None,
        });
        self
    }

    /// Add an 802.1Q tag
    pub fn vlan(mut self, vid: VlanId) -> Self {
        self.layers.push(LayerSpec::Vlan {
            vid,
            pcp: 0,
            ethertype: None,
        });
        self
    }

    /// Set the priority of the most recent VLAN tag
    pub fn pcp(mut self, priority: u8) -> Self {
        if let Some(pcp) = self.layers.iter_mut().rev().find_map(|layer| match layer {
            LayerSpec::Vlan { pcp, .. } => Some(pcp),
            _ => None,
        }) {
            *pcp = priority;
        }
        self
    }

    /// Override the EtherType of the most recent Ethernet or VLAN layer
    ///
    /// Needed for raw payloads and for 802.1ad (`EtherType::QinQ`) outer
    /// tags.
    pub fn ethertype(mut self, value: EtherType) -> Self {
        if let Some(slot) = self.layers.iter_mut().rev().find_map(|layer| match layer {
            LayerSpec::Ethernet { ethertype, .. } | LayerSpec::Vlan { ethertype, .. } => {
                Some(ethertype)
            }
            _ => None,
        }) {
            *slot = Some(value);
        }
        self
    }

    /// Push an MPLS label; bottom-of-stack is set on the last one
    pub fn mpls(mut self, label: u32, ttl: u8) -> Self {
        self.layers.push(LayerSpec::Mpls {
            label: label & MplsLabel::MAX,
            tc: 0,
            ttl,
        });
        self
    }

    /// Add an Ethernet/IPv4 ARP message
    pub fn arp(
        mut self,
        operation: ArpOperation,
        sender: (MacAddr, Ipv4Addr),
        target: (MacAddr, Ipv4Addr),
    ) -> Self {
        self.layers.push(LayerSpec::Arp {
            operation,
            sender_mac: sender.0,
            sender_ip: sender.1,
            target_mac: target.0,
            target_ip: target.1,
        });
        self
    }

    /// Add an IPv4 layer
    ///
    /// # Arguments
    ///
    /// * `src` - Source IP address
    /// * `dst` - Destination IP address
    pub fn ipv4(mut self, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        self.layers.push(LayerSpec::Ipv4 {
            src,
            dst,
            ttl: 64,
            identification: 0,
            dscp: 0,
            dont_fragment: false,
            protocol: None,
        });
        self
    }

    /// Set the TTL for the most recent IPv4 layer
    pub fn ttl(mut self, new_ttl: u8) -> Self {
        if let Some(ttl) = self.layers.iter_mut().rev().find_map(|layer| match layer {
            LayerSpec::Ipv4 { ttl, .. } => Some(ttl),
            _ => None,
        }) {
            *ttl = new_ttl;
        }
        self
    }

    /// Set the identification for the most recent IPv4 layer
    pub fn identification(mut self, id: u16) -> Self {
        if let Some(identification) = self.layers.iter_mut().rev().find_map(|layer| match layer {
            LayerSpec::Ipv4 { identification, .. } => Some(identification),
            _ => None,
        }) {
            *identification = id;
        }
        self
    }

    pub fn dscp(mut self, value: u8) -> Self {
        if let Some(dscp) = self.layers.iter_mut().rev().find_map(|layer| match layer {
            LayerSpec::Ipv4 { dscp, .. } => Some(dscp),
            _ => None,
        }) {
            *dscp = value & 0x3F;
        }
        self
    }

    pub fn dont_fragment(mut self) -> Self {
        if let Some(df) = self.layers.iter_mut().rev().find_map(|layer| match layer {
            LayerSpec::Ipv4 { dont_fragment, .. } => Some(dont_fragment),
            _ => None,
        }) {
            *df = true;
        }
        self
    }

    /// Override the protocol / next header of the most recent IP layer
    pub fn ip_protocol(mut self, value: IpProtocol) -> Self {
        if let Some(slot) = self.layers.iter_mut().rev().find_map(|layer| match layer {
            LayerSpec::Ipv4 { protocol, .. } => Some(protocol),
            LayerSpec::Ipv6 { next_header, .. } => Some(next_header),
            _ => None,
        }) {
            *slot = Some(value);
        }
        self
    }

    /// Add an IPv6 layer
    pub fn ipv6(mut self, src: Ipv6Addr, dst: Ipv6Addr) -> Self {
        self.layers.push(LayerSpec::Ipv6 {
            src,
            dst,
            hop_limit: 64,
            traffic_class: 0,
            flow_label: 0,
            next_header: None,
        });
        self
    }

    pub fn hop_limit(mut self, value: u8) -> Self {
        if let Some(hop_limit) = self.layers.iter_mut().rev().find_map(|layer| match layer {
            LayerSpec::Ipv6 { hop_limit, .. } => Some(hop_limit),
            _ => None,
        }) {
            *hop_limit = value;
        }
        self
    }

    pub fn flow_label(mut self, value: u32) -> Self {
        if let Some(flow_label) = self.layers.iter_mut().rev().find_map(|layer| match layer {
            LayerSpec::Ipv6 { flow_label, .. } => Some(flow_label),
            _ => None,
        }) {
            *flow_label = value & 0x000F_FFFF;
        }
        self
    }

    /// Add an ICMPv4 message with a zero rest-of-header
    pub fn icmpv4(mut self, icmp_type: Icmpv4Type, code: u8) -> Self {
        self.layers.push(LayerSpec::Icmpv4 {
            icmp_type,
            code,
            rest: [0; 4],
        });
        self
    }

    pub fn icmpv4_echo_request(mut self, identifier: u16, sequence: u16) -> Self {
        let mut rest = [0u8; 4];
        rest[..2].copy_from_slice(&identifier.to_be_bytes());
        rest[2..].copy_from_slice(&sequence.to_be_bytes());
        self.layers.push(LayerSpec::Icmpv4 {
            icmp_type: Icmpv4Type::EchoRequest,
            code: 0,
            rest,
        });
        self
    }

    /// Add an ICMPv6 message with a zero body
    pub fn icmpv6(mut self, icmp_type: Icmpv6Type, code: u8) -> Self {
        self.layers.push(LayerSpec::Icmpv6 {
            icmp_type,
            code,
            body: vec![0; icmp_type.fixed_len() - 4],
            options: Vec::new(),
        });
        self
    }

    pub fn icmpv6_echo_request(mut self, identifier: u16, sequence: u16) -> Self {
        let mut body = identifier.to_be_bytes().to_vec();
        body.extend_from_slice(&sequence.to_be_bytes());
        self.layers.push(LayerSpec::Icmpv6 {
            icmp_type: Icmpv6Type::EchoRequest,
            code: 0,
            body,
            options: Vec::new(),
        });
        self
    }

    pub fn neighbor_solicitation(mut self, target: Ipv6Addr) -> Self {
        let mut body = vec![0u8; 4];
        body.extend_from_slice(&target.octets());
        self.layers.push(LayerSpec::Icmpv6 {
            icmp_type: Icmpv6Type::NeighborSolicitation,
            code: 0,
            body,
            options: Vec::new(),
        });
        self
    }

    pub fn neighbor_advertisement(mut self, target: Ipv6Addr, flags: NeighborAdvertFlags) -> Self {
        let flag_byte = (if flags.router { 0x80 } else { 0 })
            | (if flags.solicited { 0x40 } else { 0 })
            | (if flags.override_ { 0x20 } else { 0 });
        let mut body = vec![flag_byte, 0, 0, 0];
        body.extend_from_slice(&target.octets());
        self.layers.push(LayerSpec::Icmpv6 {
            icmp_type: Icmpv6Type::NeighborAdvertisement,
            code: 0,
            body,
            options: Vec::new(),
        });
        self
    }

    /// Append a Neighbor Discovery option to the most recent ICMPv6 message
    pub fn icmpv6_option(mut self, option: Icmpv6OptionRepr) -> Self {
        if let Some(options) = self.layers.iter_mut().rev().find_map(|layer| match layer {
            LayerSpec::Icmpv6 { options, .. } => Some(options),
            _ => None,
        }) {
            options.push(option);
        }
        self
    }

    /// Add a TCP layer
    ///
    /// # Arguments
    ///
    /// * `src_port` - Source port
    /// * `dst_port` - Destination port
    /// * `seq` - Sequence number
    /// * `ack` - Acknowledgment number
    /// * `flags` - TCP flags
    pub fn tcp(
        mut self,
        src_port: u16,
        dst_port: u16,
        seq: u32,
        ack: u32,
        flags: TcpFlags,
    ) -> Self {
        self.layers.push(LayerSpec::Tcp {
            src_port,
            dst_port,
            seq,
            ack,
            flags,
            window: 65535,
            options: Vec::new(),
        });
        self
    }

    /// Set the TCP window size
    pub fn window(mut self, new_window: u16) -> Self {
        if let Some(window) = self.layers.iter_mut().rev().find_map(|layer| match layer {
            LayerSpec::Tcp { window, .. } => Some(window),
            _ => None,
        }) {
            *window = new_window;
        }
        self
    }

    /// Raw TCP options, zero-padded to a 4-byte boundary
    pub fn tcp_options(mut self, bytes: &[u8]) -> Self {
        if let Some(options) = self.layers.iter_mut().rev().find_map(|layer| match layer {
            LayerSpec::Tcp { options, .. } => Some(options),
            _ => None,
        }) {
            *options = bytes.to_vec();
        }
        self
    }

    /// Add a UDP layer
    pub fn udp(mut self, src_port: u16, dst_port: u16) -> Self {
        self.layers.push(LayerSpec::Udp { src_port, dst_port });
        self
    }

    /// Add an SCTP common header
    pub fn sctp(mut self, src_port: u16, dst_port: u16, verification_tag: u32) -> Self {
        self.layers.push(LayerSpec::Sctp {
            src_port,
            dst_port,
            verification_tag,
        });
        self
    }

    /// Set the payload data
    pub fn payload(mut self, data: Vec<u8>) -> Self {
        self.payload = data;
        self
    }

    /// Protocols of the configured layers, outermost first
    pub fn protocols(&self) -> Vec<Protocol> {
        self.layers.iter().map(LayerSpec::protocol).collect()
    }

    fn validate(&self) -> Result<()> {
        let first = self
            .layers
            .first()
            .ok_or_else(|| Error::construction("no layers to build"))?;
        if self.layers[1..]
            .iter()
            .any(|layer| layer.protocol() == Protocol::Ethernet)
        {
            return Err(Error::construction("Ethernet must be the outermost layer"));
        }
        let mut outer = first.protocol();
        for layer in &self.layers[1..] {
            let inner = layer.protocol();
            if !can_follow(outer, inner) {
                return Err(Error::construction(format!(
                    "{} cannot be carried in {}",
                    inner, outer
                )));
            }
            outer = inner;
        }
        for layer in &self.layers {
            if let LayerSpec::Icmpv6 {
                icmp_type, options, ..
            } = layer
            {
                if !options.is_empty() && !icmp_type.has_options() {
                    return Err(Error::construction(format!(
                        "ICMPv6 type {} carries no options",
                        icmp_type.to_u8()
                    )));
                }
                if icmp_type.has_options() && !self.payload.is_empty() {
                    return Err(Error::construction(
                        "Neighbor Discovery messages carry options, not payload",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Pseudo-header from the nearest IP layer outside layer `index`
    fn pseudo_header(&self, index: usize) -> Option<PseudoHeader> {
        self.layers[..index]
            .iter()
            .rev()
            .find_map(|layer| match layer {
                LayerSpec::Ipv4 { src, dst, .. } => Some(PseudoHeader::V4 {
                    src: *src,
                    dst: *dst,
                }),
                LayerSpec::Ipv6 { src, dst, .. } => Some(PseudoHeader::V6 {
                    src: *src,
                    dst: *dst,
                }),
                _ => None,
            })
    }

    /// Build the complete packet
    ///
    /// # Errors
    ///
    /// Returns `PacketConstruction` if the layering is invalid (TCP without
    /// IP, IPv4 carrying ICMPv6, a raw Ethernet payload without EtherType,
    /// ...) or a length field overflows.
    pub fn build(&self) -> Result<ByteBuffer> {
        self.validate()?;

        let header_lens: Vec<usize> = self.layers.iter().map(LayerSpec::header_len).collect();
        let mut offsets = Vec::with_capacity(header_lens.len());
        let mut content_len = 0;
        for len in &header_lens {
            offsets.push(content_len);
            content_len += len;
        }
        let payload_offset = content_len;
        content_len += self.payload.len();

        let outer_is_ethernet = self.layers[0].protocol() == Protocol::Ethernet;
        let total = if outer_is_ethernet && self.options.pad_ethernet {
            content_len.max(Ethernet::MIN_FRAME_SIZE)
        } else {
            content_len
        };

        let mut buffer = ByteBuffer::zeroed(total);
        let bytes = buffer.as_mut_slice();
        bytes[payload_offset..content_len].copy_from_slice(&self.payload);

        for index in (0..self.layers.len()).rev() {
            // padding belongs to the Ethernet frame only
            let end = if index == 0 { total } else { content_len };
            let region = &mut bytes[offsets[index]..end];
            self.encode_layer(index, region, header_lens[index])?;
        }

        Ok(buffer)
    }

    fn encode_layer(&self, index: usize, region: &mut [u8], header_len: usize) -> Result<()> {
        let next = self.layers.get(index + 1);
        let checksums = self.options.compute_checksums;
        let pseudo = self.pseudo_header(index);

        match &self.layers[index] {
            LayerSpec::Ethernet {
                src,
                dst,
                ethertype,
            } => {
                let mut frame = layer_frame::<Ethernet>(region, header_len);
                frame.set_destination(*dst);
                frame.set_source(*src);
                frame.set_ethertype(ethertype_for(*ethertype, next)?);
            }
            LayerSpec::Vlan {
                vid,
                pcp,
                ethertype,
            } => {
                let mut frame = layer_frame::<Vlan>(region, header_len);
                frame.set_vid(*vid);
                frame.set_pcp(*pcp);
                frame.set_ethertype(ethertype_for(*ethertype, next)?);
            }
            LayerSpec::Mpls { label, tc, ttl } => {
                let mut frame = layer_frame::<Mpls>(region, header_len);
                let entry = MplsLabel {
                    label: *label,
                    tc: *tc,
                    bottom_of_stack: !matches!(next, Some(LayerSpec::Mpls { .. })),
                    ttl: *ttl,
                };
                frame.set_label(0, entry)?;
            }
            LayerSpec::Arp {
                operation,
                sender_mac,
                sender_ip,
                target_mac,
                target_ip,
            } => {
                let mut frame = layer_frame::<Arp>(region, header_len);
                frame.set_ethernet_ipv4();
                frame.set_operation(*operation);
                frame.set_sender_hardware_addr(*sender_mac);
                frame.set_sender_protocol_addr(*sender_ip);
                frame.set_target_hardware_addr(*target_mac);
                frame.set_target_protocol_addr(*target_ip);
            }
            LayerSpec::Ipv4 {
                src,
                dst,
                ttl,
                identification,
                dscp,
                dont_fragment,
                protocol,
            } => {
                let total_length = length_field(Protocol::Ipv4, region.len())?;
                let mut frame = layer_frame::<Ipv4>(region, header_len);
                frame.set_version();
                frame.set_ihl(5)?;
                frame.set_dscp(*dscp);
                frame.set_total_length(total_length);
                frame.set_identification(*identification);
                if *dont_fragment {
                    frame.set_flags(IpFlags::DONT_FRAGMENT);
                }
                frame.set_ttl(*ttl);
                frame.set_protocol(ip_protocol_for(*protocol, next));
                frame.set_source(*src);
                frame.set_destination(*dst);
                if checksums {
                    frame.fill_checksum();
                }
            }
            LayerSpec::Ipv6 {
                src,
                dst,
                hop_limit,
                traffic_class,
                flow_label,
                next_header,
            } => {
                let payload_length = length_field(Protocol::Ipv6, region.len() - header_len)?;
                let mut frame = layer_frame::<Ipv6>(region, header_len);
                frame.set_version();
                frame.set_traffic_class(*traffic_class);
                frame.set_flow_label(*flow_label);
                frame.set_payload_length(payload_length);
                frame.set_next_header(ip_protocol_for(*next_header, next).to_u8());
                frame.set_hop_limit(*hop_limit);
                frame.set_source(*src);
                frame.set_destination(*dst);
            }
            LayerSpec::Icmpv4 {
                icmp_type,
                code,
                rest,
            } => {
                let mut frame = layer_frame::<Icmpv4>(region, header_len);
                frame.set_icmp_type(*icmp_type);
                frame.set_code(*code);
                frame.set_rest_of_header(*rest);
                if checksums {
                    frame.fill_checksum();
                }
            }
            LayerSpec::Icmpv6 {
                icmp_type,
                code,
                body,
                options,
            } => {
                let mut frame = layer_frame::<Icmpv6>(region, header_len);
                frame.set_icmp_type(*icmp_type);
                frame.set_code(*code);
                frame.set_body(body)?;
                if !options.is_empty() {
                    frame.set_options(options)?;
                }
                if let (true, Some(pseudo)) = (checksums, pseudo) {
                    frame.fill_checksum(&pseudo);
                }
            }
            LayerSpec::Tcp {
                src_port,
                dst_port,
                seq,
                ack,
                flags,
                window,
                options,
            } => {
                let mut frame = layer_frame::<Tcp>(region, header_len);
                frame.set_source_port(TcpPort::new(*src_port));
                frame.set_destination_port(TcpPort::new(*dst_port));
                frame.set_sequence_number(*seq);
                frame.set_acknowledgment_number(*ack);
                frame.set_flags(*flags);
                frame.set_window_size(*window);
                if options.is_empty() {
                    frame.set_data_offset(5)?;
                } else {
                    frame.set_options(options)?;
                }
                if let (true, Some(pseudo)) = (checksums, pseudo) {
                    frame.fill_checksum(&pseudo);
                }
            }
            LayerSpec::Udp { src_port, dst_port } => {
                let mut frame = layer_frame::<Udp>(region, header_len);
                frame.set_source_port(UdpPort::new(*src_port));
                frame.set_destination_port(UdpPort::new(*dst_port));
                frame.fill_length()?;
                if let (true, Some(pseudo)) = (checksums, pseudo) {
                    frame.fill_checksum(&pseudo);
                }
            }
            LayerSpec::Sctp {
                src_port,
                dst_port,
                verification_tag,
            } => {
                let mut frame = layer_frame::<Sctp>(region, header_len);
                frame.set_source_port(*src_port);
                frame.set_destination_port(*dst_port);
                frame.set_verification_tag(*verification_tag);
                if checksums {
                    frame.fill_checksum();
                }
            }
        }
        Ok(())
    }
}
