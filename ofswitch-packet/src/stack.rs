//! Frame stack decoding
//!
//! A [`FrameStack`] is the chain of codecs found in one buffer, outermost
//! first. Each layer is recorded as an offset/length pair into the shared
//! buffer, so layers are borrowed views and never copies.
//!
//! Decoding reads each header's discriminator (EtherType, IP protocol,
//! next header, MPLS payload version) to pick the codec for the payload.
//! An unknown discriminator ends the stack at an opaque
//! [`Protocol::Payload`] layer; a malformed header ends it with an error.
//!
//! # Examples
//!
//! ```
//! use ofswitch_packet::ethernet::Ethernet;
//! use ofswitch_packet::frame::Protocol;
//! use ofswitch_packet::stack::FrameStack;
//!
//! let mut frame = vec![0xff; 12];
//! frame.extend_from_slice(&[0x88, 0xb5, 0xca, 0xfe]);
//!
//! let stack = FrameStack::decode(&frame, Protocol::Ethernet).unwrap();
//! assert_eq!(stack.protocols(), vec![Protocol::Ethernet, Protocol::Payload]);
//! assert_eq!(stack.get::<Ethernet>().unwrap().ethertype_raw(), 0x88b5);
//! assert_eq!(stack.payload(), &[0xca, 0xfe]);
//! ```

use crate::arp::{Arp, ArpFrame};
use crate::checksum::PseudoHeader;
use crate::ethernet::{Ethernet, EthernetFrame};
use crate::frame::{Frame, Framed, Header, Protocol};
use crate::icmpv4::{Icmpv4, Icmpv4Frame};
use crate::icmpv6::{Icmpv6, Icmpv6Frame};
use crate::ipv4::{Ipv4, Ipv4Frame};
use crate::ipv6::{Ipv6, Ipv6Frame};
use crate::mpls::{Mpls, MplsFrame};
use crate::sctp::{Sctp, SctpFrame};
use crate::tcp::{Tcp, TcpFrame};
use crate::udp::{Udp, UdpFrame};
use crate::vlan::{Vlan, VlanFrame};
use ofswitch_core::{Error, Result};
use tracing::{debug, warn};

/// Position of one decoded layer inside the stack buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerInfo {
    pub protocol: Protocol,
    /// Offset of the layer from the start of the buffer
    pub offset: usize,
    pub header_len: usize,
    /// Header plus everything the layer wraps
    pub len: usize,
}

impl LayerInfo {
    pub fn payload_offset(&self) -> usize {
        self.offset + self.header_len
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// One decoded layer, typed
#[derive(Debug, Clone)]
pub enum Layer<'a> {
    Ethernet(EthernetFrame<&'a [u8]>),
    Vlan(VlanFrame<&'a [u8]>),
    Arp(ArpFrame<&'a [u8]>),
    Ipv4(Ipv4Frame<&'a [u8]>),
    Ipv6(Ipv6Frame<&'a [u8]>),
    Icmpv4(Icmpv4Frame<&'a [u8]>),
    Icmpv6(Icmpv6Frame<&'a [u8]>),
    Tcp(TcpFrame<&'a [u8]>),
    Udp(UdpFrame<&'a [u8]>),
    Sctp(SctpFrame<&'a [u8]>),
    Mpls(MplsFrame<&'a [u8]>),
    /// Bytes no codec claimed
    Payload(&'a [u8]),
}

impl<'a> Layer<'a> {
    fn from_info(data: &'a [u8], info: &LayerInfo) -> Self {
        let region = &data[info.offset..info.end()];
        match info.protocol {
            Protocol::Ethernet => Layer::Ethernet(view(region, info)),
            Protocol::Vlan => Layer::Vlan(view(region, info)),
            Protocol::Arp => Layer::Arp(view(region, info)),
            Protocol::Ipv4 => Layer::Ipv4(view(region, info)),
            Protocol::Ipv6 => Layer::Ipv6(view(region, info)),
            Protocol::Icmpv4 => Layer::Icmpv4(view(region, info)),
            Protocol::Icmpv6 => Layer::Icmpv6(view(region, info)),
            Protocol::Tcp => Layer::Tcp(view(region, info)),
            Protocol::Udp => Layer::Udp(view(region, info)),
            Protocol::Sctp => Layer::Sctp(view(region, info)),
            Protocol::Mpls => Layer::Mpls(view(region, info)),
            Protocol::Payload => Layer::Payload(region),
        }
    }

    fn as_framed(&self) -> Option<&dyn Framed> {
        let framed: &dyn Framed = match self {
            Layer::Ethernet(frame) => frame,
            Layer::Vlan(frame) => frame,
            Layer::Arp(frame) => frame,
            Layer::Ipv4(frame) => frame,
            Layer::Ipv6(frame) => frame,
            Layer::Icmpv4(frame) => frame,
            Layer::Icmpv6(frame) => frame,
            Layer::Tcp(frame) => frame,
            Layer::Udp(frame) => frame,
            Layer::Sctp(frame) => frame,
            Layer::Mpls(frame) => frame,
            Layer::Payload(_) => return None,
        };
        Some(framed)
    }
}

impl Framed for Layer<'_> {
    fn protocol(&self) -> Protocol {
        self.as_framed()
            .map(|frame| frame.protocol())
            .unwrap_or(Protocol::Payload)
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Layer::Payload(bytes) => bytes,
            _ => self.as_framed().map(|frame| frame.bytes()).unwrap_or(&[]),
        }
    }

    fn header_len(&self) -> usize {
        self.as_framed().map(|frame| frame.header_len()).unwrap_or(0)
    }
}

fn view<'a, P: Header>(region: &'a [u8], info: &LayerInfo) -> Frame<P, &'a [u8]> {
    Frame::from_parts(region, info.len, info.header_len)
}

/// Parse `region` as `P` and cut it to the length the header declares
///
/// Bytes past a declared length (Ethernet padding, trailers) are left out
/// of the frame. A declared length longer than the region, or shorter than
/// the header, is malformed.
fn bounded<P: Header>(region: &[u8]) -> Result<Frame<P, &[u8]>> {
    let frame = Frame::<P, &[u8]>::parse(region)?;
    match P::declared_len(region) {
        None => Ok(frame),
        Some(declared) if declared > region.len() => Err(Error::malformed(
            P::PROTOCOL.name(),
            format!(
                "declared length {} exceeds {} available bytes",
                declared,
                region.len()
            ),
        )),
        Some(declared) if declared < frame.header_len() => Err(Error::malformed(
            P::PROTOCOL.name(),
            format!(
                "declared length {} shorter than header of {}",
                declared,
                frame.header_len()
            ),
        )),
        Some(declared) => Ok(Frame::from_parts(region, declared, frame.header_len())),
    }
}

/// Result of decoding one layer: its extent and the codec for its payload
struct Step {
    header_len: usize,
    len: usize,
    next: Protocol,
}

impl Step {
    fn of<P: Header>(frame: &Frame<P, &[u8]>, next: Protocol) -> Self {
        Step {
            header_len: frame.header_len(),
            len: frame.total_len(),
            next,
        }
    }
}

fn unknown(layer: Protocol, field: &'static str, value: u32) -> Protocol {
    debug!(
        layer = %layer,
        field,
        discriminator = value,
        "no codec for discriminator, stack ends at payload"
    );
    Protocol::Payload
}

fn step(protocol: Protocol, region: &[u8]) -> Result<Step> {
    match protocol {
        Protocol::Ethernet => {
            let frame = bounded::<Ethernet>(region)?;
            let next = match frame.ethertype().next_protocol() {
                Protocol::Payload => unknown(protocol, "ethertype", frame.ethertype_raw() as u32),
                next => next,
            };
            Ok(Step::of(&frame, next))
        }
        Protocol::Vlan => {
            let frame = bounded::<Vlan>(region)?;
            let next = match frame.ethertype().next_protocol() {
                Protocol::Payload => {
                    unknown(protocol, "ethertype", frame.ethertype().to_u16() as u32)
                }
                next => next,
            };
            Ok(Step::of(&frame, next))
        }
        Protocol::Mpls => {
            let frame = bounded::<Mpls>(region)?;
            let next = match frame.payload_protocol() {
                Protocol::Payload if frame.payload_len() > 0 => unknown(
                    protocol,
                    "version",
                    (frame.payload()[0] >> 4) as u32,
                ),
                next => next,
            };
            Ok(Step::of(&frame, next))
        }
        Protocol::Ipv4 => {
            let frame = bounded::<Ipv4>(region)?;
            let next = if frame.is_fragment() {
                Protocol::Payload
            } else {
                match frame.protocol().next_protocol() {
                    Protocol::Payload => {
                        unknown(protocol, "protocol", frame.protocol().to_u8() as u32)
                    }
                    next => next,
                }
            };
            Ok(Step::of(&frame, next))
        }
        Protocol::Ipv6 => {
            let frame = bounded::<Ipv6>(region)?;
            let upper = frame.upper_layer_protocol();
            let next = match upper.next_protocol() {
                Protocol::Payload => unknown(protocol, "next_header", upper.to_u8() as u32),
                next => next,
            };
            Ok(Step::of(&frame, next))
        }
        Protocol::Arp => Ok(Step::of(&bounded::<Arp>(region)?, Protocol::Payload)),
        Protocol::Icmpv4 => Ok(Step::of(&bounded::<Icmpv4>(region)?, Protocol::Payload)),
        Protocol::Icmpv6 => Ok(Step::of(&bounded::<Icmpv6>(region)?, Protocol::Payload)),
        Protocol::Tcp => Ok(Step::of(&bounded::<Tcp>(region)?, Protocol::Payload)),
        Protocol::Udp => Ok(Step::of(&bounded::<Udp>(region)?, Protocol::Payload)),
        Protocol::Sctp => Ok(Step::of(&bounded::<Sctp>(region)?, Protocol::Payload)),
        Protocol::Payload => Ok(Step {
            header_len: 0,
            len: region.len(),
            next: Protocol::Payload,
        }),
    }
}

fn decode_layers(data: &[u8], first: Protocol) -> Result<Vec<LayerInfo>> {
    let mut layers = Vec::new();
    let mut offset = 0;
    let mut end = data.len();
    let mut protocol = first;

    loop {
        let region = &data[offset..end];
        if protocol == Protocol::Payload {
            if !region.is_empty() {
                layers.push(LayerInfo {
                    protocol,
                    offset,
                    header_len: 0,
                    len: region.len(),
                });
            }
            return Ok(layers);
        }

        let step = match step(protocol, region) {
            Ok(step) => step,
            Err(err) => {
                warn!(
                    layer = %protocol,
                    offset,
                    depth = layers.len(),
                    error = %err,
                    "malformed header, abandoning decode"
                );
                return Err(err);
            }
        };

        layers.push(LayerInfo {
            protocol,
            offset,
            header_len: step.header_len,
            len: step.len,
        });
        end = offset + step.len;
        offset += step.header_len;
        protocol = step.next;
    }
}

/// Decoded chain of layers over a borrowed buffer
#[derive(Debug, Clone)]
pub struct FrameStack<'a> {
    data: &'a [u8],
    layers: Vec<LayerInfo>,
}

impl<'a> FrameStack<'a> {
    /// Decode `data` starting with the codec for `first`
    ///
    /// Fails with `MalformedFrame` when any header in the chain is
    /// inconsistent with the bytes.
    pub fn decode(data: &'a [u8], first: Protocol) -> Result<Self> {
        let layers = decode_layers(data, first)?;
        Ok(Self { data, layers })
    }

    /// Decode an Ethernet frame
    pub fn decode_ethernet(data: &'a [u8]) -> Result<Self> {
        Self::decode(data, Protocol::Ethernet)
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn layers(&self) -> &[LayerInfo] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn protocols(&self) -> Vec<Protocol> {
        self.layers.iter().map(|layer| layer.protocol).collect()
    }

    pub fn contains(&self, protocol: Protocol) -> bool {
        self.layers.iter().any(|layer| layer.protocol == protocol)
    }

    pub fn layer(&self, index: usize) -> Option<Layer<'a>> {
        self.layers
            .get(index)
            .map(|info| Layer::from_info(self.data, info))
    }

    pub fn iter(&self) -> impl Iterator<Item = Layer<'a>> + '_ {
        self.layers
            .iter()
            .map(move |info| Layer::from_info(self.data, info))
    }

    /// Outermost layer of protocol `P`
    pub fn get<P: Header>(&self) -> Option<Frame<P, &'a [u8]>> {
        self.nth::<P>(0)
    }

    /// The `n`-th layer of protocol `P`, counting from the outside
    ///
    /// `nth::<Vlan>(1)` is the inner tag of a Q-in-Q frame.
    pub fn nth<P: Header>(&self, n: usize) -> Option<Frame<P, &'a [u8]>> {
        self.layers
            .iter()
            .filter(|info| info.protocol == P::PROTOCOL)
            .nth(n)
            .map(|info| view(&self.data[info.offset..info.end()], info))
    }

    /// Bytes of the opaque payload layer ending the stack, if any
    pub fn payload(&self) -> &'a [u8] {
        match self.layers.last() {
            Some(info) if info.protocol == Protocol::Payload => {
                &self.data[info.offset..info.end()]
            }
            _ => &[],
        }
    }

    /// Pseudo-header from the IP layer enclosing layer `index`
    pub fn pseudo_header(&self, index: usize) -> Option<PseudoHeader> {
        pseudo_header(self.data, &self.layers, index)
    }

    pub fn into_layers(self) -> Vec<LayerInfo> {
        self.layers
    }
}

fn pseudo_header(data: &[u8], layers: &[LayerInfo], index: usize) -> Option<PseudoHeader> {
    let layers = layers.get(..index)?;
    let info = layers
        .iter()
        .rev()
        .find(|info| matches!(info.protocol, Protocol::Ipv4 | Protocol::Ipv6))?;
    let region = &data[info.offset..info.end()];
    match info.protocol {
        Protocol::Ipv4 => {
            let ip: Ipv4Frame<&[u8]> = view(region, info);
            Some(PseudoHeader::V4 {
                src: ip.source(),
                dst: ip.destination(),
            })
        }
        _ => {
            let ip: Ipv6Frame<&[u8]> = view(region, info);
            Some(PseudoHeader::V6 {
                src: ip.source(),
                dst: ip.destination(),
            })
        }
    }
}

/// Decoded chain of layers over a mutable buffer
///
/// Field setters go through [`FrameStackMut::get_mut`]. Layer extents are
/// fixed at decode time, so setters that change a header length need a
/// fresh decode afterwards.
#[derive(Debug)]
pub struct FrameStackMut<'a> {
    data: &'a mut [u8],
    layers: Vec<LayerInfo>,
}

impl<'a> FrameStackMut<'a> {
    pub fn decode(data: &'a mut [u8], first: Protocol) -> Result<Self> {
        let layers = decode_layers(data, first)?;
        Ok(Self { data, layers })
    }

    pub fn decode_ethernet(data: &'a mut [u8]) -> Result<Self> {
        Self::decode(data, Protocol::Ethernet)
    }

    pub fn layers(&self) -> &[LayerInfo] {
        &self.layers
    }

    /// Read-only view of the same stack
    pub fn as_stack(&self) -> FrameStack<'_> {
        FrameStack {
            data: &*self.data,
            layers: self.layers.clone(),
        }
    }

    /// Outermost layer of protocol `P`, mutable
    pub fn get_mut<P: Header>(&mut self) -> Option<Frame<P, &mut [u8]>> {
        self.nth_mut::<P>(0)
    }

    pub fn nth_mut<P: Header>(&mut self, n: usize) -> Option<Frame<P, &mut [u8]>> {
        let info = *self
            .layers
            .iter()
            .filter(|info| info.protocol == P::PROTOCOL)
            .nth(n)?;
        Some(self.frame_mut(&info))
    }

    fn frame_mut<P: Header>(&mut self, info: &LayerInfo) -> Frame<P, &mut [u8]> {
        Frame::from_parts(
            &mut self.data[info.offset..info.end()],
            info.len,
            info.header_len,
        )
    }

    /// Recompute every checksum in the stack, innermost layer first
    ///
    /// Transport checksums use the addresses of the nearest enclosing IP
    /// layer and are skipped when there is none.
    pub fn update_checksums(&mut self) {
        for index in (0..self.layers.len()).rev() {
            let info = self.layers[index];
            let pseudo = pseudo_header(&*self.data, &self.layers, index);
            match (info.protocol, pseudo) {
                (Protocol::Ipv4, _) => self.frame_mut::<Ipv4>(&info).fill_checksum(),
                (Protocol::Icmpv4, _) => self.frame_mut::<Icmpv4>(&info).fill_checksum(),
                (Protocol::Sctp, _) => self.frame_mut::<Sctp>(&info).fill_checksum(),
                (Protocol::Tcp, Some(pseudo)) => {
                    self.frame_mut::<Tcp>(&info).fill_checksum(&pseudo)
                }
                (Protocol::Udp, Some(pseudo)) => {
                    self.frame_mut::<Udp>(&info).fill_checksum(&pseudo)
                }
                (Protocol::Icmpv6, Some(pseudo)) => {
                    self.frame_mut::<Icmpv6>(&info).fill_checksum(&pseudo)
                }
                _ => {}
            }
        }
    }

    /// Verify every checksum in the stack
    pub fn checksums_valid(&self) -> bool {
        checksums_valid(&self.as_stack())
    }
}

/// True when every checksummed layer of `stack` carries a correct checksum
pub fn checksums_valid(stack: &FrameStack<'_>) -> bool {
    stack.iter().enumerate().all(|(index, layer)| {
        let pseudo = stack.pseudo_header(index);
        match (layer, pseudo) {
            (Layer::Ipv4(ip), _) => ip.verify_checksum(),
            (Layer::Icmpv4(icmp), _) => icmp.verify_checksum(),
            (Layer::Sctp(sctp), _) => sctp.verify_checksum(),
            (Layer::Tcp(tcp), Some(pseudo)) => tcp.verify_checksum(&pseudo),
            (Layer::Udp(udp), Some(pseudo)) => udp.verify_checksum(&pseudo),
            (Layer::Icmpv6(icmp), Some(pseudo)) => icmp.verify_checksum(&pseudo),
            _ => true,
        }
    })
}
