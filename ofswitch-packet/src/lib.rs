//! Packet codecs for the ofswitch datapath
//!
//! This crate decodes and encodes layered frames over a single byte buffer.
//! Every protocol header is a typed, bounds-checked view ([`Frame`]) into
//! that buffer; nested layers are suffixes of their parent's region. It
//! includes support for:
//!
//! - **Ethernet II** frames and **802.1Q / 802.1ad** VLAN tags
//! - **ARP** for Ethernet/IPv4
//! - **MPLS** label stacks
//! - **IPv4** with options and **IPv6** with extension header chains
//! - **ICMPv4**, and **ICMPv6** including Neighbor Discovery options
//! - **TCP**, **UDP** and **SCTP**
//!
//! # Architecture
//!
//! - [`memory`] - growable or fixed byte storage with bounded reads and writes
//! - [`frame`] - the generic frame view, the `Header` trait and the protocol tags
//! - one module per protocol codec
//! - [`checksum`] - Internet checksum, pseudo-headers and CRC32c
//! - [`stack`] - decoding a buffer into a chain of layers
//! - [`builder`] - fluent construction of a chain of layers
//!
//! Checksums are never recomputed behind the caller's back: setters only
//! write fields, and `fill_checksum` / [`FrameStackMut::update_checksums`]
//! recompute on request.
//!
//! # Quick Start
//!
//! ## Decoding a frame
//!
//! ```rust
//! use ofswitch_packet::{FrameStack, Protocol};
//! use ofswitch_packet::ethernet::Ethernet;
//! use ofswitch_packet::ipv4::Ipv4;
//!
//! # let bytes = ofswitch_packet::PacketBuilder::new()
//! #     .ethernet(ofswitch_core::MacAddr::new([2, 0, 0, 0, 0, 1]), ofswitch_core::MacAddr::BROADCAST)
//! #     .ipv4("10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap())
//! #     .udp(5000, 5001)
//! #     .build()
//! #     .unwrap();
//! let stack = FrameStack::decode_ethernet(bytes.as_slice()).unwrap();
//! let ethernet = stack.get::<Ethernet>().unwrap();
//! assert!(ethernet.destination().is_broadcast());
//! assert_eq!(stack.get::<Ipv4>().unwrap().ttl(), 64);
//! assert!(stack.contains(Protocol::Udp));
//! ```
//!
//! ## Building a TCP SYN packet
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use ofswitch_core::MacAddr;
//! use ofswitch_packet::PacketBuilder;
//! use ofswitch_packet::tcp::TcpFlags;
//!
//! let src_mac = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
//! let dst_mac = MacAddr::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
//! let src_ip = Ipv4Addr::new(192, 168, 1, 1);
//! let dst_ip = Ipv4Addr::new(192, 168, 1, 2);
//!
//! let packet = PacketBuilder::new()
//!     .ethernet(src_mac, dst_mac)
//!     .ipv4(src_ip, dst_ip)
//!     .tcp(54321, 6653, 1000, 0, TcpFlags::SYN)
//!     .build()
//!     .unwrap();
//! assert_eq!(packet.len(), 60);
//! ```
//!
//! # Low-Level API
//!
//! Individual codecs work on any byte storage:
//!
//! ```rust
//! use ofswitch_core::MacAddr;
//! use ofswitch_packet::ethernet::{EtherType, EthernetFrame};
//! use ofswitch_packet::ByteBuffer;
//!
//! let mut frame = EthernetFrame::<ByteBuffer>::alloc(18);
//! frame.set_destination(MacAddr::BROADCAST);
//! frame.set_ethertype(EtherType::ARP);
//! frame.set_payload(&[0x01, 0x02, 0x03, 0x04]).unwrap();
//!
//! let parsed = EthernetFrame::parse(frame.as_bytes()).unwrap();
//! assert_eq!(parsed.ethertype(), EtherType::ARP);
//! assert_eq!(parsed.payload(), &[0x01, 0x02, 0x03, 0x04]);
//! ```

pub mod arp;
pub mod builder;
pub mod checksum;
pub mod ethernet;
pub mod frame;
pub mod icmpv4;
pub mod icmpv6;
pub mod icmpv6_option;
pub mod ipv4;
pub mod ipv6;
pub mod memory;
pub mod mpls;
pub mod sctp;
pub mod stack;
pub mod tcp;
pub mod udp;
pub mod vlan;

// Re-export commonly used types for convenience
pub use builder::{BuildOptions, PacketBuilder};
pub use checksum::{crc32c, internet_checksum, transport_checksum, PseudoHeader};
pub use ethernet::{EtherType, EthernetFrame};
pub use frame::{Frame, Framed, Header, Protocol};
pub use ipv4::{IpProtocol, Ipv4Frame};
pub use ipv6::Ipv6Frame;
pub use memory::{BufferMode, ByteBuffer};
pub use stack::{FrameStack, FrameStackMut, Layer, LayerInfo};
pub use tcp::{TcpFlags, TcpPort};
pub use udp::UdpPort;
