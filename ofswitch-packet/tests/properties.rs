//! Property tests for the codec layer

use ofswitch_packet::arp::{Arp, ArpOperation};
use ofswitch_packet::ethernet::Ethernet;
use ofswitch_packet::icmpv4::{Icmpv4, Icmpv4Type};
use ofswitch_packet::icmpv6::{Icmpv6, Icmpv6Type, NeighborAdvertFlags};
use ofswitch_packet::icmpv6_option::{Icmpv6OptionRepr, Icmpv6OptionType};
use ofswitch_packet::ipv4::Ipv4;
use ofswitch_packet::ipv6::Ipv6;
use ofswitch_packet::mpls::Mpls;
use ofswitch_packet::sctp::Sctp;
use ofswitch_packet::stack::checksums_valid;
use ofswitch_packet::tcp::Tcp;
use ofswitch_packet::udp::Udp;
use ofswitch_packet::vlan::Vlan;
use ofswitch_packet::{
    ByteBuffer, Frame, FrameStack, Header, Layer, LayerInfo, PacketBuilder, Protocol, TcpFlags,
};
use ofswitch_core::{MacAddr, VlanId};
use proptest::prelude::*;
use std::net::{Ipv4Addr, Ipv6Addr};

fn below_minimum_fails<P: Header>(bytes: &[u8]) -> bool {
    let cut = bytes.len().min(P::MIN_LEN.saturating_sub(1));
    Frame::<P, &[u8]>::parse(&bytes[..cut]).is_err()
}

/// Transport carried by a generated IP packet
#[derive(Debug, Clone)]
enum Upper {
    Udp {
        ports: (u16, u16),
    },
    Tcp {
        ports: (u16, u16),
        seq: u32,
        ack: u32,
        flags: u8,
        window: u16,
        options: Vec<u8>,
    },
    Sctp {
        ports: (u16, u16),
        tag: u32,
    },
    Echo {
        identifier: u16,
        sequence: u16,
    },
}

fn upper() -> impl Strategy<Value = Upper> {
    prop_oneof![
        any::<(u16, u16)>().prop_map(|ports| Upper::Udp { ports }),
        (
            any::<(u16, u16)>(),
            any::<u32>(),
            any::<u32>(),
            any::<u8>(),
            any::<u16>(),
            proptest::collection::vec(any::<[u8; 4]>(), 0..10),
        )
            .prop_map(|(ports, seq, ack, flags, window, words)| Upper::Tcp {
                ports,
                seq,
                ack,
                flags,
                window,
                options: words.concat(),
            }),
        (any::<(u16, u16)>(), any::<u32>()).prop_map(|(ports, tag)| Upper::Sctp { ports, tag }),
        any::<(u16, u16)>().prop_map(|(identifier, sequence)| Upper::Echo {
            identifier,
            sequence,
        }),
    ]
}

/// Ethernet header with an optional 802.1Q tag
fn link() -> impl Strategy<Value = PacketBuilder> {
    (
        any::<[u8; 6]>(),
        any::<[u8; 6]>(),
        proptest::option::of((1u16..4095, 0u8..8)),
    )
        .prop_map(|(src, dst, tag)| {
            let builder = PacketBuilder::new().ethernet(MacAddr::new(src), MacAddr::new(dst));
            match tag {
                Some((vid, pcp)) => builder.vlan(VlanId::new(vid)).pcp(pcp),
                None => builder,
            }
        })
}

fn mpls_labels() -> impl Strategy<Value = Vec<(u32, u8)>> {
    proptest::collection::vec((0u32..(1 << 20), any::<u8>()), 0..3)
}

fn with_labels(builder: PacketBuilder, labels: &[(u32, u8)]) -> PacketBuilder {
    labels
        .iter()
        .fold(builder, |builder, &(label, ttl)| builder.mpls(label, ttl))
}

fn with_upper(builder: PacketBuilder, upper: &Upper, v6: bool) -> PacketBuilder {
    match upper {
        Upper::Udp { ports } => builder.udp(ports.0, ports.1),
        Upper::Tcp {
            ports,
            seq,
            ack,
            flags,
            window,
            options,
        } => builder
            .tcp(ports.0, ports.1, *seq, *ack, TcpFlags::from_u8(*flags))
            .window(*window)
            .tcp_options(options),
        Upper::Sctp { ports, tag } => builder.sctp(ports.0, ports.1, *tag),
        Upper::Echo {
            identifier,
            sequence,
        } if v6 => builder.icmpv6_echo_request(*identifier, *sequence),
        Upper::Echo {
            identifier,
            sequence,
        } => builder.icmpv4_echo_request(*identifier, *sequence),
    }
}

fn payload() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..64)
}

fn ipv4_packet() -> impl Strategy<Value = PacketBuilder> {
    (
        link(),
        mpls_labels(),
        any::<[u8; 4]>(),
        any::<[u8; 4]>(),
        (1u8..=255, any::<u16>(), 0u8..64, any::<bool>()),
        upper(),
        payload(),
    )
        .prop_map(|(link, labels, src, dst, (ttl, id, dscp, df), upper, payload)| {
            let builder = with_labels(link, &labels)
                .ipv4(Ipv4Addr::from(src), Ipv4Addr::from(dst))
                .ttl(ttl)
                .identification(id)
                .dscp(dscp);
            let builder = if df { builder.dont_fragment() } else { builder };
            with_upper(builder, &upper, false).payload(payload)
        })
}

fn ipv6_packet() -> impl Strategy<Value = PacketBuilder> {
    (
        link(),
        mpls_labels(),
        any::<[u8; 16]>(),
        any::<[u8; 16]>(),
        (any::<u8>(), 0u32..(1 << 20)),
        upper(),
        payload(),
    )
        .prop_map(|(link, labels, src, dst, (hop_limit, flow), upper, payload)| {
            let builder = with_labels(link, &labels)
                .ipv6(Ipv6Addr::from(src), Ipv6Addr::from(dst))
                .hop_limit(hop_limit)
                .flow_label(flow);
            with_upper(builder, &upper, true).payload(payload)
        })
}

fn nd_option() -> impl Strategy<Value = Icmpv6OptionRepr> {
    prop_oneof![
        any::<[u8; 6]>().prop_map(|mac| Icmpv6OptionRepr::SourceLinkLayerAddress(MacAddr::new(mac))),
        any::<[u8; 6]>().prop_map(|mac| Icmpv6OptionRepr::TargetLinkLayerAddress(MacAddr::new(mac))),
        any::<u32>().prop_map(Icmpv6OptionRepr::Mtu),
    ]
}

fn neighbor_discovery_packet() -> impl Strategy<Value = PacketBuilder> {
    (
        link(),
        any::<[u8; 16]>(),
        any::<[u8; 16]>(),
        proptest::option::of(any::<(bool, bool, bool)>()),
        proptest::collection::vec(nd_option(), 0..4),
    )
        .prop_map(|(link, src, target, advert, options)| {
            let target = Ipv6Addr::from(target);
            let builder = link
                .ipv6(Ipv6Addr::from(src), target)
                .hop_limit(255);
            let builder = match advert {
                Some((router, solicited, override_)) => builder.neighbor_advertisement(
                    target,
                    NeighborAdvertFlags {
                        router,
                        solicited,
                        override_,
                    },
                ),
                None => builder.neighbor_solicitation(target),
            };
            options
                .into_iter()
                .fold(builder, |builder, option| builder.icmpv6_option(option))
        })
}

fn arp_packet() -> impl Strategy<Value = PacketBuilder> {
    (
        link(),
        any::<bool>(),
        any::<([u8; 6], [u8; 4])>(),
        any::<([u8; 6], [u8; 4])>(),
    )
        .prop_map(|(link, reply, sender, target)| {
            let operation = if reply {
                ArpOperation::Reply
            } else {
                ArpOperation::Request
            };
            link.arp(
                operation,
                (MacAddr::new(sender.0), Ipv4Addr::from(sender.1)),
                (MacAddr::new(target.0), Ipv4Addr::from(target.1)),
            )
        })
}

fn any_packet() -> impl Strategy<Value = PacketBuilder> {
    prop_oneof![
        ipv4_packet(),
        ipv6_packet(),
        neighbor_discovery_packet(),
        arp_packet(),
    ]
}

/// Builder that reproduces `stack` from its decoded fields alone
fn rebuild(stack: &FrameStack<'_>) -> PacketBuilder {
    let mut builder = PacketBuilder::new();
    for layer in stack.iter() {
        builder = match layer {
            Layer::Ethernet(eth) => builder.ethernet(eth.source(), eth.destination()),
            Layer::Vlan(tag) => builder.vlan(tag.vid()).pcp(tag.pcp()),
            Layer::Mpls(mpls) => mpls
                .labels()
                .fold(builder, |builder, entry| builder.mpls(entry.label, entry.ttl)),
            Layer::Arp(arp) => builder.arp(
                arp.operation(),
                (arp.sender_hardware_addr(), arp.sender_protocol_addr()),
                (arp.target_hardware_addr(), arp.target_protocol_addr()),
            ),
            Layer::Ipv4(ip) => {
                let builder = builder
                    .ipv4(ip.source(), ip.destination())
                    .ttl(ip.ttl())
                    .identification(ip.identification())
                    .dscp(ip.dscp());
                if ip.flags().dont_fragment {
                    builder.dont_fragment()
                } else {
                    builder
                }
            }
            Layer::Ipv6(ip) => builder
                .ipv6(ip.source(), ip.destination())
                .hop_limit(ip.hop_limit())
                .flow_label(ip.flow_label()),
            Layer::Icmpv4(icmp) => match icmp.icmp_type() {
                Icmpv4Type::EchoRequest => builder.icmpv4_echo_request(
                    icmp.echo_identifier().unwrap(),
                    icmp.echo_sequence().unwrap(),
                ),
                other => builder.icmpv4(other, icmp.code()),
            },
            Layer::Icmpv6(icmp) => {
                let builder = match icmp.icmp_type() {
                    Icmpv6Type::EchoRequest => builder.icmpv6_echo_request(
                        icmp.echo_identifier().unwrap(),
                        icmp.echo_sequence().unwrap(),
                    ),
                    Icmpv6Type::NeighborSolicitation => {
                        builder.neighbor_solicitation(icmp.target_address().unwrap())
                    }
                    Icmpv6Type::NeighborAdvertisement => builder.neighbor_advertisement(
                        icmp.target_address().unwrap(),
                        icmp.neighbor_advert_flags().unwrap(),
                    ),
                    other => builder.icmpv6(other, icmp.code()),
                };
                icmp.options().fold(builder, |builder, option| {
                    let repr = match option.option_type() {
                        Icmpv6OptionType::SourceLinkLayerAddress => {
                            Icmpv6OptionRepr::SourceLinkLayerAddress(
                                option.link_layer_address().unwrap(),
                            )
                        }
                        Icmpv6OptionType::TargetLinkLayerAddress => {
                            Icmpv6OptionRepr::TargetLinkLayerAddress(
                                option.link_layer_address().unwrap(),
                            )
                        }
                        Icmpv6OptionType::Mtu => Icmpv6OptionRepr::Mtu(option.mtu().unwrap()),
                        Icmpv6OptionType::PrefixInformation => Icmpv6OptionRepr::PrefixInformation(
                            option.prefix_information().unwrap(),
                        ),
                        other => Icmpv6OptionRepr::Raw {
                            option_type: other.to_u8(),
                            data: option.data().to_vec(),
                        },
                    };
                    builder.icmpv6_option(repr)
                })
            }
            Layer::Tcp(tcp) => builder
                .tcp(
                    tcp.source_port().to_u16(),
                    tcp.destination_port().to_u16(),
                    tcp.sequence_number(),
                    tcp.acknowledgment_number(),
                    tcp.flags(),
                )
                .window(tcp.window_size())
                .tcp_options(tcp.options()),
            Layer::Udp(udp) => builder.udp(
                udp.source_port().to_u16(),
                udp.destination_port().to_u16(),
            ),
            Layer::Sctp(sctp) => builder.sctp(
                sctp.source_port(),
                sctp.destination_port(),
                sctp.verification_tag(),
            ),
            Layer::Payload(bytes) => builder.payload(bytes.to_vec()),
        };
    }
    builder
}

proptest! {
    #[test]
    fn decode_arbitrary_bytes_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        for first in [Protocol::Ethernet, Protocol::Ipv4, Protocol::Ipv6, Protocol::Mpls] {
            match FrameStack::decode(&bytes, first) {
                Ok(stack) => {
                    let mut outer: Option<LayerInfo> = None;
                    for info in stack.layers() {
                        prop_assert!(info.header_len <= info.len);
                        prop_assert!(info.end() <= bytes.len());
                        if let Some(outer) = outer {
                            prop_assert_eq!(info.offset, outer.payload_offset());
                            prop_assert!(info.end() <= outer.end());
                        }
                        outer = Some(*info);
                    }
                }
                Err(err) => prop_assert!(err.is_codec_error()),
            }
        }
    }

    #[test]
    fn length_below_minimum_fails(bytes in proptest::collection::vec(any::<u8>(), 0..80)) {
        prop_assert!(below_minimum_fails::<Ethernet>(&bytes));
        prop_assert!(below_minimum_fails::<Vlan>(&bytes));
        prop_assert!(below_minimum_fails::<Arp>(&bytes));
        prop_assert!(below_minimum_fails::<Ipv4>(&bytes));
        prop_assert!(below_minimum_fails::<Ipv6>(&bytes));
        prop_assert!(below_minimum_fails::<Tcp>(&bytes));
        prop_assert!(below_minimum_fails::<Udp>(&bytes));
        prop_assert!(below_minimum_fails::<Icmpv4>(&bytes));
        prop_assert!(below_minimum_fails::<Icmpv6>(&bytes));
        prop_assert!(below_minimum_fails::<Sctp>(&bytes));
        prop_assert!(below_minimum_fails::<Mpls>(&bytes));
    }

    #[test]
    fn alloc_clamps_to_minimum(requested in 0usize..128) {
        let frame = Frame::<Ipv4, ByteBuffer>::alloc(requested);
        prop_assert_eq!(frame.total_len(), requested.max(Ipv4::MIN_LEN));
        prop_assert_eq!(frame.header_len(), Ipv4::MIN_LEN);
    }

    #[test]
    fn udp_rebuild_is_byte_identical(
        src in any::<[u8; 4]>(),
        dst in any::<[u8; 4]>(),
        vid in 1u16..4095,
        ttl in 1u8..=255,
        sport in any::<u16>(),
        dport in any::<u16>(),
        payload in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let host_a = MacAddr::new([0x02, 0, 0, 0, 0, 1]);
        let host_b = MacAddr::new([0x02, 0, 0, 0, 0, 2]);
        let original = PacketBuilder::new()
            .ethernet(host_a, host_b)
            .vlan(VlanId::new(vid))
            .ipv4(Ipv4Addr::from(src), Ipv4Addr::from(dst))
            .ttl(ttl)
            .udp(sport, dport)
            .payload(payload.clone())
            .build()
            .unwrap();

        let stack = FrameStack::decode_ethernet(original.as_slice()).unwrap();
        prop_assert!(checksums_valid(&stack));
        prop_assert_eq!(stack.payload(), payload.as_slice());

        let vlan = stack.get::<Vlan>().unwrap();
        let ip = stack.get::<Ipv4>().unwrap();
        let udp = stack.get::<Udp>().unwrap();
        let rebuilt = PacketBuilder::new()
            .ethernet(host_a, host_b)
            .vlan(vlan.vid())
            .ipv4(ip.source(), ip.destination())
            .ttl(ip.ttl())
            .udp(udp.source_port().to_u16(), udp.destination_port().to_u16())
            .payload(stack.payload().to_vec())
            .build()
            .unwrap();
        prop_assert_eq!(rebuilt.as_slice(), original.as_slice());
    }

    #[test]
    fn decode_then_rebuild_is_byte_identical(builder in any_packet()) {
        let original = builder.build().unwrap();
        let stack = FrameStack::decode_ethernet(original.as_slice()).unwrap();
        prop_assert!(checksums_valid(&stack));
        prop_assert!(builder.protocols().iter().all(|&protocol| stack.contains(protocol)));

        let rebuilt = rebuild(&stack).build().unwrap();
        prop_assert_eq!(rebuilt.as_slice(), original.as_slice());
    }
}
