//! Decode/encode round trips across whole frame stacks

use ofswitch_core::{Error, MacAddr, VlanId};
use ofswitch_packet::ethernet::Ethernet;
use ofswitch_packet::icmpv6::{Icmpv6, Icmpv6Type, NeighborAdvertFlags};
use ofswitch_packet::icmpv6_option::{Icmpv6OptionRepr, Icmpv6OptionType, PrefixInformation};
use ofswitch_packet::ipv4::Ipv4;
use ofswitch_packet::ipv6::Ipv6;
use ofswitch_packet::sctp::Sctp;
use ofswitch_packet::stack::checksums_valid;
use ofswitch_packet::tcp::Tcp;
use ofswitch_packet::udp::Udp;
use ofswitch_packet::vlan::Vlan;
use ofswitch_packet::{FrameStack, FrameStackMut, IpProtocol, PacketBuilder, Protocol, TcpFlags};
use std::net::{Ipv4Addr, Ipv6Addr};

const HOST_A: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x0a]);
const HOST_B: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x0b]);

fn link_local(last: u16) -> Ipv6Addr {
    Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, last)
}

#[test]
fn test_rebuild_from_decoded_fields_is_identical() {
    let original = PacketBuilder::new()
        .ethernet(HOST_A, HOST_B)
        .vlan(VlanId::new(42))
        .pcp(5)
        .ipv4(Ipv4Addr::new(10, 1, 0, 1), Ipv4Addr::new(10, 1, 0, 2))
        .ttl(17)
        .identification(0x1234)
        .udp(40000, 4789)
        .payload(b"overlay".to_vec())
        .build()
        .unwrap();

    let stack = FrameStack::decode_ethernet(original.as_slice()).unwrap();
    let eth = stack.get::<Ethernet>().unwrap();
    let vlan = stack.get::<Vlan>().unwrap();
    let ip = stack.get::<Ipv4>().unwrap();
    let udp = stack.get::<Udp>().unwrap();

    let rebuilt = PacketBuilder::new()
        .ethernet(eth.source(), eth.destination())
        .vlan(vlan.vid())
        .pcp(vlan.pcp())
        .ipv4(ip.source(), ip.destination())
        .ttl(ip.ttl())
        .identification(ip.identification())
        .udp(
            udp.source_port().to_u16(),
            udp.destination_port().to_u16(),
        )
        .payload(stack.payload().to_vec())
        .build()
        .unwrap();

    assert_eq!(rebuilt.as_slice(), original.as_slice());
}

#[test]
fn test_ipv6_tcp_checksums() {
    let packet = PacketBuilder::new()
        .ethernet(HOST_A, HOST_B)
        .ipv6("2001:db8::1".parse().unwrap(), "2001:db8::2".parse().unwrap())
        .tcp(51000, 6653, 1, 0, TcpFlags::SYN)
        .tcp_options(&[0x02, 0x04, 0x05, 0xb4])
        .build()
        .unwrap();

    let stack = FrameStack::decode_ethernet(packet.as_slice()).unwrap();
    assert_eq!(
        stack.protocols(),
        vec![Protocol::Ethernet, Protocol::Ipv6, Protocol::Tcp]
    );
    let tcp = stack.get::<Tcp>().unwrap();
    assert_eq!(tcp.data_offset(), 6);
    assert_eq!(tcp.options(), &[0x02, 0x04, 0x05, 0xb4]);
    assert_eq!(tcp.flags(), TcpFlags::SYN);
    assert!(checksums_valid(&stack));
}

#[test]
fn test_corrupted_nd_option_length_is_malformed() {
    let mut packet = PacketBuilder::new()
        .ethernet(HOST_A, HOST_B)
        .ipv6(link_local(1), "ff02::1:ff00:2".parse().unwrap())
        .hop_limit(255)
        .neighbor_solicitation(link_local(2))
        .icmpv6_option(Icmpv6OptionRepr::SourceLinkLayerAddress(HOST_A))
        .build()
        .unwrap()
        .into_vec();

    // Ethernet (14) + IPv6 (40) + NS body (24): the option starts at 78
    assert_eq!(packet[78], Icmpv6OptionType::SourceLinkLayerAddress.to_u8());
    packet[79] = 2;
    match FrameStack::decode_ethernet(&packet) {
        Err(Error::MalformedFrame { protocol, .. }) => assert_eq!(protocol, "ICMPv6"),
        other => panic!("expected malformed ICMPv6, got {:?}", other),
    }

    packet[79] = 0;
    assert!(matches!(
        FrameStack::decode_ethernet(&packet),
        Err(Error::MalformedFrame { protocol: "ICMPv6", .. })
    ));
}

#[test]
fn test_router_advertisement_options_in_order() {
    let prefix = PrefixInformation {
        prefix_len: 64,
        on_link: true,
        autonomous: true,
        valid_lifetime: 86400,
        preferred_lifetime: 14400,
        prefix: "2001:db8:1::".parse().unwrap(),
    };
    let packet = PacketBuilder::new()
        .ethernet(HOST_A, MacAddr::new([0x33, 0x33, 0, 0, 0, 1]))
        .ipv6(link_local(1), "ff02::1".parse().unwrap())
        .hop_limit(255)
        .icmpv6(Icmpv6Type::RouterAdvertisement, 0)
        .icmpv6_option(Icmpv6OptionRepr::SourceLinkLayerAddress(HOST_A))
        .icmpv6_option(Icmpv6OptionRepr::Mtu(1500))
        .icmpv6_option(Icmpv6OptionRepr::PrefixInformation(prefix))
        .build()
        .unwrap();

    let stack = FrameStack::decode_ethernet(packet.as_slice()).unwrap();
    let icmp = stack.get::<Icmpv6>().unwrap();
    let kinds: Vec<Icmpv6OptionType> = icmp.options().map(|opt| opt.option_type()).collect();
    assert_eq!(
        kinds,
        vec![
            Icmpv6OptionType::SourceLinkLayerAddress,
            Icmpv6OptionType::Mtu,
            Icmpv6OptionType::PrefixInformation,
        ]
    );
    assert_eq!(icmp.source_link_layer_address(), Some(HOST_A));
    assert_eq!(icmp.mtu_option(), Some(1500));
    assert_eq!(icmp.prefix_information(), Some(prefix));
    assert_eq!(icmp.header_len(), 16 + 8 + 8 + 32);
    assert!(checksums_valid(&stack));
}

#[test]
fn test_neighbor_advertisement_flags_survive_decode() {
    let flags = NeighborAdvertFlags {
        router: false,
        solicited: true,
        override_: true,
    };
    let packet = PacketBuilder::new()
        .ethernet(HOST_B, HOST_A)
        .ipv6(link_local(2), link_local(1))
        .hop_limit(255)
        .neighbor_advertisement(link_local(2), flags)
        .icmpv6_option(Icmpv6OptionRepr::TargetLinkLayerAddress(HOST_B))
        .build()
        .unwrap();

    let stack = FrameStack::decode_ethernet(packet.as_slice()).unwrap();
    let icmp = stack.get::<Icmpv6>().unwrap();
    assert_eq!(icmp.neighbor_advert_flags(), Some(flags));
    assert_eq!(icmp.target_address(), Some(link_local(2)));
    assert_eq!(icmp.target_link_layer_address(), Some(HOST_B));
}

#[test]
fn test_edit_in_place_then_update_checksums() {
    let mut packet = PacketBuilder::new()
        .ethernet(HOST_A, HOST_B)
        .ipv4(Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2))
        .udp(5353, 5353)
        .payload(vec![0xab; 24])
        .build()
        .unwrap()
        .into_vec();

    {
        let mut stack = FrameStackMut::decode_ethernet(&mut packet).unwrap();
        stack
            .get_mut::<Ipv4>()
            .unwrap()
            .set_destination(Ipv4Addr::new(198, 51, 100, 7));
        stack.get_mut::<Ipv4>().unwrap().set_ttl(3);
        assert!(!stack.checksums_valid());

        stack.update_checksums();
        assert!(stack.checksums_valid());
    }

    let stack = FrameStack::decode_ethernet(&packet).unwrap();
    let ip = stack.get::<Ipv4>().unwrap();
    assert_eq!(ip.destination(), Ipv4Addr::new(198, 51, 100, 7));
    assert_eq!(ip.ttl(), 3);
    assert_eq!(stack.payload(), &[0xab; 24][..]);
}

#[test]
fn test_sctp_over_ipv6_crc() {
    // One DATA chunk header with an empty body
    let chunk = vec![0x00, 0x03, 0x00, 0x10, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0];
    let packet = PacketBuilder::new()
        .ethernet(HOST_A, HOST_B)
        .ipv6("2001:db8::a".parse().unwrap(), "2001:db8::b".parse().unwrap())
        .sctp(2905, 2905, 0xdead_beef)
        .payload(chunk.clone())
        .build()
        .unwrap();

    let stack = FrameStack::decode_ethernet(packet.as_slice()).unwrap();
    assert_eq!(
        stack.get::<Ipv6>().unwrap().upper_layer_protocol(),
        IpProtocol::SCTP
    );
    let sctp = stack.get::<Sctp>().unwrap();
    assert_eq!(sctp.verification_tag(), 0xdead_beef);
    assert!(sctp.verify_checksum());
    assert_eq!(stack.payload(), chunk.as_slice());
}

#[test]
fn test_ipv6_hop_by_hop_then_udp() {
    let mut frame = Vec::new();
    frame.extend_from_slice(HOST_B.as_bytes());
    frame.extend_from_slice(HOST_A.as_bytes());
    frame.extend_from_slice(&[0x86, 0xdd]);

    // IPv6: payload = 8 (hop-by-hop) + 10 (UDP with "hi"), next header 0
    frame.extend_from_slice(&[0x60, 0, 0, 0, 0, 18, 0, 64]);
    frame.extend_from_slice(&link_local(1).octets());
    frame.extend_from_slice(&link_local(2).octets());
    // Hop-by-hop: next header UDP, length 0, PadN over the remaining 6 bytes
    frame.extend_from_slice(&[17, 0, 1, 4, 0, 0, 0, 0]);
    // UDP with checksum left at zero
    frame.extend_from_slice(&[0x30, 0x39, 0x00, 0x35, 0x00, 0x0a, 0x00, 0x00]);
    frame.extend_from_slice(b"hi");

    let stack = FrameStack::decode_ethernet(&frame).unwrap();
    assert_eq!(
        stack.protocols(),
        vec![
            Protocol::Ethernet,
            Protocol::Ipv6,
            Protocol::Udp,
            Protocol::Payload
        ]
    );
    assert_eq!(stack.layers()[1].header_len, 48);

    let ip = stack.get::<Ipv6>().unwrap();
    assert_eq!(ip.next_header(), 0);
    assert_eq!(ip.upper_layer_protocol(), IpProtocol::UDP);
    assert_eq!(ip.extension_headers().len(), 1);
    assert_eq!(stack.get::<Udp>().unwrap().destination_port().to_u16(), 53);
    assert_eq!(stack.payload(), b"hi");
}

#[test]
fn test_vlan_frame_keeps_padding_out_of_inner_layers() {
    let packet = PacketBuilder::new()
        .ethernet(HOST_A, HOST_B)
        .vlan(VlanId::new(7))
        .ipv4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
        .udp(1, 2)
        .build()
        .unwrap();
    assert_eq!(packet.len(), 60);

    let stack = FrameStack::decode_ethernet(packet.as_slice()).unwrap();
    assert_eq!(stack.get::<Ipv4>().unwrap().total_length(), 28);
    assert_eq!(stack.get::<Udp>().unwrap().payload_len(), 0);
    assert!(stack.payload().is_empty());
    assert!(checksums_valid(&stack));
}
