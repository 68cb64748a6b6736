//! Example: Decoding a captured frame
//!
//! Walks a VLAN-tagged IPv6 neighbor solicitation, printing each layer and
//! the Neighbor Discovery options it carries.

use ofswitch_packet::frame::Framed;
use ofswitch_packet::icmpv6::Icmpv6;
use ofswitch_packet::stack::FrameStack;
use ofswitch_packet::vlan::Vlan;

const FRAME: [u8; 90] = [
    // Ethernet: 33:33:ff:00:00:02 <- 02:00:00:00:00:01, 802.1Q
    0x33, 0x33, 0xff, 0x00, 0x00, 0x02, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01, 0x81, 0x00,
    // VLAN 10, IPv6
    0x00, 0x0a, 0x86, 0xdd,
    // IPv6: payload 32, ICMPv6, hop limit 255
    0x60, 0x00, 0x00, 0x00, 0x00, 0x20, 0x3a, 0xff,
    // fe80::1
    0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01,
    // ff02::1:ff00:2
    0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0xff, 0x00, 0x00, 0x02,
    // Neighbor solicitation, checksum left zero
    0x87, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // target fe80::2
    0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x02,
    // source link-layer address option
    0x01, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01,
];

fn main() {
    let stack = FrameStack::decode_ethernet(&FRAME).expect("Failed to decode frame");

    for layer in stack.iter() {
        println!("{} ({} bytes)", layer.protocol(), layer.total_len());
    }

    if let Some(vlan) = stack.get::<Vlan>() {
        println!("VLAN id {}", vlan.vid());
    }

    if let Some(icmp) = stack.get::<Icmpv6>() {
        println!("target {:?}", icmp.target_address());
        for option in icmp.options() {
            println!("option {:?}, {} bytes", option.option_type(), option.len());
        }
    }
}
