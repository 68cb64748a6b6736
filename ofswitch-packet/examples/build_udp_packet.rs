//! Example: Building a UDP packet
//!
//! Builds an Ethernet/IPv4/UDP DNS query with the fluent builder and decodes
//! it back into its layers.

use ofswitch_core::MacAddr;
use ofswitch_packet::frame::Framed;
use ofswitch_packet::stack::FrameStack;
use ofswitch_packet::PacketBuilder;
use std::net::Ipv4Addr;

fn main() {
    let src_mac = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    let dst_mac = MacAddr::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    let src_ip = Ipv4Addr::new(192, 168, 1, 100);
    let dst_ip = Ipv4Addr::new(192, 168, 1, 1);

    // DNS query header (simplified)
    let dns_query = vec![
        0x12, 0x34, // Transaction ID
        0x01, 0x00, // Flags: standard query
        0x00, 0x01, // Questions: 1
        0x00, 0x00, // Answer RRs: 0
        0x00, 0x00, // Authority RRs: 0
        0x00, 0x00, // Additional RRs: 0
    ];

    let packet = PacketBuilder::new()
        .ethernet(src_mac, dst_mac)
        .ipv4(src_ip, dst_ip)
        .ttl(64)
        .udp(54321, 53)
        .payload(dns_query)
        .build()
        .expect("Failed to build UDP packet");

    println!("UDP packet built successfully!");
    println!("Total size: {} bytes", packet.len());
    print!("{}", packet);

    let stack = FrameStack::decode_ethernet(packet.as_slice()).expect("Failed to decode packet");
    for layer in stack.iter() {
        println!(
            "{:<8} header {:>2} bytes, {:>2} bytes total",
            layer.protocol(),
            layer.header_len(),
            layer.total_len()
        );
    }
}
