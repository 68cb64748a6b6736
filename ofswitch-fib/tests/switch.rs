//! Learning-switch decisions on real frames

use ofswitch_core::{DatapathId, MacAddr, VlanId};
use ofswitch_fib::{
    FibConfig, FibRegistry, FlowRule, LearningSwitch, PacketAction, RecordingDatapath,
};
use ofswitch_packet::{EtherType, PacketBuilder};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

const HOST_A: MacAddr = MacAddr::new([0x02, 0, 0, 0, 0, 0x0a]);
const HOST_B: MacAddr = MacAddr::new([0x02, 0, 0, 0, 0, 0x0b]);
const HOST_C: MacAddr = MacAddr::new([0x02, 0, 0, 0, 0, 0x0c]);

fn udp_frame(src: MacAddr, dst: MacAddr) -> Vec<u8> {
    PacketBuilder::new()
        .ethernet(src, dst)
        .ipv4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
        .udp(1024, 2048)
        .payload(b"data".to_vec())
        .build()
        .unwrap()
        .into_vec()
}

fn tagged_frame(src: MacAddr, dst: MacAddr, vid: u16) -> Vec<u8> {
    PacketBuilder::new()
        .ethernet(src, dst)
        .vlan(VlanId::new(vid))
        .ipv4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
        .udp(1024, 2048)
        .build()
        .unwrap()
        .into_vec()
}

async fn switch() -> (FibRegistry, LearningSwitch) {
    let config = FibConfig::default().with_dump_interval(None);
    let registry = FibRegistry::new(config.clone());
    let fib = registry
        .attach(Arc::new(RecordingDatapath::new(DatapathId(7))))
        .await;
    (registry, LearningSwitch::new(fib, &config))
}

#[tokio::test]
async fn test_flood_then_forward() {
    let (registry, switch) = switch().await;

    let action = switch.packet_in(1, &udp_frame(HOST_A, HOST_B)).await.unwrap();
    assert_eq!(action, PacketAction::Flood);

    let action = switch.packet_in(2, &udp_frame(HOST_B, HOST_A)).await.unwrap();
    assert_eq!(
        action,
        PacketAction::Forward(FlowRule {
            vlan: VlanId::UNTAGGED,
            src: Some(HOST_B),
            dst: HOST_A,
            out_port: Some(1),
            idle_timeout: Duration::from_secs(15),
        })
    );

    let action = switch.packet_in(1, &udp_frame(HOST_A, HOST_B)).await.unwrap();
    assert!(matches!(
        action,
        PacketAction::Forward(FlowRule {
            out_port: Some(2),
            ..
        })
    ));
    registry.shutdown().await;
}

#[tokio::test]
async fn test_destination_behind_ingress_is_dropped() {
    let (registry, switch) = switch().await;

    switch.packet_in(1, &udp_frame(HOST_A, HOST_B)).await.unwrap();
    let action = switch.packet_in(1, &udp_frame(HOST_C, HOST_A)).await.unwrap();
    assert_eq!(action, PacketAction::Drop);
    registry.shutdown().await;
}

#[tokio::test]
async fn test_reserved_destinations_get_drop_rule() {
    let (registry, switch) = switch().await;

    let bpdu = PacketBuilder::new()
        .ethernet(HOST_A, MacAddr::STP_MULTICAST)
        .ethertype(EtherType::Custom(0x0026))
        .payload(vec![0x42, 0x42, 0x03])
        .build()
        .unwrap();
    let action = switch.packet_in(3, bpdu.as_slice()).await.unwrap();
    assert_eq!(
        action,
        PacketAction::Discard(FlowRule {
            vlan: VlanId::UNTAGGED,
            src: None,
            dst: MacAddr::STP_MULTICAST,
            out_port: None,
            idle_timeout: Duration::from_secs(15),
        })
    );

    let mdns = udp_frame(HOST_A, MacAddr::MDNS_MULTICAST);
    assert!(matches!(
        switch.packet_in(3, &mdns).await.unwrap(),
        PacketAction::Discard(_)
    ));

    // The source was still learned
    let fib = switch.fib();
    assert_eq!(fib.port_of(HOST_A, VlanId::UNTAGGED).await.unwrap(), Some(3));
    registry.shutdown().await;
}

#[tokio::test]
async fn test_multicast_destination_floods() {
    let (registry, switch) = switch().await;
    let action = switch
        .packet_in(1, &udp_frame(HOST_A, MacAddr::BROADCAST))
        .await
        .unwrap();
    assert_eq!(action, PacketAction::Flood);
    registry.shutdown().await;
}

#[tokio::test]
async fn test_unusable_sources_are_ignored() {
    let (registry, switch) = switch().await;

    let multicast_src = MacAddr::new([0x01, 0, 0x5e, 0, 0, 1]);
    let action = switch.packet_in(1, &udp_frame(multicast_src, HOST_B)).await.unwrap();
    assert_eq!(action, PacketAction::Ignore);

    let action = switch.packet_in(1, &udp_frame(MacAddr::ZERO, HOST_B)).await.unwrap();
    assert_eq!(action, PacketAction::Ignore);

    assert!(switch.fib().snapshot().await.unwrap().is_empty());
    registry.shutdown().await;
}

#[tokio::test]
async fn test_vlans_learn_separately() {
    let (registry, switch) = switch().await;

    switch.packet_in(1, &tagged_frame(HOST_A, HOST_B, 10)).await.unwrap();
    let same_vlan = switch.packet_in(2, &tagged_frame(HOST_B, HOST_A, 10)).await.unwrap();
    assert!(matches!(
        same_vlan,
        PacketAction::Forward(FlowRule {
            out_port: Some(1),
            ..
        })
    ));

    let other_vlan = switch.packet_in(2, &tagged_frame(HOST_B, HOST_A, 20)).await.unwrap();
    assert_eq!(other_vlan, PacketAction::Flood);
    registry.shutdown().await;
}

#[tokio::test]
async fn test_port_down_forgets_hosts() {
    let (registry, switch) = switch().await;

    switch.packet_in(1, &udp_frame(HOST_A, HOST_B)).await.unwrap();
    assert_eq!(switch.port_status(1, false).await.unwrap(), 1);

    let action = switch.packet_in(2, &udp_frame(HOST_B, HOST_A)).await.unwrap();
    assert_eq!(action, PacketAction::Flood);
    registry.shutdown().await;
}

#[tokio::test]
async fn test_first_fragment_learns_source() {
    let (registry, switch) = switch().await;

    let whole = PacketBuilder::new()
        .ethernet(HOST_A, HOST_B)
        .ipv4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
        .udp(1024, 2048)
        .payload(vec![0x5a; 200])
        .build()
        .unwrap();
    // first 96 bytes of the datagram, MF set, offset 0
    let mut fragment = whole.as_slice()[..14 + 20 + 96].to_vec();
    fragment[16..18].copy_from_slice(&116u16.to_be_bytes());
    fragment[20] = 0x20;
    fragment[21] = 0x00;

    let action = switch.packet_in(4, &fragment).await.unwrap();
    assert_eq!(action, PacketAction::Flood);
    assert_eq!(
        switch.fib().port_of(HOST_A, VlanId::UNTAGGED).await.unwrap(),
        Some(4)
    );
    registry.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frame_is_reported() {
    let (registry, switch) = switch().await;

    let mut frame = udp_frame(HOST_A, HOST_B);
    // IPv4 total length larger than the frame
    frame[16] = 0x05;
    frame[17] = 0xdc;
    let err = switch.packet_in(1, &frame).await.unwrap_err();
    assert!(err.is_codec_error());

    let err = switch.packet_in(1, &frame[..10]).await.unwrap_err();
    assert!(err.is_codec_error());

    assert!(switch.fib().snapshot().await.unwrap().is_empty());
    registry.shutdown().await;
}
