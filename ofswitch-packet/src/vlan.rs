//! 802.1Q / 802.1ad VLAN tags
//!
//! The 4-byte tag that follows an Ethernet header whose EtherType is 0x8100
//! (or 0x88a8): tag control information (PCP, DEI, VID) and the encapsulated
//! EtherType. Stacked tags decode as consecutive VLAN frames.

use crate::ethernet::EtherType;
use crate::frame::{Frame, Header, Protocol};
use ofswitch_core::VlanId;

/// VLAN tag protocol marker
pub enum Vlan {}

/// VLAN tag over byte storage `T`
pub type VlanFrame<T> = Frame<Vlan, T>;

impl Header for Vlan {
    const PROTOCOL: Protocol = Protocol::Vlan;
    const MIN_LEN: usize = 4;
}

impl<T: AsRef<[u8]>> Frame<Vlan, T> {
    /// Tag control information
    pub fn tci(&self) -> u16 {
        self.read_u16(0)
    }

    /// Priority code point (3 bits)
    pub fn pcp(&self) -> u8 {
        (self.tci() >> 13) as u8
    }

    /// Drop eligible indicator
    pub fn dei(&self) -> bool {
        self.tci() & 0x1000 != 0
    }

    pub fn vid(&self) -> VlanId {
        VlanId::new(self.tci())
    }

    /// EtherType of the encapsulated frame
    pub fn ethertype(&self) -> EtherType {
        EtherType::from_u16(self.read_u16(2))
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Frame<Vlan, T> {
    pub fn set_tci(&mut self, tci: u16) {
        self.write_u16(0, tci);
    }

    pub fn set_pcp(&mut self, pcp: u8) {
        let tci = (self.tci() & 0x1FFF) | (((pcp & 0x07) as u16) << 13);
        self.set_tci(tci);
    }

    pub fn set_dei(&mut self, dei: bool) {
        let tci = if dei {
            self.tci() | 0x1000
        } else {
            self.tci() & !0x1000
        };
        self.set_tci(tci);
    }

    pub fn set_vid(&mut self, vid: VlanId) {
        let tci = (self.tci() & 0xF000) | (vid.to_u16() & VlanId::MAX);
        self.set_tci(tci);
    }

    pub fn set_ethertype(&mut self, ethertype: EtherType) {
        self.write_u16(2, ethertype.to_u16());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ByteBuffer;

    #[test]
    fn test_vlan_tag_fields() {
        // PCP 5, DEI 1, VID 100, inner IPv4
        let data = [0xB0, 0x64, 0x08, 0x00, 0x45];
        let tag = VlanFrame::parse(&data[..]).unwrap();
        assert_eq!(tag.pcp(), 5);
        assert!(tag.dei());
        assert_eq!(tag.vid(), VlanId::new(100));
        assert_eq!(tag.ethertype(), EtherType::IPv4);
        assert_eq!(tag.payload(), &[0x45]);
    }

    #[test]
    fn test_vlan_setters_preserve_other_bits() {
        let mut tag = VlanFrame::<ByteBuffer>::alloc(4);
        tag.set_vid(VlanId::new(4095));
        tag.set_pcp(7);
        tag.set_dei(false);
        assert_eq!(tag.tci(), 0xEFFF);

        tag.set_vid(VlanId::new(1));
        assert_eq!(tag.pcp(), 7);
        assert_eq!(tag.vid().to_u16(), 1);
    }
}
