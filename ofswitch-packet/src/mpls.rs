//! MPLS label stacks (RFC 3032)
//!
//! The header is the whole stack: 4-byte label entries up to and including
//! the one with the bottom-of-stack bit. MPLS carries no next-protocol
//! field, so the decoder peeks at the IP version nibble of the payload.

use crate::frame::{Frame, Header, Protocol};
use ofswitch_core::{Error, Result};

/// One label stack entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MplsLabel {
    /// 20-bit label value
    pub label: u32,
    /// Traffic class (3 bits)
    pub tc: u8,
    pub bottom_of_stack: bool,
    pub ttl: u8,
}

impl MplsLabel {
    /// IPv4 explicit null
    pub const IPV4_EXPLICIT_NULL: u32 = 0;
    /// IPv6 explicit null
    pub const IPV6_EXPLICIT_NULL: u32 = 2;
    /// Maximum label value
    pub const MAX: u32 = 0x000F_FFFF;

    pub fn new(label: u32, ttl: u8) -> Self {
        Self {
            label: label & Self::MAX,
            tc: 0,
            bottom_of_stack: false,
            ttl,
        }
    }

    pub fn from_u32(word: u32) -> Self {
        Self {
            label: word >> 12,
            tc: ((word >> 9) & 0x07) as u8,
            bottom_of_stack: word & 0x100 != 0,
            ttl: (word & 0xFF) as u8,
        }
    }

    pub fn to_u32(self) -> u32 {
        ((self.label & Self::MAX) << 12)
            | (((self.tc & 0x07) as u32) << 9)
            | (if self.bottom_of_stack { 0x100 } else { 0 })
            | self.ttl as u32
    }
}

/// MPLS protocol marker
pub enum Mpls {}

/// MPLS label stack over byte storage `T`
pub type MplsFrame<T> = Frame<Mpls, T>;

impl Header for Mpls {
    const PROTOCOL: Protocol = Protocol::Mpls;
    const MIN_LEN: usize = 4;

    fn header_len(bytes: &[u8]) -> Result<usize> {
        let mut offset = 0;
        while offset + 4 <= bytes.len() {
            let entry = MplsLabel::from_u32(u32::from_be_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]));
            offset += 4;
            if entry.bottom_of_stack {
                return Ok(offset);
            }
        }
        Err(Error::malformed(
            "MPLS",
            format!("no bottom-of-stack label within {} bytes", bytes.len()),
        ))
    }

    fn header_len_hint(bytes: &[u8]) -> usize {
        (bytes.len() / 4 + 1) * 4
    }
}

impl<T: AsRef<[u8]>> Frame<Mpls, T> {
    /// Number of labels in the stack
    pub fn label_count(&self) -> usize {
        self.header_len() / 4
    }

    pub fn label(&self, index: usize) -> Option<MplsLabel> {
        if index >= self.label_count() {
            return None;
        }
        Some(MplsLabel::from_u32(self.read_u32(index * 4)))
    }

    /// Top of the stack
    pub fn top(&self) -> MplsLabel {
        MplsLabel::from_u32(self.read_u32(0))
    }

    pub fn labels(&self) -> impl Iterator<Item = MplsLabel> + '_ {
        (0..self.label_count()).map(move |i| MplsLabel::from_u32(self.read_u32(i * 4)))
    }

    /// Protocol of the payload, guessed from the IP version nibble
    pub fn payload_protocol(&self) -> Protocol {
        match self.payload().first().map(|b| b >> 4) {
            Some(4) => Protocol::Ipv4,
            Some(6) => Protocol::Ipv6,
            _ => Protocol::Payload,
        }
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Frame<Mpls, T> {
    /// Overwrite the entry at `index`
    ///
    /// The index may reach past the current stack as long as the frame has
    /// room; call [`Frame::revalidate`] after changing bottom-of-stack bits.
    pub fn set_label(&mut self, index: usize, label: MplsLabel) -> Result<()> {
        self.write(index * 4, &label.to_u32().to_be_bytes())
    }

    pub fn set_top_ttl(&mut self, ttl: u8) {
        self.write_u8(3, ttl);
    }
}
