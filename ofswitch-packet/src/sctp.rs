//! SCTP common header (RFC 9260 section 3.1)
//!
//! 12 bytes: ports, verification tag and a CRC32c over the whole packet.
//! Chunks follow as payload; each chunk is `type | flags | length | value`
//! padded to 4 bytes.

use crate::checksum::crc32c;
use crate::frame::{Frame, Header, Protocol};

/// SCTP protocol marker
pub enum Sctp {}

/// SCTP packet over byte storage `T`
pub type SctpFrame<T> = Frame<Sctp, T>;

impl Header for Sctp {
    const PROTOCOL: Protocol = Protocol::Sctp;
    const MIN_LEN: usize = 12;
}

/// One chunk inside an SCTP packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SctpChunk<'a> {
    pub chunk_type: u8,
    pub flags: u8,
    /// Chunk value, padding excluded
    pub value: &'a [u8],
}

impl<T: AsRef<[u8]>> Frame<Sctp, T> {
    pub fn source_port(&self) -> u16 {
        self.read_u16(0)
    }

    pub fn destination_port(&self) -> u16 {
        self.read_u16(2)
    }

    pub fn verification_tag(&self) -> u32 {
        self.read_u32(4)
    }

    /// Stored CRC32c
    pub fn checksum(&self) -> u32 {
        u32::from_le_bytes(self.read_array(8))
    }

    /// CRC32c over the packet with the checksum field zeroed
    pub fn compute_checksum(&self) -> u32 {
        let mut crc_input = self.as_bytes().to_vec();
        crc_input[8..12].fill(0);
        crc32c(&crc_input)
    }

    pub fn verify_checksum(&self) -> bool {
        self.compute_checksum() == self.checksum()
    }

    /// Chunks in the payload, stopping at the first that does not fit
    pub fn chunks(&self) -> Vec<SctpChunk<'_>> {
        let mut chunks = Vec::new();
        let mut rest = self.payload();
        while rest.len() >= 4 {
            let len = u16::from_be_bytes([rest[2], rest[3]]) as usize;
            if len < 4 || len > rest.len() {
                break;
            }
            chunks.push(SctpChunk {
                chunk_type: rest[0],
                flags: rest[1],
                value: &rest[4..len],
            });
            let padded = ((len + 3) & !3).min(rest.len());
            rest = &rest[padded..];
        }
        chunks
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Frame<Sctp, T> {
    pub fn set_source_port(&mut self, port: u16) {
        self.write_u16(0, port);
    }

    pub fn set_destination_port(&mut self, port: u16) {
        self.write_u16(2, port);
    }

    pub fn set_verification_tag(&mut self, tag: u32) {
        self.write_u32(4, tag);
    }

    pub fn set_checksum(&mut self, checksum: u32) {
        self.write_slice(8, &checksum.to_le_bytes());
    }

    /// Recompute and store the CRC32c
    pub fn fill_checksum(&mut self) {
        let checksum = self.compute_checksum();
        self.set_checksum(checksum);
    }
}
