//! TCP segments
//!
//! Header of 20 to 60 bytes, sized by the data-offset field. The checksum
//! covers an IPv4 or IPv6 pseudo-header plus the whole segment.

use crate::checksum::PseudoHeader;
use crate::frame::{Frame, Header, Protocol};
use ofswitch_core::types::ip_protocols;
use ofswitch_core::{Error, Result};

/// Common TCP port numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TcpPort(pub u16);

impl TcpPort {
    /// SSH (22)
    pub const SSH: TcpPort = TcpPort(22);

    /// HTTP (80)
    pub const HTTP: TcpPort = TcpPort(80);

    /// BGP (179)
    pub const BGP: TcpPort = TcpPort(179);

    /// HTTPS (443)
    pub const HTTPS: TcpPort = TcpPort(443);

    /// OpenFlow (6653)
    pub const OPENFLOW: TcpPort = TcpPort(6653);

    pub fn new(port: u16) -> Self {
        TcpPort(port)
    }

    pub fn to_u16(self) -> u16 {
        self.0
    }
}

impl From<u16> for TcpPort {
    fn from(port: u16) -> Self {
        TcpPort(port)
    }
}

impl From<TcpPort> for u16 {
    fn from(port: TcpPort) -> Self {
        port.0
    }
}

/// TCP flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    /// FIN - No more data from sender
    pub fin: bool,
    /// SYN - Synchronize sequence numbers
    pub syn: bool,
    /// RST - Reset the connection
    pub rst: bool,
    /// PSH - Push function
    pub psh: bool,
    /// ACK - Acknowledgment field is significant
    pub ack: bool,
    /// URG - Urgent pointer field is significant
    pub urg: bool,
    /// ECE - ECN-Echo
    pub ece: bool,
    /// CWR - Congestion Window Reduced
    pub cwr: bool,
}

impl TcpFlags {
    /// No flags set
    pub const NONE: TcpFlags = TcpFlags::from_bits(0);

    /// SYN flag (connection initiation)
    pub const SYN: TcpFlags = TcpFlags::from_bits(0b0000_0010);

    /// SYN+ACK flags (connection acknowledgment)
    pub const SYN_ACK: TcpFlags = TcpFlags::from_bits(0b0001_0010);

    /// ACK flag
    pub const ACK: TcpFlags = TcpFlags::from_bits(0b0001_0000);

    /// FIN+ACK flags (connection termination)
    pub const FIN_ACK: TcpFlags = TcpFlags::from_bits(0b0001_0001);

    /// RST flag (connection reset)
    pub const RST: TcpFlags = TcpFlags::from_bits(0b0000_0100);

    /// PSH+ACK flags (push data)
    pub const PSH_ACK: TcpFlags = TcpFlags::from_bits(0b0001_1000);

    const fn from_bits(value: u8) -> Self {
        TcpFlags {
            fin: (value & 0b0000_0001) != 0,
            syn: (value & 0b0000_0010) != 0,
            rst: (value & 0b0000_0100) != 0,
            psh: (value & 0b0000_1000) != 0,
            ack: (value & 0b0001_0000) != 0,
            urg: (value & 0b0010_0000) != 0,
            ece: (value & 0b0100_0000) != 0,
            cwr: (value & 0b1000_0000) != 0,
        }
    }

    /// Convert flags to u8 value
    pub fn to_u8(self) -> u8 {
        let mut flags = 0u8;
        if self.fin {
            flags |= 0b0000_0001;
        }
        if self.syn {
            flags |= 0b0000_0010;
        }
        if self.rst {
            flags |= 0b0000_0100;
        }
        if self.psh {
            flags |= 0b0000_1000;
        }
        if self.ack {
            flags |= 0b0001_0000;
        }
        if self.urg {
            flags |= 0b0010_0000;
        }
        if self.ece {
            flags |= 0b0100_0000;
        }
        if self.cwr {
            flags |= 0b1000_0000;
        }
        flags
    }

    /// Parse flags from u8 value
    pub fn from_u8(value: u8) -> Self {
        Self::from_bits(value)
    }
}

/// TCP protocol marker
pub enum Tcp {}

/// TCP segment over byte storage `T`
pub type TcpFrame<T> = Frame<Tcp, T>;

impl Tcp {
    /// Maximum TCP header size (with maximum options)
    pub const MAX_HEADER_SIZE: usize = 60;
}

impl Header for Tcp {
    const PROTOCOL: Protocol = Protocol::Tcp;
    const MIN_LEN: usize = 20;

    fn header_len(bytes: &[u8]) -> Result<usize> {
        let header_len = Self::header_len_hint(bytes);
        if header_len < Self::MIN_LEN {
            return Err(Error::malformed(
                "TCP",
                format!("data offset {} below 5", header_len / 4),
            ));
        }
        if header_len > bytes.len() {
            return Err(Error::malformed(
                "TCP",
                format!(
                    "data offset {} runs past {} bytes",
                    header_len / 4,
                    bytes.len()
                ),
            ));
        }
        Ok(header_len)
    }

    fn header_len_hint(bytes: &[u8]) -> usize {
        ((bytes[12] >> 4) as usize) * 4
    }
}

impl<T: AsRef<[u8]>> Frame<Tcp, T> {
    pub fn source_port(&self) -> TcpPort {
        TcpPort(self.read_u16(0))
    }

    pub fn destination_port(&self) -> TcpPort {
        TcpPort(self.read_u16(2))
    }

    pub fn sequence_number(&self) -> u32 {
        self.read_u32(4)
    }

    pub fn acknowledgment_number(&self) -> u32 {
        self.read_u32(8)
    }

    /// Header length in 32-bit words
    pub fn data_offset(&self) -> u8 {
        self.read_u8(12) >> 4
    }

    pub fn flags(&self) -> TcpFlags {
        TcpFlags::from_u8(self.read_u8(13))
    }

    pub fn window_size(&self) -> u16 {
        self.read_u16(14)
    }

    pub fn checksum(&self) -> u16 {
        self.read_u16(16)
    }

    pub fn urgent_pointer(&self) -> u16 {
        self.read_u16(18)
    }

    pub fn options(&self) -> &[u8] {
        &self.header()[Tcp::MIN_LEN..]
    }

    /// Checksum of the segment under `pseudo`, stored checksum excluded
    pub fn compute_checksum(&self, pseudo: &PseudoHeader) -> u16 {
        pseudo.checksum_skipping(ip_protocols::TCP, self.as_bytes(), 16)
    }

    pub fn verify_checksum(&self, pseudo: &PseudoHeader) -> bool {
        pseudo.verify(ip_protocols::TCP, self.as_bytes())
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Frame<Tcp, T> {
    pub fn set_source_port(&mut self, port: TcpPort) {
        self.write_u16(0, port.to_u16());
    }

    pub fn set_destination_port(&mut self, port: TcpPort) {
        self.write_u16(2, port.to_u16());
    }

    pub fn set_sequence_number(&mut self, seq: u32) {
        self.write_u32(4, seq);
    }

    pub fn set_acknowledgment_number(&mut self, ack: u32) {
        self.write_u32(8, ack);
    }

    /// Set the header length in 32-bit words and refresh the header split
    pub fn set_data_offset(&mut self, words: u8) -> Result<()> {
        if !(5..=15).contains(&words) {
            return Err(Error::invalid_parameter(
                "data_offset".to_string(),
                format!("{} outside 5..=15", words),
            ));
        }
        let old = self.read_u8(12);
        self.write_u8(12, (old & 0x0F) | (words << 4));
        if let Err(err) = self.revalidate() {
            self.write_u8(12, old);
            return Err(err);
        }
        Ok(())
    }

    pub fn set_flags(&mut self, flags: TcpFlags) {
        self.write_u8(13, flags.to_u8());
    }

    pub fn set_window_size(&mut self, window: u16) {
        self.write_u16(14, window);
    }

    pub fn set_checksum(&mut self, checksum: u16) {
        self.write_u16(16, checksum);
    }

    pub fn set_urgent_pointer(&mut self, pointer: u16) {
        self.write_u16(18, pointer);
    }

    /// Write `options` (zero-padded to a 4-byte boundary) and grow the data
    /// offset to cover them
    pub fn set_options(&mut self, options: &[u8]) -> Result<()> {
        let padded = (options.len() + 3) & !3;
        if Tcp::MIN_LEN + padded > Tcp::MAX_HEADER_SIZE {
            return Err(Error::construction(format!(
                "{} bytes of TCP options exceed 40",
                padded
            )));
        }
        let mut buf = [0u8; 40];
        buf[..options.len()].copy_from_slice(options);
        self.write(Tcp::MIN_LEN, &buf[..padded])?;
        self.set_data_offset(((Tcp::MIN_LEN + padded) / 4) as u8)
    }

    /// Recompute and store the checksum under `pseudo`
    pub fn fill_checksum(&mut self, pseudo: &PseudoHeader) {
        let checksum = self.compute_checksum(pseudo);
        self.set_checksum(checksum);
    }
}
