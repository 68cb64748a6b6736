//! ICMPv4 messages (RFC 792)
//!
//! 8-byte header (type, code, checksum, 4 bytes of rest-of-header); the
//! checksum covers the whole message.

use crate::checksum::{checksum_skipping, validate_checksum};
use crate::frame::{Frame, Header, Protocol};

/// ICMPv4 message types with a dedicated meaning here
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icmpv4Type {
    EchoReply,
    DestinationUnreachable,
    Redirect,
    EchoRequest,
    TimeExceeded,
    ParameterProblem,
    Other(u8),
}

impl Icmpv4Type {
    pub fn to_u8(self) -> u8 {
        match self {
            Icmpv4Type::EchoReply => 0,
            Icmpv4Type::DestinationUnreachable => 3,
            Icmpv4Type::Redirect => 5,
            Icmpv4Type::EchoRequest => 8,
            Icmpv4Type::TimeExceeded => 11,
            Icmpv4Type::ParameterProblem => 12,
            Icmpv4Type::Other(value) => value,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Icmpv4Type::EchoReply,
            3 => Icmpv4Type::DestinationUnreachable,
            5 => Icmpv4Type::Redirect,
            8 => Icmpv4Type::EchoRequest,
            11 => Icmpv4Type::TimeExceeded,
            12 => Icmpv4Type::ParameterProblem,
            other => Icmpv4Type::Other(other),
        }
    }

    pub fn is_echo(self) -> bool {
        matches!(self, Icmpv4Type::EchoRequest | Icmpv4Type::EchoReply)
    }
}

/// ICMPv4 protocol marker
pub enum Icmpv4 {}

/// ICMPv4 message over byte storage `T`
pub type Icmpv4Frame<T> = Frame<Icmpv4, T>;

impl Header for Icmpv4 {
    const PROTOCOL: Protocol = Protocol::Icmpv4;
    const MIN_LEN: usize = 8;
}

impl<T: AsRef<[u8]>> Frame<Icmpv4, T> {
    pub fn icmp_type(&self) -> Icmpv4Type {
        Icmpv4Type::from_u8(self.read_u8(0))
    }

    pub fn code(&self) -> u8 {
        self.read_u8(1)
    }

    pub fn checksum(&self) -> u16 {
        self.read_u16(2)
    }

    /// Rest-of-header word (identifier/sequence, gateway, MTU, ...)
    pub fn rest_of_header(&self) -> [u8; 4] {
        self.read_array(4)
    }

    /// Echo identifier; only meaningful for echo request/reply
    pub fn echo_identifier(&self) -> Option<u16> {
        self.icmp_type().is_echo().then(|| self.read_u16(4))
    }

    pub fn echo_sequence(&self) -> Option<u16> {
        self.icmp_type().is_echo().then(|| self.read_u16(6))
    }

    /// Checksum of the message as it is now, stored checksum excluded
    pub fn compute_checksum(&self) -> u16 {
        checksum_skipping(self.as_bytes(), 2)
    }

    pub fn verify_checksum(&self) -> bool {
        validate_checksum(self.as_bytes())
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Frame<Icmpv4, T> {
    pub fn set_icmp_type(&mut self, icmp_type: Icmpv4Type) {
        self.write_u8(0, icmp_type.to_u8());
    }

    pub fn set_code(&mut self, code: u8) {
        self.write_u8(1, code);
    }

    pub fn set_checksum(&mut self, checksum: u16) {
        self.write_u16(2, checksum);
    }

    pub fn set_rest_of_header(&mut self, rest: [u8; 4]) {
        self.write_slice(4, &rest);
    }

    pub fn set_echo(&mut self, identifier: u16, sequence: u16) {
        self.write_u16(4, identifier);
        self.write_u16(6, sequence);
    }

    /// Recompute and store the message checksum
    pub fn fill_checksum(&mut self) {
        let checksum = self.compute_checksum();
        self.set_checksum(checksum);
    }
}
