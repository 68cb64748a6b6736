//! Generic frame view over a byte buffer
//!
//! Every protocol codec is a [`Frame<P, T>`]: a typed window onto a byte
//! region `T` interpreted as protocol `P`. The region is split into a header
//! part of `header_len` bytes and a payload part covering the rest.
//!
//! `T` decides ownership. `&[u8]` gives a read-only view, `&mut [u8]` a
//! mutable view whose length cannot exceed the backing slice, and
//! [`ByteBuffer`] an owned frame that can grow in build mode. Borrow rules
//! keep a parent buffer alive for as long as any view derived from it.

use crate::memory::ByteBuffer;
use ofswitch_core::{Error, Result};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;

/// Protocol tag of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Ethernet,
    Vlan,
    Arp,
    Ipv4,
    Ipv6,
    Icmpv4,
    Icmpv6,
    Tcp,
    Udp,
    Sctp,
    Mpls,
    /// Opaque bytes with no codec
    Payload,
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Ethernet => "Ethernet",
            Protocol::Vlan => "VLAN",
            Protocol::Arp => "ARP",
            Protocol::Ipv4 => "IPv4",
            Protocol::Ipv6 => "IPv6",
            Protocol::Icmpv4 => "ICMPv4",
            Protocol::Icmpv6 => "ICMPv6",
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Sctp => "SCTP",
            Protocol::Mpls => "MPLS",
            Protocol::Payload => "payload",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of a protocol header
///
/// Implemented by the uninhabited marker types (`Ethernet`, `Ipv4`, ...)
/// that parameterize [`Frame`].
pub trait Header {
    const PROTOCOL: Protocol;

    /// Smallest valid header length
    const MIN_LEN: usize;

    /// Header length declared by `bytes`
    ///
    /// Called with at least `MIN_LEN` bytes. Implementations validate
    /// discriminators and length fields and return `MalformedFrame` when the
    /// declared header does not fit in `bytes`.
    fn header_len(_bytes: &[u8]) -> Result<usize> {
        Ok(Self::MIN_LEN)
    }

    /// Total length declared by the header itself (IPv4 total length, UDP
    /// length, ...), if the protocol carries one
    fn declared_len(_bytes: &[u8]) -> Option<usize> {
        None
    }

    /// Bytes still missing before `bytes` holds a complete header
    fn need_bytes(bytes: &[u8]) -> usize {
        if bytes.len() < Self::MIN_LEN {
            return Self::MIN_LEN - bytes.len();
        }
        match Self::header_len(bytes) {
            Ok(_) => 0,
            Err(_) => Self::header_len_hint(bytes).saturating_sub(bytes.len()),
        }
    }

    /// Header length the fields announce, without checking it fits
    fn header_len_hint(_bytes: &[u8]) -> usize {
        Self::MIN_LEN
    }
}

/// Backing storage a frame can be resized within
pub trait Storage: AsRef<[u8]> {
    /// Make sure at least `len` bytes are addressable
    fn ensure_len(&mut self, len: usize) -> Result<()> {
        let available = self.as_ref().len();
        if len > available {
            return Err(Error::out_of_bounds(0, len, available));
        }
        Ok(())
    }

    /// Zero bytes that a frame takes back after shrinking; read-only storage keeps them
    fn zero(&mut self, _range: Range<usize>) {}
}

impl Storage for &[u8] {}

impl Storage for &mut [u8] {
    fn zero(&mut self, range: Range<usize>) {
        self[range].fill(0);
    }
}

impl Storage for Vec<u8> {
    fn ensure_len(&mut self, len: usize) -> Result<()> {
        if len > self.len() {
            self.resize(len, 0);
        }
        Ok(())
    }

    fn zero(&mut self, range: Range<usize>) {
        self[range].fill(0);
    }
}

impl Storage for ByteBuffer {
    fn ensure_len(&mut self, len: usize) -> Result<()> {
        if len > self.len() {
            self.resize(len)?;
        }
        Ok(())
    }

    fn zero(&mut self, range: Range<usize>) {
        self.as_mut_slice()[range].fill(0);
    }
}

/// Typed view of one protocol layer inside a byte region
pub struct Frame<P, T> {
    buffer: T,
    len: usize,
    header_len: usize,
    _protocol: PhantomData<fn() -> P>,
}

impl<P: Header, T: AsRef<[u8]>> Frame<P, T> {
    /// Interpret all of `buffer` as a `P` frame
    ///
    /// Fails with `MalformedFrame` when the buffer is shorter than the minimum
    /// header or a declared header length is inconsistent with the bytes.
    pub fn parse(buffer: T) -> Result<Self> {
        let len = buffer.as_ref().len();
        if len < P::MIN_LEN {
            return Err(Error::malformed(
                P::PROTOCOL.name(),
                format!("{} bytes, header needs at least {}", len, P::MIN_LEN),
            ));
        }
        let header_len = P::header_len(buffer.as_ref())?;
        if header_len > len {
            return Err(Error::malformed(
                P::PROTOCOL.name(),
                format!("header of {} bytes exceeds frame of {}", header_len, len),
            ));
        }
        Ok(Self {
            buffer,
            len,
            header_len,
            _protocol: PhantomData,
        })
    }

    /// Build a frame from an already validated layout
    pub(crate) fn from_parts(buffer: T, len: usize, header_len: usize) -> Self {
        debug_assert!(header_len <= len && len <= buffer.as_ref().len());
        Self {
            buffer,
            len,
            header_len,
            _protocol: PhantomData,
        }
    }

    /// Length of the whole frame (header plus payload)
    pub fn total_len(&self) -> usize {
        self.len
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn payload_len(&self) -> usize {
        self.len - self.header_len
    }

    /// The frame bytes, header and payload
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer.as_ref()[..self.len]
    }

    pub fn header(&self) -> &[u8] {
        &self.as_bytes()[..self.header_len]
    }

    pub fn payload(&self) -> &[u8] {
        &self.as_bytes()[self.header_len..]
    }

    /// Borrow the frame as a read-only view
    pub fn view(&self) -> Frame<P, &[u8]> {
        Frame::from_parts(self.as_bytes(), self.len, self.header_len)
    }

    /// Deep copy into an owned, growable buffer
    pub fn to_owned_frame(&self) -> Frame<P, ByteBuffer> {
        Frame::from_parts(ByteBuffer::from(self.as_bytes()), self.len, self.header_len)
    }

    pub fn into_inner(self) -> T {
        self.buffer
    }

    /// Bytes beyond the header that are missing from `bytes`
    ///
    /// Zero once a full header is present.
    pub fn need_bytes(bytes: &[u8]) -> usize {
        P::need_bytes(bytes)
    }

    pub(crate) fn read_u8(&self, offset: usize) -> u8 {
        self.as_bytes()[offset]
    }

    pub(crate) fn read_u16(&self, offset: usize) -> u16 {
        let bytes = self.as_bytes();
        u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
    }

    pub(crate) fn read_u32(&self, offset: usize) -> u32 {
        let bytes = self.as_bytes();
        u32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    pub(crate) fn read_array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.as_bytes()[offset..offset + N]);
        out
    }

    /// Checked read of `len` bytes at `offset` within the frame
    pub fn read(&self, offset: usize, len: usize) -> Result<&[u8]> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(&self.as_bytes()[offset..end]),
            _ => Err(Error::out_of_bounds(offset, len, self.len)),
        }
    }
}

impl<P: Header, T: AsRef<[u8]> + AsMut<[u8]>> Frame<P, T> {
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut self.buffer.as_mut()[..len]
    }

    pub fn header_mut(&mut self) -> &mut [u8] {
        let header_len = self.header_len;
        &mut self.as_bytes_mut()[..header_len]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        let header_len = self.header_len;
        &mut self.as_bytes_mut()[header_len..]
    }

    /// Copy `data` into the start of the payload region
    pub fn set_payload(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > self.payload_len() {
            return Err(Error::out_of_bounds(
                self.header_len,
                data.len(),
                self.len,
            ));
        }
        self.payload_mut()[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Checked write of `data` at `offset` within the frame
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        match offset.checked_add(data.len()) {
            Some(end) if end <= self.len => {
                self.as_bytes_mut()[offset..end].copy_from_slice(data);
                Ok(())
            }
            _ => Err(Error::out_of_bounds(offset, data.len(), self.len)),
        }
    }

    /// Re-read the header length from the current header fields
    ///
    /// Used after editing a field that changes the header size (IPv4 IHL,
    /// TCP data offset, IPv6 extension chain, ...).
    pub fn revalidate(&mut self) -> Result<()> {
        let header_len = P::header_len(self.as_bytes())?;
        if header_len > self.len {
            return Err(Error::malformed(
                P::PROTOCOL.name(),
                format!("header of {} bytes exceeds frame of {}", header_len, self.len),
            ));
        }
        self.header_len = header_len;
        Ok(())
    }

    pub(crate) fn write_u8(&mut self, offset: usize, value: u8) {
        self.as_bytes_mut()[offset] = value;
    }

    pub(crate) fn write_u16(&mut self, offset: usize, value: u16) {
        self.as_bytes_mut()[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn write_u32(&mut self, offset: usize, value: u32) {
        self.as_bytes_mut()[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn write_slice(&mut self, offset: usize, data: &[u8]) {
        self.as_bytes_mut()[offset..offset + data.len()].copy_from_slice(data);
    }
}

impl<P: Header, T: Storage> Frame<P, T> {
    /// Change the frame length
    ///
    /// Growing beyond a borrowed slice fails with `OutOfBounds`; an owned
    /// [`ByteBuffer`] grows, zero-filled. Bytes taken back after a shrink are
    /// zeroed in writable storage. The header part is never cut.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        if new_len < self.header_len {
            return Err(Error::malformed(
                P::PROTOCOL.name(),
                format!(
                    "cannot shrink to {} bytes, header is {}",
                    new_len, self.header_len
                ),
            ));
        }
        self.buffer.ensure_len(new_len)?;
        if new_len > self.len {
            self.buffer.zero(self.len..new_len);
        }
        self.len = new_len;
        Ok(())
    }
}

impl<P: Header> Frame<P, ByteBuffer> {
    /// Allocate a zero-filled frame in build mode
    ///
    /// The buffer is `max(requested_len, MIN_LEN)` bytes long and the header
    /// length starts at the protocol minimum.
    pub fn alloc(requested_len: usize) -> Self {
        let len = requested_len.max(P::MIN_LEN);
        Self {
            buffer: ByteBuffer::zeroed(len),
            len,
            header_len: P::MIN_LEN,
            _protocol: PhantomData,
        }
    }
}

impl<P, T: Clone> Clone for Frame<P, T> {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer.clone(),
            len: self.len,
            header_len: self.header_len,
            _protocol: PhantomData,
        }
    }
}

impl<P: Header, T: AsRef<[u8]>> fmt::Debug for Frame<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("protocol", &P::PROTOCOL)
            .field("len", &self.len)
            .field("header_len", &self.header_len)
            .finish()
    }
}

impl<P: Header, T: AsRef<[u8]>, U: AsRef<[u8]>> PartialEq<Frame<P, U>> for Frame<P, T> {
    fn eq(&self, other: &Frame<P, U>) -> bool {
        self.header_len == other.header_len && self.as_bytes() == other.as_bytes()
    }
}

/// Protocol-independent view of any frame
///
/// Object safe, so heterogeneous layers can be handled as `&dyn Framed`.
pub trait Framed {
    fn protocol(&self) -> Protocol;
    fn bytes(&self) -> &[u8];
    fn header_len(&self) -> usize;

    fn total_len(&self) -> usize {
        self.bytes().len()
    }

    fn payload_len(&self) -> usize {
        self.total_len() - self.header_len()
    }

    fn header_bytes(&self) -> &[u8] {
        &self.bytes()[..self.header_len()]
    }

    fn payload_bytes(&self) -> &[u8] {
        &self.bytes()[self.header_len()..]
    }
}

impl<P: Header, T: AsRef<[u8]>> Framed for Frame<P, T> {
    fn protocol(&self) -> Protocol {
        P::PROTOCOL
    }

    fn bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    fn header_len(&self) -> usize {
        self.header_len
    }
}
