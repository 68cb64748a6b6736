//! Checksum calculations for network packets
//!
//! The Internet Checksum (RFC 1071) used by IPv4, ICMP, TCP and UDP, the
//! IPv4/IPv6 pseudo-headers transport checksums cover, and the CRC32c
//! (Castagnoli) used by SCTP.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Calculates the Internet Checksum as defined in RFC 1071.
///
/// The data is summed as a sequence of 16-bit big-endian words, an odd
/// trailing byte is padded with zero, and the one's complement of the folded
/// sum is returned.
///
/// # Examples
///
/// ```
/// use ofswitch_packet::checksum::internet_checksum;
///
/// let data = vec![0x45, 0x00, 0x00, 0x3c];
/// let checksum = internet_checksum(&data);
/// ```
pub fn internet_checksum(data: &[u8]) -> u16 {
    !fold(checksum_accumulate(data))
}

/// Accumulates 16-bit words of `data` into a 32-bit one's complement sum,
/// without folding
pub fn checksum_accumulate(data: &[u8]) -> u32 {
    let mut sum: u32 = 0;

    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        let word = u16::from_be_bytes([chunk[0], chunk[1]]);
        sum = sum.wrapping_add(word as u32);
    }

    if let Some(&byte) = chunks.remainder().first() {
        sum = sum.wrapping_add((byte as u32) << 8);
    }

    sum
}

/// Internet checksum of `data` with the 16-bit field at `field` (an even
/// offset) taken as zero
pub fn checksum_skipping(data: &[u8], field: usize) -> u16 {
    let sum = checksum_accumulate(&data[..field])
        .wrapping_add(checksum_accumulate(&data[field + 2..]));
    !fold(sum)
}

fn fold(mut sum: u32) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

/// Pseudo-header mixed into TCP, UDP and ICMPv6 checksums
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoHeader {
    V4 { src: Ipv4Addr, dst: Ipv4Addr },
    V6 { src: Ipv6Addr, dst: Ipv6Addr },
}

impl PseudoHeader {
    fn accumulate(&self, protocol: u8, len: usize) -> u32 {
        match self {
            PseudoHeader::V4 { src, dst } => {
                let mut header = [0u8; 12];
                header[0..4].copy_from_slice(&src.octets());
                header[4..8].copy_from_slice(&dst.octets());
                header[9] = protocol;
                header[10..12].copy_from_slice(&(len as u16).to_be_bytes());
                checksum_accumulate(&header)
            }
            PseudoHeader::V6 { src, dst } => {
                let mut header = [0u8; 40];
                header[0..16].copy_from_slice(&src.octets());
                header[16..32].copy_from_slice(&dst.octets());
                header[32..36].copy_from_slice(&(len as u32).to_be_bytes());
                header[39] = protocol;
                checksum_accumulate(&header)
            }
        }
    }

    /// Checksum of `data` (transport header and payload) under this
    /// pseudo-header for upper-layer `protocol`
    pub fn checksum(&self, protocol: u8, data: &[u8]) -> u16 {
        !fold(
            self.accumulate(protocol, data.len())
                .wrapping_add(checksum_accumulate(data)),
        )
    }

    /// Like [`PseudoHeader::checksum`], with the checksum field at `field`
    /// taken as zero
    pub fn checksum_skipping(&self, protocol: u8, data: &[u8], field: usize) -> u16 {
        let sum = self
            .accumulate(protocol, data.len())
            .wrapping_add(checksum_accumulate(&data[..field]))
            .wrapping_add(checksum_accumulate(&data[field + 2..]));
        !fold(sum)
    }

    /// True when `data` (checksum field included) sums to zero
    pub fn verify(&self, protocol: u8, data: &[u8]) -> bool {
        let result = self.checksum(protocol, data);
        result == 0 || result == 0xFFFF
    }
}

/// Calculates the checksum for a TCP or UDP packet including the IPv4
/// pseudo-header.
///
/// # Examples
///
/// ```
/// use ofswitch_packet::checksum::transport_checksum;
///
/// let src_ip = [192, 168, 1, 1];
/// let dst_ip = [192, 168, 1, 2];
/// let protocol = 17; // UDP
/// let data = vec![0x00, 0x35, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00];
/// let checksum = transport_checksum(&src_ip, &dst_ip, protocol, &data);
/// ```
pub fn transport_checksum(src_ip: &[u8; 4], dst_ip: &[u8; 4], protocol: u8, data: &[u8]) -> u16 {
    PseudoHeader::V4 {
        src: Ipv4Addr::from(*src_ip),
        dst: Ipv4Addr::from(*dst_ip),
    }
    .checksum(protocol, data)
}

/// Calculates a transport checksum over the IPv6 pseudo-header (RFC 8200
/// section 8.1)
pub fn transport_checksum_v6(
    src_ip: &[u8; 16],
    dst_ip: &[u8; 16],
    next_header: u8,
    data: &[u8],
) -> u16 {
    PseudoHeader::V6 {
        src: Ipv6Addr::from(*src_ip),
        dst: Ipv6Addr::from(*dst_ip),
    }
    .checksum(next_header, data)
}

/// Validates an Internet checksum.
///
/// The checksum over the data including its checksum field is 0 (or 0xFFFF,
/// the same value in one's complement) when the data is intact.
pub fn validate_checksum(data: &[u8]) -> bool {
    let result = internet_checksum(data);
    result == 0 || result == 0xFFFF
}

/// CRC32c (Castagnoli) as used by SCTP (RFC 9260 appendix A)
///
/// ```
/// use ofswitch_packet::checksum::crc32c;
///
/// assert_eq!(crc32c(b"123456789"), 0xE306_9283);
/// ```
pub fn crc32c(data: &[u8]) -> u32 {
    ::crc32c::crc32c(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internet_checksum_empty() {
        assert_eq!(internet_checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_internet_checksum_rfc1071_sample() {
        // RFC 1071 section 3: sum of these words is 0xddf2
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(internet_checksum(&data), !0xddf2);
    }

    #[test]
    fn test_internet_checksum_odd_length() {
        // trailing byte is padded: 0x0001 + 0x0200
        assert_eq!(internet_checksum(&[0x00, 0x01, 0x02]), !0x0201);
    }

    #[test]
    fn test_validate_checksum() {
        let data = vec![0x45, 0x00, 0x00, 0x3c];
        let checksum = internet_checksum(&data);

        let mut data_with_checksum = data.clone();
        data_with_checksum.extend_from_slice(&checksum.to_be_bytes());

        assert!(validate_checksum(&data_with_checksum));
    }

    #[test]
    fn test_ipv4_header_checksum_known_value() {
        // Wikipedia IPv4 header checksum example
        let header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        assert_eq!(internet_checksum(&header), 0xb861);
    }

    #[test]
    fn test_transport_checksum_verifies() {
        let src = Ipv4Addr::new(192, 168, 1, 1);
        let dst = Ipv4Addr::new(192, 168, 1, 2);
        let mut data = vec![0x00, 0x35, 0x00, 0x35, 0x00, 0x0a, 0x00, 0x00, 0xab, 0xcd];

        let pseudo = PseudoHeader::V4 { src, dst };
        let checksum = pseudo.checksum(17, &data);
        data[6..8].copy_from_slice(&checksum.to_be_bytes());
        assert!(pseudo.verify(17, &data));

        data[9] ^= 0x01;
        assert!(!pseudo.verify(17, &data));
    }

    #[test]
    fn test_transport_checksum_v6_verifies() {
        let src: Ipv6Addr = "fe80::1".parse().unwrap();
        let dst: Ipv6Addr = "ff02::1".parse().unwrap();
        let mut data = vec![0x80, 0x00, 0x00, 0x00, 0x12, 0x34, 0x00, 0x01];

        let pseudo = PseudoHeader::V6 { src, dst };
        let checksum = pseudo.checksum(58, &data);
        data[2..4].copy_from_slice(&checksum.to_be_bytes());
        assert!(pseudo.verify(58, &data));
    }

    #[test]
    fn test_checksum_skipping_ignores_field() {
        let mut header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0xde, 0xad, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        assert_eq!(checksum_skipping(&header, 10), 0xb861);
        header[10] = 0;
        header[11] = 0;
        assert_eq!(internet_checksum(&header), 0xb861);
    }

    #[test]
    fn test_pseudo_checksum_skipping_matches_zeroed() {
        let pseudo = PseudoHeader::V4 {
            src: Ipv4Addr::new(10, 0, 0, 1),
            dst: Ipv4Addr::new(10, 0, 0, 2),
        };
        let mut data = [0x04, 0xd2, 0x00, 0x50, 0x00, 0x09, 0xbe, 0xef, 0x7a];
        let skipped = pseudo.checksum_skipping(17, &data, 6);
        data[6] = 0;
        data[7] = 0;
        assert_eq!(skipped, pseudo.checksum(17, &data));
    }

    #[test]
    fn test_checksum_accumulate() {
        assert_eq!(checksum_accumulate(&[0x00, 0x01, 0x00, 0x02]), 0x0003);
    }

    #[test]
    fn test_crc32c_check_value() {
        assert_eq!(crc32c(b"123456789"), 0xE306_9283);
        assert_eq!(crc32c(&[]), 0);
    }

    #[test]
    fn test_crc32c_zeros() {
        // RFC 3720 B.4 test vector: 32 bytes of zeros
        assert_eq!(crc32c(&[0u8; 32]), 0x8A91_36AA);
    }
}
