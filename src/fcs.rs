//! CRC-16/X-25 frame check sequence.
//!
//! Both the header check sequence (HCS) and the frame check sequence (FCS) of
//! an HDLC frame use the reflected CRC-16/X-25 per ISO/IEC 13239:
//! - Polynomial: x^16 + x^12 + x^5 + 1 (0x8408 bit-reversed)
//! - Initial value: 0xFFFF
//! - XOR output: 0xFFFF
//!
//! The checksum is transmitted low byte first.

/// FCS-16 polynomial, bit-reversed form of 0x1021.
pub(crate) const FCS16_POLYNOMIAL: u16 = 0x8408;

/// FCS-16 initial value.
pub(crate) const FCS16_INIT: u16 = 0xFFFF;

/// FCS-16 XOR output value.
pub(crate) const FCS16_XOR_OUTPUT: u16 = 0xFFFF;

/// Size of a check sequence in bytes.
pub const FCS_SIZE: usize = 2;

const BITS_PER_BYTE: u32 = 8;

/// Computes the CRC-16/X-25 over `data`.
///
/// Bytes are processed one bit at a time, least significant bit first.
///
/// # Examples
///
/// ```
/// # use han_cosem::fcs::compute_fcs;
/// assert_eq!(compute_fcs(b"123456789"), 0x906E);
/// ```
pub fn compute_fcs(data: &[u8]) -> u16 {
    let mut fcs = FCS16_INIT;

    for &byte in data {
        let mut byte = byte as u16;
        for _ in 0..BITS_PER_BYTE {
            if (fcs ^ byte) & 0x0001 != 0 {
                fcs = (fcs >> 1) ^ FCS16_POLYNOMIAL;
            } else {
                fcs >>= 1;
            }
            byte >>= 1;
        }
    }

    fcs ^ FCS16_XOR_OUTPUT
}

/// Checks the two bytes right after `data[..length]` against its CRC-16/X-25.
///
/// The checksum is expected low byte first at `data[length]` and high byte at
/// `data[length + 1]`. A zero `length` compares the trailing pair against the
/// untouched register, i.e. `FF FF`.
///
/// Returns `false` if `data` is too short to hold the trailing pair.
///
/// # Examples
///
/// ```
/// # use han_cosem::fcs::check_fcs;
/// let data = [b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', 0x6E, 0x90];
/// assert!(check_fcs(&data, 9));
/// assert!(!check_fcs(&data, 8));
/// ```
pub fn check_fcs(data: &[u8], length: usize) -> bool {
    let Some(trailer) = data.get(length..length + FCS_SIZE) else {
        return false;
    };

    let expected = if length == 0 { FCS16_INIT } else { compute_fcs(&data[..length]) };

    trailer == expected.to_le_bytes()
}

/// Appends the CRC-16/X-25 of `buf` to it, low byte first.
#[cfg(test)]
pub(crate) fn append_fcs(buf: &mut alloc::vec::Vec<u8>) {
    let fcs = compute_fcs(buf);
    buf.extend_from_slice(&fcs.to_le_bytes());
}
