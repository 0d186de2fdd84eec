/// SIO frame checksum
///
/// A running sum where each carry out of the low byte is added straight
/// back in (end-around carry). Not a CRC: the result is the byte sum
/// modulo 255, with 0xFF standing in for a non-zero multiple of 255.

/// Checksum of a payload
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u16, |acc, &byte| {
        let sum = acc + byte as u16;
        (sum % 256) + (sum / 256)
    }) as u8
}

/// Check a payload against a received checksum byte
pub fn verify(data: &[u8], expected: u8) -> bool {
    checksum(data) == expected
}
