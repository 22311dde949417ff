//! ISO14443-A CRC_A.
//!
//! The reader IC can compute this itself, but the clone protocol runs with the
//! transceiver CRC switched off, so every full-byte frame is checksummed here.

const CRC_A_PRESET: u32 = 0x6363;

/// CRC_A over `data`, low byte first (transmission order).
pub fn compute_checksum(data: &[u8]) -> [u8; 2] {
    let mut crc = CRC_A_PRESET;
    for &byte in data {
        let mut bt = byte ^ (crc & 0x00ff) as u8;
        bt ^= bt << 4;
        let bt = bt as u32;
        crc = (crc >> 8) ^ (bt << 8) ^ (bt << 3) ^ (bt >> 4);
    }
    [(crc & 0xff) as u8, ((crc >> 8) & 0xff) as u8]
}

/// `data` followed by its CRC_A.
pub fn append_checksum(data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(data.len() + 2);
    frame.extend_from_slice(data);
    frame.extend_from_slice(&compute_checksum(data));
    frame
}
