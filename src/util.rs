//! Hex rendering for the frame echo.

use std::fmt::Write;

/// `"26  0a  "`-style listing of whole bytes.
pub fn hex_bytes(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 4);
    for b in data {
        let _ = write!(out, "{:02x}  ", b);
    }
    out
}

/// Like [`hex_bytes`] for the first `bits / 8` bytes, then the trailing
/// partial byte with its bit count, e.g. `"a (4 bits)"`.
pub fn hex_bits(data: &[u8], bits: usize) -> String {
    let whole = bits / 8;
    let mut out = hex_bytes(&data[..whole.min(data.len())]);
    let remainder = bits % 8;
    if remainder != 0 {
        if let Some(last) = data.get(whole) {
            if remainder < 5 {
                let _ = write!(out, "{:01x} ({} bits)", last, remainder);
            } else {
                let _ = write!(out, "{:02x} ({} bits)", last, remainder);
            }
        }
    }
    out
}
