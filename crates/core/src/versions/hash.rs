//! Content hashing for save deduplication.
//!
//! The hash is a 32-bit rolling value over UTF-16 code units, rendered in
//! base 36. It only has to tell consecutive saves apart; it is not a
//! content address and offers no collision resistance.

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Hash document content into a short base-36 token.
///
/// Each step computes `h * 31 + unit` with wrapping signed 32-bit arithmetic,
/// so identical strings always yield identical tokens across runs and
/// platforms.
pub fn content_hash(content: &str) -> String {
    let hash = content
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    to_base36(hash)
}

fn to_base36(value: i32) -> String {
    if value == 0 {
        return "0".to_string();
    }

    // i64 so that i32::MIN has a positive magnitude
    let mut magnitude = i64::from(value).unsigned_abs();
    let mut digits = Vec::with_capacity(8);
    while magnitude > 0 {
        digits.push(DIGITS[(magnitude % 36) as usize]);
        magnitude /= 36;
    }
    if value < 0 {
        digits.push(b'-');
    }
    digits.reverse();

    String::from_utf8(digits).unwrap_or_default()
}
