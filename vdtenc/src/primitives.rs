//! Variable-length numeric encodings used by the videotex protocol.
//!
//! All multi-byte values travel as 7-bit digit groups (the transport only
//! guarantees 7 significant bits per byte), and length fields are
//! self-delimiting so a receiver never needs external framing.

use crate::error::EncodeError;

/// Encodes a non-negative integer as a self-delimiting base-32 length field.
///
/// Digits are tagged with `0x40`; every digit except the least significant
/// one also carries the continuation bit `0x20`. The sentinel `0xFF` leads
/// the sequence, followed by digits most-significant first. Zero encodes as
/// the sentinel alone.
pub fn encode_length(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    let mut first = true;
    while value != 0 {
        let mut digit = (value & 31) as u8 | 0x40;
        if !first {
            digit |= 0x20;
        }
        first = false;
        value >>= 5;
        out.push(digit);
    }
    out.push(0xFF);
    out.reverse();
    out
}

/// Reads a length field from the front of `data`.
///
/// Returns the value and the number of bytes consumed, or `None` if the
/// sentinel is missing or the digit run is truncated.
pub fn decode_length(data: &[u8]) -> Option<(u64, usize)> {
    if *data.first()? != 0xFF {
        return None;
    }
    let mut value = 0u64;
    let mut used = 1;
    for &byte in &data[1..] {
        if byte & 0x40 == 0 {
            // not a tagged digit, the field ended with the previous byte
            return Some((value, used));
        }
        value = value << 5 | u64::from(byte & 31);
        used += 1;
        if byte & 0x20 == 0 {
            return Some((value, used));
        }
    }
    Some((value, used))
}

/// Encodes a signed integer in the smallest multiple-of-7 bit width that
/// holds it in two's complement.
///
/// Unless `raw` is requested the digits are preceded by the tag `0x40` and
/// the digit count; `raw` is for callers that supply their own count
/// pretext.
pub fn encode_integer(number: i64, raw: bool) -> Vec<u8> {
    let number = i128::from(number);
    let mut nbits = 7u32;
    while !(-(1i128 << (nbits - 1)) <= number && number < (1i128 << (nbits - 1))) {
        nbits += 7;
    }
    let mut value = number;
    if value < 0 {
        value += 1i128 << nbits;
    }
    let nbytes = nbits / 7;
    let mut data = Vec::with_capacity(nbytes as usize + 2);
    if !raw {
        data.push(0x40);
        data.push(nbytes as u8);
    }
    for i in (0..nbytes).rev() {
        data.push((value >> (7 * i) & 0x7F) as u8);
    }
    data
}

/// Reads a tagged integer (non-raw form) from the front of `data`.
pub fn decode_integer(data: &[u8]) -> Option<(i64, usize)> {
    if data.len() < 2 || data[0] != 0x40 {
        return None;
    }
    let nbytes = data[1] as usize;
    if nbytes == 0 || data.len() < 2 + nbytes {
        return None;
    }
    let mut value = 0i128;
    for &byte in &data[2..2 + nbytes] {
        value = value << 7 | i128::from(byte & 0x7F);
    }
    let nbits = 7 * nbytes as u32;
    if value >= 1i128 << (nbits - 1) {
        value -= 1i128 << nbits;
    }
    Some((value as i64, 2 + nbytes))
}

const NORMALIZED_SCALE: i64 = 1 << 26;
const NORMALIZED_BIAS: i64 = (1 << 28) - (1 << 26);

/// Encodes a fraction in `[-1, 1]` as a fixed 4-digit fixed-point value
/// (tag `0x42`, scale `2^26`, negatives biased into the unsigned 28-bit
/// range).
pub fn encode_normalized(value: f64) -> Result<[u8; 6], EncodeError> {
    if !(-1.0..=1.0).contains(&value) {
        return Err(EncodeError::Domain(value));
    }
    let mut v = (value * NORMALIZED_SCALE as f64).round() as i64;
    if v < 0 {
        v += NORMALIZED_BIAS;
    }
    let mut out = [0u8; 6];
    out[0] = 0x42;
    out[1] = 4;
    for (i, slot) in out[2..].iter_mut().enumerate() {
        *slot = (v >> (7 * (3 - i)) & 0x7F) as u8;
    }
    Ok(out)
}

/// Reads a normalized fraction from the front of `data`.
pub fn decode_normalized(data: &[u8]) -> Option<(f64, usize)> {
    if data.len() < 6 || data[0] != 0x42 || data[1] != 4 {
        return None;
    }
    let mut v = 0i64;
    for &byte in &data[2..6] {
        v = v << 7 | i64::from(byte & 0x7F);
    }
    // positives occupy [0, 2^26], biased negatives [2^27, 3 * 2^26)
    if v >= 1 << 27 {
        v -= NORMALIZED_BIAS;
    }
    Some((v as f64 / NORMALIZED_SCALE as f64, 6))
}

/// Fixed 3-byte boolean form.
pub fn encode_boolean(value: bool) -> [u8; 3] {
    [0x45, 0x01, value as u8]
}

#[test]
fn test_length_known_values() {
    assert_eq!(encode_length(0), vec![0xFF]);
    assert_eq!(encode_length(2), vec![0xFF, 0x42]);
    assert_eq!(encode_length(31), vec![0xFF, 0x5F]);
    // 65 = 2 * 32 + 1: msd carries the continuation bit, lsd does not
    assert_eq!(encode_length(65), vec![0xFF, 0x62, 0x41]);
}

#[test]
fn test_length_roundtrip() {
    for v in [0u64, 1, 2, 31, 32, 33, 255, 256, 1023, 1 << 20, u64::from(u32::MAX)] {
        let enc = encode_length(v);
        assert_eq!(Some((v, enc.len())), decode_length(&enc), "value {v}");
    }
}

#[test]
fn test_length_stops_before_trailing_bytes() {
    // a final header opcode directly after the field must not be consumed
    let mut enc = encode_length(257);
    let len = enc.len();
    enc.push(0x51);
    assert_eq!(Some((257, len)), decode_length(&enc));
}

#[test]
fn test_integer_known_values() {
    assert_eq!(encode_integer(0, false), vec![0x40, 0x01, 0x00]);
    assert_eq!(encode_integer(0, true), vec![0x00]);
    // 0x7F does not fit 7 signed bits, so it widens to two digits
    assert_eq!(encode_integer(0x7F, false), vec![0x40, 0x02, 0x00, 0x7F]);
    assert_eq!(encode_integer(-1, false), vec![0x40, 0x01, 0x7F]);
}

#[test]
fn test_integer_minimal_width() {
    for (v, nbytes) in [
        (0i64, 1),
        (63, 1),
        (64, 2),
        (-64, 1),
        (-65, 2),
        (8191, 2),
        (8192, 3),
        (i64::from(i32::MAX), 5),
        (i64::MIN, 10),
    ] {
        assert_eq!(encode_integer(v, true).len(), nbytes, "value {v}");
    }
}

#[test]
fn test_integer_roundtrip() {
    for v in [
        0i64,
        1,
        -1,
        63,
        64,
        -64,
        -65,
        127,
        4242,
        -99999,
        i64::from(i32::MIN),
        i64::MAX,
        i64::MIN,
    ] {
        let enc = encode_integer(v, false);
        assert_eq!(Some((v, enc.len())), decode_integer(&enc), "value {v}");
    }
}

#[test]
fn test_normalized_domain() {
    assert!(encode_normalized(1.001).is_err());
    assert!(encode_normalized(-1.001).is_err());
    assert!(encode_normalized(1.0).is_ok());
    assert!(encode_normalized(-1.0).is_ok());
}

#[test]
fn test_normalized_known_value() {
    // 0.71875 = 23/32 scales to exactly 0x2E00000
    assert_eq!(
        encode_normalized(0.71875).unwrap(),
        [0x42, 0x04, 0x17, 0x00, 0x00, 0x00]
    );
}

#[test]
fn test_normalized_roundtrip() {
    for v in [-1.0f64, -0.75, -0.5, -0.1234, 0.0, 0.001, 0.25, 0.71875, 1.0] {
        let enc = encode_normalized(v).unwrap();
        let (dec, used) = decode_normalized(&enc).unwrap();
        assert_eq!(used, 6);
        assert!((dec - v).abs() <= 1.0 / NORMALIZED_SCALE as f64, "value {v}");
    }
}

#[test]
fn test_boolean() {
    assert_eq!(encode_boolean(true), [0x45, 0x01, 0x01]);
    assert_eq!(encode_boolean(false), [0x45, 0x01, 0x00]);
}
