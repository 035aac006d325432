//! Purpose: Order-preserving variable-length integer codec for packed keys.
//! Exports: `encode_uint`/`encode_int`, `pack_uint`/`pack_int`, `decode_uint`/`decode_int`,
//! `uint_size`/`int_size`, and the marker/range constants.
//! Role: Leaf codec under the struct packer; every integer field goes through here.
//! Invariants: Byte-wise comparison of two encodings equals numeric comparison of the values.
//! Invariants: `*_size(x) == encode_*(x).len()` for every input.
//! Invariants: Decoding never reads past the buffer; short input is `TruncatedInput`.
//!
//! Lead byte layout (high bits select the class):
//!
//! ```text
//! 0001 nnnn  negative, multi-byte; nnnn = leading 0xff bytes dropped
//! 001x xxxx  [NEG_2BYTE_MIN, NEG_1BYTE_MIN), one trailing byte
//! 01xx xxxx  [NEG_1BYTE_MIN, 0)
//! 10xx xxxx  [0, POS_1BYTE_MAX]
//! 110x xxxx  (POS_1BYTE_MAX, POS_2BYTE_MAX], one trailing byte
//! 1110 nnnn  > POS_2BYTE_MAX, multi-byte; nnnn = trailing big-endian bytes
//! ```
use crate::core::error::{Error, ErrorKind};

pub const NEG_MULTI_MARKER: u8 = 0x10;
pub const NEG_2BYTE_MARKER: u8 = 0x20;
pub const NEG_1BYTE_MARKER: u8 = 0x40;
pub const POS_1BYTE_MARKER: u8 = 0x80;
pub const POS_2BYTE_MARKER: u8 = 0xc0;
pub const POS_MULTI_MARKER: u8 = 0xe0;

pub const NEG_1BYTE_MIN: i64 = -(1 << 6);
pub const NEG_2BYTE_MIN: i64 = -(1 << 13) + NEG_1BYTE_MIN;
pub const POS_1BYTE_MAX: i64 = (1 << 6) - 1;
pub const POS_2BYTE_MAX: i64 = (1 << 13) + POS_1BYTE_MAX;

/// Longest encoding: one marker byte plus eight payload bytes.
pub const MAX_ENCODED_LEN: usize = 9;

const POS_1BYTE_LIMIT: u64 = POS_1BYTE_MAX as u64;
const POS_2BYTE_LIMIT: u64 = POS_2BYTE_MAX as u64;

fn leading_zero_bytes(x: u64) -> usize {
    (x.leading_zeros() / 8) as usize
}

fn get_bits(x: u64, start: u32, end: u32) -> u64 {
    (x & ((1u64 << start) - 1)) >> end
}

fn pack_posint(buf: &mut Vec<u8>, x: u64) {
    let lz = leading_zero_bytes(x);
    let len = 8 - lz;
    buf.push(POS_MULTI_MARKER | (len as u8 & 0xf));
    buf.extend_from_slice(&x.to_be_bytes()[lz..]);
}

// The lead nibble stores the count of dropped 0xff bytes, so a smaller
// magnitude sorts after a larger one.
fn pack_negint(buf: &mut Vec<u8>, x: u64) {
    let lz = leading_zero_bytes(!x);
    buf.push(NEG_MULTI_MARKER | (lz as u8 & 0xf));
    buf.extend_from_slice(&x.to_be_bytes()[lz..]);
}

pub fn pack_uint(buf: &mut Vec<u8>, x: u64) {
    if x <= POS_1BYTE_LIMIT {
        buf.push(POS_1BYTE_MARKER | get_bits(x, 6, 0) as u8);
    } else if x <= POS_2BYTE_LIMIT {
        let x = x - (POS_1BYTE_LIMIT + 1);
        buf.push(POS_2BYTE_MARKER | get_bits(x, 13, 8) as u8);
        buf.push(get_bits(x, 8, 0) as u8);
    } else if x == POS_2BYTE_LIMIT + 1 {
        // Rebased to zero this would fit in the bare marker byte; keep the
        // explicit zero so the encoding never gets shorter at the seam.
        buf.push(POS_MULTI_MARKER | 0x1);
        buf.push(0);
    } else {
        pack_posint(buf, x - (POS_2BYTE_LIMIT + 1));
    }
}

pub fn pack_int(buf: &mut Vec<u8>, x: i64) {
    if x < NEG_2BYTE_MIN {
        pack_negint(buf, x as u64);
    } else if x < NEG_1BYTE_MIN {
        let x = (x - NEG_2BYTE_MIN) as u64;
        buf.push(NEG_2BYTE_MARKER | get_bits(x, 13, 8) as u8);
        buf.push(get_bits(x, 8, 0) as u8);
    } else if x < 0 {
        let x = (x - NEG_1BYTE_MIN) as u64;
        buf.push(NEG_1BYTE_MARKER | get_bits(x, 6, 0) as u8);
    } else {
        pack_uint(buf, x as u64);
    }
}

pub fn encode_uint(x: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(uint_size(x));
    pack_uint(&mut buf, x);
    buf
}

pub fn encode_int(x: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(int_size(x));
    pack_int(&mut buf, x);
    buf
}

pub fn uint_size(x: u64) -> usize {
    if x <= POS_1BYTE_LIMIT {
        1
    } else if x <= POS_2BYTE_LIMIT + 1 {
        2
    } else {
        1 + 8 - leading_zero_bytes(x - (POS_2BYTE_LIMIT + 1))
    }
}

pub fn int_size(x: i64) -> usize {
    if x < NEG_2BYTE_MIN {
        1 + 8 - leading_zero_bytes(!(x as u64))
    } else if x < NEG_1BYTE_MIN {
        2
    } else if x < 0 {
        1
    } else {
        uint_size(x as u64)
    }
}

/// Decodes an unsigned varint starting at `cursor`, returning the value and
/// the offset just past it.
pub fn decode_uint(buf: &[u8], cursor: usize) -> Result<(u64, usize), Error> {
    let lead = byte_at(buf, cursor, 1)?;
    match lead & 0xf0 {
        0x80 | 0x90 | 0xa0 | 0xb0 => Ok((get_bits(u64::from(lead), 6, 0), cursor + 1)),
        0xc0 | 0xd0 => {
            let low = byte_at(buf, cursor + 1, 1)?;
            let x = (get_bits(u64::from(lead), 5, 0) << 8) | u64::from(low);
            Ok((x + POS_1BYTE_LIMIT + 1, cursor + 2))
        }
        0xe0 => {
            let (x, next) = decode_posint(buf, cursor, lead)?;
            let x = x.checked_add(POS_2BYTE_LIMIT + 1).ok_or_else(|| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("unsigned varint overflows 64 bits")
                    .with_offset(cursor)
            })?;
            Ok((x, next))
        }
        _ => Err(Error::new(ErrorKind::Corrupt)
            .with_message(format!("byte {lead:#04x} is not an unsigned varint marker"))
            .with_offset(cursor)),
    }
}

/// Decodes a signed varint starting at `cursor`. Non-negative values share
/// the unsigned encoding.
pub fn decode_int(buf: &[u8], cursor: usize) -> Result<(i64, usize), Error> {
    let lead = byte_at(buf, cursor, 1)?;
    match lead & 0xf0 {
        0x10 => {
            let (x, next) = decode_negint(buf, cursor, lead)?;
            Ok((x as i64, next))
        }
        0x20 | 0x30 => {
            let low = byte_at(buf, cursor + 1, 1)?;
            let x = (get_bits(u64::from(lead), 5, 0) << 8) | u64::from(low);
            Ok((x as i64 + NEG_2BYTE_MIN, cursor + 2))
        }
        0x40 | 0x50 | 0x60 | 0x70 => Ok((
            NEG_1BYTE_MIN + get_bits(u64::from(lead), 6, 0) as i64,
            cursor + 1,
        )),
        _ => {
            let (x, next) = decode_uint(buf, cursor)?;
            let x = i64::try_from(x).map_err(|err| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("varint exceeds the signed 64-bit range")
                    .with_offset(cursor)
                    .with_source(err)
            })?;
            Ok((x, next))
        }
    }
}

fn decode_posint(buf: &[u8], cursor: usize, lead: u8) -> Result<(u64, usize), Error> {
    let len = usize::from(lead & 0xf);
    if len > 8 {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message(format!("multi-byte varint declares {len} payload bytes"))
            .with_offset(cursor));
    }
    let payload = payload(buf, cursor, len)?;
    let x = payload
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
    Ok((x, cursor + 1 + len))
}

fn decode_negint(buf: &[u8], cursor: usize, lead: u8) -> Result<(u64, usize), Error> {
    let lz = usize::from(lead & 0xf);
    if lz >= 8 {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message(format!("negative varint drops {lz} leading bytes"))
            .with_offset(cursor));
    }
    let len = 8 - lz;
    let payload = payload(buf, cursor, len)?;
    let x = payload
        .iter()
        .fold(u64::MAX, |acc, byte| (acc << 8) | u64::from(*byte));
    Ok((x, cursor + 1 + len))
}

fn payload(buf: &[u8], cursor: usize, len: usize) -> Result<&[u8], Error> {
    let start = cursor + 1;
    buf.get(start..start + len)
        .ok_or_else(|| Error::truncated(cursor, start + len - buf.len()))
}

fn byte_at(buf: &[u8], offset: usize, needed: usize) -> Result<u8, Error> {
    buf.get(offset)
        .copied()
        .ok_or_else(|| Error::truncated(offset, needed))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UINT_CASES: &[(u64, &[u8])] = &[
        (0, &[0x80]),
        (1, &[0x81]),
        (63, &[0xbf]),
        (64, &[0xc0, 0x00]),
        (65, &[0xc0, 0x01]),
        (8255, &[0xdf, 0xff]),
        (8256, &[0xe1, 0x00]),
        (8257, &[0xe1, 0x01]),
        (8512, &[0xe2, 0x01, 0x00]),
        (
            u64::MAX,
            &[0xe8, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xdf, 0xbf],
        ),
    ];

    const INT_CASES: &[(i64, &[u8])] = &[
        (-1, &[0x7f]),
        (-64, &[0x40]),
        (-65, &[0x3f, 0xff]),
        (-8256, &[0x20, 0x00]),
        (-8257, &[0x16, 0xdf, 0xbf]),
        (
            i64::MIN,
            &[0x10, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        ),
        (
            i64::MAX,
            &[0xe8, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xdf, 0xbf],
        ),
    ];

    fn sample_ints() -> Vec<i64> {
        let mut values = vec![i64::MIN, i64::MIN + 1, i64::MAX, i64::MAX - 1, 0];
        for edge in [
            NEG_2BYTE_MIN,
            NEG_1BYTE_MIN,
            POS_1BYTE_MAX,
            POS_2BYTE_MAX,
            -256,
            -65536,
            1 << 16,
            1 << 32,
            -(1 << 40),
        ] {
            for delta in -3..=3 {
                values.push(edge + delta);
            }
        }
        values
    }

    #[test]
    fn uint_boundaries_encode_exactly() {
        for (value, expected) in UINT_CASES {
            assert_eq!(encode_uint(*value).as_slice(), *expected, "value {value}");
            assert_eq!(decode_uint(expected, 0).expect("decode"), (*value, expected.len()));
        }
    }

    #[test]
    fn int_boundaries_encode_exactly() {
        for (value, expected) in INT_CASES {
            assert_eq!(encode_int(*value).as_slice(), *expected, "value {value}");
            assert_eq!(decode_int(expected, 0).expect("decode"), (*value, expected.len()));
        }
    }

    #[test]
    fn boundary_lengths() {
        assert_eq!(encode_uint(63).len(), 1);
        assert_eq!(encode_uint(64).len(), 2);
        assert_eq!(encode_uint(8256).len(), 2);
        assert_eq!(encode_uint(8257)[0] & 0xf0, POS_MULTI_MARKER);

        assert_eq!(encode_int(-64).len(), 1);
        assert_eq!(encode_int(-65).len(), 2);
        assert_eq!(encode_int(-8256).len(), 2);
        assert_eq!(encode_int(-8257)[0] & 0xf0, NEG_MULTI_MARKER);
    }

    #[test]
    fn sizes_match_encodings() {
        for value in sample_ints() {
            assert_eq!(int_size(value), encode_int(value).len(), "value {value}");
            assert!(int_size(value) <= MAX_ENCODED_LEN, "value {value}");
            let unsigned = value as u64;
            assert_eq!(uint_size(unsigned), encode_uint(unsigned).len(), "value {unsigned}");
            assert!(uint_size(unsigned) <= MAX_ENCODED_LEN, "value {unsigned}");
        }
        assert_eq!(uint_size(u64::MAX), MAX_ENCODED_LEN);
        assert_eq!(int_size(i64::MIN), MAX_ENCODED_LEN);
    }

    #[test]
    fn signed_order_matches_byte_order() {
        let mut values = sample_ints();
        values.sort_unstable();
        values.dedup();
        let encoded = values.iter().map(|v| encode_int(*v)).collect::<Vec<_>>();
        for pair in encoded.windows(2) {
            assert!(pair[0] < pair[1], "{:02x?} !< {:02x?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn unsigned_order_matches_byte_order() {
        let mut values = sample_ints()
            .into_iter()
            .map(|v| v as u64)
            .collect::<Vec<_>>();
        values.sort_unstable();
        values.dedup();
        let encoded = values.iter().map(|v| encode_uint(*v)).collect::<Vec<_>>();
        for pair in encoded.windows(2) {
            assert!(pair[0] < pair[1], "{:02x?} !< {:02x?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn decode_respects_cursor() {
        let mut buf = vec![0xaa];
        pack_int(&mut buf, -70000);
        pack_uint(&mut buf, 9000);
        let (first, next) = decode_int(&buf, 1).expect("first");
        assert_eq!(first, -70000);
        let (second, end) = decode_uint(&buf, next).expect("second");
        assert_eq!(second, 9000);
        assert_eq!(end, buf.len());
    }

    #[test]
    fn truncated_input_is_reported() {
        let cases: &[&[u8]] = &[&[], &[0xc0], &[0x20], &[0xe8, 0x01, 0x02], &[0x10, 0x80]];
        for buf in cases {
            let err = decode_int(buf, 0).expect_err("should fail");
            assert_eq!(err.kind(), ErrorKind::TruncatedInput, "buf {buf:02x?}");
        }
        let err = decode_uint(&[0xe2, 0x01], 0).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
        assert_eq!(err.offset(), Some(0));
    }

    #[test]
    fn malformed_markers_are_corrupt() {
        let err = decode_uint(&[0x40], 0).expect_err("signed marker");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        let err = decode_int(&[0x05], 0).expect_err("reserved marker");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        let err = decode_uint(&[0xe9, 0, 0, 0, 0, 0, 0, 0, 0, 0], 0).expect_err("long");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        let err = decode_uint(&[0xe8, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff], 0)
            .expect_err("overflow");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn signed_decode_rejects_values_above_i64_max() {
        let buf = encode_uint(u64::MAX);
        let err = decode_int(&buf, 0).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }
}
