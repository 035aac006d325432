//! Purpose: Pack value lists into one contiguous buffer and unpack buffers back into values.
//! Exports: `pack`, `pack_into`, `packed_size`, `unpack`, `unpack_into`, `Unpacker`.
//! Role: Top of the codec; walks a `FormatCursor` in lock-step with the caller's values.
//! Invariants: Pack sizes the output first, then emits into a single reservation.
//! Invariants: A failed pack leaves no partial bytes behind.
//! Invariants: Values beyond the descriptor's fields are ignored; missing values are an error.
//! Invariants: Unpack is bounds-checked everywhere; short buffers are `TruncatedInput`.
use tracing::{debug, trace};

use crate::core::error::{Error, ErrorKind};
use crate::core::format::{Field, FormatCursor, Tag};
use crate::core::intpack;
use crate::core::value::{Value, ValueKind};

/// Upper bound on a single packed buffer.
pub const MAX_PACKED_LEN: usize = 256 * 1024 * 1024;

pub fn packed_size(fmt: &str, args: &[Value]) -> Result<usize, Error> {
    let cursor = FormatCursor::new(fmt)?;
    size_pass(cursor, args)
}

pub fn pack(fmt: &str, args: &[Value]) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    pack_into(fmt, args, &mut buf)?;
    Ok(buf)
}

/// Packs into `buf`, replacing its contents. Reusing one buffer across calls
/// avoids an allocation per call once its capacity has grown.
pub fn pack_into(fmt: &str, args: &[Value], buf: &mut Vec<u8>) -> Result<(), Error> {
    buf.clear();
    let cursor = FormatCursor::new(fmt)?;
    let total = size_pass(cursor.clone(), args)?;
    if total == 0 {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message("packed result would be empty"));
    }
    trace!(format = fmt, total, values = args.len(), "sized packed buffer");

    buf.reserve_exact(total);
    if let Err(err) = emit_pass(cursor, args, buf) {
        buf.clear();
        return Err(err);
    }
    debug_assert_eq!(buf.len(), total);
    Ok(())
}

fn size_pass(mut cursor: FormatCursor<'_>, args: &[Value]) -> Result<usize, Error> {
    let mut total: usize = 0;
    let mut arg_idx = 0;
    let mut field_idx = 0;

    while let Some(field) = cursor.advance()? {
        let size = if field.consumes_value() {
            let value = args.get(arg_idx).ok_or_else(|| {
                Error::new(ErrorKind::ArgumentCountMismatch)
                    .with_message(format!(
                        "descriptor needs more than {} value(s)",
                        args.len()
                    ))
                    .with_field(field_idx)
            })?;
            arg_idx += 1;
            field_size(&field, value).map_err(|err| err.with_field(field_idx))?
        } else {
            field.size
        };

        total = total
            .checked_add(size)
            .filter(|total| *total <= MAX_PACKED_LEN)
            .ok_or_else(|| {
                Error::new(ErrorKind::InvalidArgument)
                    .with_message(format!("packed size exceeds {MAX_PACKED_LEN} bytes"))
                    .with_field(field_idx)
            })?;
        field_idx += 1;
    }

    if arg_idx < args.len() {
        debug!(
            ignored = args.len() - arg_idx,
            "descriptor exhausted before values; ignoring the rest"
        );
    }
    Ok(total)
}

fn emit_pass(mut cursor: FormatCursor<'_>, args: &[Value], buf: &mut Vec<u8>) -> Result<(), Error> {
    let mut values = args.iter();
    let mut field_idx = 0;
    while let Some(field) = cursor.advance()? {
        trace!(field = field_idx, tag = %field.tag, offset = buf.len(), "packing field");
        field_idx += 1;
        if !field.consumes_value() {
            buf.resize(buf.len() + field.size, 0);
            continue;
        }
        let value = values.next().ok_or_else(|| {
            Error::new(ErrorKind::Internal).with_message("value list shrank between passes")
        })?;
        emit_field(&field, value, buf)?;
    }
    Ok(())
}

fn field_size(field: &Field, value: &Value) -> Result<usize, Error> {
    let size = match field.tag {
        Tag::Pad => field.size,
        Tag::FixedStr => {
            expect_text(field, value)?;
            field.size
        }
        Tag::CStr => {
            let text = expect_text(field, value)?.as_bytes();
            if field.has_size {
                field.size
            } else {
                match text.iter().position(|byte| *byte == 0) {
                    Some(nul) => nul + 1,
                    None => text.len() + 1,
                }
            }
        }
        Tag::Raw | Tag::SizedRaw => {
            let bytes = expect_bytes(field, value)?;
            let (len, pad) = raw_extent(field, bytes.len());
            if field.tag == Tag::SizedRaw {
                intpack::uint_size((len + pad) as u64) + len + pad
            } else {
                len + pad
            }
        }
        Tag::Int8 => {
            expect_int(field, value, 8)?;
            1
        }
        Tag::Uint8 => {
            expect_uint(field, value, 8)?;
            1
        }
        Tag::Bits => {
            expect_uint(field, value, field.size as u32)?;
            1
        }
        Tag::Int(width) => intpack::int_size(expect_int(field, value, width.bits())?),
        Tag::Uint(width) => intpack::uint_size(expect_uint(field, value, width.bits())?),
        Tag::RecordId => {
            expect_uint(field, value, 64)?;
            8
        }
    };
    Ok(size)
}

fn emit_field(field: &Field, value: &Value, buf: &mut Vec<u8>) -> Result<(), Error> {
    match field.tag {
        Tag::Pad => buf.resize(buf.len() + field.size, 0),
        Tag::FixedStr => put_fixed(buf, expect_text(field, value)?, field.size),
        Tag::CStr => {
            let text = expect_text(field, value)?;
            if field.has_size {
                put_fixed(buf, text, field.size);
            } else {
                let text = text.as_bytes();
                match text.iter().position(|byte| *byte == 0) {
                    Some(nul) => buf.extend_from_slice(&text[..=nul]),
                    None => {
                        buf.extend_from_slice(text);
                        buf.push(0);
                    }
                }
            }
        }
        Tag::Raw | Tag::SizedRaw => {
            let bytes = expect_bytes(field, value)?;
            let (len, pad) = raw_extent(field, bytes.len());
            if field.tag == Tag::SizedRaw {
                intpack::pack_uint(buf, (len + pad) as u64);
            }
            buf.extend_from_slice(&bytes[..len]);
            buf.resize(buf.len() + pad, 0);
        }
        Tag::Int8 => {
            let value = expect_int(field, value, 8)?;
            buf.push((value as i8 as u8) ^ 0x80);
        }
        Tag::Uint8 => buf.push(expect_uint(field, value, 8)? as u8),
        Tag::Bits => buf.push(expect_uint(field, value, field.size as u32)? as u8),
        Tag::Int(width) => intpack::pack_int(buf, expect_int(field, value, width.bits())?),
        Tag::Uint(width) => intpack::pack_uint(buf, expect_uint(field, value, width.bits())?),
        Tag::RecordId => buf.extend_from_slice(&expect_uint(field, value, 64)?.to_be_bytes()),
    }
    Ok(())
}

/// Bytes copied from the value and zero bytes appended after them.
fn raw_extent(field: &Field, len: usize) -> (usize, usize) {
    if !field.has_size {
        (len, 0)
    } else if field.size < len {
        (field.size, 0)
    } else {
        (len, field.size - len)
    }
}

// Truncation never splits a code point; the cut-off tail is zero filled.
fn put_fixed(buf: &mut Vec<u8>, text: &str, width: usize) {
    let mut copied = text.len().min(width);
    while !text.is_char_boundary(copied) {
        copied -= 1;
    }
    buf.extend_from_slice(&text.as_bytes()[..copied]);
    buf.resize(buf.len() + width - copied, 0);
}

fn type_mismatch(field: &Field, value: &Value) -> Error {
    let expected = ValueKind::for_tag(field.tag)
        .map(ValueKind::describe)
        .unwrap_or("no value");
    Error::new(ErrorKind::TypeMismatch).with_message(format!(
        "tag '{}' expects {expected}, got {}",
        field.tag,
        value.kind().describe()
    ))
}

fn expect_text<'v>(field: &Field, value: &'v Value) -> Result<&'v str, Error> {
    value.as_str().ok_or_else(|| type_mismatch(field, value))
}

fn expect_bytes<'v>(field: &Field, value: &'v Value) -> Result<&'v [u8], Error> {
    value.as_bytes().ok_or_else(|| type_mismatch(field, value))
}

fn expect_int(field: &Field, value: &Value, bits: u32) -> Result<i64, Error> {
    let number = value.as_i64().ok_or_else(|| type_mismatch(field, value))?;
    if bits < 64 {
        let max = (1i64 << (bits - 1)) - 1;
        let min = -max - 1;
        if number < min || number > max {
            return Err(Error::new(ErrorKind::TypeMismatch).with_message(format!(
                "value {number} does not fit tag '{}' ({bits}-bit signed)",
                field.tag
            )));
        }
    }
    Ok(number)
}

fn expect_uint(field: &Field, value: &Value, bits: u32) -> Result<u64, Error> {
    let number = value.as_u64().ok_or_else(|| type_mismatch(field, value))?;
    if bits < 64 && number > (1u64 << bits) - 1 {
        return Err(Error::new(ErrorKind::TypeMismatch).with_message(format!(
            "value {number} does not fit tag '{}' ({bits}-bit unsigned)",
            field.tag
        )));
    }
    Ok(number)
}

/// Decodes values one field at a time. Padding is skipped and never yielded.
#[derive(Debug)]
pub struct Unpacker<'f, 'b> {
    cursor: FormatCursor<'f>,
    buf: &'b [u8],
    pos: usize,
    field_idx: usize,
    done: bool,
}

impl<'f, 'b> Unpacker<'f, 'b> {
    pub fn new(fmt: &'f str, buf: &'b [u8]) -> Result<Self, Error> {
        if buf.is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument)
                .with_message("cannot unpack an empty buffer"));
        }
        Ok(Self {
            cursor: FormatCursor::new(fmt)?,
            buf,
            pos: 0,
            field_idx: 0,
            done: false,
        })
    }

    /// Read offset into the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Advances to the next value-bearing field, consuming any padding on the way.
    pub fn next_field(&mut self) -> Result<Option<Field>, Error> {
        while let Some(field) = self.cursor.advance()? {
            if field.consumes_value() {
                return Ok(Some(field));
            }
            let idx = self.field_idx;
            self.take(field.size).map_err(|err| err.with_field(idx))?;
            self.field_idx += 1;
        }
        if self.pos < self.buf.len() {
            trace!(trailing = self.buf.len() - self.pos, "ignoring bytes after last field");
        }
        Ok(None)
    }

    /// Decodes `field` at the current offset.
    pub fn read_value(&mut self, field: &Field) -> Result<Value, Error> {
        let idx = self.field_idx;
        let offset = self.pos;
        self.field_idx += 1;
        match self.decode(field) {
            Ok(value) => {
                trace!(field = idx, tag = %field.tag, offset, "decoded field");
                Ok(value)
            }
            Err(err) => {
                let err = err.with_field(idx);
                debug!(error = %err, "unpack failed");
                Err(err)
            }
        }
    }

    pub fn next_value(&mut self) -> Result<Option<Value>, Error> {
        match self.next_field()? {
            Some(field) => self.read_value(&field).map(Some),
            None => Ok(None),
        }
    }

    fn decode(&mut self, field: &Field) -> Result<Value, Error> {
        let value = match field.tag {
            Tag::Pad => {
                return Err(Error::new(ErrorKind::Internal).with_message("padding has no value"));
            }
            Tag::FixedStr => Value::Text(self.text_until_nul(field.size)?),
            Tag::CStr if field.has_size => Value::Text(self.text_until_nul(field.size)?),
            Tag::CStr => {
                let start = self.pos;
                let rest = &self.buf[start..];
                let nul = rest.iter().position(|byte| *byte == 0).ok_or_else(|| {
                    Error::new(ErrorKind::TruncatedInput)
                        .with_message("string is missing its NUL terminator")
                        .with_offset(start)
                })?;
                let text = to_text(&rest[..nul], start)?;
                self.pos = start + nul + 1;
                Value::Text(text)
            }
            Tag::Raw if field.has_size => Value::Bytes(self.take(field.size)?.to_vec()),
            Tag::Raw => Value::Bytes(self.take(self.buf.len() - self.pos)?.to_vec()),
            Tag::SizedRaw => {
                let (len, next) = intpack::decode_uint(self.buf, self.pos)?;
                let len = usize::try_from(len).map_err(|err| {
                    Error::new(ErrorKind::Corrupt)
                        .with_message("byte string length overflows usize")
                        .with_offset(self.pos)
                        .with_source(err)
                })?;
                self.pos = next;
                Value::Bytes(self.take(len)?.to_vec())
            }
            Tag::Int8 => {
                let byte = self.take(1)?[0];
                Value::Int64(i64::from((byte ^ 0x80) as i8))
            }
            Tag::Uint8 | Tag::Bits => Value::Uint64(u64::from(self.take(1)?[0])),
            Tag::Int(_) => {
                let (number, next) = intpack::decode_int(self.buf, self.pos)?;
                self.pos = next;
                Value::Int64(number)
            }
            Tag::Uint(_) => {
                let (number, next) = intpack::decode_uint(self.buf, self.pos)?;
                self.pos = next;
                Value::Uint64(number)
            }
            Tag::RecordId => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(self.take(8)?);
                Value::Uint64(u64::from_be_bytes(raw))
            }
        };
        Ok(value)
    }

    fn take(&mut self, len: usize) -> Result<&'b [u8], Error> {
        let buf = self.buf;
        let start = self.pos;
        let bytes = start
            .checked_add(len)
            .and_then(|end| buf.get(start..end))
            .ok_or_else(|| Error::truncated(start, len - (buf.len() - start)))?;
        self.pos = start + len;
        Ok(bytes)
    }

    // Fixed-width strings are zero padded; the value ends at the first NUL.
    fn text_until_nul(&mut self, width: usize) -> Result<String, Error> {
        let start = self.pos;
        let raw = self.take(width)?;
        let end = raw.iter().position(|byte| *byte == 0).unwrap_or(raw.len());
        to_text(&raw[..end], start)
    }
}

impl Iterator for Unpacker<'_, '_> {
    type Item = Result<Value, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_value() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

fn to_text(raw: &[u8], offset: usize) -> Result<String, Error> {
    String::from_utf8(raw.to_vec()).map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message("string field is not valid UTF-8")
            .with_offset(offset)
            .with_source(err)
    })
}

pub fn unpack(fmt: &str, buf: &[u8]) -> Result<Vec<Value>, Error> {
    Unpacker::new(fmt, buf)?.collect()
}

/// Unpacks into caller-provided slots. Each slot's variant is the type it
/// accepts; slots past the descriptor's fields are left untouched. Returns
/// the number of slots written.
pub fn unpack_into(fmt: &str, buf: &[u8], slots: &mut [Value]) -> Result<usize, Error> {
    let mut unpacker = Unpacker::new(fmt, buf)?;
    let mut filled = 0;
    while let Some(field) = unpacker.next_field()? {
        let slot = slots.get_mut(filled).ok_or_else(|| {
            Error::new(ErrorKind::ArgumentCountMismatch)
                .with_message(format!("descriptor needs more than {filled} slot(s)"))
                .with_offset(unpacker.position())
        })?;
        if ValueKind::for_tag(field.tag) != Some(slot.kind()) {
            return Err(type_mismatch(&field, slot)
                .with_field(filled)
                .with_offset(unpacker.position()));
        }
        *slot = unpacker.read_value(&field)?;
        filled += 1;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    use super::{MAX_PACKED_LEN, Unpacker, pack, pack_into, packed_size, unpack, unpack_into};
    use crate::core::error::ErrorKind;
    use crate::core::value::{Value, ValueKind};

    #[derive(Default)]
    struct LevelCounts {
        trace: AtomicUsize,
        debug: AtomicUsize,
    }

    struct CountingLayer {
        counts: Arc<LevelCounts>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CountingLayer {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            match *event.metadata().level() {
                Level::TRACE => self.counts.trace.fetch_add(1, Ordering::SeqCst),
                Level::DEBUG => self.counts.debug.fetch_add(1, Ordering::SeqCst),
                _ => 0,
            };
        }
    }

    fn with_counting_subscriber<F, R>(f: F) -> (R, Arc<LevelCounts>)
    where
        F: FnOnce() -> R,
    {
        let counts = Arc::new(LevelCounts::default());
        let layer = CountingLayer {
            counts: counts.clone(),
        };
        let subscriber = tracing_subscriber::registry().with(layer);
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, counts)
    }

    fn general_args() -> Vec<Value> {
        vec![
            Value::from(-2i8),
            Value::from(2u8),
            Value::from(i64::MIN),
            Value::from("ABC"),
            Value::from("Hello\0World"),
            Value::from([1u8, 2, 3]),
            Value::from([4u8, 5, 6, 7]),
        ]
    }

    #[test]
    fn general_descriptor_packs_expected_bytes() {
        let buf = pack("xbBq3sSuu", &general_args()).expect("pack");
        let parts: [&[u8]; 8] = [
            &[0x00],
            &[0x7e],
            &[0x02],
            &[0x10, 0x80, 0, 0, 0, 0, 0, 0, 0],
            b"ABC",
            b"Hello\0",
            &[0x83, 1, 2, 3],
            &[4, 5, 6, 7],
        ];
        assert_eq!(buf, parts.concat());
    }

    #[test]
    fn general_descriptor_round_trips() {
        let args = general_args();
        let buf = pack("xbBq3sSuu", &args).expect("pack");
        let values = unpack("xbBq3sSuu", &buf).expect("unpack");
        assert_eq!(values.len(), 7);
        assert_eq!(values[..4], args[..4]);
        assert_eq!(values[4], Value::from("Hello"));
        assert_eq!(values[5..], args[5..]);
    }

    #[test]
    fn min_signed_round_trips() {
        let buf = pack("q", &[Value::from(i64::MIN)]).expect("pack");
        assert_eq!(unpack("q", &buf).expect("unpack"), vec![Value::from(i64::MIN)]);
    }

    #[test]
    fn packed_size_matches_pack() {
        let args = general_args();
        let size = packed_size("xbBq3sSuu", &args).expect("size");
        assert_eq!(size, pack("xbBq3sSuu", &args).expect("pack").len());
    }

    #[test]
    fn fixed_strings_truncate_and_pad() {
        let buf = pack("3s", &[Value::from("ABCD")]).expect("pack");
        assert_eq!(buf, b"ABC");
        let buf = pack("5s", &[Value::from("AB")]).expect("pack");
        assert_eq!(buf, b"AB\0\0\0");
        assert_eq!(unpack("5s", &buf).expect("unpack"), vec![Value::from("AB")]);
        let buf = pack("4S", &[Value::from("xyz")]).expect("pack");
        assert_eq!(buf, b"xyz\0");
    }

    #[test]
    fn fields_are_traced_and_decode_failures_logged() {
        let (packed, counts) = with_counting_subscriber(|| {
            pack("xqS", &[Value::from(1i64), Value::from("a")]).expect("pack")
        });
        // one size-pass total plus one event per field
        assert_eq!(counts.trace.load(Ordering::SeqCst), 4);

        let (values, counts) =
            with_counting_subscriber(|| unpack("xqS", &packed).expect("unpack"));
        assert_eq!(values, vec![Value::from(1i64), Value::from("a")]);
        assert_eq!(counts.trace.load(Ordering::SeqCst), 2);
        assert_eq!(counts.debug.load(Ordering::SeqCst), 0);

        let (err, counts) = with_counting_subscriber(|| {
            unpack("xqS", &packed[..packed.len() - 1]).expect_err("missing NUL")
        });
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
        assert_eq!(err.field(), Some(2));
        assert_eq!(counts.debug.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fixed_strings_truncate_on_char_boundaries() {
        let buf = pack("1s", &[Value::from("é")]).expect("pack");
        assert_eq!(buf, [0]);
        assert_eq!(unpack("1s", &buf).expect("unpack"), vec![Value::from("")]);

        let buf = pack("4S", &[Value::from("aé€")]).expect("pack");
        assert_eq!(buf, [b'a', 0xc3, 0xa9, 0]);
        assert_eq!(unpack("4S", &buf).expect("unpack"), vec![Value::from("aé")]);
    }

    #[test]
    fn sized_raw_bytes_truncate_and_pad() {
        let buf = pack("2uQ", &[Value::from([9u8, 8, 7]), Value::from(1u64)]).expect("pack");
        assert_eq!(buf, [9, 8, 0x81]);
        let buf = pack("4u", &[Value::from([1u8])]).expect("pack");
        assert_eq!(buf, [1, 0, 0, 0]);
        assert_eq!(
            unpack("4u", &buf).expect("unpack"),
            vec![Value::from([1u8, 0, 0, 0])]
        );
    }

    #[test]
    fn repeated_integers_consume_one_value_each() {
        let args = [Value::from(-1i32), Value::from(0i32), Value::from(70000i32)];
        let buf = pack("3i", &args).expect("pack");
        assert_eq!(unpack("3i", &buf).expect("unpack"), args.to_vec());
    }

    #[test]
    fn record_ids_are_fixed_width_big_endian() {
        let buf = pack("R", &[Value::from(0x0102u64)]).expect("pack");
        assert_eq!(buf, [0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(unpack("R", &buf).expect("unpack"), vec![Value::from(0x0102u64)]);
    }

    #[test]
    fn bitfields_store_one_byte() {
        let buf = pack("3tB", &[Value::from(5u8), Value::from(200u8)]).expect("pack");
        assert_eq!(buf, [5, 200]);
        let err = pack("3t", &[Value::from(8u8)]).expect_err("too wide");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn signed_bytes_sort_with_sign() {
        let low = pack("b", &[Value::from(-1i8)]).expect("pack");
        let high = pack("b", &[Value::from(1i8)]).expect("pack");
        assert!(low < high);
        assert_eq!(unpack("b", &low).expect("unpack"), vec![Value::from(-1i8)]);
    }

    #[test]
    fn type_mismatch_is_reported_with_field_index() {
        let err = pack("Sq", &[Value::from("k"), Value::from(1u64)]).expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.field(), Some(1));
        let err = pack("u", &[Value::from("text")]).expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn declared_width_is_enforced() {
        let err = pack("h", &[Value::from(40000i64)]).expect_err("too wide");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        let err = pack("B", &[Value::from(256u64)]).expect_err("too wide");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        pack("I", &[Value::from(u64::from(u32::MAX))]).expect("fits");
    }

    #[test]
    fn missing_values_fail_but_extra_values_are_ignored() {
        let err = pack("qq", &[Value::from(1i64)]).expect_err("too few");
        assert_eq!(err.kind(), ErrorKind::ArgumentCountMismatch);
        assert_eq!(err.field(), Some(1));
        let buf = pack("q", &[Value::from(1i64), Value::from("extra")]).expect("pack");
        assert_eq!(buf, [0x81]);
    }

    #[test]
    fn padding_consumes_no_value() {
        let buf = pack("2xQ", &[Value::from(3u64)]).expect("pack");
        assert_eq!(buf, [0, 0, 0x83]);
        assert_eq!(unpack("2xQ", &buf).expect("unpack"), vec![Value::from(3u64)]);
    }

    #[test]
    fn empty_result_is_rejected() {
        let err = pack("u", &[Value::from(Vec::new())]).expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = pack("0q", &[]).expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn oversized_padding_is_rejected() {
        let fmt = format!("{}x", MAX_PACKED_LEN + 1);
        let err = pack(&fmt, &[]).expect_err("too large");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn pack_into_reuses_and_clears_buffer() {
        let mut buf = vec![0xff; 32];
        pack_into("Q", &[Value::from(1u64)], &mut buf).expect("pack");
        assert_eq!(buf, [0x81]);
        let capacity = buf.capacity();
        pack_into("Q", &[Value::from(2u64)], &mut buf).expect("pack");
        assert_eq!(buf, [0x82]);
        assert_eq!(buf.capacity(), capacity);

        pack_into("q", &[Value::from("bad")], &mut buf).expect_err("mismatch");
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_buffer_is_invalid_argument() {
        let err = unpack("q", &[]).expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn truncated_buffers_fail_cleanly() {
        let buf = pack("qS", &[Value::from(-100000i64), Value::from("abc")]).expect("pack");
        for cut in 1..buf.len() {
            let err = unpack("qS", &buf[..cut]).expect_err("truncated");
            assert_eq!(err.kind(), ErrorKind::TruncatedInput, "cut {cut}");
        }
        let err = unpack("xq", &[0]).expect_err("truncated");
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
        assert_eq!(err.field(), Some(1));
    }

    #[test]
    fn sized_raw_length_beyond_buffer_is_truncated() {
        let err = unpack("UQ", &[0x85, 1, 2]).expect_err("truncated");
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
        assert_eq!(err.field(), Some(0));
    }

    #[test]
    fn invalid_utf8_is_corrupt() {
        let err = unpack("2s", &[0xff, 0xfe]).expect_err("utf8");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn trailing_raw_bytes_may_be_empty() {
        let values = unpack("Su", b"k\0").expect("unpack");
        assert_eq!(values, vec![Value::from("k"), Value::from(Vec::new())]);
    }

    #[test]
    fn unpack_into_checks_slot_types_and_count() {
        let buf = pack("Sq", &[Value::from("key"), Value::from(-5i64)]).expect("pack");

        let mut slots = [Value::empty(ValueKind::Text), Value::empty(ValueKind::Int64)];
        assert_eq!(unpack_into("Sq", &buf, &mut slots).expect("unpack"), 2);
        assert_eq!(slots, [Value::from("key"), Value::from(-5i64)]);

        let mut wrong = [Value::empty(ValueKind::Text), Value::empty(ValueKind::Uint64)];
        let err = unpack_into("Sq", &buf, &mut wrong).expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.field(), Some(1));

        let mut short = [Value::empty(ValueKind::Text)];
        let err = unpack_into("Sq", &buf, &mut short).expect_err("count");
        assert_eq!(err.kind(), ErrorKind::ArgumentCountMismatch);
    }

    #[test]
    fn unpacker_stops_after_error() {
        let mut unpacker = Unpacker::new("qq", &[0x81]).expect("start");
        assert_eq!(unpacker.next().expect("first").expect("ok"), Value::from(1i64));
        assert!(unpacker.next().expect("second").is_err());
        assert!(unpacker.next().is_none());
    }
}
