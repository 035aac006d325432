//! Purpose: Convert CLI JSON arguments and hex text to codec values and back.
//! Exports: `values_from_json`, `values_json`, `fields_json`, `encode_hex`, `decode_hex`.
//! Role: Keep JSON envelope shapes for `pack`/`unpack`/`inspect` in one place.
//! Invariants: JSON arguments are coerced by the descriptor's field tags, not guessed.
//! Invariants: Byte strings render as arrays of numbers; packed buffers as lowercase hex.

use serde_json::{Map, Value as Json, json};
use wtpack::api::{Error, ErrorKind, Field, FormatCursor, Value, ValueKind};

pub(crate) fn values_from_json(format: &str, args: &Json) -> Result<Vec<Value>, Error> {
    let items = args.as_array().ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message("pack arguments must be a JSON array")
            .with_hint("Example: wtpack pack Sq '[\"key\", -1]'")
    })?;

    // (descriptor field index, kind) for the value-bearing fields the arguments reach.
    let mut cursor = FormatCursor::new(format)?;
    let mut slots = Vec::with_capacity(items.len());
    let mut field_idx = 0;
    while slots.len() < items.len() {
        let Some(field) = cursor.advance()? else {
            break;
        };
        if let Some(kind) = ValueKind::for_tag(field.tag) {
            slots.push((field_idx, kind));
        }
        field_idx += 1;
    }

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| match slots.get(idx) {
            Some((field_idx, kind)) => coerce(*kind, item, idx, *field_idx),
            None => natural(item, idx),
        })
        .collect()
}

pub(crate) fn values_json(values: &[Value]) -> Result<Json, Error> {
    serde_json::to_value(values).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to render values as json")
            .with_source(err)
    })
}

pub(crate) fn fields_json(format: &str) -> Result<Json, Error> {
    let fields = FormatCursor::new(format)?.fields()?;
    Ok(Json::Array(fields.iter().map(field_json).collect()))
}

fn field_json(field: &Field) -> Json {
    let mut map = Map::new();
    map.insert("tag".to_string(), json!(field.tag.as_char().to_string()));
    map.insert("size".to_string(), json!(field.size));
    map.insert("has_size".to_string(), json!(field.has_size));
    let kind = match ValueKind::for_tag(field.tag) {
        Some(ValueKind::Int64) => "int",
        Some(ValueKind::Uint64) => "uint",
        Some(ValueKind::Text) => "text",
        Some(ValueKind::Bytes) => "bytes",
        None => "padding",
    };
    map.insert("kind".to_string(), json!(kind));
    Json::Object(map)
}

fn coerce(kind: ValueKind, item: &Json, idx: usize, field_idx: usize) -> Result<Value, Error> {
    let value = match kind {
        ValueKind::Int64 => item.as_i64().map(Value::Int64),
        ValueKind::Uint64 => item.as_u64().map(Value::Uint64),
        ValueKind::Text => item.as_str().map(Value::from),
        ValueKind::Bytes => json_bytes(item).map(Value::Bytes),
    };
    value.ok_or_else(|| {
        Error::new(ErrorKind::TypeMismatch)
            .with_message(format!("argument {idx} must be {}, got {item}", kind.describe()))
            .with_field(field_idx)
    })
}

// Arguments past the last field are ignored by the packer; keep them typed anyway.
fn natural(item: &Json, idx: usize) -> Result<Value, Error> {
    if let Some(number) = item.as_u64() {
        return Ok(Value::Uint64(number));
    }
    if let Some(number) = item.as_i64() {
        return Ok(Value::Int64(number));
    }
    if let Some(text) = item.as_str() {
        return Ok(Value::from(text));
    }
    json_bytes(item).map(Value::Bytes).ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("argument {idx} has no packable type: {item}"))
    })
}

fn json_bytes(item: &Json) -> Option<Vec<u8>> {
    match item {
        Json::String(text) => Some(text.as_bytes().to_vec()),
        Json::Array(items) => items
            .iter()
            .map(|byte| byte.as_u64().and_then(|byte| u8::try_from(byte).ok()))
            .collect(),
        _ => None,
    }
}

pub(crate) fn encode_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(DIGITS[usize::from(byte >> 4)] as char);
        out.push(DIGITS[usize::from(byte & 0xf)] as char);
    }
    out
}

pub(crate) fn decode_hex(input: &str) -> Result<Vec<u8>, Error> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let digits = trimmed
        .bytes()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect::<Vec<_>>();
    if digits.len() % 2 != 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("hex input has an odd number of digits"));
    }
    digits
        .chunks(2)
        .enumerate()
        .map(|(idx, pair)| match (hex_digit(pair[0]), hex_digit(pair[1])) {
            (Some(high), Some(low)) => Ok((high << 4) | low),
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message("hex input contains a non-hex digit")
                .with_offset(idx * 2)),
        })
        .collect()
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
