//! Purpose: Parse packing descriptors (`"xbBq3sSuu"`) into typed fields, one at a time.
//! Exports: `FormatCursor`, `Field`, `Tag`.
//! Role: Forward-only interpreter shared by sizing, packing and unpacking passes.
//! Invariants: The cursor never re-scans unless `reset` is called; clones are independent.
//! Invariants: Malformed descriptors surface as `InvalidFormat` at the offending offset.
//! Invariants: A zero count on an integer tag skips the tag instead of yielding a field.
use std::fmt;

use crate::core::error::{Error, ErrorKind};

/// Descriptor used when the caller supplies an empty one.
pub const DEFAULT_FORMAT: &str = "u";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Tag {
    /// `x`: zero padding, consumes no argument.
    Pad,
    /// `s`: fixed-width string.
    FixedStr,
    /// `S`: NUL-terminated string (fixed-width when sized).
    CStr,
    /// `u`: raw bytes, sized by prefix or by the end of the buffer.
    Raw,
    /// `U`: raw bytes preceded by a varint length.
    SizedRaw,
    /// `t`: bitfield of 1..=8 bits stored in one byte.
    Bits,
    /// `b`: signed byte, sign bit flipped.
    Int8,
    /// `B`: unsigned byte.
    Uint8,
    /// `h`, `i`, `l`, `q`: signed varint.
    Int(IntWidth),
    /// `H`, `I`, `L`, `Q`, `r`: unsigned varint.
    Uint(IntWidth),
    /// `R`: fixed 8-byte record number.
    RecordId,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum IntWidth {
    W16,
    W32,
    W64,
    Recno,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 | IntWidth::Recno => 64,
        }
    }
}

impl Tag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        let tag = match byte {
            b'x' => Tag::Pad,
            b's' => Tag::FixedStr,
            b'S' => Tag::CStr,
            b'u' => Tag::Raw,
            b'U' => Tag::SizedRaw,
            b't' => Tag::Bits,
            b'b' => Tag::Int8,
            b'B' => Tag::Uint8,
            b'h' => Tag::Int(IntWidth::W16),
            b'i' | b'l' => Tag::Int(IntWidth::W32),
            b'q' => Tag::Int(IntWidth::W64),
            b'H' => Tag::Uint(IntWidth::W16),
            b'I' | b'L' => Tag::Uint(IntWidth::W32),
            b'Q' => Tag::Uint(IntWidth::W64),
            b'r' => Tag::Uint(IntWidth::Recno),
            b'R' => Tag::RecordId,
            _ => return None,
        };
        Some(tag)
    }

    /// Canonical descriptor character. `i`/`l` and `I`/`L` share a width
    /// and report as `i`/`I`.
    pub fn as_char(self) -> char {
        match self {
            Tag::Pad => 'x',
            Tag::FixedStr => 's',
            Tag::CStr => 'S',
            Tag::Raw => 'u',
            Tag::SizedRaw => 'U',
            Tag::Bits => 't',
            Tag::Int8 => 'b',
            Tag::Uint8 => 'B',
            Tag::Int(IntWidth::W16) => 'h',
            Tag::Int(IntWidth::W32) => 'i',
            Tag::Int(IntWidth::W64 | IntWidth::Recno) => 'q',
            Tag::Uint(IntWidth::W16) => 'H',
            Tag::Uint(IntWidth::W32) => 'I',
            Tag::Uint(IntWidth::W64) => 'Q',
            Tag::Uint(IntWidth::Recno) => 'r',
            Tag::RecordId => 'R',
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Field {
    pub tag: Tag,
    /// Width for `x`/`s`/`t` and sized `S`/`u`; 1 for repeated scalar tags.
    pub size: usize,
    pub has_size: bool,
}

impl Field {
    pub fn consumes_value(&self) -> bool {
        self.tag != Tag::Pad
    }
}

#[derive(Clone, Debug)]
pub struct FormatCursor<'a> {
    fmt: &'a [u8],
    start: usize,
    pos: usize,
    repeats: usize,
    last: Option<Field>,
}

impl<'a> FormatCursor<'a> {
    pub fn new(fmt: &'a str) -> Result<Self, Error> {
        let fmt = if fmt.is_empty() { DEFAULT_FORMAT } else { fmt };
        let bytes = fmt.as_bytes();
        let start = match bytes[0] {
            b'@' | b'<' | b'>' => {
                return Err(Error::new(ErrorKind::InvalidFormat)
                    .with_message(format!(
                        "byte-order prefix '{}' is not supported",
                        bytes[0] as char
                    ))
                    .with_offset(0)
                    .with_hint("Packed fields are always big-endian; drop the prefix."));
            }
            b'.' => 1,
            _ => 0,
        };
        if start == bytes.len() {
            return Err(Error::new(ErrorKind::InvalidFormat)
                .with_message("descriptor has no fields")
                .with_offset(start));
        }
        Ok(Self {
            fmt: bytes,
            start,
            pos: start,
            repeats: 0,
            last: None,
        })
    }

    /// Rewinds to the first field; the pending repeat count is discarded.
    pub fn reset(&mut self) {
        self.pos = self.start;
        self.repeats = 0;
        self.last = None;
    }

    /// Yields the next field, or `None` once the descriptor is exhausted.
    pub fn advance(&mut self) -> Result<Option<Field>, Error> {
        if self.repeats > 0 {
            if let Some(field) = self.last {
                self.repeats -= 1;
                return Ok(Some(field));
            }
        }

        loop {
            if self.pos == self.fmt.len() {
                return Ok(None);
            }

            let prefix_at = self.pos;
            let (size, has_size) = if self.fmt[self.pos].is_ascii_digit() {
                (self.parse_count()?, true)
            } else {
                (1, false)
            };
            if self.pos == self.fmt.len() {
                return Err(Error::new(ErrorKind::InvalidFormat)
                    .with_message("count is not followed by a type tag")
                    .with_offset(prefix_at));
            }

            let byte = self.fmt[self.pos];
            let tag = Tag::from_byte(byte).ok_or_else(|| {
                Error::new(ErrorKind::InvalidFormat)
                    .with_message(format!("unknown type tag '{}'", byte.escape_ascii()))
                    .with_offset(self.pos)
            })?;

            let field = match tag {
                Tag::Pad | Tag::CStr => Field { tag, size, has_size },
                Tag::FixedStr => {
                    if size < 1 {
                        return Err(self.invalid_size("fixed-length strings need at least 1 byte"));
                    }
                    Field { tag, size, has_size }
                }
                Tag::Bits => {
                    if !(1..=8).contains(&size) {
                        return Err(self.invalid_size("bitfield sizes must be between 1 and 8"));
                    }
                    Field { tag, size, has_size }
                }
                Tag::Raw | Tag::SizedRaw => {
                    let is_last = self.pos == self.fmt.len() - 1;
                    let tag = if !has_size && !is_last {
                        Tag::SizedRaw
                    } else {
                        Tag::Raw
                    };
                    Field { tag, size, has_size }
                }
                Tag::Int8 | Tag::Uint8 | Tag::Int(_) | Tag::Uint(_) | Tag::RecordId => {
                    if size == 0 {
                        self.pos += 1;
                        continue;
                    }
                    self.repeats = size - 1;
                    Field {
                        tag,
                        size: 1,
                        has_size: false,
                    }
                }
            };

            self.pos += 1;
            self.last = Some(field);
            return Ok(Some(field));
        }
    }

    /// Walks a fresh copy of the cursor to the end, collecting every field.
    pub fn fields(&self) -> Result<Vec<Field>, Error> {
        let mut cursor = self.clone();
        cursor.reset();
        let mut fields = Vec::new();
        while let Some(field) = cursor.advance()? {
            fields.push(field);
        }
        Ok(fields)
    }

    fn parse_count(&mut self) -> Result<usize, Error> {
        let begin = self.pos;
        let mut count: usize = 0;
        while self.pos < self.fmt.len() && self.fmt[self.pos].is_ascii_digit() {
            let digit = usize::from(self.fmt[self.pos] - b'0');
            count = count
                .checked_mul(10)
                .and_then(|count| count.checked_add(digit))
                .ok_or_else(|| {
                    Error::new(ErrorKind::InvalidFormat)
                        .with_message("count prefix overflows")
                        .with_offset(begin)
                })?;
            self.pos += 1;
        }
        Ok(count)
    }

    fn invalid_size(&self, message: &str) -> Error {
        Error::new(ErrorKind::InvalidFormat)
            .with_message(message.to_string())
            .with_offset(self.pos)
    }
}
