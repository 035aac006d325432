//! Purpose: Carry a table's key and value descriptors and pack/unpack through them.
//! Exports: `TableFormat`.
//! Role: Bridge between a table creation config (`key_format=S,value_format=Su`) and the codec.
//! Invariants: Both descriptors are validated when the `TableFormat` is built.
//! Invariants: Missing formats default to `u`, matching the storage engine's defaults.
use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::format::{DEFAULT_FORMAT, FormatCursor};
use crate::core::pack;
use crate::core::value::Value;

const KEY_FORMAT: &str = "key_format";
const VALUE_FORMAT: &str = "value_format";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableFormat {
    key_format: String,
    value_format: String,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self {
            key_format: DEFAULT_FORMAT.to_string(),
            value_format: DEFAULT_FORMAT.to_string(),
        }
    }
}

impl TableFormat {
    pub fn new(key_format: &str, value_format: &str) -> Result<Self, Error> {
        Ok(Self {
            key_format: checked_format(KEY_FORMAT, key_format)?,
            value_format: checked_format(VALUE_FORMAT, value_format)?,
        })
    }

    /// Reads `key_format`/`value_format` out of a comma separated config
    /// string. Other keys, including parenthesized lists, are skipped.
    pub fn parse(config: &str) -> Result<Self, Error> {
        let mut key_format = DEFAULT_FORMAT;
        let mut value_format = DEFAULT_FORMAT;
        for (key, value) in config_entries(config)? {
            match key {
                KEY_FORMAT => key_format = value,
                VALUE_FORMAT => value_format = value,
                _ => {}
            }
        }
        let table = Self::new(key_format, value_format)?;
        debug!(
            key_format = %table.key_format,
            value_format = %table.value_format,
            "parsed table config"
        );
        Ok(table)
    }

    pub fn key_format(&self) -> &str {
        &self.key_format
    }

    pub fn value_format(&self) -> &str {
        &self.value_format
    }

    /// Column-store tables are keyed by record number.
    pub fn is_record_keyed(&self) -> bool {
        self.key_format == "r"
    }

    pub fn pack_key(&self, key: &[Value]) -> Result<Vec<u8>, Error> {
        pack::pack(&self.key_format, key)
    }

    pub fn pack_value(&self, value: &[Value]) -> Result<Vec<u8>, Error> {
        pack::pack(&self.value_format, value)
    }

    pub fn unpack_key(&self, buf: &[u8]) -> Result<Vec<Value>, Error> {
        pack::unpack(&self.key_format, buf)
    }

    pub fn unpack_value(&self, buf: &[u8]) -> Result<Vec<Value>, Error> {
        pack::unpack(&self.value_format, buf)
    }
}

fn checked_format(name: &str, format: &str) -> Result<String, Error> {
    let format = if format.is_empty() { DEFAULT_FORMAT } else { format };
    FormatCursor::new(format)
        .and_then(|cursor| cursor.fields())
        .map_err(|err| {
            let message = format!("invalid {name} '{format}'");
            Error::new(ErrorKind::InvalidFormat)
                .with_message(message)
                .with_source(err)
        })?;
    Ok(format.to_string())
}

fn config_entries(config: &str) -> Result<Vec<(&str, &str)>, Error> {
    let mut entries = Vec::new();
    let mut depth: usize = 0;
    let mut in_quotes = false;
    let mut start = 0;

    for (idx, ch) in config.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '(' | '[' if !in_quotes => depth += 1,
            ')' | ']' if !in_quotes => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    Error::new(ErrorKind::InvalidFormat)
                        .with_message(format!("unbalanced '{ch}' in table config"))
                        .with_offset(idx)
                })?;
            }
            ',' if !in_quotes && depth == 0 => {
                push_entry(&mut entries, &config[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if depth != 0 || in_quotes {
        return Err(Error::new(ErrorKind::InvalidFormat)
            .with_message("unterminated group or quote in table config")
            .with_offset(config.len()));
    }
    push_entry(&mut entries, &config[start..]);
    Ok(entries)
}

fn push_entry<'a>(entries: &mut Vec<(&'a str, &'a str)>, raw: &'a str) {
    let raw = raw.trim();
    if raw.is_empty() {
        return;
    }
    match raw.split_once(['=', ':']) {
        Some((key, value)) => entries.push((key.trim(), value.trim().trim_matches('"'))),
        None => entries.push((raw, "true")),
    }
}
