//! Purpose: Define the stable public Rust API boundary for wtpack.
//! Exports: Pack/unpack entry points, the value model, table formats and errors.
//! Role: Public, additive-only surface for hosts handing bytes to a key/value store.
//! Invariants: This module is the supported path to the codec; `core` may change shape.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::format::{Field, FormatCursor, IntWidth, Tag};
pub use crate::core::intpack::{
    decode_int, decode_uint, encode_int, encode_uint, int_size, uint_size,
};
pub use crate::core::pack::{Unpacker, pack, pack_into, packed_size, unpack, unpack_into};
pub use crate::core::table::TableFormat;
pub use crate::core::value::{Value, ValueKind};
