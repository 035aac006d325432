// Core modules implementing the varint codec, descriptor interpreter, and pack engine.
pub mod error;
pub mod format;
pub mod intpack;
pub mod pack;
pub mod table;
pub mod value;
