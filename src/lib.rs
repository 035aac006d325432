//! Purpose: Library crate behind the `wtpack` CLI: order-preserving struct packing.
//! Exports: `api` (stable surface), `core` (codec internals).
//! Role: Turns typed value lists into sortable key/value bytes and back.
//! Invariants: Pure in-memory transforms; no I/O and no shared mutable state.
//! Invariants: Malformed input is reported through `core::error::Error`, never by panicking.
pub mod api;
pub mod core;
