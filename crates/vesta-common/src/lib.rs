//! Common types shared across the Vesta checker crates.
//!
//! - `interner` - global string interning (`Atom`)
//! - `pos` - source positions and spans
//! - `diagnostics` - diagnostic codes, messages, and the append-only sink

pub mod diagnostics;
pub mod interner;
pub mod pos;

pub use interner::Atom;
pub use pos::Pos;
