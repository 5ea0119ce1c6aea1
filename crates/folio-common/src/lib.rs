//! Shared utilities for the Folio layout engine.
//!
//! This crate carries the pieces every other crate needs but none owns:
//! the deduplicated warning channel used for recoverable layout and style
//! conditions, and `data:` URI decoding for inline resource payloads.

pub mod data_uri;
pub mod warning;
