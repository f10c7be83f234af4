//! Audio source access
//!
//! The broadcast source is a single on-disk audio file read sequentially in
//! fixed-size chunks, wrapping back to the start when exhausted.

pub mod cursor;

pub use cursor::AudioCursor;
