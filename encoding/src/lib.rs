//! The byte codec (§4.1): bounds-checked, endian-aware primitive reads and
//! writes over a byte cursor, plus the explicit/implicit-VR element-header
//! codecs built on top of it.

pub mod ae;
pub mod basic;
pub mod element;
pub mod error;

pub use basic::Endianness;
pub use element::{ElementHeader, VrLookup};
pub use error::{Error, Result};
