//! # Geo Module
//!
//! Everything that turns hashes into places.
//!
//! ```text
//! convert.rs     — arbitrary-precision base conversion (hex → decimal)
//! coordinate.rs  — Coordinate and the hash + reference → coordinate deriver
//! graticule.rs   — the 3x3 one-degree cells around a reference point
//! ```
//!
//! All of it is synchronous and side-effect free.

pub mod convert;
pub mod coordinate;
pub mod graticule;

pub use convert::{base16_to_base10, convert, ConvertError};
pub use coordinate::{derive, BlockPlace, Coordinate, GeoError};
pub use graticule::{graticule, GraticuleCell};
