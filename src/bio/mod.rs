//! Biological naming conventions.
//!
//! Groups the pieces that know how reference genomes are named inside a
//! sketch database.

pub mod naming;

pub use naming::{GenbankNaming, NamingError, ReferenceName, ReferenceNaming};
