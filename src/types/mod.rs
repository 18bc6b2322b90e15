//! Canonical snapshot and side-collection types.
//!
//! All types serialize with camelCase keys; optional fields are omitted
//! when absent.

mod artifacts;
mod snapshot;
mod style;

pub use artifacts::*;
pub use snapshot::*;
pub use style::*;
