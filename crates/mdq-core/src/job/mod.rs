//! Job model: identifiers, status machine, in-memory record and summaries.

mod apply;
mod types;

pub use types::*;
