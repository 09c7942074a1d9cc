//! Domain layer types and invariants.

pub mod delimiters;
pub mod slug;
