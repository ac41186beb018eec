//! In-tree stage client implementations

pub mod passthrough;
