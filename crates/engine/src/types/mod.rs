//! Domain types for the synchronization engine.

pub mod mapping;
pub mod product;

pub use mapping::*;
pub use product::*;
