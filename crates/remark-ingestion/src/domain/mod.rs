//! # Domain Module
//!
//! Core domain types for remark ingestion.

pub mod entities;
pub mod errors;
pub mod payload;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use payload::*;
pub use value_objects::*;
