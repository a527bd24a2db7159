//! # PartLog Core
//!
//! Core types and errors for the PartLog stack.
//!
//! This crate holds everything the storage engine, the destination store and
//! the flush engine need to agree on, without pulling in any runtime or
//! storage dependency.
//!
//! ## Key Types
//!
//! - [`PartLogElement`]: One immutable record describing a part lifecycle transition
//! - [`PartEventType`]: The kind of transition (new part, merge, mutation, ...)
//! - [`LogKind`]: Which structural-event log a record is routed to
//! - [`LogElement`]: Ties a record type to its fixed, versioned table schema
//! - [`TableSchema`]: Column layout of a destination system table

pub mod error;
pub mod event;
pub mod kind;
pub mod schema;

// Re-export main types
pub use error::*;
pub use event::*;
pub use kind::*;
pub use schema::*;
