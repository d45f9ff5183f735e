//! Domain model for baskets, notes and tags.
//!
//! # Responsibility
//! - Define the data structures shared by the XML codecs, the archive
//!   services and the filesystem store.
//!
//! # Invariants
//! - A basket is identified by its folder name.
//! - Notes reference tag states by id only.

pub mod basket;
pub mod note;
pub mod tag;
