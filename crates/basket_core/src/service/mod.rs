//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep the CLI decoupled from storage and archive details.
//!
//! # See also
//! - `crate::repo` for persistence contracts.
//! - `crate::context` for the tag registry and background cache.

pub mod archive_service;
pub mod tag_service;
pub mod tree_service;
