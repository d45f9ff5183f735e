//! Repository layer abstractions and filesystem persistence.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for baskets.
//! - Isolate on-disk layout details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`BasketNotFound`) in addition
//!   to I/O and XML errors.

pub mod basket_repo;
pub mod files;
