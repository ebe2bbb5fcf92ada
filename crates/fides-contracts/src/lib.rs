//! # fides-contracts
//!
//! Shared types, schemas, and contracts for the fides trust core.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod cache;
pub mod error;
pub mod record;
pub mod workflow;
