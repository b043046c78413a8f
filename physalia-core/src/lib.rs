//! Shared primitives for the Physalia bioinformatics ecosystem.
//!
//! `physalia-core` provides the foundation that the other Physalia crates
//! build on:
//!
//! - **Error types** — [`PhysaliaError`] and [`Result`] for structured error
//!   handling across all file formats and data models
//! - **Traits** — small shared abstractions like [`Summarizable`]

pub mod error;
pub mod traits;

pub use error::{PhysaliaError, Result};
pub use traits::*;
