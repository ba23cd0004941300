//! Shared types for the Periscan automation service.

mod outcome;

pub use outcome::*;
