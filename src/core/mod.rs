//! Engine wiring, shared types and errors.

pub mod engine;
pub mod error;
pub mod fetcher;
pub mod hash;
pub mod profile;
pub mod time;
pub mod types;
