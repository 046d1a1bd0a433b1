//! Pure, deterministic heuristics: domain look-alikes and page structure.

pub mod document;
pub mod structure;
pub mod typosquat;
