pub mod analyzer;
pub mod extractor;
pub mod reporter;
pub mod scorer;
