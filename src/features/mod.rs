//! Construct-specific extractors
//!
//! Each submodule handles one family of markup constructs, replacing them
//! with placeholder tokens registered in the sanitize context. Extraction
//! order matters and is fixed by the sanitize pipeline, not by the modules
//! themselves.

pub mod bibliography;
pub mod blocks;
pub mod diagrams;
pub mod inline;
pub mod lists;
pub mod math;
pub mod tables;
pub mod verbatim;
