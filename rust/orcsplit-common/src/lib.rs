//! Core definitions shared by all orcsplit-* crates: the error taxonomy,
//! the `Result` alias and a couple of verification macros.

pub mod error;
pub mod macros;
pub mod result;

pub use result::Result;
