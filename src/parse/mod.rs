//! Defensive parsing of semi-structured model output.

pub mod json;
pub mod lazy;
pub mod quoting;

pub use json::{extract_span, parse_as, recover_value};
pub use lazy::compiled;
pub use quoting::{normalize, single_to_double};
