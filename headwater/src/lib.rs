#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]

mod error;
pub mod raw;
pub mod runtime;

pub use error::EvalError;
pub use raw::RawCell;
pub use runtime::{CellSeed, CellValue, Compare, Definition, Readiness, Runtime, Symbol, Tier};
