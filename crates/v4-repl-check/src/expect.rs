//! Expect pattern matching module.
//!
//! Pattern types, the output buffer and the matcher that ties them to a
//! deadline.

mod buffer;
mod matcher;
mod pattern;

pub use buffer::{DEFAULT_CAPACITY, OutputBuffer};
pub use matcher::{ExpectState, Matcher};
pub use pattern::{CompiledRegex, Pattern, PatternMatch};
