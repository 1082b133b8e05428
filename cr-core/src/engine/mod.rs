//! Device-to-role matching

mod matcher;
mod result;

pub use matcher::MatchEngine;
pub use result::{InvalidOperation, MatchResult, MatchSnapshot, MatchStatus, StartReadiness};
