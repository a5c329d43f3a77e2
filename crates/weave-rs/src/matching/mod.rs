//! Matching engine: from requirements or free text to an ordered tool chain.
//!
//! - [`matcher`]: [`ToolMatcher`] scores requirements against descriptors
//!   ([`match_tools`](ToolMatcher::match_tools)) and derives requirements
//!   from task text ([`recommend_tools`](ToolMatcher::recommend_tools)).
//! - [`chain`]: [`optimize_chain`] orders a chain by category priority and
//!   pairwise compatibility and removes redundant tools.
//! - [`keywords`]: the fixed keyword, capability-weight, priority and
//!   compatibility tables.
//!
//! Matching never fails: a requirement nothing satisfies is logged and
//! contributes no tool.

pub mod chain;
pub mod keywords;
pub mod matcher;

pub use chain::optimize_chain;
pub use matcher::{MatchScore, RecommendContext, ToolMatcher};
