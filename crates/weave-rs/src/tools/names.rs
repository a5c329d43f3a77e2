//! Canonical ids of the built-in tools.
//!
//! Shorthand expansion tables, providers and tests all reference these
//! constants instead of scattering string literals. Renaming a built-in
//! tool only touches this file.

pub const REASONING_TOOL: &str = "reasoning-tool";
pub const REASONING_MANAGER: &str = "reasoning-manager";
pub const SEARCH_TOOL: &str = "search-tool";
pub const KNOWLEDGE_BASE: &str = "knowledge-base";
pub const TEXT_CHUNKER: &str = "text-chunker";
pub const FILE_INSPECTOR: &str = "file-inspector";
pub const SYSTEM_MONITOR: &str = "system-monitor";
