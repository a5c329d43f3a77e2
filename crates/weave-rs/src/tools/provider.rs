//! Explicit registration tables consumed by
//! [`ToolRegistry::discover`](super::registry::ToolRegistry::discover).

use super::core::ToolRegistration;
use serde::Serialize;

/// A named source of tool registrations.
///
/// The provider name is recorded as each registered descriptor's
/// `framework`. Returning `Err` marks the whole source as failed; discovery
/// logs it and moves on to the next provider.
pub trait ToolProvider: Send + Sync {
    fn name(&self) -> &str;

    fn registrations(&self) -> Result<Vec<ToolRegistration>, String>;
}

/// A provider backed by a plain function.
///
/// ```ignore
/// fn my_tools() -> Result<Vec<ToolRegistration>, String> {
///     Ok(vec![ToolRegistration::of::<MyTool>()])
/// }
///
/// let registry = ToolRegistry::new().with_provider(StaticProvider::new("mine", my_tools));
/// ```
pub struct StaticProvider {
    name: String,
    table: fn() -> Result<Vec<ToolRegistration>, String>,
}

impl StaticProvider {
    pub fn new(
        name: impl Into<String>,
        table: fn() -> Result<Vec<ToolRegistration>, String>,
    ) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }
}

impl ToolProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn registrations(&self) -> Result<Vec<ToolRegistration>, String> {
        (self.table)()
    }
}

/// Outcome of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    /// Ids newly registered or replaced by this pass.
    pub registered: Vec<String>,
    /// Ids skipped because an identical descriptor was already present.
    pub unchanged: Vec<String>,
    /// `(provider, error)` for every provider that failed.
    pub failures: Vec<(String, String)>,
}

impl DiscoveryReport {
    /// Whether the pass changed registry state.
    pub fn changed(&self) -> bool {
        !self.registered.is_empty()
    }
}
