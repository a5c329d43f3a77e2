//! The capability registry: descriptors, factories and cached instances.
//!
//! [`ToolRegistry`] is process-lifetime state shared (usually behind an
//! `Arc`) by every request. Descriptor reads take a shared lock; instance
//! construction goes through the per-fingerprint
//! [`InstanceCache`](super::instance::InstanceCache), so requests for
//! different tools never wait on each other.

use super::builtin;
use super::core::{ToolFactory, ToolRegistration, validate_config};
use super::descriptor::{ToolCategory, ToolDescriptor};
use super::instance::{Fingerprint, InstanceCache, ToolInstance};
use super::provider::{DiscoveryReport, ToolProvider};
use crate::error::RegistryError;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Search score for a query found in the tool name or id.
pub const NAME_WEIGHT: u32 = 10;
/// Search score for a query found in the description.
pub const DESCRIPTION_WEIGHT: u32 = 5;
/// Search score per capability tag containing the query.
pub const CAPABILITY_WEIGHT: u32 = 3;

struct Entry {
    descriptor: ToolDescriptor,
    factory: ToolFactory,
}

#[derive(Default)]
struct RegistryState {
    /// Ids in first-registration order. Every listing follows it.
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

enum InsertOutcome {
    Added,
    Replaced,
    Unchanged,
}

/// Aggregate counts for administrative display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total_tools: usize,
    pub enabled_tools: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_framework: BTreeMap<String, usize>,
    pub cached_instances: usize,
    /// Sum of `usage_count` over cached instances.
    pub total_instance_uses: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Registry of tool descriptors and their factories.
///
/// # Example
///
/// ```ignore
/// let registry = ToolRegistry::builtin();
/// let search = registry.create_instance("search-tool", Some(&json!({"max_results": 3})))?;
/// let output = search.execute(json!({"query": "rust"})).await?;
/// ```
pub struct ToolRegistry {
    providers: Vec<Box<dyn ToolProvider>>,
    state: RwLock<RegistryState>,
    instances: InstanceCache,
    discovered: OnceLock<DiscoveryReport>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("ToolRegistry")
            .field("providers", &providers)
            .field("tools", &self.len())
            .finish()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// An empty registry with no providers.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            state: RwLock::new(RegistryState::default()),
            instances: InstanceCache::default(),
            discovered: OnceLock::new(),
        }
    }

    /// A registry with the built-in providers, already discovered.
    pub fn builtin() -> Self {
        let registry = Self::new().with_builtin_providers();
        registry.ensure_discovered();
        registry
    }

    /// Add a provider consulted by [`discover`](Self::discover).
    pub fn with_provider(mut self, provider: impl ToolProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Add every built-in provider.
    pub fn with_builtin_providers(mut self) -> Self {
        self.providers.extend(builtin::providers());
        self
    }

    // ── Discovery ──────────────────────────────────────────────────

    /// Walk every provider and register what it offers.
    ///
    /// A failing provider is logged and recorded in the report; the rest
    /// still run. Descriptors identical to what is already registered are
    /// skipped, so repeating a pass with no provider changes is a no-op.
    pub fn discover(&self) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        for provider in &self.providers {
            let source = provider.name();
            let registrations = match provider.registrations() {
                Ok(r) => r,
                Err(e) => {
                    warn!(provider = %source, "Tool discovery failed: {e}");
                    report.failures.push((source.to_string(), e));
                    continue;
                }
            };

            for mut registration in registrations {
                registration.descriptor.framework = source.to_string();
                let id = registration.descriptor.id.clone();
                match self.insert(registration) {
                    InsertOutcome::Added | InsertOutcome::Replaced => report.registered.push(id),
                    InsertOutcome::Unchanged => report.unchanged.push(id),
                }
            }
        }

        info!(
            "Discovered {} tools ({} unchanged) from {} providers, {} failed",
            report.registered.len(),
            report.unchanged.len(),
            self.providers.len(),
            report.failures.len()
        );
        report
    }

    /// Run [`discover`](Self::discover) at most once for this registry and
    /// return the report of that pass.
    pub fn ensure_discovered(&self) -> &DiscoveryReport {
        self.discovered.get_or_init(|| self.discover())
    }

    // ── Registration ───────────────────────────────────────────────

    /// Register a tool. An existing id is replaced (dropping its cached
    /// instances) unless the descriptor is identical. Returns whether the
    /// registry changed.
    pub fn register(&self, registration: ToolRegistration) -> bool {
        let id = registration.descriptor.id.clone();
        match self.insert(registration) {
            InsertOutcome::Added => {
                debug!(tool = %id, "Registered tool");
                true
            }
            InsertOutcome::Replaced => {
                debug!(tool = %id, "Replaced tool registration");
                true
            }
            InsertOutcome::Unchanged => false,
        }
    }

    fn insert(&self, registration: ToolRegistration) -> InsertOutcome {
        let ToolRegistration { descriptor, factory } = registration;
        let id = descriptor.id.clone();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let outcome = match state.entries.get(&id) {
            Some(existing) if existing.descriptor == descriptor => return InsertOutcome::Unchanged,
            Some(_) => InsertOutcome::Replaced,
            None => {
                state.order.push(id.clone());
                InsertOutcome::Added
            }
        };
        state.entries.insert(id.clone(), Entry { descriptor, factory });
        drop(state);

        if matches!(outcome, InsertOutcome::Replaced) {
            self.instances.invalidate(&id);
        }
        outcome
    }

    /// Remove a tool and its cached instances. Returns whether it existed.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let removed = state.entries.remove(id).is_some();
            if removed {
                state.order.retain(|existing| existing != id);
            }
            removed
        };
        if removed {
            self.instances.invalidate(id);
            debug!(tool = %id, "Unregistered tool");
        }
        removed
    }

    // ── Lookup ─────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<ToolDescriptor> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.entries.get(id).map(|e| e.descriptor.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Descriptors in registration order, optionally filtered by category.
    pub fn list(&self, category: Option<ToolCategory>) -> Vec<ToolDescriptor> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .order
            .iter()
            .filter_map(|id| state.entries.get(id))
            .map(|e| &e.descriptor)
            .filter(|d| category.is_none_or(|c| d.category == c))
            .cloned()
            .collect()
    }

    /// Descriptors matching `query`, best match first.
    pub fn search(&self, query: &str) -> Vec<ToolDescriptor> {
        self.search_scored(query)
            .into_iter()
            .map(|(descriptor, _)| descriptor)
            .collect()
    }

    /// Case-insensitive weighted substring search.
    ///
    /// Name or id hit: [`NAME_WEIGHT`]. Description hit:
    /// [`DESCRIPTION_WEIGHT`]. Each capability tag containing the query:
    /// [`CAPABILITY_WEIGHT`]. Zero scores are dropped; equal scores keep
    /// registration order.
    pub fn search_scored(&self, query: &str) -> Vec<(ToolDescriptor, u32)> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(ToolDescriptor, u32)> = self
            .list(None)
            .into_iter()
            .filter_map(|descriptor| {
                let mut score = 0;
                if descriptor.name.to_lowercase().contains(&query)
                    || descriptor.id.to_lowercase().contains(&query)
                {
                    score += NAME_WEIGHT;
                }
                if descriptor.description.to_lowercase().contains(&query) {
                    score += DESCRIPTION_WEIGHT;
                }
                let capability_hits = descriptor
                    .capabilities
                    .iter()
                    .filter(|c| c.contains(&query))
                    .count() as u32;
                score += CAPABILITY_WEIGHT * capability_hits;
                (score > 0).then_some((descriptor, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored
    }

    // ── Instances ──────────────────────────────────────────────────

    /// Return the cached instance for `(id, config)` or construct it.
    ///
    /// A configuration that does not match the descriptor's schema is
    /// logged and replaced by no-argument construction. Construction runs
    /// at most once per fingerprint; every call bumps the instance's usage
    /// count.
    pub fn create_instance(
        &self,
        id: &str,
        config: Option<&Value>,
    ) -> Result<Arc<ToolInstance>, RegistryError> {
        let (descriptor, factory) = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let entry = state
                .entries
                .get(id)
                .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
            (entry.descriptor.clone(), Arc::clone(&entry.factory))
        };
        if !descriptor.enabled {
            return Err(RegistryError::Disabled(id.to_string()));
        }

        let config = config.filter(|c| !c.is_null());
        let fingerprint = Fingerprint::new(id, config);

        self.instances.get_or_create(&fingerprint, || {
            let applied = match config {
                Some(cfg) => match validate_config(&descriptor, cfg) {
                    None => Some(cfg),
                    Some(problems) => {
                        warn!(
                            tool = %id,
                            "Configuration does not match declared shape ({problems}), constructing with defaults"
                        );
                        None
                    }
                },
                None => None,
            };

            let tool = factory(applied).map_err(|reason| RegistryError::InstantiationFailure {
                id: id.to_string(),
                reason,
            })?;
            debug!(tool = %id, fingerprint = %fingerprint, "Constructed tool instance");
            Ok(ToolInstance::new(
                descriptor,
                fingerprint.clone(),
                applied.cloned().unwrap_or(Value::Null),
                tool,
            ))
        })
    }

    pub fn stats(&self) -> RegistryStats {
        let descriptors = self.list(None);
        let mut stats = RegistryStats {
            total_tools: descriptors.len(),
            enabled_tools: descriptors.iter().filter(|d| d.enabled).count(),
            cache_hits: self.instances.hits(),
            cache_misses: self.instances.misses(),
            ..Default::default()
        };
        for descriptor in &descriptors {
            *stats
                .by_category
                .entry(descriptor.category.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_framework
                .entry(descriptor.framework.clone())
                .or_default() += 1;
        }
        let instances = self.instances.instances();
        stats.cached_instances = instances.len();
        stats.total_instance_uses = instances.iter().map(|i| i.usage_count()).sum();
        stats
    }
}
