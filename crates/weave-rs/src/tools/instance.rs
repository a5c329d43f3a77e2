//! Constructed tool instances and the exactly-once instance cache.
//!
//! Instances are keyed by a [`Fingerprint`]: the tool id plus the canonical
//! (key-sorted) configuration JSON and its FNV-1a hash. Concurrent requests for
//! the same fingerprint serialize on a per-slot lock, so the factory runs at
//! most once per key even under contention; distinct keys never block each
//! other during construction.

use super::core::{Tool, ToolFuture};
use super::descriptor::ToolDescriptor;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

// ── Fingerprint ────────────────────────────────────────────────────

/// Cache key for one (tool, configuration) pair. Equality compares the
/// canonical text, so two configs that share a hash stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub tool_id: String,
    pub config_hash: u64,
    pub canonical: String,
}

impl Fingerprint {
    /// Fingerprint `config` for `tool_id`. `None` and `null` hash like `{}`.
    pub fn new(tool_id: &str, config: Option<&Value>) -> Self {
        let canonical = match config {
            None | Some(Value::Null) => "{}".to_string(),
            Some(value) => canonical_json(value),
        };
        Self {
            tool_id: tool_id.to_string(),
            config_hash: hash_config(&canonical),
            canonical,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:016x}", self.tool_id, self.config_hash)
    }
}

/// Serialize with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(obj) => {
                let mut keys: Vec<&String> = obj.keys().collect();
                keys.sort();
                let mut out = serde_json::Map::new();
                for key in keys {
                    out.insert(key.clone(), sorted(&obj[key]));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

/// FNV-1a over the canonical configuration text.
fn hash_config(canonical: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in canonical.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

// ── ToolInstance ───────────────────────────────────────────────────

/// A constructed tool plus usage bookkeeping. Shared via `Arc` between the
/// registry cache and every caller that requested it.
pub struct ToolInstance {
    descriptor: ToolDescriptor,
    fingerprint: Fingerprint,
    /// Configuration actually applied (`null` for no-argument construction).
    config: Value,
    tool: Arc<dyn Tool>,
    created_at: DateTime<Utc>,
    usage_count: AtomicU64,
    last_used: Mutex<DateTime<Utc>>,
}

impl ToolInstance {
    pub fn new(
        descriptor: ToolDescriptor,
        fingerprint: Fingerprint,
        config: Value,
        tool: Arc<dyn Tool>,
    ) -> Self {
        let now = Utc::now();
        Self {
            descriptor,
            fingerprint,
            config,
            tool,
            created_at: now,
            usage_count: AtomicU64::new(0),
            last_used: Mutex::new(now),
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of times this instance has been handed out by the registry.
    pub fn usage_count(&self) -> u64 {
        self.usage_count.load(Ordering::Relaxed)
    }

    pub fn last_used(&self) -> DateTime<Utc> {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn touch(&self) {
        self.usage_count.fetch_add(1, Ordering::Relaxed);
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) = Utc::now();
    }

    /// Run the underlying tool.
    pub fn execute(&self, input: Value) -> ToolFuture<'_> {
        self.tool.execute(input)
    }
}

impl fmt::Debug for ToolInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolInstance")
            .field("fingerprint", &self.fingerprint.to_string())
            .field("usage_count", &self.usage_count())
            .field("created_at", &self.created_at)
            .finish()
    }
}

// ── InstanceCache ──────────────────────────────────────────────────

type Slot = Arc<Mutex<Option<Arc<ToolInstance>>>>;

/// Fingerprint-keyed instance cache with per-key construction locks.
#[derive(Default)]
pub(crate) struct InstanceCache {
    slots: Mutex<HashMap<Fingerprint, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InstanceCache {
    /// Return the cached instance for `fingerprint`, or run `create` while
    /// holding that key's slot lock. A failed `create` drops the key unless
    /// another request is already waiting on it; either way a later request
    /// retries.
    pub(crate) fn get_or_create<E>(
        &self,
        fingerprint: &Fingerprint,
        create: impl FnOnce() -> Result<ToolInstance, E>,
    ) -> Result<Arc<ToolInstance>, E> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(fingerprint.clone()).or_default())
        };

        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let instance = match guard.as_ref() {
            Some(instance) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Arc::clone(instance)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                match create() {
                    Ok(created) => {
                        let instance = Arc::new(created);
                        *guard = Some(Arc::clone(&instance));
                        instance
                    }
                    Err(err) => {
                        drop(guard);
                        self.discard_empty(fingerprint, &slot);
                        return Err(err);
                    }
                }
            }
        };
        instance.touch();
        Ok(instance)
    }

    /// Remove `slot` if it is still the entry for `fingerprint` and only the
    /// map and the caller reference it. Clones happen under the map lock, so
    /// the count cannot grow while it is held.
    fn discard_empty(&self, fingerprint: &Fingerprint, slot: &Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = slots
            .get(fingerprint)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2);
        if idle {
            slots.remove(fingerprint);
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drop every cached instance of `tool_id`. Callers holding an `Arc`
    /// keep their instance.
    pub(crate) fn invalidate(&self, tool_id: &str) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, _| key.tool_id != tool_id);
    }

    /// Constructed instances currently cached.
    pub(crate) fn instances(&self) -> Vec<Arc<ToolInstance>> {
        let slots: Vec<Slot> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        slots
            .iter()
            .filter_map(|slot| {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_ref()
                    .map(Arc::clone)
            })
            .collect()
    }

    pub(crate) fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub(crate) fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::core::FnTool;
    use serde_json::json;

    fn instance(config: Value) -> ToolInstance {
        let descriptor = ToolDescriptor::builder("echo").build();
        let fingerprint = Fingerprint::new("echo", Some(&config));
        ToolInstance::new(
            descriptor,
            fingerprint,
            config,
            Arc::new(FnTool::new(|v: Value| async move { Ok(v) })),
        )
    }

    #[test]
    fn fingerprint_ignores_key_order() {
        let a = Fingerprint::new("t", Some(&json!({"a": 1, "b": {"x": 1, "y": 2}})));
        let b = Fingerprint::new("t", Some(&json!({"b": {"y": 2, "x": 1}, "a": 1})));
        assert_eq!(a, b);
    }

    #[test]
    fn absent_null_and_empty_configs_share_a_fingerprint() {
        let none = Fingerprint::new("t", None);
        assert_eq!(none, Fingerprint::new("t", Some(&Value::Null)));
        assert_eq!(none, Fingerprint::new("t", Some(&json!({}))));
    }

    #[test]
    fn fingerprint_differs_by_tool_and_config() {
        let base = Fingerprint::new("t", Some(&json!({"k": 1})));
        assert_ne!(base, Fingerprint::new("u", Some(&json!({"k": 1}))));
        assert_ne!(base, Fingerprint::new("t", Some(&json!({"k": 2}))));
        assert!(base.to_string().starts_with("t#"));
    }

    #[test]
    fn cache_hits_reuse_instance_and_count_usage() {
        let cache = InstanceCache::default();
        let fp = Fingerprint::new("echo", None);
        let first = cache
            .get_or_create::<String>(&fp, || Ok(instance(Value::Null)))
            .unwrap();
        let second = cache
            .get_or_create::<String>(&fp, || panic!("constructed twice"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.usage_count(), 2);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
        assert!(second.last_used() >= second.created_at());
    }

    #[test]
    fn failed_creation_leaves_slot_empty() {
        let cache = InstanceCache::default();
        let fp = Fingerprint::new("echo", None);
        let err = cache
            .get_or_create(&fp, || Err("boom".to_string()))
            .unwrap_err();
        assert_eq!(err, "boom");
        assert!(cache.instances().is_empty());
        assert_eq!(cache.slot_count(), 0);
        assert!(
            cache
                .get_or_create::<String>(&fp, || Ok(instance(Value::Null)))
                .is_ok()
        );
        assert_eq!(cache.instances().len(), 1);
        assert_eq!(cache.slot_count(), 1);
    }

    #[test]
    fn failing_factories_do_not_accumulate_keys() {
        let cache = InstanceCache::default();
        for n in 0..50 {
            let fp = Fingerprint::new("echo", Some(&json!({"attempt": n})));
            assert!(cache.get_or_create(&fp, || Err("rejected".to_string())).is_err());
        }
        assert_eq!(cache.slot_count(), 0);
        assert_eq!(cache.misses(), 50);
    }

    #[test]
    fn equal_hashes_with_different_configs_stay_distinct() {
        let key = |canonical: &str| Fingerprint {
            tool_id: "echo".into(),
            config_hash: 7,
            canonical: canonical.into(),
        };
        let (a, b) = (key(r#"{"k":1}"#), key(r#"{"k":2}"#));
        assert_ne!(a, b);

        let cache = InstanceCache::default();
        let first = cache
            .get_or_create::<String>(&a, || Ok(instance(json!({"k": 1}))))
            .unwrap();
        let second = cache
            .get_or_create::<String>(&b, || Ok(instance(json!({"k": 2}))))
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.config()["k"], 2);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn invalidate_drops_only_matching_tool() {
        let cache = InstanceCache::default();
        cache
            .get_or_create::<String>(&Fingerprint::new("echo", None), || {
                Ok(instance(Value::Null))
            })
            .unwrap();
        cache
            .get_or_create::<String>(&Fingerprint::new("other", None), || {
                Ok(instance(Value::Null))
            })
            .unwrap();
        cache.invalidate("echo");
        let remaining = cache.instances();
        assert_eq!(remaining.len(), 1);
    }
}
