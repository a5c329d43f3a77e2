//! Tool abstraction for the capability registry.
//!
//! The [`Tool`] trait is the execution interface every registered tool
//! implements: an async `execute` that receives a JSON payload and returns a
//! JSON result. Metadata lives separately in a
//! [`ToolDescriptor`](super::descriptor::ToolDescriptor) so the registry can
//! list, search and match tools without constructing them.
//!
//! Tools reach the registry as [`ToolRegistration`]s: a descriptor plus a
//! factory that builds the tool from an optional configuration value. Typed
//! tools implement [`DescribedTool`] and get a registration for free via
//! [`ToolRegistration::of`].

use super::descriptor::ToolDescriptor;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, trace};

/// Boxed future returned by [`Tool::execute`].
///
/// Errors are plain strings; the graph engine wraps them in
/// [`NodeError::Execution`](crate::error::NodeError::Execution) with the
/// failing node id.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, String>> + Send + 'a>>;

/// Builds a tool from an optional configuration value.
pub type ToolFactory = Arc<dyn Fn(Option<&Value>) -> Result<Arc<dyn Tool>, String> + Send + Sync>;

// ── Tool trait ─────────────────────────────────────────────────────

/// A constructed, executable tool.
///
/// # Example
///
/// ```ignore
/// struct Upper;
///
/// impl Tool for Upper {
///     fn execute(&self, input: Value) -> ToolFuture<'_> {
///         Box::pin(async move {
///             Ok(Value::String(input_text(&input).to_uppercase()))
///         })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// Run the tool against `input`.
    ///
    /// Uses a boxed future so that the trait is dyn-compatible.
    fn execute(&self, input: Value) -> ToolFuture<'_>;
}

/// A tool that declares its own metadata and typed configuration.
///
/// `describe()` provides id, category and capability tags; the config
/// schema is derived from [`Self::Config`] when registered through
/// [`ToolRegistration::of`].
pub trait DescribedTool: Tool + Sized + 'static {
    /// Instantiation configuration. `Default` is used for no-argument
    /// construction.
    type Config: DeserializeOwned + JsonSchema + Default;

    fn describe() -> ToolDescriptor;

    /// Construct from a typed configuration. Errors surface as
    /// [`RegistryError::InstantiationFailure`](crate::error::RegistryError::InstantiationFailure).
    fn build(config: Self::Config) -> Result<Self, String>;
}

// ── ToolRegistration ───────────────────────────────────────────────

/// A descriptor paired with the factory that constructs its tool.
#[derive(Clone)]
pub struct ToolRegistration {
    pub descriptor: ToolDescriptor,
    pub factory: ToolFactory,
}

impl ToolRegistration {
    /// Pair a descriptor with an arbitrary factory closure.
    pub fn new<F>(descriptor: ToolDescriptor, factory: F) -> Self
    where
        F: Fn(Option<&Value>) -> Result<Arc<dyn Tool>, String> + Send + Sync + 'static,
    {
        Self {
            descriptor,
            factory: Arc::new(factory),
        }
    }

    /// Registration for a [`DescribedTool`]: the descriptor's config schema
    /// is replaced by the schema of `T::Config`.
    pub fn of<T: DescribedTool>() -> Self {
        let mut descriptor = T::describe();
        descriptor.config_schema = crate::json_schema_for::<T::Config>();
        Self::new(descriptor, |config: Option<&Value>| {
            let config = match config {
                Some(value) => serde_json::from_value(value.clone())
                    .map_err(|e| format!("invalid configuration: {e}"))?,
                None => T::Config::default(),
            };
            let tool = T::build(config)?;
            Ok(Arc::new(tool) as Arc<dyn Tool>)
        })
    }

    /// Registration for a stateless tool instance shared by every
    /// configuration.
    pub fn shared(descriptor: ToolDescriptor, tool: impl Tool + 'static) -> Self {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        Self::new(descriptor, move |_| Ok(Arc::clone(&tool)))
    }
}

impl fmt::Debug for ToolRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistration")
            .field("id", &self.descriptor.id)
            .field("category", &self.descriptor.category)
            .finish()
    }
}

// ── FnTool ────────────────────────────────────────────────────────

/// Type-erased async handler for [`FnTool`].
type ErasedToolHandler =
    Box<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>> + Send + Sync>;

/// A closure-based tool.
///
/// Use [`FnTool`] for stateless tools and test doubles. Tools that hold
/// configuration should implement [`DescribedTool`] instead.
///
/// ```ignore
/// let echo = FnTool::new(|input: Value| async move { Ok(input) });
/// let registration = ToolRegistration::shared(descriptor, echo);
/// ```
pub struct FnTool {
    handler: ErasedToolHandler,
}

impl FnTool {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let erased = move |input: Value| -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>> {
            Box::pin(handler(input))
        };
        Self {
            handler: Box::new(erased),
        }
    }
}

impl Tool for FnTool {
    fn execute(&self, input: Value) -> ToolFuture<'_> {
        (self.handler)(input)
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool").finish_non_exhaustive()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Fields consulted, in order, when a tool needs free text from its input.
pub const TEXT_FIELDS: [&str; 6] = ["query", "input", "text", "question", "content", "task"];

/// Extract the free text a tool should operate on.
///
/// Strings are used as-is; objects yield the first string among
/// [`TEXT_FIELDS`]; anything else yields an empty string.
pub fn input_text(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        Value::Object(obj) => TEXT_FIELDS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Validate a configuration value against a descriptor's JSON Schema.
///
/// Returns `None` if valid (or if the schema itself cannot be compiled),
/// otherwise a one-line summary of every violation.
pub fn validate_config(descriptor: &ToolDescriptor, config: &Value) -> Option<String> {
    let validator = match jsonschema::validator_for(&descriptor.config_schema) {
        Ok(v) => v,
        Err(e) => {
            debug!("Skipping config validation for {}: {e}", descriptor.id);
            return None;
        }
    };

    let errors: Vec<String> = validator
        .iter_errors(config)
        .map(|e| format!("{}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        trace!("Config for {} matches its schema", descriptor.id);
        None
    } else {
        Some(errors.join("; "))
    }
}

/// Tokenize text into lowercase alphanumeric words.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::descriptor::ToolCategory;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, JsonSchema)]
    #[serde(default, deny_unknown_fields)]
    struct RepeatConfig {
        times: usize,
    }

    struct Repeat {
        times: usize,
    }

    impl Tool for Repeat {
        fn execute(&self, input: Value) -> ToolFuture<'_> {
            let text = input_text(&input).repeat(self.times.max(1));
            Box::pin(async move { Ok(Value::String(text)) })
        }
    }

    impl DescribedTool for Repeat {
        type Config = RepeatConfig;

        fn describe() -> ToolDescriptor {
            ToolDescriptor::builder("repeat")
                .category(ToolCategory::Custom)
                .capabilities(&["echo"])
                .build()
        }

        fn build(config: RepeatConfig) -> Result<Self, String> {
            if config.times > 10 {
                return Err("times must be at most 10".into());
            }
            Ok(Self {
                times: config.times,
            })
        }
    }

    #[test]
    fn input_text_prefers_known_fields() {
        assert_eq!(input_text(&json!("plain")), "plain");
        assert_eq!(input_text(&json!({"text": "t", "query": "q"})), "q");
        assert_eq!(input_text(&json!({"other": 1})), "");
        assert_eq!(input_text(&json!(42)), "");
    }

    #[test]
    fn words_splits_on_non_alphanumerics() {
        assert_eq!(words("Search the web, then REASON!"), vec![
            "search", "the", "web", "then", "reason"
        ]);
        assert_eq!(words("数据 分析"), vec!["数据", "分析"]);
    }

    #[test]
    fn described_tool_registration_carries_schema() {
        let registration = ToolRegistration::of::<Repeat>();
        assert_eq!(registration.descriptor.id, "repeat");
        assert_eq!(registration.descriptor.config_schema["type"], "object");
        assert!(
            registration.descriptor.config_schema["properties"]
                .get("times")
                .is_some()
        );
    }

    #[test]
    fn validate_config_reports_shape_mismatch() {
        let registration = ToolRegistration::of::<Repeat>();
        assert!(validate_config(&registration.descriptor, &json!({"times": 2})).is_none());
        assert!(validate_config(&registration.descriptor, &json!({"times": "two"})).is_some());
        assert!(validate_config(&registration.descriptor, &json!({"volume": 3})).is_some());
    }

    #[tokio::test]
    async fn factory_builds_configured_and_default_tools() {
        let registration = ToolRegistration::of::<Repeat>();
        let tool = (registration.factory)(Some(&json!({"times": 3}))).unwrap();
        assert_eq!(tool.execute(json!("ab")).await.unwrap(), "ababab");

        let tool = (registration.factory)(None).unwrap();
        assert_eq!(tool.execute(json!("ab")).await.unwrap(), "ab");

        let err = (registration.factory)(Some(&json!({"times": 11})))
            .err()
            .unwrap();
        assert!(err.contains("at most 10"));
    }

    #[tokio::test]
    async fn fn_tool_runs_closure() {
        let tool = FnTool::new(|input: Value| async move {
            match input.get("fail") {
                Some(_) => Err("asked to fail".to_string()),
                None => Ok(json!({"echo": input})),
            }
        });
        assert_eq!(
            tool.execute(json!({"a": 1})).await.unwrap(),
            json!({"echo": {"a": 1}})
        );
        assert_eq!(
            tool.execute(json!({"fail": true})).await.unwrap_err(),
            "asked to fail"
        );
    }
}
