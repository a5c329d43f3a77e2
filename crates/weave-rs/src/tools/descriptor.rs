//! Tool metadata: [`ToolDescriptor`] and [`ToolCategory`].
//!
//! Descriptors are declared by tool implementations (see
//! [`DescribedTool`](super::core::DescribedTool)) rather than inferred from
//! naming conventions. Once registered they are immutable and owned by the
//! [`ToolRegistry`](super::registry::ToolRegistry); callers receive clones.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Functional area of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCategory {
    Reasoning,
    Search,
    Knowledge,
    Chunking,
    FileManagement,
    System,
    Custom,
}

impl ToolCategory {
    pub const ALL: [ToolCategory; 7] = [
        Self::Reasoning,
        Self::Search,
        Self::Knowledge,
        Self::Chunking,
        Self::FileManagement,
        Self::System,
        Self::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::Search => "search",
            Self::Knowledge => "knowledge",
            Self::Chunking => "chunking",
            Self::FileManagement => "file-management",
            Self::System => "system",
            Self::Custom => "custom",
        }
    }

    /// Parse a category name. Accepts `file-management`, `file_management`
    /// and `files`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('_', "-").as_str() {
            "reasoning" => Some(Self::Reasoning),
            "search" => Some(Self::Search),
            "knowledge" => Some(Self::Knowledge),
            "chunking" => Some(Self::Chunking),
            "file-management" | "files" => Some(Self::FileManagement),
            "system" => Some(Self::System),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable metadata describing one registered tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Stable string id (also the registry key).
    pub id: String,
    /// Display name.
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    /// Capability tags, lowercased and deduplicated in declaration order.
    pub capabilities: Vec<String>,
    /// JSON Schema of the instantiation configuration.
    pub config_schema: Value,
    pub is_async: bool,
    pub enabled: bool,
    /// Whether the tool aggregates several tools under one umbrella.
    pub manager: bool,
    /// Originating framework, reported by registry stats.
    pub framework: String,
}

impl ToolDescriptor {
    /// Start building a descriptor for `id`.
    pub fn builder(id: impl Into<String>) -> ToolDescriptorBuilder {
        let id = id.into();
        ToolDescriptorBuilder {
            descriptor: ToolDescriptor {
                name: id.clone(),
                id,
                description: String::new(),
                category: ToolCategory::Custom,
                capabilities: Vec::new(),
                config_schema: serde_json::json!({"type": "object"}),
                is_async: true,
                enabled: true,
                manager: false,
                framework: "custom".into(),
            },
        }
    }

    /// Whether the tool declares `capability` (case-insensitive).
    pub fn has_capability(&self, capability: &str) -> bool {
        let capability = capability.to_lowercase();
        self.capabilities.iter().any(|c| *c == capability)
    }
}

/// Builder for [`ToolDescriptor`]. Every field has a default, so `build()`
/// never fails; the display name defaults to the id.
#[derive(Debug, Clone)]
pub struct ToolDescriptorBuilder {
    descriptor: ToolDescriptor,
}

impl ToolDescriptorBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.descriptor.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = description.into();
        self
    }

    pub fn category(mut self, category: ToolCategory) -> Self {
        self.descriptor.category = category;
        self
    }

    pub fn capabilities(mut self, capabilities: &[&str]) -> Self {
        for capability in capabilities {
            let capability = capability.trim().to_lowercase();
            if !capability.is_empty() && !self.descriptor.capabilities.contains(&capability) {
                self.descriptor.capabilities.push(capability);
            }
        }
        self
    }

    pub fn config_schema(mut self, schema: Value) -> Self {
        self.descriptor.config_schema = schema;
        self
    }

    /// Derive the configuration schema from a `schemars::JsonSchema` type.
    pub fn config_for<T: schemars::JsonSchema>(self) -> Self {
        self.config_schema(crate::json_schema_for::<T>())
    }

    pub fn asynchronous(mut self, is_async: bool) -> Self {
        self.descriptor.is_async = is_async;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.descriptor.enabled = enabled;
        self
    }

    pub fn manager(mut self, manager: bool) -> Self {
        self.descriptor.manager = manager;
        self
    }

    pub fn framework(mut self, framework: impl Into<String>) -> Self {
        self.descriptor.framework = framework.into();
        self
    }

    pub fn build(self) -> ToolDescriptor {
        self.descriptor
    }
}
