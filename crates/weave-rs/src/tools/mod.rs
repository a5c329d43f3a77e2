//! Capability registry: pluggable tools discovered at startup and
//! instantiated on demand.
//!
//! Every capability the orchestrator can wire into a graph (search,
//! reasoning, chunking, ...) is a [`Tool`] implementor described by a
//! [`ToolDescriptor`]. Tools reach the [`ToolRegistry`] through explicit
//! [`ToolProvider`] registration tables, never by scanning source.
//!
//! # Defining tools
//!
//! - **[`DescribedTool`]**: a struct with a typed, `schemars`-derived config.
//!   Register with [`ToolRegistration::of`].
//! - **[`FnTool`]**: closure-based. Pair with a hand-written descriptor via
//!   [`ToolRegistration::shared`].
//! - **[`ToolRegistration::new`]**: any descriptor plus a factory closure.
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`], [`DescribedTool`], [`ToolRegistration`], [`FnTool`].
//! - [`descriptor`]: [`ToolDescriptor`] and its builder, [`ToolCategory`].
//! - [`registry`]: [`ToolRegistry`] and [`RegistryStats`].
//! - [`instance`]: [`ToolInstance`], [`Fingerprint`] and the exactly-once
//!   instance cache.
//! - [`provider`]: [`ToolProvider`], [`StaticProvider`], [`DiscoveryReport`].
//! - [`builtin`]: the built-in tools and their providers.
//! - [`names`]: stable ids of the built-in tools.

pub mod builtin;
pub mod core;
pub mod descriptor;
pub mod instance;
pub mod names;
pub mod provider;
pub mod registry;

pub use core::{
    DescribedTool, FnTool, Tool, ToolFactory, ToolFuture, ToolRegistration, input_text,
    validate_config,
};
pub use descriptor::{ToolCategory, ToolDescriptor, ToolDescriptorBuilder};
pub use instance::{Fingerprint, ToolInstance};
pub use provider::{DiscoveryReport, StaticProvider, ToolProvider};
pub use registry::{RegistryStats, ToolRegistry};
