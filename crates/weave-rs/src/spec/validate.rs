//! Validation of normalized specifications.
//!
//! Violations are returned as data so the caller decides whether to warn or
//! reject (see [`OrchestratorConfig::strict_validation`](crate::config::OrchestratorConfig::strict_validation)).

use super::AgentSpecification;
use crate::config::SpecLimits;
use serde::Serialize;
use std::fmt;

/// One failed validation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Canonical field the check applies to.
    pub field: &'static str,
    pub message: String,
}

impl Violation {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate against the default [`SpecLimits`].
pub fn validate(spec: &AgentSpecification) -> Vec<Violation> {
    validate_with(spec, &SpecLimits::default())
}

/// Validate against explicit ceilings.
pub fn validate_with(spec: &AgentSpecification, limits: &SpecLimits) -> Vec<Violation> {
    let mut violations = Vec::new();

    let name_chars = spec.name.trim().chars().count();
    if name_chars == 0 {
        violations.push(Violation::new("name", "must not be empty"));
    } else if name_chars > limits.max_name_chars {
        violations.push(Violation::new(
            "name",
            format!(
                "is {name_chars} characters, limit is {}",
                limits.max_name_chars
            ),
        ));
    }

    check_range(
        &mut violations,
        "limits.timeout_secs",
        spec.limits.timeout_secs,
        limits.max_timeout_secs,
    );
    check_range(
        &mut violations,
        "limits.max_iterations",
        spec.limits.max_iterations,
        limits.max_iterations,
    );

    if spec.tools.len() > limits.max_tools {
        violations.push(Violation::new(
            "tools",
            format!(
                "{} tools configured, limit is {}",
                spec.tools.len(),
                limits.max_tools
            ),
        ));
    }

    if spec.knowledge_sources.len() > limits.max_knowledge_sources {
        violations.push(Violation::new(
            "knowledge_sources",
            format!(
                "{} knowledge sources configured, limit is {}",
                spec.knowledge_sources.len(),
                limits.max_knowledge_sources
            ),
        ));
    }

    let instruction_chars: usize = spec.instructions.iter().map(|i| i.chars().count()).sum();
    if instruction_chars > limits.max_instruction_chars {
        violations.push(Violation::new(
            "instructions",
            format!(
                "total length is {instruction_chars} characters, limit is {}",
                limits.max_instruction_chars
            ),
        ));
    }

    violations
}

fn check_range(violations: &mut Vec<Violation>, field: &'static str, value: i64, max: i64) {
    if value <= 0 {
        violations.push(Violation::new(field, format!("must be positive, got {value}")));
    } else if value > max {
        violations.push(Violation::new(field, format!("is {value}, limit is {max}")));
    }
}
