//! Requirement-to-tool scoring.
//!
//! Each (requirement, tool) pair gets four component scores in `[0, 1]`,
//! combined with [`ScoreWeights`] and normalized by the weight total:
//!
//! - **keyword**: share of the requirement's dictionary hits that fall in
//!   the tool's category.
//! - **capability**: summed importance of the tool's capability tags that
//!   appear in the requirement, capped at 1.
//! - **text**: fraction of requirement words found in the tool's id, name
//!   or description.
//! - **category**: 1 when the requirement mentions the category name.
//!
//! The best tool at or above the threshold wins each requirement. Equal
//! scores keep the first tool in the order given, so the result is a pure
//! function of the registry listing.

use super::keywords::{SPEED_PRIORITY, capability_weight, keyword_hits, rank};
use crate::config::{MatchingConfig, ScoreWeights};
use crate::spec::push_unique;
use crate::tools::core::words;
use crate::tools::{ToolDescriptor, ToolRegistry};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// Component and combined scores for one (requirement, tool) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchScore {
    pub keyword: f64,
    pub capability: f64,
    pub text: f64,
    pub category: f64,
    /// Weighted, normalized combination of the four components.
    pub total: f64,
}

/// Caller preferences applied after matching in
/// [`ToolMatcher::recommend_tools`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecommendContext {
    /// Drop aggregating "manager" tools.
    pub prefer_simple: bool,
    /// Reorder by [`SPEED_PRIORITY`].
    pub high_speed: bool,
    /// Truncate to at most this many tools.
    pub max_tools: Option<usize>,
}

impl RecommendContext {
    pub fn simple(mut self) -> Self {
        self.prefer_simple = true;
        self
    }

    pub fn fast(mut self) -> Self {
        self.high_speed = true;
        self
    }

    pub fn with_max_tools(mut self, max: usize) -> Self {
        self.max_tools = Some(max);
        self
    }
}

/// Scores requirements against tool descriptors.
#[derive(Debug, Clone, Default)]
pub struct ToolMatcher {
    config: MatchingConfig,
}

impl ToolMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Score one requirement against one tool.
    pub fn score(&self, requirement: &str, tool: &ToolDescriptor) -> MatchScore {
        let requirement = requirement.trim().to_lowercase();

        let hits = keyword_hits(&requirement);
        let total_hits: usize = hits.iter().map(|(_, n)| n).sum();
        let keyword = if total_hits == 0 {
            0.0
        } else {
            let own = hits
                .iter()
                .find(|(c, _)| *c == tool.category)
                .map_or(0, |(_, n)| *n);
            own as f64 / total_hits as f64
        };

        let capability = tool
            .capabilities
            .iter()
            .filter(|tag| requirement.contains(tag.as_str()))
            .map(|tag| capability_weight(tag))
            .sum::<f64>()
            .min(1.0);

        let requirement_words = words(&requirement);
        let text = if requirement_words.is_empty() {
            0.0
        } else {
            let tool_words: HashSet<String> = words(&tool.id)
                .into_iter()
                .chain(words(&tool.name))
                .chain(words(&tool.description))
                .collect();
            let found = requirement_words
                .iter()
                .filter(|w| tool_words.contains(*w))
                .count();
            found as f64 / requirement_words.len() as f64
        };

        let category = if requirement.contains(tool.category.as_str()) {
            1.0
        } else {
            0.0
        };

        MatchScore {
            keyword,
            capability,
            text,
            category,
            total: combine(&self.config.weights, keyword, capability, text, category),
        }
    }

    /// Highest-scoring enabled tool at or above the threshold. Ties keep
    /// the earliest tool in `available`.
    pub fn best_match<'a>(
        &self,
        requirement: &str,
        available: &'a [ToolDescriptor],
    ) -> Option<(&'a ToolDescriptor, f64)> {
        let mut best: Option<(&ToolDescriptor, f64)> = None;
        for tool in available.iter().filter(|t| t.enabled) {
            let score = self.score(requirement, tool).total;
            trace!(requirement, tool = %tool.id, score, "Scored tool");
            if score >= self.config.threshold && best.is_none_or(|(_, s)| score > s) {
                best = Some((tool, score));
            }
        }
        best
    }

    /// One tool per requirement, deduplicated in first-seen order.
    /// Requirements without a match contribute nothing.
    pub fn match_tools<S: AsRef<str>>(
        &self,
        requirements: &[S],
        available: &[ToolDescriptor],
    ) -> Vec<String> {
        let mut selected = Vec::new();
        for requirement in requirements {
            let requirement = requirement.as_ref();
            match self.best_match(requirement, available) {
                Some((tool, score)) => {
                    debug!(requirement, tool = %tool.id, score, "Matched requirement");
                    push_unique(&mut selected, tool.id.as_str());
                }
                None => warn!(requirement, "No tool matched requirement"),
            }
        }
        selected
    }

    /// Requirements implied by free text: the name of every category whose
    /// keywords occur in it, or the configured defaults when none do.
    pub fn derive_requirements(&self, text: &str) -> Vec<String> {
        let hits = keyword_hits(&text.to_lowercase());
        if hits.is_empty() {
            debug!("No keyword hits in task text, using default requirements");
            return self.config.default_requirements.clone();
        }
        hits.into_iter()
            .map(|(category, _)| category.as_str().to_string())
            .collect()
    }

    /// Match tools for a free-text task against the full registry listing,
    /// then apply `context`.
    pub fn recommend_tools(
        &self,
        task: &str,
        registry: &ToolRegistry,
        context: &RecommendContext,
    ) -> Vec<String> {
        let available = registry.list(None);
        let requirements = self.derive_requirements(task);
        let ids = self.match_tools(&requirements, &available);

        let mut picked: Vec<&ToolDescriptor> = ids
            .iter()
            .filter_map(|id| available.iter().find(|d| d.id == *id))
            .collect();

        if context.prefer_simple {
            picked.retain(|d| !d.manager);
        }
        if context.high_speed {
            picked.sort_by_key(|d| rank(&SPEED_PRIORITY, d.category));
        }
        if let Some(max) = context.max_tools {
            picked.truncate(max);
        }

        let out: Vec<String> = picked.into_iter().map(|d| d.id.clone()).collect();
        debug!(?requirements, tools = ?out, "Recommended tools");
        out
    }
}

fn combine(weights: &ScoreWeights, keyword: f64, capability: f64, text: f64, category: f64) -> f64 {
    let total = weights.total();
    if total <= 0.0 {
        return 0.0;
    }
    (weights.keyword * keyword
        + weights.capability * capability
        + weights.text * text
        + weights.category * category)
        / total
}
