//! Tool-chain ordering and redundancy removal.

use super::keywords::{CHAIN_PRIORITY, compatibility, rank};
use crate::tools::{ToolDescriptor, ToolRegistry};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Weight of capability overlap subtracted from category compatibility
/// when ordering tools within a category.
pub const OVERLAP_PENALTY: f64 = 0.5;

/// Order and prune a tool chain.
///
/// 1. Ids unknown to `registry` or disabled there are dropped (with a
///    warning); duplicates collapse to their first occurrence.
/// 2. Tools are grouped by [`CHAIN_PRIORITY`]. Within a group they are
///    placed greedily: each next tool maximizes
///    `compatibility(prev, next) - OVERLAP_PENALTY * jaccard(prev, next)`
///    against the tool placed just before it, so complementary tools sit
///    next to each other. Ties keep input order.
/// 3. A tool whose capabilities are all covered by already-kept tools is
///    dropped, unless it is richer than the kept tool it overlaps most (see
///    [`is_richer`]); then it takes that tool's place instead, and any
///    other kept tool it is richer than is dropped. Tools that declare no
///    capabilities are always kept.
///
/// The output is a subset of the input.
pub fn optimize_chain<S: AsRef<str>>(ids: &[S], registry: &ToolRegistry) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut resolved: Vec<ToolDescriptor> = Vec::new();
    for id in ids {
        let id = id.as_ref();
        if !seen.insert(id.to_string()) {
            continue;
        }
        match registry.get(id) {
            Some(descriptor) if descriptor.enabled => resolved.push(descriptor),
            Some(_) => warn!(tool = %id, "Dropping disabled tool from chain"),
            None => warn!(tool = %id, "Dropping unknown tool from chain"),
        }
    }

    let ordered = order(resolved);
    let kept = prune(ordered);
    let out: Vec<String> = kept.into_iter().map(|d| d.id).collect();
    debug!(chain = ?out, "Optimized tool chain");
    out
}

fn order(tools: Vec<ToolDescriptor>) -> Vec<ToolDescriptor> {
    let mut groups: Vec<Vec<ToolDescriptor>> = vec![Vec::new(); CHAIN_PRIORITY.len() + 1];
    for tool in tools {
        groups[rank(&CHAIN_PRIORITY, tool.category)].push(tool);
    }

    let mut ordered: Vec<ToolDescriptor> = Vec::new();
    for mut group in groups {
        while !group.is_empty() {
            let next = match ordered.last() {
                None => 0,
                Some(prev) => {
                    let mut best = 0;
                    let mut best_score = f64::NEG_INFINITY;
                    for (i, candidate) in group.iter().enumerate() {
                        let score = pair_score(prev, candidate);
                        if score > best_score {
                            best = i;
                            best_score = score;
                        }
                    }
                    best
                }
            };
            ordered.push(group.remove(next));
        }
    }
    ordered
}

fn pair_score(prev: &ToolDescriptor, next: &ToolDescriptor) -> f64 {
    compatibility(prev.category, next.category)
        - OVERLAP_PENALTY * jaccard(&prev.capabilities, &next.capabilities)
}

/// Jaccard similarity of two capability lists (0 when both are empty).
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&String> = a.iter().collect();
    let b: HashSet<&String> = b.iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

fn prune(ordered: Vec<ToolDescriptor>) -> Vec<ToolDescriptor> {
    let mut kept: Vec<ToolDescriptor> = Vec::new();

    for tool in ordered {
        let covered: HashSet<&String> = kept.iter().flat_map(|k| &k.capabilities).collect();
        if tool.capabilities.is_empty() || !tool.capabilities.iter().all(|c| covered.contains(c)) {
            kept.push(tool);
            continue;
        }

        let incumbent = kept
            .iter()
            .enumerate()
            .filter(|(_, k)| !k.capabilities.is_empty())
            .fold(None::<(usize, usize)>, |best, (i, k)| {
                let overlap = k
                    .capabilities
                    .iter()
                    .filter(|c| tool.capabilities.contains(c))
                    .count();
                match best {
                    Some((_, most)) if overlap <= most => best,
                    _ => Some((i, overlap)),
                }
            });

        match incumbent {
            Some((i, _)) if is_richer(&tool, &kept[i]) => {
                debug!(tool = %tool.id, replaced = %kept[i].id, "Replacing with richer tool");
                kept[i] = tool;
                let replacement = kept[i].clone();
                let mut index = 0;
                kept.retain(|k| {
                    let keep = index == i
                        || k.capabilities.is_empty()
                        || !is_richer(&replacement, k);
                    index += 1;
                    keep
                });
            }
            _ => debug!(tool = %tool.id, "Dropping redundant tool"),
        }
    }
    kept
}

/// Whether `candidate` can stand in for `incumbent`: it offers every
/// capability the incumbent does, and either strictly more of them or the
/// same set as a manager replacing a non-manager.
pub fn is_richer(candidate: &ToolDescriptor, incumbent: &ToolDescriptor) -> bool {
    let covers_all = incumbent
        .capabilities
        .iter()
        .all(|c| candidate.capabilities.contains(c));
    covers_all
        && (candidate.capabilities.len() > incumbent.capabilities.len()
            || (candidate.manager && !incumbent.manager))
}
