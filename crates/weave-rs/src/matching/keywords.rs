//! Fixed lookup tables used by the matcher and chain optimizer.
//!
//! Keywords are matched by case-insensitive substring containment, so stems
//! such as `analy` cover "analyze", "analysis" and "analytical". Chinese
//! entries are matched the same way (no segmentation needed).

use crate::tools::ToolCategory;

/// Per-category keyword dictionary.
pub const CATEGORY_KEYWORDS: &[(ToolCategory, &[&str])] = &[
    (ToolCategory::Reasoning, &[
        "reason", "think", "analy", "logic", "infer", "deduc", "plan", "推理", "分析", "思考",
        "逻辑", "规划",
    ]),
    (ToolCategory::Search, &[
        "search", "find", "query", "lookup", "look up", "web", "搜索", "查找", "检索", "查询",
    ]),
    (ToolCategory::Knowledge, &[
        "knowledge", "retriev", "fact", "wiki", "reference", "知识", "资料", "文献",
    ]),
    (ToolCategory::Chunking, &[
        "chunk", "split", "segment", "partition", "分块", "切分", "分割",
    ]),
    (ToolCategory::FileManagement, &[
        "file", "upload", "attachment", "metadata", "文件", "上传", "附件",
    ]),
    (ToolCategory::System, &[
        "system", "monitor", "health", "status", "uptime", "系统", "监控", "状态",
    ]),
];

/// Importance of a capability tag when it appears in a requirement.
pub const CAPABILITY_WEIGHTS: &[(&str, f64)] = &[
    ("search", 1.0),
    ("reasoning", 1.0),
    ("retrieval", 0.9),
    ("knowledge", 0.9),
    ("chunking", 0.8),
    ("analysis", 0.8),
    ("planning", 0.7),
    ("file-management", 0.7),
    ("monitoring", 0.6),
    ("system", 0.6),
];

pub const DEFAULT_CAPABILITY_WEIGHT: f64 = 0.5;

/// Category order used by `optimize_chain`: context producers first,
/// housekeeping last.
pub const CHAIN_PRIORITY: [ToolCategory; 7] = [
    ToolCategory::Knowledge,
    ToolCategory::Reasoning,
    ToolCategory::Search,
    ToolCategory::Chunking,
    ToolCategory::FileManagement,
    ToolCategory::System,
    ToolCategory::Custom,
];

/// Category order used by the `high_speed` recommendation preference:
/// cheapest first.
pub const SPEED_PRIORITY: [ToolCategory; 7] = [
    ToolCategory::System,
    ToolCategory::Chunking,
    ToolCategory::FileManagement,
    ToolCategory::Search,
    ToolCategory::Knowledge,
    ToolCategory::Reasoning,
    ToolCategory::Custom,
];

pub fn keywords_for(category: ToolCategory) -> &'static [&'static str] {
    CATEGORY_KEYWORDS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, keywords)| *keywords)
        .unwrap_or(&[])
}

pub fn capability_weight(tag: &str) -> f64 {
    CAPABILITY_WEIGHTS
        .iter()
        .find(|(name, _)| *name == tag)
        .map_or(DEFAULT_CAPABILITY_WEIGHT, |(_, w)| *w)
}

/// Keyword hits per category for already-lowercased `text`, in dictionary
/// order. Categories with no hits are omitted.
pub fn keyword_hits(text: &str) -> Vec<(ToolCategory, usize)> {
    CATEGORY_KEYWORDS
        .iter()
        .filter_map(|(category, keywords)| {
            let hits = keywords.iter().filter(|k| text.contains(*k)).count();
            (hits > 0).then_some((*category, hits))
        })
        .collect()
}

/// Position of `category` in `order` (unlisted categories sort last).
pub fn rank(order: &[ToolCategory], category: ToolCategory) -> usize {
    order
        .iter()
        .position(|c| *c == category)
        .unwrap_or(order.len())
}

/// How well a tool of category `b` follows one of category `a`.
/// Symmetric; complementary pairs score highest.
pub fn compatibility(a: ToolCategory, b: ToolCategory) -> f64 {
    use ToolCategory::*;
    if a == b {
        return 0.3;
    }
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    match (first, second) {
        (Reasoning, Search) | (Reasoning, Knowledge) => 0.9,
        (Knowledge, Chunking) | (Chunking, FileManagement) => 0.8,
        (Search, Knowledge) => 0.7,
        (Search, Chunking) | (Reasoning, Chunking) => 0.6,
        (_, System) => 0.4,
        _ => 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_but_custom_has_keywords() {
        for category in ToolCategory::ALL {
            assert_eq!(
                keywords_for(category).is_empty(),
                category == ToolCategory::Custom,
                "{category}"
            );
        }
    }

    #[test]
    fn keyword_hits_are_bilingual() {
        assert_eq!(keyword_hits("search the web"), vec![(ToolCategory::Search, 2)]);
        assert_eq!(keyword_hits("请搜索并分析"), vec![
            (ToolCategory::Reasoning, 1),
            (ToolCategory::Search, 1)
        ]);
        assert!(keyword_hits("hello").is_empty());
    }

    #[test]
    fn capability_weights_default() {
        assert_eq!(capability_weight("search"), 1.0);
        assert_eq!(capability_weight("telepathy"), DEFAULT_CAPABILITY_WEIGHT);
    }

    #[test]
    fn compatibility_is_symmetric() {
        for a in ToolCategory::ALL {
            for b in ToolCategory::ALL {
                assert_eq!(compatibility(a, b), compatibility(b, a));
            }
        }
        assert!(
            compatibility(ToolCategory::Knowledge, ToolCategory::Reasoning)
                > compatibility(ToolCategory::Reasoning, ToolCategory::Reasoning)
        );
    }

    #[test]
    fn rank_puts_unknown_last() {
        assert_eq!(rank(&CHAIN_PRIORITY, ToolCategory::Knowledge), 0);
        assert_eq!(rank(&CHAIN_PRIORITY[..2], ToolCategory::System), 2);
    }
}
