//! Include/ignore rules applied to cost tables.

use serde::{Deserialize, Serialize};

use crate::CostTable;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionFilter {
    /// Substrings of the fully-qualified name; empty accepts everything.
    #[serde(default)]
    pub include_prefixes: Vec<String>,
    /// Leaf names (text after the final `.`) to drop.
    #[serde(default)]
    pub ignore_functions: Vec<String>,
}

impl FunctionFilter {
    pub fn is_empty(&self) -> bool {
        self.include_prefixes.is_empty() && self.ignore_functions.is_empty()
    }

    pub fn accepts(&self, name: &str) -> bool {
        let included = self.include_prefixes.is_empty()
            || self.include_prefixes.iter().any(|p| name.contains(p.as_str()));
        included && !self.ignore_functions.iter().any(|f| f == leaf_name(name))
    }

    /// Keeps accepted rows in their original order; `total` and percentages are untouched.
    pub fn apply(&self, table: &CostTable) -> CostTable {
        CostTable {
            total: table.total,
            entries: table
                .entries
                .iter()
                .filter(|e| self.accepts(&e.name))
                .cloned()
                .collect(),
        }
    }
}

/// Text after the final `.`; a trailing generic marker `[...]` is not treated as a separator.
pub fn leaf_name(name: &str) -> &str {
    let base = name.strip_suffix("[...]").unwrap_or(name);
    match base.rfind('.') {
        Some(i) if i + 1 < base.len() => &name[i + 1..],
        _ => name,
    }
}

/// Distinct leaf names in input order; these key the per-function listings.
pub fn distinct_leaf_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out = Vec::<String>::new();
    for name in names {
        let leaf = leaf_name(name);
        if !leaf.is_empty() && !out.iter().any(|l| l == leaf) {
            out.push(leaf.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn table(names: &[(&str, i64)]) -> CostTable {
        let flat = names
            .iter()
            .map(|(n, v)| (n.to_string(), *v))
            .collect::<HashMap<_, _>>();
        let total = names.iter().map(|(_, v)| v).sum();
        CostTable::from_sums(total, &flat, &flat)
    }

    #[test]
    fn include_is_substring_and_ignore_is_leaf() {
        let t = table(&[("pkg/mod.F", 30), ("pkg/mod.init", 20), ("other.G", 10)]);
        let filter = FunctionFilter {
            include_prefixes: vec!["pkg/".to_string()],
            ignore_functions: vec!["init".to_string()],
        };
        let out = filter.apply(&t);
        assert_eq!(out.names().collect::<Vec<_>>(), vec!["pkg/mod.F"]);
        assert_eq!(out.total, t.total);
        assert_eq!(out.entries[0], t.entries[0]);
    }

    #[test]
    fn substring_matches_mid_name() {
        let filter = FunctionFilter {
            include_prefixes: vec!["acme/pool".to_string()],
            ignore_functions: Vec::new(),
        };
        assert!(filter.accepts("github.com/acme/pool.(*Pool).Get"));
        assert!(!filter.accepts("runtime.mallocgc"));
    }

    #[test]
    fn empty_filter_keeps_everything_in_order() {
        let t = table(&[("a.X", 3), ("b.Y", 2), ("c.Z", 1)]);
        assert_eq!(FunctionFilter::default().apply(&t), t);
    }

    #[test]
    fn apply_is_idempotent() {
        let t = table(&[("pkg/a.F", 5), ("pkg/a.init", 4), ("x.G", 3), ("pkg/b.H", 2)]);
        let filter = FunctionFilter {
            include_prefixes: vec!["pkg/".to_string()],
            ignore_functions: vec!["init".to_string(), "H".to_string()],
        };
        let once = filter.apply(&t);
        assert_eq!(filter.apply(&once), once);
        assert_eq!(once.names().collect::<Vec<_>>(), vec!["pkg/a.F"]);
    }

    #[test]
    fn leaf_name_rules() {
        assert_eq!(leaf_name("github.com/acme/pool.(*Pool).Get"), "Get");
        assert_eq!(leaf_name("main.main.func1"), "func1");
        assert_eq!(leaf_name("pkg.Map[...]"), "Map[...]");
        assert_eq!(leaf_name("nodots"), "nodots");
        assert_eq!(leaf_name("trailing."), "trailing.");
    }

    #[test]
    fn distinct_leaf_names_keep_first_occurrence() {
        let names = ["a.(*T).Get", "b.Get", "a.Put", "c.init"];
        assert_eq!(
            distinct_leaf_names(names),
            vec!["Get".to_string(), "Put".to_string(), "init".to_string()]
        );
    }
}
