// ABOUTME: Client-owned view state for the workspace tree: expansion and search
// Lives beside the data tree, addressed by path, and survives every refresh

use crate::workspace::node::{join_path, NodeKind, WorkspaceNode};
use std::collections::HashSet;

/// Set of expanded directory paths. Paths that no longer exist are inert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: HashSet<String>,
}

impl ExpansionState {
    /// Nothing expanded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership. Returns whether the path is now expanded.
    pub fn toggle(&mut self, path: &str) -> bool {
        if self.expanded.remove(path) {
            false
        } else {
            self.expanded.insert(path.to_string());
            true
        }
    }

    /// Mark `path` expanded.
    pub fn expand(&mut self, path: &str) {
        self.expanded.insert(path.to_string());
    }

    /// Mark `path` collapsed.
    pub fn collapse(&mut self, path: &str) {
        self.expanded.remove(path);
    }

    /// Whether `path` is expanded.
    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    /// Number of expanded paths.
    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    /// Whether nothing is expanded.
    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}

/// One rendered line of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    /// Full path of the entry.
    pub path: String,
    /// Display name.
    pub name: String,
    /// File or directory.
    pub kind: NodeKind,
    /// Zero for top-level entries
    pub depth: usize,
    /// Whether a directory row is expanded.
    pub expanded: bool,
}

/// Flatten the visible part of `root`.
///
/// A node is shown when its name contains `search_term` (case-insensitive) or
/// when it is an expanded directory. Children are listed only under expanded
/// directories; a matching descendant never expands its ancestors.
pub fn visible_rows(
    root: &WorkspaceNode,
    expansion: &ExpansionState,
    search_term: &str,
) -> Vec<TreeRow> {
    let needle = search_term.to_lowercase();
    let mut rows = Vec::new();
    push_rows(root, "", 0, expansion, &needle, &mut rows);
    rows
}

fn push_rows(
    parent: &WorkspaceNode,
    parent_path: &str,
    depth: usize,
    expansion: &ExpansionState,
    needle: &str,
    rows: &mut Vec<TreeRow>,
) {
    for node in parent.children() {
        let path = join_path(parent_path, node.name());
        let expanded = node.is_dir() && expansion.is_expanded(&path);
        let matches = node.name().to_lowercase().contains(needle);

        if !matches && !expanded {
            continue;
        }

        rows.push(TreeRow {
            path: path.clone(),
            name: node.name().to_string(),
            kind: node.kind(),
            depth,
            expanded,
        });

        if expanded {
            push_rows(node, &path, depth + 1, expansion, needle, rows);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WorkspaceNode {
        WorkspaceNode::root(vec![
            WorkspaceNode::directory(
                "src",
                vec![
                    WorkspaceNode::file("index.ts"),
                    WorkspaceNode::directory("lib", vec![WorkspaceNode::file("util.ts")]),
                ],
            ),
            WorkspaceNode::file("package.json"),
        ])
    }

    fn paths(rows: &[TreeRow]) -> Vec<&str> {
        rows.iter().map(|row| row.path.as_str()).collect()
    }

    #[test]
    fn collapsed_tree_shows_top_level_only() {
        let rows = visible_rows(&sample(), &ExpansionState::new(), "");
        assert_eq!(paths(&rows), vec!["src", "package.json"]);
        assert!(!rows[0].expanded);
    }

    #[test]
    fn expanding_reveals_children_with_depth() {
        let mut expansion = ExpansionState::new();
        assert!(expansion.toggle("src"));
        let rows = visible_rows(&sample(), &expansion, "");
        assert_eq!(paths(&rows), vec!["src", "src/index.ts", "src/lib", "package.json"]);
        assert_eq!(rows[1].depth, 1);

        assert!(!expansion.toggle("src"));
        assert_eq!(visible_rows(&sample(), &expansion, "").len(), 2);
    }

    #[test]
    fn search_is_case_insensitive() {
        let rows = visible_rows(&sample(), &ExpansionState::new(), "PACK");
        assert_eq!(paths(&rows), vec!["package.json"]);
    }

    #[test]
    fn expanded_directory_survives_non_matching_search() {
        let mut expansion = ExpansionState::new();
        expansion.expand("src");
        let rows = visible_rows(&sample(), &expansion, "util");
        // src is shown because it is expanded; lib is collapsed and does not match
        assert_eq!(paths(&rows), vec!["src"]);
    }

    #[test]
    fn matching_descendant_does_not_expand_ancestors() {
        let rows = visible_rows(&sample(), &ExpansionState::new(), "index");
        assert!(rows.is_empty());
    }

    #[test]
    fn stale_expanded_paths_are_inert() {
        let mut expansion = ExpansionState::new();
        expansion.expand("gone/away");
        expansion.expand("package.json");
        let rows = visible_rows(&sample(), &expansion, "");
        assert_eq!(paths(&rows), vec!["src", "package.json"]);
        assert!(!rows[1].expanded);
    }
}
