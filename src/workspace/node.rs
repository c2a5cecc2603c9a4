// ABOUTME: Pure data model of the remote workspace hierarchy
// Nodes carry names and children only; paths are derived by joining ancestor names

use serde_json::{Map, Value};
use thiserror::Error;

/// A tree node that was neither `null` nor an object.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid tree at '{path}': expected null or object, found {found}")]
pub struct TreeFormatError {
    /// Path of the offending node.
    pub path: String,
    /// JSON type found there.
    pub found: &'static str,
}

/// File or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A leaf.
    File,
    /// Has children, possibly none.
    Directory,
}

/// One entry of the remote workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceNode {
    name: String,
    kind: NodeKind,
    /// Present only for directories, in host order
    children: Option<Vec<WorkspaceNode>>,
}

/// Join a parent path and a child name. The root's path is the empty string.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Last segment of a path, used as a display name.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').find(|segment| !segment.is_empty()).unwrap_or(path)
}

impl WorkspaceNode {
    /// A file node.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            children: None,
        }
    }

    /// Later children replace earlier ones with the same name.
    pub fn directory(name: impl Into<String>, children: Vec<WorkspaceNode>) -> Self {
        let mut children = children;
        dedup_by_name(&mut children);
        Self {
            name: name.into(),
            kind: NodeKind::Directory,
            children: Some(children),
        }
    }

    /// The implicit, unnamed workspace root.
    pub fn root(children: Vec<WorkspaceNode>) -> Self {
        Self::directory(String::new(), children)
    }

    /// Decode the host encoding: an object mapping names to `null` (file) or
    /// a nested object (directory).
    pub fn from_json(value: &Value) -> Result<Self, TreeFormatError> {
        match value {
            Value::Object(map) => Ok(Self::root(decode_children("", map)?)),
            other => Err(TreeFormatError {
                path: String::new(),
                found: json_type(other),
            }),
        }
    }

    /// Name within its parent.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File or directory.
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Whether this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Empty for files.
    pub fn children(&self) -> &[WorkspaceNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Direct child called `name`.
    pub fn child(&self, name: &str) -> Option<&WorkspaceNode> {
        self.children().iter().find(|child| child.name == name)
    }

    /// Look up a descendant by its derived path. The empty path is `self`.
    pub fn find(&self, path: &str) -> Option<&WorkspaceNode> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Paths of every directory below this node, depth first.
    pub fn directory_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_directory_paths(self, "", &mut paths);
        paths
    }

    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children()
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }
}

fn decode_children(parent: &str, map: &Map<String, Value>) -> Result<Vec<WorkspaceNode>, TreeFormatError> {
    map.iter()
        .map(|(name, value)| match value {
            Value::Null => Ok(WorkspaceNode::file(name.clone())),
            Value::Object(children) => {
                let path = join_path(parent, name);
                Ok(WorkspaceNode::directory(name.clone(), decode_children(&path, children)?))
            }
            other => Err(TreeFormatError {
                path: join_path(parent, name),
                found: json_type(other),
            }),
        })
        .collect()
}

fn collect_directory_paths(node: &WorkspaceNode, path: &str, out: &mut Vec<String>) {
    for child in node.children().iter().filter(|child| child.is_dir()) {
        let child_path = join_path(path, &child.name);
        out.push(child_path.clone());
        collect_directory_paths(child, &child_path, out);
    }
}

// Sibling names are unique; the last occurrence wins, matching JSON objects
fn dedup_by_name(children: &mut Vec<WorkspaceNode>) {
    let mut seen = std::collections::HashSet::new();
    let mut kept: Vec<WorkspaceNode> = Vec::with_capacity(children.len());
    for child in children.drain(..).rev() {
        if seen.insert(child.name.clone()) {
            kept.push(child);
        }
    }
    kept.reverse();
    *children = kept;
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
