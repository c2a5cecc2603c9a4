// ABOUTME: Lazily loaded model of the remote workspace hierarchy
// Data tree, client-side view state, and the refresh-driven tree model

/// Tree nodes and host decoding.
pub mod node;
/// The synced tree.
pub mod tree;
/// Expansion and search.
pub mod view;

pub use node::{file_name, join_path, NodeKind, TreeFormatError, WorkspaceNode};
pub use tree::{FetchTicket, TreeUpdate, WorkspaceTree};
pub use view::{visible_rows, ExpansionState, TreeRow};
