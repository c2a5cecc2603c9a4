// ABOUTME: Workspace tree model kept consistent with the host
// Wholesale replacement on every fetch, with stale responses discarded by ticket

use crate::host::{HostApi, HostError};
use crate::workspace::node::WorkspaceNode;
use crate::workspace::view::{visible_rows, ExpansionState, TreeRow};
use tracing::{debug, info, warn};

/// Issued when a tree fetch starts; orders responses that arrive late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

/// Outcome of applying a fetch result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeUpdate {
    /// The fetched tree replaced the displayed one.
    Applied,
    /// A newer response was already applied; this one was discarded.
    Stale,
    /// The fetch failed; the previous tree is still displayed.
    Failed(HostError),
}

/// Last-known workspace tree plus the view state laid over it.
#[derive(Debug, Default)]
pub struct WorkspaceTree {
    root: Option<WorkspaceNode>,
    expansion: ExpansionState,
    search_term: String,
    issued: u64,
    applied: u64,
    last_error: Option<HostError>,
}

impl WorkspaceTree {
    /// An empty, unloaded tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fetch. Pass the ticket back with its result.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued += 1;
        debug!("Tree fetch #{} started", self.issued);
        FetchTicket(self.issued)
    }

    /// Apply the outcome of the fetch started with `ticket`.
    pub fn apply_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<WorkspaceNode, HostError>,
    ) -> TreeUpdate {
        if ticket.0 < self.applied {
            debug!(
                "Discarding tree fetch #{} (already showing #{})",
                ticket.0, self.applied
            );
            return TreeUpdate::Stale;
        }

        match result {
            Ok(root) => {
                info!(
                    "Workspace tree replaced by fetch #{} ({} nodes)",
                    ticket.0,
                    root.descendant_count()
                );
                self.root = Some(root);
                self.applied = ticket.0;
                self.last_error = None;
                TreeUpdate::Applied
            }
            Err(e) => {
                warn!("Tree fetch #{} failed, keeping previous tree: {}", ticket.0, e);
                self.last_error = Some(e.clone());
                TreeUpdate::Failed(e)
            }
        }
    }

    /// Fetch and apply in one step, for callers outside the session loop.
    pub async fn refresh(&mut self, host: &dyn HostApi) -> Result<(), HostError> {
        let ticket = self.begin_fetch();
        let result = host.fetch_tree().await;
        match self.apply_fetch(ticket, result) {
            TreeUpdate::Failed(e) => Err(e),
            TreeUpdate::Applied | TreeUpdate::Stale => Ok(()),
        }
    }

    /// The displayed tree, once a fetch has succeeded.
    pub const fn root(&self) -> Option<&WorkspaceNode> {
        self.root.as_ref()
    }

    /// Whether a fetch has ever succeeded.
    pub const fn is_loaded(&self) -> bool {
        self.root.is_some()
    }

    /// Node at `path` below the root.
    pub fn find(&self, path: &str) -> Option<&WorkspaceNode> {
        self.root.as_ref().and_then(|root| root.find(path))
    }

    /// Flip expansion of `path`. Never touches the host.
    pub fn toggle_expanded(&mut self, path: &str) -> bool {
        let expanded = self.expansion.toggle(path);
        debug!("{} {}", if expanded { "Expanded" } else { "Collapsed" }, path);
        expanded
    }

    /// Expand every directory of the current tree.
    pub fn expand_all(&mut self) {
        if let Some(root) = &self.root {
            for path in root.directory_paths() {
                self.expansion.expand(&path);
            }
        }
    }

    /// Expanded directory paths.
    pub const fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    /// Set the row filter.
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    /// Current row filter.
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// Rows visible under the current expansion and filter.
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        self.root
            .as_ref()
            .map(|root| visible_rows(root, &self.expansion, &self.search_term))
            .unwrap_or_default()
    }

    /// Error of the most recent failed fetch, cleared by the next success.
    pub const fn last_error(&self) -> Option<&HostError> {
        self.last_error.as_ref()
    }
}
