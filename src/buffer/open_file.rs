// ABOUTME: Edit buffer for one open file
// Tracks live content, the saved/unsaved indicator, and the pending persist timer

use crate::buffer::timer::PersistTimer;
use crate::workspace::file_name;
use tokio::time::Instant;

/// Whether the buffer matches what was last handed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStatus {
    /// Matches the host as of the last persist.
    Saved,
    /// Edited since the last persist.
    Unsaved,
}

impl BufferStatus {
    /// Short label for status lines.
    pub const fn label(self) -> &'static str {
        match self {
            BufferStatus::Saved => "Saved",
            BufferStatus::Unsaved => "Unsaved",
        }
    }
}

/// One editor tab.
#[derive(Debug)]
pub struct OpenFile {
    name: String,
    path: String,
    content: String,
    /// True while no persist has been sent for the current content
    dirty: bool,
    pub(crate) timer: Option<PersistTimer>,
}

impl OpenFile {
    /// A clean buffer holding content as fetched from the host.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path).to_string(),
            path,
            content: content.into(),
            dirty: false,
            timer: None,
        }
    }

    /// Display name, the last path segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path below the workspace root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current buffer text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether the buffer holds edits not yet handed to the host.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Saved or unsaved.
    pub const fn status(&self) -> BufferStatus {
        if self.dirty {
            BufferStatus::Unsaved
        } else {
            BufferStatus::Saved
        }
    }

    /// When the pending persist fires, if one is armed.
    pub fn persist_deadline(&self) -> Option<Instant> {
        self.timer.as_ref().map(PersistTimer::deadline)
    }

    /// Whether a persist timer is armed.
    pub const fn has_pending_persist(&self) -> bool {
        self.timer.is_some()
    }

    pub(crate) fn set_content(&mut self, content: String) {
        self.content = content;
        self.dirty = true;
    }

    pub(crate) fn mark_sent(&mut self) {
        self.dirty = false;
    }
}
