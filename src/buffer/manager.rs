// ABOUTME: Edit buffer manager owning one buffer per open file
// Coalesces rapid edits into a single debounced persist per file

use crate::buffer::open_file::OpenFile;
use crate::buffer::timer::{PersistDue, PersistTimer};
use crate::channel::{ClientEvent, EventChannel};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Result of handing a due persist back to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// `file:change` was handed to the channel; the file is now saved.
    Sent,
    /// The channel refused the emission; the file stays unsaved.
    Dropped(String),
    /// The timer belonged to a closed file or was superseded.
    Stale,
}

/// Open files in tab order, each with at most one pending persist.
#[derive(Debug)]
pub struct EditBufferManager {
    files: Vec<OpenFile>,
    debounce: Duration,
    next_generation: u64,
    due_tx: mpsc::UnboundedSender<PersistDue>,
}

impl EditBufferManager {
    /// Timer firings are reported on `due_tx`; hand them back via [`Self::fire`].
    pub const fn new(debounce: Duration, due_tx: mpsc::UnboundedSender<PersistDue>) -> Self {
        Self {
            files: Vec::new(),
            debounce,
            next_generation: 1,
            due_tx,
        }
    }

    /// Inactivity delay before a persist fires.
    pub const fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Open files in tab order.
    pub fn files(&self) -> &[OpenFile] {
        &self.files
    }

    /// Number of open files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no file is open.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether `path` has a tab.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// The open file at `path`.
    pub fn get(&self, path: &str) -> Option<&OpenFile> {
        self.files.iter().find(|file| file.path() == path)
    }

    fn get_mut(&mut self, path: &str) -> Option<&mut OpenFile> {
        self.files.iter_mut().find(|file| file.path() == path)
    }

    /// Path of the leftmost tab.
    pub fn first_path(&self) -> Option<&str> {
        self.files.first().map(OpenFile::path)
    }

    /// Add a clean buffer. Returns false if the path is already open.
    pub fn insert(&mut self, path: &str, content: String) -> bool {
        if self.contains(path) {
            debug!("{} already open", path);
            return false;
        }
        self.files.push(OpenFile::new(path, content));
        info!("Opened buffer for {}", path);
        true
    }

    /// Replace the content of `path` and restart its debounce deadline.
    pub fn edit(&mut self, path: &str, content: String) -> bool {
        let generation = self.next_generation;
        let debounce = self.debounce;
        let due_tx = self.due_tx.clone();

        let Some(file) = self.get_mut(path) else {
            warn!("Edit for {} which is not open", path);
            return false;
        };

        file.set_content(content);
        // Assigning drops the previous handle, which aborts its task
        file.timer = Some(PersistTimer::arm(path.to_string(), generation, debounce, due_tx));
        self.next_generation += 1;
        debug!("{} edited, persist #{} in {:?}", path, generation, debounce);
        true
    }

    /// Cancel the pending persist without flushing. The edit stays in memory
    /// and the file stays unsaved.
    pub fn cancel_pending(&mut self, path: &str) -> bool {
        match self.get_mut(path).and_then(|file| file.timer.take()) {
            Some(timer) => {
                debug!("Cancelled persist #{} for {}", timer.generation(), path);
                timer.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop the buffer, discarding any unsent edit.
    pub fn remove(&mut self, path: &str) -> Option<OpenFile> {
        let pos = self.files.iter().position(|file| file.path() == path)?;
        let mut file = self.files.remove(pos);
        if let Some(timer) = file.timer.take() {
            info!("Closing {} with unsent edits; persist #{} cancelled", path, timer.generation());
            timer.cancel();
        }
        Some(file)
    }

    /// Handle an expired deadline reported by a timer.
    pub fn fire(&mut self, due: &PersistDue, channel: &EventChannel) -> PersistOutcome {
        let Some(file) = self.get_mut(&due.path) else {
            debug!("Persist #{} for closed file {}", due.generation, due.path);
            return PersistOutcome::Stale;
        };

        let current = file.timer.as_ref().map(|timer| timer.generation());
        if current != Some(due.generation) {
            debug!(
                "Persist #{} for {} superseded by {:?}",
                due.generation, due.path, current
            );
            return PersistOutcome::Stale;
        }

        file.timer = None;
        Self::persist(file, channel)
    }

    /// Persist immediately, bypassing the debounce. An armed timer is left
    /// running and will resend the same content.
    pub fn save(&mut self, path: &str, channel: &EventChannel) -> Option<PersistOutcome> {
        let file = self.get_mut(path)?;
        Some(Self::persist(file, channel))
    }

    fn persist(file: &mut OpenFile, channel: &EventChannel) -> PersistOutcome {
        match channel.emit(ClientEvent::file_change(file.path(), file.content())) {
            Ok(()) => {
                file.mark_sent();
                info!("Persisted {} ({} bytes)", file.path(), file.content().len());
                PersistOutcome::Sent
            }
            Err(e) => {
                warn!("Persist of {} dropped: {}", file.path(), e);
                PersistOutcome::Dropped(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{MemoryTransport, SentEvent};
    use std::sync::Arc;
    use tokio::time::Instant;

    const D: Duration = Duration::from_millis(2_000);

    fn setup() -> (
        EditBufferManager,
        mpsc::UnboundedReceiver<PersistDue>,
        EventChannel,
        crate::channel::MemoryHost,
    ) {
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        let (transport, _inbound, host) = MemoryTransport::pair();
        let channel = EventChannel::new(Arc::new(transport));
        (EditBufferManager::new(D, due_tx), due_rx, channel, host)
    }

    fn contents(sent: &[SentEvent]) -> Vec<String> {
        sent.iter()
            .map(|sent| match &sent.event {
                ClientEvent::FileChange(change) => change.content.clone(),
                ClientEvent::TerminalWrite(data) => data.clone(),
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_persist() {
        let (mut buffers, mut due_rx, channel, mut host) = setup();
        let start = Instant::now();
        buffers.insert("a.txt", "a".to_string());

        buffers.edit("a.txt", "ab".to_string());
        tokio::time::sleep(D / 2).await;
        buffers.edit("a.txt", "abc".to_string());
        tokio::time::sleep(D * 2 / 5).await;
        buffers.edit("a.txt", "abcd".to_string());
        assert!(buffers.get("a.txt").unwrap().is_dirty());

        let due = due_rx.recv().await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= D * 19 / 10 && elapsed < D * 2, "fired at {elapsed:?}");
        assert_eq!(buffers.fire(&due, &channel), PersistOutcome::Sent);

        assert_eq!(contents(&host.take_sent()), vec!["abcd".to_string()]);
        let file = buffers.get("a.txt").unwrap();
        assert!(!file.is_dirty());
        assert!(!file.has_pending_persist());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (mut buffers, mut due_rx, _channel, _host) = setup();
        buffers.insert("a.txt", "a".to_string());
        buffers.edit("a.txt", "ab".to_string());
        assert!(buffers.cancel_pending("a.txt"));
        assert!(!buffers.cancel_pending("a.txt"));

        let waited = tokio::time::timeout(D * 3, due_rx.recv()).await;
        assert!(waited.is_err());
        assert!(buffers.get("a.txt").unwrap().is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_generation_is_stale() {
        let (mut buffers, _due_rx, channel, mut host) = setup();
        buffers.insert("a.txt", "a".to_string());
        buffers.edit("a.txt", "ab".to_string());
        let old = PersistDue {
            path: "a.txt".to_string(),
            generation: 1,
        };
        buffers.edit("a.txt", "abc".to_string());

        assert_eq!(buffers.fire(&old, &channel), PersistOutcome::Stale);
        assert!(host.take_sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_channel_leaves_file_unsaved() {
        let (mut buffers, mut due_rx, channel, host) = setup();
        buffers.insert("a.txt", "a".to_string());
        buffers.edit("a.txt", "ab".to_string());
        host.disconnect();

        let due = due_rx.recv().await.unwrap();
        assert!(matches!(buffers.fire(&due, &channel), PersistOutcome::Dropped(_)));
        let file = buffers.get("a.txt").unwrap();
        assert!(file.is_dirty());
        assert!(!file.has_pending_persist());
    }

    #[tokio::test(start_paused = true)]
    async fn save_keeps_armed_timer() {
        let (mut buffers, mut due_rx, channel, mut host) = setup();
        buffers.insert("a.txt", "a".to_string());
        buffers.edit("a.txt", "ab".to_string());

        assert_eq!(buffers.save("a.txt", &channel), Some(PersistOutcome::Sent));
        assert!(!buffers.get("a.txt").unwrap().is_dirty());
        assert!(buffers.get("a.txt").unwrap().has_pending_persist());

        let due = due_rx.recv().await.unwrap();
        assert_eq!(buffers.fire(&due, &channel), PersistOutcome::Sent);
        assert_eq!(contents(&host.take_sent()), vec!["ab".to_string(), "ab".to_string()]);
    }

    #[tokio::test]
    async fn insert_is_idempotent_per_path() {
        let (mut buffers, _due_rx, _channel, _host) = setup();
        assert!(buffers.insert("src/a.txt", "one".to_string()));
        assert!(!buffers.insert("src/a.txt", "two".to_string()));
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers.get("src/a.txt").unwrap().content(), "one");
        assert_eq!(buffers.get("src/a.txt").unwrap().name(), "a.txt");
    }
}
