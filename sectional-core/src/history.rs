//! Browser history integration.

use parking_lot::Mutex;
use url::Url;

/// One pushed history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Absolute URL of the entry; also used as the entry's state
    pub url: Url,
}

impl HistoryEntry {
    /// Creates an entry for `url`.
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    /// What the address bar shows for this entry: path, query and fragment.
    pub fn address(&self) -> String {
        let mut address = self.url.path().to_string();
        if let Some(query) = self.url.query() {
            address.push('?');
            address.push_str(query);
        }
        if let Some(fragment) = self.url.fragment() {
            address.push('#');
            address.push_str(fragment);
        }
        address
    }
}

/// The page's location and history stack.
pub trait HistoryHost: Send + Sync {
    /// Current page URL; relative request URLs resolve against its origin.
    fn location(&self) -> Url;

    /// Pushes a new entry and makes it the current location without navigating.
    fn push_state(&self, entry: HistoryEntry);
}

/// In-memory history stack for headless hosts and tests.
#[derive(Debug)]
pub struct MemoryHistory {
    initial: HistoryEntry,
    pushed: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistory {
    /// Creates a history whose only entry is `initial`.
    pub fn new(initial: Url) -> Self {
        Self {
            initial: HistoryEntry::new(initial),
            pushed: Mutex::new(Vec::new()),
        }
    }

    /// All entries, oldest first, including the initial one.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        std::iter::once(self.initial.clone())
            .chain(self.pushed.lock().iter().cloned())
            .collect()
    }

    /// Number of entries pushed after the initial one.
    pub fn pushed_count(&self) -> usize {
        self.pushed.lock().len()
    }
}

impl HistoryHost for MemoryHistory {
    fn location(&self) -> Url {
        self.pushed
            .lock()
            .last()
            .unwrap_or(&self.initial)
            .url
            .clone()
    }

    fn push_state(&self, entry: HistoryEntry) {
        tracing::debug!(address = %entry.address(), "Pushing history entry");
        self.pushed.lock().push(entry);
    }
}
