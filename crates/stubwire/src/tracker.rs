//! Ordered, inspectable collections of stubs and intercepted requests.

use crate::interceptor::{EngineError, UrlMatcher};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Something a [`Tracker`] can look up by method and URL.
pub trait Trackable {
    fn matches(&self, method: &str, url: &UrlMatcher) -> bool;

    /// One-line summary used by [`Tracker::debug`]
    fn describe(&self) -> String;
}

/// Insertion-ordered list of shared items.
///
/// Lookups return the first match in insertion order. All methods take
/// `&self`; the list is guarded by a read-write lock.
pub struct Tracker<T> {
    label: &'static str,
    items: RwLock<Vec<Arc<T>>>,
}

impl<T: Trackable> Tracker<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            items: RwLock::new(Vec::new()),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Append an item and hand back the shared handle.
    pub fn track(&self, item: impl Into<Arc<T>>) -> Arc<T> {
        let item = item.into();
        self.items.write().push(Arc::clone(&item));
        item
    }

    pub fn reset(&self) {
        self.items.write().clear();
    }

    pub fn count(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn at(&self, index: usize) -> Option<Arc<T>> {
        self.items.read().get(index).cloned()
    }

    pub fn first(&self) -> Option<Arc<T>> {
        self.items.read().first().cloned()
    }

    pub fn most_recent(&self) -> Option<Arc<T>> {
        self.items.read().last().cloned()
    }

    /// Snapshot of every item in insertion order.
    pub fn items(&self) -> Vec<Arc<T>> {
        self.items.read().clone()
    }

    /// First item matching `method` and `url`.
    pub fn get(&self, method: &str, url: impl Into<UrlMatcher>) -> Option<Arc<T>> {
        let url = url.into();
        self.items
            .read()
            .iter()
            .find(|item| item.matches(method, &url))
            .cloned()
    }

    /// Remove and return the first item matching `method` and `url`.
    pub fn remove(&self, method: &str, url: impl Into<UrlMatcher>) -> Result<Arc<T>, EngineError> {
        let url = url.into();
        let mut items = self.items.write();
        match items.iter().position(|item| item.matches(method, &url)) {
            Some(index) => Ok(items.remove(index)),
            None => Err(EngineError::NotTracked {
                method: method.to_string(),
                url: url.to_string(),
            }),
        }
    }

    /// Log one line per item and return the lines.
    pub fn debug(&self) -> Vec<String> {
        let lines: Vec<String> = self.items.read().iter().map(|item| item.describe()).collect();
        info!(tracker = self.label, count = lines.len(), "tracked items");
        for line in &lines {
            info!(tracker = self.label, "{}", line);
        }
        lines
    }
}

impl<T> std::fmt::Debug for Tracker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("label", &self.label)
            .field("count", &self.items.read().len())
            .finish()
    }
}
