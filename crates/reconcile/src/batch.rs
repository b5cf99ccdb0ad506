//! Partial-failure tolerant batches
//!
//! Some sub-operations handle several items in one call, such as installing
//! a list of packages. Per-item failures are recorded and summarized; the
//! batch only fails when every item failed.

use crate::error::{Error, Result};
use crate::types::ResourceId;
use std::fmt;
use std::time::Duration;

/// Result for one item in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome<T> {
    pub item: T,
    pub success: bool,
    /// Command output on success, error text on failure
    pub detail: String,
    pub duration: Duration,
}

/// Per-item outcomes of a batch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport<T> {
    items: Vec<ItemOutcome<T>>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: fmt::Display> BatchReport<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeeded(&mut self, item: T, detail: impl Into<String>, duration: Duration) {
        self.items.push(ItemOutcome {
            item,
            success: true,
            detail: detail.into(),
            duration,
        });
    }

    pub fn failed(&mut self, item: T, detail: impl Into<String>, duration: Duration) {
        self.items.push(ItemOutcome {
            item,
            success: false,
            detail: detail.into(),
            duration,
        });
    }

    pub fn items(&self) -> &[ItemOutcome<T>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.items.iter().filter(|i| i.success).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome<T>> {
        self.items.iter().filter(|i| !i.success)
    }

    /// Every item failed (an empty batch never fails)
    pub fn all_failed(&self) -> bool {
        !self.items.is_empty() && self.success_count() == 0
    }

    /// One-line summary, e.g. "2/3 succeeded (failed: foo)"
    pub fn summary(&self) -> String {
        let failed: Vec<String> = self.failures().map(|i| i.item.to_string()).collect();
        if failed.is_empty() {
            format!("{}/{} succeeded", self.success_count(), self.len())
        } else {
            format!(
                "{}/{} succeeded (failed: {})",
                self.success_count(),
                self.len(),
                failed.join(", ")
            )
        }
    }

    /// Escalate to an error only if every item failed
    ///
    /// Partial failures are logged as warnings and the report is returned.
    pub fn into_result(self, id: &ResourceId, operation: &str) -> Result<Self> {
        if self.all_failed() {
            let details: Vec<String> = self
                .items
                .iter()
                .map(|i| format!("{}: {}", i.item, i.detail.trim()))
                .collect();
            return Err(Error::execution(
                id,
                format!("{operation} failed for all items: {}", details.join("; ")),
            ));
        }

        for failure in self.failures() {
            log::warn!("{id}: {operation} failed for {}: {}", failure.item, failure.detail.trim());
        }
        Ok(self)
    }
}
