//! Local view of the anchor chain.
//!
//! The view is the tail of what this committee has confirmed on the ledger,
//! followed by the anchors it has produced but not yet seen confirmed:
//!
//! ```text
//! [ confirmed | pending | pending | ... ]
//!                                   ^ base for the next round
//! ```
//!
//! Rejections mark entries; once every entry from the earliest rejected one
//! to the end is rejected, that suffix is dropped and the last good prefix
//! becomes the base again. While any entry is rejected there is no base.
//! The head is the confirmed anchor and is never rejected.

use anchorlog_types::{AnchorOutput, OutputId};
use tracing::debug;

/// One anchor in the local view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalViewEntry {
    pub anchor: AnchorOutput,
    pub rejected: bool,
}

/// Chain tail as seen by one committee member.
#[derive(Debug, Clone, Default)]
pub struct LocalView {
    /// Entries in chain order; the first one is the latest confirmed anchor.
    entries: Vec<LocalViewEntry>,
}

impl LocalView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor the next round must build on.
    ///
    /// `None` if the view is empty or any entry is rejected.
    pub fn base(&self) -> Option<&AnchorOutput> {
        if self.entries.iter().any(|e| e.rejected) {
            return None;
        }
        self.entries.last().map(|e| &e.anchor)
    }

    pub fn entries(&self) -> &[LocalViewEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a ledger confirmation.
    ///
    /// A known anchor becomes the head of the view. An unknown anchor was
    /// produced elsewhere (e.g. a rotation) and replaces the whole view.
    /// Returns whether the base changed.
    pub fn confirmed(&mut self, anchor: &AnchorOutput) -> bool {
        let before = self.base().map(|a| a.id());
        match self.position(&anchor.id()) {
            Some(pos) => {
                self.entries.drain(..pos);
                self.entries[0].rejected = false;
                self.drop_rejected_suffix();
                debug!(anchor = %anchor, dropped = pos, "Local view: confirmed known anchor");
            }
            None => {
                self.entries.clear();
                self.entries.push(LocalViewEntry {
                    anchor: anchor.clone(),
                    rejected: false,
                });
                debug!(anchor = %anchor, "Local view: reset to unknown confirmed anchor");
            }
        }
        self.base_changed(before)
    }

    /// Record a ledger rejection.
    ///
    /// Unknown anchors are stale notifications and ignored, as is a rejection
    /// of the confirmed head. Returns whether the base changed.
    pub fn rejected(&mut self, anchor: &AnchorOutput) -> bool {
        let Some(pos) = self.position(&anchor.id()) else {
            debug!(anchor = %anchor, "Local view: ignoring rejection of unknown anchor");
            return false;
        };
        if pos == 0 {
            debug!(anchor = %anchor, "Local view: ignoring rejection of confirmed anchor");
            return false;
        }
        let before = self.base().map(|a| a.id());
        self.entries[pos].rejected = true;
        self.drop_rejected_suffix();
        self.base_changed(before)
    }

    /// Truncate at the earliest rejected entry if everything after it is
    /// rejected too.
    fn drop_rejected_suffix(&mut self) {
        let Some(first) = self.entries.iter().position(|e| e.rejected) else {
            return;
        };
        if self.entries[first..].iter().all(|e| e.rejected) {
            self.entries.truncate(first);
            debug!(remaining = self.entries.len(), "Local view: dropped rejected suffix");
        }
    }

    /// Record an anchor produced by a consensus round built on `consumed`.
    ///
    /// Only appended when `consumed` is the current tail and the tail is not
    /// rejected; anything else means another round already moved the tip.
    /// Returns whether the base changed.
    pub fn published(&mut self, consumed: &OutputId, produced: &AnchorOutput) -> bool {
        let before = self.base().map(|a| a.id());
        let Some(tail) = self.entries.last() else {
            debug!(produced = %produced, "Local view: ignoring publish on empty view");
            return false;
        };
        if tail.anchor.id() != *consumed || tail.rejected {
            debug!(
                consumed = %consumed,
                tail = %tail.anchor,
                "Local view: ignoring stale publish"
            );
            return false;
        }
        if self.position(&produced.id()).is_some() {
            return false;
        }
        self.entries.push(LocalViewEntry {
            anchor: produced.clone(),
            rejected: false,
        });
        self.base_changed(before)
    }

    /// One-line summary for logs.
    pub fn status(&self) -> String {
        let rejected = self.entries.iter().filter(|e| e.rejected).count();
        match self.base() {
            Some(base) => format!(
                "LocalView{{len={}, rejected={}, base={}}}",
                self.entries.len(),
                rejected,
                base
            ),
            None => format!(
                "LocalView{{len={}, rejected={}, base=none}}",
                self.entries.len(),
                rejected
            ),
        }
    }

    fn position(&self, id: &OutputId) -> Option<usize> {
        self.entries.iter().position(|e| e.anchor.id() == *id)
    }

    fn base_changed(&self, before: Option<OutputId>) -> bool {
        self.base().map(|a| a.id()) != before
    }
}
