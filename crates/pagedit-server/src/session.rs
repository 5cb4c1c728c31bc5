//! Edit buffering for a live-editing client.
//!
//! The page reports an element's content whenever it loses focus or its
//! subtree mutates. [`EditSession`] turns those reports into a minimal batch
//! of pending edits that is handed to [`EditSaveService`] on save.
//!
//! The HTTP API takes whole batches, so the router does not hold a session.
//! Processes that embed the save service (a dev-server bridge, an editor
//! plugin) keep one session per open page instead:
//!
//! ```no_run
//! use pagedit_server::{EditSaveService, EditSession, RawEdit, SaveError};
//!
//! async fn on_blur(
//!     session: &EditSession,
//!     saver: &EditSaveService,
//! ) -> Result<(), SaveError> {
//!     session.observe("src/pages/index.astro", "3:5", "<h1>Title</h1>").await;
//!     session
//!         .record(RawEdit::new("src/pages/index.astro", "3:5", "h1", "<h1>New</h1>"))
//!         .await;
//!
//!     if let Some(outcome) = session.flush(saver).await? {
//!         println!("saved {:?}", outcome.files);
//!     }
//!     Ok(())
//! }
//! ```

use crate::edit::RawEdit;
use crate::save::{EditSaveService, SaveError, SaveOutcome};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// Identifies an element by source file and `loc`.
type ElementKey = (String, String);

fn key_of(edit: &RawEdit) -> Option<ElementKey> {
    Some((edit.file.clone()?, edit.loc.clone()?))
}

#[derive(Debug, Default)]
struct SessionState {
    /// Last content seen per element.
    observed: HashMap<ElementKey, String>,
    /// Edits not saved yet, at most one per element.
    pending: Vec<RawEdit>,
}

impl SessionState {
    fn upsert(&mut self, key: &ElementKey, edit: RawEdit) {
        let existing = self
            .pending
            .iter_mut()
            .find(|e| key_of(e).as_ref() == Some(key));
        match existing {
            Some(slot) => *slot = edit,
            None => self.pending.push(edit),
        }
    }
}

/// Pending edits of one editing session.
#[derive(Debug, Default)]
pub struct EditSession {
    state: Mutex<SessionState>,
    paused: AtomicUsize,
}

/// Suspends tracking while alive. Guards nest.
#[must_use = "tracking resumes as soon as the guard is dropped"]
pub struct PauseGuard<'a> {
    session: &'a EditSession,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.session.paused.fetch_sub(1, Ordering::SeqCst);
    }
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember an element's current content without recording an edit.
    pub async fn observe(&self, file: &str, loc: &str, content: &str) {
        let mut state = self.state.lock().await;
        state
            .observed
            .insert((file.to_string(), loc.to_string()), content.to_string());
    }

    /// Record a reported edit.
    ///
    /// Returns `false` when tracking is paused, the edit lacks a file or
    /// `loc`, or the content equals what was last observed for the element.
    /// A recorded edit replaces any pending edit for the same element.
    pub async fn record(&self, edit: RawEdit) -> bool {
        if self.is_paused() {
            return false;
        }
        let Some(key) = key_of(&edit) else {
            return false;
        };
        let content = edit.content.clone().unwrap_or_default();

        let mut state = self.state.lock().await;
        if state.observed.get(&key) == Some(&content) {
            return false;
        }
        state.observed.insert(key.clone(), content);
        state.upsert(&key, edit);
        debug!(file = %key.0, loc = %key.1, "Recorded edit");
        true
    }

    /// Suspend tracking until the returned guard is dropped.
    pub fn pause(&self) -> PauseGuard<'_> {
        self.paused.fetch_add(1, Ordering::SeqCst);
        PauseGuard { session: self }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst) > 0
    }

    pub async fn pending(&self) -> Vec<RawEdit> {
        self.state.lock().await.pending.clone()
    }

    /// Save pending edits.
    ///
    /// Returns `Ok(None)` when nothing is pending. Pending edits are cleared
    /// only after a successful save; on failure they are kept, with edits
    /// recorded during the save taking precedence.
    pub async fn flush(
        &self,
        service: &EditSaveService,
    ) -> Result<Option<SaveOutcome>, SaveError> {
        let batch = std::mem::take(&mut self.state.lock().await.pending);
        if batch.is_empty() {
            return Ok(None);
        }

        match service.save(batch.clone()).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) => {
                let mut state = self.state.lock().await;
                let newer = std::mem::replace(&mut state.pending, batch);
                for edit in newer {
                    if let Some(key) = key_of(&edit) {
                        state.upsert(&key, edit);
                    }
                }
                Err(e)
            }
        }
    }
}
