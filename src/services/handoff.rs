use log::{debug, warn};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::core::state::GeneratedDraft;

/// One-shot, session-scoped mailbox carrying a draft to the editor.
///
/// `store` overwrites any unread draft; `consume` takes and clears it.
/// Drafts left unread longer than the TTL are dropped on the next `consume`.
#[derive(Debug)]
pub struct DraftHandoff {
    slot: Mutex<Option<(GeneratedDraft, Instant)>>,
    ttl: Duration,
}

impl DraftHandoff {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
        }
    }

    pub fn store(&self, draft: GeneratedDraft) {
        let mut slot = self.lock();
        if slot.is_some() {
            debug!("Overwriting unread draft in handoff");
        }
        *slot = Some((draft, Instant::now()));
    }

    pub fn consume(&self) -> Option<GeneratedDraft> {
        let (draft, stored_at) = self.lock().take()?;
        if stored_at.elapsed() > self.ttl {
            warn!("Discarding draft '{}' left unread past its TTL", draft.title);
            return None;
        }
        Some(draft)
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    // The slot is replaced whole, so a poisoned guard still holds a valid value.
    fn lock(&self) -> std::sync::MutexGuard<'_, Option<(GeneratedDraft, Instant)>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Editable fields of an article, seeded from a handed-off draft at most once.
#[derive(Debug, Default, Clone)]
pub struct ArticleEditor {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    seeded: bool,
}

impl ArticleEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only on the call that actually applied a draft.
    /// Later calls never touch the fields or the handoff, even if a new
    /// draft has been stored since.
    pub fn seed_from(&mut self, handoff: &DraftHandoff) -> bool {
        if self.seeded {
            debug!("Editor already seeded, ignoring handoff");
            return false;
        }
        match handoff.consume() {
            Some(draft) => {
                self.title = draft.title;
                self.excerpt = draft.excerpt;
                self.content = draft.content;
                self.seeded = true;
                true
            }
            None => false,
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn draft(title: &str) -> GeneratedDraft {
        GeneratedDraft {
            title: title.to_string(),
            excerpt: "excerpt".to_string(),
            content: "content".to_string(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_consume_twice_returns_absent_second_time() {
        let handoff = DraftHandoff::new(Duration::from_secs(60));
        handoff.store(draft("a"));
        assert!(handoff.is_pending());
        assert_eq!(handoff.consume().unwrap().title, "a");
        assert!(handoff.consume().is_none());
        assert!(!handoff.is_pending());
    }

    #[test]
    fn test_store_overwrites_unread_draft() {
        let handoff = DraftHandoff::new(Duration::from_secs(60));
        handoff.store(draft("first"));
        handoff.store(draft("second"));
        assert_eq!(handoff.consume().unwrap().title, "second");
        assert!(handoff.consume().is_none());
    }

    #[test]
    fn test_expired_draft_is_discarded() {
        let handoff = DraftHandoff::new(Duration::ZERO);
        handoff.store(draft("stale"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(handoff.consume().is_none());
        assert!(!handoff.is_pending());
    }

    #[test]
    fn test_editor_seeds_exactly_once() {
        let handoff = DraftHandoff::new(Duration::from_secs(60));
        let mut editor = ArticleEditor::new();
        assert!(!editor.seed_from(&handoff));
        assert!(!editor.is_seeded());

        handoff.store(draft("first"));
        assert!(editor.seed_from(&handoff));
        editor.content.push_str(" edited");

        // duplicate mount after a new store must not clobber edits
        handoff.store(draft("second"));
        assert!(!editor.seed_from(&handoff));
        assert_eq!(editor.title, "first");
        assert_eq!(editor.content, "content edited");
        assert!(handoff.is_pending());
    }

    #[test]
    fn test_concurrent_consumers_get_at_most_one_draft() {
        let handoff = std::sync::Arc::new(DraftHandoff::new(Duration::from_secs(60)));
        handoff.store(draft("only"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let handoff = handoff.clone();
                std::thread::spawn(move || handoff.consume().is_some())
            })
            .collect();
        let delivered = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|got| *got)
            .count();
        assert_eq!(delivered, 1);
    }
}
