//! ABOUTME: Bounded, process-local Session Cache (`spec.md` §4.4)
//! ABOUTME: Idle-TTL and least-recently-touched capacity eviction over a concurrent map

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use qa_core::{CacheEntry, CacheEntryUpdate, SessionId};
use tracing::debug;

/// `get`/`put`/`sweep` over a `DashMap`, mirroring the shape of the
/// teacher's `SessionManager`: a concurrent map guarded per-key, with
/// idle and capacity eviction run as opportunistic maintenance rather
/// than a background task.
pub struct SessionCache {
    entries: DashMap<SessionId, CacheEntry>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl SessionCache {
    #[must_use]
    pub fn new(max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            idle_ttl,
            max_sessions,
        }
    }

    /// Returns a clone of the entry, refreshing `last_touched_at` on a hit.
    #[must_use]
    pub fn get(&self, session_id: &SessionId) -> Option<CacheEntry> {
        let mut entry = self.entries.get_mut(session_id)?;
        entry.last_touched_at = Utc::now();
        debug!(session_id = %session_id, "session cache get hit");
        Some(entry.clone())
    }

    /// Returns a clone of the entry without refreshing `last_touched_at`.
    ///
    /// Used by callers that must inspect cached artifacts ahead of an
    /// awaited, cancellable call (e.g. the Execution Pipeline's
    /// reuse-judge step): a plain `get` would count as activity even if
    /// the turn is later cancelled, violating the "cache entry preserved
    /// verbatim on timeout" invariant (`spec.md` §5, §8.5). Callers that
    /// do want the activity recorded call `touch` once the turn is known
    /// to have completed.
    #[must_use]
    pub fn peek(&self, session_id: &SessionId) -> Option<CacheEntry> {
        self.entries.get(session_id).map(|entry| entry.clone())
    }

    /// Refreshes `last_touched_at` on an existing entry only, recording a
    /// cache hit without otherwise mutating it. No-op if the session has
    /// no entry.
    pub fn touch(&self, session_id: &SessionId) {
        if let Some(mut entry) = self.entries.get_mut(session_id) {
            entry.last_touched_at = Utc::now();
            debug!(session_id = %session_id, "session cache touched");
        }
    }

    /// Merges `update` into the existing entry (or a fresh one), refreshing
    /// `last_touched_at`. Fields left unset in `update` are preserved.
    pub fn put(&self, session_id: &SessionId, update: CacheEntryUpdate) {
        let mut entry = self
            .entries
            .entry(session_id.clone())
            .or_insert_with(|| CacheEntry::new(session_id.clone()));

        if let Some(structured) = update.structured_result {
            entry.structured_result = Some(structured);
        }
        if let Some(unstructured) = update.unstructured_result {
            entry.unstructured_result = Some(unstructured);
        }
        if let Some(answer) = update.last_answer {
            entry.last_answer = Some(answer);
        }
        if let Some(mode) = update.last_mode {
            entry.last_mode = Some(mode);
        }
        entry.last_touched_at = Utc::now();

        drop(entry);
        debug!(session_id = %session_id, "session cache entry updated");
        self.evict_over_capacity();
    }

    /// Idle-TTL and capacity eviction. Safe to call opportunistically;
    /// cheap when the cache is under both thresholds.
    pub fn sweep(&self) {
        let cutoff = Utc::now() - self.idle_ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.last_touched_at >= cutoff);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, "session cache idle-ttl sweep");
        }
        self.evict_over_capacity();
    }

    /// Checks presence without refreshing `last_touched_at` — used by
    /// callers (e.g. per-session lock pruning) that must not count as a
    /// touch.
    #[must_use]
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.entries.contains_key(session_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_over_capacity(&self) {
        let overflow = self.entries.len().saturating_sub(self.max_sessions);
        if overflow == 0 {
            return;
        }

        let mut by_touch: Vec<(SessionId, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().last_touched_at))
            .collect();
        by_touch.sort_by_key(|(_, touched)| *touched);

        for (session_id, _) in by_touch.into_iter().take(overflow) {
            debug!(session_id = %session_id, "session cache capacity eviction");
            self.entries.remove(&session_id);
        }
    }
}
