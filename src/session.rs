use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use prometheus::Gauge;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::metrics::ACTIVE_SESSIONS;
use crate::models::ChatId;
use crate::rate_limit::{self, Admission, ConversationSession};

// every read-modify-write on one chat id runs under that key's shard lock;
// no lock is held across an .await
pub struct SessionStore {
    sessions: DashMap<ChatId, ConversationSession>,
    // bumped by `remove`, so a message that looked before the close cannot
    // open a session after it
    epochs: DashMap<ChatId, u64>,
    gauge: Gauge,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_gauge(ACTIVE_SESSIONS.clone())
    }

    /// Store that reports its size through `gauge` instead of the global one.
    pub fn with_gauge(gauge: Gauge) -> Self {
        Self {
            sessions: DashMap::new(),
            epochs: DashMap::new(),
            gauge,
        }
    }

    pub fn contains(&self, id: ChatId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// How many times the conversation has been closed with `remove`.
    pub fn epoch(&self, id: ChatId) -> u64 {
        self.epochs.get(&id).map(|e| *e).unwrap_or(0)
    }

    // Account a message at `now` against `entry`, opening a session when it
    // is vacant, and run `f` while the entry guard is still held.
    fn account<R>(
        &self,
        entry: Entry<'_, ChatId, ConversationSession>,
        now: Instant,
        f: impl FnOnce(&mut ConversationSession, bool) -> R,
    ) -> R {
        match entry {
            Entry::Occupied(mut entry) => {
                let session = entry.get_mut();
                *session = rate_limit::evaluate(*session, now);
                f(session, true)
            }
            Entry::Vacant(entry) => {
                let mut session = entry.insert(ConversationSession::open(now));
                self.gauge.inc();
                f(&mut session, false)
            }
        }
    }

    /// Open a session on first sight of `id`, otherwise run the rate policy
    /// on the stored one. Returns a snapshot and whether it already existed.
    ///
    /// Concurrent first arrivals create exactly one session; the others
    /// evaluate the winner's session instead of re-initializing it.
    pub fn get_or_create(&self, id: ChatId, now: Instant) -> (ConversationSession, bool) {
        self.account(self.sessions.entry(id), now, |session, existed| (*session, existed))
    }

    /// Admission decision for `id`. Among concurrent callers, only one sees
    /// `Admission::Warn` per denial episode. Unknown ids are admitted.
    pub fn admit(&self, id: ChatId) -> Admission {
        match self.sessions.get_mut(&id) {
            Some(mut session) => session.admit(),
            None => Admission::Allowed,
        }
    }

    /// `get_or_create` and `admit` as one step, so no other message for the
    /// same conversation can slip in between accounting and the decision.
    ///
    /// `epoch` is what the caller read from [`SessionStore::epoch`] before
    /// checking registration. Returns `None` without touching the store when
    /// the conversation was closed since then.
    pub fn check_in(&self, id: ChatId, epoch: u64, now: Instant) -> Option<Admission> {
        let entry = self.sessions.entry(id);
        if self.epoch(id) != epoch {
            return None;
        }
        Some(self.account(entry, now, |session, existed| {
            if !existed {
                debug!(chat_id = id, "opened session");
            }
            session.admit()
        }))
    }

    /// Close the conversation: drop its session and refuse check-ins that
    /// started before this call.
    pub fn remove(&self, id: ChatId) -> bool {
        *self.epochs.entry(id).or_insert(0) += 1;
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            self.gauge.dec();
        }
        removed
    }

    /// Drop sessions not seen for at least `idle_for`. Returns how many went.
    pub fn evict_idle(&self, idle_for: Duration, now: Instant) -> usize {
        let mut evicted = 0;
        self.sessions.retain(|_, s| {
            let keep = now.saturating_duration_since(s.last_seen) < idle_for;
            if !keep {
                evicted += 1;
            }
            keep
        });
        self.gauge.sub(evicted as f64);
        evicted
    }
}
