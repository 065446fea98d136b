use std::time::Duration;
use tokio::time::Instant;

// Length of one rate accounting window
pub const WINDOW: Duration = Duration::from_secs(60);

// More than this many repeats after the window-opening message means denial,
// i.e. the 6th message inside one window is the first one refused.
pub const COUNTER_LIMIT: u32 = 4;

// Rolling rate state of one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationSession {
    pub window_start: Instant,  // when the current window opened
    pub last_seen: Instant,     // last evaluated message, used for idle eviction
    pub request_counter: u32,   // messages seen in this window after the opening one
    pub is_allowed: bool,
    pub is_notified: bool,      // warning already sent for this denial episode
}

// Outcome of asking whether a message may go to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    // First refusal of the episode: caller must send the warning
    Warn,
    // Already warned: drop without a reply
    Silenced,
}

impl ConversationSession {
    // Fresh session for a conversation's first message. Same state a window
    // rollover produces, so a new conversation gets the same burst tolerance.
    pub fn open(now: Instant) -> Self {
        Self {
            window_start: now,
            last_seen: now,
            request_counter: 0,
            is_allowed: true,
            is_notified: false,
        }
    }

    // Admission decision for the current state. Only the first refusal of an
    // episode flips `is_notified`; the session keeps blocking until rollover.
    pub fn admit(&mut self) -> Admission {
        if self.is_allowed {
            return Admission::Allowed;
        }
        if !self.is_notified {
            self.is_notified = true;
            return Admission::Warn;
        }
        Admission::Silenced
    }
}

/// Rate policy: account one more message at `now` and return the next state.
///
/// Window rollover takes precedence over the overflow check, and a message
/// arriving exactly one window after `window_start` rolls the window over.
pub fn evaluate(session: ConversationSession, now: Instant) -> ConversationSession {
    let mut next = session;
    next.last_seen = now;
    next.request_counter = next.request_counter.saturating_add(1);

    if now.saturating_duration_since(session.window_start) >= WINDOW {
        next.request_counter = 0;
        next.is_notified = false;
        next.window_start = now;
        next.is_allowed = true;
    } else if next.request_counter > COUNTER_LIMIT {
        next.is_allowed = false;
    }

    next
}
