// conversation.rs — Bounded transcript of turns exchanged with the
// inference service. Turns arrive in USER-then-MODEL pairs and the oldest
// are evicted first once the cap is reached.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of turns kept for conversational context.
/// Even, so USER/MODEL pairs are always evicted together.
pub const HISTORY_CAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One turn of the conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

/// Ordered, FIFO-bounded sequence of [`ConversationTurn`]s.
///
/// Mutated only by the orchestrator after a successful cycle; requests in
/// flight hold a [`Transcript::snapshot`] copy and never observe later
/// mutation.
#[derive(Debug)]
pub struct Transcript {
    turns: VecDeque<ConversationTurn>,
    cap: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(HISTORY_CAP)
    }
}

impl Transcript {
    /// Create a transcript bounded to `cap` turns. Caps below one pair are
    /// raised to 2, and odd caps round up to the next even value so eviction
    /// never splits a USER/MODEL pair.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(2);
        Self {
            turns: VecDeque::new(),
            cap: cap + cap % 2,
        }
    }

    /// Push one USER turn then one MODEL turn, evicting from the front until
    /// the length cap holds.
    pub fn append(&mut self, user_text: &str, model_text: &str) {
        self.turns.push_back(ConversationTurn {
            role: Role::User,
            text: user_text.to_string(),
        });
        self.turns.push_back(ConversationTurn {
            role: Role::Model,
            text: model_text.to_string(),
        });
        while self.turns.len() > self.cap {
            self.turns.pop_front();
        }
    }

    /// Read-only copy for inclusion in the next request.
    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
