//! Conversation history — the bounded, caller-owned record of prior turns.
//!
//! The history is owned by the caller's session and threaded through each
//! exchange. It is only ever changed through [`ConversationHistory::append`]
//! or [`ConversationHistory::reconcile`], which re-apply every bound at once:
//!
//! 1. keep the newest `max_items` turns
//! 2. drop oldest turns until the cumulative length fits `max_chars`
//! 3. drop exact `(user, assistant)` duplicates, first occurrence wins
//! 4. drop degenerate turns (blank user, or a reply shorter than 3 chars)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default cap on the number of retained turns.
pub const DEFAULT_MAX_ITEMS: usize = 15;

/// Default cap on cumulative characters across all retained turns.
pub const DEFAULT_MAX_CHARS: usize = 10_000;

/// Shortest assistant reply worth keeping.
const MIN_REPLY_CHARS: usize = 3;

/// One completed user/assistant exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user: String,

    /// Accepted as `ai` too, which is what existing front-ends send.
    #[serde(default, alias = "ai", skip_serializing_if = "Option::is_none")]
    pub assistant: Option<String>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(user: impl Into<String>, assistant: Option<String>) -> Self {
        Self {
            user: user.into(),
            assistant,
            timestamp: Utc::now(),
        }
    }

    /// Length in characters of both sides of the turn.
    pub fn char_len(&self) -> usize {
        self.user.chars().count() + self.assistant.as_deref().map_or(0, |a| a.chars().count())
    }

    fn is_degenerate(&self) -> bool {
        if self.user.trim().is_empty() {
            return true;
        }
        match self.assistant.as_deref() {
            None | Some("") => false,
            Some(reply) => reply.trim().chars().count() < MIN_REPLY_CHARS,
        }
    }
}

/// Bounds applied during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    pub max_items: usize,
    pub max_chars: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

/// Summary figures for status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_entries: usize,
    pub total_length: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

/// An ordered, reconciled sequence of turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from arbitrary turns, enforcing every bound.
    pub fn reconcile(mut turns: Vec<ConversationTurn>, limits: HistoryLimits) -> Self {
        if turns.len() > limits.max_items {
            turns.drain(..turns.len() - limits.max_items);
        }

        let total: usize = turns.iter().map(ConversationTurn::char_len).sum();
        if total > limits.max_chars {
            let mut budget = 0;
            let mut keep_from = turns.len();
            for (i, turn) in turns.iter().enumerate().rev() {
                let len = turn.char_len();
                if budget + len > limits.max_chars {
                    break;
                }
                budget += len;
                keep_from = i;
            }
            turns.drain(..keep_from);
        }

        let mut seen = HashSet::new();
        turns.retain(|t| seen.insert((t.user.clone(), t.assistant.clone())));

        turns.retain(|t| !t.is_degenerate());

        Self { turns }
    }

    /// Append a turn and re-apply all bounds.
    pub fn append(&mut self, turn: ConversationTurn, limits: HistoryLimits) {
        let mut turns = std::mem::take(&mut self.turns);
        turns.push(turn);
        *self = Self::reconcile(turns, limits);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The newest `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        &self.turns[self.turns.len().saturating_sub(n)..]
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Cumulative character length of every turn.
    pub fn total_chars(&self) -> usize {
        self.turns.iter().map(ConversationTurn::char_len).sum()
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            total_entries: self.len(),
            total_length: self.total_chars(),
            oldest_entry: self.turns.first().map(|t| t.timestamp),
            newest_entry: self.turns.last().map(|t| t.timestamp),
        }
    }
}
