use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Placeholder for positions that have not been revealed yet.
pub const MASK: char = '*';

/// The secret answer together with its progressively revealed form.
///
/// All position arithmetic is done over `char`s, never bytes: answers are
/// typically Cyrillic and multi-byte in UTF-8.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WordSnapshot", into = "WordSnapshot")]
pub struct WordProgress {
    answer: String,
    revealed: String,
    tried: BTreeSet<char>,
}

/// Persisted form: the tried-letter set is derivable from `revealed`, so
/// only the two strings are stored.
#[derive(Debug, Serialize, Deserialize)]
struct WordSnapshot {
    answer: String,
    revealed: String,
}

impl From<WordSnapshot> for WordProgress {
    fn from(snapshot: WordSnapshot) -> Self {
        WordProgress::restore(snapshot.answer, snapshot.revealed)
    }
}

impl From<WordProgress> for WordSnapshot {
    fn from(word: WordProgress) -> Self {
        WordSnapshot {
            answer: word.answer,
            revealed: word.revealed,
        }
    }
}

fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl WordProgress {
    pub fn new(answer: impl Into<String>) -> Self {
        let answer = answer.into();
        let revealed = MASK.to_string().repeat(answer.chars().count());
        Self {
            answer,
            revealed,
            tried: BTreeSet::new(),
        }
    }

    /// Rebuild from a persisted `(answer, revealed)` pair. The tried set is
    /// reconstructed from the characters that are already open.
    pub fn restore(answer: String, revealed: String) -> Self {
        let mut word = Self::new(answer);
        if revealed.chars().count() == word.revealed.chars().count() {
            word.tried = revealed
                .chars()
                .filter(|&c| c != MASK)
                .map(lower)
                .collect();
            word.revealed = revealed;
        } else {
            tracing::warn!(
                word.revealed = %revealed,
                "Persisted revealed word has wrong length; remasking"
            );
        }
        word
    }

    /// Try a single letter. Returns `false` without mutating anything when
    /// the letter was already tried or does not occur in the answer;
    /// otherwise records it and opens every matching position, keeping the
    /// answer's original casing.
    pub fn reveal(&mut self, letter: char) -> bool {
        let letter = lower(letter);
        if self.tried.contains(&letter) {
            return false;
        }
        if !self.answer.chars().any(|c| lower(c) == letter) {
            return false;
        }
        self.tried.insert(letter);
        self.revealed = self
            .answer
            .chars()
            .zip(self.revealed.chars())
            .map(|(a, r)| if lower(a) == letter { a } else { r })
            .collect();
        true
    }

    /// Case-insensitive full-answer check. A correct guess opens the whole
    /// word as the capitalized candidate.
    pub fn check_answer(&mut self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        if candidate.to_lowercase() != self.answer.to_lowercase() {
            return false;
        }
        self.revealed = capitalize(candidate);
        true
    }

    pub fn is_complete(&self) -> bool {
        !self.revealed.contains(MASK)
    }

    pub fn masked(&self) -> &str {
        &self.revealed
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn tried_letters(&self) -> &BTreeSet<char> {
        &self.tried
    }
}
