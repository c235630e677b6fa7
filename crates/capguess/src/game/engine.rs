//! Per-session game state and the guess-submission transition.

use serde::{Deserialize, Serialize};

use super::{is_match, percentage_diff, GuessOutcome, Subject, MATCH_POINTS};

/// One player's game state. All mutation goes through [`submit_guess`],
/// [`next_subject`], and [`reset`]; nothing outside this type writes a
/// field directly.
///
/// [`submit_guess`]: GameSession::submit_guess
/// [`next_subject`]: GameSession::next_subject
/// [`reset`]: GameSession::reset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    current_subject: Option<Subject>,
    last_guess: Option<f64>,
    is_revealing: bool,
    score: u32,
    total_guesses: u32,
    match_count: u32,
    streak: u32,
}

impl GameSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a parsed guess against the current subject.
    ///
    /// With no active subject this is a no-op returning `None`; the
    /// session state is untouched. Otherwise every submission counts a
    /// guess, updates the aggregates, and enters the reveal phase, win
    /// or lose.
    pub fn submit_guess(&mut self, guess: f64) -> Option<GuessOutcome> {
        let subject = match &self.current_subject {
            Some(subject) => subject.clone(),
            None => {
                tracing::debug!("guess submitted with no active subject, ignoring");
                return None;
            }
        };

        let matched = is_match(guess, subject.actual_value);
        let outcome = GuessOutcome {
            subject_id: subject.company_id,
            guess,
            actual_value: subject.actual_value,
            is_match: matched,
            percentage_diff: percentage_diff(guess, subject.actual_value),
        };

        self.last_guess = Some(guess);
        self.total_guesses += 1;
        if matched {
            self.score += MATCH_POINTS;
            self.match_count += 1;
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        self.is_revealing = true;

        tracing::info!(
            subject = %outcome.subject_id,
            is_match = matched,
            percentage_diff = outcome.percentage_diff,
            streak = self.streak,
            "guess submitted"
        );

        Some(outcome)
    }

    /// Install the next subject and leave the reveal phase. Aggregates
    /// carry over.
    pub fn next_subject(&mut self, subject: Subject) {
        self.current_subject = Some(subject);
        self.last_guess = None;
        self.is_revealing = false;
    }

    /// Clear the subject and zero every aggregate.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn current_subject(&self) -> Option<&Subject> {
        self.current_subject.as_ref()
    }

    pub fn last_guess(&self) -> Option<f64> {
        self.last_guess
    }

    pub fn is_revealing(&self) -> bool {
        self.is_revealing
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn total_guesses(&self) -> u32 {
        self.total_guesses
    }

    pub fn match_count(&self) -> u32 {
        self.match_count
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }
}
