//! The test-attempt session state machine.
//!
//! An [`AttemptSession`] is synchronous and owns everything about one
//! attempt: selections, review flags, the countdown and the cursor. It has
//! no timer of its own; something calls [`AttemptSession::tick`] once per
//! second (see [`crate::driver`]).
//!
//! Lifecycle is `Active -> Submitted -> Disposed` (or `Active -> Disposed`
//! when abandoned). Every mutating operation checks the phase first:
//!
//! - `select`, `clear` and `toggle_review` return [`SessionError::Closed`]
//!   once the session has left `Active`.
//! - `advance` and `go_to` keep working after submission so the attempt can
//!   be reviewed, and fail only once disposed.
//! - `tick` and `submit` are silent no-ops outside `Active`.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::model::{Question, TestDefinition};
use crate::results::{score_attempt, AttemptResult};

/// Lifecycle phase of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Active,
    Submitted,
    Disposed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Active => write!(f, "active"),
            Phase::Submitted => write!(f, "submitted"),
            Phase::Disposed => write!(f, "disposed"),
        }
    }
}

/// Cursor movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Outcome of a single timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Time is still running.
    Running { remaining_secs: u64 },
    /// This tick reached zero and submitted the attempt.
    Expired,
    /// The session is not active; nothing happened.
    Idle,
}

/// Read-only view of an attempt, cheap to clone and send across tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSnapshot {
    pub phase: Phase,
    pub remaining_secs: u64,
    pub cursor: usize,
    pub total_questions: usize,
    pub answered: usize,
    pub current_question_id: String,
    pub current_selection: Option<String>,
    pub marked_for_review: Vec<String>,
}

/// In-memory state of one learner attempting one test.
#[derive(Debug)]
pub struct AttemptSession {
    definition: TestDefinition,
    selections: HashMap<String, String>,
    review: BTreeSet<String>,
    remaining_secs: u64,
    cursor: usize,
    phase: Phase,
    result: Option<AttemptResult>,
}

impl AttemptSession {
    /// Start an attempt. Rejects definitions an attempt cannot run against.
    pub fn start(definition: TestDefinition) -> Result<Self, SessionError> {
        check_definition(&definition)?;

        let remaining_secs = definition.duration_secs();
        tracing::debug!(
            test_id = %definition.id,
            questions = definition.questions.len(),
            remaining_secs,
            "attempt started"
        );

        Ok(Self {
            definition,
            selections: HashMap::new(),
            review: BTreeSet::new(),
            remaining_secs,
            cursor: 0,
            phase: Phase::Active,
            result: None,
        })
    }

    pub fn definition(&self) -> &TestDefinition {
        &self.definition
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The question under the cursor.
    pub fn current_question(&self) -> &Question {
        &self.definition.questions[self.cursor]
    }

    /// The option currently selected for a question.
    pub fn selection(&self, question_id: &str) -> Option<&str> {
        self.selections.get(question_id).map(String::as_str)
    }

    pub fn is_marked_for_review(&self, question_id: &str) -> bool {
        self.review.contains(question_id)
    }

    pub fn answered_count(&self) -> usize {
        self.selections.len()
    }

    /// The submitted result, once there is one.
    pub fn result(&self) -> Option<&AttemptResult> {
        self.result.as_ref()
    }

    pub fn snapshot(&self) -> AttemptSnapshot {
        let current = self.current_question();
        AttemptSnapshot {
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            cursor: self.cursor,
            total_questions: self.definition.questions.len(),
            answered: self.selections.len(),
            current_question_id: current.id.clone(),
            current_selection: self.selections.get(&current.id).cloned(),
            marked_for_review: self.review.iter().cloned().collect(),
        }
    }

    /// Record a choice, replacing any earlier one for the same question.
    ///
    /// Returns `false` when the option was already selected.
    pub fn select(&mut self, question_id: &str, option_id: &str) -> Result<bool, SessionError> {
        self.ensure_active()?;

        let question = self
            .definition
            .question(question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;
        if question.option(option_id).is_none() {
            return Err(SessionError::UnknownOption {
                question_id: question_id.to_string(),
                option_id: option_id.to_string(),
            });
        }

        if self.selection(question_id) == Some(option_id) {
            return Ok(false);
        }
        self.selections
            .insert(question_id.to_string(), option_id.to_string());
        Ok(true)
    }

    /// Return a question to unanswered. Returns whether a selection existed.
    pub fn clear(&mut self, question_id: &str) -> Result<bool, SessionError> {
        self.ensure_active()?;
        self.ensure_question(question_id)?;
        Ok(self.selections.remove(question_id).is_some())
    }

    /// Flip the review flag. Returns `true` when the question is now marked.
    pub fn toggle_review(&mut self, question_id: &str) -> Result<bool, SessionError> {
        self.ensure_active()?;
        self.ensure_question(question_id)?;

        if self.review.remove(question_id) {
            Ok(false)
        } else {
            self.review.insert(question_id.to_string());
            Ok(true)
        }
    }

    /// Move the cursor one step. Moving past either end leaves it in place.
    pub fn advance(&mut self, direction: Direction) -> Result<usize, SessionError> {
        self.ensure_not_disposed()?;

        let last = self.definition.questions.len() - 1;
        self.cursor = match direction {
            Direction::Next => (self.cursor + 1).min(last),
            Direction::Previous => self.cursor.saturating_sub(1),
        };
        Ok(self.cursor)
    }

    /// Jump to a question by index, clamped to the last question.
    pub fn go_to(&mut self, index: usize) -> Result<usize, SessionError> {
        self.ensure_not_disposed()?;
        self.cursor = index.min(self.definition.questions.len() - 1);
        Ok(self.cursor)
    }

    /// Count one second down. Reaching zero submits the attempt.
    pub fn tick(&mut self) -> Tick {
        if self.phase != Phase::Active {
            return Tick::Idle;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return Tick::Running {
                remaining_secs: self.remaining_secs,
            };
        }

        tracing::info!(test_id = %self.definition.id, "time is up, submitting attempt");
        self.finish();
        Tick::Expired
    }

    /// Score the attempt and close it.
    ///
    /// Returns the result on the transition out of `Active` only. Any later
    /// call returns `None` and leaves the stored result untouched.
    pub fn submit(&mut self) -> Option<&AttemptResult> {
        if self.phase != Phase::Active {
            tracing::debug!(phase = %self.phase, "ignoring submit on closed attempt");
            return None;
        }
        self.finish();
        self.result.as_ref()
    }

    /// Abandon the attempt. Nothing is scored; a prior result is kept.
    pub fn dispose(&mut self) {
        self.phase = Phase::Disposed;
    }

    fn finish(&mut self) {
        let result = score_attempt(&self.definition, &self.selections, self.remaining_secs);
        tracing::debug!(
            test_id = %result.test_id,
            score = result.score,
            total = result.total_questions,
            "attempt submitted"
        );
        self.result = Some(result);
        self.phase = Phase::Submitted;
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Active => Ok(()),
            other => Err(SessionError::Closed(other)),
        }
    }

    fn ensure_not_disposed(&self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Disposed => Err(SessionError::Closed(Phase::Disposed)),
            _ => Ok(()),
        }
    }

    fn ensure_question(&self, question_id: &str) -> Result<(), SessionError> {
        self.definition
            .question(question_id)
            .map(|_| ())
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))
    }
}

fn check_definition(definition: &TestDefinition) -> Result<(), SessionError> {
    if definition.questions.is_empty() {
        return Err(SessionError::EmptyTest {
            test_id: definition.id.clone(),
        });
    }
    if definition.duration_minutes == 0 {
        return Err(SessionError::ZeroDuration {
            test_id: definition.id.clone(),
        });
    }

    let mut question_ids = HashSet::new();
    for q in &definition.questions {
        if !question_ids.insert(q.id.as_str()) {
            return Err(SessionError::DuplicateQuestion {
                test_id: definition.id.clone(),
                question_id: q.id.clone(),
            });
        }
        let mut option_ids = HashSet::new();
        for o in &q.options {
            if !option_ids.insert(o.id.as_str()) {
                return Err(SessionError::DuplicateOption {
                    question_id: q.id.clone(),
                    option_id: o.id.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::fixtures::definition;

    fn session(questions: usize) -> AttemptSession {
        AttemptSession::start(definition(questions, 1, 10)).unwrap()
    }

    fn tick_n(s: &mut AttemptSession, n: u64) {
        for _ in 0..n {
            s.tick();
        }
    }

    #[test]
    fn start_initializes_state() {
        let s = session(3);
        assert_eq!(s.phase(), Phase::Active);
        assert_eq!(s.remaining_secs(), 60);
        assert_eq!(s.cursor(), 0);
        assert_eq!(s.answered_count(), 0);
        assert!(s.result().is_none());
    }

    #[test]
    fn start_rejects_empty_test() {
        let err = AttemptSession::start(definition(0, 1, 10)).unwrap_err();
        assert_eq!(
            err,
            SessionError::EmptyTest {
                test_id: "fixture".into()
            }
        );
    }

    #[test]
    fn start_rejects_zero_duration() {
        let err = AttemptSession::start(definition(2, 0, 10)).unwrap_err();
        assert!(matches!(err, SessionError::ZeroDuration { .. }));
    }

    #[test]
    fn start_rejects_duplicate_ids() {
        let mut def = definition(2, 1, 1);
        def.questions[1].id = "q1".into();
        assert!(matches!(
            AttemptSession::start(def).unwrap_err(),
            SessionError::DuplicateQuestion { .. }
        ));

        let mut def = definition(1, 1, 1);
        def.questions[0].options[1].id = "q1-a".into();
        assert!(matches!(
            AttemptSession::start(def).unwrap_err(),
            SessionError::DuplicateOption { .. }
        ));
    }

    #[test]
    fn reselect_replaces_previous_choice() {
        let mut s = session(2);
        assert!(s.select("q1", "q1-a").unwrap());
        assert!(s.select("q1", "q1-b").unwrap());
        assert_eq!(s.selection("q1"), Some("q1-b"));
        assert_eq!(s.answered_count(), 1);
    }

    #[test]
    fn selecting_same_option_twice_is_idempotent() {
        let mut s = session(2);
        assert!(s.select("q2", "q2-a").unwrap());
        assert!(!s.select("q2", "q2-a").unwrap());
        assert_eq!(s.answered_count(), 1);
    }

    #[test]
    fn select_rejects_foreign_option() {
        let mut s = session(2);
        s.select("q1", "q1-a").unwrap();
        let err = s.select("q1", "q2-a").unwrap_err();
        assert!(matches!(err, SessionError::UnknownOption { .. }));
        assert_eq!(s.selection("q1"), Some("q1-a"));

        let err = s.select("q7", "q7-a").unwrap_err();
        assert_eq!(err, SessionError::UnknownQuestion("q7".into()));
    }

    #[test]
    fn clear_returns_question_to_unanswered() {
        let mut s = session(2);
        s.select("q1", "q1-a").unwrap();
        assert!(s.clear("q1").unwrap());
        assert!(!s.clear("q1").unwrap());

        let result = s.submit().unwrap();
        assert_eq!(result.answers[0].selected_option_id, None);
        assert!(!result.answers[0].is_correct);
    }

    #[test]
    fn toggle_review_flips_and_does_not_score() {
        let mut s = session(2);
        assert!(s.toggle_review("q2").unwrap());
        assert!(s.is_marked_for_review("q2"));
        assert!(!s.toggle_review("q2").unwrap());
        assert!(!s.is_marked_for_review("q2"));

        s.toggle_review("q1").unwrap();
        let result = s.submit().unwrap();
        assert_eq!(result.score, 0);
    }

    #[test]
    fn advance_is_clamped_at_both_ends() {
        let mut s = session(3);
        assert_eq!(s.advance(Direction::Previous).unwrap(), 0);
        assert_eq!(s.advance(Direction::Next).unwrap(), 1);
        assert_eq!(s.advance(Direction::Next).unwrap(), 2);
        assert_eq!(s.advance(Direction::Next).unwrap(), 2);
        assert_eq!(s.current_question().id, "q3");
        assert_eq!(s.go_to(99).unwrap(), 2);
        assert_eq!(s.go_to(0).unwrap(), 0);
    }

    #[test]
    fn single_question_cursor_stays_put() {
        let mut s = session(1);
        assert_eq!(s.advance(Direction::Next).unwrap(), 0);
        assert_eq!(s.advance(Direction::Previous).unwrap(), 0);
    }

    #[test]
    fn reference_scenario() {
        let mut s = session(3);
        s.select("q1", "q1-a").unwrap();
        s.select("q2", "q2-b").unwrap();
        tick_n(&mut s, 15);
        assert_eq!(s.remaining_secs(), 45);

        let result = s.submit().unwrap().clone();
        assert_eq!(result.score, 1);
        assert_eq!(result.total_questions, 3);
        assert_eq!(result.percentage, 33);
        assert_eq!(result.points, 10);
        assert_eq!(result.time_spent_secs, 15);

        let records: Vec<(&str, Option<&str>, bool)> = result
            .answers
            .iter()
            .map(|a| {
                (
                    a.question_id.as_str(),
                    a.selected_option_id.as_deref(),
                    a.is_correct,
                )
            })
            .collect();
        assert_eq!(
            records,
            vec![
                ("q1", Some("q1-a"), true),
                ("q2", Some("q2-b"), false),
                ("q3", None, false),
            ]
        );
    }

    #[test]
    fn answer_records_follow_definition_order() {
        let mut s = session(5);
        s.select("q4", "q4-a").unwrap();
        s.select("q2", "q2-a").unwrap();
        let result = s.submit().unwrap();
        let ids: Vec<&str> = result.answers.iter().map(|a| a.question_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3", "q4", "q5"]);
        assert!(result.percentage <= 100);
    }

    #[test]
    fn timer_expiry_submits_once_with_everything_unanswered() {
        let mut s = session(3);
        tick_n(&mut s, 59);
        assert_eq!(s.tick(), Tick::Expired);
        assert_eq!(s.phase(), Phase::Submitted);
        assert_eq!(s.tick(), Tick::Idle);
        assert_eq!(s.remaining_secs(), 0);

        let result = s.result().unwrap();
        assert_eq!(result.score, 0);
        assert_eq!(result.time_spent_secs, 60);
        assert!(result
            .answers
            .iter()
            .all(|a| a.selected_option_id.is_none() && !a.is_correct));
    }

    #[test]
    fn auto_submit_matches_manual_submit_at_zero() {
        let build = || {
            let mut s = session(3);
            s.select("q1", "q1-a").unwrap();
            s.select("q3", "q3-a").unwrap();
            tick_n(&mut s, 59);
            s
        };

        let mut manual = build();
        manual.remaining_secs = 0;
        let manual_result = manual.submit().unwrap().clone();

        let mut auto = build();
        assert_eq!(auto.tick(), Tick::Expired);
        assert_eq!(auto.result().unwrap(), &manual_result);
    }

    #[test]
    fn second_submit_is_a_noop() {
        let mut s = session(2);
        s.select("q1", "q1-a").unwrap();
        let first = s.submit().unwrap().clone();

        tick_n(&mut s, 10);
        assert!(s.submit().is_none());
        assert_eq!(s.result().unwrap(), &first);
        assert_eq!(s.remaining_secs(), 60);
    }

    #[test]
    fn mutations_rejected_after_submit() {
        let mut s = session(2);
        s.submit();
        assert_eq!(
            s.select("q1", "q1-a").unwrap_err(),
            SessionError::Closed(Phase::Submitted)
        );
        assert!(s.clear("q1").is_err());
        assert!(s.toggle_review("q1").is_err());
        assert_eq!(s.advance(Direction::Next).unwrap(), 1);
    }

    #[test]
    fn disposed_session_is_inert() {
        let mut s = session(2);
        s.dispose();
        assert_eq!(s.tick(), Tick::Idle);
        assert!(s.submit().is_none());
        assert!(s.result().is_none());
        assert_eq!(
            s.advance(Direction::Next).unwrap_err(),
            SessionError::Closed(Phase::Disposed)
        );
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut s = session(3);
        s.advance(Direction::Next).unwrap();
        s.select("q2", "q2-b").unwrap();
        s.toggle_review("q3").unwrap();
        s.tick();

        let snap = s.snapshot();
        assert_eq!(snap.phase, Phase::Active);
        assert_eq!(snap.remaining_secs, 59);
        assert_eq!(snap.cursor, 1);
        assert_eq!(snap.current_question_id, "q2");
        assert_eq!(snap.current_selection.as_deref(), Some("q2-b"));
        assert_eq!(snap.answered, 1);
        assert_eq!(snap.marked_for_review, vec!["q3".to_string()]);
    }
}
