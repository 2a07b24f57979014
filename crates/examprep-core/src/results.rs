//! Attempt result types and scoring.
//!
//! Scoring is computed entirely on the client. Whatever the backend echoes
//! back about a submitted attempt is never folded into these values.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseError;
use crate::model::TestDefinition;

/// The learner's answer to one question, as recorded at submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: String,
    /// `None` when the question was left unanswered.
    pub selected_option_id: Option<String>,
    pub is_correct: bool,
}

/// Write-once summary of a submitted attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub test_id: String,
    /// Number of correct answers.
    pub score: u32,
    pub total_questions: u32,
    /// `round(score / total * 100)`, or 0 for an empty test.
    pub percentage: u32,
    /// `score * points_per_question`.
    pub points: u64,
    pub time_spent_secs: u64,
    /// One record per question, in test order.
    pub answers: Vec<AnswerRecord>,
}

impl AttemptResult {
    /// Number of questions with a selection.
    pub fn attempted(&self) -> u32 {
        self.answers
            .iter()
            .filter(|a| a.selected_option_id.is_some())
            .count() as u32
    }

    /// Number of answered-but-wrong questions.
    pub fn incorrect(&self) -> u32 {
        self.attempted().saturating_sub(self.score)
    }

    /// Number of questions left without a selection.
    pub fn unanswered(&self) -> u32 {
        self.total_questions.saturating_sub(self.attempted())
    }

    /// Check that the summary fields agree with the answer records.
    ///
    /// `score_attempt` always produces a consistent result; this guards
    /// results read back from disk.
    pub fn check_consistency(&self) -> Result<(), ParseError> {
        let invalid = |field: &'static str, message: String| ParseError::InvalidValue {
            context: format!("result for test {}", self.test_id),
            field,
            message,
        };

        if self.answers.len() != self.total_questions as usize {
            return Err(invalid(
                "answers",
                format!(
                    "{} answer records for {} questions",
                    self.answers.len(),
                    self.total_questions
                ),
            ));
        }
        if let Some(a) = self
            .answers
            .iter()
            .find(|a| a.is_correct && a.selected_option_id.is_none())
        {
            return Err(invalid(
                "answers",
                format!("question {} is correct without a selection", a.question_id),
            ));
        }
        let correct = self.answers.iter().filter(|a| a.is_correct).count();
        if self.score as usize != correct {
            return Err(invalid(
                "score",
                format!("score {} but {correct} correct answer records", self.score),
            ));
        }
        if self.percentage > 100 {
            return Err(invalid(
                "percentage",
                format!("{} is above 100", self.percentage),
            ));
        }
        Ok(())
    }

    /// Render a short markdown summary.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!("## Result: {}\n\n", self.test_id));
        md.push_str("| Metric | Value |\n|--------|-------|\n");
        md.push_str(&format!(
            "| Score | {}/{} |\n",
            self.score, self.total_questions
        ));
        md.push_str(&format!("| Percentage | {}% |\n", self.percentage));
        md.push_str(&format!("| Points | {} |\n", self.points));
        md.push_str(&format!("| Attempted | {} |\n", self.attempted()));
        md.push_str(&format!("| Incorrect | {} |\n", self.incorrect()));
        md.push_str(&format!(
            "| Time spent | {} |\n",
            format_duration(self.time_spent_secs)
        ));

        md.push_str("\n### Answers\n\n| # | Question | Selected | Correct |\n|---|----------|----------|---------|\n");
        for (i, a) in self.answers.iter().enumerate() {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                i + 1,
                a.question_id,
                a.selected_option_id.as_deref().unwrap_or("-"),
                if a.is_correct { "yes" } else { "no" }
            ));
        }
        md
    }
}

/// Format seconds as `mm:ss` (or `h:mm:ss` past an hour).
pub fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Score a set of selections against a test definition.
///
/// Every question of the definition gets a record, answered or not, in
/// definition order. `remaining_secs` is clamped to the test duration.
pub fn score_attempt(
    definition: &TestDefinition,
    selections: &HashMap<String, String>,
    remaining_secs: u64,
) -> AttemptResult {
    let mut score = 0u32;

    let answers: Vec<AnswerRecord> = definition
        .questions
        .iter()
        .map(|q| {
            let selected = selections.get(&q.id);
            let is_correct = selected
                .and_then(|option_id| q.option(option_id))
                .is_some_and(|o| o.is_correct);
            if is_correct {
                score += 1;
            }
            AnswerRecord {
                question_id: q.id.clone(),
                selected_option_id: selected.cloned(),
                is_correct,
            }
        })
        .collect();

    let total_questions = answers.len() as u32;
    let percentage = if total_questions == 0 {
        0
    } else {
        (f64::from(score) / f64::from(total_questions) * 100.0).round() as u32
    };

    let duration_secs = definition.duration_secs();

    AttemptResult {
        test_id: definition.id.clone(),
        score,
        total_questions,
        percentage,
        points: u64::from(score) * u64::from(definition.points_per_question),
        time_spent_secs: duration_secs - remaining_secs.min(duration_secs),
        answers,
    }
}

/// What ended the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitTrigger {
    /// The learner pressed submit.
    Manual,
    /// The countdown reached zero.
    Timer,
}

impl fmt::Display for SubmitTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitTrigger::Manual => write!(f, "manual"),
            SubmitTrigger::Timer => write!(f, "timer"),
        }
    }
}

/// The envelope handed to a result sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub attempt_id: Uuid,
    pub test_id: String,
    #[serde(default)]
    pub learner_id: Option<String>,
    pub trigger: SubmitTrigger,
    pub submitted_at: DateTime<Utc>,
    pub result: AttemptResult,
}

impl SubmissionPayload {
    pub fn new(result: AttemptResult, trigger: SubmitTrigger, learner_id: Option<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            test_id: result.test_id.clone(),
            learner_id,
            trigger,
            submitted_at: Utc::now(),
            result,
        }
    }
}
