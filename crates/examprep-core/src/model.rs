//! Core data model types for examprep.
//!
//! These are the typed entities the rest of the system works with. They are
//! only ever built by the parser in [`crate::parser`], which is where untyped
//! backend JSON gets validated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One answer choice of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    /// Identifier, unique within its question.
    pub id: String,
    /// Display text.
    pub text: String,
    /// Whether choosing this option scores the question.
    pub is_correct: bool,
}

/// A single question of a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier within the test.
    pub id: String,
    /// Display text; may contain markup.
    pub text: String,
    /// Subject label (e.g. "Physics").
    #[serde(default)]
    pub subject: String,
    /// Topic label within the subject.
    #[serde(default)]
    pub topic: String,
    /// Answer choices in display order.
    pub options: Vec<AnswerOption>,
}

impl Question {
    /// Look up an option by id.
    pub fn option(&self, option_id: &str) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    /// Ids of every option flagged correct.
    pub fn correct_option_ids(&self) -> impl Iterator<Item = &str> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id.as_str())
    }
}

/// The kind of test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestType {
    Mock,
    Practice,
    Chapter,
    PreviousYear,
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::Mock => write!(f, "mock"),
            TestType::Practice => write!(f, "practice"),
            TestType::Chapter => write!(f, "chapter"),
            TestType::PreviousYear => write!(f, "previous-year"),
        }
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(TestType::Mock),
            "practice" => Ok(TestType::Practice),
            "chapter" | "chapterwise" | "chapter-wise" => Ok(TestType::Chapter),
            "previous-year" | "previous_year" | "previousyear" | "previous year" | "pyq" => {
                Ok(TestType::PreviousYear)
            }
            other => Err(format!("unknown test type: {other}")),
        }
    }
}

/// Difficulty level of a test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" | "moderate" => Ok(Difficulty::Medium),
            "hard" | "difficult" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// A fully loaded test, ready to hand to an attempt session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDefinition {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Syllabus this test belongs to.
    #[serde(default)]
    pub syllabus_id: Option<String>,
    /// Subject this test belongs to.
    #[serde(default)]
    pub subject_id: Option<String>,
    /// Kind of test.
    pub test_type: TestType,
    /// Difficulty level.
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Time limit in minutes.
    pub duration_minutes: u32,
    /// Points awarded per correct answer.
    pub points_per_question: u32,
    /// Questions in display order.
    pub questions: Vec<Question>,
}

impl TestDefinition {
    /// Time limit in seconds.
    pub fn duration_secs(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    /// Look up a question by id.
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Position of a question in display order.
    pub fn question_index(&self, question_id: &str) -> Option<usize> {
        self.questions.iter().position(|q| q.id == question_id)
    }

    /// Maximum points available in this test.
    pub fn max_points(&self) -> u64 {
        self.questions.len() as u64 * u64::from(self.points_per_question)
    }
}
