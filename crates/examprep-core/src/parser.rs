//! Test definition parser.
//!
//! Converts the backend's loosely-shaped JSON into a typed [`TestDefinition`].
//! Field names are accepted in both camelCase and snake_case, ids may be
//! strings or numbers, and the payload may be wrapped in a `data` or `test`
//! envelope. Anything required that is missing is an error, never a default.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::ParseError;
use crate::model::{AnswerOption, Difficulty, Question, TestDefinition, TestType};

const DEFAULT_POINTS_PER_QUESTION: u32 = 1;

/// An identifier the backend sends as either a string or a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Str(String),
    Num(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Str(s) => s,
            RawId::Num(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTest {
    id: Option<RawId>,
    #[serde(rename = "_id")]
    object_id: Option<RawId>,
    #[serde(alias = "title")]
    name: Option<String>,
    #[serde(alias = "syllabusId", alias = "syllabus")]
    syllabus_id: Option<RawId>,
    #[serde(alias = "subjectId", alias = "subject")]
    subject_id: Option<RawId>,
    #[serde(rename = "type", alias = "testType", alias = "test_type")]
    test_type: Option<String>,
    difficulty: Option<String>,
    #[serde(alias = "durationMinutes", alias = "duration")]
    duration_minutes: Option<u32>,
    #[serde(
        alias = "pointsPerQuestion",
        alias = "marksPerQuestion",
        alias = "marks_per_question"
    )]
    points_per_question: Option<u32>,
    questions: Option<Vec<RawQuestion>>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    id: Option<RawId>,
    #[serde(rename = "_id")]
    object_id: Option<RawId>,
    #[serde(alias = "question", alias = "questionText", alias = "question_text")]
    text: Option<String>,
    #[serde(alias = "subjectName", alias = "subject_name")]
    subject: Option<String>,
    #[serde(alias = "topicName", alias = "topic_name")]
    topic: Option<String>,
    options: Option<Vec<RawOption>>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    id: Option<RawId>,
    #[serde(rename = "_id")]
    object_id: Option<RawId>,
    #[serde(alias = "optionText", alias = "option_text", alias = "label")]
    text: Option<String>,
    #[serde(default, alias = "isCorrect", alias = "correct")]
    is_correct: bool,
}

/// Parse a single JSON file into a `TestDefinition`.
pub fn parse_test_definition(path: &Path) -> Result<TestDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read test definition: {}", path.display()))?;

    parse_test_definition_str(&content, &path.display().to_string())
        .with_context(|| format!("failed to parse test definition: {}", path.display()))
}

/// Parse a JSON string into a `TestDefinition`.
pub fn parse_test_definition_str(
    content: &str,
    source_name: &str,
) -> std::result::Result<TestDefinition, ParseError> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| ParseError::Json {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;

    let raw: RawTest =
        serde_json::from_value(unwrap_envelope(value)).map_err(|e| ParseError::Json {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;

    convert_test(raw)
}

/// Strip a `{"data": {...}}` or `{"test": {...}}` wrapper, if present.
fn unwrap_envelope(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(mut map) if !map.contains_key("questions") => {
            for key in ["data", "test"] {
                if map.get(key).is_some_and(|v| v.is_object()) {
                    if let Some(inner) = map.remove(key) {
                        return unwrap_envelope(inner);
                    }
                }
            }
            serde_json::Value::Object(map)
        }
        other => other,
    }
}

fn convert_test(raw: RawTest) -> std::result::Result<TestDefinition, ParseError> {
    let id = required(raw.id.or(raw.object_id), "test", "id")?.into_string();
    let context = format!("test {id}");

    let name = required(raw.name, &context, "name")?;

    let test_type: TestType = required(raw.test_type, &context, "type")?
        .parse()
        .map_err(|message| ParseError::InvalidValue {
            context: context.clone(),
            field: "type",
            message,
        })?;

    let difficulty = match raw.difficulty {
        Some(d) => d
            .parse::<Difficulty>()
            .map_err(|message| ParseError::InvalidValue {
                context: context.clone(),
                field: "difficulty",
                message,
            })?,
        None => Difficulty::default(),
    };

    let duration_minutes = required(raw.duration_minutes, &context, "duration_minutes")?;

    let questions = required(raw.questions, &context, "questions")?
        .into_iter()
        .enumerate()
        .map(|(index, q)| convert_question(q, index))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(TestDefinition {
        id,
        name,
        syllabus_id: raw.syllabus_id.map(RawId::into_string),
        subject_id: raw.subject_id.map(RawId::into_string),
        test_type,
        difficulty,
        duration_minutes,
        points_per_question: raw
            .points_per_question
            .unwrap_or(DEFAULT_POINTS_PER_QUESTION),
        questions,
    })
}

fn convert_question(raw: RawQuestion, index: usize) -> std::result::Result<Question, ParseError> {
    let position = format!("question #{}", index + 1);
    let id = required(raw.id.or(raw.object_id), &position, "id")?.into_string();
    let context = format!("question {id}");

    let text = required(raw.text, &context, "text")?;

    let options = required(raw.options, &context, "options")?
        .into_iter()
        .enumerate()
        .map(|(i, o)| {
            let option_context = format!("{context} option #{}", i + 1);
            Ok(AnswerOption {
                id: required(o.id.or(o.object_id), &option_context, "id")?.into_string(),
                text: required(o.text, &option_context, "text")?,
                is_correct: o.is_correct,
            })
        })
        .collect::<std::result::Result<Vec<_>, ParseError>>()?;

    if !options.iter().any(|o| o.is_correct) {
        return Err(ParseError::NoCorrectOption { question_id: id });
    }

    Ok(Question {
        id,
        text,
        subject: raw.subject.unwrap_or_default(),
        topic: raw.topic.unwrap_or_default(),
        options,
    })
}

fn required<T>(
    value: Option<T>,
    context: &str,
    field: &'static str,
) -> std::result::Result<T, ParseError> {
    value.ok_or_else(|| ParseError::MissingField {
        context: context.to_string(),
        field,
    })
}

/// Recursively load all `.json` test definitions from a directory.
pub fn load_test_directory(dir: &Path) -> Result<Vec<TestDefinition>> {
    let mut tests = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            tests.extend(load_test_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            match parse_test_definition(&path) {
                Ok(def) => tests.push(def),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(tests)
}

/// A non-fatal issue found in a test definition.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question id (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a test definition for issues that do not block an attempt.
///
/// Problems that would make an attempt impossible (no questions, duplicate
/// ids) are reported here too, so `validate` output matches what
/// [`crate::attempt::AttemptSession::start`] will reject.
pub fn validate_test_definition(def: &TestDefinition) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if def.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "test has no questions".into(),
        });
    }

    if def.duration_minutes == 0 {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "duration is zero minutes".into(),
        });
    }

    let mut seen_ids = HashSet::new();
    for q in &def.questions {
        if !seen_ids.insert(&q.id) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: format!("duplicate question ID: {}", q.id),
            });
        }
    }

    for q in &def.questions {
        let correct = q.correct_option_ids().count();
        if correct > 1 {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: format!("{correct} options are marked correct"),
            });
        }

        if q.text.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: "question text is empty".into(),
            });
        }

        if q.options.len() < 2 {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: format!("only {} option(s)", q.options.len()),
            });
        }

        let mut option_ids = HashSet::new();
        for o in &q.options {
            if !option_ids.insert(&o.id) {
                warnings.push(ValidationWarning {
                    question_id: Some(q.id.clone()),
                    message: format!("duplicate option ID: {}", o.id),
                });
            }
            if o.text.trim().is_empty() {
                warnings.push(ValidationWarning {
                    question_id: Some(q.id.clone()),
                    message: format!("option {} has empty text", o.id),
                });
            }
        }
    }

    warnings
}
