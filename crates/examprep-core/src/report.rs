//! JSON persistence for submissions and the combined review report.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::breakdown::SubjectBreakdown;
use crate::model::TestDefinition;
use crate::results::SubmissionPayload;

impl SubmissionPayload {
    /// Save the payload as pretty JSON, creating parent directories.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize submission")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write submission to {}", path.display()))?;
        Ok(())
    }

    /// Load a payload from a JSON file.
    ///
    /// A result whose counts contradict its answer records is rejected.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read submission from {}", path.display()))?;
        let payload: SubmissionPayload =
            serde_json::from_str(&content).context("failed to parse submission JSON")?;
        if payload.test_id != payload.result.test_id {
            anyhow::bail!(
                "submission {} is for test {} but carries a result for {}",
                path.display(),
                payload.test_id,
                payload.result.test_id
            );
        }
        payload
            .result
            .check_consistency()
            .with_context(|| format!("inconsistent submission in {}", path.display()))?;
        Ok(payload)
    }
}

/// Everything the results review screen shows.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewReport<'a> {
    pub submission: &'a SubmissionPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_points: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<SubjectBreakdown>,
}

impl<'a> ReviewReport<'a> {
    /// Build a report; subject breakdown needs the definition.
    ///
    /// A definition whose id differs from the submission's is ignored.
    pub fn new(submission: &'a SubmissionPayload, definition: Option<&'a TestDefinition>) -> Self {
        let definition = definition.filter(|d| {
            let matches = d.id == submission.test_id;
            if !matches {
                tracing::warn!(
                    expected = %submission.test_id,
                    found = %d.id,
                    "test definition does not match submission, ignoring it"
                );
            }
            matches
        });

        Self {
            submission,
            test_name: definition.map(|d| d.name.as_str()),
            max_points: definition.map(TestDefinition::max_points),
            breakdown: definition.map(|d| SubjectBreakdown::compute(d, &submission.result)),
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut md = self.submission.result.to_markdown();
        if let Some(name) = self.test_name {
            md = md.replacen(
                &format!("## Result: {}", self.submission.test_id),
                &format!("## Result: {name} ({})", self.submission.test_id),
                1,
            );
        }

        if let Some(breakdown) = &self.breakdown {
            md.push_str("\n### By subject\n\n| Subject | Correct | Attempted | Total | Accuracy |\n|---------|---------|-----------|-------|----------|\n");
            for (subject, stats) in &breakdown.per_subject {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {:.0}% |\n",
                    subject,
                    stats.correct,
                    stats.attempted,
                    stats.total,
                    stats.accuracy() * 100.0
                ));
            }
            if let Some((subject, topic, stats)) = breakdown.weakest_topic() {
                md.push_str(&format!(
                    "\nWeakest topic: {subject} / {topic} ({:.0}% accuracy)\n",
                    stats.accuracy() * 100.0
                ));
            }
        }
        md
    }
}
