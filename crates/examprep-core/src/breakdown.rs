//! Per-subject and per-topic statistics for results review.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::TestDefinition;
use crate::results::AttemptResult;

/// Counts for one subject or topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub total: u32,
    pub attempted: u32,
    pub correct: u32,
}

impl GroupStats {
    pub fn incorrect(&self) -> u32 {
        self.attempted.saturating_sub(self.correct)
    }

    pub fn unanswered(&self) -> u32 {
        self.total.saturating_sub(self.attempted)
    }

    /// Share of attempted questions answered correctly, in `[0.0, 1.0]`.
    pub fn accuracy(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.attempted)
        }
    }

    fn record(&mut self, attempted: bool, correct: bool) {
        self.total += 1;
        if attempted {
            self.attempted += 1;
        }
        if correct {
            self.correct += 1;
        }
    }
}

/// Result statistics grouped by subject, and by topic within each subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectBreakdown {
    pub per_subject: BTreeMap<String, GroupStats>,
    /// subject -> topic -> stats
    pub per_topic: BTreeMap<String, BTreeMap<String, GroupStats>>,
}

const UNLABELLED: &str = "(unlabelled)";

impl SubjectBreakdown {
    /// Group a result's answer records by the labels in its definition.
    ///
    /// Records whose question id is not in the definition are skipped.
    pub fn compute(definition: &TestDefinition, result: &AttemptResult) -> Self {
        let labels: HashMap<&str, (&str, &str)> = definition
            .questions
            .iter()
            .map(|q| (q.id.as_str(), (q.subject.as_str(), q.topic.as_str())))
            .collect();

        let mut breakdown = SubjectBreakdown::default();

        for answer in &result.answers {
            let Some(&(subject, topic)) = labels.get(answer.question_id.as_str()) else {
                tracing::warn!(
                    question_id = %answer.question_id,
                    "answer record has no matching question, skipping"
                );
                continue;
            };
            let subject = label_or_default(subject);
            let topic = label_or_default(topic);
            let attempted = answer.selected_option_id.is_some();

            breakdown
                .per_subject
                .entry(subject.clone())
                .or_default()
                .record(attempted, answer.is_correct);
            breakdown
                .per_topic
                .entry(subject)
                .or_default()
                .entry(topic)
                .or_default()
                .record(attempted, answer.is_correct);
        }

        breakdown
    }

    /// The topic with the lowest accuracy among attempted topics.
    pub fn weakest_topic(&self) -> Option<(&str, &str, &GroupStats)> {
        self.per_topic
            .iter()
            .flat_map(|(subject, topics)| {
                topics
                    .iter()
                    .map(move |(topic, stats)| (subject.as_str(), topic.as_str(), stats))
            })
            .filter(|(_, _, s)| s.attempted > 0)
            .min_by(|a, b| a.2.accuracy().total_cmp(&b.2.accuracy()))
    }
}

fn label_or_default(label: &str) -> String {
    if label.trim().is_empty() {
        UNLABELLED.to_string()
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{fixtures::definition, score_attempt};

    #[test]
    fn groups_by_subject_and_topic() {
        // q1, q3 are Physics; q2, q4 are Chemistry.
        let def = definition(4, 1, 1);
        let selections: HashMap<String, String> = [("q1", "q1-a"), ("q2", "q2-b"), ("q3", "q3-a")]
            .into_iter()
            .map(|(q, o)| (q.to_string(), o.to_string()))
            .collect();
        let result = score_attempt(&def, &selections, 0);

        let breakdown = SubjectBreakdown::compute(&def, &result);
        let physics = &breakdown.per_subject["Physics"];
        assert_eq!(physics.total, 2);
        assert_eq!(physics.correct, 2);
        assert_eq!(physics.accuracy(), 1.0);

        let chemistry = &breakdown.per_subject["Chemistry"];
        assert_eq!(chemistry.total, 2);
        assert_eq!(chemistry.attempted, 1);
        assert_eq!(chemistry.incorrect(), 1);
        assert_eq!(chemistry.unanswered(), 1);

        let topic_total: u32 = breakdown
            .per_topic
            .values()
            .flat_map(|topics| topics.values())
            .map(|s| s.total)
            .sum();
        assert_eq!(topic_total, 4);
    }

    #[test]
    fn weakest_topic_ignores_unattempted() {
        let def = definition(3, 1, 1);
        let selections: HashMap<String, String> = [("q2", "q2-b")]
            .into_iter()
            .map(|(q, o)| (q.to_string(), o.to_string()))
            .collect();
        let result = score_attempt(&def, &selections, 0);
        let breakdown = SubjectBreakdown::compute(&def, &result);

        let (subject, _, stats) = breakdown.weakest_topic().unwrap();
        assert_eq!(subject, "Chemistry");
        assert_eq!(stats.accuracy(), 0.0);
    }

    #[test]
    fn inconsistent_counts_saturate() {
        let stats = GroupStats {
            total: 1,
            attempted: 0,
            correct: 1,
        };
        assert_eq!(stats.incorrect(), 0);
        assert_eq!(stats.unanswered(), 1);
    }

    #[test]
    fn empty_labels_are_grouped_together() {
        let mut def = definition(2, 1, 1);
        for q in &mut def.questions {
            q.subject.clear();
            q.topic.clear();
        }
        let result = score_attempt(&def, &HashMap::new(), 0);
        let breakdown = SubjectBreakdown::compute(&def, &result);
        assert_eq!(breakdown.per_subject.len(), 1);
        assert_eq!(breakdown.per_subject[UNLABELLED].total, 2);
    }
}
