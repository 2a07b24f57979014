//! The `examprep review` command, plus the result view shared with `take`.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examprep_core::parser::parse_test_definition;
use examprep_core::report::ReviewReport;
use examprep_core::results::{format_duration, SubmissionPayload};

pub fn execute(result_path: PathBuf, test_path: Option<PathBuf>, format: String) -> Result<()> {
    let payload = SubmissionPayload::load_json(&result_path)?;
    let definition = test_path.as_deref().map(parse_test_definition).transpose()?;
    let report = ReviewReport::new(&payload, definition.as_ref());

    match format.as_str() {
        "markdown" | "md" => println!("{}", report.to_markdown()),
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_report(&report),
    }

    Ok(())
}

/// Print a result summary and, when available, the per-subject table.
pub fn print_report(report: &ReviewReport<'_>) {
    let submission = report.submission;
    let result = &submission.result;

    println!(
        "\nResult: {}",
        report.test_name.unwrap_or(submission.test_id.as_str())
    );
    println!(
        "  Score:      {}/{} ({}%)",
        result.score, result.total_questions, result.percentage
    );
    match report.max_points {
        Some(max) => println!("  Points:     {}/{max}", result.points),
        None => println!("  Points:     {}", result.points),
    }
    println!(
        "  Attempted:  {} ({} incorrect, {} unanswered)",
        result.attempted(),
        result.incorrect(),
        result.unanswered()
    );
    println!("  Time spent: {}", format_duration(result.time_spent_secs));
    println!(
        "  Submitted:  {} ({})",
        submission.submitted_at.format("%Y-%m-%d %H:%M:%S UTC"),
        submission.trigger
    );

    let Some(breakdown) = &report.breakdown else {
        return;
    };

    let mut table = Table::new();
    table.set_header(vec![
        "Subject",
        "Correct",
        "Incorrect",
        "Unanswered",
        "Accuracy",
    ]);
    for (subject, stats) in &breakdown.per_subject {
        table.add_row(vec![
            Cell::new(subject),
            Cell::new(stats.correct),
            Cell::new(stats.incorrect()),
            Cell::new(stats.unanswered()),
            Cell::new(format!("{:.0}%", stats.accuracy() * 100.0)),
        ]);
    }
    println!("\n{table}");

    if let Some((subject, topic, stats)) = breakdown.weakest_topic() {
        println!(
            "Weakest topic: {subject} / {topic} ({}/{} correct)",
            stats.correct, stats.attempted
        );
    }
}
