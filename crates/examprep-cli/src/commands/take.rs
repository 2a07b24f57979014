//! The `examprep take` command: an interactive, line-driven attempt.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use examprep_core::attempt::{AttemptSnapshot, Direction};
use examprep_core::driver::{spawn_attempt, AttemptHandle, DriverConfig, SubmissionStatus};
use examprep_core::parser::parse_test_definition;
use examprep_core::report::ReviewReport;
use examprep_core::results::{format_duration, SubmissionPayload, SubmitTrigger};
use examprep_core::traits::AttemptObserver;
use examprep_submit::config::{create_sink, load_config_from, load_learner_file};

use super::review::print_report;

/// Remaining-time marks at which the learner is warned.
const WARN_AT_SECS: [u64; 3] = [300, 60, 10];
/// How long to wait for the sink before giving up on reporting delivery.
const DELIVERY_WAIT: Duration = Duration::from_secs(30);

pub async fn execute(
    test_path: PathBuf,
    learner_path: Option<PathBuf>,
    save_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let definition = parse_test_definition(&test_path)?;

    let learner = match learner_path {
        Some(path) => Some(load_learner_file(&path)?),
        None => config.load_learner()?,
    };
    if let Some(learner) = &learner {
        println!("Signed in as {} ({})", learner.display_name(), learner.learner_id());
        if !learner.has_active_subscription(chrono::Utc::now()) {
            println!("Note: no active subscription on this account.");
        }
    }

    let sink = create_sink(&config.sink);
    let driver_config = DriverConfig {
        tick: config.tick(),
        learner_id: learner.as_ref().map(|l| l.learner_id().to_string()),
    };

    println!(
        "\n{} ({}, {} questions, {} min)",
        definition.name,
        definition.test_type,
        definition.questions.len(),
        definition.duration_minutes
    );
    println!("Type `help` for commands.\n");

    let handle = spawn_attempt(definition, driver_config, sink, Arc::new(ConsoleObserver::default()))
        .context("failed to start attempt")?;

    show_current(&handle).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let submitted = loop {
        tokio::select! {
            _ = handle.wait_for_result() => break true,
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    println!("Input closed.");
                    break false;
                };
                match parse_input(&line) {
                    Ok(Input::Quit) => break false,
                    Ok(Input::Submit) => {
                        handle.submit().await?;
                        break true;
                    }
                    Ok(input) => {
                        if let Err(e) = apply(&handle, input).await {
                            println!("{e}");
                        }
                    }
                    Err(message) => println!("{message}"),
                }
            }
        }
    };

    if !submitted {
        println!("Attempt abandoned, nothing submitted.");
        handle.dispose().await;
        return Ok(());
    }

    let status = handle.status();
    let Some(payload) = status.payload else {
        anyhow::bail!("attempt ended without a result");
    };

    let report = ReviewReport::new(&payload, Some(handle.definition()));
    print_report(&report);

    report_delivery(&handle, &payload).await;

    if let Some(path) = save_path {
        payload.save_json(&path)?;
        println!("Saved submission to {}", path.display());
    }

    Ok(())
}

async fn report_delivery(handle: &AttemptHandle, payload: &SubmissionPayload) {
    match tokio::time::timeout(DELIVERY_WAIT, handle.wait_for_delivery()).await {
        Ok(Some(SubmissionStatus::Delivered)) => {
            println!("\nSubmission {} delivered.", payload.attempt_id);
        }
        Ok(Some(SubmissionStatus::Failed(reason))) => {
            println!("\nSubmission {} was not delivered: {reason}", payload.attempt_id);
            println!("Your result above is still valid.");
        }
        Ok(_) => println!("\nSubmission status unknown."),
        Err(_) => println!(
            "\nSubmission {} still pending after {}s.",
            payload.attempt_id,
            DELIVERY_WAIT.as_secs()
        ),
    }
}

/// One line of learner input.
#[derive(Debug, PartialEq)]
enum Input {
    Next,
    Previous,
    GoTo(usize),
    Select(String),
    Clear,
    ToggleReview,
    Show,
    Status,
    Help,
    Submit,
    Quit,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Input::Show);
    };
    let arg = words.next();

    match (command.to_ascii_lowercase().as_str(), arg) {
        ("next" | "n", _) => Ok(Input::Next),
        ("prev" | "p", _) => Ok(Input::Previous),
        ("goto" | "g", Some(n)) => match n.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(Input::GoTo(n - 1)),
            _ => Err(format!("not a question number: {n}")),
        },
        ("goto" | "g", None) => Err("usage: goto <question number>".into()),
        ("select" | "s", Some(option)) => Ok(Input::Select(option.to_string())),
        ("select" | "s", None) => Err("usage: select <option id or number>".into()),
        ("clear" | "c", _) => Ok(Input::Clear),
        ("review" | "r", _) => Ok(Input::ToggleReview),
        ("show", _) => Ok(Input::Show),
        ("status", _) => Ok(Input::Status),
        ("help" | "?", _) => Ok(Input::Help),
        ("submit", _) => Ok(Input::Submit),
        ("quit" | "q", _) => Ok(Input::Quit),
        (other, _) => Err(format!("unknown command: {other} (type `help`)")),
    }
}

async fn apply(handle: &AttemptHandle, input: Input) -> Result<()> {
    match input {
        Input::Next => {
            handle.advance(Direction::Next).await?;
            show_current(handle).await?;
        }
        Input::Previous => {
            handle.advance(Direction::Previous).await?;
            show_current(handle).await?;
        }
        Input::GoTo(index) => {
            handle.go_to(index).await?;
            show_current(handle).await?;
        }
        Input::Select(choice) => {
            let snapshot = handle.snapshot().await?;
            let option_id = resolve_option(handle, &snapshot, &choice);
            handle
                .select(&snapshot.current_question_id, &option_id)
                .await?;
            println!("Selected {option_id}.");
        }
        Input::Clear => {
            let snapshot = handle.snapshot().await?;
            if handle.clear(&snapshot.current_question_id).await? {
                println!("Selection cleared.");
            }
        }
        Input::ToggleReview => {
            let snapshot = handle.snapshot().await?;
            let marked = handle.toggle_review(&snapshot.current_question_id).await?;
            println!(
                "{} {} for review.",
                snapshot.current_question_id,
                if marked { "marked" } else { "unmarked" }
            );
        }
        Input::Show => show_current(handle).await?,
        Input::Status => {
            let snapshot = handle.snapshot().await?;
            println!(
                "{} left, {}/{} answered",
                format_duration(snapshot.remaining_secs),
                snapshot.answered,
                snapshot.total_questions
            );
            if !snapshot.marked_for_review.is_empty() {
                println!("Marked for review: {}", snapshot.marked_for_review.join(", "));
            }
        }
        Input::Help => print_help(),
        Input::Submit | Input::Quit => {}
    }
    Ok(())
}

/// An option id as typed, or a 1-based option number on the current question.
fn resolve_option(handle: &AttemptHandle, snapshot: &AttemptSnapshot, choice: &str) -> String {
    let Some(question) = handle.definition().question(&snapshot.current_question_id) else {
        return choice.to_string();
    };
    if question.option(choice).is_some() {
        return choice.to_string();
    }
    choice
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| question.options.get(i))
        .map(|o| o.id.clone())
        .unwrap_or_else(|| choice.to_string())
}

async fn show_current(handle: &AttemptHandle) -> Result<()> {
    let snapshot = handle.snapshot().await?;
    let Some(question) = handle.definition().question(&snapshot.current_question_id) else {
        return Ok(());
    };

    let mut heading = format!(
        "Question {}/{}",
        snapshot.cursor + 1,
        snapshot.total_questions
    );
    if !question.subject.is_empty() {
        heading.push_str(&format!(" [{}", question.subject));
        if !question.topic.is_empty() {
            heading.push_str(&format!(" / {}", question.topic));
        }
        heading.push(']');
    }
    if snapshot.marked_for_review.contains(&question.id) {
        heading.push_str(" (marked for review)");
    }

    println!("{heading}  {} left", format_duration(snapshot.remaining_secs));
    println!("{}", question.text);
    for (i, option) in question.options.iter().enumerate() {
        let mark = if snapshot.current_selection.as_deref() == Some(option.id.as_str()) {
            "x"
        } else {
            " "
        };
        println!("  [{mark}] {}. {} ({})", i + 1, option.text, option.id);
    }
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  next | n              next question");
    println!("  prev | p              previous question");
    println!("  goto <n> | g <n>      jump to question n");
    println!("  select <opt> | s      choose an option by id or number");
    println!("  clear | c             clear the current selection");
    println!("  review | r            mark or unmark for review");
    println!("  show                  show the current question");
    println!("  status                time left and progress");
    println!("  submit                submit the attempt");
    println!("  quit | q              abandon without submitting");
}

/// Prints time warnings and the timer hand-off to stderr.
#[derive(Default)]
struct ConsoleObserver {
    last_warned: AtomicU64,
}

impl AttemptObserver for ConsoleObserver {
    fn on_tick(&self, snapshot: &AttemptSnapshot) {
        let remaining = snapshot.remaining_secs;
        if WARN_AT_SECS.contains(&remaining)
            && self.last_warned.swap(remaining, Ordering::Relaxed) != remaining
        {
            eprintln!("\n** {} remaining **", format_duration(remaining));
        }
    }

    fn on_submitted(&self, payload: &SubmissionPayload) {
        if payload.trigger == SubmitTrigger::Timer {
            eprintln!("\n** Time is up. Your attempt has been submitted. **");
        }
    }

    fn on_delivery(&self, payload: &SubmissionPayload, outcome: Result<(), &str>) {
        if let Err(reason) = outcome {
            tracing::debug!(attempt_id = %payload.attempt_id, "delivery failed: {reason}");
        }
    }
}
