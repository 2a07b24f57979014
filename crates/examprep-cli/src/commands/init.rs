//! The `examprep init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("examprep.toml").exists() {
        println!("examprep.toml already exists, skipping.");
    } else {
        std::fs::write("examprep.toml", SAMPLE_CONFIG)?;
        println!("Created examprep.toml");
    }

    std::fs::create_dir_all("test-defs")?;
    let sample_path = Path::new("test-defs/sample.json");
    if sample_path.exists() {
        println!("test-defs/sample.json already exists, skipping.");
    } else {
        std::fs::write(sample_path, SAMPLE_TEST)?;
        println!("Created test-defs/sample.json");
    }

    println!("\nNext steps:");
    println!("  1. Run: examprep validate --test test-defs/sample.json");
    println!("  2. Run: examprep take --test test-defs/sample.json");
    println!("  3. Run: examprep review --result <outbox file> --test test-defs/sample.json");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examprep configuration

# Milliseconds of real time per second on the test clock.
tick_ms = 1000

# Stored learner session (JSON), optional.
# learner_file = "${HOME}/.config/examprep/session.json"

test_dir = "./test-defs"

[sink]
type = "outbox"
dir = "./examprep-outbox"
"#;

const SAMPLE_TEST: &str = r#"{
  "id": "sample",
  "name": "Sample Practice Test",
  "type": "practice",
  "difficulty": "easy",
  "duration_minutes": 5,
  "points_per_question": 4,
  "questions": [
    {
      "id": "q1",
      "text": "What is the SI unit of force?",
      "subject": "Physics",
      "topic": "Units",
      "options": [
        { "id": "q1-a", "text": "Newton", "is_correct": true },
        { "id": "q1-b", "text": "Joule" },
        { "id": "q1-c", "text": "Pascal" },
        { "id": "q1-d", "text": "Watt" }
      ]
    },
    {
      "id": "q2",
      "text": "Which gas makes up most of Earth's atmosphere?",
      "subject": "Chemistry",
      "topic": "Air",
      "options": [
        { "id": "q2-a", "text": "Oxygen" },
        { "id": "q2-b", "text": "Nitrogen", "is_correct": true },
        { "id": "q2-c", "text": "Carbon dioxide" },
        { "id": "q2-d", "text": "Argon" }
      ]
    },
    {
      "id": "q3",
      "text": "What is the derivative of x^2?",
      "subject": "Mathematics",
      "topic": "Calculus",
      "options": [
        { "id": "q3-a", "text": "x" },
        { "id": "q3-b", "text": "2" },
        { "id": "q3-c", "text": "2x", "is_correct": true },
        { "id": "q3-d", "text": "x^3 / 3" }
      ]
    }
  ]
}
"#;
