//! The `examprep validate` command.

use std::path::PathBuf;

use anyhow::Result;

use examprep_core::parser::{load_test_directory, parse_test_definition, validate_test_definition};

pub fn execute(test_path: PathBuf) -> Result<()> {
    let tests = if test_path.is_dir() {
        load_test_directory(&test_path)?
    } else {
        vec![parse_test_definition(&test_path)?]
    };

    if tests.is_empty() {
        anyhow::bail!("no test definitions found in {}", test_path.display());
    }

    let mut total_warnings = 0;

    for def in &tests {
        println!(
            "Test: {} ({} questions, {} min, {})",
            def.name,
            def.questions.len(),
            def.duration_minutes,
            def.test_type
        );

        let warnings = validate_test_definition(def);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All tests valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
