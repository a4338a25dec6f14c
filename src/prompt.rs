//! Prompt file loading

use std::path::Path;

use crate::error::{Error, Result};

/// Read a markdown prompt file
///
/// Heading lines (`# ...`) and blank lines are dropped; the remaining lines are
/// joined with newlines.
pub async fn read_prompt(path: &Path) -> Result<String> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::Prompt(format!("failed to read prompt file {}: {e}", path.display()))
    })?;

    let prompt = clean_prompt(&content);
    if prompt.is_empty() {
        return Err(Error::Prompt(format!(
            "prompt file {} has no prompt text",
            path.display()
        )));
    }
    Ok(prompt)
}

/// Strip markdown headings and blank lines from `content`
pub fn clean_prompt(content: &str) -> String {
    content
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}
