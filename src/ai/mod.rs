//! LLM-backed mail features: batch categorization, body drafting, and
//! task extraction.

pub mod categorizer;
pub mod generator;
pub mod task_extractor;

pub use categorizer::{CategorizationInput, EmailCategorizer, UNCATEGORIZED};
pub use generator::{EmailBodyGenerator, GeneratorConfig};
pub use task_extractor::TaskExtractor;

use tracing::error;

/// Extract a JSON array from LLM output that might contain markdown or extra text.
pub(crate) fn extract_json_array(text: &str) -> String {
    extract_json(text, '[', ']')
}

/// Extract a JSON object from LLM output that might contain markdown or extra text.
pub(crate) fn extract_json_object(text: &str) -> String {
    extract_json(text, '{', '}')
}

fn extract_json(text: &str, open: char, close: char) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with(open) {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with(open) {
                return inner.to_string();
            }
        }
    }

    if let Some(start) = trimmed.find(open)
        && let Some(end) = trimmed.rfind(close)
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    error!(text = trimmed, "Could not extract JSON from LLM response");
    trimmed.to_string()
}

/// Cut `text` to at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
