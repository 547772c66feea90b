//! Completion post-processing.

use regex::Regex;
use serde_json::{Map, Value};
use snafu::prelude::*;
use std::sync::LazyLock;

use crate::error::{InvalidJsonSnafu, MissingTranslationSnafu, TranslateError};

static REASONING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("Invalid regex pattern"));

/// Remove reasoning blocks and surrounding whitespace.
pub fn strip_reasoning(completion: &str) -> String {
    REASONING.replace_all(completion, "").trim().to_string()
}

/// Extract the translation from a raw completion.
///
/// The completion must be a single JSON object; arrays and scalars are
/// rejected even when they hold a string.
pub fn parse_translation(completion: &str) -> Result<String, TranslateError> {
    let cleaned = strip_reasoning(completion);
    let mut object: Map<String, Value> =
        serde_json::from_str(&cleaned).context(InvalidJsonSnafu)?;

    match object.remove("translation") {
        Some(Value::String(text)) if !text.trim().is_empty() => {
            Ok(text.trim().to_string())
        }
        _ => MissingTranslationSnafu.fail(),
    }
}
