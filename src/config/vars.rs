//! Environment variable interpolation for config files.
//!
//! Secrets (translator key, storage connection string, store token) are
//! never written into the YAML file itself; they are referenced as:
//! - `$VAR` or `${VAR}` - substitute with env var value, error if missing
//! - `${VAR:-default}` - use default if VAR is unset OR empty
//! - `${VAR-default}` - use default only if VAR is unset (empty is OK)
//! - `$$` - escape sequence for literal `$`

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$
        |
        \$\{
            (?P<braced>[A-Za-z_][A-Za-z0-9_]*)
            (?:(?P<op>:?-)(?P<default>[^}]*))?
        \}
        |
        \$(?P<bare>[A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("Invalid regex pattern")
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The interpolated text.
    pub text: String,
    /// Every unresolved or rejected variable, so all problems surface at once.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    /// Returns true if there were no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Interpolate environment variables in the given text.
pub fn interpolate(input: &str) -> InterpolationResult {
    interpolate_with(input, |name| env::var(name).ok())
}

/// Interpolate using an arbitrary variable lookup.
pub(crate) fn interpolate_with<F>(input: &str, lookup: F) -> InterpolationResult
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| {
            let whole = &caps[0];
            if whole == "$$" {
                return "$".to_string();
            }

            let name = caps
                .name("braced")
                .or_else(|| caps.name("bare"))
                .map_or("", |m| m.as_str());
            let op = caps.name("op").map(|m| m.as_str());
            let default = caps.name("default").map(|m| m.as_str());

            match (lookup(name), default) {
                (Some(value), _) if value.contains(['\n', '\r']) => {
                    errors.push(format!(
                        "environment variable '{name}' contains newlines, which is not allowed"
                    ));
                    whole.to_string()
                }
                (Some(value), Some(default)) if value.is_empty() && op == Some(":-") => {
                    default.to_string()
                }
                (Some(value), _) => value,
                (None, Some(default)) => default.to_string(),
                (None, None) => {
                    errors.push(format!("environment variable '{name}' is not set"));
                    whole.to_string()
                }
            }
        })
        .into_owned();

    InterpolationResult { text, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_bare_and_braced_substitution() {
        let result = interpolate_with(
            "key: $API_KEY, endpoint: ${ENDPOINT}",
            lookup(&[("API_KEY", "secret"), ("ENDPOINT", "https://models.example")]),
        );
        assert!(result.is_ok());
        assert_eq!(
            result.text,
            "key: secret, endpoint: https://models.example"
        );
    }

    #[test]
    fn test_missing_variables_are_all_reported() {
        let result = interpolate_with("a: $FIRST, b: ${SECOND}", lookup(&[]));
        assert!(!result.is_ok());
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("FIRST"));
        assert!(result.errors[1].contains("SECOND"));
        assert_eq!(result.text, "a: $FIRST, b: ${SECOND}");
    }

    #[test]
    fn test_defaults() {
        let vars = lookup(&[("EMPTY", "")]);
        assert_eq!(
            interpolate_with("${UNSET:-dsr1}", &vars).text,
            "dsr1"
        );
        assert_eq!(interpolate_with("${EMPTY:-dsr1}", &vars).text, "dsr1");
        assert_eq!(interpolate_with("${EMPTY-dsr1}", &vars).text, "");
        assert_eq!(interpolate_with("${UNSET-dsr1}", &vars).text, "dsr1");
    }

    #[test]
    fn test_escape_sequence() {
        let result = interpolate_with("price: $$100", lookup(&[]));
        assert!(result.is_ok());
        assert_eq!(result.text, "price: $100");
    }

    #[test]
    fn test_newline_injection_blocked() {
        let result = interpolate_with("value: $INJECT", lookup(&[("INJECT", "a\nb")]));
        assert!(!result.is_ok());
        assert!(result.errors[0].contains("newlines"));

        let result = interpolate_with("value: $INJECT", lookup(&[("INJECT", "a\rb")]));
        assert!(!result.is_ok());
    }

    #[test]
    fn test_process_environment_lookup() {
        // PATH is set in every test environment.
        let result = interpolate("${PATH}");
        assert!(result.is_ok());
        assert!(!result.text.is_empty());
    }
}
