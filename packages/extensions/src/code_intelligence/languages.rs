//! Language names, aliases and highlight themes

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub const DEFAULT_LANGUAGE_OPTIONS: &[&str] = &[
    "plaintext",
    "typescript",
    "javascript",
    "tsx",
    "jsx",
    "json",
    "html",
    "css",
    "bash",
    "python",
    "java",
    "c",
    "cpp",
    "go",
    "rust",
    "sql",
    "yaml",
    "markdown",
];

pub const DEFAULT_THEME: &str = "lang-default";

const ALIASES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("ts", "typescript"),
    ("py", "python"),
    ("python3", "python"),
    ("sh", "bash"),
    ("shell", "bash"),
    ("zsh", "bash"),
    ("md", "markdown"),
    ("yml", "yaml"),
    ("rs", "rust"),
    ("golang", "go"),
    ("c++", "cpp"),
    ("htm", "html"),
    ("text", "plaintext"),
    ("txt", "plaintext"),
    ("plain", "plaintext"),
];

/// Canonical language name: trimmed, lowercase, aliases resolved.
/// Empty names and `auto` mean "no language".
pub fn normalize_language(language: &str) -> Option<String> {
    let trimmed = language.trim().to_lowercase();
    if trimmed.is_empty() || trimmed == "auto" {
        return None;
    }
    let resolved = ALIASES
        .iter()
        .find(|(alias, _)| *alias == trimmed)
        .map_or(trimmed.as_str(), |(_, canonical)| *canonical);
    Some(resolved.to_string())
}

pub fn language_family(language: &str) -> &'static str {
    match language.to_lowercase().as_str() {
        "javascript" | "typescript" | "jsx" | "tsx" | "json" => "javascript",
        "html" | "xml" | "svg" | "markdown" | "md" => "markup",
        "css" | "scss" | "sass" | "less" => "styles",
        "python" | "py" => "python",
        "bash" | "shell" | "sh" | "zsh" | "powershell" => "shell",
        "sql" | "postgres" | "mysql" => "sql",
        "rust" | "go" | "java" | "c" | "cpp" | "csharp" | "kotlin" | "swift" => "systems",
        _ => "default",
    }
}

/// Theme class for a code block's language
pub fn theme_for(language: Option<&str>) -> String {
    match language.and_then(normalize_language) {
        Some(language) => format!("lang-{}", language_family(&language)),
        None => DEFAULT_THEME.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptionsMode {
    #[default]
    Append,
    Replace,
}

/// Configured language list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageOptions {
    #[serde(default)]
    pub mode: OptionsMode,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LanguageOptionError {
    #[error("Invalid language option: '{0}'")]
    Invalid(String),

    #[error("Duplicate language option: '{value}' normalizes to '{normalized}'")]
    Duplicate { value: String, normalized: String },
}

impl LanguageOptions {
    /// Sorted, normalized option list.
    ///
    /// Appended values merge into the defaults. Replacement values must each
    /// normalize to a distinct language.
    pub fn resolve(&self) -> Result<Vec<String>, LanguageOptionError> {
        let mut resolved = BTreeSet::new();
        if self.mode == OptionsMode::Append {
            resolved.extend(DEFAULT_LANGUAGE_OPTIONS.iter().filter_map(|l| normalize_language(l)));
        }
        for value in &self.values {
            let normalized =
                normalize_language(value).ok_or_else(|| LanguageOptionError::Invalid(value.clone()))?;
            if !resolved.insert(normalized.clone()) && self.mode == OptionsMode::Replace {
                return Err(LanguageOptionError::Duplicate {
                    value: value.clone(),
                    normalized,
                });
            }
        }
        Ok(resolved.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("  JS "), Some("javascript".to_string()));
        assert_eq!(normalize_language("Rust"), Some("rust".to_string()));
        assert_eq!(normalize_language("auto"), None);
        assert_eq!(normalize_language(""), None);
    }

    #[test]
    fn test_theme_families() {
        assert_eq!(theme_for(Some("ts")), "lang-javascript");
        assert_eq!(theme_for(Some("yml")), "lang-default");
        assert_eq!(theme_for(Some("go")), "lang-systems");
        assert_eq!(theme_for(Some("sh")), "lang-shell");
        assert_eq!(theme_for(None), "lang-default");
    }

    #[test]
    fn test_default_options_include_plaintext() {
        let options = LanguageOptions::default().resolve().unwrap();
        assert!(options.contains(&"plaintext".to_string()));
        assert!(options.contains(&"typescript".to_string()));
    }

    #[test]
    fn test_append_merges_aliases() {
        let options = LanguageOptions {
            mode: OptionsMode::Append,
            values: vec!["javascript".into(), "js".into(), "tsx".into(), "SQL".into()],
        }
        .resolve()
        .unwrap();
        assert_eq!(options.iter().filter(|o| *o == "javascript").count(), 1);
        assert!(options.contains(&"sql".to_string()));
    }

    #[test]
    fn test_replace_drops_defaults() {
        let options = LanguageOptions {
            mode: OptionsMode::Replace,
            values: vec!["typescript".into(), "js".into(), "sql".into()],
        }
        .resolve()
        .unwrap();
        assert_eq!(options, vec!["javascript", "sql", "typescript"]);
    }

    #[test]
    fn test_replace_rejects_duplicates_and_invalid() {
        let duplicate = LanguageOptions {
            mode: OptionsMode::Replace,
            values: vec!["js".into(), "javascript".into()],
        };
        assert!(matches!(duplicate.resolve(), Err(LanguageOptionError::Duplicate { .. })));

        let invalid = LanguageOptions {
            mode: OptionsMode::Replace,
            values: vec!["auto".into()],
        };
        assert_eq!(invalid.resolve(), Err(LanguageOptionError::Invalid("auto".into())));
    }
}
