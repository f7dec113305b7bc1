//! Dispatcher settings and validation for the cmdtree command engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading or validating dispatcher settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// JSON deserialization failed.
    #[error("invalid settings JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A field value violates a settings constraint.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// The name of the field that failed validation.
        field: String,
        /// A human-readable explanation of why the field value is invalid.
        reason: String,
    },
}

/// What the dispatcher does with input left over after a complete command
/// has been matched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrailingInput {
    /// Run the command and drop the extra text.
    #[default]
    Ignore,
    /// Fail with a too-many-arguments error.
    Reject,
}

/// Tunables for parsing and dispatch.
///
/// Every field has a default, so an empty JSON object is a valid settings
/// document.
///
/// # Example
/// ```
/// let settings = cmdtree_settings::load_settings_from_str(
///     r#"{ "trailing_input": "reject", "long_flag_prefix": "--" }"#,
/// ).unwrap();
/// assert_eq!(settings.trailing_input, cmdtree_settings::TrailingInput::Reject);
/// assert_eq!(settings.short_flag_prefix, "-");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Policy for extra input after a command's last parameter.
    pub trailing_input: TrailingInput,
    /// Whether literal path segments must match case exactly.
    pub case_sensitive_literals: bool,
    /// Prefix that introduces a long flag name (e.g. `--silent`).
    pub long_flag_prefix: String,
    /// Prefix that introduces one or more shorthand flags (e.g. `-s`, `-abc`).
    pub short_flag_prefix: String,
    /// Maximum number of literal segments a command path may start with
    /// before its first parameter. Checked at registration.
    pub max_leading_literals: usize,
    /// Maximum number of suggestions the completion engine returns.
    /// `0` means unlimited.
    pub max_suggestions: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trailing_input: TrailingInput::Ignore,
            case_sensitive_literals: true,
            long_flag_prefix: "--".into(),
            short_flag_prefix: "-".into(),
            max_leading_literals: 8,
            max_suggestions: 0,
        }
    }
}

impl Settings {
    /// Check the cross-field constraints that serde cannot express.
    ///
    /// - both flag prefixes must be non-empty and free of whitespace
    /// - the prefixes must differ
    /// - the long prefix must start with the short prefix, so `-` never
    ///   swallows a `--name` token as a shorthand cluster
    /// - `max_leading_literals` must be at least 1
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (field, prefix) in [
            ("long_flag_prefix", &self.long_flag_prefix),
            ("short_flag_prefix", &self.short_flag_prefix),
        ] {
            if prefix.is_empty() {
                return Err(SettingsError::InvalidField {
                    field: field.into(),
                    reason: "must not be empty".into(),
                });
            }
            if prefix.chars().any(char::is_whitespace) {
                return Err(SettingsError::InvalidField {
                    field: field.into(),
                    reason: format!("{prefix:?} contains whitespace"),
                });
            }
        }

        if self.long_flag_prefix == self.short_flag_prefix {
            return Err(SettingsError::InvalidField {
                field: "long_flag_prefix".into(),
                reason: format!(
                    "must differ from short_flag_prefix ({:?})",
                    self.short_flag_prefix
                ),
            });
        }
        if !self.long_flag_prefix.starts_with(&self.short_flag_prefix) {
            return Err(SettingsError::InvalidField {
                field: "long_flag_prefix".into(),
                reason: format!(
                    "{:?} must start with short_flag_prefix ({:?})",
                    self.long_flag_prefix, self.short_flag_prefix
                ),
            });
        }

        if self.max_leading_literals == 0 {
            return Err(SettingsError::InvalidField {
                field: "max_leading_literals".into(),
                reason: "must be > 0".into(),
            });
        }

        Ok(())
    }
}

/// Load and validate [`Settings`] from a JSON string.
///
/// Missing fields take their defaults; unknown fields are rejected so typos
/// surface instead of silently doing nothing.
pub fn load_settings_from_str(s: &str) -> Result<Settings, SettingsError> {
    let settings: Settings = serde_json::from_str(s)?;
    settings.validate()?;
    Ok(settings)
}
