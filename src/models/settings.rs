// src/models/settings.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::request::clean_optional;

/// Runtime-editable AI settings. Unset fields fall back to the environment configuration.
///
/// Doubles as the update DTO: only the fields present in a request are changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct AiSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 200))]
    pub teacher_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 200))]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 8192))]
    pub max_output_tokens: Option<u32>,
}

impl AiSettings {
    /// Trims the names; blank ones count as not given.
    pub fn cleaned(self) -> Self {
        Self {
            teacher_name: clean_optional(self.teacher_name),
            subject: clean_optional(self.subject),
            ..self
        }
    }

    /// Copies every field set in `update` over `self`.
    pub fn merge(&mut self, update: AiSettings) {
        if update.teacher_name.is_some() {
            self.teacher_name = update.teacher_name;
        }
        if update.subject.is_some() {
            self.subject = update.subject;
        }
        if update.temperature.is_some() {
            self.temperature = update.temperature;
        }
        if update.max_output_tokens.is_some() {
            self.max_output_tokens = update.max_output_tokens;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut stored = AiSettings {
            teacher_name: Some("Иванова".to_string()),
            subject: Some("Математика".to_string()),
            temperature: Some(0.3),
            max_output_tokens: None,
        };
        stored.merge(AiSettings {
            subject: Some("Физика".to_string()),
            max_output_tokens: Some(1024),
            ..Default::default()
        });

        assert_eq!(stored.teacher_name.as_deref(), Some("Иванова"));
        assert_eq!(stored.subject.as_deref(), Some("Физика"));
        assert_eq!(stored.temperature, Some(0.3));
        assert_eq!(stored.max_output_tokens, Some(1024));
    }

    #[test]
    fn test_validation_bounds() {
        let ok = AiSettings {
            temperature: Some(2.0),
            max_output_tokens: Some(8192),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let hot = AiSettings {
            temperature: Some(2.5),
            ..Default::default()
        };
        assert!(hot.validate().is_err());

        let empty = AiSettings {
            max_output_tokens: Some(0),
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let long = AiSettings {
            subject: Some("x".repeat(201)),
            ..Default::default()
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_cleaned_drops_blank_names() {
        let settings = AiSettings {
            teacher_name: Some("  ".to_string()),
            subject: Some(" Химия ".to_string()),
            ..Default::default()
        }
        .cleaned();
        assert_eq!(settings.teacher_name, None);
        assert_eq!(settings.subject.as_deref(), Some("Химия"));
    }

    #[test]
    fn test_serialization_skips_unset_fields() {
        let json = serde_json::to_value(AiSettings {
            temperature: Some(0.5),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"temperature": 0.5}));
    }
}
