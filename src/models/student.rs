// src/models/student.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    /// Accepts the Cyrillic initials used by the school records as well as English spellings.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "м" | "male" | "m" => Gender::Male,
            "ж" | "female" | "f" => Gender::Female,
            _ => Gender::Unknown,
        }
    }
}

/// Represents a row of the 'students' table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub name: Option<String>,
    pub gender: Gender,
    pub class_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_spellings() {
        assert_eq!(Gender::parse("М"), Gender::Male);
        assert_eq!(Gender::parse("м"), Gender::Male);
        assert_eq!(Gender::parse("male"), Gender::Male);
        assert_eq!(Gender::parse("Ж"), Gender::Female);
        assert_eq!(Gender::parse(" female "), Gender::Female);
        assert_eq!(Gender::parse(""), Gender::Unknown);
        assert_eq!(Gender::parse("other"), Gender::Unknown);
    }
}
