use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle policy assigned to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Unclassified = 0,
    NeverArchive = 1,
    #[serde(rename = "archive_after_60_days")]
    ArchiveAfter60Days = 2,
    #[serde(rename = "delete_after_60_days")]
    DeleteAfter60Days = 3,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("invalid choice {0:?}: expected 1, 2, or 3")]
    InvalidChoice(String),
    #[error("unknown classification value {0}")]
    UnknownValue(i64),
    #[error("refusing to record an unclassified decision for {0}")]
    Unclassified(String),
}

impl Classification {
    pub const POLICIES: [Classification; 3] = [
        Classification::NeverArchive,
        Classification::ArchiveAfter60Days,
        Classification::DeleteAfter60Days,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    /// Accepts only the three policy values a decision may produce.
    pub fn from_choice(choice: i64) -> Result<Self, ClassificationError> {
        match Self::try_from(choice) {
            Ok(c) if c.is_policy() => Ok(c),
            _ => Err(ClassificationError::InvalidChoice(choice.to_string())),
        }
    }

    /// Parses a raw answer such as `" 2\n"`.
    pub fn parse_choice(input: &str) -> Result<Self, ClassificationError> {
        let trimmed = input.trim();
        trimmed
            .parse::<i64>()
            .map_err(|_| ClassificationError::InvalidChoice(trimmed.to_string()))
            .and_then(Self::from_choice)
    }

    pub fn is_policy(self) -> bool {
        self != Classification::Unclassified
    }

    pub fn label(self) -> &'static str {
        match self {
            Classification::Unclassified => "unclassified",
            Classification::NeverArchive => "never archive",
            Classification::ArchiveAfter60Days => "archive after 60 days",
            Classification::DeleteAfter60Days => "delete after 60 days",
        }
    }
}

impl TryFrom<i64> for Classification {
    type Error = ClassificationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Classification::Unclassified),
            1 => Ok(Classification::NeverArchive),
            2 => Ok(Classification::ArchiveAfter60Days),
            3 => Ok(Classification::DeleteAfter60Days),
            other => Err(ClassificationError::UnknownValue(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub classification: Classification,
    pub classified_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}
