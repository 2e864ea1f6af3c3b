//! Category model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::RecordId;
use crate::error::Error;

/// Outcome flavour of a category; immutable after creation (no update path exists)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    Converted,
    Rejected,
}

impl CategoryType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Converted => "converted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for CategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "converted" => Ok(Self::Converted),
            "rejected" => Ok(Self::Rejected),
            other => Err(Error::InvalidInput(format!(
                "Unknown category type: {other}"
            ))),
        }
    }
}

/// A closure category for leads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: RecordId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CategoryType,
    pub created_by: RecordId,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Category {
    /// Create a new category with a provisional id
    #[must_use]
    pub fn new(name: impl Into<String>, kind: CategoryType, created_by: RecordId) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: RecordId::new(),
            name: name.into(),
            kind,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}
