//! Lead model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::RecordId;
use crate::error::Error;

/// Lifecycle status of a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    Open,
    Closed,
}

impl LeadStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(Error::InvalidInput(format!("Unknown lead status: {other}"))),
        }
    }
}

/// A sales lead
///
/// Closure invariant: `status == Closed` iff `category_id`, `closed_at` and
/// `closed_by` are all set; an open lead carries none of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: RecordId,
    pub name: String,
    pub location: String,
    pub phone: String,
    pub whatsapp_phone: String,
    #[serde(default)]
    pub note: Option<String>,
    pub status: LeadStatus,
    #[serde(default)]
    pub category_id: Option<RecordId>,
    pub created_by: RecordId,
    #[serde(default)]
    pub closed_at: Option<i64>,
    #[serde(default)]
    pub closed_by: Option<RecordId>,
    /// Creation timestamp (Unix ms); a client-sent hint the server may override
    #[serde(default)]
    pub created_at: i64,
    /// Last update timestamp (Unix ms); the server owns the truth value
    #[serde(default)]
    pub updated_at: i64,
}

impl Lead {
    /// Create a new open lead with a provisional id
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        phone: impl Into<String>,
        whatsapp_phone: impl Into<String>,
        note: Option<String>,
        created_by: RecordId,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: RecordId::new(),
            name: name.into(),
            location: location.into(),
            phone: phone.into(),
            whatsapp_phone: whatsapp_phone.into(),
            note,
            status: LeadStatus::Open,
            category_id: None,
            created_by,
            closed_at: None,
            closed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == LeadStatus::Open
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.status == LeadStatus::Closed
    }

    /// Close the lead under a category, stamping the closure fields together
    pub fn close(&mut self, category_id: RecordId, closed_by: RecordId) {
        let now = chrono::Utc::now().timestamp_millis();
        self.status = LeadStatus::Closed;
        self.category_id = Some(category_id);
        self.closed_at = Some(now);
        self.closed_by = Some(closed_by);
        self.updated_at = now;
    }

    /// Reopen the lead, clearing all closure fields
    pub fn reopen(&mut self) {
        self.status = LeadStatus::Open;
        self.category_id = None;
        self.closed_at = None;
        self.closed_by = None;
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }

    /// Check the closure invariant; the server skips records that violate it
    pub fn validate_closure(&self) -> Result<(), Error> {
        let has_closure_fields =
            self.category_id.is_some() && self.closed_at.is_some() && self.closed_by.is_some();
        let has_any_closure_field =
            self.category_id.is_some() || self.closed_at.is_some() || self.closed_by.is_some();

        match self.status {
            LeadStatus::Closed if has_closure_fields => Ok(()),
            LeadStatus::Closed => Err(Error::InvalidInput(
                "Closed lead must carry category_id, closed_at and closed_by".to_string(),
            )),
            LeadStatus::Open if !has_any_closure_field => Ok(()),
            LeadStatus::Open => Err(Error::InvalidInput(
                "Open lead must not carry closure fields".to_string(),
            )),
        }
    }
}
