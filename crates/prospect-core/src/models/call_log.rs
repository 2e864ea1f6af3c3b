//! Call log model

use serde::{Deserialize, Serialize};

use super::RecordId;

/// A call made against a lead; `lead_id` is immutable after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallLog {
    pub id: RecordId,
    pub lead_id: RecordId,
    pub called_by: RecordId,
    pub log_note: String,
    /// When the call happened (Unix ms)
    pub call_date: i64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl CallLog {
    /// Create a new call log with a provisional id
    ///
    /// `call_date` defaults to now when not supplied.
    #[must_use]
    pub fn new(
        lead_id: RecordId,
        called_by: RecordId,
        log_note: impl Into<String>,
        call_date: Option<i64>,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: RecordId::new(),
            lead_id,
            called_by,
            log_note: log_note.into(),
            call_date: call_date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        }
    }
}
