//! Backlog work item model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a backlog row: `pending -> doing -> done`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    #[default]
    Pending,
    #[serde(rename = "doing")]
    InProgress,
    Done,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "doing",
            Self::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" | "wait" => Some(Self::Pending),
            "doing" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// One listing URL in the shared backlog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub url: String,
    pub status: WorkStatus,
    /// Items discovered while processing this listing.
    pub total_num: i64,
    /// Records newly yielded by this listing.
    pub get_num: i64,
    /// Host that last claimed the row.
    pub worker: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    pub fn pending(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: WorkStatus::Pending,
            total_num: 0,
            get_num: 0,
            worker: None,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [WorkStatus::Pending, WorkStatus::InProgress, WorkStatus::Done] {
            assert_eq!(WorkStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(WorkStatus::from_str("wait"), Some(WorkStatus::Pending));
        assert_eq!(WorkStatus::from_str("bogus"), None);
    }
}
