/// Document status definitions for tracking crawl progress
///
/// This module defines all possible states a document can be in during a crawl.
use std::fmt;

/// Represents the current lifecycle state of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentStatus {
    /// Document row exists but no crawl unit has claimed it yet
    Pending,

    /// Document has been claimed and is being fetched
    Processing,

    /// Document content was fetched and stored
    Completed,

    /// Fetching the document failed; see the recorded error
    Failed,
}

impl DocumentStatus {
    /// Returns true if no further processing will happen without a resubmission
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the document is waiting for or undergoing a fetch
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Returns true if the document may be submitted again as a new crawl
    pub fn is_resubmittable(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible document statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Processing,
            Self::Completed,
            Self::Failed,
        ]
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
