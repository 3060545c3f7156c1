//! Review status vocabulary.
//!
//! Status is an open string edited by human reviewers. The router only acts
//! on a handful of values; everything else is a deliberate no-op.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const PENDING: &str = "pending";
pub const NEEDS_SECONDARY_REVIEW: &str = "needs-secondary-review";
pub const FAST_TRACK: &str = "fast-track";

/// Values still accepted for `needs-secondary-review` from older sheets.
pub const SECONDARY_REVIEW_ALIASES: &[&str] = &[
    "Needs Secondary Review",
    "needs-medical-review",
    "Medical Review Required",
];

/// Status of a review row, interpreted by exact match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReviewStatus {
    /// Freshly registered, waiting for a reviewer
    Pending,
    /// Reviewer asked for a second review stage
    NeedsSecondaryReview,
    /// Reviewer closed the review without a second stage
    FastTrack,
    /// Anything else; never routed
    Other(String),
}

impl ReviewStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            PENDING => Self::Pending,
            NEEDS_SECONDARY_REVIEW => Self::NeedsSecondaryReview,
            FAST_TRACK => Self::FastTrack,
            other if SECONDARY_REVIEW_ALIASES.contains(&other) => Self::NeedsSecondaryReview,
            other => Self::Other(other.to_string()),
        }
    }

    /// Canonical string written back to tables.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => PENDING,
            Self::NeedsSecondaryReview => NEEDS_SECONDARY_REVIEW,
            Self::FastTrack => FAST_TRACK,
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Whether the router has a transition for this status.
    pub fn is_routable(&self) -> bool {
        matches!(self, Self::NeedsSecondaryReview | Self::FastTrack)
    }
}

impl From<String> for ReviewStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ReviewStatus> for String {
    fn from(status: ReviewStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
