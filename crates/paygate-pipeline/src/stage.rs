//! Pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a decryption request, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FetchContent,
    OpenSession,
    AuthorizeSession,
    AssembleRequest,
    EvaluateAccess,
    ReleaseKey,
    Deliver,
}

impl Stage {
    /// All stages in order.
    pub const ALL: [Stage; 7] = [
        Stage::FetchContent,
        Stage::OpenSession,
        Stage::AuthorizeSession,
        Stage::AssembleRequest,
        Stage::EvaluateAccess,
        Stage::ReleaseKey,
        Stage::Deliver,
    ];

    /// 1-based position in the pipeline.
    pub fn number(&self) -> u8 {
        match self {
            Stage::FetchContent => 1,
            Stage::OpenSession => 2,
            Stage::AuthorizeSession => 3,
            Stage::AssembleRequest => 4,
            Stage::EvaluateAccess => 5,
            Stage::ReleaseKey => 6,
            Stage::Deliver => 7,
        }
    }

    /// Whether the stage waits on the network or a user and is time-bounded.
    pub fn is_time_bounded(&self) -> bool {
        matches!(
            self,
            Stage::FetchContent | Stage::AuthorizeSession | Stage::ReleaseKey
        )
    }

    /// Whether a failure at this stage can follow a committed payment.
    pub fn after_commit(&self) -> bool {
        *self > Stage::EvaluateAccess
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FetchContent => "fetch_content",
            Stage::OpenSession => "open_session",
            Stage::AuthorizeSession => "authorize_session",
            Stage::AssembleRequest => "assemble_request",
            Stage::EvaluateAccess => "evaluate_access",
            Stage::ReleaseKey => "release_key",
            Stage::Deliver => "deliver",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.as_str())
    }
}
