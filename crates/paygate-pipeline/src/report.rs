//! User-facing failure summaries.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Recoverability};
use crate::stage::Stage;

/// What went wrong, where, and whether the requester paid.
///
/// `charged` comes from re-reading the ledger after the failure, so it is
/// true whenever the pair is paid, including payments from earlier runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub stage: Stage,
    pub recoverability: Recoverability,
    pub charged: bool,
    pub message: String,
}

impl FailureReport {
    pub fn new(error: &PipelineError, charged: bool) -> Self {
        Self {
            stage: error.stage(),
            recoverability: error.recoverability(),
            charged,
            message: error.to_string(),
        }
    }

    /// Short guidance for the requester.
    pub fn advice(&self) -> &'static str {
        match (self.recoverability, self.charged) {
            (Recoverability::RetryWithFunds, _) => "payment required before access",
            (Recoverability::Fatal, _) => "content cannot be decrypted",
            (_, true) => "already paid; retry without paying again",
            (_, false) => "temporary failure; nothing was charged, retry",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_report_json_shape() {
        let error = PipelineError::Timeout {
            stage: Stage::ReleaseKey,
            after: Duration::from_secs(30),
        };
        let report = FailureReport::new(&error, true);

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();

        assert_eq!(json["stage"], "release_key");
        assert_eq!(json["recoverability"], "retry_from_start");
        assert_eq!(json["charged"], true);
        assert_eq!(report.advice(), "already paid; retry without paying again");
    }

    #[test]
    fn test_fatal_advice_wins_over_charge() {
        let report = FailureReport::new(&PipelineError::DecryptionFailed("bad tag".into()), true);
        assert_eq!(report.recoverability, Recoverability::Fatal);
        assert_eq!(report.advice(), "content cannot be decrypted");
    }
}
