//! Quarantine record types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::translate::FailureReason;

/// A source text whose translation could not be obtained.
#[derive(Debug, Clone, Serialize)]
pub struct QuarantineRecord {
    pub source_text: String,
    pub attempts: usize,
    pub last_error: FailureReason,
    pub created_at: DateTime<Utc>,
}

/// Quarantined items by failure kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuarantineStats {
    pub api_error: usize,
    pub invalid_translation: usize,
}

impl QuarantineStats {
    pub fn increment(&mut self, reason: FailureReason) {
        match reason {
            FailureReason::ApiError => self.api_error += 1,
            FailureReason::InvalidTranslation => self.invalid_translation += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.api_error + self.invalid_translation
    }
}
