//! Overall-status aggregation.
//!
//! The single place where `overall_status` is decided. Neither the mapper
//! nor the judgment step ever sets it.

use serde::{Deserialize, Serialize};

use crate::domain::{ComplianceStatus, OverallStatus};

/// Counts of each status in a judgment set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTally {
    pub compliant: usize,
    pub non_compliant: usize,
    pub uncertain: usize,
}

impl StatusTally {
    pub fn from_statuses(statuses: impl IntoIterator<Item = ComplianceStatus>) -> Self {
        let mut tally = Self::default();
        for status in statuses {
            match status {
                ComplianceStatus::Compliant => tally.compliant += 1,
                ComplianceStatus::NonCompliant => tally.non_compliant += 1,
                ComplianceStatus::Uncertain => tally.uncertain += 1,
            }
        }
        tally
    }

    pub fn total(&self) -> usize {
        self.compliant + self.non_compliant + self.uncertain
    }

    /// Apply the aggregation table.
    ///
    /// | judgment set                                   | overall          |
    /// |------------------------------------------------|------------------|
    /// | empty                                          | `not_applicable` |
    /// | only uncertain                                 | `uncertain`      |
    /// | decisive entries all compliant                 | `compliant`      |
    /// | decisive entries all non_compliant             | `non_compliant`  |
    /// | compliant and non_compliant both present       | `partial`        |
    pub fn overall(&self) -> OverallStatus {
        match (self.total(), self.compliant, self.non_compliant) {
            (0, _, _) => OverallStatus::NotApplicable,
            (_, 0, 0) => OverallStatus::Uncertain,
            (_, c, 0) if c > 0 => OverallStatus::Compliant,
            (_, 0, n) if n > 0 => OverallStatus::NonCompliant,
            (_, c, n) if c > 0 && n > 0 => OverallStatus::Partial,
            _ => OverallStatus::Uncertain,
        }
    }
}

/// Overall status of a judgment set.
pub fn overall_status(statuses: impl IntoIterator<Item = ComplianceStatus>) -> OverallStatus {
    StatusTally::from_statuses(statuses).overall()
}
