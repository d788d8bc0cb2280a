//! Line status classification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::PersistedLine;

/// Outcome of reconciling one line's expected and counted quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Matched,
    Shortage,
    Surplus,
    /// Counted but never listed in the manifest.
    UnexpectedSurplus,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Matched,
        Status::Shortage,
        Status::Surplus,
        Status::UnexpectedSurplus,
    ];

    /// Storage label, also used by `Display` and `FromStr`.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Matched => "MATCHED",
            Status::Shortage => "SHORTAGE",
            Status::Surplus => "SURPLUS",
            Status::UnexpectedSurplus => "UNEXPECTED_SURPLUS",
        }
    }

    /// Any status other than [`Status::Matched`].
    pub fn is_discrepancy(self) -> bool {
        self != Status::Matched
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status label: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Classify a line from its expected and counted quantities.
///
/// The zero-expected test runs before the difference tests: an item absent
/// from the manifest is always [`Status::UnexpectedSurplus`], never a plain
/// surplus.
pub fn classify(expected_qty: i64, counted_qty: i64) -> Status {
    let difference = counted_qty - expected_qty;
    if expected_qty == 0 && counted_qty > 0 {
        Status::UnexpectedSurplus
    } else if difference == 0 {
        Status::Matched
    } else if difference > 0 {
        Status::Surplus
    } else {
        Status::Shortage
    }
}

/// Number of lines per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub matched: usize,
    pub shortage: usize,
    pub surplus: usize,
    pub unexpected_surplus: usize,
}

impl StatusCounts {
    /// Tally a stored conference by the status recorded with each line.
    pub fn from_persisted(lines: &[PersistedLine]) -> Self {
        lines.iter().map(|l| l.status).collect()
    }

    pub fn record(&mut self, status: Status) {
        match status {
            Status::Matched => self.matched += 1,
            Status::Shortage => self.shortage += 1,
            Status::Surplus => self.surplus += 1,
            Status::UnexpectedSurplus => self.unexpected_surplus += 1,
        }
    }

    /// Surplus lines of either kind.
    pub fn surplus_total(&self) -> usize {
        self.surplus + self.unexpected_surplus
    }

    pub fn total(&self) -> usize {
        self.matched + self.shortage + self.surplus_total()
    }
}

impl FromIterator<Status> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = Status>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for status in iter {
            counts.record(status);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_expected_is_unexpected_surplus() {
        assert_eq!(classify(0, 5), Status::UnexpectedSurplus);
        assert_ne!(classify(0, 5), Status::Surplus);
    }

    #[test]
    fn difference_rules() {
        assert_eq!(classify(10, 10), Status::Matched);
        assert_eq!(classify(3, 1), Status::Shortage);
        assert_eq!(classify(3, 0), Status::Shortage);
        assert_eq!(classify(3, 7), Status::Surplus);
    }

    #[test]
    fn zero_zero_falls_through_to_matched() {
        // Never created in a working set, but the rule stays total.
        assert_eq!(classify(0, 0), Status::Matched);
    }

    #[test]
    fn labels_round_trip_through_from_str() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
            assert_eq!(status.to_string(), status.as_str());
        }
        assert!("OK".parse::<Status>().is_err());
    }

    #[test]
    fn serde_uses_storage_labels() {
        let json = serde_json::to_string(&Status::UnexpectedSurplus).unwrap();
        assert_eq!(json, "\"UNEXPECTED_SURPLUS\"");
    }

    #[test]
    fn counts_group_surplus_kinds() {
        let counts: StatusCounts = [
            Status::Matched,
            Status::Surplus,
            Status::UnexpectedSurplus,
            Status::Shortage,
            Status::Shortage,
        ]
        .into_iter()
        .collect();
        assert_eq!(counts.matched, 1);
        assert_eq!(counts.shortage, 2);
        assert_eq!(counts.surplus_total(), 2);
        assert_eq!(counts.total(), 5);
    }

    #[test]
    fn persisted_lines_tally_by_stored_status() {
        let line = |code: &str, status: Status| PersistedLine {
            conference_id: 4,
            normalized_code: code.into(),
            description: String::new(),
            expected_qty: 0,
            counted_qty: 0,
            difference: 0,
            status,
        };
        let lines = [
            line("1", Status::Matched),
            line("2", Status::Shortage),
            line("3", Status::Shortage),
            line("4", Status::UnexpectedSurplus),
        ];
        let counts = StatusCounts::from_persisted(&lines);
        assert_eq!(counts.matched, 1);
        assert_eq!(counts.shortage, 2);
        assert_eq!(counts.surplus, 0);
        assert_eq!(counts.unexpected_surplus, 1);
        assert_eq!(StatusCounts::from_persisted(&[]), StatusCounts::default());
    }

    #[test]
    fn only_matched_is_not_a_discrepancy() {
        assert!(!Status::Matched.is_discrepancy());
        assert!(Status::Shortage.is_discrepancy());
        assert!(Status::UnexpectedSurplus.is_discrepancy());
    }
}
