//! Reconciliation engine: the in-memory working set of one conference.
//!
//! The working set maps each normalized code to a [`CountLine`], in
//! insertion order (manifest order first, then surplus codes as they are
//! first counted). Counts only ever add; no line is removed or decremented.
//!
//! The engine is a plain value owned by whoever drives the session. Event
//! ordering is the caller's job, so there is no internal locking.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::code::normalize;
use crate::error::CountError;
use crate::model::{ConferenceId, ConferenceIdentity, CountLine, ExpectedItem, PersistedLine};
use crate::status::StatusCounts;

/// Whether a count landed on an existing line or opened a new surplus line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountOutcome {
    /// "matched-count-updated"
    Updated,
    /// "new-surplus-item"
    NewSurplus,
}

/// Result of [`ReconciliationEngine::apply_count`]: the line after the update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedCount {
    pub outcome: CountOutcome,
    pub line: CountLine,
}

/// Overall counting progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub units_expected: i64,
    pub units_counted: i64,
    /// `min(units_counted / units_expected, 1.0)`, or `0.0` with nothing expected.
    pub fraction_complete: f64,
    pub items_with_any_count: usize,
    pub items_total: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    identity: ConferenceIdentity,
    conference_id: Option<ConferenceId>,
    lines: IndexMap<String, CountLine>,
}

impl ReconciliationEngine {
    pub fn new(identity: ConferenceIdentity) -> Self {
        Self {
            identity,
            conference_id: None,
            lines: IndexMap::new(),
        }
    }

    pub fn identity(&self) -> &ConferenceIdentity {
        &self.identity
    }

    /// The live conference this working set mirrors into, once bound.
    pub fn conference_id(&self) -> Option<ConferenceId> {
        self.conference_id
    }

    pub fn bind_conference(&mut self, id: ConferenceId) {
        self.conference_id = Some(id);
    }

    /// Rebuild the working set from the manifest plus previously persisted
    /// counts.
    ///
    /// Manifest lines start at zero; a persisted line for the same code
    /// replaces that count. Persisted codes the manifest lacks come back as
    /// surplus lines with `expected_qty = 0`. Calling this twice with the
    /// same inputs yields the same working set.
    pub fn initialize(&mut self, expected_items: &[ExpectedItem], persisted: &[PersistedLine]) {
        self.lines.clear();
        for item in expected_items {
            self.lines
                .entry(item.normalized_code.clone())
                .and_modify(|line| {
                    line.expected_qty = line.expected_qty.saturating_add(item.expected_qty)
                })
                .or_insert_with(|| CountLine::from_expected(item));
        }

        let mut resumed = 0usize;
        for row in persisted {
            let code = normalize(&row.normalized_code);
            if code.is_empty() {
                continue;
            }
            match self.lines.get_mut(&code) {
                Some(line) => {
                    line.counted_qty = row.counted_qty.max(0);
                    resumed += 1;
                }
                None if row.counted_qty > 0 => {
                    self.lines.insert(
                        code.clone(),
                        CountLine {
                            normalized_code: code.clone(),
                            raw_code: code,
                            description: row.description.clone(),
                            expected_qty: 0,
                            counted_qty: row.counted_qty,
                        },
                    );
                    resumed += 1;
                }
                None => {}
            }
        }
        debug!(
            lines = self.lines.len(),
            resumed, "initialized working set"
        );
    }

    /// Add `qty` units of `code` to the working set.
    ///
    /// Both manual entries and camera captures route through here. Repeated
    /// calls are distinct events and all count; suppressing duplicate
    /// detections belongs to the capture layer.
    pub fn apply_count(&mut self, code: &str, qty: i64) -> Result<AppliedCount, CountError> {
        if qty <= 0 {
            return Err(CountError::InvalidQuantity(qty));
        }
        let normalized = normalize(code);
        if normalized.is_empty() {
            return Err(CountError::InvalidCode(code.to_string()));
        }

        let applied = match self.lines.get_mut(&normalized) {
            Some(line) => {
                line.counted_qty = line.counted_qty.checked_add(qty).ok_or_else(|| {
                    CountError::QuantityOverflow {
                        code: normalized.clone(),
                        qty,
                    }
                })?;
                AppliedCount {
                    outcome: CountOutcome::Updated,
                    line: line.clone(),
                }
            }
            None => {
                let line = CountLine::unregistered(normalized.clone(), code.trim().to_string(), qty);
                self.lines.insert(normalized, line.clone());
                AppliedCount {
                    outcome: CountOutcome::NewSurplus,
                    line,
                }
            }
        };
        debug!(
            code = %applied.line.normalized_code,
            qty,
            counted = applied.line.counted_qty,
            outcome = ?applied.outcome,
            "applied count"
        );
        Ok(applied)
    }

    /// Look a line up by any spelling of its code.
    pub fn line(&self, code: &str) -> Option<&CountLine> {
        self.lines.get(&normalize(code))
    }

    pub fn snapshot(&self) -> Vec<CountLine> {
        self.lines.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn progress(&self) -> Progress {
        let units_expected = self
            .lines
            .values()
            .fold(0i64, |acc, l| acc.saturating_add(l.expected_qty));
        let units_counted = self
            .lines
            .values()
            .fold(0i64, |acc, l| acc.saturating_add(l.counted_qty));
        let fraction_complete = if units_expected > 0 {
            (units_counted as f64 / units_expected as f64).min(1.0)
        } else {
            0.0
        };
        Progress {
            units_expected,
            units_counted,
            fraction_complete,
            items_with_any_count: self.lines.values().filter(|l| l.counted_qty > 0).count(),
            items_total: self.lines.len(),
        }
    }

    pub fn status_counts(&self) -> StatusCounts {
        self.lines.values().map(CountLine::status).collect()
    }
}
