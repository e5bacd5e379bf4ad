//! Baseline vs current comparison of cost tables.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::{CostEntry, CostTable, ProfileType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Regression,
    Improvement,
    Stable,
}

impl ChangeKind {
    pub fn from_percent(flat_change_percent: f64) -> Self {
        if flat_change_percent > 0.0 {
            Self::Regression
        } else if flat_change_percent < 0.0 {
            Self::Improvement
        } else {
            Self::Stable
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regression => "REGRESSION",
            Self::Improvement => "IMPROVEMENT",
            Self::Stable => "STABLE",
        }
    }

    /// Report rank: regressions first, stable last.
    fn rank(self) -> u8 {
        match self {
            Self::Regression => 1,
            Self::Improvement => 2,
            Self::Stable => 3,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    None,
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    /// Bands over |flat change %|: 0, <5, <15, <30, and everything above.
    pub fn from_percent(flat_change_percent: f64) -> Self {
        let abs = flat_change_percent.abs();
        if abs == 0.0 {
            Self::None
        } else if abs < 5.0 {
            Self::Low
        } else if abs < 15.0 {
            Self::Moderate
        } else if abs < 30.0 {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn recommendation(kind: ChangeKind, severity: Severity) -> &'static str {
    match (kind, severity) {
        (ChangeKind::Regression, Severity::Critical) => {
            "Critical regression! Immediate investigation required."
        }
        (ChangeKind::Regression, Severity::High) => {
            "Significant regression detected. Consider rollback or optimization."
        }
        (ChangeKind::Regression, Severity::Moderate) => {
            "Moderate regression. Review recent changes and optimize if needed."
        }
        (ChangeKind::Regression, _) => "Minor regression detected. Monitor for trends.",
        (ChangeKind::Improvement, Severity::Critical | Severity::High) => {
            "Significant performance gain! Consider documenting the optimization."
        }
        (ChangeKind::Improvement, Severity::Moderate) => {
            "Notable improvement detected. Monitor to ensure consistency."
        }
        (ChangeKind::Improvement, _) => "Minor improvement detected. Continue monitoring.",
        (ChangeKind::Stable, _) => "No action required. Continue monitoring.",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsoluteChange {
    pub before: i64,
    pub after: i64,
    pub delta: i64,
}

impl AbsoluteChange {
    pub fn new(before: i64, after: i64) -> Self {
        Self {
            before,
            after,
            delta: after - before,
        }
    }

    /// Relative change in percent; 0 when there is no baseline to compare against.
    pub fn percent(&self) -> f64 {
        if self.before == 0 {
            0.0
        } else {
            self.delta as f64 * 100.0 / self.before as f64
        }
    }
}

/// One function present in both tables. Its timestamp is the owning report's `generated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRow {
    pub function_name: String,
    pub kind: ChangeKind,
    pub severity: Severity,
    pub flat_change_percent: f64,
    pub cum_change_percent: f64,
    pub flat: AbsoluteChange,
    pub cum: AbsoluteChange,
}

impl ChangeRow {
    pub fn between(baseline: &CostEntry, current: &CostEntry) -> Self {
        let flat = AbsoluteChange::new(baseline.flat, current.flat);
        let cum = AbsoluteChange::new(baseline.cum, current.cum);
        let flat_change_percent = flat.percent();
        Self {
            function_name: current.name.clone(),
            kind: ChangeKind::from_percent(flat_change_percent),
            severity: Severity::from_percent(flat_change_percent),
            flat_change_percent,
            cum_change_percent: cum.percent(),
            flat,
            cum,
        }
    }

    pub fn recommendation(&self) -> &'static str {
        recommendation(self.kind, self.severity)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectOptions {
    /// Record current-only functions in [`ChangeReport::new_functions`].
    pub track_new_functions: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    pub regressions: usize,
    pub improvements: usize,
    pub stable: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub profile_type: ProfileType,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Functions present on both sides, in the current table's order.
    pub rows: Vec<ChangeRow>,
    /// `Some` only when new-function tracking was requested.
    pub new_functions: Option<Vec<String>>,
}

impl ChangeReport {
    pub fn stats(&self) -> ChangeStats {
        let mut stats = ChangeStats::default();
        for row in &self.rows {
            match row.kind {
                ChangeKind::Regression => stats.regressions += 1,
                ChangeKind::Improvement => stats.improvements += 1,
                ChangeKind::Stable => stats.stable += 1,
            }
        }
        stats
    }

    /// Regressions, then improvements, then stable; larger |flat change| first within each.
    pub fn sorted(&self) -> Vec<&ChangeRow> {
        let mut rows = self.rows.iter().collect::<Vec<_>>();
        rows.sort_by(|a, b| {
            a.kind
                .rank()
                .cmp(&b.kind.rank())
                .then_with(|| desc(a.flat_change_percent.abs(), b.flat_change_percent.abs()))
        });
        rows
    }

    /// Worst first.
    pub fn regressions(&self) -> Vec<&ChangeRow> {
        let mut rows = self
            .rows
            .iter()
            .filter(|r| r.kind == ChangeKind::Regression)
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| desc(a.flat_change_percent, b.flat_change_percent));
        rows
    }

    /// Best first.
    pub fn improvements(&self) -> Vec<&ChangeRow> {
        let mut rows = self
            .rows
            .iter()
            .filter(|r| r.kind == ChangeKind::Improvement)
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| desc(a.flat_change_percent.abs(), b.flat_change_percent.abs()));
        rows
    }
}

fn desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/// Joins both tables by function name. Current-only functions never become rows;
/// baseline-only functions are dropped.
pub fn detect_changes(
    baseline: &CostTable,
    current: &CostTable,
    profile_type: ProfileType,
    generated_at: OffsetDateTime,
    options: DetectOptions,
) -> ChangeReport {
    let by_name = baseline
        .entries
        .iter()
        .map(|e| (e.name.as_str(), e))
        .collect::<HashMap<_, _>>();

    let mut rows = Vec::new();
    let mut new_functions = Vec::new();
    for entry in &current.entries {
        match by_name.get(entry.name.as_str()) {
            Some(base) => rows.push(ChangeRow::between(base, entry)),
            None => new_functions.push(entry.name.clone()),
        }
    }
    tracing::debug!(
        matched = rows.len(),
        new = new_functions.len(),
        "compared cost tables"
    );

    ChangeReport {
        profile_type,
        generated_at,
        rows,
        new_functions: options.track_new_functions.then_some(new_functions),
    }
}
