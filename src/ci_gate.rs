//! Pass/fail decision over a [`ChangeReport`].

use serde::{Deserialize, Serialize};

use crate::{ChangeKind, ChangeReport, ChangeRow, CiPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub status: GateStatus,
    pub reason: String,
    /// Effective max regression threshold, when one applies.
    pub threshold: Option<f64>,
    pub worst_function: Option<String>,
    pub worst_change_percent: Option<f64>,
    /// Rows left after ignore rules and the minimum-change filter.
    pub considered: usize,
}

impl GateDecision {
    pub fn passed(&self) -> bool {
        self.status == GateStatus::Pass
    }
}

/// The configured max wins when set; otherwise the command-line threshold; the smaller when both are.
pub fn effective_threshold(policy: Option<&CiPolicy>, cli_threshold: Option<f64>) -> Option<f64> {
    let configured = policy
        .map(|p| p.max_regression_threshold)
        .filter(|t| *t > 0.0);
    let cli = cli_threshold.filter(|t| *t > 0.0);
    match (configured, cli) {
        (Some(c), Some(l)) => Some(c.min(l)),
        (c, l) => c.or(l),
    }
}

fn is_ignored(row: &ChangeRow, policy: &CiPolicy) -> bool {
    policy.ignore_functions.iter().any(|f| f == &row.function_name)
        || policy
            .ignore_prefixes
            .iter()
            .any(|p| row.function_name.starts_with(p.as_str()))
        || row.flat_change_percent.abs() < policy.min_change_threshold
}

pub fn evaluate(
    report: &ChangeReport,
    policy: Option<&CiPolicy>,
    cli_threshold: Option<f64>,
) -> GateDecision {
    let threshold = effective_threshold(policy, cli_threshold);
    let considered = report
        .rows
        .iter()
        .filter(|row| policy.is_none_or(|p| !is_ignored(row, p)))
        .collect::<Vec<_>>();

    let worst = considered
        .iter()
        .filter(|r| r.kind == ChangeKind::Regression)
        .max_by(|a, b| a.flat_change_percent.total_cmp(&b.flat_change_percent));
    let mut decision = GateDecision {
        status: GateStatus::Pass,
        reason: String::new(),
        threshold,
        worst_function: worst.map(|r| r.function_name.clone()),
        worst_change_percent: worst.map(|r| r.flat_change_percent),
        considered: considered.len(),
    };

    if let (Some(row), Some(max)) = (worst, threshold) {
        if row.flat_change_percent > max {
            decision.status = GateStatus::Fail;
            decision.reason = format!(
                "{} regressed by {:.2}% (threshold {:.2}%)",
                row.function_name, row.flat_change_percent, max
            );
            tracing::warn!(function = %row.function_name, change = row.flat_change_percent, threshold = max, "regression gate failed");
            return decision;
        }
    }

    if policy.is_some_and(|p| p.fail_on_improvement) {
        if let Some(row) = considered.iter().find(|r| r.kind == ChangeKind::Improvement) {
            decision.status = GateStatus::Fail;
            decision.reason = format!(
                "{} improved by {:.2}% and improvements are configured to fail",
                row.function_name,
                row.flat_change_percent.abs()
            );
            return decision;
        }
    }

    decision.reason = match (&decision.worst_function, threshold) {
        (_, None) => "no regression threshold configured".to_string(),
        (None, Some(max)) => format!("no regressions above {max:.2}%"),
        (Some(name), Some(max)) => format!(
            "worst regression {name} ({:.2}%) is within threshold {max:.2}%",
            decision.worst_change_percent.unwrap_or_default()
        ),
    };
    decision
}
