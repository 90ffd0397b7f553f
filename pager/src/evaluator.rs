//! Threshold evaluation of a trend insight
//!
//! Only the two most recent data points are considered, and the trend is in
//! error only when both of them breach the threshold. A single spike does not
//! page anyone.

use std::fmt;

use crate::error::{WatchError, WatchResult};
use crate::posthog::Insight;

/// Insight type this watcher knows how to evaluate
pub const TRENDS_INSIGHT: &str = "TRENDS";

/// Number of trailing data points that must all breach
const SAMPLE_SIZE: usize = 2;

/// Comparison applied between a data point and the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Point is in error when `value <= threshold`
    LessOrEqual,
    /// Point is in error when `value >= threshold`
    GreaterOrEqual,
}

impl Operator {
    /// Parse the configured operator label.
    ///
    /// Only labels beginning with the `≤` glyph mean
    /// [`Operator::LessOrEqual`]; anything else is [`Operator::GreaterOrEqual`].
    pub fn from_label(label: &str) -> Self {
        if label.starts_with('≤') {
            Operator::LessOrEqual
        } else {
            Operator::GreaterOrEqual
        }
    }

    /// Whether a single point breaches `threshold` under this operator
    pub fn breached(self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::LessOrEqual => value <= threshold,
            Operator::GreaterOrEqual => value >= threshold,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::LessOrEqual => write!(f, "≤"),
            Operator::GreaterOrEqual => write!(f, "≥"),
        }
    }
}

/// Outcome of evaluating a trend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every sampled point breaches the threshold
    Erroring,
    /// At least one sampled point is within bounds
    NotErroring,
    /// The insight carried no data to judge
    Indeterminate,
}

impl Verdict {
    /// Only [`Verdict::Erroring`] counts; indeterminate is treated as healthy
    pub fn is_erroring(self) -> bool {
        matches!(self, Verdict::Erroring)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Erroring => write!(f, "erroring"),
            Verdict::NotErroring => write!(f, "not erroring"),
            Verdict::Indeterminate => write!(f, "indeterminate (no data)"),
        }
    }
}

/// Evaluate a fetched insight against the threshold.
///
/// Fails with [`WatchError::InvalidInput`] if the insight is not a trend.
/// Empty results are logged and reported as [`Verdict::Indeterminate`].
pub fn evaluate(insight: &Insight, threshold: f64, operator: Operator) -> WatchResult<Verdict> {
    if insight.filters.insight != TRENDS_INSIGHT {
        return Err(WatchError::InvalidInput(format!(
            "the provided insight is not a trend (got {:?})",
            insight.filters.insight
        )));
    }

    let Some(series) = insight.result.first() else {
        tracing::warn!("Insight returned no result");
        return Ok(Verdict::Indeterminate);
    };

    if series.data.is_empty() {
        tracing::warn!("Insight returned no data");
        return Ok(Verdict::Indeterminate);
    }

    let start = series.data.len().saturating_sub(SAMPLE_SIZE);
    let latest = &series.data[start..];

    tracing::debug!(?latest, threshold, %operator, "Evaluating latest data points");

    if latest
        .iter()
        .all(|&value| operator.breached(value, threshold))
    {
        Ok(Verdict::Erroring)
    } else {
        Ok(Verdict::NotErroring)
    }
}
