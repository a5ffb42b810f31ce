//! Aggregates derived from an episode's steps

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::step::Step;

/// Amounts above this have no sixth decimal place left to round.
const ROUNDING_LIMIT: f64 = 9.0e9;

/// An aggregate that cannot be represented, with the position of the
/// step whose value pushed it over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TotalsOverflow {
    #[error("total tokens exceed the u64 range at steps[{0}]")]
    Tokens(usize),
    #[error("total duration_ms exceeds the u64 range at steps[{0}]")]
    Duration(usize),
    #[error("total cost_usd is not a finite number at steps[{0}]")]
    Cost(usize),
}

impl TotalsOverflow {
    /// Step field the overflowing aggregate is summed from.
    pub fn field(&self) -> &'static str {
        match self {
            TotalsOverflow::Tokens(_) => "tokens",
            TotalsOverflow::Duration(_) => "duration_ms",
            TotalsOverflow::Cost(_) => "cost_usd",
        }
    }

    pub fn position(&self) -> usize {
        match *self {
            TotalsOverflow::Tokens(pos)
            | TotalsOverflow::Duration(pos)
            | TotalsOverflow::Cost(pos) => pos,
        }
    }
}

/// Per-episode aggregates, recomputed from steps on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub step_count: usize,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub total_duration_ms: u64,
    /// Distinct tool names in first-use order.
    pub tools_used: Vec<String>,
}

impl Totals {
    /// Sums the steps, saturating sums that overflow.
    ///
    /// Ingest rejects such episodes through [`Totals::try_from_steps`], so
    /// a stored episode never saturates.
    pub fn from_steps(steps: &[Step]) -> Self {
        let mut totals = Totals {
            step_count: steps.len(),
            ..Default::default()
        };
        let mut cost = 0.0;

        for step in steps {
            totals.total_tokens = totals.total_tokens.saturating_add(step.tokens.unwrap_or(0));
            totals.total_duration_ms = totals
                .total_duration_ms
                .saturating_add(step.duration_ms.unwrap_or(0));
            cost += step.cost_usd.unwrap_or(0.0);
            if let Some(tool) = step.tool_name.as_deref() {
                if !totals.tools_used.iter().any(|t| t == tool) {
                    totals.tools_used.push(tool.to_string());
                }
            }
        }

        totals.total_cost_usd = if cost.is_finite() { round_cost(cost) } else { f64::MAX };
        totals
    }

    /// Sums the steps, failing on the first aggregate that overflows.
    pub fn try_from_steps(steps: &[Step]) -> Result<Self, TotalsOverflow> {
        let mut tokens: u64 = 0;
        let mut duration: u64 = 0;
        let mut cost = 0.0;
        for (pos, step) in steps.iter().enumerate() {
            tokens = tokens
                .checked_add(step.tokens.unwrap_or(0))
                .ok_or(TotalsOverflow::Tokens(pos))?;
            duration = duration
                .checked_add(step.duration_ms.unwrap_or(0))
                .ok_or(TotalsOverflow::Duration(pos))?;
            cost += step.cost_usd.unwrap_or(0.0);
            if !cost.is_finite() {
                return Err(TotalsOverflow::Cost(pos));
            }
        }
        Ok(Self::from_steps(steps))
    }
}

/// Rounds a USD amount to 6 decimal places.
///
/// Non-finite values and values too large to carry six decimals are
/// returned unchanged.
pub fn round_cost(value: f64) -> f64 {
    if !value.is_finite() || value.abs() >= ROUNDING_LIMIT {
        return value;
    }
    (value * 1_000_000.0).round() / 1_000_000.0
}
