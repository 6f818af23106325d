//! Turns raw on-chain tallies into a display-ready view.
//!
//! Raw counts are `uint256`, so the total is summed as a [`BigUint`] and the
//! percentage division stays in integer arithmetic until the final
//! hundredths value is known.

use alloy::primitives::U256;
use num_bigint::BigUint;
use serde::Serialize;

use crate::error::PollError;

/// Largest count shown as a plain integer (2^53 - 1, exact in an `f64`).
pub const MAX_SAFE_VOTES: u64 = (1 << 53) - 1;

const RESULTS_CONTEXT: &str = "Error loading results";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionResult {
    pub option: String,
    pub votes: u64,
    /// In `[0, 100]`, rounded half-up to two decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsView {
    pub poll_id: u64,
    pub question: String,
    pub total_votes: u64,
    pub results: Vec<OptionResult>,
}

/// Builds the results view. `raw_votes[i]` is the tally of `options[i]`.
pub fn aggregate(
    poll_id: u64,
    question: String,
    options: Vec<String>,
    raw_votes: &[U256],
) -> Result<ResultsView, PollError> {
    if options.len() != raw_votes.len() {
        return Err(PollError::query(
            RESULTS_CONTEXT,
            format!(
                "contract returned {} vote counts for {} options",
                raw_votes.len(),
                options.len()
            ),
        ));
    }

    let counts: Vec<BigUint> = raw_votes.iter().map(to_biguint).collect();
    let total: BigUint = counts.iter().sum();
    let total_votes = to_display(&total)?;

    let results = options
        .into_iter()
        .zip(counts.iter())
        .map(|(option, count)| {
            Ok(OptionResult {
                option,
                votes: to_display(count)?,
                percentage: percentage(count, &total),
            })
        })
        .collect::<Result<Vec<_>, PollError>>()?;

    Ok(ResultsView {
        poll_id,
        question,
        total_votes,
        results,
    })
}

/// `count / total * 100`, rounded half-up to hundredths; 0 when `total` is 0.
pub fn percentage(count: &BigUint, total: &BigUint) -> f64 {
    if total.bits() == 0 {
        return 0.0;
    }
    // hundredths = floor((count * 10000 + total / 2) / total), kept exact by doubling
    let hundredths: BigUint = (count * 20_000u32 + total) / (total * 2u32);
    // count <= total, so hundredths <= 10000
    let hundredths = u64::try_from(&hundredths).unwrap_or(10_000);
    hundredths as f64 / 100.0
}

fn to_biguint(value: &U256) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes::<32>())
}

fn to_display(value: &BigUint) -> Result<u64, PollError> {
    u64::try_from(value)
        .ok()
        .filter(|v| *v <= MAX_SAFE_VOTES)
        .ok_or_else(|| PollError::Overflow(value.to_string()))
}
