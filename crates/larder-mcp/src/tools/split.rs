// larder-mcp/src/tools/split.rs
// ============================================================================
// Module: Stock Entry Splitting
// Description: Pure planning for dividing one stock entry into sub-entries.
// Purpose: Shared algorithm for the stock split tool and cook portioning.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Splitting turns one stock entry into N tagged slices: the original entry
//! is updated in place with the first amount, and N-1 new entries are
//! created with the remaining amounts. Every slice's note carries a
//! sequential suffix derived from the original entry's identifier and its
//! position, so the family of entries stays traceable after the split.
//!
//! Planning is pure; the two call sites (the `split_stock_entry` tool and
//! cook-time portioning in the recipes module) apply the plan with their
//! own upstream calls.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One planned slice of a split.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSlice {
    /// Target amount for this slice.
    pub amount: f64,
    /// Tagged note for this slice.
    pub note: String,
}

/// Full plan for splitting one entry.
///
/// # Invariants
/// - `slices` is non-empty; `slices[0]` updates the original entry and the
///   remainder become new entries.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPlan {
    /// Planned slices in position order.
    pub slices: Vec<PlannedSlice>,
}

impl SplitPlan {
    /// Returns the slice that updates the original entry in place.
    #[must_use]
    pub fn original(&self) -> &PlannedSlice {
        // Construction guarantees at least one slice.
        &self.slices[0]
    }

    /// Returns the slices that become new entries.
    #[must_use]
    pub fn additions(&self) -> &[PlannedSlice] {
        &self.slices[1..]
    }

    /// Returns the total amount across all slices.
    #[must_use]
    pub fn total_amount(&self) -> f64 {
        self.slices.iter().map(|slice| slice.amount).sum()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Split planning errors.
#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    /// No target amounts were provided.
    #[error("amounts must contain at least one value")]
    EmptyAmounts,
    /// A target amount is zero or negative.
    #[error("amounts must be positive; got {0}")]
    NonPositiveAmount(f64),
}

// ============================================================================
// SECTION: Planning
// ============================================================================

/// Plans a split of one entry into the given target amounts.
///
/// # Errors
///
/// Returns [`SplitError`] when `amounts` is empty or contains a
/// non-positive value.
pub fn plan_split(
    entry_id: i64,
    base_note: &str,
    amounts: &[f64],
) -> Result<SplitPlan, SplitError> {
    if amounts.is_empty() {
        return Err(SplitError::EmptyAmounts);
    }
    for amount in amounts {
        if *amount <= 0.0 {
            return Err(SplitError::NonPositiveAmount(*amount));
        }
    }
    let slices = amounts
        .iter()
        .enumerate()
        .map(|(index, amount)| PlannedSlice {
            amount: *amount,
            note: tag_note(base_note, entry_id, index + 1),
        })
        .collect();
    Ok(SplitPlan {
        slices,
    })
}

/// Plans an even split of a total amount into `portions` slices.
///
/// # Errors
///
/// Returns [`SplitError`] when the portion count is zero or the total is
/// not positive.
pub fn plan_even_split(
    entry_id: i64,
    base_note: &str,
    total: f64,
    portions: usize,
) -> Result<SplitPlan, SplitError> {
    if portions == 0 {
        return Err(SplitError::EmptyAmounts);
    }
    if total <= 0.0 {
        return Err(SplitError::NonPositiveAmount(total));
    }
    #[allow(clippy::cast_precision_loss, reason = "Portion counts are small.")]
    let per_portion = total / portions as f64;
    let amounts = vec![per_portion; portions];
    plan_split(entry_id, base_note, &amounts)
}

/// Tags a note with the sequential split suffix for one slice.
fn tag_note(base_note: &str, entry_id: i64, position: usize) -> String {
    let suffix = format!("(split {entry_id}-{position})");
    let base = base_note.trim();
    if base.is_empty() { suffix } else { format!("{base} {suffix}") }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
