//! Validation utilities and production rules for the Agarbatti ERP ledger
//!
//! The tolerance and threshold constants here are contractual: callers and
//! the browser bindings must agree on them exactly.

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{normalize_item_name, Formulation};

// ============================================================================
// Production Rules
// ============================================================================

/// Packed quantity may differ from the batch target by this much (kg)
/// before a mismatch must be confirmed.
pub const QUANTITY_MISMATCH_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Fraction of the batch target at which completion is offered
pub const COMPLETION_THRESHOLD: Decimal = Decimal::from_parts(98, 0, 0, false, 2);

/// Whether `actual` differs from `planned` by more than the tolerance
pub fn is_quantity_mismatch(actual: Decimal, planned: Decimal) -> bool {
    (actual - planned).abs() > QUANTITY_MISMATCH_TOLERANCE
}

/// Share of the batch target covered by one output entry. Zero target gives
/// zero; a quotient too large to represent saturates at `Decimal::MAX`.
pub fn deduction_ratio(packed: Decimal, target: Decimal) -> Decimal {
    if target.is_zero() {
        Decimal::ZERO
    } else {
        packed.checked_div(target).unwrap_or(Decimal::MAX)
    }
}

/// Whether cumulative output reaches the completion threshold
pub fn is_completion_eligible(cumulative_output: Decimal, target: Decimal) -> bool {
    if target <= Decimal::ZERO {
        return false;
    }
    cumulative_output >= COMPLETION_THRESHOLD * target
}

/// Yield as a percentage of target. Zero target gives zero.
pub fn yield_percent(cumulative_output: Decimal, target: Decimal) -> Decimal {
    if target.is_zero() {
        return Decimal::ZERO;
    }
    cumulative_output
        .checked_div(target)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::MAX)
}

/// Render a yield percentage with exactly one decimal, e.g. "100.0"
pub fn format_yield(percent: Decimal) -> String {
    let mut rounded = percent.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(1);
    rounded.to_string()
}

// ============================================================================
// Entry Validations
// ============================================================================

/// Validate an item name is present
pub fn validate_item_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("Item name is required");
    }
    Ok(())
}

/// Validate a recorded quantity is strictly positive
pub fn validate_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a batch target quantity
pub fn validate_target_quantity(target: Decimal) -> Result<(), &'static str> {
    if target <= Decimal::ZERO {
        return Err("Target quantity must be greater than zero");
    }
    Ok(())
}

/// Validate an entry date is not after `today`
pub fn validate_entry_date(date: NaiveDate, today: NaiveDate) -> Result<(), &'static str> {
    if date > today {
        return Err("Entry date cannot be in the future");
    }
    Ok(())
}

/// Only entries dated today may be changed or deleted
pub fn is_mutable_on(date: NaiveDate, today: NaiveDate) -> bool {
    date == today
}

/// Validate a formulation before it is planned against
pub fn validate_formulation(formulation: &Formulation) -> Result<(), &'static str> {
    if formulation.name.trim().is_empty() {
        return Err("Formulation name is required");
    }
    if formulation.ingredients.is_empty() {
        return Err("Formulation must have at least one ingredient");
    }

    let mut seen = HashSet::new();
    for ingredient in &formulation.ingredients {
        validate_item_name(&ingredient.item_name)?;
        if ingredient.quantity_per_unit < Decimal::ZERO {
            return Err("Ingredient quantity per unit cannot be negative");
        }
        if !seen.insert(normalize_item_name(&ingredient.item_name)) {
            return Err("Formulation lists the same ingredient twice");
        }
    }
    Ok(())
}
